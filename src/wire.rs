// SPDX-License-Identifier: MIT OR Apache-2.0
//! Small helper for emitting one [`Record`] onto a shared, lockable
//! writer half of the serial link.

use crate::record::Record;
use std::io;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

pub const CRLF: &str = "\r\n";

/// Serializes `record`, writes it followed by `\r\n`, and flushes.
pub fn write_record<W: io::Write>(writer: &Arc<Mutex<W>>, record: &Record) -> io::Result<()> {
    let mut line = record.to_line();
    line.push_str(CRLF);
    let mut guard = writer.lock().unwrap_or_else(|e| e.into_inner());
    guard.write_all(line.as_bytes())?;
    guard.flush()
}

/// Writes `record` and waits the radio's duty-cycle courtesy delay
/// afterward. Not required for correctness, only LoRa etiquette.
pub fn write_record_with_delay<W: io::Write>(
    writer: &Arc<Mutex<W>>,
    record: &Record,
    delay: Duration,
) -> io::Result<()> {
    write_record(writer, record)?;
    thread::sleep(delay);
    Ok(())
}
