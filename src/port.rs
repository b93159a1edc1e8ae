// SPDX-License-Identifier: MIT OR Apache-2.0
//! Opens the radio module's serial port and splits it into a
//! short-timeout reader half and a shareable writer half.
//!
//! This is the only module that touches the `serialport` crate directly;
//! everything else in the crate is generic over `std::io::Read + Write`
//! so the protocol core can be exercised against in-memory ports in
//! tests.

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 8N1, no flow control, matching the radio module's fixed UART framing.
pub fn open(path: &str, baud_rate: u32, read_timeout: Duration) -> io::Result<Box<dyn SerialPort>> {
    serialport::new(path, baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(read_timeout)
        .open()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
}

/// Splits one opened port into a reader half (owned by the single reader
/// thread) and a writer half (shared with any `SenderSession` and with
/// `ReceiverSession`'s ack replies).
pub fn split(
    port: Box<dyn SerialPort>,
) -> io::Result<(Box<dyn SerialPort>, Arc<Mutex<Box<dyn SerialPort>>>)> {
    let writer_half = port
        .try_clone()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    Ok((port, Arc::new(Mutex::new(writer_half))))
}
