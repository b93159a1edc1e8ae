// SPDX-License-Identifier: MIT OR Apache-2.0
//! Single-reader demultiplexing loop: reads bytes off the link, frames
//! them into records, and routes each one to whichever session (if any)
//! owns it.
//!
//! Routing follows a fixed priority order so that at most one
//! `SenderSession` and at most one `ReceiverSession` can ever be active at
//! once, and so a record meant for one never leaks into the other:
//!
//! 1. If a sender is active and the record is `ACK`/`NACK`/`OK`/`ABORT`,
//!    it goes to the sender's channel. This takes priority over anything
//!    else so a receiver can never steal a sender's acknowledgment.
//! 2. If the record is `FILE` and no receiver is currently mid-transfer,
//!    it starts a new `ReceiverSession`.
//! 3. If a receiver is mid-transfer and the record is
//!    `DATA`/`DONE`/`ABORT`, it goes to that receiver.
//! 4. Anything else (ordinary text, or a record nobody claims) is chat.

use crate::ack::{forward_if_active, is_active, AckRegistry};
use crate::codec::LineCodec;
use crate::receiver::ReceiverSession;
use crate::record::{self, Record};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// One inbound event the caller (a binary's main loop) reacts to.
#[derive(Debug, Clone)]
pub enum DispatchEvent {
    /// A chat line arrived (already decrypted if it was encrypted and a
    /// key was available; still `ENC:`-prefixed otherwise).
    Chat(String),
    /// A file was fully received and materialized at this path.
    FileReceived(PathBuf),
    /// An inbound transfer failed (missing chunks, bad whole-file CRC, or
    /// a peer abort).
    FileFailed(String),
}

/// Owns the receive-side framing and routing state for one serial link.
/// The sender side only ever touches [`AckRegistry`]; everything else
/// here is reached exclusively from the single reader thread.
pub struct ReceiveDispatcher<W> {
    writer: Arc<Mutex<W>>,
    registry: AckRegistry,
    codec: LineCodec,
    receiver: Option<ReceiverSession>,
    receive_dir: PathBuf,
}

impl<W: Write> ReceiveDispatcher<W> {
    #[must_use]
    pub fn new(writer: Arc<Mutex<W>>, registry: AckRegistry, receive_dir: impl Into<PathBuf>) -> Self {
        Self {
            writer,
            registry,
            codec: LineCodec::new(),
            receiver: None,
            receive_dir: receive_dir.into(),
        }
    }

    /// Feeds freshly read bytes through the line codec and dispatches
    /// every complete record found. Returns the events the caller should
    /// surface (chat lines, completed/failed transfers).
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<DispatchEvent> {
        let mut events = Vec::new();
        for line in self.codec.feed(bytes) {
            match record::parse(&line) {
                Ok(record) => {
                    if let Some(event) = self.dispatch(record) {
                        events.push(event);
                    }
                }
                Err(reason) => {
                    log::warn!("dropping malformed record {line:?}: {reason}");
                }
            }
        }
        events
    }

    fn dispatch(&mut self, record: Record) -> Option<DispatchEvent> {
        if is_ack_shaped(&record) && is_active(&self.registry) {
            forward_if_active(&self.registry, &record);
            return None;
        }

        match record {
            Record::File {
                name,
                total_chunks,
                file_size,
            } => {
                if self.receiver.is_some() {
                    log::warn!("FILE:{name} received while a transfer is already in progress, replacing it");
                }
                let mut session = ReceiverSession::new(self.receive_dir.clone());
                if let Err(e) = session.on_file(name, total_chunks, file_size, &self.writer) {
                    log::warn!("failed to start inbound transfer: {e}");
                    return None;
                }
                self.receiver = Some(session);
                None
            }
            Record::Data {
                seq,
                crc,
                payload_b64,
            } => {
                let Some(session) = self.receiver.as_mut() else {
                    log::warn!("DATA:{seq} with no active transfer, dropping");
                    return None;
                };
                if let Err(e) = session.on_data(seq, crc, &payload_b64, &self.writer) {
                    log::warn!("error handling DATA:{seq}: {e}");
                }
                None
            }
            Record::Done(file_crc) => {
                let Some(mut session) = self.receiver.take() else {
                    log::warn!("DONE with no active transfer, dropping");
                    return None;
                };
                match session.on_done(file_crc, &self.writer) {
                    Ok(path) => Some(DispatchEvent::FileReceived(path)),
                    Err(e) => Some(DispatchEvent::FileFailed(e.to_string())),
                }
            }
            Record::Abort => {
                if let Some(mut session) = self.receiver.take() {
                    session.on_abort();
                    Some(DispatchEvent::FileFailed("transfer aborted by peer".to_string()))
                } else {
                    None
                }
            }
            Record::Ack(_) | Record::Nack(_) | Record::Ok => {
                log::debug!("dropping {record:?}: no active sender to receive it");
                None
            }
            Record::Chat(text) => Some(DispatchEvent::Chat(text)),
        }
    }
}

fn is_ack_shaped(record: &Record) -> bool {
    matches!(
        record,
        Record::Ack(_) | Record::Nack(_) | Record::Ok | Record::Abort
    )
}

/// Blocks the calling thread reading from `port` and dispatching records
/// until `port.read` returns an error or `should_stop` reports true.
/// Intended to run on its own dedicated reader thread.
pub fn run_reader_loop<P, W>(
    port: &mut P,
    dispatcher: &mut ReceiveDispatcher<W>,
    should_stop: impl Fn() -> bool,
    mut on_event: impl FnMut(DispatchEvent),
) where
    P: Read,
    W: Write,
{
    let mut buf = [0u8; 4096];
    while !should_stop() {
        match port.read(&mut buf) {
            Ok(0) => std::thread::sleep(crate::config::READER_POLL_INTERVAL),
            Ok(n) => {
                for event in dispatcher.feed(&buf[..n]) {
                    on_event(event);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                std::thread::sleep(crate::config::READER_POLL_INTERVAL)
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(crate::config::READER_POLL_INTERVAL)
            }
            Err(e) => {
                log::error!("reader thread stopping after transport error: {e}");
                break;
            }
        }
    }
}
