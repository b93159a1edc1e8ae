// SPDX-License-Identifier: MIT OR Apache-2.0
//! Outbound transfer state machine: chunking, the stop-and-wait retry
//! loop, timeout accounting, and abort emission.

use crate::ack::{AckRegistry, ActiveSender};
use crate::config::TransferConfig;
use crate::crc;
use crate::error::{Result, TransferError};
use crate::record::Record;
use crate::wire::write_record_with_delay;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use crossbeam_channel::Receiver;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Stages of an outbound transfer, matching the protocol's named state
/// machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderState {
    Idle,
    SendingHeader,
    SendingChunks(u32),
    SendingDone,
    Complete,
    Failed,
}

/// Why a single stop-and-wait exchange didn't succeed.
enum WaitOutcome {
    Ack,
    Nack,
    Timeout,
    Aborted,
}

/// Drives one outbound file transfer to completion or failure. At most
/// one `SenderSession` is active on a given port at a time: for the
/// duration of [`send`](SenderSession::send) its ack channel is
/// registered, and the dispatcher routes every `ACK`/`NACK`/`OK`/`ABORT`
/// record there instead of to the chat queue or a receiver.
pub struct SenderSession<W> {
    writer: Arc<Mutex<W>>,
    registry: AckRegistry,
    config: TransferConfig,
    state: SenderState,
    rx: Option<Receiver<Record>>,
}

impl<W: Write> SenderSession<W> {
    pub fn new(writer: Arc<Mutex<W>>, registry: AckRegistry, config: TransferConfig) -> Self {
        Self {
            writer,
            registry,
            config,
            state: SenderState::Idle,
            rx: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> SenderState {
        self.state
    }

    /// Sends `data` as a file named `name`. `name` should already be a
    /// basename; the sender does not re-derive it from a path.
    pub fn send(&mut self, name: &str, data: &[u8]) -> Result<()> {
        let file_crc = crc::checksum(data);
        let chunks: Vec<&[u8]> = if data.is_empty() {
            Vec::new()
        } else {
            data.chunks(self.config.chunk_size).collect()
        };
        let total_chunks = chunks.len() as u64;
        let file_size = data.len() as u64;

        let (tx, rx) = crossbeam_channel::bounded(8);
        let registry = self.registry.clone();
        let _active = ActiveSender::register(&registry, tx);
        self.rx = Some(rx);

        let result = self.run(name, total_chunks, file_size, &chunks, file_crc);
        self.rx = None;
        result
    }

    fn run(
        &mut self,
        name: &str,
        total_chunks: u64,
        file_size: u64,
        chunks: &[&[u8]],
        file_crc: u16,
    ) -> Result<()> {
        self.state = SenderState::SendingHeader;
        self.send_header(name, total_chunks, file_size)?;

        for (i, chunk) in chunks.iter().enumerate() {
            let seq = (i + 1) as u32;
            self.state = SenderState::SendingChunks(seq);
            self.send_chunk(seq, chunk)?;
        }

        self.state = SenderState::SendingDone;
        self.send_done(file_crc)?;

        self.state = SenderState::Complete;
        Ok(())
    }

    fn send_header(&mut self, name: &str, total_chunks: u64, file_size: u64) -> Result<()> {
        let record = Record::File {
            name: name.to_string(),
            total_chunks,
            file_size,
        };
        for attempt in 0..self.config.max_retries {
            match self.exchange(&record, 0)? {
                WaitOutcome::Ack => return Ok(()),
                WaitOutcome::Aborted => return Err(TransferError::Aborted),
                WaitOutcome::Nack | WaitOutcome::Timeout => {
                    log::warn!(
                        "no ACK for header, attempt {}/{}",
                        attempt + 1,
                        self.config.max_retries
                    );
                }
            }
        }
        self.state = SenderState::Failed;
        Err(TransferError::NoResponse)
    }

    fn send_chunk(&mut self, seq: u32, chunk: &[u8]) -> Result<()> {
        let record = Record::Data {
            seq,
            crc: crc::checksum(chunk),
            payload_b64: BASE64.encode(chunk),
        };
        for attempt in 0..self.config.max_retries {
            match self.exchange(&record, seq)? {
                WaitOutcome::Ack => return Ok(()),
                WaitOutcome::Aborted => return Err(TransferError::Aborted),
                WaitOutcome::Nack | WaitOutcome::Timeout => {
                    log::warn!(
                        "chunk {seq} retry {}/{}",
                        attempt + 1,
                        self.config.max_retries
                    );
                }
            }
        }
        self.state = SenderState::Failed;
        write_record_with_delay(&self.writer, &Record::Abort, crate::config::INTER_RECORD_DELAY)?;
        Err(TransferError::RetriesExhausted(self.config.max_retries))
    }

    fn send_done(&mut self, file_crc: u16) -> Result<()> {
        let record = Record::Done(file_crc);
        for attempt in 0..self.config.max_retries {
            write_record_with_delay(&self.writer, &record, crate::config::INTER_RECORD_DELAY)?;
            match self.wait_for(|r| matches!(r, Record::Ok | Record::Abort))? {
                Some(Record::Ok) => return Ok(()),
                Some(Record::Abort) => return Err(TransferError::Aborted),
                _ => {
                    log::warn!(
                        "waiting for OK, attempt {}/{}",
                        attempt + 1,
                        self.config.max_retries
                    );
                }
            }
        }
        self.state = SenderState::Failed;
        Err(TransferError::NoResponse)
    }

    /// Writes `record`, waits up to `ack_timeout` for the matching
    /// `ACK:<seq>`/`NACK:<seq>`, and classifies the result.
    fn exchange(&mut self, record: &Record, seq: u32) -> Result<WaitOutcome> {
        write_record_with_delay(&self.writer, record, crate::config::INTER_RECORD_DELAY)?;
        let result = self.wait_for(move |r| match r {
            Record::Ack(s) | Record::Nack(s) => *s == seq,
            Record::Abort => true,
            _ => false,
        })?;
        Ok(match result {
            Some(Record::Ack(_)) => WaitOutcome::Ack,
            Some(Record::Nack(_)) => WaitOutcome::Nack,
            Some(Record::Abort) => WaitOutcome::Aborted,
            _ => WaitOutcome::Timeout,
        })
    }

    /// Blocks until `accept` matches a received record or the deadline
    /// passes. A record that doesn't match `accept` (wrong sequence
    /// number, or a record kind unrelated to this wait) is discarded
    /// without resetting the remaining timeout budget.
    fn wait_for(&mut self, accept: impl Fn(&Record) -> bool) -> Result<Option<Record>> {
        let rx = self.rx.as_ref().expect("wait_for called outside send()");
        let deadline = Instant::now() + self.config.ack_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            match rx.recv_timeout(remaining) {
                Ok(record) if accept(&record) => return Ok(Some(record)),
                Ok(_unexpected) => continue,
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => return Ok(None),
                Err(crossbeam_channel::RecvTimeoutError::Disconnected) => return Ok(None),
            }
        }
    }
}
