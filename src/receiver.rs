// SPDX-License-Identifier: MIT OR Apache-2.0
//! Inbound transfer state machine: chunk accumulation, per-chunk
//! integrity checking, completeness checking, and atomic materialization.

use crate::crc;
use crate::error::{Result, TransferError};
use crate::materialize;
use crate::record::Record;
use crate::transfer::{Chunk, TransferMetadata};
use crate::wire::write_record_with_delay;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Stages of an inbound transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    Idle,
    Receiving,
    Verifying,
    Done,
    Failed,
}

/// Drives one inbound file transfer. Owns the sparse chunk store between
/// the `FILE` header and the matching `DONE`. At most one
/// `ReceiverSession` is active on a given port at a time; the dispatcher
/// is responsible for enforcing that and for routing `FILE`/`DATA`/
/// `DONE`/`ABORT` records to it.
pub struct ReceiverSession {
    receive_dir: PathBuf,
    state: ReceiverState,
    metadata: Option<TransferMetadata>,
    chunks: BTreeMap<u32, Chunk>,
    next_expected: u32,
}

impl ReceiverSession {
    #[must_use]
    pub fn new(receive_dir: impl Into<PathBuf>) -> Self {
        Self {
            receive_dir: receive_dir.into(),
            state: ReceiverState::Idle,
            metadata: None,
            chunks: BTreeMap::new(),
            next_expected: 1,
        }
    }

    #[must_use]
    pub fn state(&self) -> ReceiverState {
        self.state
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self.state, ReceiverState::Idle)
    }

    /// Handles a `FILE` header: resets any prior (never-completed) state,
    /// records the claimed metadata, and acknowledges with `ACK:0`.
    pub fn on_file<W: Write>(
        &mut self,
        name: String,
        total_chunks: u64,
        file_size: u64,
        writer: &Arc<Mutex<W>>,
    ) -> Result<()> {
        self.metadata = Some(TransferMetadata {
            name,
            total_chunks,
            file_size,
            file_crc: None,
        });
        self.chunks.clear();
        self.next_expected = 1;
        self.state = ReceiverState::Receiving;
        write_record_with_delay(writer, &Record::Ack(0), crate::config::INTER_RECORD_DELAY)?;
        Ok(())
    }

    /// Handles a `DATA` record: decodes and verifies the chunk, stores it
    /// idempotently, and acks or nacks it. Decode/CRC failures are
    /// reported to the peer via `NACK` rather than surfaced as an `Err`.
    /// The session stays `Receiving` so the sender can retransmit.
    pub fn on_data<W: Write>(
        &mut self,
        seq: u32,
        crc: u16,
        payload_b64: &str,
        writer: &Arc<Mutex<W>>,
    ) -> Result<()> {
        if self.metadata.is_none() {
            log::warn!("DATA:{seq} received with no active transfer, dropping");
            return Ok(());
        }

        let payload = match BASE64.decode(payload_b64) {
            Ok(bytes) => bytes,
            Err(_) => {
                log::warn!("chunk {seq} failed base64 decode");
                write_record_with_delay(writer, &Record::Nack(seq), crate::config::INTER_RECORD_DELAY)?;
                return Ok(());
            }
        };

        let actual = crc::checksum(&payload);
        if actual != crc {
            log::warn!("chunk {seq} failed CRC check: expected {crc:04x}, got {actual:04x}");
            write_record_with_delay(writer, &Record::Nack(seq), crate::config::INTER_RECORD_DELAY)?;
            return Ok(());
        }

        self.chunks.entry(seq).or_insert(Chunk {
            seq,
            payload,
            crc,
        });
        if seq >= self.next_expected {
            self.next_expected = seq + 1;
        }
        write_record_with_delay(writer, &Record::Ack(seq), crate::config::INTER_RECORD_DELAY)?;
        Ok(())
    }

    /// Handles `DONE`: checks completeness, reassembles, verifies the
    /// whole-file CRC, and materializes the result. On success emits `OK`
    /// and returns the written path. On any failure emits `ABORT`,
    /// transitions to `Failed`, and returns an `Err`.
    pub fn on_done<W: Write>(&mut self, file_crc: u16, writer: &Arc<Mutex<W>>) -> Result<PathBuf> {
        let metadata = self.metadata.clone().ok_or_else(|| {
            TransferError::Framing("DONE received with no active transfer".to_string())
        })?;
        self.state = ReceiverState::Verifying;

        let received = self.chunks.len() as u64;
        if received != metadata.total_chunks {
            self.fail(writer)?;
            return Err(TransferError::Incomplete {
                received,
                expected: metadata.total_chunks,
            });
        }

        let mut data = Vec::with_capacity(metadata.file_size as usize);
        for (_, chunk) in self.chunks.iter() {
            data.extend_from_slice(&chunk.payload);
        }

        let actual = crc::checksum(&data);
        if actual != file_crc {
            self.fail(writer)?;
            return Err(TransferError::Integrity {
                expected: file_crc,
                actual,
            });
        }

        let path = materialize::materialize(&self.receive_dir, &metadata.name, &data)?;
        write_record_with_delay(writer, &Record::Ok, crate::config::INTER_RECORD_DELAY)?;
        self.state = ReceiverState::Done;
        Ok(path)
    }

    /// Handles a peer-initiated `ABORT`: discards in-progress state.
    pub fn on_abort(&mut self) {
        self.metadata = None;
        self.chunks.clear();
        self.state = ReceiverState::Failed;
    }

    fn fail<W: Write>(&mut self, writer: &Arc<Mutex<W>>) -> Result<()> {
        self.state = ReceiverState::Failed;
        write_record_with_delay(writer, &Record::Abort, crate::config::INTER_RECORD_DELAY)?;
        Ok(())
    }

    #[must_use]
    pub fn receive_dir(&self) -> &Path {
        &self.receive_dir
    }

    /// Lowest sequence number not yet seen, for diagnostics.
    #[must_use]
    pub fn next_expected(&self) -> u32 {
        self.next_expected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn written(writer: &Arc<Mutex<Vec<u8>>>) -> String {
        String::from_utf8(writer.lock().unwrap().clone()).unwrap()
    }

    #[test]
    fn happy_path_two_chunks() {
        let dir = tempdir().unwrap();
        let writer = Arc::new(Mutex::new(Vec::<u8>::new()));
        let mut session = ReceiverSession::new(dir.path());

        session
            .on_file("hello.txt".to_string(), 2, 8, &writer)
            .unwrap();
        assert_eq!(session.state(), ReceiverState::Receiving);

        let chunk1 = b"hell";
        let chunk2 = b"o!!!";
        session
            .on_data(1, crc::checksum(chunk1), &BASE64.encode(chunk1), &writer)
            .unwrap();
        session
            .on_data(2, crc::checksum(chunk2), &BASE64.encode(chunk2), &writer)
            .unwrap();

        let mut whole = Vec::new();
        whole.extend_from_slice(chunk1);
        whole.extend_from_slice(chunk2);
        let path = session.on_done(crc::checksum(&whole), &writer).unwrap();

        assert_eq!(session.state(), ReceiverState::Done);
        assert_eq!(std::fs::read(path).unwrap(), whole);
        let log = written(&writer);
        assert!(log.contains("ACK:0"));
        assert!(log.contains("ACK:1"));
        assert!(log.contains("ACK:2"));
        assert!(log.contains("OK"));
        assert!(!log.contains("NACK"));
    }

    #[test]
    fn duplicate_chunk_is_idempotent() {
        let dir = tempdir().unwrap();
        let writer = Arc::new(Mutex::new(Vec::<u8>::new()));
        let mut session = ReceiverSession::new(dir.path());
        session.on_file("a.bin".to_string(), 1, 4, &writer).unwrap();
        let chunk = b"abcd";
        session
            .on_data(1, crc::checksum(chunk), &BASE64.encode(chunk), &writer)
            .unwrap();
        session
            .on_data(1, crc::checksum(chunk), &BASE64.encode(chunk), &writer)
            .unwrap();
        assert_eq!(session.chunks.len(), 1);
        let path = session.on_done(crc::checksum(chunk), &writer).unwrap();
        assert_eq!(std::fs::read(path).unwrap(), chunk);
    }

    #[test]
    fn corrupt_chunk_is_nacked_and_not_stored() {
        let dir = tempdir().unwrap();
        let writer = Arc::new(Mutex::new(Vec::<u8>::new()));
        let mut session = ReceiverSession::new(dir.path());
        session.on_file("a.bin".to_string(), 1, 4, &writer).unwrap();
        let chunk = b"abcd";
        session
            .on_data(1, 0xdead, &BASE64.encode(chunk), &writer)
            .unwrap();
        assert!(session.chunks.is_empty());
        assert!(written(&writer).contains("NACK:1"));
    }

    #[test]
    fn missing_chunk_aborts_on_done() {
        let dir = tempdir().unwrap();
        let writer = Arc::new(Mutex::new(Vec::<u8>::new()));
        let mut session = ReceiverSession::new(dir.path());
        session.on_file("a.bin".to_string(), 2, 8, &writer).unwrap();
        let chunk = b"abcd";
        session
            .on_data(1, crc::checksum(chunk), &BASE64.encode(chunk), &writer)
            .unwrap();

        let err = session.on_done(0x0000, &writer).unwrap_err();
        assert!(matches!(
            err,
            TransferError::Incomplete {
                received: 1,
                expected: 2
            }
        ));
        assert_eq!(session.state(), ReceiverState::Failed);
        assert!(written(&writer).contains("ABORT"));
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[test]
    fn whole_file_crc_mismatch_aborts_and_writes_nothing() {
        let dir = tempdir().unwrap();
        let writer = Arc::new(Mutex::new(Vec::<u8>::new()));
        let mut session = ReceiverSession::new(dir.path());
        session.on_file("a.bin".to_string(), 1, 4, &writer).unwrap();
        let chunk = b"abcd";
        session
            .on_data(1, crc::checksum(chunk), &BASE64.encode(chunk), &writer)
            .unwrap();

        let err = session.on_done(0xffff, &writer).unwrap_err();
        assert!(matches!(err, TransferError::Integrity { .. }));
        assert_eq!(session.state(), ReceiverState::Failed);
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[test]
    fn filename_collision_gets_numeric_suffix() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("report.pdf"), b"existing").unwrap();
        let writer = Arc::new(Mutex::new(Vec::<u8>::new()));
        let mut session = ReceiverSession::new(dir.path());
        session
            .on_file("report.pdf".to_string(), 0, 0, &writer)
            .unwrap();
        let path = session.on_done(crc::checksum(b""), &writer).unwrap();
        assert_eq!(path, dir.path().join("report_1.pdf"));
    }

    #[test]
    fn empty_file_transfer_completes_with_zero_chunks() {
        let dir = tempdir().unwrap();
        let writer = Arc::new(Mutex::new(Vec::<u8>::new()));
        let mut session = ReceiverSession::new(dir.path());
        session
            .on_file("empty.bin".to_string(), 0, 0, &writer)
            .unwrap();
        let path = session.on_done(crc::checksum(b""), &writer).unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"");
    }

    #[test]
    fn abort_discards_in_progress_state() {
        let dir = tempdir().unwrap();
        let mut session = ReceiverSession::new(dir.path());
        let writer = Arc::new(Mutex::new(Vec::<u8>::new()));
        session.on_file("a.bin".to_string(), 1, 4, &writer).unwrap();
        session.on_abort();
        assert_eq!(session.state(), ReceiverState::Failed);
        assert!(session.metadata.is_none());
    }
}
