// SPDX-License-Identifier: MIT OR Apache-2.0
//! Tunable defaults, mirroring the original tool's module-level constants.

use std::time::Duration;

/// Bytes of raw data per chunk (CLI default).
pub const CHUNK_SIZE: usize = 150;

/// Retries per record (header, chunk, or DONE) before giving up.
pub const MAX_RETRIES: u32 = 5;

/// How long to wait for an ACK/NACK/OK before retrying.
pub const ACK_TIMEOUT: Duration = Duration::from_secs(10);

/// Courtesy delay after each emitted record, to respect the radio's duty
/// cycle. Not required for correctness.
pub const INTER_RECORD_DELAY: Duration = Duration::from_millis(100);

/// Upper bound on how long the reader thread sleeps between polls when
/// there is nothing to read.
pub const READER_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Where received files are written by default.
pub const RECEIVE_DIR: &str = "./lora_received";

/// Serial link bit rate.
pub const BAUD_RATE: u32 = 9600;

/// Tunable parameters for one [`crate::sender::SenderSession`] transfer.
#[derive(Debug, Clone, Copy)]
pub struct TransferConfig {
    pub chunk_size: usize,
    pub max_retries: u32,
    pub ack_timeout: Duration,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            max_retries: MAX_RETRIES,
            ack_timeout: ACK_TIMEOUT,
        }
    }
}
