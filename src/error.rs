// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error taxonomy shared by every session boundary.
//!
//! Sessions are the error boundary (see the propagation policy in the
//! protocol design notes): a session collapses to `Failed` and returns one
//! of these variants, while finer-grained causes are only logged.

use std::io;

/// Errors that can cross a session boundary.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// The serial transport failed (port closed, I/O error).
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    /// A control record could not be parsed.
    #[error("malformed record: {0}")]
    Framing(String),

    /// A CRC16 check failed.
    #[error("integrity check failed: expected {expected:04x}, got {actual:04x}")]
    Integrity { expected: u16, actual: u16 },

    /// The peer sent `ABORT`.
    #[error("transfer aborted by peer")]
    Aborted,

    /// `MAX_RETRIES` were exhausted without a successful exchange.
    #[error("retries exhausted after {0} attempts")]
    RetriesExhausted(u32),

    /// The peer never engaged (no response to the initial header).
    #[error("peer did not respond to transfer request")]
    NoResponse,

    /// `DONE` arrived but one or more chunk sequence numbers were never
    /// received.
    #[error("incomplete transfer: received {received} of {expected} chunks")]
    Incomplete { received: u64, expected: u64 },
}

pub type Result<T> = std::result::Result<T, TransferError>;
