// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared data model for an in-progress transfer: `TransferMetadata` and
//! `Chunk`, as named in the protocol's data model.

/// Metadata describing one file transfer, frozen for the transfer's
/// duration once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferMetadata {
    /// Basename of the file being transferred.
    pub name: String,
    pub total_chunks: u64,
    pub file_size: u64,
    /// Whole-file CRC16. Known up front on the sender side; learned from
    /// the peer's `DONE` record on the receiver side.
    pub file_crc: Option<u16>,
}

/// One `DATA`-carried slice of the file payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub seq: u32,
    pub payload: Vec<u8>,
    pub crc: u16,
}
