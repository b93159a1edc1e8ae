// SPDX-License-Identifier: MIT OR Apache-2.0
//! The seven wire record kinds and the parser/serializer for them
//! (`FramePacker` in the protocol design).
//!
//! Parsing is total: every input line produces either a typed `Record` or
//! a `Err` reason string for a control-prefixed-but-malformed line. The
//! caller (the dispatcher) is responsible for logging and dropping those;
//! this module never silently reinterprets a malformed control record as
//! chat.

use crate::crc;

/// One newline-terminated protocol unit, already stripped of its `\r\n`
/// terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// `FILE:<filename>:<total_chunks>:<file_size>`
    File {
        name: String,
        total_chunks: u64,
        file_size: u64,
    },
    /// `DATA:<seq>:<crc16_hex>:<b64_payload>`
    Data { seq: u32, crc: u16, payload_b64: String },
    /// `ACK:<seq>`
    Ack(u32),
    /// `NACK:<seq>`
    Nack(u32),
    /// `DONE:<file_crc16_hex>`
    Done(u16),
    /// `OK`
    Ok,
    /// `ABORT`
    Abort,
    /// Anything that isn't one of the above: passed through verbatim.
    Chat(String),
}

impl Record {
    /// Serializes the record to its wire body (without the `\r\n`
    /// terminator).
    #[must_use]
    pub fn to_line(&self) -> String {
        match self {
            Record::File {
                name,
                total_chunks,
                file_size,
            } => format!("FILE:{name}:{total_chunks}:{file_size}"),
            Record::Data {
                seq,
                crc,
                payload_b64,
            } => format!("DATA:{seq}:{}:{payload_b64}", crc::to_hex(*crc)),
            Record::Ack(seq) => format!("ACK:{seq}"),
            Record::Nack(seq) => format!("NACK:{seq}"),
            Record::Done(crc) => format!("DONE:{}", crc::to_hex(*crc)),
            Record::Ok => "OK".to_string(),
            Record::Abort => "ABORT".to_string(),
            Record::Chat(text) => text.clone(),
        }
    }
}

/// Parses one decoded, trimmed line into a `Record`.
///
/// `Ok(Record::Chat(_))` covers anything that doesn't match a control
/// prefix. `Err(reason)` is returned only for lines that match a control
/// prefix but fail to parse as that kind; those must be dropped, never
/// treated as chat.
pub fn parse(line: &str) -> Result<Record, String> {
    if line == "OK" {
        return Ok(Record::Ok);
    }
    if line == "ABORT" {
        return Ok(Record::Abort);
    }
    if let Some(rest) = line.strip_prefix("FILE:") {
        return parse_file(rest);
    }
    if let Some(rest) = line.strip_prefix("DATA:") {
        return parse_data(rest);
    }
    if let Some(rest) = line.strip_prefix("ACK:") {
        return parse_seq(rest).map(Record::Ack);
    }
    if let Some(rest) = line.strip_prefix("NACK:") {
        return parse_seq(rest).map(Record::Nack);
    }
    if let Some(rest) = line.strip_prefix("DONE:") {
        return crc::from_hex(rest)
            .map(Record::Done)
            .ok_or_else(|| format!("DONE with non-hex crc: {rest}"));
    }
    Ok(Record::Chat(line.to_string()))
}

fn parse_seq(field: &str) -> Result<u32, String> {
    field
        .parse::<u32>()
        .map_err(|_| format!("non-numeric sequence number: {field}"))
}

fn parse_file(rest: &str) -> Result<Record, String> {
    // name may itself contain colons; total_chunks and file_size are the
    // trailing two decimal fields.
    let mut parts = rest.rsplitn(3, ':');
    let file_size = parts.next().ok_or("FILE missing file_size")?;
    let total_chunks = parts.next().ok_or("FILE missing total_chunks")?;
    let name = parts.next().ok_or("FILE missing filename")?;
    if parts.next().is_some() {
        return Err("FILE has too many fields".to_string());
    }
    let total_chunks = total_chunks
        .parse::<u64>()
        .map_err(|_| format!("FILE non-numeric total_chunks: {total_chunks}"))?;
    let file_size = file_size
        .parse::<u64>()
        .map_err(|_| format!("FILE non-numeric file_size: {file_size}"))?;
    Ok(Record::File {
        name: name.to_string(),
        total_chunks,
        file_size,
    })
}

fn parse_data(rest: &str) -> Result<Record, String> {
    let mut parts = rest.splitn(3, ':');
    let seq = parts.next().ok_or("DATA missing seq")?;
    let crc_hex = parts.next().ok_or("DATA missing crc")?;
    let payload_b64 = parts.next().ok_or("DATA missing payload")?;
    let seq = parse_seq(seq)?;
    let crc = crc::from_hex(crc_hex).ok_or_else(|| format!("DATA non-hex crc: {crc_hex}"))?;
    Ok(Record::Data {
        seq,
        crc,
        payload_b64: payload_b64.to_string(),
    })
}
