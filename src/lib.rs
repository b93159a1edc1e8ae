// SPDX-License-Identifier: MIT OR Apache-2.0
//! A stop-and-wait file transfer and chat protocol for a LoRa serial
//! radio link.
//!
//! The protocol core (framing, CRC16, the sender and receiver state
//! machines, the dispatcher) is generic over `std::io::Read + Write` so
//! it can run against an in-memory loopback in tests as well as a real
//! `serialport` connection. [`port`] is the only module that touches the
//! `serialport` crate directly.
//!
//! Typical wiring for a binary:
//!
//! 1. Open a port with [`port::open`] and split it with [`port::split`].
//! 2. Build an [`ack::AckRegistry`] and a [`dispatcher::ReceiveDispatcher`]
//!    sharing the writer half and the registry.
//! 3. Run [`dispatcher::run_reader_loop`] on its own thread.
//! 4. Drive outbound transfers from the main thread with
//!    [`sender::SenderSession`], which shares the same writer half and
//!    registry.

#![deny(clippy::all)]

pub mod ack;
pub mod codec;
pub mod config;
pub mod crc;
pub mod crypto;
pub mod dispatcher;
pub mod error;
pub mod materialize;
pub mod mode;
pub mod port;
pub mod receiver;
pub mod record;
pub mod sender;
pub mod transfer;
pub mod wire;

pub use error::{Result, TransferError};
pub use receiver::ReceiverSession;
pub use sender::SenderSession;
