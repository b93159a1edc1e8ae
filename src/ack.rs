// SPDX-License-Identifier: MIT OR Apache-2.0
//! The bounded single-producer single-consumer channel an active
//! `SenderSession` uses to receive ACK/NACK/OK/ABORT records forwarded by
//! the `ReceiveDispatcher`.
//!
//! The dispatcher holds the sending half for exactly as long as a sender
//! is active; the sender owns the receiving half only for the duration of
//! its own call. Neither side keeps the other alive past one transfer.

use crate::record::Record;
use crossbeam_channel::Sender;
use std::sync::{Arc, Mutex};

/// Shared slot the dispatcher consults to decide whether a sender is
/// active and, if so, where to forward its ACK-shaped records.
pub type AckRegistry = Arc<Mutex<Option<Sender<Record>>>>;

#[must_use]
pub fn new_registry() -> AckRegistry {
    Arc::new(Mutex::new(None))
}

fn lock(registry: &AckRegistry) -> std::sync::MutexGuard<'_, Option<Sender<Record>>> {
    registry.lock().unwrap_or_else(|e| e.into_inner())
}

/// RAII guard that installs a sender's ack channel in the registry for as
/// long as it's held, and always clears it on drop (success, failure, or
/// panic unwind alike).
pub struct ActiveSender<'a> {
    registry: &'a AckRegistry,
}

impl<'a> ActiveSender<'a> {
    pub fn register(registry: &'a AckRegistry, tx: Sender<Record>) -> Self {
        *lock(registry) = Some(tx);
        Self { registry }
    }
}

impl Drop for ActiveSender<'_> {
    fn drop(&mut self) {
        *lock(self.registry) = None;
    }
}

/// Forwards `record` to the active sender's channel, if one is registered
/// and the record is ACK/NACK/OK/ABORT-shaped. Returns whether a sender
/// was active to receive it.
pub fn forward_if_active(registry: &AckRegistry, record: &Record) -> bool {
    let guard = lock(registry);
    match guard.as_ref() {
        Some(tx) => {
            // A full channel means the sender already moved on; drop
            // silently rather than block the single reader thread.
            let _ = tx.try_send(record.clone());
            true
        }
        None => false,
    }
}

#[must_use]
pub fn is_active(registry: &AckRegistry) -> bool {
    lock(registry).is_some()
}
