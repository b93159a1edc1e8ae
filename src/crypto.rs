// SPDX-License-Identifier: MIT OR Apache-2.0
//! Opaque AES-256-GCM envelope for chat payloads.
//!
//! This is orthogonal to the file-transfer protocol: only chat records
//! ever pass through here. `DATA` chunks are always sent in plaintext (see
//! the design notes' open question on extending the envelope to file
//! payloads, left unimplemented on purpose).

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;
use std::fs;
use std::io;
use std::path::Path;

/// Prefix that identifies an encrypted chat record on the wire.
pub const PREFIX: &str = "ENC:";

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// A 256-bit pre-shared key.
pub type SharedKey = [u8; KEY_LEN];

/// Generates a fresh random 256-bit key.
#[must_use]
pub fn generate_key() -> SharedKey {
    let mut key = [0u8; KEY_LEN];
    rand::rngs::OsRng.fill_bytes(&mut key);
    key
}

/// Encrypts `plaintext` and returns `ENC:` followed by
/// `base64(nonce || ciphertext || tag)`.
#[must_use]
pub fn encrypt(plaintext: &str, key: &SharedKey) -> String {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    // Encryption with a fresh nonce is infallible for chat-sized plaintext.
    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .expect("AES-GCM encryption does not fail for bounded chat payloads");

    let mut envelope = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    envelope.extend_from_slice(&nonce_bytes);
    envelope.extend_from_slice(&ciphertext);

    format!("{PREFIX}{}", base64::encode(envelope))
}

/// Decrypts a `record` previously produced by [`encrypt`]. Returns `None`
/// if the record isn't prefixed with `ENC:`, isn't valid base64, is too
/// short to contain a nonce, or fails authentication (wrong key, tampered
/// ciphertext).
#[must_use]
pub fn decrypt(record: &str, key: &SharedKey) -> Option<String> {
    let body = record.strip_prefix(PREFIX)?;
    let envelope = base64::decode(body).ok()?;
    if envelope.len() < NONCE_LEN {
        return None;
    }
    let (nonce_bytes, ciphertext) = envelope.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Nonce::from_slice(nonce_bytes);
    let plaintext = cipher.decrypt(nonce, ciphertext).ok()?;
    String::from_utf8(plaintext).ok()
}

/// Exact-prefix test for whether `record` is an encrypted chat line.
#[must_use]
pub fn is_encrypted(record: &str) -> bool {
    record.starts_with(PREFIX)
}

/// Persists `key` as a single-line hex string with owner-only permissions
/// on POSIX targets.
pub fn save_key(path: &Path, key: &SharedKey) -> io::Result<()> {
    fs::write(path, hex::encode(key))?;
    set_owner_only(path)
}

/// Loads a key previously written by [`save_key`].
pub fn load_key(path: &Path) -> io::Result<Option<SharedKey>> {
    if !path.exists() {
        return Ok(None);
    }
    let text = fs::read_to_string(path)?;
    let bytes = hex::decode(text.trim())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let key: SharedKey = bytes
        .try_into()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "key file is not 32 bytes"))?;
    Ok(Some(key))
}

/// Loads the key at `path`, generating and persisting a new one if it
/// doesn't exist yet.
pub fn get_or_create_key(path: &Path) -> io::Result<SharedKey> {
    if let Some(key) = load_key(path)? {
        return Ok(key);
    }
    let key = generate_key();
    save_key(path, &key)?;
    Ok(key)
}

#[cfg(unix)]
fn set_owner_only(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn set_owner_only(_path: &Path) -> io::Result<()> {
    Ok(())
}

mod base64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;

    pub fn encode(data: impl AsRef<[u8]>) -> String {
        STANDARD.encode(data)
    }

    pub fn decode(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(data)
    }
}
