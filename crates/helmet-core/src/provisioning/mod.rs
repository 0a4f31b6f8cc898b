//! Provisioning payload decoding.
//!
//! New Wi-Fi credentials reach the device through a scanned code whose text
//! payload is a base64-wrapped AES-128-ECB ciphertext. The plaintext is a
//! compact JSON object `{"s": ssid, "p": password, "i": uri}` padded up to
//! the cipher block size with a fixed filler character.
//!
//! Pipeline: base64 decode → AES-128-ECB decrypt (no cipher padding; the
//! input must be a whole number of 16-byte blocks) → strip trailing filler →
//! parse JSON → [`ConnectionProfile`]. Any stage failure is reported as a
//! distinct error variant so the scan outcome can be surfaced to the wearer.

use aes::cipher::{generic_array::GenericArray, BlockDecrypt, KeyInit};
use aes::Aes128;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::domain::profile::ConnectionProfile;

/// Fixed symmetric key shared with the provisioning code generator.
const PAYLOAD_KEY: &[u8; 16] = b"mZq4t7w!z%C*F-Ja";

/// Filler character padding the plaintext to a whole block.
const PAYLOAD_PADDING: char = 'A';

/// Failure at any stage of the provisioning decode pipeline.
#[derive(Debug, Error)]
pub enum ProvisioningError {
    #[error("payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("ciphertext length {0} is not a multiple of the block size")]
    BlockAlignment(usize),
    #[error("decrypted payload is not valid UTF-8")]
    NotUtf8,
    #[error("decrypted payload is not the expected JSON object: {0}")]
    Json(#[from] serde_json::Error),
}

/// Plaintext JSON carried in a provisioning payload.
#[derive(Debug, Deserialize)]
struct PayloadFields {
    /// SSID.
    s: String,
    /// Passphrase.
    p: String,
    /// Server URI for this network.
    i: String,
}

/// Decodes a scanned payload into a connection profile.
pub fn decode_payload(payload: &str) -> Result<ConnectionProfile, ProvisioningError> {
    let ciphertext = BASE64.decode(payload.trim())?;
    if ciphertext.is_empty() || ciphertext.len() % 16 != 0 {
        return Err(ProvisioningError::BlockAlignment(ciphertext.len()));
    }

    let cipher = Aes128::new(GenericArray::from_slice(PAYLOAD_KEY));
    let mut plaintext = ciphertext;
    for block in plaintext.chunks_exact_mut(16) {
        cipher.decrypt_block(GenericArray::from_mut_slice(block));
    }

    let text = String::from_utf8(plaintext).map_err(|_| ProvisioningError::NotUtf8)?;
    let stripped = text.trim_end_matches(PAYLOAD_PADDING);
    debug!(len = stripped.len(), "decoded provisioning payload");

    let fields: PayloadFields = serde_json::from_str(stripped)?;
    Ok(ConnectionProfile::new(fields.s, fields.p, fields.i))
}
