// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential sealing and secret redaction for the Causeway platform.
//!
//! Integration and BYO-LLM credentials are stored sealed with AES-256-GCM
//! under a process master key; decrypted material lives only inside the
//! provider registry and LLM gateway, for no longer than a single call.

pub mod crypto;
pub mod redact;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use causeway_core::CausewayError;

pub use crypto::{generate_random_key, open, seal};
pub use redact::{RedactingWriter, SecretValues, redact, register_secret};

/// Decode a base64-encoded 32-byte master key from configuration.
pub fn master_key_from_base64(encoded: &str) -> Result<[u8; 32], CausewayError> {
    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|e| CausewayError::Vault(format!("master key is not valid base64: {e}")))?;
    let key: [u8; 32] = bytes
        .try_into()
        .map_err(|_| CausewayError::Vault("master key must decode to exactly 32 bytes".into()))?;
    Ok(key)
}

/// Encode a master key for storage in configuration.
pub fn master_key_to_base64(key: &[u8; 32]) -> String {
    BASE64.encode(key)
}
