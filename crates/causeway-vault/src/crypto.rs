// SPDX-FileCopyrightText: 2026 Causeway Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AES-256-GCM sealing for integration and BYO-LLM credential blobs.
//!
//! The nonce is drawn fresh from the system CSPRNG on every seal and stored
//! next to the ciphertext; a repeated nonce under the same key would break
//! GCM entirely.

use causeway_core::CausewayError;
use ring::aead::{AES_256_GCM, Aad, LessSafeKey, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};

/// GCM nonce width in bytes.
const NONCE_LEN: usize = 12;

fn vault_err(what: &str) -> CausewayError {
    CausewayError::Vault(what.to_string())
}

fn aead_key(key: &[u8; 32]) -> Result<LessSafeKey, CausewayError> {
    UnboundKey::new(&AES_256_GCM, key)
        .map(LessSafeKey::new)
        .map_err(|_| vault_err("failed to create AES-256-GCM key"))
}

/// Encrypt a credential payload, returning `(ciphertext_with_tag, nonce)`.
///
/// Both outputs must be persisted; [`open`] needs the nonce to decrypt.
pub fn seal(key: &[u8; 32], plaintext: &[u8]) -> Result<(Vec<u8>, [u8; NONCE_LEN]), CausewayError> {
    let sealing_key = aead_key(key)?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    SystemRandom::new()
        .fill(&mut nonce_bytes)
        .map_err(|_| vault_err("failed to generate random nonce"))?;

    let mut buffer = plaintext.to_vec();
    sealing_key
        .seal_in_place_append_tag(
            Nonce::assume_unique_for_key(nonce_bytes),
            Aad::empty(),
            &mut buffer,
        )
        .map_err(|_| vault_err("AES-256-GCM encryption failed"))?;

    Ok((buffer, nonce_bytes))
}

/// Decrypt a sealed credential payload.
///
/// `ciphertext` carries the 16-byte tag that [`seal`] appended; a wrong key
/// or any tampering fails authentication and yields an error.
pub fn open(
    key: &[u8; 32],
    nonce_bytes: &[u8; NONCE_LEN],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CausewayError> {
    let opening_key = aead_key(key)?;

    let mut buffer = ciphertext.to_vec();
    let plaintext = opening_key
        .open_in_place(
            Nonce::assume_unique_for_key(*nonce_bytes),
            Aad::empty(),
            &mut buffer,
        )
        .map_err(|_| vault_err("AES-256-GCM decryption failed -- wrong key or corrupted data"))?;

    Ok(plaintext.to_vec())
}

/// Generate a fresh 32-byte master key.
pub fn generate_random_key() -> Result<[u8; 32], CausewayError> {
    let mut key = [0u8; 32];
    SystemRandom::new()
        .fill(&mut key)
        .map_err(|_| vault_err("failed to generate random key"))?;
    Ok(key)
}
