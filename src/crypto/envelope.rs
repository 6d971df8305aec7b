// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! AES-256-GCM sealing and opening of content payloads.

use std::fmt;

use base64ct::{Base64, Encoding};
use ring::aead::{self, Aad, LessSafeKey, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::{CipherError, ContentPayload, DecryptionError, SymmetricKey};

/// GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// Base64 transport encoding of `nonce || ciphertext || tag`.
///
/// Opaque to the server and to everything except [`decrypt`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncryptedEnvelope(String);

impl EncryptedEnvelope {
    /// Wrap an envelope received from the server.
    pub fn from_base64(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for EncryptedEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncryptedEnvelope({} bytes)", self.0.len())
    }
}

/// Serialise `payload` and seal it under `key` with a fresh random nonce.
pub fn encrypt(
    payload: &ContentPayload,
    key: &SymmetricKey,
) -> Result<EncryptedEnvelope, CipherError> {
    let raw_key = key.raw_bytes().ok_or(CipherError::Encryption)?;
    let sealing_key = LessSafeKey::new(
        UnboundKey::new(&aead::AES_256_GCM, &raw_key[..]).map_err(|_| CipherError::Encryption)?,
    );

    let mut nonce = [0u8; NONCE_LEN];
    SystemRandom::new()
        .fill(&mut nonce)
        .map_err(|_| CipherError::Entropy)?;

    let serialized = Zeroizing::new(
        serde_json::to_string(payload).map_err(|_| CipherError::Encryption)?,
    );
    let mut in_out = Zeroizing::new(Vec::with_capacity(serialized.len() + TAG_LEN));
    in_out.extend_from_slice(serialized.as_bytes());

    sealing_key
        .seal_in_place_append_tag(
            Nonce::assume_unique_for_key(nonce),
            Aad::empty(),
            &mut *in_out,
        )
        .map_err(|_| CipherError::Encryption)?;

    let mut combined = Vec::with_capacity(NONCE_LEN + in_out.len());
    combined.extend_from_slice(&nonce);
    combined.extend_from_slice(&in_out);

    Ok(EncryptedEnvelope(Base64::encode_string(&combined)))
}

/// Open `envelope` with `key` and parse the payload.
///
/// Malformed keys, failed authentication and undecodable plaintext all
/// produce the same [`DecryptionError`].
pub fn decrypt(
    envelope: &EncryptedEnvelope,
    key: &SymmetricKey,
) -> Result<ContentPayload, DecryptionError> {
    let Some(raw_key) = key.raw_bytes() else {
        tracing::debug!(reason = "malformed_key", "Envelope open rejected");
        return Err(DecryptionError);
    };

    let Ok(data) = Base64::decode_vec(envelope.0.trim()) else {
        tracing::debug!(reason = "malformed_envelope", "Envelope open rejected");
        return Err(DecryptionError);
    };
    if data.len() < NONCE_LEN + TAG_LEN {
        tracing::debug!(reason = "envelope_too_short", "Envelope open rejected");
        return Err(DecryptionError);
    }
    let (nonce, sealed) = data.split_at(NONCE_LEN);

    let opening_key = UnboundKey::new(&aead::AES_256_GCM, &raw_key[..])
        .map(LessSafeKey::new)
        .map_err(|_| DecryptionError)?;
    let nonce = Nonce::try_assume_unique_for_key(nonce).map_err(|_| DecryptionError)?;

    let mut buffer = Zeroizing::new(sealed.to_vec());
    let plaintext = match opening_key.open_in_place(nonce, Aad::empty(), &mut buffer[..]) {
        Ok(plaintext) => plaintext,
        Err(_) => {
            tracing::debug!(reason = "authentication_failed", "Envelope open rejected");
            return Err(DecryptionError);
        }
    };

    serde_json::from_slice(plaintext).map_err(|_| {
        tracing::debug!(reason = "invalid_payload", "Envelope open rejected");
        DecryptionError
    })
}
