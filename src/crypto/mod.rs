// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Envelope Cipher
//!
//! Client-side authenticated encryption of secret content.
//!
//! ## Format
//!
//! - **Key**: 256 random bits, base64url without padding (the JWK `k`
//!   member). It travels only in the share link's URL fragment.
//! - **Envelope**: standard base64 of `nonce (12) || ciphertext || tag (16)`
//!   under AES-256-GCM with a fresh random nonce per call.
//! - **Payload**: JSON with a `type` discriminator, see [`ContentPayload`].
//!
//! ## Security Note
//!
//! Decryption failures are reported through a single opaque
//! [`DecryptionError`]. Callers cannot tell a wrong key from tampered
//! ciphertext or a corrupt payload; only `debug` logs differ.

mod envelope;
mod key;
mod payload;

pub use envelope::{decrypt, encrypt, EncryptedEnvelope, NONCE_LEN, TAG_LEN};
pub use key::{generate_key, SymmetricKey, KEY_LEN};
pub use payload::{ContentKind, ContentPayload};

/// Errors raised while producing keys or envelopes.
#[derive(Debug, thiserror::Error)]
pub enum CipherError {
    #[error("secure random source unavailable")]
    Entropy,

    #[error("encryption failed")]
    Encryption,
}

/// The only error decryption ever reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("decryption failed")]
pub struct DecryptionError;
