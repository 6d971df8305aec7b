// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Symmetric key generation and URL-safe encoding.

use std::fmt;

use base64ct::{Base64UrlUnpadded, Encoding};
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

use super::CipherError;

/// Key length in bytes (AES-256).
pub const KEY_LEN: usize = 32;

/// A per-secret symmetric key held in its URL-safe encoding.
///
/// Keys arriving from a URL fragment are accepted verbatim; whether they
/// decode to a usable key is only discovered by [`super::decrypt`], which
/// reports a malformed key exactly like a failed authentication.
///
/// The encoded form is wiped from memory on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct SymmetricKey {
    encoded: Zeroizing<String>,
}

impl SymmetricKey {
    /// Wrap a key taken from a share link fragment.
    pub fn from_fragment(fragment: impl Into<String>) -> Self {
        Self {
            encoded: Zeroizing::new(fragment.into()),
        }
    }

    /// The URL-safe (base64url, unpadded) encoding placed in share links.
    pub fn as_url_safe(&self) -> &str {
        &self.encoded
    }

    /// Decode the raw key bytes. `None` if the encoding is malformed.
    pub(crate) fn raw_bytes(&self) -> Option<Zeroizing<[u8; KEY_LEN]>> {
        let mut out = Zeroizing::new([0u8; KEY_LEN]);
        let decoded_len = Base64UrlUnpadded::decode(self.encoded.trim().as_bytes(), &mut out[..])
            .ok()?
            .len();
        (decoded_len == KEY_LEN).then_some(out)
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(<redacted>)")
    }
}

/// Generate a fresh 256-bit key from the system CSPRNG.
///
/// Fails only when the entropy source is unavailable, which is fatal.
pub fn generate_key() -> Result<SymmetricKey, CipherError> {
    let rng = SystemRandom::new();
    let mut raw = Zeroizing::new([0u8; KEY_LEN]);
    rng.fill(&mut raw[..]).map_err(|_| CipherError::Entropy)?;

    Ok(SymmetricKey {
        encoded: Zeroizing::new(Base64UrlUnpadded::encode_string(&raw[..])),
    })
}
