// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Share link format: `<origin>/view/<secretId>#<urlSafeKey>`.
//!
//! The fragment is read locally and never leaves the process.

use std::fmt;

use url::Url;

use crate::crypto::SymmetricKey;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    #[error("link is not a valid URL: {0}")]
    InvalidUrl(String),

    #[error("link is missing the secret id")]
    MissingSecretId,

    #[error("decryption key missing from link")]
    MissingKey,

    #[error("origin cannot carry a path: {0}")]
    InvalidOrigin(String),
}

/// How the consumer supplied the link.
#[derive(Clone)]
pub enum LinkInput {
    /// Link opened directly: id from the route, key from the fragment.
    Direct {
        secret_id: String,
        key_fragment: String,
    },
    /// Full URL pasted by hand.
    Pasted(String),
}

impl fmt::Debug for LinkInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct { secret_id, .. } => f
                .debug_struct("Direct")
                .field("secret_id", secret_id)
                .finish_non_exhaustive(),
            Self::Pasted(_) => f.write_str("Pasted(..)"),
        }
    }
}

/// Secret id and key extracted from a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLink {
    pub secret_id: String,
    pub key: SymmetricKey,
}

/// Extract the secret id and key. Key well-formedness is left to the
/// cipher, which reports a malformed key as a decryption failure.
pub fn parse_link(input: &LinkInput) -> Result<ParsedLink, LinkError> {
    let (secret_id, fragment) = match input {
        LinkInput::Direct {
            secret_id,
            key_fragment,
        } => (
            secret_id.trim().to_string(),
            key_fragment.trim().trim_start_matches('#').to_string(),
        ),
        LinkInput::Pasted(raw) => {
            let url = Url::parse(raw.trim()).map_err(|e| LinkError::InvalidUrl(e.to_string()))?;
            let last = url
                .path()
                .rsplit('/')
                .next()
                .unwrap_or_default()
                .to_string();
            (last, url.fragment().unwrap_or_default().to_string())
        }
    };

    if matches!(secret_id.as_str(), "" | "." | "..") {
        return Err(LinkError::MissingSecretId);
    }
    if fragment.is_empty() {
        return Err(LinkError::MissingKey);
    }

    Ok(ParsedLink {
        secret_id,
        key: SymmetricKey::from_fragment(fragment),
    })
}

/// Build the share link for `secret_id` under `origin`.
pub fn build_share_link(
    origin: &Url,
    secret_id: &str,
    key: &SymmetricKey,
) -> Result<Url, LinkError> {
    let mut url = origin.clone();
    url.set_query(None);
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| LinkError::InvalidOrigin(origin.to_string()))?;
        segments.pop_if_empty().push("view").push(secret_id);
    }
    url.set_fragment(Some(key.as_url_safe()));
    Ok(url)
}
