// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Producer-side secret creation: plan limits, draft validation and the
//! encrypt-then-submit flow.

mod draft;
mod flow;
mod limits;

pub use draft::{CreationSettings, DraftContent, SecretDraft, MAX_NAME_CHARS, MIN_EXPIRY_LEAD_SECS};
pub use flow::SecretCreator;
pub use limits::{PlanLimits, PlanTier};

use crate::crypto::CipherError;
use crate::request::RequestError;
use crate::retrieval::LinkError;

/// Errors raised while creating a secret. Reported to the caller as-is;
/// nothing is retried.
#[derive(Debug, thiserror::Error)]
pub enum CreationError {
    #[error("Please name your secret.")]
    NameRequired,

    #[error("Secret name must be at most {max} characters.")]
    NameTooLong { max: usize },

    #[error("Please enter some content.")]
    EmptyContent,

    #[error("Text is {count} characters, the limit is {limit}.")]
    TooManyCharacters { count: u64, limit: u64 },

    #[error("Upgrade to EXPLORER plan to upload images (current plan: {plan}).")]
    ImagesNotAllowed { plan: PlanTier },

    #[error("File size too large ({size} bytes, max {limit} bytes).")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("Unsupported image: {0}")]
    UnsupportedImage(String),

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("failed to read image: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Link(#[from] LinkError),
}

impl CreationError {
    /// The submission was cancelled or declined at duplicate confirmation.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Request(e) if e.is_aborted())
    }
}
