// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use crate::config::ConfigError;
use crate::creation::CreationError;
use crate::crypto::{CipherError, DecryptionError};
use crate::models::ModelError;
use crate::request::{RequestError, TransportError};
use crate::retrieval::{FailureReason, LinkError};

/// Crate-level error aggregating every component error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error(transparent)]
    Decryption(#[from] DecryptionError),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Creation(#[from] CreationError),

    #[error("{}", .0.user_message())]
    Retrieval(FailureReason),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Cancellation or a declined duplicate confirmation.
    pub fn is_aborted(&self) -> bool {
        match self {
            Self::Request(e) => e.is_aborted(),
            Self::Creation(e) => e.is_aborted(),
            _ => false,
        }
    }
}

impl From<FailureReason> for Error {
    fn from(reason: FailureReason) -> Self {
        Self::Retrieval(reason)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
