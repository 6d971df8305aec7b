// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! States, failure reasons and display signals of a retrieval session.

use std::fmt;

/// Message shown when an access attempt with a password is rejected.
pub const INCORRECT_PASSWORD_MESSAGE: &str = "Incorrect Password";

/// Where a retrieval session stands.
///
/// `Burned` and `Failed` are terminal; leaving them requires opening a new
/// link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrievalState {
    ParsingLink,
    Validating,
    /// Waiting for the consumer's password. `incorrect_password` is set
    /// when a previous attempt was rejected.
    PasswordRequired { incorrect_password: bool },
    Fetching,
    Decrypting,
    Viewing,
    Burned(BurnCause),
    Failed(FailureReason),
}

impl RetrievalState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Burned(_) | Self::Failed(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ParsingLink => "parsing_link",
            Self::Validating => "validating",
            Self::PasswordRequired { .. } => "password_required",
            Self::Fetching => "fetching",
            Self::Decrypting => "decrypting",
            Self::Viewing => "viewing",
            Self::Burned(_) => "burned",
            Self::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for RetrievalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(reason) => write!(f, "failed ({})", reason.code()),
            Self::Burned(cause) => write!(f, "burned ({cause:?})"),
            other => f.write_str(other.name()),
        }
    }
}

/// Why a session failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    InvalidLink,
    NotFound,
    Inactive,
    ViewsExhausted,
    AccessDenied,
    DecryptionFailed,
    /// Transport failure, server error or step timeout. Carries a
    /// diagnostic detail that is not meant for the consumer.
    NetworkError(String),
}

impl FailureReason {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidLink => "INVALID_LINK",
            Self::NotFound => "NOT_FOUND",
            Self::Inactive => "INACTIVE",
            Self::ViewsExhausted => "VIEWS_EXHAUSTED",
            Self::AccessDenied => "ACCESS_DENIED",
            Self::DecryptionFailed => "DECRYPTION_FAILED",
            Self::NetworkError(_) => "NETWORK_ERROR",
        }
    }

    /// Message suitable for the consumer.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidLink => {
                "Please enter a valid full URL (e.g., https://kieru.com/view/...#...)"
            }
            Self::NotFound => "Secret Invalid or Deleted",
            Self::Inactive => "This secret is no longer active.",
            Self::ViewsExhausted => "Max views exhausted. Unable to view.",
            Self::AccessDenied => "Access Denied",
            Self::DecryptionFailed => "Failed to decrypt secret. The key might be invalid.",
            Self::NetworkError(_) => "Network error. Please check your connection and try again.",
        }
    }
}

/// What ended a viewing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurnCause {
    TimerExpired,
    Manual,
}

impl BurnCause {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::TimerExpired => "This message has self-destructed and is no longer accessible.",
            Self::Manual => "This message has been burned and is no longer accessible.",
        }
    }
}

/// Attention-continuity signals reported by the viewing surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttentionSignal {
    FocusLost,
    FocusGained,
    /// Pointer or keyboard activity over the content.
    Activity,
    /// The consumer asked to see the content again.
    Reveal,
}

impl AttentionSignal {
    pub(crate) fn obscures(&self) -> bool {
        matches!(self, Self::FocusLost | Self::Activity)
    }
}
