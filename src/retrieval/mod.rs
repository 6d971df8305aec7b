// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Consumer-side secret retrieval: link parsing, the retrieval state
//! machine and countdown presentation.

mod countdown;
mod link;
mod session;
mod state;

pub use countdown::{Remaining, Urgency};
pub use link::{build_share_link, parse_link, LinkError, LinkInput, ParsedLink};
pub use session::{RetrievalSession, SessionConfig, SessionSnapshot, TickOutcome, DEFAULT_TICK};
pub use state::{
    AttentionSignal, BurnCause, FailureReason, RetrievalState, INCORRECT_PASSWORD_MESSAGE,
};
