// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Presentation helpers for the per-view countdown.

use std::fmt;

/// How close the countdown is to burning the secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Urgency {
    Calm,
    Warning,
    Critical,
}

impl Urgency {
    pub fn for_remaining(seconds: u32) -> Self {
        match seconds {
            s if s > 120 => Self::Calm,
            s if s > 60 => Self::Warning,
            _ => Self::Critical,
        }
    }
}

/// Remaining view time, rendered as `H:MM:SS`, `M:SS` or `Ns`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Remaining(pub u32);

impl Remaining {
    pub fn urgency(&self) -> Urgency {
        Urgency::for_remaining(self.0)
    }
}

impl fmt::Display for Remaining {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let seconds = self.0;
        if seconds >= 3600 {
            write!(
                f,
                "{}:{:02}:{:02}",
                seconds / 3600,
                (seconds % 3600) / 60,
                seconds % 60
            )
        } else if seconds >= 60 {
            write!(f, "{}:{:02}", seconds / 60, seconds % 60)
        } else {
            write!(f, "{seconds}s")
        }
    }
}
