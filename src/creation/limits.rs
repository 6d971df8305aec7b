// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Plan tiers and the content limits attached to them.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use tracing::debug;

const MIB: u64 = 1024 * 1024;

/// Subscription plan of the producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PlanTier {
    Anonymous,
    Explorer,
    Challenger,
    Dominator,
    #[default]
    Undefined,
}

impl PlanTier {
    pub const ALL: [PlanTier; 5] = [
        PlanTier::Anonymous,
        PlanTier::Explorer,
        PlanTier::Challenger,
        PlanTier::Dominator,
        PlanTier::Undefined,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anonymous => "ANONYMOUS",
            Self::Explorer => "EXPLORER",
            Self::Challenger => "CHALLENGER",
            Self::Dominator => "DOMINATOR",
            Self::Undefined => "UNDEFINED",
        }
    }

    /// Image uploads need a paid plan.
    pub fn allows_images(&self) -> bool {
        !matches!(self, Self::Anonymous | Self::Undefined)
    }

    fn default_char_limit(&self) -> u64 {
        match self {
            Self::Anonymous | Self::Undefined => 500,
            Self::Explorer => 750,
            Self::Challenger => 1000,
            Self::Dominator => 1500,
        }
    }

    fn default_file_size_limit(&self) -> u64 {
        match self {
            Self::Anonymous | Self::Undefined => MIB,
            Self::Explorer => MIB + MIB / 2,
            Self::Challenger => 2 * MIB,
            Self::Dominator => 5 * MIB,
        }
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|tier| tier.as_str() == wanted)
            .ok_or_else(|| format!("unknown plan tier: {s}"))
    }
}

/// Character and file size limits per plan tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanLimits {
    chars: HashMap<PlanTier, u64>,
    file_bytes: HashMap<PlanTier, u64>,
}

impl Default for PlanLimits {
    fn default() -> Self {
        Self {
            chars: PlanTier::ALL
                .into_iter()
                .map(|t| (t, t.default_char_limit()))
                .collect(),
            file_bytes: PlanTier::ALL
                .into_iter()
                .map(|t| (t, t.default_file_size_limit()))
                .collect(),
        }
    }
}

impl PlanLimits {
    /// Maximum number of characters in a text secret.
    pub fn char_limit(&self, tier: PlanTier) -> u64 {
        self.chars
            .get(&tier)
            .copied()
            .unwrap_or_else(|| tier.default_char_limit())
    }

    /// Maximum image size in bytes.
    pub fn file_size_limit(&self, tier: PlanTier) -> u64 {
        self.file_bytes
            .get(&tier)
            .copied()
            .unwrap_or_else(|| tier.default_file_size_limit())
    }

    /// Merge server-provided character limits. Unknown tiers and
    /// non-positive values are ignored.
    pub fn merge_char_limits(&mut self, overrides: &HashMap<String, f64>) {
        merge(&mut self.chars, overrides);
    }

    /// Merge server-provided file size limits (bytes).
    pub fn merge_file_size_limits(&mut self, overrides: &HashMap<String, f64>) {
        merge(&mut self.file_bytes, overrides);
    }
}

fn merge(target: &mut HashMap<PlanTier, u64>, overrides: &HashMap<String, f64>) {
    for (name, value) in overrides {
        let Ok(tier) = name.parse::<PlanTier>() else {
            debug!(tier = %name, "Ignoring limit for unknown plan tier");
            continue;
        };
        if value.is_finite() && *value >= 1.0 {
            target.insert(tier, value.floor() as u64);
        }
    }
}
