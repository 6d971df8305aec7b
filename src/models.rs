// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Wire shapes of the secret API and the parse-and-validate step that turns
//! them into domain types. Responses are never handed to callers
//! half-populated: either every field the decision needs is present, or
//! parsing fails with a [`ModelError`]. Display-only metadata (`expiresAt`,
//! `type`) is read leniently and dropped when unreadable.
//!
//! ## Model Categories
//!
//! - **Validation**: `GET /secrets/validate?id=…` → [`ValidationOutcome`]
//! - **Access**: `POST /secrets/access/{id}` → [`AccessOutcome`]
//! - **Creation**: `POST /secrets/create` ← [`CreateSecretRequest`]
//! - **Assets**: plan-tier character and file size limits

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::crypto::{ContentKind, EncryptedEnvelope};

/// A response was structurally valid JSON but not a valid API answer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("response is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("invalid response from server")]
    Rejected,
}

// =============================================================================
// Validation
// =============================================================================

/// Raw body of the validation endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResponse {
    #[serde(default)]
    pub is_success: bool,
    pub is_active: Option<bool>,
    pub is_password_protected: Option<bool>,
    pub secret_name: Option<String>,
    pub views_left: Option<i64>,
    pub max_views: Option<i64>,
    pub expires_at: Option<Value>,
    pub view_time_seconds: Option<i64>,
    pub show_time_bomb: Option<bool>,
}

/// Access policy as declared by the server at validation time.
///
/// Read-only on the client and possibly stale by the time the secret is
/// fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretAccessPolicy {
    pub is_password_protected: bool,
    pub max_views: Option<u32>,
    pub views_left: u32,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub view_time_seconds: Option<u32>,
    pub show_time_bomb: bool,
    pub secret_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    NotFound,
    /// The server reports the secret as no longer active. No other policy
    /// field is required in this case.
    Inactive { secret_name: Option<String> },
    Policy(SecretAccessPolicy),
}

impl ValidationResponse {
    pub fn into_outcome(self) -> Result<ValidationOutcome, ModelError> {
        if !self.is_success {
            return Ok(ValidationOutcome::NotFound);
        }

        let is_active = self.is_active.ok_or(ModelError::MissingField("isActive"))?;
        let secret_name = self.secret_name.filter(|n| !n.trim().is_empty());
        if !is_active {
            return Ok(ValidationOutcome::Inactive { secret_name });
        }

        let is_password_protected = self
            .is_password_protected
            .ok_or(ModelError::MissingField("isPasswordProtected"))?;
        let views_left = self.views_left.ok_or(ModelError::MissingField("viewsLeft"))?;

        Ok(ValidationOutcome::Policy(SecretAccessPolicy {
            is_password_protected,
            max_views: self.max_views.map(clamp_u32),
            views_left: clamp_u32(views_left),
            is_active,
            expires_at: self
                .expires_at
                .as_ref()
                .and_then(|v| parse_timestamp("expiresAt", v)),
            view_time_seconds: positive_u32(self.view_time_seconds),
            show_time_bomb: self.show_time_bomb.unwrap_or(false),
            secret_name,
        }))
    }
}

// =============================================================================
// Access
// =============================================================================

/// Raw body of the access endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessResponse {
    #[serde(default)]
    pub is_success: bool,
    pub content: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub show_time_bomb: Option<bool>,
    pub view_time_seconds: Option<i64>,
    pub expires_at: Option<Value>,
}

/// Ciphertext and view-session metadata for one granted view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGrant {
    pub envelope: EncryptedEnvelope,
    pub kind: Option<ContentKind>,
    pub show_time_bomb: bool,
    pub view_time_seconds: Option<u32>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessOutcome {
    Granted(AccessGrant),
    Rejected,
}

impl AccessResponse {
    /// A successful response with content is always a grant: the server has
    /// already spent the view, so unreadable metadata never voids it.
    pub fn into_outcome(self) -> AccessOutcome {
        let content = match self.content {
            Some(content) if self.is_success && !content.trim().is_empty() => content,
            _ => return AccessOutcome::Rejected,
        };

        let kind = self.kind.and_then(|raw| match raw.parse::<ContentKind>() {
            Ok(kind) => Some(kind),
            Err(_) => {
                debug!(kind = %raw, "Ignoring unknown content type");
                None
            }
        });

        AccessOutcome::Granted(AccessGrant {
            envelope: EncryptedEnvelope::from_base64(content),
            kind,
            show_time_bomb: self.show_time_bomb.unwrap_or(false),
            view_time_seconds: positive_u32(self.view_time_seconds),
            expires_at: self
                .expires_at
                .as_ref()
                .and_then(|v| parse_timestamp("expiresAt", v)),
        })
    }
}

// =============================================================================
// Creation
// =============================================================================

/// Body of the creation endpoint. Optional settings are omitted when unset.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSecretRequest {
    pub encrypted_payload: EncryptedEnvelope,
    pub secret_name: String,
    #[serde(rename = "type")]
    pub kind: ContentKind,
    /// Epoch milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_views: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_time_seconds: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_time_bomb: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSecretResponse {
    #[serde(default)]
    pub is_success: bool,
    pub secret_id: Option<String>,
}

impl CreateSecretResponse {
    pub fn into_secret_id(self) -> Result<String, ModelError> {
        match self.secret_id {
            Some(id) if self.is_success && !id.trim().is_empty() => Ok(id),
            _ => Err(ModelError::Rejected),
        }
    }
}

// =============================================================================
// Assets
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharLimitsResponse {
    #[serde(default)]
    pub char_limits: HashMap<String, f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSizeLimitsResponse {
    #[serde(default)]
    pub file_limit: HashMap<String, f64>,
}

// =============================================================================
// Helpers
// =============================================================================

fn clamp_u32(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

fn positive_u32(value: Option<i64>) -> Option<u32> {
    value.filter(|v| *v > 0).map(clamp_u32)
}

/// Timestamps arrive as epoch milliseconds (integer or float), RFC 3339, or
/// an ISO date-time without offset, which is read as UTC. Anything else is
/// logged and dropped.
fn parse_timestamp(field: &'static str, value: &Value) -> Option<DateTime<Utc>> {
    let parsed = match value {
        Value::Null => return None,
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
            .and_then(DateTime::from_timestamp_millis),
        Value::String(s) => parse_timestamp_str(s.trim()),
        _ => None,
    };
    if parsed.is_none() {
        debug!(field, value = %value, "Ignoring unreadable timestamp");
    }
    parsed
}

fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = s.parse::<NaiveDateTime>() {
        return Some(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    s.parse::<i64>().ok().and_then(DateTime::from_timestamp_millis)
}
