// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Producer input and its local validation.
//!
//! Limits checked here only spare the producer a round trip; the server
//! enforces its own.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use zeroize::Zeroizing;

use super::limits::{PlanLimits, PlanTier};
use super::CreationError;
use crate::crypto::{ContentKind, ContentPayload};

/// Maximum length of a secret's display name, in characters.
pub const MAX_NAME_CHARS: usize = 30;

/// Expiry must be at least this many seconds in the future.
pub const MIN_EXPIRY_LEAD_SECS: i64 = 60 * 60;

/// Content the producer wants to share.
pub enum DraftContent {
    Text(Zeroizing<String>),
    Image {
        bytes: Zeroizing<Vec<u8>>,
        filename: String,
        mime_type: String,
    },
}

impl DraftContent {
    pub fn text(body: impl Into<String>) -> Self {
        Self::Text(Zeroizing::new(body.into()))
    }

    pub fn image(bytes: Vec<u8>, filename: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self::Image {
            bytes: Zeroizing::new(bytes),
            filename: filename.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Load an image from disk, guessing its MIME type from the extension.
    pub fn image_from_path(path: &Path) -> Result<Self, CreationError> {
        let mime_type = guess_image_mime(path)
            .ok_or_else(|| CreationError::UnsupportedImage(path.display().to_string()))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let bytes = std::fs::read(path)?;
        Ok(Self::image(bytes, filename, mime_type))
    }

    pub fn kind(&self) -> ContentKind {
        match self {
            Self::Text(_) => ContentKind::Text,
            Self::Image { .. } => ContentKind::Image,
        }
    }
}

impl fmt::Debug for DraftContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(body) => write!(f, "Text({} chars)", body.chars().count()),
            Self::Image {
                bytes, mime_type, ..
            } => write!(f, "Image({mime_type}, {} bytes)", bytes.len()),
        }
    }
}

fn guess_image_mime(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        "svg" => Some("image/svg+xml"),
        _ => None,
    }
}

/// A named secret awaiting encryption.
#[derive(Debug)]
pub struct SecretDraft {
    pub name: String,
    pub content: DraftContent,
}

impl SecretDraft {
    pub fn new(name: impl Into<String>, content: DraftContent) -> Self {
        Self {
            name: name.into(),
            content,
        }
    }

    /// Check the draft against `plan`'s limits and build the payload to
    /// encrypt. Returns the trimmed name alongside it.
    pub fn validate(
        &self,
        plan: PlanTier,
        limits: &PlanLimits,
    ) -> Result<(String, ContentPayload), CreationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(CreationError::NameRequired);
        }
        if name.chars().count() > MAX_NAME_CHARS {
            return Err(CreationError::NameTooLong {
                max: MAX_NAME_CHARS,
            });
        }

        let payload = match &self.content {
            DraftContent::Text(body) => {
                if body.trim().is_empty() {
                    return Err(CreationError::EmptyContent);
                }
                let count = body.chars().count() as u64;
                let limit = limits.char_limit(plan);
                if count > limit {
                    return Err(CreationError::TooManyCharacters { count, limit });
                }
                ContentPayload::text(body.as_str())
            }
            DraftContent::Image {
                bytes,
                filename,
                mime_type,
            } => {
                if !plan.allows_images() {
                    return Err(CreationError::ImagesNotAllowed { plan });
                }
                if bytes.is_empty() {
                    return Err(CreationError::EmptyContent);
                }
                if !mime_type.starts_with("image/") {
                    return Err(CreationError::UnsupportedImage(mime_type.clone()));
                }
                let size = bytes.len() as u64;
                let limit = limits.file_size_limit(plan);
                if size > limit {
                    return Err(CreationError::FileTooLarge { size, limit });
                }
                ContentPayload::image(bytes, filename.as_str(), mime_type.as_str())
            }
        };

        Ok((name.to_string(), payload))
    }
}

/// Optional view settings sent with a new secret.
#[derive(Clone)]
pub struct CreationSettings {
    pub max_views: u32,
    pub password: Option<Zeroizing<String>>,
    pub expires_at: DateTime<Utc>,
    pub view_time_seconds: u32,
    pub show_time_bomb: bool,
}

impl Default for CreationSettings {
    fn default() -> Self {
        Self {
            max_views: 1,
            password: None,
            expires_at: Utc::now() + Duration::hours(24),
            view_time_seconds: 60,
            show_time_bomb: true,
        }
    }
}

impl fmt::Debug for CreationSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreationSettings")
            .field("max_views", &self.max_views)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .field("view_time_seconds", &self.view_time_seconds)
            .field("show_time_bomb", &self.show_time_bomb)
            .finish()
    }
}

impl CreationSettings {
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(Zeroizing::new(password.into()));
        self
    }

    /// Validate against `now`. Returns the password to send, with blank
    /// passwords treated as none.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<Option<String>, CreationError> {
        if self.max_views == 0 {
            return Err(CreationError::InvalidSettings(
                "max views must be at least 1".to_string(),
            ));
        }
        if self.view_time_seconds == 0 {
            return Err(CreationError::InvalidSettings(
                "view time must be at least 1 second".to_string(),
            ));
        }
        if self.expires_at < now + Duration::seconds(MIN_EXPIRY_LEAD_SECS) {
            return Err(CreationError::InvalidSettings(
                "expiry must be at least one hour in the future".to_string(),
            ));
        }
        Ok(self
            .password
            .as_ref()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(str::to_string))
    }
}
