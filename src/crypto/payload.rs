// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Plaintext content carried inside an envelope.

use std::fmt;
use std::str::FromStr;

use base64ct::{Base64, Encoding};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// Decrypted (or to-be-encrypted) secret content.
///
/// Serialises to the JSON shape shared with the web client:
///
/// ```json
/// {"type":"text","data":"hello"}
/// {"type":"image","data":"data:image/png;base64,...","name":"a.png","mimeType":"image/png"}
/// ```
///
/// All string fields are zeroed when the payload is dropped.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentPayload {
    Text {
        #[serde(rename = "data")]
        body: String,
    },
    Image {
        /// Base64 image bytes, normally as a `data:<mime>;base64,` URL.
        #[serde(rename = "data")]
        bytes_base64: String,
        #[serde(rename = "name")]
        filename: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
}

impl ContentPayload {
    /// Text payload.
    pub fn text(body: impl Into<String>) -> Self {
        Self::Text { body: body.into() }
    }

    /// Image payload from raw bytes, encoded as a data URL.
    pub fn image(bytes: &[u8], filename: impl Into<String>, mime_type: impl Into<String>) -> Self {
        let mime_type = mime_type.into();
        Self::Image {
            bytes_base64: format!("data:{mime_type};base64,{}", Base64::encode_string(bytes)),
            filename: filename.into(),
            mime_type,
        }
    }

    /// Which kind of content this is.
    pub fn kind(&self) -> ContentKind {
        match self {
            Self::Text { .. } => ContentKind::Text,
            Self::Image { .. } => ContentKind::Image,
        }
    }

    /// Raw image bytes. Accepts a data URL or bare base64; `None` for text
    /// payloads or undecodable data.
    pub fn image_bytes(&self) -> Option<Vec<u8>> {
        match self {
            Self::Text { .. } => None,
            Self::Image { bytes_base64, .. } => {
                let encoded = match bytes_base64.split_once(";base64,") {
                    Some((prefix, rest)) if prefix.starts_with("data:") => rest,
                    _ => bytes_base64.as_str(),
                };
                Base64::decode_vec(encoded.trim()).ok()
            }
        }
    }
}

impl Zeroize for ContentPayload {
    fn zeroize(&mut self) {
        match self {
            Self::Text { body } => body.zeroize(),
            Self::Image {
                bytes_base64,
                filename,
                mime_type,
            } => {
                bytes_base64.zeroize();
                filename.zeroize();
                mime_type.zeroize();
            }
        }
    }
}

impl Drop for ContentPayload {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl fmt::Debug for ContentPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text { body } => f
                .debug_struct("Text")
                .field("chars", &body.chars().count())
                .finish(),
            Self::Image {
                filename,
                mime_type,
                ..
            } => f
                .debug_struct("Image")
                .field("filename", filename)
                .field("mime_type", mime_type)
                .finish_non_exhaustive(),
        }
    }
}

/// Content type label used on the wire (`TEXT` / `IMAGE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContentKind {
    Text,
    Image,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Image => "IMAGE",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TEXT" => Ok(Self::Text),
            "IMAGE" => Ok(Self::Image),
            other => Err(format!("unknown content type: {other}")),
        }
    }
}
