// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Logical request identity and query parameter normalisation.

use std::fmt;

use serde_json::Value;
use url::form_urlencoded;

/// Identity of "the same request" for deduplication.
///
/// Two calls collide only if request id, normalised URL and normalised
/// parameters all match.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct LogicalKey {
    request_id: String,
    url: String,
    params: String,
}

impl LogicalKey {
    pub fn new(
        request_id: impl Into<String>,
        url: impl Into<String>,
        params: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            url: url.into(),
            params: params.into(),
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }
}

// Query strings may carry passwords, so only the request id is printed.
impl fmt::Debug for LogicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogicalKey")
            .field("request_id", &self.request_id)
            .finish_non_exhaustive()
    }
}

/// Serialise request parameters into a stable query string.
///
/// Object entries are visited in key order. `null` values and blank strings
/// are skipped, strings are trimmed, numbers and booleans are stringified,
/// and nested arrays or objects are JSON-encoded unless empty. Anything that
/// is not an object serialises to the empty string.
pub fn serialize_query_params(params: Option<&Value>) -> String {
    let Some(Value::Object(map)) = params else {
        return String::new();
    };

    let mut entries: Vec<(&String, &Value)> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in entries {
        match value {
            Value::Null => {}
            Value::String(s) => {
                let trimmed = s.trim();
                if !trimmed.is_empty() {
                    serializer.append_pair(key, trimmed);
                }
            }
            Value::Number(n) => {
                serializer.append_pair(key, &n.to_string());
            }
            Value::Bool(b) => {
                serializer.append_pair(key, if *b { "true" } else { "false" });
            }
            Value::Array(items) if items.is_empty() => {}
            Value::Object(inner) if inner.is_empty() => {}
            nested => {
                serializer.append_pair(key, &nested.to_string());
            }
        }
    }
    serializer.finish()
}
