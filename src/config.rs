// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the client. Configuration is loaded from the environment at
//! startup; the binary lets command-line flags override individual values.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `KIERU_API_BASE_URL` | Base URL the secret endpoints are appended to | `http://localhost:8080/api` |
//! | `KIERU_APP_ORIGIN` | Origin used when building share links | `http://localhost:8080` |
//! | `KIERU_AUTH_TOKEN` | Bearer token for the ambient credential store | Optional |
//! | `KIERU_REQUEST_TIMEOUT_SECS` | Per-request transport timeout | `15` |
//! | `KIERU_CONFIRM_TIMEOUT_SECS` | Auto-reject timeout for duplicate confirmations | `60` |
//! | `KIERU_PLAN` | Plan tier used for local limit checks | `UNDEFINED` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::env;
use std::time::Duration;

use url::Url;

use crate::creation::PlanTier;

/// Environment variable name for the API base URL.
pub const API_BASE_URL_ENV: &str = "KIERU_API_BASE_URL";

/// Environment variable name for the origin used in share links.
pub const APP_ORIGIN_ENV: &str = "KIERU_APP_ORIGIN";

/// Environment variable name for the optional bearer token.
pub const AUTH_TOKEN_ENV: &str = "KIERU_AUTH_TOKEN";

/// Environment variable name for the per-request timeout in seconds.
pub const REQUEST_TIMEOUT_ENV: &str = "KIERU_REQUEST_TIMEOUT_SECS";

/// Environment variable name for the duplicate-request confirmation timeout.
pub const CONFIRM_TIMEOUT_ENV: &str = "KIERU_CONFIRM_TIMEOUT_SECS";

/// Environment variable name for the plan tier.
pub const PLAN_ENV: &str = "KIERU_PLAN";

/// Environment variable name for the log format.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api";
const DEFAULT_APP_ORIGIN: &str = "http://localhost:8080";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
const DEFAULT_CONFIRM_TIMEOUT_SECS: u64 = 60;

/// Configuration errors raised while reading the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} is not a valid URL: {reason}")]
    InvalidUrl { name: &'static str, reason: String },

    #[error("{name} must be a positive integer, got {value:?}")]
    InvalidNumber { name: &'static str, value: String },

    #[error("{name} has an unsupported value {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

/// Output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "pretty" | "" => Some(Self::Pretty),
            _ => None,
        }
    }
}

/// Relative routes of the secret endpoints, appended to the API base URL.
///
/// `{id}` in [`ApiRoutes::access`] is replaced with the secret id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRoutes {
    pub validate: String,
    pub access: String,
    pub create: String,
    pub char_limits: String,
    pub file_size_limits: String,
}

impl Default for ApiRoutes {
    fn default() -> Self {
        Self {
            validate: "/secrets/validate".to_string(),
            access: "/secrets/access/{id}".to_string(),
            create: "/secrets/create".to_string(),
            char_limits: "/assets/charLimits".to_string(),
            file_size_limits: "/assets/fileSizeLimits".to_string(),
        }
    }
}

impl ApiRoutes {
    /// Access route for a concrete secret id, percent-encoded as a single
    /// path segment. `None` for ids that cannot be one (empty, `.`, `..`).
    pub fn access_for(&self, secret_id: &str) -> Option<String> {
        if matches!(secret_id, "" | "." | "..") {
            return None;
        }
        let mut scratch = Url::parse("http://route.invalid/").ok()?;
        scratch.path_segments_mut().ok()?.clear().push(secret_id);
        let segment = scratch.path().trim_start_matches('/');
        Some(self.access.replace("{id}", segment))
    }
}

/// Complete client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base_url: Url,
    pub app_origin: Url,
    pub routes: ApiRoutes,
    pub auth_token: Option<String>,
    pub request_timeout: Duration,
    pub confirm_timeout: Duration,
    pub plan: PlanTier,
    pub log_format: LogFormat,
}

impl ClientConfig {
    /// Configuration with every value at its default.
    pub fn defaults() -> Result<Self, ConfigError> {
        Self::from_lookup(|_| None)
    }

    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary lookup function.
    ///
    /// Used by [`ClientConfig::from_env`] and by tests, which must not
    /// mutate the real process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let api_base_url = parse_url(
            API_BASE_URL_ENV,
            &get(API_BASE_URL_ENV).unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
        )?;
        let app_origin = parse_url(
            APP_ORIGIN_ENV,
            &get(APP_ORIGIN_ENV).unwrap_or_else(|| DEFAULT_APP_ORIGIN.to_string()),
        )?;
        let request_timeout = parse_secs(
            REQUEST_TIMEOUT_ENV,
            get(REQUEST_TIMEOUT_ENV),
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?;
        let confirm_timeout = parse_secs(
            CONFIRM_TIMEOUT_ENV,
            get(CONFIRM_TIMEOUT_ENV),
            DEFAULT_CONFIRM_TIMEOUT_SECS,
        )?;

        let plan = match get(PLAN_ENV) {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
                name: PLAN_ENV,
                value,
            })?,
            None => PlanTier::Undefined,
        };

        let log_format = match get(LOG_FORMAT_ENV) {
            Some(value) => LogFormat::parse(&value).ok_or(ConfigError::InvalidValue {
                name: LOG_FORMAT_ENV,
                value,
            })?,
            None => LogFormat::Pretty,
        };

        Ok(Self {
            api_base_url,
            app_origin,
            routes: ApiRoutes::default(),
            auth_token: get(AUTH_TOKEN_ENV).map(|t| t.trim().to_string()),
            request_timeout,
            confirm_timeout,
            plan,
            log_format,
        })
    }
}

/// Parse a URL setting, naming the offending variable on failure.
pub fn parse_url(name: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value.trim()).map_err(|e| ConfigError::InvalidUrl {
        name,
        reason: e.to_string(),
    })
}

fn parse_secs(
    name: &'static str,
    value: Option<String>,
    default: u64,
) -> Result<Duration, ConfigError> {
    match value {
        None => Ok(Duration::from_secs(default)),
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
            _ => Err(ConfigError::InvalidNumber { name, value: raw }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.api_base_url.as_str(), "http://localhost:8080/api");
        assert_eq!(config.app_origin.as_str(), "http://localhost:8080/");
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert_eq!(config.confirm_timeout, Duration::from_secs(60));
        assert_eq!(config.plan, PlanTier::Undefined);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.auth_token.is_none());
    }

    #[test]
    fn values_are_read_from_lookup() {
        let config = ClientConfig::from_lookup(lookup(&[
            (API_BASE_URL_ENV, "https://kieru.example/api"),
            (APP_ORIGIN_ENV, "https://kieru.example"),
            (AUTH_TOKEN_ENV, "  tok-123 "),
            (REQUEST_TIMEOUT_ENV, "30"),
            (PLAN_ENV, "explorer"),
            (LOG_FORMAT_ENV, "JSON"),
        ]))
        .unwrap();

        assert_eq!(config.api_base_url.host_str(), Some("kieru.example"));
        assert_eq!(config.auth_token.as_deref(), Some("tok-123"));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.plan, PlanTier::Explorer);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn blank_token_is_treated_as_unset() {
        let config = ClientConfig::from_lookup(lookup(&[(AUTH_TOKEN_ENV, "   ")])).unwrap();
        assert!(config.auth_token.is_none());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = ClientConfig::from_lookup(lookup(&[(API_BASE_URL_ENV, "not a url")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { name: API_BASE_URL_ENV, .. }));

        let err = ClientConfig::from_lookup(lookup(&[(REQUEST_TIMEOUT_ENV, "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { .. }));

        let err = ClientConfig::from_lookup(lookup(&[(LOG_FORMAT_ENV, "xml")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn access_route_substitutes_id() {
        let routes = ApiRoutes::default();
        assert_eq!(
            routes.access_for("abc123").as_deref(),
            Some("/secrets/access/abc123")
        );
    }

    #[test]
    fn access_route_keeps_id_in_one_segment() {
        let routes = ApiRoutes::default();
        assert_eq!(
            routes.access_for("abc/../../create").as_deref(),
            Some("/secrets/access/abc%2F..%2F..%2Fcreate")
        );
        assert_eq!(
            routes.access_for("x?y#z").as_deref(),
            Some("/secrets/access/x%3Fy%23z")
        );
        assert_eq!(routes.access_for(".."), None);
        assert_eq!(routes.access_for(""), None);
    }
}
