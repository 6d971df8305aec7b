// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Request Coordinator
//!
//! Issues calls to the secret API, deduplicates concurrent calls sharing a
//! [`LogicalKey`], and supports cooperative cancellation.
//!
//! ## In-Flight Table
//!
//! The table maps each logical key to the ticket and cancellation token of
//! the call currently holding it. It is only touched inside short,
//! non-suspending critical sections (check-dedup, insert, remove); no lock
//! is held across an `.await`. Entries are removed by an RAII guard, so
//! completion, failure, cancellation and the caller dropping the future all
//! clean up. A superseded call never removes its successor's entry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use super::confirm::{ConfirmationPort, ConfirmationPrompt};
use super::credentials::CredentialStore;
use super::key::{serialize_query_params, LogicalKey};
use super::transport::{HttpMethod, HttpRequest, HttpTransport};

/// How to resolve a collision with a call already in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Cancel the running call and proceed without asking.
    Silent,
    /// Ask the [`ConfirmationPort`] first.
    #[default]
    Confirmed,
}

/// Errors surfaced by [`RequestCoordinator::execute`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    /// The call was cancelled or declined. Not an application error.
    #[error("request aborted")]
    Aborted,

    #[error("network error: {0}")]
    Network(String),

    #[error("API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("invalid request URL: {0}")]
    InvalidUrl(String),
}

impl RequestError {
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }

    /// HTTP status for [`RequestError::Status`].
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Description of one logical call.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub request_id: String,
    pub method: HttpMethod,
    /// Route relative to the coordinator's base URL, or an absolute URL.
    pub path: String,
    /// Query pairs that are part of the URL itself (for any method).
    pub query: Vec<(String, String)>,
    /// Query parameters for GET, JSON body for POST.
    pub params: Option<Value>,
    pub headers: Vec<(String, String)>,
    pub policy: DuplicatePolicy,
}

impl RequestSpec {
    pub fn get(request_id: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, request_id, path)
    }

    pub fn post(request_id: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, request_id, path)
    }

    fn new(method: HttpMethod, request_id: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            method,
            path: path.into(),
            query: Vec::new(),
            params: None,
            headers: Vec::new(),
            policy: DuplicatePolicy::default(),
        }
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Successful (2xx) response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, RequestError> {
        serde_json::from_slice(&self.body).map_err(|e| RequestError::Malformed(e.to_string()))
    }
}

struct InFlightEntry {
    ticket: u64,
    cancel: CancellationToken,
}

type InFlightTable = Mutex<HashMap<LogicalKey, InFlightEntry>>;

fn lock(table: &InFlightTable) -> MutexGuard<'_, HashMap<LogicalKey, InFlightEntry>> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

struct InFlightGuard<'a> {
    table: &'a InFlightTable,
    key: LogicalKey,
    ticket: u64,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut table = lock(self.table);
        if table
            .get(&self.key)
            .is_some_and(|entry| entry.ticket == self.ticket)
        {
            table.remove(&self.key);
        }
    }
}

/// Network call coordinator. Construct one per host (or per test) and share
/// it by `Arc`.
pub struct RequestCoordinator {
    base_url: Url,
    transport: Arc<dyn HttpTransport>,
    credentials: Arc<dyn CredentialStore>,
    confirmation: Arc<dyn ConfirmationPort>,
    in_flight: InFlightTable,
    next_ticket: AtomicU64,
}

impl RequestCoordinator {
    pub fn new(
        base_url: Url,
        transport: Arc<dyn HttpTransport>,
        credentials: Arc<dyn CredentialStore>,
        confirmation: Arc<dyn ConfirmationPort>,
    ) -> Self {
        Self {
            base_url,
            transport,
            credentials,
            confirmation,
            in_flight: Mutex::new(HashMap::new()),
            next_ticket: AtomicU64::new(1),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Number of calls currently in flight.
    pub fn in_flight_count(&self) -> usize {
        lock(&self.in_flight).len()
    }

    /// Cancel every in-flight call issued under `request_id`.
    ///
    /// Returns how many calls were signalled.
    pub fn cancel(&self, request_id: &str) -> usize {
        let mut table = lock(&self.in_flight);
        let keys: Vec<LogicalKey> = table
            .keys()
            .filter(|k| k.request_id() == request_id)
            .cloned()
            .collect();
        for key in &keys {
            if let Some(entry) = table.remove(key) {
                entry.cancel.cancel();
            }
        }
        keys.len()
    }

    /// Perform one call.
    ///
    /// A call cancelled by a duplicate, by [`RequestCoordinator::cancel`], or
    /// declined at confirmation resolves to [`RequestError::Aborted`].
    pub async fn execute(&self, spec: RequestSpec) -> Result<ApiResponse, RequestError> {
        let url = self.resolve_url(&spec.path, &spec.query)?;
        let params = serialize_query_params(spec.params.as_ref());
        let key = LogicalKey::new(spec.request_id.as_str(), url.as_str(), params.as_str());
        let request = self.build_request(&spec, url, &params)?;

        let (ticket, cancel) = self.register(&key, spec.policy).await?;
        let _guard = InFlightGuard {
            table: &self.in_flight,
            key,
            ticket,
        };

        debug!(
            request_id = %spec.request_id,
            method = spec.method.as_str(),
            path = %request.url.path(),
            "Dispatching request"
        );

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(request_id = %spec.request_id, "Request aborted");
                return Err(RequestError::Aborted);
            }
            result = self.transport.send(request) => result,
        };

        let response = result.map_err(|e| {
            warn!(request_id = %spec.request_id, error = %e, "Request failed");
            RequestError::Network(e.0)
        })?;

        if !response.is_success() {
            let body = String::from_utf8_lossy(&response.body).to_string();
            warn!(
                request_id = %spec.request_id,
                status = response.status,
                "API returned non-success status"
            );
            return Err(RequestError::Status {
                status: response.status,
                body,
            });
        }

        Ok(ApiResponse {
            status: response.status,
            body: response.body,
        })
    }

    /// Claim the logical key, resolving any collision per `policy`.
    async fn register(
        &self,
        key: &LogicalKey,
        policy: DuplicatePolicy,
    ) -> Result<(u64, CancellationToken), RequestError> {
        let mut approved: Option<u64> = None;

        loop {
            let pending = {
                let mut table = lock(&self.in_flight);
                let existing = table
                    .get(key)
                    .map(|entry| (entry.ticket, entry.cancel.clone()));

                match existing {
                    Some((ticket, _))
                        if policy == DuplicatePolicy::Confirmed && approved != Some(ticket) =>
                    {
                        ticket
                    }
                    existing => {
                        if let Some((superseded, cancel)) = existing {
                            cancel.cancel();
                            debug!(
                                request_id = %key.request_id(),
                                superseded,
                                "Cancelled duplicate in-flight request"
                            );
                        }
                        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
                        let cancel = CancellationToken::new();
                        table.insert(
                            key.clone(),
                            InFlightEntry {
                                ticket,
                                cancel: cancel.clone(),
                            },
                        );
                        return Ok((ticket, cancel));
                    }
                }
            };

            let proceed = match self
                .confirmation
                .confirm(&ConfirmationPrompt::duplicate_request())
                .await
            {
                Ok(answer) => answer,
                Err(e) => {
                    warn!(error = %e, "Duplicate confirmation failed, proceeding with request");
                    true
                }
            };

            if !proceed {
                info!(request_id = %key.request_id(), "Duplicate request declined");
                return Err(RequestError::Aborted);
            }
            approved = Some(pending);
        }
    }

    fn resolve_url(&self, path: &str, query: &[(String, String)]) -> Result<Url, RequestError> {
        let mut url = match Url::parse(path) {
            Ok(absolute) => absolute,
            Err(_) => {
                let base = self.base_url.as_str().trim_end_matches('/');
                let path = path.trim_start_matches('/');
                Url::parse(&format!("{base}/{path}"))
                    .map_err(|e| RequestError::InvalidUrl(e.to_string()))?
            }
        };
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in query {
                pairs.append_pair(name, value);
            }
        }
        Ok(url)
    }

    fn build_request(
        &self,
        spec: &RequestSpec,
        mut url: Url,
        params: &str,
    ) -> Result<HttpRequest, RequestError> {
        let mut headers = vec![("Content-Type".to_string(), "application/json".to_string())];
        headers.extend(spec.headers.iter().cloned());
        if let Some(token) = self.credentials.bearer_token() {
            headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        }

        let body = match spec.method {
            HttpMethod::Get => {
                if !params.is_empty() {
                    let combined = match url.query() {
                        Some(existing) if !existing.is_empty() => format!("{existing}&{params}"),
                        _ => params.to_string(),
                    };
                    url.set_query(Some(&combined));
                }
                None
            }
            HttpMethod::Post => match &spec.params {
                Some(value) => Some(
                    serde_json::to_vec(value)
                        .map_err(|e| RequestError::Malformed(e.to_string()))?,
                ),
                None => None,
            },
        };

        Ok(HttpRequest {
            method: spec.method,
            url,
            headers,
            body,
        })
    }
}
