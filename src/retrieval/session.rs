// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Retrieval Session
//!
//! Drives the consumer side of the protocol for one link:
//!
//! ```text
//! ParsingLink → Validating ─┬─► PasswordRequired ◄──┐
//!                           │         │             │ rejected with password
//!                           └─► Fetching ◄──────────┘
//!                                   │
//!                              Decrypting → Viewing → Burned
//! ```
//!
//! Any non-terminal state may fall into `Failed(reason)`.
//!
//! ## Concurrency
//!
//! Session data sits behind a `std` mutex that is only taken for short,
//! non-suspending sections. Every network step remembers the epoch it was
//! started in; [`RetrievalSession::open`] and [`RetrievalSession::close`]
//! bump the epoch, so a response that arrives for an older epoch is
//! discarded instead of applied. Countdown expiry and manual burn both go
//! through the same check-and-set on `Viewing`, so exactly one of them
//! wins.
//!
//! ## Secrets in Memory
//!
//! The key, password and plaintext are wiped whenever the
//! session reaches a terminal state or is closed. The key is never passed
//! to the API client.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

use super::countdown::Remaining;
use super::link::{parse_link, LinkInput};
use super::state::{
    AttentionSignal, BurnCause, FailureReason, RetrievalState, INCORRECT_PASSWORD_MESSAGE,
};
use crate::client::{SecretApi, ACCESS_REQUEST_ID, VALIDATE_REQUEST_ID};
use crate::crypto::{decrypt, ContentKind, ContentPayload, SymmetricKey};
use crate::models::{AccessOutcome, ValidationOutcome};
use crate::request::RequestError;

/// Default countdown resolution.
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// Tunables for a [`RetrievalSession`].
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Upper bound on a single validate or access call. `None` waits for the
    /// transport's own timeout.
    pub step_timeout: Option<Duration>,
    /// Interval between countdown ticks.
    pub tick: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            step_timeout: None,
            tick: DEFAULT_TICK,
        }
    }
}

/// Result of one countdown tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not viewing, or viewing without a countdown.
    Idle,
    Remaining(u32),
    /// This tick burned the secret.
    Burned,
}

/// Read-only view of a session for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: RetrievalState,
    pub secret_id: Option<String>,
    pub secret_name: Option<String>,
    pub kind: Option<ContentKind>,
    pub remaining: Option<Remaining>,
    pub show_time_bomb: bool,
    pub expires_at: Option<DateTime<Utc>>,
    /// The viewing surface should blur the content.
    pub obscured: bool,
}

impl SessionSnapshot {
    /// Message to show for the current state, if any.
    pub fn message(&self) -> Option<&'static str> {
        match &self.state {
            RetrievalState::PasswordRequired {
                incorrect_password: true,
            } => Some(INCORRECT_PASSWORD_MESSAGE),
            RetrievalState::Failed(reason) => Some(reason.user_message()),
            RetrievalState::Burned(cause) => Some(cause.user_message()),
            _ => None,
        }
    }
}

#[derive(Default)]
struct Inner {
    epoch: u64,
    state: Option<RetrievalState>,
    secret_id: Option<String>,
    secret_name: Option<String>,
    key: Option<SymmetricKey>,
    password: Option<Zeroizing<String>>,
    payload: Option<ContentPayload>,
    kind: Option<ContentKind>,
    show_time_bomb: bool,
    expires_at: Option<DateTime<Utc>>,
    remaining: Option<u32>,
    obscured: bool,
}

impl Inner {
    fn state(&self) -> RetrievalState {
        self.state.clone().unwrap_or(RetrievalState::ParsingLink)
    }

    fn transition(&mut self, session: &str, to: RetrievalState) {
        debug!(
            session = %session,
            secret_id = ?self.secret_id,
            from = %self.state(),
            to = %to,
            "Retrieval transition"
        );
        if to.is_terminal() {
            self.wipe();
        }
        self.state = Some(to);
    }

    fn fail(&mut self, session: &str, reason: FailureReason) {
        warn!(
            session = %session,
            secret_id = ?self.secret_id,
            reason = reason.code(),
            "Retrieval failed"
        );
        self.transition(session, RetrievalState::Failed(reason));
    }

    fn wipe(&mut self) {
        self.key = None;
        self.password = None;
        self.payload = None;
        self.remaining = None;
        self.obscured = false;
    }

    fn reset(&mut self) {
        self.epoch += 1;
        self.wipe();
        self.state = None;
        self.secret_id = None;
        self.secret_name = None;
        self.kind = None;
        self.show_time_bomb = false;
        self.expires_at = None;
    }
}

/// One consumer's attempt to view one secret.
pub struct RetrievalSession {
    id: String,
    api: SecretApi,
    config: SessionConfig,
    inner: Mutex<Inner>,
}

impl RetrievalSession {
    pub fn new(api: SecretApi) -> Self {
        Self::with_config(api, SessionConfig::default())
    }

    pub fn with_config(api: SecretApi, config: SessionConfig) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            api,
            config,
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn validate_request_id(&self) -> String {
        format!("{VALIDATE_REQUEST_ID}:{}", self.id)
    }

    fn access_request_id(&self) -> String {
        format!("{ACCESS_REQUEST_ID}:{}", self.id)
    }

    pub fn state(&self) -> RetrievalState {
        self.lock().state()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.lock();
        SessionSnapshot {
            state: inner.state(),
            secret_id: inner.secret_id.clone(),
            secret_name: inner.secret_name.clone(),
            kind: inner.kind,
            remaining: inner.remaining.map(Remaining),
            show_time_bomb: inner.show_time_bomb,
            expires_at: inner.expires_at,
            obscured: inner.obscured,
        }
    }

    /// Run `f` over the decrypted content. `None` unless viewing.
    pub fn view<R>(&self, f: impl FnOnce(&ContentPayload) -> R) -> Option<R> {
        let inner = self.lock();
        match (&inner.state(), &inner.payload) {
            (RetrievalState::Viewing, Some(payload)) => Some(f(payload)),
            _ => None,
        }
    }

    /// Start over with a new link and drive the session as far as it goes
    /// without consumer input.
    ///
    /// Returns the state reached: `Viewing`, `PasswordRequired` or a
    /// terminal state. If the session was restarted or closed meanwhile,
    /// returns whatever state the newer attempt is in.
    pub async fn open(&self, input: LinkInput) -> RetrievalState {
        let epoch = {
            let mut inner = self.lock();
            inner.reset();
            inner.transition(&self.id, RetrievalState::ParsingLink);
            match parse_link(&input) {
                Ok(parsed) => {
                    info!(session = %self.id, secret_id = %parsed.secret_id, "Opening secret");
                    inner.secret_id = Some(parsed.secret_id);
                    inner.key = Some(parsed.key);
                    inner.transition(&self.id, RetrievalState::Validating);
                    inner.epoch
                }
                Err(e) => {
                    debug!(session = %self.id, error = %e, "Link rejected");
                    inner.fail(&self.id, FailureReason::InvalidLink);
                    return inner.state();
                }
            }
        };

        let Some(secret_id) = self.secret_id_for(epoch) else {
            return self.state();
        };
        let result = self
            .step(self.api.validate(&self.validate_request_id(), &secret_id))
            .await;

        let proceed = {
            let mut inner = self.lock();
            if !self.is_current(&inner, epoch, &RetrievalState::Validating) {
                return inner.state();
            }
            match result {
                Err(e) if e.is_aborted() => return inner.state(),
                Err(e) => {
                    inner.fail(&self.id, FailureReason::NetworkError(e.to_string()));
                    false
                }
                Ok(ValidationOutcome::NotFound) => {
                    inner.fail(&self.id, FailureReason::NotFound);
                    false
                }
                Ok(ValidationOutcome::Inactive { .. }) => {
                    inner.fail(&self.id, FailureReason::Inactive);
                    false
                }
                Ok(ValidationOutcome::Policy(policy)) => {
                    inner.secret_name = policy.secret_name.clone();
                    if !policy.is_active {
                        inner.fail(&self.id, FailureReason::Inactive);
                        false
                    } else if policy.views_left == 0 {
                        inner.fail(&self.id, FailureReason::ViewsExhausted);
                        false
                    } else if policy.is_password_protected {
                        inner.transition(
                            &self.id,
                            RetrievalState::PasswordRequired {
                                incorrect_password: false,
                            },
                        );
                        false
                    } else {
                        inner.transition(&self.id, RetrievalState::Fetching);
                        true
                    }
                }
            }
        };

        if proceed {
            self.fetch(epoch).await
        } else {
            self.state()
        }
    }

    /// Try `password`. Only meaningful in `PasswordRequired`; otherwise the
    /// current state is returned unchanged. Blank passwords are ignored.
    pub async fn submit_password(&self, password: impl Into<String>) -> RetrievalState {
        let password = Zeroizing::new(password.into());
        let epoch = {
            let mut inner = self.lock();
            if !matches!(inner.state(), RetrievalState::PasswordRequired { .. })
                || password.trim().is_empty()
            {
                return inner.state();
            }
            inner.password = Some(password);
            inner.transition(&self.id, RetrievalState::Fetching);
            inner.epoch
        };
        self.fetch(epoch).await
    }

    async fn fetch(&self, epoch: u64) -> RetrievalState {
        let (secret_id, password) = {
            let inner = self.lock();
            if !self.is_current(&inner, epoch, &RetrievalState::Fetching) {
                return inner.state();
            }
            match &inner.secret_id {
                Some(id) => (id.clone(), inner.password.clone()),
                None => return inner.state(),
            }
        };

        let result = self
            .step(self.api.access(
                &self.access_request_id(),
                &secret_id,
                password.as_ref().map(|p| p.as_str()),
            ))
            .await;

        let mut inner = self.lock();
        if !self.is_current(&inner, epoch, &RetrievalState::Fetching) {
            return inner.state();
        }
        match result {
            Err(e) if e.is_aborted() => {}
            Err(e) => inner.fail(&self.id, FailureReason::NetworkError(e.to_string())),
            Ok(AccessOutcome::Rejected) if password.is_some() => {
                info!(session = %self.id, secret_id = %secret_id, "Password rejected");
                inner.password = None;
                inner.transition(
                    &self.id,
                    RetrievalState::PasswordRequired {
                        incorrect_password: true,
                    },
                );
            }
            Ok(AccessOutcome::Rejected) => inner.fail(&self.id, FailureReason::AccessDenied),
            Ok(AccessOutcome::Granted(grant)) => {
                inner.password = None;
                inner.kind = grant.kind;
                inner.show_time_bomb = grant.show_time_bomb;
                inner.expires_at = grant.expires_at;
                inner.transition(&self.id, RetrievalState::Decrypting);

                let decrypted = match &inner.key {
                    Some(key) => decrypt(&grant.envelope, key).ok(),
                    None => None,
                };
                match decrypted {
                    Some(payload) => {
                        inner.kind = Some(payload.kind());
                        inner.payload = Some(payload);
                        inner.remaining = grant.view_time_seconds;
                        inner.obscured = false;
                        inner.transition(&self.id, RetrievalState::Viewing);
                        info!(
                            session = %self.id,
                            secret_id = %secret_id,
                            view_time_seconds = ?grant.view_time_seconds,
                            "Secret decrypted"
                        );
                    }
                    None => inner.fail(&self.id, FailureReason::DecryptionFailed),
                }
            }
        }
        inner.state()
    }

    /// Burn the secret on the consumer's request.
    ///
    /// Returns `false` if the session was not viewing (already burned,
    /// expired or never opened).
    pub fn burn(&self) -> bool {
        let mut inner = self.lock();
        self.burn_locked(&mut inner, BurnCause::Manual)
    }

    fn burn_locked(&self, inner: &mut Inner, cause: BurnCause) -> bool {
        if inner.state() != RetrievalState::Viewing {
            return false;
        }
        info!(session = %self.id, secret_id = ?inner.secret_id, cause = ?cause, "Secret burned");
        inner.transition(&self.id, RetrievalState::Burned(cause));
        true
    }

    /// Advance the countdown by one tick, burning at the last second.
    pub fn tick(&self) -> TickOutcome {
        let mut inner = self.lock();
        if inner.state() != RetrievalState::Viewing {
            return TickOutcome::Idle;
        }
        match inner.remaining {
            None => TickOutcome::Idle,
            Some(left) if left <= 1 => {
                self.burn_locked(&mut inner, BurnCause::TimerExpired);
                TickOutcome::Burned
            }
            Some(left) => {
                inner.remaining = Some(left - 1);
                TickOutcome::Remaining(left - 1)
            }
        }
    }

    /// Tick every [`SessionConfig::tick`] until the countdown burns the
    /// secret or the session stops viewing. Returns the final state.
    pub async fn run_countdown(&self) -> RetrievalState {
        let epoch = self.lock().epoch;
        let start = tokio::time::Instant::now() + self.config.tick;
        let mut interval = tokio::time::interval_at(start, self.config.tick);

        loop {
            interval.tick().await;
            if self.lock().epoch != epoch {
                break;
            }
            match self.tick() {
                TickOutcome::Remaining(_) => continue,
                TickOutcome::Burned | TickOutcome::Idle => break,
            }
        }
        self.state()
    }

    /// Apply an attention signal. Returns whether the content is obscured.
    ///
    /// Outside `Viewing` the signal is ignored. The countdown is never
    /// touched.
    pub fn record_attention(&self, signal: AttentionSignal) -> bool {
        let mut inner = self.lock();
        if inner.state() == RetrievalState::Viewing {
            inner.obscured = signal.obscures();
        }
        inner.obscured
    }

    /// Abandon the session: cancel in-flight calls, discard any late
    /// response and wipe everything.
    pub fn close(&self) {
        {
            let mut inner = self.lock();
            inner.reset();
        }
        let coordinator = self.api.coordinator();
        let cancelled = coordinator.cancel(&self.validate_request_id())
            + coordinator.cancel(&self.access_request_id());
        debug!(session = %self.id, cancelled, "Retrieval session closed");
    }

    fn secret_id_for(&self, epoch: u64) -> Option<String> {
        let inner = self.lock();
        (inner.epoch == epoch)
            .then(|| inner.secret_id.clone())
            .flatten()
    }

    fn is_current(&self, inner: &Inner, epoch: u64, expected: &RetrievalState) -> bool {
        if inner.epoch == epoch && inner.state() == *expected {
            return true;
        }
        debug!(
            session = %self.id,
            expected = %expected,
            current = %inner.state(),
            "Discarding stale step result"
        );
        false
    }

    async fn step<T, F>(&self, call: F) -> Result<T, RequestError>
    where
        F: Future<Output = Result<T, RequestError>>,
    {
        match self.config.step_timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                RequestError::Network(format!("no response within {}s", limit.as_secs()))
            })?,
            None => call.await,
        }
    }
}

impl Drop for RetrievalSession {
    fn drop(&mut self) {
        self.lock().wipe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiRoutes;
    use crate::crypto::{encrypt, generate_key};
    use crate::request::HttpMethod;
    use crate::testing::{coordinator, ScriptedTransport};
    use serde_json::{json, Value};
    use std::sync::Arc;

    const VALIDATE: &str = "/api/secrets/validate";
    const ACCESS: &str = "/api/secrets/access/abc";

    fn session(transport: &Arc<ScriptedTransport>) -> RetrievalSession {
        RetrievalSession::new(SecretApi::new(
            coordinator(transport.clone()),
            ApiRoutes::default(),
        ))
    }

    fn link(key: &SymmetricKey) -> LinkInput {
        LinkInput::Direct {
            secret_id: "abc".to_string(),
            key_fragment: key.as_url_safe().to_string(),
        }
    }

    fn policy(active: bool, protected: bool, views_left: i64) -> Value {
        json!({
            "isSuccess": true,
            "isActive": active,
            "isPasswordProtected": protected,
            "secretName": "wifi",
            "viewsLeft": views_left
        })
    }

    fn granted(payload: &ContentPayload, key: &SymmetricKey, view_time: Option<u32>) -> Value {
        let envelope = encrypt(payload, key).unwrap();
        json!({
            "isSuccess": true,
            "content": envelope.as_str(),
            "type": payload.kind().as_str(),
            "showTimeBomb": view_time.is_some(),
            "viewTimeSeconds": view_time
        })
    }

    fn viewing_session(view_time: Option<u32>) -> (Arc<ScriptedTransport>, RetrievalSession, SymmetricKey) {
        let key = generate_key().unwrap();
        let transport = ScriptedTransport::new();
        transport.reply(HttpMethod::Get, VALIDATE, 200, policy(true, false, 1));
        transport.reply(
            HttpMethod::Post,
            ACCESS,
            200,
            granted(&ContentPayload::text("hunter2"), &key, view_time),
        );
        let session = session(&transport);
        (transport, session, key)
    }

    #[tokio::test]
    async fn unprotected_secret_reaches_viewing() {
        let (transport, session, key) = viewing_session(Some(30));

        let state = session.open(link(&key)).await;

        assert_eq!(state, RetrievalState::Viewing);
        assert_eq!(
            session.view(|p| p.clone()),
            Some(ContentPayload::text("hunter2"))
        );
        let snapshot = session.snapshot();
        assert_eq!(snapshot.secret_name.as_deref(), Some("wifi"));
        assert_eq!(snapshot.kind, Some(ContentKind::Text));
        assert_eq!(snapshot.remaining, Some(Remaining(30)));
        assert!(snapshot.show_time_bomb);

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].url.query(), None);
        for request in requests {
            assert!(!request.url.as_str().contains(key.as_url_safe()));
            let body = request.body.unwrap_or_default();
            assert!(!String::from_utf8_lossy(&body).contains(key.as_url_safe()));
            assert!(request
                .headers
                .iter()
                .all(|(_, v)| !v.contains(key.as_url_safe())));
        }
    }

    #[tokio::test]
    async fn malformed_link_fails_without_network() {
        let transport = ScriptedTransport::new();
        let session = session(&transport);

        let state = session
            .open(LinkInput::Pasted("https://kieru.com/view/abc".to_string()))
            .await;

        assert_eq!(state, RetrievalState::Failed(FailureReason::InvalidLink));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn unknown_secret_is_not_found() {
        let transport = ScriptedTransport::new();
        transport.reply(HttpMethod::Get, VALIDATE, 200, json!({ "isSuccess": false }));
        let session = session(&transport);

        let state = session.open(link(&generate_key().unwrap())).await;
        assert_eq!(state, RetrievalState::Failed(FailureReason::NotFound));
    }

    #[tokio::test]
    async fn inactive_wins_over_password_flag() {
        for protected in [true, false] {
            let transport = ScriptedTransport::new();
            transport.reply(HttpMethod::Get, VALIDATE, 200, policy(false, protected, 3));
            let session = session(&transport);

            let state = session.open(link(&generate_key().unwrap())).await;

            assert_eq!(state, RetrievalState::Failed(FailureReason::Inactive));
            assert_eq!(transport.calls_to(ACCESS), 0);
        }
    }

    #[tokio::test]
    async fn copied_payload_is_usable_after_burn() {
        let (_transport, session, key) = viewing_session(None);
        session.open(link(&key)).await;

        let copy = session.view(ContentPayload::clone).unwrap();
        assert!(session.burn());

        assert_eq!(copy, ContentPayload::text("hunter2"));
        assert_eq!(session.view(ContentPayload::clone), None);
    }

    #[tokio::test]
    async fn bare_inactive_answer_is_inactive() {
        let transport = ScriptedTransport::new();
        transport.reply(
            HttpMethod::Get,
            VALIDATE,
            200,
            json!({ "isSuccess": true, "isActive": false }),
        );
        let session = session(&transport);

        let state = session.open(link(&generate_key().unwrap())).await;

        assert_eq!(state, RetrievalState::Failed(FailureReason::Inactive));
        assert_eq!(transport.calls_to(ACCESS), 0);
    }

    #[tokio::test]
    async fn odd_grant_metadata_still_reaches_viewing() {
        for (kind, expires_at) in [
            ("TEXT", json!("2026-11-01T10:00:00")),
            ("FILE", json!(1_793_527_200_000_i64)),
            ("TEXT", json!("soon")),
        ] {
            let key = generate_key().unwrap();
            let envelope = encrypt(&ContentPayload::text("hunter2"), &key).unwrap();
            let transport = ScriptedTransport::new();
            transport.reply(HttpMethod::Get, VALIDATE, 200, policy(true, false, 1));
            transport.reply(
                HttpMethod::Post,
                ACCESS,
                200,
                json!({
                    "isSuccess": true,
                    "content": envelope.as_str(),
                    "type": kind,
                    "expiresAt": expires_at
                }),
            );
            let session = session(&transport);

            let state = session.open(link(&key)).await;

            assert_eq!(state, RetrievalState::Viewing, "type {kind}, expiresAt {expires_at}");
            assert_eq!(session.snapshot().kind, Some(ContentKind::Text));
            assert_eq!(
                session.view(|p| p.clone()),
                Some(ContentPayload::text("hunter2"))
            );
            assert_eq!(transport.calls_to(ACCESS), 1);
        }
    }

    #[tokio::test]
    async fn no_views_left_is_exhausted() {
        let transport = ScriptedTransport::new();
        transport.reply(HttpMethod::Get, VALIDATE, 200, policy(true, true, 0));
        let session = session(&transport);

        let state = session.open(link(&generate_key().unwrap())).await;
        assert_eq!(state, RetrievalState::Failed(FailureReason::ViewsExhausted));
    }

    #[tokio::test]
    async fn protected_secret_waits_for_password_and_allows_retry() {
        let key = generate_key().unwrap();
        let transport = ScriptedTransport::new();
        transport.reply(HttpMethod::Get, VALIDATE, 200, policy(true, true, 3));
        transport.reply(HttpMethod::Post, ACCESS, 403, json!({}));
        transport.reply(
            HttpMethod::Post,
            ACCESS,
            200,
            granted(&ContentPayload::text("s3cret"), &key, None),
        );
        let session = session(&transport);

        let state = session.open(link(&key)).await;
        assert_eq!(
            state,
            RetrievalState::PasswordRequired {
                incorrect_password: false
            }
        );
        assert_eq!(transport.calls_to(ACCESS), 0);

        let state = session.submit_password("   ").await;
        assert_eq!(
            state,
            RetrievalState::PasswordRequired {
                incorrect_password: false
            }
        );
        assert_eq!(transport.calls_to(ACCESS), 0);

        let state = session.submit_password("wrong").await;
        assert_eq!(
            state,
            RetrievalState::PasswordRequired {
                incorrect_password: true
            }
        );
        assert_eq!(session.snapshot().message(), Some(INCORRECT_PASSWORD_MESSAGE));

        let state = session.submit_password("right").await;
        assert_eq!(state, RetrievalState::Viewing);
        assert_eq!(session.snapshot().remaining, None);

        let queries: Vec<Option<String>> = transport
            .requests()
            .iter()
            .filter(|r| r.url.path() == ACCESS)
            .map(|r| r.url.query().map(str::to_string))
            .collect();
        assert_eq!(
            queries,
            vec![Some("password=wrong".to_string()), Some("password=right".to_string())]
        );
    }

    #[tokio::test]
    async fn password_is_ignored_outside_password_step() {
        let (transport, session, key) = viewing_session(None);
        session.open(link(&key)).await;

        assert_eq!(session.submit_password("pw").await, RetrievalState::Viewing);
        assert_eq!(transport.calls_to(ACCESS), 1);
    }

    #[tokio::test]
    async fn rejection_without_password_is_access_denied() {
        let transport = ScriptedTransport::new();
        transport.reply(HttpMethod::Get, VALIDATE, 200, policy(true, false, 1));
        transport.reply(HttpMethod::Post, ACCESS, 200, json!({ "isSuccess": false }));
        let session = session(&transport);

        let state = session.open(link(&generate_key().unwrap())).await;

        assert_eq!(state, RetrievalState::Failed(FailureReason::AccessDenied));
        assert_eq!(transport.calls_to(VALIDATE), 1);
        assert_eq!(transport.calls_to(ACCESS), 1);
    }

    #[tokio::test]
    async fn wrong_key_fails_decryption() {
        let transport = ScriptedTransport::new();
        transport.reply(HttpMethod::Get, VALIDATE, 200, policy(true, false, 1));
        transport.reply(
            HttpMethod::Post,
            ACCESS,
            200,
            granted(&ContentPayload::text("x"), &generate_key().unwrap(), None),
        );
        let session = session(&transport);

        let state = session.open(link(&generate_key().unwrap())).await;

        assert_eq!(state, RetrievalState::Failed(FailureReason::DecryptionFailed));
        assert!(session.view(|_| ()).is_none());
    }

    #[tokio::test]
    async fn server_error_is_network_error() {
        let transport = ScriptedTransport::new();
        transport.reply(HttpMethod::Get, VALIDATE, 502, json!({}));
        let session = session(&transport);

        let state = session.open(link(&generate_key().unwrap())).await;
        assert!(matches!(
            state,
            RetrievalState::Failed(FailureReason::NetworkError(_))
        ));
    }

    #[tokio::test]
    async fn burn_and_expiry_race_burns_once() {
        let (transport, session, key) = viewing_session(Some(1));
        session.open(link(&key)).await;
        let calls = transport.requests().len();

        assert!(session.burn());
        assert_eq!(session.tick(), TickOutcome::Idle);
        assert!(!session.burn());

        assert_eq!(session.state(), RetrievalState::Burned(BurnCause::Manual));
        assert!(session.view(|_| ()).is_none());
        assert_eq!(transport.requests().len(), calls);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_burns_have_one_winner() {
        let (_transport, session, key) = viewing_session(Some(1));
        let session = Arc::new(session);
        session.open(link(&key)).await;

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let session = session.clone();
                tokio::spawn(async move {
                    if i % 2 == 0 {
                        session.burn()
                    } else {
                        session.tick() == TickOutcome::Burned
                    }
                })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert!(matches!(session.state(), RetrievalState::Burned(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_self_destructs() {
        let (transport, session, key) = viewing_session(Some(3));
        session.open(link(&key)).await;

        let started = tokio::time::Instant::now();
        let state = session.run_countdown().await;

        assert_eq!(state, RetrievalState::Burned(BurnCause::TimerExpired));
        assert_eq!(started.elapsed(), Duration::from_secs(3));
        assert_eq!(
            session.snapshot().message(),
            Some(BurnCause::TimerExpired.user_message())
        );
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn tick_without_timer_is_idle() {
        let (_transport, session, key) = viewing_session(None);
        session.open(link(&key)).await;

        assert_eq!(session.tick(), TickOutcome::Idle);
        assert_eq!(session.state(), RetrievalState::Viewing);
    }

    #[tokio::test]
    async fn attention_obscures_without_touching_countdown() {
        let (_transport, session, key) = viewing_session(Some(30));
        assert!(!session.record_attention(AttentionSignal::FocusLost));

        session.open(link(&key)).await;
        assert!(session.record_attention(AttentionSignal::FocusLost));
        assert!(session.snapshot().obscured);
        assert!(!session.record_attention(AttentionSignal::FocusGained));
        assert!(session.record_attention(AttentionSignal::Activity));
        assert!(!session.record_attention(AttentionSignal::Reveal));

        assert_eq!(session.snapshot().remaining, Some(Remaining(30)));
        assert_eq!(session.state(), RetrievalState::Viewing);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_step_times_out() {
        let (transport, _session, key) = viewing_session(None);
        transport.delay(HttpMethod::Get, VALIDATE, Duration::from_secs(30));
        let session = RetrievalSession::with_config(
            SecretApi::new(coordinator(transport.clone()), ApiRoutes::default()),
            SessionConfig {
                step_timeout: Some(Duration::from_secs(5)),
                ..SessionConfig::default()
            },
        );

        let state = session.open(link(&key)).await;

        assert!(matches!(
            state,
            RetrievalState::Failed(FailureReason::NetworkError(_))
        ));
        assert_eq!(transport.calls_to(ACCESS), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn close_discards_in_flight_fetch() {
        let (transport, session, key) = viewing_session(None);
        transport.delay(HttpMethod::Post, ACCESS, Duration::from_secs(5));
        let session = Arc::new(session);

        let opening = tokio::spawn({
            let session = session.clone();
            async move { session.open(link(&key)).await }
        });
        while transport.calls_to(ACCESS) == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(session.state(), RetrievalState::Fetching);

        session.close();

        assert_eq!(opening.await.unwrap(), RetrievalState::ParsingLink);
        let snapshot = session.snapshot();
        assert_eq!(snapshot.state, RetrievalState::ParsingLink);
        assert_eq!(snapshot.secret_id, None);
        assert!(session.view(|_| ()).is_none());
        assert_eq!(session.api.coordinator().in_flight_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reopening_discards_responses_for_previous_link() {
        let key = generate_key().unwrap();
        let transport = ScriptedTransport::new();
        transport.reply(HttpMethod::Get, VALIDATE, 200, policy(true, false, 1));
        transport.reply(
            HttpMethod::Post,
            "/api/secrets/access/slow",
            200,
            granted(&ContentPayload::text("old"), &key, None),
        );
        transport.delay(
            HttpMethod::Post,
            "/api/secrets/access/slow",
            Duration::from_secs(5),
        );
        transport.reply(
            HttpMethod::Post,
            ACCESS,
            200,
            granted(&ContentPayload::text("new"), &key, None),
        );
        let session = Arc::new(session(&transport));

        let first = tokio::spawn({
            let session = session.clone();
            let link = LinkInput::Direct {
                secret_id: "slow".to_string(),
                key_fragment: key.as_url_safe().to_string(),
            };
            async move { session.open(link).await }
        });
        while transport.calls_to("/api/secrets/access/slow") == 0 {
            tokio::task::yield_now().await;
        }

        assert_eq!(session.open(link(&key)).await, RetrievalState::Viewing);
        first.await.unwrap();

        assert_eq!(session.snapshot().secret_id.as_deref(), Some("abc"));
        assert_eq!(
            session.view(|p| p.clone()),
            Some(ContentPayload::text("new"))
        );
    }

    #[tokio::test]
    async fn single_view_secret_is_exhausted_on_second_open() {
        let key = generate_key().unwrap();
        let transport = ScriptedTransport::new();
        transport.reply(HttpMethod::Get, VALIDATE, 200, policy(true, false, 1));
        transport.reply(HttpMethod::Get, VALIDATE, 200, policy(true, false, 0));
        transport.reply(
            HttpMethod::Post,
            ACCESS,
            200,
            granted(&ContentPayload::text("once"), &key, None),
        );

        let first = session(&transport);
        assert_eq!(first.open(link(&key)).await, RetrievalState::Viewing);
        first.close();

        let second = session(&transport);
        assert_eq!(
            second.open(link(&key)).await,
            RetrievalState::Failed(FailureReason::ViewsExhausted)
        );
        assert_eq!(transport.calls_to(ACCESS), 1);
    }
}
