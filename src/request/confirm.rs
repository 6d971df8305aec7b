// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Duplicate-request confirmation.
//!
//! When a call under the confirmed policy collides with one already in
//! flight, the coordinator asks a [`ConfirmationPort`] whether to cancel the
//! running call and proceed. Any host (terminal, UI, server) plugs in its own
//! port.
//!
//! ## Failure Semantics
//!
//! - `Ok(true)`: cancel the running call, start the new one.
//! - `Ok(false)`: abort the new call.
//! - `Err(_)`: the confirmation channel itself is broken; the coordinator
//!   proceeds so that a broken prompt can never deadlock requests.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// Text shown to whoever answers the confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationPrompt {
    pub message: String,
    pub confirm_label: String,
    pub reject_label: String,
}

impl ConfirmationPrompt {
    /// Prompt used for duplicate in-flight requests.
    pub fn duplicate_request() -> Self {
        Self {
            message: "A similar request is already running. Start a new one instead?".to_string(),
            confirm_label: "Start New".to_string(),
            reject_label: "Cancel".to_string(),
        }
    }
}

/// The confirmation channel could not produce an answer.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfirmationError {
    #[error("confirmation channel closed")]
    ChannelClosed,

    #[error("confirmation failed: {0}")]
    Failed(String),
}

/// Pluggable capability answering "cancel the running call and proceed?".
#[async_trait]
pub trait ConfirmationPort: Send + Sync {
    async fn confirm(&self, prompt: &ConfirmationPrompt) -> Result<bool, ConfirmationError>;
}

/// Always answers "proceed". Suitable for non-interactive hosts.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysProceed;

#[async_trait]
impl ConfirmationPort for AlwaysProceed {
    async fn confirm(&self, _prompt: &ConfirmationPrompt) -> Result<bool, ConfirmationError> {
        Ok(true)
    }
}

/// Wraps another port and rejects automatically once `timeout` elapses.
pub struct TimedConfirmation<P> {
    inner: P,
    timeout: Duration,
}

impl<P> TimedConfirmation<P> {
    pub fn new(inner: P, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl<P: ConfirmationPort> ConfirmationPort for TimedConfirmation<P> {
    async fn confirm(&self, prompt: &ConfirmationPrompt) -> Result<bool, ConfirmationError> {
        match tokio::time::timeout(self.timeout, self.inner.confirm(prompt)).await {
            Ok(answer) => answer,
            Err(_) => {
                tracing::info!(
                    timeout_secs = self.timeout.as_secs(),
                    "Confirmation timed out, rejecting"
                );
                Ok(false)
            }
        }
    }
}

/// A pending question delivered to the host by [`ChannelConfirmation`].
#[derive(Debug)]
pub struct ConfirmationRequest {
    pub id: Uuid,
    pub prompt: ConfirmationPrompt,
    responder: oneshot::Sender<bool>,
}

impl ConfirmationRequest {
    /// Answer the question. Answers after the asker gave up are ignored.
    pub fn resolve(self, proceed: bool) {
        let _ = self.responder.send(proceed);
    }
}

/// Port that forwards questions to a host-side receiver.
///
/// A UI event loop drains the receiver returned by
/// [`ChannelConfirmation::new`], renders each prompt, and resolves it.
/// Dropping the receiver or a request unresolved is reported as a broken
/// channel.
#[derive(Debug, Clone)]
pub struct ChannelConfirmation {
    tx: mpsc::UnboundedSender<ConfirmationRequest>,
}

impl ChannelConfirmation {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ConfirmationRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ConfirmationPort for ChannelConfirmation {
    async fn confirm(&self, prompt: &ConfirmationPrompt) -> Result<bool, ConfirmationError> {
        let (responder, answer) = oneshot::channel();
        let request = ConfirmationRequest {
            id: Uuid::new_v4(),
            prompt: prompt.clone(),
            responder,
        };
        self.tx
            .send(request)
            .map_err(|_| ConfirmationError::ChannelClosed)?;
        answer.await.map_err(|_| ConfirmationError::ChannelClosed)
    }
}
