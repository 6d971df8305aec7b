// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ambient session credentials.
//!
//! The coordinator consults a [`CredentialStore`] on every call and attaches
//! `Authorization: Bearer <token>` when one is present. Login and logout
//! flows live outside this crate; they only update the store.

use std::sync::RwLock;

/// Source of the bearer token attached to outgoing requests.
pub trait CredentialStore: Send + Sync {
    fn bearer_token(&self) -> Option<String>;
}

/// Process-local credential store.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    token: RwLock<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        let store = Self::new();
        store.set_token(token);
        store
    }

    /// Replace the stored token. Blank tokens clear the store.
    pub fn set_token(&self, token: impl Into<String>) {
        let token = token.into();
        let value = (!token.trim().is_empty()).then(|| token.trim().to_string());
        if let Ok(mut guard) = self.token.write() {
            *guard = value;
        }
    }

    pub fn clear(&self) {
        if let Ok(mut guard) = self.token.write() {
            *guard = None;
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn bearer_token(&self) -> Option<String> {
        self.token.read().ok().and_then(|guard| guard.clone())
    }
}

/// Store that never holds credentials (anonymous use).
#[derive(Debug, Default, Clone, Copy)]
pub struct Anonymous;

impl CredentialStore for Anonymous {
    fn bearer_token(&self) -> Option<String> {
        None
    }
}
