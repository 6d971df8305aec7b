// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Kieru Client - End-to-End Encrypted Burn-After-Reading Secrets
//!
//! Content is encrypted on the producer's device with a fresh AES-256-GCM
//! key. The server stores only the envelope and enforces view policy; the
//! key travels in the share link's URL fragment and never reaches it.
//!
//! ## Modules
//!
//! - `crypto` - Envelope cipher (key generation, encrypt, decrypt)
//! - `request` - Request coordinator (dedup, cancellation, credentials)
//! - `client` - Typed calls to the secret API
//! - `retrieval` - Consumer-side retrieval state machine
//! - `creation` - Producer-side creation flow and plan limits
//! - `cache` - In-memory cache of created links
//! - `config` / `logging` - Environment configuration and tracing setup

pub mod cache;
pub mod client;
pub mod config;
pub mod creation;
pub mod crypto;
pub mod error;
pub mod logging;
pub mod models;
pub mod request;
pub mod retrieval;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
