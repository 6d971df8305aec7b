// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Network plumbing for the secret API: logical request keys, the transport
//! and credential seams, duplicate confirmation and the coordinator.

mod confirm;
mod coordinator;
mod credentials;
mod key;
mod transport;

pub use confirm::{
    AlwaysProceed, ChannelConfirmation, ConfirmationError, ConfirmationPort, ConfirmationPrompt,
    ConfirmationRequest, TimedConfirmation,
};
pub use coordinator::{ApiResponse, DuplicatePolicy, RequestCoordinator, RequestError, RequestSpec};
pub use credentials::{Anonymous, CredentialStore, MemoryCredentialStore};
pub use key::{serialize_query_params, LogicalKey};
pub use transport::{
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, TransportError,
};
