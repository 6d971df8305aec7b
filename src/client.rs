// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Secret API Client
//!
//! Typed calls to the secret API, issued through the [`RequestCoordinator`]
//! so that every call is deduplicated, cancellable and carries the ambient
//! credential.
//!
//! ## Status Mapping
//!
//! | Call | 2xx | 4xx | 5xx / transport |
//! |------|-----|-----|-----------------|
//! | validate | parsed [`ValidationOutcome`] | `NotFound` | `Err` |
//! | access | parsed [`AccessOutcome`] | `Rejected` | `Err` |
//! | create | secret id | `Err(Status)` | `Err` |
//!
//! The decryption key never passes through this module.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::ApiRoutes;
use crate::creation::PlanLimits;
use crate::models::{
    AccessOutcome, AccessResponse, CharLimitsResponse, CreateSecretRequest, CreateSecretResponse,
    FileSizeLimitsResponse, ModelError, ValidationOutcome, ValidationResponse,
};
use crate::request::{DuplicatePolicy, RequestCoordinator, RequestError, RequestSpec};

/// Request id for secret validation calls.
pub const VALIDATE_REQUEST_ID: &str = "VALIDATE_SECRET";

/// Request id for secret access calls.
pub const ACCESS_REQUEST_ID: &str = "ACCESS_SECRET";

/// Request id for secret creation calls.
pub const CREATE_REQUEST_ID: &str = "CREATE_SECRET";

const CHAR_LIMITS_REQUEST_ID: &str = "FETCH_CHAR_LIMITS";
const FILE_SIZE_LIMITS_REQUEST_ID: &str = "FETCH_FILE_SIZE_LIMITS";

fn malformed(e: ModelError) -> RequestError {
    RequestError::Malformed(e.to_string())
}

fn is_client_error(err: &RequestError) -> bool {
    err.status().is_some_and(|s| (400..500).contains(&s))
}

/// Typed facade over the secret endpoints.
#[derive(Clone)]
pub struct SecretApi {
    coordinator: Arc<RequestCoordinator>,
    routes: ApiRoutes,
}

impl SecretApi {
    pub fn new(coordinator: Arc<RequestCoordinator>, routes: ApiRoutes) -> Self {
        Self {
            coordinator,
            routes,
        }
    }

    pub fn coordinator(&self) -> &Arc<RequestCoordinator> {
        &self.coordinator
    }

    /// Ask the server for the access policy of `secret_id`.
    pub async fn validate(
        &self,
        request_id: &str,
        secret_id: &str,
    ) -> Result<ValidationOutcome, RequestError> {
        let spec = RequestSpec::get(request_id, self.routes.validate.as_str())
            .with_params(json!({ "id": secret_id }))
            .with_policy(DuplicatePolicy::Silent);

        match self.coordinator.execute(spec).await {
            Ok(response) => response
                .json::<ValidationResponse>()?
                .into_outcome()
                .map_err(malformed),
            Err(e) if is_client_error(&e) => {
                debug!(secret_id = %secret_id, status = ?e.status(), "Validation rejected by server");
                Ok(ValidationOutcome::NotFound)
            }
            Err(e) => Err(e),
        }
    }

    /// Fetch the envelope of `secret_id`, consuming one view on success.
    ///
    /// The password travels in the query string; it is omitted when `None`
    /// or blank.
    pub async fn access(
        &self,
        request_id: &str,
        secret_id: &str,
        password: Option<&str>,
    ) -> Result<AccessOutcome, RequestError> {
        let route = self.routes.access_for(secret_id).ok_or_else(|| {
            RequestError::InvalidUrl(format!("secret id {secret_id:?} is not a path segment"))
        })?;
        let mut spec = RequestSpec::post(request_id, route)
            .with_params(json!({}))
            .with_policy(DuplicatePolicy::Silent);
        if let Some(password) = password.filter(|p| !p.is_empty()) {
            spec = spec.with_query("password", password);
        }

        match self.coordinator.execute(spec).await {
            Ok(response) => Ok(response.json::<AccessResponse>()?.into_outcome()),
            Err(e) if is_client_error(&e) => {
                debug!(secret_id = %secret_id, status = ?e.status(), "Access rejected by server");
                Ok(AccessOutcome::Rejected)
            }
            Err(e) => Err(e),
        }
    }

    /// Submit a new secret. Returns the server-assigned secret id.
    pub async fn create(&self, request: &CreateSecretRequest) -> Result<String, RequestError> {
        let body =
            serde_json::to_value(request).map_err(|e| RequestError::Malformed(e.to_string()))?;
        let spec = RequestSpec::post(CREATE_REQUEST_ID, self.routes.create.as_str())
            .with_params(body)
            .with_policy(DuplicatePolicy::Confirmed);

        let secret_id = self
            .coordinator
            .execute(spec)
            .await?
            .json::<CreateSecretResponse>()?
            .into_secret_id()
            .map_err(malformed)?;

        info!(secret_id = %secret_id, kind = %request.kind, "Secret created");
        Ok(secret_id)
    }

    /// Plan-tier limits, server overrides merged over the defaults.
    ///
    /// Each limit table falls back to its defaults independently when its
    /// fetch fails.
    pub async fn fetch_plan_limits(&self) -> PlanLimits {
        let chars = RequestSpec::get(CHAR_LIMITS_REQUEST_ID, self.routes.char_limits.as_str())
            .with_policy(DuplicatePolicy::Silent);
        let files = RequestSpec::get(
            FILE_SIZE_LIMITS_REQUEST_ID,
            self.routes.file_size_limits.as_str(),
        )
        .with_policy(DuplicatePolicy::Silent);

        let (chars, files) = tokio::join!(
            self.coordinator.execute(chars),
            self.coordinator.execute(files)
        );

        let mut limits = PlanLimits::default();

        match chars.and_then(|r| r.json::<CharLimitsResponse>()) {
            Ok(body) => limits.merge_char_limits(&body.char_limits),
            Err(e) => warn!(error = %e, "Failed to fetch character limits, using defaults"),
        }
        match files.and_then(|r| r.json::<FileSizeLimitsResponse>()) {
            Ok(body) => limits.merge_file_size_limits(&body.file_limit),
            Err(e) => warn!(error = %e, "Failed to fetch file size limits, using defaults"),
        }

        limits
    }
}
