// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Encrypt-then-submit flow producing a share link.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use url::Url;

use super::draft::{CreationSettings, SecretDraft};
use super::limits::{PlanLimits, PlanTier};
use super::CreationError;
use crate::cache::{CreatedLink, CreatedLinkCache};
use crate::client::SecretApi;
use crate::crypto::{encrypt, generate_key};
use crate::models::CreateSecretRequest;
use crate::retrieval::build_share_link;

/// Creates secrets on behalf of one producer.
pub struct SecretCreator {
    api: SecretApi,
    app_origin: Url,
    plan: PlanTier,
    limits: PlanLimits,
    cache: Option<Arc<CreatedLinkCache>>,
}

impl SecretCreator {
    pub fn new(api: SecretApi, app_origin: Url, plan: PlanTier) -> Self {
        Self {
            api,
            app_origin,
            plan,
            limits: PlanLimits::default(),
            cache: None,
        }
    }

    pub fn with_limits(mut self, limits: PlanLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Remember created links in `cache`.
    pub fn with_cache(mut self, cache: Arc<CreatedLinkCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn plan(&self) -> PlanTier {
        self.plan
    }

    pub fn limits(&self) -> &PlanLimits {
        &self.limits
    }

    /// Replace the limits with the server's current values.
    pub async fn refresh_limits(&mut self) {
        self.limits = self.api.fetch_plan_limits().await;
        debug!(
            plan = %self.plan,
            char_limit = self.limits.char_limit(self.plan),
            file_size_limit = self.limits.file_size_limit(self.plan),
            "Plan limits refreshed"
        );
    }

    /// Validate, encrypt and submit `draft`.
    ///
    /// `settings` are sent only when supplied. The key is generated here,
    /// placed in the returned link's fragment and never sent to the server.
    pub async fn create(
        &self,
        draft: &SecretDraft,
        settings: Option<&CreationSettings>,
    ) -> Result<CreatedLink, CreationError> {
        let (name, payload) = draft.validate(self.plan, &self.limits)?;
        let password = settings
            .map(|s| s.validate(Utc::now()))
            .transpose()?
            .flatten();
        let kind = payload.kind();

        let key = generate_key()?;
        let envelope = encrypt(&payload, &key)?;
        drop(payload);

        let request = CreateSecretRequest {
            encrypted_payload: envelope,
            secret_name: name.clone(),
            kind,
            expires_at: settings.map(|s| s.expires_at.timestamp_millis()),
            password,
            max_views: settings.map(|s| s.max_views),
            view_time_seconds: settings.map(|s| s.view_time_seconds),
            show_time_bomb: settings.map(|s| s.show_time_bomb),
        };

        let secret_id = self.api.create(&request).await?;
        let link = build_share_link(&self.app_origin, &secret_id, &key)?;
        info!(secret_id = %secret_id, kind = %kind, "Share link ready");

        let created = CreatedLink::new(secret_id, name, kind, link.to_string());
        if let Some(cache) = &self.cache {
            cache.put(created.clone());
        }
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiRoutes;
    use crate::creation::DraftContent;
    use crate::crypto::{decrypt, ContentKind, ContentPayload, EncryptedEnvelope};
    use crate::request::{HttpMethod, RequestError};
    use crate::retrieval::{parse_link, FailureReason, LinkInput, RetrievalSession, RetrievalState};
    use crate::testing::{coordinator, ScriptedTransport};
    use serde_json::{json, Value};

    const CREATE: &str = "/api/secrets/create";

    fn api(transport: &Arc<ScriptedTransport>) -> SecretApi {
        SecretApi::new(coordinator(transport.clone()), ApiRoutes::default())
    }

    fn creator(transport: &Arc<ScriptedTransport>, plan: PlanTier) -> SecretCreator {
        SecretCreator::new(
            api(transport),
            Url::parse("https://kieru.test").unwrap(),
            plan,
        )
    }

    fn sent_body(transport: &ScriptedTransport) -> Value {
        let request = transport
            .requests()
            .into_iter()
            .find(|r| r.url.path() == CREATE)
            .unwrap();
        serde_json::from_slice(&request.body.unwrap()).unwrap()
    }

    fn accepted(transport: &ScriptedTransport, id: &str) {
        transport.reply(
            HttpMethod::Post,
            CREATE,
            200,
            json!({ "isSuccess": true, "secretId": id }),
        );
    }

    #[tokio::test]
    async fn link_key_decrypts_submitted_envelope() {
        let transport = ScriptedTransport::new();
        accepted(&transport, "s-1");
        let draft = SecretDraft::new(" wifi ", DraftContent::text("hunter2"));

        let created = creator(&transport, PlanTier::Anonymous)
            .create(&draft, None)
            .await
            .unwrap();

        assert_eq!(created.secret_id, "s-1");
        assert_eq!(created.name, "wifi");
        assert!(created.link().starts_with("https://kieru.test/view/s-1#"));

        let parsed = parse_link(&LinkInput::Pasted(created.link().to_string())).unwrap();
        let body = sent_body(&transport);
        assert_eq!(
            body.as_object().unwrap().keys().collect::<Vec<_>>(),
            vec!["encryptedPayload", "secretName", "type"]
        );
        assert_eq!(body["secretName"], "wifi");
        assert_eq!(body["type"], "TEXT");
        assert!(!body.to_string().contains(parsed.key.as_url_safe()));

        let envelope = EncryptedEnvelope::from_base64(body["encryptedPayload"].as_str().unwrap());
        assert_eq!(
            decrypt(&envelope, &parsed.key).unwrap(),
            ContentPayload::text("hunter2")
        );
    }

    #[tokio::test]
    async fn settings_are_sent_when_supplied() {
        let transport = ScriptedTransport::new();
        accepted(&transport, "s-2");
        let settings = CreationSettings {
            max_views: 3,
            view_time_seconds: 120,
            show_time_bomb: false,
            ..CreationSettings::default()
        }
        .with_password("  pw  ");
        let draft = SecretDraft::new("n", DraftContent::text("x"));

        creator(&transport, PlanTier::Explorer)
            .create(&draft, Some(&settings))
            .await
            .unwrap();

        let body = sent_body(&transport);
        assert_eq!(body["password"], "pw");
        assert_eq!(body["maxViews"], 3);
        assert_eq!(body["viewTimeSeconds"], 120);
        assert_eq!(body["showTimeBomb"], false);
        assert_eq!(
            body["expiresAt"].as_i64(),
            Some(settings.expires_at.timestamp_millis())
        );
    }

    #[tokio::test]
    async fn invalid_draft_makes_no_request() {
        let transport = ScriptedTransport::new();
        let draft = SecretDraft::new("n", DraftContent::image(vec![1, 2, 3], "a.png", "image/png"));

        let err = creator(&transport, PlanTier::Anonymous)
            .create(&draft, None)
            .await
            .unwrap_err();

        assert!(matches!(err, CreationError::ImagesNotAllowed { .. }));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn server_failure_is_reported_verbatim() {
        let transport = ScriptedTransport::new();
        transport.reply_raw(HttpMethod::Post, CREATE, 500, "boom");
        let draft = SecretDraft::new("n", DraftContent::text("x"));

        let err = creator(&transport, PlanTier::Anonymous)
            .create(&draft, None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CreationError::Request(RequestError::Status { status: 500, ref body }) if body == "boom"
        ));
        assert!(!err.is_aborted());
        assert_eq!(transport.calls_to(CREATE), 1);
    }

    #[tokio::test]
    async fn created_link_is_cached() {
        let transport = ScriptedTransport::new();
        accepted(&transport, "s-3");
        let cache = Arc::new(CreatedLinkCache::default());
        let draft = SecretDraft::new("n", DraftContent::text("x"));

        let created = creator(&transport, PlanTier::Anonymous)
            .with_cache(cache.clone())
            .create(&draft, None)
            .await
            .unwrap();

        let cached = cache.get("s-3").unwrap();
        assert_eq!(cached.link(), created.link());
        assert_eq!(cached.kind, ContentKind::Text);
    }

    #[tokio::test]
    async fn refreshed_limits_apply_to_drafts() {
        let transport = ScriptedTransport::new();
        transport.reply(
            HttpMethod::Get,
            "/api/assets/charLimits",
            200,
            json!({ "charLimits": { "ANONYMOUS": 10 } }),
        );
        let mut creator = creator(&transport, PlanTier::Anonymous);
        creator.refresh_limits().await;

        let draft = SecretDraft::new("n", DraftContent::text("a".repeat(11)));
        let err = creator.create(&draft, None).await.unwrap_err();

        assert!(matches!(
            err,
            CreationError::TooManyCharacters { count: 11, limit: 10 }
        ));
    }

    #[tokio::test]
    async fn single_view_secret_round_trip() {
        let transport = ScriptedTransport::new();
        accepted(&transport, "once");
        let settings = CreationSettings::default();
        let draft = SecretDraft::new("n", DraftContent::text("read me once"));

        let created = creator(&transport, PlanTier::Anonymous)
            .create(&draft, Some(&settings))
            .await
            .unwrap();
        let body = sent_body(&transport);
        assert_eq!(body["maxViews"], 1);

        let validated = |views_left: i64| {
            json!({
                "isSuccess": true,
                "isActive": true,
                "isPasswordProtected": false,
                "viewsLeft": views_left
            })
        };
        transport.reply(HttpMethod::Get, "/api/secrets/validate", 200, validated(1));
        transport.reply(HttpMethod::Get, "/api/secrets/validate", 200, validated(0));
        transport.reply(
            HttpMethod::Post,
            "/api/secrets/access/once",
            200,
            json!({
                "isSuccess": true,
                "content": body["encryptedPayload"],
                "type": "TEXT",
                "viewTimeSeconds": 60
            }),
        );

        let first = RetrievalSession::new(api(&transport));
        let state = first
            .open(LinkInput::Pasted(created.link().to_string()))
            .await;
        assert_eq!(state, RetrievalState::Viewing);
        assert_eq!(
            first.view(|p| p.clone()),
            Some(ContentPayload::text("read me once"))
        );
        assert!(first.burn());

        let second = RetrievalSession::new(api(&transport));
        let state = second
            .open(LinkInput::Pasted(created.link().to_string()))
            .await;
        assert_eq!(state, RetrievalState::Failed(FailureReason::ViewsExhausted));
    }
}
