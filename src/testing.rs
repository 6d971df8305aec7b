// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Test doubles shared by the module tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::request::{
    AlwaysProceed, Anonymous, HttpMethod, HttpRequest, HttpResponse, HttpTransport,
    RequestCoordinator, TransportError,
};

type Reply = Result<HttpResponse, TransportError>;

/// Transport answering from per-route scripts.
///
/// Each `(method, path)` route holds a queue of replies; the last reply of a
/// queue is repeated for any further call. Unscripted routes answer 404.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    routes: Mutex<HashMap<(HttpMethod, String), VecDeque<Reply>>>,
    delays: Mutex<HashMap<(HttpMethod, String), Duration>>,
    requests: Mutex<Vec<HttpRequest>>,
    completed: Mutex<Vec<(HttpMethod, String)>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn reply(&self, method: HttpMethod, path: &str, status: u16, body: Value) {
        self.push(
            method,
            path,
            Ok(HttpResponse {
                status,
                body: body.to_string().into_bytes(),
            }),
        );
    }

    pub(crate) fn reply_raw(&self, method: HttpMethod, path: &str, status: u16, body: &str) {
        self.push(
            method,
            path,
            Ok(HttpResponse {
                status,
                body: body.as_bytes().to_vec(),
            }),
        );
    }

    pub(crate) fn fail(&self, method: HttpMethod, path: &str, message: &str) {
        self.push(method, path, Err(TransportError(message.to_string())));
    }

    /// Every call to the route sleeps `delay` (tokio clock) before answering.
    pub(crate) fn delay(&self, method: HttpMethod, path: &str, delay: Duration) {
        self.delays
            .lock()
            .unwrap()
            .insert((method, path.to_string()), delay);
    }

    fn push(&self, method: HttpMethod, path: &str, reply: Reply) {
        self.routes
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(reply);
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Calls to `path` that ran to the end and produced a reply. A call
    /// whose future was dropped mid-flight is sent but never completed.
    pub(crate) fn completed_calls_to(&self, path: &str) -> usize {
        self.completed
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, p)| p == path)
            .count()
    }

    pub(crate) fn calls_to(&self, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url.path() == path)
            .count()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let route = (request.method, request.url.path().to_string());
        self.requests.lock().unwrap().push(request);

        let delay = self.delays.lock().unwrap().get(&route).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let reply = {
            let mut routes = self.routes.lock().unwrap();
            match routes.get_mut(&route) {
                Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
                Some(queue) if !queue.is_empty() => queue[0].clone(),
                _ => Ok(HttpResponse {
                    status: 404,
                    body: b"not scripted".to_vec(),
                }),
            }
        };
        self.completed.lock().unwrap().push(route);
        reply
    }
}

pub(crate) const BASE_URL: &str = "https://kieru.test/api";

/// Coordinator over `transport` with no credentials and auto-confirm.
pub(crate) fn coordinator(transport: Arc<ScriptedTransport>) -> Arc<RequestCoordinator> {
    Arc::new(RequestCoordinator::new(
        Url::parse(BASE_URL).unwrap(),
        transport,
        Arc::new(Anonymous),
        Arc::new(AlwaysProceed),
    ))
}
