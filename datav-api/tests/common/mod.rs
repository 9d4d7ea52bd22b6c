//! Common test utilities for the router tests
//!
//! Each [`TestApp`] owns a fresh in-memory store and a router wired the
//! way `main` wires it, minus PostgreSQL.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use datav_api::app::{build_router, AppState};
use datav_shared::auth::jwt::{create_token, Claims};
use datav_shared::config::CoreConfig;
use datav_shared::history::HistoryRecorder;
use datav_shared::models::{Role, TenantId, User};
use datav_shared::store::MemoryStore;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

pub const SECRET: &str = "router-test-secret-at-least-32-bytes";
pub const TENANT: TenantId = 1;

pub struct TestApp {
    pub store: MemoryStore,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(CoreConfig::default())
    }

    pub fn with_config(config: CoreConfig) -> Self {
        let store = MemoryStore::new();
        let (history, _consumer) =
            HistoryRecorder::spawn(Arc::new(store.clone()), config.history.queue_capacity);
        let state = AppState::new(Arc::new(store.clone()), history, &config, SECRET);

        Self {
            router: build_router(state),
            store,
        }
    }

    /// Sends a request and returns the status with the JSON body
    ///
    /// Empty bodies come back as `Value::Null`.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.send_request(request).await
    }

    pub async fn send_request(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        (status, body)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, token, Some(body)).await
    }

    /// Makes `user` a tenant admin and creates a team through the API
    pub async fn create_team(&self, name: &str, user: &User) -> i64 {
        self.store.add_tenant_member(TENANT, user.id, Role::Admin).await;

        let (status, body) = self
            .post(
                &format!("/v1/tenant/{}/team", TENANT),
                Some(&token(user)),
                json!({ "name": name }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create team failed: {}", body);

        body["id"].as_i64().unwrap()
    }

    /// Saves a new dashboard through the API and returns its ID
    pub async fn save_dashboard(&self, team_id: i64, title: &str, user: &User) -> String {
        let (status, body) = self
            .post(
                "/v1/dashboard/save",
                Some(&token(user)),
                dashboard_body(team_id, title),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "save failed: {}", body);

        body["id"].as_str().unwrap().to_string()
    }
}

pub fn user(id: i64, name: &str) -> User {
    User::new(id, name)
}

pub fn token(user: &User) -> String {
    create_token(&Claims::new(user.id, user.username.clone()), SECRET).unwrap()
}

pub fn dashboard_body(team_id: i64, title: &str) -> Value {
    json!({
        "title": title,
        "ownedBy": team_id,
        "visibleTo": "team",
        "tags": ["infra"],
        "data": { "panels": [] }
    })
}
