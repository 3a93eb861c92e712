//! Shared helpers for meterd integration tests

#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use http_body_util::BodyExt;
use meter_config::BillingPolicy;
use meter_core::CollectingSink;
use meter_host_api::MockHost;
use meter_store::{SqliteStore, Store};
use meterd::{AppState, build_router};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub struct TestApp {
    pub state: AppState,
    pub events: Arc<CollectingSink>,
    pub host: Arc<MockHost>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_policy(BillingPolicy::default())
    }

    pub fn with_policy(policy: BillingPolicy) -> Self {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
        Self::with_store(store, policy)
    }

    pub fn with_store(store: Arc<dyn Store>, policy: BillingPolicy) -> Self {
        let events = Arc::new(CollectingSink::new());
        let host = Arc::new(MockHost::new());
        let state = AppState::new(store, policy, events.clone(), host.clone());
        Self {
            state,
            events,
            host,
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        actor: Option<(&str, &str)>,
        body: Option<Value>,
    ) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some((id, role)) = actor {
            builder = builder.header("x-actor-id", id).header("x-actor-role", role);
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.router().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str, actor: (&str, &str)) -> Response<Body> {
        self.send(Method::GET, uri, Some(actor), None).await
    }

    pub async fn post(&self, uri: &str, actor: (&str, &str), body: Option<Value>) -> Response<Body> {
        self.send(Method::POST, uri, Some(actor), body).await
    }
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Parse a decimal that JSON renders as a string
pub fn decimal(value: &Value) -> rust_decimal::Decimal {
    value.as_str().unwrap().parse().unwrap()
}

pub const ADMIN: (&str, &str) = ("ops", "admin");
pub const CLIENT: (&str, &str) = ("client-1", "client");
pub const ADVISOR: (&str, &str) = ("advisor-1", "advisor");
