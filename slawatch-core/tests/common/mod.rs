#![allow(dead_code)]

use slawatch_core::config::ApiConfig;
use slawatch_core::models::Role;
use slawatch_core::{Gateway, MemoryStore, SessionStore};
use slawatch_devkit::MockBackend;
use std::sync::Arc;

pub const OPERATOR_EMAIL: &str = "ops@example.com";

pub fn api_config(base_url: &str) -> ApiConfig {
    ApiConfig { base_url: base_url.to_string(), ..ApiConfig::default() }
}

/// Gateway over an in-memory session, logged in with `token` if given.
pub fn gateway_with(base_url: &str, token: Option<&str>) -> (Arc<SessionStore>, Arc<Gateway>) {
    let session = Arc::new(SessionStore::load(Box::new(MemoryStore::new())));
    if let Some(token) = token {
        session.login(token, Role::Operator, OPERATOR_EMAIL).unwrap();
    }
    let gateway = Arc::new(Gateway::new(&api_config(base_url), session.clone()).unwrap());
    (session, gateway)
}

/// Running backend plus an operator gateway already holding a valid token.
pub async fn operator_setup() -> (MockBackend, String, Arc<SessionStore>, Arc<Gateway>) {
    slawatch_devkit::init_logging();
    let backend = MockBackend::spawn().await.unwrap();
    let token = backend.issue_token("operator");
    let (session, gateway) = gateway_with(backend.base_url(), Some(&token));
    (backend, token, session, gateway)
}

/// Address nothing listens on.
pub async fn closed_port_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}
