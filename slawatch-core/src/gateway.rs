//! Authenticated request gateway
//!
//! Every outbound call goes through here:
//! - Bearer credential injected from the session (omitted when absent)
//! - Non-2xx answers become `RequestFailed` before any body parsing
//! - No retries, no session mutation on 401

use crate::config::ApiConfig;
use crate::error::{ConsoleError, Result};
use crate::session::SessionStore;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Method, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Per-call options.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// Caller headers, merged before the credential.
    pub extra_headers: Vec<(String, String)>,
    /// Attach `Authorization: Bearer <token>` when a token is present.
    pub requires_auth: bool,
}

impl RequestOptions {
    pub fn authenticated() -> Self {
        Self { extra_headers: Vec::new(), requires_auth: true }
    }

    /// For `/auth/login` and `/health`.
    pub fn public() -> Self {
        Self { extra_headers: Vec::new(), requires_auth: false }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.extra_headers.push((name.to_string(), value.to_string()));
        self
    }
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::authenticated()
    }
}

pub struct Gateway {
    client: reqwest::Client,
    base_url: String,
    session: Arc<SessionStore>,
}

impl Gateway {
    pub fn new(config: &ApiConfig, session: Arc<SessionStore>) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(std::time::Duration::from_secs(secs));
        }
        let client = builder.build().map_err(|e| ConsoleError::NetworkUnreachable {
            endpoint: config.base_url.clone(),
            reason: format!("client setup failed: {e}"),
        })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Caller headers plus the bearer credential. Invalid caller headers
    /// are dropped with a warning.
    pub fn build_headers(&self, opts: &RequestOptions) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in &opts.extra_headers {
            match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => warn!("Dropping invalid header {:?}", name),
            }
        }

        if opts.requires_auth {
            let token = self.session.token().filter(|t| !t.trim().is_empty());
            if let Some(token) = token {
                match HeaderValue::from_str(&format!("Bearer {token}")) {
                    Ok(value) => {
                        headers.insert(AUTHORIZATION, value);
                    }
                    Err(_) => warn!("Session token is not a valid header value, sending unauthenticated"),
                }
            }
        }
        headers
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
        opts: &RequestOptions,
    ) -> Result<Response> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .client
            .request(method.clone(), &url)
            .headers(self.build_headers(opts));
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| ConsoleError::NetworkUnreachable {
            endpoint: path.to_string(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        debug!("{} {} -> {}", method, path, status);
        if !status.is_success() {
            return Err(ConsoleError::RequestFailed { status: status.as_u16(), endpoint: path.to_string() });
        }
        Ok(response)
    }

    async fn read_body(path: &str, response: Response) -> Result<Vec<u8>> {
        response.bytes().await.map(|b| b.to_vec()).map_err(|e| ConsoleError::NetworkUnreachable {
            endpoint: path.to_string(),
            reason: format!("body read failed: {e}"),
        })
    }

    fn decode<T: DeserializeOwned>(path: &str, body: &[u8]) -> Result<T> {
        serde_json::from_slice(body).map_err(|e| ConsoleError::MalformedResponse {
            endpoint: path.to_string(),
            reason: e.to_string(),
        })
    }

    /// GET decoded into a strict type.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        opts: &RequestOptions,
    ) -> Result<T> {
        let response = self.send::<()>(Method::GET, path, query, None, opts).await?;
        let body = Self::read_body(path, response).await?;
        Self::decode(path, &body)
    }

    /// GET for endpoints that go through the normalizer. An undecodable
    /// body reads as `null` instead of failing.
    pub async fn get_loose(
        &self,
        path: &str,
        query: &[(&str, String)],
        opts: &RequestOptions,
    ) -> Result<serde_json::Value> {
        let response = self.send::<()>(Method::GET, path, query, None, opts).await?;
        let body = Self::read_body(path, response).await?;
        Ok(serde_json::from_slice(&body).unwrap_or_else(|e| {
            warn!("Unparseable body from {}, using defaults: {}", path, e);
            serde_json::Value::Null
        }))
    }

    /// POST a JSON body, decode a strict response.
    pub async fn post_json<B, T>(&self, path: &str, body: &B, opts: &RequestOptions) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.send(Method::POST, path, &[], Some(body), opts).await?;
        let body = Self::read_body(path, response).await?;
        Self::decode(path, &body)
    }

    /// POST where only success matters; the response body is discarded.
    pub async fn post_command<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: Option<&B>,
        opts: &RequestOptions,
    ) -> Result<()> {
        self.send(Method::POST, path, &[], body, opts).await?;
        Ok(())
    }

    /// GET where only reachability matters.
    pub async fn probe(&self, path: &str, opts: &RequestOptions) -> Result<()> {
        self.send::<()>(Method::GET, path, &[], None, opts).await?;
        Ok(())
    }
}
