//! Session-authenticated client for the HR backend.
//!
//! The backend signals an expired session in the response *body* (the
//! [`SESSION_TIMEOUT_SENTINEL`] string under `data`), not at the HTTP layer.
//! [`TeamworkClient::call_with_reauth`] owns the recovery loop: it lazily
//! authenticates into a caller-held session slot, clears the slot when the
//! sentinel appears, and gives up after [`MAX_SESSION_ATTEMPTS`]
//! authentications.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use leavelink_core::config::TeamworkConfig;

use crate::session::{AuthRequest, AuthResponse, Session};

/// Body value the backend uses to report an expired session.
pub const SESSION_TIMEOUT_SENTINEL: &str = "Session Timeout. Please sign in again.";

/// Authentication attempts before a persistent timeout is surfaced.
pub const MAX_SESSION_ATTEMPTS: u32 = 3;

const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BackendRequest {
    pub method: Method,
    pub endpoint: String,
    pub payload: Option<Value>,
    pub query: Vec<(String, String)>,
}

impl BackendRequest {
    pub fn get(endpoint: impl Into<String>) -> Self {
        Self { method: Method::Get, endpoint: endpoint.into(), payload: None, query: Vec::new() }
    }

    pub fn put(endpoint: impl Into<String>, payload: Value) -> Self {
        Self {
            method: Method::Put,
            endpoint: endpoint.into(),
            payload: Some(payload),
            query: Vec::new(),
        }
    }

    pub fn post(endpoint: impl Into<String>, payload: Value) -> Self {
        Self {
            method: Method::Post,
            endpoint: endpoint.into(),
            payload: Some(payload),
            query: Vec::new(),
        }
    }

    pub fn with_query(mut self, pairs: &[(&str, &str)]) -> Self {
        self.query =
            pairs.iter().map(|(key, value)| (key.to_string(), value.to_string())).collect();
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BackendResponse {
    pub status: u16,
    pub body: Value,
}

impl BackendResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn is_session_timeout(&self) -> bool {
        self.body.get("data").and_then(Value::as_str) == Some(SESSION_TIMEOUT_SENTINEL)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport request failed: {0}")]
    Request(String),
    #[error("transport response decode failed: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum TeamworkError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("backend authentication rejected: {detail}")]
    AuthenticationFailed { detail: String },
    #[error("backend session expired")]
    SessionExpired,
    #[error("session retries exhausted after {attempts} authentication attempts")]
    SessionRetriesExhausted { attempts: u32 },
    #[error("backend returned status {status} for {endpoint}")]
    Status { status: u16, endpoint: String },
    #[error("unexpected backend response for {endpoint}: {detail}")]
    UnexpectedResponse { endpoint: String, detail: String },
}

/// Wire seam for the backend. The production implementation speaks HTTP via
/// reqwest; tests script responses.
#[async_trait]
pub trait TeamworkTransport: Send + Sync {
    /// `session` is `None` only for the authentication call itself.
    async fn execute(
        &self,
        request: &BackendRequest,
        session: Option<&Session>,
    ) -> Result<BackendResponse, TransportError>;
}

pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .timeout(HTTP_REQUEST_TIMEOUT)
            .build()
            .map_err(|error| TransportError::Request(format!("http client build failed: {error}")))?;

        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_string() })
    }
}

#[async_trait]
impl TeamworkTransport for HttpTransport {
    async fn execute(
        &self,
        request: &BackendRequest,
        session: Option<&Session>,
    ) -> Result<BackendResponse, TransportError> {
        let url = format!("{}{}", self.base_url, request.endpoint);
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
        };

        let mut builder = self.http.request(method, url).query(&request.query);
        if let Some(session) = session {
            builder = builder
                .header("x-session-id", &session.session_id)
                .header("x-api-token", &session.api_token);
        }
        if let Some(payload) = &request.payload {
            builder = builder.json(payload);
        }

        let response = builder
            .send()
            .await
            .map_err(|error| TransportError::Request(error.to_string()))?;
        let status = response.status().as_u16();
        let raw = response
            .text()
            .await
            .map_err(|error| TransportError::Decode(error.to_string()))?;

        let body = if raw.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&raw).map_err(|error| {
                TransportError::Decode(format!("invalid json from backend: {error}"))
            })?
        };

        Ok(BackendResponse { status, body })
    }
}

pub struct TeamworkClient {
    transport: Arc<dyn TeamworkTransport>,
    config: TeamworkConfig,
}

impl TeamworkClient {
    pub fn new(config: TeamworkConfig) -> Result<Self, TransportError> {
        let transport = Arc::new(HttpTransport::new(&config.base_url)?);
        Ok(Self { transport, config })
    }

    pub fn with_transport(transport: Arc<dyn TeamworkTransport>, config: TeamworkConfig) -> Self {
        Self { transport, config }
    }

    /// Exchanges the configured portal credentials for a fresh session.
    /// A `Success: false` body is fatal for the invocation.
    pub async fn authenticate(&self) -> Result<Session, TeamworkError> {
        let endpoint = "/api/ops/auth";
        let payload = serde_json::to_value(AuthRequest::from_config(&self.config))
            .map_err(|error| TeamworkError::UnexpectedResponse {
                endpoint: endpoint.to_string(),
                detail: format!("auth payload serialization failed: {error}"),
            })?;
        let request = BackendRequest::post(endpoint, payload);

        let response = self.transport.execute(&request, None).await?;
        if !response.is_success() {
            return Err(TeamworkError::Status { status: response.status, endpoint: endpoint.to_string() });
        }

        let auth: AuthResponse =
            serde_json::from_value(response.body.clone()).map_err(|error| {
                TeamworkError::UnexpectedResponse {
                    endpoint: endpoint.to_string(),
                    detail: format!("auth response decode failed: {error}"),
                }
            })?;

        if !auth.success {
            return Err(TeamworkError::AuthenticationFailed {
                detail: auth.message.unwrap_or_else(|| response.body.to_string()),
            });
        }

        match (auth.session_id, auth.api_token) {
            (Some(session_id), Some(api_token)) => {
                debug!(event_name = "teamwork.auth.session_issued", "backend session established");
                Ok(Session { session_id, api_token })
            }
            _ => Err(TeamworkError::UnexpectedResponse {
                endpoint: endpoint.to_string(),
                detail: "auth success without session credentials".to_string(),
            }),
        }
    }

    async fn dispatch(
        &self,
        session: &Session,
        request: &BackendRequest,
    ) -> Result<BackendResponse, TeamworkError> {
        let response = self.transport.execute(request, Some(session)).await?;
        if response.is_session_timeout() {
            return Err(TeamworkError::SessionExpired);
        }
        Ok(response)
    }

    /// Runs one backend request against the caller-held session slot.
    ///
    /// An empty slot is filled by authenticating first. The session-timeout
    /// sentinel clears the slot and retries; after [`MAX_SESSION_ATTEMPTS`]
    /// authentications the error surfaces to the caller.
    pub async fn call_with_reauth(
        &self,
        session: &mut Option<Session>,
        request: &BackendRequest,
    ) -> Result<BackendResponse, TeamworkError> {
        for attempt in 1..=MAX_SESSION_ATTEMPTS {
            let active = match session.as_ref() {
                Some(existing) => existing.clone(),
                None => {
                    let fresh = self.authenticate().await?;
                    *session = Some(fresh.clone());
                    fresh
                }
            };

            match self.dispatch(&active, request).await {
                Err(TeamworkError::SessionExpired) => {
                    warn!(
                        event_name = "teamwork.session.expired",
                        attempt,
                        max_attempts = MAX_SESSION_ATTEMPTS,
                        method = request.method.as_str(),
                        endpoint = %request.endpoint,
                        "backend session expired; reauthenticating"
                    );
                    *session = None;
                }
                other => return other,
            }
        }

        Err(TeamworkError::SessionRetriesExhausted { attempts: MAX_SESSION_ATTEMPTS })
    }

    /// GET an endpoint, expecting a 2xx body.
    pub async fn get(
        &self,
        session: &mut Option<Session>,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<Value, TeamworkError> {
        self.expect_success(session, BackendRequest::get(endpoint).with_query(query)).await
    }

    /// Runs an arbitrary request through the reauthentication loop and
    /// returns the raw status + body. Callers that need to interpret
    /// statuses themselves (leave submission treats 409 as a verdict) use
    /// this instead of [`get`](Self::get).
    pub async fn request(
        &self,
        session: &mut Option<Session>,
        method: Method,
        endpoint: &str,
        payload: Option<Value>,
        query: &[(&str, &str)],
    ) -> Result<BackendResponse, TeamworkError> {
        let request = BackendRequest {
            method,
            endpoint: endpoint.to_string(),
            payload,
            query: Vec::new(),
        }
        .with_query(query);
        self.call_with_reauth(session, &request).await
    }

    /// Like [`request`](Self::request) but treats any non-2xx status as an
    /// error.
    pub(crate) async fn expect_success(
        &self,
        session: &mut Option<Session>,
        request: BackendRequest,
    ) -> Result<Value, TeamworkError> {
        let response = self.call_with_reauth(session, &request).await?;
        if !response.is_success() {
            return Err(TeamworkError::Status {
                status: response.status,
                endpoint: request.endpoint,
            });
        }
        Ok(response.body)
    }

    pub(crate) fn decode<T: serde::de::DeserializeOwned>(
        endpoint: &str,
        value: Value,
    ) -> Result<T, TeamworkError> {
        serde_json::from_value(value).map_err(|error| TeamworkError::UnexpectedResponse {
            endpoint: endpoint.to_string(),
            detail: error.to_string(),
        })
    }
}
