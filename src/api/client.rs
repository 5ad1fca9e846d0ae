//! HTTP client with bearer-token injection and session teardown.
//!
//! Every call to the backend goes through [`ApiClient`]. Before sending, the
//! attached [`Session`] is consulted: no token means an anonymous request, a
//! valid token is sent as `Authorization: Bearer <token>`, and an expired token
//! aborts the call locally. A 401 from the backend tears the session down as
//! well. Any other status is returned to the caller untouched.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::multipart::Form;
use reqwest::{Client, Method, Response, StatusCode};
use serde::Serialize;

use super::error::ApiError;
use crate::config::Config;
use crate::session::{Authorization, InvalidationReason, Session};

/// Request payload.
pub enum RequestBody {
    Json(serde_json::Value),
    Multipart(Form),
}

impl RequestBody {
    pub fn json<T: Serialize>(value: &T) -> Result<Self, ApiError> {
        serde_json::to_value(value)
            .map(RequestBody::Json)
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

impl From<serde_json::Value> for RequestBody {
    fn from(value: serde_json::Value) -> Self {
        RequestBody::Json(value)
    }
}

impl From<Form> for RequestBody {
    fn from(form: Form) -> Self {
        RequestBody::Multipart(form)
    }
}

/// Per-call overrides. Caller headers are sent as given, except that a bearer
/// token from the session always replaces any caller `Authorization`.
#[derive(Debug, Default, Clone)]
pub struct RequestOptions {
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: &str, value: &str) -> Result<Self, ApiError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ApiError::InvalidHeader(format!("{}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ApiError::InvalidHeader(format!("{}: {}", name, e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// HTTP client wrapper for the admin backend.
///
/// Manages the base URL and, when a session is attached, the bearer token
/// lifecycle. Without a session no token is ever read or sent.
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: Option<Arc<Session>>,
}

impl ApiClient {
    /// Create an API client with default timeouts and no session.
    pub fn new(base_url: &str) -> Self {
        Self::build(
            base_url,
            None,
            Duration::from_secs(60),
            Duration::from_secs(10),
        )
    }

    /// Create an API client with default timeouts bound to `session`.
    pub fn with_session(base_url: &str, session: Arc<Session>) -> Self {
        Self::build(
            base_url,
            Some(session),
            Duration::from_secs(60),
            Duration::from_secs(10),
        )
    }

    pub fn from_config(config: &Config, session: Option<Arc<Session>>) -> Self {
        Self::build(
            &config.api_base_url,
            session,
            config.request_timeout,
            config.connect_timeout,
        )
    }

    fn build(
        base_url: &str,
        session: Option<Arc<Session>>,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Self {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .default_headers(default_headers)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> Option<&Arc<Session>> {
        self.session.as_ref()
    }

    /// Absolute URL for a path relative to the base URL.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    pub async fn get(&self, path: &str, options: RequestOptions) -> Result<Response, ApiError> {
        self.request(Method::GET, path, None, options).await
    }

    pub async fn post(
        &self,
        path: &str,
        body: Option<RequestBody>,
        options: RequestOptions,
    ) -> Result<Response, ApiError> {
        self.request(Method::POST, path, body, options).await
    }

    pub async fn put(
        &self,
        path: &str,
        body: Option<RequestBody>,
        options: RequestOptions,
    ) -> Result<Response, ApiError> {
        self.request(Method::PUT, path, body, options).await
    }

    pub async fn delete(&self, path: &str, options: RequestOptions) -> Result<Response, ApiError> {
        self.request(Method::DELETE, path, None, options).await
    }

    /// Send one request through the session checks.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<RequestBody>,
        options: RequestOptions,
    ) -> Result<Response, ApiError> {
        let authorization = match &self.session {
            Some(session) => match session.authorize()? {
                Authorization::Expired => {
                    log::info!("Refusing {} {}: stored token expired", method, path);
                    if let Err(e) = session.invalidate(InvalidationReason::Expired) {
                        log::error!("Failed to clear expired session: {}", e);
                    }
                    return Err(ApiError::TokenExpired);
                }
                other => other,
            },
            None => Authorization::Anonymous,
        };

        let RequestOptions {
            mut headers,
            query,
            timeout,
        } = options;

        if let Authorization::Bearer(token) = &authorization {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| ApiError::InvalidHeader(format!("authorization: {}", e)))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let is_multipart = matches!(body, Some(RequestBody::Multipart(_)));
        if is_multipart {
            // reqwest sets the boundary-carrying content type itself.
            headers.remove(CONTENT_TYPE);
        }

        let mut builder = self
            .client
            .request(method.clone(), self.url(path))
            .headers(headers);
        if !query.is_empty() {
            builder = builder.query(&query);
        }
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        builder = match body {
            Some(RequestBody::Json(value)) => builder.json(&value),
            Some(RequestBody::Multipart(form)) => builder.multipart(form),
            None => builder,
        };

        log::debug!(
            "{} {} ({})",
            method,
            path,
            if matches!(authorization, Authorization::Bearer(_)) {
                "authenticated"
            } else {
                "anonymous"
            }
        );
        let response = builder.send().await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            log::info!("{} {} returned 401", method, path);
            if let Some(session) = &self.session {
                if let Err(e) = session.invalidate(InvalidationReason::Unauthorized) {
                    log::error!("Failed to clear rejected session: {}", e);
                }
            }
            return Err(ApiError::Unauthorized(response));
        }

        Ok(response)
    }
}
