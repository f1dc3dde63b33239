//! Authenticated JSON-over-HTTP client for the shop backend.
//!
//! # Architecture
//!
//! - [`Transport`] is the one-shot network seam: it takes an [`ApiRequest`]
//!   and yields an [`ApiResponse`] or a [`TransportError`]. No retries.
//!   [`ReqwestTransport`] is the production implementation.
//! - [`ApiClient`] builds locale-prefixed endpoint URLs, attaches the bearer
//!   token when one is stored, and offers typed helpers that turn non-2xx
//!   statuses into [`ApiError::Status`].

mod reqwest_transport;

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use secrecy::SecretString;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, error, warn};
use url::Url;

use crate::config::StorefrontConfig;
use crate::store::{CredentialStore, StoreError};

pub use reqwest_transport::ReqwestTransport;

// =============================================================================
// Wire Types
// =============================================================================

/// HTTP verbs used by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => f.write_str("GET"),
            Self::Post => f.write_str("POST"),
        }
    }
}

/// A fully-resolved request handed to the transport.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: Url,
    pub bearer: Option<SecretString>,
    pub body: Option<serde_json::Value>,
}

/// Raw status and body; decoding is the caller's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ApiResponse {
    /// Whether the status is 2xx.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Network-level failure, distinct from an HTTP error status.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("transport error: {0}")]
    Other(String),
}

/// One-shot request executor.
pub trait Transport: Send + Sync {
    /// Send `request` and wait for the full response body.
    fn send(&self, request: ApiRequest) -> BoxFuture<'_, Result<ApiResponse, TransportError>>;
}

// =============================================================================
// Errors
// =============================================================================

/// Errors from an API call.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}{}", status_suffix(.message.as_deref()))]
    Status {
        status: u16,
        message: Option<String>,
    },

    /// The body did not match the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The endpoint could not be built.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Reading the stored token failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    /// Text suitable for showing to the user.
    ///
    /// Server-provided messages are passed through verbatim; statuses without
    /// one become `code N`.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport(_) => "Network unavailable, please try again".to_string(),
            Self::Status {
                message: Some(message),
                ..
            } => message.clone(),
            Self::Status {
                status,
                message: None,
            } => format!("Error : code {status}"),
            Self::Decode(_) => "Error while decoding".to_string(),
            Self::InvalidUrl(_) | Self::Store(_) => "Something went wrong".to_string(),
        }
    }

    /// Whether the failure happened before any response arrived.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Build a status error, extracting an optional `message` field.
    #[must_use]
    pub fn from_status(response: &ApiResponse) -> Self {
        #[derive(Deserialize)]
        struct ServerMessage {
            message: Option<String>,
        }

        let message = serde_json::from_slice::<ServerMessage>(&response.body)
            .ok()
            .and_then(|m| m.message);

        Self::Status {
            status: response.status,
            message,
        }
    }
}

// =============================================================================
// ApiClient
// =============================================================================

/// Client for the shop REST endpoints.
///
/// Cheap to clone; clones share the transport and credentials.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    transport: Arc<dyn Transport>,
    base_url: Url,
    locale: String,
    credentials: CredentialStore,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("locale", &self.inner.locale)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a client over `transport`.
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        config: &StorefrontConfig,
        credentials: CredentialStore,
    ) -> Self {
        Self {
            inner: Arc::new(ApiClientInner {
                transport,
                base_url: config.base_url.clone(),
                locale: config.locale.clone(),
                credentials,
            }),
        }
    }

    /// The credential store the client reads its token from.
    #[must_use]
    pub fn credentials(&self) -> &CredentialStore {
        &self.inner.credentials
    }

    /// Locale used as path prefix.
    #[must_use]
    pub fn locale(&self) -> &str {
        &self.inner.locale
    }

    /// Resolve `path` (relative to `<base>/<locale>/`) with query pairs
    /// appended in the given order.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidUrl` if the path does not form a valid URL.
    pub fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, ApiError> {
        let mut url = self
            .inner
            .base_url
            .join(&format!("{}/{}", self.inner.locale, path.trim_start_matches('/')))
            .map_err(|e| ApiError::InvalidUrl(format!("{path}: {e}")))?;

        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }

        Ok(url)
    }

    /// Issue a request and return the raw response, whatever its status.
    ///
    /// The stored bearer token is attached when present.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Transport` on network failure, `InvalidUrl` if the
    /// endpoint cannot be built, or `Store` if the token cannot be read.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<serde_json::Value>,
    ) -> Result<ApiResponse, ApiError> {
        let url = self.endpoint(path, query)?;
        let bearer = self.inner.credentials.token()?;

        debug!(%method, url = %url, authenticated = bearer.is_some(), "Sending request");

        let response = self
            .inner
            .transport
            .send(ApiRequest {
                method,
                url,
                bearer,
                body,
            })
            .await?;

        if !response.is_success() {
            warn!(
                %method,
                path,
                status = response.status,
                body = %String::from_utf8_lossy(&response.body).chars().take(200).collect::<String>(),
                "Backend returned non-success status"
            );
        }

        Ok(response)
    }

    /// Issue a request and fail on non-2xx statuses.
    ///
    /// # Errors
    ///
    /// As [`request`](Self::request), plus `ApiError::Status` for non-2xx.
    pub async fn request_ok(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<serde_json::Value>,
    ) -> Result<ApiResponse, ApiError> {
        let response = self.request(method, path, query, body).await?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(ApiError::from_status(&response))
        }
    }

    /// `GET` a JSON document.
    ///
    /// # Errors
    ///
    /// As [`request_ok`](Self::request_ok), plus `ApiError::Decode`.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let response = self.request_ok(Method::Get, path, query, None).await?;
        decode(path, &response.body)
    }

    /// `POST` a JSON body and decode the JSON reply.
    ///
    /// # Errors
    ///
    /// As [`request_ok`](Self::request_ok), plus `ApiError::Decode`.
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        body: serde_json::Value,
    ) -> Result<T, ApiError> {
        let response = self
            .request_ok(Method::Post, path, query, Some(body))
            .await?;
        decode(path, &response.body)
    }
}

fn status_suffix(message: Option<&str>) -> String {
    message.map(|m| format!(": {m}")).unwrap_or_default()
}

/// Decode a JSON body, logging the failure.
///
/// # Errors
///
/// Returns `ApiError::Decode` if `body` is not a `T`.
pub fn decode<T: DeserializeOwned>(path: &str, body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| {
        error!(
            path,
            error = %e,
            body = %String::from_utf8_lossy(body).chars().take(500).collect::<String>(),
            "Failed to decode backend response"
        );
        ApiError::Decode(e.to_string())
    })
}
