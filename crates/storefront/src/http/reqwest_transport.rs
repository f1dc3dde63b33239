//! `reqwest`-backed [`Transport`].

use futures::future::BoxFuture;
use secrecy::ExposeSecret;

use super::{ApiRequest, ApiResponse, Method, Transport, TransportError};
use crate::config::StorefrontConfig;

/// Production transport with a per-request timeout.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport using the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Other` if the TLS backend cannot be
    /// initialised.
    pub fn new(config: &StorefrontConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("cynapp/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: ApiRequest) -> BoxFuture<'_, Result<ApiResponse, TransportError>> {
        Box::pin(async move {
            let mut builder = match request.method {
                Method::Get => self.client.get(request.url),
                Method::Post => self.client.post(request.url),
            };

            if let Some(token) = &request.bearer {
                builder = builder.bearer_auth(token.expose_secret());
            }
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }

            let response = builder.send().await.map_err(map_error)?;
            let status = response.status().as_u16();
            let body = response.bytes().await.map_err(map_error)?;

            Ok(ApiResponse {
                status,
                body: body.to_vec(),
            })
        })
    }
}

fn map_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Other(e.to_string())
    }
}
