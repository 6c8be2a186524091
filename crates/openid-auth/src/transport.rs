//! Injected HTTP transport for JWKS fetches.
//!
//! The key store never builds HTTP clients itself. Callers hand it a
//! [`JwksTransport`] (normally [`ReqwestTransport`]) and a [`BodyCloser`]
//! that is invoked exactly once for every response body the store
//! receives, whether the fetch succeeds or fails.

use crate::config::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_HTTP_TIMEOUT};
use crate::error::OpenIdError;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Url;
use std::time::Duration;

/// Response body handed back by a transport.
#[async_trait]
pub trait ResponseBody: Send {
    /// Read the remaining body into memory.
    async fn read_all(&mut self) -> Result<Bytes, OpenIdError>;
}

/// Status line and body of a JWKS response.
pub struct TransportResponse {
    pub status: u16,
    pub body: Box<dyn ResponseBody>,
}

impl TransportResponse {
    /// True for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport used to GET the key-set document.
///
/// Implementations should carry their own deadline; the key store applies
/// no timeout of its own.
#[async_trait]
pub trait JwksTransport: Send + Sync {
    async fn get(&self, url: &Url) -> Result<TransportResponse, OpenIdError>;
}

/// Releases a response body once the key store is done with it.
pub trait BodyCloser: Send + Sync {
    fn close(&self, body: Box<dyn ResponseBody>);
}

/// Closer that simply drops the body.
#[derive(Debug, Default, Clone, Copy)]
pub struct DropBody;

impl BodyCloser for DropBody {
    fn close(&self, body: Box<dyn ResponseBody>) {
        drop(body);
    }
}

/// Scope guard that hands the body to its closer when dropped.
pub(crate) struct BodyGuard<'a> {
    body: Option<Box<dyn ResponseBody>>,
    closer: &'a dyn BodyCloser,
}

impl<'a> BodyGuard<'a> {
    pub(crate) fn new(body: Box<dyn ResponseBody>, closer: &'a dyn BodyCloser) -> Self {
        Self {
            body: Some(body),
            closer,
        }
    }

    pub(crate) async fn read_all(&mut self) -> Result<Bytes, OpenIdError> {
        match self.body.as_mut() {
            Some(body) => body.read_all().await,
            None => Ok(Bytes::new()),
        }
    }
}

impl Drop for BodyGuard<'_> {
    fn drop(&mut self) {
        if let Some(body) = self.body.take() {
            self.closer.close(body);
        }
    }
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport with the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns `OpenIdError::Config` if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, OpenIdError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT.min(timeout))
            .build()
            .map_err(|e| {
                tracing::error!(target: "openid.jwks", error = %e, "Failed to build HTTP client");
                OpenIdError::Config(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self { client })
    }

    /// Build a transport with [`DEFAULT_HTTP_TIMEOUT`].
    ///
    /// # Errors
    ///
    /// Returns `OpenIdError::Config` if the HTTP client cannot be built.
    pub fn with_default_timeout() -> Result<Self, OpenIdError> {
        Self::new(DEFAULT_HTTP_TIMEOUT)
    }

    /// Wrap an existing client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl JwksTransport for ReqwestTransport {
    async fn get(&self, url: &Url) -> Result<TransportResponse, OpenIdError> {
        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            tracing::debug!(target: "openid.jwks", error = %e, "JWKS request failed");
            OpenIdError::Network(e.to_string())
        })?;

        Ok(TransportResponse {
            status: response.status().as_u16(),
            body: Box::new(ReqwestBody(Some(response))),
        })
    }
}

struct ReqwestBody(Option<reqwest::Response>);

#[async_trait]
impl ResponseBody for ReqwestBody {
    async fn read_all(&mut self) -> Result<Bytes, OpenIdError> {
        let Some(response) = self.0.take() else {
            return Ok(Bytes::new());
        };
        response.bytes().await.map_err(|e| {
            tracing::debug!(target: "openid.jwks", error = %e, "Failed to read JWKS body");
            OpenIdError::Network(e.to_string())
        })
    }
}
