//! Key endpoint configuration.
//!
//! Configuration is a plain, immutable value. Runtime state (cached keys,
//! transport, body cleanup) lives in [`crate::jwks::KeyStore`], which the
//! caller composes from a resolved [`JwksEndpoint`].
//!
//! The endpoint URL may be overridden through the environment. The lookup is
//! passed in explicitly so tests never touch the process environment.

use crate::error::OpenIdError;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::time::Duration;

/// Environment variable that overrides the configured JWKS URL.
pub const JWKS_URL_ENV_VAR: &str = "MINIO_IAM_JWKS_URL";

/// Default HTTP request timeout for JWKS fetches.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Default connection timeout for JWKS fetches.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Serializable JWKS configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwksConfig {
    /// URL of the provider's published key set. `None` disables JWKS.
    #[serde(default)]
    pub url: Option<String>,
}

impl JwksConfig {
    /// Create a configuration pointing at `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
        }
    }

    /// Resolve the effective endpoint, allowing [`JWKS_URL_ENV_VAR`] to override.
    ///
    /// # Errors
    ///
    /// Returns `OpenIdError::Config` if the effective URL is malformed.
    pub fn resolve_from_env(&self) -> Result<Option<JwksEndpoint>, OpenIdError> {
        self.resolve_with(|name| env::var(name).ok())
    }

    /// Resolve the effective endpoint using an injected override lookup.
    ///
    /// Returns `Ok(None)` when neither the explicit value nor the override
    /// yields a non-empty URL.
    ///
    /// # Errors
    ///
    /// Returns `OpenIdError::Config` if the effective URL is malformed.
    pub fn resolve_with<F>(&self, lookup: F) -> Result<Option<JwksEndpoint>, OpenIdError>
    where
        F: Fn(&str) -> Option<String>,
    {
        match resolve_jwks_url(self.url.as_deref(), lookup) {
            Some(url) => JwksEndpoint::parse(&url).map(Some),
            None => {
                tracing::debug!(target: "openid.config", "No JWKS URL configured");
                Ok(None)
            }
        }
    }
}

/// Pick the effective JWKS URL from an explicit value and an override lookup.
///
/// A non-empty override wins; otherwise the explicit value is used. Empty
/// strings count as unset.
pub fn resolve_jwks_url<F>(explicit: Option<&str>, lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(JWKS_URL_ENV_VAR)
        .filter(|value| !value.is_empty())
        .or_else(|| {
            explicit
                .filter(|value| !value.is_empty())
                .map(ToString::to_string)
        })
}

/// Validated address of a published key set.
#[derive(Clone, PartialEq, Eq)]
pub struct JwksEndpoint {
    url: Url,
}

impl JwksEndpoint {
    /// Parse and validate a JWKS URL.
    ///
    /// # Errors
    ///
    /// Returns `OpenIdError::Config` if the URL does not parse, is not
    /// `http`/`https`, or has no host.
    pub fn parse(raw: &str) -> Result<Self, OpenIdError> {
        let url = Url::parse(raw).map_err(|e| {
            tracing::warn!(target: "openid.config", error = %e, "Malformed JWKS URL");
            OpenIdError::Config(format!("malformed JWKS URL: {e}"))
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(OpenIdError::Config(format!(
                "JWKS URL scheme must be http or https, got '{}'",
                url.scheme()
            )));
        }

        if url.host_str().map_or(true, str::is_empty) {
            return Err(OpenIdError::Config("JWKS URL has no host".to_string()));
        }

        Ok(Self { url })
    }

    /// The endpoint URL.
    pub fn url(&self) -> &Url {
        &self.url
    }
}

// Query strings on JWKS URLs occasionally carry API keys.
impl fmt::Debug for JwksEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut shown = self.url.clone();
        if shown.query().is_some() {
            shown.set_query(Some("[REDACTED]"));
        }
        f.debug_struct("JwksEndpoint")
            .field("url", &shown.as_str())
            .finish()
    }
}

impl fmt::Display for JwksEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            self.url.origin().ascii_serialization(),
            self.url.path()
        )
    }
}
