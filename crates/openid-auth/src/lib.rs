//! Federated OpenID token authentication for the storage identity layer.
//!
//! Verifies provider-issued JWTs against the provider's published JWKS and
//! derives a bounded session duration from the token's own expiry and the
//! caller's requested duration.
//!
//! # Usage
//!
//! ```rust,ignore
//! use openid_auth::config::JwksConfig;
//! use openid_auth::jwks::KeyStore;
//! use openid_auth::jwt::JwtValidator;
//! use openid_auth::transport::{DropBody, ReqwestTransport};
//! use std::sync::Arc;
//!
//! let endpoint = JwksConfig::new("https://idp.example.com/jwks")
//!     .resolve_from_env()?
//!     .ok_or("JWKS not configured")?;
//!
//! let store = KeyStore::new(
//!     endpoint,
//!     Arc::new(ReqwestTransport::with_default_timeout()?),
//!     Arc::new(DropBody),
//! );
//! let validator = JwtValidator::new(Arc::new(store));
//!
//! let validated = validator.validate(token, "3600").await?;
//! let claims = validated.claims();
//! ```

#![warn(clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::must_use_candidate
)]

/// Module for error types
pub mod error;

/// Module for JWKS endpoint configuration
pub mod config;

/// Module for the injected JWKS transport
pub mod transport;

/// Module for dynamically-typed claim values
pub mod claims;

/// Module for the session duration policy
pub mod expiry;

/// Module for the provider key store
pub mod jwks;

/// Module for token validation
pub mod jwt;

/// Module for metrics
pub mod observability;

pub use claims::{ClaimSet, ClaimValue};
pub use error::{OpenIdError, Result};
pub use jwks::KeyStore;
pub use jwt::{JwtValidator, ValidatedClaims, METHOD_ID};
