//! Error types for OpenID token validation.
//!
//! Key-set errors (`Config`, `Network`, `HttpStatus`, `Decode`) come from the
//! key store. Token errors come from the validator. Every error is terminal
//! for the call that raised it; the only retry is the single
//! refresh-and-reverify performed by [`crate::jwt::JwtValidator`].
//!
//! Token-side messages carry no token content. Details are logged where the
//! error is raised.

use thiserror::Error;

/// Errors produced by the key store and the token validator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OpenIdError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("JWKS endpoint returned HTTP status {0}")]
    HttpStatus(u16),

    #[error("Decode error: {0}")]
    Decode(String),

    /// Token is not a three-segment compact JWS, or a segment failed to decode.
    #[error("Malformed token")]
    MalformedToken,

    /// Token exceeds [`crate::jwt::MAX_JWT_SIZE_BYTES`].
    #[error("Token exceeds maximum allowed size")]
    TokenTooLarge,

    /// Token header names an algorithm outside the asymmetric allow-list.
    #[error("Signing algorithm not allowed: {0}")]
    DisallowedAlgorithm(String),

    #[error("Token header is missing a valid kid")]
    MissingKidHeader,

    #[error("Token signature is invalid")]
    SignatureInvalid,

    #[error("Token is expired or not yet valid")]
    TokenExpired,

    #[error("Invalid session duration")]
    InvalidDuration,
}

impl OpenIdError {
    /// Bounded label used for metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            OpenIdError::Config(_) => "config",
            OpenIdError::Network(_) => "network",
            OpenIdError::HttpStatus(_) => "http_status",
            OpenIdError::Decode(_) => "decode",
            OpenIdError::MalformedToken => "malformed_token",
            OpenIdError::TokenTooLarge => "token_too_large",
            OpenIdError::DisallowedAlgorithm(_) => "disallowed_algorithm",
            OpenIdError::MissingKidHeader => "missing_kid",
            OpenIdError::SignatureInvalid => "signature_invalid",
            OpenIdError::TokenExpired => "token_expired",
            OpenIdError::InvalidDuration => "invalid_duration",
        }
    }
}

/// Result type alias using `OpenIdError`
pub type Result<T> = std::result::Result<T, OpenIdError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_message_includes_code() {
        let err = OpenIdError::HttpStatus(503);
        assert_eq!(err.to_string(), "JWKS endpoint returned HTTP status 503");
    }

    #[test]
    fn test_error_type_labels_are_distinct() {
        let errors = [
            OpenIdError::Config(String::new()),
            OpenIdError::Network(String::new()),
            OpenIdError::HttpStatus(500),
            OpenIdError::Decode(String::new()),
            OpenIdError::MalformedToken,
            OpenIdError::TokenTooLarge,
            OpenIdError::DisallowedAlgorithm(String::new()),
            OpenIdError::MissingKidHeader,
            OpenIdError::SignatureInvalid,
            OpenIdError::TokenExpired,
            OpenIdError::InvalidDuration,
        ];

        let mut labels: Vec<&str> = errors.iter().map(OpenIdError::error_type).collect();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), errors.len());
    }
}
