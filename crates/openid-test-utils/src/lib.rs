//! # openid-auth Test Utilities
//!
//! Shared test utilities for the `openid-auth` crate.
//!
//! This crate provides:
//! - Crypto fixtures (fixed RSA keys, generated EC keys, HS256 forgeries)
//! - A mocked JWKS endpoint (`TestJwksServer`)
//! - A counting response-body closer
//!
//! ## Usage
//!
//! ```rust,ignore
//! use openid_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let key = TestSigningKey::rsa(1, "rsa-1");
//!     let server = TestJwksServer::publishing(&[&key]).await;
//!     let validator = server.validator();
//!
//!     let token = key.sign(&claims_expiring_in(600));
//!     let validated = validator.validate(&token, "").await.unwrap();
//! }
//! ```

pub mod body_closer;
pub mod crypto_fixtures;
pub mod jwks_server;
pub mod token_builders;

// Re-export commonly used items
pub use body_closer::*;
pub use crypto_fixtures::*;
pub use jwks_server::*;
pub use token_builders::*;
