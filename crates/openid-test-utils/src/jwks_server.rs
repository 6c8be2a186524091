//! Mocked JWKS endpoint for key store and validator tests.
//!
//! Wraps a `wiremock` server that serves a JWKS document at
//! [`JWKS_PATH`]. Tests can swap the published keys or make the endpoint
//! fail, and count how many times the key set was fetched.

use crate::body_closer::CountingCloser;
use crate::crypto_fixtures::{jwks_document, TestSigningKey};
use openid_auth::jwks::KeyStore;
use openid_auth::jwt::JwtValidator;
use openid_auth::transport::ReqwestTransport;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path the mocked provider publishes its key set on.
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// Mocked identity provider JWKS endpoint.
pub struct TestJwksServer {
    mock_server: MockServer,
    fetches: Arc<AtomicUsize>,
}

impl TestJwksServer {
    /// Start a server that publishes no keys yet (every GET returns 404).
    pub async fn start() -> Self {
        Self {
            mock_server: MockServer::start().await,
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Start a server publishing `keys`.
    pub async fn publishing(keys: &[&TestSigningKey]) -> Self {
        let server = Self::start().await;
        server.publish(keys).await;
        server
    }

    /// Replace the published key set.
    pub async fn publish(&self, keys: &[&TestSigningKey]) {
        self.respond_with(ResponseTemplate::new(200).set_body_json(jwks_document(keys)))
            .await;
    }

    /// Replace the published document with arbitrary JSON.
    pub async fn publish_json(&self, document: &Value) {
        self.respond_with(ResponseTemplate::new(200).set_body_json(document))
            .await;
    }

    /// Make the endpoint answer with `status` and an empty body.
    pub async fn fail_with(&self, status: u16) {
        self.respond_with(ResponseTemplate::new(status)).await;
    }

    /// Make the endpoint answer 200 with a non-JSON body.
    pub async fn serve_garbage(&self) {
        self.respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .await;
    }

    /// Make the endpoint answer only after `delay`.
    pub async fn publish_delayed(&self, keys: &[&TestSigningKey], delay: Duration) {
        self.respond_with(
            ResponseTemplate::new(200)
                .set_body_json(jwks_document(keys))
                .set_delay(delay),
        )
        .await;
    }

    /// Clear previous mocks and install a single JWKS responder.
    ///
    /// `reset` also drops wiremock's request history, so fetches are counted
    /// here instead.
    async fn respond_with(&self, template: ResponseTemplate) {
        self.mock_server.reset().await;
        let fetches = Arc::clone(&self.fetches);
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(move |_: &wiremock::Request| {
                fetches.fetch_add(1, Ordering::SeqCst);
                template.clone()
            })
            .mount(&self.mock_server)
            .await;
    }

    /// URL of the JWKS document.
    pub fn jwks_url(&self) -> String {
        format!("{}{}", self.mock_server.uri(), JWKS_PATH)
    }

    /// Number of JWKS requests answered by a mounted responder so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Key store pointed at this server, using a counting body closer.
    pub fn key_store(&self) -> (KeyStore, CountingCloser) {
        let closer = CountingCloser::new();
        let transport = ReqwestTransport::new(Duration::from_secs(5))
            .expect("Failed to build test transport");
        let store = KeyStore::configure(
            &self.jwks_url(),
            Arc::new(transport),
            Arc::new(closer.clone()),
        )
        .expect("Failed to configure key store");
        (store, closer)
    }

    /// Validator backed by a fresh key store pointed at this server.
    pub fn validator(&self) -> JwtValidator {
        let (store, _closer) = self.key_store();
        JwtValidator::new(Arc::new(store))
    }
}
