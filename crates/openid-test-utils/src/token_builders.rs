//! Claim builders for test tokens.

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

/// Builder for token payloads with timestamps relative to a fixed `now`.
#[derive(Debug, Clone)]
pub struct TestClaimsBuilder {
    now: i64,
    claims: Map<String, Value>,
}

impl TestClaimsBuilder {
    /// Start from typical provider claims, issued at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        let now = now.timestamp();
        let mut claims = Map::new();
        claims.insert("iss".to_string(), json!("https://idp.example.com"));
        claims.insert("sub".to_string(), json!("user-1234"));
        claims.insert("aud".to_string(), json!("storage"));
        claims.insert("iat".to_string(), json!(now));
        Self { now, claims }
    }

    /// Set `exp` to `now + seconds` (negative for already expired).
    pub fn expires_in(self, seconds: i64) -> Self {
        let exp = self.now + seconds;
        self.claim("exp", json!(exp))
    }

    /// Set `nbf` to `now + seconds`.
    pub fn not_before_in(self, seconds: i64) -> Self {
        let nbf = self.now + seconds;
        self.claim("nbf", json!(nbf))
    }

    /// Set an arbitrary claim.
    pub fn claim(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }

    /// Remove a claim.
    pub fn without(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    pub fn build(self) -> Value {
        Value::Object(self.claims)
    }
}

/// Claims expiring `seconds` after the current time.
pub fn claims_expiring_in(seconds: i64) -> Value {
    TestClaimsBuilder::new(Utc::now()).expires_in(seconds).build()
}
