//! Key store for an identity provider's published JWKS.
//!
//! The store starts empty and is filled lazily: the validator calls
//! [`KeyStore::refresh`] when a token's `kid` is unknown or its signature does
//! not verify against the cached key. There is no TTL and no background task.
//!
//! # Consistency
//!
//! A refresh downloads and decodes the complete document before touching the
//! cache. The new set then replaces the old one in a single pointer swap, so
//! readers see either the old set or the new one, never a mixture. A failed
//! refresh leaves the previous set in place.
//!
//! # Supported keys
//!
//! `RSA` keys and `EC` keys on P-256 or P-384. P-521 (ES512) is not supported
//! by `jsonwebtoken`, and any entry that cannot be decoded fails the whole
//! document. A provider that publishes a single P-521 key alongside its RSA
//! keys therefore makes every refresh fail: tokens signed with keys already
//! cached keep validating, but rotated-in keys are never picked up.

use crate::config::JwksEndpoint;
use crate::error::OpenIdError;
use crate::observability::metrics;
use crate::transport::{BodyCloser, BodyGuard, JwksTransport};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{Algorithm, DecodingKey};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::instrument;

/// Elliptic curves accepted in `EC` keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcCurve {
    P256,
    P384,
}

impl EcCurve {
    fn from_crv(crv: &str) -> Option<Self> {
        match crv {
            "P-256" => Some(EcCurve::P256),
            "P-384" => Some(EcCurve::P384),
            _ => None,
        }
    }

    /// Byte length of one affine coordinate.
    fn coordinate_len(self) -> usize {
        match self {
            EcCurve::P256 => 32,
            EcCurve::P384 => 48,
        }
    }
}

/// Asymmetric key family of a published key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
    Rsa,
    Ec(EcCurve),
}

impl KeyFamily {
    /// Whether a token signed with `alg` can be verified by a key of this family.
    pub fn supports(self, alg: Algorithm) -> bool {
        matches!(
            (self, alg),
            (
                KeyFamily::Rsa,
                Algorithm::RS256 | Algorithm::RS384 | Algorithm::RS512
            ) | (KeyFamily::Ec(EcCurve::P256), Algorithm::ES256)
                | (KeyFamily::Ec(EcCurve::P384), Algorithm::ES384)
        )
    }
}

/// A decoded public key from the provider's key set.
#[derive(Clone)]
pub struct PublicKey {
    kid: String,
    family: KeyFamily,
    alg: Option<String>,
    decoding_key: DecodingKey,
}

impl PublicKey {
    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub fn family(&self) -> KeyFamily {
        self.family
    }

    /// The `alg` the provider pinned this key to, if any.
    pub fn alg(&self) -> Option<&str> {
        self.alg.as_deref()
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("kid", &self.kid)
            .field("family", &self.family)
            .field("alg", &self.alg)
            .finish_non_exhaustive()
    }
}

/// Public keys indexed by key identifier.
pub type KeySet = HashMap<String, PublicKey>;

/// Lazily refreshed cache of a provider's public keys.
pub struct KeyStore {
    endpoint: JwksEndpoint,
    transport: Arc<dyn JwksTransport>,
    closer: Arc<dyn BodyCloser>,
    keys: RwLock<Arc<KeySet>>,
}

impl KeyStore {
    /// Configure a key store for the given endpoint URL.
    ///
    /// # Errors
    ///
    /// Returns `OpenIdError::Config` if `endpoint` is not a valid http(s) URL.
    pub fn configure(
        endpoint: &str,
        transport: Arc<dyn JwksTransport>,
        closer: Arc<dyn BodyCloser>,
    ) -> Result<Self, OpenIdError> {
        let endpoint = JwksEndpoint::parse(endpoint)?;
        Ok(Self::new(endpoint, transport, closer))
    }

    /// Create a key store for an already validated endpoint.
    pub fn new(
        endpoint: JwksEndpoint,
        transport: Arc<dyn JwksTransport>,
        closer: Arc<dyn BodyCloser>,
    ) -> Self {
        Self {
            endpoint,
            transport,
            closer,
            keys: RwLock::new(Arc::new(KeySet::new())),
        }
    }

    pub fn endpoint(&self) -> &JwksEndpoint {
        &self.endpoint
    }

    /// Look up a key by `kid`. Unknown ids yield `None`.
    pub async fn lookup(&self, kid: &str) -> Option<PublicKey> {
        let keys = self.keys.read().await;
        let key = keys.get(kid).cloned();
        if key.is_none() {
            tracing::debug!(target: "openid.jwks", kid = %kid, "Key not found in JWKS cache");
        }
        key
    }

    /// Number of keys in the current set.
    pub async fn key_count(&self) -> usize {
        self.keys.read().await.len()
    }

    /// Snapshot of the current key set.
    pub async fn snapshot(&self) -> Arc<KeySet> {
        Arc::clone(&*self.keys.read().await)
    }

    /// Fetch the key set and replace the cache with it.
    ///
    /// # Errors
    ///
    /// - `OpenIdError::Network` if the request or body read fails
    /// - `OpenIdError::HttpStatus` if the endpoint answers with a non-2xx status
    /// - `OpenIdError::Decode` if the document or any entry cannot be decoded
    ///
    /// On error the previously cached keys are kept.
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    pub async fn refresh(&self) -> Result<(), OpenIdError> {
        let start = Instant::now();
        let result = self.fetch_key_set().await;

        match result {
            Ok(keys) => {
                let key_count = keys.len();
                *self.keys.write().await = Arc::new(keys);

                metrics::record_jwks_refresh("success", start.elapsed());
                tracing::info!(target: "openid.jwks", key_count, "JWKS cache refreshed");
                Ok(())
            }
            Err(e) => {
                metrics::record_jwks_refresh("error", start.elapsed());
                tracing::warn!(target: "openid.jwks", error = %e, "JWKS refresh failed");
                Err(e)
            }
        }
    }

    async fn fetch_key_set(&self) -> Result<KeySet, OpenIdError> {
        tracing::debug!(target: "openid.jwks", "Fetching JWKS");

        let response = self.transport.get(self.endpoint.url()).await?;
        let status = response.status;
        let is_success = response.is_success();
        let mut body = BodyGuard::new(response.body, self.closer.as_ref());

        if !is_success {
            tracing::error!(target: "openid.jwks", status, "JWKS endpoint returned error");
            return Err(OpenIdError::HttpStatus(status));
        }

        let bytes = body.read_all().await?;
        decode_key_set(&bytes)
    }
}

impl fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyStore")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

/// Decode a JWKS document into a key set.
///
/// The body is parsed into an untyped JSON value first; each entry is then
/// converted explicitly. Any undecodable entry fails the whole document.
///
/// # Errors
///
/// Returns `OpenIdError::Decode` if the document is not a JSON object with a
/// `keys` array, or if any entry cannot be decoded.
pub fn decode_key_set(body: &[u8]) -> Result<KeySet, OpenIdError> {
    let document: Value = serde_json::from_slice(body).map_err(|e| {
        tracing::error!(target: "openid.jwks", error = %e, "Failed to parse JWKS response");
        OpenIdError::Decode(format!("invalid JWKS document: {e}"))
    })?;

    let entries = document
        .get("keys")
        .and_then(Value::as_array)
        .ok_or_else(|| OpenIdError::Decode("JWKS document has no keys array".to_string()))?;

    let mut keys = KeySet::with_capacity(entries.len());
    for entry in entries {
        let key = decode_jwk(entry)?;
        keys.insert(key.kid.clone(), key);
    }

    Ok(keys)
}

/// Decode one JWK entry into a public key.
fn decode_jwk(entry: &Value) -> Result<PublicKey, OpenIdError> {
    let kid = str_field(entry, "kid")
        .filter(|kid| !kid.is_empty())
        .ok_or_else(|| OpenIdError::Decode("JWK entry missing kid".to_string()))?;

    let kty = str_field(entry, "kty")
        .ok_or_else(|| OpenIdError::Decode(format!("JWK '{kid}' missing kty")))?;

    let (family, decoding_key) = match kty {
        "RSA" => {
            let n = required_field(entry, kid, "n")?;
            let e = required_field(entry, kid, "e")?;
            let key = DecodingKey::from_rsa_components(n, e).map_err(|err| {
                OpenIdError::Decode(format!("JWK '{kid}' has invalid RSA components: {err}"))
            })?;
            (KeyFamily::Rsa, key)
        }
        "EC" => {
            let crv = required_field(entry, kid, "crv")?;
            let curve = EcCurve::from_crv(crv).ok_or_else(|| {
                OpenIdError::Decode(format!("JWK '{kid}' uses unsupported curve '{crv}'"))
            })?;
            let x = required_field(entry, kid, "x")?;
            let y = required_field(entry, kid, "y")?;
            check_coordinate(kid, "x", x, curve)?;
            check_coordinate(kid, "y", y, curve)?;
            let key = DecodingKey::from_ec_components(x, y).map_err(|err| {
                OpenIdError::Decode(format!("JWK '{kid}' has invalid EC components: {err}"))
            })?;
            (KeyFamily::Ec(curve), key)
        }
        other => {
            return Err(OpenIdError::Decode(format!(
                "JWK '{kid}' has unsupported key type '{other}'"
            )));
        }
    };

    Ok(PublicKey {
        kid: kid.to_string(),
        family,
        alg: str_field(entry, "alg").map(ToString::to_string),
        decoding_key,
    })
}

fn str_field<'a>(entry: &'a Value, name: &str) -> Option<&'a str> {
    entry.get(name).and_then(Value::as_str)
}

fn required_field<'a>(entry: &'a Value, kid: &str, name: &str) -> Result<&'a str, OpenIdError> {
    str_field(entry, name)
        .ok_or_else(|| OpenIdError::Decode(format!("JWK '{kid}' missing '{name}'")))
}

fn check_coordinate(kid: &str, name: &str, value: &str, curve: EcCurve) -> Result<(), OpenIdError> {
    let bytes = URL_SAFE_NO_PAD.decode(value).map_err(|e| {
        OpenIdError::Decode(format!("JWK '{kid}' has invalid '{name}' encoding: {e}"))
    })?;

    if bytes.len() != curve.coordinate_len() {
        return Err(OpenIdError::Decode(format!(
            "JWK '{kid}' coordinate '{name}' has {} bytes, expected {}",
            bytes.len(),
            curve.coordinate_len()
        )));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    // 2048-bit modulus; only needs to decode, never to verify.
    const RSA_N: &str = concat!(
        "mEXuUCHqzCgA-tbjRXeBVuTnQc8YEyxxbMD57u9kLW70i02ae20dMC-8b18pOZRXG_cCffo-nJBwmiL6_Zq",
        "Kr3nrgAALaZ9mq95X63cdgdCkkemg7eaZEHdroTK-j89PYQKwfFTQLNqOAxDnOnlYtWwvwFev7npu5A_MU3",
        "vYUuthUcwn4qWw-iwSCanORv7TL00e26D-ZTv2LUxNJ2MYyGRoJKP2ygrlAes9ZL4RxTw7GvZoLrZkxHSH6W",
        "-8ezThLHTGsM_f21Dl5WTBo0PSSIo23v6NsBwGHCxNsBY8qxkYJpiI2tFnZgIHX5gxcJjv1TYw4Fb5yM6F6",
        "WSJjwYuzw"
    );

    fn coordinate(len: usize) -> String {
        URL_SAFE_NO_PAD.encode(vec![7u8; len])
    }

    fn decode(document: &Value) -> Result<KeySet, OpenIdError> {
        decode_key_set(document.to_string().as_bytes())
    }

    #[test]
    fn test_decode_rsa_key() {
        let keys = decode(&json!({
            "keys": [{
                "kty": "RSA",
                "kid": "rsa-1",
                "alg": "RS256",
                "use": "sig",
                "n": RSA_N,
                "e": "AQAB"
            }]
        }))
        .unwrap();

        let key = keys.get("rsa-1").unwrap();
        assert_eq!(key.kid(), "rsa-1");
        assert_eq!(key.family(), KeyFamily::Rsa);
        assert_eq!(key.alg(), Some("RS256"));
    }

    #[test]
    fn test_decode_ec_keys() {
        let keys = decode(&json!({
            "keys": [
                {
                    "kty": "EC",
                    "kid": "ec-256",
                    "crv": "P-256",
                    "x": coordinate(32),
                    "y": coordinate(32)
                },
                {
                    "kty": "EC",
                    "kid": "ec-384",
                    "crv": "P-384",
                    "x": coordinate(48),
                    "y": coordinate(48)
                }
            ]
        }))
        .unwrap();

        assert_eq!(keys.len(), 2);
        assert_eq!(keys.get("ec-256").unwrap().family(), KeyFamily::Ec(EcCurve::P256));
        assert_eq!(keys.get("ec-384").unwrap().family(), KeyFamily::Ec(EcCurve::P384));
        assert!(keys.get("ec-384").unwrap().alg().is_none());
    }

    #[test]
    fn test_decode_empty_key_list() {
        let keys = decode(&json!({"keys": []})).unwrap();
        assert!(keys.is_empty());
    }

    #[test]
    fn test_decode_duplicate_kid_last_wins() {
        let keys = decode(&json!({
            "keys": [
                {"kty": "RSA", "kid": "dup", "alg": "RS256", "n": RSA_N, "e": "AQAB"},
                {"kty": "RSA", "kid": "dup", "alg": "RS512", "n": RSA_N, "e": "AQAB"}
            ]
        }))
        .unwrap();

        assert_eq!(keys.len(), 1);
        assert_eq!(keys.get("dup").unwrap().alg(), Some("RS512"));
    }

    #[test]
    fn test_decode_rejects_non_json() {
        assert!(matches!(
            decode_key_set(b"<html>not json</html>"),
            Err(OpenIdError::Decode(_))
        ));
    }

    #[test]
    fn test_decode_rejects_missing_keys_array() {
        assert!(matches!(decode(&json!({"kids": []})), Err(OpenIdError::Decode(_))));
        assert!(matches!(decode(&json!({"keys": {}})), Err(OpenIdError::Decode(_))));
        assert!(matches!(decode(&json!([])), Err(OpenIdError::Decode(_))));
    }

    #[test]
    fn test_decode_rejects_missing_kid() {
        let result = decode(&json!({"keys": [{"kty": "RSA", "n": RSA_N, "e": "AQAB"}]}));
        assert!(matches!(result, Err(OpenIdError::Decode(msg)) if msg.contains("kid")));

        let result = decode(&json!({"keys": [{"kty": "RSA", "kid": "", "n": RSA_N, "e": "AQAB"}]}));
        assert!(matches!(result, Err(OpenIdError::Decode(_))));
    }

    #[test]
    fn test_decode_rejects_unsupported_kty() {
        let result = decode(&json!({"keys": [{"kty": "oct", "kid": "hmac", "k": "c2VjcmV0"}]}));
        assert!(matches!(result, Err(OpenIdError::Decode(msg)) if msg.contains("oct")));
    }

    #[test]
    fn test_decode_rejects_unsupported_curve() {
        let result = decode(&json!({
            "keys": [{
                "kty": "EC",
                "kid": "ec-521",
                "crv": "P-521",
                "x": coordinate(66),
                "y": coordinate(66)
            }]
        }));
        assert!(matches!(result, Err(OpenIdError::Decode(msg)) if msg.contains("P-521")));
    }

    #[test]
    fn test_decode_rejects_wrong_coordinate_length() {
        let result = decode(&json!({
            "keys": [{
                "kty": "EC",
                "kid": "ec",
                "crv": "P-256",
                "x": coordinate(48),
                "y": coordinate(32)
            }]
        }));
        assert!(matches!(result, Err(OpenIdError::Decode(_))));
    }

    #[test]
    fn test_decode_rejects_missing_rsa_exponent() {
        let result = decode(&json!({"keys": [{"kty": "RSA", "kid": "rsa", "n": RSA_N}]}));
        assert!(matches!(result, Err(OpenIdError::Decode(msg)) if msg.contains("'e'")));
    }

    #[test]
    fn test_one_bad_entry_fails_whole_document() {
        let result = decode(&json!({
            "keys": [
                {"kty": "RSA", "kid": "good", "n": RSA_N, "e": "AQAB"},
                {"kty": "RSA", "kid": "bad", "n": "!!!", "e": "AQAB"}
            ]
        }));
        assert!(matches!(result, Err(OpenIdError::Decode(_))));
    }

    #[test]
    fn test_family_supports_algorithms() {
        assert!(KeyFamily::Rsa.supports(Algorithm::RS256));
        assert!(KeyFamily::Rsa.supports(Algorithm::RS512));
        assert!(!KeyFamily::Rsa.supports(Algorithm::ES256));
        assert!(KeyFamily::Ec(EcCurve::P256).supports(Algorithm::ES256));
        assert!(!KeyFamily::Ec(EcCurve::P256).supports(Algorithm::ES384));
        assert!(KeyFamily::Ec(EcCurve::P384).supports(Algorithm::ES384));
        assert!(!KeyFamily::Rsa.supports(Algorithm::HS256));
    }

    #[test]
    fn test_public_key_debug_hides_material() {
        let keys = decode(&json!({
            "keys": [{"kty": "RSA", "kid": "rsa-1", "n": RSA_N, "e": "AQAB"}]
        }))
        .unwrap();
        let debug_str = format!("{:?}", keys.get("rsa-1").unwrap());
        assert!(debug_str.contains("rsa-1"));
        assert!(!debug_str.contains(RSA_N));
    }
}
