//! OpenID token validation.
//!
//! Validates provider-issued JWTs against the [`KeyStore`] and derives a
//! bounded session duration from the token's own expiry and the caller's
//! request.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Only the signature over `header.payload` is checked by the crypto
//!   library; claims are read from the already decoded payload, so claim
//!   shapes never affect signature verification
//! - Only RS256/RS384/RS512/ES256/ES384 are accepted; HMAC and `none` are
//!   rejected before any key lookup, which blocks key-confusion forgery
//! - A signature failure triggers at most one key refresh and one retry
//! - The derived session never outlives the token
//!
//! # Flow
//!
//! ```text
//! Unverified ──lookup+verify ok──────────────▶ Verified ──temporal+exp ok──▶ Accepted
//!     │                                            ▲   └──────────────────▶ Rejected
//!     └──miss/fail──▶ Retrying ──refresh+verify ok─┘
//!                         └──fail──▶ Rejected
//! ```

use crate::claims::{
    ClaimSet, ClaimValue, EXPIRY_CLAIM, ISSUED_AT_CLAIM, NOT_BEFORE_CLAIM,
};
use crate::error::OpenIdError;
use crate::expiry::resolve_session_duration;
use crate::jwks::{KeyStore, PublicKey};
use crate::observability::metrics;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{crypto, Algorithm};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Identifier tagging credentials produced through this validator.
pub const METHOD_ID: &str = "jwt";

/// Maximum allowed JWT size in bytes (64KB).
///
/// Provider tokens carrying group lists regularly exceed 8KB. Anything past
/// this ceiling is rejected before any base64 decoding or signature work.
pub const MAX_JWT_SIZE_BYTES: usize = 64 * 1024;

/// Maximum allowed clock skew tolerance (10 minutes).
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

/// Signature algorithms accepted in token headers.
pub const ALLOWED_ALGORITHMS: &[(&str, Algorithm)] = &[
    ("RS256", Algorithm::RS256),
    ("RS384", Algorithm::RS384),
    ("RS512", Algorithm::RS512),
    ("ES256", Algorithm::ES256),
    ("ES384", Algorithm::ES384),
];

/// Header fields needed before the signature is trusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TokenHeader {
    pub(crate) alg: Algorithm,
    pub(crate) alg_name: &'static str,
    pub(crate) kid: String,
}

/// A compact JWS split and decoded, signature not yet checked.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct UnverifiedToken<'a> {
    pub(crate) header: TokenHeader,
    /// `header.payload`, the bytes the signature covers.
    pub(crate) signing_input: &'a str,
    pub(crate) signature: &'a str,
    pub(crate) payload: Map<String, Value>,
}

/// Claims of an accepted token plus the session duration granted for it.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedClaims {
    claims: ClaimSet,
    session_duration: Duration,
}

impl ValidatedClaims {
    pub fn claims(&self) -> &ClaimSet {
        &self.claims
    }

    /// Effective session duration: the requested (or default) duration,
    /// clamped to the token's remaining lifetime.
    pub fn session_duration(&self) -> Duration {
        self.session_duration
    }

    pub fn into_claims(self) -> ClaimSet {
        self.claims
    }
}

/// JWT validator backed by a provider key store.
pub struct JwtValidator {
    key_store: Arc<KeyStore>,

    /// Clock skew tolerance applied to `exp`, `nbf` and `iat`.
    clock_skew: Duration,
}

impl JwtValidator {
    /// Create a validator with zero clock skew tolerance.
    pub fn new(key_store: Arc<KeyStore>) -> Self {
        Self {
            key_store,
            clock_skew: Duration::ZERO,
        }
    }

    /// Set the clock skew tolerance.
    ///
    /// # Errors
    ///
    /// Returns `OpenIdError::Config` if `clock_skew` exceeds [`MAX_CLOCK_SKEW`].
    pub fn with_clock_skew(mut self, clock_skew: Duration) -> Result<Self, OpenIdError> {
        if clock_skew > MAX_CLOCK_SKEW {
            return Err(OpenIdError::Config(format!(
                "clock skew must not exceed {} seconds, got {}",
                MAX_CLOCK_SKEW.as_secs(),
                clock_skew.as_secs()
            )));
        }
        self.clock_skew = clock_skew;
        Ok(self)
    }

    /// Identifier of this authentication method.
    pub fn id(&self) -> &'static str {
        METHOD_ID
    }

    pub fn key_store(&self) -> &Arc<KeyStore> {
        &self.key_store
    }

    /// Validate a token against the current time.
    ///
    /// `requested_duration` is a decimal number of seconds, or empty for the
    /// default session duration.
    ///
    /// # Errors
    ///
    /// - `MalformedToken`, `TokenTooLarge`, `DisallowedAlgorithm`,
    ///   `MissingKidHeader` for tokens rejected before key lookup
    /// - `SignatureInvalid` if verification fails after one key refresh
    /// - `Network`, `HttpStatus`, `Decode` if that refresh fails
    /// - `TokenExpired` if the token is not currently valid
    /// - `InvalidDuration` for a bad `exp` claim or requested duration
    pub async fn validate(
        &self,
        token: &str,
        requested_duration: &str,
    ) -> Result<ValidatedClaims, OpenIdError> {
        self.validate_at(token, requested_duration, Utc::now()).await
    }

    /// Validate a token against an explicit `now`.
    ///
    /// # Errors
    ///
    /// Same as [`JwtValidator::validate`].
    #[instrument(skip_all)]
    pub async fn validate_at(
        &self,
        token: &str,
        requested_duration: &str,
        now: DateTime<Utc>,
    ) -> Result<ValidatedClaims, OpenIdError> {
        let result = self.validate_inner(token, requested_duration, now).await;

        match &result {
            Ok(validated) => {
                metrics::record_token_validation("accepted", "none");
                tracing::debug!(
                    target: "openid.jwt",
                    session_secs = validated.session_duration.as_secs(),
                    "Token validated successfully"
                );
            }
            Err(e) => {
                metrics::record_token_validation("rejected", e.error_type());
                tracing::debug!(target: "openid.jwt", error = %e, "Token rejected");
            }
        }

        result
    }

    async fn validate_inner(
        &self,
        token: &str,
        requested_duration: &str,
        now: DateTime<Utc>,
    ) -> Result<ValidatedClaims, OpenIdError> {
        let unverified = parse_unverified(token)?;

        self.verify_with_refresh(&unverified).await?;
        let mut claims = ClaimSet::from_json_object(unverified.payload);

        let now_secs = now.timestamp();
        check_temporal_claims(&claims, now_secs, duration_secs(self.clock_skew))?;

        let exp = claims
            .get(EXPIRY_CLAIM)
            .and_then(ClaimValue::as_unix_timestamp)
            .ok_or_else(|| {
                tracing::debug!(target: "openid.jwt", "Token exp claim missing or not numeric");
                OpenIdError::InvalidDuration
            })?;

        let requested = resolve_session_duration(requested_duration)?;

        let remaining = u64::try_from(exp.saturating_sub(now_secs))
            .map(Duration::from_secs)
            .unwrap_or(Duration::ZERO);
        let session_duration = requested.min(remaining);

        // Reassert the token's own expiry when it ends before the session would.
        let session_end = now_secs.saturating_add(duration_secs(session_duration));
        if exp < session_end {
            claims.set_expiry(exp);
        }

        Ok(ValidatedClaims {
            claims,
            session_duration,
        })
    }

    /// Verify with the cached key; on any failure refresh once and retry once.
    async fn verify_with_refresh(&self, token: &UnverifiedToken<'_>) -> Result<(), OpenIdError> {
        match self.verify_with_cached_key(token).await {
            Err(OpenIdError::SignatureInvalid) => {
                tracing::debug!(
                    target: "openid.jwt",
                    kid = %token.header.kid,
                    "Verification failed with cached keys, refreshing JWKS"
                );
                self.key_store.refresh().await?;
                self.verify_with_cached_key(token).await
            }
            other => other,
        }
    }

    async fn verify_with_cached_key(&self, token: &UnverifiedToken<'_>) -> Result<(), OpenIdError> {
        let key = self
            .key_store
            .lookup(&token.header.kid)
            .await
            .ok_or(OpenIdError::SignatureInvalid)?;

        verify_signature(token, &key)
    }
}

/// Parse header and payload without trusting the signature.
///
/// Rejects anything outside [`ALLOWED_ALGORITHMS`] before the `kid` is even
/// read, so a disallowed token never reaches the key store.
pub(crate) fn parse_unverified(token: &str) -> Result<UnverifiedToken<'_>, OpenIdError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "openid.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(OpenIdError::TokenTooLarge);
    }

    // JWT format: header.payload.signature
    let mut parts = token.split('.');
    let (Some(header_part), Some(payload_part), Some(signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        tracing::debug!(target: "openid.jwt", "Token rejected: invalid JWT format");
        return Err(OpenIdError::MalformedToken);
    };
    let signing_input = token
        .get(..header_part.len() + 1 + payload_part.len())
        .ok_or(OpenIdError::MalformedToken)?;

    let header = decode_json_segment(header_part)?;
    let payload = decode_json_segment(payload_part)?;

    let alg_name = header
        .get("alg")
        .and_then(Value::as_str)
        .ok_or(OpenIdError::MalformedToken)?;

    let Some(&(alg_name, alg)) = ALLOWED_ALGORITHMS
        .iter()
        .find(|(name, _)| *name == alg_name)
    else {
        if alg_name.starts_with("HS") {
            tracing::warn!(
                target: "openid.jwt",
                alg = %alg_name,
                "Token rejected: symmetric algorithm not allowed"
            );
        } else {
            tracing::debug!(
                target: "openid.jwt",
                alg = %alg_name,
                "Token rejected: algorithm not allowed"
            );
        }
        return Err(OpenIdError::DisallowedAlgorithm(alg_name.to_string()));
    };

    let kid = header
        .get("kid")
        .and_then(Value::as_str)
        .filter(|kid| !kid.is_empty())
        .ok_or(OpenIdError::MissingKidHeader)?
        .to_string();

    Ok(UnverifiedToken {
        header: TokenHeader { alg, alg_name, kid },
        signing_input,
        signature,
        payload,
    })
}

fn decode_json_segment(segment: &str) -> Result<Map<String, Value>, OpenIdError> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).map_err(|e| {
        tracing::debug!(target: "openid.jwt", error = %e, "Failed to decode JWT segment base64");
        OpenIdError::MalformedToken
    })?;

    serde_json::from_slice(&bytes).map_err(|e| {
        tracing::debug!(target: "openid.jwt", error = %e, "Failed to parse JWT segment JSON");
        OpenIdError::MalformedToken
    })
}

/// Verify the token's signature with `key`.
///
/// Only the signature over `header.payload` is checked here. Claims come from
/// the payload decoded by [`parse_unverified`] and are validated separately.
fn verify_signature(token: &UnverifiedToken<'_>, key: &PublicKey) -> Result<(), OpenIdError> {
    let header = &token.header;

    if !key.family().supports(header.alg) {
        tracing::debug!(
            target: "openid.jwt",
            kid = %key.kid(),
            alg = %header.alg_name,
            "Key family does not match token algorithm"
        );
        return Err(OpenIdError::SignatureInvalid);
    }

    if let Some(pinned) = key.alg() {
        if pinned != header.alg_name {
            tracing::debug!(
                target: "openid.jwt",
                kid = %key.kid(),
                key_alg = %pinned,
                alg = %header.alg_name,
                "Key is pinned to a different algorithm"
            );
            return Err(OpenIdError::SignatureInvalid);
        }
    }

    let verified = crypto::verify(
        token.signature,
        token.signing_input.as_bytes(),
        key.decoding_key(),
        header.alg,
    )
    .map_err(|e| match e.kind() {
        ErrorKind::Base64(_) => {
            tracing::debug!(
                target: "openid.jwt",
                error = %e,
                "Token signature could not be decoded"
            );
            OpenIdError::MalformedToken
        }
        _ => {
            tracing::debug!(target: "openid.jwt", error = %e, "Token verification failed");
            OpenIdError::SignatureInvalid
        }
    })?;

    if !verified {
        tracing::debug!(target: "openid.jwt", kid = %key.kid(), "Token signature does not match");
        return Err(OpenIdError::SignatureInvalid);
    }

    Ok(())
}

/// Enforce `exp`, `nbf` and `iat` when present and numeric.
fn check_temporal_claims(claims: &ClaimSet, now: i64, skew: i64) -> Result<(), OpenIdError> {
    let timestamp = |name: &str| claims.get(name).and_then(ClaimValue::as_unix_timestamp);

    if let Some(exp) = timestamp(EXPIRY_CLAIM) {
        if now > exp.saturating_add(skew) {
            tracing::debug!(target: "openid.jwt", exp, now, "Token rejected: expired");
            return Err(OpenIdError::TokenExpired);
        }
    }

    if let Some(nbf) = timestamp(NOT_BEFORE_CLAIM) {
        if nbf > now.saturating_add(skew) {
            tracing::debug!(target: "openid.jwt", nbf, now, "Token rejected: not yet valid");
            return Err(OpenIdError::TokenExpired);
        }
    }

    if let Some(iat) = timestamp(ISSUED_AT_CLAIM) {
        if iat > now.saturating_add(skew) {
            tracing::debug!(target: "openid.jwt", iat, now, "Token rejected: issued in the future");
            return Err(OpenIdError::TokenExpired);
        }
    }

    Ok(())
}

fn duration_secs(duration: Duration) -> i64 {
    i64::try_from(duration.as_secs()).unwrap_or(i64::MAX)
}
