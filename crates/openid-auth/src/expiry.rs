//! Session duration policy.
//!
//! A caller may request how long the derived session should last. Requests
//! are bounded to `[MIN_SESSION_DURATION, MAX_SESSION_DURATION]`; an empty
//! request gets [`DEFAULT_SESSION_DURATION`]. The ceiling caps the lifetime
//! of a federated credential that cannot be revoked before it expires.

use crate::error::OpenIdError;
use std::time::Duration;

/// Session duration used when none is requested (1 hour).
pub const DEFAULT_SESSION_DURATION: Duration = Duration::from_secs(3600);

/// Shortest session a caller may request (15 minutes).
pub const MIN_SESSION_DURATION: Duration = Duration::from_secs(900);

/// Longest session a caller may request (12 hours).
pub const MAX_SESSION_DURATION: Duration = Duration::from_secs(43_200);

/// Resolve a requested session duration given in decimal seconds.
///
/// # Errors
///
/// Returns `OpenIdError::InvalidDuration` if `requested` is not a base-10
/// integer or falls outside the allowed range (inclusive).
pub fn resolve_session_duration(requested: &str) -> Result<Duration, OpenIdError> {
    if requested.is_empty() {
        return Ok(DEFAULT_SESSION_DURATION);
    }

    let seconds: i64 = requested.parse().map_err(|e| {
        tracing::debug!(
            target: "openid.expiry",
            error = %e,
            "Requested duration is not an integer"
        );
        OpenIdError::InvalidDuration
    })?;

    let seconds = u64::try_from(seconds).map_err(|_| OpenIdError::InvalidDuration)?;
    let duration = Duration::from_secs(seconds);

    if duration < MIN_SESSION_DURATION || duration > MAX_SESSION_DURATION {
        tracing::debug!(
            target: "openid.expiry",
            requested_secs = seconds,
            "Requested duration out of range"
        );
        return Err(OpenIdError::InvalidDuration);
    }

    Ok(duration)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_request_uses_default() {
        assert_eq!(
            resolve_session_duration("").unwrap(),
            Duration::from_secs(3600)
        );
    }

    #[test]
    fn test_bounds_are_inclusive() {
        assert_eq!(
            resolve_session_duration("900").unwrap(),
            Duration::from_secs(900)
        );
        assert_eq!(
            resolve_session_duration("43200").unwrap(),
            Duration::from_secs(43_200)
        );
    }

    #[test]
    fn test_just_outside_bounds_rejected() {
        assert_eq!(
            resolve_session_duration("899"),
            Err(OpenIdError::InvalidDuration)
        );
        assert_eq!(
            resolve_session_duration("43201"),
            Err(OpenIdError::InvalidDuration)
        );
    }

    #[test]
    fn test_within_range() {
        assert_eq!(
            resolve_session_duration("7200").unwrap(),
            Duration::from_secs(7200)
        );
    }

    #[test]
    fn test_unparsable_rejected() {
        for input in ["abc", "1h", "3600.0", " 3600", "0x384", "-900", "99999999999999999999"] {
            assert_eq!(
                resolve_session_duration(input),
                Err(OpenIdError::InvalidDuration),
                "input {input:?} should be rejected"
            );
        }
    }
}
