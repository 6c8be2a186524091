//! Metrics definitions.
//!
//! All metrics follow Prometheus naming conventions:
//! - `openid_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `status`: `success` or `error`
//! - `outcome`: `accepted` or `rejected`
//! - `error_type`: bounded by [`crate::error::OpenIdError::error_type`]

use metrics::{counter, histogram};
use std::time::Duration;

/// Record a JWKS refresh attempt.
///
/// Metric: `openid_jwks_refresh_total`, `openid_jwks_refresh_duration_seconds`
/// Labels: `status`
pub fn record_jwks_refresh(status: &str, duration: Duration) {
    histogram!("openid_jwks_refresh_duration_seconds").record(duration.as_secs_f64());

    counter!("openid_jwks_refresh_total",
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record the outcome of a token validation.
///
/// Metric: `openid_token_validations_total`
/// Labels: `outcome`, `error_type` (`none` when accepted)
pub fn record_token_validation(outcome: &str, error_type: &str) {
    counter!("openid_token_validations_total",
        "outcome" => outcome.to_string(),
        "error_type" => error_type.to_string()
    )
    .increment(1);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    #[test]
    fn test_record_jwks_refresh_increments_counter() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_jwks_refresh("success", Duration::from_millis(12));
            record_jwks_refresh("success", Duration::from_millis(8));
        });

        let snapshot = snapshotter.snapshot().into_vec();
        let counter = snapshot
            .iter()
            .find(|(key, _, _, _)| key.key().name() == "openid_jwks_refresh_total")
            .map(|(_, _, _, value)| value);

        assert_eq!(counter, Some(&DebugValue::Counter(2)));
    }

    #[test]
    fn test_record_token_validation_labels() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_token_validation("rejected", "token_expired");
        });

        let snapshot = snapshotter.snapshot().into_vec();
        let (key, _, _, value) = snapshot
            .iter()
            .find(|(key, _, _, _)| key.key().name() == "openid_token_validations_total")
            .expect("validation counter recorded");

        let labels: Vec<(String, String)> = key
            .key()
            .labels()
            .map(|l| (l.key().to_string(), l.value().to_string()))
            .collect();
        assert!(labels.contains(&("outcome".to_string(), "rejected".to_string())));
        assert!(labels.contains(&("error_type".to_string(), "token_expired".to_string())));
        assert_eq!(value, &DebugValue::Counter(1));
    }
}
