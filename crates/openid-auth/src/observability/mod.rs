//! Observability for the key store and token validator.

pub mod metrics;
