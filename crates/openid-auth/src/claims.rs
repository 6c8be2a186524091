//! Claim values carried in a verified token.
//!
//! Payloads are decoded in two phases: first into `serde_json::Value`, then
//! converted explicitly into [`ClaimValue`]. Numeric fields are read through
//! narrow coercion helpers instead of ad-hoc dynamic access.

use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;

/// Name of the expiry claim.
pub const EXPIRY_CLAIM: &str = "exp";

/// Name of the not-before claim.
pub const NOT_BEFORE_CLAIM: &str = "nbf";

/// Name of the issued-at claim.
pub const ISSUED_AT_CLAIM: &str = "iat";

/// Name of the subject claim (redacted in Debug output).
pub const SUBJECT_CLAIM: &str = "sub";

/// A dynamically-typed claim value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ClaimValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Sequence(Vec<ClaimValue>),
    Mapping(BTreeMap<String, ClaimValue>),
}

impl ClaimValue {
    /// Coerce to a Unix timestamp in whole seconds.
    ///
    /// Accepts integers, floating-point numbers (truncated toward zero) and
    /// strings holding a base-10 integer. Everything else yields `None`.
    pub fn as_unix_timestamp(&self) -> Option<i64> {
        match self {
            ClaimValue::Number(n) => n.as_i64().or_else(|| float_to_i64(n.as_f64()?)),
            ClaimValue::String(s) => s.parse::<i64>().ok(),
            _ => None,
        }
    }

    /// The value as a string slice, if it is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ClaimValue::String(s) => Some(s),
            _ => None,
        }
    }
}

// Casting saturates for out-of-range floats; NaN and infinities are rejected.
#[allow(clippy::cast_possible_truncation)]
fn float_to_i64(value: f64) -> Option<i64> {
    value.is_finite().then(|| value.trunc() as i64)
}

impl From<Value> for ClaimValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => ClaimValue::Null,
            Value::Bool(b) => ClaimValue::Bool(b),
            Value::Number(n) => ClaimValue::Number(n),
            Value::String(s) => ClaimValue::String(s),
            Value::Array(items) => {
                ClaimValue::Sequence(items.into_iter().map(ClaimValue::from).collect())
            }
            Value::Object(map) => ClaimValue::Mapping(
                map.into_iter()
                    .map(|(k, v)| (k, ClaimValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<i64> for ClaimValue {
    fn from(value: i64) -> Self {
        ClaimValue::Number(Number::from(value))
    }
}

impl From<&str> for ClaimValue {
    fn from(value: &str) -> Self {
        ClaimValue::String(value.to_string())
    }
}

/// Claims decoded from a single token.
///
/// The `sub` claim is redacted in Debug output to keep subject identifiers
/// out of logs.
#[derive(Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ClaimSet(BTreeMap<String, ClaimValue>);

impl ClaimSet {
    /// Build a claim set from a decoded JSON object.
    pub fn from_json_object(object: Map<String, Value>) -> Self {
        Self(
            object
                .into_iter()
                .map(|(k, v)| (k, ClaimValue::from(v)))
                .collect(),
        )
    }

    pub fn get(&self, name: &str) -> Option<&ClaimValue> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, ClaimValue> {
        self.0.iter()
    }

    /// The `exp` claim coerced to a Unix timestamp, if present and numeric.
    pub fn expiry(&self) -> Option<i64> {
        self.get(EXPIRY_CLAIM)?.as_unix_timestamp()
    }

    /// The `sub` claim, if present and a string.
    pub fn subject(&self) -> Option<&str> {
        self.get(SUBJECT_CLAIM)?.as_str()
    }

    /// Overwrite the `exp` claim with a decimal timestamp.
    pub(crate) fn set_expiry(&mut self, exp: i64) {
        self.0.insert(EXPIRY_CLAIM.to_string(), ClaimValue::from(exp));
    }

    /// Convert back into a JSON value.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl fmt::Debug for ClaimSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, value) in &self.0 {
            if name == SUBJECT_CLAIM {
                map.entry(name, &"[REDACTED]");
            } else {
                map.entry(name, value);
            }
        }
        map.finish()
    }
}

impl<'a> IntoIterator for &'a ClaimSet {
    type Item = (&'a String, &'a ClaimValue);
    type IntoIter = btree_map::Iter<'a, String, ClaimValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
