//! Wrapped-or-bare parameter decoding
//!
//! The remote API reports most fields either as a bare scalar (`"name": "Intro"`)
//! or inside an envelope object (`"name": {"value": "Intro", ...}`), and any of
//! them may be missing, `null` or empty. Everything in this module absorbs that
//! inconsistency so the rest of the crate only sees plain values.

use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;

/// Envelope field holding the real value
const ENVELOPE_FIELD: &str = "value";

/// Unwrap a raw JSON value, falling back to `default`
///
/// Returns `default` when the value is absent, `null`, an empty string, or
/// cannot be read as `T`. Never fails.
///
/// ```
/// use compmon::value::unwrap_value;
/// use serde_json::json;
///
/// let wrapped = json!({"value": "Intro", "id": 3});
/// assert_eq!(unwrap_value(Some(&wrapped), String::new()), "Intro");
/// assert_eq!(unwrap_value(Some(&json!(true)), false), true);
/// assert_eq!(unwrap_value(None, 7_i64), 7);
/// ```
pub fn unwrap_value<T: DeserializeOwned>(raw: Option<&Value>, default: T) -> T {
    extract(raw).unwrap_or(default)
}

/// Inner value of a `{"value": ..}` envelope, or `raw` itself when bare
pub fn unwrap_envelope(raw: &Value) -> &Value {
    match raw {
        Value::Object(map) => map.get(ENVELOPE_FIELD).unwrap_or(raw),
        other => other,
    }
}

fn extract<T: DeserializeOwned>(raw: Option<&Value>) -> Option<T> {
    match unwrap_envelope(raw?) {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        value => T::deserialize(value).ok(),
    }
}

/// A remote parameter that may be wrapped, bare, or absent
///
/// Decoding never fails: anything unusable becomes an absent parameter.
/// Use with `#[serde(default)]` so missing fields decode as absent too.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param<T>(Option<T>);

impl<T> Default for Param<T> {
    fn default() -> Self {
        Param(None)
    }
}

impl<T> Param<T> {
    /// A parameter carrying `value`
    pub fn present(value: T) -> Self {
        Param(Some(value))
    }

    /// An absent parameter
    pub fn absent() -> Self {
        Param(None)
    }

    pub fn get(&self) -> Option<&T> {
        self.0.as_ref()
    }

    pub fn is_present(&self) -> bool {
        self.0.is_some()
    }

    pub fn into_option(self) -> Option<T> {
        self.0
    }
}

impl<T: Clone> Param<T> {
    /// The value, or `default` when absent
    pub fn get_or(&self, default: T) -> T {
        self.0.clone().unwrap_or(default)
    }
}

impl<T: DeserializeOwned> Param<T> {
    /// Decode from an optional untyped JSON value
    pub fn from_json(raw: Option<&Value>) -> Self {
        Param(extract(raw))
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Param<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        Ok(Param::from_json(Some(&raw)))
    }
}
