use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::firestore::error::{invalid_argument, FirestoreResult};

/// Primitive used for dates when a model is encoded for a function response.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionDateFormat {
    /// RFC 3339 string with nanosecond precision, e.g. `2024-01-02T03:04:05.000000006Z`.
    #[default]
    Iso8601,
    /// Milliseconds since the Unix epoch. Sub-millisecond precision is lost.
    EpochMillis,
}

/// How date-like scalars are written to the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransportMode {
    /// Provider-native timestamps, used for direct database writes.
    Native,
    /// Plain primitives that survive a function-call response.
    FunctionSafe,
}

impl TransportMode {
    pub fn from_function_compatible(value: bool) -> Self {
        if value {
            TransportMode::FunctionSafe
        } else {
            TransportMode::Native
        }
    }

    pub fn is_function_safe(self) -> bool {
        self == TransportMode::FunctionSafe
    }
}

/// Per-converter configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterSettings {
    pub function_date_format: FunctionDateFormat,
}

impl ConverterSettings {
    /// Parses settings from a JSON object; missing keys keep their defaults.
    pub fn from_json(value: &JsonValue) -> FirestoreResult<Self> {
        serde_json::from_value(value.clone())
            .map_err(|err| invalid_argument(format!("Invalid converter settings: {err}")))
    }
}
