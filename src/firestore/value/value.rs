use serde_json::{Map as JsonMap, Number, Value as JsonValue};

use crate::firestore::error::{invalid_argument, FirestoreResult};
use crate::firestore::model::Timestamp;
use crate::firestore::value::{ArrayValue, MapValue, WireRecord};

#[derive(Clone, Debug, PartialEq)]
pub struct FirestoreValue {
    kind: ValueKind,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ValueKind {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    Timestamp(Timestamp),
    String(String),
    Array(ArrayValue),
    Map(MapValue),
}

impl FirestoreValue {
    pub fn null() -> Self {
        Self {
            kind: ValueKind::Null,
        }
    }

    pub fn from_bool(value: bool) -> Self {
        Self {
            kind: ValueKind::Boolean(value),
        }
    }

    pub fn from_integer(value: i64) -> Self {
        Self {
            kind: ValueKind::Integer(value),
        }
    }

    pub fn from_double(value: f64) -> Self {
        Self {
            kind: ValueKind::Double(value),
        }
    }

    pub fn from_timestamp(value: Timestamp) -> Self {
        Self {
            kind: ValueKind::Timestamp(value),
        }
    }

    pub fn from_string(value: impl Into<String>) -> Self {
        Self {
            kind: ValueKind::String(value.into()),
        }
    }

    pub fn from_array(values: Vec<FirestoreValue>) -> Self {
        Self {
            kind: ValueKind::Array(ArrayValue::new(values)),
        }
    }

    pub fn from_map(map: WireRecord) -> Self {
        Self {
            kind: ValueKind::Map(MapValue::new(map)),
        }
    }

    pub fn kind(&self) -> &ValueKind {
        &self.kind
    }

    pub fn is_null(&self) -> bool {
        matches!(self.kind, ValueKind::Null)
    }

    /// Builds a value from plain JSON. Integral numbers become integers,
    /// everything else numeric becomes a double.
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::null(),
            JsonValue::Bool(flag) => Self::from_bool(*flag),
            JsonValue::Number(number) => match number.as_i64() {
                Some(integer) => Self::from_integer(integer),
                None => Self::from_double(number.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(text) => Self::from_string(text.clone()),
            JsonValue::Array(values) => Self::from_array(values.iter().map(Self::from_json).collect()),
            JsonValue::Object(object) => Self::from_map(
                object
                    .iter()
                    .map(|(key, value)| (key.clone(), Self::from_json(value)))
                    .collect(),
            ),
        }
    }

    /// Renders the value as plain JSON.
    ///
    /// Native timestamps have no JSON form and are rejected, as are non-finite
    /// doubles.
    pub fn to_json(&self) -> FirestoreResult<JsonValue> {
        match &self.kind {
            ValueKind::Null => Ok(JsonValue::Null),
            ValueKind::Boolean(flag) => Ok(JsonValue::Bool(*flag)),
            ValueKind::Integer(integer) => Ok(JsonValue::from(*integer)),
            ValueKind::Double(double) => Number::from_f64(*double)
                .map(JsonValue::Number)
                .ok_or_else(|| invalid_argument(format!("Cannot encode non-finite double {double} as JSON"))),
            ValueKind::Timestamp(_) => Err(invalid_argument(
                "Timestamp values cannot be sent through a function response; encode with function compatibility enabled",
            )),
            ValueKind::String(text) => Ok(JsonValue::String(text.clone())),
            ValueKind::Array(array) => array
                .values()
                .iter()
                .map(FirestoreValue::to_json)
                .collect::<FirestoreResult<Vec<_>>>()
                .map(JsonValue::Array),
            ValueKind::Map(map) => record_to_json(map.fields()),
        }
    }
}

/// Renders a whole wire record as a JSON object.
pub(crate) fn record_to_json(record: &WireRecord) -> FirestoreResult<JsonValue> {
    let mut object = JsonMap::new();
    for (key, value) in record {
        object.insert(key.clone(), value.to_json()?);
    }
    Ok(JsonValue::Object(object))
}
