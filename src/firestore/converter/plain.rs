//! Generic encode/decode between domain models and plain wire records.
//!
//! Converters implement [`ModelConverter`] and use [`EncodeContext`] and
//! [`FieldReader`] for the individual fields. Nested models are handled by
//! delegating to the sub-converter registered for that field.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

use crate::firestore::error::{decode_error, FirestoreResult};
use crate::firestore::model::Timestamp;
use crate::firestore::value::{FirestoreValue, ValueKind, WireRecord};

use super::model_converter::ModeAware;
use super::settings::{ConverterSettings, FunctionDateFormat, TransportMode};

/// Trait describing how to convert between a domain model and a wire record.
pub trait ModelConverter: Send + Sync {
    /// The strongly typed model associated with this converter.
    type Model;

    /// Encodes the model. Every nested field must be encoded through `ctx` so
    /// the transport mode reaches the whole tree.
    fn to_plain(&self, model: &Self::Model, ctx: &EncodeContext) -> FirestoreResult<WireRecord>;

    /// Decodes a wire record. Nested models receive an empty `id`.
    fn to_model(&self, id: &str, data: &WireRecord) -> FirestoreResult<Self::Model>;

    /// Converters registered for nested fields.
    fn subconverters(&self) -> Vec<&dyn ConverterNode> {
        Vec::new()
    }
}

/// Object-safe view of a registered sub-converter.
pub trait ConverterNode: Send + Sync {
    /// Returns the transport-mode capability when this converter has one.
    fn as_mode_aware(&self) -> Option<&dyn ModeAware> {
        None
    }
}

/// Encoding parameters threaded through a whole converter tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncodeContext {
    mode: TransportMode,
    date_format: FunctionDateFormat,
}

impl EncodeContext {
    pub fn new(mode: TransportMode, settings: &ConverterSettings) -> Self {
        Self {
            mode,
            date_format: settings.function_date_format,
        }
    }

    pub fn native() -> Self {
        Self::new(TransportMode::Native, &ConverterSettings::default())
    }

    pub fn function_safe() -> Self {
        Self::new(TransportMode::FunctionSafe, &ConverterSettings::default())
    }

    pub fn mode(&self) -> TransportMode {
        self.mode
    }

    /// Encodes a date for the current mode. Dates outside years 0001 through
    /// 9999 are rejected in every mode.
    pub fn encode_date(&self, value: &DateTime<Utc>) -> FirestoreResult<FirestoreValue> {
        let timestamp = Timestamp::try_from_date_time(value)?;
        Ok(match (self.mode, self.date_format) {
            (TransportMode::Native, _) => FirestoreValue::from_timestamp(timestamp),
            (TransportMode::FunctionSafe, FunctionDateFormat::Iso8601) => {
                FirestoreValue::from_string(value.to_rfc3339_opts(SecondsFormat::Nanos, true))
            }
            (TransportMode::FunctionSafe, FunctionDateFormat::EpochMillis) => {
                FirestoreValue::from_integer(value.timestamp_millis())
            }
        })
    }

    pub fn encode_optional_date(&self, value: Option<&DateTime<Utc>>) -> FirestoreResult<FirestoreValue> {
        value.map_or_else(|| Ok(FirestoreValue::null()), |date| self.encode_date(date))
    }

    pub fn encode_nested<C>(&self, converter: &C, model: &C::Model) -> FirestoreResult<FirestoreValue>
    where
        C: ModelConverter + ?Sized,
    {
        Ok(FirestoreValue::from_map(converter.to_plain(model, self)?))
    }

    pub fn encode_nested_list<C>(&self, converter: &C, models: &[C::Model]) -> FirestoreResult<FirestoreValue>
    where
        C: ModelConverter + ?Sized,
    {
        let values = models
            .iter()
            .map(|model| self.encode_nested(converter, model))
            .collect::<FirestoreResult<Vec<_>>>()?;
        Ok(FirestoreValue::from_array(values))
    }
}

/// Typed accessors over a wire record. Missing and `null` fields are treated
/// alike; a present field of the wrong type is always an error.
#[derive(Clone, Copy, Debug)]
pub struct FieldReader<'a> {
    record: &'a WireRecord,
}

impl<'a> FieldReader<'a> {
    pub fn new(record: &'a WireRecord) -> Self {
        Self { record }
    }

    pub fn get(&self, field: &str) -> Option<&'a FirestoreValue> {
        self.record.get(field).filter(|value| !value.is_null())
    }

    pub fn string(&self, field: &str) -> FirestoreResult<String> {
        self.optional_string(field)?
            .ok_or_else(|| decode_error(field, "a string"))
    }

    pub fn string_or(&self, field: &str, default: &str) -> FirestoreResult<String> {
        Ok(self.optional_string(field)?.unwrap_or_else(|| default.to_string()))
    }

    pub fn optional_string(&self, field: &str) -> FirestoreResult<Option<String>> {
        match self.get(field).map(FirestoreValue::kind) {
            None => Ok(None),
            Some(ValueKind::String(value)) => Ok(Some(value.clone())),
            Some(_) => Err(decode_error(field, "a string")),
        }
    }

    pub fn integer(&self, field: &str) -> FirestoreResult<i64> {
        self.optional_integer(field)?
            .ok_or_else(|| decode_error(field, "an integer"))
    }

    pub fn integer_or(&self, field: &str, default: i64) -> FirestoreResult<i64> {
        Ok(self.optional_integer(field)?.unwrap_or(default))
    }

    fn optional_integer(&self, field: &str) -> FirestoreResult<Option<i64>> {
        match self.get(field).map(FirestoreValue::kind) {
            None => Ok(None),
            Some(ValueKind::Integer(value)) => Ok(Some(*value)),
            Some(_) => Err(decode_error(field, "an integer")),
        }
    }

    /// Reads a double; integers are widened.
    pub fn double(&self, field: &str) -> FirestoreResult<f64> {
        self.optional_double(field)?
            .ok_or_else(|| decode_error(field, "a number"))
    }

    pub fn double_or(&self, field: &str, default: f64) -> FirestoreResult<f64> {
        Ok(self.optional_double(field)?.unwrap_or(default))
    }

    fn optional_double(&self, field: &str) -> FirestoreResult<Option<f64>> {
        match self.get(field).map(FirestoreValue::kind) {
            None => Ok(None),
            Some(ValueKind::Double(value)) => Ok(Some(*value)),
            Some(ValueKind::Integer(value)) => Ok(Some(*value as f64)),
            Some(_) => Err(decode_error(field, "a number")),
        }
    }

    pub fn boolean(&self, field: &str) -> FirestoreResult<bool> {
        self.optional_boolean(field)?
            .ok_or_else(|| decode_error(field, "a boolean"))
    }

    pub fn boolean_or(&self, field: &str, default: bool) -> FirestoreResult<bool> {
        Ok(self.optional_boolean(field)?.unwrap_or(default))
    }

    fn optional_boolean(&self, field: &str) -> FirestoreResult<Option<bool>> {
        match self.get(field).map(FirestoreValue::kind) {
            None => Ok(None),
            Some(ValueKind::Boolean(value)) => Ok(Some(*value)),
            Some(_) => Err(decode_error(field, "a boolean")),
        }
    }

    /// Reads a list of strings; a missing field is an empty list.
    pub fn string_list(&self, field: &str) -> FirestoreResult<Vec<String>> {
        match self.get(field).map(FirestoreValue::kind) {
            None => Ok(Vec::new()),
            Some(ValueKind::Array(array)) => array
                .values()
                .iter()
                .map(|value| match value.kind() {
                    ValueKind::String(text) => Ok(text.clone()),
                    _ => Err(decode_error(field, "a list of strings")),
                })
                .collect(),
            Some(_) => Err(decode_error(field, "a list of strings")),
        }
    }

    pub fn nested<C>(&self, field: &str, converter: &C) -> FirestoreResult<C::Model>
    where
        C: ModelConverter + ?Sized,
    {
        match self.get(field).map(FirestoreValue::kind) {
            Some(ValueKind::Map(map)) => converter.to_model("", map.fields()),
            _ => Err(decode_error(field, "a nested object")),
        }
    }

    pub fn optional_nested<C>(&self, field: &str, converter: &C) -> FirestoreResult<Option<C::Model>>
    where
        C: ModelConverter + ?Sized,
    {
        match self.get(field) {
            None => Ok(None),
            Some(_) => self.nested(field, converter).map(Some),
        }
    }

    /// Reads a list of nested models; a missing field is an empty list.
    pub fn nested_list<C>(&self, field: &str, converter: &C) -> FirestoreResult<Vec<C::Model>>
    where
        C: ModelConverter + ?Sized,
    {
        match self.get(field).map(FirestoreValue::kind) {
            None => Ok(Vec::new()),
            Some(ValueKind::Array(array)) => array
                .values()
                .iter()
                .map(|value| match value.kind() {
                    ValueKind::Map(map) => converter.to_model("", map.fields()),
                    _ => Err(decode_error(field, "a list of nested objects")),
                })
                .collect(),
            Some(_) => Err(decode_error(field, "a list of nested objects")),
        }
    }
}

/// Decodes a date from its transport-safe forms: an RFC 3339 string or
/// integer/double epoch milliseconds. Absent values yield `default`.
pub(crate) fn decode_primitive_date(
    value: Option<&FirestoreValue>,
    field: &str,
    default: Option<DateTime<Utc>>,
) -> FirestoreResult<DateTime<Utc>> {
    let Some(value) = value.filter(|value| !value.is_null()) else {
        return default.ok_or_else(|| decode_error(field, "a date"));
    };
    let decoded = match value.kind() {
        ValueKind::String(text) => DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|date| date.with_timezone(&Utc)),
        ValueKind::Integer(millis) => Utc.timestamp_millis_opt(*millis).single(),
        ValueKind::Double(millis) if millis.is_finite() => Utc.timestamp_millis_opt(*millis as i64).single(),
        _ => None,
    };
    decoded.ok_or_else(|| decode_error(field, "a date"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn record() -> WireRecord {
        BTreeMap::from([
            ("name".to_string(), FirestoreValue::from_string("Ada")),
            ("age".to_string(), FirestoreValue::from_integer(36)),
            ("score".to_string(), FirestoreValue::from_integer(7)),
            ("admin".to_string(), FirestoreValue::from_bool(true)),
            ("nickname".to_string(), FirestoreValue::null()),
            (
                "tags".to_string(),
                FirestoreValue::from_array(vec![FirestoreValue::from_string("math")]),
            ),
        ])
    }

    #[test]
    fn reads_primitives() {
        let data = record();
        let reader = FieldReader::new(&data);
        assert_eq!(reader.string("name").unwrap(), "Ada");
        assert_eq!(reader.integer("age").unwrap(), 36);
        assert_eq!(reader.double("score").unwrap(), 7.0);
        assert!(reader.boolean("admin").unwrap());
        assert_eq!(reader.string_list("tags").unwrap(), vec!["math".to_string()]);
    }

    #[test]
    fn defaults_apply_to_missing_and_null() {
        let data = record();
        let reader = FieldReader::new(&data);
        assert_eq!(reader.string_or("nickname", "none").unwrap(), "none");
        assert_eq!(reader.integer_or("missing", 5).unwrap(), 5);
        assert!(reader.string_list("missing").unwrap().is_empty());
        assert!(reader.string("nickname").is_err());
    }

    #[test]
    fn wrong_type_is_an_error_even_with_default() {
        let data = record();
        let reader = FieldReader::new(&data);
        let err = reader.integer_or("name", 0).unwrap_err();
        assert_eq!(err.code_str(), "firestore/invalid-argument");
    }

    #[test]
    fn function_safe_dates_use_configured_format() {
        let date = Utc.timestamp_opt(1_700_000_000, 5_000_000).unwrap();
        let iso = EncodeContext::function_safe().encode_date(&date).unwrap();
        assert_eq!(iso, FirestoreValue::from_string("2023-11-14T22:13:20.005000000Z"));

        let settings = ConverterSettings {
            function_date_format: FunctionDateFormat::EpochMillis,
        };
        let millis = EncodeContext::new(TransportMode::FunctionSafe, &settings).encode_date(&date).unwrap();
        assert_eq!(millis, FirestoreValue::from_integer(1_700_000_000_005));
    }

    #[test]
    fn native_dates_are_timestamps() {
        let date = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let value = EncodeContext::native().encode_date(&date).unwrap();
        assert_eq!(value, FirestoreValue::from_timestamp(Timestamp::new(1_700_000_000, 0)));
    }

    #[test]
    fn dates_outside_timestamp_range_are_rejected_in_every_mode() {
        let far_future = Utc.with_ymd_and_hms(12000, 1, 1, 0, 0, 0).unwrap();
        for ctx in [EncodeContext::native(), EncodeContext::function_safe()] {
            let err = ctx.encode_date(&far_future).unwrap_err();
            assert_eq!(err.code_str(), "firestore/invalid-argument");
        }
        let none = EncodeContext::function_safe().encode_optional_date(None).unwrap();
        assert!(none.is_null());
    }

    #[test]
    fn primitive_dates_decode() {
        let date = Utc.timestamp_millis_opt(1_700_000_000_005).unwrap();
        let from_millis =
            decode_primitive_date(Some(&FirestoreValue::from_integer(1_700_000_000_005)), "at", None).unwrap();
        assert_eq!(from_millis, date);
        let from_iso = decode_primitive_date(
            Some(&FirestoreValue::from_string("2023-11-14T22:13:20.005Z")),
            "at",
            None,
        )
        .unwrap();
        assert_eq!(from_iso, date);
        assert_eq!(decode_primitive_date(None, "at", Some(date)).unwrap(), date);
        assert!(decode_primitive_date(None, "at", None).is_err());
        assert!(decode_primitive_date(Some(&FirestoreValue::from_bool(true)), "at", None).is_err());
    }
}
