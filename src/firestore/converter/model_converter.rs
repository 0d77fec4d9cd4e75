use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use crate::firestore::api::DocumentSnapshot;
use crate::firestore::error::{decode_error, not_found, FirestoreResult};
use crate::firestore::value::{record_to_json, FirestoreValue, ValueKind, WireRecord};

use super::plain::{decode_primitive_date, ConverterNode, EncodeContext, FieldReader, ModelConverter};
use super::settings::{ConverterSettings, TransportMode};

/// Capability of converters that carry an ambient transport mode.
///
/// Parents propagate mode changes only to sub-converters exposing this
/// capability through [`ConverterNode::as_mode_aware`].
pub trait ModeAware: Send + Sync {
    fn set_function_compatible(&self, value: bool);

    fn is_function_compatible(&self) -> bool;
}

/// Outcome of [`FirestoreModelConverter::from_snapshot_safe`].
///
/// `Absent` and `Invalid` are deliberately distinct: a missing record and a
/// corrupt one call for different handling.
#[derive(Clone, Debug, PartialEq)]
pub enum SafeDecode<T> {
    /// The snapshot has no document.
    Absent,
    /// The document exists but its data could not be decoded.
    Invalid,
    Decoded(T),
}

impl<T> SafeDecode<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, SafeDecode::Absent)
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, SafeDecode::Invalid)
    }

    pub fn decoded(&self) -> Option<&T> {
        match self {
            SafeDecode::Decoded(model) => Some(model),
            _ => None,
        }
    }

    pub fn into_decoded(self) -> Option<T> {
        match self {
            SafeDecode::Decoded(model) => Some(model),
            _ => None,
        }
    }
}

/// Firestore-aware wrapper around a [`ModelConverter`].
///
/// Adds snapshot decoding and a transport mode that decides whether dates are
/// written as native timestamps or as plain primitives that survive a
/// function response. The ambient mode is read once per top-level encode and
/// passed down the converter tree in an [`EncodeContext`], so
/// [`to_plain_for_function`](Self::to_plain_for_function) never has to mutate
/// and restore shared state.
pub struct FirestoreModelConverter<C> {
    inner: C,
    function_compatible: AtomicBool,
    settings: ConverterSettings,
}

impl<C> FirestoreModelConverter<C>
where
    C: ModelConverter,
{
    pub fn new(inner: C) -> Self {
        Self::with_settings(inner, ConverterSettings::default())
    }

    pub fn with_settings(inner: C, settings: ConverterSettings) -> Self {
        Self {
            inner,
            function_compatible: AtomicBool::new(false),
            settings,
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn settings(&self) -> &ConverterSettings {
        &self.settings
    }

    pub fn transport_mode(&self) -> TransportMode {
        TransportMode::from_function_compatible(self.is_function_compatible())
    }

    /// Decodes the snapshot, or returns `None` when the document does not
    /// exist.
    pub fn from_snapshot(&self, snapshot: &DocumentSnapshot) -> FirestoreResult<Option<C::Model>> {
        match snapshot.data() {
            None => Ok(None),
            Some(data) => self.inner.to_model(snapshot.id(), data).map(Some),
        }
    }

    /// Like [`from_snapshot`](Self::from_snapshot) but never fails: decode
    /// errors become [`SafeDecode::Invalid`].
    pub fn from_snapshot_safe(&self, snapshot: &DocumentSnapshot) -> SafeDecode<C::Model> {
        let Some(data) = snapshot.data() else {
            return SafeDecode::Absent;
        };
        match self.inner.to_model(snapshot.id(), data) {
            Ok(model) => SafeDecode::Decoded(model),
            Err(err) => {
                log::debug!("discarding undecodable document {}: {err}", snapshot.key());
                SafeDecode::Invalid
            }
        }
    }

    /// Decodes a snapshot that is expected to exist.
    pub fn parse_snapshot(&self, snapshot: &DocumentSnapshot) -> FirestoreResult<C::Model> {
        self.from_snapshot(snapshot)?
            .ok_or_else(|| not_found(format!("Document {} does not exist", snapshot.key())))
    }

    pub fn decode(&self, id: &str, data: &WireRecord) -> FirestoreResult<C::Model> {
        self.inner.to_model(id, data)
    }

    /// Encodes with the converter's current transport mode.
    pub fn encode(&self, model: &C::Model) -> FirestoreResult<WireRecord> {
        self.encode_with(model, self.transport_mode())
    }

    /// Encodes with function-safe primitives whatever the current mode is.
    /// The converter's mode is left untouched.
    pub fn to_plain_for_function(&self, model: &C::Model) -> FirestoreResult<WireRecord> {
        self.encode_with(model, TransportMode::FunctionSafe)
    }

    /// Function-safe encoding rendered as a JSON response body.
    pub fn to_json_for_function(&self, model: &C::Model) -> FirestoreResult<JsonValue> {
        record_to_json(&self.to_plain_for_function(model)?)
    }

    pub fn encode_with(&self, model: &C::Model, mode: TransportMode) -> FirestoreResult<WireRecord> {
        let ctx = EncodeContext::new(mode, &self.settings);
        self.inner.to_plain(model, &ctx)
    }
}

impl<C> ModeAware for FirestoreModelConverter<C>
where
    C: ModelConverter,
{
    fn set_function_compatible(&self, value: bool) {
        self.function_compatible.store(value, Ordering::SeqCst);
        for node in self.inner.subconverters() {
            if let Some(child) = node.as_mode_aware() {
                child.set_function_compatible(value);
            }
        }
    }

    fn is_function_compatible(&self) -> bool {
        self.function_compatible.load(Ordering::SeqCst)
    }
}

impl<C> ConverterNode for FirestoreModelConverter<C>
where
    C: ModelConverter,
{
    fn as_mode_aware(&self) -> Option<&dyn ModeAware> {
        Some(self)
    }
}

impl<C> ModelConverter for FirestoreModelConverter<C>
where
    C: ModelConverter,
{
    type Model = C::Model;

    fn to_plain(&self, model: &Self::Model, ctx: &EncodeContext) -> FirestoreResult<WireRecord> {
        self.inner.to_plain(model, ctx)
    }

    fn to_model(&self, id: &str, data: &WireRecord) -> FirestoreResult<Self::Model> {
        self.inner.to_model(id, data)
    }

    fn subconverters(&self) -> Vec<&dyn ConverterNode> {
        self.inner.subconverters()
    }
}

/// Decodes a date field, recognizing native timestamps before falling back to
/// the primitive forms.
pub fn decode_date(
    value: Option<&FirestoreValue>,
    field: &str,
    default: Option<DateTime<Utc>>,
) -> FirestoreResult<DateTime<Utc>> {
    if let Some(ValueKind::Timestamp(timestamp)) = value.map(FirestoreValue::kind) {
        return timestamp
            .to_date_time()
            .ok_or_else(|| decode_error(field, "a date"));
    }
    decode_primitive_date(value, field, default)
}

impl<'a> FieldReader<'a> {
    pub fn date(&self, field: &str) -> FirestoreResult<DateTime<Utc>> {
        decode_date(self.get(field), field, None)
    }

    pub fn date_or(&self, field: &str, default: DateTime<Utc>) -> FirestoreResult<DateTime<Utc>> {
        decode_date(self.get(field), field, Some(default))
    }

    pub fn optional_date(&self, field: &str) -> FirestoreResult<Option<DateTime<Utc>>> {
        match self.get(field) {
            None => Ok(None),
            value => decode_date(value, field, None).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firestore::model::{DocumentKey, Timestamp};
    use crate::firestore::value::MapValue;
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    #[derive(Clone, Debug, PartialEq)]
    struct Address {
        city: String,
        moved_in: DateTime<Utc>,
    }

    #[derive(Clone, Debug, PartialEq)]
    struct Badge {
        label: String,
    }

    #[derive(Clone, Debug, PartialEq)]
    struct Profile {
        id: String,
        name: String,
        joined_at: DateTime<Utc>,
        address: Address,
        badges: Vec<Badge>,
    }

    struct AddressConverter;

    impl ModelConverter for AddressConverter {
        type Model = Address;

        fn to_plain(&self, model: &Address, ctx: &EncodeContext) -> FirestoreResult<WireRecord> {
            Ok(BTreeMap::from([
                ("city".to_string(), FirestoreValue::from_string(model.city.clone())),
                ("moved_in".to_string(), ctx.encode_date(&model.moved_in)?),
            ]))
        }

        fn to_model(&self, _id: &str, data: &WireRecord) -> FirestoreResult<Address> {
            let reader = FieldReader::new(data);
            Ok(Address {
                city: reader.string("city")?,
                moved_in: reader.date("moved_in")?,
            })
        }
    }

    // Primitive-only converter: no transport mode of its own.
    struct BadgeConverter;

    impl ConverterNode for BadgeConverter {}

    impl ModelConverter for BadgeConverter {
        type Model = Badge;

        fn to_plain(&self, model: &Badge, _ctx: &EncodeContext) -> FirestoreResult<WireRecord> {
            Ok(BTreeMap::from([(
                "label".to_string(),
                FirestoreValue::from_string(model.label.clone()),
            )]))
        }

        fn to_model(&self, _id: &str, data: &WireRecord) -> FirestoreResult<Badge> {
            Ok(Badge {
                label: FieldReader::new(data).string("label")?,
            })
        }
    }

    struct ProfileConverter {
        address: FirestoreModelConverter<AddressConverter>,
        badge: BadgeConverter,
    }

    impl ModelConverter for ProfileConverter {
        type Model = Profile;

        fn to_plain(&self, model: &Profile, ctx: &EncodeContext) -> FirestoreResult<WireRecord> {
            Ok(BTreeMap::from([
                ("name".to_string(), FirestoreValue::from_string(model.name.clone())),
                ("joined_at".to_string(), ctx.encode_date(&model.joined_at)?),
                ("address".to_string(), ctx.encode_nested(&self.address, &model.address)?),
                ("badges".to_string(), ctx.encode_nested_list(&self.badge, &model.badges)?),
            ]))
        }

        fn to_model(&self, id: &str, data: &WireRecord) -> FirestoreResult<Profile> {
            let reader = FieldReader::new(data);
            Ok(Profile {
                id: id.to_string(),
                name: reader.string("name")?,
                joined_at: reader.date("joined_at")?,
                address: reader.nested("address", &self.address)?,
                badges: reader.nested_list("badges", &self.badge)?,
            })
        }

        fn subconverters(&self) -> Vec<&dyn ConverterNode> {
            vec![&self.address as &dyn ConverterNode, &self.badge]
        }
    }

    fn converter() -> FirestoreModelConverter<ProfileConverter> {
        FirestoreModelConverter::new(ProfileConverter {
            address: FirestoreModelConverter::new(AddressConverter),
            badge: BadgeConverter,
        })
    }

    fn profile() -> Profile {
        Profile {
            id: "ada".to_string(),
            name: "Ada".to_string(),
            joined_at: Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap(),
            address: Address {
                city: "London".to_string(),
                moved_in: Utc.timestamp_opt(1_600_000_000, 42).unwrap(),
            },
            badges: vec![Badge {
                label: "pioneer".to_string(),
            }],
        }
    }

    fn snapshot(data: Option<WireRecord>) -> DocumentSnapshot {
        DocumentSnapshot::new(DocumentKey::from_string("profiles/ada").unwrap(), data.map(MapValue::new))
    }

    fn nested<'a>(record: &'a WireRecord, field: &str) -> &'a WireRecord {
        match record.get(field).map(FirestoreValue::kind) {
            Some(ValueKind::Map(map)) => map.fields(),
            other => panic!("expected map at {field}, got {other:?}"),
        }
    }

    #[test]
    fn native_round_trip() {
        let converter = converter();
        let encoded = converter.encode_with(&profile(), TransportMode::Native).unwrap();
        assert!(matches!(encoded["joined_at"].kind(), ValueKind::Timestamp(_)));
        assert!(matches!(
            nested(&encoded, "address")["moved_in"].kind(),
            ValueKind::Timestamp(_)
        ));
        let decoded = converter.from_snapshot(&snapshot(Some(encoded))).unwrap();
        assert_eq!(decoded, Some(profile()));
    }

    #[test]
    fn function_safe_round_trip() {
        let converter = converter();
        let encoded = converter
            .encode_with(&profile(), TransportMode::FunctionSafe)
            .unwrap();
        assert!(matches!(encoded["joined_at"].kind(), ValueKind::String(_)));
        assert!(matches!(
            nested(&encoded, "address")["moved_in"].kind(),
            ValueKind::String(_)
        ));
        let decoded = converter.decode("ada", &encoded).unwrap();
        assert_eq!(decoded, profile());
    }

    #[test]
    fn to_plain_for_function_leaves_mode_untouched() {
        let converter = converter();
        assert!(!converter.is_function_compatible());

        let encoded = converter.to_plain_for_function(&profile()).unwrap();
        assert!(matches!(encoded["joined_at"].kind(), ValueKind::String(_)));
        assert!(matches!(
            nested(&encoded, "address")["moved_in"].kind(),
            ValueKind::String(_)
        ));

        assert!(!converter.is_function_compatible());
        assert!(!converter.inner().address.is_function_compatible());
        let ambient = converter.encode(&profile()).unwrap();
        assert!(matches!(ambient["joined_at"].kind(), ValueKind::Timestamp(_)));
    }

    #[test]
    fn ambient_mode_applies_to_nested_fields() {
        let converter = converter();
        converter.set_function_compatible(true);
        let encoded = converter.encode(&profile()).unwrap();
        assert!(matches!(
            nested(&encoded, "address")["moved_in"].kind(),
            ValueKind::String(_)
        ));
    }

    #[test]
    fn set_function_compatible_reaches_mode_aware_children_only() {
        let converter = converter();
        converter.set_function_compatible(true);
        assert!(converter.is_function_compatible());
        assert!(converter.inner().address.is_function_compatible());

        let nodes = converter.inner().subconverters();
        assert!(nodes[1].as_mode_aware().is_none());
        let badge = converter
            .inner()
            .badge
            .to_plain(&Badge { label: "x".into() }, &EncodeContext::native())
            .unwrap();
        assert_eq!(badge["label"], FirestoreValue::from_string("x"));

        converter.set_function_compatible(false);
        assert!(!converter.inner().address.is_function_compatible());
    }

    #[test]
    fn to_json_for_function_renders_plain_json() {
        let converter = converter();
        let json = converter.to_json_for_function(&profile()).unwrap();
        assert_eq!(json["name"], "Ada");
        assert_eq!(json["joined_at"], "2023-11-14T22:13:20.123456789Z");
        assert_eq!(json["address"]["city"], "London");
        assert_eq!(json["badges"][0]["label"], "pioneer");
    }

    #[test]
    fn unrepresentable_dates_fail_to_encode_instead_of_round_tripping_badly() {
        let converter = converter();
        let mut far_future = profile();
        far_future.address.moved_in = Utc.with_ymd_and_hms(12000, 1, 1, 0, 0, 0).unwrap();

        let err = converter.to_plain_for_function(&far_future).unwrap_err();
        assert_eq!(err.code_str(), "firestore/invalid-argument");
        assert!(converter.encode(&far_future).is_err());
    }

    #[test]
    fn from_snapshot_absent_is_none() {
        assert_eq!(converter().from_snapshot(&snapshot(None)).unwrap(), None);
    }

    #[test]
    fn from_snapshot_propagates_decode_errors() {
        let data = BTreeMap::from([("name".to_string(), FirestoreValue::from_integer(1))]);
        let err = converter().from_snapshot(&snapshot(Some(data))).unwrap_err();
        assert_eq!(err.code_str(), "firestore/invalid-argument");
    }

    #[test]
    fn from_snapshot_safe_distinguishes_absent_and_invalid() {
        let converter = converter();
        assert_eq!(converter.from_snapshot_safe(&snapshot(None)), SafeDecode::Absent);

        let malformed = BTreeMap::from([("name".to_string(), FirestoreValue::from_bool(false))]);
        let result = converter.from_snapshot_safe(&snapshot(Some(malformed)));
        assert!(result.is_invalid());
        assert!(!result.is_absent());

        let encoded = converter.encode(&profile()).unwrap();
        let result = converter.from_snapshot_safe(&snapshot(Some(encoded)));
        assert_eq!(result.into_decoded(), Some(profile()));
    }

    #[test]
    fn parse_snapshot_requires_existence() {
        let err = converter().parse_snapshot(&snapshot(None)).unwrap_err();
        assert_eq!(err.code_str(), "firestore/not-found");
    }

    #[test]
    fn decode_date_prefers_timestamps_and_falls_back() {
        let date = Utc.timestamp_opt(1_650_000_000, 9).unwrap();
        let native = FirestoreValue::from_timestamp(Timestamp::from_date_time(&date));
        assert_eq!(decode_date(Some(&native), "at", None).unwrap(), date);

        let millis = FirestoreValue::from_integer(1_650_000_000_000);
        assert_eq!(
            decode_date(Some(&millis), "at", None).unwrap(),
            Utc.timestamp_opt(1_650_000_000, 0).unwrap()
        );

        let data = BTreeMap::new();
        let reader = FieldReader::new(&data);
        assert_eq!(reader.date_or("at", date).unwrap(), date);
        assert_eq!(reader.optional_date("at").unwrap(), None);
        assert!(reader.date("at").is_err());
    }
}
