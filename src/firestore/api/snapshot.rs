use crate::firestore::model::DocumentKey;
use crate::firestore::value::{MapValue, WireRecord};

/// Point-in-time read of a single document.
///
/// A snapshot of a missing document is still a valid value: `exists()` is
/// `false` and `data()` returns `None`.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentSnapshot {
    key: DocumentKey,
    data: Option<MapValue>,
}

impl DocumentSnapshot {
    pub fn new(key: DocumentKey, data: Option<MapValue>) -> Self {
        Self { key, data }
    }

    /// Snapshot for an address with no document.
    pub fn missing(key: DocumentKey) -> Self {
        Self::new(key, None)
    }

    /// Returns whether the document exists on the backend.
    pub fn exists(&self) -> bool {
        self.data.is_some()
    }

    /// Returns the decoded document fields if the snapshot contains data.
    pub fn data(&self) -> Option<&WireRecord> {
        self.data.as_ref().map(|map| map.fields())
    }

    pub fn id(&self) -> &str {
        self.key.id()
    }

    pub fn key(&self) -> &DocumentKey {
        &self.key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firestore::value::FirestoreValue;
    use std::collections::BTreeMap;

    #[test]
    fn snapshot_reports_existence() {
        let key = DocumentKey::from_string("users/ada").unwrap();
        let snapshot = DocumentSnapshot::missing(key);
        assert!(!snapshot.exists());
        assert!(snapshot.data().is_none());
        assert_eq!(snapshot.id(), "ada");
    }

    #[test]
    fn snapshot_exposes_fields() {
        let key = DocumentKey::from_string("users/ada").unwrap();
        let fields = BTreeMap::from([("name".to_string(), FirestoreValue::from_string("Ada"))]);
        let snapshot = DocumentSnapshot::new(key, Some(MapValue::new(fields.clone())));
        assert!(snapshot.exists());
        assert_eq!(snapshot.data(), Some(&fields));
    }
}
