use crate::firestore::value::{FirestoreValue, WireRecord};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MapValue {
    fields: WireRecord,
}

impl MapValue {
    pub fn new(fields: WireRecord) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &WireRecord {
        &self.fields
    }

    pub fn get(&self, field: &str) -> Option<&FirestoreValue> {
        self.fields.get(field)
    }

    pub fn into_fields(self) -> WireRecord {
        self.fields
    }
}

impl From<WireRecord> for MapValue {
    fn from(fields: WireRecord) -> Self {
        Self::new(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn stores_map_entries() {
        let mut map = BTreeMap::new();
        map.insert("foo".to_string(), FirestoreValue::from_integer(1));
        let value = MapValue::new(map.clone());
        assert_eq!(value.get("foo"), map.get("foo"));
        assert_eq!(value.into_fields(), map);
    }
}
