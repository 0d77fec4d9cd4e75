use crate::firestore::error::{invalid_argument, FirestoreResult};
use crate::firestore::model::{DocumentKey, ResourcePath};
use crate::firestore::value::{FirestoreValue, WireRecord};

use super::snapshot::DocumentSnapshot;

/// Equality filter on a top-level field.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldFilter {
    field: String,
    value: FirestoreValue,
}

impl FieldFilter {
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn value(&self) -> &FirestoreValue {
        &self.value
    }

    fn matches(&self, fields: &WireRecord) -> bool {
        fields.get(&self.field) == Some(&self.value)
    }
}

/// A query targeting a specific collection.
///
/// The predicate is opaque to the access components; only the datastore
/// evaluates it.
#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    collection_path: ResourcePath,
    filters: Vec<FieldFilter>,
    limit: Option<usize>,
}

impl Query {
    pub fn new(collection_path: &str) -> FirestoreResult<Self> {
        let collection_path = ResourcePath::from_string(collection_path)?;
        if collection_path.len() % 2 == 0 {
            return Err(invalid_argument(
                "Queries must reference a collection (odd number of path segments)",
            ));
        }
        Ok(Self {
            collection_path,
            filters: Vec::new(),
            limit: None,
        })
    }

    /// Restricts results to documents whose `field` equals `value`.
    pub fn where_equal(mut self, field: impl Into<String>, value: FirestoreValue) -> Self {
        self.filters.push(FieldFilter {
            field: field.into(),
            value,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns the full resource path to the targeted collection.
    pub fn collection_path(&self) -> &ResourcePath {
        &self.collection_path
    }

    pub fn filters(&self) -> &[FieldFilter] {
        &self.filters
    }

    pub fn limit_value(&self) -> Option<usize> {
        self.limit
    }

    /// Returns whether the document at `key` with `fields` satisfies the
    /// collection and filter constraints. The limit is applied by the caller.
    pub fn matches(&self, key: &DocumentKey, fields: &WireRecord) -> bool {
        key.collection_path() == self.collection_path
            && self.filters.iter().all(|filter| filter.matches(fields))
    }
}

/// Ordered result of running a [`Query`].
#[derive(Clone, Debug, PartialEq)]
pub struct QuerySnapshot {
    query: Query,
    documents: Vec<DocumentSnapshot>,
}

impl QuerySnapshot {
    pub fn new(query: Query, documents: Vec<DocumentSnapshot>) -> Self {
        debug_assert!(
            documents.iter().all(DocumentSnapshot::exists),
            "query results only contain existing documents"
        );
        Self { query, documents }
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Documents in the order the backing store returned them.
    pub fn documents(&self) -> &[DocumentSnapshot] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
