mod array_value;
mod map_value;
mod value;

use std::collections::BTreeMap;

pub use array_value::ArrayValue;
pub use map_value::MapValue;
pub(crate) use value::record_to_json;
pub use value::{FirestoreValue, ValueKind};

/// Schema-less field map exchanged with the backing store.
pub type WireRecord = BTreeMap<String, FirestoreValue>;
