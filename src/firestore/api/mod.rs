mod query;
mod snapshot;

pub use query::{FieldFilter, Query, QuerySnapshot};
pub use snapshot::DocumentSnapshot;
