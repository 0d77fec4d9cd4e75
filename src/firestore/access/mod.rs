mod bindable;
mod doc_api;
mod engine;
mod query_api;
mod response;

pub use bindable::Bindable;
pub use doc_api::{DocumentSource, FirestoreDocApi};
pub use query_api::{FirestoreQueryApi, QuerySource};
pub use response::AsyncResponse;
