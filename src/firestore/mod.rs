pub mod access;
pub mod api;
pub mod converter;
pub mod error;
pub mod model;
pub mod remote;
pub mod value;

pub use access::{AsyncResponse, Bindable, DocumentSource, FirestoreDocApi, FirestoreQueryApi, QuerySource};
pub use api::{DocumentSnapshot, Query, QuerySnapshot};
pub use converter::{
    ConverterNode, ConverterSettings, EncodeContext, FieldReader, FirestoreModelConverter, ModeAware,
    ModelConverter, SafeDecode, TransportMode,
};
pub use error::{FirestoreError, FirestoreErrorCode, FirestoreResult};
pub use model::{DocumentKey, Timestamp};
pub use remote::datastore::{Datastore, InMemoryDatastore};
pub use value::{FirestoreValue, ValueKind, WireRecord};
