use std::sync::Arc;

use async_trait::async_trait;

use crate::firestore::api::{DocumentSnapshot, Query, QuerySnapshot};
use crate::firestore::error::FirestoreResult;
use crate::firestore::model::DocumentKey;
use crate::util::ListenerRegistration;

pub mod in_memory;

/// Callback receiving every snapshot (or watch error) for a document listener.
pub type DocumentListener = Arc<dyn Fn(FirestoreResult<DocumentSnapshot>) + Send + Sync + 'static>;

/// Callback receiving every result set (or watch error) for a query listener.
pub type QueryListener = Arc<dyn Fn(FirestoreResult<QuerySnapshot>) + Send + Sync + 'static>;

/// Read and watch primitives of the backing document store.
///
/// Implementations must deliver the current state to a new listener, must
/// preserve emission order, and must not invoke a listener after its
/// registration has been detached.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait Datastore: Send + Sync + 'static {
    async fn get_document(&self, key: &DocumentKey) -> FirestoreResult<DocumentSnapshot>;

    async fn run_query(&self, query: &Query) -> FirestoreResult<QuerySnapshot>;

    fn listen_document(
        &self,
        key: &DocumentKey,
        listener: DocumentListener,
    ) -> FirestoreResult<ListenerRegistration>;

    fn listen_query(&self, query: &Query, listener: QueryListener) -> FirestoreResult<ListenerRegistration>;
}

pub use in_memory::InMemoryDatastore;
