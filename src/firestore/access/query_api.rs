use std::sync::Arc;

use async_channel::Receiver;
use async_trait::async_trait;

use crate::firestore::api::{DocumentSnapshot, Query, QuerySnapshot};
use crate::firestore::error::{FirestoreError, FirestoreResult};
use crate::firestore::remote::datastore::Datastore;
use crate::util::ListenerRegistration;

use super::bindable::Bindable;
use super::engine::{DataCallback, RawListener, StreamEngine, StreamTarget};
use super::response::AsyncResponse;

/// Query and per-document parser for a [`FirestoreQueryApi`].
pub trait QuerySource: Send + Sync + 'static {
    type Model: Clone + Send + Sync + 'static;

    /// The query this source runs. Opaque to the component.
    fn query(&self) -> Query;

    /// Parses one document of the result set.
    fn parse_data(&self, snapshot: &DocumentSnapshot) -> FirestoreResult<Self::Model>;
}

struct QueryTarget<S>(S);

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl<S: QuerySource> StreamTarget for QueryTarget<S> {
    type Raw = QuerySnapshot;
    type Output = Vec<S::Model>;

    fn empty() -> Self::Output {
        Vec::new()
    }

    fn describe(&self) -> String {
        format!("query on {}", self.0.query().collection_path())
    }

    async fn fetch_raw(&self, datastore: &dyn Datastore) -> FirestoreResult<QuerySnapshot> {
        datastore.run_query(&self.0.query()).await
    }

    fn listen(
        &self,
        datastore: &dyn Datastore,
        listener: RawListener<QuerySnapshot>,
    ) -> FirestoreResult<ListenerRegistration> {
        datastore.listen_query(&self.0.query(), listener)
    }

    // Fail-fast: one undecodable document fails the whole result set.
    fn parse(&self, snapshot: &QuerySnapshot) -> FirestoreResult<Vec<S::Model>> {
        snapshot
            .documents()
            .iter()
            .map(|document| self.0.parse_data(document))
            .collect()
    }
}

/// Fetch and live-stream access to the ordered result set of a query.
///
/// Results keep the datastore's order. [`cur_data`](Self::cur_data) starts
/// empty and only changes while a stream is active.
pub struct FirestoreQueryApi<S: QuerySource> {
    engine: StreamEngine<QueryTarget<S>>,
}

impl<S: QuerySource> FirestoreQueryApi<S> {
    pub fn new(source: S, datastore: Arc<dyn Datastore>) -> Self {
        Self {
            engine: StreamEngine::new(QueryTarget(source), datastore),
        }
    }

    pub fn source(&self) -> &S {
        &self.engine.target().0
    }

    /// Runs the query once. The cell is not updated.
    pub async fn fetch(&self) -> AsyncResponse<Vec<S::Model>> {
        self.engine.fetch().await
    }

    pub fn start_stream(&self) -> FirestoreResult<()> {
        self.engine.start_stream(None)
    }

    /// Starts streaming and invokes `on_data` with every parsed result set.
    pub fn start_stream_with<F>(&self, on_data: F) -> FirestoreResult<()>
    where
        F: Fn(&[S::Model]) + Send + Sync + 'static,
    {
        let callback: DataCallback<Vec<S::Model>> = Arc::new(move |data: &Vec<S::Model>| on_data(data));
        self.engine.start_stream(Some(callback))
    }

    pub fn stop_stream(&self) {
        self.engine.stop_stream();
    }

    pub fn is_streaming(&self) -> bool {
        self.engine.is_streaming()
    }

    pub fn cur_data(&self) -> &Bindable<Vec<S::Model>> {
        self.engine.cur_data()
    }

    pub fn stream_errors(&self) -> Receiver<FirestoreError> {
        self.engine.stream_errors()
    }
}
