use std::sync::Arc;

use async_channel::Receiver;
use async_trait::async_trait;

use crate::firestore::api::DocumentSnapshot;
use crate::firestore::error::{FirestoreError, FirestoreResult};
use crate::firestore::model::DocumentKey;
use crate::firestore::remote::datastore::Datastore;
use crate::util::ListenerRegistration;

use super::bindable::Bindable;
use super::engine::{DataCallback, RawListener, StreamEngine, StreamTarget};
use super::response::AsyncResponse;

/// Address and parser for a [`FirestoreDocApi`].
pub trait DocumentSource: Send + Sync + 'static {
    type Model: Clone + Send + Sync + 'static;

    /// The document this source reads.
    fn reference(&self) -> DocumentKey;

    /// Parses a snapshot. Only called for snapshots whose document exists.
    fn parse_data(&self, snapshot: &DocumentSnapshot) -> FirestoreResult<Self::Model>;
}

struct DocumentTarget<S>(S);

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl<S: DocumentSource> StreamTarget for DocumentTarget<S> {
    type Raw = DocumentSnapshot;
    type Output = Option<S::Model>;

    fn empty() -> Self::Output {
        None
    }

    fn describe(&self) -> String {
        format!("document {}", self.0.reference())
    }

    async fn fetch_raw(&self, datastore: &dyn Datastore) -> FirestoreResult<DocumentSnapshot> {
        datastore.get_document(&self.0.reference()).await
    }

    fn listen(
        &self,
        datastore: &dyn Datastore,
        listener: RawListener<DocumentSnapshot>,
    ) -> FirestoreResult<ListenerRegistration> {
        datastore.listen_document(&self.0.reference(), listener)
    }

    fn parse(&self, snapshot: &DocumentSnapshot) -> FirestoreResult<Option<S::Model>> {
        if snapshot.exists() {
            self.0.parse_data(snapshot).map(Some)
        } else {
            Ok(None)
        }
    }
}

/// Fetch and live-stream access to a single document.
///
/// [`cur_data`](Self::cur_data) starts as `None` and only changes while a
/// stream is active; it holds `None` again whenever the document is deleted.
pub struct FirestoreDocApi<S: DocumentSource> {
    engine: StreamEngine<DocumentTarget<S>>,
}

impl<S: DocumentSource> FirestoreDocApi<S> {
    pub fn new(source: S, datastore: Arc<dyn Datastore>) -> Self {
        Self {
            engine: StreamEngine::new(DocumentTarget(source), datastore),
        }
    }

    pub fn source(&self) -> &S {
        &self.engine.target().0
    }

    /// Reads the document once. A missing document is a success holding
    /// `None`. The cell is not updated.
    pub async fn fetch(&self) -> AsyncResponse<Option<S::Model>> {
        self.engine.fetch().await
    }

    /// Starts streaming into [`cur_data`](Self::cur_data), replacing any
    /// active stream.
    pub fn start_stream(&self) -> FirestoreResult<()> {
        self.engine.start_stream(None)
    }

    /// Like [`start_stream`](Self::start_stream), also invoking `on_data` with
    /// every parsed value after the cell is updated. Errors go to
    /// [`stream_errors`](Self::stream_errors), never to `on_data`.
    pub fn start_stream_with<F>(&self, on_data: F) -> FirestoreResult<()>
    where
        F: Fn(Option<&S::Model>) + Send + Sync + 'static,
    {
        let callback: DataCallback<Option<S::Model>> =
            Arc::new(move |data: &Option<S::Model>| on_data(data.as_ref()));
        self.engine.start_stream(Some(callback))
    }

    /// Stops the active stream, if any.
    pub fn stop_stream(&self) {
        self.engine.stop_stream();
    }

    pub fn is_streaming(&self) -> bool {
        self.engine.is_streaming()
    }

    /// Latest value observed by the stream.
    pub fn cur_data(&self) -> &Bindable<Option<S::Model>> {
        self.engine.cur_data()
    }

    /// Transport and parse errors raised while streaming. The stream stays
    /// attached after an error.
    pub fn stream_errors(&self) -> Receiver<FirestoreError> {
        self.engine.stream_errors()
    }
}
