use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_channel::{Receiver, Sender};
use async_trait::async_trait;

use crate::firestore::error::{FirestoreError, FirestoreResult};
use crate::firestore::remote::datastore::Datastore;
use crate::util::ListenerRegistration;

use super::bindable::Bindable;
use super::response::AsyncResponse;

/// Stream errors buffered before new ones are dropped.
pub(crate) const STREAM_ERROR_CAPACITY: usize = 64;

pub(crate) type RawListener<R> = Arc<dyn Fn(FirestoreResult<R>) + Send + Sync + 'static>;

pub(crate) type DataCallback<O> = Arc<dyn Fn(&O) + Send + Sync + 'static>;

/// What a component reads and how it shapes the result: one document into an
/// `Option`, or a query into a `Vec`.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub(crate) trait StreamTarget: Send + Sync + 'static {
    type Raw: Send + 'static;
    type Output: Clone + Send + Sync + 'static;

    /// Value held by the cell before the first delivery.
    fn empty() -> Self::Output;

    /// Human readable address, used in logs.
    fn describe(&self) -> String;

    async fn fetch_raw(&self, datastore: &dyn Datastore) -> FirestoreResult<Self::Raw>;

    fn listen(
        &self,
        datastore: &dyn Datastore,
        listener: RawListener<Self::Raw>,
    ) -> FirestoreResult<ListenerRegistration>;

    fn parse(&self, raw: &Self::Raw) -> FirestoreResult<Self::Output>;
}

/// Fetch and stream machinery shared by the document and query components.
///
/// At most one listener is attached at a time. Starting a stream detaches the
/// previous listener before the new one is registered; dropping the engine
/// detaches whatever is attached.
///
/// Every start and stop bumps `generation`. A listener only publishes while
/// its generation is current, and a registration whose generation went stale
/// during `listen` (a callback stopped or restarted the stream) is detached
/// instead of stored.
pub(crate) struct StreamEngine<T: StreamTarget> {
    target: Arc<T>,
    datastore: Arc<dyn Datastore>,
    cur_data: Bindable<T::Output>,
    error_tx: Sender<FirestoreError>,
    error_rx: Receiver<FirestoreError>,
    registration: Mutex<Option<ListenerRegistration>>,
    generation: Arc<AtomicU64>,
}

impl<T: StreamTarget> StreamEngine<T> {
    pub(crate) fn new(target: T, datastore: Arc<dyn Datastore>) -> Self {
        let (error_tx, error_rx) = async_channel::bounded(STREAM_ERROR_CAPACITY);
        Self {
            target: Arc::new(target),
            datastore,
            cur_data: Bindable::new(T::empty()),
            error_tx,
            error_rx,
            registration: Mutex::new(None),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub(crate) fn target(&self) -> &T {
        &self.target
    }

    pub(crate) fn cur_data(&self) -> &Bindable<T::Output> {
        &self.cur_data
    }

    pub(crate) fn stream_errors(&self) -> Receiver<FirestoreError> {
        self.error_rx.clone()
    }

    pub(crate) async fn fetch(&self) -> AsyncResponse<T::Output> {
        let result = match self.target.fetch_raw(self.datastore.as_ref()).await {
            Ok(raw) => self.target.parse(&raw),
            Err(err) => Err(err),
        };
        AsyncResponse::from(result)
    }

    pub(crate) fn start_stream(&self, on_data: Option<DataCallback<T::Output>>) -> FirestoreResult<()> {
        self.stop_stream();
        let stream_generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let label = self.target.describe();
        let target = Arc::clone(&self.target);
        let cur_data = self.cur_data.clone();
        let error_tx = self.error_tx.clone();
        let generation = Arc::clone(&self.generation);
        let listener_label = label.clone();
        let listener: RawListener<T::Raw> = Arc::new(move |result: FirestoreResult<T::Raw>| {
            if generation.load(Ordering::SeqCst) != stream_generation {
                return;
            }
            match result.and_then(|raw| target.parse(&raw)) {
                Ok(output) => {
                    cur_data.set_value(output.clone());
                    if let Some(callback) = &on_data {
                        callback(&output);
                    }
                }
                Err(err) => {
                    log::warn!("stream error for {listener_label}: {err}");
                    if error_tx.try_send(err).is_err() {
                        log::debug!("stream error channel for {listener_label} is full; dropping error");
                    }
                }
            }
        });

        // The lock is not held while listening: the initial delivery may run
        // user callbacks that call back into this engine.
        let registration = self.target.listen(self.datastore.as_ref(), listener)?;
        let (current, released) = {
            let mut slot = self.lock_registration();
            if self.generation.load(Ordering::SeqCst) == stream_generation {
                (true, slot.replace(registration))
            } else {
                (false, Some(registration))
            }
        };
        if let Some(released) = released {
            released.detach();
        }
        if current {
            log::debug!("started stream for {label}");
        } else {
            log::debug!("stream for {label} was stopped or replaced while starting");
        }
        Ok(())
    }

    pub(crate) fn stop_stream(&self) {
        let registration = {
            let mut slot = self.lock_registration();
            self.generation.fetch_add(1, Ordering::SeqCst);
            slot.take()
        };
        if let Some(registration) = registration {
            registration.detach();
            log::debug!("stopped stream for {}", self.target.describe());
        }
    }

    pub(crate) fn is_streaming(&self) -> bool {
        self.lock_registration().is_some()
    }

    fn lock_registration(&self) -> MutexGuard<'_, Option<ListenerRegistration>> {
        self.registration
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T: StreamTarget> Drop for StreamEngine<T> {
    fn drop(&mut self) {
        self.stop_stream();
    }
}
