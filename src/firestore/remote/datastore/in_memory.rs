use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use async_trait::async_trait;

use crate::firestore::api::{DocumentSnapshot, Query, QuerySnapshot};
use crate::firestore::error::{unavailable, FirestoreError, FirestoreResult};
use crate::firestore::model::DocumentKey;
use crate::firestore::value::{MapValue, WireRecord};
use crate::util::ListenerRegistration;

use super::{Datastore, DocumentListener, QueryListener};

struct DocumentListenerEntry {
    id: u64,
    key: DocumentKey,
    listener: DocumentListener,
    active: Arc<AtomicBool>,
}

struct QueryListenerEntry {
    id: u64,
    query: Query,
    listener: QueryListener,
    active: Arc<AtomicBool>,
}

#[derive(Default)]
struct StoreState {
    documents: BTreeMap<DocumentKey, MapValue>,
    document_listeners: Vec<DocumentListenerEntry>,
    query_listeners: Vec<QueryListenerEntry>,
    next_listener_id: u64,
    offline: bool,
}

impl StoreState {
    fn next_id(&mut self) -> u64 {
        self.next_listener_id += 1;
        self.next_listener_id
    }

    fn snapshot(&self, key: &DocumentKey) -> DocumentSnapshot {
        DocumentSnapshot::new(key.clone(), self.documents.get(key).cloned())
    }

    fn evaluate(&self, query: &Query) -> QuerySnapshot {
        let limit = query.limit_value().unwrap_or(usize::MAX);
        let documents = self
            .documents
            .iter()
            .filter(|(key, data)| query.matches(key, data.fields()))
            .take(limit)
            .map(|(key, data)| DocumentSnapshot::new(key.clone(), Some(data.clone())))
            .collect();
        QuerySnapshot::new(query.clone(), documents)
    }
}

/// A pending delivery, collected under the lock and fired after releasing it.
enum Delivery {
    Document(DocumentListener, Arc<AtomicBool>, FirestoreResult<DocumentSnapshot>),
    Query(QueryListener, Arc<AtomicBool>, FirestoreResult<QuerySnapshot>),
}

impl Delivery {
    fn fire(self) {
        match self {
            Delivery::Document(listener, active, result) => {
                if active.load(Ordering::SeqCst) {
                    listener(result);
                }
            }
            Delivery::Query(listener, active, result) => {
                if active.load(Ordering::SeqCst) {
                    listener(result);
                }
            }
        }
    }
}

/// Process-local datastore with realtime listeners.
///
/// Writes notify every listener watching the written document and every
/// query listener targeting its collection, synchronously and in
/// registration order.
#[derive(Clone, Default)]
pub struct InMemoryDatastore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        lock_state(&self.state)
    }

    /// Replaces the document at `key` with `fields`.
    pub fn set_document(&self, key: &DocumentKey, fields: WireRecord) {
        let deliveries = {
            let mut state = self.lock();
            state.documents.insert(key.clone(), MapValue::new(fields));
            collect_deliveries(&state, key)
        };
        deliveries.into_iter().for_each(Delivery::fire);
    }

    /// Removes the document at `key`. Deleting a missing document still
    /// notifies listeners.
    pub fn delete_document(&self, key: &DocumentKey) {
        let deliveries = {
            let mut state = self.lock();
            state.documents.remove(key);
            collect_deliveries(&state, key)
        };
        deliveries.into_iter().for_each(Delivery::fire);
    }

    /// While offline, one-shot reads fail with `firestore/unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Delivers `error` to every active listener, mirroring a watch stream
    /// failure. Listeners stay registered.
    pub fn broadcast_error(&self, error: FirestoreError) {
        let deliveries: Vec<Delivery> = {
            let state = self.lock();
            let documents = state.document_listeners.iter().map(|entry| {
                Delivery::Document(entry.listener.clone(), entry.active.clone(), Err(error.clone()))
            });
            let queries = state.query_listeners.iter().map(|entry| {
                Delivery::Query(entry.listener.clone(), entry.active.clone(), Err(error.clone()))
            });
            documents.chain(queries).collect()
        };
        deliveries.into_iter().for_each(Delivery::fire);
    }

    /// Number of document and query listeners currently attached.
    pub fn active_listener_count(&self) -> usize {
        let state = self.lock();
        state.document_listeners.len() + state.query_listeners.len()
    }
}

fn lock_state(state: &Mutex<StoreState>) -> MutexGuard<'_, StoreState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn collect_deliveries(state: &StoreState, key: &DocumentKey) -> Vec<Delivery> {
    let mut deliveries = Vec::new();
    for entry in state.document_listeners.iter().filter(|entry| &entry.key == key) {
        deliveries.push(Delivery::Document(
            entry.listener.clone(),
            entry.active.clone(),
            Ok(state.snapshot(key)),
        ));
    }
    let collection = key.collection_path();
    for entry in state
        .query_listeners
        .iter()
        .filter(|entry| entry.query.collection_path() == &collection)
    {
        deliveries.push(Delivery::Query(
            entry.listener.clone(),
            entry.active.clone(),
            Ok(state.evaluate(&entry.query)),
        ));
    }
    deliveries
}

fn registration(state: &Arc<Mutex<StoreState>>, id: u64, active: Arc<AtomicBool>) -> ListenerRegistration {
    let weak: Weak<Mutex<StoreState>> = Arc::downgrade(state);
    ListenerRegistration::new(move || {
        active.store(false, Ordering::SeqCst);
        if let Some(state) = weak.upgrade() {
            let mut state = lock_state(&state);
            state.document_listeners.retain(|entry| entry.id != id);
            state.query_listeners.retain(|entry| entry.id != id);
        }
    })
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl Datastore for InMemoryDatastore {
    async fn get_document(&self, key: &DocumentKey) -> FirestoreResult<DocumentSnapshot> {
        let state = self.lock();
        if state.offline {
            return Err(unavailable(format!("Cannot read {key} while the datastore is offline")));
        }
        Ok(state.snapshot(key))
    }

    async fn run_query(&self, query: &Query) -> FirestoreResult<QuerySnapshot> {
        let state = self.lock();
        if state.offline {
            return Err(unavailable(format!(
                "Cannot query {} while the datastore is offline",
                query.collection_path()
            )));
        }
        Ok(state.evaluate(query))
    }

    fn listen_document(
        &self,
        key: &DocumentKey,
        listener: DocumentListener,
    ) -> FirestoreResult<ListenerRegistration> {
        let active = Arc::new(AtomicBool::new(true));
        let (id, initial) = {
            let mut state = self.lock();
            let id = state.next_id();
            state.document_listeners.push(DocumentListenerEntry {
                id,
                key: key.clone(),
                listener: listener.clone(),
                active: active.clone(),
            });
            (id, state.snapshot(key))
        };
        Delivery::Document(listener, active.clone(), Ok(initial)).fire();
        Ok(registration(&self.state, id, active))
    }

    fn listen_query(&self, query: &Query, listener: QueryListener) -> FirestoreResult<ListenerRegistration> {
        let active = Arc::new(AtomicBool::new(true));
        let (id, initial) = {
            let mut state = self.lock();
            let id = state.next_id();
            state.query_listeners.push(QueryListenerEntry {
                id,
                query: query.clone(),
                listener: listener.clone(),
                active: active.clone(),
            });
            (id, state.evaluate(query))
        };
        Delivery::Query(listener, active.clone(), Ok(initial)).fire();
        Ok(registration(&self.state, id, active))
    }
}
