use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::util::ListenerRegistration;

type Watcher<T> = Arc<dyn Fn(&T) + Send + Sync + 'static>;

struct BindableState<T> {
    value: Mutex<T>,
    watchers: Mutex<Vec<(u64, Watcher<T>)>>,
    next_id: AtomicU64,
}

/// Observable holder of the latest value published by an access component.
///
/// Readers get a copy through [`value`](Self::value) or register a watcher
/// with [`subscribe`](Self::subscribe). Only the owning component writes.
pub struct Bindable<T> {
    state: Arc<BindableState<T>>,
}

impl<T> Clone for Bindable<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<T> Bindable<T>
where
    T: Clone + Send + 'static,
{
    pub fn new(initial: T) -> Self {
        Self {
            state: Arc::new(BindableState {
                value: Mutex::new(initial),
                watchers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn value(&self) -> T {
        lock(&self.state.value).clone()
    }

    /// Runs `f` against the current value without cloning it.
    pub fn with_value<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&lock(&self.state.value))
    }

    /// Registers `watcher` for every future change. Dropping the returned
    /// registration removes it.
    pub fn subscribe<F>(&self, watcher: F) -> ListenerRegistration
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.state.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.state.watchers).push((id, Arc::new(watcher)));
        let state = Arc::downgrade(&self.state);
        ListenerRegistration::new(move || {
            if let Some(state) = state.upgrade() {
                lock(&state.watchers).retain(|(watcher_id, _)| *watcher_id != id);
            }
        })
    }

    pub fn watcher_count(&self) -> usize {
        lock(&self.state.watchers).len()
    }

    /// Stores `value` and notifies watchers. Watchers run without any lock
    /// held.
    pub(crate) fn set_value(&self, value: T) {
        *lock(&self.state.value) = value.clone();
        let watchers: Vec<Watcher<T>> = lock(&self.state.watchers)
            .iter()
            .map(|(_, watcher)| Arc::clone(watcher))
            .collect();
        for watcher in watchers {
            watcher(&value);
        }
    }
}
