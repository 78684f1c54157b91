//! Single-flight memoization.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};

/// At most one computation per key.
///
/// The first caller for a key runs the initializer; callers arriving while
/// it runs wait on the same cell and receive the same `Arc`. A failed
/// initializer drops its key, so the next caller retries.
///
/// Values live as long as the map and are never evicted. The map only
/// deduplicates work within one service; the artifact store is the cache
/// that outlives it.
pub struct SingleFlight<K, V> {
    cells: Mutex<HashMap<K, Arc<OnceCell<Arc<V>>>>>,
}

impl<K, V> Default for SingleFlight<K, V> {
    fn default() -> Self {
        Self {
            cells: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone, V> SingleFlight<K, V> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_try_init<E, F, Fut>(&self, key: K, init: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let cell = {
            let mut cells = self.cells.lock().await;
            Arc::clone(cells.entry(key.clone()).or_default())
        };
        let result = cell
            .get_or_try_init(|| async { init().await.map(Arc::new) })
            .await
            .cloned();

        if result.is_err() {
            let mut cells = self.cells.lock().await;
            // Another caller may have filled the cell since, or replaced it.
            let stale = cells
                .get(&key)
                .is_some_and(|current| Arc::ptr_eq(current, &cell) && !current.initialized());
            if stale {
                cells.remove(&key);
            }
        }
        result
    }

    /// Number of keys holding a value.
    pub async fn len(&self) -> usize {
        let cells = self.cells.lock().await;
        cells.values().filter(|cell| cell.initialized()).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
