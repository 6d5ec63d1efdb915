//! A keyed Store of Queues, one per communication Channel
//!
//! Queues are created lazily on first access and live as long as the Store
//! itself, there is no way to remove a single Queue.
//!
//! # Example
//! ```rust
//! # use std::sync::Arc;
//! # use mpc_messaging::store::ItemStore;
//! let store = ItemStore::<u64>::new();
//!
//! let queue = store.get("alice->bob");
//! assert!(Arc::ptr_eq(&queue, &store.get("alice->bob")));
//! assert!(!Arc::ptr_eq(&queue, &store.get("bob->alice")));
//! ```

use std::{collections::HashMap, fmt::Debug, sync::Arc};

use parking_lot::Mutex;
use tracing::trace;

use crate::queues::{AsyncQueue, BufferQueue, Close};

/// A Store of item Queues
pub type ItemStore<T> = QueueStore<AsyncQueue<T>>;
/// A Store of byte Queues
pub type ByteStore = QueueStore<BufferQueue>;

/// Maps Keys to lazily created Queues
pub struct QueueStore<Q> {
    queues: Mutex<HashMap<String, Arc<Q>>>,
}

impl<Q> QueueStore<Q> {
    /// Creates a new empty Store
    pub fn new() -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
        }
    }

    /// The Number of Queues created so far
    pub fn len(&self) -> usize {
        self.queues.lock().len()
    }

    /// Checks if no Queue has been created yet
    pub fn is_empty(&self) -> bool {
        self.queues.lock().is_empty()
    }

    /// Checks if a Queue for the given Key exists
    pub fn contains(&self, key: &str) -> bool {
        self.queues.lock().contains_key(key)
    }
}

impl<Q> QueueStore<Q>
where
    Q: Default,
{
    /// Returns the Queue for the given Key, creating it if this is the first
    /// access for the Key
    pub fn get(&self, key: &str) -> Arc<Q> {
        let mut queues = self.queues.lock();
        if let Some(queue) = queues.get(key) {
            return Arc::clone(queue);
        }

        trace!(key, "creating queue");
        let queue = Arc::new(Q::default());
        queues.insert(key.to_owned(), Arc::clone(&queue));
        queue
    }
}

impl<Q> QueueStore<Q>
where
    Q: Close,
{
    /// Closes every Queue in the Store
    ///
    /// The Queues stay in the Store, so later accesses return the closed
    /// Queues.
    pub fn close_all(&self) {
        let queues: Vec<_> = self.queues.lock().values().cloned().collect();
        for queue in queues {
            queue.close();
        }
    }
}

impl<Q> Default for QueueStore<Q> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Q> Debug for QueueStore<Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "QueueStore<{}> ({} queues)",
            std::any::type_name::<Q>(),
            self.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lazily_created() {
        let store = ItemStore::<u32>::new();
        assert!(store.is_empty());
        assert!(!store.contains("a"));

        let queue = store.get("a");
        assert!(store.contains("a"));
        assert_eq!(1, store.len());

        queue.push(1).unwrap();
        assert_eq!(Ok(Some(1)), store.get("a").try_pop());
        assert_eq!(1, store.len());
    }

    #[test]
    fn close_all() {
        let store = ByteStore::new();
        let first = store.get("a");
        let second = store.get("b");

        store.close_all();

        assert!(first.is_closed());
        assert!(second.is_closed());
        assert!(store.get("a").is_closed());
    }
}
