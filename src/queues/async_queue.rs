use std::{collections::VecDeque, fmt::Debug};

use futures::Stream;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{
    waiter::{Pending, WaitQueue, WaiterId, Waiters},
    Close, QueueError,
};

/// An unbounded, closeable Queue whose Consumers can wait for Items
///
/// # Behaviour
/// * Items are handed out in the order in which they were pushed
/// * If multiple Consumers are waiting, the one that started waiting first
/// receives the next Item
/// * Every Item is received by at most one Consumer
/// * Closing the Queue discards all buffered Items and fails every waiting
/// Consumer with [`QueueError::Closed`]
///
/// # Example
/// ```
/// # use mpc_messaging::queues::AsyncQueue;
///
/// async fn demo() {
///   let queue = AsyncQueue::new();
///
///   queue.push("a").unwrap();
///   queue.push("b").unwrap();
///
///   assert_eq!(Ok("a"), queue.pop(None).await);
///   assert_eq!(Ok("b"), queue.pop(None).await);
/// }
///
/// # fn main() {
/// #   let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
/// #
/// #   rt.block_on(demo());
/// # }
/// ```
pub struct AsyncQueue<T> {
    state: Mutex<State<T>>,
}

struct State<T> {
    /// Items that no Consumer has claimed yet, only ever non-empty while no
    /// one is waiting
    buffer: VecDeque<T>,
    waiters: Waiters<T>,
    closed: bool,
}

impl<T> State<T> {
    /// Hands the Item to the longest waiting Consumer or buffers it if no
    /// one is waiting
    fn deliver(&mut self, mut item: T, to_front: bool) {
        while let Some(waiter) = self.waiters.pop_oldest() {
            match waiter.fulfill(item) {
                Ok(()) => return,
                Err(returned) => item = returned,
            }
        }

        if to_front {
            self.buffer.push_front(item);
        } else {
            self.buffer.push_back(item);
        }
    }
}

impl<T> AsyncQueue<T> {
    /// Creates a new empty and open Queue
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                buffer: VecDeque::new(),
                waiters: Waiters::new(),
                closed: false,
            }),
        }
    }

    /// Enqueues the given Item
    ///
    /// If a Consumer is currently waiting, the Item is handed to it directly
    /// and never enters the buffer. This never waits.
    pub fn push(&self, item: T) -> Result<(), QueueError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(QueueError::Closed);
        }

        state.deliver(item, false);
        Ok(())
    }

    /// Dequeues the next Item, waiting for one to be pushed if the Queue is
    /// currently empty
    ///
    /// # Behaviour
    /// * Fails with [`QueueError::Closed`] right away if the Queue is closed,
    /// or later if it is closed while waiting
    /// * Returns a buffered Item right away, even if the Token has already
    /// been cancelled
    /// * Fails with [`QueueError::Cancelled`] if the Token fires before an
    /// Item was handed to this Consumer
    ///
    /// Dropping the returned Future also cancels the operation, an Item that
    /// was already handed to it is given to the next waiting Consumer or put
    /// back at the front of the buffer.
    pub async fn pop(&self, cancel: Option<&CancellationToken>) -> Result<T, QueueError> {
        let pending = {
            let mut state = self.state.lock();
            if state.closed {
                return Err(QueueError::Closed);
            }
            if let Some(item) = state.buffer.pop_front() {
                return Ok(item);
            }
            if cancel.map_or(false, CancellationToken::is_cancelled) {
                return Err(QueueError::Cancelled);
            }

            let (id, rx) = state.waiters.register(());
            Pending::new(self, id, rx)
        };

        pending.wait(cancel).await
    }

    /// Attempts to dequeue the next Item without waiting
    ///
    /// Returns `Ok(None)` if the Queue is open but currently empty.
    pub fn try_pop(&self) -> Result<Option<T>, QueueError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(QueueError::Closed);
        }

        Ok(state.buffer.pop_front())
    }

    /// Closes the Queue
    ///
    /// All the buffered Items are discarded and every waiting Consumer fails
    /// with [`QueueError::Closed`]. Calling this again does nothing.
    pub fn close(&self) {
        let discarded = {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;

            let waiters = state.waiters.drain();
            debug!(
                discarded = state.buffer.len(),
                rejected = waiters.len(),
                "closing queue"
            );
            for waiter in waiters {
                waiter.reject(QueueError::Closed);
            }

            std::mem::take(&mut state.buffer)
        };

        // Drop the Items outside of the lock
        drop(discarded);
    }

    /// Checks if the Queue has been closed
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// The Number of Items that are buffered and not claimed by anyone
    pub fn len(&self) -> usize {
        self.state.lock().buffer.len()
    }

    /// Checks if there are currently no buffered Items
    pub fn is_empty(&self) -> bool {
        self.state.lock().buffer.is_empty()
    }

    /// The Number of Consumers currently waiting for an Item
    pub fn waiting(&self) -> usize {
        self.state.lock().waiters.len()
    }

    /// Turns the Queue into a [`Stream`] of Items, which ends once the
    /// Queue is closed
    pub fn messages(&self) -> impl Stream<Item = T> + '_ {
        futures::stream::unfold(self, |queue| async move {
            queue.pop(None).await.ok().map(|item| (item, queue))
        })
    }
}

impl<T> WaitQueue for AsyncQueue<T> {
    type Item = T;

    fn withdraw(&self, id: WaiterId) -> bool {
        self.state.lock().waiters.remove(id)
    }

    fn reclaim(&self, item: T) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }

        state.deliver(item, true);
    }
}

impl<T> Close for AsyncQueue<T> {
    fn close(&self) {
        AsyncQueue::close(self)
    }

    fn is_closed(&self) -> bool {
        AsyncQueue::is_closed(self)
    }
}

impl<T> Default for AsyncQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Debug for AsyncQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        write!(
            f,
            "AsyncQueue<{}> (buffered: {}, waiting: {}, closed: {})",
            std::any::type_name::<T>(),
            state.buffer.len(),
            state.waiters.len(),
            state.closed
        )
    }
}
