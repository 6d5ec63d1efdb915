use std::{collections::VecDeque, fmt::Debug};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{
    waiter::{Pending, WaitQueue, WaiterId, Waiters},
    Close, QueueError,
};

/// The byte oriented Variant of the [`AsyncQueue`](super::AsyncQueue)
///
/// Producers push arbitrary slices, Consumers ask for an exact number of
/// bytes and wait until that many are available. Waiting Consumers are
/// served strictly in order, a later request never overtakes an earlier one
/// even if it is smaller.
///
/// # Example
/// ```
/// # use mpc_messaging::queues::BufferQueue;
///
/// async fn demo() {
///   let queue = BufferQueue::new();
///
///   queue.push(&[1, 2]).unwrap();
///   queue.push(&[3]).unwrap();
///
///   assert_eq!(Ok(vec![1, 2, 3]), queue.pop(3, None).await);
/// }
///
/// # fn main() {
/// #   let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
/// #
/// #   rt.block_on(demo());
/// # }
/// ```
pub struct BufferQueue {
    state: Mutex<State>,
}

struct State {
    buffer: VecDeque<u8>,
    /// Every Waiter carries the number of bytes it asked for
    waiters: Waiters<Vec<u8>, usize>,
    closed: bool,
}

impl State {
    fn take(&mut self, len: usize) -> Vec<u8> {
        self.buffer.drain(..len).collect()
    }

    fn put_back(&mut self, bytes: Vec<u8>) {
        for byte in bytes.into_iter().rev() {
            self.buffer.push_front(byte);
        }
    }

    /// Serves the waiting Consumers in order, for as long as the buffer holds
    /// enough bytes for the oldest one
    fn serve(&mut self) {
        while let Some(len) = self.waiters.oldest().map(|waiter| waiter.meta) {
            if len > self.buffer.len() {
                return;
            }

            let waiter = match self.waiters.pop_oldest() {
                Some(w) => w,
                None => return,
            };
            let chunk = self.take(len);
            if let Err(chunk) = waiter.fulfill(chunk) {
                self.put_back(chunk);
            }
        }
    }
}

impl BufferQueue {
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

    /// Appends the given bytes to the Queue, waking up every waiting
    /// Consumer whose request can now be satisfied
    pub fn push(&self, bytes: &[u8]) -> Result<(), QueueError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(QueueError::Closed);
        }

        state.buffer.extend(bytes.iter().copied());
        state.serve();
        Ok(())
    }

    /// Dequeues exactly `len` bytes, waiting until enough bytes have been
    /// pushed
    ///
    /// The cancellation and closing behaviour is the same as for
    /// [`AsyncQueue::pop`](super::AsyncQueue::pop), bytes that were
    /// already handed to a dropped Future are put back at the front.
    pub async fn pop(
        &self,
        len: usize,
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<u8>, QueueError> {
        let pending = {
            let mut state = self.state.lock();
            if state.closed {
                return Err(QueueError::Closed);
            }
            if len == 0 {
                return Ok(Vec::new());
            }
            if state.waiters.is_empty() && state.buffer.len() >= len {
                return Ok(state.take(len));
            }
            if cancel.map_or(false, CancellationToken::is_cancelled) {
                return Err(QueueError::Cancelled);
            }

            let (id, rx) = state.waiters.register(len);
            Pending::new(self, id, rx)
        };

        pending.wait(cancel).await
    }

    /// Closes the Queue, discarding all buffered bytes and failing every
    /// waiting Consumer with [`QueueError::Closed`]
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
                "closing buffer queue"
            );
            for waiter in waiters {
                waiter.reject(QueueError::Closed);
            }

            std::mem::take(&mut state.buffer)
        };

        // Free the bytes outside of the lock
        drop(discarded);
    }

    /// Checks if the Queue has been closed
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// The Number of buffered bytes
    pub fn len(&self) -> usize {
        self.state.lock().buffer.len()
    }

    /// Checks if there are no buffered bytes
    pub fn is_empty(&self) -> bool {
        self.state.lock().buffer.is_empty()
    }

    /// The Number of Consumers currently waiting for bytes
    pub fn waiting(&self) -> usize {
        self.state.lock().waiters.len()
    }
}

impl WaitQueue for BufferQueue {
    type Item = Vec<u8>;

    fn withdraw(&self, id: WaiterId) -> bool {
        let mut state = self.state.lock();
        if !state.waiters.remove(id) {
            return false;
        }

        // The withdrawn Waiter might have been blocking the ones behind it
        state.serve();
        true
    }

    fn reclaim(&self, bytes: Vec<u8>) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }

        state.put_back(bytes);
        state.serve();
    }
}

impl Close for BufferQueue {
    fn close(&self) {
        BufferQueue::close(self)
    }

    fn is_closed(&self) -> bool {
        BufferQueue::is_closed(self)
    }
}

impl Default for BufferQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for BufferQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        write!(
            f,
            "BufferQueue (buffered: {}, waiting: {}, closed: {})",
            state.buffer.len(),
            state.waiters.len(),
            state.closed
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn exact_reads() {
        let queue = BufferQueue::new();
        queue.push(&[1, 2, 3, 4, 5]).unwrap();

        assert_eq!(Ok(vec![1, 2]), queue.pop(2, None).await);
        assert_eq!(Ok(vec![3, 4, 5]), queue.pop(3, None).await);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn zero_length_read() {
        let queue = BufferQueue::new();
        assert_eq!(Ok(Vec::new()), queue.pop(0, None).await);

        queue.close();
        assert_eq!(Err(QueueError::Closed), queue.pop(0, None).await);
    }

    #[tokio::test]
    async fn wait_for_enough_bytes() {
        let queue = Arc::new(BufferQueue::new());

        let consumer = queue.clone();
        let handle = tokio::spawn(async move { consumer.pop(4, None).await });

        while queue.waiting() == 0 {
            tokio::task::yield_now().await;
        }

        queue.push(&[1, 2]).unwrap();
        assert_eq!(1, queue.waiting());
        queue.push(&[3, 4, 5]).unwrap();

        assert_eq!(Ok(vec![1, 2, 3, 4]), handle.await.unwrap());
        assert_eq!(1, queue.len());
    }

    #[tokio::test]
    async fn smaller_request_does_not_overtake() {
        let queue = Arc::new(BufferQueue::new());

        let first = queue.clone();
        let first = tokio::spawn(async move { first.pop(3, None).await });
        while queue.waiting() < 1 {
            tokio::task::yield_now().await;
        }

        let second = queue.clone();
        let second = tokio::spawn(async move { second.pop(1, None).await });
        while queue.waiting() < 2 {
            tokio::task::yield_now().await;
        }

        queue.push(&[1, 2]).unwrap();
        assert_eq!(2, queue.waiting());

        queue.push(&[3, 4]).unwrap();
        assert_eq!(Ok(vec![1, 2, 3]), first.await.unwrap());
        assert_eq!(Ok(vec![4]), second.await.unwrap());
    }

    #[tokio::test]
    async fn cancelled_head_unblocks_the_rest() {
        let queue = Arc::new(BufferQueue::new());
        let token = CancellationToken::new();

        let first = queue.clone();
        let first_token = token.clone();
        let first = tokio::spawn(async move { first.pop(10, Some(&first_token)).await });
        while queue.waiting() < 1 {
            tokio::task::yield_now().await;
        }

        let second = queue.clone();
        let second = tokio::spawn(async move { second.pop(2, None).await });
        while queue.waiting() < 2 {
            tokio::task::yield_now().await;
        }

        queue.push(&[7, 8, 9]).unwrap();
        token.cancel();

        assert_eq!(Err(QueueError::Cancelled), first.await.unwrap());
        assert_eq!(Ok(vec![7, 8]), second.await.unwrap());
        assert_eq!(1, queue.len());
    }

    #[tokio::test]
    async fn close_rejects_and_discards() {
        let queue = Arc::new(BufferQueue::new());
        queue.push(&[1]).unwrap();

        let consumer = queue.clone();
        let handle = tokio::spawn(async move { consumer.pop(2, None).await });
        while queue.waiting() == 0 {
            tokio::task::yield_now().await;
        }

        queue.close();
        queue.close();

        assert_eq!(Err(QueueError::Closed), handle.await.unwrap());
        assert!(queue.is_empty());
        assert_eq!(Err(QueueError::Closed), queue.push(&[2]));
    }

    #[test]
    fn close_empties_buffer() {
        let queue = BufferQueue::new();
        queue.push(&[1, 2, 3]).unwrap();

        queue.close();

        assert_eq!(0, queue.len());
        assert_eq!(
            "BufferQueue (buffered: 0, waiting: 0, closed: true)",
            format!("{:?}", queue)
        );
        assert_eq!(Err(QueueError::Closed), queue.push(&[4]));
    }
}
