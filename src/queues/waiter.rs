//! The bookkeeping for Consumers that are waiting on a Queue
//!
//! Every waiting Consumer owns a single one-shot channel, the Queue keeps the
//! sending half in a [`Waiters`] list ordered by registration. Whoever
//! removes the entry from that list (a push, a close or the Consumer's own
//! cancellation) is the only one allowed to settle it, and all of them do so
//! while holding the Queue's lock. So once a Consumer fails to withdraw its
//! entry, the outcome is guaranteed to already sit in its channel.

use std::collections::BTreeMap;

use futures::channel::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::QueueError;

/// Identifies a single waiting Consumer, ids increase with registration
pub(crate) type WaiterId = u64;

/// The outcome that is delivered to a waiting Consumer
type Outcome<T> = Result<T, QueueError>;

/// The sending side of a single waiting Consumer
pub(crate) struct Waiter<T, M = ()> {
    tx: oneshot::Sender<Outcome<T>>,
    /// Extra data describing the request, like the number of requested bytes
    pub(crate) meta: M,
}

impl<T, M> Waiter<T, M> {
    /// Hands the Value to the Consumer, returns the Value if the Consumer
    /// is no longer listening
    pub(crate) fn fulfill(self, value: T) -> Result<(), T> {
        // Only Ok is ever sent here, so that is all that can come back
        match self.tx.send(Ok(value)) {
            Err(Ok(value)) => Err(value),
            _ => Ok(()),
        }
    }

    /// Fails the Consumer with the given Error
    pub(crate) fn reject(self, err: QueueError) {
        // A Consumer that is gone does not care about the Error anymore
        let _ = self.tx.send(Err(err));
    }
}

/// The FIFO list of all Consumers currently waiting on a Queue
pub(crate) struct Waiters<T, M = ()> {
    next_id: WaiterId,
    entries: BTreeMap<WaiterId, Waiter<T, M>>,
}

impl<T, M> Waiters<T, M> {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 0,
            entries: BTreeMap::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends a new Waiter at the end of the List
    pub(crate) fn register(&mut self, meta: M) -> (WaiterId, oneshot::Receiver<Outcome<T>>) {
        let (tx, rx) = oneshot::channel();

        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(id, Waiter { tx, meta });

        (id, rx)
    }

    /// Removes the Waiter with the given Id, returns false if it was already
    /// removed by someone else
    pub(crate) fn remove(&mut self, id: WaiterId) -> bool {
        self.entries.remove(&id).is_some()
    }

    /// The Waiter that has been waiting the longest
    pub(crate) fn oldest(&self) -> Option<&Waiter<T, M>> {
        self.entries.values().next()
    }

    pub(crate) fn pop_oldest(&mut self) -> Option<Waiter<T, M>> {
        let id = *self.entries.keys().next()?;
        self.entries.remove(&id)
    }

    /// Removes all the Waiters at once
    pub(crate) fn drain(&mut self) -> Vec<Waiter<T, M>> {
        std::mem::take(&mut self.entries).into_values().collect()
    }
}

/// A Queue on which Consumers can wait
pub(crate) trait WaitQueue {
    /// What a Consumer receives
    type Item;

    /// Removes the Waiter from the Queue, returns false if the Waiter has
    /// already been settled by a push or a close
    fn withdraw(&self, id: WaiterId) -> bool;

    /// Takes back an Item that was handed to a Consumer that went away
    /// before it could receive it
    fn reclaim(&self, item: Self::Item);
}

/// The receiving side of a registered Waiter
///
/// Dropping a Pending that has not been settled withdraws the Waiter, or
/// gives an Item that was already handed to it back to the Queue.
pub(crate) struct Pending<'queue, Q: WaitQueue> {
    queue: &'queue Q,
    id: WaiterId,
    rx: oneshot::Receiver<Outcome<Q::Item>>,
    settled: bool,
}

impl<'queue, Q: WaitQueue> Pending<'queue, Q> {
    pub(crate) fn new(
        queue: &'queue Q,
        id: WaiterId,
        rx: oneshot::Receiver<Outcome<Q::Item>>,
    ) -> Self {
        trace!(waiter = id, "registered waiter");
        Self {
            queue,
            id,
            rx,
            settled: false,
        }
    }

    /// Waits until the Waiter is settled or the Token fires, whichever
    /// happens first. An Outcome that is already available always wins over
    /// the cancellation.
    pub(crate) async fn wait(mut self, cancel: Option<&CancellationToken>) -> Outcome<Q::Item> {
        let received = match cancel {
            None => (&mut self.rx).await,
            Some(token) => {
                let received = {
                    let rx = &mut self.rx;
                    tokio::select! {
                        biased;
                        received = rx => Some(received),
                        _ = token.cancelled() => None,
                    }
                };

                match received {
                    Some(received) => received,
                    None => return self.cancel(),
                }
            }
        };

        self.settled = true;
        received.unwrap_or(Err(QueueError::Broken("waiter dropped without an outcome")))
    }

    fn cancel(mut self) -> Outcome<Q::Item> {
        self.settled = true;

        if self.queue.withdraw(self.id) {
            trace!(waiter = self.id, "waiter cancelled");
            return Err(QueueError::Cancelled);
        }

        // Lost the race against a push or close
        match self.rx.try_recv() {
            Ok(Some(outcome)) => outcome,
            _ => Err(QueueError::Broken("settled waiter holds no outcome")),
        }
    }
}

impl<'queue, Q: WaitQueue> Drop for Pending<'queue, Q> {
    fn drop(&mut self) {
        if self.settled || self.queue.withdraw(self.id) {
            return;
        }

        if let Ok(Some(Ok(item))) = self.rx.try_recv() {
            trace!(waiter = self.id, "reclaiming item of dropped waiter");
            self.queue.reclaim(item);
        }
    }
}
