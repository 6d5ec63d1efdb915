//! This module provides the Queues that carry the messages between the
//! parties of a session
//!
//! # AsyncQueue
//! An unbounded Multi-Producer Multi-Consumer Queue for arbitrary items.
//! Producers [`push`](AsyncQueue::push) without ever waiting, Consumers
//! [`pop`](AsyncQueue::pop) and wait until an item is available. Competing
//! Consumers are served in the order in which they started waiting.
//!
//! # BufferQueue
//! The same idea for raw bytes, where every Consumer asks for an exact
//! number of bytes instead of a single item.
//!
//! # Closing
//! Both Queues can be closed exactly once. Closing discards everything
//! still buffered and rejects every waiting Consumer with
//! [`QueueError::Closed`], every later operation fails the same way.

use thiserror::Error;

mod waiter;

mod async_queue;
pub use async_queue::AsyncQueue;

mod buffer_queue;
pub use buffer_queue::BufferQueue;

#[cfg(feature = "stream")]
mod stream;
#[cfg(feature = "stream")]
pub use stream::{StreamError, StreamHandle};

/// The Error returned by the Operations on the Queues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The Queue has been closed, no more Elements will be enqueued or
    /// dequeued
    #[error("queue is closed")]
    Closed,
    /// The Cancellation-Signal of a waiting Consumer fired before an Element
    /// was handed to it
    #[error("operation was cancelled")]
    Cancelled,
    /// An internal Invariant of the Queue has been violated
    #[error("queue invariant violated: {0}")]
    Broken(&'static str),
}

/// Queues that can be shut down
///
/// This allows containers, like the [`QueueStore`](crate::store::QueueStore),
/// to close all their Queues without knowing what they carry.
pub trait Close {
    /// Closes the Queue, calling this more than once has no effect
    fn close(&self);

    /// Checks if the Queue has been closed
    fn is_closed(&self) -> bool;
}
