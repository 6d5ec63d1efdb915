use std::{fmt::Debug, fmt::Display, sync::Arc};

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{AsyncQueue, QueueError};

/// The Error with which a streaming Consumer terminated abnormally
#[derive(Debug, Error)]
pub enum StreamError<E> {
    /// The Handler returned an Error for an Item
    #[error("stream handler failed: {0}")]
    Handler(E),
    /// The Handler panicked
    #[error("stream handler panicked")]
    Panicked,
    /// The Task driving the Consumer was aborted, most likely because the
    /// Runtime shut down
    #[error("stream task was aborted")]
    Aborted,
    /// The Queue reported an unexpected Error
    #[error(transparent)]
    Queue(QueueError),
}

/// The Handle to a streaming Consumer started by [`AsyncQueue::stream`]
///
/// Dropping the Handle does not stop the Consumer.
pub struct StreamHandle<E> {
    token: CancellationToken,
    task: JoinHandle<Result<(), StreamError<E>>>,
}

impl<E> StreamHandle<E> {
    /// Stops the Consumer
    ///
    /// An Item that was already dequeued is still passed to the Handler, but
    /// no further Items will be. Calling this more than once has no effect.
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Checks if the Consumer has terminated
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the Consumer to terminate
    ///
    /// Resolves to `Ok(())` if it was stopped or the Queue was closed, and to
    /// the Error that terminated it otherwise.
    pub async fn join(self) -> Result<(), StreamError<E>> {
        match self.task.await {
            Ok(result) => result,
            Err(err) if err.is_panic() => Err(StreamError::Panicked),
            Err(_) => Err(StreamError::Aborted),
        }
    }
}

impl<E> Debug for StreamHandle<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "StreamHandle (stopped: {}, finished: {})",
            self.token.is_cancelled(),
            self.task.is_finished()
        )
    }
}

impl<T> AsyncQueue<T>
where
    T: Send + 'static,
{
    /// Starts a Consumer that passes every Item of the Queue to the given
    /// Handler, until it is stopped, the Queue is closed or the Handler
    /// returns an Error
    ///
    /// # Panics
    /// This spawns a Task and therefore must be called from within a tokio
    /// Runtime
    ///
    /// # Example
    /// ```
    /// # use std::sync::Arc;
    /// # use mpc_messaging::queues::AsyncQueue;
    ///
    /// async fn demo() {
    ///   let queue = Arc::new(AsyncQueue::new());
    ///   let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    ///
    ///   let handle = queue.stream(move |item: u32| tx.send(item * 2));
    ///   queue.push(21).unwrap();
    ///
    ///   assert_eq!(Some(42), rx.recv().await);
    ///
    ///   handle.stop();
    ///   assert!(handle.join().await.is_ok());
    /// }
    ///
    /// # fn main() {
    /// #   let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
    /// #
    /// #   rt.block_on(demo());
    /// # }
    /// ```
    pub fn stream<F, E>(self: &Arc<Self>, mut handler: F) -> StreamHandle<E>
    where
        F: FnMut(T) -> Result<(), E> + Send + 'static,
        E: Display + Send + 'static,
    {
        let token = CancellationToken::new();

        let queue = Arc::clone(self);
        let signal = token.clone();
        let task = tokio::spawn(async move {
            // A cancelled pop still hands out buffered Items, so check first
            while !signal.is_cancelled() {
                let item = match queue.pop(Some(&signal)).await {
                    Ok(item) => item,
                    Err(QueueError::Cancelled) => break,
                    Err(QueueError::Closed) => {
                        debug!("queue closed, stream ended");
                        return Ok(());
                    }
                    Err(err) => return Err(StreamError::Queue(err)),
                };

                if let Err(err) = handler(item) {
                    warn!(error = %err, "stream handler failed, stream ended");
                    return Err(StreamError::Handler(err));
                }
            }

            debug!("stream stopped");
            Ok(())
        });

        StreamHandle { token, task }
    }
}
