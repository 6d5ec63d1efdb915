#![deny(missing_docs)]
#![warn(rust_2018_idioms, missing_debug_implementations)]
//! This crate provides the message channels used between the parties of a
//! multi-party-computation (MPC) session
//!
//! The centerpiece is the [`AsyncQueue`](queues::AsyncQueue), a FIFO queue
//! whose `pop` can be awaited, cancelled through a
//! [`CancellationToken`](tokio_util::sync::CancellationToken) and rejected
//! as a whole by closing the queue. The payloads are opaque, no transport or
//! serialization happens in here.
//!
//! # Feature-Flags
//! * `queues`: Enables the item and byte Queues
//! * `stream`: Enables the streaming Consumer, which needs a tokio Runtime
//! * `store`: Enables the keyed Queue-Store
//! * `settings`: Enables the Settings-Validator for MPC-Participants
//! * `full`: Enables all the Feature-Flags

mod error;
pub use error::{Error, Result};

#[cfg(feature = "queues")]
pub mod queues;
#[cfg(feature = "settings")]
pub mod settings;
#[cfg(feature = "store")]
pub mod store;
