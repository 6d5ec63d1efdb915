use thiserror::Error;

/// The Error type covering every failure this crate can report
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A Queue operation failed
    #[cfg(feature = "queues")]
    #[error(transparent)]
    Queue(#[from] crate::queues::QueueError),
    /// The Settings of a Participant did not match the Circuit
    #[cfg(feature = "settings")]
    #[error(transparent)]
    Validation(#[from] crate::settings::ValidationError),
}

/// Shorthand for a Result with the crate-level [`Error`]
pub type Result<T, E = Error> = std::result::Result<T, E>;
