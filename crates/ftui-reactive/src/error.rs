#![forbid(unsafe_code)]

//! Error type for observable cell operations.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ObservableError>;

/// Errors returned by [`Observable`](crate::Observable) mutations.
///
/// Subscriber and compute-function failures are not represented here: they
/// are panics and unwind through the notification that triggered them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ObservableError {
    /// A write, mute, unmute, or bind was attempted on a sealed cell.
    #[error("observable is sealed and can no longer be mutated")]
    Sealed,
}

impl ObservableError {
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        matches!(self, Self::Sealed)
    }
}
