#![forbid(unsafe_code)]

//! Lifecycle state of an observable cell.
//!
//! ```text
//!  Unsealed ──mute()──▶ Muted
//!  Unsealed ◀─unmute()─ Muted
//!  Unsealed | Muted ──seal()──▶ Sealed
//! ```
//!
//! `Sealed` is terminal.

use std::fmt;

/// Operational state of an [`Observable`](crate::Observable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CellState {
    /// Writes are accepted and notify subscribers.
    #[default]
    Unsealed,
    /// Writes are accepted but the notification pipeline is suppressed.
    Muted,
    /// Terminal: no writes, no subscribers, no further state changes.
    Sealed,
}

impl CellState {
    #[inline]
    #[must_use]
    pub const fn is_sealed(self) -> bool {
        matches!(self, Self::Sealed)
    }

    #[inline]
    #[must_use]
    pub const fn is_muted(self) -> bool {
        matches!(self, Self::Muted)
    }

    /// Stable lowercase name, used in log fields.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unsealed => "unsealed",
            Self::Muted => "muted",
            Self::Sealed => "sealed",
        }
    }
}

impl fmt::Display for CellState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
