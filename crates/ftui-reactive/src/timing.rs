#![forbid(unsafe_code)]

//! Per-cell rate-limiting state for the notification pipeline.
//!
//! Both gates are scoped to a single cell. Nothing here is shared between
//! cells and no global timer registry exists.
//!
//! - [`ThrottleWindow`] is a deadline, not a task: the window is open while
//!   `now < open_until`. Notifications arriving while it is open are dropped.
//! - [`DebounceSlot`] owns the abort handle of the one pending debounce task
//!   and the old value that started the current burst.
//!
//! Time is read from `tokio::time::Instant` so paused-clock tests control
//! both gates.

use std::time::Duration;

use tokio::task::AbortHandle;
use tokio::time::Instant;

/// Drop-not-coalesce throttle gate.
#[derive(Debug, Default)]
pub(crate) struct ThrottleWindow {
    open_until: Option<Instant>,
}

impl ThrottleWindow {
    /// Admit a notification at `now`, opening a fresh window of `window`.
    ///
    /// Returns `false` (and leaves the current window untouched) if a window
    /// is still open.
    pub(crate) fn admit(&mut self, window: Duration, now: Instant) -> bool {
        if self.is_open(now) {
            return false;
        }
        self.open_until = Some(now + window);
        true
    }

    #[must_use]
    pub(crate) fn is_open(&self, now: Instant) -> bool {
        self.open_until.is_some_and(|until| now < until)
    }

    pub(crate) fn reset(&mut self) {
        self.open_until = None;
    }
}

struct Pending<T> {
    abort: AbortHandle,
    /// Value held before the first write of the burst.
    origin: T,
}

/// Slot for the single outstanding debounce timer of a cell.
pub(crate) struct DebounceSlot<T> {
    pending: Option<Pending<T>>,
}

impl<T> Default for DebounceSlot<T> {
    fn default() -> Self {
        Self { pending: None }
    }
}

impl<T> DebounceSlot<T> {
    /// Abort the pending timer, if any, and hand back the burst's origin value.
    pub(crate) fn supersede(&mut self) -> Option<T> {
        self.pending.take().map(|pending| {
            pending.abort.abort();
            pending.origin
        })
    }

    /// Record a freshly spawned timer. Any previous timer must already have
    /// been superseded.
    pub(crate) fn arm(&mut self, abort: AbortHandle, origin: T) {
        debug_assert!(self.pending.is_none(), "debounce armed twice");
        self.pending = Some(Pending { abort, origin });
    }

    /// Called by the timer itself when it fires. From here on the cycle can
    /// no longer be superseded.
    pub(crate) fn fire(&mut self) {
        self.pending = None;
    }

    /// Abort without reporting the origin (seal / drop).
    pub(crate) fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort.abort();
        }
    }

    #[must_use]
    pub(crate) fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

impl<T> std::fmt::Debug for DebounceSlot<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebounceSlot")
            .field("pending", &self.is_pending())
            .finish()
    }
}
