#![forbid(unsafe_code)]

//! Construction-time configuration for an observable cell.
//!
//! Options are fixed when the cell is created. The two timing knobs are
//! independent and stack:
//!
//! - **throttle**: hard rate cap. After a notification passes, further
//!   notifications within the window are dropped (not queued).
//! - **debounce**: settle-then-fire. Each write restarts the delay; only the
//!   last value of a burst reaches subscribers.
//!
//! No validation is performed. A zero duration behaves like a timer that
//! fires on the next timer tick.
//!
//! With the `serde` feature, options load from millisecond fields:
//!
//! ```json
//! { "debounce_ms": 150, "throttle_ms": 50, "history_capacity": 64 }
//! ```

use std::num::NonZeroUsize;
use std::time::Duration;

/// Timing and history configuration for an [`Observable`](crate::Observable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(from = "OptionsConfig", into = "OptionsConfig")
)]
pub struct ObservableOptions {
    /// Delay-and-coalesce window.
    pub debounce: Option<Duration>,
    /// Rate-cap window; excess notifications are dropped.
    pub throttle: Option<Duration>,
    /// Maximum retained history entries. `None` keeps every value.
    pub history_capacity: Option<NonZeroUsize>,
}

impl ObservableOptions {
    /// Options with no timing policy and unbounded history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            debounce: None,
            throttle: None,
            history_capacity: None,
        }
    }

    /// Set the debounce window.
    #[must_use]
    pub const fn with_debounce(mut self, window: Duration) -> Self {
        self.debounce = Some(window);
        self
    }

    /// Set the throttle window.
    #[must_use]
    pub const fn with_throttle(mut self, window: Duration) -> Self {
        self.throttle = Some(window);
        self
    }

    /// Bound the retained history to `capacity` entries.
    #[must_use]
    pub const fn with_history_capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.history_capacity = Some(capacity);
        self
    }
}

/// Wire form of [`ObservableOptions`] with durations in milliseconds.
#[cfg(feature = "serde")]
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
struct OptionsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    debounce_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    throttle_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    history_capacity: Option<NonZeroUsize>,
}

#[cfg(feature = "serde")]
impl From<OptionsConfig> for ObservableOptions {
    fn from(cfg: OptionsConfig) -> Self {
        Self {
            debounce: cfg.debounce_ms.map(Duration::from_millis),
            throttle: cfg.throttle_ms.map(Duration::from_millis),
            history_capacity: cfg.history_capacity,
        }
    }
}

#[cfg(feature = "serde")]
impl From<ObservableOptions> for OptionsConfig {
    fn from(opts: ObservableOptions) -> Self {
        let millis = |d: Duration| d.as_millis().min(u64::MAX as u128) as u64;
        Self {
            debounce_ms: opts.debounce.map(millis),
            throttle_ms: opts.throttle.map(millis),
            history_capacity: opts.history_capacity,
        }
    }
}
