#![forbid(unsafe_code)]

//! Reactive value cells for FrankenTUI state.
//!
//! This crate provides a single-hop publish/subscribe cell and a thin
//! derived-cell helper:
//!
//! - [`Observable`]: a shared value with ordered subscribers, a lifecycle
//!   state (unsealed / muted / sealed), a change history, and optional
//!   debounce and throttle gating.
//! - [`Subscription`]: RAII guard that unsubscribes on drop.
//! - [`Binding`]: teardown handle for a value derived from other cells via
//!   [`Observable::bind`].
//! - [`InputObservable`]: a string cell mirrored to a [`TextInput`] element.
//!
//! # Architecture
//!
//! `Observable<T>` uses `Rc<RefCell<..>>` for single-threaded shared
//! ownership. Timed notifications and suspending subscribers run as tasks on
//! a tokio [`LocalSet`](tokio::task::LocalSet); purely synchronous cells need
//! no runtime at all.
//!
//! This is not a signal graph: there is no diamond deduplication and no
//! topological scheduling. A binding recomputes eagerly whenever one of its
//! sources delivers a change.
//!
//! # Example
//!
//! ```
//! use ftui_reactive::{Observable, ObservableOptions, create};
//!
//! let width = create(10, ObservableOptions::default());
//! let height = Observable::new(4);
//! let area = Observable::new(0);
//! let _binding = area.bind(&[width.clone(), height.clone()], |v| v[0] * v[1])?;
//! assert_eq!(area.get(), 40);
//!
//! width.update(|w| w + 1)?;
//! assert_eq!(area.get(), 44);
//! assert_eq!(area.history(), vec![0, 40, 44]);
//! # Ok::<(), ftui_reactive::ObservableError>(())
//! ```

pub mod bind;
pub mod error;
pub mod input;
pub mod observable;
pub mod options;
pub mod state;
mod timing;

use std::rc::Rc;

pub use bind::Binding;
pub use error::{ObservableError, Result};
pub use input::{InputObservable, TextInput};
pub use observable::{Dispatch, Observable, Outcome, Subscription, WeakObservable};
pub use options::ObservableOptions;
pub use state::CellState;

/// Create a cell holding `value`.
#[must_use]
pub fn create<T: Clone + PartialEq + 'static>(value: T, options: ObservableOptions) -> Observable<T> {
    Observable::with_options(value, options)
}

/// Create a string cell mirrored to `element`.
#[must_use]
pub fn create_input<E: TextInput + ?Sized + 'static>(
    element: Rc<E>,
    options: ObservableOptions,
) -> InputObservable<E> {
    InputObservable::attach(element, options)
}
