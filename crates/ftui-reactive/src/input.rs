#![forbid(unsafe_code)]

//! Observable text mirrored to and from a UI input element.
//!
//! [`InputObservable`] composes an `Observable<String>` with an external,
//! mutable peer implementing [`TextInput`]. The two stay synchronized on
//! every transition:
//!
//! - a user edit on the element calls the cell's `set` with the new text;
//! - [`InputObservable::set`] writes to the element first, then calls the
//!   cell's `set`.
//!
//! Writing directly through [`observable()`](InputObservable::observable)
//! bypasses the element; use the wrapper's `set` to keep both in sync.

use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::error::{ObservableError, Result};
use crate::observable::{Dispatch, Observable, Subscription};
use crate::options::ObservableOptions;

/// Capability of a text-input-like element supplied by the embedding UI.
pub trait TextInput {
    /// Current displayed content.
    fn text(&self) -> String;

    /// Replace the displayed content. Must not invoke edit listeners.
    fn set_text(&self, text: &str);

    /// Register a listener for user edits (`input` and `change` events).
    fn on_edit(&self, listener: Box<dyn Fn(String)>);
}

/// A string cell bound to a [`TextInput`] element.
pub struct InputObservable<E: TextInput + ?Sized> {
    cell: Observable<String>,
    element: Rc<E>,
}

impl<E: TextInput + ?Sized> Clone for InputObservable<E> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
            element: Rc::clone(&self.element),
        }
    }
}

impl<E: TextInput + ?Sized> fmt::Debug for InputObservable<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputObservable")
            .field("cell", &self.cell)
            .finish_non_exhaustive()
    }
}

impl<E: TextInput + ?Sized + 'static> InputObservable<E> {
    /// Seed a cell from the element's content and listen for edits.
    #[must_use]
    pub fn attach(element: Rc<E>, options: ObservableOptions) -> Self {
        let cell = Observable::with_options(element.text(), options);
        let weak = cell.downgrade();
        element.on_edit(Box::new(move |text| {
            let Some(cell) = weak.upgrade() else {
                return;
            };
            if let Err(err) = cell.set(text) {
                debug!(%err, "input edit discarded");
            }
        }));
        Self { cell, element }
    }

    /// Write to the element, then to the cell.
    ///
    /// # Errors
    ///
    /// [`ObservableError::Sealed`] if the cell is sealed; the element is left
    /// untouched.
    pub fn set(&self, text: impl Into<String>) -> Result<Dispatch> {
        if self.cell.is_sealed() {
            return Err(ObservableError::Sealed);
        }
        let text = text.into();
        self.element.set_text(&text);
        self.cell.set(text)
    }

    /// `set(f(&current))`.
    ///
    /// # Errors
    ///
    /// [`ObservableError::Sealed`] if the cell is sealed.
    pub fn update(&self, f: impl FnOnce(&str) -> String) -> Result<Dispatch> {
        if self.cell.is_sealed() {
            return Err(ObservableError::Sealed);
        }
        let next = f(&self.cell.get());
        self.set(next)
    }

    #[must_use]
    pub fn get(&self) -> String {
        self.cell.get()
    }

    /// Same contract as [`Observable::subscribe`].
    pub fn subscribe(
        &self,
        callback: impl Fn(&String, Option<&String>) + 'static,
    ) -> Subscription {
        self.cell.subscribe(callback)
    }

    /// The underlying cell, e.g. as a [`bind`](Observable::bind) source.
    #[must_use]
    pub fn observable(&self) -> &Observable<String> {
        &self.cell
    }

    #[must_use]
    pub fn element(&self) -> &Rc<E> {
        &self.element
    }
}
