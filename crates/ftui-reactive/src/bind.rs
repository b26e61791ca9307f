#![forbid(unsafe_code)]

//! Derived bindings: one observable's value computed from others.
//!
//! # Design
//!
//! [`Observable::bind`] registers one subscription per source. Each callback
//! ignores the emitted values, re-reads **all** sources fresh, runs the
//! compute function, and `set`s the target. The compute function also runs
//! once at bind time so the target holds a derived value immediately.
//!
//! Unlike a lazy memoized cell, a binding is eager: every delivered source
//! change recomputes. The target's own equality check absorbs recomputes that
//! produce the same value.
//!
//! # Invariants
//!
//! 1. After `bind` returns, the target equals `compute(current sources)`.
//! 2. Each source holds exactly one registration per binding.
//! 3. After [`Binding::unbind`] no further recomputation happens, however the
//!    sources change.
//!
//! # Failure Modes
//!
//! - **Compute function panics**: the panic unwinds through the source's
//!   `set` call. No partial recovery is attempted.
//! - **Target sealed later**: recomputes still run but the write is rejected;
//!   the error is logged at `debug` and discarded.
//! - **Source or target dropped**: sources and target are held weakly, so a
//!   binding never keeps them alive. Recomputation stops once any of them is
//!   gone.

use std::rc::Rc;

use tracing::{debug, trace};

use crate::error::{ObservableError, Result};
use crate::observable::{Callback, Observable, Subscription, Suspended};

/// Teardown handle for a derived binding.
///
/// Dropping the handle unbinds. [`detach`](Self::detach) keeps the binding
/// for as long as its sources live.
#[must_use = "dropping a Binding unbinds immediately"]
#[derive(Debug)]
pub struct Binding {
    subscriptions: Vec<Subscription>,
}

impl Binding {
    /// Unsubscribe from every source. Calling it again is a no-op.
    pub fn unbind(&self) {
        for subscription in &self.subscriptions {
            subscription.unsubscribe();
        }
    }

    /// Number of sources this binding listens to.
    #[must_use]
    pub fn source_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Keep the binding alive and discard the handle.
    pub fn detach(self) {
        let Self { subscriptions } = self;
        for subscription in subscriptions {
            subscription.detach();
        }
    }
}

fn recompute_hook<S: 'static>(recompute: &Rc<dyn Fn()>) -> Callback<S> {
    let recompute = Rc::clone(recompute);
    Rc::new(move |_: &S, _: Option<&S>| -> Option<Suspended> {
        recompute();
        None
    })
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    /// Derive this cell from an ordered list of same-typed sources.
    ///
    /// `compute` receives the current source values in `sources` order.
    ///
    /// # Errors
    ///
    /// [`ObservableError::Sealed`] if this cell is sealed; nothing is
    /// registered.
    pub fn bind<S>(
        &self,
        sources: &[Observable<S>],
        compute: impl Fn(&[S]) -> T + 'static,
    ) -> Result<Binding>
    where
        S: Clone + PartialEq + 'static,
    {
        let weak: Vec<_> = sources.iter().map(Observable::downgrade).collect();
        self.bind_with(
            move || {
                let values = weak
                    .iter()
                    .map(|source| source.upgrade().map(|source| source.get()))
                    .collect::<Option<Vec<S>>>()?;
                Some(compute(&values))
            },
            |recompute| {
                sources
                    .iter()
                    .map(|source| source.register(recompute_hook(recompute)))
                    .collect()
            },
        )
    }

    /// Derive this cell from a single source.
    ///
    /// # Errors
    ///
    /// [`ObservableError::Sealed`] if this cell is sealed.
    pub fn bind_map<S>(
        &self,
        source: &Observable<S>,
        map: impl Fn(&S) -> T + 'static,
    ) -> Result<Binding>
    where
        S: Clone + PartialEq + 'static,
    {
        let weak = source.downgrade();
        self.bind_with(
            move || weak.upgrade().map(|source| source.with(&map)),
            |recompute| vec![source.register(recompute_hook(recompute))],
        )
    }

    /// Derive this cell from two sources of different types.
    ///
    /// # Errors
    ///
    /// [`ObservableError::Sealed`] if this cell is sealed.
    pub fn bind2<A, B>(
        &self,
        a: &Observable<A>,
        b: &Observable<B>,
        compute: impl Fn(&A, &B) -> T + 'static,
    ) -> Result<Binding>
    where
        A: Clone + PartialEq + 'static,
        B: Clone + PartialEq + 'static,
    {
        let weak_a = a.downgrade();
        let weak_b = b.downgrade();
        self.bind_with(
            move || {
                let a = weak_a.upgrade()?;
                let b = weak_b.upgrade()?;
                Some(a.with(|va| b.with(|vb| compute(va, vb))))
            },
            |recompute| {
                vec![
                    a.register(recompute_hook(recompute)),
                    b.register(recompute_hook(recompute)),
                ]
            },
        )
    }

    /// Shared wiring: initial write, then one registration per source.
    ///
    /// `read` yields `None` once a source has been dropped.
    fn bind_with(
        &self,
        read: impl Fn() -> Option<T> + 'static,
        attach: impl FnOnce(&Rc<dyn Fn()>) -> Vec<Subscription>,
    ) -> Result<Binding> {
        if self.is_sealed() {
            return Err(ObservableError::Sealed);
        }
        if let Some(initial) = read() {
            drop(self.set(initial)?);
        }

        let target = self.downgrade();
        let recompute: Rc<dyn Fn()> = Rc::new(move || {
            let Some(target) = target.upgrade() else {
                return;
            };
            let Some(next) = read() else {
                trace!("binding source dropped, recompute skipped");
                return;
            };
            if let Err(err) = target.set(next) {
                debug!(%err, "binding write discarded");
            }
        });

        Ok(Binding {
            subscriptions: attach(&recompute),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
