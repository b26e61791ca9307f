#![forbid(unsafe_code)]

//! Observable cells with gated change notification.
//!
//! # Design
//!
//! [`Observable<T>`] wraps a value, its subscriber list, a lifecycle
//! [`CellState`], and a chronological history in shared, reference-counted
//! storage. Cloning an `Observable` creates a new handle to the **same** cell.
//!
//! Every [`set`](Observable::set) replaces the value immediately and then runs
//! the notification pipeline:
//!
//! 1. muted cells stop here;
//! 2. writes equal to the previous value stop here;
//! 3. the throttle window drops notifications while open;
//! 4. the debounce slot defers and coalesces;
//! 5. subscribers run in registration order, each awaited before the next,
//!    then the new value is appended to history.
//!
//! Delivery is synchronous until a subscriber suspends. From that point the
//! rest of the cycle continues as a task on the current thread's
//! [`LocalSet`](tokio::task::LocalSet). Debounce timers are also local tasks.
//! Cells that use neither debounce nor [`subscribe_async`] never need a
//! runtime.
//!
//! # Invariants
//!
//! 1. History is never empty and starts with the initial value.
//! 2. Subscribers are invoked in registration order.
//! 3. A write equal to the current value produces no notification and no
//!    history entry.
//! 4. After [`seal`](Observable::seal) the subscriber list is empty and the
//!    value and state never change again.
//! 5. A subscriber removed mid-cycle is not invoked for the rest of that cycle.
//!
//! # Failure Modes
//!
//! - **Subscriber panics**: the panic unwinds out of `set` for synchronous
//!   subscribers, or out of [`Dispatch::settled`] once the cycle has moved to
//!   a task. The value has already been replaced; history is not appended.
//! - **Sealed mid-cycle**: the remaining subscribers are skipped and the
//!   cycle's value is not appended to history.
//! - **Re-entrant borrow**: calling a mutating method on the same cell from
//!   inside [`with`](Observable::with) panics. Subscribers are never invoked
//!   while the cell is borrowed, so they may freely read and write it.
//!
//! [`subscribe_async`]: Observable::subscribe_async

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::error::{ObservableError, Result};
use crate::options::ObservableOptions;
use crate::state::CellState;
use crate::timing::{DebounceSlot, ThrottleWindow};

static NEXT_CELL_ID: AtomicU64 = AtomicU64::new(1);

fn next_cell_id() -> u64 {
    NEXT_CELL_ID.fetch_add(1, Ordering::Relaxed)
}

/// Completion future returned by a suspending subscriber.
pub(crate) type Suspended = Pin<Box<dyn Future<Output = ()>>>;

/// Type-erased subscriber. Returns `Some` when the subscriber suspends.
pub(crate) type Callback<T> = Rc<dyn Fn(&T, Option<&T>) -> Option<Suspended>>;

struct Entry<T> {
    id: u64,
    callback: Callback<T>,
}

impl<T> Clone for Entry<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            callback: Rc::clone(&self.callback),
        }
    }
}

/// Shared interior for [`Observable<T>`].
struct Inner<T> {
    /// Unique id, used in log fields.
    id: u64,
    value: T,
    state: CellState,
    /// Registration order is notification order.
    subscribers: Vec<Entry<T>>,
    next_subscriber: u64,
    history: VecDeque<T>,
    options: ObservableOptions,
    throttle: ThrottleWindow,
    debounce: DebounceSlot<T>,
}

impl<T> Inner<T> {
    fn is_registered(&self, id: u64) -> bool {
        self.subscribers.iter().any(|entry| entry.id == id)
    }
}

impl<T> Drop for Inner<T> {
    fn drop(&mut self) {
        self.debounce.cancel();
    }
}

// ---------------------------------------------------------------------------
// Outcome / Dispatch
// ---------------------------------------------------------------------------

/// How a single notification cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Every current subscriber was invoked and history was appended.
    Delivered,
    /// The cell was muted; nothing was delivered.
    Muted,
    /// The new value equals the previous one, or a debounced burst ended on
    /// the value it started from; nothing was delivered.
    Unchanged,
    /// Dropped by an open throttle window.
    Throttled,
    /// A pending debounce was superseded by a later write, or the cell was
    /// sealed or dropped before the timer fired.
    Cancelled,
}

impl Outcome {
    #[inline]
    #[must_use]
    pub const fn is_delivered(self) -> bool {
        matches!(self, Self::Delivered)
    }
}

enum DispatchState {
    Ready(Outcome),
    Pending(JoinHandle<Outcome>),
}

/// Handle to the notification cycle started by a write.
///
/// Dropping a `Dispatch` does not cancel the cycle; notification is
/// fire-and-forget unless the caller awaits [`settled`](Self::settled).
pub struct Dispatch {
    state: DispatchState,
}

impl Dispatch {
    fn ready(outcome: Outcome) -> Self {
        Self {
            state: DispatchState::Ready(outcome),
        }
    }

    fn pending(handle: JoinHandle<Outcome>) -> Self {
        Self {
            state: DispatchState::Pending(handle),
        }
    }

    /// The outcome, if the cycle finished synchronously.
    #[must_use]
    pub fn outcome(&self) -> Option<Outcome> {
        match &self.state {
            DispatchState::Ready(outcome) => Some(*outcome),
            DispatchState::Pending(_) => None,
        }
    }

    /// Whether the cycle is still waiting on a timer or a suspended subscriber.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self.state, DispatchState::Pending(_))
    }

    /// Wait for the cycle to finish.
    ///
    /// # Panics
    ///
    /// Resumes the panic of any subscriber that panicked after the cycle
    /// moved onto a task.
    pub async fn settled(self) -> Outcome {
        match self.state {
            DispatchState::Ready(outcome) => outcome,
            DispatchState::Pending(handle) => match handle.await {
                Ok(outcome) => outcome,
                Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
                Err(_) => Outcome::Cancelled,
            },
        }
    }
}

impl fmt::Debug for Dispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            DispatchState::Ready(outcome) => f.debug_tuple("Dispatch").field(outcome).finish(),
            DispatchState::Pending(_) => f.write_str("Dispatch(Pending)"),
        }
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// Registration guard returned by [`Observable::subscribe`].
///
/// Dropping the guard unsubscribes. Call [`detach`](Self::detach) to keep the
/// callback registered for the life of the cell.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    release: Cell<Option<Box<dyn FnOnce()>>>,
}

impl Subscription {
    fn new(release: impl FnOnce() + 'static) -> Self {
        Self {
            release: Cell::new(Some(Box::new(release))),
        }
    }

    fn inert() -> Self {
        Self {
            release: Cell::new(None),
        }
    }

    /// Remove this registration. Calling it again is a no-op.
    pub fn unsubscribe(&self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }

    /// Keep the callback registered and discard the guard.
    pub fn detach(self) {
        drop(self.release.take());
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Observable
// ---------------------------------------------------------------------------

/// A shared, observable value cell.
///
/// Cloning an `Observable` creates a new handle to the **same** inner state.
pub struct Observable<T> {
    inner: Rc<RefCell<Inner<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Observable")
            .field("id", &inner.id)
            .field("value", &inner.value)
            .field("state", &inner.state)
            .field("subscribers", &inner.subscribers.len())
            .field("history_len", &inner.history.len())
            .finish()
    }
}

/// Non-owning handle to an [`Observable`].
pub struct WeakObservable<T> {
    inner: Weak<RefCell<Inner<T>>>,
}

impl<T> Clone for WeakObservable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<T> WeakObservable<T> {
    /// Recover a strong handle if the cell is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Observable<T>> {
        self.inner.upgrade().map(|inner| Observable { inner })
    }
}

impl<T> fmt::Debug for WeakObservable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakObservable")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    /// Create a cell with default options.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self::with_options(value, ObservableOptions::default())
    }

    /// Create a cell with the given timing and history options.
    #[must_use]
    pub fn with_options(value: T, options: ObservableOptions) -> Self {
        let mut history = VecDeque::new();
        history.push_back(value.clone());
        Self {
            inner: Rc::new(RefCell::new(Inner {
                id: next_cell_id(),
                value,
                state: CellState::Unsealed,
                subscribers: Vec::new(),
                next_subscriber: 0,
                history,
                options,
                throttle: ThrottleWindow::default(),
                debounce: DebounceSlot::default(),
            })),
        }
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Current value. Reflects every write, even while notification is
    /// pending, muted, or throttled.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.borrow().value.clone()
    }

    /// Access the current value by reference without cloning.
    ///
    /// # Panics
    ///
    /// Panics if the closure mutates the same cell (re-entrant borrow).
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.borrow().value)
    }

    #[must_use]
    pub fn state(&self) -> CellState {
        self.inner.borrow().state
    }

    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.state().is_sealed()
    }

    #[must_use]
    pub fn is_muted(&self) -> bool {
        self.state().is_muted()
    }

    /// Snapshot of the recorded history, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<T> {
        self.inner.borrow().history.iter().cloned().collect()
    }

    /// Number of live registrations.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().subscribers.len()
    }

    #[must_use]
    pub fn options(&self) -> ObservableOptions {
        self.inner.borrow().options
    }

    /// Whether a debounce timer is waiting to fire.
    #[must_use]
    pub fn has_pending_debounce(&self) -> bool {
        self.inner.borrow().debounce.is_pending()
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakObservable<T> {
        WeakObservable {
            inner: Rc::downgrade(&self.inner),
        }
    }

    // ── Subscriptions ────────────────────────────────────────────────

    /// Register a callback receiving `(new, old)` on every delivered change.
    ///
    /// The callback is invoked once, synchronously, before this method
    /// returns, with the current value and the second-to-last history entry
    /// (`None` if history holds a single value).
    ///
    /// Subscribing to a sealed cell still performs the initial invocation but
    /// registers nothing.
    pub fn subscribe(&self, callback: impl Fn(&T, Option<&T>) + 'static) -> Subscription {
        self.subscribe_callback(Rc::new(
            move |new: &T, old: Option<&T>| -> Option<Suspended> {
                callback(new, old);
                None
            },
        ))
    }

    /// Register a suspending callback.
    ///
    /// The pipeline awaits the returned future before invoking the next
    /// subscriber. The initial invocation's future is spawned onto the
    /// current [`LocalSet`](tokio::task::LocalSet).
    ///
    /// # Panics
    ///
    /// Panics if called outside a `LocalSet`.
    pub fn subscribe_async<F, Fut>(&self, callback: F) -> Subscription
    where
        F: Fn(T, Option<T>) -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        self.subscribe_callback(Rc::new(
            move |new: &T, old: Option<&T>| -> Option<Suspended> {
                Some(Box::pin(callback(new.clone(), old.cloned())))
            },
        ))
    }

    fn subscribe_callback(&self, callback: Callback<T>) -> Subscription {
        let subscription = self.register(Rc::clone(&callback));
        let (current, previous) = {
            let inner = self.inner.borrow();
            (inner.value.clone(), inner.history.iter().rev().nth(1).cloned())
        };
        if let Some(suspended) = callback(&current, previous.as_ref()) {
            drop(tokio::task::spawn_local(suspended));
        }
        subscription
    }

    /// Append a callback without the initial invocation.
    pub(crate) fn register(&self, callback: Callback<T>) -> Subscription {
        let id = {
            let mut inner = self.inner.borrow_mut();
            if inner.state.is_sealed() {
                return Subscription::inert();
            }
            let id = inner.next_subscriber;
            inner.next_subscriber += 1;
            inner.subscribers.push(Entry { id, callback });
            trace!(cell = inner.id, subscriber = id, "subscribed");
            id
        };
        let weak = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            // Drop the callback outside the borrow: it may own other guards
            // for this same cell.
            let removed = {
                let mut inner = inner.borrow_mut();
                let pos = inner.subscribers.iter().position(|entry| entry.id == id);
                pos.map(|pos| inner.subscribers.remove(pos))
            };
            drop(removed);
        })
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Replace the value and run the notification pipeline.
    ///
    /// # Errors
    ///
    /// [`ObservableError::Sealed`] if the cell is sealed.
    ///
    /// # Panics
    ///
    /// Propagates panics from synchronous subscribers. Panics if the cell
    /// debounces, or a subscriber suspends, outside a
    /// [`LocalSet`](tokio::task::LocalSet).
    pub fn set(&self, value: T) -> Result<Dispatch> {
        let old = {
            let mut inner = self.inner.borrow_mut();
            if inner.state.is_sealed() {
                return Err(ObservableError::Sealed);
            }
            std::mem::replace(&mut inner.value, value.clone())
        };
        Ok(self.notify(value, old))
    }

    /// `set(f(&current))`.
    ///
    /// # Errors
    ///
    /// [`ObservableError::Sealed`] if the cell is sealed; `f` is not called.
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> Result<Dispatch> {
        if self.is_sealed() {
            return Err(ObservableError::Sealed);
        }
        let next = f(&self.get());
        self.set(next)
    }

    /// Suppress notifications for future writes. Writes still update the value.
    ///
    /// # Errors
    ///
    /// [`ObservableError::Sealed`] if the cell is sealed.
    pub fn mute(&self) -> Result<()> {
        self.transition(CellState::Muted)
    }

    /// Resume notifications.
    ///
    /// # Errors
    ///
    /// [`ObservableError::Sealed`] if the cell is sealed.
    pub fn unmute(&self) -> Result<()> {
        self.transition(CellState::Unsealed)
    }

    fn transition(&self, next: CellState) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        if inner.state.is_sealed() {
            return Err(ObservableError::Sealed);
        }
        trace!(cell = inner.id, from = %inner.state, to = %next, "state transition");
        inner.state = next;
        Ok(())
    }

    /// Clear all subscribers, cancel any pending debounce, and freeze the cell.
    ///
    /// Irreversible. Sealing twice is a no-op. Reads stay valid.
    pub fn seal(&self) {
        let (id, dropped) = {
            let inner = &mut *self.inner.borrow_mut();
            if inner.state.is_sealed() {
                return;
            }
            inner.state = CellState::Sealed;
            inner.debounce.cancel();
            inner.throttle.reset();
            (inner.id, std::mem::take(&mut inner.subscribers))
        };
        debug!(cell = id, subscribers = dropped.len(), "observable sealed");
        drop(dropped);
    }

    // ── Pipeline ─────────────────────────────────────────────────────

    fn notify(&self, new: T, old: T) -> Dispatch {
        let mut inner = self.inner.borrow_mut();
        if inner.state.is_muted() {
            trace!(cell = inner.id, "muted, notification suppressed");
            return Dispatch::ready(Outcome::Muted);
        }
        if new == old {
            return Dispatch::ready(Outcome::Unchanged);
        }
        if let Some(window) = inner.options.throttle {
            if !inner.throttle.admit(window, Instant::now()) {
                trace!(cell = inner.id, "throttle window open, notification dropped");
                return Dispatch::ready(Outcome::Throttled);
            }
        }
        let Some(delay) = inner.options.debounce else {
            drop(inner);
            return self.deliver(new, old);
        };

        let origin = inner.debounce.supersede().unwrap_or(old);
        let deadline = Instant::now() + delay;
        let weak = Rc::downgrade(&self.inner);
        let burst_old = origin.clone();
        let handle = tokio::task::spawn_local(async move {
            tokio::time::sleep_until(deadline).await;
            let Some(inner) = weak.upgrade() else {
                return Outcome::Cancelled;
            };
            inner.borrow_mut().debounce.fire();
            if new == burst_old {
                trace!(cell = inner.borrow().id, "debounced burst returned to origin");
                return Outcome::Unchanged;
            }
            Observable { inner }.deliver(new, burst_old).settled().await
        });
        inner.debounce.arm(handle.abort_handle(), origin);
        let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        trace!(cell = inner.id, delay_ms, "debounce armed");
        Dispatch::pending(handle)
    }

    fn deliver(&self, new: T, old: T) -> Dispatch {
        let mut queue = self.inner.borrow().subscribers.clone().into_iter();
        while let Some(entry) = queue.next() {
            if !self.inner.borrow().is_registered(entry.id) {
                continue;
            }
            let Some(suspended) = (entry.callback)(&new, Some(&old)) else {
                continue;
            };
            trace!(cell = self.inner.borrow().id, subscriber = entry.id, "subscriber suspended");
            let cell = self.clone();
            let handle = tokio::task::spawn_local(async move {
                suspended.await;
                for entry in queue {
                    if !cell.inner.borrow().is_registered(entry.id) {
                        continue;
                    }
                    if let Some(suspended) = (entry.callback)(&new, Some(&old)) {
                        suspended.await;
                    }
                }
                cell.record(new);
                Outcome::Delivered
            });
            return Dispatch::pending(handle);
        }
        self.record(new);
        Dispatch::ready(Outcome::Delivered)
    }

    fn record(&self, value: T) {
        let inner = &mut *self.inner.borrow_mut();
        if inner.state.is_sealed() {
            trace!(cell = inner.id, "sealed mid-cycle, history unchanged");
            return;
        }
        inner.history.push_back(value);
        if let Some(capacity) = inner.options.history_capacity {
            while inner.history.len() > capacity.get() {
                inner.history.pop_front();
            }
        }
        trace!(cell = inner.id, history_len = inner.history.len(), "delivered");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
