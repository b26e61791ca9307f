//! Property-based invariant tests for observable cells and derived bindings.
//!
//! These tests verify structural invariants that must hold for any sequence
//! of synchronous operations:
//!
//! 1. A fresh cell reads back its initial value with a one-entry history.
//! 2. Only writes that change the value notify, each exactly once per
//!    subscriber, carrying `(new, previous)`.
//! 3. History equals the initial value followed by every delivered value, and
//!    its last entry equals the current value.
//! 4. Bounded history never exceeds capacity and is a suffix of the unbounded
//!    history.
//! 5. Muted writes update the value but never notify or record.
//! 6. After seal, every mutation fails and the value is frozen.
//! 7. A binding always equals `compute(sources)` after any write sequence.
//! 8. Unsubscribe is idempotent and only removes its own registration.

use std::cell::RefCell;
use std::num::NonZeroUsize;
use std::rc::Rc;

use ftui_reactive::{CellState, Observable, ObservableError, ObservableOptions, Outcome, create};
use proptest::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Op {
    Set(i8),
    Mute,
    Unmute,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => any::<i8>().prop_map(Op::Set),
        1 => Just(Op::Mute),
        1 => Just(Op::Unmute),
    ]
}

fn small_values() -> impl Strategy<Value = Vec<i8>> {
    // Narrow range so repeated values (no-op writes) are common.
    prop::collection::vec(-3i8..=3, 0..64)
}

type Log = Rc<RefCell<Vec<(i8, Option<i8>)>>>;

fn recorder(cell: &Observable<i8>) -> (Log, ftui_reactive::Subscription) {
    let log: Log = Rc::default();
    let sink = Rc::clone(&log);
    let sub = cell.subscribe(move |new: &i8, old: Option<&i8>| {
        sink.borrow_mut().push((*new, old.copied()));
    });
    log.borrow_mut().clear();
    (log, sub)
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Construction
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn fresh_cell_reads_back_initial(v in any::<i64>()) {
        let cell = create(v, ObservableOptions::default());
        prop_assert_eq!(cell.get(), v);
        prop_assert_eq!(cell.history(), vec![v]);
        prop_assert_eq!(cell.state(), CellState::Unsealed);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2-3. Notification and history
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn only_changes_notify(initial in -3i8..=3, writes in small_values()) {
        let cell = Observable::new(initial);
        let (log, _sub) = recorder(&cell);

        let mut expected = Vec::new();
        let mut current = initial;
        for v in writes {
            let outcome = cell.set(v).unwrap().outcome();
            if v == current {
                prop_assert_eq!(outcome, Some(Outcome::Unchanged));
            } else {
                prop_assert_eq!(outcome, Some(Outcome::Delivered));
                expected.push((v, Some(current)));
            }
            current = v;
        }

        prop_assert_eq!(&*log.borrow(), &expected);
        prop_assert_eq!(cell.get(), current);
    }

    #[test]
    fn history_matches_delivered_values(initial in -3i8..=3, writes in small_values()) {
        let cell = Observable::new(initial);
        let mut expected = vec![initial];
        for v in writes {
            let _ = cell.set(v).unwrap();
            if *expected.last().unwrap() != v {
                expected.push(v);
            }
        }
        let history = cell.history();
        prop_assert_eq!(&history, &expected);
        prop_assert_eq!(history.last().copied(), Some(cell.get()));
    }

    #[test]
    fn every_subscriber_sees_every_change(
        writes in small_values(),
        subscribers in 1usize..6,
    ) {
        let cell = Observable::new(0i8);
        let logs: Vec<_> = (0..subscribers).map(|_| recorder(&cell)).collect();
        for v in writes {
            let _ = cell.set(v).unwrap();
        }
        let first = logs[0].0.borrow().clone();
        for (log, _) in &logs {
            prop_assert_eq!(&*log.borrow(), &first);
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Bounded history
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn bounded_history_is_suffix(cap in 1usize..8, writes in small_values()) {
        let cap = NonZeroUsize::new(cap).unwrap();
        let bounded = Observable::with_options(
            0i8,
            ObservableOptions::new().with_history_capacity(cap),
        );
        let unbounded = Observable::new(0i8);
        for v in writes {
            let _ = bounded.set(v).unwrap();
            let _ = unbounded.set(v).unwrap();
        }
        let short = bounded.history();
        let full = unbounded.history();
        prop_assert!(!short.is_empty());
        prop_assert!(short.len() <= cap.get());
        prop_assert!(full.ends_with(&short));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. Mute
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn muted_writes_are_silent(ops in prop::collection::vec(op_strategy(), 0..64)) {
        let cell = Observable::new(0i8);
        let (log, _sub) = recorder(&cell);

        let mut muted = false;
        let mut current = 0i8;
        let mut delivered = 0usize;
        for op in ops {
            match op {
                Op::Set(v) => {
                    let outcome = cell.set(v).unwrap().outcome().unwrap();
                    if muted {
                        prop_assert_eq!(outcome, Outcome::Muted);
                    } else if v != current {
                        delivered += 1;
                    }
                    current = v;
                }
                Op::Mute => {
                    cell.mute().unwrap();
                    muted = true;
                }
                Op::Unmute => {
                    cell.unmute().unwrap();
                    muted = false;
                }
            }
            prop_assert_eq!(cell.is_muted(), muted);
            prop_assert_eq!(cell.get(), current);
        }
        prop_assert_eq!(log.borrow().len(), delivered);
        prop_assert_eq!(cell.history().len(), delivered + 1);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 6. Seal
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn sealed_cell_is_frozen(
        before in small_values(),
        after in prop::collection::vec(op_strategy(), 1..16),
    ) {
        let cell = Observable::new(0i8);
        let (log, _sub) = recorder(&cell);
        for v in before {
            let _ = cell.set(v).unwrap();
        }
        cell.seal();
        let frozen = cell.get();
        let history = cell.history();
        let seen = log.borrow().len();

        for op in after {
            let res = match op {
                Op::Set(v) => cell.set(v).map(|_| ()),
                Op::Mute => cell.mute(),
                Op::Unmute => cell.unmute(),
            };
            prop_assert_eq!(res, Err(ObservableError::Sealed));
        }
        prop_assert_eq!(cell.get(), frozen);
        prop_assert_eq!(cell.history(), history);
        prop_assert_eq!(cell.state(), CellState::Sealed);
        prop_assert_eq!(cell.subscriber_count(), 0);
        prop_assert_eq!(log.borrow().len(), seen);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 7. Bindings
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn binding_tracks_compute(
        writes in prop::collection::vec((0usize..3, any::<i16>()), 0..48),
    ) {
        let sources: Vec<_> = (0..3).map(|_| Observable::new(0i64)).collect();
        let weighted = Observable::new(0i64);
        let _binding = weighted
            .bind(&sources, |v| v[0] + 10 * v[1] + 100 * v[2])
            .unwrap();

        for (idx, v) in writes {
            let _ = sources[idx].set(i64::from(v)).unwrap();
            let expect = sources[0].get() + 10 * sources[1].get() + 100 * sources[2].get();
            prop_assert_eq!(weighted.get(), expect);
        }
    }

    #[test]
    fn unbound_target_stays_put(
        writes in prop::collection::vec((0usize..2, any::<i16>()), 1..32),
    ) {
        let sources: Vec<_> = (0..2).map(|_| Observable::new(1i64)).collect();
        let product = Observable::new(0i64);
        let binding = product.bind(&sources, |v| v[0] * v[1]).unwrap();
        binding.unbind();

        for (idx, v) in writes {
            let _ = sources[idx].set(i64::from(v)).unwrap();
        }
        prop_assert_eq!(product.get(), 1);
        for source in &sources {
            prop_assert_eq!(source.subscriber_count(), 0);
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 8. Unsubscribe
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn unsubscribe_removes_only_itself(
        total in 1usize..8,
        removals in prop::collection::vec(0usize..8, 0..16),
    ) {
        let cell = Observable::new(0i8);
        let subs: Vec<_> = (0..total).map(|_| cell.subscribe(|_, _| {})).collect();
        let mut removed = vec![false; total];
        for idx in removals {
            if idx < total {
                subs[idx].unsubscribe();
                removed[idx] = true;
            }
            let live = removed.iter().filter(|r| !**r).count();
            prop_assert_eq!(cell.subscriber_count(), live);
        }
    }
}
