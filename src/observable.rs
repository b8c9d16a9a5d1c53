//! Observable sensor records.
//!
//! Each box keeps its sensor readings in a plain `Copy` record wrapped in an
//! [`Observable`].  Every field write goes through [`Observable::update`],
//! which mutates the record under the mutex, captures the pre/post snapshots,
//! and then notifies the observers *outside* the lock — an observer may call
//! back into the system without deadlocking on the record it was notified
//! about.
//!
//! The field descriptor `F` is a per-box tagged union with one variant per
//! observable field, carrying the freshly written typed value.  An observer
//! that `match`es the union exhaustively is checked by the compiler for
//! having a handler per field.

use std::sync::Mutex;

/// Observer signature: `(old_snapshot, new_snapshot, field_with_new_value)`.
pub type Observer<S, F> = Box<dyn Fn(&S, &S, &F) + Send + Sync>;

/// A mutex-guarded record whose every field mutation notifies the observers.
pub struct Observable<S: Copy, F> {
    state: Mutex<S>,
    observers: Mutex<Vec<Observer<S, F>>>,
}

impl<S: Copy, F> Observable<S, F> {
    pub fn new(initial: S) -> Self {
        Self {
            state: Mutex::new(initial),
            observers: Mutex::new(Vec::new()),
        }
    }

    /// Append an observer.  Observers are notified in subscription order.
    pub fn subscribe(&self, observer: Observer<S, F>) {
        self.observers.lock().unwrap().push(observer);
    }

    /// Cheap copy of the current record.
    pub fn snapshot(&self) -> S {
        *self.state.lock().unwrap()
    }

    /// Apply `mutate` to the record and publish exactly one notification
    /// carrying the pre-image, post-image, and the field descriptor.
    ///
    /// The record mutex is released before any observer runs.
    pub fn update(&self, field: F, mutate: impl FnOnce(&mut S)) {
        let (old, new) = {
            let mut state = self.state.lock().unwrap();
            let old = *state;
            mutate(&mut state);
            (old, *state)
        };
        let observers = self.observers.lock().unwrap();
        for observer in observers.iter() {
            observer(&old, &new, &field);
        }
    }
}
