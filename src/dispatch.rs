use std::{
    mem,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::worker::request::Completed;

/// Completed requests waiting for the owner thread. Producers are the fetch
/// worker and the facade's disk-hit path; the only consumer is `pump()`.
pub(crate) struct DispatchQueue<B, R> {
    completed: Arc<Mutex<Vec<Completed<B, R>>>>,
}

// derive(Clone) would demand `B: Clone, R: Clone`
impl<B, R> Clone for DispatchQueue<B, R> {
    fn clone(&self) -> Self {
        DispatchQueue {
            completed: Arc::clone(&self.completed),
        }
    }
}

impl<B, R> DispatchQueue<B, R> {
    pub fn new() -> Self {
        DispatchQueue {
            completed: Arc::new(Mutex::new(vec![])),
        }
    }

    pub fn push(&self, completed: Completed<B, R>) {
        lock(&self.completed).push(completed);
    }

    /// Take everything queued so far, in insertion order. The lock is
    /// released before the caller runs any callback, so callbacks are free
    /// to enqueue more work.
    pub fn drain(&self) -> Vec<Completed<B, R>> {
        mem::take(&mut *lock(&self.completed))
    }

    pub fn len(&self) -> usize {
        lock(&self.completed).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// A panic while holding the lock cannot leave the vector half-updated.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
