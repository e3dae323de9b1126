// One-shot notification slots
// Engine listeners may race (error vs. completion on the platform thread), so every
// caller-facing notification goes through a guard that delivers at most once.

use parking_lot::Mutex;
use std::fmt;

type Slot<T> = Box<dyn FnOnce(T) + Send + 'static>;

/// Single-use callback cell
///
/// The first `fire` takes the callback out of the cell and runs it. Later
/// calls find the cell empty, log the double dispatch and return `false`.
pub struct CallbackGuard<T> {
    name: &'static str,
    slot: Mutex<Option<Slot<T>>>,
}

impl<T> CallbackGuard<T> {
    pub fn new<F>(name: &'static str, callback: F) -> Self
    where
        F: FnOnce(T) + Send + 'static,
    {
        Self {
            name,
            slot: Mutex::new(Some(Box::new(callback))),
        }
    }

    /// Deliver `value`. Returns `false` if the callback was already dispatched.
    pub fn fire(&self, value: T) -> bool {
        // Take under the lock, invoke outside it: the callback may re-enter
        let callback = self.slot.lock().take();
        match callback {
            Some(callback) => {
                callback(value);
                true
            }
            None => {
                log::error!("The {} callback was already invoked", self.name);
                false
            }
        }
    }

    pub fn is_spent(&self) -> bool {
        self.slot.lock().is_none()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> fmt::Debug for CallbackGuard<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackGuard")
            .field("name", &self.name)
            .field("spent", &self.is_spent())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn fires_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let guard = CallbackGuard::new("completion", move |n: usize| {
            c.fetch_add(n, Ordering::SeqCst);
        });

        assert!(guard.fire(3));
        assert!(!guard.fire(5));
        assert!(guard.is_spent());
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn racing_fires_deliver_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let guard = Arc::new(CallbackGuard::new("error", move |()| {
            c.fetch_add(1, Ordering::SeqCst);
        }));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let guard = guard.clone();
                thread::spawn(move || guard.fire(()))
            })
            .collect();
        let delivered = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|fired| *fired)
            .count();

        assert_eq!(delivered, 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn callback_may_reenter_guard() {
        let guard = Arc::new(CallbackGuard::<()>::new("load", |_| {}));
        let inner = guard.clone();
        let outer = CallbackGuard::new("outer", move |()| {
            assert!(inner.fire(()));
        });
        assert!(outer.fire(()));
        assert!(guard.is_spent());
    }
}
