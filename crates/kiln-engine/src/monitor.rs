//! Single-lock coordination primitive.
//!
//! All state shared between the render thread and host threads lives inside
//! one `Monitor`. There is exactly one mutex and one condition variable per
//! monitor, and waiting is only possible while holding the lock, so there is
//! no lock ordering to get wrong.

use std::ops::{Deref, DerefMut};

use parking_lot::{Condvar, Mutex, MutexGuard};

/// A mutex + condition variable pair guarding a single value.
pub struct Monitor<T> {
    state: Mutex<T>,
    signal: Condvar,
}

impl<T> Monitor<T> {
    pub fn new(state: T) -> Self {
        Self {
            state: Mutex::new(state),
            signal: Condvar::new(),
        }
    }

    /// Runs `f` with exclusive access to the state and returns its result.
    pub fn with_lock<R>(&self, f: impl FnOnce(&mut Locked<'_, T>) -> R) -> R {
        let mut locked = Locked {
            guard: self.state.lock(),
            signal: &self.signal,
        };
        f(&mut locked)
    }

    /// Wakes every thread blocked in [`Locked::wait`].
    pub fn notify_all(&self) {
        self.signal.notify_all();
    }
}

impl<T: Default> Default for Monitor<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Exclusive access to a monitor's state for the duration of `with_lock`.
pub struct Locked<'a, T> {
    guard: MutexGuard<'a, T>,
    signal: &'a Condvar,
}

impl<T> Locked<'_, T> {
    /// Releases the lock and blocks until the next `notify_all`, then
    /// re-acquires it. Spurious wakeups are possible; callers re-check their
    /// predicate.
    pub fn wait(&mut self) {
        self.signal.wait(&mut self.guard);
    }

    /// Waits for as long as `blocked` holds.
    pub fn wait_while(&mut self, mut blocked: impl FnMut(&T) -> bool) {
        while blocked(&self.guard) {
            self.wait();
        }
    }

    pub fn notify_all(&self) {
        self.signal.notify_all();
    }
}

impl<T> Deref for Locked<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for Locked<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn with_lock_returns_closure_result() {
        let monitor = Monitor::new(41);
        let value = monitor.with_lock(|n| {
            **n += 1;
            **n
        });
        assert_eq!(value, 42);
    }

    #[test]
    fn wait_while_wakes_on_notify() {
        let monitor = Arc::new(Monitor::new(false));
        let setter = Arc::clone(&monitor);

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            setter.with_lock(|ready| {
                **ready = true;
                ready.notify_all();
            });
        });

        monitor.with_lock(|ready| ready.wait_while(|ready| !*ready));
        assert!(monitor.with_lock(|ready| **ready));
        handle.join().unwrap();
    }

    #[test]
    fn every_waiter_is_woken() {
        let monitor = Arc::new(Monitor::new(0u32));
        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let m = Arc::clone(&monitor);
                thread::spawn(move || m.with_lock(|seq| seq.wait_while(|seq| *seq == 0)))
            })
            .collect();

        thread::sleep(Duration::from_millis(20));
        monitor.with_lock(|seq| **seq = 1);
        monitor.notify_all();

        for w in waiters {
            w.join().unwrap();
        }
    }
}
