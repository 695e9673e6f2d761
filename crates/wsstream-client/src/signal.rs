use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// A value that is set once and then observed by any number of waiters.
pub struct OneShot<T> {
    value: Mutex<Option<T>>,
    fired: Condvar,
}

impl<T: Clone> OneShot<T> {
    pub fn new() -> Self {
        Self {
            value: Mutex::new(None),
            fired: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<T>> {
        self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the value and wake every waiter. Returns false if already set.
    pub fn fire(&self, value: T) -> bool {
        let mut slot = self.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(value);
        self.fired.notify_all();
        true
    }

    /// Block until the value is set.
    pub fn wait(&self) -> T {
        let mut slot = self.lock();
        loop {
            if let Some(value) = slot.as_ref() {
                return value.clone();
            }
            slot = self
                .fired
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

impl<T: Clone> Default for OneShot<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn fires_once() {
        let signal = OneShot::new();
        assert!(signal.fire(1));
        assert!(!signal.fire(2));
        assert_eq!(signal.wait(), 1);
    }

    #[test]
    fn wakes_all_waiters() {
        let signal = Arc::new(OneShot::new());
        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let signal = Arc::clone(&signal);
                thread::spawn(move || signal.wait())
            })
            .collect();

        thread::sleep(Duration::from_millis(20));
        signal.fire("ready");
        for waiter in waiters {
            assert_eq!(waiter.join().unwrap(), "ready");
        }
    }
}
