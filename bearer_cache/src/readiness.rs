use std::{
    sync::{Condvar, Mutex, PoisonError},
    time::Duration,
};

/// A one-shot latch released by the first successful token load
///
/// Once released it stays released.
#[derive(Debug, Default)]
pub(crate) struct Readiness {
    ready: Mutex<bool>,
    released: Condvar,
}

impl Readiness {
    pub(crate) fn release(&self) {
        let mut ready = self.ready.lock().unwrap_or_else(PoisonError::into_inner);
        if !*ready {
            *ready = true;
            self.released.notify_all();
        }
    }

    pub(crate) fn is_ready(&self) -> bool {
        *self.ready.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks until released or until `timeout` elapses
    ///
    /// Returns whether the latch was released.
    pub(crate) fn wait(&self, timeout: Duration) -> bool {
        let ready = self.ready.lock().unwrap_or_else(PoisonError::into_inner);
        let (ready, _) = self
            .released
            .wait_timeout_while(ready, timeout, |ready| !*ready)
            .unwrap_or_else(PoisonError::into_inner);
        *ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, thread, time::Instant};

    #[test]
    fn wait_times_out_when_never_released() {
        let readiness = Readiness::default();
        let started = Instant::now();
        assert!(!readiness.wait(Duration::from_millis(50)));
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn release_wakes_waiters() {
        let readiness = Arc::new(Readiness::default());
        let waiter = {
            let readiness = Arc::clone(&readiness);
            thread::spawn(move || readiness.wait(Duration::from_secs(5)))
        };

        thread::sleep(Duration::from_millis(20));
        readiness.release();

        assert!(waiter.join().unwrap());
    }

    #[test]
    fn stays_released() {
        let readiness = Readiness::default();
        readiness.release();
        readiness.release();
        assert!(readiness.is_ready());

        let started = Instant::now();
        assert!(readiness.wait(Duration::from_secs(5)));
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
