//! Synchronisation primitives for the load-completion handshake.
//!
//! [`Latch`] is a single-fire signal: any number of `fire` calls, only the
//! first has an effect, and a fire that happens before anyone waits is kept
//! until the wait. [`CancelToken`] releases every waiter when the caller
//! aborts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::{after, bounded, never, select, Receiver, Sender};

/// Outcome of [`Latch::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Fired,
    TimedOut,
    Cancelled,
}

/// Single-fire latch backed by a one-slot channel.
#[derive(Clone)]
pub struct Latch {
    fired: Arc<AtomicBool>,
    tx: Sender<()>,
    rx: Receiver<()>,
}

impl Latch {
    pub fn new() -> Self {
        let (tx, rx) = bounded(1);
        Self {
            fired: Arc::new(AtomicBool::new(false)),
            tx,
            rx,
        }
    }

    /// Signal the latch. Returns `true` for the call that actually fired it.
    pub fn fire(&self) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            return false;
        }
        // The slot is empty: only the winning caller ever sends.
        let _ = self.tx.try_send(());
        true
    }

    pub fn is_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Block until the latch fires, `timeout` elapses or `cancel` is
    /// triggered. `None` waits without a deadline.
    ///
    /// A latch that already fired returns `Fired` even when the token is
    /// cancelled as well.
    pub fn wait(&self, timeout: Option<Duration>, cancel: &CancelToken) -> WaitOutcome {
        if self.is_fired() {
            return WaitOutcome::Fired;
        }
        let deadline = match timeout {
            Some(t) => after(t),
            None => never(),
        };
        select! {
            recv(self.rx) -> _ => WaitOutcome::Fired,
            recv(cancel.rx) -> _ => WaitOutcome::Cancelled,
            recv(deadline) -> _ => WaitOutcome::TimedOut,
        }
    }
}

impl Default for Latch {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable cancellation signal.
///
/// Cancelling drops the only sender of an internal channel, which wakes
/// every receiver at once.
#[derive(Clone)]
pub struct CancelToken {
    tx: Arc<Mutex<Option<Sender<()>>>>,
    rx: Receiver<()>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            tx: Arc::new(Mutex::new(Some(tx))),
            rx,
        }
    }

    /// Cancel. Idempotent.
    pub fn cancel(&self) {
        let mut guard = match self.tx.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.take();
    }

    pub fn is_cancelled(&self) -> bool {
        match self.tx.lock() {
            Ok(g) => g.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn fire_before_wait_is_observed() {
        let latch = Latch::new();
        assert!(latch.fire());
        assert_eq!(latch.wait(None, &CancelToken::new()), WaitOutcome::Fired);
    }

    #[test]
    fn only_first_fire_counts() {
        let latch = Latch::new();
        assert!(latch.fire());
        assert!(!latch.fire());
        assert!(!latch.clone().fire());
        assert_eq!(
            latch.wait(Some(Duration::from_millis(10)), &CancelToken::new()),
            WaitOutcome::Fired
        );
    }

    #[test]
    fn fire_from_another_thread_releases_waiter() {
        let latch = Latch::new();
        let remote = latch.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.fire();
        });
        assert_eq!(latch.wait(None, &CancelToken::new()), WaitOutcome::Fired);
        handle.join().unwrap();
    }

    #[test]
    fn wait_times_out() {
        let latch = Latch::new();
        let start = Instant::now();
        let outcome = latch.wait(Some(Duration::from_millis(30)), &CancelToken::new());
        assert_eq!(outcome, WaitOutcome::TimedOut);
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn cancel_releases_waiter() {
        let latch = Latch::new();
        let cancel = CancelToken::new();
        let remote = cancel.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.cancel();
        });
        assert_eq!(latch.wait(None, &cancel), WaitOutcome::Cancelled);
        assert!(cancel.is_cancelled());
        handle.join().unwrap();
    }

    #[test]
    fn cancel_is_idempotent() {
        let cancel = CancelToken::new();
        cancel.cancel();
        cancel.cancel();
        assert!(cancel.is_cancelled());
        assert_eq!(Latch::new().wait(None, &cancel), WaitOutcome::Cancelled);
    }
}
