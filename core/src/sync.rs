//! Blocking primitives shared by the emulation, render and audio threads
//!
//! Both types are thin wrappers around a `Mutex` + `Condvar` pair. Poisoned
//! locks are recovered rather than propagated: a panic on another thread must
//! not take the real-time threads down with it.

use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

fn recover<'a, T>(result: std::sync::LockResult<MutexGuard<'a, T>>) -> MutexGuard<'a, T> {
    result.unwrap_or_else(|e| {
        tracing::warn!("sync primitive mutex poisoned; continuing");
        e.into_inner()
    })
}

/// Counting semaphore.
///
/// Used for the render handshake (start/finished) and for the scheduler's
/// state-transition handshake.
#[derive(Debug)]
pub struct Semaphore {
    permits: Mutex<usize>,
    cvar: Condvar,
}

impl Semaphore {
    pub fn new(permits: usize) -> Self {
        Self {
            permits: Mutex::new(permits),
            cvar: Condvar::new(),
        }
    }

    /// Release one permit, waking a single waiter.
    pub fn signal(&self) {
        let mut permits = recover(self.permits.lock());
        *permits += 1;
        self.cvar.notify_one();
    }

    /// Block until a permit is available, then take it.
    pub fn wait(&self) {
        let mut permits = recover(self.permits.lock());
        while *permits == 0 {
            permits = recover(self.cvar.wait(permits));
        }
        *permits -= 1;
    }

    /// Take a permit if one is available, without blocking.
    pub fn try_wait(&self) -> bool {
        let mut permits = recover(self.permits.lock());
        if *permits > 0 {
            *permits -= 1;
            true
        } else {
            false
        }
    }

    /// Wait up to `timeout` for a permit. Returns `false` on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut permits = recover(self.permits.lock());
        while *permits == 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .cvar
                .wait_timeout(permits, deadline - now)
                .unwrap_or_else(|e| e.into_inner());
            permits = guard;
        }
        *permits -= 1;
        true
    }

    /// Number of permits currently available.
    pub fn available(&self) -> usize {
        *recover(self.permits.lock())
    }
}

/// Timed wait that another thread can cut short.
///
/// The emulation loop parks here until its next deadline; state transitions
/// call [`Parker::unpark`] so shutdown latency does not depend on the sleep
/// elapsing.
#[derive(Debug, Default)]
pub struct Parker {
    notified: Mutex<bool>,
    cvar: Condvar,
}

impl Parker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park until `deadline` or until unparked. Returns `true` if woken early.
    ///
    /// A pending unpark issued before this call is consumed immediately.
    pub fn park_until(&self, deadline: Instant) -> bool {
        let mut notified = recover(self.notified.lock());
        loop {
            if *notified {
                *notified = false;
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .cvar
                .wait_timeout(notified, deadline - now)
                .unwrap_or_else(|e| e.into_inner());
            notified = guard;
        }
    }

    /// Consume a pending unpark without waiting. Returns whether one was pending.
    pub fn take_notification(&self) -> bool {
        std::mem::take(&mut *recover(self.notified.lock()))
    }

    pub fn unpark(&self) {
        *recover(self.notified.lock()) = true;
        self.cvar.notify_all();
    }
}
