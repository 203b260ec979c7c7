//! Time source for loop pacing

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::sync::Parker;

/// Monotonic time plus an absolute-deadline wait
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    /// Block until `deadline` or until `parker` is unparked. Returns `true`
    /// if woken early.
    fn wait_until(&self, deadline: Instant, parker: &Parker) -> bool;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wait_until(&self, deadline: Instant, parker: &Parker) -> bool {
        parker.park_until(deadline)
    }
}

/// Clock that only moves when told to.
///
/// Waiting jumps straight to the deadline after a short real pause, so a
/// loop paced by it runs fast but still yields to other threads.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
    yield_for: Duration,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
            yield_for: Duration::from_millis(1),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset += by;
    }

    fn advance_to(&self, deadline: Instant) {
        let target = deadline.saturating_duration_since(self.origin);
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        if target > *offset {
            *offset = target;
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn wait_until(&self, deadline: Instant, parker: &Parker) -> bool {
        let woken = parker.park_until(Instant::now() + self.yield_for);
        if !woken {
            self.advance_to(deadline);
        }
        woken
    }
}
