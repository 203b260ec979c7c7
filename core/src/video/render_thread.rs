//! Dedicated render thread with a start/finished semaphore handshake

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::debug;

use super::VideoError;
use crate::sync::Semaphore;

/// Runs a render closure once per [`run`](Self::run), on its own thread.
///
/// `finished` starts signalled, so the first [`try_begin`](Self::try_begin)
/// succeeds. A producer that finds `finished` unsignalled drops its frame
/// rather than waiting.
pub struct RenderThread {
    start: Arc<Semaphore>,
    finished: Arc<Semaphore>,
    cancelled: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl RenderThread {
    pub fn spawn<F>(name: &str, mut work: F) -> Result<Self, VideoError>
    where
        F: FnMut() + Send + 'static,
    {
        let start = Arc::new(Semaphore::new(0));
        let finished = Arc::new(Semaphore::new(1));
        let cancelled = Arc::new(AtomicBool::new(false));

        let handle = {
            let start = start.clone();
            let finished = finished.clone();
            let cancelled = cancelled.clone();
            std::thread::Builder::new()
                .name(name.to_string())
                .spawn(move || {
                    debug!("render thread started");
                    loop {
                        start.wait();
                        if cancelled.load(Ordering::Acquire) {
                            break;
                        }
                        work();
                        finished.signal();
                    }
                    debug!("render thread exiting");
                })?
        };

        Ok(Self {
            start,
            finished,
            cancelled,
            handle: Some(handle),
        })
    }

    /// Claim the idle renderer. Non-blocking; `false` while a render is in flight.
    pub fn try_begin(&self) -> bool {
        self.finished.try_wait()
    }

    /// Start a render. Only valid after a successful [`try_begin`](Self::try_begin).
    pub fn run(&self) {
        self.start.signal();
    }

    /// Block until the in-flight render (if any) completes, or `timeout` elapses.
    ///
    /// Leaves the renderer idle and claimable. Returns `false` on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        if self.finished.wait_timeout(timeout) {
            self.finished.signal();
            true
        } else {
            false
        }
    }

    pub fn is_alive(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the thread. It is probably parked on `start`, so wake it explicitly.
    pub fn cancel(&mut self) {
        self.cancelled.store(true, Ordering::Release);
        self.start.signal();

        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for RenderThread {
    fn drop(&mut self) {
        self.cancel();
    }
}
