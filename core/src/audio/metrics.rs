//! Audio pipeline health counters

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tracing::debug;

const LOG_INTERVAL: Duration = Duration::from_secs(1);

/// Snapshot of audio pipeline counters since construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AudioStats {
    /// Output blocks filled with converted audio
    pub blocks_rendered: u64,
    /// Output blocks filled with silence because too few native frames were buffered
    pub underruns: u64,
    /// Blocks dropped to silence after a converter or time/pitch failure
    pub conversion_errors: u64,
    /// Native bytes accepted into the ring
    pub bytes_written: u64,
    /// Native bytes dropped because the ring was full or disabled
    pub bytes_dropped: u64,
    /// Reconfigurations delivered to the renderer
    pub reconfigurations: u64,
}

/// Lock-free counters shared between the pipeline halves
#[derive(Debug, Default)]
pub(super) struct AudioCounters {
    blocks_rendered: AtomicU64,
    underruns: AtomicU64,
    conversion_errors: AtomicU64,
    bytes_written: AtomicU64,
    bytes_dropped: AtomicU64,
    reconfigurations: AtomicU64,
}

impl AudioCounters {
    pub fn record_rendered(&self) {
        self.blocks_rendered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_underrun(&self) {
        self.underruns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_conversion_error(&self) {
        self.conversion_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write(&self, accepted: usize, dropped: usize) {
        self.bytes_written
            .fetch_add(accepted as u64, Ordering::Relaxed);
        if dropped > 0 {
            self.bytes_dropped.fetch_add(dropped as u64, Ordering::Relaxed);
        }
    }

    pub fn record_reconfiguration(&self) {
        self.reconfigurations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> AudioStats {
        AudioStats {
            blocks_rendered: self.blocks_rendered.load(Ordering::Relaxed),
            underruns: self.underruns.load(Ordering::Relaxed),
            conversion_errors: self.conversion_errors.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            bytes_dropped: self.bytes_dropped.load(Ordering::Relaxed),
            reconfigurations: self.reconfigurations.load(Ordering::Relaxed),
        }
    }
}

/// Periodic logger run from the callback thread
#[derive(Debug)]
pub(super) struct AudioMetricsLog {
    last_log_time: Instant,
    last: AudioStats,
    buffer_fill_min: usize,
    buffer_fill_max: usize,
}

impl AudioMetricsLog {
    pub fn new() -> Self {
        Self {
            last_log_time: Instant::now(),
            last: AudioStats::default(),
            buffer_fill_min: usize::MAX,
            buffer_fill_max: 0,
        }
    }

    pub fn update_buffer_fill(&mut self, fill: usize) {
        self.buffer_fill_min = self.buffer_fill_min.min(fill);
        self.buffer_fill_max = self.buffer_fill_max.max(fill);
    }

    /// Log per-interval deltas if a second has passed
    pub fn maybe_log(&mut self, counters: &AudioCounters, capacity: usize) {
        if self.last_log_time.elapsed() < LOG_INTERVAL {
            return;
        }

        let now = counters.snapshot();
        let pct = |fill: usize| {
            if capacity == 0 || fill == usize::MAX {
                0.0
            } else {
                fill as f64 / capacity as f64 * 100.0
            }
        };

        debug!(
            "audio: blocks={}, underruns={}, conversion_errors={}, dropped_bytes={}, buf=({:.1}%..{:.1}%)",
            now.blocks_rendered - self.last.blocks_rendered,
            now.underruns - self.last.underruns,
            now.conversion_errors - self.last.conversion_errors,
            now.bytes_dropped - self.last.bytes_dropped,
            pct(self.buffer_fill_min),
            pct(self.buffer_fill_max),
        );

        self.last = now;
        self.buffer_fill_min = usize::MAX;
        self.buffer_fill_max = 0;
        self.last_log_time = Instant::now();
    }
}
