//! Fixed-capacity SPSC byte queue for native PCM
//!
//! The emulation thread writes, the audio hardware callback reads. Neither
//! side ever blocks: writes beyond the free space are truncated, reads beyond
//! the filled space return short.
//!
//! ```text
//! Emulation Thread              Audio Callback Thread
//!     │                                │
//! [RingProducer::write]──(ring)──►[RingConsumer::read]
//!     │                                │
//!     └──────────[RingGate]────────────┘
//!       enable flag, reset position
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

use crate::audio::AudioError;


/// Upper bound on a single ring allocation (64 MiB).
///
/// Anything larger means the sizing arithmetic went wrong upstream.
pub const MAX_RING_BUFFER_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug)]
struct GateState {
    enabled: AtomicBool,
    /// Total bytes ever accepted by the producer
    written: AtomicU64,
    /// Stream position before which buffered bytes are to be discarded
    discard_until: AtomicU64,
}

/// Control handle shared by both halves of a ring buffer.
///
/// Cloneable and usable from any thread. Disabling drops incoming writes on
/// the floor. A reset request discards everything written before the request
/// and is applied by the consumer at its next operation; bytes written after
/// the request survive.
#[derive(Debug, Clone)]
pub struct RingGate {
    state: Arc<GateState>,
}

impl RingGate {
    fn new() -> Self {
        Self {
            state: Arc::new(GateState {
                enabled: AtomicBool::new(true),
                written: AtomicU64::new(0),
                discard_until: AtomicU64::new(0),
            }),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.state.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.state.enabled.store(enabled, Ordering::Release);
    }

    /// Ask the consumer to discard everything buffered so far.
    pub fn request_reset(&self) {
        let written = self.state.written.load(Ordering::Acquire);
        self.state.discard_until.fetch_max(written, Ordering::AcqRel);
    }

    fn record_written(&self, count: usize) {
        self.state
            .written
            .fetch_add(count as u64, Ordering::Release);
    }

    fn discard_until(&self) -> u64 {
        self.state.discard_until.load(Ordering::Acquire)
    }
}

/// Write half. Owned by the emulation thread.
pub struct RingProducer {
    inner: HeapProd<u8>,
    gate: RingGate,
}

impl RingProducer {
    /// Copy up to `min(bytes.len(), available_for_writing())` bytes in.
    ///
    /// Returns the number of bytes accepted. Never blocks and never overwrites
    /// unread data. A no-op while the buffer is disabled.
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        if !self.gate.is_enabled() {
            return 0;
        }
        let count = self.inner.push_slice(bytes);
        self.gate.record_written(count);
        count
    }

    /// Free space as seen by the producer.
    ///
    /// Bytes discarded by [`RingGate::request_reset`] keep occupying space
    /// until the consumer's next operation, so between a reset request and
    /// the next callback this can be smaller than
    /// `capacity() - available_for_reading()`.
    pub fn available_for_writing(&self) -> usize {
        self.inner.vacant_len()
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity().get()
    }

    pub fn gate(&self) -> &RingGate {
        &self.gate
    }
}

/// Read half. Owned by the audio callback.
pub struct RingConsumer {
    inner: HeapCons<u8>,
    gate: RingGate,
    /// Total bytes ever removed, by read, skip or reset
    read_total: u64,
}

impl RingConsumer {
    /// Copy up to `min(into.len(), available_for_reading())` bytes out, consuming them.
    ///
    /// Returns the number of bytes consumed. A short read is not an error; the
    /// caller pads with silence. While disabled the bytes are still consumed
    /// but the destination receives zeroes.
    pub fn read(&mut self, into: &mut [u8]) -> usize {
        self.apply_pending_reset();

        let count = self.inner.pop_slice(into);
        self.read_total += count as u64;
        if !self.gate.is_enabled() {
            into[..count].fill(0);
        }
        count
    }

    /// Discard `count` bytes without copying them. Returns how many were dropped.
    pub fn skip(&mut self, count: usize) -> usize {
        self.apply_pending_reset();
        let skipped = self.inner.skip(count);
        self.read_total += skipped as u64;
        skipped
    }

    /// Drop everything currently buffered.
    pub fn reset(&mut self) {
        let cleared = self.inner.clear();
        self.read_total += cleared as u64;
    }

    pub fn available_for_reading(&self) -> usize {
        let pending = self.gate.discard_until().saturating_sub(self.read_total) as usize;
        self.inner.occupied_len().saturating_sub(pending)
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity().get()
    }

    pub fn gate(&self) -> &RingGate {
        &self.gate
    }

    /// Discard bytes covered by an outstanding [`RingGate::request_reset`].
    pub fn apply_pending_reset(&mut self) {
        let pending = self.gate.discard_until().saturating_sub(self.read_total);
        if pending > 0 {
            let skipped = self.inner.skip(pending as usize);
            self.read_total += skipped as u64;
        }
    }
}

/// Both halves of a ring buffer, for single-threaded setup and tests.
///
/// Call [`RingBuffer::split`] to hand the halves to their threads.
pub struct RingBuffer {
    producer: RingProducer,
    consumer: RingConsumer,
}

impl RingBuffer {
    /// Allocate a ring holding exactly `capacity` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`AudioError::BufferAllocation`] when `capacity` is zero or
    /// exceeds [`MAX_RING_BUFFER_BYTES`].
    pub fn new(capacity: usize) -> Result<Self, AudioError> {
        if capacity == 0 || capacity > MAX_RING_BUFFER_BYTES {
            return Err(AudioError::BufferAllocation {
                requested: capacity,
            });
        }

        let (producer, consumer) = HeapRb::<u8>::new(capacity).split();
        let gate = RingGate::new();

        Ok(Self {
            producer: RingProducer {
                inner: producer,
                gate: gate.clone(),
            },
            consumer: RingConsumer {
                inner: consumer,
                gate,
                read_total: 0,
            },
        })
    }

    pub fn write(&mut self, bytes: &[u8]) -> usize {
        self.consumer.apply_pending_reset();
        self.producer.write(bytes)
    }

    pub fn read(&mut self, into: &mut [u8]) -> usize {
        self.consumer.read(into)
    }

    pub fn reset(&mut self) {
        self.consumer.reset();
    }

    // Both halves live here, so a pending reset is applied eagerly and
    // reading + writing always sums to capacity.
    pub fn available_for_reading(&mut self) -> usize {
        self.consumer.apply_pending_reset();
        self.consumer.available_for_reading()
    }

    pub fn available_for_writing(&mut self) -> usize {
        self.consumer.apply_pending_reset();
        self.producer.available_for_writing()
    }

    pub fn capacity(&self) -> usize {
        self.producer.capacity()
    }

    pub fn is_enabled(&self) -> bool {
        self.producer.gate.is_enabled()
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.producer.gate.set_enabled(enabled);
    }

    pub fn gate(&self) -> RingGate {
        self.producer.gate.clone()
    }

    pub fn split(self) -> (RingProducer, RingConsumer) {
        (self.producer, self.consumer)
    }
}
