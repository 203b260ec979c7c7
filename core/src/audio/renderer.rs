//! Audio callback side of the pipeline

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, TryLockError};

use tracing::{debug, warn};

use super::metrics::{AudioCounters, AudioMetricsLog};
use super::{AudioFormat, FormatConverter, TimePitch};
use crate::ring_buffer::RingConsumer;

/// Everything the callback needs for one output configuration
pub(super) struct RendererConfig {
    pub consumer: RingConsumer,
    pub converter: Box<dyn FormatConverter>,
    pub native: AudioFormat,
    pub output: AudioFormat,
}

/// State shared by both pipeline halves
pub(super) struct SharedAudio {
    rate_bits: AtomicU64,
    running: AtomicBool,
    /// Latest undelivered configuration. The callback only ever `try_lock`s.
    mailbox: Mutex<Option<RendererConfig>>,
    pending: AtomicBool,
    pub counters: AudioCounters,
}

impl SharedAudio {
    pub fn new() -> Self {
        Self {
            rate_bits: AtomicU64::new(1.0f64.to_bits()),
            running: AtomicBool::new(false),
            mailbox: Mutex::new(None),
            pending: AtomicBool::new(false),
            counters: AudioCounters::default(),
        }
    }

    pub fn rate(&self) -> f64 {
        f64::from_bits(self.rate_bits.load(Ordering::Acquire))
    }

    pub fn set_rate(&self, rate: f64) {
        self.rate_bits.store(rate.to_bits(), Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    /// Replace any undelivered configuration with `config`.
    pub fn deliver(&self, config: RendererConfig) {
        let mut slot = self.mailbox.lock().unwrap_or_else(|e| {
            warn!("audio mailbox mutex poisoned; continuing");
            e.into_inner()
        });
        *slot = Some(config);
        self.pending.store(true, Ordering::Release);
    }

    /// Non-blocking receive. A contended mailbox is retried on the next callback.
    fn try_take(&self) -> Option<RendererConfig> {
        if !self.pending.load(Ordering::Acquire) {
            return None;
        }
        let mut slot = match self.mailbox.try_lock() {
            Ok(slot) => slot,
            Err(TryLockError::Poisoned(e)) => e.into_inner(),
            Err(TryLockError::WouldBlock) => return None,
        };
        self.pending.store(false, Ordering::Release);
        slot.take()
    }
}

struct ActiveConfig {
    config: RendererConfig,
    /// Rate last pushed into the converter
    rate: f64,
    /// Cached (output frames, required native frames) probe
    probed: Option<(usize, usize)>,
}

/// Hardware-callback half of the audio pipeline.
///
/// [`render`](Self::render) never blocks and never fails: starvation,
/// conversion errors and a stopped pipeline all produce silence.
pub struct AudioRenderer {
    shared: Arc<SharedAudio>,
    active: Option<ActiveConfig>,
    time_pitch: Option<Box<dyn TimePitch>>,
    scratch: Vec<i16>,
    metrics: AudioMetricsLog,
}

impl AudioRenderer {
    pub(super) fn new(shared: Arc<SharedAudio>) -> Self {
        Self {
            shared,
            active: None,
            time_pitch: None,
            scratch: Vec::new(),
            metrics: AudioMetricsLog::new(),
        }
    }

    /// Install a pitch correction stage for non-unity playback rates.
    pub fn set_time_pitch(&mut self, mut time_pitch: Box<dyn TimePitch>) {
        time_pitch.set_rate(self.shared.rate());
        self.time_pitch = Some(time_pitch);
    }

    /// Output format of the active configuration, after applying pending updates.
    pub fn output_format(&mut self) -> Option<AudioFormat> {
        self.poll_updates();
        self.active.as_ref().map(|active| active.config.output)
    }

    /// Fill `out` with interleaved `f32` samples in the output format.
    ///
    /// Returns the number of frames that carry converted audio; zero means
    /// the whole block is silence.
    pub fn render(&mut self, out: &mut [f32]) -> usize {
        self.poll_updates();

        let Some(active) = self.active.as_mut() else {
            out.fill(0.0);
            return 0;
        };

        let consumer = &mut active.config.consumer;
        consumer.apply_pending_reset();
        if !self.shared.is_running() || !consumer.gate().is_enabled() {
            out.fill(0.0);
            return 0;
        }

        let rate = self.shared.rate();
        // NaN after a reconfiguration forces the first update through
        if rate != active.rate {
            active.config.converter.set_rate(rate);
            if let Some(time_pitch) = self.time_pitch.as_mut() {
                time_pitch.set_rate(rate);
            }
            active.rate = rate;
            active.probed = None;
        }

        let output = active.config.output;
        let native = active.config.native;
        let out_channels = output.channels as usize;
        let frames = out.len() / out_channels;
        out[frames * out_channels..].fill(0.0);
        let out = &mut out[..frames * out_channels];
        if frames == 0 {
            return 0;
        }

        let required = match active.probed {
            Some((probed_frames, required)) if probed_frames == frames => required,
            _ => {
                let required = active.config.converter.required_input_frames(frames);
                active.probed = Some((frames, required));
                required
            }
        };

        let buffered = consumer.available_for_reading();
        self.metrics.update_buffer_fill(buffered);

        if native.bytes_to_frames(buffered) < required {
            out.fill(0.0);
            self.shared.counters.record_underrun();
            self.metrics
                .maybe_log(&self.shared.counters, consumer.capacity());
            return 0;
        }

        let needed = active.config.converter.next_input_frames(frames);
        let samples = needed * native.channels as usize;
        if self.scratch.len() < samples {
            // Rare: first block or block size change
            self.scratch.resize(samples, 0);
        }

        let input = &mut self.scratch[..samples];
        let read = consumer.read(bytemuck::cast_slice_mut(input));
        if read != samples * AudioFormat::BYTES_PER_SAMPLE {
            // A reset landed between the fill check and the read
            active.config.converter.reset();
            out.fill(0.0);
            self.shared.counters.record_underrun();
            return 0;
        }

        if let Err(e) = active.config.converter.convert(input, out) {
            warn!("audio conversion failed, emitting silence: {e}");
            out.fill(0.0);
            self.shared.counters.record_conversion_error();
            return 0;
        }

        if let Some(time_pitch) = self.time_pitch.as_mut()
            && let Err(e) = time_pitch.process(out, output)
        {
            warn!("time/pitch stage failed, emitting silence: {e}");
            out.fill(0.0);
            self.shared.counters.record_conversion_error();
            return 0;
        }

        self.shared.counters.record_rendered();
        self.metrics
            .maybe_log(&self.shared.counters, consumer.capacity());
        frames
    }

    fn poll_updates(&mut self) {
        if let Some(config) = self.shared.try_take() {
            debug!(
                "audio renderer reconfigured: {} -> {}, ring {} bytes",
                config.native,
                config.output,
                config.consumer.capacity()
            );
            self.active = Some(ActiveConfig {
                config,
                rate: f64::NAN,
                probed: None,
            });
        }
    }
}
