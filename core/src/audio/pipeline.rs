//! Emulation-thread side of the audio pipeline

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::renderer::{RendererConfig, SharedAudio};
use super::{AudioError, AudioFormat, AudioRenderer, AudioStats, FormatConverter, LinearConverter};
use crate::config::AudioConfig;
use crate::ring_buffer::{RingBuffer, RingConsumer, RingGate, RingProducer};

type ConverterFactory =
    Box<dyn Fn(AudioFormat, AudioFormat) -> Result<Box<dyn FormatConverter>, AudioError> + Send>;

/// Where a bridge delivers the audio of one frame
pub trait AudioSink {
    /// Returns the number of bytes accepted; the rest is dropped.
    fn write_audio(&mut self, bytes: &[u8]) -> usize;

    fn write_samples(&mut self, samples: &[i16]) -> usize {
        self.write_audio(bytemuck::cast_slice(samples)) / AudioFormat::BYTES_PER_SAMPLE
    }
}

/// Ring capacity in bytes for one output configuration.
///
/// Holds one tick of native audio per output block the converter may need at
/// `rate`, plus `slack_buffers` ticks of headroom.
pub fn ring_buffer_size(
    native: AudioFormat,
    output: AudioFormat,
    frame_duration: Duration,
    rate: f64,
    slack_buffers: u32,
) -> Result<usize, AudioError> {
    native.validate()?;
    output.validate()?;

    let frames_per_tick = native.frames_for(frame_duration).max(1);
    let ratio = native.sample_rate as f64 / output.sample_rate as f64 * rate.max(1.0);
    let buffers = (ratio.ceil() as usize).saturating_add(slack_buffers as usize);

    frames_per_tick
        .checked_mul(native.bytes_per_frame())
        .and_then(|bytes| bytes.checked_mul(buffers))
        .ok_or(AudioError::BufferAllocation {
            requested: usize::MAX,
        })
}

/// Emulation-thread half of the audio pipeline.
///
/// Receives native PCM from the bridge and owns the ring buffer's write side.
/// Every output format change builds a fresh ring and converter and posts them
/// to the paired [`AudioRenderer`].
pub struct AudioPipeline {
    native: AudioFormat,
    output: AudioFormat,
    frame_duration: Duration,
    slack_buffers: u32,
    block_frames: Option<u32>,
    producer: RingProducer,
    gate: RingGate,
    shared: Arc<SharedAudio>,
    converter_factory: ConverterFactory,
    rate: f64,
    enabled: bool,
}

impl AudioPipeline {
    /// Build a pipeline for `native` audio produced once per `frame_duration`.
    ///
    /// The output format defaults to the native format, or the configured
    /// output sample rate.
    pub fn new(
        native: AudioFormat,
        frame_duration: Duration,
        config: &AudioConfig,
    ) -> Result<(Self, AudioRenderer), AudioError> {
        native.validate()?;
        if frame_duration.is_zero() {
            return Err(AudioError::InvalidFormat("frame duration is zero".into()));
        }

        let output = AudioFormat::new(
            config.output_sample_rate.unwrap_or(native.sample_rate),
            native.channels,
        );
        let shared = Arc::new(SharedAudio::new());
        let converter_factory: ConverterFactory = Box::new(|input, output| {
            Ok(Box::new(LinearConverter::new(input, output)?) as Box<dyn FormatConverter>)
        });

        let (producer, consumer, converter) =
            Self::build(native, output, frame_duration, 1.0, config, &converter_factory)?;
        let gate = producer.gate().clone();
        gate.set_enabled(false);

        shared.deliver(RendererConfig {
            consumer,
            converter,
            native,
            output,
        });

        let pipeline = Self {
            native,
            output,
            frame_duration,
            slack_buffers: config.slack_buffers,
            block_frames: config.block_frames,
            producer,
            gate,
            shared: shared.clone(),
            converter_factory,
            rate: 1.0,
            enabled: config.enabled,
        };
        Ok((pipeline, AudioRenderer::new(shared)))
    }

    fn build(
        native: AudioFormat,
        output: AudioFormat,
        frame_duration: Duration,
        rate: f64,
        config: &AudioConfig,
        factory: &ConverterFactory,
    ) -> Result<(RingProducer, RingConsumer, Box<dyn FormatConverter>), AudioError> {
        output.validate()?;
        let converter = factory(native, output)?;

        let block_frames = config
            .block_frames
            .map(|frames| frames as usize)
            .unwrap_or_else(|| output.frames_for(frame_duration))
            .max(1);
        // Two blocks' worth of input at minimum, or the renderer can never fill a block
        let min_capacity = native.frames_to_bytes(converter.required_input_frames(block_frames) * 2);
        let capacity = ring_buffer_size(native, output, frame_duration, rate, config.slack_buffers)?
            .max(min_capacity);

        let (producer, consumer) = RingBuffer::new(capacity)?.split();
        Ok((producer, consumer, converter))
    }

    /// Switch to a new hardware output format.
    ///
    /// Discards buffered audio: the old ring and converter are replaced and
    /// the renderer picks up the new pair on its next callback.
    ///
    /// # Errors
    ///
    /// Fails if `output` is invalid or the resulting ring cannot be sized; the
    /// previous configuration stays active in that case.
    pub fn reconfigure(&mut self, output: AudioFormat) -> Result<(), AudioError> {
        let config = self.config_view();
        let (producer, consumer, mut converter) = Self::build(
            self.native,
            output,
            self.frame_duration,
            self.rate,
            &config,
            &self.converter_factory,
        )?;
        converter.set_rate(self.rate);

        let enabled = self.gate.is_enabled();
        self.gate = producer.gate().clone();
        self.gate.set_enabled(enabled);
        self.producer = producer;
        self.output = output;

        debug!(
            "audio reconfigured: {} -> {}, ring {} bytes",
            self.native,
            output,
            consumer.capacity()
        );
        self.shared.deliver(RendererConfig {
            consumer,
            converter,
            native: self.native,
            output,
        });
        self.shared.counters.record_reconfiguration();
        Ok(())
    }

    /// Replace the converter used by future configurations and rebuild now.
    pub fn set_converter_factory<F>(&mut self, factory: F) -> Result<(), AudioError>
    where
        F: Fn(AudioFormat, AudioFormat) -> Result<Box<dyn FormatConverter>, AudioError>
            + Send
            + 'static,
    {
        self.converter_factory = Box::new(factory);
        self.reconfigure(self.output)
    }

    /// Copy native PCM into the ring. Returns the number of bytes accepted.
    ///
    /// Writes are truncated to whole frames that fit; the rest is dropped.
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        let len = self
            .native
            .align(bytes.len().min(self.producer.available_for_writing()));
        let accepted = self.producer.write(&bytes[..len]);
        self.shared
            .counters
            .record_write(accepted, bytes.len() - accepted);
        accepted
    }

    /// Convenience over [`write`](Self::write) for sample slices.
    pub fn write_samples(&mut self, samples: &[i16]) -> usize {
        self.write(bytemuck::cast_slice(samples)) / AudioFormat::BYTES_PER_SAMPLE
    }

    /// Change playback speed. Non-positive or non-finite rates are ignored.
    ///
    /// Fast-forward can need a larger ring; the pipeline is rebuilt when the
    /// sizing changes.
    pub fn set_rate(&mut self, rate: f64) {
        if !rate.is_finite() || rate <= 0.0 {
            warn!("ignoring invalid playback rate {rate}");
            return;
        }
        if rate == self.rate {
            return;
        }

        let size_at = |rate| {
            ring_buffer_size(
                self.native,
                self.output,
                self.frame_duration,
                rate,
                self.slack_buffers,
            )
            .ok()
        };
        let needs_resize = size_at(self.rate) != size_at(rate);

        self.rate = rate;
        self.shared.set_rate(rate);

        if needs_resize && let Err(e) = self.reconfigure(self.output) {
            warn!("failed to resize audio buffer for rate {rate}: {e}");
        }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Mute or unmute. Either way the buffered audio is discarded.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if self.shared.is_running() {
            self.gate.set_enabled(enabled);
        }
        self.gate.request_reset();
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Begin accepting audio with an empty buffer.
    pub fn start(&mut self) {
        self.gate.request_reset();
        self.gate.set_enabled(self.enabled);
        self.shared.set_running(true);
    }

    /// Stop accepting audio and discard anything buffered.
    pub fn stop(&mut self) {
        self.shared.set_running(false);
        self.gate.set_enabled(false);
        self.gate.request_reset();
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    pub fn native_format(&self) -> AudioFormat {
        self.native
    }

    pub fn output_format(&self) -> AudioFormat {
        self.output
    }

    pub fn frame_duration(&self) -> Duration {
        self.frame_duration
    }

    /// Output block size for hosts that pick their own (headless drains, fixed cpal buffers)
    pub fn preferred_block_frames(&self) -> usize {
        self.block_frames
            .map(|frames| frames as usize)
            .unwrap_or_else(|| self.output.frames_for(self.frame_duration))
            .max(1)
    }

    pub fn ring_capacity(&self) -> usize {
        self.producer.capacity()
    }

    pub fn buffered_bytes(&self) -> usize {
        self.ring_capacity() - self.producer.available_for_writing()
    }

    pub fn stats(&self) -> AudioStats {
        self.shared.counters.snapshot()
    }

    fn config_view(&self) -> AudioConfig {
        AudioConfig {
            enabled: self.enabled,
            slack_buffers: self.slack_buffers,
            output_sample_rate: Some(self.output.sample_rate),
            block_frames: self.block_frames,
        }
    }
}

impl AudioSink for AudioPipeline {
    fn write_audio(&mut self, bytes: &[u8]) -> usize {
        self.write(bytes)
    }

    fn write_samples(&mut self, samples: &[i16]) -> usize {
        AudioPipeline::write_samples(self, samples)
    }
}
