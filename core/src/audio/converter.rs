//! Native i16 → output f32 conversion

use smallvec::SmallVec;

use super::{AudioError, AudioFormat};

/// Converts interleaved native PCM into interleaved `f32` output blocks.
///
/// Implementations run on the audio callback thread: no allocation after
/// construction, no blocking.
pub trait FormatConverter: Send {
    /// Upper bound on native frames consumed by one block of `output_frames`.
    ///
    /// The renderer probes this once per configuration and playback rate and
    /// treats it as the starvation threshold.
    fn required_input_frames(&self, output_frames: usize) -> usize;

    /// Exact native frames the next [`convert`](Self::convert) of
    /// `output_frames` will consume. Never exceeds `required_input_frames`.
    fn next_input_frames(&self, output_frames: usize) -> usize;

    /// Playback rate; above 1.0 consumes native frames faster.
    fn set_rate(&mut self, rate: f64);

    /// Convert `input` (exactly `next_input_frames` frames) into `output`.
    fn convert(&mut self, input: &[i16], output: &mut [f32]) -> Result<(), AudioError>;

    /// Forget interpolation history.
    fn reset(&mut self);
}

/// Pitch correction stage applied to converted blocks.
///
/// Resampling at a playback rate other than 1.0 shifts pitch; an
/// implementation of this trait restores it.
pub trait TimePitch: Send {
    fn set_rate(&mut self, rate: f64);

    fn process(&mut self, block: &mut [f32], format: AudioFormat) -> Result<(), AudioError>;
}

/// Linear-interpolation resampler with simple channel up/down mixing.
pub struct LinearConverter {
    input: AudioFormat,
    output: AudioFormat,
    base_step: f64,
    step: f64,
    /// Fractional read position, relative to `history`, in [0, 1)
    position: f64,
    /// Last consumed input frame
    history: SmallVec<[f32; 8]>,
}

impl LinearConverter {
    pub fn new(input: AudioFormat, output: AudioFormat) -> Result<Self, AudioError> {
        input.validate()?;
        output.validate()?;

        let base_step = input.sample_rate as f64 / output.sample_rate as f64;
        Ok(Self {
            input,
            output,
            base_step,
            step: base_step,
            position: 0.0,
            history: SmallVec::from_elem(0.0, input.channels as usize),
        })
    }

    pub fn input_format(&self) -> AudioFormat {
        self.input
    }

    pub fn output_format(&self) -> AudioFormat {
        self.output
    }

    /// Input frame `index` in the sequence `[history, input...]`, channel `channel`.
    fn sample(&self, input: &[i16], index: usize, channel: usize) -> f32 {
        let in_channels = self.input.channels as usize;
        if index == 0 {
            return self.history[channel];
        }
        let base = (index - 1) * in_channels;
        input[base + channel] as f32 / 32768.0
    }

    /// Output channel `channel` of the frame at `index`, after mixing.
    fn mixed(&self, input: &[i16], index: usize, channel: usize) -> f32 {
        let in_channels = self.input.channels as usize;
        let out_channels = self.output.channels as usize;

        if in_channels == out_channels {
            self.sample(input, index, channel)
        } else if out_channels == 1 {
            let sum: f32 = (0..in_channels)
                .map(|c| self.sample(input, index, c))
                .sum();
            sum / in_channels as f32
        } else {
            self.sample(input, index, channel.min(in_channels - 1))
        }
    }
}

impl FormatConverter for LinearConverter {
    fn required_input_frames(&self, output_frames: usize) -> usize {
        (output_frames as f64 * self.step).ceil() as usize
    }

    fn next_input_frames(&self, output_frames: usize) -> usize {
        (self.position + output_frames as f64 * self.step).floor() as usize
    }

    fn set_rate(&mut self, rate: f64) {
        self.step = self.base_step * rate;
    }

    fn convert(&mut self, input: &[i16], output: &mut [f32]) -> Result<(), AudioError> {
        let in_channels = self.input.channels as usize;
        let out_channels = self.output.channels as usize;

        if output.len() % out_channels != 0 {
            return Err(AudioError::Conversion(format!(
                "output block of {} samples is not frame aligned",
                output.len()
            )));
        }
        let output_frames = output.len() / out_channels;
        let consumed = self.next_input_frames(output_frames);
        if input.len() != consumed * in_channels {
            return Err(AudioError::Conversion(format!(
                "expected {} input samples, got {}",
                consumed * in_channels,
                input.len()
            )));
        }

        for (k, frame) in output.chunks_exact_mut(out_channels).enumerate() {
            let t = self.position + k as f64 * self.step;
            let index = t.floor() as usize;
            let frac = (t - index as f64) as f32;
            // The frame after the last consumed one is not available yet; hold.
            let next = (index + 1).min(consumed);

            for (channel, out) in frame.iter_mut().enumerate() {
                let a = self.mixed(input, index, channel);
                let b = self.mixed(input, next, channel);
                *out = a + (b - a) * frac;
            }
        }

        self.position += output_frames as f64 * self.step - consumed as f64;
        if consumed > 0 {
            for channel in 0..in_channels {
                self.history[channel] = self.sample(input, consumed, channel);
            }
        }

        Ok(())
    }

    fn reset(&mut self) {
        self.position = 0.0;
        self.history.iter_mut().for_each(|s| *s = 0.0);
    }
}
