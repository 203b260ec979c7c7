use std::fmt;
use std::time::Duration;

use super::AudioError;

/// Sample rate and channel layout of an interleaved PCM stream.
///
/// Native streams carry signed 16-bit samples; output streams are rendered
/// as `f32`. Byte helpers describe the native encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioFormat {
    /// Native samples are 16-bit
    pub const BYTES_PER_SAMPLE: usize = 2;

    pub const fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    pub fn validate(&self) -> Result<(), AudioError> {
        if self.sample_rate == 0 {
            return Err(AudioError::InvalidFormat("sample rate is zero".into()));
        }
        if self.channels == 0 {
            return Err(AudioError::InvalidFormat("channel count is zero".into()));
        }
        Ok(())
    }

    pub fn bytes_per_frame(&self) -> usize {
        self.channels as usize * Self::BYTES_PER_SAMPLE
    }

    /// Whole frames covering `duration` at this rate (truncated).
    pub fn frames_for(&self, duration: Duration) -> usize {
        (self.sample_rate as f64 * duration.as_secs_f64()) as usize
    }

    pub fn frames_to_bytes(&self, frames: usize) -> usize {
        frames * self.bytes_per_frame()
    }

    /// Whole frames contained in `bytes`; a trailing partial frame is ignored.
    pub fn bytes_to_frames(&self, bytes: usize) -> usize {
        bytes / self.bytes_per_frame()
    }

    /// Round `bytes` down to a frame boundary.
    pub fn align(&self, bytes: usize) -> usize {
        bytes - bytes % self.bytes_per_frame()
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Hz/{}ch", self.sample_rate, self.channels)
    }
}
