//! Stand-in emulation engine: a sine tone and a scrolling test pattern
//!
//! Input 0 raises the tone an octave while held. Cheat lines must be hex.

use std::f64::consts::TAU;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use emucore::{AudioFormat, CheatType, EmulatorBridge, FrameSinks, PixelFormat, VideoFormat};
use tracing::{debug, info};

const SAMPLE_RATE: u32 = 48_000;
const CHANNELS: u16 = 2;
const WIDTH: u32 = 256;
const HEIGHT: u32 = 224;
const TONE_HZ: f64 = 440.0;
const AMPLITUDE: f64 = 0.2 * i16::MAX as f64;

/// Persisted by save states: frame counter then oscillator phase
#[derive(Debug, Clone, Copy, Default, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
struct Snapshot {
    frame: u64,
    phase: f64,
}

#[derive(Debug, Default)]
pub struct SyntheticBridge {
    snapshot: Snapshot,
    octave_up: bool,
    samples: Vec<i16>,
    queued_cheats: Vec<String>,
    applied_cheats: usize,
}

impl SyntheticBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> u64 {
        self.snapshot.frame
    }

    fn render_audio(&mut self, frames: usize) -> &[i16] {
        let pitch = if self.octave_up { 2.0 } else { 1.0 };
        let step = TAU * TONE_HZ * pitch / f64::from(SAMPLE_RATE);

        self.samples.clear();
        for _ in 0..frames {
            let value = (self.snapshot.phase.sin() * AMPLITUDE) as i16;
            self.samples
                .extend(std::iter::repeat_n(value, usize::from(CHANNELS)));
            self.snapshot.phase = (self.snapshot.phase + step) % TAU;
        }
        &self.samples
    }

    /// Diagonal RGB565 bands that shift one pixel per frame
    fn render_video(&self, buffer: &mut [u8]) {
        let offset = self.snapshot.frame as u32;
        for (index, pixel) in buffer.chunks_exact_mut(2).enumerate() {
            let x = index as u32 % WIDTH;
            let y = index as u32 / WIDTH;
            let band = (x + y + offset) / 16;
            let r = (band * 5) & 0x1F;
            let g = (band * 11) & 0x3F;
            let b = (band * 3 + self.applied_cheats as u32 * 8) & 0x1F;
            let value = ((r << 11) | (g << 5) | b) as u16;
            pixel.copy_from_slice(&value.to_le_bytes());
        }
    }
}

impl EmulatorBridge for SyntheticBridge {
    fn frame_duration(&self) -> Duration {
        Duration::from_nanos(16_666_667)
    }

    fn audio_format(&self) -> AudioFormat {
        AudioFormat::new(SAMPLE_RATE, CHANNELS)
    }

    fn video_format(&self) -> VideoFormat {
        VideoFormat::new(PixelFormat::Rgb565, WIDTH, HEIGHT)
    }

    fn start(&mut self, game: &Path) -> Result<()> {
        info!("Synthetic engine started for {}", game.display());
        self.snapshot = Snapshot::default();
        Ok(())
    }

    fn stop(&mut self) {
        self.octave_up = false;
    }

    fn pause(&mut self) {}

    fn resume(&mut self) {}

    fn run_frame(&mut self, process_video: bool, sinks: &mut FrameSinks<'_>) {
        let frames = self.audio_format().frames_for(self.frame_duration());
        sinks.audio.write_samples(self.render_audio(frames));

        if process_video {
            self.render_video(sinks.video.video_buffer());
            sinks.video.did_update_video_buffer();
        }

        self.snapshot.frame += 1;
    }

    fn activate_input(&mut self, input: i32, value: f64) {
        debug!("Input {} pressed ({})", input, value);
        if input == 0 {
            self.octave_up = true;
        }
    }

    fn deactivate_input(&mut self, input: i32) {
        if input == 0 {
            self.octave_up = false;
        }
    }

    fn reset_inputs(&mut self) {
        self.octave_up = false;
    }

    fn save_state(&mut self, path: &Path) -> Result<()> {
        fs::write(path, bytemuck::bytes_of(&self.snapshot))
            .with_context(|| format!("writing save state {}", path.display()))
    }

    fn load_state(&mut self, path: &Path) -> Result<()> {
        let bytes =
            fs::read(path).with_context(|| format!("reading save state {}", path.display()))?;
        match bytemuck::try_pod_read_unaligned::<Snapshot>(&bytes) {
            Ok(snapshot) => {
                self.snapshot = snapshot;
                Ok(())
            }
            Err(e) => bail!("{} is not a save state: {}", path.display(), e),
        }
    }

    fn save_game_save(&mut self, path: &Path) -> Result<()> {
        fs::write(path, self.snapshot.frame.to_le_bytes())
            .with_context(|| format!("writing game save {}", path.display()))
    }

    fn load_game_save(&mut self, path: &Path) -> Result<()> {
        let bytes =
            fs::read(path).with_context(|| format!("reading game save {}", path.display()))?;
        debug!("Loaded {} byte game save", bytes.len());
        Ok(())
    }

    fn add_cheat_code(&mut self, code: &str, cheat_type: &CheatType) -> bool {
        let valid = code.chars().all(|c| c.is_ascii_hexdigit() || c == ':' || c == '-');
        if valid {
            self.queued_cheats.push(code.to_string());
        } else {
            debug!("Rejecting {} code {:?}", cheat_type, code);
        }
        valid
    }

    fn reset_cheats(&mut self) {
        self.queued_cheats.clear();
    }

    fn update_cheats(&mut self) {
        self.applied_cheats = self.queued_cheats.len();
    }
}
