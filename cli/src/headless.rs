//! Hardware stand-ins for running without a device or window

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use emucore::{AudioFormat, AudioRenderer, FramePresenter, RenderedFrame, VideoError};
use tracing::{debug, warn};

/// Pulls the renderer at the output block rate, like a device callback would
pub struct AudioDrain {
    stop: Arc<AtomicBool>,
    audible_frames: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl AudioDrain {
    pub fn spawn(mut renderer: AudioRenderer, block_frames: usize) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let audible_frames = Arc::new(AtomicU64::new(0));

        let handle = {
            let stop = stop.clone();
            let audible_frames = audible_frames.clone();
            thread::Builder::new()
                .name("audio-drain".into())
                .spawn(move || {
                    let mut format = renderer.output_format();
                    let mut block = Vec::new();
                    while !stop.load(Ordering::Acquire) {
                        let current = renderer.output_format();
                        if current != format {
                            debug!("Audio drain output now {:?}", current);
                            format = current;
                        }
                        let Some(AudioFormat {
                            sample_rate,
                            channels,
                        }) = format
                        else {
                            thread::sleep(Duration::from_millis(5));
                            continue;
                        };

                        block.resize(block_frames * usize::from(channels), 0.0f32);
                        let frames = renderer.render(&mut block);
                        audible_frames.fetch_add(frames as u64, Ordering::Relaxed);

                        let period = block_frames as f64 / f64::from(sample_rate);
                        thread::sleep(Duration::from_secs_f64(period));
                    }
                })
                .context("spawning audio drain thread")?
        };

        Ok(Self {
            stop,
            audible_frames,
            handle: Some(handle),
        })
    }

    pub fn audible_frames(&self) -> u64 {
        self.audible_frames.load(Ordering::Relaxed)
    }
}

impl Drop for AudioDrain {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            warn!("Audio drain thread panicked");
        }
    }
}

/// Counts presented frames and remembers the last frame's shape
#[derive(Clone, Default)]
pub struct CountingPresenter {
    presented: Arc<AtomicU64>,
    last_size: Arc<AtomicU64>,
}

impl CountingPresenter {
    pub fn presented(&self) -> u64 {
        self.presented.load(Ordering::Relaxed)
    }

    pub fn last_size(&self) -> Option<(u32, u32)> {
        match self.last_size.load(Ordering::Relaxed) {
            0 => None,
            packed => Some(((packed >> 32) as u32, packed as u32)),
        }
    }
}

impl FramePresenter for CountingPresenter {
    fn present(&mut self, frame: &RenderedFrame) -> Result<(), VideoError> {
        let packed = (u64::from(frame.width) << 32) | u64::from(frame.height);
        self.last_size.store(packed, Ordering::Relaxed);
        self.presented.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emucore::PixelFormat;

    fn frame(width: u32, height: u32) -> RenderedFrame {
        RenderedFrame {
            width,
            height,
            pixel_format: PixelFormat::Bgra8,
            data: vec![0; (width * height * 4) as usize],
            seed: 1,
        }
    }

    #[test]
    fn test_counting_presenter_tracks_count_and_shape() {
        let presenter = CountingPresenter::default();
        assert_eq!(presenter.presented(), 0);
        assert_eq!(presenter.last_size(), None);

        let mut shared = presenter.clone();
        shared.present(&frame(256, 224)).unwrap();
        shared.present(&frame(128, 112)).unwrap();

        assert_eq!(presenter.presented(), 2);
        assert_eq!(presenter.last_size(), Some((128, 112)));
    }
}
