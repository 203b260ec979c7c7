//! Cross-module tests for the execution core
//!
//! Exercises the ring buffer across real threads and whole sessions with a
//! draining audio callback and a presenting render thread.


#[cfg(test)]
pub(crate) mod test_utils {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::thread::{self, JoinHandle};
    use std::time::Duration;

    use crate::audio::AudioRenderer;

    /// Stand-in for the hardware audio callback: renders fixed blocks
    /// until dropped, counting frames that carried audio.
    pub struct AudioDrain {
        stop: Arc<AtomicBool>,
        audible: Arc<AtomicUsize>,
        handle: Option<JoinHandle<AudioRenderer>>,
    }

    impl AudioDrain {
        pub fn spawn(mut renderer: AudioRenderer, block_samples: usize, period: Duration) -> Self {
            let stop = Arc::new(AtomicBool::new(false));
            let audible = Arc::new(AtomicUsize::new(0));
            let handle = {
                let stop = stop.clone();
                let audible = audible.clone();
                thread::Builder::new()
                    .name("audio-drain".into())
                    .spawn(move || {
                        let mut block = vec![0.0f32; block_samples];
                        while !stop.load(Ordering::Acquire) {
                            let frames = renderer.render(&mut block);
                            audible.fetch_add(frames, Ordering::Relaxed);
                            thread::sleep(period);
                        }
                        renderer
                    })
                    .unwrap()
            };
            Self {
                stop,
                audible,
                handle: Some(handle),
            }
        }

        pub fn audible_frames(&self) -> usize {
            self.audible.load(Ordering::Relaxed)
        }

        pub fn finish(mut self) -> AudioRenderer {
            self.stop.store(true, Ordering::Release);
            self.handle.take().unwrap().join().unwrap()
        }
    }

    impl Drop for AudioDrain {
        fn drop(&mut self) {
            self.stop.store(true, Ordering::Release);
            if let Some(handle) = self.handle.take() {
                let _ = handle.join();
            }
        }
    }
}
