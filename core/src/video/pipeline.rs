//! Producer side of the video handoff

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::filter::crop;
use super::format::convert_to_output;
use super::{
    FilterChain, RenderThread, RenderedFrame, ScaleFilter, VideoError, VideoFormat, Viewport,
};
use crate::config::VideoConfig;

/// UI collaborator that displays rendered frames
pub trait FramePresenter: Send {
    fn present(&mut self, frame: &RenderedFrame) -> Result<(), VideoError>;
}

/// Destination for the bridge's video output
pub trait VideoSink {
    /// Buffer the bridge writes the next frame into, sized per the session's [`VideoFormat`].
    fn video_buffer(&mut self) -> &mut [u8];

    /// The frame in [`video_buffer`](Self::video_buffer) is complete.
    fn did_update_video_buffer(&mut self);
}

/// Snapshot of video pipeline counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VideoStats {
    /// Frames handed to the render thread
    pub frames_published: u64,
    /// Completed frames dropped because the previous render was still running
    pub frames_dropped: u64,
    /// Updates skipped because nothing new was written
    pub redundant_skipped: u64,
    /// Frames accepted by the presenter
    pub frames_presented: u64,
    /// Presenter failures
    pub render_errors: u64,
}

#[derive(Debug, Default)]
struct VideoCounters {
    frames_published: AtomicU64,
    frames_dropped: AtomicU64,
    redundant_skipped: AtomicU64,
    frames_presented: AtomicU64,
    render_errors: AtomicU64,
}

impl VideoCounters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> VideoStats {
        VideoStats {
            frames_published: self.frames_published.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            redundant_skipped: self.redundant_skipped.load(Ordering::Relaxed),
            frames_presented: self.frames_presented.load(Ordering::Relaxed),
            render_errors: self.render_errors.load(Ordering::Relaxed),
        }
    }
}

/// The published frame. Only touched by the producer while the renderer is idle.
struct FrontFrame {
    bytes: Vec<u8>,
    seed: u64,
}

struct VideoShared {
    format: VideoFormat,
    front: Mutex<FrontFrame>,
    presenter: Mutex<Option<Box<dyn FramePresenter>>>,
    viewport: Mutex<Option<Viewport>>,
    filters: Mutex<FilterChain>,
    counters: VideoCounters,
}

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(|e| {
        warn!("{what} mutex poisoned; continuing");
        e.into_inner()
    })
}

/// Render-thread state carried between frames
struct RenderWork {
    shared: Arc<VideoShared>,
    scratch: Vec<u8>,
    last_log_time: Instant,
    last_stats: VideoStats,
}

impl RenderWork {
    fn render(&mut self) {
        let shared = &self.shared;
        let seed = {
            let front = lock(&shared.front, "video front buffer");
            convert_to_output(&shared.format, &front.bytes, &mut self.scratch);
            front.seed
        };

        let format = shared.format;
        let frame = RenderedFrame {
            width: format.width,
            height: format.height,
            pixel_format: format.pixel_format.output(),
            data: std::mem::take(&mut self.scratch),
            seed,
        };

        let viewport = lock(&shared.viewport, "viewport")
            .unwrap_or(Viewport::new(0, 0, format.width, format.height));
        let Some(viewport) = viewport.clamp_to(format.width, format.height) else {
            warn!("viewport {viewport:?} lies outside the {}x{} frame", format.width, format.height);
            self.scratch = frame.data;
            return;
        };

        let frame = lock(&shared.filters, "filter chain").apply(crop(frame, viewport));

        if let Some(presenter) = lock(&shared.presenter, "presenter").as_mut() {
            match presenter.present(&frame) {
                Ok(()) => VideoCounters::bump(&shared.counters.frames_presented),
                Err(e) => {
                    warn!("failed to present frame {seed}: {e}");
                    VideoCounters::bump(&shared.counters.render_errors);
                }
            }
        }

        // Uncropped and unscaled, the frame still owns the conversion buffer
        if (frame.width, frame.height) == (format.width, format.height) {
            self.scratch = frame.data;
        }

        self.maybe_log();
    }

    fn maybe_log(&mut self) {
        if self.last_log_time.elapsed() < Duration::from_secs(1) {
            return;
        }
        let now = self.shared.counters.snapshot();
        debug!(
            "video: published={}, dropped={}, redundant={}, presented={}, errors={}",
            now.frames_published - self.last_stats.frames_published,
            now.frames_dropped - self.last_stats.frames_dropped,
            now.redundant_skipped - self.last_stats.redundant_skipped,
            now.frames_presented - self.last_stats.frames_presented,
            now.render_errors - self.last_stats.render_errors,
        );
        self.last_stats = now;
        self.last_log_time = Instant::now();
    }
}

/// Double-buffered handoff from the emulation thread to the render thread.
///
/// The bridge writes into a private back buffer. On completion the frame is
/// copied to the shared front buffer and the render thread is started, but
/// only if its previous render already finished; otherwise the frame is
/// dropped. The producer never waits on the renderer.
pub struct VideoPipeline {
    shared: Arc<VideoShared>,
    back: Vec<u8>,
    /// Seed of the most recently completed frame
    seed: u64,
    /// Seed of the most recently published frame
    published_seed: u64,
    dirty: bool,
    enabled: bool,
    render_thread: RenderThread,
}

impl VideoPipeline {
    pub fn new(format: VideoFormat, config: &VideoConfig) -> Result<Self, VideoError> {
        format.validate()?;

        let mut filters = FilterChain::new();
        if config.clamped_scale() > 1 {
            filters.push(ScaleFilter::new(config.clamped_scale(), config.sampler));
        }

        let shared = Arc::new(VideoShared {
            format,
            front: Mutex::new(FrontFrame {
                bytes: vec![0; format.buffer_size()],
                seed: 0,
            }),
            presenter: Mutex::new(None),
            viewport: Mutex::new(None),
            filters: Mutex::new(filters),
            counters: VideoCounters::default(),
        });

        let mut work = RenderWork {
            shared: shared.clone(),
            scratch: Vec::with_capacity(format.pixel_count() * 4),
            last_log_time: Instant::now(),
            last_stats: VideoStats::default(),
        };
        let render_thread = RenderThread::spawn("render", move || work.render())?;

        Ok(Self {
            shared,
            back: vec![0; format.buffer_size()],
            seed: 0,
            published_seed: 0,
            dirty: false,
            enabled: config.enabled,
            render_thread,
        })
    }

    pub fn format(&self) -> VideoFormat {
        self.shared.format
    }

    pub fn set_presenter(&self, presenter: Box<dyn FramePresenter>) {
        *lock(&self.shared.presenter, "presenter") = Some(presenter);
    }

    pub fn clear_presenter(&self) -> Option<Box<dyn FramePresenter>> {
        lock(&self.shared.presenter, "presenter").take()
    }

    /// Crop applied to every rendered frame; `None` shows the whole frame.
    pub fn set_viewport(&self, viewport: Option<Viewport>) {
        *lock(&self.shared.viewport, "viewport") = viewport;
    }

    pub fn set_filter_chain(&self, filters: FilterChain) {
        *lock(&self.shared.filters, "filter chain") = filters;
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Seed of the most recently completed frame
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn stats(&self) -> VideoStats {
        self.shared.counters.snapshot()
    }

    /// Wait for an in-flight render to finish. Not for use on the emulation thread.
    pub fn wait_for_render(&self, timeout: Duration) -> bool {
        self.render_thread.wait_idle(timeout)
    }

    fn publish(&mut self) {
        if self.seed == self.published_seed {
            VideoCounters::bump(&self.shared.counters.redundant_skipped);
            return;
        }

        if !self.render_thread.try_begin() {
            VideoCounters::bump(&self.shared.counters.frames_dropped);
            return;
        }

        {
            // Uncontended: the renderer is idle until `run`
            let mut front = lock(&self.shared.front, "video front buffer");
            front.bytes.copy_from_slice(&self.back);
            front.seed = self.seed;
        }
        self.published_seed = self.seed;
        VideoCounters::bump(&self.shared.counters.frames_published);
        self.render_thread.run();
    }
}

impl VideoSink for VideoPipeline {
    fn video_buffer(&mut self) -> &mut [u8] {
        self.dirty = true;
        &mut self.back
    }

    fn did_update_video_buffer(&mut self) {
        if !self.enabled {
            return;
        }
        if self.dirty {
            self.seed += 1;
            self.dirty = false;
        }
        self.publish();
    }
}
