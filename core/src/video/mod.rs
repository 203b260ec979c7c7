//! Emulation thread → render thread frame handoff
//!
//! ```text
//! Emulation Thread                         Render Thread
//!     │                                        │
//! [bridge writes back buffer]             [start.wait]
//! [did_update_video_buffer]                    │
//!     │ seed unchanged? skip                   │
//!     │ finished.try_wait? else drop           │
//! [copy back → front, start.signal]──────►[convert, crop, filter]
//!     │                                   [FramePresenter::present]
//!     │◄─────────────────────────────────[finished.signal]
//! ```

mod error;
mod filter;
mod format;
mod pipeline;
mod render_thread;

pub use error::VideoError;
pub use filter::{
    FilterChain, FrameFilter, MAX_SCALE_FACTOR, RenderedFrame, SamplerMode, ScaleFilter, Viewport,
};
pub use format::{PixelFormat, VideoFormat};
pub use pipeline::{FramePresenter, VideoPipeline, VideoSink, VideoStats};
pub use render_thread::RenderThread;

#[cfg(test)]
mod tests;
