//! Native PCM → hardware audio pipeline
//!
//! Splits into two halves that never share a lock:
//!
//! ```text
//! Emulation Thread                      Audio Callback Thread
//!     │                                        │
//! [bridge.run_frame]                           │
//!     │                                        │
//! [AudioPipeline::write]──────(ring)──────►[AudioRenderer::render]
//!     │                                    [FormatConverter]
//! [AudioPipeline::reconfigure]──(mailbox)──►[try_lock]
//!                                          [TimePitch]
//! ```
//!
//! The renderer is handed to whatever owns the hardware stream (the cpal
//! backend behind the `cpal-output` feature, or a headless drain thread).

mod converter;
mod error;
mod format;
mod metrics;
mod pipeline;
mod renderer;

#[cfg(feature = "cpal-output")]
mod output;

pub use converter::{FormatConverter, LinearConverter, TimePitch};
pub use error::AudioError;
pub use format::AudioFormat;
pub use metrics::AudioStats;
pub use pipeline::{AudioPipeline, AudioSink, ring_buffer_size};
pub use renderer::AudioRenderer;

#[cfg(feature = "cpal-output")]
pub use output::AudioOutput;

#[cfg(test)]
mod tests;
