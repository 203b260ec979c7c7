use thiserror::Error;

/// Audio pipeline errors
#[derive(Debug, Error)]
pub enum AudioError {
    /// Ring buffer sizing produced an unusable capacity
    #[error("cannot allocate a ring buffer of {requested} bytes")]
    BufferAllocation { requested: usize },

    #[error("invalid audio format: {0}")]
    InvalidFormat(String),

    /// Absorbed on the callback thread; surfaced only for direct converter use
    #[error("audio conversion failed: {0}")]
    Conversion(String),

    #[error("no audio output device available")]
    NoDevice,

    #[error("audio device error: {0}")]
    Device(String),
}
