use thiserror::Error;

/// Video pipeline errors
#[derive(Debug, Error)]
pub enum VideoError {
    #[error("invalid video format: {width}x{height}")]
    InvalidFormat { width: u32, height: u32 },

    #[error("failed to spawn render thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),

    /// Reported by a presenter; logged and absorbed by the render thread
    #[error("presentation failed: {0}")]
    Present(String),
}
