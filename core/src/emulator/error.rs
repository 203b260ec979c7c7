use std::path::PathBuf;

use thiserror::Error;

use crate::audio::AudioError;
use crate::video::VideoError;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error(transparent)]
    Video(#[from] VideoError),

    #[error("frame duration must be positive")]
    InvalidFrameDuration,

    #[error("operation needs a running or paused core")]
    NotRunning,

    #[error(transparent)]
    Bridge(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum SaveStateError {
    #[error("save state {} does not exist", .0.display())]
    DoesNotExist(PathBuf),

    #[error("save state belongs to another system")]
    WrongGameType,

    #[error("operation needs a running or paused core")]
    NotRunning,

    #[error(transparent)]
    Bridge(#[from] anyhow::Error),
}
