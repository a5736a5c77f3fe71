use locex_experiment::CueError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("failed to decode audio: {0}")]
    Decode(String),

    #[error("no playable audio track")]
    NoTrack,

    #[error("audio device error: {0}")]
    Device(String),

    #[error("audio stream error: {0}")]
    Stream(String),

    #[error("unsupported output sample format: {0}")]
    UnsupportedFormat(String),
}

impl From<AudioError> for CueError {
    fn from(e: AudioError) -> Self {
        CueError::Output(e.to_string())
    }
}
