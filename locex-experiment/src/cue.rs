use thiserror::Error;

#[derive(Debug, Error)]
pub enum CueError {
    #[error("no cue loaded for sample {0}")]
    Missing(String),

    #[error("audio output failed: {0}")]
    Output(String),
}

/// Starts and stops the audio cue of the active trial.
///
/// The sequencer always calls `stop` before the next `play`, and stops the
/// cue no later than it leaves the trial that started it.
pub trait CueDriver {
    fn play(&mut self, sample_id: &str) -> Result<(), CueError>;
    fn stop(&mut self);

    /// Whether a cue is still audible. Drivers that cannot tell report false.
    fn is_playing(&self) -> bool {
        false
    }
}

impl<C: CueDriver + ?Sized> CueDriver for Box<C> {
    fn play(&mut self, sample_id: &str) -> Result<(), CueError> {
        (**self).play(sample_id)
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn is_playing(&self) -> bool {
        (**self).is_playing()
    }
}

/// Driver for runs without an audio device.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentCue;

impl CueDriver for SilentCue {
    fn play(&mut self, _sample_id: &str) -> Result<(), CueError> {
        Ok(())
    }

    fn stop(&mut self) {}
}
