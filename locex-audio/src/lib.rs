//! Audio cues for localization trials: decoding with symphonia, playback with cpal.

mod decode;
mod error;
mod player;

pub use decode::{decode_bytes, CueBank, DecodedCue};
pub use error::AudioError;
pub use player::{list_output_devices, CpalCuePlayer, DEFAULT_VOLUME};
