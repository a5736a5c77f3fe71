pub mod accumulator;
pub mod config;
pub mod cue;
pub mod export;
pub mod selection;
pub mod state;
pub use accumulator::{ResultAccumulator, Submission};
pub use config::{InputGate, RunConfig, TrialOrder};
pub use cue::{CueDriver, CueError, SilentCue};
pub use export::{to_delimited_text, to_summary, write_delimited_file, ExportError};
pub use selection::SelectionModel;
pub use state::{SequencerEvent, TrialSequencer};
