use super::accumulator::{ResultAccumulator, Submission};
use super::config::{InputGate, RunConfig};
use super::cue::CueDriver;
use super::selection::SelectionModel;
use locex_core::{Experiment, RunPhase, Sample, SphericalCoordinate, TrialResult};
use locex_timing::Timer;
use std::collections::HashMap;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum SequencerEvent {
    Start,
    Confirm,
    Pick(SphericalCoordinate),
    Verify,
    Advance,
}

/// Drives one run of an experiment: `Start -> [Ready] -> Trial(0..N) -> End`.
///
/// The sequencer owns the cue driver for the duration of the run and is the
/// only writer of the result accumulator.
pub struct TrialSequencer<C, T>
where
    C: CueDriver,
    T: Timer,
{
    phase: RunPhase,
    experiment_id: String,
    experiment_name: String,
    sample_ids: Vec<String>,
    ground_truth: HashMap<String, SphericalCoordinate>,
    config: RunConfig,
    cue: C,
    timer: T,
    selection: SelectionModel,
    results: ResultAccumulator,
    trial_started_at: Option<T::Timestamp>,
}

impl<C, T> TrialSequencer<C, T>
where
    C: CueDriver,
    T: Timer,
{
    /// Prepares a run. `samples` is the reference data used for training
    /// feedback; it may be incomplete.
    pub fn new(
        experiment: &Experiment,
        samples: &[Sample],
        config: RunConfig,
        cue: C,
        timer: T,
    ) -> Self {
        let sample_ids = config.order.arrange(&experiment.sample_ids);
        let ground_truth = samples
            .iter()
            .map(|s| (s.id.as_str().to_owned(), s.ground_truth()))
            .collect();

        info!(
            experiment = %experiment.id,
            trials = sample_ids.len(),
            training = config.training_mode,
            "Run prepared"
        );

        Self {
            phase: RunPhase::Start,
            experiment_id: experiment.id.as_str().to_owned(),
            experiment_name: experiment.name.clone(),
            results: ResultAccumulator::with_capacity(sample_ids.len()),
            sample_ids,
            ground_truth,
            config,
            cue,
            timer,
            selection: SelectionModel::new(),
            trial_started_at: None,
        }
    }

    pub fn handle_event(&mut self, event: SequencerEvent) -> bool {
        match event {
            SequencerEvent::Start => self.start(),
            SequencerEvent::Confirm => self.confirm(),
            SequencerEvent::Pick(coord) => self.set_selection(coord),
            SequencerEvent::Verify => self.show_highlight(),
            SequencerEvent::Advance => self.advance(),
        }
    }

    /// Leaves the introduction. Refused when there is nothing to present.
    pub fn start(&mut self) -> bool {
        if !self.phase.is_start() || !self.ready_to_start() {
            return false;
        }
        if self.config.pre_roll {
            self.phase = RunPhase::Ready;
            info!("Waiting for participant confirmation");
        } else {
            self.enter_trial(0);
        }
        true
    }

    /// Leaves the pre-roll screen.
    pub fn confirm(&mut self) -> bool {
        if !self.phase.is_ready() {
            return false;
        }
        self.enter_trial(0);
        true
    }

    pub fn set_selection(&mut self, coord: SphericalCoordinate) -> bool {
        if !self.phase.allows_input() {
            return false;
        }
        if self.selection.highlight().is_some() {
            // answer is frozen once the ground truth is shown
            return false;
        }
        if self.input_gated() {
            debug!("Pick ignored while cue is settling");
            return false;
        }
        let accepted = self.selection.set_selection(coord);
        if accepted {
            debug!(
                azimuth = coord.azimuth,
                elevation = coord.elevation,
                "Selection updated"
            );
        }
        accepted
    }

    /// Reveals the current sample's ground truth (training only).
    pub fn show_highlight(&mut self) -> bool {
        if !self.can_verify() {
            return false;
        }
        let Some(sample_id) = self.current_sample_id() else {
            return false;
        };
        let truth = match self.ground_truth.get(sample_id) {
            Some(truth) => *truth,
            None => {
                warn!(sample_id, "Ground truth missing, showing origin instead");
                SphericalCoordinate::ORIGIN
            }
        };
        self.selection.reveal(truth)
    }

    /// Records the current pick and moves on.
    pub fn advance(&mut self) -> bool {
        let Some(index) = self.phase.trial_index() else {
            return false;
        };
        let Some(selection) = self.selection.selection() else {
            return false;
        };
        if self.config.training_mode && self.selection.highlight().is_none() {
            return false;
        }

        self.cue.stop();
        let sample_id = &self.sample_ids[index];
        if let Some(started) = self.trial_started_at {
            debug!(
                sample_id = %sample_id,
                elapsed_ms = self.timer.elapsed(started).as_millis() as u64,
                "Trial answered"
            );
        }
        self.results.append(TrialResult::new(sample_id.clone(), selection));
        self.selection.clear();

        match self.phase.next(self.sample_ids.len()) {
            Some(RunPhase::Trial { index }) => self.enter_trial(index),
            _ => {
                self.phase = RunPhase::End;
                self.trial_started_at = None;
                info!(results = self.results.len(), "Run finished");
            }
        }
        true
    }

    fn enter_trial(&mut self, index: usize) {
        self.cue.stop();
        self.selection.clear();
        self.phase = RunPhase::Trial { index };
        self.trial_started_at = Some(self.timer.now());

        let sample_id = &self.sample_ids[index];
        info!(trial = index + 1, of = self.sample_ids.len(), sample_id = %sample_id, "Trial started");
        if let Err(e) = self.cue.play(sample_id) {
            warn!(sample_id = %sample_id, error = %e, "Cue failed to play, continuing without audio");
        }
    }

    fn input_gated(&self) -> bool {
        match &self.config.input_gate {
            InputGate::Open => false,
            InputGate::WhileCuePlaying => self.cue.is_playing(),
            gate @ InputGate::SettleDelay { .. } => match (gate.settle_delay(), self.trial_started_at) {
                (Some(delay), Some(started)) => self.timer.elapsed(started) < delay,
                _ => false,
            },
        }
    }

    /// The finished run, ready to hand to the backend. `None` until `End`.
    pub fn submission(&self, username: &str) -> Option<Submission> {
        if !self.phase.is_terminal() {
            return None;
        }
        Some(self.results.serialize_for_submission(
            &self.experiment_id,
            username,
            self.config.training_mode,
        ))
    }

    pub fn ready_to_start(&self) -> bool {
        !self.sample_ids.is_empty()
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn selection(&self) -> Option<SphericalCoordinate> {
        self.selection.selection()
    }

    pub fn highlight(&self) -> Option<SphericalCoordinate> {
        self.selection.highlight()
    }

    pub fn is_training(&self) -> bool {
        self.config.training_mode
    }

    pub fn can_advance(&self) -> bool {
        self.phase.allows_input()
            && self.selection.selection().is_some()
            && (!self.config.training_mode || self.selection.highlight().is_some())
    }

    pub fn can_verify(&self) -> bool {
        self.config.training_mode
            && self.phase.allows_input()
            && self.selection.selection().is_some()
            && self.selection.highlight().is_none()
    }

    pub fn current_sample_id(&self) -> Option<&str> {
        self.phase
            .trial_index()
            .and_then(|i| self.sample_ids.get(i))
            .map(String::as_str)
    }

    /// 1-based trial number and total, while a trial is active.
    pub fn progress(&self) -> Option<(usize, usize)> {
        self.phase
            .trial_index()
            .map(|i| (i + 1, self.sample_ids.len()))
    }

    pub fn trial_order(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn results(&self) -> &[TrialResult] {
        self.results.all()
    }

    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    pub fn experiment_name(&self) -> &str {
        &self.experiment_name
    }

    pub fn cue(&self) -> &C {
        &self.cue
    }
}

impl<C, T> Drop for TrialSequencer<C, T>
where
    C: CueDriver,
    T: Timer,
{
    fn drop(&mut self) {
        self.cue.stop();
    }
}
