use locex_core::{Experiment, RecordId, RunPhase, Sample, SphericalCoordinate, TrialResult};
use locex_experiment::{
    CueDriver, CueError, InputGate, RunConfig, SequencerEvent, TrialOrder, TrialSequencer,
};
use locex_timing::ManualTimer;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

#[derive(Debug, Clone, PartialEq)]
enum CueCall {
    Play(String),
    Stop,
}

/// Logs every call and pretends each cue plays until stopped.
#[derive(Clone, Default)]
struct RecordingCue {
    calls: Rc<RefCell<Vec<CueCall>>>,
    playing: Rc<RefCell<bool>>,
    fail_on: Option<String>,
}

impl RecordingCue {
    fn plays(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| match c {
                CueCall::Play(id) => Some(id.clone()),
                CueCall::Stop => None,
            })
            .collect()
    }

    fn finish_playback(&self) {
        *self.playing.borrow_mut() = false;
    }
}

impl CueDriver for RecordingCue {
    fn play(&mut self, sample_id: &str) -> Result<(), CueError> {
        self.calls.borrow_mut().push(CueCall::Play(sample_id.to_owned()));
        if self.fail_on.as_deref() == Some(sample_id) {
            return Err(CueError::Missing(sample_id.to_owned()));
        }
        *self.playing.borrow_mut() = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.calls.borrow_mut().push(CueCall::Stop);
        *self.playing.borrow_mut() = false;
    }

    fn is_playing(&self) -> bool {
        *self.playing.borrow()
    }
}

fn experiment(ids: &[&str]) -> Experiment {
    Experiment {
        id: RecordId::new("exp-1"),
        name: "Frontal plane".into(),
        sample_ids: ids.iter().map(|s| s.to_string()).collect(),
        is_public: false,
    }
}

fn samples() -> Vec<Sample> {
    vec![
        Sample {
            id: RecordId::new("s1"),
            name: "left click".into(),
            azimuth: 90.0,
            elevation: 0.0,
        },
        Sample {
            id: RecordId::new("s2"),
            name: "rear noise".into(),
            azimuth: 180.0,
            elevation: 30.0,
        },
    ]
}

fn sequencer(
    ids: &[&str],
    config: RunConfig,
) -> (TrialSequencer<RecordingCue, ManualTimer>, RecordingCue, ManualTimer) {
    let cue = RecordingCue::default();
    let timer = ManualTimer::new();
    let seq = TrialSequencer::new(&experiment(ids), &samples(), config, cue.clone(), timer.clone());
    (seq, cue, timer)
}

fn pick(azimuth: f32, elevation: f32) -> SphericalCoordinate {
    SphericalCoordinate::new(azimuth, elevation)
}

/// Counts warnings emitted while installed as the default subscriber.
#[derive(Clone, Default)]
struct WarnCounter(Arc<AtomicUsize>);

impl WarnCounter {
    fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl<S: Subscriber> Layer<S> for WarnCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::WARN {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[test]
fn two_sample_example_run() {
    let (mut seq, _cue, _) = sequencer(&["s1", "s2"], RunConfig::default());

    assert!(seq.start());
    assert_eq!(seq.phase(), RunPhase::Trial { index: 0 });
    assert!(seq.set_selection(pick(90.0, 0.0)));
    assert!(seq.advance());

    assert_eq!(seq.phase(), RunPhase::Trial { index: 1 });
    assert!(seq.set_selection(pick(270.0, -15.0)));
    assert!(seq.advance());
    assert_eq!(seq.phase(), RunPhase::End);

    assert_eq!(
        seq.results(),
        [
            TrialResult::new("s1", pick(90.0, 0.0)),
            TrialResult::new("s2", pick(270.0, -15.0)),
        ]
    );

    let submission = seq.submission("ana").unwrap();
    assert_eq!(submission.experiment_id, "exp-1");
    assert_eq!(
        serde_json::to_value(&submission.payload).unwrap(),
        serde_json::json!({
            "sample_results": [
                {"sample_id": "s1", "azimuth": 90.0, "elevation": 0.0},
                {"sample_id": "s2", "azimuth": 270.0, "elevation": -15.0}
            ],
            "training": false,
            "user": "ana"
        })
    );
}

#[test]
fn produces_one_result_per_sample_in_order() {
    for n in 1..=12 {
        let ids: Vec<String> = (0..n).map(|i| format!("sample-{i}")).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let (mut seq, _, _) = sequencer(&refs, RunConfig::default());

        assert!(seq.start());
        let mut step = 0;
        while seq.phase() != RunPhase::End {
            assert!(seq.set_selection(pick(step as f32 * 15.0, 0.0)));
            assert!(seq.advance());
            step += 1;
        }

        let recorded: Vec<&str> = seq.results().iter().map(|r| r.sample_id.as_str()).collect();
        assert_eq!(recorded, refs, "run of {n}");
    }
}

#[test]
fn advance_without_selection_is_rejected() {
    let (mut seq, cue, _) = sequencer(&["s1", "s2"], RunConfig::default());
    seq.start();
    let calls_before = cue.calls.borrow().len();

    assert!(!seq.advance());
    assert_eq!(seq.phase(), RunPhase::Trial { index: 0 });
    assert!(seq.results().is_empty());
    assert_eq!(cue.calls.borrow().len(), calls_before);
}

#[test]
fn cannot_start_empty_experiment() {
    let (mut seq, cue, _) = sequencer(&[], RunConfig::default());
    assert!(!seq.ready_to_start());
    assert!(!seq.start());
    assert_eq!(seq.phase(), RunPhase::Start);
    assert!(cue.plays().is_empty());
    assert!(seq.submission("ana").is_none());
}

#[test]
fn picks_outside_trials_are_ignored() {
    let (mut seq, _, _) = sequencer(&["s1"], RunConfig::default());
    assert!(!seq.set_selection(pick(10.0, 10.0)));
    assert_eq!(seq.selection(), None);

    seq.start();
    seq.set_selection(pick(10.0, 10.0));
    seq.advance();
    assert_eq!(seq.phase(), RunPhase::End);
    assert!(!seq.set_selection(pick(20.0, 10.0)));
    assert!(!seq.advance());
    assert_eq!(seq.results().len(), 1);
}

#[test]
fn selection_is_cleared_between_trials() {
    let (mut seq, _, _) = sequencer(&["s1", "s2"], RunConfig::default());
    seq.start();
    seq.set_selection(pick(45.0, 15.0));
    seq.advance();
    assert_eq!(seq.selection(), None);
    assert_eq!(seq.highlight(), None);
}

#[test]
fn cue_stops_before_each_start_and_at_end() {
    let (mut seq, cue, _) = sequencer(&["s1", "s2"], RunConfig::default());
    seq.start();
    seq.set_selection(pick(0.0, 0.0));
    seq.advance();
    seq.set_selection(pick(0.0, 0.0));
    seq.advance();

    let calls = cue.calls.borrow().clone();
    for (i, call) in calls.iter().enumerate() {
        if let CueCall::Play(_) = call {
            assert_eq!(calls[i - 1], CueCall::Stop, "play at {i} not preceded by stop");
        }
    }
    assert_eq!(calls.last(), Some(&CueCall::Stop));
    assert_eq!(cue.plays(), ["s1", "s2"]);
    assert!(!cue.is_playing());
}

#[test]
fn dropping_the_sequencer_stops_the_cue() {
    let (mut seq, cue, _) = sequencer(&["s1", "s2"], RunConfig::default());
    seq.start();
    assert!(cue.is_playing());
    drop(seq);
    assert!(!cue.is_playing());
}

#[test]
fn failed_cue_does_not_abort_the_trial() {
    let cue = RecordingCue {
        fail_on: Some("s1".into()),
        ..RecordingCue::default()
    };
    let mut seq = TrialSequencer::new(
        &experiment(&["s1"]),
        &samples(),
        RunConfig::default(),
        cue,
        ManualTimer::new(),
    );
    assert!(seq.start());
    assert!(seq.set_selection(pick(90.0, 0.0)));
    assert!(seq.advance());
    assert_eq!(seq.phase(), RunPhase::End);
}

#[test]
fn training_requires_verification_before_advance() {
    let (mut seq, _, _) = sequencer(&["s1", "s2"], RunConfig::training());
    seq.start();

    assert!(!seq.show_highlight(), "nothing to verify before a pick");
    assert!(seq.set_selection(pick(75.0, 15.0)));
    assert!(seq.can_verify());
    assert!(!seq.advance());
    assert!(seq.results().is_empty());

    assert!(seq.show_highlight());
    assert_eq!(seq.highlight(), Some(pick(90.0, 0.0)));
    assert!(seq.can_advance());
    assert!(!seq.set_selection(pick(90.0, 0.0)), "answer frozen after verify");

    assert!(seq.advance());
    assert_eq!(seq.highlight(), None);
    assert_eq!(seq.phase(), RunPhase::Trial { index: 1 });
}

#[test]
fn training_records_the_same_answer_as_regular_mode() {
    let run = |config: RunConfig| {
        let (mut seq, _, _) = sequencer(&["s1", "s2"], config);
        seq.start();
        for answer in [pick(60.0, 15.0), pick(195.0, 30.0)] {
            seq.set_selection(answer);
            seq.show_highlight();
            seq.advance();
        }
        assert_eq!(seq.phase(), RunPhase::End);
        seq.submission("ana").unwrap().payload
    };

    let regular = run(RunConfig::default());
    let training = run(RunConfig::training());
    assert_eq!(regular.sample_results, training.sample_results);
    assert!(!regular.training);
    assert!(training.training);
}

#[test]
fn show_highlight_twice_changes_nothing() {
    let (mut seq, _, _) = sequencer(&["s2"], RunConfig::training());
    seq.start();
    seq.set_selection(pick(0.0, 0.0));
    assert!(seq.show_highlight());
    let first = seq.highlight();
    assert!(!seq.show_highlight());
    assert_eq!(seq.highlight(), first);
    assert_eq!(first, Some(pick(180.0, 30.0)));
}

#[test]
fn show_highlight_is_noop_in_regular_mode() {
    let (mut seq, _, _) = sequencer(&["s1"], RunConfig::default());
    seq.start();
    seq.set_selection(pick(0.0, 0.0));
    assert!(!seq.show_highlight());
    assert_eq!(seq.highlight(), None);
}

#[test]
fn missing_ground_truth_uses_origin() {
    let (mut seq, _, _) = sequencer(&["deleted"], RunConfig::training());
    seq.start();
    seq.set_selection(pick(120.0, -30.0));
    assert!(seq.show_highlight());
    assert_eq!(seq.highlight(), Some(SphericalCoordinate::ORIGIN));
    assert!(seq.advance());
    assert_eq!(seq.results()[0], TrialResult::new("deleted", pick(120.0, -30.0)));
}

#[test]
fn verify_without_a_pending_answer_stays_quiet() {
    let warnings = WarnCounter::default();
    let _guard =
        tracing::subscriber::set_default(tracing_subscriber::registry().with(warnings.clone()));

    let (mut seq, _, _) = sequencer(&["deleted"], RunConfig::training());
    seq.start();
    assert!(!seq.show_highlight());
    assert_eq!(warnings.count(), 0);

    seq.set_selection(pick(10.0, 0.0));
    assert!(seq.show_highlight());
    assert_eq!(warnings.count(), 1);

    assert!(!seq.show_highlight());
    assert!(!seq.show_highlight());
    assert_eq!(warnings.count(), 1);
}

#[test]
fn pre_roll_waits_for_confirmation() {
    let config = RunConfig {
        pre_roll: true,
        ..RunConfig::training()
    };
    let (mut seq, cue, _) = sequencer(&["s1"], config);
    assert!(seq.handle_event(SequencerEvent::Start));
    assert_eq!(seq.phase(), RunPhase::Ready);
    assert!(cue.plays().is_empty());
    assert!(!seq.handle_event(SequencerEvent::Pick(pick(0.0, 0.0))));

    assert!(seq.handle_event(SequencerEvent::Confirm));
    assert_eq!(seq.phase(), RunPhase::Trial { index: 0 });
    assert_eq!(cue.plays(), ["s1"]);
    assert!(!seq.handle_event(SequencerEvent::Confirm));
}

#[test]
fn settle_delay_gates_early_picks() {
    let config = RunConfig {
        input_gate: InputGate::SettleDelay { millis: 500 },
        ..RunConfig::default()
    };
    let (mut seq, _, timer) = sequencer(&["s1", "s2"], config);
    seq.start();

    assert!(!seq.set_selection(pick(15.0, 0.0)));
    timer.advance(Duration::from_millis(499));
    assert!(!seq.set_selection(pick(15.0, 0.0)));
    timer.advance(Duration::from_millis(1));
    assert!(seq.set_selection(pick(15.0, 0.0)));

    seq.advance();
    assert!(!seq.set_selection(pick(30.0, 0.0)), "gate resets on each trial");
}

#[test]
fn while_cue_playing_gate_follows_the_driver() {
    let config = RunConfig {
        input_gate: InputGate::WhileCuePlaying,
        ..RunConfig::default()
    };
    let (mut seq, cue, _) = sequencer(&["s1"], config);
    seq.start();
    assert!(!seq.set_selection(pick(15.0, 0.0)));
    cue.finish_playback();
    assert!(seq.set_selection(pick(15.0, 0.0)));
}

#[test]
fn seeded_shuffle_defines_trial_and_result_order() {
    let ids: Vec<String> = (0..8).map(|i| format!("s{i}")).collect();
    let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    let config = RunConfig {
        order: TrialOrder::Shuffled { seed: Some(3) },
        ..RunConfig::default()
    };
    let (mut seq, cue, _) = sequencer(&refs, config);
    let order = seq.trial_order().to_vec();
    assert_eq!(order.len(), 8);

    seq.start();
    while seq.phase() != RunPhase::End {
        seq.set_selection(pick(0.0, 0.0));
        seq.advance();
    }
    let recorded: Vec<String> = seq.results().iter().map(|r| r.sample_id.clone()).collect();
    assert_eq!(recorded, order);
    assert_eq!(cue.plays(), order);
}

#[test]
fn progress_reports_current_trial() {
    let (mut seq, _, _) = sequencer(&["s1", "s2"], RunConfig::default());
    assert_eq!(seq.progress(), None);
    seq.start();
    assert_eq!(seq.progress(), Some((1, 2)));
    assert_eq!(seq.current_sample_id(), Some("s1"));
    seq.set_selection(pick(0.0, 0.0));
    seq.advance();
    assert_eq!(seq.progress(), Some((2, 2)));
}
