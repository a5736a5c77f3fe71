use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-run options chosen by the researcher or on the command line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Reveal ground truth after each pick, before advancing.
    pub training_mode: bool,
    /// Show a confirmation screen between the introduction and trial 0.
    pub pre_roll: bool,
    pub order: TrialOrder,
    pub input_gate: InputGate,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            training_mode: false,
            pre_roll: false,
            order: TrialOrder::Fixed,
            input_gate: InputGate::Open,
        }
    }
}

impl RunConfig {
    pub fn training() -> Self {
        Self {
            training_mode: true,
            ..Self::default()
        }
    }
}

/// Presentation order of an experiment's samples.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrialOrder {
    /// As listed by the experiment.
    #[default]
    Fixed,
    /// Shuffled once at run creation; a seed makes the order reproducible.
    Shuffled {
        #[serde(default)]
        seed: Option<u64>,
    },
}

impl TrialOrder {
    pub fn arrange(&self, sample_ids: &[String]) -> Vec<String> {
        let mut ids = sample_ids.to_vec();
        match self {
            TrialOrder::Fixed => {}
            TrialOrder::Shuffled { seed: Some(seed) } => {
                ids.shuffle(&mut StdRng::seed_from_u64(*seed));
            }
            TrialOrder::Shuffled { seed: None } => {
                ids.shuffle(&mut rand::rng());
            }
        }
        ids
    }
}

/// When picks are accepted during a trial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InputGate {
    #[default]
    Open,
    /// Ignore picks while the cue driver reports playback.
    WhileCuePlaying,
    /// Ignore picks for a fixed time after the trial starts.
    SettleDelay { millis: u64 },
}

impl InputGate {
    pub fn settle_delay(&self) -> Option<Duration> {
        match self {
            InputGate::SettleDelay { millis } => Some(Duration::from_millis(*millis)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("s{i}")).collect()
    }

    #[test]
    fn fixed_order_is_untouched() {
        assert_eq!(TrialOrder::Fixed.arrange(&ids(5)), ids(5));
    }

    #[test]
    fn seeded_shuffle_is_reproducible_permutation() {
        let order = TrialOrder::Shuffled { seed: Some(42) };
        let a = order.arrange(&ids(20));
        let b = order.arrange(&ids(20));
        assert_eq!(a, b);

        let mut sorted = a.clone();
        sorted.sort();
        let mut expected = ids(20);
        expected.sort();
        assert_eq!(sorted, expected);
    }

    #[test]
    fn parses_from_toml() {
        let config: RunConfig = toml::from_str(
            r#"
            training_mode = true
            order = { kind = "shuffled", seed = 7 }
            input_gate = { kind = "settle_delay", millis = 300 }
            "#,
        )
        .unwrap();
        assert!(config.training_mode);
        assert!(!config.pre_roll);
        assert_eq!(config.order, TrialOrder::Shuffled { seed: Some(7) });
        assert_eq!(
            config.input_gate.settle_delay(),
            Some(Duration::from_millis(300))
        );
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let config: RunConfig = toml::from_str("").unwrap();
        assert_eq!(config, RunConfig::default());
    }
}
