/// Where a run currently is.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Default)]
pub enum RunPhase {
    /// Experiment introduction, nothing played yet.
    #[default]
    Start,
    /// Training pre-roll: waits for the participant to confirm.
    Ready,
    /// Presenting `sample_ids[index]`.
    Trial { index: usize },
    /// Terminal. A new run needs a new sequencer.
    End,
}

impl RunPhase {
    /// Phase that follows this one in a run of `total` trials.
    pub fn next(&self, total: usize) -> Option<Self> {
        use RunPhase::*;
        Some(match *self {
            Start | Ready if total == 0 => End,
            Start | Ready => Trial { index: 0 },
            Trial { index } if index + 1 < total => Trial { index: index + 1 },
            Trial { .. } => End,
            End => return None,
        })
    }

    /// Picking is only meaningful while a cue is presented.
    pub fn allows_input(&self) -> bool {
        matches!(self, RunPhase::Trial { .. })
    }

    pub fn trial_index(&self) -> Option<usize> {
        match self {
            RunPhase::Trial { index } => Some(*index),
            _ => None,
        }
    }

    pub fn is_start(&self) -> bool {
        matches!(self, RunPhase::Start)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, RunPhase::Ready)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::End)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_trials_in_order() {
        let mut phase = RunPhase::Start;
        let mut seen = Vec::new();
        while let Some(next) = phase.next(3) {
            seen.push(next);
            phase = next;
        }
        assert_eq!(
            seen,
            vec![
                RunPhase::Trial { index: 0 },
                RunPhase::Trial { index: 1 },
                RunPhase::Trial { index: 2 },
                RunPhase::End,
            ]
        );
    }

    #[test]
    fn ready_enters_first_trial() {
        assert_eq!(RunPhase::Ready.next(2), Some(RunPhase::Trial { index: 0 }));
        assert!(!RunPhase::Ready.allows_input());
        assert!(RunPhase::Trial { index: 1 }.allows_input());
        assert_eq!(RunPhase::End.next(2), None);
    }
}
