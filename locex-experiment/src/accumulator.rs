use locex_core::{SubmissionPayload, TrialResult};

/// A finished run, addressed to the experiment it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub experiment_id: String,
    pub payload: SubmissionPayload,
}

/// Append-only record of a run's answers, in trial order.
#[derive(Debug, Clone, Default)]
pub struct ResultAccumulator {
    results: Vec<TrialResult>,
}

impl ResultAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(trials: usize) -> Self {
        Self {
            results: Vec::with_capacity(trials),
        }
    }

    pub fn append(&mut self, result: TrialResult) {
        self.results.push(result);
    }

    pub fn all(&self) -> &[TrialResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn serialize_for_submission(
        &self,
        experiment_id: &str,
        username: &str,
        training: bool,
    ) -> Submission {
        Submission {
            experiment_id: experiment_id.to_owned(),
            payload: SubmissionPayload {
                sample_results: self.results.clone(),
                training,
                user: username.to_owned(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use locex_core::SphericalCoordinate;

    #[test]
    fn keeps_append_order() {
        let mut acc = ResultAccumulator::new();
        acc.append(TrialResult::new("b", SphericalCoordinate::new(15.0, 0.0)));
        acc.append(TrialResult::new("a", SphericalCoordinate::new(30.0, 0.0)));
        let ids: Vec<_> = acc.all().iter().map(|r| r.sample_id.as_str()).collect();
        assert_eq!(ids, ["b", "a"]);
        assert_eq!(acc.len(), 2);
    }

    #[test]
    fn submission_carries_run_metadata() {
        let mut acc = ResultAccumulator::new();
        acc.append(TrialResult::new("s1", SphericalCoordinate::new(90.0, 0.0)));
        let submission = acc.serialize_for_submission("e1", "ana", true);
        assert_eq!(submission.experiment_id, "e1");
        assert!(submission.payload.training);
        assert_eq!(submission.payload.user, "ana");
        assert_eq!(submission.payload.sample_results, acc.all());
    }
}
