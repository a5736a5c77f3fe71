//! Delimited-text export of stored runs, one row per answered trial.

use locex_core::{ExperimentResult, Sample};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;
use thiserror::Error;
use tracing::info;

pub const DELIMITER: char = ';';
pub const DEFAULT_FILE_NAME: &str = "experiment_results.txt";

pub const HEADER: [&str; 9] = [
    "index",
    "username",
    "mode",
    "sample_id",
    "sample_name",
    "sample_azimuth",
    "sample_elevation",
    "answer_azimuth",
    "answer_elevation",
];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

fn escape(field: &str) -> String {
    let needs_quotes = field.contains(DELIMITER)
        || field.contains('"')
        || field.contains('\n')
        || field.contains('\r');
    if !needs_quotes {
        return field.to_owned();
    }
    format!("\"{}\"", field.replace('"', "\"\""))
}

fn push_row<'a>(out: &mut String, fields: impl IntoIterator<Item = &'a str>) {
    let mut first = true;
    for field in fields {
        if !first {
            out.push(DELIMITER);
        }
        out.push_str(&escape(field));
        first = false;
    }
    out.push('\n');
}

/// Joins every answer with its sample's name and ground truth.
///
/// Answers whose sample has since been deleted keep their row, with blank
/// name and ground-truth columns.
pub fn to_delimited_text(runs: &[ExperimentResult], samples: &[Sample]) -> String {
    let by_id: HashMap<&str, &Sample> = samples.iter().map(|s| (s.id.as_str(), s)).collect();

    let mut out = String::new();
    push_row(&mut out, HEADER);

    for (run_idx, run) in runs.iter().enumerate() {
        let index = (run_idx + 1).to_string();
        let username = run.user.as_deref().unwrap_or_default();
        let mode = if run.training { "training" } else { "regular" };

        for result in &run.sample_results {
            let sample = by_id.get(result.sample_id.as_str());
            let (name, azimuth, elevation) = match sample {
                Some(s) => (s.name.clone(), s.azimuth.to_string(), s.elevation.to_string()),
                None => (String::new(), String::new(), String::new()),
            };
            let answer_azimuth = result.azimuth.to_string();
            let answer_elevation = result.elevation.to_string();
            push_row(
                &mut out,
                [
                    index.as_str(),
                    username,
                    mode,
                    result.sample_id.as_str(),
                    name.as_str(),
                    azimuth.as_str(),
                    elevation.as_str(),
                    answer_azimuth.as_str(),
                    answer_elevation.as_str(),
                ],
            );
        }
    }
    out
}

pub fn write_delimited_file(
    path: &Path,
    runs: &[ExperimentResult],
    samples: &[Sample],
) -> Result<usize, ExportError> {
    let text = to_delimited_text(runs, samples);
    std::fs::write(path, &text).map_err(|source| ExportError::Write {
        path: path.display().to_string(),
        source,
    })?;
    let rows = runs.iter().map(|r| r.sample_results.len()).sum();
    info!(path = %path.display(), rows, "Exported experiment results");
    Ok(rows)
}

/// Human-readable table of runs, for terminals.
pub fn to_summary(runs: &[ExperimentResult], samples: &[Sample]) -> String {
    let by_id: HashMap<&str, &Sample> = samples.iter().map(|s| (s.id.as_str(), s)).collect();
    let mut out = String::new();
    for (run_idx, run) in runs.iter().enumerate() {
        let _ = writeln!(
            out,
            "#{} {} ({})",
            run_idx + 1,
            run.user.as_deref().unwrap_or("anonymous"),
            if run.training { "training" } else { "regular" }
        );
        for result in &run.sample_results {
            let name = by_id
                .get(result.sample_id.as_str())
                .map(|s| s.name.as_str())
                .unwrap_or("<deleted sample>");
            let _ = writeln!(
                out,
                "    {:<24} azimuth {:>6.1}  elevation {:>6.1}",
                name, result.azimuth, result.elevation
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use locex_core::{RecordId, SphericalCoordinate, TrialResult};

    fn sample(id: &str, name: &str, azimuth: f32, elevation: f32) -> Sample {
        Sample {
            id: RecordId::new(id),
            name: name.into(),
            azimuth,
            elevation,
        }
    }

    fn run(user: Option<&str>, training: bool, answers: &[(&str, f32, f32)]) -> ExperimentResult {
        ExperimentResult {
            id: None,
            sample_results: answers
                .iter()
                .map(|(id, az, el)| TrialResult::new(*id, SphericalCoordinate::new(*az, *el)))
                .collect(),
            training,
            user: user.map(str::to_owned),
        }
    }

    fn columns(line: &str) -> usize {
        // counts unquoted delimiters only
        let mut in_quotes = false;
        let mut count = 1;
        for ch in line.chars() {
            match ch {
                '"' => in_quotes = !in_quotes,
                ';' if !in_quotes => count += 1,
                _ => {}
            }
        }
        count
    }

    #[test]
    fn one_row_per_run_and_trial() {
        let samples = vec![sample("s1", "left", 90.0, 0.0), sample("s2", "up", 0.0, 45.0)];
        let runs = vec![
            run(Some("ana"), false, &[("s1", 90.0, 0.0), ("s2", 270.0, -15.0)]),
            run(Some("bo"), true, &[("s1", 75.0, 15.0)]),
        ];
        let text = to_delimited_text(&runs, &samples);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(
            lines[0],
            "index;username;mode;sample_id;sample_name;sample_azimuth;sample_elevation;answer_azimuth;answer_elevation"
        );
        assert_eq!(lines[1], "1;ana;regular;s1;left;90;0;90;0");
        assert_eq!(lines[2], "1;ana;regular;s2;up;0;45;270;-15");
        assert_eq!(lines[3], "2;bo;training;s1;left;90;0;75;15");
    }

    #[test]
    fn deleted_sample_leaves_blank_columns() {
        let runs = vec![run(Some("ana"), false, &[("gone", 30.0, 0.0)])];
        let text = to_delimited_text(&runs, &[]);
        let row = text.lines().nth(1).unwrap();
        assert_eq!(row, "1;ana;regular;gone;;;;30;0");
        assert_eq!(columns(row), HEADER.len());
    }

    #[test]
    fn delimiter_collisions_are_quoted() {
        let samples = vec![sample("s1", "front; \"near\"", 0.0, 0.0)];
        let runs = vec![run(Some("a;b"), false, &[("s1", 0.0, 0.0)])];
        let text = to_delimited_text(&runs, &samples);
        let row = text.lines().nth(1).unwrap();
        assert_eq!(row, "1;\"a;b\";regular;s1;\"front; \"\"near\"\"\";0;0;0;0");
        assert_eq!(columns(row), HEADER.len());
    }

    #[test]
    fn anonymous_runs_have_blank_username() {
        let runs = vec![run(None, false, &[("s1", 0.0, 0.0)])];
        let text = to_delimited_text(&runs, &[]);
        assert!(text.lines().nth(1).unwrap().starts_with("1;;regular;"));
    }

    #[test]
    fn writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_FILE_NAME);
        let runs = vec![run(Some("ana"), false, &[("s1", 0.0, 0.0), ("s2", 15.0, 0.0)])];
        let rows = write_delimited_file(&path, &runs, &[]).unwrap();
        assert_eq!(rows, 2);
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn summary_marks_deleted_samples() {
        let runs = vec![run(None, true, &[("gone", 0.0, 0.0)])];
        let summary = to_summary(&runs, &[]);
        assert!(summary.contains("anonymous (training)"));
        assert!(summary.contains("<deleted sample>"));
    }
}
