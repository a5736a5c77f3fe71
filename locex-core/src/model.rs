use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::geometry::SphericalCoordinate;

/// Opaque record identifier.
///
/// The backend hands ids out either as plain strings or as database "things"
/// (`{ "tb": "sample", "id": { "String": "abc" } }`). Both decode to the bare
/// key; serialization always writes the bare key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Serialize for RecordId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireRecordId {
    Plain(String),
    Thing { id: ThingKey },
}

#[derive(Deserialize)]
struct ThingKey {
    #[serde(rename = "String")]
    string: String,
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match WireRecordId::deserialize(deserializer)? {
            WireRecordId::Plain(id) => RecordId(id),
            WireRecordId::Thing { id } => RecordId(id.string),
        })
    }
}

/// Reference data for one audio cue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub id: RecordId,
    pub name: String,
    pub azimuth: f32,
    pub elevation: f32,
}

impl Sample {
    pub fn ground_truth(&self) -> SphericalCoordinate {
        SphericalCoordinate::new(self.azimuth, self.elevation)
    }
}

/// Metadata part of a sample upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSample {
    pub name: String,
    pub azimuth: f32,
    pub elevation: f32,
}

/// An ordered set of samples. Order of `sample_ids` is trial order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    pub id: RecordId,
    pub name: String,
    pub sample_ids: Vec<String>,
    #[serde(default)]
    pub is_public: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewExperiment {
    pub name: String,
    pub sample_ids: Vec<String>,
    #[serde(default)]
    pub is_public: bool,
}

/// The participant's chosen direction for one sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    pub sample_id: String,
    pub azimuth: f32,
    pub elevation: f32,
}

impl TrialResult {
    pub fn new(sample_id: impl Into<String>, answer: SphericalCoordinate) -> Self {
        Self {
            sample_id: sample_id.into(),
            azimuth: answer.azimuth,
            elevation: answer.elevation,
        }
    }

    pub fn answer(&self) -> SphericalCoordinate {
        SphericalCoordinate::new(self.azimuth, self.elevation)
    }
}

/// Body of `POST /experiments/results/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionPayload {
    pub sample_results: Vec<TrialResult>,
    pub training: bool,
    pub user: String,
}

/// A stored run, as listed by `GET /experiments/results/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub sample_results: Vec<TrialResult>,
    #[serde(default)]
    pub training: bool,
    #[serde(default)]
    pub user: Option<String>,
}

impl From<SubmissionPayload> for ExperimentResult {
    fn from(payload: SubmissionPayload) -> Self {
        Self {
            id: None,
            sample_results: payload.sample_results,
            training: payload.training,
            user: Some(payload.user),
        }
    }
}

/// Session claims returned by `GET /auth/status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthStatus {
    pub username: String,
    #[serde(default)]
    pub exp: u64,
}
