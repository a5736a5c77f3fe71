//! Boundary checks for payloads coming off the wire.
//!
//! serde enforces the shape; these checks enforce the values. Anything that
//! fails here is rejected before it reaches the sequencer.

use thiserror::Error;

use crate::model::{
    AuthStatus, Experiment, ExperimentResult, NewExperiment, NewSample, RecordId, Sample,
    SubmissionPayload, TrialResult,
};

#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid `{field}`: {reason}")]
pub struct SchemaViolation {
    pub field: String,
    pub reason: String,
}

impl SchemaViolation {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }

    fn nested(self, parent: &str) -> Self {
        Self {
            field: format!("{parent}.{}", self.field),
            reason: self.reason,
        }
    }
}

pub trait Validate {
    fn validate(&self) -> Result<(), SchemaViolation>;
}

impl<T: Validate> Validate for Vec<T> {
    fn validate(&self) -> Result<(), SchemaViolation> {
        for (i, item) in self.iter().enumerate() {
            item.validate().map_err(|e| e.nested(&format!("[{i}]")))?;
        }
        Ok(())
    }
}

fn non_empty(field: &str, value: &str) -> Result<(), SchemaViolation> {
    if value.trim().is_empty() {
        return Err(SchemaViolation::new(field, "must not be empty"));
    }
    Ok(())
}

fn azimuth(field: &str, value: f32) -> Result<(), SchemaViolation> {
    if !value.is_finite() {
        return Err(SchemaViolation::new(field, "must be a finite number"));
    }
    Ok(())
}

fn elevation(field: &str, value: f32) -> Result<(), SchemaViolation> {
    if !value.is_finite() || !(-90.0..=90.0).contains(&value) {
        return Err(SchemaViolation::new(field, format!("{value} outside [-90, 90]")));
    }
    Ok(())
}

impl Validate for RecordId {
    fn validate(&self) -> Result<(), SchemaViolation> {
        non_empty("id", self.as_str())
    }
}

impl Validate for Sample {
    fn validate(&self) -> Result<(), SchemaViolation> {
        self.id.validate()?;
        non_empty("name", &self.name)?;
        azimuth("azimuth", self.azimuth)?;
        elevation("elevation", self.elevation)
    }
}

impl Validate for NewSample {
    fn validate(&self) -> Result<(), SchemaViolation> {
        non_empty("name", &self.name)?;
        azimuth("azimuth", self.azimuth)?;
        elevation("elevation", self.elevation)
    }
}

impl Validate for Experiment {
    fn validate(&self) -> Result<(), SchemaViolation> {
        self.id.validate()?;
        non_empty("name", &self.name)?;
        for (i, id) in self.sample_ids.iter().enumerate() {
            non_empty(&format!("sample_ids[{i}]"), id)?;
        }
        Ok(())
    }
}

impl Validate for NewExperiment {
    fn validate(&self) -> Result<(), SchemaViolation> {
        non_empty("name", &self.name)?;
        for (i, id) in self.sample_ids.iter().enumerate() {
            non_empty(&format!("sample_ids[{i}]"), id)?;
        }
        Ok(())
    }
}

impl Validate for TrialResult {
    fn validate(&self) -> Result<(), SchemaViolation> {
        non_empty("sample_id", &self.sample_id)?;
        azimuth("azimuth", self.azimuth)?;
        elevation("elevation", self.elevation)
    }
}

impl Validate for SubmissionPayload {
    fn validate(&self) -> Result<(), SchemaViolation> {
        self.sample_results
            .validate()
            .map_err(|e| e.nested("sample_results"))
    }
}

impl Validate for ExperimentResult {
    fn validate(&self) -> Result<(), SchemaViolation> {
        if let Some(id) = &self.id {
            id.validate()?;
        }
        self.sample_results
            .validate()
            .map_err(|e| e.nested("sample_results"))
    }
}

impl Validate for AuthStatus {
    fn validate(&self) -> Result<(), SchemaViolation> {
        non_empty("username", &self.username)
    }
}
