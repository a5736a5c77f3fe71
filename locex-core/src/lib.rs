pub mod geometry;
pub mod model;
pub mod phase;
pub mod validate;

pub use geometry::{
    angular_distance, cartesian_to_spherical, deg_to_rad, normalize_azimuth,
    spherical_to_cartesian, SphericalCoordinate, TargetGrid,
};
pub use model::{
    AuthStatus, Experiment, ExperimentResult, NewExperiment, NewSample, RecordId, Sample,
    SubmissionPayload, TrialResult,
};
pub use phase::RunPhase;
pub use validate::{SchemaViolation, Validate};
