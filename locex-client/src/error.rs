use locex_core::SchemaViolation;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("response did not match the expected schema: {0}")]
    Schema(String),

    #[error("not signed in or not allowed")]
    Unauthorized,

    #[error("{resource} with this name already exists")]
    Conflict { resource: &'static str },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid API base URL {0}")]
    InvalidUrl(String),
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::Schema(e.to_string())
    }
}

impl From<SchemaViolation> for ClientError {
    fn from(e: SchemaViolation) -> Self {
        ClientError::Schema(e.to_string())
    }
}
