mod auth;
mod client;
mod error;

pub use auth::AuthContext;
pub use client::ApiClient;
pub use error::ClientError;
