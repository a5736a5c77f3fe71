use locex_core::AuthStatus;
use serde::Serialize;

/// Who the client is acting as. Passed explicitly to whatever needs it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthContext {
    pub authenticated: bool,
    pub username: Option<String>,
}

impl AuthContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn signed_in(username: impl Into<String>) -> Self {
        Self {
            authenticated: true,
            username: Some(username.into()),
        }
    }

    /// Name recorded with submitted results; empty when anonymous.
    pub fn submission_name(&self) -> &str {
        self.username.as_deref().unwrap_or_default()
    }
}

impl From<AuthStatus> for AuthContext {
    fn from(status: AuthStatus) -> Self {
        Self::signed_in(status.username)
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct Credentials<'a> {
    pub username: &'a str,
    pub password: &'a str,
}
