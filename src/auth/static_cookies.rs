use async_trait::async_trait;
use reqwest::Request;

use super::{AuthError, AuthState, CredentialsProvider};

/// Strategy that attaches a token pair supplied up front (e.g. from config).
#[derive(Debug, Clone)]
pub struct StaticCookies {
    state: AuthState,
}

impl StaticCookies {
    /// Creates the strategy from a session token and CSRF token.
    #[must_use]
    pub fn new(session: impl Into<String>, csrf_token: impl Into<String>) -> Self {
        Self {
            state: AuthState::new(session, csrf_token),
        }
    }

    /// True iff both configured tokens are non-empty.
    #[must_use]
    pub fn has_auth(&self) -> bool {
        self.state.has_auth()
    }

    /// Returns the configured token pair.
    #[must_use]
    pub fn state(&self) -> &AuthState {
        &self.state
    }
}

#[async_trait]
impl CredentialsProvider for StaticCookies {
    async fn attach(&self, request: &mut Request) -> Result<(), AuthError> {
        self.state.attach_to(request)
    }
}
