//! Username/password login strategy.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Request;
use tracing::{debug, info, instrument};

use crate::client::LeetCodeClient;

use super::binding::ClientSlot;
use super::cache::TokenCache;
use super::{AuthError, AuthState, ClientBinder, CredentialsProvider, ResettableProvider};

const STRATEGY: &str = "password";

/// Strategy that logs in with a username and password on first use.
///
/// The token pair comes from the cookies set by the login response and is
/// cached until [`reset`](ResettableProvider::reset). A failed login is not
/// remembered: the next attach call logs in again.
#[derive(Default)]
pub struct PasswordLogin {
    username: String,
    password: String,
    cache: TokenCache,
    client: ClientSlot,
}

impl PasswordLogin {
    /// Creates the strategy. A client must be [bound](ClientBinder::bind)
    /// before the first attach call.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            cache: TokenCache::default(),
            client: ClientSlot::default(),
        }
    }

    /// Returns the configured username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Whether a token pair is currently cached.
    pub async fn is_authenticated(&self) -> bool {
        self.cache.is_populated().await
    }

    #[instrument(level = "debug", skip(self), fields(username = %self.username))]
    async fn login(&self) -> Result<AuthState, AuthError> {
        let client = self.client.get(STRATEGY)?;
        info!(username = %self.username, "logging in with username and password");

        let response = client.login(&self.username, &self.password).await?;

        let mut state = AuthState::default();
        for cookie in response.cookies() {
            if state.absorb_cookie(cookie.name(), cookie.value()) {
                debug!(name = cookie.name(), "captured token cookie from login response");
            }
        }

        if !state.has_auth() {
            return Err(AuthError::NoCredentialFound {
                missing: state.missing().join(", "),
            });
        }
        Ok(state)
    }
}

#[async_trait]
impl CredentialsProvider for PasswordLogin {
    async fn attach(&self, request: &mut Request) -> Result<(), AuthError> {
        self.cache.attach_with(request, || self.login()).await
    }
}

#[async_trait]
impl ResettableProvider for PasswordLogin {
    async fn reset(&self) {
        self.cache.clear().await;
        debug!(strategy = STRATEGY, "cleared cached credentials");
    }
}

impl ClientBinder for PasswordLogin {
    fn bind(&self, client: &Arc<dyn LeetCodeClient>) {
        self.client.bind(client);
    }
}

// Custom Debug impl that redacts the password.
impl fmt::Debug for PasswordLogin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordLogin")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}
