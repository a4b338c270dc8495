//! Credential strategies and the capabilities they expose.
//!
//! Every strategy can [`attach`](CredentialsProvider::attach) credentials to a
//! request. Strategies that acquire tokens lazily also support
//! [`reset`](ResettableProvider::reset) (drop cached tokens, e.g. after the
//! service reports an expired session) and [`bind`](ClientBinder::bind) (set
//! the client they log in through).
//!
//! | Strategy           | attach | reset | bind |
//! |--------------------|--------|-------|------|
//! | [`NoAuth`]         | yes    |       |      |
//! | [`StaticCookies`]  | yes    |       |      |
//! | [`PasswordLogin`]  | yes    | yes   | yes  |
//! | [`BrowserCookies`] | yes    | yes   | yes  |
//!
//! [`Credentials`] wraps all four so callers can hold whichever one the
//! configuration selects.

mod binding;
mod browser;
mod cache;
mod error;
mod factory;
mod no_auth;
mod password;
mod state;
mod static_cookies;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Request;

use crate::client::LeetCodeClient;

pub use browser::BrowserCookies;
pub use error::AuthError;
pub use factory::{Credentials, CredentialsKind};
pub use no_auth::NoAuth;
pub use password::PasswordLogin;
pub use state::{AuthState, CSRF_COOKIE, CSRF_HEADER, SESSION_COOKIE};
pub use static_cookies::StaticCookies;

/// Attaches credentials to outbound requests.
#[async_trait]
pub trait CredentialsProvider: Send + Sync {
    /// Adds the session cookie, CSRF cookie and CSRF header to `request`,
    /// acquiring tokens first if the strategy needs to.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when tokens cannot be acquired or attached. The
    /// request is left unmodified on error.
    async fn attach(&self, request: &mut Request) -> Result<(), AuthError>;
}

/// Drops cached credentials so the next attach acquires them again.
#[async_trait]
pub trait ResettableProvider: Send + Sync {
    /// Clears cached tokens. Idempotent.
    async fn reset(&self);
}

/// Accepts the client a strategy acquires tokens through.
pub trait ClientBinder: Send + Sync {
    /// Binds `client`. Only a weak reference is kept.
    fn bind(&self, client: &Arc<dyn LeetCodeClient>);
}
