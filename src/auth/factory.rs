//! Strategy selection from configuration.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Request;

use crate::client::LeetCodeClient;
use crate::config::CredentialsConfig;
use crate::cookie_store::Browser;

use super::{
    AuthError, BrowserCookies, ClientBinder, CredentialsProvider, NoAuth, PasswordLogin,
    ResettableProvider, StaticCookies,
};

/// Which strategy a [`Credentials`] value holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialsKind {
    /// No authentication.
    None,
    /// Statically configured cookies.
    Cookies,
    /// Username/password login.
    Password,
    /// Cookies read from local browsers.
    Browser,
}

impl CredentialsKind {
    /// Returns the configuration selector for this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Cookies => "cookies",
            Self::Password => "password",
            Self::Browser => "browser",
        }
    }
}

impl fmt::Display for CredentialsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the four credential strategies.
///
/// `reset` and `bind` are forwarded to strategies that support them and are
/// no-ops for the others.
#[derive(Debug)]
pub enum Credentials {
    /// See [`NoAuth`].
    None(NoAuth),
    /// See [`StaticCookies`].
    Cookies(StaticCookies),
    /// See [`PasswordLogin`].
    Password(PasswordLogin),
    /// See [`BrowserCookies`].
    Browser(BrowserCookies),
}

impl Credentials {
    /// Builds the strategy named by `config.from`.
    ///
    /// `"browser"`, `"password"` and `"cookies"` select the matching strategy;
    /// any other value, including an empty one, selects [`NoAuth`]. An empty
    /// browser list means every supported browser.
    #[must_use]
    pub fn from_config(config: &CredentialsConfig) -> Self {
        match config.from.as_str() {
            "browser" => {
                let browsers = if config.browsers.is_empty() {
                    Browser::all().to_vec()
                } else {
                    Browser::parse_list(&config.browsers)
                };
                Self::Browser(BrowserCookies::new(browsers))
            }
            "password" => Self::Password(PasswordLogin::new(
                config.username.clone(),
                config.password.clone(),
            )),
            "cookies" => Self::Cookies(StaticCookies::new(
                config.session.clone(),
                config.csrf_token.clone(),
            )),
            _ => Self::None(NoAuth),
        }
    }

    /// Returns the strategy kind.
    #[must_use]
    pub fn kind(&self) -> CredentialsKind {
        match self {
            Self::None(_) => CredentialsKind::None,
            Self::Cookies(_) => CredentialsKind::Cookies,
            Self::Password(_) => CredentialsKind::Password,
            Self::Browser(_) => CredentialsKind::Browser,
        }
    }

    /// The reset capability, for strategies that cache acquired tokens.
    #[must_use]
    pub fn resettable(&self) -> Option<&dyn ResettableProvider> {
        match self {
            Self::Password(p) => Some(p),
            Self::Browser(b) => Some(b),
            Self::None(_) | Self::Cookies(_) => None,
        }
    }

    /// The bind capability, for strategies that acquire tokens through a client.
    #[must_use]
    pub fn binder(&self) -> Option<&dyn ClientBinder> {
        match self {
            Self::Password(p) => Some(p),
            Self::Browser(b) => Some(b),
            Self::None(_) | Self::Cookies(_) => None,
        }
    }
}

impl From<NoAuth> for Credentials {
    fn from(value: NoAuth) -> Self {
        Self::None(value)
    }
}

impl From<StaticCookies> for Credentials {
    fn from(value: StaticCookies) -> Self {
        Self::Cookies(value)
    }
}

impl From<PasswordLogin> for Credentials {
    fn from(value: PasswordLogin) -> Self {
        Self::Password(value)
    }
}

impl From<BrowserCookies> for Credentials {
    fn from(value: BrowserCookies) -> Self {
        Self::Browser(value)
    }
}

#[async_trait]
impl CredentialsProvider for Credentials {
    async fn attach(&self, request: &mut Request) -> Result<(), AuthError> {
        match self {
            Self::None(p) => p.attach(request).await,
            Self::Cookies(p) => p.attach(request).await,
            Self::Password(p) => p.attach(request).await,
            Self::Browser(p) => p.attach(request).await,
        }
    }
}

#[async_trait]
impl ResettableProvider for Credentials {
    async fn reset(&self) {
        if let Some(provider) = self.resettable() {
            provider.reset().await;
        }
    }
}

impl ClientBinder for Credentials {
    fn bind(&self, client: &Arc<dyn LeetCodeClient>) {
        if let Some(binder) = self.binder() {
            binder.bind(client);
        }
    }
}
