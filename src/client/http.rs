//! reqwest-backed LeetCode client.
//!
//! The client owns its [`Credentials`] and binds itself to them on
//! construction (the credentials only keep a weak reference back), so the
//! password and browser strategies can log in through it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{COOKIE, ORIGIN, REFERER};
use reqwest::{Client, Method, Request, Response, StatusCode, redirect};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::auth::{
    CSRF_COOKIE, CSRF_HEADER, ClientBinder, Credentials, CredentialsProvider, ResettableProvider,
};

use super::{ClientError, LeetCodeClient, LoginResponse, RequestError, ResponseCookie};

/// Connect timeout for all requests.
pub const CONNECT_TIMEOUT_SECS: u64 = 10;
/// Overall per-request timeout.
pub const READ_TIMEOUT_SECS: u64 = 30;
/// User-Agent sent with every request.
pub const USER_AGENT: &str = concat!("leetcode-auth/", env!("CARGO_PKG_VERSION"));

const LOGIN_PATH: &str = "/accounts/login/";

/// HTTP client for the LeetCode web service.
///
/// Redirects are not followed, so the `Set-Cookie` headers of the login
/// response (a redirect on success) stay visible.
#[derive(Debug)]
pub struct HttpLeetCodeClient {
    client: Client,
    base_uri: String,
    credentials: Arc<Credentials>,
}

impl HttpLeetCodeClient {
    /// Creates a client for `base_uri` with default timeouts and binds it to
    /// `credentials`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidUrl`] for a base URI without a host, or
    /// [`ClientError::Build`] when the HTTP client cannot be built.
    pub fn new(
        base_uri: impl Into<String>,
        credentials: Arc<Credentials>,
    ) -> Result<Arc<Self>, ClientError> {
        Self::with_timeouts(
            base_uri,
            credentials,
            CONNECT_TIMEOUT_SECS,
            READ_TIMEOUT_SECS,
        )
    }

    /// Creates a client with explicit timeout values.
    ///
    /// # Errors
    ///
    /// See [`HttpLeetCodeClient::new`].
    pub fn with_timeouts(
        base_uri: impl Into<String>,
        credentials: Arc<Credentials>,
        connect_timeout_secs: u64,
        read_timeout_secs: u64,
    ) -> Result<Arc<Self>, ClientError> {
        let base_uri = base_uri.into().trim_end_matches('/').to_string();
        let parsed = Url::parse(&base_uri).map_err(|_| ClientError::InvalidUrl {
            url: base_uri.clone(),
        })?;
        if parsed.host_str().is_none() {
            return Err(ClientError::InvalidUrl { url: base_uri });
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(read_timeout_secs))
            .user_agent(USER_AGENT)
            .redirect(redirect::Policy::none())
            .gzip(true)
            .build()
            .map_err(ClientError::Build)?;

        let this = Arc::new(Self {
            client,
            base_uri,
            credentials,
        });
        let bound: Arc<dyn LeetCodeClient> = this.clone();
        this.credentials.bind(&bound);
        debug!(
            base_uri = %this.base_uri,
            strategy = %this.credentials.kind(),
            "created LeetCode client"
        );
        Ok(this)
    }

    /// Credentials attached to executed requests.
    #[must_use]
    pub fn credentials(&self) -> &Arc<Credentials> {
        &self.credentials
    }

    /// Builds an unauthenticated request for `path` relative to the base URI.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidUrl`] if the joined URL does not parse.
    pub fn request(&self, method: Method, path: &str) -> Result<Request, ClientError> {
        let url = self.url(path);
        let parsed = Url::parse(&url).map_err(|_| ClientError::InvalidUrl { url })?;
        Ok(Request::new(method, parsed))
    }

    /// Attaches credentials to `request` and sends it.
    ///
    /// A 401/403 answer resets the credentials so the next call acquires
    /// fresh tokens, and is reported as [`ClientError::SessionExpired`].
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Credentials`] when credentials cannot be
    /// attached, or [`RequestError::Client`] when sending fails.
    #[instrument(level = "debug", skip(self, request), fields(url = %request.url()))]
    pub async fn execute(&self, mut request: Request) -> Result<Response, RequestError> {
        self.credentials.attach(&mut request).await?;

        let url = request.url().to_string();
        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| ClientError::network(&url, e))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!(
                url = %url,
                status = status.as_u16(),
                "credentials rejected; clearing cached session"
            );
            self.credentials.reset().await;
            return Err(ClientError::SessionExpired {
                url,
                status: status.as_u16(),
            }
            .into());
        }

        Ok(response)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_uri, path.trim_start_matches('/'))
    }

    /// Fetches the login page to obtain a pre-login CSRF cookie.
    async fn fetch_login_csrf(&self, login_url: &str) -> Result<Option<ResponseCookie>, ClientError> {
        let response = self
            .client
            .get(login_url)
            .send()
            .await
            .map_err(|e| ClientError::network(login_url, e))?;
        check_status(login_url, response.status())?;

        Ok(set_cookies(&response)
            .cookies()
            .iter()
            .find(|cookie| cookie.name() == CSRF_COOKIE && !cookie.value().is_empty())
            .cloned())
    }
}

#[async_trait]
impl LeetCodeClient for HttpLeetCodeClient {
    #[instrument(level = "debug", skip(self, password))]
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ClientError> {
        let login_url = self.url(LOGIN_PATH);

        let csrf = self.fetch_login_csrf(&login_url).await?;
        let csrf_value = csrf.as_ref().map_or("", ResponseCookie::value);
        if csrf.is_none() {
            debug!("login page set no csrftoken; posting without one");
        }

        let response = self
            .client
            .post(&login_url)
            .header(REFERER, &login_url)
            .header(ORIGIN, &self.base_uri)
            .header(CSRF_HEADER, csrf_value)
            .header(COOKIE, format!("{CSRF_COOKIE}={csrf_value}"))
            .form(&[
                ("csrfmiddlewaretoken", csrf_value),
                ("login", username),
                ("password", password),
                ("next", "/"),
            ])
            .send()
            .await
            .map_err(|e| ClientError::network(&login_url, e))?;

        let status = response.status();
        check_status(&login_url, status)?;

        // The pre-login csrftoken comes first so a rotated one from the login
        // response replaces it.
        let login = set_cookies(&response);
        let cookies = csrf.into_iter().chain(login.cookies().iter().cloned()).collect();
        info!(status = status.as_u16(), "login request completed");
        Ok(LoginResponse::new(status.as_u16(), cookies))
    }

    fn base_uri(&self) -> String {
        self.base_uri.clone()
    }
}

fn check_status(url: &str, status: StatusCode) -> Result<(), ClientError> {
    if status.is_client_error() || status.is_server_error() {
        return Err(ClientError::http_status(url, status.as_u16()));
    }
    Ok(())
}

/// Cookies set by `response`, in header order. Malformed `Set-Cookie`
/// headers are skipped.
fn set_cookies(response: &Response) -> LoginResponse {
    let cookies = response
        .cookies()
        .map(|cookie| ResponseCookie::new(cookie.name(), cookie.value()))
        .collect();
    LoginResponse::new(response.status().as_u16(), cookies)
}
