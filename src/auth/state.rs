//! The cached session/CSRF token pair and the shared attach logic.

use std::fmt;

use reqwest::Request;
use reqwest::header::{COOKIE, HeaderName, HeaderValue};

use super::AuthError;

/// Cookie carrying the session token.
pub const SESSION_COOKIE: &str = "LEETCODE_SESSION";
/// Cookie carrying the CSRF token.
pub const CSRF_COOKIE: &str = "csrftoken";
/// Header carrying the CSRF token (the service checks cookie and header).
pub const CSRF_HEADER: &str = "x-csrftoken";

/// A session token and CSRF token pair.
///
/// Values are redacted in `Debug` output.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    session: String,
    csrf_token: String,
}

impl AuthState {
    /// Creates a state from both token values.
    #[must_use]
    pub fn new(session: impl Into<String>, csrf_token: impl Into<String>) -> Self {
        Self {
            session: session.into(),
            csrf_token: csrf_token.into(),
        }
    }

    /// Returns the session token (sensitive, never log).
    #[must_use]
    pub fn session(&self) -> &str {
        &self.session
    }

    /// Returns the CSRF token (sensitive, never log).
    #[must_use]
    pub fn csrf_token(&self) -> &str {
        &self.csrf_token
    }

    /// True iff both tokens are non-empty.
    #[must_use]
    pub fn has_auth(&self) -> bool {
        !self.session.is_empty() && !self.csrf_token.is_empty()
    }

    /// Clears both tokens.
    pub fn clear(&mut self) {
        self.session.clear();
        self.csrf_token.clear();
    }

    /// Stores `value` if `name` is one of the two token cookie names.
    ///
    /// Returns whether the cookie was recognized. Later cookies with the same
    /// name overwrite earlier ones.
    pub fn absorb_cookie(&mut self, name: &str, value: &str) -> bool {
        match name {
            SESSION_COOKIE => self.session = value.to_string(),
            CSRF_COOKIE => self.csrf_token = value.to_string(),
            _ => return false,
        }
        true
    }

    /// Names of the token cookies that are still empty.
    #[must_use]
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.session.is_empty() {
            missing.push(SESSION_COOKIE);
        }
        if self.csrf_token.is_empty() {
            missing.push(CSRF_COOKIE);
        }
        missing
    }

    /// Checks that both tokens can be sent as cookie values.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidToken`] naming the first token that
    /// contains bytes outside the cookie value grammar.
    pub fn validate(&self) -> Result<(), AuthError> {
        cookie_octets(SESSION_COOKIE, &self.session)?;
        cookie_octets(CSRF_COOKIE, &self.csrf_token)?;
        Ok(())
    }

    /// Writes the session cookie, the CSRF cookie and the CSRF header onto `request`.
    ///
    /// Cookie pairs are appended to any `Cookie` header already present.
    /// Both tokens are validated before the request is touched, so on error
    /// the request is unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidToken`] when a token contains bytes that
    /// are not valid in a cookie value.
    pub fn attach_to(&self, request: &mut Request) -> Result<(), AuthError> {
        let session = cookie_octets(SESSION_COOKIE, &self.session)?;
        let csrf_token = cookie_octets(CSRF_COOKIE, &self.csrf_token)?;

        let mut cookie = request
            .headers()
            .get(COOKIE)
            .map(|existing| existing.as_bytes().to_vec())
            .unwrap_or_default();
        if !cookie.is_empty() {
            cookie.extend_from_slice(b"; ");
        }
        cookie.extend_from_slice(
            format!("{SESSION_COOKIE}={session}; {CSRF_COOKIE}={csrf_token}").as_bytes(),
        );

        let cookie = HeaderValue::from_bytes(&cookie).map_err(|_| AuthError::InvalidToken {
            name: SESSION_COOKIE,
        })?;
        let csrf_header =
            HeaderValue::from_str(csrf_token).map_err(|_| AuthError::InvalidToken {
                name: CSRF_COOKIE,
            })?;

        let headers = request.headers_mut();
        headers.insert(COOKIE, cookie);
        headers.append(HeaderName::from_static(CSRF_HEADER), csrf_header);
        Ok(())
    }
}

// Custom Debug impl that redacts token values.
impl fmt::Debug for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthState")
            .field("session", &redacted(&self.session))
            .field("csrf_token", &redacted(&self.csrf_token))
            .finish()
    }
}

fn redacted(value: &str) -> &'static str {
    if value.is_empty() { "" } else { "[REDACTED]" }
}

/// Checks `value` against the RFC 6265 `cookie-value` grammar: cookie octets,
/// optionally wrapped in one pair of double quotes.
fn cookie_octets<'a>(name: &'static str, value: &'a str) -> Result<&'a str, AuthError> {
    let octets = value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(value);
    let valid = octets
        .bytes()
        .all(|b| matches!(b, 0x21 | 0x23..=0x2B | 0x2D..=0x3A | 0x3C..=0x5B | 0x5D..=0x7E));
    if valid {
        Ok(value)
    } else {
        Err(AuthError::InvalidToken { name })
    }
}
