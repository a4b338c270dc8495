//! The client capability that credential strategies acquire tokens through.
//!
//! - [`LeetCodeClient`] - what a strategy needs from a client: a login call
//!   and the base URI whose host is the auth domain
//! - [`HttpLeetCodeClient`] - reqwest implementation that also attaches
//!   credentials to the requests it executes

mod error;
mod http;

pub use error::{ClientError, RequestError};
pub use http::{HttpLeetCodeClient, USER_AGENT};

use std::fmt;

use async_trait::async_trait;

/// Base URI of leetcode.com.
pub const US_BASE_URI: &str = "https://leetcode.com";
/// Base URI of leetcode.cn.
pub const CN_BASE_URI: &str = "https://leetcode.cn";

/// Login and base-URI access used by the dynamic credential strategies.
#[async_trait]
pub trait LeetCodeClient: Send + Sync {
    /// Logs in and returns the cookies the service set.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the login request fails or is rejected.
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ClientError>;

    /// Absolute base URI of the service; its host is the auth domain.
    fn base_uri(&self) -> String;
}

/// A cookie set by a response.
///
/// The value is redacted in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct ResponseCookie {
    name: String,
    value: String,
}

impl ResponseCookie {
    /// Creates a cookie from its name and value.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Cookie name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cookie value (sensitive, never log).
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Debug for ResponseCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseCookie")
            .field("name", &self.name)
            .field("value", &"[REDACTED]")
            .finish()
    }
}

/// Outcome of a successful login call.
#[derive(Debug, Clone)]
pub struct LoginResponse {
    status: u16,
    cookies: Vec<ResponseCookie>,
}

impl LoginResponse {
    /// Creates a response from its status and the cookies it set.
    #[must_use]
    pub fn new(status: u16, cookies: Vec<ResponseCookie>) -> Self {
        Self { status, cookies }
    }

    /// HTTP status of the login response.
    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Cookies set by the login response, in header order.
    #[must_use]
    pub fn cookies(&self) -> &[ResponseCookie] {
        &self.cookies
    }
}

/// Resolves a configured site to a base URI.
///
/// `"us"` (or empty) and `"cn"` map to the two LeetCode sites; any absolute
/// `http(s)` URL is used as-is with trailing slashes removed.
///
/// # Errors
///
/// Returns [`ClientError::InvalidUrl`] for anything else.
pub fn base_uri_for_site(site: &str) -> Result<String, ClientError> {
    match site.trim() {
        "" | "us" => Ok(US_BASE_URI.to_string()),
        "cn" => Ok(CN_BASE_URI.to_string()),
        other => {
            let parsed = url::Url::parse(other).map_err(|_| ClientError::InvalidUrl {
                url: other.to_string(),
            })?;
            if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
                return Err(ClientError::InvalidUrl {
                    url: other.to_string(),
                });
            }
            Ok(other.trim_end_matches('/').to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_response_keeps_cookie_order() {
        let response = LoginResponse::new(
            302,
            vec![
                ResponseCookie::new("csrftoken", "c1"),
                ResponseCookie::new("LEETCODE_SESSION", "s1"),
            ],
        );
        assert_eq!(response.status(), 302);
        let names: Vec<_> = response.cookies().iter().map(ResponseCookie::name).collect();
        assert_eq!(names, vec!["csrftoken", "LEETCODE_SESSION"]);
    }

    #[test]
    fn test_response_cookie_debug_redacts_value() {
        let debug = format!("{:?}", ResponseCookie::new("LEETCODE_SESSION", "secret-token"));
        assert!(debug.contains("LEETCODE_SESSION"));
        assert!(!debug.contains("secret-token"));
    }

    #[test]
    fn test_base_uri_for_site() {
        assert_eq!(base_uri_for_site("").unwrap(), US_BASE_URI);
        assert_eq!(base_uri_for_site("us").unwrap(), US_BASE_URI);
        assert_eq!(base_uri_for_site("cn").unwrap(), CN_BASE_URI);
        assert_eq!(
            base_uri_for_site("http://127.0.0.1:9000/").unwrap(),
            "http://127.0.0.1:9000"
        );
        assert!(base_uri_for_site("jp").is_err());
        assert!(base_uri_for_site("ftp://leetcode.com").is_err());
    }
}
