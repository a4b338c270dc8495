//! Error types for the LeetCode HTTP client.

use thiserror::Error;

use crate::auth::AuthError;

/// Errors raised by [`LeetCodeClient`](super::LeetCodeClient) implementations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network-level failure (DNS, connect, TLS, timeout, ...).
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The URL that was requested.
        url: String,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with a 4xx/5xx status.
    #[error("HTTP {status} from {url}")]
    HttpStatus {
        /// The URL that was requested.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The service rejected the attached credentials (HTTP 401/403).
    ///
    /// The client's credentials have already been reset when this is returned.
    #[error("session expired or rejected (HTTP {status}) requesting {url}")]
    SessionExpired {
        /// The URL that was requested.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// A base URI or derived URL could not be parsed.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
}

impl ClientError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }
}

/// Errors from [`HttpLeetCodeClient::execute`](super::HttpLeetCodeClient::execute).
#[derive(Debug, Error)]
pub enum RequestError {
    /// Credentials could not be attached.
    #[error(transparent)]
    Credentials(#[from] AuthError),

    /// The request itself failed.
    #[error(transparent)]
    Client(#[from] ClientError),
}
