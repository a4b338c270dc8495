//! Error types for credential acquisition and attachment.

use thiserror::Error;

use crate::client::ClientError;

/// Errors returned by [`CredentialsProvider::attach`](super::CredentialsProvider::attach).
///
/// Every failure leaves the outbound request untouched and the strategy's
/// cached tokens empty, so the next attach call starts acquisition over.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The login call itself failed; the client error is surfaced unchanged.
    #[error(transparent)]
    LoginFailed(#[from] ClientError),

    /// Login succeeded but the response did not set both token cookies.
    #[error("no credential found in login response (missing {missing})")]
    NoCredentialFound {
        /// Comma-separated names of the cookies that were absent.
        missing: String,
    },

    /// No valid cookie with the given name was found in the queried browsers.
    #[error("no cookie named {name} found for {domain} in browsers [{browsers}]")]
    BrowserCookieNotFound {
        /// Cookie name that was looked up.
        name: &'static str,
        /// Auth domain the lookup was scoped to.
        domain: String,
        /// Browsers that were queried, in order.
        browsers: String,
    },

    /// Acquisition needed a client, but none is bound (or it was dropped).
    #[error("{strategy} credentials have no bound client")]
    ClientUnbound {
        /// Strategy label (`password` or `browser`).
        strategy: &'static str,
    },

    /// The client's base URI has no host to scope browser cookies to.
    #[error("invalid base URI '{uri}': no host to read browser cookies for")]
    InvalidBaseUri {
        /// The offending base URI.
        uri: String,
    },

    /// A token contains bytes that cannot be sent in an HTTP header.
    #[error("{name} token cannot be sent as an HTTP header value")]
    InvalidToken {
        /// Which token was rejected (`LEETCODE_SESSION` or `csrftoken`).
        name: &'static str,
    },
}
