//! LeetCode credential acquisition and request authentication.
//!
//! This library decides how a LeetCode client obtains its session token and
//! CSRF token, and attaches both to outbound requests.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`auth`] - Credential strategies (none, static cookies, password login,
//!   browser cookies) and the factory that selects one from configuration
//! - [`client`] - The client capability the dynamic strategies log in through,
//!   plus a reqwest-backed implementation
//! - [`cookie_store`] - Read-only access to local browser cookie stores
//! - [`config`] - Credential configuration loading and validation

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod client;
pub mod config;
pub mod cookie_store;

// Re-export commonly used types
pub use auth::{
    AuthError, AuthState, BrowserCookies, ClientBinder, Credentials, CredentialsKind,
    CredentialsProvider, NoAuth, PasswordLogin, ResettableProvider, StaticCookies,
};
pub use client::{
    ClientError, HttpLeetCodeClient, LeetCodeClient, LoginResponse, RequestError, ResponseCookie,
    base_uri_for_site,
};
pub use config::{CredentialsConfig, FileConfig};
pub use cookie_store::{
    Browser, CookieQuery, CookieStoreReader, LocalCookieStore, StoredCookie,
};
