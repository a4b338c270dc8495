//! SQLite cookie database readers.
//!
//! Databases are opened read-only and `immutable`, so a running browser
//! holding a lock on its store does not block the read.

use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, instrument};

use super::chromium_crypto::ChromiumKeys;
use super::{Browser, CookieQuery, StoreError, StoredCookie};

/// Seconds between 1601-01-01 (Windows epoch) and 1970-01-01.
const WINDOWS_EPOCH_OFFSET_SECS: i64 = 11_644_473_600;

/// Firefox `expiry` values above this are milliseconds, not seconds.
const FIREFOX_MILLIS_THRESHOLD: i64 = 100_000_000_000;

const CHROMIUM_QUERY: &str = "SELECT host_key, name, value, expires_utc, encrypted_value \
     FROM cookies WHERE host_key LIKE ? ESCAPE '\\' AND name = ?";

const FIREFOX_QUERY: &str = "SELECT host, name, value, expiry \
     FROM moz_cookies WHERE host LIKE ? ESCAPE '\\' AND name = ?";

/// Reads matching cookies from a Chromium `Cookies` database.
///
/// Values held only in `encrypted_value` are decrypted with `keys`; rows
/// that fail to decrypt are skipped.
#[instrument(level = "debug", skip(query, keys), fields(path = %path.display()))]
pub(crate) async fn read_chromium(
    path: &Path,
    browser: &Browser,
    query: &CookieQuery,
    keys: &ChromiumKeys,
    now: i64,
) -> Result<Vec<StoredCookie>, StoreError> {
    let pool = open(path).await?;
    let rows: Vec<(String, String, String, i64, Option<Vec<u8>>)> = sqlx::query_as(CHROMIUM_QUERY)
        .bind(query.domain_like_pattern())
        .bind(&query.name)
        .fetch_all(&pool)
        .await
        .map_err(|source| database_error(path, source))?;
    pool.close().await;

    let mut cookies = Vec::new();
    for (domain, name, value, expires_utc, encrypted) in rows {
        let value = match encrypted {
            Some(encrypted) if value.is_empty() && !encrypted.is_empty() => {
                match keys.decrypt(&domain, &encrypted) {
                    Ok(value) => value,
                    Err(error) => {
                        debug!(domain = %domain, name = %name, error = %error, "skipping encrypted cookie value");
                        continue;
                    }
                }
            }
            _ => value,
        };
        let cookie = StoredCookie::new(
            browser.clone(),
            domain,
            name,
            value,
            chromium_expiry_to_unix(expires_utc),
        );
        if query.matches(&cookie, now) {
            cookies.push(cookie);
        }
    }
    Ok(cookies)
}

/// Reads matching cookies from a Firefox `cookies.sqlite` database.
#[instrument(level = "debug", skip(query), fields(path = %path.display()))]
pub(crate) async fn read_firefox(
    path: &Path,
    browser: &Browser,
    query: &CookieQuery,
    now: i64,
) -> Result<Vec<StoredCookie>, StoreError> {
    let pool = open(path).await?;
    let rows: Vec<(String, String, String, i64)> = sqlx::query_as(FIREFOX_QUERY)
        .bind(query.domain_like_pattern())
        .bind(&query.name)
        .fetch_all(&pool)
        .await
        .map_err(|source| database_error(path, source))?;
    pool.close().await;

    Ok(rows
        .into_iter()
        .map(|(domain, name, value, expiry)| {
            StoredCookie::new(browser.clone(), domain, name, value, firefox_expiry_to_unix(expiry))
        })
        .filter(|cookie| query.matches(cookie, now))
        .collect())
}

async fn open(path: &Path) -> Result<SqlitePool, StoreError> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .read_only(true)
        .immutable(true);
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .map_err(|source| database_error(path, source))
}

fn database_error(path: &Path, source: sqlx::Error) -> StoreError {
    StoreError::Database {
        path: path.to_path_buf(),
        source,
    }
}

/// Converts Chromium's `expires_utc` (microseconds since 1601) to Unix
/// seconds. `0` marks a session cookie.
fn chromium_expiry_to_unix(expires_utc: i64) -> Option<i64> {
    (expires_utc > 0).then(|| expires_utc / 1_000_000 - WINDOWS_EPOCH_OFFSET_SECS)
}

/// Converts Firefox's `expiry` to Unix seconds. Newer profiles store
/// milliseconds.
fn firefox_expiry_to_unix(expiry: i64) -> Option<i64> {
    match expiry {
        e if e <= 0 => None,
        e if e > FIREFOX_MILLIS_THRESHOLD => Some(e / 1000),
        e => Some(e),
    }
}
