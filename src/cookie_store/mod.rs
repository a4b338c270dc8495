//! Read-only access to local browser cookie stores.
//!
//! Browsers keep the cookies of sites the user is logged into on disk. This
//! module queries those stores by name, domain and validity without
//! launching the browser:
//! - Chromium family (Chrome, Edge, Chromium): SQLite `Cookies` database,
//!   with encrypted values decrypted using the browser's OS-protected key
//! - Firefox: SQLite `cookies.sqlite` database
//! - Netscape `cookies.txt` exports (`file:<path>` entries)

mod chromium_crypto;
mod netscape;
mod profiles;
mod sqlite;

pub use chromium_crypto::SAFE_STORAGE_ENV;
pub use netscape::{CookieFileError, ParseResult, parse_netscape_cookies};
pub use profiles::ProfileRoots;

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use chromium_crypto::ChromiumKeys;

/// A browser whose cookie store can be queried.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Browser {
    /// Google Chrome.
    Chrome,
    /// Microsoft Edge.
    Edge,
    /// Chromium.
    Chromium,
    /// Mozilla Firefox.
    Firefox,
    /// A Netscape-format cookie file exported from any browser.
    CookieFile(PathBuf),
}

static ALL_BROWSERS: [Browser; 4] = [
    Browser::Chrome,
    Browser::Edge,
    Browser::Chromium,
    Browser::Firefox,
];

impl Browser {
    /// Every installed-browser store, in default priority order.
    #[must_use]
    pub fn all() -> &'static [Browser] {
        &ALL_BROWSERS
    }

    /// Parses a configured browser name (case-insensitive) or a
    /// `file:<path>` cookie file entry.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        if let Some(path) = name.strip_prefix("file:") {
            return (!path.is_empty()).then(|| Self::CookieFile(PathBuf::from(path)));
        }
        match name.to_ascii_lowercase().as_str() {
            "chrome" | "google-chrome" => Some(Self::Chrome),
            "edge" | "msedge" | "microsoft-edge" => Some(Self::Edge),
            "chromium" => Some(Self::Chromium),
            "firefox" => Some(Self::Firefox),
            _ => None,
        }
    }

    /// Parses a configured list, keeping order, dropping duplicates and
    /// skipping unknown names with a warning.
    #[must_use]
    pub fn parse_list<S: AsRef<str>>(names: &[S]) -> Vec<Self> {
        let mut browsers = Vec::new();
        for name in names {
            match Self::parse(name.as_ref()) {
                Some(browser) if !browsers.contains(&browser) => browsers.push(browser),
                Some(_) => {}
                None => warn!(browser = name.as_ref(), "ignoring unsupported browser"),
            }
        }
        browsers
    }

    fn is_chromium_family(&self) -> bool {
        matches!(self, Self::Chrome | Self::Edge | Self::Chromium)
    }
}

impl fmt::Display for Browser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chrome => f.write_str("chrome"),
            Self::Edge => f.write_str("edge"),
            Self::Chromium => f.write_str("chromium"),
            Self::Firefox => f.write_str("firefox"),
            Self::CookieFile(path) => write!(f, "file:{}", path.display()),
        }
    }
}

/// A cookie read from a browser store.
///
/// The value is redacted in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct StoredCookie {
    /// Store the cookie was read from.
    pub browser: Browser,
    /// Cookie domain as stored (e.g. `.leetcode.com`).
    pub domain: String,
    /// Cookie name.
    pub name: String,
    /// Expiry as Unix seconds; `None` for session cookies.
    pub expires: Option<i64>,
    value: String,
}

impl StoredCookie {
    /// Creates a cookie record.
    #[must_use]
    pub fn new(
        browser: Browser,
        domain: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
        expires: Option<i64>,
    ) -> Self {
        Self {
            browser,
            domain: domain.into(),
            name: name.into(),
            expires,
            value: value.into(),
        }
    }

    /// Cookie value (sensitive, never log).
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Debug for StoredCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredCookie")
            .field("browser", &self.browser)
            .field("domain", &self.domain)
            .field("name", &self.name)
            .field("expires", &self.expires)
            .field("value", &"[REDACTED]")
            .finish()
    }
}

/// Filter applied to cookie store reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieQuery {
    /// Substring the cookie domain must contain.
    pub domain_contains: String,
    /// Exact cookie name.
    pub name: String,
    /// Only return cookies that have not expired.
    pub valid_only: bool,
}

impl CookieQuery {
    /// Query for unexpired cookies named `name` whose domain contains `domain`.
    #[must_use]
    pub fn valid(domain: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            domain_contains: domain.into(),
            name: name.into(),
            valid_only: true,
        }
    }

    /// Whether `cookie` satisfies the query at Unix time `now`.
    #[must_use]
    pub fn matches(&self, cookie: &StoredCookie, now: i64) -> bool {
        cookie.name == self.name
            && cookie.domain.contains(self.domain_contains.as_str())
            && (!self.valid_only || cookie.expires.is_none_or(|expires| expires > now))
    }

    /// SQL `LIKE` pattern for the domain filter (escape character `\`).
    fn domain_like_pattern(&self) -> String {
        let mut pattern = String::from("%");
        for ch in self.domain_contains.chars() {
            if matches!(ch, '%' | '_' | '\\') {
                pattern.push('\\');
            }
            pattern.push(ch);
        }
        pattern.push('%');
        pattern
    }
}

/// Errors reading a single browser's cookie store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The browser has no cookie store on this machine.
    #[error("no cookie store found for {browser}")]
    NotFound {
        /// Browser label.
        browser: String,
    },

    /// A cookie database could not be opened or queried.
    #[error("failed to read cookie database {}: {source}", path.display())]
    Database {
        /// Database path.
        path: PathBuf,
        /// The underlying sqlx error.
        #[source]
        source: sqlx::Error,
    },

    /// A cookie file could not be read or parsed.
    #[error(transparent)]
    CookieFile(#[from] CookieFileError),
}

/// Queries browser cookie stores.
#[async_trait]
pub trait CookieStoreReader: Send + Sync + fmt::Debug {
    /// Returns the cookies matching `query` from each of `browsers`, in
    /// browser order. Stores that cannot be read contribute nothing.
    async fn read_cookies(&self, browsers: &[Browser], query: &CookieQuery) -> Vec<StoredCookie>;
}

/// Reads the cookie stores of browsers installed for the current user.
///
/// Chromium decryption keys are loaded once per browser and shared by
/// clones of the store.
#[derive(Debug, Clone, Default)]
pub struct LocalCookieStore {
    roots: ProfileRoots,
    chromium_keys: Arc<Mutex<HashMap<Browser, Arc<ChromiumKeys>>>>,
}

impl LocalCookieStore {
    /// Locates browser profiles from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::with_roots(ProfileRoots::from_env())
    }

    /// Locates browser profiles under explicit roots.
    #[must_use]
    pub fn with_roots(roots: ProfileRoots) -> Self {
        Self {
            roots,
            chromium_keys: Arc::default(),
        }
    }

    /// Reads matching cookies from one browser's store(s).
    ///
    /// A profile database that cannot be read is logged and skipped, so it
    /// never hides matches in the browser's other profiles.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the browser has no store, the
    /// cookie file's error for `file:` entries, and the last database error
    /// when every database of the browser failed.
    pub async fn read_browser(
        &self,
        browser: &Browser,
        query: &CookieQuery,
        now: i64,
    ) -> Result<Vec<StoredCookie>, StoreError> {
        if let Browser::CookieFile(path) = browser {
            return netscape::read_cookie_file(path, browser, query, now).await;
        }

        let databases = if browser.is_chromium_family() {
            self.roots.chromium_cookie_databases(browser)
        } else {
            self.roots.firefox_cookie_databases()
        };
        if databases.is_empty() {
            return Err(StoreError::NotFound {
                browser: browser.to_string(),
            });
        }

        let mut cookies = Vec::new();
        let mut last_error = None;
        let mut any_read = false;
        for database in &databases {
            match self.read_database(browser, database, query, now).await {
                Ok(found) => {
                    any_read = true;
                    cookies.extend(found);
                }
                Err(error) => {
                    warn!(
                        browser = %browser,
                        path = %database.display(),
                        error = %error,
                        "skipping unreadable cookie database"
                    );
                    last_error = Some(error);
                }
            }
        }

        match last_error {
            Some(error) if !any_read => Err(error),
            _ => Ok(cookies),
        }
    }

    async fn read_database(
        &self,
        browser: &Browser,
        database: &Path,
        query: &CookieQuery,
        now: i64,
    ) -> Result<Vec<StoredCookie>, StoreError> {
        if browser.is_chromium_family() {
            let keys = self.chromium_keys(browser).await;
            sqlite::read_chromium(database, browser, query, &keys, now).await
        } else {
            sqlite::read_firefox(database, browser, query, now).await
        }
    }

    /// Keys for `browser`, loaded from the OS on first use.
    async fn chromium_keys(&self, browser: &Browser) -> Arc<ChromiumKeys> {
        let mut cache = self.chromium_keys.lock().await;
        if let Some(keys) = cache.get(browser) {
            return Arc::clone(keys);
        }

        let keys = match self.roots.chromium_user_data_dir(browser) {
            Some(user_data) => {
                let owned = browser.clone();
                tokio::task::spawn_blocking(move || ChromiumKeys::load(&owned, &user_data))
                    .await
                    .unwrap_or_default()
            }
            None => ChromiumKeys::default(),
        };
        debug!(browser = %browser, keys = ?keys, "loaded chromium cookie keys");
        let keys = Arc::new(keys);
        cache.insert(browser.clone(), Arc::clone(&keys));
        keys
    }
}

#[async_trait]
impl CookieStoreReader for LocalCookieStore {
    async fn read_cookies(&self, browsers: &[Browser], query: &CookieQuery) -> Vec<StoredCookie> {
        let now = unix_now();
        let mut found = Vec::new();
        for browser in browsers {
            match self.read_browser(browser, query, now).await {
                Ok(cookies) => {
                    debug!(
                        browser = %browser,
                        name = %query.name,
                        count = cookies.len(),
                        "read browser cookies"
                    );
                    found.extend(cookies);
                }
                Err(StoreError::NotFound { browser }) => {
                    debug!(browser = %browser, "browser cookie store not present");
                }
                Err(error) => {
                    warn!(browser = %browser, error = %error, "skipping unreadable cookie store");
                }
            }
        }
        found
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| i64::try_from(duration.as_secs()).unwrap_or(i64::MAX))
}
