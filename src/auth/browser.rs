//! Strategy that reuses the session of a locally logged-in browser.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Request;
use tracing::{debug, info, instrument};
use url::Url;

use crate::client::LeetCodeClient;
use crate::cookie_store::{Browser, CookieQuery, CookieStoreReader, LocalCookieStore};

use super::binding::ClientSlot;
use super::cache::TokenCache;
use super::{
    AuthError, AuthState, CSRF_COOKIE, ClientBinder, CredentialsProvider, ResettableProvider,
    SESSION_COOKIE,
};

const STRATEGY: &str = "browser";

/// Strategy that reads the token cookies from local browser cookie stores.
///
/// The auth domain is the host of the bound client's base URI. Only
/// unexpired, non-empty cookies count; when several browsers hold a match,
/// the first browser in the configured order wins.
#[derive(Debug)]
pub struct BrowserCookies {
    browsers: Vec<Browser>,
    store: Arc<dyn CookieStoreReader>,
    cache: TokenCache,
    client: ClientSlot,
}

impl BrowserCookies {
    /// Creates the strategy over the local cookie stores of `browsers`.
    #[must_use]
    pub fn new(browsers: Vec<Browser>) -> Self {
        Self::with_store(browsers, Arc::new(LocalCookieStore::from_env()))
    }

    /// Creates the strategy over a custom cookie store reader.
    #[must_use]
    pub fn with_store(browsers: Vec<Browser>, store: Arc<dyn CookieStoreReader>) -> Self {
        Self {
            browsers,
            store,
            cache: TokenCache::default(),
            client: ClientSlot::default(),
        }
    }

    /// Browsers queried, in priority order.
    #[must_use]
    pub fn browsers(&self) -> &[Browser] {
        &self.browsers
    }

    /// Whether a token pair is currently cached.
    pub async fn is_authenticated(&self) -> bool {
        self.cache.is_populated().await
    }

    #[instrument(level = "debug", skip(self))]
    async fn extract(&self) -> Result<AuthState, AuthError> {
        let client = self.client.get(STRATEGY)?;
        let domain = auth_domain(&client.base_uri())?;
        let browsers = browser_list(&self.browsers);
        info!(browsers = %browsers, domain = %domain, "reading credentials from browser");

        let session = self
            .store
            .read_cookies(&self.browsers, &CookieQuery::valid(&domain, SESSION_COOKIE))
            .await;
        let csrf_token = self
            .store
            .read_cookies(&self.browsers, &CookieQuery::valid(&domain, CSRF_COOKIE))
            .await;

        let not_found = |name| AuthError::BrowserCookieNotFound {
            name,
            domain: domain.clone(),
            browsers: browsers.clone(),
        };
        let session = session
            .into_iter()
            .find(|cookie| !cookie.value().is_empty())
            .ok_or_else(|| not_found(SESSION_COOKIE))?;
        let csrf_token = csrf_token
            .into_iter()
            .find(|cookie| !cookie.value().is_empty())
            .ok_or_else(|| not_found(CSRF_COOKIE))?;

        debug!(
            session_browser = %session.browser,
            csrf_browser = %csrf_token.browser,
            "found browser credentials"
        );
        Ok(AuthState::new(session.value(), csrf_token.value()))
    }
}

#[async_trait]
impl CredentialsProvider for BrowserCookies {
    async fn attach(&self, request: &mut Request) -> Result<(), AuthError> {
        self.cache.attach_with(request, || self.extract()).await
    }
}

#[async_trait]
impl ResettableProvider for BrowserCookies {
    async fn reset(&self) {
        self.cache.clear().await;
        debug!(strategy = STRATEGY, "cleared cached credentials");
    }
}

impl ClientBinder for BrowserCookies {
    fn bind(&self, client: &Arc<dyn LeetCodeClient>) {
        self.client.bind(client);
    }
}

/// Host portion of the base URI, which scopes the cookie lookup.
fn auth_domain(base_uri: &str) -> Result<String, AuthError> {
    Url::parse(base_uri)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .ok_or_else(|| AuthError::InvalidBaseUri {
            uri: base_uri.to_string(),
        })
}

fn browser_list(browsers: &[Browser]) -> String {
    browsers
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::CSRF_HEADER;
    use crate::client::{ClientError, LoginResponse};
    use crate::cookie_store::StoredCookie;
    use reqwest::Method;
    use reqwest::header::COOKIE;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedClient(&'static str);

    #[async_trait]
    impl LeetCodeClient for FixedClient {
        async fn login(&self, _: &str, _: &str) -> Result<LoginResponse, ClientError> {
            Ok(LoginResponse::new(200, Vec::new()))
        }

        fn base_uri(&self) -> String {
            self.0.to_string()
        }
    }

    /// In-memory store that applies the query like a real store would.
    #[derive(Debug, Default)]
    struct MemoryStore {
        cookies: Vec<StoredCookie>,
        reads: AtomicUsize,
        queries: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl CookieStoreReader for MemoryStore {
        async fn read_cookies(&self, browsers: &[Browser], query: &CookieQuery) -> Vec<StoredCookie> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.queries
                .lock()
                .unwrap()
                .push((query.domain_contains.clone(), query.name.clone()));
            browsers
                .iter()
                .flat_map(|browser| {
                    self.cookies
                        .iter()
                        .filter(move |c| &c.browser == browser && query.matches(c, 1_700_000_000))
                        .cloned()
                })
                .collect()
        }
    }

    fn cookie(browser: Browser, name: &str, value: &str) -> StoredCookie {
        StoredCookie::new(browser, ".leetcode.com", name, value, None)
    }

    fn strategy(store: Arc<MemoryStore>, browsers: Vec<Browser>) -> (BrowserCookies, Arc<dyn LeetCodeClient>) {
        let client: Arc<dyn LeetCodeClient> = Arc::new(FixedClient("https://leetcode.com/"));
        let provider = BrowserCookies::with_store(browsers, store);
        provider.bind(&client);
        (provider, client)
    }

    fn request() -> Request {
        Request::new(Method::GET, "https://leetcode.com/graphql".parse().unwrap())
    }

    #[tokio::test]
    async fn test_attach_reads_both_tokens_and_caches_them() {
        let store = Arc::new(MemoryStore {
            cookies: vec![
                cookie(Browser::Firefox, SESSION_COOKIE, "ff-session"),
                cookie(Browser::Firefox, CSRF_COOKIE, "ff-csrf"),
            ],
            ..MemoryStore::default()
        });
        let (provider, _client) = strategy(store.clone(), vec![Browser::Chrome, Browser::Firefox]);

        let mut req = request();
        provider.attach(&mut req).await.unwrap();
        assert_eq!(
            req.headers().get(COOKIE).unwrap(),
            "LEETCODE_SESSION=ff-session; csrftoken=ff-csrf"
        );
        assert_eq!(req.headers().get(CSRF_HEADER).unwrap(), "ff-csrf");

        provider.attach(&mut request()).await.unwrap();
        assert_eq!(store.reads.load(Ordering::SeqCst), 2, "one read per token, once");

        let queries = store.queries.lock().unwrap().clone();
        assert_eq!(
            queries,
            vec![
                ("leetcode.com".to_string(), SESSION_COOKIE.to_string()),
                ("leetcode.com".to_string(), CSRF_COOKIE.to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_first_browser_in_order_wins() {
        let store = Arc::new(MemoryStore {
            cookies: vec![
                cookie(Browser::Firefox, SESSION_COOKIE, "ff-session"),
                cookie(Browser::Firefox, CSRF_COOKIE, "ff-csrf"),
                cookie(Browser::Chrome, SESSION_COOKIE, "chrome-session"),
                cookie(Browser::Chrome, CSRF_COOKIE, "chrome-csrf"),
            ],
            ..MemoryStore::default()
        });
        let (provider, _client) = strategy(store, vec![Browser::Chrome, Browser::Firefox]);

        let mut req = request();
        provider.attach(&mut req).await.unwrap();
        assert_eq!(req.headers().get(CSRF_HEADER).unwrap(), "chrome-csrf");
    }

    #[tokio::test]
    async fn test_missing_csrf_cookie_fails_without_mutation() {
        let store = Arc::new(MemoryStore {
            cookies: vec![cookie(Browser::Chrome, SESSION_COOKIE, "session")],
            ..MemoryStore::default()
        });
        let (provider, _client) = strategy(store, vec![Browser::Chrome]);

        let mut req = request();
        let err = provider.attach(&mut req).await.unwrap_err();
        assert!(
            matches!(&err, AuthError::BrowserCookieNotFound { name, domain, .. }
                if *name == CSRF_COOKIE && domain == "leetcode.com"),
            "unexpected error: {err}"
        );
        assert!(req.headers().is_empty());
        assert!(!provider.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_empty_cookie_value_is_not_a_match() {
        let store = Arc::new(MemoryStore {
            cookies: vec![
                cookie(Browser::Chrome, SESSION_COOKIE, ""),
                cookie(Browser::Chrome, CSRF_COOKIE, "csrf"),
            ],
            ..MemoryStore::default()
        });
        let (provider, _client) = strategy(store, vec![Browser::Chrome]);

        let err = provider.attach(&mut request()).await.unwrap_err();
        assert!(matches!(
            err,
            AuthError::BrowserCookieNotFound { name: SESSION_COOKIE, .. }
        ));
    }

    #[tokio::test]
    async fn test_reset_forces_reextraction() {
        let store = Arc::new(MemoryStore {
            cookies: vec![
                cookie(Browser::Edge, SESSION_COOKIE, "s"),
                cookie(Browser::Edge, CSRF_COOKIE, "c"),
            ],
            ..MemoryStore::default()
        });
        let (provider, _client) = strategy(store.clone(), vec![Browser::Edge]);

        provider.attach(&mut request()).await.unwrap();
        provider.reset().await;
        provider.attach(&mut request()).await.unwrap();
        assert_eq!(store.reads.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_unsendable_cookie_is_not_cached_and_store_is_read_again() {
        let store = Arc::new(MemoryStore {
            cookies: vec![
                cookie(Browser::Chrome, SESSION_COOKIE, "bad session"),
                cookie(Browser::Chrome, CSRF_COOKIE, "csrf"),
            ],
            ..MemoryStore::default()
        });
        let (provider, _client) = strategy(store.clone(), vec![Browser::Chrome]);

        for attempt in 1..=3 {
            let mut req = request();
            let err = provider.attach(&mut req).await.unwrap_err();
            assert!(matches!(err, AuthError::InvalidToken { name: SESSION_COOKIE }));
            assert!(req.headers().is_empty());
            assert_eq!(store.reads.load(Ordering::SeqCst), attempt * 2);
        }
        assert!(!provider.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_quoted_cookie_value_is_sent_as_stored() {
        let store = Arc::new(MemoryStore {
            cookies: vec![
                cookie(Browser::Firefox, SESSION_COOKIE, "\"quoted-session\""),
                cookie(Browser::Firefox, CSRF_COOKIE, "csrf"),
            ],
            ..MemoryStore::default()
        });
        let (provider, _client) = strategy(store, vec![Browser::Firefox]);

        let mut req = request();
        provider.attach(&mut req).await.unwrap();
        assert_eq!(
            req.headers().get(COOKIE).unwrap(),
            "LEETCODE_SESSION=\"quoted-session\"; csrftoken=csrf"
        );
        assert!(provider.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_unbound_client_is_an_error() {
        let provider = BrowserCookies::with_store(vec![Browser::Chrome], Arc::new(MemoryStore::default()));
        let err = provider.attach(&mut request()).await.unwrap_err();
        assert!(matches!(err, AuthError::ClientUnbound { strategy: "browser" }));
    }

    #[test]
    fn test_auth_domain_uses_host_only() {
        assert_eq!(auth_domain("https://leetcode.cn").unwrap(), "leetcode.cn");
        assert_eq!(auth_domain("http://127.0.0.1:8080/api").unwrap(), "127.0.0.1");
        assert!(matches!(
            auth_domain("not a url"),
            Err(AuthError::InvalidBaseUri { .. })
        ));
    }
}
