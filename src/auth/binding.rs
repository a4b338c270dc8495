//! Non-owning client reference held by the dynamic strategies.

use std::sync::{Arc, PoisonError, RwLock, Weak};

use crate::client::LeetCodeClient;

use super::AuthError;

/// Weak handle to the client a strategy logs in through.
///
/// The client usually owns the credentials, so holding it strongly here
/// would form a reference cycle.
#[derive(Default)]
pub(crate) struct ClientSlot {
    client: RwLock<Option<Weak<dyn LeetCodeClient>>>,
}

impl ClientSlot {
    pub(crate) fn bind(&self, client: &Arc<dyn LeetCodeClient>) {
        let mut guard = self.client.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(Arc::downgrade(client));
    }

    /// Upgrades the bound client.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ClientUnbound`] when nothing is bound or the
    /// client has been dropped.
    pub(crate) fn get(&self, strategy: &'static str) -> Result<Arc<dyn LeetCodeClient>, AuthError> {
        self.client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade)
            .ok_or(AuthError::ClientUnbound { strategy })
    }
}

impl std::fmt::Debug for ClientSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bound = self
            .client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|weak| weak.strong_count() > 0);
        f.debug_struct("ClientSlot").field("bound", &bound).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientError, LoginResponse};
    use async_trait::async_trait;

    struct StubClient;

    #[async_trait]
    impl LeetCodeClient for StubClient {
        async fn login(&self, _: &str, _: &str) -> Result<LoginResponse, ClientError> {
            Ok(LoginResponse::new(200, Vec::new()))
        }

        fn base_uri(&self) -> String {
            "https://leetcode.com".to_string()
        }
    }

    fn poison(slot: &ClientSlot) {
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = slot.client.write().unwrap();
            panic!("poison the slot");
        }));
        assert!(slot.client.is_poisoned());
    }

    #[test]
    fn test_get_without_bind_is_unbound() {
        let slot = ClientSlot::default();
        assert!(matches!(
            slot.get("password"),
            Err(AuthError::ClientUnbound { strategy: "password" })
        ));
    }

    #[test]
    fn test_dropped_client_is_unbound() {
        let slot = ClientSlot::default();
        let client: Arc<dyn LeetCodeClient> = Arc::new(StubClient);
        slot.bind(&client);
        assert!(slot.get("browser").is_ok());
        drop(client);
        assert!(slot.get("browser").is_err());
    }

    #[test]
    fn test_bind_survives_poisoned_lock() {
        let slot = ClientSlot::default();
        poison(&slot);

        let client: Arc<dyn LeetCodeClient> = Arc::new(StubClient);
        slot.bind(&client);
        let bound = slot.get("browser").unwrap();
        assert_eq!(bound.base_uri(), "https://leetcode.com");
        assert!(format!("{slot:?}").contains("bound: true"));
    }
}
