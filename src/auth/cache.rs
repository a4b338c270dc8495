//! Single-flight token cache shared by the dynamic strategies.
//!
//! The cache is an explicit two-state machine guarded by an async mutex. The
//! lock is held across "check, acquire if empty, attach", so at most one
//! acquisition runs per strategy instance and concurrent callers wait for it.

use std::future::Future;

use reqwest::Request;
use tokio::sync::Mutex;
use tracing::debug;

use super::{AuthError, AuthState};

#[derive(Debug, Default)]
enum TokenSlot {
    #[default]
    Empty,
    /// Always holds a state for which `has_auth()` is true and `validate()`
    /// succeeds.
    Populated(AuthState),
}

/// Lazily populated token pair, acquired at most once at a time.
#[derive(Debug, Default)]
pub(crate) struct TokenCache {
    slot: Mutex<TokenSlot>,
}

impl TokenCache {
    /// Ensures tokens are cached (running `acquire` under the lock if they are
    /// not), then attaches them to `request`.
    ///
    /// A state missing either token, or holding a token that cannot be sent
    /// as a cookie value, is never stored. A failed acquisition leaves the
    /// cache empty so the next caller tries again.
    pub(crate) async fn attach_with<F, Fut>(
        &self,
        request: &mut Request,
        acquire: F,
    ) -> Result<(), AuthError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<AuthState, AuthError>>,
    {
        let mut slot = self.slot.lock().await;

        if matches!(*slot, TokenSlot::Empty) {
            let acquired = acquire().await?;
            if !acquired.has_auth() {
                return Err(AuthError::NoCredentialFound {
                    missing: acquired.missing().join(", "),
                });
            }
            acquired.validate()?;
            *slot = TokenSlot::Populated(acquired);
        } else {
            debug!("using cached credentials");
        }

        match &*slot {
            TokenSlot::Populated(state) => state.attach_to(request),
            TokenSlot::Empty => Ok(()),
        }
    }

    /// Drops cached tokens, waiting for any in-flight acquisition first.
    pub(crate) async fn clear(&self) {
        let mut slot = self.slot.lock().await;
        *slot = TokenSlot::Empty;
    }

    /// Whether tokens are currently cached.
    pub(crate) async fn is_populated(&self) -> bool {
        matches!(*self.slot.lock().await, TokenSlot::Populated(_))
    }
}
