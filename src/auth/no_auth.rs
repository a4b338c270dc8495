use async_trait::async_trait;
use reqwest::Request;

use super::{AuthError, CredentialsProvider};

/// Strategy for requests that need no authentication.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuth;

#[async_trait]
impl CredentialsProvider for NoAuth {
    async fn attach(&self, _request: &mut Request) -> Result<(), AuthError> {
        Ok(())
    }
}
