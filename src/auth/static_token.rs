//! Static token provider.
//!
//! Returns a fixed token string without any validation or refresh logic.

use async_trait::async_trait;
use std::error::Error as StdError;

use super::TokenProvider;

/// A token provider that returns a static token, typically a user access
/// token passed with `--token` or set in the configuration file.
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn get_token(&self) -> Result<Option<String>, Box<dyn StdError + Send + Sync>> {
        Ok(Some(self.token.clone()))
    }
}
