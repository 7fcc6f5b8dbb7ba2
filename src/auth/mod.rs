//! Token providers for Hub authentication
//!
//! Supported token sources:
//! - Static tokens (from the command line or configuration)
//! - The stored Hub token (environment variables, then the token file written
//!   by `huggingface-cli login`)

pub mod static_token;
pub mod stored;

use async_trait::async_trait;
use std::error::Error as StdError;
use std::sync::Arc;

pub use static_token::StaticTokenProvider;
pub use stored::StoredTokenProvider;

/// Source of bearer tokens for Hub requests.
///
/// Returns `Ok(Some(token))` if a token is available, `Ok(None)` for anonymous
/// access, or `Err` if looking the token up failed.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn get_token(&self) -> Result<Option<String>, Box<dyn StdError + Send + Sync>>;
}

/// Pick the provider for an optional explicit token: the explicit token wins,
/// otherwise the stored one is used
pub fn provider_for(token: Option<String>) -> Arc<dyn TokenProvider> {
    match token {
        Some(token) if !token.is_empty() => Arc::new(StaticTokenProvider::new(token)),
        _ => Arc::new(StoredTokenProvider::from_env()),
    }
}
