//! Stored token provider.
//!
//! Looks the token up the same way the Hub tooling does: `HF_TOKEN` (or the
//! legacy `HUGGING_FACE_HUB_TOKEN`) first, then the token file, which lives at
//! `$HF_TOKEN_PATH`, `$HF_HOME/token` or `~/.cache/huggingface/token`.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::error::Error as StdError;
use std::path::PathBuf;
use tracing::debug;

use super::TokenProvider;
use crate::env;

/// A token provider backed by the environment and the stored token file.
///
/// The file is read at most once; later calls reuse the cached value.
pub struct StoredTokenProvider {
    env_token: Option<String>,
    token_path: Option<PathBuf>,
    cached_token: RwLock<Option<Option<String>>>,
}

impl StoredTokenProvider {
    pub fn new(env_token: Option<String>, token_path: Option<PathBuf>) -> Self {
        Self {
            env_token,
            token_path,
            cached_token: RwLock::new(None),
        }
    }

    /// Provider reading the process environment
    pub fn from_env() -> Self {
        Self::new(env::hub_token(), env::token_path())
    }

    async fn read_token_file(&self) -> Result<Option<String>, Box<dyn StdError + Send + Sync>> {
        let Some(path) = &self.token_path else {
            return Ok(None);
        };

        match tokio::fs::read_to_string(path).await {
            Ok(content) => {
                let token = content.trim();
                debug!("Using stored token from {:?}", path);
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(format!("Failed to read token file {:?}: {}", path, e).into()),
        }
    }
}

#[async_trait]
impl TokenProvider for StoredTokenProvider {
    async fn get_token(&self) -> Result<Option<String>, Box<dyn StdError + Send + Sync>> {
        if let Some(token) = &self.env_token {
            return Ok(Some(token.clone()));
        }

        {
            let cache = self.cached_token.read();
            if let Some(cached) = cache.as_ref() {
                return Ok(cached.clone());
            }
        }

        let token = self.read_token_file().await?;
        *self.cached_token.write() = Some(token.clone());
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_env_token_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token");
        std::fs::write(&path, "hf_from_file\n").unwrap();

        let provider = StoredTokenProvider::new(Some("hf_from_env".into()), Some(path));
        assert_eq!(
            provider.get_token().await.unwrap(),
            Some("hf_from_env".to_string())
        );
    }

    #[tokio::test]
    async fn test_token_file_is_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token");
        std::fs::write(&path, "  hf_from_file\n").unwrap();

        let provider = StoredTokenProvider::new(None, Some(path));
        assert_eq!(
            provider.get_token().await.unwrap(),
            Some("hf_from_file".to_string())
        );
    }

    #[tokio::test]
    async fn test_missing_token_file_is_anonymous() {
        let dir = tempfile::tempdir().unwrap();
        let provider = StoredTokenProvider::new(None, Some(dir.path().join("missing")));
        assert_eq!(provider.get_token().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_token_file_read_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token");
        std::fs::write(&path, "hf_first").unwrap();

        let provider = StoredTokenProvider::new(None, Some(path.clone()));
        assert_eq!(provider.get_token().await.unwrap().as_deref(), Some("hf_first"));

        std::fs::write(&path, "hf_second").unwrap();
        assert_eq!(provider.get_token().await.unwrap().as_deref(), Some("hf_first"));
    }
}
