//! Persistent storage for the session token pair.
//!
//! The browser original kept a single serialized `{access, refresh}` value
//! under one local-storage key; here the same contract is a [`TokenStore`]
//! trait with a file-backed implementation and an in-memory one for tests.
//! Absence of a stored pair means unauthenticated.

use crate::auth::models::TokenPair;
use crate::errors::{ServiceError, ServiceResult};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Loads the stored token pair, if any.
    async fn load(&self) -> ServiceResult<Option<TokenPair>>;

    /// Persists the token pair, replacing any previous value.
    async fn save(&self, tokens: &TokenPair) -> ServiceResult<()>;

    /// Removes the stored token pair; succeeds when nothing is stored.
    async fn clear(&self) -> ServiceResult<()>;
}

/// File-backed token store holding one serialized token pair.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self) -> ServiceResult<Option<TokenPair>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ServiceError::storage(e.to_string())),
        };

        let tokens = serde_json::from_str(&contents)
            .map_err(|e| ServiceError::storage(format!("corrupt token file: {}", e)))?;
        Ok(Some(tokens))
    }

    async fn save(&self, tokens: &TokenPair) -> ServiceResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ServiceError::storage(e.to_string()))?;
        }

        let contents = serde_json::to_string(tokens)
            .map_err(|e| ServiceError::storage(e.to_string()))?;
        tokio::fs::write(&self.path, contents)
            .await
            .map_err(|e| ServiceError::storage(e.to_string()))
    }

    async fn clear(&self) -> ServiceResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ServiceError::storage(e.to_string())),
        }
    }
}

/// In-memory token store used by tests and short-lived tooling.
#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<Option<TokenPair>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self) -> ServiceResult<Option<TokenPair>> {
        Ok(self.tokens.lock().await.clone())
    }

    async fn save(&self, tokens: &TokenPair) -> ServiceResult<()> {
        *self.tokens.lock().await = Some(tokens.clone());
        Ok(())
    }

    async fn clear(&self) -> ServiceResult<()> {
        *self.tokens.lock().await = None;
        Ok(())
    }
}
