use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::store::{StoreError, Token, TokenStore};

/// Process-local store, used when no database is configured.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    inner: RwLock<Option<Token>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: Token) -> Self {
        Self {
            inner: RwLock::new(Some(token)),
        }
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn read(&self) -> Option<Token> {
        self.inner.read().await.clone()
    }

    async fn replace(&self, token: &Token) -> Result<(), StoreError> {
        *self.inner.write().await = Some(token.clone());
        Ok(())
    }
}
