//! Durable holder of the single current vendor token.

use async_trait::async_trait;
use thiserror::Error;

pub mod memory;
pub mod sql;
pub mod token;

pub use memory::MemoryTokenStore;
pub use sql::SqlTokenStore;
pub use token::Token;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("token store query failed: {0}")]
    Query(#[from] sqlx::Error),
    #[error("token store timed out")]
    Timeout,
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Current token, or `None` when unset. Store errors are logged and
    /// reported as `None`: callers treat them exactly like a missing token.
    async fn read(&self) -> Option<Token>;

    /// Leaves exactly one stored token. Concurrent writers: last one wins.
    async fn replace(&self, token: &Token) -> Result<(), StoreError>;
}
