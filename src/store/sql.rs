use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::any::AnyPoolOptions;
use sqlx::{AnyPool, Row};
use tracing::{debug, error, info};

use crate::config::service::{DatabaseConfig, DB_MAX_CONNECTIONS_DEFAULT};
use crate::observability::metrics::get_metrics;
use crate::store::{StoreError, Token, TokenStore};

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS token (value TEXT NOT NULL)";
const SELECT_TOKEN: &str = "SELECT value FROM token LIMIT 1";
const DELETE_TOKENS: &str = "DELETE FROM token";
const INSERT_TOKEN: &str = "INSERT INTO token (value) VALUES ($1)";

/// Single-row `token` table in Postgres or SQLite.
#[derive(Debug, Clone)]
pub struct SqlTokenStore {
    pool: AnyPool,
    op_timeout: Duration,
}

impl SqlTokenStore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(config.max_connections.unwrap_or(DB_MAX_CONNECTIONS_DEFAULT))
            .acquire_timeout(config.acquire_timeout())
            .connect(&config.url)
            .await?;

        let store = Self::from_pool(pool, config.acquire_timeout());
        store.ensure_schema().await?;
        info!("token store connected");
        Ok(store)
    }

    pub fn from_pool(pool: AnyPool, op_timeout: Duration) -> Self {
        Self { pool, op_timeout }
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        Ok(())
    }

    async fn try_read(&self) -> Result<Option<Token>, StoreError> {
        let row = sqlx::query(SELECT_TOKEN)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let value: String = row.try_get("value")?;
                Ok(Token::new(value))
            }
            None => Ok(None),
        }
    }

    async fn try_replace(&self, token: &Token) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(DELETE_TOKENS).execute(&mut *tx).await?;
        sqlx::query(INSERT_TOKEN)
            .bind(token.as_str())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn bounded<T>(&self, op: impl Future<Output = Result<T, StoreError>>) -> Result<T, StoreError> {
        tokio::time::timeout(self.op_timeout, op)
            .await
            .map_err(|_| StoreError::Timeout)?
    }
}

#[async_trait]
impl TokenStore for SqlTokenStore {
    async fn read(&self) -> Option<Token> {
        match self.bounded(self.try_read()).await {
            Ok(token) => {
                debug!("token store read, present: {}", token.is_some());
                token
            }
            Err(e) => {
                error!(error = %e, "reading token failed, treating as absent");
                get_metrics().await.store_failures.with_label_values(&["read"]).inc();
                None
            }
        }
    }

    async fn replace(&self, token: &Token) -> Result<(), StoreError> {
        self.bounded(self.try_replace(token))
            .await
            .inspect(|_| info!("token updated in store"))
            .inspect_err(|e| error!(error = %e, "updating token failed"))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    async fn sqlite_store(dir: &tempfile::TempDir) -> SqlTokenStore {
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("token.db").display());
        let config = DatabaseConfig {
            url,
            max_connections: Some(2),
            acquire_timeout_ms: Some(2_000),
        };
        SqlTokenStore::connect(&config).await.unwrap()
    }

    async fn row_count(store: &SqlTokenStore) -> i64 {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM token")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        row.try_get("n").unwrap()
    }

    #[tokio::test]
    async fn empty_table_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = sqlite_store(&dir).await;
        assert!(store.read().await.is_none());
    }

    #[tokio::test]
    async fn replace_keeps_exactly_one_row() {
        let dir = tempfile::tempdir().unwrap();
        let store = sqlite_store(&dir).await;

        store.replace(&Token::new("tok-A").unwrap()).await.unwrap();
        store.replace(&Token::new("tok-B").unwrap()).await.unwrap();

        assert_eq!(store.read().await, Token::new("tok-B"));
        assert_eq!(row_count(&store).await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_replaces_leave_one_of_the_writes() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(sqlite_store(&dir).await);

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let _ = store.replace(&Token::new(format!("tok-{i}")).unwrap()).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let current = store.read().await.unwrap();
        assert!(current.as_str().starts_with("tok-"));
        assert_eq!(row_count(&store).await, 1);
    }

    #[tokio::test]
    async fn stored_value_is_trimmed_on_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = sqlite_store(&dir).await;
        sqlx::query("INSERT INTO token (value) VALUES ('  tok-padded \n')")
            .execute(&store.pool)
            .await
            .unwrap();

        assert_eq!(store.read().await, Token::new("tok-padded"));
    }
}
