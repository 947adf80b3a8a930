use crate::error::{map_migrate_error, map_sqlx_error, Result};
use async_trait::async_trait;
use sqlx::{MySql, MySqlPool, Row, Transaction};
use tracing::{debug, info};
use wormhole_core::{CounterStore, CounterTransaction};

/// MySQL implementation of the click counter store.
///
/// Counters live in `url_analytics`, one row per short code. Increments use
/// `INSERT ... ON DUPLICATE KEY UPDATE` so concurrent writers never lose an
/// update, and rows are never deleted.
#[derive(Debug, Clone)]
pub struct MySqlCounterStore {
    pool: MySqlPool,
}

impl MySqlCounterStore {
    /// Creates a store from an existing MySQL connection pool.
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Creates a store by opening a new MySQL connection pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = MySqlPool::connect(database_url)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self::new(pool))
    }

    /// Applies pending schema migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(map_migrate_error)?;
        info!("counter store schema is up to date");
        Ok(())
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

#[async_trait]
impl CounterStore for MySqlCounterStore {
    type Transaction = MySqlCounterTransaction;

    async fn begin(&self) -> Result<Self::Transaction> {
        let tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        Ok(MySqlCounterTransaction { tx })
    }

    async fn click_count(&self, short_code: &str) -> Result<Option<u64>> {
        let row = sqlx::query(
            r#"
            SELECT click_count
            FROM url_analytics
            WHERE short_code = ?
            LIMIT 1
            "#,
        )
        .bind(short_code)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(|row| row.try_get::<u64, _>("click_count"))
            .transpose()
            .map_err(map_sqlx_error)
    }
}

/// An open MySQL transaction. Dropping it without committing rolls it back.
pub struct MySqlCounterTransaction {
    tx: Transaction<'static, MySql>,
}

#[async_trait]
impl CounterTransaction for MySqlCounterTransaction {
    async fn upsert_increment(&mut self, short_code: &str, delta: u64) -> Result<()> {
        debug!(code = %short_code, delta, "upserting click count");

        sqlx::query(
            r#"
            INSERT INTO url_analytics (short_code, click_count)
            VALUES (?, ?) AS incoming
            ON DUPLICATE KEY UPDATE
              click_count = url_analytics.click_count + incoming.click_count
            "#,
        )
        .bind(short_code)
        .bind(delta)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await.map_err(map_sqlx_error)
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await.map_err(map_sqlx_error)
    }
}
