use crate::error::Result;
use async_trait::async_trait;

/// Durable per-short-code click counters.
///
/// The only write path is a transaction of additive upserts; rows are created
/// lazily on the first increment and never deleted.
#[async_trait]
pub trait CounterStore: Send + Sync + 'static {
    type Transaction: CounterTransaction;

    /// Opens a new transaction.
    async fn begin(&self) -> Result<Self::Transaction>;

    /// Returns the committed click count for a short code, if it has one.
    async fn click_count(&self, short_code: &str) -> Result<Option<u64>>;
}

/// A unit of work against a [`CounterStore`].
///
/// Nothing written through a transaction is visible until [`commit`] succeeds.
/// Dropping a transaction without committing discards it.
///
/// [`commit`]: CounterTransaction::commit
#[async_trait]
pub trait CounterTransaction: Send + Sized {
    /// Inserts the counter with `count = delta`, or adds `delta` to the existing
    /// count, as a single server-side operation.
    async fn upsert_increment(&mut self, short_code: &str, delta: u64) -> Result<()>;

    async fn commit(self) -> Result<()>;

    async fn rollback(self) -> Result<()>;
}
