use crate::error::{Result, StorageError};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use wormhole_core::{CounterStore, CounterTransaction, MAX_SHORT_CODE_LEN};

/// In-memory implementation of the counter store using DashMap.
///
/// Transactions stage their increments locally and apply them all at once on
/// commit, so an aborted transaction leaves no trace. Clones share state.
///
/// Like the `VARCHAR(12)` column, codes longer than [`MAX_SHORT_CODE_LEN`]
/// are refused by `upsert_increment`.
///
/// Failures can be injected with [`fail_next_begins`], [`fail_next_upserts`]
/// and [`fail_next_commits`] to exercise the caller's abort path.
///
/// [`fail_next_begins`]: InMemoryCounterStore::fail_next_begins
/// [`fail_next_upserts`]: InMemoryCounterStore::fail_next_upserts
/// [`fail_next_commits`]: InMemoryCounterStore::fail_next_commits
#[derive(Debug, Clone, Default)]
pub struct InMemoryCounterStore {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    counts: DashMap<String, u64>,
    begin_failures: AtomicUsize,
    upsert_failures: AtomicUsize,
    targeted_upsert_failures: DashMap<String, usize>,
    commit_failures: AtomicUsize,
    commits: AtomicUsize,
    aborts: AtomicUsize,
}

impl InMemoryCounterStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` calls to `begin` fail with [`StorageError::Unavailable`].
    pub fn fail_next_begins(&self, n: usize) {
        self.inner.begin_failures.store(n, Ordering::SeqCst);
    }

    /// Makes the next `n` upserts fail with [`StorageError::Query`].
    pub fn fail_next_upserts(&self, n: usize) {
        self.inner.upsert_failures.store(n, Ordering::SeqCst);
    }

    /// Makes the next `n` upserts of `short_code` fail with
    /// [`StorageError::Query`]; other codes are unaffected.
    pub fn fail_next_upserts_of(&self, short_code: impl Into<String>, n: usize) {
        self.inner.targeted_upsert_failures.insert(short_code.into(), n);
    }

    /// Makes the next `n` commits fail with [`StorageError::Unavailable`].
    pub fn fail_next_commits(&self, n: usize) {
        self.inner.commit_failures.store(n, Ordering::SeqCst);
    }

    /// Returns the committed count for a short code.
    pub fn count(&self, short_code: &str) -> Option<u64> {
        self.inner.counts.get(short_code).map(|count| *count)
    }

    /// Returns every committed counter, ordered by short code.
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.inner
            .counts
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    /// Number of successfully committed transactions.
    pub fn commits(&self) -> usize {
        self.inner.commits.load(Ordering::SeqCst)
    }

    /// Number of transactions that were rolled back or failed to commit.
    pub fn aborts(&self) -> usize {
        self.inner.aborts.load(Ordering::SeqCst)
    }
}

fn take_injected_failure(pending: &AtomicUsize) -> bool {
    pending
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    type Transaction = InMemoryCounterTransaction;

    async fn begin(&self) -> Result<Self::Transaction> {
        if take_injected_failure(&self.inner.begin_failures) {
            return Err(StorageError::Unavailable(
                "injected begin failure".to_string(),
            ));
        }
        Ok(InMemoryCounterTransaction {
            store: self.clone(),
            staged: BTreeMap::new(),
        })
    }

    async fn click_count(&self, short_code: &str) -> Result<Option<u64>> {
        Ok(self.count(short_code))
    }
}

#[derive(Debug)]
pub struct InMemoryCounterTransaction {
    store: InMemoryCounterStore,
    staged: BTreeMap<String, u64>,
}

#[async_trait]
impl CounterTransaction for InMemoryCounterTransaction {
    async fn upsert_increment(&mut self, short_code: &str, delta: u64) -> Result<()> {
        let targeted = self
            .store
            .inner
            .targeted_upsert_failures
            .get_mut(short_code)
            .is_some_and(|mut pending| match pending.checked_sub(1) {
                Some(rest) => {
                    *pending = rest;
                    true
                }
                None => false,
            });
        if targeted || take_injected_failure(&self.store.inner.upsert_failures) {
            return Err(StorageError::Query(format!(
                "injected upsert failure for {short_code}"
            )));
        }
        if short_code.chars().count() > MAX_SHORT_CODE_LEN {
            return Err(StorageError::InvalidData(format!(
                "short code '{short_code}' is longer than {MAX_SHORT_CODE_LEN} characters"
            )));
        }
        *self.staged.entry(short_code.to_owned()).or_insert(0) += delta;
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        if take_injected_failure(&self.store.inner.commit_failures) {
            self.store.inner.aborts.fetch_add(1, Ordering::SeqCst);
            return Err(StorageError::Unavailable(
                "injected commit failure".to_string(),
            ));
        }

        for (code, delta) in self.staged {
            // entry() holds the shard lock, so the add is atomic per key
            *self.store.inner.counts.entry(code).or_insert(0) += delta;
        }
        self.store.inner.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.store.inner.aborts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
