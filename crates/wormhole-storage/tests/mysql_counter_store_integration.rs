use std::time::Duration;

use sqlx::mysql::MySqlPoolOptions;
use wormhole_storage::{CounterStore, CounterTransaction, MySqlCounterStore};
use wormhole_test_infra::mysql::{MySqlServer, MysqlConfig};

struct Fixture {
    _mysql: MySqlServer,
    store: MySqlCounterStore,
}

impl Fixture {
    async fn start() -> Self {
        let mysql = MySqlServer::new(MysqlConfig::builder().build())
            .await
            .expect("start mysql");
        let url = mysql.database_url().await.expect("mysql url");
        let pool = connect_with_retry(&url).await;

        let store = MySqlCounterStore::new(pool);
        store.migrate().await.expect("create schema");

        Self {
            _mysql: mysql,
            store,
        }
    }

    async fn increment(&self, deltas: &[(&str, u64)]) {
        let mut tx = self.store.begin().await.unwrap();
        for (code, delta) in deltas {
            tx.upsert_increment(code, *delta).await.unwrap();
        }
        tx.commit().await.unwrap();
    }
}

async fn connect_with_retry(url: &str) -> sqlx::MySqlPool {
    let mut last_error = None;

    for _ in 0..20 {
        match MySqlPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
        {
            Ok(pool) => return pool,
            Err(err) => {
                last_error = Some(err);
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        }
    }

    panic!("failed to connect mysql: {last_error:?}");
}

#[tokio::test]
async fn first_upsert_inserts_the_counter() {
    let fixture = Fixture::start().await;

    fixture.increment(&[("abc", 3)]).await;

    assert_eq!(fixture.store.click_count("abc").await.unwrap(), Some(3));
    assert_eq!(fixture.store.click_count("missing").await.unwrap(), None);
}

#[tokio::test]
async fn later_upserts_add_to_the_existing_count() {
    let fixture = Fixture::start().await;

    fixture.increment(&[("abc", 100), ("xyz", 20)]).await;
    fixture.increment(&[("xyz", 30)]).await;

    assert_eq!(fixture.store.click_count("abc").await.unwrap(), Some(100));
    assert_eq!(fixture.store.click_count("xyz").await.unwrap(), Some(50));
}

#[tokio::test]
async fn rolled_back_transaction_persists_nothing() {
    let fixture = Fixture::start().await;
    fixture.increment(&[("abc", 1)]).await;

    let mut tx = fixture.store.begin().await.unwrap();
    tx.upsert_increment("abc", 10).await.unwrap();
    tx.upsert_increment("new", 10).await.unwrap();
    tx.rollback().await.unwrap();

    assert_eq!(fixture.store.click_count("abc").await.unwrap(), Some(1));
    assert_eq!(fixture.store.click_count("new").await.unwrap(), None);
}

#[tokio::test]
async fn dropped_transaction_is_rolled_back() {
    let fixture = Fixture::start().await;

    {
        let mut tx = fixture.store.begin().await.unwrap();
        tx.upsert_increment("abc", 10).await.unwrap();
    }

    assert_eq!(fixture.store.click_count("abc").await.unwrap(), None);
}

#[tokio::test]
async fn concurrent_writers_do_not_lose_increments() {
    let fixture = Fixture::start().await;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = fixture.store.clone();
            tokio::spawn(async move {
                for _ in 0..25 {
                    let mut tx = store.begin().await.unwrap();
                    tx.upsert_increment("hot", 1).await.unwrap();
                    tx.commit().await.unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(fixture.store.click_count("hot").await.unwrap(), Some(200));
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let fixture = Fixture::start().await;
    fixture.store.migrate().await.unwrap();
}
