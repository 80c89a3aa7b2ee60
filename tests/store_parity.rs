//! One property suite, every backend. The portable contract must be
//! indistinguishable through the repository trait; backends that expire
//! entries lazily (memory, sqlite) additionally keep expired rotation
//! entries blocking the CAS until a cleanup pass removes them. Native-TTL
//! backends (redis, mongo) run the same portable suite against a local
//! instance when their feature is enabled.

use std::sync::Arc;
use std::time::Duration;
use tokensmith::{MemoryStore, SqliteStore, TokenKind, TokenStore};
use uuid::Uuid;

/// Fingerprints are unique per run so suites can target shared, persistent
/// backends without colliding with earlier runs.
fn fresh_fp(tag: &str) -> String {
    format!("{tag}-{}", Uuid::new_v4().simple())
}

async fn revocation_contract(store: &dyn TokenStore) {
    let fp = fresh_fp("revocation");

    assert!(!store
        .is_revoked(&fp, TokenKind::Access)
        .await
        .expect("fresh fingerprint is not revoked"));

    store
        .mark_revoked(&fp, TokenKind::Access, Duration::from_secs(60))
        .await
        .expect("mark revoked");
    store
        .mark_revoked(&fp, TokenKind::Access, Duration::from_secs(60))
        .await
        .expect("idempotent re-mark");

    assert!(store
        .is_revoked(&fp, TokenKind::Access)
        .await
        .expect("revoked"));
    assert!(!store
        .is_revoked(&fp, TokenKind::Refresh)
        .await
        .expect("other kind untouched"));

    // A later, shorter upsert must not shrink the window.
    store
        .mark_revoked(&fp, TokenKind::Access, Duration::from_millis(120))
        .await
        .expect("short re-mark");
    tokio::time::sleep(Duration::from_millis(180)).await;
    assert!(store
        .is_revoked(&fp, TokenKind::Access)
        .await
        .expect("still revoked after the short ttl elapsed"));
}

async fn rotation_contract(store: &dyn TokenStore) {
    let fp = fresh_fp("rotation");

    assert!(!store.is_rotated(&fp).await.expect("fresh"));
    assert_eq!(
        store.rotation_ttl(&fp).await.expect("ttl of absent entry"),
        Duration::ZERO
    );

    assert!(store
        .mark_rotated_atomic(&fp, Duration::from_secs(60))
        .await
        .expect("first cas wins"));
    assert!(!store
        .mark_rotated_atomic(&fp, Duration::from_secs(60))
        .await
        .expect("second cas loses"));
    assert!(store.is_rotated(&fp).await.expect("rotated"));
    let ttl = store.rotation_ttl(&fp).await.expect("ttl");
    assert!(ttl > Duration::from_secs(50) && ttl <= Duration::from_secs(60));
}

async fn expiry_contract(store: &dyn TokenStore) {
    let fp = fresh_fp("expiry");

    assert!(store
        .mark_rotated_atomic(&fp, Duration::from_millis(40))
        .await
        .expect("insert short entry"));
    store
        .mark_revoked(&fp, TokenKind::Refresh, Duration::from_millis(40))
        .await
        .expect("insert short revocation");
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(!store
        .is_rotated(&fp)
        .await
        .expect("expired entry not authoritative"));
    assert!(!store
        .is_revoked(&fp, TokenKind::Refresh)
        .await
        .expect("expired revocation not authoritative"));
    assert_eq!(
        store.rotation_ttl(&fp).await.expect("expired ttl"),
        Duration::ZERO
    );

    // Cleanup never errors, whether or not native eviction beat it here.
    store
        .cleanup_expired_revoked(TokenKind::Refresh)
        .await
        .expect("cleanup revoked");
    store
        .cleanup_expired_rotated()
        .await
        .expect("cleanup rotated");
}

async fn guard_contract(store: &dyn TokenStore) {
    assert!(store
        .mark_revoked("", TokenKind::Access, Duration::from_secs(1))
        .await
        .is_err());
    assert!(store
        .mark_revoked("  ", TokenKind::Access, Duration::from_secs(1))
        .await
        .is_err());
    assert!(store
        .mark_revoked("fp", TokenKind::Access, Duration::ZERO)
        .await
        .is_err());
    assert!(store.mark_rotated_atomic("", Duration::from_secs(1)).await.is_err());
    assert!(store.mark_rotated_atomic("fp", Duration::ZERO).await.is_err());
    assert!(store.is_revoked("", TokenKind::Access).await.is_err());
    assert!(store.is_rotated(" ").await.is_err());
    assert!(store.rotation_ttl("").await.is_err());
}

/// Behavior specific to lazily-expiring backends: an expired rotation entry
/// keeps blocking the CAS (replay detection across the TTL boundary) until
/// a cleanup pass removes it. Native-TTL backends evict at expiry, so this
/// clause is vacuous for them.
async fn swept_expiry_contract(store: &dyn TokenStore) {
    let fp = fresh_fp("swept");

    assert!(store
        .mark_rotated_atomic(&fp, Duration::from_millis(40))
        .await
        .expect("insert short entry"));
    store
        .mark_revoked(&fp, TokenKind::Access, Duration::from_millis(40))
        .await
        .expect("insert short revocation");
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(!store
        .mark_rotated_atomic(&fp, Duration::from_secs(60))
        .await
        .expect("cas against expired entry fails"));

    assert_eq!(
        store
            .cleanup_expired_rotated()
            .await
            .expect("cleanup rotated"),
        1
    );
    assert_eq!(
        store
            .cleanup_expired_revoked(TokenKind::Access)
            .await
            .expect("cleanup revoked"),
        1
    );
    assert!(store
        .mark_rotated_atomic(&fp, Duration::from_secs(60))
        .await
        .expect("cas after cleanup"));
}

async fn full_suite(store: Arc<dyn TokenStore>) {
    revocation_contract(store.as_ref()).await;
    rotation_contract(store.as_ref()).await;
    expiry_contract(store.as_ref()).await;
    guard_contract(store.as_ref()).await;
    store.close().await.expect("close");
}

#[tokio::test]
async fn memory_store_satisfies_the_contract() {
    let store = Arc::new(MemoryStore::new());
    swept_expiry_contract(store.as_ref()).await;
    full_suite(store).await;
}

#[tokio::test]
async fn sqlite_store_satisfies_the_contract() {
    let store = Arc::new(SqliteStore::open_in_memory().expect("open sqlite"));
    swept_expiry_contract(store.as_ref()).await;
    full_suite(store).await;
}

#[tokio::test]
async fn sqlite_file_store_satisfies_the_contract() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store =
        Arc::new(SqliteStore::open(&dir.path().join("tokens.sqlite3")).expect("open sqlite file"));
    swept_expiry_contract(store.as_ref()).await;
    full_suite(store).await;
}

/// Needs a redis reachable at `TOKENSMITH_TEST_REDIS_URL` (default
/// `redis://127.0.0.1:6379`).
#[cfg(feature = "redis-backend")]
#[tokio::test]
async fn redis_store_satisfies_the_contract() {
    let url = std::env::var("TOKENSMITH_TEST_REDIS_URL")
        .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    let store = tokensmith::RedisStore::connect(&url)
        .await
        .expect("redis test instance");
    full_suite(Arc::new(store)).await;
}

/// Needs a mongod reachable at `TOKENSMITH_TEST_MONGO_URL` (default
/// `mongodb://127.0.0.1:27017`).
#[cfg(feature = "mongo-backend")]
#[tokio::test]
async fn mongo_store_satisfies_the_contract() {
    let url = std::env::var("TOKENSMITH_TEST_MONGO_URL")
        .unwrap_or_else(|_| "mongodb://127.0.0.1:27017".to_string());
    let client = mongodb::Client::with_uri_str(&url)
        .await
        .expect("mongo test instance");
    let store = tokensmith::MongoStore::new(&client.database("tokensmith_contract_tests"))
        .await
        .expect("mongo store");
    full_suite(Arc::new(store)).await;
}
