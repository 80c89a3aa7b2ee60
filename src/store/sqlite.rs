use super::{check_entry_args, check_fingerprint, now_millis, TokenStore};
use crate::claims::TokenKind;
use crate::error::{AuthError, AuthResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Relational backend on the bundled SQLite engine. The connection is
/// serialized behind a mutex and every call runs on the blocking pool so
/// callers suspend instead of blocking the runtime.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> AuthResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| AuthError::storage(format!("failed to open sqlite database: {e}")))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> AuthResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AuthError::storage(format!("failed to open sqlite database: {e}")))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> AuthResult<Self> {
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|e| AuthError::storage(e.to_string()))?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn call<T, F>(&self, f: F) -> AuthResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            f(&conn).map_err(|e| AuthError::storage(e.to_string()))
        })
        .await
        .map_err(|e| AuthError::storage(format!("sqlite task failed: {e}")))?
    }
}

fn init_schema(conn: &Connection) -> AuthResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS revoked_tokens (
            token_hash TEXT NOT NULL,
            kind TEXT NOT NULL,
            expires_at INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (token_hash, kind)
        );
        CREATE TABLE IF NOT EXISTS rotated_tokens (
            token_hash TEXT PRIMARY KEY,
            expires_at INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        );",
    )
    .map_err(|e| AuthError::storage(format!("failed to initialize sqlite schema: {e}")))
}

#[async_trait]
impl TokenStore for SqliteStore {
    async fn mark_revoked(
        &self,
        fingerprint: &str,
        kind: TokenKind,
        ttl: Duration,
    ) -> AuthResult<()> {
        check_entry_args(fingerprint, ttl)?;
        let fingerprint = fingerprint.to_string();
        let now = now_millis();
        let expires_at = now + ttl.as_millis() as i64;
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO revoked_tokens (token_hash, kind, expires_at, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(token_hash, kind)
                 DO UPDATE SET expires_at = MAX(expires_at, excluded.expires_at)",
                params![fingerprint, kind.as_str(), expires_at, now],
            )
            .map(|_| ())
        })
        .await
    }

    async fn is_revoked(&self, fingerprint: &str, kind: TokenKind) -> AuthResult<bool> {
        check_fingerprint(fingerprint)?;
        let fingerprint = fingerprint.to_string();
        let now = now_millis();
        self.call(move |conn| {
            conn.query_row(
                "SELECT 1 FROM revoked_tokens
                 WHERE token_hash = ?1 AND kind = ?2 AND expires_at > ?3",
                params![fingerprint, kind.as_str(), now],
                |_| Ok(()),
            )
            .optional()
            .map(|row| row.is_some())
        })
        .await
    }

    async fn mark_rotated_atomic(&self, fingerprint: &str, ttl: Duration) -> AuthResult<bool> {
        check_entry_args(fingerprint, ttl)?;
        let fingerprint = fingerprint.to_string();
        let now = now_millis();
        let expires_at = now + ttl.as_millis() as i64;
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO rotated_tokens (token_hash, expires_at, created_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(token_hash) DO NOTHING",
                params![fingerprint, expires_at, now],
            )
            .map(|inserted| inserted == 1)
        })
        .await
    }

    async fn is_rotated(&self, fingerprint: &str) -> AuthResult<bool> {
        check_fingerprint(fingerprint)?;
        let fingerprint = fingerprint.to_string();
        let now = now_millis();
        self.call(move |conn| {
            conn.query_row(
                "SELECT 1 FROM rotated_tokens WHERE token_hash = ?1 AND expires_at > ?2",
                params![fingerprint, now],
                |_| Ok(()),
            )
            .optional()
            .map(|row| row.is_some())
        })
        .await
    }

    async fn rotation_ttl(&self, fingerprint: &str) -> AuthResult<Duration> {
        check_fingerprint(fingerprint)?;
        let fingerprint = fingerprint.to_string();
        let now = now_millis();
        self.call(move |conn| {
            let expires_at: Option<i64> = conn
                .query_row(
                    "SELECT expires_at FROM rotated_tokens WHERE token_hash = ?1",
                    params![fingerprint],
                    |row| row.get(0),
                )
                .optional()?;
            let remaining = expires_at.map(|at| at - now).unwrap_or(0);
            Ok(Duration::from_millis(remaining.max(0) as u64))
        })
        .await
    }

    async fn cleanup_expired_revoked(&self, kind: TokenKind) -> AuthResult<u64> {
        let now = now_millis();
        self.call(move |conn| {
            conn.execute(
                "DELETE FROM revoked_tokens WHERE kind = ?1 AND expires_at <= ?2",
                params![kind.as_str(), now],
            )
            .map(|removed| removed as u64)
        })
        .await
    }

    async fn cleanup_expired_rotated(&self) -> AuthResult<u64> {
        let now = now_millis();
        self.call(move |conn| {
            conn.execute(
                "DELETE FROM rotated_tokens WHERE expires_at <= ?1",
                params![now],
            )
            .map(|removed| removed as u64)
        })
        .await
    }

    async fn close(&self) -> AuthResult<()> {
        // Connection is dropped with the store; SQLite needs no explicit
        // shutdown beyond flushing, which drop performs.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FP: &str = "bb22";

    #[tokio::test]
    async fn schema_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("tokens.sqlite3");
        {
            let store = SqliteStore::open(&path).expect("open");
            store
                .mark_revoked(FP, TokenKind::Access, Duration::from_secs(60))
                .await
                .expect("mark revoked");
        }
        let store = SqliteStore::open(&path).expect("reopen");
        assert!(store.is_revoked(FP, TokenKind::Access).await.expect("query"));
    }

    #[tokio::test]
    async fn rotation_cas_uses_affected_rows() {
        let store = SqliteStore::open_in_memory().expect("open");
        assert!(store
            .mark_rotated_atomic(FP, Duration::from_secs(60))
            .await
            .expect("first cas"));
        assert!(!store
            .mark_rotated_atomic(FP, Duration::from_secs(60))
            .await
            .expect("second cas"));
    }

    #[tokio::test]
    async fn expired_rotation_entry_still_fails_cas() {
        let store = SqliteStore::open_in_memory().expect("open");
        assert!(store
            .mark_rotated_atomic(FP, Duration::from_millis(20))
            .await
            .expect("first cas"));
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(!store.is_rotated(FP).await.expect("expired lookup"));
        assert!(!store
            .mark_rotated_atomic(FP, Duration::from_secs(60))
            .await
            .expect("cas against expired entry"));

        assert_eq!(
            store.cleanup_expired_rotated().await.expect("cleanup"),
            1
        );
        assert!(store
            .mark_rotated_atomic(FP, Duration::from_secs(60))
            .await
            .expect("cas after cleanup"));
    }

    #[tokio::test]
    async fn revocation_upsert_keeps_longest_expiry() {
        let store = SqliteStore::open_in_memory().expect("open");
        store
            .mark_revoked(FP, TokenKind::Refresh, Duration::from_secs(60))
            .await
            .expect("long ttl");
        store
            .mark_revoked(FP, TokenKind::Refresh, Duration::from_millis(150))
            .await
            .expect("short ttl");
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(store
            .is_revoked(FP, TokenKind::Refresh)
            .await
            .expect("still revoked"));
    }

    #[tokio::test]
    async fn guards_reject_bad_arguments() {
        let store = SqliteStore::open_in_memory().expect("open");
        assert!(store
            .mark_revoked(" ", TokenKind::Access, Duration::from_secs(1))
            .await
            .is_err());
        assert!(store
            .mark_rotated_atomic(FP, Duration::ZERO)
            .await
            .is_err());
        assert!(store.is_rotated("").await.is_err());
    }
}
