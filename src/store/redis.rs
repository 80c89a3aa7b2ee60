use super::{check_entry_args, check_fingerprint, TokenStore};
use crate::claims::TokenKind;
use crate::error::{AuthError, AuthResult};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;

/// Upper bound on keys touched per supplemental cleanup pass.
const CLEANUP_BATCH: usize = 100;

/// Key-value backend with native per-entry TTL. One key per entry; rotation
/// relies on `SET NX` as the set-if-absent primitive, so the CAS happens on
/// the server.
pub struct RedisStore {
    conn: ConnectionManager,
    namespace: String,
}

impl RedisStore {
    pub async fn connect(url: &str) -> AuthResult<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| AuthError::storage(format!("invalid redis url: {e}")))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| AuthError::storage(format!("failed to connect to redis: {e}")))?;
        Ok(Self::new(conn))
    }

    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            namespace: "tokensmith".to_string(),
        }
    }

    fn revoked_key(&self, fingerprint: &str, kind: TokenKind) -> String {
        format!("{}:revoked:{}:{}", self.namespace, kind.as_str(), fingerprint)
    }

    fn rotated_key(&self, fingerprint: &str) -> String {
        format!("{}:rotated:{}", self.namespace, fingerprint)
    }

    /// One bounded SCAN pass deleting keys that lost their TTL. Native
    /// eviction does the real work; this sweeps stragglers (e.g. keys
    /// PERSISTed by an operator).
    async fn cleanup_pattern(&self, pattern: &str) -> AuthResult<u64> {
        let mut conn = self.conn.clone();
        let (_, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(0)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(CLEANUP_BATCH)
            .query_async(&mut conn)
            .await
            .map_err(|e| AuthError::storage(e.to_string()))?;

        let mut removed = 0u64;
        for key in keys.iter().take(CLEANUP_BATCH) {
            let ttl: i64 = conn
                .pttl(key)
                .await
                .map_err(|e| AuthError::storage(e.to_string()))?;
            if ttl == -1 {
                let _: () = conn
                    .del(key)
                    .await
                    .map_err(|e| AuthError::storage(e.to_string()))?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[async_trait]
impl TokenStore for RedisStore {
    async fn mark_revoked(
        &self,
        fingerprint: &str,
        kind: TokenKind,
        ttl: Duration,
    ) -> AuthResult<()> {
        check_entry_args(fingerprint, ttl)?;
        let key = self.revoked_key(fingerprint, kind);
        let mut conn = self.conn.clone();

        // Upsert must never shorten the window: keep whichever TTL is longer.
        let existing: i64 = conn
            .pttl(&key)
            .await
            .map_err(|e| AuthError::storage(e.to_string()))?;
        let requested = ttl.as_millis() as i64;
        let px = requested.max(existing);

        let _: () = redis::cmd("SET")
            .arg(&key)
            .arg(1)
            .arg("PX")
            .arg(px)
            .query_async(&mut conn)
            .await
            .map_err(|e| AuthError::storage(e.to_string()))?;
        Ok(())
    }

    async fn is_revoked(&self, fingerprint: &str, kind: TokenKind) -> AuthResult<bool> {
        check_fingerprint(fingerprint)?;
        let mut conn = self.conn.clone();
        conn.exists(self.revoked_key(fingerprint, kind))
            .await
            .map_err(|e| AuthError::storage(e.to_string()))
    }

    async fn mark_rotated_atomic(&self, fingerprint: &str, ttl: Duration) -> AuthResult<bool> {
        check_entry_args(fingerprint, ttl)?;
        let mut conn = self.conn.clone();
        let outcome: Option<String> = redis::cmd("SET")
            .arg(self.rotated_key(fingerprint))
            .arg(1)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis() as i64)
            .query_async(&mut conn)
            .await
            .map_err(|e| AuthError::storage(e.to_string()))?;
        Ok(outcome.is_some())
    }

    async fn is_rotated(&self, fingerprint: &str) -> AuthResult<bool> {
        check_fingerprint(fingerprint)?;
        let mut conn = self.conn.clone();
        conn.exists(self.rotated_key(fingerprint))
            .await
            .map_err(|e| AuthError::storage(e.to_string()))
    }

    async fn rotation_ttl(&self, fingerprint: &str) -> AuthResult<Duration> {
        check_fingerprint(fingerprint)?;
        let mut conn = self.conn.clone();
        let ttl: i64 = conn
            .pttl(self.rotated_key(fingerprint))
            .await
            .map_err(|e| AuthError::storage(e.to_string()))?;
        Ok(Duration::from_millis(ttl.max(0) as u64))
    }

    async fn cleanup_expired_revoked(&self, kind: TokenKind) -> AuthResult<u64> {
        let pattern = format!("{}:revoked:{}:*", self.namespace, kind.as_str());
        self.cleanup_pattern(&pattern).await
    }

    async fn cleanup_expired_rotated(&self) -> AuthResult<u64> {
        let pattern = format!("{}:rotated:*", self.namespace);
        self.cleanup_pattern(&pattern).await
    }

    async fn close(&self) -> AuthResult<()> {
        // ConnectionManager tears down with the last clone.
        Ok(())
    }
}
