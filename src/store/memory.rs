use super::{check_entry_args, check_fingerprint, now_millis, TokenStore};
use crate::claims::TokenKind;
use crate::error::AuthResult;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

/// Process-local backend. Entries expire lazily on read; the background
/// sweeper reclaims the memory of entries nobody asks about again.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    /// `(fingerprint, kind)` to expiry in unix millis.
    revoked: HashMap<(String, TokenKind), i64>,
    /// Fingerprint to expiry in unix millis.
    rotated: HashMap<String, i64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn mark_revoked(
        &self,
        fingerprint: &str,
        kind: TokenKind,
        ttl: Duration,
    ) -> AuthResult<()> {
        check_entry_args(fingerprint, ttl)?;
        let expires_at = now_millis() + ttl.as_millis() as i64;
        let mut state = self.state.write().await;
        let entry = state
            .revoked
            .entry((fingerprint.to_string(), kind))
            .or_insert(expires_at);
        if *entry < expires_at {
            *entry = expires_at;
        }
        Ok(())
    }

    async fn is_revoked(&self, fingerprint: &str, kind: TokenKind) -> AuthResult<bool> {
        check_fingerprint(fingerprint)?;
        let state = self.state.read().await;
        Ok(state
            .revoked
            .get(&(fingerprint.to_string(), kind))
            .is_some_and(|expires_at| *expires_at > now_millis()))
    }

    async fn mark_rotated_atomic(&self, fingerprint: &str, ttl: Duration) -> AuthResult<bool> {
        check_entry_args(fingerprint, ttl)?;
        let expires_at = now_millis() + ttl.as_millis() as i64;
        let mut state = self.state.write().await;
        if state.rotated.contains_key(fingerprint) {
            return Ok(false);
        }
        state.rotated.insert(fingerprint.to_string(), expires_at);
        Ok(true)
    }

    async fn is_rotated(&self, fingerprint: &str) -> AuthResult<bool> {
        check_fingerprint(fingerprint)?;
        let state = self.state.read().await;
        Ok(state
            .rotated
            .get(fingerprint)
            .is_some_and(|expires_at| *expires_at > now_millis()))
    }

    async fn rotation_ttl(&self, fingerprint: &str) -> AuthResult<Duration> {
        check_fingerprint(fingerprint)?;
        let state = self.state.read().await;
        let remaining = state
            .rotated
            .get(fingerprint)
            .map(|expires_at| expires_at - now_millis())
            .unwrap_or(0);
        Ok(Duration::from_millis(remaining.max(0) as u64))
    }

    async fn cleanup_expired_revoked(&self, kind: TokenKind) -> AuthResult<u64> {
        let now = now_millis();
        let mut state = self.state.write().await;
        let before = state.revoked.len();
        state
            .revoked
            .retain(|(_, entry_kind), expires_at| *entry_kind != kind || *expires_at > now);
        Ok((before - state.revoked.len()) as u64)
    }

    async fn cleanup_expired_rotated(&self) -> AuthResult<u64> {
        let now = now_millis();
        let mut state = self.state.write().await;
        let before = state.rotated.len();
        state.rotated.retain(|_, expires_at| *expires_at > now);
        Ok((before - state.rotated.len()) as u64)
    }

    async fn close(&self) -> AuthResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FP: &str = "aa11";

    #[tokio::test]
    async fn revocation_upsert_never_shortens_expiry() {
        let store = MemoryStore::new();
        store
            .mark_revoked(FP, TokenKind::Access, Duration::from_secs(60))
            .await
            .expect("mark revoked");
        store
            .mark_revoked(FP, TokenKind::Access, Duration::from_millis(200))
            .await
            .expect("mark revoked again");

        let state = store.state.read().await;
        let expires_at = state.revoked[&(FP.to_string(), TokenKind::Access)];
        assert!(expires_at > now_millis() + 30_000);
    }

    #[tokio::test]
    async fn revocation_is_scoped_by_kind() {
        let store = MemoryStore::new();
        store
            .mark_revoked(FP, TokenKind::Refresh, Duration::from_secs(60))
            .await
            .expect("mark revoked");
        assert!(store.is_revoked(FP, TokenKind::Refresh).await.expect("query"));
        assert!(!store.is_revoked(FP, TokenKind::Access).await.expect("query"));
    }

    #[tokio::test]
    async fn rotation_cas_inserts_exactly_once() {
        let store = MemoryStore::new();
        assert!(store
            .mark_rotated_atomic(FP, Duration::from_secs(60))
            .await
            .expect("first cas"));
        assert!(!store
            .mark_rotated_atomic(FP, Duration::from_secs(60))
            .await
            .expect("second cas"));
        assert!(store.is_rotated(FP).await.expect("query"));
        let ttl = store.rotation_ttl(FP).await.expect("ttl");
        assert!(ttl > Duration::from_secs(50));
    }

    #[tokio::test]
    async fn expired_rotation_entry_still_fails_cas() {
        let store = MemoryStore::new();
        assert!(store
            .mark_rotated_atomic(FP, Duration::from_millis(20))
            .await
            .expect("first cas"));
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(!store.is_rotated(FP).await.expect("expired lookup"));
        assert_eq!(
            store.rotation_ttl(FP).await.expect("ttl"),
            Duration::ZERO
        );
        assert!(!store
            .mark_rotated_atomic(FP, Duration::from_secs(60))
            .await
            .expect("cas against expired entry"));
    }

    #[tokio::test]
    async fn cleanup_removes_only_expired_entries() {
        let store = MemoryStore::new();
        store
            .mark_revoked("gone", TokenKind::Access, Duration::from_millis(20))
            .await
            .expect("short entry");
        store
            .mark_revoked("kept", TokenKind::Access, Duration::from_secs(60))
            .await
            .expect("long entry");
        store
            .mark_rotated_atomic("gone", Duration::from_millis(20))
            .await
            .expect("rotation entry");
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(
            store
                .cleanup_expired_revoked(TokenKind::Access)
                .await
                .expect("cleanup revoked"),
            1
        );
        assert_eq!(
            store.cleanup_expired_rotated().await.expect("cleanup rotated"),
            1
        );
        assert!(store.is_revoked("kept", TokenKind::Access).await.expect("query"));
        // Once swept, the fingerprint becomes rotatable again.
        assert!(store
            .mark_rotated_atomic("gone", Duration::from_secs(60))
            .await
            .expect("cas after sweep"));
    }
}
