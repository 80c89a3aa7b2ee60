//! Storage abstraction for revocation and single-use rotation state.
//!
//! Every backend stores fingerprints only, never envelopes, and satisfies
//! the same atomicity and TTL semantics; the engine is written against
//! [`TokenStore`] and never a concrete backend.

use crate::claims::TokenKind;
use crate::error::{AuthError, AuthResult};
use async_trait::async_trait;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub mod memory;
#[cfg(feature = "mongo-backend")]
pub mod mongo;
#[cfg(feature = "redis-backend")]
pub mod redis;
pub mod sqlite;

pub use memory::MemoryStore;
#[cfg(feature = "mongo-backend")]
pub use mongo::MongoStore;
#[cfg(feature = "redis-backend")]
pub use redis::RedisStore;
pub use sqlite::SqliteStore;

/// Repository contract shared by all backends.
///
/// `mark_rotated_atomic` is the compare-and-set primitive rotation
/// correctness rests on: it returns `true` iff this call inserted the entry.
/// An existing entry, expired or not, makes it return `false`; replay
/// detection must survive TTL boundaries shorter than envelope validity.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Idempotent upsert keyed by `(fingerprint, kind)`. The stored expiry
    /// only ever grows: `max(existing, now + ttl)`.
    async fn mark_revoked(
        &self,
        fingerprint: &str,
        kind: TokenKind,
        ttl: Duration,
    ) -> AuthResult<()>;

    /// True iff a non-expired entry for `(fingerprint, kind)` exists.
    async fn is_revoked(&self, fingerprint: &str, kind: TokenKind) -> AuthResult<bool>;

    /// CAS insert keyed by fingerprint; `true` iff newly inserted.
    async fn mark_rotated_atomic(&self, fingerprint: &str, ttl: Duration) -> AuthResult<bool>;

    /// True iff a non-expired rotation entry exists.
    async fn is_rotated(&self, fingerprint: &str) -> AuthResult<bool>;

    /// Remaining rotation TTL; zero if absent or expired.
    async fn rotation_ttl(&self, fingerprint: &str) -> AuthResult<Duration>;

    /// Remove expired revocation entries of one kind; returns the count.
    async fn cleanup_expired_revoked(&self, kind: TokenKind) -> AuthResult<u64>;

    /// Remove expired rotation entries; returns the count.
    async fn cleanup_expired_rotated(&self) -> AuthResult<u64>;

    /// Release underlying resources. Idempotent.
    async fn close(&self) -> AuthResult<()>;
}

pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

pub(crate) fn check_fingerprint(fingerprint: &str) -> AuthResult<()> {
    if fingerprint.trim().is_empty() {
        return Err(AuthError::storage("fingerprint must not be empty"));
    }
    Ok(())
}

pub(crate) fn check_entry_args(fingerprint: &str, ttl: Duration) -> AuthResult<()> {
    check_fingerprint(fingerprint)?;
    if ttl.is_zero() {
        return Err(AuthError::storage("ttl must be positive"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_guards_reject_bad_inputs() {
        assert!(check_entry_args("abc", Duration::from_millis(1)).is_ok());
        assert!(check_entry_args("", Duration::from_millis(1)).is_err());
        assert!(check_entry_args("   ", Duration::from_millis(1)).is_err());
        assert!(check_entry_args("abc", Duration::ZERO).is_err());
    }
}
