use super::{check_entry_args, check_fingerprint, now_millis, TokenStore};
use crate::claims::TokenKind;
use crate::error::{AuthError, AuthResult};
use async_trait::async_trait;
use mongodb::bson::{doc, DateTime as BsonDateTime, Document};
use mongodb::error::{ErrorKind as MongoErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{Collection, Database, IndexModel};
use std::time::Duration;

/// Document backend. A TTL index on `expires_at` provides native eviction;
/// the uniqueness of `token_hash` turns the rotation insert into a CAS by
/// translating the duplicate-key error to `false`.
pub struct MongoStore {
    revoked: Collection<Document>,
    rotated: Collection<Document>,
}

impl MongoStore {
    pub async fn new(db: &Database) -> AuthResult<Self> {
        let revoked = db.collection::<Document>("revoked_tokens");
        let rotated = db.collection::<Document>("rotated_tokens");

        create_index(&revoked, doc! { "token_hash": 1, "kind": 1 }, true, false).await?;
        create_index(&revoked, doc! { "expires_at": 1 }, false, true).await?;
        create_index(&rotated, doc! { "token_hash": 1 }, true, false).await?;
        create_index(&rotated, doc! { "expires_at": 1 }, false, true).await?;

        Ok(Self { revoked, rotated })
    }
}

async fn create_index(
    collection: &Collection<Document>,
    keys: Document,
    unique: bool,
    ttl: bool,
) -> AuthResult<()> {
    let mut options = IndexOptions::builder().build();
    if unique {
        options.unique = Some(true);
    }
    if ttl {
        options.expire_after = Some(Duration::ZERO);
    }
    let model = IndexModel::builder().keys(keys).options(options).build();
    collection
        .create_index(model)
        .await
        .map(|_| ())
        .map_err(|e| AuthError::storage(format!("failed to create index: {e}")))
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        MongoErrorKind::Write(WriteFailure::WriteError(write_error))
            if write_error.code == 11000
    )
}

#[async_trait]
impl TokenStore for MongoStore {
    async fn mark_revoked(
        &self,
        fingerprint: &str,
        kind: TokenKind,
        ttl: Duration,
    ) -> AuthResult<()> {
        check_entry_args(fingerprint, ttl)?;
        let now = now_millis();
        let expires_at = BsonDateTime::from_millis(now + ttl.as_millis() as i64);
        self.revoked
            .update_one(
                doc! { "token_hash": fingerprint, "kind": kind.as_str() },
                doc! {
                    "$max": { "expires_at": expires_at },
                    "$setOnInsert": { "created_at": BsonDateTime::from_millis(now) },
                },
            )
            .upsert(true)
            .await
            .map(|_| ())
            .map_err(|e| AuthError::storage(e.to_string()))
    }

    async fn is_revoked(&self, fingerprint: &str, kind: TokenKind) -> AuthResult<bool> {
        check_fingerprint(fingerprint)?;
        let now = BsonDateTime::from_millis(now_millis());
        self.revoked
            .find_one(doc! {
                "token_hash": fingerprint,
                "kind": kind.as_str(),
                "expires_at": { "$gt": now },
            })
            .await
            .map(|found| found.is_some())
            .map_err(|e| AuthError::storage(e.to_string()))
    }

    async fn mark_rotated_atomic(&self, fingerprint: &str, ttl: Duration) -> AuthResult<bool> {
        check_entry_args(fingerprint, ttl)?;
        let now = now_millis();
        let entry = doc! {
            "token_hash": fingerprint,
            "expires_at": BsonDateTime::from_millis(now + ttl.as_millis() as i64),
            "created_at": BsonDateTime::from_millis(now),
        };
        match self.rotated.insert_one(entry).await {
            Ok(_) => Ok(true),
            // An entry awaiting TTL eviction still collides; that is the
            // contract, not a failure.
            Err(err) if is_duplicate_key(&err) => Ok(false),
            Err(err) => Err(AuthError::storage(err.to_string())),
        }
    }

    async fn is_rotated(&self, fingerprint: &str) -> AuthResult<bool> {
        check_fingerprint(fingerprint)?;
        let now = BsonDateTime::from_millis(now_millis());
        self.rotated
            .find_one(doc! {
                "token_hash": fingerprint,
                "expires_at": { "$gt": now },
            })
            .await
            .map(|found| found.is_some())
            .map_err(|e| AuthError::storage(e.to_string()))
    }

    async fn rotation_ttl(&self, fingerprint: &str) -> AuthResult<Duration> {
        check_fingerprint(fingerprint)?;
        let found = self
            .rotated
            .find_one(doc! { "token_hash": fingerprint })
            .await
            .map_err(|e| AuthError::storage(e.to_string()))?;
        let remaining = found
            .and_then(|entry| entry.get_datetime("expires_at").ok().copied())
            .map(|expires_at| expires_at.timestamp_millis() - now_millis())
            .unwrap_or(0);
        Ok(Duration::from_millis(remaining.max(0) as u64))
    }

    async fn cleanup_expired_revoked(&self, kind: TokenKind) -> AuthResult<u64> {
        let now = BsonDateTime::from_millis(now_millis());
        self.revoked
            .delete_many(doc! {
                "kind": kind.as_str(),
                "expires_at": { "$lte": now },
            })
            .await
            .map(|outcome| outcome.deleted_count)
            .map_err(|e| AuthError::storage(e.to_string()))
    }

    async fn cleanup_expired_rotated(&self) -> AuthResult<u64> {
        let now = BsonDateTime::from_millis(now_millis());
        self.rotated
            .delete_many(doc! { "expires_at": { "$lte": now } })
            .await
            .map(|outcome| outcome.deleted_count)
            .map_err(|e| AuthError::storage(e.to_string()))
    }

    async fn close(&self) -> AuthResult<()> {
        // Collections share the client's connection pool, which shuts down
        // when the owning client drops.
        Ok(())
    }
}
