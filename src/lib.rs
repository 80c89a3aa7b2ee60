//! Server-side JWT lifecycle engine.
//!
//! `tokensmith` issues, verifies, revokes, and atomically rotates two token
//! classes (short-lived access, long-lived refresh) over a pluggable
//! repository that tracks revocation and single-use rotation state.
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokensmith::{EngineConfig, MemoryStore, TokenEngine};
//! use tokio_util::sync::CancellationToken;
//! use uuid::Uuid;
//!
//! # async fn demo() -> tokensmith::AuthResult<()> {
//! let config = EngineConfig {
//!     symmetric_key: Some("0123456789abcdef0123456789abcdef".into()),
//!     issuer: "auth.example".into(),
//!     audience: vec!["api.example".into()],
//!     revocation_enabled: true,
//!     rotation_enabled: true,
//!     ..EngineConfig::default()
//! };
//! let engine = TokenEngine::with_store(config, Arc::new(MemoryStore::new()))?;
//!
//! let cancel = CancellationToken::new();
//! let roles = vec!["user".to_string()];
//! let issued = engine
//!     .issue_access(Uuid::new_v4(), "alice", &roles, Uuid::new_v4(), &cancel)
//!     .await?;
//! let claims = engine.verify_access(&issued.envelope, &cancel).await?;
//! assert_eq!(claims.subject, issued.claims.subject);
//! engine.close().await;
//! # Ok(())
//! # }
//! ```
//!
//! Repository-backed state stores SHA-256 fingerprints of envelopes, never
//! the envelopes themselves. Four backends share one contract: in-memory,
//! SQLite, and (feature-gated) redis and MongoDB.

pub mod algorithm;
pub mod claims;
pub mod config;
pub mod engine;
pub mod error;
#[cfg(feature = "keygen")]
pub mod keygen;
pub mod store;

mod envelope;
mod keys;
mod sweeper;

pub use algorithm::{AlgorithmFamily, EcCurve, SigningMethod, TokenAlgorithm};
pub use claims::{AccessClaims, RefreshClaims, TokenKind};
pub use config::EngineConfig;
pub use engine::{IssuedAccess, IssuedRefresh, OperatingMode, TokenEngine};
pub use envelope::fingerprint;
pub use error::{AuthError, AuthResult, ErrorKind};
pub use store::{MemoryStore, SqliteStore, TokenStore};
#[cfg(feature = "mongo-backend")]
pub use store::MongoStore;
#[cfg(feature = "redis-backend")]
pub use store::RedisStore;
