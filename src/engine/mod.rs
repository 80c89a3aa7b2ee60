mod issue;
mod revoke;
mod rotate;
mod verify;

pub use issue::{IssuedAccess, IssuedRefresh};

use crate::config::{EngineConfig, ResolvedConfig};
use crate::error::{AuthError, AuthResult};
use crate::keys::{load_key_material, KeyMaterial};
use crate::store::TokenStore;
use crate::sweeper::spawn_sweeper;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Derived from construction: a repository makes the engine Stateful and
/// unlocks revocation and rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingMode {
    Stateless,
    Stateful,
}

/// The core handle. Cheap to clone, immutable after construction, safe to
/// share across tasks; multiple engines may coexist in one process.
#[derive(Clone)]
pub struct TokenEngine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for TokenEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenEngine").finish_non_exhaustive()
    }
}

pub(crate) struct EngineInner {
    pub(crate) config: ResolvedConfig,
    pub(crate) keys: KeyMaterial,
    pub(crate) store: Option<Arc<dyn TokenStore>>,
    shutdown: CancellationToken,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl TokenEngine {
    /// Stateless construction: no repository, so revocation and rotation
    /// must be disabled in the configuration.
    pub fn new(config: EngineConfig) -> AuthResult<Self> {
        Self::build(config, None)
    }

    /// Stateful construction. Spawns the background sweeper, so this must
    /// run inside a tokio runtime.
    pub fn with_store(config: EngineConfig, store: Arc<dyn TokenStore>) -> AuthResult<Self> {
        Self::build(config, Some(store))
    }

    fn build(config: EngineConfig, store: Option<Arc<dyn TokenStore>>) -> AuthResult<Self> {
        let resolved = config.resolve()?;
        if store.is_none() && (resolved.rotation_enabled || resolved.revocation_enabled) {
            return Err(AuthError::invalid_config(
                "revocation and rotation require a repository",
            ));
        }
        let keys = load_key_material(&config, resolved.family)?;

        let shutdown = CancellationToken::new();
        let sweeper = store
            .as_ref()
            .map(|store| spawn_sweeper(store.clone(), resolved.cleanup_interval, shutdown.clone()));

        Ok(Self {
            inner: Arc::new(EngineInner {
                config: resolved,
                keys,
                store,
                shutdown,
                sweeper: Mutex::new(sweeper),
            }),
        })
    }

    pub fn mode(&self) -> OperatingMode {
        if self.inner.store.is_some() {
            OperatingMode::Stateful
        } else {
            OperatingMode::Stateless
        }
    }

    /// Informational reuse window from the configuration; not enforced by
    /// the rotation protocol.
    pub fn refresh_reuse_interval(&self) -> Duration {
        self.inner.config.refresh_reuse_interval
    }

    /// Stops the sweeper and releases the repository. Idempotent; clones of
    /// this handle stay usable for stateless work but repository-backed
    /// calls may fail once the store is closed.
    pub async fn close(&self) {
        self.inner.shutdown.cancel();
        let handle = self.inner.sweeper.lock().unwrap().take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                warn!(error = %err, "sweeper task did not shut down cleanly");
            }
        }
        if let Some(store) = &self.inner.store {
            if let Err(err) = store.close().await {
                warn!(error = %err, "repository close failed");
            }
        }
    }
}

pub(crate) fn ensure_live(cancel: &CancellationToken) -> AuthResult<()> {
    if cancel.is_cancelled() {
        return Err(AuthError::cancelled());
    }
    Ok(())
}
