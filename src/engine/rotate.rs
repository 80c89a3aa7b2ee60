use super::issue::IssuedRefresh;
use super::{ensure_live, TokenEngine};
use crate::claims::now_unix;
use crate::envelope::fingerprint;
use crate::error::{AuthError, AuthResult, ErrorKind};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Floor on the rotation entry's TTL so it outlives the envelope even when
/// the envelope is about to expire.
const MIN_ROTATION_TTL: Duration = Duration::from_millis(100);

impl TokenEngine {
    /// Single-use exchange of a refresh envelope for a fresh one.
    ///
    /// The old envelope is verified first, so a revoked token fails
    /// `Revoked` before the rotation CAS runs. Under concurrent calls on
    /// the same envelope exactly one caller wins the CAS; the rest fail
    /// `Rotated`. The new token preserves subject, username, and session
    /// and gets a freshly computed maximum lifetime.
    pub async fn rotate_refresh(
        &self,
        envelope: &str,
        cancel: &CancellationToken,
    ) -> AuthResult<IssuedRefresh> {
        ensure_live(cancel)?;
        let inner = &self.inner;
        let store = match &inner.store {
            Some(store) if inner.config.rotation_enabled => store,
            _ => {
                return Err(AuthError::new(
                    ErrorKind::RotationDisabled,
                    "rotation is not enabled",
                ))
            }
        };

        let old = self.verify_refresh(envelope, cancel).await?;

        let remaining = (old.expires_at - now_unix()).max(0) as u64;
        let ttl = Duration::from_secs(remaining).max(MIN_ROTATION_TTL);

        ensure_live(cancel)?;
        let inserted = store
            .mark_rotated_atomic(&fingerprint(envelope), ttl)
            .await?;
        if !inserted {
            warn!(jti = %old.jti, "refresh rotation lost the single-use race");
            return Err(AuthError::new(
                ErrorKind::Rotated,
                "refresh token has already been rotated",
            ));
        }

        info!(jti = %old.jti, "refresh token rotated");
        self.issue_refresh(old.subject, &old.username, old.session, cancel)
            .await
    }
}
