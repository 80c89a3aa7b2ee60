use super::{ensure_live, TokenEngine};
use crate::claims::{now_unix, TokenKind};
use crate::envelope::{decode_unverified_payload, fingerprint};
use crate::error::{AuthError, AuthResult, ErrorKind};
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

impl TokenEngine {
    pub async fn revoke_access(
        &self,
        envelope: &str,
        cancel: &CancellationToken,
    ) -> AuthResult<()> {
        self.revoke(envelope, TokenKind::Access, cancel).await
    }

    pub async fn revoke_refresh(
        &self,
        envelope: &str,
        cancel: &CancellationToken,
    ) -> AuthResult<()> {
        self.revoke(envelope, TokenKind::Refresh, cancel).await
    }

    /// Decode-only: revocation must accept envelopes whose signature can no
    /// longer be verified. Idempotent; re-revoking never shortens the
    /// stored window.
    async fn revoke(
        &self,
        envelope: &str,
        kind: TokenKind,
        cancel: &CancellationToken,
    ) -> AuthResult<()> {
        ensure_live(cancel)?;
        let inner = &self.inner;
        let store = match &inner.store {
            Some(store) if inner.config.revocation_enabled => store,
            _ => {
                return Err(AuthError::new(
                    ErrorKind::RevocationDisabled,
                    "revocation is not enabled",
                ))
            }
        };

        let payload = decode_unverified_payload(envelope)?;
        let expires_at = payload
            .get("exp")
            .and_then(Value::as_i64)
            .ok_or_else(|| AuthError::malformed_claims("payload is missing an integer exp claim"))?;

        let remaining = expires_at - now_unix();
        if remaining <= 0 {
            // Already expired; there is nothing left to deny.
            return Ok(());
        }

        ensure_live(cancel)?;
        store
            .mark_revoked(
                &fingerprint(envelope),
                kind,
                Duration::from_secs(remaining as u64),
            )
            .await?;
        info!(kind = %kind, "token revoked");
        Ok(())
    }
}
