use super::{ensure_live, TokenEngine};
use crate::claims::{
    decode_claims, finalize_access, finalize_refresh, now_unix, AccessClaims, DecodedClaims,
    RefreshClaims, TokenKind,
};
use crate::envelope::{fingerprint, verify_signature};
use crate::error::{AuthError, AuthResult, ErrorKind};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Clock-skew budget applied to `iat` and `nbf`. Kept as one constant so a
/// future tolerance for NTP jitter is a single change; `exp` and `mle` stay
/// strict regardless.
const LEEWAY_SECS: i64 = 0;

impl TokenEngine {
    pub async fn verify_access(
        &self,
        envelope: &str,
        cancel: &CancellationToken,
    ) -> AuthResult<AccessClaims> {
        let decoded = self
            .verify_pipeline(envelope, TokenKind::Access, cancel)
            .await?;
        finalize_access(decoded)
    }

    pub async fn verify_refresh(
        &self,
        envelope: &str,
        cancel: &CancellationToken,
    ) -> AuthResult<RefreshClaims> {
        let decoded = self
            .verify_pipeline(envelope, TokenKind::Refresh, cancel)
            .await?;
        finalize_refresh(decoded)
    }

    /// Fixed check order: cancellation, revocation fast-path, signature,
    /// claims decode, temporal, kind, audience/issuer, rotation. The
    /// revocation lookup runs before any cryptography because it keys on
    /// the raw envelope string and short-circuits the expensive path for
    /// already-invalidated tokens.
    async fn verify_pipeline(
        &self,
        envelope: &str,
        expected: TokenKind,
        cancel: &CancellationToken,
    ) -> AuthResult<DecodedClaims> {
        ensure_live(cancel)?;
        let inner = &self.inner;
        let config = &inner.config;

        if config.revocation_enabled {
            if let Some(store) = &inner.store {
                ensure_live(cancel)?;
                if store.is_revoked(&fingerprint(envelope), expected).await? {
                    debug!(kind = %expected, "rejected revoked token");
                    return Err(AuthError::new(ErrorKind::Revoked, "token has been revoked"));
                }
            }
        }

        let payload = verify_signature(
            envelope,
            &config.allowed,
            config.algorithm,
            &inner.keys,
        )?;
        let decoded = decode_claims(&payload, &config.required_claims)?;

        let now = now_unix();
        if decoded.issued_at > now + LEEWAY_SECS {
            return Err(AuthError::new(
                ErrorKind::IssuedInFuture,
                "token issued in the future",
            ));
        }
        if decoded.not_before > now + LEEWAY_SECS {
            return Err(AuthError::new(
                ErrorKind::NotYetValid,
                "token is not yet valid",
            ));
        }
        if decoded.expires_at <= now {
            return Err(AuthError::new(ErrorKind::Expired, "token has expired"));
        }
        if decoded.max_lifetime_at <= now {
            return Err(AuthError::new(
                ErrorKind::MaxLifetimeExceeded,
                "token exceeded its maximum lifetime",
            ));
        }

        if decoded.kind != expected {
            return Err(AuthError::new(
                ErrorKind::WrongTokenKind,
                format!("expected a {expected} token"),
            ));
        }

        if !config.audience.is_empty()
            && !decoded
                .audience
                .iter()
                .any(|aud| config.audience.contains(aud))
        {
            return Err(AuthError::new(
                ErrorKind::AudienceMismatch,
                "token audience does not match",
            ));
        }
        if !config.issuer.is_empty() && decoded.issuer != config.issuer {
            return Err(AuthError::new(
                ErrorKind::IssuerMismatch,
                "token issuer does not match",
            ));
        }

        if expected == TokenKind::Refresh && config.rotation_enabled {
            if let Some(store) = &inner.store {
                ensure_live(cancel)?;
                if store.is_rotated(&fingerprint(envelope)).await? {
                    debug!("rejected rotated refresh token");
                    return Err(AuthError::new(
                        ErrorKind::Rotated,
                        "refresh token has already been rotated",
                    ));
                }
            }
        }

        Ok(decoded)
    }
}
