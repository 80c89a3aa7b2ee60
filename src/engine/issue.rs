use super::{ensure_live, TokenEngine};
use crate::claims::{now_unix, AccessClaims, RefreshClaims, WirePayload, MAX_USERNAME_BYTES};
use crate::envelope::sign_payload;
use crate::error::{AuthError, AuthResult, ErrorKind};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

/// Issued access token: the signed envelope plus the claims it carries.
/// Owned by the caller; the engine keeps nothing.
#[derive(Debug, Clone)]
pub struct IssuedAccess {
    pub envelope: String,
    pub claims: AccessClaims,
}

#[derive(Debug, Clone)]
pub struct IssuedRefresh {
    pub envelope: String,
    pub claims: RefreshClaims,
}

impl TokenEngine {
    pub async fn issue_access(
        &self,
        subject: Uuid,
        username: &str,
        roles: &[String],
        session: Uuid,
        cancel: &CancellationToken,
    ) -> AuthResult<IssuedAccess> {
        ensure_live(cancel)?;
        check_subject_inputs(subject, username, session)?;
        if roles.is_empty() {
            return Err(AuthError::invalid_input("at least one role is required"));
        }
        if roles.iter().any(|role| role.is_empty()) {
            return Err(AuthError::invalid_input(
                "roles must not contain empty entries",
            ));
        }

        let config = &self.inner.config;
        let now = now_unix();
        let claims = AccessClaims {
            jti: Uuid::new_v4(),
            subject,
            session,
            username: username.to_string(),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            roles: roles.to_vec(),
            issued_at: now,
            not_before: now,
            expires_at: now + config.access_expiry.as_secs() as i64,
            max_lifetime_at: now + config.access_max_lifetime.as_secs() as i64,
        };

        let envelope = self.sign(&WirePayload::from_access(&claims))?;
        debug!(jti = %claims.jti, "issued access token");
        Ok(IssuedAccess { envelope, claims })
    }

    pub async fn issue_refresh(
        &self,
        subject: Uuid,
        username: &str,
        session: Uuid,
        cancel: &CancellationToken,
    ) -> AuthResult<IssuedRefresh> {
        ensure_live(cancel)?;
        check_subject_inputs(subject, username, session)?;

        let config = &self.inner.config;
        let now = now_unix();
        let claims = RefreshClaims {
            jti: Uuid::new_v4(),
            subject,
            session,
            username: username.to_string(),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            issued_at: now,
            not_before: now,
            expires_at: now + config.refresh_expiry.as_secs() as i64,
            max_lifetime_at: now + config.refresh_max_lifetime.as_secs() as i64,
        };

        let envelope = self.sign(&WirePayload::from_refresh(&claims))?;
        debug!(jti = %claims.jti, "issued refresh token");
        Ok(IssuedRefresh { envelope, claims })
    }

    fn sign(&self, payload: &WirePayload<'_>) -> AuthResult<String> {
        sign_payload(self.inner.config.algorithm, payload, &self.inner.keys).map_err(|err| {
            match err.kind {
                ErrorKind::Crypto => err,
                _ => AuthError::crypto(err.message),
            }
        })
    }
}

fn check_subject_inputs(subject: Uuid, username: &str, session: Uuid) -> AuthResult<()> {
    if subject.is_nil() {
        return Err(AuthError::invalid_input("subject must not be the nil UUID"));
    }
    if session.is_nil() {
        return Err(AuthError::invalid_input("session must not be the nil UUID"));
    }
    if username.len() > MAX_USERNAME_BYTES {
        return Err(AuthError::invalid_input(format!(
            "username exceeds {MAX_USERNAME_BYTES} bytes"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn engine() -> TokenEngine {
        TokenEngine::new(EngineConfig {
            symmetric_key: Some("0123456789abcdef0123456789abcdef".to_string()),
            issuer: "auth.test".to_string(),
            audience: vec!["api.test".to_string()],
            ..EngineConfig::default()
        })
        .expect("engine")
    }

    fn role(name: &str) -> Vec<String> {
        vec![name.to_string()]
    }

    #[tokio::test]
    async fn issue_access_stamps_config_and_timestamps() {
        let engine = engine();
        let cancel = CancellationToken::new();
        let subject = Uuid::new_v4();
        let session = Uuid::new_v4();

        let issued = engine
            .issue_access(subject, "alice", &role("user"), session, &cancel)
            .await
            .expect("issue access");

        assert_eq!(issued.claims.subject, subject);
        assert_eq!(issued.claims.session, session);
        assert_eq!(issued.claims.issuer, "auth.test");
        assert_eq!(issued.claims.audience, vec!["api.test".to_string()]);
        assert_eq!(issued.claims.issued_at, issued.claims.not_before);
        assert_eq!(
            issued.claims.expires_at - issued.claims.issued_at,
            15 * 60
        );
        assert!(issued.claims.validate().is_ok());
        assert_eq!(issued.envelope.split('.').count(), 3);
    }

    #[tokio::test]
    async fn issue_rejects_invalid_inputs() {
        let engine = engine();
        let cancel = CancellationToken::new();
        let subject = Uuid::new_v4();
        let session = Uuid::new_v4();

        let err = engine
            .issue_access(Uuid::nil(), "alice", &role("user"), session, &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidInput);

        let err = engine
            .issue_access(subject, "alice", &[], session, &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidInput);

        let err = engine
            .issue_access(subject, "alice", &role(""), session, &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidInput);

        let long_name = "x".repeat(MAX_USERNAME_BYTES + 1);
        let err = engine
            .issue_refresh(subject, &long_name, session, &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidInput);

        let err = engine
            .issue_refresh(subject, "alice", Uuid::nil(), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn issue_honors_cancellation() {
        let engine = engine();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = engine
            .issue_access(
                Uuid::new_v4(),
                "alice",
                &role("user"),
                Uuid::new_v4(),
                &cancel,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Cancelled);
    }
}
