use crate::algorithm::{
    family_of, parse_algorithm, signing_method_of, AlgorithmFamily, SigningMethod, TokenAlgorithm,
};
use crate::error::{AuthError, AuthResult};
use std::path::PathBuf;
use std::time::Duration;

/// Minimum symmetric key length in bytes.
pub const MIN_SYMMETRIC_KEY_BYTES: usize = 32;

/// Claim timestamps are wire-encoded as whole unix seconds, so token
/// durations below one second cannot be represented.
const MIN_TOKEN_DURATION: Duration = Duration::from_secs(1);

/// Construction parameters for a [`crate::TokenEngine`].
///
/// Algorithm names are strings here and nowhere else; `resolve` parses them
/// into the closed [`Algorithm`] sum once.
#[derive(Clone)]
pub struct EngineConfig {
    pub signing_method: SigningMethod,
    pub algorithm: String,
    /// Required for [`SigningMethod::Symmetric`]; used as raw bytes.
    pub symmetric_key: Option<String>,
    /// Required for [`SigningMethod::Asymmetric`]; PEM files.
    pub private_key_path: Option<PathBuf>,
    pub public_key_path: Option<PathBuf>,
    /// Stamped into `iss`; empty disables the issuer check on verification.
    pub issuer: String,
    /// Stamped into `aud`; empty disables the audience check on verification.
    pub audience: Vec<String>,
    /// Verification whitelist. Empty means "configured algorithm only"; a
    /// non-empty list must contain the configured algorithm.
    pub allowed_algorithms: Vec<String>,
    /// Claim names that must be present in verified envelopes, in addition
    /// to the always-mandatory set.
    pub required_claims: Vec<String>,
    pub rotation_enabled: bool,
    pub revocation_enabled: bool,
    pub access_expiry: Duration,
    pub access_max_lifetime: Duration,
    pub refresh_expiry: Duration,
    pub refresh_max_lifetime: Duration,
    /// Informational guard; validated non-negative by construction, not
    /// enforced by the rotation protocol.
    pub refresh_reuse_interval: Duration,
    pub cleanup_interval: Duration,
}

// Manual impl so the symmetric key never reaches logs.
impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("signing_method", &self.signing_method)
            .field("algorithm", &self.algorithm)
            .field(
                "symmetric_key",
                &self.symmetric_key.as_ref().map(|_| "<redacted>"),
            )
            .field("private_key_path", &self.private_key_path)
            .field("public_key_path", &self.public_key_path)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("allowed_algorithms", &self.allowed_algorithms)
            .field("required_claims", &self.required_claims)
            .field("rotation_enabled", &self.rotation_enabled)
            .field("revocation_enabled", &self.revocation_enabled)
            .field("access_expiry", &self.access_expiry)
            .field("access_max_lifetime", &self.access_max_lifetime)
            .field("refresh_expiry", &self.refresh_expiry)
            .field("refresh_max_lifetime", &self.refresh_max_lifetime)
            .field("refresh_reuse_interval", &self.refresh_reuse_interval)
            .field("cleanup_interval", &self.cleanup_interval)
            .finish()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            signing_method: SigningMethod::Symmetric,
            algorithm: "HS256".to_string(),
            symmetric_key: None,
            private_key_path: None,
            public_key_path: None,
            issuer: String::new(),
            audience: Vec::new(),
            allowed_algorithms: Vec::new(),
            required_claims: Vec::new(),
            rotation_enabled: false,
            revocation_enabled: false,
            access_expiry: Duration::from_secs(15 * 60),
            access_max_lifetime: Duration::from_secs(24 * 60 * 60),
            refresh_expiry: Duration::from_secs(7 * 24 * 60 * 60),
            refresh_max_lifetime: Duration::from_secs(30 * 24 * 60 * 60),
            refresh_reuse_interval: Duration::ZERO,
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

/// Frozen output of config validation. Immutable after construction and
/// shared freely across the engine.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedConfig {
    pub algorithm: TokenAlgorithm,
    pub family: AlgorithmFamily,
    pub allowed: Vec<TokenAlgorithm>,
    pub issuer: String,
    pub audience: Vec<String>,
    pub required_claims: Vec<String>,
    pub rotation_enabled: bool,
    pub revocation_enabled: bool,
    pub access_expiry: Duration,
    pub access_max_lifetime: Duration,
    pub refresh_expiry: Duration,
    pub refresh_max_lifetime: Duration,
    pub refresh_reuse_interval: Duration,
    pub cleanup_interval: Duration,
}

impl EngineConfig {
    pub(crate) fn resolve(&self) -> AuthResult<ResolvedConfig> {
        let algorithm = parse_algorithm(&self.algorithm)?;

        if signing_method_of(algorithm) != self.signing_method {
            return Err(AuthError::invalid_config(format!(
                "algorithm {} does not belong to the configured signing method",
                self.algorithm.trim()
            )));
        }

        match self.signing_method {
            SigningMethod::Symmetric => {
                let key = self.symmetric_key.as_deref().ok_or_else(|| {
                    AuthError::invalid_config("symmetric signing requires a symmetric key")
                })?;
                if key.len() < MIN_SYMMETRIC_KEY_BYTES {
                    return Err(AuthError::invalid_config(format!(
                        "symmetric key must be at least {MIN_SYMMETRIC_KEY_BYTES} bytes"
                    )));
                }
            }
            SigningMethod::Asymmetric => {
                if self.private_key_path.is_none() || self.public_key_path.is_none() {
                    return Err(AuthError::invalid_config(
                        "asymmetric signing requires private and public key paths",
                    ));
                }
            }
        }

        for (name, value) in [
            ("access-expiry", self.access_expiry),
            ("access-max-lifetime", self.access_max_lifetime),
            ("refresh-expiry", self.refresh_expiry),
            ("refresh-max-lifetime", self.refresh_max_lifetime),
        ] {
            if value < MIN_TOKEN_DURATION {
                return Err(AuthError::invalid_config(format!(
                    "{name} must be at least one second"
                )));
            }
        }
        if self.cleanup_interval.is_zero() {
            return Err(AuthError::invalid_config(
                "cleanup-interval must be positive",
            ));
        }
        if self.access_expiry > self.access_max_lifetime {
            return Err(AuthError::invalid_config(
                "access-expiry must not exceed access-max-lifetime",
            ));
        }
        if self.refresh_expiry > self.refresh_max_lifetime {
            return Err(AuthError::invalid_config(
                "refresh-expiry must not exceed refresh-max-lifetime",
            ));
        }

        // The configured algorithm is always implicitly allowed; an explicit
        // list that omits it is a misconfiguration, not an override.
        let mut allowed = Vec::with_capacity(self.allowed_algorithms.len() + 1);
        for name in &self.allowed_algorithms {
            let alg = parse_algorithm(name)?;
            if !allowed.contains(&alg) {
                allowed.push(alg);
            }
        }
        if !self.allowed_algorithms.is_empty() && !allowed.contains(&algorithm) {
            return Err(AuthError::invalid_config(
                "allowed-algorithms must contain the configured algorithm",
            ));
        }
        if !allowed.contains(&algorithm) {
            allowed.push(algorithm);
        }

        Ok(ResolvedConfig {
            algorithm,
            family: family_of(algorithm),
            allowed,
            issuer: self.issuer.clone(),
            audience: self.audience.clone(),
            required_claims: self.required_claims.clone(),
            rotation_enabled: self.rotation_enabled,
            revocation_enabled: self.revocation_enabled,
            access_expiry: self.access_expiry,
            access_max_lifetime: self.access_max_lifetime,
            refresh_expiry: self.refresh_expiry,
            refresh_max_lifetime: self.refresh_max_lifetime,
            refresh_reuse_interval: self.refresh_reuse_interval,
            cleanup_interval: self.cleanup_interval,
        })
    }
}
