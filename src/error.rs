use std::fmt;

/// Closed set of failure kinds for every public operation.
///
/// Callers typically surface a generic "unauthorized" to end users and log
/// `code()` internally; the kind is the contract, the message is context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidConfig,
    KeyMaterial,
    InvalidInput,
    Cancelled,
    Crypto,
    InvalidSignature,
    AlgorithmNotAllowed,
    MalformedClaims,
    MissingClaim,
    Expired,
    NotYetValid,
    IssuedInFuture,
    MaxLifetimeExceeded,
    WrongTokenKind,
    IssuerMismatch,
    AudienceMismatch,
    Revoked,
    Rotated,
    RevocationDisabled,
    RotationDisabled,
    Storage,
}

/// Error carried by every fallible operation in this crate.
///
/// The message never contains envelope bytes or key material.
#[derive(Debug, Clone)]
pub struct AuthError {
    pub kind: ErrorKind,
    pub message: String,
}

pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidConfig, message)
    }

    pub fn key_material(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::KeyMaterial, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "operation cancelled")
    }

    pub fn crypto(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Crypto, message)
    }

    pub fn invalid_signature(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidSignature, message)
    }

    pub fn algorithm_not_allowed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AlgorithmNotAllowed, message)
    }

    pub fn malformed_claims(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedClaims, message)
    }

    pub fn missing_claim(name: &str) -> Self {
        Self::new(
            ErrorKind::MissingClaim,
            format!("missing required claim: {name}"),
        )
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Storage, message)
    }

    pub fn code(&self) -> &'static str {
        match self.kind {
            ErrorKind::InvalidConfig => "INVALID_CONFIG",
            ErrorKind::KeyMaterial => "KEY_MATERIAL",
            ErrorKind::InvalidInput => "INVALID_INPUT",
            ErrorKind::Cancelled => "CANCELLED",
            ErrorKind::Crypto => "CRYPTO_ERROR",
            ErrorKind::InvalidSignature => "INVALID_SIGNATURE",
            ErrorKind::AlgorithmNotAllowed => "ALGORITHM_NOT_ALLOWED",
            ErrorKind::MalformedClaims => "MALFORMED_CLAIMS",
            ErrorKind::MissingClaim => "MISSING_CLAIM",
            ErrorKind::Expired => "EXPIRED",
            ErrorKind::NotYetValid => "NOT_YET_VALID",
            ErrorKind::IssuedInFuture => "ISSUED_IN_FUTURE",
            ErrorKind::MaxLifetimeExceeded => "MAX_LIFETIME_EXCEEDED",
            ErrorKind::WrongTokenKind => "WRONG_TOKEN_KIND",
            ErrorKind::IssuerMismatch => "ISSUER_MISMATCH",
            ErrorKind::AudienceMismatch => "AUDIENCE_MISMATCH",
            ErrorKind::Revoked => "REVOKED",
            ErrorKind::Rotated => "ROTATED",
            ErrorKind::RevocationDisabled => "REVOCATION_DISABLED",
            ErrorKind::RotationDisabled => "ROTATION_DISABLED",
            ErrorKind::Storage => "STORAGE_ERROR",
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AuthError {}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind as JwtErr;
        match err.kind() {
            JwtErr::InvalidSignature => AuthError::invalid_signature(err.to_string()),
            JwtErr::ExpiredSignature => AuthError::new(ErrorKind::Expired, err.to_string()),
            JwtErr::ImmatureSignature => AuthError::new(ErrorKind::NotYetValid, err.to_string()),
            JwtErr::MissingRequiredClaim(name) => AuthError::missing_claim(name),
            JwtErr::InvalidIssuer => AuthError::new(ErrorKind::IssuerMismatch, err.to_string()),
            JwtErr::InvalidAudience => AuthError::new(ErrorKind::AudienceMismatch, err.to_string()),
            JwtErr::InvalidToken | JwtErr::Base64(_) | JwtErr::Json(_) | JwtErr::Utf8(_) => {
                AuthError::malformed_claims(err.to_string())
            }
            JwtErr::InvalidAlgorithm
            | JwtErr::MissingAlgorithm
            | JwtErr::InvalidAlgorithmName => AuthError::algorithm_not_allowed(err.to_string()),
            JwtErr::InvalidKeyFormat
            | JwtErr::InvalidEcdsaKey
            | JwtErr::InvalidRsaKey(_) => AuthError::key_material(err.to_string()),
            JwtErr::RsaFailedSigning | JwtErr::Crypto(_) => AuthError::crypto(err.to_string()),
            _ => AuthError::crypto(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AuthError, ErrorKind};

    #[test]
    fn codes_match_kinds() {
        assert_eq!(AuthError::invalid_config("x").code(), "INVALID_CONFIG");
        assert_eq!(AuthError::key_material("x").code(), "KEY_MATERIAL");
        assert_eq!(AuthError::cancelled().code(), "CANCELLED");
        assert_eq!(AuthError::invalid_signature("x").code(), "INVALID_SIGNATURE");
        assert_eq!(
            AuthError::new(ErrorKind::Rotated, "x").code(),
            "ROTATED"
        );
        assert_eq!(
            AuthError::new(ErrorKind::RevocationDisabled, "x").code(),
            "REVOCATION_DISABLED"
        );
    }

    #[test]
    fn jwt_errors_map_to_kinds() {
        let err = jsonwebtoken::errors::Error::from(
            jsonwebtoken::errors::ErrorKind::InvalidSignature,
        );
        assert_eq!(AuthError::from(err).kind, ErrorKind::InvalidSignature);

        let err = jsonwebtoken::errors::Error::from(
            jsonwebtoken::errors::ErrorKind::ExpiredSignature,
        );
        assert_eq!(AuthError::from(err).kind, ErrorKind::Expired);

        let err = jsonwebtoken::errors::Error::from(
            jsonwebtoken::errors::ErrorKind::MissingRequiredClaim("sid".to_string()),
        );
        let mapped = AuthError::from(err);
        assert_eq!(mapped.kind, ErrorKind::MissingClaim);
        assert!(mapped.message.contains("sid"));
    }

    #[test]
    fn display_is_message_only() {
        let err = AuthError::invalid_input("subject must not be nil");
        assert_eq!(err.to_string(), "subject must not be nil");
    }
}
