use crate::error::{AuthError, AuthResult};
use jsonwebtoken::Algorithm;

/// Whether the configured algorithm signs with a shared secret or a key pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningMethod {
    Symmetric,
    Asymmetric,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcCurve {
    P256,
    P384,
    P521,
}

/// The closed algorithm sum. Downstream code matches on this instead of
/// strings; algorithm names only exist at the config boundary and in the
/// wire header. Every variant is backed by `jsonwebtoken` except ES512,
/// which rides a dedicated P-521 signing path ([`TokenAlgorithm::to_backend`]
/// returns `None` for it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenAlgorithm {
    HS256,
    HS384,
    HS512,
    RS256,
    RS384,
    RS512,
    PS256,
    PS384,
    PS512,
    ES256,
    ES384,
    ES512,
    EdDSA,
}

/// Algorithm family derived once from the configured algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgorithmFamily {
    Hmac { bits: u16 },
    RsaPkcs1 { bits: u16 },
    RsaPss { bits: u16 },
    Ecdsa { curve: EcCurve },
    Ed25519,
}

/// Key-compatibility class used by the algorithm-confusion defense: a header
/// algorithm is only acceptable when its class matches the loaded key's
/// class. RSA PKCS#1 and PSS share a key pair; ECDSA curves do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeyFamily {
    Hmac,
    Rsa,
    EcP256,
    EcP384,
    EcP521,
    Ed25519,
}

impl TokenAlgorithm {
    pub fn name(self) -> &'static str {
        match self {
            TokenAlgorithm::HS256 => "HS256",
            TokenAlgorithm::HS384 => "HS384",
            TokenAlgorithm::HS512 => "HS512",
            TokenAlgorithm::RS256 => "RS256",
            TokenAlgorithm::RS384 => "RS384",
            TokenAlgorithm::RS512 => "RS512",
            TokenAlgorithm::PS256 => "PS256",
            TokenAlgorithm::PS384 => "PS384",
            TokenAlgorithm::PS512 => "PS512",
            TokenAlgorithm::ES256 => "ES256",
            TokenAlgorithm::ES384 => "ES384",
            TokenAlgorithm::ES512 => "ES512",
            TokenAlgorithm::EdDSA => "EdDSA",
        }
    }

    /// Exact-name lookup used at the wire boundary. `None` for anything
    /// outside the supported set, including `"none"`.
    pub(crate) fn from_name(name: &str) -> Option<Self> {
        match name {
            "HS256" => Some(TokenAlgorithm::HS256),
            "HS384" => Some(TokenAlgorithm::HS384),
            "HS512" => Some(TokenAlgorithm::HS512),
            "RS256" => Some(TokenAlgorithm::RS256),
            "RS384" => Some(TokenAlgorithm::RS384),
            "RS512" => Some(TokenAlgorithm::RS512),
            "PS256" => Some(TokenAlgorithm::PS256),
            "PS384" => Some(TokenAlgorithm::PS384),
            "PS512" => Some(TokenAlgorithm::PS512),
            "ES256" => Some(TokenAlgorithm::ES256),
            "ES384" => Some(TokenAlgorithm::ES384),
            "ES512" => Some(TokenAlgorithm::ES512),
            "EdDSA" => Some(TokenAlgorithm::EdDSA),
            _ => None,
        }
    }

    /// The `jsonwebtoken` algorithm backing this variant; `None` for ES512,
    /// whose envelope work is done on the P-521 path.
    pub(crate) fn to_backend(self) -> Option<Algorithm> {
        match self {
            TokenAlgorithm::HS256 => Some(Algorithm::HS256),
            TokenAlgorithm::HS384 => Some(Algorithm::HS384),
            TokenAlgorithm::HS512 => Some(Algorithm::HS512),
            TokenAlgorithm::RS256 => Some(Algorithm::RS256),
            TokenAlgorithm::RS384 => Some(Algorithm::RS384),
            TokenAlgorithm::RS512 => Some(Algorithm::RS512),
            TokenAlgorithm::PS256 => Some(Algorithm::PS256),
            TokenAlgorithm::PS384 => Some(Algorithm::PS384),
            TokenAlgorithm::PS512 => Some(Algorithm::PS512),
            TokenAlgorithm::ES256 => Some(Algorithm::ES256),
            TokenAlgorithm::ES384 => Some(Algorithm::ES384),
            TokenAlgorithm::ES512 => None,
            TokenAlgorithm::EdDSA => Some(Algorithm::EdDSA),
        }
    }
}

impl std::fmt::Display for TokenAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

pub fn signing_method_of(alg: TokenAlgorithm) -> SigningMethod {
    match alg {
        TokenAlgorithm::HS256 | TokenAlgorithm::HS384 | TokenAlgorithm::HS512 => {
            SigningMethod::Symmetric
        }
        _ => SigningMethod::Asymmetric,
    }
}

pub fn family_of(alg: TokenAlgorithm) -> AlgorithmFamily {
    match alg {
        TokenAlgorithm::HS256 => AlgorithmFamily::Hmac { bits: 256 },
        TokenAlgorithm::HS384 => AlgorithmFamily::Hmac { bits: 384 },
        TokenAlgorithm::HS512 => AlgorithmFamily::Hmac { bits: 512 },
        TokenAlgorithm::RS256 => AlgorithmFamily::RsaPkcs1 { bits: 256 },
        TokenAlgorithm::RS384 => AlgorithmFamily::RsaPkcs1 { bits: 384 },
        TokenAlgorithm::RS512 => AlgorithmFamily::RsaPkcs1 { bits: 512 },
        TokenAlgorithm::PS256 => AlgorithmFamily::RsaPss { bits: 256 },
        TokenAlgorithm::PS384 => AlgorithmFamily::RsaPss { bits: 384 },
        TokenAlgorithm::PS512 => AlgorithmFamily::RsaPss { bits: 512 },
        TokenAlgorithm::ES256 => AlgorithmFamily::Ecdsa {
            curve: EcCurve::P256,
        },
        TokenAlgorithm::ES384 => AlgorithmFamily::Ecdsa {
            curve: EcCurve::P384,
        },
        TokenAlgorithm::ES512 => AlgorithmFamily::Ecdsa {
            curve: EcCurve::P521,
        },
        TokenAlgorithm::EdDSA => AlgorithmFamily::Ed25519,
    }
}

pub(crate) fn key_family_of(alg: TokenAlgorithm) -> KeyFamily {
    match alg {
        TokenAlgorithm::HS256 | TokenAlgorithm::HS384 | TokenAlgorithm::HS512 => KeyFamily::Hmac,
        TokenAlgorithm::RS256
        | TokenAlgorithm::RS384
        | TokenAlgorithm::RS512
        | TokenAlgorithm::PS256
        | TokenAlgorithm::PS384
        | TokenAlgorithm::PS512 => KeyFamily::Rsa,
        TokenAlgorithm::ES256 => KeyFamily::EcP256,
        TokenAlgorithm::ES384 => KeyFamily::EcP384,
        TokenAlgorithm::ES512 => KeyFamily::EcP521,
        TokenAlgorithm::EdDSA => KeyFamily::Ed25519,
    }
}

/// Config-boundary parser. Rejects `"none"` in any casing explicitly.
pub fn parse_algorithm(name: &str) -> AuthResult<TokenAlgorithm> {
    let trimmed = name.trim();
    if trimmed.eq_ignore_ascii_case("none") {
        return Err(AuthError::invalid_config(
            "the \"none\" algorithm is rejected",
        ));
    }
    TokenAlgorithm::from_name(trimmed).ok_or_else(|| {
        AuthError::invalid_config(format!("unsupported algorithm '{trimmed}'"))
    })
}
