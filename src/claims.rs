use crate::error::{AuthError, AuthResult};
use serde::Serialize;
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Maximum accepted username length in bytes.
pub const MAX_USERNAME_BYTES: usize = 1024;

/// Claims that must be present in every verified envelope, before any
/// caller-configured additions.
pub const MANDATORY_CLAIMS: [&str; 7] = ["jti", "sub", "sid", "iat", "exp", "mle", "typ"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }

    pub(crate) fn from_wire(value: &str) -> Option<Self> {
        match value {
            "access" => Some(TokenKind::Access),
            "refresh" => Some(TokenKind::Refresh),
            _ => None,
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded access-token claims. Timestamps are unix seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessClaims {
    pub jti: Uuid,
    pub subject: Uuid,
    pub session: Uuid,
    pub username: String,
    pub issuer: String,
    pub audience: Vec<String>,
    pub roles: Vec<String>,
    pub issued_at: i64,
    pub not_before: i64,
    pub expires_at: i64,
    pub max_lifetime_at: i64,
}

/// Decoded refresh-token claims: [`AccessClaims`] minus roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshClaims {
    pub jti: Uuid,
    pub subject: Uuid,
    pub session: Uuid,
    pub username: String,
    pub issuer: String,
    pub audience: Vec<String>,
    pub issued_at: i64,
    pub not_before: i64,
    pub expires_at: i64,
    pub max_lifetime_at: i64,
}

impl AccessClaims {
    pub fn kind(&self) -> TokenKind {
        TokenKind::Access
    }

    pub fn validate(&self) -> AuthResult<()> {
        validate_common(
            self.subject,
            self.session,
            &self.username,
            self.issued_at,
            self.not_before,
            self.expires_at,
            self.max_lifetime_at,
        )?;
        if self.roles.is_empty() {
            return Err(AuthError::malformed_claims("roles must not be empty"));
        }
        if self.roles.iter().any(|r| r.is_empty()) {
            return Err(AuthError::malformed_claims("roles must not contain empty entries"));
        }
        Ok(())
    }
}

impl RefreshClaims {
    pub fn kind(&self) -> TokenKind {
        TokenKind::Refresh
    }

    pub fn validate(&self) -> AuthResult<()> {
        validate_common(
            self.subject,
            self.session,
            &self.username,
            self.issued_at,
            self.not_before,
            self.expires_at,
            self.max_lifetime_at,
        )
    }
}

fn validate_common(
    subject: Uuid,
    session: Uuid,
    username: &str,
    iat: i64,
    nbf: i64,
    exp: i64,
    mle: i64,
) -> AuthResult<()> {
    if subject.is_nil() {
        return Err(AuthError::malformed_claims("subject must not be the nil UUID"));
    }
    if session.is_nil() {
        return Err(AuthError::malformed_claims("session must not be the nil UUID"));
    }
    if username.len() > MAX_USERNAME_BYTES {
        return Err(AuthError::malformed_claims(format!(
            "username exceeds {MAX_USERNAME_BYTES} bytes"
        )));
    }
    // iat <= nbf <= exp <= mle, with strictly positive token lifetime.
    if !(iat <= nbf && nbf <= exp && exp <= mle) {
        return Err(AuthError::malformed_claims(
            "temporal claims are out of order",
        ));
    }
    if exp <= iat || mle <= iat {
        return Err(AuthError::malformed_claims(
            "token lifetime must be strictly positive",
        ));
    }
    Ok(())
}

/// Wire object for signing. Short names are fixed by the format:
/// `jti, sub, sid, usr, iss, aud, rls, iat, nbf, exp, mle, typ`.
#[derive(Serialize)]
pub(crate) struct WirePayload<'a> {
    pub jti: String,
    pub sub: String,
    pub sid: String,
    pub usr: &'a str,
    pub iss: &'a str,
    pub aud: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rls: Option<&'a [String]>,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub mle: i64,
    pub typ: &'static str,
}

impl<'a> WirePayload<'a> {
    pub fn from_access(claims: &'a AccessClaims) -> Self {
        WirePayload {
            jti: claims.jti.to_string(),
            sub: claims.subject.to_string(),
            sid: claims.session.to_string(),
            usr: &claims.username,
            iss: &claims.issuer,
            aud: &claims.audience,
            rls: Some(&claims.roles),
            iat: claims.issued_at,
            nbf: claims.not_before,
            exp: claims.expires_at,
            mle: claims.max_lifetime_at,
            typ: TokenKind::Access.as_str(),
        }
    }

    pub fn from_refresh(claims: &'a RefreshClaims) -> Self {
        WirePayload {
            jti: claims.jti.to_string(),
            sub: claims.subject.to_string(),
            sid: claims.session.to_string(),
            usr: &claims.username,
            iss: &claims.issuer,
            aud: &claims.audience,
            rls: None,
            iat: claims.issued_at,
            nbf: claims.not_before,
            exp: claims.expires_at,
            mle: claims.max_lifetime_at,
            typ: TokenKind::Refresh.as_str(),
        }
    }
}

/// Kind-agnostic decode result; the verifier pipeline checks `kind` after
/// the temporal checks so expiry is reported before a kind mismatch.
#[derive(Debug, Clone)]
pub(crate) struct DecodedClaims {
    pub kind: TokenKind,
    pub jti: Uuid,
    pub subject: Uuid,
    pub session: Uuid,
    pub username: String,
    pub issuer: String,
    pub audience: Vec<String>,
    pub roles: Option<Vec<String>>,
    pub issued_at: i64,
    pub not_before: i64,
    pub expires_at: i64,
    pub max_lifetime_at: i64,
}

pub(crate) fn decode_claims(payload: &Value, required: &[String]) -> AuthResult<DecodedClaims> {
    let obj = payload
        .as_object()
        .ok_or_else(|| AuthError::malformed_claims("claims payload must be a JSON object"))?;

    for name in MANDATORY_CLAIMS {
        if !obj.contains_key(name) {
            return Err(AuthError::missing_claim(name));
        }
    }
    for name in required {
        if !obj.contains_key(name.as_str()) {
            return Err(AuthError::missing_claim(name));
        }
    }

    let typ = string_claim(obj, "typ")?;
    let kind = TokenKind::from_wire(&typ)
        .ok_or_else(|| AuthError::malformed_claims(format!("unknown token type '{typ}'")))?;

    let iat = int_claim(obj, "iat")?;
    let nbf = match obj.get("nbf") {
        Some(_) => int_claim(obj, "nbf")?,
        None => iat,
    };

    let decoded = DecodedClaims {
        kind,
        jti: uuid_claim(obj, "jti")?,
        subject: uuid_claim(obj, "sub")?,
        session: uuid_claim(obj, "sid")?,
        username: optional_string_claim(obj, "usr")?.unwrap_or_default(),
        issuer: optional_string_claim(obj, "iss")?.unwrap_or_default(),
        audience: string_list_claim(obj, "aud")?.unwrap_or_default(),
        roles: string_list_claim(obj, "rls")?,
        issued_at: iat,
        not_before: nbf,
        expires_at: int_claim(obj, "exp")?,
        max_lifetime_at: int_claim(obj, "mle")?,
    };
    Ok(decoded)
}

pub(crate) fn finalize_access(decoded: DecodedClaims) -> AuthResult<AccessClaims> {
    let roles = decoded.roles.ok_or_else(|| AuthError::missing_claim("rls"))?;
    let claims = AccessClaims {
        jti: decoded.jti,
        subject: decoded.subject,
        session: decoded.session,
        username: decoded.username,
        issuer: decoded.issuer,
        audience: decoded.audience,
        roles,
        issued_at: decoded.issued_at,
        not_before: decoded.not_before,
        expires_at: decoded.expires_at,
        max_lifetime_at: decoded.max_lifetime_at,
    };
    claims.validate()?;
    Ok(claims)
}

pub(crate) fn finalize_refresh(decoded: DecodedClaims) -> AuthResult<RefreshClaims> {
    let claims = RefreshClaims {
        jti: decoded.jti,
        subject: decoded.subject,
        session: decoded.session,
        username: decoded.username,
        issuer: decoded.issuer,
        audience: decoded.audience,
        issued_at: decoded.issued_at,
        not_before: decoded.not_before,
        expires_at: decoded.expires_at,
        max_lifetime_at: decoded.max_lifetime_at,
    };
    claims.validate()?;
    Ok(claims)
}

fn string_claim(obj: &serde_json::Map<String, Value>, name: &str) -> AuthResult<String> {
    match obj.get(name) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(AuthError::malformed_claims(format!(
            "claim '{name}' must be a string"
        ))),
        None => Err(AuthError::missing_claim(name)),
    }
}

fn optional_string_claim(
    obj: &serde_json::Map<String, Value>,
    name: &str,
) -> AuthResult<Option<String>> {
    match obj.get(name) {
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(AuthError::malformed_claims(format!(
            "claim '{name}' must be a string"
        ))),
        None => Ok(None),
    }
}

fn uuid_claim(obj: &serde_json::Map<String, Value>, name: &str) -> AuthResult<Uuid> {
    let raw = string_claim(obj, name)?;
    Uuid::try_parse(&raw)
        .map_err(|_| AuthError::malformed_claims(format!("claim '{name}' is not a valid UUID")))
}

fn int_claim(obj: &serde_json::Map<String, Value>, name: &str) -> AuthResult<i64> {
    match obj.get(name) {
        Some(Value::Number(n)) => n.as_i64().ok_or_else(|| {
            AuthError::malformed_claims(format!("claim '{name}' must be an integer"))
        }),
        Some(_) => Err(AuthError::malformed_claims(format!(
            "claim '{name}' must be an integer"
        ))),
        None => Err(AuthError::missing_claim(name)),
    }
}

fn string_list_claim(
    obj: &serde_json::Map<String, Value>,
    name: &str,
) -> AuthResult<Option<Vec<String>>> {
    match obj.get(name) {
        Some(Value::Array(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(s) => out.push(s.clone()),
                    _ => {
                        return Err(AuthError::malformed_claims(format!(
                            "claim '{name}' must be an array of strings"
                        )))
                    }
                }
            }
            Ok(Some(out))
        }
        Some(_) => Err(AuthError::malformed_claims(format!(
            "claim '{name}' must be an array of strings"
        ))),
        None => Ok(None),
    }
}

pub(crate) fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
