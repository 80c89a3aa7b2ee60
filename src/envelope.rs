use crate::algorithm::{key_family_of, TokenAlgorithm};
use crate::error::{AuthError, AuthResult};
use crate::keys::KeyMaterial;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{decode, encode, Header, Validation};
use p521::ecdsa::signature::{Signer, Verifier};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// SHA-256 hex digest of the envelope string. This is the only form in which
/// a token ever reaches storage.
pub fn fingerprint(envelope: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(envelope.trim().as_bytes());
    hex::encode(hasher.finalize())
}

/// JWS compact serialization. The 12 backend algorithms go through
/// `jsonwebtoken`; ES512 is assembled by hand on the P-521 keys because the
/// backend has no ES512 variant.
pub(crate) fn sign_payload<T: Serialize>(
    alg: TokenAlgorithm,
    payload: &T,
    keys: &KeyMaterial,
) -> AuthResult<String> {
    match keys {
        KeyMaterial::Backend { signing, .. } => {
            let backend_alg = alg.to_backend().ok_or_else(|| {
                AuthError::crypto("ES512 signing requires P-521 key material")
            })?;
            encode(&Header::new(backend_alg), payload, signing).map_err(AuthError::from)
        }
        KeyMaterial::P521 { signing, .. } => sign_es512(payload, signing),
    }
}

fn sign_es512<T: Serialize>(payload: &T, key: &p521::ecdsa::SigningKey) -> AuthResult<String> {
    let claims = serde_json::to_vec(payload)
        .map_err(|e| AuthError::crypto(format!("claims serialization failed: {e}")))?;
    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(br#"{"alg":"ES512","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(claims)
    );
    let signature: p521::ecdsa::Signature = key
        .try_sign(signing_input.as_bytes())
        .map_err(|e| AuthError::crypto(format!("ES512 signing failed: {e}")))?;
    Ok(format!(
        "{signing_input}.{}",
        URL_SAFE_NO_PAD.encode(signature.to_bytes())
    ))
}

/// Signature verification with the algorithm-confusion defenses in front:
/// the header algorithm must be in the allowed set and share the loaded
/// key's family before any cryptography runs. Temporal and audience checks
/// are disabled here; the verifier pipeline owns them.
pub(crate) fn verify_signature(
    token: &str,
    allowed: &[TokenAlgorithm],
    key_alg: TokenAlgorithm,
    keys: &KeyMaterial,
) -> AuthResult<Value> {
    let token = token.trim();
    let header_alg = parse_header_algorithm(token)?;

    if !allowed.contains(&header_alg) {
        return Err(AuthError::algorithm_not_allowed(
            "envelope algorithm is not in the allowed set",
        ));
    }
    if key_family_of(header_alg) != key_family_of(key_alg) {
        return Err(AuthError::algorithm_not_allowed(
            "envelope algorithm does not match the verification key family",
        ));
    }

    match keys {
        KeyMaterial::Backend { verifying, .. } => {
            // The family check above keeps ES512 off this arm; only backend
            // algorithms can reach it.
            let backend_alg = header_alg.to_backend().ok_or_else(|| {
                AuthError::algorithm_not_allowed(
                    "envelope algorithm does not match the verification key family",
                )
            })?;

            let mut validation = Validation::new(backend_alg);
            validation.required_spec_claims.clear();
            validation.leeway = 0;
            validation.validate_exp = false;
            validation.validate_nbf = false;
            validation.validate_aud = false;

            let data = decode::<Value>(token, verifying, &validation).map_err(AuthError::from)?;
            Ok(data.claims)
        }
        KeyMaterial::P521 { verifying, .. } => verify_es512(token, verifying),
    }
}

fn verify_es512(token: &str, key: &p521::ecdsa::VerifyingKey) -> AuthResult<Value> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(AuthError::malformed_claims(
            "envelope must have 3 dot-separated segments",
        ));
    }

    let signature_bytes = URL_SAFE_NO_PAD.decode(parts[2]).map_err(|e| {
        AuthError::invalid_signature(format!("invalid base64url signature segment: {e}"))
    })?;
    let signature = p521::ecdsa::Signature::from_slice(&signature_bytes)
        .map_err(|_| AuthError::invalid_signature("signature has the wrong length for ES512"))?;

    let signing_input_len = parts[0].len() + 1 + parts[1].len();
    key.verify(token[..signing_input_len].as_bytes(), &signature)
        .map_err(|_| AuthError::invalid_signature("ES512 signature verification failed"))?;

    let payload_bytes = URL_SAFE_NO_PAD.decode(parts[1]).map_err(|e| {
        AuthError::malformed_claims(format!("invalid base64url payload segment: {e}"))
    })?;
    serde_json::from_slice(&payload_bytes)
        .map_err(|e| AuthError::malformed_claims(format!("payload is not valid JSON: {e}")))
}

fn parse_header_algorithm(token: &str) -> AuthResult<TokenAlgorithm> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(AuthError::malformed_claims(
            "envelope must have 3 dot-separated segments",
        ));
    }
    let header_bytes = URL_SAFE_NO_PAD
        .decode(parts[0])
        .map_err(|e| AuthError::malformed_claims(format!("invalid base64url header segment: {e}")))?;
    let header: Value = serde_json::from_slice(&header_bytes)
        .map_err(|e| AuthError::malformed_claims(format!("header is not valid JSON: {e}")))?;
    let name = header
        .get("alg")
        .and_then(Value::as_str)
        .ok_or_else(|| AuthError::malformed_claims("header is missing the alg field"))?;

    if name.eq_ignore_ascii_case("none") {
        return Err(AuthError::algorithm_not_allowed(
            "the \"none\" algorithm is rejected",
        ));
    }
    TokenAlgorithm::from_name(name).ok_or_else(|| {
        AuthError::algorithm_not_allowed(format!("algorithm '{name}' is not allowed"))
    })
}

/// Payload decode without any signature requirement. Used by revocation,
/// which must accept envelopes it can no longer (or never could) verify.
pub(crate) fn decode_unverified_payload(token: &str) -> AuthResult<Value> {
    let parts: Vec<&str> = token.trim().split('.').collect();
    if parts.len() != 3 {
        return Err(AuthError::malformed_claims(
            "envelope must have 3 dot-separated segments",
        ));
    }
    let payload_bytes = URL_SAFE_NO_PAD.decode(parts[1]).map_err(|e| {
        AuthError::malformed_claims(format!("invalid base64url payload segment: {e}"))
    })?;
    serde_json::from_slice(&payload_bytes)
        .map_err(|e| AuthError::malformed_claims(format!("payload is not valid JSON: {e}")))
}
