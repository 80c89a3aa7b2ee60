//! Key material generation for provisioning and tests.
//!
//! Everything is keyed on [`AlgorithmFamily`], so generated material always
//! satisfies the loader's floors: HMAC secrets match the hash width, RSA
//! starts at the 2048-bit minimum, curves are fixed by the family.

use crate::algorithm::{AlgorithmFamily, EcCurve};
use crate::error::{AuthError, AuthResult};
use pkcs8::{EncodePrivateKey, LineEnding};
use rand::rngs::OsRng;
use rand::RngCore;

pub const DEFAULT_RSA_BITS: usize = 2048;

const RSA_ALLOWED_BITS: [usize; 3] = [2048, 3072, 4096];

/// Private key material sized for `family`: a hex HMAC secret whose byte
/// length matches the hash, or a PKCS#8 PEM. RSA families get
/// [`DEFAULT_RSA_BITS`]; use [`rsa_private_pem`] for larger moduli.
pub fn generate_for(family: AlgorithmFamily) -> AuthResult<String> {
    match family {
        AlgorithmFamily::Hmac { bits } => Ok(hmac_secret_hex(usize::from(bits) / 8)),
        AlgorithmFamily::RsaPkcs1 { .. } | AlgorithmFamily::RsaPss { .. } => {
            rsa_private_pem(DEFAULT_RSA_BITS)
        }
        AlgorithmFamily::Ecdsa { curve } => ec_private_pem(curve),
        AlgorithmFamily::Ed25519 => ed25519_private_pem(),
    }
}

/// Hex-encoded random secret of `bytes` entropy; the encoding doubles the
/// string length, so 32 bytes of entropy clears the config floor twice over.
fn hmac_secret_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    OsRng.fill_bytes(&mut buf);
    hex::encode(buf)
}

pub fn rsa_private_pem(bits: usize) -> AuthResult<String> {
    if !RSA_ALLOWED_BITS.contains(&bits) {
        return Err(AuthError::key_material(
            "RSA key size must be 2048, 3072, or 4096 bits",
        ));
    }
    let key = rsa::RsaPrivateKey::new(&mut OsRng, bits)
        .map_err(|e| AuthError::crypto(format!("RSA key generation failed: {e}")))?;
    pem_string(key.to_pkcs8_pem(LineEnding::LF))
}

fn ec_private_pem(curve: EcCurve) -> AuthResult<String> {
    match curve {
        EcCurve::P256 => pem_string(p256::SecretKey::random(&mut OsRng).to_pkcs8_pem(LineEnding::LF)),
        EcCurve::P384 => pem_string(p384::SecretKey::random(&mut OsRng).to_pkcs8_pem(LineEnding::LF)),
        EcCurve::P521 => pem_string(p521::SecretKey::random(&mut OsRng).to_pkcs8_pem(LineEnding::LF)),
    }
}

fn ed25519_private_pem() -> AuthResult<String> {
    let key = ed25519_dalek::SigningKey::generate(&mut OsRng);
    pem_string(key.to_pkcs8_pem(LineEnding::LF))
}

fn pem_string<P, E>(encoded: Result<P, E>) -> AuthResult<String>
where
    P: std::ops::Deref<Target = String>,
    E: std::fmt::Display,
{
    encoded
        .map(|pem| pem.to_string())
        .map_err(|e| AuthError::crypto(format!("PEM encoding failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::EncodingKey;
    use pkcs8::DecodePrivateKey;

    #[test]
    fn hmac_secret_width_follows_the_hash() {
        for (bits, bytes) in [(256u16, 32usize), (384, 48), (512, 64)] {
            let secret = generate_for(AlgorithmFamily::Hmac { bits }).expect("secret");
            let decoded = hex::decode(&secret).expect("hex secret");
            assert_eq!(decoded.len(), bytes);
        }
    }

    #[test]
    fn rsa_key_is_usable_and_sizes_are_bounded() {
        let pem = generate_for(AlgorithmFamily::RsaPkcs1 { bits: 256 }).expect("pem");
        assert!(EncodingKey::from_rsa_pem(pem.as_bytes()).is_ok());

        assert!(rsa_private_pem(1024).is_err());
        assert!(rsa_private_pem(2047).is_err());
    }

    #[test]
    fn backend_ec_keys_are_usable() {
        for curve in [EcCurve::P256, EcCurve::P384] {
            let pem = generate_for(AlgorithmFamily::Ecdsa { curve }).expect("pem");
            assert!(EncodingKey::from_ec_pem(pem.as_bytes()).is_ok());
        }
    }

    #[test]
    fn p521_key_round_trips_through_pkcs8() {
        let pem = generate_for(AlgorithmFamily::Ecdsa {
            curve: EcCurve::P521,
        })
        .expect("pem");
        assert!(p521::SecretKey::from_pkcs8_pem(&pem).is_ok());
    }

    #[test]
    fn ed25519_key_is_usable() {
        let pem = generate_for(AlgorithmFamily::Ed25519).expect("pem");
        assert!(EncodingKey::from_ed_pem(pem.as_bytes()).is_ok());
    }
}
