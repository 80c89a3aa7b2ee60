use crate::algorithm::{AlgorithmFamily, EcCurve, SigningMethod};
use crate::config::EngineConfig;
use crate::error::{AuthError, AuthResult};
use jsonwebtoken::{DecodingKey, EncodingKey};
use p521::elliptic_curve::sec1::ToEncodedPoint;
use pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::traits::PublicKeyParts;
use std::fs;
use std::path::Path;

const MIN_RSA_BITS: usize = 2048;

/// Opaque sign/verify capabilities. The private key never leaves this pair;
/// the signer holds the only sign-capable handle. ES512 carries its own
/// P-521 keys because the `jsonwebtoken` backend has no ES512 support.
pub(crate) enum KeyMaterial {
    Backend {
        signing: EncodingKey,
        verifying: DecodingKey,
    },
    P521 {
        signing: p521::ecdsa::SigningKey,
        verifying: p521::ecdsa::VerifyingKey,
    },
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyMaterial::Backend { .. } => f.debug_struct("Backend").finish_non_exhaustive(),
            KeyMaterial::P521 { .. } => f.debug_struct("P521").finish_non_exhaustive(),
        }
    }
}

pub(crate) fn load_key_material(
    config: &EngineConfig,
    family: AlgorithmFamily,
) -> AuthResult<KeyMaterial> {
    match config.signing_method {
        SigningMethod::Symmetric => {
            let key = config
                .symmetric_key
                .as_deref()
                .ok_or_else(|| AuthError::key_material("symmetric key is not configured"))?;
            Ok(KeyMaterial::Backend {
                signing: EncodingKey::from_secret(key.as_bytes()),
                verifying: DecodingKey::from_secret(key.as_bytes()),
            })
        }
        SigningMethod::Asymmetric => {
            let private_path = config
                .private_key_path
                .as_deref()
                .ok_or_else(|| AuthError::key_material("private key path is not configured"))?;
            let public_path = config
                .public_key_path
                .as_deref()
                .ok_or_else(|| AuthError::key_material("public key path is not configured"))?;

            check_private_key_permissions(private_path)?;
            let private_pem = read_key_file(private_path)?;
            let public_pem = read_key_file(public_path)?;

            check_key_matches_family(family, &private_pem)?;

            if matches!(
                family,
                AlgorithmFamily::Ecdsa {
                    curve: EcCurve::P521
                }
            ) {
                return load_p521_material(&private_pem, &public_pem);
            }
            Ok(KeyMaterial::Backend {
                signing: encoding_key_from_pem(family, &private_pem)?,
                verifying: decoding_key_from_pem(family, &public_pem)?,
            })
        }
    }
}

fn load_p521_material(private_pem: &str, public_pem: &str) -> AuthResult<KeyMaterial> {
    let signing_secret = p521::SecretKey::from_pkcs8_pem(private_pem)
        .or_else(|_| p521::SecretKey::from_sec1_pem(private_pem))
        .map_err(|_| {
            AuthError::key_material("private key is not a P-521 key as ES512 requires")
        })?;
    let signing = p521::ecdsa::SigningKey::from_bytes(&signing_secret.to_bytes()).map_err(|_| {
        AuthError::key_material("private key is not a P-521 key as ES512 requires")
    })?;

    let verifying = match p521::PublicKey::from_public_key_pem(public_pem) {
        Ok(public) => p521::ecdsa::VerifyingKey::from_encoded_point(&public.to_encoded_point(false))
            .map_err(|_| AuthError::key_material("public key is not a P-521 key"))?,
        // A private PEM in the public slot still yields a working verifier
        // by deriving the public half.
        Err(_) => {
            let secret = p521::SecretKey::from_pkcs8_pem(public_pem)
                .or_else(|_| p521::SecretKey::from_sec1_pem(public_pem))
                .map_err(|_| AuthError::key_material("public key is not a P-521 key"))?;
            p521::ecdsa::VerifyingKey::from_encoded_point(
                &secret.public_key().to_encoded_point(false),
            )
            .map_err(|_| AuthError::key_material("public key is not a P-521 key"))?
        }
    };

    Ok(KeyMaterial::P521 { signing, verifying })
}

fn read_key_file(path: &Path) -> AuthResult<String> {
    fs::read_to_string(path).map_err(|e| {
        AuthError::key_material(format!("failed to read key file {}: {e}", path.display()))
    })
}

#[cfg(unix)]
fn check_private_key_permissions(path: &Path) -> AuthResult<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = fs::metadata(path).map_err(|e| {
        AuthError::key_material(format!("failed to stat key file {}: {e}", path.display()))
    })?;
    let mode = metadata.permissions().mode() & 0o777;
    if mode & 0o077 != 0 {
        return Err(AuthError::invalid_config(format!(
            "private key file {} is accessible by group or others (mode {mode:o}); restrict to owner read/write",
            path.display()
        )));
    }
    Ok(())
}

#[cfg(not(unix))]
fn check_private_key_permissions(_path: &Path) -> AuthResult<()> {
    Ok(())
}

/// Positive mismatch and size checks on the private key before it is handed
/// to the signer. RSA keys below the floor are rejected; EC/Ed keys must
/// parse as the configured curve.
fn check_key_matches_family(family: AlgorithmFamily, private_pem: &str) -> AuthResult<()> {
    match family {
        AlgorithmFamily::Hmac { .. } => Ok(()),
        AlgorithmFamily::RsaPkcs1 { .. } | AlgorithmFamily::RsaPss { .. } => {
            let private = rsa::RsaPrivateKey::from_pkcs8_pem(private_pem)
                .or_else(|_| rsa::RsaPrivateKey::from_pkcs1_pem(private_pem))
                .map_err(|_| {
                    AuthError::key_material(
                        "private key does not match the configured RSA algorithm",
                    )
                })?;
            let bits = private.size() * 8;
            if bits < MIN_RSA_BITS {
                return Err(AuthError::key_material(format!(
                    "RSA key is {bits} bits; minimum is {MIN_RSA_BITS}"
                )));
            }
            Ok(())
        }
        AlgorithmFamily::Ecdsa {
            curve: EcCurve::P521,
        } => p521::SecretKey::from_pkcs8_pem(private_pem)
            .or_else(|_| p521::SecretKey::from_sec1_pem(private_pem))
            .map(|_| ())
            .map_err(|_| {
                AuthError::key_material("private key is not a P-521 key as ES512 requires")
            }),
        #[cfg(feature = "keygen")]
        AlgorithmFamily::Ecdsa {
            curve: EcCurve::P256,
        } => p256::SecretKey::from_pkcs8_pem(private_pem)
            .or_else(|_| p256::SecretKey::from_sec1_pem(private_pem))
            .map(|_| ())
            .map_err(|_| {
                AuthError::key_material("private key is not a P-256 key as ES256 requires")
            }),
        #[cfg(feature = "keygen")]
        AlgorithmFamily::Ecdsa {
            curve: EcCurve::P384,
        } => p384::SecretKey::from_pkcs8_pem(private_pem)
            .or_else(|_| p384::SecretKey::from_sec1_pem(private_pem))
            .map(|_| ())
            .map_err(|_| {
                AuthError::key_material("private key is not a P-384 key as ES384 requires")
            }),
        #[cfg(feature = "keygen")]
        AlgorithmFamily::Ed25519 => ed25519_dalek::SigningKey::from_pkcs8_pem(private_pem)
            .map(|_| ())
            .map_err(|_| AuthError::key_material("private key is not an Ed25519 key")),
        // Without the keygen parsers a P-256/P-384/Ed25519 mismatch surfaces
        // at the first signing attempt instead of at construction.
        #[cfg(not(feature = "keygen"))]
        _ => Ok(()),
    }
}

fn encoding_key_from_pem(family: AlgorithmFamily, pem: &str) -> AuthResult<EncodingKey> {
    let bytes = pem.as_bytes();
    match family {
        AlgorithmFamily::Hmac { .. } => Ok(EncodingKey::from_secret(bytes)),
        AlgorithmFamily::RsaPkcs1 { .. } | AlgorithmFamily::RsaPss { .. } => {
            EncodingKey::from_rsa_pem(bytes).map_err(AuthError::from)
        }
        AlgorithmFamily::Ecdsa { .. } => EncodingKey::from_ec_pem(bytes).map_err(AuthError::from),
        AlgorithmFamily::Ed25519 => EncodingKey::from_ed_pem(bytes).map_err(AuthError::from),
    }
}

fn decoding_key_from_pem(family: AlgorithmFamily, pem: &str) -> AuthResult<DecodingKey> {
    let bytes = pem.as_bytes();
    match family {
        AlgorithmFamily::Hmac { .. } => Ok(DecodingKey::from_secret(bytes)),
        AlgorithmFamily::RsaPkcs1 { .. } | AlgorithmFamily::RsaPss { .. } => {
            match DecodingKey::from_rsa_pem(bytes) {
                Ok(key) => Ok(key),
                // A private PEM in the public slot still yields a working
                // verifier by deriving the public half.
                Err(err) => match rsa_public_pem_from_private(pem) {
                    Some(public_pem) => {
                        DecodingKey::from_rsa_pem(public_pem.as_bytes()).map_err(AuthError::from)
                    }
                    None => Err(AuthError::from(err)),
                },
            }
        }
        AlgorithmFamily::Ecdsa { curve } => match DecodingKey::from_ec_pem(bytes) {
            Ok(key) => Ok(key),
            Err(err) => match ec_public_pem_from_private(curve, pem) {
                Some(public_pem) => {
                    DecodingKey::from_ec_pem(public_pem.as_bytes()).map_err(AuthError::from)
                }
                None => Err(AuthError::from(err)),
            },
        },
        AlgorithmFamily::Ed25519 => match DecodingKey::from_ed_pem(bytes) {
            Ok(key) => Ok(key),
            Err(err) => match ed_public_pem_from_private(pem) {
                Some(public_pem) => {
                    DecodingKey::from_ed_pem(public_pem.as_bytes()).map_err(AuthError::from)
                }
                None => Err(AuthError::from(err)),
            },
        },
    }
}

fn rsa_public_pem_from_private(pem: &str) -> Option<String> {
    let private = rsa::RsaPrivateKey::from_pkcs8_pem(pem)
        .or_else(|_| rsa::RsaPrivateKey::from_pkcs1_pem(pem))
        .ok()?;
    let public = rsa::RsaPublicKey::from(&private);
    rsa::pkcs8::EncodePublicKey::to_public_key_pem(&public, pkcs8::LineEnding::LF)
        .ok()
        .map(|pem| pem.to_string())
}

fn ec_public_pem_from_private(curve: EcCurve, pem: &str) -> Option<String> {
    match curve {
        #[cfg(feature = "keygen")]
        EcCurve::P256 => {
            let secret = p256::SecretKey::from_pkcs8_pem(pem)
                .or_else(|_| p256::SecretKey::from_sec1_pem(pem))
                .ok()?;
            p256::pkcs8::EncodePublicKey::to_public_key_pem(
                &secret.public_key(),
                pkcs8::LineEnding::LF,
            )
            .ok()
        }
        #[cfg(feature = "keygen")]
        EcCurve::P384 => {
            let secret = p384::SecretKey::from_pkcs8_pem(pem)
                .or_else(|_| p384::SecretKey::from_sec1_pem(pem))
                .ok()?;
            p384::pkcs8::EncodePublicKey::to_public_key_pem(
                &secret.public_key(),
                pkcs8::LineEnding::LF,
            )
            .ok()
        }
        EcCurve::P521 => {
            let secret = p521::SecretKey::from_pkcs8_pem(pem)
                .or_else(|_| p521::SecretKey::from_sec1_pem(pem))
                .ok()?;
            p521::pkcs8::EncodePublicKey::to_public_key_pem(
                &secret.public_key(),
                pkcs8::LineEnding::LF,
            )
            .ok()
        }
        #[cfg(not(feature = "keygen"))]
        _ => None,
    }
}

#[cfg(feature = "keygen")]
fn ed_public_pem_from_private(pem: &str) -> Option<String> {
    let key = ed25519_dalek::SigningKey::from_pkcs8_pem(pem).ok()?;
    ed25519_dalek::pkcs8::EncodePublicKey::to_public_key_pem(
        &key.verifying_key(),
        pkcs8::LineEnding::LF,
    )
    .ok()
}

#[cfg(not(feature = "keygen"))]
fn ed_public_pem_from_private(_pem: &str) -> Option<String> {
    None
}
