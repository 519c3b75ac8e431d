//! Per-curve key operations behind one `KeyType` dispatch

use ed25519_dalek::{Signer as _, SigningKey, VerifyingKey};
use rand::{rng, RngCore};
use zeroize::Zeroizing;

use crate::error::{CryptoError, HsmResult};
use crate::model::{
    CardanoKey, ChainCode, KeyType, PrivateKey, PublicKey, RecoverableSignature, Verification,
};

pub const DIGEST_LEN: usize = 32;
pub const SIGNATURE_LEN: usize = 64;

/// Shared body of the two short Weierstrass curves
macro_rules! weierstrass_curve {
    ($module:ident, $krate:ident) => {
        pub(crate) mod $module {
            use $krate::ecdsa::signature::hazmat::PrehashVerifier;
            use $krate::ecdsa::{Signature, SigningKey, VerifyingKey};
            use $krate::elliptic_curve::group::Curve as _;
            use $krate::elliptic_curve::sec1::ToEncodedPoint;
            use $krate::elliptic_curve::{Group, PrimeField};
            use $krate::{FieldBytes, ProjectivePoint, PublicKey, Scalar, SecretKey};
            use zeroize::Zeroizing;

            use crate::error::CryptoError;

            fn invalid(what: &str) -> CryptoError {
                CryptoError::InvalidKeyMaterial {
                    reason: format!("{} {}", stringify!($module), what),
                }
            }

            pub fn is_valid_secret(secret: &[u8]) -> bool {
                secret.len() == 32 && SecretKey::from_slice(secret).is_ok()
            }

            /// SEC1 uncompressed public key
            pub fn public_key(secret: &[u8]) -> Result<Vec<u8>, CryptoError> {
                let secret = SecretKey::from_slice(secret).map_err(|_| invalid("private key"))?;
                Ok(secret.public_key().to_encoded_point(false).as_bytes().to_vec())
            }

            /// Accept compressed or uncompressed SEC1, return uncompressed
            pub fn normalize_public(bytes: &[u8]) -> Result<Vec<u8>, CryptoError> {
                let public = PublicKey::from_sec1_bytes(bytes).map_err(|_| invalid("public key"))?;
                Ok(public.to_encoded_point(false).as_bytes().to_vec())
            }

            pub fn compressed(bytes: &[u8]) -> Result<Vec<u8>, CryptoError> {
                let public = PublicKey::from_sec1_bytes(bytes).map_err(|_| invalid("public key"))?;
                Ok(public.to_encoded_point(true).as_bytes().to_vec())
            }

            pub fn sign(secret: &[u8], digest: &[u8]) -> Result<([u8; 64], u8), CryptoError> {
                let key = SigningKey::from_slice(secret).map_err(|_| invalid("private key"))?;
                let (signature, recovery_id): (Signature, _) = key
                    .sign_prehash_recoverable(digest)
                    .map_err(|e| CryptoError::InvalidInput {
                        reason: e.to_string(),
                    })?;
                let mut out = [0u8; 64];
                out.copy_from_slice(&signature.to_bytes());
                Ok((out, recovery_id.to_byte()))
            }

            /// `false` for any well-sized signature that does not check out
            pub fn verify(public: &[u8], digest: &[u8], signature: &[u8]) -> Result<bool, CryptoError> {
                let key =
                    VerifyingKey::from_sec1_bytes(public).map_err(|_| invalid("public key"))?;
                let Ok(signature) = Signature::from_slice(signature) else {
                    return Ok(false);
                };
                Ok(key.verify_prehash(digest, &signature).is_ok())
            }

            /// x-coordinate of the shared point
            pub fn ecdh(secret: &[u8], peer: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
                let secret = SecretKey::from_slice(secret).map_err(|_| invalid("private key"))?;
                let peer = PublicKey::from_sec1_bytes(peer).map_err(|_| invalid("peer key"))?;
                let shared = $krate::ecdh::diffie_hellman(secret.to_nonzero_scalar(), peer.as_affine());
                Ok(Zeroizing::new(shared.raw_secret_bytes().to_vec()))
            }

            fn scalar(tweak: &[u8; 32]) -> Option<Scalar> {
                Option::from(Scalar::from_repr(FieldBytes::clone_from_slice(tweak)))
            }

            /// `secret + tweak mod n`; `None` when the tweak is out of range or the sum is zero
            pub fn add_scalar(secret: &[u8], tweak: &[u8; 32]) -> Option<Zeroizing<Vec<u8>>> {
                let parent = SecretKey::from_slice(secret).ok()?;
                let sum = *parent.to_nonzero_scalar() + scalar(tweak)?;
                let child = SecretKey::from_bytes(&sum.to_repr()).ok()?;
                Some(Zeroizing::new(child.to_bytes().to_vec()))
            }

            /// `tweak * G + public`; `None` when the tweak is out of range or the sum is the identity
            pub fn add_point(public: &[u8], tweak: &[u8; 32]) -> Option<Vec<u8>> {
                let parent = PublicKey::from_sec1_bytes(public).ok()?;
                let point = ProjectivePoint::generator() * scalar(tweak)? + parent.to_projective();
                let child = PublicKey::from_affine(point.to_affine()).ok()?;
                Some(child.to_encoded_point(false).as_bytes().to_vec())
            }
        }
    };
}

weierstrass_curve!(secp256k1, k256);
weierstrass_curve!(nistp256, p256);

fn as_array<const N: usize>(bytes: &[u8], what: &str) -> Result<[u8; N], CryptoError> {
    bytes.try_into().map_err(|_| CryptoError::InvalidInput {
        reason: format!("{} must be {} bytes, got {}", what, N, bytes.len()),
    })
}

/// Draw a fresh private key for `key_type`
pub fn generate_private(key_type: KeyType) -> PrivateKey {
    let mut bytes = Zeroizing::new([0u8; 32]);
    loop {
        rng().fill_bytes(bytes.as_mut_slice());
        let usable = match key_type {
            KeyType::Secp256k1 => secp256k1::is_valid_secret(bytes.as_slice()),
            KeyType::NistP256 => nistp256::is_valid_secret(bytes.as_slice()),
            KeyType::Ed25519 | KeyType::X25519 => true,
        };
        if usable {
            if let Ok(key) = PrivateKey::from_slice(bytes.as_slice()) {
                return key;
            }
        }
    }
}

fn extended_ed25519(private: &PrivateKey) -> Result<CardanoKey, CryptoError> {
    let secret: [u8; 64] = as_array(private.as_bytes(), "extended secret")?;
    CardanoKey::from_parts(&secret, &ChainCode::new([0u8; 32])).map_err(|e| {
        CryptoError::InvalidKeyMaterial {
            reason: e.to_string(),
        }
    })
}

/// Public key in export encoding
pub fn public_from_private(key_type: KeyType, private: &PrivateKey) -> HsmResult<PublicKey> {
    let bytes = match key_type {
        KeyType::Secp256k1 => secp256k1::public_key(private.as_bytes())?,
        KeyType::NistP256 => nistp256::public_key(private.as_bytes())?,
        KeyType::Ed25519 if private.is_extended() => {
            extended_ed25519(private)?.public_key().to_vec()
        }
        KeyType::Ed25519 => {
            let seed: [u8; 32] = as_array(private.as_bytes(), "ed25519 private key")?;
            SigningKey::from_bytes(&seed).verifying_key().to_bytes().to_vec()
        }
        KeyType::X25519 => {
            let seed: [u8; 32] = as_array(private.as_bytes(), "x25519 private key")?;
            let secret = x25519_dalek::StaticSecret::from(seed);
            x25519_dalek::PublicKey::from(&secret).as_bytes().to_vec()
        }
    };
    Ok(PublicKey::from_slice(&bytes)?)
}

/// Validate externally supplied public key bytes and bring them to export encoding
pub fn parse_public(key_type: KeyType, bytes: &[u8]) -> HsmResult<PublicKey> {
    let normalized = match key_type {
        KeyType::Secp256k1 => secp256k1::normalize_public(bytes)?,
        KeyType::NistP256 => nistp256::normalize_public(bytes)?,
        KeyType::Ed25519 => {
            let raw: [u8; 32] = as_array(bytes, "ed25519 public key")?;
            VerifyingKey::from_bytes(&raw)?;
            raw.to_vec()
        }
        KeyType::X25519 => {
            let raw: [u8; 32] = as_array(bytes, "x25519 public key")?;
            raw.to_vec()
        }
    };
    Ok(PublicKey::from_slice(&normalized)?)
}

/// Sign a 32-byte digest; Ed25519 treats the digest as the message
pub fn sign(
    key_type: KeyType,
    private: &PrivateKey,
    digest: &[u8],
) -> HsmResult<RecoverableSignature> {
    if digest.len() != DIGEST_LEN {
        return Err(CryptoError::InvalidInput {
            reason: format!("digest must be {} bytes, got {}", DIGEST_LEN, digest.len()),
        }
        .into());
    }
    let (signature, recovery_id) = match key_type {
        KeyType::Secp256k1 => secp256k1::sign(private.as_bytes(), digest)?,
        KeyType::NistP256 => nistp256::sign(private.as_bytes(), digest)?,
        KeyType::Ed25519 if private.is_extended() => (extended_ed25519(private)?.sign(digest), 0),
        KeyType::Ed25519 => {
            let seed: [u8; 32] = as_array(private.as_bytes(), "ed25519 private key")?;
            (SigningKey::from_bytes(&seed).sign(digest).to_bytes(), 0)
        }
        KeyType::X25519 => {
            return Err(CryptoError::UnsupportedKeyTypeForSigning {
                key_type: key_type.to_string(),
            }
            .into())
        }
    };
    Ok(RecoverableSignature {
        signature: signature.to_vec(),
        recovery_id,
    })
}

/// Tri-state verification; size problems are errors, bad signatures are `Rejected`
pub fn verify(
    key_type: KeyType,
    public: &PublicKey,
    digest: &[u8],
    signature: &[u8],
) -> HsmResult<Verification> {
    if digest.len() != DIGEST_LEN {
        return Err(CryptoError::InvalidInput {
            reason: format!("digest must be {} bytes, got {}", DIGEST_LEN, digest.len()),
        }
        .into());
    }
    if signature.len() != SIGNATURE_LEN {
        return Err(CryptoError::InvalidInput {
            reason: format!(
                "signature must be {} bytes, got {}",
                SIGNATURE_LEN,
                signature.len()
            ),
        }
        .into());
    }
    let verified = match key_type {
        KeyType::Secp256k1 => secp256k1::verify(public.as_bytes(), digest, signature)?,
        KeyType::NistP256 => nistp256::verify(public.as_bytes(), digest, signature)?,
        KeyType::Ed25519 => {
            let raw: [u8; 32] = as_array(public.as_bytes(), "ed25519 public key")?;
            let key = VerifyingKey::from_bytes(&raw)?;
            let sig: [u8; 64] = as_array(signature, "signature")?;
            key.verify_strict(digest, &ed25519_dalek::Signature::from_bytes(&sig))
                .is_ok()
        }
        KeyType::X25519 => {
            return Err(CryptoError::UnsupportedKeyTypeForSigning {
                key_type: key_type.to_string(),
            }
            .into())
        }
    };
    Ok(Verification::from(verified))
}

/// Raw ECDH shared secret
pub fn ecdh(key_type: KeyType, private: &PrivateKey, peer: &PublicKey) -> HsmResult<Zeroizing<Vec<u8>>> {
    let secret = match key_type {
        KeyType::Secp256k1 => secp256k1::ecdh(private.as_bytes(), peer.as_bytes())?,
        KeyType::NistP256 => nistp256::ecdh(private.as_bytes(), peer.as_bytes())?,
        KeyType::X25519 => {
            let seed: [u8; 32] = as_array(private.as_bytes(), "x25519 private key")?;
            let peer: [u8; 32] = as_array(peer.as_bytes(), "x25519 peer key")?;
            let secret = x25519_dalek::StaticSecret::from(seed);
            let shared = secret.diffie_hellman(&x25519_dalek::PublicKey::from(peer));
            if !shared.was_contributory() {
                return Err(CryptoError::InvalidKeyMaterial {
                    reason: "x25519 peer key has small order".to_string(),
                }
                .into());
            }
            Zeroizing::new(shared.as_bytes().to_vec())
        }
        KeyType::Ed25519 => {
            return Err(CryptoError::UnsupportedKeyTypeForAgreement {
                key_type: key_type.to_string(),
            }
            .into())
        }
    };
    Ok(secret)
}
