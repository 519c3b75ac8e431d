use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use tracing::debug;
use zeroize::Zeroizing;

use crate::error::{CryptoError, HsmResult};
use crate::model::{KeyDomain, LockedObject, LOCK_NONCE_LEN, LOCK_SALT_LEN};

/// Element key guarding one domain
pub type DomainKey = Zeroizing<[u8; 32]>;

fn expand(domain_key: &[u8; 32], salt: &[u8], label: &[u8]) -> HsmResult<Zeroizing<[u8; 32]>> {
    let mut out = Zeroizing::new([0u8; 32]);
    Hkdf::<Sha256>::new(Some(salt), domain_key)
        .expand(label, out.as_mut_slice())
        .map_err(|e| CryptoError::InvalidKeyMaterial {
            reason: e.to_string(),
        })?;
    Ok(out)
}

fn signing_key(domain: KeyDomain, domain_key: &[u8; 32], salt: &[u8]) -> HsmResult<SigningKey> {
    let seed = expand(domain_key, salt, domain.signing_label())?;
    Ok(SigningKey::from_bytes(&seed))
}

fn cipher(domain: KeyDomain, domain_key: &[u8; 32], salt: &[u8]) -> HsmResult<Aes256Gcm> {
    let key = expand(domain_key, salt, domain.cipher_label())?;
    Aes256Gcm::new_from_slice(key.as_slice()).map_err(|e| {
        CryptoError::InvalidKeyMaterial {
            reason: e.to_string(),
        }
        .into()
    })
}

/// Encrypt and sign `plaintext` under the key of `domain`
pub fn seal(domain: KeyDomain, domain_key: &[u8; 32], plaintext: &[u8]) -> HsmResult<LockedObject> {
    let mut salt = [0u8; LOCK_SALT_LEN];
    let mut nonce = [0u8; LOCK_NONCE_LEN];
    let mut rng = rand::rng();
    rng.fill_bytes(&mut salt);
    rng.fill_bytes(&mut nonce);

    let mut object = LockedObject {
        domain,
        salt,
        nonce,
        ciphertext: Vec::new(),
        signature: [0u8; 64],
    };
    let header = object.header();
    object.ciphertext = cipher(domain, domain_key, &salt)?
        .encrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: plaintext,
                aad: &header,
            },
        )
        .map_err(|_| CryptoError::InvalidInput {
            reason: "payload too large to encrypt".to_string(),
        })?;
    object.signature = signing_key(domain, domain_key, &salt)?
        .sign(&object.signed_bytes())
        .to_bytes();

    debug!(
        "Locked {} bytes in the {} domain",
        plaintext.len(),
        object.domain
    );
    Ok(object)
}

/// Check the signature of `object` and decrypt it
///
/// The object must have been sealed for `domain`; the signature is checked
/// with the requested domain's key before any decryption is attempted.
pub fn open(
    domain: KeyDomain,
    domain_key: &[u8; 32],
    object: &LockedObject,
) -> HsmResult<Zeroizing<Vec<u8>>> {
    let verifying_key = signing_key(domain, domain_key, &object.salt)?.verifying_key();
    let signature = Signature::from_bytes(&object.signature);
    if object.domain != domain
        || verifying_key
            .verify(&object.signed_bytes(), &signature)
            .is_err()
    {
        return Err(CryptoError::SignatureInvalid.into());
    }

    let plaintext = cipher(domain, domain_key, &object.salt)?
        .decrypt(
            Nonce::from_slice(&object.nonce),
            Payload {
                msg: &object.ciphertext,
                aad: &object.header(),
            },
        )
        .map_err(|_| CryptoError::DecryptionFailed)?;
    Ok(Zeroizing::new(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorCode, HsmError};

    const KEY: [u8; 32] = [7u8; 32];

    #[test]
    fn test_seal_then_open() {
        let object = seal(KeyDomain::OneWay, &KEY, b"the payload").unwrap();
        assert_ne!(object.ciphertext.as_slice(), b"the payload");

        let plaintext = open(KeyDomain::OneWay, &KEY, &object).unwrap();
        assert_eq!(plaintext.as_slice(), b"the payload");
    }

    #[test]
    fn test_empty_payload() {
        let object = seal(KeyDomain::Shared, &KEY, b"").unwrap();
        assert!(open(KeyDomain::Shared, &KEY, &object).unwrap().is_empty());
    }

    #[test]
    fn test_each_seal_is_fresh() {
        let a = seal(KeyDomain::OneWay, &KEY, b"same").unwrap();
        let b = seal(KeyDomain::OneWay, &KEY, b"same").unwrap();
        assert_ne!(a.to_bytes(), b.to_bytes());
    }

    #[test]
    fn test_wrong_key_is_signature_invalid() {
        let object = seal(KeyDomain::OneWay, &KEY, b"payload").unwrap();
        let err = open(KeyDomain::OneWay, &[8u8; 32], &object).unwrap_err();
        assert_eq!(err.kind(), ErrorCode::SignatureInvalid);
    }

    #[test]
    fn test_wrong_domain_is_signature_invalid() {
        let object = seal(KeyDomain::OneWay, &KEY, b"payload").unwrap();
        let err = open(KeyDomain::Shared, &KEY, &object).unwrap_err();
        assert_eq!(err.kind(), ErrorCode::SignatureInvalid);
    }

    #[test]
    fn test_tampered_ciphertext_is_signature_invalid() {
        let mut object = seal(KeyDomain::Shared, &KEY, b"payload").unwrap();
        object.ciphertext[0] ^= 1;
        let err = open(KeyDomain::Shared, &KEY, &object).unwrap_err();
        assert!(matches!(
            err,
            HsmError::Crypto(CryptoError::SignatureInvalid)
        ));
    }

    #[test]
    fn test_resigned_tampering_fails_decryption() {
        let mut object = seal(KeyDomain::Shared, &KEY, b"payload").unwrap();
        object.ciphertext[0] ^= 1;
        object.signature = signing_key(KeyDomain::Shared, &KEY, &object.salt)
            .unwrap()
            .sign(&object.signed_bytes())
            .to_bytes();
        let err = open(KeyDomain::Shared, &KEY, &object).unwrap_err();
        assert_eq!(err.kind(), ErrorCode::DecryptionFailed);
    }
}
