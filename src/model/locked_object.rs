//! Wire format of data locked by the element
//!
//! ```text
//! "LKO1" | domain (1) | salt (16) | nonce (12) | ciphertext+tag | signature (64)
//! ```
//!
//! The signature covers everything before it.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const MAGIC: &[u8; 4] = b"LKO1";
pub const SALT_LEN: usize = 16;
pub const NONCE_LEN: usize = 12;
pub const SIGNATURE_LEN: usize = 64;
const HEADER_LEN: usize = MAGIC.len() + 1 + SALT_LEN + NONCE_LEN;
/// AES-GCM tag
const TAG_LEN: usize = 16;

/// Which element key protects a locked object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyDomain {
    /// Only the originating element can unlock
    OneWay,
    /// Any element holding the same shared key can unlock
    Shared,
}

impl KeyDomain {
    fn tag(self) -> u8 {
        match self {
            KeyDomain::OneWay => 0,
            KeyDomain::Shared => 1,
        }
    }

    fn from_tag(tag: u8) -> Result<Self, LockedObjectError> {
        match tag {
            0 => Ok(KeyDomain::OneWay),
            1 => Ok(KeyDomain::Shared),
            other => Err(LockedObjectError::UnknownDomain { tag: other }),
        }
    }

    /// HKDF info label for the encryption key of this domain
    pub fn cipher_label(self) -> &'static [u8] {
        match self {
            KeyDomain::OneWay => b"hsmwallet/lock/one-way/cipher",
            KeyDomain::Shared => b"hsmwallet/lock/shared/cipher",
        }
    }

    /// HKDF info label for the signing key of this domain
    pub fn signing_label(self) -> &'static [u8] {
        match self {
            KeyDomain::OneWay => b"hsmwallet/lock/one-way/signing",
            KeyDomain::Shared => b"hsmwallet/lock/shared/signing",
        }
    }
}

impl fmt::Display for KeyDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyDomain::OneWay => f.write_str("one-way"),
            KeyDomain::Shared => f.write_str("shared"),
        }
    }
}

impl FromStr for KeyDomain {
    type Err = LockedObjectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "one-way" | "oneway" => Ok(KeyDomain::OneWay),
            "shared" => Ok(KeyDomain::Shared),
            other => Err(LockedObjectError::UnknownDomainName {
                name: other.to_string(),
            }),
        }
    }
}

/// Encrypted and signed payload
#[derive(Clone, PartialEq, Eq)]
pub struct LockedObject {
    pub domain: KeyDomain,
    pub salt: [u8; SALT_LEN],
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
    pub signature: [u8; SIGNATURE_LEN],
}

impl LockedObject {
    pub fn header(&self) -> Vec<u8> {
        let mut header = Vec::with_capacity(HEADER_LEN);
        header.extend_from_slice(MAGIC);
        header.push(self.domain.tag());
        header.extend_from_slice(&self.salt);
        header.extend_from_slice(&self.nonce);
        header
    }

    /// Bytes covered by the signature
    pub fn signed_bytes(&self) -> Vec<u8> {
        let mut bytes = self.header();
        bytes.extend_from_slice(&self.ciphertext);
        bytes
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.signed_bytes();
        bytes.extend_from_slice(&self.signature);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LockedObjectError> {
        if bytes.len() < HEADER_LEN + TAG_LEN + SIGNATURE_LEN {
            return Err(LockedObjectError::TooShort { len: bytes.len() });
        }
        if &bytes[..MAGIC.len()] != MAGIC {
            return Err(LockedObjectError::BadMagic);
        }
        let domain = KeyDomain::from_tag(bytes[MAGIC.len()])?;

        let mut offset = MAGIC.len() + 1;
        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(&bytes[offset..offset + SALT_LEN]);
        offset += SALT_LEN;
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&bytes[offset..offset + NONCE_LEN]);
        offset += NONCE_LEN;

        let sig_start = bytes.len() - SIGNATURE_LEN;
        let mut signature = [0u8; SIGNATURE_LEN];
        signature.copy_from_slice(&bytes[sig_start..]);

        Ok(LockedObject {
            domain,
            salt,
            nonce,
            ciphertext: bytes[offset..sig_start].to_vec(),
            signature,
        })
    }
}

impl fmt::Debug for LockedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockedObject")
            .field("domain", &self.domain)
            .field("ciphertext_len", &self.ciphertext.len())
            .finish()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockedObjectError {
    #[error("Locked object is truncated ({len} bytes)")]
    TooShort { len: usize },

    #[error("Not a locked object")]
    BadMagic,

    #[error("Unknown key domain tag {tag}")]
    UnknownDomain { tag: u8 },

    #[error("Unknown key domain: {name}")]
    UnknownDomainName { name: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> LockedObject {
        LockedObject {
            domain: KeyDomain::Shared,
            salt: [1u8; SALT_LEN],
            nonce: [2u8; NONCE_LEN],
            ciphertext: vec![3u8; 40],
            signature: [4u8; SIGNATURE_LEN],
        }
    }

    #[test]
    fn test_wire_layout() {
        let bytes = sample().to_bytes();
        assert_eq!(&bytes[..4], b"LKO1");
        assert_eq!(bytes[4], 1);
        assert_eq!(bytes.len(), HEADER_LEN + 40 + SIGNATURE_LEN);
        assert_eq!(LockedObject::from_bytes(&bytes).unwrap(), sample());
    }

    #[test]
    fn test_truncated_object() {
        let bytes = sample().to_bytes();
        assert!(matches!(
            LockedObject::from_bytes(&bytes[..50]),
            Err(LockedObjectError::TooShort { len: 50 })
        ));
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = sample().to_bytes();
        bytes[0] = b'X';
        assert_eq!(
            LockedObject::from_bytes(&bytes).unwrap_err(),
            LockedObjectError::BadMagic
        );
    }

    #[test]
    fn test_unknown_domain_tag() {
        let mut bytes = sample().to_bytes();
        bytes[4] = 9;
        assert_eq!(
            LockedObject::from_bytes(&bytes).unwrap_err(),
            LockedObjectError::UnknownDomain { tag: 9 }
        );
    }

    #[test]
    fn test_domain_labels_differ() {
        assert_ne!(KeyDomain::OneWay.cipher_label(), KeyDomain::Shared.cipher_label());
        assert_ne!(
            KeyDomain::OneWay.signing_label(),
            KeyDomain::OneWay.cipher_label()
        );
        assert_eq!("one-way".parse::<KeyDomain>().unwrap(), KeyDomain::OneWay);
    }
}
