use std::fmt;
use thiserror::Error;
use zeroize::Zeroizing;

/// Private key bytes held by a local slot
///
/// Weierstrass keys and plain Ed25519 keys are 32 bytes. Ed25519 keys of a
/// cardano wallet are 64-byte extended secrets (kL || kR).
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey(Zeroizing<Vec<u8>>);

impl PrivateKey {
    pub fn from_slice(key: &[u8]) -> Result<Self, KeyMaterialError> {
        match key.len() {
            32 | 64 => Ok(Self(Zeroizing::new(key.to_vec()))),
            actual => Err(KeyMaterialError::InvalidLength {
                expected: 32,
                actual,
            }),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Whether this is a BIP32-Ed25519 extended secret
    pub fn is_extended(&self) -> bool {
        self.0.len() == 64
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey([REDACTED])")
    }
}

/// Public key in its export encoding
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PublicKey(Vec<u8>);

impl PublicKey {
    pub fn from_slice(key: &[u8]) -> Result<Self, KeyMaterialError> {
        match key.len() {
            32 | 33 | 65 => Ok(Self(key.to_vec())),
            actual => Err(KeyMaterialError::InvalidLength {
                expected: 65,
                actual,
            }),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = self.0.len().min(8);
        write!(f, "PublicKey({})", hex::encode(&self.0[..shown]))
    }
}

/// BIP32 chain code
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ChainCode([u8; 32]);

impl ChainCode {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyMaterialError> {
        let array: [u8; 32] =
            bytes
                .try_into()
                .map_err(|_| KeyMaterialError::InvalidLength {
                    expected: 32,
                    actual: bytes.len(),
                })?;
        Ok(Self(array))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for ChainCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChainCode({}..)", hex::encode(&self.0[..4]))
    }
}

/// Output of a signing operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoverableSignature {
    /// 64 bytes, r || s
    pub signature: Vec<u8>,
    pub recovery_id: u8,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyMaterialError {
    #[error("Key must be exactly {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Invalid {key_type} public key")]
    InvalidPublicKey { key_type: String },

    #[error("Invalid {key_type} private key")]
    InvalidPrivateKey { key_type: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_private_key_from_slice_valid() {
        assert!(PrivateKey::from_slice(&[7u8; 32]).is_ok());
        assert!(PrivateKey::from_slice(&[7u8; 64]).unwrap().is_extended());
    }

    #[test]
    fn test_private_key_from_slice_invalid_length() {
        assert_eq!(
            PrivateKey::from_slice(&[0u8; 16]).unwrap_err(),
            KeyMaterialError::InvalidLength {
                expected: 32,
                actual: 16
            }
        );
    }

    #[test]
    fn test_private_key_debug_redacted() {
        let key = PrivateKey::from_slice(&[1u8; 32]).unwrap();
        let debug_str = format!("{:?}", key);
        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("0101"));
    }

    #[test]
    fn test_public_key_debug_shows_partial() {
        let key = PublicKey::from_slice(&[0xab; 65]).unwrap();
        let debug_str = format!("{:?}", key);
        assert_eq!(debug_str, "PublicKey(abababababababab)");
    }

    #[test]
    fn test_public_key_rejects_odd_length() {
        assert!(PublicKey::from_slice(&[0u8; 40]).is_err());
    }

    #[test]
    fn test_chain_code_from_slice() {
        let code = ChainCode::from_slice(&[9u8; 32]).unwrap();
        assert_eq!(code.as_bytes(), &[9u8; 32]);
        assert!(ChainCode::from_slice(&[9u8; 31]).is_err());
    }
}
