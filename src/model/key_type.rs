//! Key type for curves supported by the secure element

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Elliptic curve a slot's key lives on
///
/// This type provides a type-safe way to specify key types. SECP256R1 is the
/// same curve as NIST P-256 and parses to [`KeyType::NistP256`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    /// NIST P-256 (a.k.a. secp256r1), ECDSA and ECDH
    NistP256,
    /// secp256k1, ECDSA and ECDH
    Secp256k1,
    /// Ed25519, EdDSA signatures only
    Ed25519,
    /// X25519, key agreement only
    X25519,
}

impl KeyType {
    /// Every supported key type, in code order
    pub const ALL: [KeyType; 4] = [
        KeyType::NistP256,
        KeyType::Secp256k1,
        KeyType::Ed25519,
        KeyType::X25519,
    ];

    /// Whether keys of this type can produce signatures
    pub fn can_sign(self) -> bool {
        !matches!(self, KeyType::X25519)
    }

    /// Whether keys of this type can take part in ECDH
    pub fn can_agree(self) -> bool {
        !matches!(self, KeyType::Ed25519)
    }

    /// Whether the type uses ECDSA (and therefore supports recovery ids)
    pub fn is_ecdsa(self) -> bool {
        matches!(self, KeyType::NistP256 | KeyType::Secp256k1)
    }

    /// Length in bytes of an exported public key
    pub fn public_key_len(self) -> usize {
        match self {
            KeyType::NistP256 | KeyType::Secp256k1 => 65,
            KeyType::Ed25519 | KeyType::X25519 => 32,
        }
    }

    /// Numeric code matching the element's wire convention
    pub fn code(self) -> i32 {
        match self {
            KeyType::NistP256 => 0,
            KeyType::Secp256k1 => 1,
            KeyType::Ed25519 => 2,
            KeyType::X25519 => 3,
        }
    }

    pub fn from_code(code: i32) -> Result<Self, KeyTypeError> {
        match code {
            0 => Ok(KeyType::NistP256),
            1 => Ok(KeyType::Secp256k1),
            2 => Ok(KeyType::Ed25519),
            3 => Ok(KeyType::X25519),
            _ => Err(KeyTypeError::Unsupported {
                key_type: code.to_string(),
            }),
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KeyType::NistP256 => "nistp256",
            KeyType::Secp256k1 => "secp256k1",
            KeyType::Ed25519 => "ed25519",
            KeyType::X25519 => "x25519",
        };
        f.write_str(name)
    }
}

impl FromStr for KeyType {
    type Err = KeyTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nistp256" | "secp256r1" | "p256" => Ok(KeyType::NistP256),
            "secp256k1" => Ok(KeyType::Secp256k1),
            "ed25519" => Ok(KeyType::Ed25519),
            "x25519" => Ok(KeyType::X25519),
            _ => Err(KeyTypeError::Unsupported {
                key_type: s.to_string(),
            }),
        }
    }
}

/// Wallet flavour on top of a key type
///
/// `Cardano` selects Icarus master key generation and BIP32-Ed25519
/// derivation and is only valid together with [`KeyType::Ed25519`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WalletVariant {
    #[default]
    Standard,
    Cardano,
}

impl WalletVariant {
    /// Parse the element's variant string ("" or "cardano")
    pub fn parse(variant: &str) -> Result<Self, KeyTypeError> {
        match variant {
            "" => Ok(WalletVariant::Standard),
            "cardano" => Ok(WalletVariant::Cardano),
            other => Err(KeyTypeError::UnknownVariant {
                variant: other.to_string(),
            }),
        }
    }

    /// Check that this variant can be used with `key_type`
    pub fn check(self, key_type: KeyType) -> Result<(), KeyTypeError> {
        match (self, key_type) {
            (WalletVariant::Standard, KeyType::X25519) => Err(KeyTypeError::NoWalletSupport {
                key_type: key_type.to_string(),
            }),
            (WalletVariant::Standard, _) => Ok(()),
            (WalletVariant::Cardano, KeyType::Ed25519) => Ok(()),
            (WalletVariant::Cardano, other) => Err(KeyTypeError::VariantMismatch {
                variant: "cardano".to_string(),
                key_type: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for WalletVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalletVariant::Standard => f.write_str("standard"),
            WalletVariant::Cardano => f.write_str("cardano"),
        }
    }
}

/// Errors that can occur when working with key types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyTypeError {
    #[error("Key type not supported: {key_type}")]
    Unsupported { key_type: String },

    #[error("Unknown key variant: {variant}")]
    UnknownVariant { variant: String },

    #[error("Variant {variant} cannot be used with {key_type}")]
    VariantMismatch { variant: String, key_type: String },

    #[error("Key type {key_type} cannot be used for wallets")]
    NoWalletSupport { key_type: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_type_code_conversion() {
        for key_type in KeyType::ALL {
            assert_eq!(KeyType::from_code(key_type.code()).unwrap(), key_type);
        }
        assert!(KeyType::from_code(7).is_err());
    }

    #[test]
    fn test_secp256r1_alias() {
        assert_eq!("secp256r1".parse::<KeyType>().unwrap(), KeyType::NistP256);
        assert_eq!("NISTP256".parse::<KeyType>().unwrap(), KeyType::NistP256);
    }

    #[test]
    fn test_capabilities() {
        assert!(!KeyType::X25519.can_sign());
        assert!(!KeyType::Ed25519.can_agree());
        assert!(KeyType::Secp256k1.is_ecdsa());
        assert!(!KeyType::Ed25519.is_ecdsa());
    }

    #[test]
    fn test_cardano_variant_requires_ed25519() {
        assert!(WalletVariant::Cardano.check(KeyType::Ed25519).is_ok());
        assert!(matches!(
            WalletVariant::Cardano.check(KeyType::Secp256k1),
            Err(KeyTypeError::VariantMismatch { .. })
        ));
        assert!(WalletVariant::Standard.check(KeyType::X25519).is_err());
    }

    #[test]
    fn test_variant_parse() {
        assert_eq!(WalletVariant::parse("").unwrap(), WalletVariant::Standard);
        assert_eq!(WalletVariant::parse("cardano").unwrap(), WalletVariant::Cardano);
        assert!(WalletVariant::parse("solana").is_err());
    }

    #[test]
    fn test_key_type_error_display() {
        let err = KeyTypeError::Unsupported {
            key_type: "rsa".to_string(),
        };
        assert!(err.to_string().contains("not supported"));
    }
}
