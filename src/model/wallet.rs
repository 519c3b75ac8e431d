use std::fmt;
use zeroize::Zeroizing;

use crate::model::{ChainCode, KeyType, KeyTypeError, NodeAddress, SeedPhrase, Slot, WalletVariant};

/// Identifies which wallet a node address belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletSelector {
    Name(String),
    MasterSlot(Slot),
}

/// Reverse mapping of a wallet slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletNodeInfo {
    pub node_addr: NodeAddress,
    pub wallet_name: String,
    pub master_slot: Slot,
}

/// Result of a child derivation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedChild {
    pub slot: Slot,
    /// Present only for hardened children when requested
    pub chain_code: Option<ChainCode>,
}

/// What a new wallet is
#[derive(Clone, PartialEq, Eq)]
pub struct WalletParams {
    pub key_type: KeyType,
    pub variant: WalletVariant,
    pub name: String,
    /// Extra secret mixed into the master seed; empty means none
    pub generator_key: Zeroizing<Vec<u8>>,
}

impl WalletParams {
    pub fn new(key_type: KeyType, name: impl Into<String>) -> Self {
        Self {
            key_type,
            variant: WalletVariant::Standard,
            name: name.into(),
            generator_key: Zeroizing::new(Vec::new()),
        }
    }

    pub fn with_variant(mut self, variant: WalletVariant) -> Self {
        self.variant = variant;
        self
    }

    pub fn with_generator_key(mut self, generator_key: &[u8]) -> Self {
        self.generator_key = Zeroizing::new(generator_key.to_vec());
        self
    }

    pub fn validate(&self) -> Result<(), KeyTypeError> {
        self.variant.check(self.key_type)
    }
}

impl fmt::Debug for WalletParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletParams")
            .field("key_type", &self.key_type)
            .field("variant", &self.variant)
            .field("name", &self.name)
            .field("generator_key", &"[REDACTED]")
            .finish()
    }
}

/// Origin of a master seed
pub enum SeedSource {
    /// Fresh random seed with no recovery phrase
    Random,
    Bip39 {
        mnemonic: SeedPhrase,
        passphrase: Zeroizing<String>,
    },
    /// Master secret recovered from (or split into) SLIP39 shares
    Slip39 { master_secret: Zeroizing<Vec<u8>> },
}

impl fmt::Debug for SeedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeedSource::Random => f.write_str("Random"),
            SeedSource::Bip39 { .. } => f.write_str("Bip39([REDACTED])"),
            SeedSource::Slip39 { .. } => f.write_str("Slip39([REDACTED])"),
        }
    }
}

/// Externally supplied public root of a watch-only wallet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OversightRoot {
    pub public_key: Vec<u8>,
    pub chain_code: ChainCode,
    pub node_addr: NodeAddress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_builder() {
        let params = WalletParams::new(KeyType::Ed25519, "ada")
            .with_variant(WalletVariant::Cardano)
            .with_generator_key(b"pepper");
        assert!(params.validate().is_ok());
        assert_eq!(params.generator_key.as_slice(), b"pepper");
    }

    #[test]
    fn test_params_reject_x25519() {
        let params = WalletParams::new(KeyType::X25519, "dh");
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_debug_hides_secrets() {
        let params = WalletParams::new(KeyType::Secp256k1, "btc").with_generator_key(b"pepper");
        assert!(!format!("{:?}", params).contains("pepper"));

        let source = SeedSource::Slip39 {
            master_secret: Zeroizing::new(vec![0xaa; 16]),
        };
        assert_eq!(format!("{:?}", source), "Slip39([REDACTED])");
    }
}
