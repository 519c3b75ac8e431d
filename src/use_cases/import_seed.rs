//! Restore a wallet from a BIP39 mnemonic and derive a leaf node

use tracing::debug;
use zeroize::Zeroizing;

use crate::error::HsmResult;
use crate::model::{
    KeyType, Keyring, NodeAddress, PublicKey, SeedPhrase, SeedSource, Slot, WalletParams,
    WalletVariant,
};
use crate::ports::{DeviceFinder, KeyStore, WalletManager};

/// Root and leaf slot of a restored wallet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedWallet {
    pub root: Slot,
    pub leaf: Slot,
    pub node_addr: NodeAddress,
    pub public_key: PublicKey,
}

/// First receiving address of the usual account layout for a wallet
pub fn default_node_address(params: &WalletParams) -> &'static str {
    match (params.variant, params.key_type) {
        (WalletVariant::Cardano, _) => "m/1852'/1815'/0'/0/0",
        // SLIP-10 Ed25519 only has hardened children
        (WalletVariant::Standard, KeyType::Ed25519) => "m/44'/0'/0'/0'/0'",
        (WalletVariant::Standard, _) => "m/44'/0'/0'/0/0",
    }
}

/// Restore a wallet root from a seed phrase and derive `path` below it
///
/// # Arguments
///
/// * `finder` - Element finder
/// * `params` - Key type, variant and name of the new wallet
/// * `seed_phrase` - BIP39 English mnemonic
/// * `passphrase` - Optional passphrase (empty string if none)
/// * `path` - Node address of the leaf, [`default_node_address`] if None
///
/// # Errors
///
/// Returns errors if:
/// - Seed phrase or node address is invalid
/// - The wallet name is already used
/// - A hardened step is requested for a curve that cannot derive it
pub fn import_seed_phrase<F>(
    finder: &F,
    params: &WalletParams,
    seed_phrase: &str,
    passphrase: &str,
    path: Option<&str>,
) -> HsmResult<ImportedWallet>
where
    F: DeviceFinder,
{
    let mnemonic = SeedPhrase::try_from(seed_phrase)?;
    let node_addr = NodeAddress::try_from(path.unwrap_or_else(|| default_node_address(params)))?;
    debug!("Restoring {:?} down to {}", params, node_addr);

    let element = finder.find_first()?;
    let mut element = element.lock();

    let root = element.create_master_seed(
        params,
        SeedSource::Bip39 {
            mnemonic,
            passphrase: Zeroizing::new(passphrase.to_string()),
        },
    )?;
    let leaf = element.derive_path(root, &node_addr)?;
    let public_key = element.public_key(leaf, Keyring::Local)?;

    Ok(ImportedWallet {
        root,
        leaf,
        node_addr,
        public_key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::SoftwareFinder;
    use crate::model::WalletSelector;

    const PHRASE: &str = "test walk nut penalty hip pave soap entry language right filter choice";

    #[test]
    fn test_import_cardano_default_path() {
        let finder = SoftwareFinder::default();
        let params = WalletParams::new(KeyType::Ed25519, "ada").with_variant(WalletVariant::Cardano);

        let wallet = import_seed_phrase(&finder, &params, PHRASE, "", None).unwrap();
        assert_eq!(wallet.node_addr.to_string(), "m/1852'/1815'/0'/0/0");
        assert_eq!(wallet.public_key.as_bytes().len(), 32);

        let element = finder.find_first().unwrap();
        let found = element
            .lock()
            .slot_of(&wallet.node_addr, &WalletSelector::Name("ada".to_string()))
            .unwrap();
        assert_eq!(found, wallet.leaf);
    }

    #[test]
    fn test_passphrase_changes_keys() {
        let finder = SoftwareFinder::default();
        let plain = import_seed_phrase(
            &finder,
            &WalletParams::new(KeyType::Secp256k1, "plain"),
            PHRASE,
            "",
            None,
        )
        .unwrap();
        let salted = import_seed_phrase(
            &finder,
            &WalletParams::new(KeyType::Secp256k1, "salted"),
            PHRASE,
            "foo",
            None,
        )
        .unwrap();
        assert_ne!(plain.public_key, salted.public_key);
    }

    #[test]
    fn test_same_phrase_same_leaf() {
        let finder = SoftwareFinder::default();
        let path = Some("m/44'/60'/0'/0/3");
        let a = import_seed_phrase(
            &finder,
            &WalletParams::new(KeyType::Secp256k1, "a"),
            PHRASE,
            "",
            path,
        )
        .unwrap();
        let b = import_seed_phrase(
            &finder,
            &WalletParams::new(KeyType::Secp256k1, "b"),
            PHRASE,
            "",
            path,
        )
        .unwrap();
        assert_eq!(a.public_key, b.public_key);
        assert_ne!(a.leaf, b.leaf);
    }

    #[test]
    fn test_invalid_phrase() {
        let finder = SoftwareFinder::default();
        let params = WalletParams::new(KeyType::NistP256, "bad");
        assert!(import_seed_phrase(&finder, &params, "test walk nut", "", None).is_err());
    }
}
