//! Hierarchical deterministic derivation
//!
//! - secp256k1: BIP32 ("Bitcoin seed"); an invalid key is an error and the
//!   caller moves on to the next index
//! - nistp256: SLIP-10 ("Nist256p1 seed"), invalid keys are re-hashed
//! - ed25519: SLIP-10 ("ed25519 seed"), hardened children only
//! - ed25519 cardano: BIP32-Ed25519 V2, hardened and soft children

use hmac::{Hmac, Mac};
use sha2::Sha512;
use zeroize::Zeroizing;

use super::curve::{nistp256, secp256k1};
use crate::error::{CryptoError, HsmError, HsmResult};
use crate::model::{
    CardanoKey, CardanoPublicKey, ChainCode, KeyType, PrivateKey, PublicKey, WalletVariant,
};

const HARDENED_BIT: u32 = 0x8000_0000;

/// Key and chain code of one tree node
#[derive(Debug, Clone)]
pub struct ExtendedNode {
    pub private: Option<PrivateKey>,
    pub public: PublicKey,
    pub chain_code: ChainCode,
}

/// HMAC-SHA512 over the concatenation of `parts`
pub(crate) fn hmac_sha512(key: &[u8], parts: &[&[u8]]) -> HsmResult<Zeroizing<[u8; 64]>> {
    let mut mac = Hmac::<Sha512>::new_from_slice(key).map_err(|e| CryptoError::InvalidInput {
        reason: e.to_string(),
    })?;
    for part in parts {
        mac.update(part);
    }
    let mut out = Zeroizing::new([0u8; 64]);
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

/// IL as key material, IR as chain code
fn split(i: &[u8; 64]) -> (Zeroizing<[u8; 32]>, ChainCode) {
    let mut il = Zeroizing::new([0u8; 32]);
    il.copy_from_slice(&i[..32]);
    let mut chain = [0u8; 32];
    chain.copy_from_slice(&i[32..]);
    (il, ChainCode::new(chain))
}

fn curve_key(key_type: KeyType) -> HsmResult<&'static [u8]> {
    match key_type {
        KeyType::Secp256k1 => Ok(b"Bitcoin seed"),
        KeyType::NistP256 => Ok(b"Nist256p1 seed"),
        KeyType::Ed25519 => Ok(b"ed25519 seed"),
        KeyType::X25519 => Err(HsmError::invalid_argument(
            "x25519 keys cannot form a wallet",
        )),
    }
}

fn is_valid_secret(key_type: KeyType, candidate: &[u8]) -> bool {
    match key_type {
        KeyType::Secp256k1 => secp256k1::is_valid_secret(candidate),
        KeyType::NistP256 => nistp256::is_valid_secret(candidate),
        _ => true,
    }
}

fn node_from_private(
    key_type: KeyType,
    private: &[u8],
    chain_code: ChainCode,
) -> HsmResult<ExtendedNode> {
    let private = PrivateKey::from_slice(private)?;
    let public = super::curve::public_from_private(key_type, &private)?;
    Ok(ExtendedNode {
        private: Some(private),
        public,
        chain_code,
    })
}

/// Master node from a BIP32/SLIP-10 seed
pub fn master_node(key_type: KeyType, seed: &[u8]) -> HsmResult<ExtendedNode> {
    let key = curve_key(key_type)?;
    let mut data = Zeroizing::new(seed.to_vec());
    loop {
        let i = hmac_sha512(key, &[data.as_slice()])?;
        let (il, chain_code) = split(&i);
        if is_valid_secret(key_type, il.as_slice()) {
            return node_from_private(key_type, il.as_slice(), chain_code);
        }
        if key_type == KeyType::Secp256k1 {
            return Err(invalid_under_bip32(
                "seed yields an invalid BIP32 master key".to_string(),
            ));
        }
        data = Zeroizing::new(i.to_vec());
    }
}

/// Master node of a cardano wallet from its Icarus root key
pub fn cardano_master_node(root: &CardanoKey) -> HsmResult<ExtendedNode> {
    Ok(ExtendedNode {
        private: Some(PrivateKey::from_slice(&root.extended_secret())?),
        public: PublicKey::from_slice(&root.public_key())?,
        chain_code: root.chain_code(),
    })
}

fn child_index(index: u32, hardened: bool) -> HsmResult<u32> {
    if index & HARDENED_BIT != 0 {
        return Err(CryptoError::ParameterOutOfRange {
            reason: format!("child index {} must be below 2^31", index),
        }
        .into());
    }
    Ok(if hardened { index | HARDENED_BIT } else { index })
}

fn soft_ed25519_unsupported() -> HsmError {
    HsmError::invalid_argument("ed25519 wallets only support hardened derivation")
}

/// Child of a node that holds private material
pub fn derive_private(
    key_type: KeyType,
    variant: WalletVariant,
    parent: &ExtendedNode,
    index: u32,
    hardened: bool,
) -> HsmResult<ExtendedNode> {
    let full_index = child_index(index, hardened)?;
    let private = parent.private.as_ref().ok_or_else(|| CryptoError::MissingPrivateKey {
        slot: "parent".to_string(),
    })?;
    let ser_index = full_index.to_be_bytes();

    match (key_type, variant) {
        (KeyType::Ed25519, WalletVariant::Cardano) => {
            let secret: [u8; 64] =
                private
                    .as_bytes()
                    .try_into()
                    .map_err(|_| CryptoError::InvalidKeyMaterial {
                        reason: "cardano node without extended secret".to_string(),
                    })?;
            let child = CardanoKey::from_parts(&secret, &parent.chain_code)?.derive_child(full_index);
            cardano_master_node(&child)
        }
        (KeyType::Ed25519, _) => {
            if !hardened {
                return Err(soft_ed25519_unsupported());
            }
            let i = hmac_sha512(
                parent.chain_code.as_bytes(),
                &[&[0u8][..], private.as_bytes(), &ser_index[..]],
            )?;
            let (il, chain_code) = split(&i);
            node_from_private(key_type, il.as_slice(), chain_code)
        }
        (KeyType::Secp256k1 | KeyType::NistP256, _) => {
            let mut data = if hardened {
                let mut data = Zeroizing::new(vec![0u8]);
                data.extend_from_slice(private.as_bytes());
                data
            } else {
                Zeroizing::new(compressed(key_type, &parent.public)?)
            };
            loop {
                let i = hmac_sha512(parent.chain_code.as_bytes(), &[data.as_slice(), &ser_index[..]])?;
                let (il, chain_code) = split(&i);
                let tweaked = match key_type {
                    KeyType::Secp256k1 => secp256k1::add_scalar(private.as_bytes(), &il),
                    _ => nistp256::add_scalar(private.as_bytes(), &il),
                };
                if let Some(child) = tweaked {
                    return node_from_private(key_type, &child, chain_code);
                }
                data = retry_data(key_type, index, &i)?;
            }
        }
        (KeyType::X25519, _) => Err(HsmError::invalid_argument(
            "x25519 keys cannot form a wallet",
        )),
    }
}

/// Non-hardened child computed from public material only
pub fn derive_public(
    key_type: KeyType,
    variant: WalletVariant,
    public: &PublicKey,
    chain_code: &ChainCode,
    index: u32,
) -> HsmResult<(PublicKey, ChainCode)> {
    let full_index = child_index(index, false)?;
    let ser_index = full_index.to_be_bytes();

    match (key_type, variant) {
        (KeyType::Ed25519, WalletVariant::Cardano) => {
            let raw: [u8; 32] =
                public
                    .as_bytes()
                    .try_into()
                    .map_err(|_| CryptoError::InvalidKeyMaterial {
                        reason: "ed25519 public key must be 32 bytes".to_string(),
                    })?;
            let child = CardanoPublicKey::new(&raw, chain_code).derive_child(full_index)?;
            Ok((PublicKey::from_slice(&child.public_key())?, child.chain_code()))
        }
        (KeyType::Ed25519, _) => Err(soft_ed25519_unsupported()),
        (KeyType::Secp256k1 | KeyType::NistP256, _) => {
            let mut data = Zeroizing::new(compressed(key_type, public)?);
            loop {
                let i = hmac_sha512(chain_code.as_bytes(), &[data.as_slice(), &ser_index[..]])?;
                let (il, child_chain) = split(&i);
                let tweaked = match key_type {
                    KeyType::Secp256k1 => secp256k1::add_point(public.as_bytes(), &il),
                    _ => nistp256::add_point(public.as_bytes(), &il),
                };
                if let Some(child) = tweaked {
                    return Ok((PublicKey::from_slice(&child)?, child_chain));
                }
                data = retry_data(key_type, index, &i)?;
            }
        }
        (KeyType::X25519, _) => Err(HsmError::invalid_argument(
            "x25519 keys cannot form a wallet",
        )),
    }
}

fn invalid_under_bip32(reason: String) -> HsmError {
    CryptoError::InvalidKeyMaterial { reason }.into()
}

/// SLIP-10 retry input 0x01 || IR; BIP32 has no retry
fn retry_data(key_type: KeyType, index: u32, i: &[u8; 64]) -> HsmResult<Zeroizing<Vec<u8>>> {
    if key_type == KeyType::Secp256k1 {
        return Err(invalid_under_bip32(format!(
            "child {} is invalid under BIP32, use the next index",
            index
        )));
    }
    let mut data = Zeroizing::new(vec![1u8]);
    data.extend_from_slice(&i[32..]);
    Ok(data)
}

fn compressed(key_type: KeyType, public: &PublicKey) -> HsmResult<Vec<u8>> {
    Ok(match key_type {
        KeyType::Secp256k1 => secp256k1::compressed(public.as_bytes())?,
        _ => nistp256::compressed(public.as_bytes())?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const VECTOR_1_SEED: &str = "000102030405060708090a0b0c0d0e0f";

    fn private_hex(node: &ExtendedNode) -> String {
        hex::encode(node.private.as_ref().unwrap().as_bytes())
    }

    #[test]
    fn test_bip32_vector_1_master() {
        let seed = hex::decode(VECTOR_1_SEED).unwrap();
        let master = master_node(KeyType::Secp256k1, &seed).unwrap();
        assert_eq!(
            private_hex(&master),
            "e8f32e723decf4051aefac8e2c93c9c5b214313817cdb01a1494b917c8436b35"
        );
        assert_eq!(
            hex::encode(master.chain_code.as_bytes()),
            "873dff81c02f525623fd1fe5167eac3a55a049de3d314bb42ee227ffed37d508"
        );
        assert_eq!(
            hex::encode(compressed(KeyType::Secp256k1, &master.public).unwrap()),
            "0339a36013301597daef41fbe593a02cc513d0b55527ec2df1050e2e8ff49c85c2"
        );
    }

    #[test]
    fn test_bip32_vector_1_hardened_child() {
        let seed = hex::decode(VECTOR_1_SEED).unwrap();
        let master = master_node(KeyType::Secp256k1, &seed).unwrap();
        let child =
            derive_private(KeyType::Secp256k1, WalletVariant::Standard, &master, 0, true).unwrap();
        assert_eq!(
            private_hex(&child),
            "edb2e14f9ee77d26dd93b4ecede8d16ed408ce149b6cd80b0715a2d911a0afea"
        );
        assert_eq!(
            hex::encode(child.chain_code.as_bytes()),
            "47fdacbd0f1097043b78c63c20c34ef4ed9a111d980047ad16282c7ae6236141"
        );
    }

    #[test]
    fn test_slip10_ed25519_vector_1() {
        let seed = hex::decode(VECTOR_1_SEED).unwrap();
        let master = master_node(KeyType::Ed25519, &seed).unwrap();
        assert_eq!(
            private_hex(&master),
            "2b4be7f19ee27bbf30c667b642d5f4aa69fd169872f8fc3059c08ebae2eb19e7"
        );
        assert_eq!(
            hex::encode(master.chain_code.as_bytes()),
            "90046a93de5380a72b5e45010748567d5ea02bbf6522f979e05c0d8d8ca9fffb"
        );

        let child =
            derive_private(KeyType::Ed25519, WalletVariant::Standard, &master, 0, true).unwrap();
        assert_eq!(
            private_hex(&child),
            "68e0fe46dfb67e368c75379acec591dad19df3cde26e63b93a8e704f1dade7a3"
        );
        assert_eq!(
            hex::encode(child.chain_code.as_bytes()),
            "8b59aa11380b624e81507a27fedda59fea6d0b779a778918a2fd3590e16e9c69"
        );
    }

    #[test]
    fn test_ed25519_soft_derivation_rejected() {
        let master = master_node(KeyType::Ed25519, &[7u8; 32]).unwrap();
        assert!(
            derive_private(KeyType::Ed25519, WalletVariant::Standard, &master, 0, false).is_err()
        );
    }

    #[test]
    fn test_public_derivation_matches_private_for_weierstrass_curves() {
        for key_type in [KeyType::Secp256k1, KeyType::NistP256] {
            let master = master_node(key_type, &[0x11u8; 64]).unwrap();
            let private_child =
                derive_private(key_type, WalletVariant::Standard, &master, 5, false).unwrap();
            let (public, chain_code) = derive_public(
                key_type,
                WalletVariant::Standard,
                &master.public,
                &master.chain_code,
                5,
            )
            .unwrap();
            assert_eq!(public, private_child.public, "{key_type}");
            assert_eq!(chain_code, private_child.chain_code, "{key_type}");
        }
    }

    #[test]
    fn test_cardano_public_derivation_matches_private() {
        let root = CardanoKey::from_entropy(&[3u8; 32], "");
        let master = cardano_master_node(&root).unwrap();
        let private_child =
            derive_private(KeyType::Ed25519, WalletVariant::Cardano, &master, 9, false).unwrap();
        let (public, _) = derive_public(
            KeyType::Ed25519,
            WalletVariant::Cardano,
            &master.public,
            &master.chain_code,
            9,
        )
        .unwrap();
        assert_eq!(public, private_child.public);
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let master = master_node(KeyType::NistP256, &[0x22u8; 32]).unwrap();
        let one = derive_private(KeyType::NistP256, WalletVariant::Standard, &master, 44, true).unwrap();
        let two = derive_private(KeyType::NistP256, WalletVariant::Standard, &master, 44, true).unwrap();
        assert_eq!(one.public, two.public);
        assert_eq!(one.chain_code, two.chain_code);
    }

    #[test]
    fn test_index_with_hardened_bit_rejected() {
        let master = master_node(KeyType::Secp256k1, &[0x33u8; 32]).unwrap();
        let err = derive_private(
            KeyType::Secp256k1,
            WalletVariant::Standard,
            &master,
            0x8000_0001,
            false,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            HsmError::Crypto(CryptoError::ParameterOutOfRange { .. })
        ));
    }

    #[test]
    fn test_invalid_child_retries_only_on_nistp256() {
        let i = [0xabu8; 64];
        let err = retry_data(KeyType::Secp256k1, 7, &i).unwrap_err();
        assert!(matches!(
            err,
            HsmError::Crypto(CryptoError::InvalidKeyMaterial { .. })
        ));

        let data = retry_data(KeyType::NistP256, 7, &i).unwrap();
        assert_eq!(data[0], 1);
        assert_eq!(&data[1..], &i[32..]);
    }
}
