use rand::RngCore;
use tracing::debug;
use zeroize::Zeroizing;

use super::hd::{self, hmac_sha512, ExtendedNode};
use crate::error::HsmResult;
use crate::model::{CardanoKey, SeedSource, WalletParams, WalletVariant};

/// HMAC-SHA512 of `material` under the generator key, or `material` untouched
fn mix_generator(generator_key: &[u8], material: &[u8]) -> HsmResult<Zeroizing<Vec<u8>>> {
    if generator_key.is_empty() {
        return Ok(Zeroizing::new(material.to_vec()));
    }
    Ok(Zeroizing::new(hmac_sha512(generator_key, &[material])?.to_vec()))
}

/// Same as [`mix_generator`] but keeps the input length, for cardano entropy
fn mix_entropy(generator_key: &[u8], entropy: &[u8]) -> HsmResult<Zeroizing<Vec<u8>>> {
    let mut mixed = mix_generator(generator_key, entropy)?;
    mixed.truncate(entropy.len());
    Ok(mixed)
}

fn standard_seed(params: &WalletParams, source: &SeedSource) -> HsmResult<Zeroizing<Vec<u8>>> {
    let seed = match source {
        SeedSource::Random => {
            let mut seed = Zeroizing::new(vec![0u8; 64]);
            rand::rng().fill_bytes(&mut seed);
            return Ok(seed);
        }
        SeedSource::Bip39 {
            mnemonic,
            passphrase,
        } => Zeroizing::new(mnemonic.to_seed(passphrase).to_vec()),
        SeedSource::Slip39 { master_secret } => master_secret.clone(),
    };
    mix_generator(&params.generator_key, &seed)
}

fn cardano_root(params: &WalletParams, source: &SeedSource) -> HsmResult<CardanoKey> {
    Ok(match source {
        SeedSource::Random => {
            let mut bytes = Zeroizing::new([0u8; 96]);
            rand::rng().fill_bytes(bytes.as_mut_slice());
            CardanoKey::from_raw_bytes(*bytes)
        }
        SeedSource::Bip39 {
            mnemonic,
            passphrase,
        } => {
            let entropy = mix_entropy(&params.generator_key, &mnemonic.entropy())?;
            CardanoKey::from_entropy(&entropy, passphrase)
        }
        SeedSource::Slip39 { master_secret } => {
            let entropy = mix_entropy(&params.generator_key, master_secret)?;
            CardanoKey::from_entropy(&entropy, "")
        }
    })
}

/// Root node of a new wallet
pub fn wallet_root(params: &WalletParams, source: &SeedSource) -> HsmResult<ExtendedNode> {
    params.validate()?;
    debug!(
        "Building {} {} wallet root from {:?}",
        params.key_type, params.variant, source
    );
    match params.variant {
        WalletVariant::Standard => hd::master_node(params.key_type, &standard_seed(params, source)?),
        WalletVariant::Cardano => hd::cardano_master_node(&cardano_root(params, source)?),
    }
}
