//! Cardano key derivation using BIP32-Ed25519 (CIP-1852) and Icarus master key generation (CIP-3)

use ed25519_bip32::{DerivationScheme, XPrv, XPub};
use pbkdf2::pbkdf2_hmac;
use sha2::Sha512;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::model::{ChainCode, SeedPhrase};

/// Cardano extended private key (96 bytes: 64-byte extended secret + 32-byte chain code)
#[derive(Clone, PartialEq, Eq)]
pub struct CardanoKey(XPrv);

/// Cardano extended public key, used for watch-only soft derivation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardanoPublicKey(XPub);

/// Errors that can occur during Cardano key operations
#[derive(Error, Debug)]
pub enum CardanoKeyError {
    #[error("Cardano key error")]
    PrivateKey(#[from] ed25519_bip32::PrivateKeyError),

    #[error("Soft derivation failed: {reason}")]
    Derivation { reason: String },
}

impl CardanoKey {
    /// Generate a root key from raw entropy using the Icarus method (CIP-3)
    ///
    /// - PBKDF2-HMAC-SHA512 with 4096 iterations
    /// - Salt = raw entropy bytes
    /// - Password = passphrase (UTF-8 bytes)
    /// - Output = 96 bytes, then normalized with Ed25519 bit tweaks
    pub fn from_entropy(entropy: &[u8], passphrase: &str) -> Self {
        let mut output = Zeroizing::new([0u8; 96]);
        pbkdf2_hmac::<Sha512>(passphrase.as_bytes(), entropy, 4096, &mut output[..]);

        // Clears bits 0-2, sets bit 254, clears bit 255 and the 3rd highest bit
        CardanoKey(XPrv::normalize_bytes_force3rd(*output))
    }

    /// Icarus root key for a BIP39 mnemonic
    pub fn from_seed_phrase(seed: &SeedPhrase, passphrase: &str) -> Self {
        Self::from_entropy(&seed.entropy(), passphrase)
    }

    /// Normalize 96 raw bytes into a root key
    pub fn from_raw_bytes(bytes: [u8; 96]) -> Self {
        CardanoKey(XPrv::normalize_bytes_force3rd(bytes))
    }

    /// Rebuild a key from its stored extended secret and chain code
    pub fn from_parts(
        extended_secret: &[u8; 64],
        chain_code: &ChainCode,
    ) -> Result<Self, CardanoKeyError> {
        let mut bytes = Zeroizing::new([0u8; 96]);
        bytes[..64].copy_from_slice(extended_secret);
        bytes[64..].copy_from_slice(chain_code.as_bytes());
        Ok(CardanoKey(XPrv::from_bytes_verified(*bytes)?))
    }

    /// Derive one child (index carries the hardened bit) with BIP32-Ed25519 V2
    pub fn derive_child(&self, index: u32) -> Self {
        CardanoKey(self.0.derive(DerivationScheme::V2, index))
    }

    /// Derive along a list of indices
    pub fn derive(&self, indices: &[u32]) -> Self {
        let derived_key = indices.iter().fold(self.0.clone(), |key, &index| {
            key.derive(DerivationScheme::V2, index)
        });
        CardanoKey(derived_key)
    }

    pub fn extended_secret(&self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(self.0.extended_secret_key_bytes().to_vec())
    }

    pub fn chain_code(&self) -> ChainCode {
        ChainCode::new(*self.0.chain_code())
    }

    /// The 32-byte Ed25519 public key
    pub fn public_key(&self) -> [u8; 32] {
        *self.0.public().public_key_bytes()
    }

    pub fn to_public(&self) -> CardanoPublicKey {
        CardanoPublicKey(self.0.public())
    }

    /// Ed25519 signature over `message` using the extended secret
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        *self.0.sign::<()>(message).to_bytes()
    }
}

impl std::fmt::Debug for CardanoKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CardanoKey([REDACTED])")
    }
}

impl CardanoPublicKey {
    pub fn new(public_key: &[u8; 32], chain_code: &ChainCode) -> Self {
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(public_key);
        bytes[32..].copy_from_slice(chain_code.as_bytes());
        CardanoPublicKey(XPub::from_bytes(bytes))
    }

    /// Soft child derivation; hardened indices are rejected
    pub fn derive_child(&self, index: u32) -> Result<Self, CardanoKeyError> {
        let child = self
            .0
            .derive(DerivationScheme::V2, index)
            .map_err(|e| CardanoKeyError::Derivation {
                reason: format!("{:?}", e),
            })?;
        Ok(CardanoPublicKey(child))
    }

    pub fn public_key(&self) -> [u8; 32] {
        *self.0.public_key_bytes()
    }

    pub fn chain_code(&self) -> ChainCode {
        ChainCode::new(*self.0.chain_code())
    }
}
