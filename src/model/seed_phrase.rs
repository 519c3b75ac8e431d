use bip39::{Language, Mnemonic};
use std::fmt;
use thiserror::Error;
use zeroize::Zeroizing;

/// BIP39 English mnemonic
#[derive(Clone, PartialEq, Eq)]
pub struct SeedPhrase(Mnemonic);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid mnemonic")]
pub struct SeedPhraseError {
    #[from]
    source: bip39::Error,
}

impl TryFrom<&str> for SeedPhrase {
    type Error = SeedPhraseError;

    fn try_from(phrase: &str) -> Result<Self, Self::Error> {
        let mnemonic = Mnemonic::parse_in(Language::English, phrase)?;
        Ok(SeedPhrase(mnemonic))
    }
}

impl SeedPhrase {
    /// Build a mnemonic from raw entropy (16..=32 bytes, multiple of 4)
    pub fn from_entropy(entropy: &[u8]) -> Result<Self, SeedPhraseError> {
        let mnemonic = Mnemonic::from_entropy_in(Language::English, entropy)?;
        Ok(SeedPhrase(mnemonic))
    }

    pub fn entropy(&self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(self.0.to_entropy())
    }

    /// BIP39 seed (PBKDF2-HMAC-SHA512, 2048 rounds, salt "mnemonic" + passphrase)
    pub fn to_seed(&self, passphrase: &str) -> Zeroizing<[u8; 64]> {
        Zeroizing::new(self.0.to_seed(passphrase))
    }

    pub fn word_count(&self) -> usize {
        self.0.word_count()
    }

    pub fn phrase(&self) -> Zeroizing<String> {
        Zeroizing::new(self.0.to_string())
    }
}

impl fmt::Debug for SeedPhrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SeedPhrase({} words, [REDACTED])", self.0.word_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_12_word_mnemonic() {
        let phrase = "test walk nut penalty hip pave soap entry language right filter choice";
        let seed = SeedPhrase::try_from(phrase);
        assert!(seed.is_ok());
        assert_eq!(seed.unwrap().word_count(), 12);
    }

    #[test]
    fn test_24_word_mnemonic() {
        let phrase = "excess behave track soul table wear ocean cash stay nature item turtle palm soccer lunch horror start stumble month panic right must lock dress";
        let seed = SeedPhrase::try_from(phrase).unwrap();
        assert_eq!(seed.entropy().len(), 32);
        assert_eq!(seed.phrase().as_str(), phrase);
    }

    #[test]
    fn test_invalid_word_count() {
        let result = SeedPhrase::try_from("test walk nut");
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_mnemonic() {
        let phrase = "invalid invalid invalid invalid invalid invalid invalid invalid invalid invalid invalid invalid";
        assert!(SeedPhrase::try_from(phrase).is_err());
    }

    #[test]
    fn test_from_entropy_round_trip() {
        let entropy = [0x42u8; 32];
        let seed = SeedPhrase::from_entropy(&entropy).unwrap();
        assert_eq!(seed.word_count(), 24);
        assert_eq!(seed.entropy().as_slice(), &entropy);
    }

    #[test]
    fn test_bip39_reference_seed() {
        // Trezor reference vector: all-zero entropy, passphrase "TREZOR"
        let seed = SeedPhrase::from_entropy(&[0u8; 16]).unwrap();
        assert_eq!(
            hex::encode(seed.to_seed("TREZOR").as_slice()),
            "c55257c360c07c72029aebc1b53c05ed0362ada38ead3e3e9efa3708e53495531f09a6987599d18264c1e1c92f2cf141630c7a3c4ab7c81b2f001698e7463b04"
        );
    }

    #[test]
    fn test_debug_redacted() {
        let seed = SeedPhrase::from_entropy(&[0u8; 16]).unwrap();
        assert!(!format!("{:?}", seed).contains("abandon"));
    }
}
