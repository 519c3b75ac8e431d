//! SLIP39 style shard codec
//!
//! Each shard carries a 48-bit header followed by its share value:
//!
//! ```text
//! id (15) | ext (1) | iteration exponent (4) | group index (4) | group threshold - 1 (4)
//!   | group count - 1 (4) | member index (4) | member threshold - 1 (4) | value length (8)
//! ```
//!
//! The bytes are followed by a SHA-256 checksum of at least 33 bits and written
//! as 11-bit words from the BIP39 English list. The group and member scheme
//! follows SLIP-0039, but the word list and checksum do not, so shards are
//! not readable by SLIP-0039 wallets.

use bip39::Language;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;
use zeroize::Zeroizing;

use super::shamir::SharePoint;
use crate::model::{MAX_ITERATION_EXPONENT, MAX_SHARE_COUNT};

/// Length of a freshly generated master secret
pub const MASTER_SECRET_LEN: usize = 32;
/// Shortest master secret a shard may carry
const MIN_SECRET_LEN: usize = 16;

const HEADER_LEN: usize = 6;
const MIN_CHECKSUM_BITS: usize = 33;
const BITS_PER_WORD: usize = 11;

const BASE_ITERATIONS: u32 = 10_000;
const ROUND_COUNT: u8 = 4;
const CUSTOMIZATION: &[u8] = b"shamir";

const MEMBER_MASK_ITERATIONS: u32 = 1_000;
const MEMBER_MASK_LABEL: &[u8] = b"hsmwallet/slip39/member";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShareError {
    #[error("Unknown shard word: {word}")]
    UnknownWord { word: String },

    #[error("Shard has an invalid word count {count}")]
    InvalidWordCount { count: usize },

    #[error("Shard checksum mismatch")]
    ChecksumMismatch,

    #[error("Malformed shard header: {reason}")]
    MalformedHeader { reason: String },

    #[error("Secret length {len} is not supported")]
    SecretLength { len: usize },

    #[error("Share values have different lengths")]
    InconsistentLength,

    #[error("Share index {index} appears twice")]
    DuplicateIndex { index: u8 },

    #[error("Need {needed} shares, have {have}")]
    InsufficientShares { needed: u8, have: u8 },

    #[error("Recovered secret failed its digest check")]
    DigestMismatch,
}

/// One decoded shard
#[derive(Clone, PartialEq, Eq)]
pub struct Share {
    pub identifier: u16,
    pub extendable: bool,
    pub iteration_exponent: u8,
    pub group_index: u8,
    pub group_threshold: u8,
    pub group_count: u8,
    pub member_index: u8,
    pub member_threshold: u8,
    pub value: Zeroizing<Vec<u8>>,
}

impl fmt::Debug for Share {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Share")
            .field("identifier", &self.identifier)
            .field("group_index", &self.group_index)
            .field("member_index", &self.member_index)
            .field("value", &"[REDACTED]")
            .finish()
    }
}

fn check_field(name: &str, value: u8, max: u8) -> Result<(), ShareError> {
    if value > max {
        return Err(ShareError::MalformedHeader {
            reason: format!("{name} {value} exceeds {max}"),
        });
    }
    Ok(())
}

fn checksum_bits(data_len: usize) -> usize {
    let words = (data_len * 8 + MIN_CHECKSUM_BITS).div_ceil(BITS_PER_WORD);
    words * BITS_PER_WORD - data_len * 8
}

fn push_bits(bits: &mut Vec<bool>, bytes: &[u8], count: usize) {
    bits.extend((0..count).map(|i| bytes[i / 8] & (0x80 >> (i % 8)) != 0));
}

fn bits_to_bytes(bits: &[bool]) -> Zeroizing<Vec<u8>> {
    let mut bytes = Zeroizing::new(vec![0u8; bits.len().div_ceil(8)]);
    for (i, bit) in bits.iter().enumerate() {
        if *bit {
            bytes[i / 8] |= 0x80 >> (i % 8);
        }
    }
    bytes
}

impl Share {
    fn header(&self) -> [u8; HEADER_LEN] {
        let packed: u64 = (u64::from(self.identifier) << 33)
            | (u64::from(self.extendable) << 32)
            | (u64::from(self.iteration_exponent) << 28)
            | (u64::from(self.group_index) << 24)
            | (u64::from(self.group_threshold - 1) << 20)
            | (u64::from(self.group_count - 1) << 16)
            | (u64::from(self.member_index) << 12)
            | (u64::from(self.member_threshold - 1) << 8)
            | self.value.len() as u64;
        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(&packed.to_be_bytes()[2..]);
        header
    }

    fn validate(&self) -> Result<(), ShareError> {
        check_field("identifier", (self.identifier >> 8) as u8, 0x7f)?;
        check_field("iteration exponent", self.iteration_exponent, MAX_ITERATION_EXPONENT)?;
        check_field("group count", self.group_count, MAX_SHARE_COUNT)?;
        check_field("member threshold", self.member_threshold, MAX_SHARE_COUNT)?;
        check_field("member index", self.member_index, MAX_SHARE_COUNT - 1)?;
        if self.group_count == 0 || self.member_threshold == 0 {
            return Err(ShareError::MalformedHeader {
                reason: "zero count".to_string(),
            });
        }
        check_field("group threshold", self.group_threshold, self.group_count)?;
        if self.group_threshold == 0 {
            return Err(ShareError::MalformedHeader {
                reason: "zero group threshold".to_string(),
            });
        }
        check_field("group index", self.group_index, self.group_count - 1)?;
        if self.value.len() < MIN_SECRET_LEN
            || self.value.len() > usize::from(u8::MAX)
            || self.value.len() % 2 != 0
        {
            return Err(ShareError::SecretLength {
                len: self.value.len(),
            });
        }
        Ok(())
    }

    /// Encode as space separated words
    pub fn to_mnemonic(&self) -> Result<Zeroizing<String>, ShareError> {
        self.validate()?;
        let mut data = Zeroizing::new(self.header().to_vec());
        data.extend_from_slice(&self.value);

        let checksum = Sha256::digest(data.as_slice());
        let mut bits = Vec::with_capacity(data.len() * 8 + 48);
        push_bits(&mut bits, &data, data.len() * 8);
        push_bits(&mut bits, &checksum, checksum_bits(data.len()));

        let words = Language::English.word_list();
        let mut mnemonic = Zeroizing::new(String::new());
        for (i, chunk) in bits.chunks(BITS_PER_WORD).enumerate() {
            let index = chunk
                .iter()
                .fold(0usize, |acc, bit| (acc << 1) | usize::from(*bit));
            if i > 0 {
                mnemonic.push(' ');
            }
            mnemonic.push_str(words[index]);
        }
        Ok(mnemonic)
    }

    /// Decode words produced by [`Share::to_mnemonic`]
    pub fn from_mnemonic(mnemonic: &str) -> Result<Self, ShareError> {
        let mut bits = Vec::new();
        let mut count = 0;
        for word in mnemonic.split_whitespace() {
            let index = Language::English
                .find_word(&word.to_lowercase())
                .ok_or_else(|| ShareError::UnknownWord {
                    word: word.to_string(),
                })?;
            let index = index.to_be_bytes();
            let mut word_bits = Vec::with_capacity(16);
            push_bits(&mut word_bits, &index, 16);
            bits.extend_from_slice(&word_bits[16 - BITS_PER_WORD..]);
            count += 1;
        }
        if bits.len() < HEADER_LEN * 8 + MIN_CHECKSUM_BITS {
            return Err(ShareError::InvalidWordCount { count });
        }

        let header = bits_to_bytes(&bits[..HEADER_LEN * 8]);
        let data_len = HEADER_LEN + usize::from(header[HEADER_LEN - 1]);
        if bits.len() != data_len * 8 + checksum_bits(data_len) {
            return Err(ShareError::InvalidWordCount { count });
        }
        let data = bits_to_bytes(&bits[..data_len * 8]);
        let checksum = Sha256::digest(data.as_slice());
        let mut expected = Vec::new();
        push_bits(&mut expected, &checksum, checksum_bits(data_len));
        if expected.as_slice() != &bits[data_len * 8..] {
            return Err(ShareError::ChecksumMismatch);
        }

        let mut packed = [0u8; 8];
        packed[2..].copy_from_slice(&data[..HEADER_LEN]);
        let packed = u64::from_be_bytes(packed);
        let nibble = |shift: u32| ((packed >> shift) & 0x0f) as u8;
        let share = Share {
            identifier: ((packed >> 33) & 0x7fff) as u16,
            extendable: (packed >> 32) & 1 == 1,
            iteration_exponent: nibble(28),
            group_index: nibble(24),
            group_threshold: nibble(20) + 1,
            group_count: nibble(16) + 1,
            member_index: nibble(12),
            member_threshold: nibble(8) + 1,
            value: Zeroizing::new(data[HEADER_LEN..].to_vec()),
        };
        share.validate()?;
        Ok(share)
    }

    /// Toggle the member passphrase mask on the share value
    ///
    /// An empty passphrase leaves the value untouched.
    pub fn masked(&self, passphrase: &str) -> Self {
        let mut share = self.clone();
        if passphrase.is_empty() {
            return share;
        }
        let mut salt = MEMBER_MASK_LABEL.to_vec();
        salt.extend_from_slice(&self.identifier.to_be_bytes());
        salt.push(self.group_index);
        salt.push(self.member_index);

        let mut mask = Zeroizing::new(vec![0u8; self.value.len()]);
        pbkdf2_hmac::<Sha256>(
            passphrase.as_bytes(),
            &salt,
            MEMBER_MASK_ITERATIONS,
            mask.as_mut_slice(),
        );
        for (byte, m) in share.value.iter_mut().zip(mask.iter()) {
            *byte ^= m;
        }
        share
    }

    /// The share as a point of its group polynomial
    pub fn member_point(&self) -> SharePoint {
        SharePoint::new(self.member_index, &self.value)
    }
}

/// Random 15-bit shard set identifier
pub fn random_identifier() -> u16 {
    (rand::rng().next_u32() & 0x7fff) as u16
}

fn feistel(
    input: &[u8],
    passphrase: &str,
    iteration_exponent: u8,
    identifier: u16,
    rounds: &[u8],
) -> Result<Zeroizing<Vec<u8>>, ShareError> {
    if input.len() < MIN_SECRET_LEN || input.len() % 2 != 0 {
        return Err(ShareError::SecretLength { len: input.len() });
    }
    let half = input.len() / 2;
    let iterations = (BASE_ITERATIONS << iteration_exponent) / u32::from(ROUND_COUNT);
    let mut left = Zeroizing::new(input[..half].to_vec());
    let mut right = Zeroizing::new(input[half..].to_vec());

    for &round in rounds {
        let mut password = Zeroizing::new(vec![round]);
        password.extend_from_slice(passphrase.as_bytes());
        let mut salt = CUSTOMIZATION.to_vec();
        salt.extend_from_slice(&identifier.to_be_bytes());
        salt.extend_from_slice(&right);

        let mut f = Zeroizing::new(vec![0u8; half]);
        pbkdf2_hmac::<Sha256>(&password, &salt, iterations, f.as_mut_slice());
        for (byte, k) in left.iter_mut().zip(f.iter()) {
            *byte ^= k;
        }
        std::mem::swap(&mut left, &mut right);
    }

    let mut output = right;
    output.extend_from_slice(&left);
    Ok(output)
}

/// Encrypt a master secret with the master passphrase
pub fn encrypt_master_secret(
    master_secret: &[u8],
    passphrase: &str,
    iteration_exponent: u8,
    identifier: u16,
) -> Result<Zeroizing<Vec<u8>>, ShareError> {
    feistel(master_secret, passphrase, iteration_exponent, identifier, &[0, 1, 2, 3])
}

/// Inverse of [`encrypt_master_secret`]
pub fn decrypt_master_secret(
    encrypted: &[u8],
    passphrase: &str,
    iteration_exponent: u8,
    identifier: u16,
) -> Result<Zeroizing<Vec<u8>>, ShareError> {
    feistel(encrypted, passphrase, iteration_exponent, identifier, &[3, 2, 1, 0])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Share {
        Share {
            identifier: 0x1234,
            extendable: false,
            iteration_exponent: 1,
            group_index: 2,
            group_threshold: 2,
            group_count: 3,
            member_index: 4,
            member_threshold: 3,
            value: Zeroizing::new((0u8..32).collect()),
        }
    }

    #[test]
    fn test_mnemonic_carries_every_field() {
        let share = sample();
        let mnemonic = share.to_mnemonic().unwrap();
        // (48 + 256 + 33) bits round up to 31 words
        assert_eq!(mnemonic.split(' ').count(), 31);
        assert_eq!(Share::from_mnemonic(&mnemonic).unwrap(), share);
    }

    #[test]
    fn test_short_secret_mnemonic() {
        let mut share = sample();
        share.value = Zeroizing::new(vec![0xab; 16]);
        let mnemonic = share.to_mnemonic().unwrap();
        assert_eq!(Share::from_mnemonic(&mnemonic).unwrap(), share);
    }

    #[test]
    fn test_changed_word_fails_checksum() {
        let mnemonic = sample().to_mnemonic().unwrap();
        let mut words: Vec<&str> = mnemonic.split(' ').collect();
        let last = words.len() - 1;
        words[last] = if words[last] == "abandon" { "ability" } else { "abandon" };
        assert!(matches!(
            Share::from_mnemonic(&words.join(" ")),
            Err(ShareError::ChecksumMismatch)
        ));
    }

    #[test]
    fn test_unknown_word() {
        let err = Share::from_mnemonic("abandon notaword abandon").unwrap_err();
        assert_eq!(
            err,
            ShareError::UnknownWord {
                word: "notaword".to_string()
            }
        );
    }

    #[test]
    fn test_truncated_mnemonic() {
        let mnemonic = sample().to_mnemonic().unwrap();
        let words: Vec<&str> = mnemonic.split(' ').collect();
        assert!(matches!(
            Share::from_mnemonic(&words[..20].join(" ")),
            Err(ShareError::InvalidWordCount { count: 20 })
        ));
    }

    #[test]
    fn test_mask_is_an_involution() {
        let share = sample();
        let masked = share.masked("member secret");
        assert_ne!(masked.value, share.value);
        assert_eq!(masked.masked("member secret"), share);
        assert_eq!(share.masked(""), share);
    }

    #[test]
    fn test_master_secret_encryption() {
        let secret = [0x5au8; 16];
        let encrypted = encrypt_master_secret(&secret, "TREZOR", 0, 7).unwrap();
        assert_ne!(encrypted.as_slice(), &secret);

        let decrypted = decrypt_master_secret(&encrypted, "TREZOR", 0, 7).unwrap();
        assert_eq!(decrypted.as_slice(), &secret);

        let wrong = decrypt_master_secret(&encrypted, "other", 0, 7).unwrap();
        assert_ne!(wrong.as_slice(), &secret);
    }

    #[test]
    fn test_odd_secret_rejected() {
        assert!(matches!(
            encrypt_master_secret(&[0u8; 17], "", 0, 1),
            Err(ShareError::SecretLength { len: 17 })
        ));
    }

    #[test]
    fn test_identifier_fits_fifteen_bits() {
        for _ in 0..32 {
            assert!(random_identifier() < 0x8000);
        }
    }
}
