use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Key derivation applied to an ECDH shared secret
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KdfKind {
    /// RFC 5869 HKDF with SHA-256
    HkdfSha256,
    /// RFC 5869 HKDF with SHA-512
    HkdfSha512,
    Pbkdf2Sha256,
    Pbkdf2Sha512,
}

impl KdfKind {
    pub fn is_pbkdf2(self) -> bool {
        matches!(self, KdfKind::Pbkdf2Sha256 | KdfKind::Pbkdf2Sha512)
    }

    /// Exclusive upper bound on the output length
    pub fn max_output_len(self) -> usize {
        match self {
            KdfKind::HkdfSha256 | KdfKind::Pbkdf2Sha256 => 8160,
            KdfKind::HkdfSha512 | KdfKind::Pbkdf2Sha512 => 16320,
        }
    }
}

impl fmt::Display for KdfKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KdfKind::HkdfSha256 => "hkdf-sha256",
            KdfKind::HkdfSha512 => "hkdf-sha512",
            KdfKind::Pbkdf2Sha256 => "pbkdf2-sha256",
            KdfKind::Pbkdf2Sha512 => "pbkdf2-sha512",
        };
        f.write_str(name)
    }
}

impl FromStr for KdfKind {
    type Err = KdfParamsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hkdf-sha256" | "rfc5869-sha256" => Ok(KdfKind::HkdfSha256),
            "hkdf-sha512" | "rfc5869-sha512" => Ok(KdfKind::HkdfSha512),
            "pbkdf2-sha256" => Ok(KdfKind::Pbkdf2Sha256),
            "pbkdf2-sha512" => Ok(KdfKind::Pbkdf2Sha512),
            _ => Err(KdfParamsError::UnknownKind {
                kind: s.to_string(),
            }),
        }
    }
}

/// Parameters for ECDH followed by a KDF
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KdfParams {
    pub kind: KdfKind,
    pub salt: Vec<u8>,
    /// Ignored by the PBKDF2 variants
    pub info: Vec<u8>,
    /// Used by the PBKDF2 variants only
    pub iterations: u32,
    pub output_len: usize,
}

impl KdfParams {
    pub const MAX_SALT_LEN: usize = 128;
    pub const MAX_INFO_LEN: usize = 128;

    pub fn hkdf(kind: KdfKind, salt: &[u8], info: &[u8], output_len: usize) -> Self {
        Self {
            kind,
            salt: salt.to_vec(),
            info: info.to_vec(),
            iterations: 1,
            output_len,
        }
    }

    pub fn pbkdf2(kind: KdfKind, salt: &[u8], iterations: u32, output_len: usize) -> Self {
        Self {
            kind,
            salt: salt.to_vec(),
            info: Vec::new(),
            iterations,
            output_len,
        }
    }

    pub fn validate(&self) -> Result<(), KdfParamsError> {
        if self.salt.len() > Self::MAX_SALT_LEN {
            return Err(KdfParamsError::SaltTooLong {
                len: self.salt.len(),
            });
        }
        if self.info.len() > Self::MAX_INFO_LEN {
            return Err(KdfParamsError::InfoTooLong {
                len: self.info.len(),
            });
        }
        if self.kind.is_pbkdf2() && self.iterations == 0 {
            return Err(KdfParamsError::ZeroIterations);
        }
        let max = self.kind.max_output_len();
        if self.output_len == 0 || self.output_len >= max {
            return Err(KdfParamsError::OutputLength {
                len: self.output_len,
                max,
            });
        }
        Ok(())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KdfParamsError {
    #[error("Unknown KDF: {kind}")]
    UnknownKind { kind: String },

    #[error("Salt is {len} bytes, at most 128 allowed")]
    SaltTooLong { len: usize },

    #[error("Info is {len} bytes, at most 128 allowed")]
    InfoTooLong { len: usize },

    #[error("PBKDF2 needs at least one iteration")]
    ZeroIterations,

    #[error("Output length {len} must be between 1 and {max} (exclusive)")]
    OutputLength { len: usize, max: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_hkdf_params() {
        let params = KdfParams::hkdf(KdfKind::HkdfSha256, &[1u8; 128], &[2u8; 128], 8159);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_salt_too_long() {
        let params = KdfParams::hkdf(KdfKind::HkdfSha256, &[1u8; 129], b"", 32);
        assert_eq!(
            params.validate().unwrap_err(),
            KdfParamsError::SaltTooLong { len: 129 }
        );
    }

    #[test]
    fn test_info_too_long() {
        let params = KdfParams::hkdf(KdfKind::HkdfSha512, b"", &[0u8; 200], 32);
        assert!(matches!(
            params.validate(),
            Err(KdfParamsError::InfoTooLong { len: 200 })
        ));
    }

    #[test]
    fn test_output_length_bounds() {
        assert!(KdfParams::hkdf(KdfKind::HkdfSha256, b"", b"", 8160)
            .validate()
            .is_err());
        assert!(KdfParams::hkdf(KdfKind::HkdfSha512, b"", b"", 16319)
            .validate()
            .is_ok());
        assert!(KdfParams::hkdf(KdfKind::HkdfSha512, b"", b"", 0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_pbkdf2_requires_iterations() {
        let params = KdfParams::pbkdf2(KdfKind::Pbkdf2Sha256, b"salt", 0, 32);
        assert_eq!(params.validate().unwrap_err(), KdfParamsError::ZeroIterations);
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("rfc5869-sha512".parse::<KdfKind>().unwrap(), KdfKind::HkdfSha512);
        assert_eq!("PBKDF2-SHA256".parse::<KdfKind>().unwrap(), KdfKind::Pbkdf2Sha256);
        assert!("scrypt".parse::<KdfKind>().is_err());
    }
}
