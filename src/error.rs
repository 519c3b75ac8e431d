//! Error types for hsmwallet library
//!
//! This module defines the error hierarchy for all hsmwallet operations.
//! Errors are organized hierarchically and use thiserror for implementation.
//! Every error also maps to a stable negative status code through
//! [`HsmError::code`].

use thiserror::Error;

/// Result type alias for hsmwallet operations
///
/// This is a convenience alias for `Result<T, HsmError>`.
pub type HsmResult<T> = Result<T, HsmError>;

/// Top-level error type for all hsmwallet operations
#[derive(Error, Debug)]
pub enum HsmError {
    /// Element transport and session lifecycle errors
    #[error("Element error: {0}")]
    Device(#[from] DeviceError),

    /// Cryptographic operation errors
    #[error("Cryptographic error: {0}")]
    Crypto(#[from] CryptoError),

    /// Domain validation errors
    #[error("Domain validation error: {0}")]
    Domain(#[from] DomainError),

    /// Key slot store errors
    #[error("Key management error: {0}")]
    KeyManagement(#[from] KeyManagementError),

    /// Recovery session errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Malformed caller input
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },
}

/// Element transport and session lifecycle errors
#[derive(Error, Debug)]
pub enum DeviceError {
    /// No element could be opened
    #[error("No secure element found")]
    NotFound,

    /// Operation on a closed session
    #[error("Session context is closed")]
    ContextInvalid,

    /// Communication with the element failed
    #[error("Transport failure: {reason}")]
    TransportFailure { reason: String },

    /// An event wait ran out of time
    #[error("Timed out after {timeout_ms} ms waiting for {event}")]
    Timeout { event: String, timeout_ms: u128 },
}

/// Cryptographic operation errors
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Locked object signature did not verify
    #[error("Signature on locked object is invalid")]
    SignatureInvalid,

    /// Authenticated decryption failed
    #[error("Decryption failed")]
    DecryptionFailed,

    /// Key type cannot sign
    #[error("Key type {key_type} cannot be used for signing")]
    UnsupportedKeyTypeForSigning { key_type: String },

    /// Key type cannot take part in key agreement
    #[error("Key type {key_type} cannot be used for key agreement")]
    UnsupportedKeyTypeForAgreement { key_type: String },

    /// Numeric parameter outside its allowed range
    #[error("Parameter out of range: {reason}")]
    ParameterOutOfRange { reason: String },

    /// Slot holds only a public key
    #[error("Slot {slot} has no private key")]
    MissingPrivateKey { slot: String },

    /// Hardened child requested from a public-only parent
    #[error("Hardened derivation from slot {slot} requires its private key")]
    HardenedDerivationRequiresPrivateKey { slot: String },

    /// Digest, signature or key bytes of the wrong shape
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// Key bytes rejected by the curve implementation
    #[error("Invalid key material: {reason}")]
    InvalidKeyMaterial { reason: String },

    /// Ed25519 specific error
    #[error("Ed25519 error: {0}")]
    Ed25519(String),
}

/// Domain validation errors
#[derive(Error, Debug)]
pub enum DomainError {
    /// Key type error
    #[error("Key type error: {0}")]
    KeyType(#[from] crate::model::KeyTypeError),

    /// Slot error
    #[error("Slot error: {0}")]
    Slot(#[from] crate::model::SlotError),

    /// Key material error
    #[error("Key material error: {0}")]
    KeyMaterial(#[from] crate::model::KeyMaterialError),

    /// Seed phrase error
    #[error("Seed phrase error: {0}")]
    SeedPhrase(#[from] crate::model::SeedPhraseError),

    /// Node address error
    #[error("Node address error: {0}")]
    NodeAddress(#[from] crate::model::NodeAddressError),

    /// Cardano key error
    #[error("Cardano key error: {0}")]
    CardanoKey(#[from] crate::model::CardanoKeyError),

    /// KDF parameter error
    #[error("KDF parameter error: {0}")]
    Kdf(#[from] crate::model::KdfParamsError),

    /// Locked object format error
    #[error("Locked object error: {0}")]
    LockedObject(#[from] crate::model::LockedObjectError),

    /// SLIP39 layout error
    #[error("Recovery parameter error: {0}")]
    RecoveryParams(#[from] crate::model::RecoveryParamsError),

    /// SLIP39 share error
    #[error("Share error: {0}")]
    Share(#[from] crate::logic::ShareError),

    /// Element configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] crate::model::ConfigError),
}

/// Key slot store errors
#[derive(Error, Debug)]
pub enum KeyManagementError {
    /// No key in the slot
    #[error("No key found in {keyring} slot {slot}")]
    SlotNotFound { slot: String, keyring: String },

    /// Every slot of the keyring is taken
    #[error("All {pool_size} {keyring} slots are allocated")]
    SlotPoolExhausted { keyring: String, pool_size: usize },

    /// Public key export was disabled for the slot
    #[error("Public key export is disabled for slot {slot}")]
    ExportDisabled { slot: String },

    /// Operation not allowed in this keyring
    #[error("Operation {operation} is not allowed on the {keyring} keyring")]
    InvalidKeyringForOperation { keyring: String, operation: String },

    /// Slot is not part of a wallet
    #[error("Slot {slot} is not a wallet node")]
    NotAWalletNode { slot: String },

    /// Wallet name already used on this element
    #[error("Wallet name already in use: {name}")]
    WalletNameTaken { name: String },

    /// No slot for this node address
    #[error("No wallet node at {node_addr}")]
    NodeNotFound { node_addr: String },

    /// Failed to load element state
    #[error("Failed to load key store from {location}: {reason}")]
    LoadFailed { location: String, reason: String },

    /// Failed to store element state
    #[error("Failed to store key store to {destination}: {reason}")]
    StoreFailed { destination: String, reason: String },
}

/// Recovery session errors
#[derive(Error, Debug)]
pub enum SessionError {
    /// Operation not valid in the current recovery state
    #[error("Recovery session is {actual}, expected {expected}")]
    StateError { expected: String, actual: String },

    /// Shard inconsistent with the shards already collected
    #[error("Shard does not match the session: {reason}")]
    ShardMismatch { reason: String },
}

/// Numeric failure codes, stable across releases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    InvalidArgument = -1,
    ParameterOutOfRange = -2,
    SlotNotFound = -3,
    SlotPoolExhausted = -4,
    ExportDisabled = -5,
    InvalidKeyringForOperation = -6,
    UnsupportedKeyTypeForSigning = -7,
    MissingPrivateKey = -8,
    HardenedDerivationRequiresPrivateKey = -9,
    SignatureInvalid = -10,
    DecryptionFailed = -11,
    ShardMismatch = -12,
    SessionStateError = -13,
    Timeout = -14,
    TransportFailure = -15,
    ContextInvalid = -16,
}

impl HsmError {
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        HsmError::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Taxonomy bucket of this error
    pub fn kind(&self) -> ErrorCode {
        match self {
            HsmError::Device(err) => match err {
                DeviceError::ContextInvalid => ErrorCode::ContextInvalid,
                DeviceError::Timeout { .. } => ErrorCode::Timeout,
                DeviceError::NotFound | DeviceError::TransportFailure { .. } => {
                    ErrorCode::TransportFailure
                }
            },
            HsmError::Crypto(err) => match err {
                CryptoError::SignatureInvalid => ErrorCode::SignatureInvalid,
                CryptoError::DecryptionFailed => ErrorCode::DecryptionFailed,
                CryptoError::UnsupportedKeyTypeForSigning { .. } => {
                    ErrorCode::UnsupportedKeyTypeForSigning
                }
                CryptoError::ParameterOutOfRange { .. } => ErrorCode::ParameterOutOfRange,
                CryptoError::MissingPrivateKey { .. } => ErrorCode::MissingPrivateKey,
                CryptoError::HardenedDerivationRequiresPrivateKey { .. } => {
                    ErrorCode::HardenedDerivationRequiresPrivateKey
                }
                CryptoError::UnsupportedKeyTypeForAgreement { .. }
                | CryptoError::InvalidInput { .. }
                | CryptoError::InvalidKeyMaterial { .. }
                | CryptoError::Ed25519(_) => ErrorCode::InvalidArgument,
            },
            HsmError::Domain(err) => match err {
                DomainError::Kdf(_) | DomainError::RecoveryParams(_) => {
                    ErrorCode::ParameterOutOfRange
                }
                DomainError::LockedObject(_) => ErrorCode::SignatureInvalid,
                _ => ErrorCode::InvalidArgument,
            },
            HsmError::KeyManagement(err) => match err {
                KeyManagementError::SlotNotFound { .. }
                | KeyManagementError::NodeNotFound { .. } => ErrorCode::SlotNotFound,
                KeyManagementError::SlotPoolExhausted { .. } => ErrorCode::SlotPoolExhausted,
                KeyManagementError::ExportDisabled { .. } => ErrorCode::ExportDisabled,
                KeyManagementError::InvalidKeyringForOperation { .. } => {
                    ErrorCode::InvalidKeyringForOperation
                }
                KeyManagementError::NotAWalletNode { .. }
                | KeyManagementError::WalletNameTaken { .. } => ErrorCode::InvalidArgument,
                KeyManagementError::LoadFailed { .. } | KeyManagementError::StoreFailed { .. } => {
                    ErrorCode::TransportFailure
                }
            },
            HsmError::Session(err) => match err {
                SessionError::StateError { .. } => ErrorCode::SessionStateError,
                SessionError::ShardMismatch { .. } => ErrorCode::ShardMismatch,
            },
            HsmError::InvalidArgument { .. } => ErrorCode::InvalidArgument,
        }
    }

    /// Negative status code for this error
    pub fn code(&self) -> i32 {
        self.kind() as i32
    }
}

/// Map any result onto the 0 / negative status convention
pub fn status_code<T>(result: &HsmResult<T>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(err) => err.code(),
    }
}

/// Convert model errors to HsmError (via DomainError)
macro_rules! domain_error_from {
    ($($source:ty),+ $(,)?) => {
        $(
            impl From<$source> for HsmError {
                fn from(err: $source) -> Self {
                    HsmError::Domain(DomainError::from(err))
                }
            }
        )+
    };
}

domain_error_from!(
    crate::model::KeyTypeError,
    crate::model::SlotError,
    crate::model::KeyMaterialError,
    crate::model::SeedPhraseError,
    crate::model::NodeAddressError,
    crate::model::CardanoKeyError,
    crate::model::KdfParamsError,
    crate::model::LockedObjectError,
    crate::model::RecoveryParamsError,
    crate::logic::ShareError,
    crate::model::ConfigError,
);

/// Convert ed25519_dalek signature errors
impl From<ed25519_dalek::SignatureError> for HsmError {
    fn from(err: ed25519_dalek::SignatureError) -> Self {
        HsmError::Crypto(CryptoError::Ed25519(err.to_string()))
    }
}

/// Convert file I/O errors of the stream lock variants
impl From<std::io::Error> for HsmError {
    fn from(err: std::io::Error) -> Self {
        HsmError::Device(DeviceError::TransportFailure {
            reason: err.to_string(),
        })
    }
}
