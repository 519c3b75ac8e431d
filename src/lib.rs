//! Secure element key store and HD wallet engine
//!
//! The element keeps key slots in a local and a foreign keyring, signs and
//! verifies digests, locks payloads under a one-way or a shared key domain,
//! runs ECDH with an optional KDF and derives BIP32, SLIP-10 and Cardano
//! wallet trees. Wallet roots can be backed up as a BIP39 mnemonic or split
//! into SLIP39 shards through a [`Session`].

mod adapters;
pub mod api;
pub mod error;
pub mod logic;
pub mod model;
pub mod ports;
pub mod session;
pub mod use_cases;

// Re-export commonly used types
pub use adapters::{SoftwareElement, SoftwareFinder};
pub use error::{status_code, ErrorCode, HsmError, HsmResult};
pub use session::{RecoveryMode, Session};
