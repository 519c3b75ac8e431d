//! Ports (algebras/traits) for secure element operations
//!
//! These traits define the capabilities a secure element offers. The core
//! depends on these abstractions, not on a concrete element.

mod data_locker;
mod device_finder;
mod device_info;
mod key_agreement;
mod key_store;
mod signer;
mod wallet_manager;


pub use data_locker::DataLocker;
pub use device_finder::{DeviceFinder, SharedElement};
pub use device_info::{DeviceInfo, Monitor, RandomSource};
pub use key_agreement::KeyAgreement;
pub use key_store::KeyStore;
pub use signer::Signer;
pub use wallet_manager::WalletManager;

/// Combined trait for all element operations
///
/// An element handle typically implements this.
pub trait SecureElement:
    KeyStore + Signer + DataLocker + KeyAgreement + WalletManager + RandomSource + Monitor + DeviceInfo
{
}

// Blanket implementation for types that implement all operation traits
impl<T> SecureElement for T where
    T: KeyStore
        + Signer
        + DataLocker
        + KeyAgreement
        + WalletManager
        + RandomSource
        + Monitor
        + DeviceInfo
{
}
