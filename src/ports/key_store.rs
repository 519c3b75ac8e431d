//! KeyStore trait - capability to manage key slots

use crate::error::HsmResult;
use crate::model::{KeyType, Keyring, PublicKey, Slot, SlotList};

/// Capability to allocate, list and retire key slots
///
/// Local slots hold key pairs generated inside the element; foreign slots
/// hold public keys supplied from outside. One extra ephemeral slot lives
/// outside both keyrings and is never persisted.
pub trait KeyStore {
    /// Generate a fresh key pair in the lowest free local slot
    ///
    /// # Errors
    ///
    /// Returns `SlotPoolExhausted` when every local slot is taken.
    fn generate_key(&mut self, key_type: KeyType) -> HsmResult<Slot>;

    /// Store an externally supplied public key in the foreign keyring
    ///
    /// Weierstrass keys may be compressed or uncompressed SEC1 and are
    /// stored uncompressed.
    fn store_foreign_key(&mut self, key_type: KeyType, public_key: &[u8]) -> HsmResult<Slot>;

    /// Allocated slots of `keyring` in ascending order
    fn list_slots(&self, keyring: Keyring) -> HsmResult<SlotList>;

    /// Remove a slot; wallet roots take their whole subtree with them
    fn remove_key(&mut self, slot: Slot, keyring: Keyring) -> HsmResult<()>;

    /// Permanently forbid public key export for a slot
    fn disable_export(&mut self, slot: Slot, keyring: Keyring) -> HsmResult<()>;

    /// Exported public key of a slot
    ///
    /// # Errors
    ///
    /// Returns `ExportDisabled` once [`KeyStore::disable_export`] was called.
    fn public_key(&self, slot: Slot, keyring: Keyring) -> HsmResult<PublicKey>;

    fn key_type(&self, slot: Slot, keyring: Keyring) -> HsmResult<KeyType>;

    /// Replace the ephemeral key pair and return its public key
    fn generate_ephemeral(&mut self, key_type: KeyType) -> HsmResult<PublicKey>;

    fn invalidate_ephemeral(&mut self);
}
