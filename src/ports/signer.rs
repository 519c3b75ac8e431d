//! Signer trait - capability to sign and verify digests

use crate::error::HsmResult;
use crate::model::{Keyring, RecoverableSignature, Slot, Verification};

/// Capability to sign 32-byte digests with local keys
pub trait Signer {
    /// Sign a digest with the key in a local slot
    ///
    /// # Returns
    ///
    /// 64 bytes: r || s for ECDSA, R || S for Ed25519
    ///
    /// # Errors
    ///
    /// Returns errors if:
    /// - The slot is empty
    /// - The key cannot sign (X25519)
    /// - The slot is a watch-only wallet node
    fn sign(&mut self, slot: Slot, digest: &[u8]) -> HsmResult<Vec<u8>> {
        Ok(self.sign_recoverable(slot, digest)?.signature)
    }

    /// Sign and also return the ECDSA recovery id (0 for Ed25519)
    fn sign_recoverable(&mut self, slot: Slot, digest: &[u8]) -> HsmResult<RecoverableSignature>;

    /// Check a signature against the key in a slot of either keyring
    ///
    /// A correctly sized signature that does not verify is
    /// [`Verification::Rejected`], never an error. Verification works even
    /// when public key export is disabled.
    fn verify(
        &self,
        slot: Slot,
        keyring: Keyring,
        digest: &[u8],
        signature: &[u8],
    ) -> HsmResult<Verification>;
}
