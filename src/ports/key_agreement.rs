//! KeyAgreement trait - capability to run ECDH

use zeroize::Zeroizing;

use crate::error::HsmResult;
use crate::logic::kdf;
use crate::model::{KdfParams, PeerKey, SlotRef};

/// Capability to agree on shared secrets with peers
pub trait KeyAgreement {
    /// Raw ECDH shared secret between a local (or ephemeral) key and a peer
    ///
    /// Supported for NISTP256, SECP256K1 and X25519 keys.
    fn raw_ecdh(&mut self, local: SlotRef, peer: &PeerKey) -> HsmResult<Zeroizing<Vec<u8>>>;

    /// ECDH followed by a key derivation over the shared secret
    ///
    /// Parameters are checked before any key material is touched.
    fn ecdh_kdf(
        &mut self,
        local: SlotRef,
        peer: &PeerKey,
        params: &KdfParams,
    ) -> HsmResult<Zeroizing<Vec<u8>>> {
        params.validate()?;
        let shared = self.raw_ecdh(local, peer)?;
        kdf::derive(params, &shared)
    }
}
