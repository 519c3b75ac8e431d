//! WalletManager trait - capability to build HD wallet trees

use bip32::ChildNumber;

use crate::error::HsmResult;
use crate::model::{
    DerivedChild, NodeAddress, OversightRoot, SeedSource, Slot, WalletNodeInfo, WalletParams,
    WalletSelector,
};

/// Capability to create wallets and derive their nodes inside the element
pub trait WalletManager {
    /// Store the root node built from `source` as a new named wallet
    ///
    /// # Errors
    ///
    /// Returns errors if:
    /// - The wallet name is already used
    /// - The key type cannot form a wallet (X25519)
    /// - The local keyring is full
    fn create_master_seed(&mut self, params: &WalletParams, source: SeedSource) -> HsmResult<Slot>;

    /// Derive (or look up) a child of a wallet node
    ///
    /// `index` must be below 2^31; `hardened` selects the hardened range.
    /// The chain code is returned only for hardened children and only when
    /// `return_chain_code` is set; asking for it on a soft child is an error.
    fn derive_child(
        &mut self,
        parent: Slot,
        index: u32,
        hardened: bool,
        return_chain_code: bool,
    ) -> HsmResult<DerivedChild>;

    /// Store a watch-only wallet rooted at an external public node
    fn create_oversight_wallet(
        &mut self,
        params: &WalletParams,
        root: OversightRoot,
    ) -> HsmResult<Slot>;

    fn address_of(&self, slot: Slot) -> HsmResult<WalletNodeInfo>;

    fn slot_of(&self, node_addr: &NodeAddress, selector: &WalletSelector) -> HsmResult<Slot>;

    /// Derive every node along `path` below `root` and return the last one
    fn derive_path(&mut self, root: Slot, path: &NodeAddress) -> HsmResult<Slot> {
        let mut slot = root;
        for index in path.indices() {
            let hardened = index & ChildNumber::HARDENED_FLAG != 0;
            let number = index & !ChildNumber::HARDENED_FLAG;
            slot = self.derive_child(slot, number, hardened, false)?.slot;
        }
        Ok(slot)
    }
}
