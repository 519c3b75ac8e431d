use tracing::info;

use super::{free_slot, KeyRecord, Keyrings, SoftwareElement, WalletLink};
use crate::error::{CryptoError, HsmError, HsmResult, KeyManagementError};
use crate::logic::{curve, hd, wallet_seed, ExtendedNode};
use crate::model::{
    DerivedChild, Keyring, NodeAddress, OversightRoot, SeedSource, Slot, WalletNodeInfo,
    WalletParams, WalletSelector,
};
use crate::ports::WalletManager;

const HARDENED_BIT: u32 = 0x8000_0000;

fn ensure_name_free(keyrings: &Keyrings, name: &str) -> HsmResult<()> {
    let taken = keyrings
        .local
        .values()
        .filter_map(|record| record.wallet.as_ref())
        .any(|link| link.name == name);
    if taken {
        return Err(KeyManagementError::WalletNameTaken {
            name: name.to_string(),
        }
        .into());
    }
    Ok(())
}

fn not_a_wallet_node(slot: Slot) -> HsmError {
    KeyManagementError::NotAWalletNode {
        slot: slot.to_string(),
    }
    .into()
}

impl SoftwareElement {
    /// Store a wallet root and name it
    fn insert_root(
        &mut self,
        params: &WalletParams,
        node: ExtendedNode,
        node_addr: NodeAddress,
    ) -> HsmResult<Slot> {
        let pool_size = self.pool_size(Keyring::Local);
        let slot = self.commit(|keyrings, _| {
            ensure_name_free(keyrings, &params.name)?;
            let slot = free_slot(&keyrings.local, Keyring::Local, pool_size)?;
            let mut record = KeyRecord::new(params.key_type, node.private, node.public);
            record.wallet = Some(WalletLink {
                name: params.name.clone(),
                master: slot,
                node_addr,
                variant: params.variant,
                chain_code: node.chain_code,
                parent: None,
            });
            keyrings.local.insert(slot, record);
            Ok(slot)
        })?;
        info!(
            "Created {} wallet {} in slot {}",
            params.key_type, params.name, slot
        );
        Ok(slot)
    }

    fn existing_child(&self, parent: Slot, full_index: u32) -> Option<(Slot, &WalletLink)> {
        self.keyrings.local.iter().find_map(|(slot, record)| {
            record
                .wallet
                .as_ref()
                .filter(|link| link.parent == Some((parent, full_index)))
                .map(|link| (*slot, link))
        })
    }
}

impl WalletManager for SoftwareElement {
    fn create_master_seed(&mut self, params: &WalletParams, source: SeedSource) -> HsmResult<Slot> {
        params.validate()?;
        ensure_name_free(&self.keyrings, &params.name)?;
        let node = wallet_seed::wallet_root(params, &source)?;
        self.insert_root(params, node, NodeAddress::root())
    }

    fn derive_child(
        &mut self,
        parent: Slot,
        index: u32,
        hardened: bool,
        return_chain_code: bool,
    ) -> HsmResult<DerivedChild> {
        if return_chain_code && !hardened {
            return Err(HsmError::invalid_argument(
                "chain codes are only returned for hardened children",
            ));
        }
        if index & HARDENED_BIT != 0 {
            return Err(CryptoError::ParameterOutOfRange {
                reason: format!("child index {} must be below 2^31", index),
            }
            .into());
        }
        let full_index = if hardened { index | HARDENED_BIT } else { index };

        let record = self.record(parent, Keyring::Local)?;
        let link = record.wallet.as_ref().ok_or_else(|| not_a_wallet_node(parent))?;

        if let Some((slot, existing)) = self.existing_child(parent, full_index) {
            return Ok(DerivedChild {
                slot,
                chain_code: return_chain_code.then_some(existing.chain_code),
            });
        }

        let node = match &record.private {
            Some(_) => hd::derive_private(
                record.key_type,
                link.variant,
                &ExtendedNode {
                    private: record.private.clone(),
                    public: record.public.clone(),
                    chain_code: link.chain_code,
                },
                index,
                hardened,
            )?,
            None if hardened => {
                return Err(CryptoError::HardenedDerivationRequiresPrivateKey {
                    slot: parent.to_string(),
                }
                .into())
            }
            None => {
                let (public, chain_code) = hd::derive_public(
                    record.key_type,
                    link.variant,
                    &record.public,
                    &link.chain_code,
                    index,
                )?;
                ExtendedNode {
                    private: None,
                    public,
                    chain_code,
                }
            }
        };

        let key_type = record.key_type;
        let child_link = WalletLink {
            name: link.name.clone(),
            master: link.master,
            node_addr: link.node_addr.child(index, hardened)?,
            variant: link.variant,
            chain_code: node.chain_code,
            parent: Some((parent, full_index)),
        };
        let pool_size = self.pool_size(Keyring::Local);
        let node_addr = child_link.node_addr.clone();

        let slot = self.commit(|keyrings, _| {
            let slot = free_slot(&keyrings.local, Keyring::Local, pool_size)?;
            let mut child = KeyRecord::new(key_type, node.private, node.public);
            child.wallet = Some(child_link);
            keyrings.local.insert(slot, child);
            Ok(slot)
        })?;
        info!("Derived {} into slot {}", node_addr, slot);

        Ok(DerivedChild {
            slot,
            chain_code: return_chain_code.then_some(node.chain_code),
        })
    }

    fn create_oversight_wallet(
        &mut self,
        params: &WalletParams,
        root: OversightRoot,
    ) -> HsmResult<Slot> {
        params.validate()?;
        let node = ExtendedNode {
            private: None,
            public: curve::parse_public(params.key_type, &root.public_key)?,
            chain_code: root.chain_code,
        };
        self.insert_root(params, node, root.node_addr)
    }

    fn address_of(&self, slot: Slot) -> HsmResult<WalletNodeInfo> {
        let record = self.record(slot, Keyring::Local)?;
        let link = record.wallet.as_ref().ok_or_else(|| not_a_wallet_node(slot))?;
        Ok(WalletNodeInfo {
            node_addr: link.node_addr.clone(),
            wallet_name: link.name.clone(),
            master_slot: link.master,
        })
    }

    fn slot_of(&self, node_addr: &NodeAddress, selector: &WalletSelector) -> HsmResult<Slot> {
        self.keyrings
            .local
            .iter()
            .find_map(|(slot, record)| {
                let link = record.wallet.as_ref()?;
                let in_wallet = match selector {
                    WalletSelector::Name(name) => &link.name == name,
                    WalletSelector::MasterSlot(master) => link.master == *master,
                };
                (in_wallet && link.node_addr == *node_addr).then_some(*slot)
            })
            .ok_or_else(|| {
                KeyManagementError::NodeNotFound {
                    node_addr: node_addr.to_string(),
                }
                .into()
            })
    }
}
