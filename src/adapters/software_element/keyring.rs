use std::collections::BTreeSet;

use tracing::{debug, info};

use super::{free_slot, KeyRecord, Keyrings, SoftwareElement};
use crate::error::{HsmResult, KeyManagementError};
use crate::logic::curve;
use crate::model::{KeyType, Keyring, PublicKey, Slot, SlotList};
use crate::ports::KeyStore;

/// `root` and every local slot that descends from it
pub(super) fn subtree(keyrings: &Keyrings, root: Slot) -> BTreeSet<Slot> {
    let mut doomed = BTreeSet::from([root]);
    loop {
        let before = doomed.len();
        for (slot, record) in &keyrings.local {
            let parent = record.wallet.as_ref().and_then(|link| link.parent);
            if matches!(parent, Some((parent, _)) if doomed.contains(&parent)) {
                doomed.insert(*slot);
            }
        }
        if doomed.len() == before {
            return doomed;
        }
    }
}

fn slot_not_found(slot: Slot, keyring: Keyring) -> KeyManagementError {
    KeyManagementError::SlotNotFound {
        slot: slot.to_string(),
        keyring: keyring.to_string(),
    }
}

impl KeyStore for SoftwareElement {
    fn generate_key(&mut self, key_type: KeyType) -> HsmResult<Slot> {
        let private = curve::generate_private(key_type);
        let public = curve::public_from_private(key_type, &private)?;
        let pool_size = self.pool_size(Keyring::Local);

        let slot = self.commit(|keyrings, _| {
            let slot = free_slot(&keyrings.local, Keyring::Local, pool_size)?;
            keyrings
                .local
                .insert(slot, KeyRecord::new(key_type, Some(private), public));
            Ok(slot)
        })?;
        info!("Generated {} key in local slot {}", key_type, slot);
        Ok(slot)
    }

    fn store_foreign_key(&mut self, key_type: KeyType, public_key: &[u8]) -> HsmResult<Slot> {
        let public = curve::parse_public(key_type, public_key)?;
        let pool_size = self.pool_size(Keyring::Foreign);

        let slot = self.commit(|keyrings, _| {
            let slot = free_slot(&keyrings.foreign, Keyring::Foreign, pool_size)?;
            keyrings
                .foreign
                .insert(slot, KeyRecord::new(key_type, None, public));
            Ok(slot)
        })?;
        info!("Stored foreign {} key in slot {}", key_type, slot);
        Ok(slot)
    }

    fn list_slots(&self, keyring: Keyring) -> HsmResult<SlotList> {
        Ok(SlotList {
            slots: self.keyrings.ring(keyring).keys().copied().collect(),
            pool_size: self.pool_size(keyring),
        })
    }

    fn remove_key(&mut self, slot: Slot, keyring: Keyring) -> HsmResult<()> {
        self.record(slot, keyring)?;
        let removed = self.commit(|keyrings, _| {
            let doomed = match keyring {
                Keyring::Local => subtree(keyrings, slot),
                Keyring::Foreign => BTreeSet::from([slot]),
            };
            let ring = keyrings.ring_mut(keyring);
            for victim in &doomed {
                ring.remove(victim);
            }
            Ok(doomed.len())
        })?;
        info!("Removed {} slot {} ({} slots total)", keyring, slot, removed);
        Ok(())
    }

    fn disable_export(&mut self, slot: Slot, keyring: Keyring) -> HsmResult<()> {
        self.record(slot, keyring)?;
        self.commit(|keyrings, _| {
            let record = keyrings
                .ring_mut(keyring)
                .get_mut(&slot)
                .ok_or_else(|| slot_not_found(slot, keyring))?;
            record.exportable = false;
            Ok(())
        })?;
        info!("Disabled public key export for {} slot {}", keyring, slot);
        Ok(())
    }

    fn public_key(&self, slot: Slot, keyring: Keyring) -> HsmResult<PublicKey> {
        let record = self.record(slot, keyring)?;
        if !record.exportable {
            return Err(KeyManagementError::ExportDisabled {
                slot: slot.to_string(),
            }
            .into());
        }
        Ok(record.public.clone())
    }

    fn key_type(&self, slot: Slot, keyring: Keyring) -> HsmResult<KeyType> {
        Ok(self.record(slot, keyring)?.key_type)
    }

    fn generate_ephemeral(&mut self, key_type: KeyType) -> HsmResult<PublicKey> {
        let private = curve::generate_private(key_type);
        let public = curve::public_from_private(key_type, &private)?;
        self.ephemeral = Some(KeyRecord::new(key_type, Some(private), public.clone()));
        debug!("Generated ephemeral {} key", key_type);
        Ok(public)
    }

    fn invalidate_ephemeral(&mut self) {
        if self.ephemeral.take().is_some() {
            debug!("Invalidated ephemeral key");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ElementConfig;

    #[test]
    fn test_remove_foreign_does_not_touch_local() {
        let mut element = SoftwareElement::new(ElementConfig::default()).unwrap();
        let local = element.generate_key(KeyType::X25519).unwrap();
        let peer = element.public_key(local, Keyring::Local).unwrap();
        let foreign = element
            .store_foreign_key(KeyType::X25519, peer.as_bytes())
            .unwrap();
        assert_eq!(local, foreign);

        element.remove_key(foreign, Keyring::Foreign).unwrap();
        assert!(element.public_key(local, Keyring::Local).is_ok());
        assert!(element.list_slots(Keyring::Foreign).unwrap().slots.is_empty());
    }

    #[test]
    fn test_ephemeral_replaced_and_invalidated() {
        let mut element = SoftwareElement::new(ElementConfig::default()).unwrap();
        let first = element.generate_ephemeral(KeyType::NistP256).unwrap();
        let second = element.generate_ephemeral(KeyType::NistP256).unwrap();
        assert_ne!(first, second);
        assert_eq!(second.as_bytes().len(), 65);

        element.invalidate_ephemeral();
        assert!(element.ephemeral.is_none());
        assert!(element.list_slots(Keyring::Local).unwrap().slots.is_empty());
    }

    #[test]
    fn test_disable_export_on_missing_slot() {
        let mut element = SoftwareElement::new(ElementConfig::default()).unwrap();
        let err = element.disable_export(Slot(3), Keyring::Local).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorCode::SlotNotFound);
    }
}
