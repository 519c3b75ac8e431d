use tracing::debug;
use zeroize::Zeroizing;

use super::{KeyRecord, SoftwareElement};
use crate::error::{CryptoError, HsmError, HsmResult, KeyManagementError};
use crate::logic::{curve, lock};
use crate::model::{
    KeyDomain, Keyring, LockedObject, PeerKey, PrivateKey, PublicKey, RecoverableSignature, Slot,
    SlotRef, Verification,
};
use crate::ports::{DataLocker, KeyAgreement, Signer};

fn private_of(record: &KeyRecord, slot: impl ToString) -> HsmResult<&PrivateKey> {
    record.private.as_ref().ok_or_else(|| {
        CryptoError::MissingPrivateKey {
            slot: slot.to_string(),
        }
        .into()
    })
}

impl SoftwareElement {
    fn local_key(&self, local: SlotRef) -> HsmResult<&KeyRecord> {
        match local {
            SlotRef::Persistent(slot) => self.record(slot, Keyring::Local),
            SlotRef::Ephemeral => self.ephemeral.as_ref().ok_or_else(|| {
                KeyManagementError::SlotNotFound {
                    slot: local.to_string(),
                    keyring: Keyring::Local.to_string(),
                }
                .into()
            }),
        }
    }

    fn peer_key(&self, local: &KeyRecord, peer: &PeerKey) -> HsmResult<PublicKey> {
        match peer {
            PeerKey::Bytes(bytes) => curve::parse_public(local.key_type, bytes),
            PeerKey::Slot { slot, keyring } => {
                let record = self.record(*slot, *keyring)?;
                if record.key_type != local.key_type {
                    return Err(HsmError::invalid_argument(format!(
                        "peer key is {}, local key is {}",
                        record.key_type, local.key_type
                    )));
                }
                Ok(record.public.clone())
            }
        }
    }
}

impl Signer for SoftwareElement {
    fn sign_recoverable(&mut self, slot: Slot, digest: &[u8]) -> HsmResult<RecoverableSignature> {
        let record = self.record(slot, Keyring::Local)?;
        if !record.key_type.can_sign() {
            return Err(CryptoError::UnsupportedKeyTypeForSigning {
                key_type: record.key_type.to_string(),
            }
            .into());
        }
        let private = private_of(record, slot)?;
        let signature = curve::sign(record.key_type, private, digest)?;
        debug!("Signed digest with {} slot {}", record.key_type, slot);
        Ok(signature)
    }

    fn verify(
        &self,
        slot: Slot,
        keyring: Keyring,
        digest: &[u8],
        signature: &[u8],
    ) -> HsmResult<Verification> {
        let record = self.record(slot, keyring)?;
        curve::verify(record.key_type, &record.public, digest, signature)
    }
}

impl DataLocker for SoftwareElement {
    fn lock(&mut self, plaintext: &[u8], domain: KeyDomain) -> HsmResult<LockedObject> {
        lock::seal(domain, self.domain_key(domain), plaintext)
    }

    fn unlock(
        &mut self,
        object: &LockedObject,
        domain: KeyDomain,
    ) -> HsmResult<Zeroizing<Vec<u8>>> {
        lock::open(domain, self.domain_key(domain), object)
    }
}

impl KeyAgreement for SoftwareElement {
    fn raw_ecdh(&mut self, local: SlotRef, peer: &PeerKey) -> HsmResult<Zeroizing<Vec<u8>>> {
        let record = self.local_key(local)?;
        if !record.key_type.can_agree() {
            return Err(HsmError::invalid_argument(format!(
                "{} keys cannot be used for key agreement",
                record.key_type
            )));
        }
        let private = private_of(record, local)?;
        let peer = self.peer_key(record, peer)?;
        let shared = curve::ecdh(record.key_type, private, &peer)?;
        debug!("Computed {} shared secret with {} key", record.key_type, local);
        Ok(shared)
    }
}
