//! Caller-facing session over a shared secure element
//!
//! A [`Session`] serializes every operation: it holds its own state lock for
//! the whole call and takes the element lock inside it, always in that
//! order. Event waits release both locks before blocking.

mod recovery;

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::error::{DeviceError, HsmResult, KeyManagementError};
use crate::logic::slip39::{Share, MASTER_SECRET_LEN};
use crate::model::{
    DerivedChild, GeneratedShard, GroupLayout, KdfParams, KeyDomain, KeyType, Keyring,
    LockedObject, NodeAddress, OversightRoot, PeerKey, PerimeterEvent, PublicKey,
    RecoverableSignature, RestoreProgress, SeedPhrase, SeedSource, Slip39Layout, Slot, SlotList,
    SlotRef, TapEvent, Verification, WalletNodeInfo, WalletParams, WalletSelector,
};
use crate::ports::{
    DataLocker, DeviceFinder, DeviceInfo, KeyAgreement, KeyStore, Monitor, RandomSource,
    SecureElement, SharedElement, Signer, WalletManager,
};

pub use recovery::RecoveryMode;
use recovery::{RecoveryState, Slip39Generator, Slip39Restorer};

/// Entropy behind a generated BIP39 mnemonic (24 words)
const BIP39_ENTROPY_LEN: usize = 32;

struct SessionState {
    open: bool,
    recovery: RecoveryState,
}

/// An open context on a secure element
pub struct Session<E: SecureElement> {
    element: SharedElement<E>,
    state: Mutex<SessionState>,
}

fn ensure_name_free<E: SecureElement>(element: &E, name: &str) -> HsmResult<()> {
    let lookup = element.slot_of(&NodeAddress::root(), &WalletSelector::Name(name.to_string()));
    if lookup.is_ok() {
        return Err(KeyManagementError::WalletNameTaken {
            name: name.to_string(),
        }
        .into());
    }
    Ok(())
}

impl<E: SecureElement> Session<E> {
    /// Open a session on the first element `finder` reports
    pub fn open<F>(finder: &F) -> HsmResult<Self>
    where
        F: DeviceFinder<Element = E>,
    {
        let element = finder.find_first()?;
        info!("Opened session");
        Ok(Self {
            element,
            state: Mutex::new(SessionState {
                open: true,
                recovery: RecoveryState::Idle,
            }),
        })
    }

    /// Close the session; any later call fails with `ContextInvalid`
    pub fn close(&self) {
        let mut state = self.state.lock();
        if state.open {
            state.open = false;
            state.recovery = RecoveryState::Idle;
            info!("Closed session");
        }
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    fn with_element<T>(&self, op: impl FnOnce(&mut E) -> HsmResult<T>) -> HsmResult<T> {
        let state = self.state.lock();
        if !state.open {
            return Err(DeviceError::ContextInvalid.into());
        }
        let mut element = self.element.lock();
        op(&mut element)
    }

    fn with_recovery<T>(
        &self,
        op: impl FnOnce(&mut RecoveryState, &mut E) -> HsmResult<T>,
    ) -> HsmResult<T> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(DeviceError::ContextInvalid.into());
        }
        let mut element = self.element.lock();
        op(&mut state.recovery, &mut element)
    }

    // Key slots

    pub fn generate_key(&self, key_type: KeyType) -> HsmResult<Slot> {
        self.with_element(|element| element.generate_key(key_type))
    }

    pub fn store_foreign_key(&self, key_type: KeyType, public_key: &[u8]) -> HsmResult<Slot> {
        self.with_element(|element| element.store_foreign_key(key_type, public_key))
    }

    pub fn list_slots(&self, keyring: Keyring) -> HsmResult<SlotList> {
        self.with_element(|element| element.list_slots(keyring))
    }

    pub fn remove_key(&self, slot: Slot, keyring: Keyring) -> HsmResult<()> {
        self.with_element(|element| element.remove_key(slot, keyring))
    }

    pub fn disable_export(&self, slot: Slot, keyring: Keyring) -> HsmResult<()> {
        self.with_element(|element| element.disable_export(slot, keyring))
    }

    pub fn public_key(&self, slot: Slot, keyring: Keyring) -> HsmResult<PublicKey> {
        self.with_element(|element| element.public_key(slot, keyring))
    }

    pub fn key_type(&self, slot: Slot, keyring: Keyring) -> HsmResult<KeyType> {
        self.with_element(|element| element.key_type(slot, keyring))
    }

    pub fn generate_ephemeral(&self, key_type: KeyType) -> HsmResult<PublicKey> {
        self.with_element(|element| element.generate_ephemeral(key_type))
    }

    pub fn invalidate_ephemeral(&self) -> HsmResult<()> {
        self.with_element(|element| {
            element.invalidate_ephemeral();
            Ok(())
        })
    }

    // Signatures

    pub fn sign(&self, slot: Slot, digest: &[u8]) -> HsmResult<Vec<u8>> {
        self.with_element(|element| element.sign(slot, digest))
    }

    pub fn sign_recoverable(&self, slot: Slot, digest: &[u8]) -> HsmResult<RecoverableSignature> {
        self.with_element(|element| element.sign_recoverable(slot, digest))
    }

    pub fn verify(
        &self,
        slot: Slot,
        keyring: Keyring,
        digest: &[u8],
        signature: &[u8],
    ) -> HsmResult<Verification> {
        self.with_element(|element| element.verify(slot, keyring, digest, signature))
    }

    // Lock and unlock

    pub fn lock(&self, plaintext: &[u8], domain: KeyDomain) -> HsmResult<LockedObject> {
        self.with_element(|element| element.lock(plaintext, domain))
    }

    pub fn unlock(&self, object: &LockedObject, domain: KeyDomain) -> HsmResult<Zeroizing<Vec<u8>>> {
        self.with_element(|element| element.unlock(object, domain))
    }

    /// Lock everything read from `input` and write the serialized object
    pub fn lock_stream(
        &self,
        mut input: impl Read,
        mut output: impl Write,
        domain: KeyDomain,
    ) -> HsmResult<()> {
        let mut plaintext = Zeroizing::new(Vec::new());
        input.read_to_end(&mut plaintext)?;
        let object = self.lock(&plaintext, domain)?;
        output.write_all(&object.to_bytes())?;
        output.flush()?;
        Ok(())
    }

    /// Inverse of [`Session::lock_stream`]
    pub fn unlock_stream(
        &self,
        mut input: impl Read,
        mut output: impl Write,
        domain: KeyDomain,
    ) -> HsmResult<()> {
        let mut bytes = Vec::new();
        input.read_to_end(&mut bytes)?;
        let object = LockedObject::from_bytes(&bytes)?;
        let plaintext = self.unlock(&object, domain)?;
        output.write_all(&plaintext)?;
        output.flush()?;
        Ok(())
    }

    pub fn lock_file(&self, input: &Path, output: &Path, domain: KeyDomain) -> HsmResult<()> {
        self.lock_stream(File::open(input)?, File::create(output)?, domain)?;
        debug!("Locked {} into {}", input.display(), output.display());
        Ok(())
    }

    pub fn unlock_file(&self, input: &Path, output: &Path, domain: KeyDomain) -> HsmResult<()> {
        // Nothing is written unless the object opens
        let mut bytes = Vec::new();
        File::open(input)?.read_to_end(&mut bytes)?;
        let object = LockedObject::from_bytes(&bytes)?;
        let plaintext = self.unlock(&object, domain)?;
        std::fs::write(output, plaintext.as_slice())?;
        debug!("Unlocked {} into {}", input.display(), output.display());
        Ok(())
    }

    // Key agreement

    pub fn ecdh(&self, local: SlotRef, peer: &PeerKey) -> HsmResult<Zeroizing<Vec<u8>>> {
        self.with_element(|element| element.raw_ecdh(local, peer))
    }

    pub fn ecdh_kdf(
        &self,
        local: SlotRef,
        peer: &PeerKey,
        params: &KdfParams,
    ) -> HsmResult<Zeroizing<Vec<u8>>> {
        self.with_element(|element| element.ecdh_kdf(local, peer, params))
    }

    // HD wallets

    /// Create a wallet root, optionally backed by a fresh 24-word mnemonic
    ///
    /// Without a mnemonic the seed is random and cannot be recovered.
    pub fn generate_master_seed(
        &self,
        params: &WalletParams,
        passphrase: &str,
        want_mnemonic: bool,
    ) -> HsmResult<(Slot, Option<Zeroizing<String>>)> {
        self.with_element(|element| {
            if !want_mnemonic {
                let slot = element.create_master_seed(params, SeedSource::Random)?;
                return Ok((slot, None));
            }
            let entropy = Zeroizing::new(element.fill_random(BIP39_ENTROPY_LEN)?);
            let mnemonic = SeedPhrase::from_entropy(&entropy)?;
            let phrase = mnemonic.phrase();
            let slot = element.create_master_seed(
                params,
                SeedSource::Bip39 {
                    mnemonic,
                    passphrase: Zeroizing::new(passphrase.to_string()),
                },
            )?;
            Ok((slot, Some(phrase)))
        })
    }

    pub fn restore_bip39(
        &self,
        params: &WalletParams,
        passphrase: &str,
        mnemonic: &str,
    ) -> HsmResult<Slot> {
        let mnemonic = SeedPhrase::try_from(mnemonic)?;
        self.with_element(|element| {
            element.create_master_seed(
                params,
                SeedSource::Bip39 {
                    mnemonic,
                    passphrase: Zeroizing::new(passphrase.to_string()),
                },
            )
        })
    }

    pub fn derive_child(
        &self,
        parent: Slot,
        index: u32,
        hardened: bool,
        return_chain_code: bool,
    ) -> HsmResult<DerivedChild> {
        self.with_element(|element| element.derive_child(parent, index, hardened, return_chain_code))
    }

    /// Derive every node along `path` below the wallet root `master`
    pub fn derive_path(&self, master: Slot, path: &NodeAddress) -> HsmResult<Slot> {
        self.with_element(|element| element.derive_path(master, path))
    }

    pub fn generate_oversight_wallet(
        &self,
        params: &WalletParams,
        root: OversightRoot,
    ) -> HsmResult<Slot> {
        self.with_element(|element| element.create_oversight_wallet(params, root))
    }

    pub fn address_of(&self, slot: Slot) -> HsmResult<WalletNodeInfo> {
        self.with_element(|element| element.address_of(slot))
    }

    pub fn slot_of(&self, node_addr: &NodeAddress, selector: &WalletSelector) -> HsmResult<Slot> {
        self.with_element(|element| element.slot_of(node_addr, selector))
    }

    // SLIP39 recovery

    pub fn recovery_mode(&self) -> RecoveryMode {
        self.state.lock().recovery.mode()
    }

    /// Start splitting a fresh master secret into SLIP39 shards
    ///
    /// Any recovery flow already in progress is discarded.
    pub fn open_slip39_generate_session(
        &self,
        params: WalletParams,
        layout: Slip39Layout,
        master_passphrase: &str,
    ) -> HsmResult<()> {
        params.validate()?;
        self.with_recovery(|recovery, element| {
            ensure_name_free(element, &params.name)?;
            let master_secret = Zeroizing::new(element.fill_random(MASTER_SECRET_LEN)?);
            let generator = Slip39Generator::new(params, layout, master_secret, master_passphrase)?;
            if !matches!(recovery, RecoveryState::Idle) {
                warn!("Discarding {} to start SLIP39 generation", recovery.mode());
            }
            *recovery = RecoveryState::Generating(generator);
            info!(
                "Started SLIP39 generation: {} of {} groups",
                layout.group_threshold, layout.group_count
            );
            Ok(())
        })
    }

    pub fn set_active_group(&self, group_index: u8, layout: GroupLayout) -> HsmResult<()> {
        self.with_recovery(|recovery, _| match recovery {
            RecoveryState::Generating(generator) => {
                let mut next = generator.clone();
                next.set_active_group(group_index, layout)?;
                *generator = next;
                Ok(())
            }
            other => Err(other.unexpected(RecoveryMode::GeneratingSlip39)),
        })
    }

    /// Emit the next member shard of the active group
    ///
    /// The shard that completes the last group also materializes the wallet
    /// root and ends the flow.
    pub fn add_member_password(&self, passphrase: &str) -> HsmResult<GeneratedShard> {
        self.with_recovery(|recovery, element| {
            let RecoveryState::Generating(generator) = recovery else {
                return Err(recovery.unexpected(RecoveryMode::GeneratingSlip39));
            };
            let mut next = generator.clone();
            let mnemonic = next.next_shard(passphrase)?;

            if !next.is_complete() {
                *generator = next;
                return Ok(GeneratedShard {
                    mnemonic,
                    master_slot: None,
                });
            }

            let slot = element.create_master_seed(
                next.params(),
                SeedSource::Slip39 {
                    master_secret: next.master_secret().clone(),
                },
            )?;
            *recovery = RecoveryState::Idle;
            info!("SLIP39 generation complete, wallet root in slot {}", slot);
            Ok(GeneratedShard {
                mnemonic,
                master_slot: Some(slot),
            })
        })
    }

    /// Start collecting SLIP39 shards for a wallet
    ///
    /// Any recovery flow already in progress is discarded.
    pub fn open_slip39_restore_session(
        &self,
        params: WalletParams,
        master_passphrase: &str,
    ) -> HsmResult<()> {
        params.validate()?;
        self.with_recovery(|recovery, element| {
            ensure_name_free(element, &params.name)?;
            if !matches!(recovery, RecoveryState::Idle) {
                warn!("Discarding {} to start SLIP39 restore", recovery.mode());
            }
            *recovery = RecoveryState::Restoring(Slip39Restorer::new(params, master_passphrase));
            info!("Started SLIP39 restore");
            Ok(())
        })
    }

    /// Feed one shard, unmasked with its member passphrase
    pub fn add_shard(&self, passphrase: &str, mnemonic: &str) -> HsmResult<RestoreProgress> {
        let share = Share::from_mnemonic(mnemonic)?.masked(passphrase);
        self.with_recovery(|recovery, element| {
            let RecoveryState::Restoring(restorer) = recovery else {
                return Err(recovery.unexpected(RecoveryMode::RestoringSlip39));
            };
            let mut next = restorer.clone();
            next.add_shard(share)?;

            if !next.is_complete() {
                let progress = RestoreProgress::NeedMoreShards {
                    groups_complete: next.groups_complete(),
                    group_threshold: next.group_threshold(),
                };
                debug!("SLIP39 restore progress: {:?}", progress);
                *restorer = next;
                return Ok(progress);
            }

            let master_secret = next.recover()?;
            let slot = element.create_master_seed(next.params(), SeedSource::Slip39 { master_secret })?;
            *recovery = RecoveryState::Idle;
            info!("SLIP39 restore complete, wallet root in slot {}", slot);
            Ok(RestoreProgress::Complete(slot))
        })
    }

    /// Drop any recovery flow in progress
    pub fn cancel_session(&self) -> HsmResult<()> {
        let mut state = self.state.lock();
        if !state.open {
            return Err(DeviceError::ContextInvalid.into());
        }
        if !matches!(state.recovery, RecoveryState::Idle) {
            info!("Cancelled {}", state.recovery.mode());
        }
        state.recovery = RecoveryState::Idle;
        Ok(())
    }

    // Monitors and identity

    pub fn fill_random(&self, len: usize) -> HsmResult<Vec<u8>> {
        self.with_element(|element| element.fill_random(len))
    }

    /// Wait for a perimeter breach; the event stays pending
    ///
    /// A zero timeout polls.
    pub fn wait_for_perimeter_event(&self, timeout: Duration) -> HsmResult<PerimeterEvent> {
        let channel = self.with_element(|element| Ok(element.perimeter_events()))?;
        if channel.wait(timeout) {
            if let Some(event) = channel.snapshot().into_iter().next() {
                return Ok(event);
            }
        }
        Err(DeviceError::Timeout {
            event: "perimeter event".to_string(),
            timeout_ms: timeout.as_millis(),
        }
        .into())
    }

    pub fn perimeter_event_info(&self) -> HsmResult<Vec<PerimeterEvent>> {
        self.with_element(|element| Ok(element.perimeter_events().snapshot()))
    }

    pub fn clear_perimeter_events(&self) -> HsmResult<()> {
        self.with_element(|element| {
            element.perimeter_events().clear();
            Ok(())
        })
    }

    /// Wait for a tap and consume it
    pub fn wait_for_tap(&self, timeout: Duration) -> HsmResult<TapEvent> {
        let channel = self.with_element(|element| Ok(element.tap_events()))?;
        channel.wait_take(timeout).ok_or_else(|| {
            DeviceError::Timeout {
                event: "tap".to_string(),
                timeout_ms: timeout.as_millis(),
            }
            .into()
        })
    }

    pub fn model_number(&self) -> HsmResult<String> {
        self.with_element(|element| Ok(element.model_number()))
    }

    pub fn firmware_version(&self) -> HsmResult<String> {
        self.with_element(|element| Ok(element.firmware_version()))
    }

    pub fn serial_number(&self) -> HsmResult<String> {
        self.with_element(|element| Ok(element.serial_number()))
    }
}

impl<E: SecureElement> Drop for Session<E> {
    fn drop(&mut self) {
        self.close();
    }
}
