//! Software implementation of a secure element
//!
//! Keys live in process memory. When the configuration names a state file,
//! every persistent change is written to it as a JSON snapshot and the next
//! element opened on the same file starts from that state, which models a
//! power cycle. The ephemeral slot is never written.
//!
//! Within a process, finders naming the same state file hand out one shared
//! element. Across processes an advisory lock on the file serializes writers,
//! and each change is applied on top of the state currently on disk.

mod crypto;
mod keyring;
mod snapshot;
mod wallet;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::{const_mutex, Mutex};
use rand::RngCore;
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::error::{HsmResult, KeyManagementError};
use crate::logic::DomainKey;
use crate::model::{
    ChainCode, ElementConfig, EventChannel, KeyDomain, KeyType, Keyring, NodeAddress,
    PerimeterEvent, PrivateKey, PublicKey, Slot, TapEvent, WalletVariant,
};
use crate::ports::{DeviceFinder, DeviceInfo, Monitor, RandomSource, SharedElement};

/// Position of a slot inside a wallet tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct WalletLink {
    pub name: String,
    pub master: Slot,
    pub node_addr: NodeAddress,
    pub variant: WalletVariant,
    pub chain_code: ChainCode,
    /// Parent slot and the child index with its hardened bit, absent on roots
    pub parent: Option<(Slot, u32)>,
}

#[derive(Debug, Clone)]
pub(crate) struct KeyRecord {
    pub key_type: KeyType,
    pub private: Option<PrivateKey>,
    pub public: PublicKey,
    pub exportable: bool,
    pub wallet: Option<WalletLink>,
}

impl KeyRecord {
    pub fn new(key_type: KeyType, private: Option<PrivateKey>, public: PublicKey) -> Self {
        Self {
            key_type,
            private,
            public,
            exportable: true,
            wallet: None,
        }
    }
}

/// Persistent slot contents of both keyrings
#[derive(Debug, Clone, Default)]
pub(crate) struct Keyrings {
    pub local: BTreeMap<Slot, KeyRecord>,
    pub foreign: BTreeMap<Slot, KeyRecord>,
}

impl Keyrings {
    pub fn ring(&self, keyring: Keyring) -> &BTreeMap<Slot, KeyRecord> {
        match keyring {
            Keyring::Local => &self.local,
            Keyring::Foreign => &self.foreign,
        }
    }

    pub fn ring_mut(&mut self, keyring: Keyring) -> &mut BTreeMap<Slot, KeyRecord> {
        match keyring {
            Keyring::Local => &mut self.local,
            Keyring::Foreign => &mut self.foreign,
        }
    }
}

/// In-memory secure element
pub struct SoftwareElement {
    config: ElementConfig,
    keyrings: Keyrings,
    ephemeral: Option<KeyRecord>,
    one_way_key: DomainKey,
    shared_key: DomainKey,
    perimeter: Arc<EventChannel<PerimeterEvent>>,
    taps: Arc<EventChannel<TapEvent>>,
}

fn random_key() -> DomainKey {
    let mut key = Zeroizing::new([0u8; 32]);
    rand::rng().fill_bytes(key.as_mut_slice());
    key
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

impl SoftwareElement {
    /// Open an element, restoring its state file when one exists
    pub fn new(config: ElementConfig) -> HsmResult<Self> {
        config.validate()?;
        let configured_shared = config.shared_key()?;

        let _guard = config
            .state_path
            .as_deref()
            .map(snapshot::StateLock::acquire)
            .transpose()?;
        let restored = match &config.state_path {
            Some(path) if path.exists() => Some(snapshot::load(path)?),
            _ => None,
        };

        let element = match restored {
            Some(state) => {
                info!(
                    "Restored element state with {} local and {} foreign slots",
                    state.keyrings.local.len(),
                    state.keyrings.foreign.len()
                );
                Self {
                    keyrings: state.keyrings,
                    ephemeral: None,
                    one_way_key: state.one_way_key,
                    shared_key: configured_shared.unwrap_or(state.shared_key),
                    perimeter: Arc::new(EventChannel::new()),
                    taps: Arc::new(EventChannel::new()),
                    config,
                }
            }
            None => {
                debug!("Initializing a blank element");
                Self {
                    keyrings: Keyrings::default(),
                    ephemeral: None,
                    one_way_key: random_key(),
                    shared_key: configured_shared.unwrap_or_else(random_key),
                    perimeter: Arc::new(EventChannel::new()),
                    taps: Arc::new(EventChannel::new()),
                    config,
                }
            }
        };
        element.persist(&element.keyrings)?;
        Ok(element)
    }

    pub fn config(&self) -> &ElementConfig {
        &self.config
    }

    pub fn state_path(&self) -> Option<&Path> {
        self.config.state_path.as_deref()
    }

    fn pool_size(&self, keyring: Keyring) -> usize {
        match keyring {
            Keyring::Local => self.config.local_pool_size,
            Keyring::Foreign => self.config.foreign_pool_size,
        }
    }

    fn domain_key(&self, domain: KeyDomain) -> &[u8; 32] {
        match domain {
            KeyDomain::OneWay => &self.one_way_key,
            KeyDomain::Shared => &self.shared_key,
        }
    }

    fn record(&self, slot: Slot, keyring: Keyring) -> HsmResult<&KeyRecord> {
        self.keyrings.ring(keyring).get(&slot).ok_or_else(|| {
            KeyManagementError::SlotNotFound {
                slot: slot.to_string(),
                keyring: keyring.to_string(),
            }
            .into()
        })
    }

    fn persist(&self, keyrings: &Keyrings) -> HsmResult<()> {
        if let Some(path) = &self.config.state_path {
            snapshot::store(path, keyrings, &self.one_way_key, &self.shared_key)?;
        }
        Ok(())
    }

    /// Apply `change` to a copy of the keyrings and keep it only once stored
    ///
    /// With a state file the copy is taken from the file under its lock, so
    /// changes stored by other processes are not overwritten.
    fn commit<T>(
        &mut self,
        change: impl FnOnce(&mut Keyrings, &Self) -> HsmResult<T>,
    ) -> HsmResult<T> {
        let _guard = match &self.config.state_path {
            Some(path) => {
                let guard = snapshot::StateLock::acquire(path)?;
                if path.exists() {
                    self.keyrings = snapshot::load(path)?.keyrings;
                }
                Some(guard)
            }
            None => None,
        };
        let mut staged = self.keyrings.clone();
        let result = change(&mut staged, self)?;
        self.persist(&staged)?;
        self.keyrings = staged;
        Ok(result)
    }

    /// Record an intrusion on a perimeter channel
    pub fn simulate_perimeter_event(&self, channel: u8) {
        self.perimeter.notify(PerimeterEvent {
            channel,
            timestamp: now_millis(),
        });
    }

    /// Record a tap on the element
    pub fn simulate_tap(&self) {
        self.taps.notify(TapEvent {
            timestamp: now_millis(),
        });
    }
}

/// Lowest unused slot number of a keyring
fn free_slot(ring: &BTreeMap<Slot, KeyRecord>, keyring: Keyring, pool_size: usize) -> HsmResult<Slot> {
    (0..pool_size as u32)
        .map(Slot)
        .find(|slot| !ring.contains_key(slot))
        .ok_or_else(|| {
            KeyManagementError::SlotPoolExhausted {
                keyring: keyring.to_string(),
                pool_size,
            }
            .into()
        })
}

impl RandomSource for SoftwareElement {
    fn fill_random(&mut self, len: usize) -> HsmResult<Vec<u8>> {
        let mut bytes = vec![0u8; len];
        rand::rng().fill_bytes(&mut bytes);
        Ok(bytes)
    }
}

impl Monitor for SoftwareElement {
    fn perimeter_events(&self) -> Arc<EventChannel<PerimeterEvent>> {
        Arc::clone(&self.perimeter)
    }

    fn tap_events(&self) -> Arc<EventChannel<TapEvent>> {
        Arc::clone(&self.taps)
    }
}

impl DeviceInfo for SoftwareElement {
    fn model_number(&self) -> String {
        self.config.model.clone()
    }

    fn firmware_version(&self) -> String {
        self.config.firmware_version.clone()
    }

    fn serial_number(&self) -> String {
        self.config.serial_number.clone()
    }
}

/// Elements currently open on a state file, keyed by its canonical path
static OPEN_ELEMENTS: Mutex<BTreeMap<PathBuf, Weak<Mutex<SoftwareElement>>>> =
    const_mutex(BTreeMap::new());

fn canonical_state_path(path: &Path) -> PathBuf {
    if let Ok(path) = path.canonicalize() {
        return path;
    }
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    match (parent.canonicalize(), path.file_name()) {
        (Ok(parent), Some(name)) => parent.join(name),
        _ => path.to_path_buf(),
    }
}

/// The element open on `path`, opening it when no live one exists
fn shared_element_for(path: &Path, config: &ElementConfig) -> HsmResult<SharedElement<SoftwareElement>> {
    let key = canonical_state_path(path);
    let mut open = OPEN_ELEMENTS.lock();
    open.retain(|_, element| element.strong_count() > 0);
    if let Some(element) = open.get(&key).and_then(Weak::upgrade) {
        debug!("Reusing software element on {}", key.display());
        return Ok(element);
    }
    let element = Arc::new(Mutex::new(SoftwareElement::new(config.clone())?));
    open.insert(key, Arc::downgrade(&element));
    Ok(element)
}

/// Finder handing out one shared software element
///
/// Every call returns the same element, so sessions opened through one
/// finder contend for the same key store. Finders backed by the same state
/// file share their element too.
pub struct SoftwareFinder {
    config: ElementConfig,
    element: Mutex<Option<SharedElement<SoftwareElement>>>,
}

impl SoftwareFinder {
    pub fn new(config: ElementConfig) -> Self {
        Self {
            config,
            element: Mutex::new(None),
        }
    }

    /// Finder backed by a state file
    pub fn with_state_file(path: impl Into<PathBuf>) -> Self {
        Self::new(ElementConfig::default().with_state_path(path))
    }
}

impl Default for SoftwareFinder {
    fn default() -> Self {
        Self::new(ElementConfig::default())
    }
}

impl DeviceFinder for SoftwareFinder {
    type Element = SoftwareElement;

    fn find_first(&self) -> HsmResult<SharedElement<Self::Element>> {
        let mut slot = self.element.lock();
        if let Some(element) = slot.as_ref() {
            return Ok(Arc::clone(element));
        }
        let element = match &self.config.state_path {
            Some(path) => shared_element_for(path, &self.config)?,
            None => Arc::new(Mutex::new(SoftwareElement::new(self.config.clone())?)),
        };
        *slot = Some(Arc::clone(&element));
        debug!("Connected to software element");
        Ok(element)
    }
}
