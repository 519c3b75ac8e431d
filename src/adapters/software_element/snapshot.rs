//! JSON snapshot of the persistent element state

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use super::{KeyRecord, Keyrings, WalletLink};
use crate::error::{HsmError, HsmResult, KeyManagementError};
use crate::logic::DomainKey;
use crate::model::{ChainCode, KeyType, NodeAddress, PrivateKey, PublicKey, Slot, WalletVariant};

const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct StateFile {
    version: u32,
    one_way_key: String,
    shared_key: String,
    local: Vec<SlotEntry>,
    foreign: Vec<SlotEntry>,
}

#[derive(Serialize, Deserialize)]
struct SlotEntry {
    slot: Slot,
    key_type: KeyType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    private_key: Option<String>,
    public_key: String,
    exportable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    wallet: Option<WalletEntry>,
}

#[derive(Serialize, Deserialize)]
struct WalletEntry {
    name: String,
    master: Slot,
    node_addr: String,
    variant: WalletVariant,
    chain_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent: Option<Slot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    index: Option<u32>,
}

/// Persistent state read back from disk
pub(super) struct RestoredState {
    pub keyrings: Keyrings,
    pub one_way_key: DomainKey,
    pub shared_key: DomainKey,
}

fn load_error(path: &Path, reason: impl ToString) -> HsmError {
    KeyManagementError::LoadFailed {
        location: path.display().to_string(),
        reason: reason.to_string(),
    }
    .into()
}

fn store_error(path: &Path, reason: impl ToString) -> HsmError {
    KeyManagementError::StoreFailed {
        destination: path.display().to_string(),
        reason: reason.to_string(),
    }
    .into()
}

fn decode_key(path: &Path, key_hex: &str) -> HsmResult<DomainKey> {
    let bytes = Zeroizing::new(hex::decode(key_hex).map_err(|e| load_error(path, e))?);
    let key: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| load_error(path, "domain key must be 32 bytes"))?;
    Ok(Zeroizing::new(key))
}

impl SlotEntry {
    fn from_record(slot: Slot, record: &KeyRecord) -> Self {
        SlotEntry {
            slot,
            key_type: record.key_type,
            private_key: record.private.as_ref().map(|k| hex::encode(k.as_bytes())),
            public_key: record.public.to_hex(),
            exportable: record.exportable,
            wallet: record.wallet.as_ref().map(|link| WalletEntry {
                name: link.name.clone(),
                master: link.master,
                node_addr: link.node_addr.to_string(),
                variant: link.variant,
                chain_code: hex::encode(link.chain_code.as_bytes()),
                parent: link.parent.map(|(slot, _)| slot),
                index: link.parent.map(|(_, index)| index),
            }),
        }
    }

    fn into_record(self, path: &Path) -> HsmResult<(Slot, KeyRecord)> {
        let private = match &self.private_key {
            Some(key_hex) => {
                let bytes = Zeroizing::new(hex::decode(key_hex).map_err(|e| load_error(path, e))?);
                Some(PrivateKey::from_slice(&bytes)?)
            }
            None => None,
        };
        let public =
            PublicKey::from_slice(&hex::decode(&self.public_key).map_err(|e| load_error(path, e))?)?;

        let wallet = match self.wallet {
            Some(entry) => {
                let chain_code = ChainCode::from_slice(
                    &hex::decode(&entry.chain_code).map_err(|e| load_error(path, e))?,
                )?;
                let parent = match (entry.parent, entry.index) {
                    (Some(parent), Some(index)) => Some((parent, index)),
                    (None, None) => None,
                    _ => return Err(load_error(path, "wallet parent without index")),
                };
                Some(WalletLink {
                    name: entry.name,
                    master: entry.master,
                    node_addr: NodeAddress::try_from(entry.node_addr.as_str())?,
                    variant: entry.variant,
                    chain_code,
                    parent,
                })
            }
            None => None,
        };

        Ok((
            self.slot,
            KeyRecord {
                key_type: self.key_type,
                private,
                public,
                exportable: self.exportable,
                wallet,
            },
        ))
    }
}

/// Exclusive advisory lock on a state file, held until dropped
///
/// The lock lives on a `<state>.lock` sibling since the state file itself is
/// replaced by rename on every store.
pub(super) struct StateLock {
    file: File,
    path: PathBuf,
}

impl StateLock {
    pub fn acquire(state_path: &Path) -> HsmResult<Self> {
        let mut name = OsString::from(state_path.as_os_str());
        name.push(".lock");
        let path = PathBuf::from(name);

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| store_error(state_path, e))?;
        FileExt::lock_exclusive(&file).map_err(|e| store_error(state_path, e))?;
        Ok(Self { file, path })
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            warn!("Failed to release {}: {}", self.path.display(), err);
        }
    }
}

pub(super) fn load(path: &Path) -> HsmResult<RestoredState> {
    let text = Zeroizing::new(fs::read_to_string(path).map_err(|e| load_error(path, e))?);
    let state: StateFile = serde_json::from_str(&text).map_err(|e| load_error(path, e))?;
    if state.version != FORMAT_VERSION {
        return Err(load_error(
            path,
            format!("unsupported state version {}", state.version),
        ));
    }

    let mut keyrings = Keyrings::default();
    for entry in state.local {
        let (slot, record) = entry.into_record(path)?;
        keyrings.local.insert(slot, record);
    }
    for entry in state.foreign {
        let (slot, record) = entry.into_record(path)?;
        if record.private.is_some() {
            return Err(load_error(path, "foreign slot holds a private key"));
        }
        keyrings.foreign.insert(slot, record);
    }
    debug!("Loaded element state from {}", path.display());

    Ok(RestoredState {
        keyrings,
        one_way_key: decode_key(path, &state.one_way_key)?,
        shared_key: decode_key(path, &state.shared_key)?,
    })
}

/// Write the state next to `path` and move it into place
pub(super) fn store(
    path: &Path,
    keyrings: &Keyrings,
    one_way_key: &[u8; 32],
    shared_key: &[u8; 32],
) -> HsmResult<()> {
    let state = StateFile {
        version: FORMAT_VERSION,
        one_way_key: hex::encode(one_way_key),
        shared_key: hex::encode(shared_key),
        local: keyrings
            .local
            .iter()
            .map(|(slot, record)| SlotEntry::from_record(*slot, record))
            .collect(),
        foreign: keyrings
            .foreign
            .iter()
            .map(|(slot, record)| SlotEntry::from_record(*slot, record))
            .collect(),
    };
    let text = Zeroizing::new(
        serde_json::to_string_pretty(&state).map_err(|e| store_error(path, e))?,
    );

    let staging = path.with_extension("tmp");
    fs::write(&staging, text.as_bytes()).map_err(|e| store_error(path, e))?;
    fs::rename(&staging, path).map_err(|e| store_error(path, e))?;
    debug!("Stored element state to {}", path.display());
    Ok(())
}
