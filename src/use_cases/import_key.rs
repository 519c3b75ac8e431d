use tracing::debug;

use crate::error::{HsmError, HsmResult};
use crate::model::{KeyType, Slot};
use crate::ports::{DeviceFinder, KeyStore};

/// Store a hex encoded public key in the foreign keyring
pub fn import_foreign_key<F>(finder: &F, key_type: KeyType, public_key_hex: &str) -> HsmResult<Slot>
where
    F: DeviceFinder,
{
    let public_key = hex::decode(public_key_hex.trim())
        .map_err(|e| HsmError::invalid_argument(format!("public key is not hex: {}", e)))?;

    let element = finder.find_first()?;
    let slot = element.lock().store_foreign_key(key_type, &public_key)?;

    debug!("Imported foreign {} key into slot {}", key_type, slot);
    Ok(slot)
}
