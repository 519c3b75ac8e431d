//! Generate key use case
//!
//! Generates a key pair on the first element, reads its public key back and
//! optionally seals it against export.

use tracing::info;

use crate::error::HsmResult;
use crate::model::{KeyType, Keyring, PublicKey, Slot};
use crate::ports::{DeviceFinder, KeyStore};

/// Generate a key pair and return its slot with the public key
///
/// # Arguments
///
/// * `finder` - Element finder implementation
/// * `key_type` - Curve of the new key
/// * `seal` - Disable public key export once the key has been read
///
/// # Errors
///
/// Returns errors if:
/// - No element is found
/// - The local keyring is full
pub fn generate_key<F>(finder: &F, key_type: KeyType, seal: bool) -> HsmResult<(Slot, PublicKey)>
where
    F: DeviceFinder,
{
    let element = finder.find_first()?;
    let mut element = element.lock();

    let slot = element.generate_key(key_type)?;
    let public_key = element.public_key(slot, Keyring::Local)?;
    if seal {
        element.disable_export(slot, Keyring::Local)?;
        info!("Sealed public key of slot {}", slot);
    }
    Ok((slot, public_key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::SoftwareFinder;
    use crate::error::ErrorCode;
    use crate::model::ElementConfig;

    #[test]
    fn test_generate_key_success() {
        let finder = SoftwareFinder::default();
        let (slot, public_key) = generate_key(&finder, KeyType::Ed25519, false).unwrap();
        assert_eq!(slot, Slot(0));
        assert_eq!(public_key.as_bytes().len(), 32);
    }

    #[test]
    fn test_generate_sealed_key() {
        let finder = SoftwareFinder::default();
        let (slot, public_key) = generate_key(&finder, KeyType::NistP256, true).unwrap();
        assert_eq!(public_key.as_bytes().len(), 65);

        let element = finder.find_first().unwrap();
        let err = element.lock().public_key(slot, Keyring::Local).unwrap_err();
        assert_eq!(err.kind(), ErrorCode::ExportDisabled);
    }

    #[test]
    fn test_generate_key_pool_full() {
        let finder = SoftwareFinder::new(ElementConfig {
            local_pool_size: 1,
            ..ElementConfig::default()
        });
        generate_key(&finder, KeyType::X25519, false).unwrap();
        let err = generate_key(&finder, KeyType::X25519, false).unwrap_err();
        assert_eq!(err.kind(), ErrorCode::SlotPoolExhausted);
    }
}
