//! Convenience entry points backed by the software element

use std::path::Path;

use crate::adapters::{SoftwareElement, SoftwareFinder};
use crate::error::HsmResult;
use crate::session::Session;
use crate::use_cases::{
    generate_key as generate_key_use_case, import_foreign_key as import_foreign_key_use_case,
    import_seed_phrase as import_seed_phrase_use_case, ImportedWallet,
};

pub use crate::model::*;

/// Open a session on a software element built from `config`
pub fn open_session(config: ElementConfig) -> HsmResult<Session<SoftwareElement>> {
    Session::open(&SoftwareFinder::new(config))
}

/// Open a session on the software element persisted at `path`
pub fn open_session_with_state(path: &Path) -> HsmResult<Session<SoftwareElement>> {
    Session::open(&SoftwareFinder::with_state_file(path))
}

pub fn generate_key_with_config(
    config: ElementConfig,
    key_type: KeyType,
    seal: bool,
) -> HsmResult<(Slot, PublicKey)> {
    let finder = SoftwareFinder::new(config);
    generate_key_use_case(&finder, key_type, seal)
}

pub fn import_foreign_key_with_config(
    config: ElementConfig,
    key_type: KeyType,
    public_key_hex: &str,
) -> HsmResult<Slot> {
    let finder = SoftwareFinder::new(config);
    import_foreign_key_use_case(&finder, key_type, public_key_hex)
}

pub fn import_seed_phrase_with_config(
    config: ElementConfig,
    params: &WalletParams,
    seed_phrase: &str,
    passphrase: &str,
    path: Option<&str>,
) -> HsmResult<ImportedWallet> {
    let finder = SoftwareFinder::new(config);
    import_seed_phrase_use_case(&finder, params, seed_phrase, passphrase, path)
}
