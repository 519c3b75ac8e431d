mod cardano_key;
mod config;
mod event;
mod kdf;
mod key_material;
mod key_type;
mod locked_object;
mod node_address;
mod recovery;
mod seed_phrase;
mod slot;
mod verification;
mod wallet;

pub use cardano_key::{CardanoKey, CardanoKeyError, CardanoPublicKey};
pub use config::{ConfigError, ElementConfig};
pub use event::{EventChannel, PerimeterEvent, TapEvent};
pub use kdf::{KdfKind, KdfParams, KdfParamsError};
pub use key_material::{ChainCode, KeyMaterialError, PrivateKey, PublicKey, RecoverableSignature};
pub use key_type::{KeyType, KeyTypeError, WalletVariant};
pub use locked_object::{
    KeyDomain, LockedObject, LockedObjectError, NONCE_LEN as LOCK_NONCE_LEN,
    SALT_LEN as LOCK_SALT_LEN,
};
pub use node_address::{NodeAddress, NodeAddressError};
pub use recovery::{
    GeneratedShard, GroupLayout, RecoveryParamsError, RestoreProgress, Slip39Layout,
    MAX_ITERATION_EXPONENT, MAX_SHARE_COUNT,
};
pub use seed_phrase::{SeedPhrase, SeedPhraseError};
pub use slot::{Keyring, PeerKey, Slot, SlotError, SlotList, SlotRef};
pub use verification::Verification;
pub use wallet::{
    DerivedChild, OversightRoot, SeedSource, WalletNodeInfo, WalletParams, WalletSelector,
};
