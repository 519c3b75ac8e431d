pub mod curve;
pub mod hd;
pub mod kdf;
pub mod lock;
pub mod shamir;
pub mod slip39;
pub mod wallet_seed;

pub use hd::ExtendedNode;
pub use lock::DomainKey;
pub use slip39::{Share, ShareError};
