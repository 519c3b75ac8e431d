//! Use cases (orchestration)
//!
//! This module contains use cases that orchestrate operations across multiple ports.
//! Each one finds an element through a [`crate::ports::DeviceFinder`] and drives it
//! directly, without a session.

mod generate_key;
mod import_key;
mod import_seed;

pub use generate_key::generate_key;
pub use import_key::import_foreign_key;
pub use import_seed::{default_node_address, import_seed_phrase, ImportedWallet};
