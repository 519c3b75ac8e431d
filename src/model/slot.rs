use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Numbered key slot inside one keyring
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Slot(pub u32);

impl Slot {
    /// Numeric marker the element uses for the ephemeral slot
    pub const EPHEMERAL_CODE: i32 = -1;

    pub fn number(self) -> u32 {
        self.0
    }

    /// Convert a numeric slot argument (where -1 means ephemeral)
    pub fn from_code(code: i32) -> Result<SlotRef, SlotError> {
        match code {
            Self::EPHEMERAL_CODE => Ok(SlotRef::Ephemeral),
            n if n >= 0 => Ok(SlotRef::Persistent(Slot(n as u32))),
            n => Err(SlotError::InvalidNumber { number: n }),
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Slot {
    fn from(n: u32) -> Self {
        Slot(n)
    }
}

/// Partition of the slot space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Keyring {
    /// Key pairs generated or derived inside the element
    #[default]
    Local,
    /// Public keys supplied from outside, never holding private material
    Foreign,
}

impl Keyring {
    pub fn from_foreign_flag(is_foreign: bool) -> Self {
        if is_foreign {
            Keyring::Foreign
        } else {
            Keyring::Local
        }
    }

    pub fn is_foreign(self) -> bool {
        matches!(self, Keyring::Foreign)
    }
}

impl fmt::Display for Keyring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Keyring::Local => f.write_str("local"),
            Keyring::Foreign => f.write_str("foreign"),
        }
    }
}

/// Local key reference accepted by key agreement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotRef {
    Persistent(Slot),
    Ephemeral,
}

impl From<Slot> for SlotRef {
    fn from(slot: Slot) -> Self {
        SlotRef::Persistent(slot)
    }
}

impl fmt::Display for SlotRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotRef::Persistent(slot) => write!(f, "{}", slot),
            SlotRef::Ephemeral => f.write_str("ephemeral"),
        }
    }
}

/// Peer public key for key agreement, by value or by slot reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerKey {
    Bytes(Vec<u8>),
    Slot { slot: Slot, keyring: Keyring },
}

/// Allocated slots of one keyring together with the pool ceiling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotList {
    pub slots: Vec<Slot>,
    pub pool_size: usize,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SlotError {
    #[error("Invalid slot number: {number}")]
    InvalidNumber { number: i32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_from_code() {
        assert_eq!(Slot::from_code(-1).unwrap(), SlotRef::Ephemeral);
        assert_eq!(
            Slot::from_code(16).unwrap(),
            SlotRef::Persistent(Slot(16))
        );
    }

    #[test]
    fn test_slot_from_negative_code() {
        assert_eq!(
            Slot::from_code(-5).unwrap_err(),
            SlotError::InvalidNumber { number: -5 }
        );
    }

    #[test]
    fn test_keyring_flag() {
        assert_eq!(Keyring::from_foreign_flag(true), Keyring::Foreign);
        assert!(!Keyring::from_foreign_flag(false).is_foreign());
    }

    #[test]
    fn test_slot_ordering() {
        let mut slots = vec![Slot(3), Slot(0), Slot(2)];
        slots.sort();
        assert_eq!(slots, vec![Slot(0), Slot(2), Slot(3)]);
    }
}
