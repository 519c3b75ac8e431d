use std::fmt;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::model::Slot;

/// Largest group or member count a share can describe
pub const MAX_SHARE_COUNT: u8 = 16;
/// Largest iteration exponent a share can describe
pub const MAX_ITERATION_EXPONENT: u8 = 15;

/// Group level layout of a SLIP39 split
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slip39Layout {
    pub group_count: u8,
    pub group_threshold: u8,
    pub iteration_exponent: u8,
}

impl Slip39Layout {
    pub fn new(
        group_count: u8,
        group_threshold: u8,
        iteration_exponent: u8,
    ) -> Result<Self, RecoveryParamsError> {
        if group_count == 0 || group_count > MAX_SHARE_COUNT {
            return Err(RecoveryParamsError::GroupCount { count: group_count });
        }
        if group_threshold == 0 || group_threshold > group_count {
            return Err(RecoveryParamsError::GroupThreshold {
                threshold: group_threshold,
                count: group_count,
            });
        }
        if iteration_exponent > MAX_ITERATION_EXPONENT {
            return Err(RecoveryParamsError::IterationExponent {
                exponent: iteration_exponent,
            });
        }
        Ok(Self {
            group_count,
            group_threshold,
            iteration_exponent,
        })
    }
}

/// Member level layout of one SLIP39 group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupLayout {
    pub member_count: u8,
    pub member_threshold: u8,
}

impl GroupLayout {
    pub fn new(member_count: u8, member_threshold: u8) -> Result<Self, RecoveryParamsError> {
        if member_count == 0 || member_count > MAX_SHARE_COUNT {
            return Err(RecoveryParamsError::MemberCount {
                count: member_count,
            });
        }
        if member_threshold == 0 || member_threshold > member_count {
            return Err(RecoveryParamsError::MemberThreshold {
                threshold: member_threshold,
                count: member_count,
            });
        }
        // A 1-of-n group would hand out n copies of the same share
        if member_threshold == 1 && member_count != 1 {
            return Err(RecoveryParamsError::SingleMemberThreshold {
                count: member_count,
            });
        }
        Ok(Self {
            member_count,
            member_threshold,
        })
    }
}

/// One emitted member shard
pub struct GeneratedShard {
    pub mnemonic: Zeroizing<String>,
    /// Set on the final shard, once the master seed slot exists
    pub master_slot: Option<Slot>,
}

impl fmt::Debug for GeneratedShard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratedShard")
            .field("mnemonic", &"[REDACTED]")
            .field("master_slot", &self.master_slot)
            .finish()
    }
}

/// Outcome of feeding a shard into a restore session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreProgress {
    NeedMoreShards {
        groups_complete: u8,
        group_threshold: u8,
    },
    Complete(Slot),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecoveryParamsError {
    #[error("Group count {count} must be between 1 and 16")]
    GroupCount { count: u8 },

    #[error("Group threshold {threshold} must be between 1 and the group count {count}")]
    GroupThreshold { threshold: u8, count: u8 },

    #[error("Iteration exponent {exponent} exceeds 15")]
    IterationExponent { exponent: u8 },

    #[error("Member count {count} must be between 1 and 16")]
    MemberCount { count: u8 },

    #[error("Member threshold {threshold} must be between 1 and the member count {count}")]
    MemberThreshold { threshold: u8, count: u8 },

    #[error("Member threshold 1 requires exactly one member, got {count}")]
    SingleMemberThreshold { count: u8 },

    #[error("Group index {index} is outside 0..{count}")]
    GroupIndex { index: u8, count: u8 },
}
