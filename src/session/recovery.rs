//! SLIP39 generate and restore state machines
//!
//! Both machines are plain values owned by a session. Every transition is
//! computed on a copy so a failing call leaves the machine as it was.

use std::collections::BTreeMap;

use tracing::debug;
use zeroize::Zeroizing;

use crate::error::{HsmError, HsmResult, SessionError};
use crate::logic::shamir::{self, SharePoint};
use crate::logic::{slip39, Share, ShareError};
use crate::model::{GroupLayout, RecoveryParamsError, Slip39Layout, WalletParams};

/// Which recovery flow a session is in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryMode {
    Idle,
    GeneratingSlip39,
    RestoringSlip39,
}

impl std::fmt::Display for RecoveryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecoveryMode::Idle => f.write_str("idle"),
            RecoveryMode::GeneratingSlip39 => f.write_str("generating SLIP39 shards"),
            RecoveryMode::RestoringSlip39 => f.write_str("restoring from SLIP39 shards"),
        }
    }
}

pub(crate) enum RecoveryState {
    Idle,
    Generating(Slip39Generator),
    Restoring(Slip39Restorer),
}

impl RecoveryState {
    pub fn mode(&self) -> RecoveryMode {
        match self {
            RecoveryState::Idle => RecoveryMode::Idle,
            RecoveryState::Generating(_) => RecoveryMode::GeneratingSlip39,
            RecoveryState::Restoring(_) => RecoveryMode::RestoringSlip39,
        }
    }

    pub fn unexpected(&self, expected: RecoveryMode) -> HsmError {
        SessionError::StateError {
            expected: expected.to_string(),
            actual: self.mode().to_string(),
        }
        .into()
    }
}

fn state_error(expected: impl Into<String>, actual: impl Into<String>) -> HsmError {
    SessionError::StateError {
        expected: expected.into(),
        actual: actual.into(),
    }
    .into()
}

/// Digest failures on recombination mean the shards do not belong together
fn shard_mismatch(err: ShareError) -> HsmError {
    match err {
        ShareError::DigestMismatch => SessionError::ShardMismatch {
            reason: err.to_string(),
        }
        .into(),
        other => other.into(),
    }
}

#[derive(Clone)]
struct GroupProgress {
    layout: GroupLayout,
    members: Vec<SharePoint>,
    emitted: u8,
}

/// Splits a master secret and hands out one member shard per call
#[derive(Clone)]
pub(crate) struct Slip39Generator {
    params: WalletParams,
    layout: Slip39Layout,
    identifier: u16,
    master_secret: Zeroizing<Vec<u8>>,
    group_shares: Vec<SharePoint>,
    groups: Vec<Option<GroupProgress>>,
    active_group: Option<u8>,
}

impl Slip39Generator {
    pub fn new(
        params: WalletParams,
        layout: Slip39Layout,
        master_secret: Zeroizing<Vec<u8>>,
        master_passphrase: &str,
    ) -> HsmResult<Self> {
        let identifier = slip39::random_identifier();
        let encrypted = slip39::encrypt_master_secret(
            &master_secret,
            master_passphrase,
            layout.iteration_exponent,
            identifier,
        )?;
        let group_shares =
            shamir::split_secret(layout.group_threshold, layout.group_count, &encrypted)?;
        debug!(
            "Split master secret into {} groups, threshold {}",
            layout.group_count, layout.group_threshold
        );

        Ok(Self {
            params,
            layout,
            identifier,
            master_secret,
            group_shares,
            groups: vec![None; layout.group_count as usize],
            active_group: None,
        })
    }

    pub fn params(&self) -> &WalletParams {
        &self.params
    }

    pub fn master_secret(&self) -> &Zeroizing<Vec<u8>> {
        &self.master_secret
    }

    /// Select the group the next member shards are taken from
    ///
    /// A group keeps the layout it was first given.
    pub fn set_active_group(&mut self, index: u8, layout: GroupLayout) -> HsmResult<()> {
        let count = self.layout.group_count;
        let group = self
            .groups
            .get_mut(index as usize)
            .ok_or(RecoveryParamsError::GroupIndex { index, count })?;

        match group {
            Some(progress) if progress.layout != layout => {
                return Err(state_error(
                    format!(
                        "group {} layout {} of {}",
                        index, progress.layout.member_threshold, progress.layout.member_count
                    ),
                    format!("layout {} of {}", layout.member_threshold, layout.member_count),
                ));
            }
            Some(_) => {}
            None => {
                let members = shamir::split_secret(
                    layout.member_threshold,
                    layout.member_count,
                    &self.group_shares[index as usize].value,
                )?;
                *group = Some(GroupProgress {
                    layout,
                    members,
                    emitted: 0,
                });
            }
        }
        self.active_group = Some(index);
        Ok(())
    }

    /// Next member shard of the active group, masked with `passphrase`
    pub fn next_shard(&mut self, passphrase: &str) -> HsmResult<Zeroizing<String>> {
        let index = self
            .active_group
            .ok_or_else(|| state_error("an active group", "no group selected"))?;
        let progress = self.groups[index as usize]
            .as_mut()
            .ok_or_else(|| state_error("an active group", "no group selected"))?;
        if progress.emitted >= progress.layout.member_count {
            return Err(state_error(
                "a group with members left",
                format!("group {} fully emitted", index),
            ));
        }

        let point = &progress.members[progress.emitted as usize];
        let share = Share {
            identifier: self.identifier,
            extendable: false,
            iteration_exponent: self.layout.iteration_exponent,
            group_index: index,
            group_threshold: self.layout.group_threshold,
            group_count: self.layout.group_count,
            member_index: point.x,
            member_threshold: progress.layout.member_threshold,
            value: point.value.clone(),
        };
        let mnemonic = share.masked(passphrase).to_mnemonic()?;
        progress.emitted += 1;
        debug!(
            "Emitted member {} of {} in group {}",
            progress.emitted, progress.layout.member_count, index
        );
        Ok(mnemonic)
    }

    /// Every group has handed out all of its members
    pub fn is_complete(&self) -> bool {
        self.groups.iter().all(|group| {
            group
                .as_ref()
                .is_some_and(|progress| progress.emitted == progress.layout.member_count)
        })
    }
}

/// Fields every shard of one split shares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ShardSet {
    identifier: u16,
    iteration_exponent: u8,
    group_count: u8,
    group_threshold: u8,
}

impl ShardSet {
    fn of(share: &Share) -> Self {
        Self {
            identifier: share.identifier,
            iteration_exponent: share.iteration_exponent,
            group_count: share.group_count,
            group_threshold: share.group_threshold,
        }
    }
}

#[derive(Clone)]
struct GroupShards {
    member_threshold: u8,
    members: BTreeMap<u8, Zeroizing<Vec<u8>>>,
    /// Group share recombined once `member_threshold` members are in
    recovered: Option<Zeroizing<Vec<u8>>>,
}

impl GroupShards {
    fn new(member_threshold: u8) -> Self {
        Self {
            member_threshold,
            members: BTreeMap::new(),
            recovered: None,
        }
    }

    fn is_complete(&self) -> bool {
        self.recovered.is_some()
    }

    /// Complete and confirmed by the group digest; its members are final
    fn is_verified(&self) -> bool {
        self.is_complete() && self.member_threshold > 1
    }

    fn recombine(&mut self) -> Result<(), ShareError> {
        self.recovered = None;
        if self.members.len() < self.member_threshold as usize {
            return Ok(());
        }
        let points: Vec<SharePoint> = self
            .members
            .iter()
            .map(|(x, value)| SharePoint::new(*x, value))
            .collect();
        self.recovered = Some(shamir::recover_secret(self.member_threshold, &points)?);
        Ok(())
    }
}

/// Collects unmasked shards until enough groups are complete
#[derive(Clone)]
pub(crate) struct Slip39Restorer {
    params: WalletParams,
    master_passphrase: Zeroizing<String>,
    set: Option<ShardSet>,
    groups: BTreeMap<u8, GroupShards>,
}

impl Slip39Restorer {
    pub fn new(params: WalletParams, master_passphrase: &str) -> Self {
        Self {
            params,
            master_passphrase: Zeroizing::new(master_passphrase.to_string()),
            set: None,
            groups: BTreeMap::new(),
        }
    }

    pub fn params(&self) -> &WalletParams {
        &self.params
    }

    /// Record a shard; a repeat of a known shard changes nothing
    ///
    /// A group is recombined as soon as it reaches its member threshold. A
    /// shard that makes the group fail its digest check is refused, and the
    /// members already held stay replaceable by re-feeding them until the
    /// group checks out.
    pub fn add_shard(&mut self, share: Share) -> HsmResult<()> {
        let set = ShardSet::of(&share);
        match self.set {
            Some(expected) if expected != set => {
                return Err(SessionError::ShardMismatch {
                    reason: format!(
                        "shard belongs to set {:#06x}, session holds {:#06x}",
                        set.identifier, expected.identifier
                    ),
                }
                .into());
            }
            _ => {}
        }

        let (group_index, member_index) = (share.group_index, share.member_index);
        let mut group = self
            .groups
            .get(&group_index)
            .cloned()
            .unwrap_or_else(|| GroupShards::new(share.member_threshold));
        if group.member_threshold != share.member_threshold {
            return Err(SessionError::ShardMismatch {
                reason: format!(
                    "group {} member threshold {} differs from {}",
                    group_index, share.member_threshold, group.member_threshold
                ),
            }
            .into());
        }

        match group.members.get(&member_index) {
            Some(known) if *known == share.value => {
                debug!(
                    "Ignoring repeated shard {} of group {}",
                    member_index, group_index
                );
                return Ok(());
            }
            Some(_) if group.is_verified() => {
                return Err(SessionError::ShardMismatch {
                    reason: format!(
                        "member {} of group {} was already verified with another value",
                        member_index, group_index
                    ),
                }
                .into());
            }
            Some(_) => debug!("Replacing member {} of group {}", member_index, group_index),
            None if group.is_complete() => {
                debug!(
                    "Group {} is already complete, ignoring member {}",
                    group_index, member_index
                );
                return Ok(());
            }
            None => {}
        }

        group.members.insert(member_index, share.value);
        group.recombine().map_err(|err| match err {
            ShareError::DigestMismatch => SessionError::ShardMismatch {
                reason: format!(
                    "member {} does not complete group {} consistently, check the member passphrases",
                    member_index, group_index
                ),
            }
            .into(),
            other => HsmError::from(other),
        })?;
        if group.is_complete() {
            debug!("Group {} complete", group_index);
        }

        self.set = Some(set);
        self.groups.insert(group_index, group);
        Ok(())
    }

    pub fn groups_complete(&self) -> u8 {
        self.groups.values().filter(|g| g.is_complete()).count() as u8
    }

    /// Group threshold of the collected set, zero before the first shard
    pub fn group_threshold(&self) -> u8 {
        self.set.map(|set| set.group_threshold).unwrap_or_default()
    }

    pub fn is_complete(&self) -> bool {
        self.set.is_some() && self.groups_complete() >= self.group_threshold()
    }

    /// Recombine the collected shards into the master secret
    pub fn recover(&self) -> HsmResult<Zeroizing<Vec<u8>>> {
        let set = self
            .set
            .ok_or_else(|| state_error("collected shards", "no shards"))?;

        let group_points: Vec<SharePoint> = self
            .groups
            .iter()
            .filter_map(|(index, group)| {
                group
                    .recovered
                    .as_ref()
                    .map(|value| SharePoint::new(*index, value))
            })
            .collect();

        let encrypted =
            shamir::recover_secret(set.group_threshold, &group_points).map_err(shard_mismatch)?;
        Ok(slip39::decrypt_master_secret(
            &encrypted,
            &self.master_passphrase,
            set.iteration_exponent,
            set.identifier,
        )?)
    }
}
