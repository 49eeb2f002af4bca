//! Beacon chain primitives as seen by the exporter.
//!
//! These are the read-side types the node client hands out. They carry only
//! what the export pipeline consumes; full consensus types (bodies,
//! signatures, execution payloads) stay behind the node.

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Sync-committee duty map: `slot -> validator -> participated`.
///
/// Epoch-boundary exports write a `false` baseline for every assigned
/// validator across the whole epoch; per-slot exports overwrite the cells of
/// their own slot with actual participation.
pub type SyncDuties = BTreeMap<u64, BTreeMap<u64, bool>>;

/// Attestation duty map: `attested_slot -> validator -> inclusion slots`.
///
/// Epoch-boundary exports write empty inclusion lists; per-slot exports
/// append the slot a validator's attestation was included in.
pub type AttestationDuties = BTreeMap<u64, BTreeMap<u64, Vec<u64>>>;

/// Proposer assignments for one epoch: `slot -> proposer validator index`.
pub type ProposerAssignments = BTreeMap<u64, u64>;

/// The node's current view of the chain frontier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainHead {
    /// Highest slot of the canonical chain.
    pub head_slot: u64,
    /// Epoch containing `head_slot`.
    pub head_epoch: u64,
    /// Highest finalized slot.
    pub finalized_slot: u64,
    /// Epoch containing `finalized_slot`.
    pub finalized_epoch: u64,
}

/// Canonical block header for a slot, as reported by the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Slot of the block.
    pub slot: u64,
    /// Root of the block.
    pub root: B256,
}

impl BlockHeader {
    /// Create a new header.
    pub const fn new(slot: u64, root: B256) -> Self {
        Self { slot, root }
    }
}

/// Lifecycle status of a slot row in the relational store.
///
/// The store speaks single-character status codes on the wire; the enum is
/// the in-process representation and [`SlotStatus::as_db_str`] /
/// [`SlotStatus::from_db_str`] translate at the boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotStatus {
    /// Scheduled but not yet observed; the insert-time default.
    #[default]
    Scheduled,
    /// A block was proposed and is currently canonical.
    Proposed,
    /// No block was proposed.
    Missed,
    /// A block was proposed but later excluded from the canonical chain.
    Orphaned,
}

impl SlotStatus {
    /// On-wire status code for the relational store.
    pub const fn as_db_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "0",
            Self::Proposed => "1",
            Self::Missed => "2",
            Self::Orphaned => "3",
        }
    }

    /// Decode an on-wire status code.
    pub fn from_db_str(code: &str) -> Option<Self> {
        match code {
            "0" => Some(Self::Scheduled),
            "1" => Some(Self::Proposed),
            "2" => Some(Self::Missed),
            "3" => Some(Self::Orphaned),
            _ => None,
        }
    }
}

/// Error raised when an attestor assignment key is not of the form
/// `"{attested_slot}-{committee_index}"` with decimal fields.
///
/// This is a data-shape violation of the node-client contract and is fatal
/// for the slot being exported.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed attestor assignment key: {key:?}")]
pub struct ParseAssignmentKeyError {
    /// The offending raw key.
    pub key: String,
}

/// Typed attestor assignment key.
///
/// The node encodes attestor assignments under string keys of the form
/// `"{attested_slot}-{committee_index}"`. Parsing happens here, at the
/// client boundary, so the exporter only ever sees typed keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssignmentKey {
    /// Slot the validator is assigned to attest.
    pub attested_slot: u64,
    /// Index of the committee within the slot.
    pub committee_index: u64,
}

impl AssignmentKey {
    /// Create a new assignment key.
    pub const fn new(attested_slot: u64, committee_index: u64) -> Self {
        Self { attested_slot, committee_index }
    }
}

impl FromStr for AssignmentKey {
    type Err = ParseAssignmentKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ParseAssignmentKeyError { key: s.to_owned() };

        let (slot, committee) = s.split_once('-').ok_or_else(|| malformed())?;
        let attested_slot = slot.parse().map_err(|_| malformed())?;
        let committee_index = committee.parse().map_err(|_| malformed())?;

        Ok(Self { attested_slot, committee_index })
    }
}

/// Validator duties assigned for one epoch.
///
/// Present on a block response iff the node included epoch assignments for
/// the block's epoch (the first slot of an epoch it serves).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochAssignments {
    /// Proposer per slot of the epoch.
    pub proposers: ProposerAssignments,
    /// Attestor assignments: typed key to validator index.
    pub attestors: BTreeMap<AssignmentKey, u64>,
    /// Validators in the sync committee for the epoch.
    pub sync_committee: Vec<u64>,
}

/// A validator snapshot entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    /// Validator index.
    pub index: u64,
    /// Current balance in Gwei.
    pub balance: u64,
    /// Effective balance in Gwei.
    pub effective_balance: u64,
    /// Epoch the validator activates (or `u64::MAX` while queued).
    pub activation_epoch: u64,
    /// Epoch the validator exits (or `u64::MAX` while active).
    pub exit_epoch: u64,
}

/// Participation statistics for one epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidatorParticipation {
    /// Epoch the statistics cover.
    pub epoch: u64,
    /// Fraction of eligible validators that performed their duties.
    pub global_participation_rate: f64,
    /// Gwei that voted.
    pub voted_ether: u64,
    /// Gwei eligible to vote.
    pub eligible_ether: u64,
}

/// Everything the node returns for one slot.
///
/// A slot with no proposal still yields a `BlockData` (with
/// `block_root: None`) so the exporter can record the miss.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockData {
    /// Slot of the response.
    pub slot: u64,
    /// Assigned proposer for the slot.
    pub proposer: u64,
    /// Root of the proposed block; `None` when no block was proposed.
    pub block_root: Option<B256>,
    /// Sync-committee participation in this slot: `validator -> signed`.
    pub sync_duties: BTreeMap<u64, bool>,
    /// Attestations included in this block: `validator -> attested slots`.
    pub attestation_duties: BTreeMap<u64, Vec<u64>>,
    /// Validator set snapshot; populated alongside `epoch_assignments`.
    pub validators: Vec<Validator>,
    /// Duty assignments for the whole epoch, on epoch-boundary responses.
    pub epoch_assignments: Option<EpochAssignments>,
}

impl BlockData {
    /// Whether a block was proposed at this slot.
    pub const fn has_block(&self) -> bool {
        self.block_root.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codec_round_trip() {
        for status in [
            SlotStatus::Scheduled,
            SlotStatus::Proposed,
            SlotStatus::Missed,
            SlotStatus::Orphaned,
        ] {
            assert_eq!(SlotStatus::from_db_str(status.as_db_str()), Some(status));
        }
    }

    #[test]
    fn test_status_codec_rejects_unknown() {
        assert_eq!(SlotStatus::from_db_str("4"), None);
        assert_eq!(SlotStatus::from_db_str(""), None);
    }

    #[test]
    fn test_assignment_key_parses() {
        let key: AssignmentKey = "161-3".parse().unwrap();
        assert_eq!(key.attested_slot, 161);
        assert_eq!(key.committee_index, 3);
    }

    #[test]
    fn test_assignment_key_rejects_malformed() {
        assert!("161".parse::<AssignmentKey>().is_err());
        assert!("x-3".parse::<AssignmentKey>().is_err());
        assert!("161-y".parse::<AssignmentKey>().is_err());
        assert!("".parse::<AssignmentKey>().is_err());
    }

    #[test]
    fn test_assignment_key_ordering_by_slot_first() {
        let a = AssignmentKey::new(10, 5);
        let b = AssignmentKey::new(11, 0);
        assert!(a < b);
    }

    #[test]
    fn test_block_data_has_block() {
        let mut block = BlockData { slot: 7, ..Default::default() };
        assert!(!block.has_block());

        block.block_root = Some(B256::repeat_byte(0xaa));
        assert!(block.has_block());
    }
}
