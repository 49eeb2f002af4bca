//! Storage seams for the two durable stores.
//!
//! The relational store ([`ChainDb`]) holds the authoritative per-slot and
//! per-epoch rows; the wide-column store ([`DutyStore`]) holds the bulk duty
//! and balance time series. Both are injected handles — the exporter holds
//! references and never allocates or owns the underlying connections.

use crate::primitives::{
    AttestationDuties, BlockData, ProposerAssignments, SlotStatus, SyncDuties, Validator,
    ValidatorParticipation,
};
use alloy_primitives::B256;
use async_trait::async_trait;

/// Error type for store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Attempt to overwrite a finalized slot row without the reorg flag.
    #[error("slot {0} is finalized and cannot be overwritten")]
    FinalizedSlotConflict(u64),

    /// Database error.
    #[error("database error: {0}")]
    Database(String),
}

/// One row of the slots table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRecord {
    /// Slot number.
    pub slot: u64,
    /// Root of the block recorded for the slot; `None` when no proposal was
    /// ever seen. On the wire this maps to the legacy short-sentinel root.
    pub block_root: Option<B256>,
    /// Lifecycle status.
    pub status: SlotStatus,
    /// Whether the row is finalized. Finalized rows never transition again.
    pub finalized: bool,
}

impl SlotRecord {
    /// Whether a proposal existed for this slot at some point.
    pub const fn has_block(&self) -> bool {
        self.block_root.is_some()
    }
}

/// One row of the epochs table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochRecord {
    /// Epoch number.
    pub epoch: u64,
    /// Size of the validator set snapshot.
    pub validator_count: u64,
    /// Sum of validator balances in Gwei.
    pub total_balance: u64,
    /// Average validator balance in Gwei.
    pub average_balance: u64,
    /// Global participation rate, filled in post-hoc once the epoch's
    /// statistics become available.
    pub global_participation_rate: Option<f64>,
}

/// Authoritative relational store: slot rows, epoch rows, validator table
/// and the derived deposit-queue cache.
#[async_trait]
pub trait ChainDb: Send + Sync {
    /// All slot rows, ordered ascending by slot. Used once per process start
    /// for gap detection.
    async fn all_slots(&self) -> Result<Vec<SlotRecord>, StoreError>;

    /// Highest slot with a row, or `None` when the store is empty.
    async fn last_slot(&self) -> Result<Option<u64>, StoreError>;

    /// All slot rows with `finalized = false`, ordered ascending by slot.
    async fn non_finalized_slots(&self) -> Result<Vec<SlotRecord>, StoreError>;

    /// Set the finalization flag and status of a slot row. Idempotent.
    async fn set_slot_finalization_and_status(
        &self,
        slot: u64,
        finalized: bool,
        status: SlotStatus,
    ) -> Result<(), StoreError>;

    /// Upsert the slot row for a block.
    ///
    /// Must reject overwriting a finalized row unless `reorg_overwrite` is
    /// set; the reorg rewrite path is the only caller that sets it.
    async fn save_block(&self, block: &BlockData, reorg_overwrite: bool)
        -> Result<(), StoreError>;

    /// Upsert the epoch row, computing aggregates from the validator
    /// snapshot. An existing participation rate is preserved.
    async fn save_epoch(&self, epoch: u64, validators: &[Validator]) -> Result<(), StoreError>;

    /// Fill the participation rate on an existing epoch row. No-op when the
    /// row does not exist yet.
    async fn update_epoch_status(
        &self,
        participation: &ValidatorParticipation,
    ) -> Result<(), StoreError>;

    /// Replace the validator table with the given snapshot.
    async fn save_validators(&self, epoch: u64, validators: &[Validator])
        -> Result<(), StoreError>;

    /// Refresh the derived deposit-queue cache. Idempotent.
    async fn update_queue_deposits(&self) -> Result<(), StoreError>;
}

/// Bulk wide-column store for duty and balance time series.
///
/// Every write is keyed so that repeating it with identical inputs is a
/// no-op; the exporter relies on this to retry slots safely.
#[async_trait]
pub trait DutyStore: Send + Sync {
    /// Merge attestation duties. Keys absent from `duties` are untouched;
    /// cells are keyed per `(attested_slot, validator, inclusion_slot)`, so
    /// inclusion lists grow and repeated writes are no-ops.
    async fn save_attestation_duties(&self, duties: &AttestationDuties) -> Result<(), StoreError>;

    /// Merge sync-committee duties. Keys absent from `duties` are untouched;
    /// present `(slot, validator)` cells are overwritten.
    async fn save_sync_committee_duties(&self, duties: &SyncDuties) -> Result<(), StoreError>;

    /// Overwrite the proposer assignments for an epoch.
    async fn save_proposal_assignments(
        &self,
        epoch: u64,
        assignments: &ProposerAssignments,
    ) -> Result<(), StoreError>;

    /// Overwrite the validator balances for an epoch.
    async fn save_validator_balances(
        &self,
        epoch: u64,
        validators: &[Validator],
    ) -> Result<(), StoreError>;

    /// Record the proposal (or miss) for a slot, keyed `(slot, proposer)`.
    async fn save_proposal(&self, block: &BlockData) -> Result<(), StoreError>;
}
