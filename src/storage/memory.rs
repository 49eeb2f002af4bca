//! In-memory store implementations.
//!
//! Simple implementations of [`ChainDb`] and [`DutyStore`] for testing and
//! development. Tables are `BTreeMap`s behind `RwLock`s; handles are cheap
//! to clone and share the same underlying tables.

use super::traits::{ChainDb, DutyStore, EpochRecord, SlotRecord, StoreError};
use crate::primitives::{
    AttestationDuties, BlockData, ProposerAssignments, SlotStatus, SyncDuties, Validator,
    ValidatorParticipation,
};
use alloy_primitives::B256;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::{collections::BTreeMap, sync::Arc};

/// In-memory relational store.
///
/// Enforces the same write rules a SQL implementation would: one row per
/// slot, finalized rows are terminal unless the reorg flag is set, epoch
/// upserts preserve an already-known participation rate.
#[derive(Debug, Default, Clone)]
pub struct InMemoryChainDb {
    /// Slot rows indexed by slot.
    slots: Arc<RwLock<BTreeMap<u64, SlotRecord>>>,
    /// Epoch rows indexed by epoch.
    epochs: Arc<RwLock<BTreeMap<u64, EpochRecord>>>,
    /// Latest validator snapshot: `(epoch, validators by index)`.
    validators: Arc<RwLock<Option<(u64, BTreeMap<u64, Validator>)>>>,
    /// Derived deposit-queue cache.
    queue_depth: Arc<RwLock<u64>>,
}

impl InMemoryChainDb {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the row for a slot.
    pub fn slot(&self, slot: u64) -> Option<SlotRecord> {
        self.slots.read().get(&slot).copied()
    }

    /// Get the row for an epoch.
    pub fn epoch(&self, epoch: u64) -> Option<EpochRecord> {
        self.epochs.read().get(&epoch).copied()
    }

    /// Number of slot rows.
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    /// Whether the store has no slot rows.
    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }

    /// Depth of the derived deposit queue.
    pub fn queue_depth(&self) -> u64 {
        *self.queue_depth.read()
    }

    /// Epoch of the latest validator snapshot, if one was saved.
    pub fn validators_epoch(&self) -> Option<u64> {
        self.validators.read().as_ref().map(|(epoch, _)| *epoch)
    }

    /// Clone of all tables, for content comparisons in tests.
    pub fn snapshot(&self) -> ChainDbSnapshot {
        ChainDbSnapshot {
            slots: self.slots.read().clone(),
            epochs: self.epochs.read().clone(),
            validators: self.validators.read().clone(),
            queue_depth: *self.queue_depth.read(),
        }
    }

    /// Seed a slot row directly, bypassing write rules. Test setup only.
    pub fn insert_slot_record(&self, record: SlotRecord) {
        self.slots.write().insert(record.slot, record);
    }
}

/// Point-in-time copy of an [`InMemoryChainDb`]'s tables.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainDbSnapshot {
    /// Slot rows.
    pub slots: BTreeMap<u64, SlotRecord>,
    /// Epoch rows.
    pub epochs: BTreeMap<u64, EpochRecord>,
    /// Latest validator snapshot.
    pub validators: Option<(u64, BTreeMap<u64, Validator>)>,
    /// Deposit-queue depth.
    pub queue_depth: u64,
}

#[async_trait]
impl ChainDb for InMemoryChainDb {
    async fn all_slots(&self) -> Result<Vec<SlotRecord>, StoreError> {
        Ok(self.slots.read().values().copied().collect())
    }

    async fn last_slot(&self) -> Result<Option<u64>, StoreError> {
        Ok(self.slots.read().keys().next_back().copied())
    }

    async fn non_finalized_slots(&self) -> Result<Vec<SlotRecord>, StoreError> {
        Ok(self.slots.read().values().filter(|r| !r.finalized).copied().collect())
    }

    async fn set_slot_finalization_and_status(
        &self,
        slot: u64,
        finalized: bool,
        status: SlotStatus,
    ) -> Result<(), StoreError> {
        let mut slots = self.slots.write();
        let Some(row) = slots.get_mut(&slot) else {
            return Ok(());
        };

        // Finalized rows are terminal; only the identical idempotent repeat
        // is accepted.
        if row.finalized && (!finalized || status != row.status) {
            return Err(StoreError::FinalizedSlotConflict(slot));
        }

        row.finalized = finalized;
        row.status = status;
        Ok(())
    }

    async fn save_block(
        &self,
        block: &BlockData,
        reorg_overwrite: bool,
    ) -> Result<(), StoreError> {
        let mut slots = self.slots.write();

        if let Some(existing) = slots.get(&block.slot) {
            if existing.finalized && !reorg_overwrite {
                return Err(StoreError::FinalizedSlotConflict(block.slot));
            }
        }

        let status =
            if block.has_block() { SlotStatus::Proposed } else { SlotStatus::Scheduled };
        slots.insert(
            block.slot,
            SlotRecord { slot: block.slot, block_root: block.block_root, status, finalized: false },
        );
        Ok(())
    }

    async fn save_epoch(&self, epoch: u64, validators: &[Validator]) -> Result<(), StoreError> {
        let mut epochs = self.epochs.write();

        let validator_count = validators.len() as u64;
        let total_balance: u64 = validators.iter().map(|v| v.balance).sum();
        let average_balance =
            if validator_count == 0 { 0 } else { total_balance / validator_count };
        let global_participation_rate =
            epochs.get(&epoch).and_then(|row| row.global_participation_rate);

        epochs.insert(
            epoch,
            EpochRecord {
                epoch,
                validator_count,
                total_balance,
                average_balance,
                global_participation_rate,
            },
        );
        Ok(())
    }

    async fn update_epoch_status(
        &self,
        participation: &ValidatorParticipation,
    ) -> Result<(), StoreError> {
        if let Some(row) = self.epochs.write().get_mut(&participation.epoch) {
            row.global_participation_rate = Some(participation.global_participation_rate);
        }
        Ok(())
    }

    async fn save_validators(
        &self,
        epoch: u64,
        validators: &[Validator],
    ) -> Result<(), StoreError> {
        let table = validators.iter().map(|v| (v.index, *v)).collect();
        *self.validators.write() = Some((epoch, table));
        Ok(())
    }

    async fn update_queue_deposits(&self) -> Result<(), StoreError> {
        let depth = match self.validators.read().as_ref() {
            Some((epoch, table)) => {
                table.values().filter(|v| v.activation_epoch > *epoch).count() as u64
            }
            None => 0,
        };
        *self.queue_depth.write() = depth;
        Ok(())
    }
}

/// In-memory wide-column store.
///
/// Cells mirror the row-key layout of the real store: duty cells keyed by
/// `(slot, validator)` (attestation inclusion lists additionally by
/// inclusion slot), assignments and balances by `(epoch, ...)`, proposals by
/// `(slot, proposer)`. Repeating any write with identical inputs leaves the
/// tables unchanged.
#[derive(Debug, Default, Clone)]
pub struct InMemoryDutyStore {
    /// `attested_slot -> validator -> sorted inclusion slots`.
    attestations: Arc<RwLock<AttestationDuties>>,
    /// `slot -> validator -> participated`.
    sync_duties: Arc<RwLock<SyncDuties>>,
    /// `epoch -> slot -> proposer`.
    assignments: Arc<RwLock<BTreeMap<u64, ProposerAssignments>>>,
    /// `epoch -> validator -> balance`.
    balances: Arc<RwLock<BTreeMap<u64, BTreeMap<u64, u64>>>>,
    /// `(slot, proposer) -> block root (None for a miss)`.
    proposals: Arc<RwLock<BTreeMap<(u64, u64), Option<B256>>>>,
}

impl InMemoryDutyStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inclusion slots recorded for `(attested_slot, validator)`.
    pub fn attestation_inclusions(&self, attested_slot: u64, validator: u64) -> Option<Vec<u64>> {
        self.attestations.read().get(&attested_slot).and_then(|m| m.get(&validator)).cloned()
    }

    /// Sync participation recorded for `(slot, validator)`.
    pub fn sync_participation(&self, slot: u64, validator: u64) -> Option<bool> {
        self.sync_duties.read().get(&slot).and_then(|m| m.get(&validator)).copied()
    }

    /// Proposer assignments recorded for an epoch.
    pub fn proposer_assignments(&self, epoch: u64) -> Option<ProposerAssignments> {
        self.assignments.read().get(&epoch).cloned()
    }

    /// Balance recorded for `(epoch, validator)`.
    pub fn balance(&self, epoch: u64, validator: u64) -> Option<u64> {
        self.balances.read().get(&epoch).and_then(|m| m.get(&validator)).copied()
    }

    /// Proposal recorded for `(slot, proposer)`.
    pub fn proposal(&self, slot: u64, proposer: u64) -> Option<Option<B256>> {
        self.proposals.read().get(&(slot, proposer)).copied()
    }

    /// Clone of all column families, for content comparisons in tests.
    pub fn snapshot(&self) -> DutyStoreSnapshot {
        DutyStoreSnapshot {
            attestations: self.attestations.read().clone(),
            sync_duties: self.sync_duties.read().clone(),
            assignments: self.assignments.read().clone(),
            balances: self.balances.read().clone(),
            proposals: self.proposals.read().clone(),
        }
    }
}

/// Point-in-time copy of an [`InMemoryDutyStore`]'s column families.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DutyStoreSnapshot {
    /// Attestation duty cells.
    pub attestations: AttestationDuties,
    /// Sync duty cells.
    pub sync_duties: SyncDuties,
    /// Proposer assignments.
    pub assignments: BTreeMap<u64, ProposerAssignments>,
    /// Validator balances.
    pub balances: BTreeMap<u64, BTreeMap<u64, u64>>,
    /// Proposals.
    pub proposals: BTreeMap<(u64, u64), Option<B256>>,
}

#[async_trait]
impl DutyStore for InMemoryDutyStore {
    async fn save_attestation_duties(
        &self,
        duties: &AttestationDuties,
    ) -> Result<(), StoreError> {
        let mut attestations = self.attestations.write();
        for (attested_slot, validators) in duties {
            let row = attestations.entry(*attested_slot).or_default();
            for (validator, inclusions) in validators {
                let cell = row.entry(*validator).or_default();
                for inclusion in inclusions {
                    if !cell.contains(inclusion) {
                        cell.push(*inclusion);
                    }
                }
                cell.sort_unstable();
            }
        }
        Ok(())
    }

    async fn save_sync_committee_duties(&self, duties: &SyncDuties) -> Result<(), StoreError> {
        let mut sync_duties = self.sync_duties.write();
        for (slot, validators) in duties {
            let row = sync_duties.entry(*slot).or_default();
            for (validator, participated) in validators {
                row.insert(*validator, *participated);
            }
        }
        Ok(())
    }

    async fn save_proposal_assignments(
        &self,
        epoch: u64,
        assignments: &ProposerAssignments,
    ) -> Result<(), StoreError> {
        self.assignments.write().insert(epoch, assignments.clone());
        Ok(())
    }

    async fn save_validator_balances(
        &self,
        epoch: u64,
        validators: &[Validator],
    ) -> Result<(), StoreError> {
        let row = validators.iter().map(|v| (v.index, v.balance)).collect();
        self.balances.write().insert(epoch, row);
        Ok(())
    }

    async fn save_proposal(&self, block: &BlockData) -> Result<(), StoreError> {
        self.proposals.write().insert((block.slot, block.proposer), block.block_root);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator(index: u64, balance: u64) -> Validator {
        Validator {
            index,
            balance,
            effective_balance: balance,
            activation_epoch: 0,
            exit_epoch: u64::MAX,
        }
    }

    fn proposed_block(slot: u64, root: B256) -> BlockData {
        BlockData { slot, proposer: 1, block_root: Some(root), ..Default::default() }
    }

    #[tokio::test]
    async fn test_save_block_sets_status_from_proposal() {
        let db = InMemoryChainDb::new();

        db.save_block(&proposed_block(5, B256::repeat_byte(0x05)), false).await.unwrap();
        assert_eq!(db.slot(5).unwrap().status, SlotStatus::Proposed);

        let missed = BlockData { slot: 6, proposer: 2, ..Default::default() };
        db.save_block(&missed, false).await.unwrap();
        let row = db.slot(6).unwrap();
        assert_eq!(row.status, SlotStatus::Scheduled);
        assert!(!row.has_block());
    }

    #[tokio::test]
    async fn test_save_block_rejects_finalized_overwrite() {
        let db = InMemoryChainDb::new();
        db.save_block(&proposed_block(5, B256::repeat_byte(0x05)), false).await.unwrap();
        db.set_slot_finalization_and_status(5, true, SlotStatus::Proposed).await.unwrap();

        let err = db
            .save_block(&proposed_block(5, B256::repeat_byte(0x06)), false)
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::FinalizedSlotConflict(5));

        // The reorg path may rewrite; the row re-enters the non-final set.
        db.save_block(&proposed_block(5, B256::repeat_byte(0x06)), true).await.unwrap();
        let row = db.slot(5).unwrap();
        assert_eq!(row.block_root, Some(B256::repeat_byte(0x06)));
        assert!(!row.finalized);
    }

    #[tokio::test]
    async fn test_finalization_is_terminal() {
        let db = InMemoryChainDb::new();
        db.save_block(&proposed_block(9, B256::repeat_byte(0x09)), false).await.unwrap();
        db.set_slot_finalization_and_status(9, true, SlotStatus::Proposed).await.unwrap();

        // Identical repeat is idempotent.
        db.set_slot_finalization_and_status(9, true, SlotStatus::Proposed).await.unwrap();

        // Any regression is rejected.
        let err = db
            .set_slot_finalization_and_status(9, false, SlotStatus::Proposed)
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::FinalizedSlotConflict(9));
    }

    #[tokio::test]
    async fn test_last_slot_distinguishes_empty() {
        let db = InMemoryChainDb::new();
        assert_eq!(db.last_slot().await.unwrap(), None);

        db.save_block(&proposed_block(3, B256::repeat_byte(0x03)), false).await.unwrap();
        db.save_block(&proposed_block(7, B256::repeat_byte(0x07)), false).await.unwrap();
        assert_eq!(db.last_slot().await.unwrap(), Some(7));
    }

    #[tokio::test]
    async fn test_save_epoch_preserves_participation() {
        let db = InMemoryChainDb::new();
        let validators = [validator(0, 32_000_000_000), validator(1, 31_000_000_000)];

        db.save_epoch(2, &validators).await.unwrap();
        db.update_epoch_status(&ValidatorParticipation {
            epoch: 2,
            global_participation_rate: 0.97,
            voted_ether: 61,
            eligible_ether: 63,
        })
        .await
        .unwrap();

        // Upserting again keeps the known rate.
        db.save_epoch(2, &validators).await.unwrap();
        let row = db.epoch(2).unwrap();
        assert_eq!(row.validator_count, 2);
        assert_eq!(row.total_balance, 63_000_000_000);
        assert_eq!(row.average_balance, 31_500_000_000);
        assert_eq!(row.global_participation_rate, Some(0.97));
    }

    #[tokio::test]
    async fn test_update_epoch_status_missing_row_is_noop() {
        let db = InMemoryChainDb::new();
        db.update_epoch_status(&ValidatorParticipation {
            epoch: 40,
            global_participation_rate: 0.5,
            voted_ether: 1,
            eligible_ether: 2,
        })
        .await
        .unwrap();
        assert_eq!(db.epoch(40), None);
    }

    #[tokio::test]
    async fn test_queue_deposits_counts_pending_activations() {
        let db = InMemoryChainDb::new();
        let mut queued = validator(2, 32_000_000_000);
        queued.activation_epoch = u64::MAX;

        db.save_validators(10, &[validator(0, 1), validator(1, 1), queued]).await.unwrap();
        db.update_queue_deposits().await.unwrap();
        assert_eq!(db.queue_depth(), 1);

        // Idempotent.
        db.update_queue_deposits().await.unwrap();
        assert_eq!(db.queue_depth(), 1);
    }

    #[tokio::test]
    async fn test_attestation_duties_merge_and_grow() {
        let store = InMemoryDutyStore::new();

        // Baseline: empty inclusion list.
        let mut baseline = AttestationDuties::new();
        baseline.entry(10).or_default().insert(7, vec![]);
        store.save_attestation_duties(&baseline).await.unwrap();
        assert_eq!(store.attestation_inclusions(10, 7), Some(vec![]));

        // First inclusion.
        let mut seen = AttestationDuties::new();
        seen.entry(10).or_default().insert(7, vec![12]);
        store.save_attestation_duties(&seen).await.unwrap();
        assert_eq!(store.attestation_inclusions(10, 7), Some(vec![12]));

        // A later inclusion grows the list; re-writing the baseline does not
        // clear it.
        let mut later = AttestationDuties::new();
        later.entry(10).or_default().insert(7, vec![13]);
        store.save_attestation_duties(&later).await.unwrap();
        store.save_attestation_duties(&baseline).await.unwrap();
        assert_eq!(store.attestation_inclusions(10, 7), Some(vec![12, 13]));

        // Repeating an inclusion is a no-op.
        store.save_attestation_duties(&seen).await.unwrap();
        assert_eq!(store.attestation_inclusions(10, 7), Some(vec![12, 13]));
    }

    #[tokio::test]
    async fn test_sync_duties_overwrite_per_cell() {
        let store = InMemoryDutyStore::new();

        let mut baseline = SyncDuties::new();
        baseline.entry(4).or_default().insert(1, false);
        baseline.entry(4).or_default().insert(2, false);
        store.save_sync_committee_duties(&baseline).await.unwrap();

        let mut actual = SyncDuties::new();
        actual.entry(4).or_default().insert(1, true);
        store.save_sync_committee_duties(&actual).await.unwrap();

        // Present cell overwritten, absent cell untouched.
        assert_eq!(store.sync_participation(4, 1), Some(true));
        assert_eq!(store.sync_participation(4, 2), Some(false));
    }

    #[tokio::test]
    async fn test_idempotent_writes_leave_snapshot_unchanged() {
        let store = InMemoryDutyStore::new();
        let block = proposed_block(8, B256::repeat_byte(0x08));

        let mut assignments = ProposerAssignments::new();
        assignments.insert(8, 1);

        store.save_proposal_assignments(0, &assignments).await.unwrap();
        store.save_validator_balances(0, &[validator(1, 42)]).await.unwrap();
        store.save_proposal(&block).await.unwrap();
        let before = store.snapshot();

        store.save_proposal_assignments(0, &assignments).await.unwrap();
        store.save_validator_balances(0, &[validator(1, 42)]).await.unwrap();
        store.save_proposal(&block).await.unwrap();
        assert_eq!(store.snapshot(), before);
    }
}
