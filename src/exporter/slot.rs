//! Per-slot export.
//!
//! `export_slot` fetches one slot from the node and persists it. The first
//! slot of an epoch additionally carries the epoch's duty assignments and a
//! validator snapshot; those fan out to the stores in parallel before any
//! per-slot write happens.

use super::{ExportError, SlotExporter};
use crate::primitives::{AttestationDuties, BlockData, EpochAssignments, SyncDuties};
use crate::ChainConfig;
use futures::future::{try_join_all, BoxFuture};
use std::time::Instant;
use tracing::{error, info, warn};

impl SlotExporter {
    /// Fetch one slot from the node and persist it.
    ///
    /// `is_head_epoch` marks slots of the node's current head epoch; only
    /// those refresh the validator table and the deposit-queue cache.
    pub async fn export_slot(&self, slot: u64, is_head_epoch: bool) -> Result<(), ExportError> {
        self.export_slot_inner(slot, is_head_epoch, false).await
    }

    /// Export with control over the finalized-row overwrite flag; the reorg
    /// rewrite path is the only caller that sets it.
    pub(crate) async fn export_slot_inner(
        &self,
        slot: u64,
        is_head_epoch: bool,
        reorg_overwrite: bool,
    ) -> Result<(), ExportError> {
        info!(target: "exporter::slot", slot, "Exporting slot");
        let start = Instant::now();

        // The first slot of an epoch also carries the duties for the whole
        // epoch.
        let block = self.client.block_by_slot(slot).await?;

        if let Some(assignments) = &block.epoch_assignments {
            self.export_epoch_boundary(&block, assignments, is_head_epoch).await?;
        }

        // Per-slot duties: actual sync participation and the attestations
        // this block included.
        let sync_duties = slot_sync_duties(&block);
        let att_duties = slot_attestation_inclusions(&block);

        self.duty_store.save_attestation_duties(&att_duties).await?;
        self.duty_store.save_sync_committee_duties(&sync_duties).await?;
        self.duty_store.save_proposal(&block).await?;

        // The slot row is written last: if it fails, the row stays absent
        // and the next tick re-exports; the duty writes above absorb the
        // retry through their keyed idempotence.
        if let Err(err) = self.chain_db.save_block(&block, reorg_overwrite).await {
            error!(target: "exporter::slot", slot, %err, "Failed to save slot row");
        }

        info!(
            target: "exporter::slot",
            slot,
            block_root = ?block.block_root,
            elapsed = ?start.elapsed(),
            "Slot export complete"
        );
        Ok(())
    }

    /// Export the epoch-boundary artefacts carried by `block`.
    async fn export_epoch_boundary(
        &self,
        block: &BlockData,
        assignments: &EpochAssignments,
        is_head_epoch: bool,
    ) -> Result<(), ExportError> {
        let epoch = self.config.epoch_of(block.slot);
        info!(target: "exporter::slot", epoch, "Exporting duties and balances for epoch");

        let sync_baseline = epoch_sync_duty_baseline(assignments, epoch, &self.config);
        let att_baseline = epoch_attestation_baseline(assignments);

        // Fan out the bulk writes; first error wins and aborts the slot.
        let mut writes: Vec<BoxFuture<'_, Result<(), ExportError>>> = vec![
            Box::pin(async {
                Ok(self.duty_store.save_attestation_duties(&att_baseline).await?)
            }),
            Box::pin(async {
                Ok(self.duty_store.save_sync_committee_duties(&sync_baseline).await?)
            }),
            Box::pin(async {
                Ok(self.duty_store.save_proposal_assignments(epoch, &assignments.proposers).await?)
            }),
            Box::pin(async {
                Ok(self.duty_store.save_validator_balances(epoch, &block.validators).await?)
            }),
        ];
        if is_head_epoch {
            writes.push(Box::pin(async {
                self.chain_db.save_validators(epoch, &block.validators).await?;
                // The deposit-queue cache refreshes together with the
                // validator table, once per head epoch.
                Ok(self.chain_db.update_queue_deposits().await?)
            }));
        }
        try_join_all(writes).await?;

        // The epoch row goes in only after every bulk write landed.
        self.chain_db.save_epoch(epoch, &block.validators).await?;

        // The previous epoch's statistics are complete by now.
        if epoch > 0 {
            self.update_participation(epoch - 1).await?;
        }

        Ok(())
    }

    /// Fetch participation statistics for `epoch` and fill them into the
    /// epoch row. The fetch is best-effort; a store failure propagates.
    pub(crate) async fn update_participation(&self, epoch: u64) -> Result<(), ExportError> {
        match self.client.validator_participation(epoch).await {
            Ok(participation) => {
                info!(
                    target: "exporter::slot",
                    epoch,
                    rate = participation.global_participation_rate,
                    "Updating epoch participation rate"
                );
                Ok(self.chain_db.update_epoch_status(&participation).await?)
            }
            Err(err) => {
                warn!(target: "exporter::slot", epoch, %err, "Failed to fetch participation statistics");
                Ok(())
            }
        }
    }
}

/// Baseline sync duties for an epoch: every assigned validator starts out
/// not-participated for every slot of the epoch. Per-slot exports merge the
/// actual participation on top.
fn epoch_sync_duty_baseline(
    assignments: &EpochAssignments,
    epoch: u64,
    config: &ChainConfig,
) -> SyncDuties {
    let mut duties = SyncDuties::new();
    for slot in config.epoch_start_slot(epoch)..=config.epoch_end_slot(epoch) {
        let row = duties.entry(slot).or_default();
        for validator in &assignments.sync_committee {
            row.insert(*validator, false);
        }
    }
    duties
}

/// Baseline attestation duties for an epoch: an empty inclusion list per
/// assigned `(attested_slot, validator)` pair.
fn epoch_attestation_baseline(assignments: &EpochAssignments) -> AttestationDuties {
    let mut duties = AttestationDuties::new();
    for (key, validator) in &assignments.attestors {
        duties.entry(key.attested_slot).or_default().insert(*validator, Vec::new());
    }
    duties
}

/// Sync participation observed in this block, keyed under the block's slot.
fn slot_sync_duties(block: &BlockData) -> SyncDuties {
    let mut duties = SyncDuties::new();
    duties.insert(block.slot, block.sync_duties.clone());
    duties
}

/// Attestation inclusions observed in this block. The recorded inclusion
/// slot is the block's slot, not the attested slot.
fn slot_attestation_inclusions(block: &BlockData) -> AttestationDuties {
    let mut duties = AttestationDuties::new();
    for (validator, attested_slots) in &block.attestation_duties {
        for attested_slot in attested_slots {
            duties
                .entry(*attested_slot)
                .or_default()
                .entry(*validator)
                .or_default()
                .push(block.slot);
        }
    }
    duties
}
