//! Reconciliation tick.
//!
//! One tick brings the stores up to the node's head and settles every
//! non-finalized row against the node's current view: finalization,
//! missed/orphaned resolution, reorg rewrites and late proposals.

use super::{ExportError, SlotExporter};
use crate::primitives::{BlockHeader, ChainHead, SlotStatus};
use crate::storage::SlotRecord;
use tracing::info;

/// What the finalization transition does to a non-finalized row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FinalizeAction {
    /// The node still has the block we recorded: finalize, keep the status.
    MarkProposed,
    /// Neither we nor the node ever saw a block: finalize as missed.
    MarkMissed,
    /// We recorded a block the node no longer has: finalize as orphaned.
    MarkOrphaned,
    /// The node has a different block than we recorded: finalize the old
    /// row as orphaned, then re-export the new canonical block.
    ReorgRewrite,
}

/// Decide the finalization transition for a row whose finality differs from
/// the node's.
fn finalization_action(record: &SlotRecord, header: Option<&BlockHeader>) -> FinalizeAction {
    match (header, record.block_root) {
        (Some(header), Some(root)) if header.root == root => FinalizeAction::MarkProposed,
        (None, None) => FinalizeAction::MarkMissed,
        (None, Some(_)) => FinalizeAction::MarkOrphaned,
        (Some(_), _) => FinalizeAction::ReorgRewrite,
    }
}

impl SlotExporter {
    /// Run one reconciliation tick.
    ///
    /// `first_run` must be `true` only for the process's first tick; it adds
    /// the gap back-fill over the full slots table. Every tick then catches
    /// up to the node's head and reconciles the non-finalized rows.
    pub async fn run_tick(&self, first_run: bool) -> Result<(), ExportError> {
        if first_run {
            self.backfill_gaps().await?;
        }

        // From here on the slots table is coherent and gap-free.
        let head = self.client.chain_head().await?;

        let last_db_slot = match self.chain_db.last_slot().await? {
            Some(slot) => slot,
            None => {
                info!(target: "exporter::reconcile", "Database is empty, exporting genesis slot");
                self.export_slot(0, self.config.epoch_of(0) == head.head_epoch).await?;
                0
            }
        };

        for slot in last_db_slot + 1..=head.head_slot {
            self.export_slot(slot, self.config.epoch_of(slot) == head.head_epoch).await?;
        }

        self.reconcile_non_finalized(&head).await
    }

    /// Export the slots missing between adjacent rows. Recovery path for
    /// holes left by prior crashes; steady-state ticks keep the table
    /// contiguous on their own.
    async fn backfill_gaps(&self) -> Result<(), ExportError> {
        let rows = self.chain_db.all_slots().await?;

        for pair in rows.windows(2) {
            let (previous, current) = (&pair[0], &pair[1]);
            if current.slot != previous.slot + 1 {
                info!(
                    target: "exporter::reconcile",
                    from = previous.slot,
                    to = current.slot,
                    "Slots between are missing, exporting them"
                );
                for slot in previous.slot + 1..current.slot {
                    self.export_slot(slot, false).await?;
                }
            }
        }
        Ok(())
    }

    /// Compare every non-finalized row against the node and settle it.
    async fn reconcile_non_finalized(&self, head: &ChainHead) -> Result<(), ExportError> {
        for record in self.chain_db.non_finalized_slots().await? {
            let header = self.client.block_header(record.slot).await?;
            // A finalized frontier still at 0 means nothing is finalized
            // yet.
            let node_final =
                head.finalized_slot > 0 && record.slot <= head.finalized_slot;

            if node_final != record.finalized {
                self.finalize_slot(&record, header.as_ref(), node_final, head).await?;

                // A finalized epoch-transition slot means the previous
                // epoch's statistics are now stable.
                if self.config.is_epoch_start(record.slot)
                    && record.slot > self.config.slots_per_epoch - 1
                {
                    let epoch = self.config.epoch_of(record.slot);
                    self.update_participation(epoch - 1).await?;
                }
            } else if !record.has_block() && header.is_some() {
                // A late proposal became visible in the meantime.
                info!(
                    target: "exporter::reconcile",
                    slot = record.slot,
                    "Late proposal detected, re-exporting slot"
                );
                self.export_slot(
                    record.slot,
                    self.config.epoch_of(record.slot) == head.head_epoch,
                )
                .await?;
            }
        }
        Ok(())
    }

    /// Apply the finalization transition to one row.
    async fn finalize_slot(
        &self,
        record: &SlotRecord,
        header: Option<&BlockHeader>,
        node_final: bool,
        head: &ChainHead,
    ) -> Result<(), ExportError> {
        let slot = record.slot;

        match finalization_action(record, header) {
            FinalizeAction::MarkProposed => {
                info!(target: "exporter::reconcile", slot, "Setting slot as finalized (proposed)");
                self.chain_db
                    .set_slot_finalization_and_status(slot, node_final, record.status)
                    .await?;
            }
            FinalizeAction::MarkMissed => {
                info!(target: "exporter::reconcile", slot, "Setting slot as finalized (missed)");
                self.chain_db
                    .set_slot_finalization_and_status(slot, node_final, SlotStatus::Missed)
                    .await?;
            }
            FinalizeAction::MarkOrphaned => {
                info!(target: "exporter::reconcile", slot, "Setting slot as finalized (orphaned)");
                self.chain_db
                    .set_slot_finalization_and_status(slot, node_final, SlotStatus::Orphaned)
                    .await?;
            }
            FinalizeAction::ReorgRewrite => {
                info!(
                    target: "exporter::reconcile",
                    slot,
                    "Setting slot as orphaned and exporting new canonical block"
                );
                self.chain_db
                    .set_slot_finalization_and_status(slot, node_final, SlotStatus::Orphaned)
                    .await?;
                self.export_slot_inner(
                    slot,
                    self.config.epoch_of(slot) == head.head_epoch,
                    true,
                )
                .await?;
            }
        }
        Ok(())
    }
}
