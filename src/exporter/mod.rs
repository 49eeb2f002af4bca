//! Slot export pipeline and reconciliation tick.
//!
//! The exporter tails the consensus node and keeps the two stores a faithful
//! projection of the canonical chain:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                       SlotExporter                         │
//! │                                                            │
//! │  run_tick ──► gap back-fill ──► head catch-up ──► reconcile│
//! │                     │                │               │     │
//! │                     └──── export_slot ────┘          │     │
//! │                              │                       │     │
//! │              ┌───────────────┼────────────────┐      │     │
//! │              ▼               ▼                ▼      ▼     │
//! │        ┌──────────┐    ┌──────────┐    ┌───────────────┐   │
//! │        │NodeClient│    │ DutyStore│    │    ChainDb    │   │
//! │        │   (C1)   │    │   (C3)   │    │     (C2)      │   │
//! │        └──────────┘    └──────────┘    └───────────────┘   │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Slots are exported strictly in order; the epoch-boundary fan-out inside a
//! single slot is the only parallelism.

mod reconcile;
mod slot;

use crate::{
    config::ChainConfig,
    rpc::{NodeClient, RpcError},
    storage::{ChainDb, DutyStore, StoreError},
};
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Error type for export and reconciliation operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExportError {
    /// Node client error.
    #[error("rpc error: {0}")]
    Rpc(#[from] RpcError),

    /// Store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Chain follower exporting per-slot and per-epoch artefacts.
///
/// Holds injected store and client handles; all durable state lives behind
/// them, so a restarted exporter resumes from whatever the stores contain.
pub struct SlotExporter {
    client: Arc<dyn NodeClient>,
    chain_db: Arc<dyn ChainDb>,
    duty_store: Arc<dyn DutyStore>,
    config: ChainConfig,
}

impl SlotExporter {
    /// Create a new exporter over the given handles.
    pub fn new(
        client: Arc<dyn NodeClient>,
        chain_db: Arc<dyn ChainDb>,
        duty_store: Arc<dyn DutyStore>,
        config: ChainConfig,
    ) -> Self {
        Self { client, chain_db, duty_store, config }
    }

    /// The chain configuration the exporter runs with.
    pub const fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Run ticks on a fixed interval until a stop command arrives (or the
    /// stop channel closes).
    ///
    /// A failed tick is logged and retried on the next interval; the first
    /// tick runs the gap back-fill and is retried as a first run until it
    /// succeeds once.
    pub async fn run(&self, interval: Duration, mut stop_rx: mpsc::Receiver<()>) {
        info!(target: "exporter", ?interval, "Starting slot exporter");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut first_run = true;

        loop {
            tokio::select! {
                biased;

                _ = stop_rx.recv() => {
                    info!(target: "exporter", "Stopping slot exporter");
                    return;
                }

                _ = ticker.tick() => {
                    match self.run_tick(first_run).await {
                        Ok(()) => first_run = false,
                        Err(err) => {
                            warn!(target: "exporter", %err, "Tick failed, retrying on next interval");
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted node client and fixture builders shared by the exporter
    //! tests.

    use crate::primitives::{
        AssignmentKey, BlockData, BlockHeader, ChainHead, EpochAssignments, Validator,
        ValidatorParticipation,
    };
    use crate::rpc::{NodeClient, RpcError};
    use crate::ChainConfig;
    use alloy_primitives::B256;
    use async_trait::async_trait;
    use parking_lot::RwLock;
    use std::collections::BTreeMap;

    /// Node client returning scripted responses.
    ///
    /// Unscripted slots answer `block_by_slot` with a synthetic miss (the
    /// node always has *something* to say about a slot); unscripted headers
    /// answer `None`; unscripted participation answers a transient error so
    /// tests exercise the best-effort path by default.
    #[derive(Default)]
    pub(crate) struct ScriptedNode {
        pub head: RwLock<ChainHead>,
        pub blocks: RwLock<BTreeMap<u64, BlockData>>,
        pub headers: RwLock<BTreeMap<u64, BlockHeader>>,
        pub participation: RwLock<BTreeMap<u64, ValidatorParticipation>>,
    }

    impl ScriptedNode {
        pub(crate) fn with_head(head: ChainHead) -> Self {
            Self { head: RwLock::new(head), ..Default::default() }
        }

        pub(crate) fn put_block(&self, block: BlockData) {
            self.blocks.write().insert(block.slot, block);
        }

        pub(crate) fn put_header(&self, header: BlockHeader) {
            self.headers.write().insert(header.slot, header);
        }

        pub(crate) fn put_participation(&self, participation: ValidatorParticipation) {
            self.participation.write().insert(participation.epoch, participation);
        }
    }

    #[async_trait]
    impl NodeClient for ScriptedNode {
        async fn chain_head(&self) -> Result<ChainHead, RpcError> {
            Ok(*self.head.read())
        }

        async fn block_by_slot(&self, slot: u64) -> Result<BlockData, RpcError> {
            Ok(self
                .blocks
                .read()
                .get(&slot)
                .cloned()
                .unwrap_or_else(|| BlockData { slot, ..Default::default() }))
        }

        async fn block_header(&self, slot: u64) -> Result<Option<BlockHeader>, RpcError> {
            Ok(self.headers.read().get(&slot).copied())
        }

        async fn validator_participation(
            &self,
            epoch: u64,
        ) -> Result<ValidatorParticipation, RpcError> {
            self.participation
                .read()
                .get(&epoch)
                .copied()
                .ok_or_else(|| RpcError::Transient(format!("no participation for epoch {epoch}")))
        }
    }

    pub(crate) fn validator(index: u64, balance: u64) -> Validator {
        Validator {
            index,
            balance,
            effective_balance: balance,
            activation_epoch: 0,
            exit_epoch: u64::MAX,
        }
    }

    /// A proposed block with the given root and no epoch assignments.
    pub(crate) fn proposed_block(slot: u64, root: B256) -> BlockData {
        BlockData { slot, proposer: slot % 7, block_root: Some(root), ..Default::default() }
    }

    /// Epoch assignments covering every slot of `epoch`: a two-validator
    /// sync committee, one attestor duty per slot, round-robin proposers.
    pub(crate) fn assignments_for_epoch(config: &ChainConfig, epoch: u64) -> EpochAssignments {
        let mut assignments = EpochAssignments {
            sync_committee: vec![1, 2],
            ..Default::default()
        };
        for slot in config.epoch_start_slot(epoch)..=config.epoch_end_slot(epoch) {
            assignments.proposers.insert(slot, slot % 7);
            assignments.attestors.insert(AssignmentKey::new(slot, 0), 100 + slot % 5);
        }
        assignments
    }

    /// A proposed epoch-boundary block carrying assignments and validators.
    pub(crate) fn boundary_block(config: &ChainConfig, epoch: u64, root: B256) -> BlockData {
        let slot = config.epoch_start_slot(epoch);
        BlockData {
            slot,
            proposer: slot % 7,
            block_root: Some(root),
            validators: vec![validator(1, 32_000_000_000), validator(2, 31_000_000_000)],
            epoch_assignments: Some(assignments_for_epoch(config, epoch)),
            ..Default::default()
        }
    }
}
