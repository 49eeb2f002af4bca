//! Chain follower and slot/epoch exporter for a proof-of-stake beacon chain.
//!
//! The exporter continuously tails a consensus-layer node and materialises
//! per-slot and per-epoch artefacts into two durable stores: a relational
//! store for authoritative block metadata and epoch status, and a
//! wide-column store for bulk duty and balance time series. As the chain's
//! finalisation frontier advances, the local view is reconciled against the
//! node's — including missed slots, orphaned blocks and reorgs.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        beacon-exporter                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │   ┌──────────────┐        ┌──────────────────────────────┐      │
//! │   │  NodeClient  │◄───────│         SlotExporter         │      │
//! │   │  (rpc seam)  │        │                              │      │
//! │   └──────────────┘        │  run_tick:                   │      │
//! │                           │    gap back-fill             │      │
//! │   ┌──────────────┐        │    head catch-up             │      │
//! │   │   ChainDb    │◄───────│    finalisation / reorgs     │      │
//! │   │ (relational) │        │                              │      │
//! │   └──────────────┘        │  export_slot:                │      │
//! │                           │    epoch-boundary fan-out    │      │
//! │   ┌──────────────┐        │    per-slot duty writes      │      │
//! │   │  DutyStore   │◄───────│                              │      │
//! │   │(wide-column) │        └──────────────────────────────┘      │
//! │   └──────────────┘                                              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`config`]: chain configuration and epoch arithmetic
//! - [`primitives`]: chain types as seen by the exporter
//! - [`rpc`]: the node client seam
//! - [`storage`]: relational and wide-column store seams, in-memory impls
//! - [`exporter`]: the export pipeline and reconciliation tick
//!
//! # Usage
//!
//! ```ignore
//! use beacon_exporter::{ChainConfig, SlotExporter};
//! use std::sync::Arc;
//!
//! let exporter = SlotExporter::new(client, chain_db, duty_store, ChainConfig::default());
//!
//! // Either drive ticks yourself...
//! exporter.run_tick(true).await?;
//!
//! // ...or let the exporter tick on a fixed interval.
//! let (stop_tx, stop_rx) = tokio::sync::mpsc::channel(1);
//! exporter.run(std::time::Duration::from_secs(12), stop_rx).await;
//! ```

#![warn(unused_crate_dependencies)]

pub mod config;
pub mod exporter;
pub mod primitives;
pub mod rpc;
pub mod storage;

// Re-export configuration types
pub use config::{ChainConfig, DEFAULT_SLOTS_PER_EPOCH};

// Re-export the exporter entry points
pub use exporter::{ExportError, SlotExporter};

// Re-export chain primitives
pub use primitives::{
    AssignmentKey, AttestationDuties, BlockData, BlockHeader, ChainHead, EpochAssignments,
    ParseAssignmentKeyError, ProposerAssignments, SlotStatus, SyncDuties, Validator,
    ValidatorParticipation,
};

// Re-export the node client seam
pub use rpc::{NodeClient, RpcError};

// Re-export storage seams and the in-memory implementations
pub use storage::{
    ChainDb, DutyStore, EpochRecord, InMemoryChainDb, InMemoryDutyStore, SlotRecord, StoreError,
};
