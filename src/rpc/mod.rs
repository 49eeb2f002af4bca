//! Read-only client seam for the consensus node.
//!
//! The exporter talks to the beacon node through [`NodeClient`] and nothing
//! else. Transport implementations (HTTP, gRPC, test doubles) live outside
//! this crate; the core never retries on its own — a failed call surfaces to
//! the tick driver, which re-invokes on its schedule.

use crate::primitives::{BlockData, BlockHeader, ChainHead, ValidatorParticipation};
use async_trait::async_trait;

/// Errors a node client can return.
///
/// `Transient` failures are worth retrying on the next tick; `Permanent`
/// failures indicate a request the node will never answer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RpcError {
    /// Network hiccup, timeout, node momentarily unavailable.
    #[error("transient rpc failure: {0}")]
    Transient(String),

    /// The node rejected the request or violated the client contract.
    #[error("permanent rpc failure: {0}")]
    Permanent(String),
}

/// Typed read-only view of the beacon node.
///
/// Implementations must be safe to share across the exporter's concurrent
/// write fan-out.
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Get the node's current chain frontier.
    async fn chain_head(&self) -> Result<ChainHead, RpcError>;

    /// Get everything the node knows about one slot.
    ///
    /// The first slot of an epoch the node serves also carries the epoch's
    /// duty assignments and a validator snapshot.
    async fn block_by_slot(&self, slot: u64) -> Result<BlockData, RpcError>;

    /// Get the canonical block header at a slot.
    ///
    /// Returns `None` when the node has no canonical block there.
    async fn block_header(&self, slot: u64) -> Result<Option<BlockHeader>, RpcError>;

    /// Get participation statistics for an epoch.
    async fn validator_participation(
        &self,
        epoch: u64,
    ) -> Result<ValidatorParticipation, RpcError>;
}
