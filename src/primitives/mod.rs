//! Core types shared across the exporter.

mod chain;

pub use chain::{
    AssignmentKey, AttestationDuties, BlockData, BlockHeader, ChainHead, EpochAssignments,
    ParseAssignmentKeyError, ProposerAssignments, SlotStatus, SyncDuties, Validator,
    ValidatorParticipation,
};
