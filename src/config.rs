//! Chain configuration.
//!
//! The exporter reads a single piece of chain configuration: the number of
//! slots per epoch. Everything else (endpoints, credentials, schedules) is
//! owned by the process that wires the exporter up.

use serde::{Deserialize, Serialize};

/// Default slots per epoch on mainnet-like networks.
pub const DEFAULT_SLOTS_PER_EPOCH: u64 = 32;

/// Consensus-layer chain configuration.
///
/// `slots_per_epoch` must be a positive integer; [`ChainConfig::default`]
/// uses the conventional 32.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Number of consecutive slots in one epoch.
    pub slots_per_epoch: u64,
}

impl ChainConfig {
    /// Create a new chain configuration.
    pub const fn new(slots_per_epoch: u64) -> Self {
        Self { slots_per_epoch }
    }

    /// Epoch containing the given slot.
    pub const fn epoch_of(&self, slot: u64) -> u64 {
        slot / self.slots_per_epoch
    }

    /// First slot of the given epoch.
    pub const fn epoch_start_slot(&self, epoch: u64) -> u64 {
        epoch * self.slots_per_epoch
    }

    /// Last slot of the given epoch.
    pub const fn epoch_end_slot(&self, epoch: u64) -> u64 {
        (epoch + 1) * self.slots_per_epoch - 1
    }

    /// Whether the slot is the first slot of its epoch.
    pub const fn is_epoch_start(&self, slot: u64) -> bool {
        slot % self.slots_per_epoch == 0
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self { slots_per_epoch: DEFAULT_SLOTS_PER_EPOCH }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_of() {
        let config = ChainConfig::default();

        assert_eq!(config.epoch_of(0), 0);
        assert_eq!(config.epoch_of(31), 0);
        assert_eq!(config.epoch_of(32), 1);
        assert_eq!(config.epoch_of(95), 2);
    }

    #[test]
    fn test_epoch_bounds() {
        let config = ChainConfig::new(32);

        assert_eq!(config.epoch_start_slot(0), 0);
        assert_eq!(config.epoch_end_slot(0), 31);
        assert_eq!(config.epoch_start_slot(3), 96);
        assert_eq!(config.epoch_end_slot(3), 127);
    }

    #[test]
    fn test_is_epoch_start() {
        let config = ChainConfig::new(8);

        assert!(config.is_epoch_start(0));
        assert!(config.is_epoch_start(16));
        assert!(!config.is_epoch_start(17));
    }

    #[test]
    fn test_config_deserializes() {
        let config: ChainConfig = serde_json::from_str(r#"{"slots_per_epoch":64}"#).unwrap();
        assert_eq!(config.slots_per_epoch, 64);
    }
}
