// Run configuration: the validated, immutable parameter set the engine
// consumes, plus YAML scenario loading for the driver binary.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::csma_interface::{
    ConfigError, CsmaType, SimTime, MAX_BACKOFF_EXPONENT_LIMIT, MAX_FRAME_LENGTH,
    MAX_NODE_COUNT, MAX_SIMULATION_COUNT, MAX_TIME_SLOT_COUNT, MIN_FRAME_LENGTH,
};

// ============================================================================
// Main Configuration
// ============================================================================

/// Complete parameter set for one execution.
///
/// Scenario files may omit any field; omitted fields take the defaults below.
/// Values are validated after load, never trusted from the file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimConfig {
    /// Per-slot decision tracing on or off
    pub verbose: bool,

    /// Independent simulation runs to average over
    pub simulation_count: u32,

    /// Slots per run
    pub time_slot_count: SimTime,

    /// CSMA persistence discipline
    pub protocol: CsmaType,

    /// Persistence probability p; consulted only by the p-persistent variant
    pub persistence_prob: f64,

    /// Stations on the medium
    pub node_count: usize,

    /// Per-node, per-slot frame generation probability
    pub frame_generation_prob: f64,

    /// Slots one frame occupies on the medium
    pub frame_length: u64,

    /// Cap on the binary exponential back-off exponent
    pub max_backoff_exponent: u32,

    /// Fixed seed for reproducible runs; drawn at startup when absent
    pub seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            simulation_count: 5,
            time_slot_count: 10_000,
            protocol: CsmaType::NonPersistent,
            persistence_prob: 1.0,
            node_count: 10,
            frame_generation_prob: 0.02,
            frame_length: 3,
            max_backoff_exponent: 10,
            seed: None,
        }
    }
}

impl SimConfig {
    /// Check every parameter against its documented range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.simulation_count < 1 || self.simulation_count > MAX_SIMULATION_COUNT {
            return Err(ConfigError::OutOfRange {
                field: "simulation_count",
                valid: "[1, 100]",
            });
        }

        if self.time_slot_count < 1 || self.time_slot_count > MAX_TIME_SLOT_COUNT {
            return Err(ConfigError::OutOfRange {
                field: "time_slot_count",
                valid: "[1, 2500000]",
            });
        }

        if self.node_count > MAX_NODE_COUNT {
            return Err(ConfigError::OutOfRange {
                field: "node_count",
                valid: "[0, 100]",
            });
        }

        if !(0.0..=1.0).contains(&self.persistence_prob) {
            return Err(ConfigError::OutOfRange {
                field: "persistence_prob",
                valid: "[0.0, 1.0]",
            });
        }

        if !(0.0..=1.0).contains(&self.frame_generation_prob) {
            return Err(ConfigError::OutOfRange {
                field: "frame_generation_prob",
                valid: "[0.0, 1.0]",
            });
        }

        if self.frame_length < MIN_FRAME_LENGTH || self.frame_length > MAX_FRAME_LENGTH {
            return Err(ConfigError::OutOfRange {
                field: "frame_length",
                valid: "[3, 20]",
            });
        }

        if self.max_backoff_exponent > MAX_BACKOFF_EXPONENT_LIMIT {
            return Err(ConfigError::OutOfRange {
                field: "max_backoff_exponent",
                valid: "[0, 1024]",
            });
        }

        Ok(())
    }

    /// Parse and validate a YAML scenario.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: SimConfig =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML scenario file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let yaml = fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_yaml_str(&yaml)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
