//! # csma_sim - Slotted CSMA Contention Simulator
//!
//! A discrete-event simulation of a family of Carrier-Sense Multiple Access
//! variants (non-persistent, 1-persistent, p-persistent) over a fixed
//! population of stations sharing one medium, run across synchronous time
//! slots and repeated over independent simulation runs.
//!
//! ## Core Components
//!
//! - **Node**: per-station transmit/back-off state machine with its counters
//! - **Medium**: the per-slot arbitration engine sensing the medium and
//!   resolving contention into transmissions and collisions
//! - **Backoff Policy**: variant-dependent reattempt scheduling plus the
//!   universal binary exponential collision recovery
//! - **TrafficGenerator**: probabilistic per-slot frame source
//! - **SimRunner**: drives the configured runs and aggregates metrics
//!
//! ## Usage
//!
//! ```no_run
//! use csma_sim::{SimConfig, SimRunner};
//!
//! let config = SimConfig::default();
//! config.validate().unwrap();
//!
//! let runner = SimRunner::new(config);
//! let report = runner.run();
//! report.log_overall();
//! ```
//!
//! Every random decision (traversal shuffle, frame generation, persistence
//! gate, back-off draw) comes from one seeded source per execution, so a run
//! is reproducible from the seed the report carries.
//!
//! The driver binary loads a YAML scenario file (see `scenarios/`) and prints
//! the per-run and cross-run metrics via the logger.

// Core simulation modules
pub mod csma_backoff;
pub mod csma_config;
pub mod csma_interface;
pub mod csma_medium;
pub mod csma_node;
pub mod csma_traffic;

// Surrounding plumbing: metrics aggregation and the multi-run driver
pub mod csma_metrics;
pub mod csma_runner;

// Re-export commonly used types
pub use csma_config::SimConfig;
pub use csma_interface::{
    ConfigError, CsmaType, Message, NodeAddress, NodeError, SimTime,
};
pub use csma_medium::Medium;
pub use csma_metrics::{NodeMetrics, RunReport, SimulationReport};
pub use csma_node::{medium_is_idle, Node, NodeState};
pub use csma_runner::SimRunner;
pub use csma_traffic::TrafficGenerator;
