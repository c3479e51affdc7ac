// Multi-run simulation driver.
//
// Each run gets a freshly created node population and executes its full slot
// count; nothing survives a run except the accumulated metrics totals.

use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::csma_config::SimConfig;
use crate::csma_medium::Medium;
use crate::csma_metrics::{NodeMetrics, RunReport, SimulationReport};
use crate::csma_node::Node;

/// Main simulation runner.
pub struct SimRunner {
    config: SimConfig,
    rng: StdRng,
    seed: u64,
}

impl SimRunner {
    /// Create a runner, seeding the random source from the configuration or,
    /// when no seed is configured, from the thread RNG.
    pub fn new(config: SimConfig) -> Self {
        let seed = config.seed.unwrap_or_else(|| rand::thread_rng().gen());
        let rng = StdRng::seed_from_u64(seed);

        Self { config, rng, seed }
    }

    /// The seed this runner draws from; echo it to replay the execution.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Execute every configured run and build the final report.
    pub fn run(mut self) -> SimulationReport {
        let medium = Medium::from_config(&self.config);

        let mut totals = vec![NodeMetrics::default(); self.config.node_count];
        let mut runs = Vec::with_capacity(self.config.simulation_count as usize);

        for sim_index in 0..self.config.simulation_count {
            info!("- simulation {} -", sim_index);

            // A fresh population every run; no node state crosses runs.
            let mut nodes: Vec<Node> = (0..self.config.node_count).map(Node::new).collect();

            for now in 0..self.config.time_slot_count {
                medium.run_slot(&mut nodes, now, &mut self.rng);
            }

            let node_metrics: Vec<NodeMetrics> =
                nodes.iter().map(|node| *node.metrics()).collect();
            for (total, run) in totals.iter_mut().zip(&node_metrics) {
                total.accumulate(run);
            }

            runs.push(RunReport {
                sim_index,
                node_metrics,
            });
        }

        SimulationReport {
            seed: self.seed,
            simulation_count: self.config.simulation_count,
            time_slot_count: self.config.time_slot_count,
            runs,
            totals,
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
