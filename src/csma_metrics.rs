// Per-node counters and cross-run aggregation.
//
// Each node owns one `NodeMetrics`; the arbitration engine mutates it through
// the node. At the end of a run the counters are snapshotted into a
// `RunReport`, and the runner delta-accumulates snapshots into a totals vector
// that lives for the whole execution.

use log::info;

use crate::csma_interface::SimTime;

// ============================================================================
// Per-Node Counters
// ============================================================================

/// Counters for a single station, reset with the population at run start.
///
/// Every slot a node accounts exactly one of `idle_slots` or
/// `transmitting_slots`; `backed_off_slots` additionally counts the idle slots
/// the node ended in the backed-off state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeMetrics {
    /// Slots spent not transmitting (including backed-off slots)
    pub idle_slots: u64,

    /// Slots spent waiting out a back-off
    pub backed_off_slots: u64,

    /// Slots spent occupying the medium
    pub transmitting_slots: u64,

    /// Frames generated by the traffic source
    pub messages_generated: u64,

    /// Frames fully transmitted
    pub messages_transmitted: u64,

    /// Transmission attempts, successful or not
    pub transmission_attempts: u64,

    /// Attempts that ended in a collision
    pub collisions: u64,

    /// Slots transmitted frames spent between creation and completed transmit
    pub slots_waited: u64,

    /// Largest consecutive-retry streak seen before any one frame was sent
    pub max_consecutive_retries: u32,
}

impl NodeMetrics {
    /// Raise the retry high-water mark if the streak exceeds it.
    pub fn record_retries(&mut self, retries: u32) {
        if retries > self.max_consecutive_retries {
            self.max_consecutive_retries = retries;
        }
    }

    /// Fold one run's counters into a cross-run total.
    ///
    /// All fields are summed, `max_consecutive_retries` included; the summary
    /// report divides by the run count, so the retry line reads as a mean of
    /// per-run maxima.
    pub fn accumulate(&mut self, other: &NodeMetrics) {
        self.idle_slots += other.idle_slots;
        self.backed_off_slots += other.backed_off_slots;
        self.transmitting_slots += other.transmitting_slots;
        self.messages_generated += other.messages_generated;
        self.messages_transmitted += other.messages_transmitted;
        self.transmission_attempts += other.transmission_attempts;
        self.collisions += other.collisions;
        self.slots_waited += other.slots_waited;
        self.max_consecutive_retries += other.max_consecutive_retries;
    }
}

// ============================================================================
// Reports
// ============================================================================

/// Counter snapshot of every node at the end of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub sim_index: u32,
    pub node_metrics: Vec<NodeMetrics>,
}

impl RunReport {
    /// Log this run's raw per-node counters.
    pub fn log(&self) {
        info!("[sim {} node metrics]", self.sim_index);
        for (address, m) in self.node_metrics.iter().enumerate() {
            info!("   [node {}]", address);
            info!("      time slots idle: {}", m.idle_slots);
            info!("      time slots backed off: {}", m.backed_off_slots);
            info!("      time slots transmitting: {}", m.transmitting_slots);
            info!("      messages generated: {}", m.messages_generated);
            info!("      transmissions attempted: {}", m.transmission_attempts);
            info!("      collisions occurred: {}", m.collisions);
            info!("      messages transmitted: {}", m.messages_transmitted);
            info!("      time slots messages spent waiting: {}", m.slots_waited);
            info!(
                "      maximum retransmission attempts: {}",
                m.max_consecutive_retries
            );
        }
    }
}

/// Result of a full execution: one report per run plus cross-run totals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationReport {
    /// Seed the run sequence was derived from, echoed so runs can be replayed
    pub seed: u64,
    pub simulation_count: u32,
    pub time_slot_count: SimTime,
    pub runs: Vec<RunReport>,
    /// Per-node counters summed over every run
    pub totals: Vec<NodeMetrics>,
}

impl SimulationReport {
    /// Log per-node averages over all runs, with the derived ratios.
    pub fn log_overall(&self) {
        let sims = self.simulation_count.max(1) as f64;
        let slots = self.time_slot_count.max(1) as f64;

        info!(
            "[averages over {} simulations of {} timeslots]",
            self.simulation_count, self.time_slot_count
        );

        for (address, total) in self.totals.iter().enumerate() {
            info!("   [node {}]", address);

            let idle = total.idle_slots as f64 / sims;
            info!(
                "     time slots idle: {:.2} ({:.4} of clock cycles)",
                idle,
                idle / slots
            );

            let backed_off = total.backed_off_slots as f64 / sims;
            info!(
                "     time slots backed off: {:.2} ({:.4} of clock cycles)",
                backed_off,
                backed_off / slots
            );

            let transmitting = total.transmitting_slots as f64 / sims;
            info!(
                "     time slots transmitting: {:.2} ({:.4} of clock cycles)",
                transmitting,
                transmitting / slots
            );

            let generated = total.messages_generated as f64 / sims;
            info!(
                "     messages generated: {:.2} ({:.4} of clock cycles)",
                generated,
                generated / slots
            );

            let attempts = total.transmission_attempts as f64 / sims;
            info!("     transmission attempts: {:.2}", attempts);

            let collisions = total.collisions as f64 / sims;
            info!(
                "     collisions: {:.2} ({:.4} of transmission attempts)",
                collisions,
                ratio(collisions, attempts)
            );

            let transmitted = total.messages_transmitted as f64 / sims;
            info!(
                "     messages transmitted: {:.2} ({:.4} of messages generated)",
                transmitted,
                ratio(transmitted, generated)
            );

            let waited = total.slots_waited as f64 / sims;
            info!(
                "     time slots messages waited: {:.2} ({:.2} per message transmitted)",
                waited,
                ratio(waited, transmitted)
            );

            info!(
                "     maximum retransmissions required before any one message was sent: {:.1}",
                total.max_consecutive_retries as f64 / sims
            );
        }

        // Network-wide view: at most one node occupies the medium per slot, so
        // the summed transmitting slots over the configured slots is channel
        // utilization.
        let all_transmitting: u64 = self.totals.iter().map(|m| m.transmitting_slots).sum();
        let all_transmitted: u64 = self.totals.iter().map(|m| m.messages_transmitted).sum();
        let all_collisions: u64 = self.totals.iter().map(|m| m.collisions).sum();
        info!(
            "[network] utilization: {:.4}, messages transmitted: {}, collisions: {}",
            all_transmitting as f64 / (slots * sims),
            all_transmitted,
            all_collisions
        );
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
