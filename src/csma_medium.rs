// The per-slot arbitration engine.
//
// Each slot runs four passes in a fixed order: completions, traffic
// generation, contention, and candidate resolution. The ordering is
// load-bearing: a transmission that finishes in slot `now` frees the medium
// before any node senses it, and a collision is decided by the final
// candidate set of the whole contention pass, never by traversal order.

use log::{trace, warn};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::csma_backoff::{collision_backoff, medium_busy_backoff};
use crate::csma_config::SimConfig;
use crate::csma_interface::{CsmaType, SimTime};
use crate::csma_node::{medium_is_idle, Node, NodeState};
use crate::csma_traffic::TrafficGenerator;

// ============================================================================
// Medium Arbitration Engine
// ============================================================================

/// Drives one population of nodes through time slots.
///
/// Holds only run parameters; all mutable simulation state lives in the node
/// slice, so the engine can be shared across runs.
pub struct Medium {
    csma: CsmaType,
    persistence_prob: f64,
    max_backoff_exponent: u32,
    traffic: TrafficGenerator,
}

impl Medium {
    pub fn new(
        csma: CsmaType,
        persistence_prob: f64,
        max_backoff_exponent: u32,
        traffic: TrafficGenerator,
    ) -> Self {
        Self {
            csma,
            persistence_prob,
            max_backoff_exponent,
            traffic,
        }
    }

    pub fn from_config(config: &SimConfig) -> Self {
        Self::new(
            config.protocol,
            config.persistence_prob,
            config.max_backoff_exponent,
            TrafficGenerator::new(config.frame_generation_prob, config.frame_length),
        )
    }

    /// Run one slot over a freshly shuffled traversal order.
    ///
    /// The order is drawn anew every slot so low addresses get no standing
    /// service priority.
    pub fn run_slot(&self, nodes: &mut [Node], now: SimTime, rng: &mut impl Rng) {
        let mut order: Vec<usize> = (0..nodes.len()).collect();
        order.shuffle(rng);
        self.run_slot_with_order(nodes, now, &order, rng);
    }

    /// Run one slot visiting nodes in the given order. The order decides only
    /// the traversal (and therefore the random stream), not who wins
    /// contention; tests inject a fixed permutation here.
    pub fn run_slot_with_order(
        &self,
        nodes: &mut [Node],
        now: SimTime,
        order: &[usize],
        rng: &mut impl Rng,
    ) {
        trace!("---- timeIndex: {} ----", now);

        self.completion_pass(nodes, now, order);
        self.traffic.generation_pass(nodes, now, order, rng);
        let candidates = self.contention_pass(nodes, now, order, rng);
        self.resolve(nodes, now, &candidates, rng);
    }

    /// Finish every transmission whose completion slot is `now`.
    fn completion_pass(&self, nodes: &mut [Node], now: SimTime, order: &[usize]) {
        for &index in order {
            let node = &mut nodes[index];
            if node.state() == NodeState::Transmitting
                && node.transmit_completion_time() == Some(now)
            {
                if let Err(e) = node.complete_transmit(now) {
                    warn!(
                        "failed to complete message transmit for node {}: {:?}",
                        node.address(),
                        e
                    );
                }
            }
        }
    }

    /// Dispatch every node on its state and collect the slot's
    /// transmit-candidate set.
    fn contention_pass(
        &self,
        nodes: &mut [Node],
        now: SimTime,
        order: &[usize],
        rng: &mut impl Rng,
    ) -> Vec<usize> {
        let mut candidates: Vec<usize> = Vec::new();

        for &index in order {
            match nodes[index].state() {
                NodeState::Transmitting => {
                    trace!("node {} is transmitting", nodes[index].address());
                    nodes[index].metrics_mut().transmitting_slots += 1;
                }

                NodeState::BackedOff => {
                    if nodes[index].next_attempt_time() == Some(now) {
                        trace!(
                            "now is node {}'s next attempted transmit time",
                            nodes[index].address()
                        );
                        self.contend_for_medium(nodes, index, now, &mut candidates, rng);
                    } else {
                        let metrics = nodes[index].metrics_mut();
                        metrics.idle_slots += 1;
                        metrics.backed_off_slots += 1;
                    }
                }

                NodeState::Idle | NodeState::Pending => {
                    if nodes[index].has_message() {
                        self.contend_for_medium(nodes, index, now, &mut candidates, rng);
                    } else {
                        nodes[index].metrics_mut().idle_slots += 1;
                    }
                }
            }
        }

        candidates
    }

    /// A node with a frame senses the medium: idle leads to candidacy (gated
    /// by p for the p-persistent variant), busy leads to a back-off drawn
    /// from the current retry streak.
    fn contend_for_medium(
        &self,
        nodes: &mut [Node],
        index: usize,
        now: SimTime,
        candidates: &mut Vec<usize>,
        rng: &mut impl Rng,
    ) {
        if medium_is_idle(nodes) {
            if self.csma == CsmaType::PPersistent && !rng.gen_bool(self.persistence_prob) {
                // Persistence gate lost: flat one-slot wait, retry the gate.
                trace!(
                    "p-persistence node {} will wait until next time cycle and try again",
                    nodes[index].address()
                );
                if let Err(e) = nodes[index].back_off(now + 1) {
                    warn!(
                        "failed to back off node {} from transmit: {:?}",
                        nodes[index].address(),
                        e
                    );
                }
                let metrics = nodes[index].metrics_mut();
                metrics.idle_slots += 1;
                metrics.backed_off_slots += 1;
            } else {
                trace!(
                    "medium is idle so node {} will attempt to transmit",
                    nodes[index].address()
                );
                candidates.push(index);
            }
        } else {
            trace!("medium is NOT idle for transmit attempt");
            let next_attempt_time = medium_busy_backoff(
                self.csma,
                nodes[index].consecutive_retries(),
                self.max_backoff_exponent,
                now,
                rng,
            );
            if let Err(e) = nodes[index].back_off(next_attempt_time) {
                warn!(
                    "failed to back off node {} from transmit: {:?}",
                    nodes[index].address(),
                    e
                );
            }
            let metrics = nodes[index].metrics_mut();
            metrics.transmission_attempts += 1;
            metrics.idle_slots += 1;
            metrics.backed_off_slots += 1;
        }
    }

    /// Decide the slot's outcome from the final candidate set: a lone
    /// candidate transmits, two or more collide and all of them back off.
    fn resolve(&self, nodes: &mut [Node], now: SimTime, candidates: &[usize], rng: &mut impl Rng) {
        match candidates {
            [] => {}

            [index] => {
                if let Err(e) = nodes[*index].start_transmit(now) {
                    warn!(
                        "failed to start transmit of message on node {}: {:?}",
                        nodes[*index].address(),
                        e
                    );
                } else {
                    let metrics = nodes[*index].metrics_mut();
                    metrics.transmitting_slots += 1;
                    metrics.transmission_attempts += 1;
                }
            }

            _ => {
                for &index in candidates {
                    let next_attempt_time = collision_backoff(
                        nodes[index].consecutive_retries(),
                        self.max_backoff_exponent,
                        now,
                        rng,
                    );
                    if let Err(e) = nodes[index].back_off(next_attempt_time) {
                        warn!(
                            "failed to back off node {} after collision: {:?}",
                            nodes[index].address(),
                            e
                        );
                    }

                    trace!(
                        "collision occurred for node {}, next transmit at time {}",
                        nodes[index].address(),
                        next_attempt_time
                    );

                    let metrics = nodes[index].metrics_mut();
                    metrics.collisions += 1;
                    metrics.transmission_attempts += 1;
                    metrics.idle_slots += 1;
                    metrics.backed_off_slots += 1;
                }
            }
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csma_interface::{Message, PLACEHOLDER_RECEIVER};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn population(count: usize) -> Vec<Node> {
        (0..count).map(Node::new).collect()
    }

    fn identity_order(count: usize) -> Vec<usize> {
        (0..count).collect()
    }

    fn load_frame(node: &mut Node, size: u64, now: SimTime) {
        let message = Message::new(node.address(), PLACEHOLDER_RECEIVER, size, now).unwrap();
        node.generate_message(message).unwrap();
    }

    fn silent_medium(csma: CsmaType, persistence_prob: f64) -> Medium {
        // Generation probability 0: only pre-loaded frames move
        Medium::new(csma, persistence_prob, 10, TrafficGenerator::new(0.0, 3))
    }

    #[test]
    fn test_empty_slot_touches_only_idle_counters() {
        let mut rng = StdRng::seed_from_u64(42);
        let medium = silent_medium(CsmaType::OnePersistent, 1.0);
        let mut nodes = population(4);

        medium.run_slot_with_order(&mut nodes, 0, &identity_order(4), &mut rng);

        for node in &nodes {
            assert_eq!(node.state(), NodeState::Idle);
            assert!(!node.has_message());
            let m = node.metrics();
            assert_eq!(m.idle_slots, 1);
            assert_eq!(m.backed_off_slots, 0);
            assert_eq!(m.transmitting_slots, 0);
            assert_eq!(m.transmission_attempts, 0);
            assert_eq!(m.collisions, 0);
            assert!(node.schedule_consistent());
        }
    }

    #[test]
    fn test_lone_holder_transmits_and_completes() {
        // Two non-persistent nodes, frame length 3, only node 0 has a frame.
        let mut rng = StdRng::seed_from_u64(42);
        let medium = silent_medium(CsmaType::NonPersistent, 1.0);
        let mut nodes = population(2);
        load_frame(&mut nodes[0], 3, 0);

        medium.run_slot_with_order(&mut nodes, 0, &identity_order(2), &mut rng);
        assert_eq!(nodes[0].state(), NodeState::Transmitting);
        assert_eq!(nodes[0].transmit_completion_time(), Some(3));
        assert_eq!(nodes[0].metrics().transmission_attempts, 1);
        assert_eq!(nodes[0].metrics().collisions, 0);

        for now in 1..=2 {
            medium.run_slot_with_order(&mut nodes, now, &identity_order(2), &mut rng);
            assert_eq!(nodes[0].state(), NodeState::Transmitting);
        }

        medium.run_slot_with_order(&mut nodes, 3, &identity_order(2), &mut rng);
        assert_eq!(nodes[0].state(), NodeState::Idle);
        assert!(!nodes[0].has_message());
        assert_eq!(nodes[0].metrics().messages_transmitted, 1);
        // One slot at start plus one per in-flight slot: frame length total
        assert_eq!(nodes[0].metrics().transmitting_slots, 3);
        assert!(nodes[0].schedule_consistent());

        // The bystander only idled
        assert_eq!(nodes[1].metrics().idle_slots, 4);
        assert_eq!(nodes[1].metrics().transmission_attempts, 0);
    }

    #[test]
    fn test_simultaneous_candidates_collide() {
        // Three 1-persistent nodes all holding a frame over an idle medium.
        let mut rng = StdRng::seed_from_u64(42);
        let medium = silent_medium(CsmaType::OnePersistent, 1.0);
        let mut nodes = population(3);
        for node in nodes.iter_mut() {
            load_frame(node, 3, 5);
        }

        medium.run_slot_with_order(&mut nodes, 5, &identity_order(3), &mut rng);

        for node in &nodes {
            assert_eq!(node.state(), NodeState::BackedOff);
            // First collision draws from a streak of 0: always the next slot
            assert_eq!(node.next_attempt_time(), Some(6));
            let m = node.metrics();
            assert_eq!(m.collisions, 1);
            assert_eq!(m.transmission_attempts, 1);
            assert_eq!(m.transmitting_slots, 0);
            assert_eq!(m.messages_transmitted, 0);
            assert!(node.schedule_consistent());
        }
    }

    #[test]
    fn test_collision_outcome_ignores_traversal_order() {
        // Same population, reversed traversal: the final candidate set still
        // decides, so everyone collides either way.
        let mut rng = StdRng::seed_from_u64(42);
        let medium = silent_medium(CsmaType::OnePersistent, 1.0);
        let mut nodes = population(3);
        for node in nodes.iter_mut() {
            load_frame(node, 3, 0);
        }

        medium.run_slot_with_order(&mut nodes, 0, &[2, 0, 1], &mut rng);

        for node in &nodes {
            assert_eq!(node.metrics().collisions, 1);
            assert_eq!(node.state(), NodeState::BackedOff);
        }
    }

    #[test]
    fn test_persistence_gate_at_zero_never_transmits() {
        let mut rng = StdRng::seed_from_u64(42);
        let medium = silent_medium(CsmaType::PPersistent, 0.0);
        let mut nodes = population(2);
        load_frame(&mut nodes[0], 3, 0);

        for now in 0..50 {
            medium.run_slot_with_order(&mut nodes, now, &identity_order(2), &mut rng);
            assert_eq!(nodes[0].state(), NodeState::BackedOff);
            assert_eq!(nodes[0].next_attempt_time(), Some(now + 1));
        }

        assert_eq!(nodes[0].metrics().messages_transmitted, 0);
        assert_eq!(nodes[0].metrics().transmitting_slots, 0);
        // The gate is a flat wait, not an attempt
        assert_eq!(nodes[0].metrics().transmission_attempts, 0);
        assert_eq!(nodes[0].consecutive_retries(), 50);
    }

    #[test]
    fn test_busy_medium_backs_contender_off() {
        let mut rng = StdRng::seed_from_u64(42);
        let medium = silent_medium(CsmaType::OnePersistent, 1.0);
        let mut nodes = population(2);

        // Node 0 occupies the medium from slot 0
        load_frame(&mut nodes[0], 5, 0);
        medium.run_slot_with_order(&mut nodes, 0, &identity_order(2), &mut rng);
        assert_eq!(nodes[0].state(), NodeState::Transmitting);

        // Node 1 arrives with a frame while the medium is busy
        load_frame(&mut nodes[1], 3, 1);
        medium.run_slot_with_order(&mut nodes, 1, &identity_order(2), &mut rng);

        assert_eq!(nodes[1].state(), NodeState::BackedOff);
        // 1-persistent resenses on the very next slot
        assert_eq!(nodes[1].next_attempt_time(), Some(2));
        assert_eq!(nodes[1].metrics().transmission_attempts, 1);
        assert_eq!(nodes[1].metrics().collisions, 0);
        assert_eq!(nodes[1].consecutive_retries(), 1);
    }

    #[test]
    fn test_one_persistent_contender_wins_after_completion() {
        let mut rng = StdRng::seed_from_u64(42);
        let medium = silent_medium(CsmaType::OnePersistent, 1.0);
        let mut nodes = population(2);

        load_frame(&mut nodes[0], 3, 0);
        medium.run_slot_with_order(&mut nodes, 0, &identity_order(2), &mut rng);

        load_frame(&mut nodes[1], 3, 1);
        for now in 1..=2 {
            medium.run_slot_with_order(&mut nodes, now, &identity_order(2), &mut rng);
            assert_eq!(nodes[1].state(), NodeState::BackedOff);
        }

        // Slot 3: node 0 completes before node 1 resenses, so node 1 starts
        medium.run_slot_with_order(&mut nodes, 3, &identity_order(2), &mut rng);
        assert_eq!(nodes[0].state(), NodeState::Idle);
        assert_eq!(nodes[0].metrics().messages_transmitted, 1);
        assert_eq!(nodes[1].state(), NodeState::Transmitting);
        assert_eq!(nodes[1].transmit_completion_time(), Some(6));
        assert_eq!(nodes[1].consecutive_retries(), 0);
    }

    #[test]
    fn test_slot_accounting_is_exhaustive() {
        // Over any run, every node accounts each slot exactly once as idle or
        // transmitting, and schedules stay consistent with states.
        for csma in [
            CsmaType::NonPersistent,
            CsmaType::OnePersistent,
            CsmaType::PPersistent,
        ] {
            let mut rng = StdRng::seed_from_u64(1234);
            let medium = Medium::new(csma, 0.4, 6, TrafficGenerator::new(0.3, 4));
            let mut nodes = population(7);

            let slots = 200;
            for now in 0..slots {
                medium.run_slot(&mut nodes, now, &mut rng);
                for node in &nodes {
                    assert!(node.schedule_consistent(), "{:?} slot {}", csma, now);
                }
            }

            for node in &nodes {
                let m = node.metrics();
                assert_eq!(
                    m.idle_slots + m.transmitting_slots,
                    slots,
                    "{:?}: node {} accounted {} idle + {} transmitting",
                    csma,
                    node.address(),
                    m.idle_slots,
                    m.transmitting_slots
                );
                assert!(m.backed_off_slots <= m.idle_slots);
                assert!(m.messages_transmitted <= m.messages_generated);
            }
        }
    }
}
