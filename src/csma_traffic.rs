// Per-slot traffic source.

use log::{trace, warn};
use rand::Rng;

use crate::csma_interface::{Message, SimTime, PLACEHOLDER_RECEIVER};
use crate::csma_node::Node;

/// Bernoulli frame source shared by the whole population: one draw per node
/// per slot against the configured generation probability.
#[derive(Debug, Clone, Copy)]
pub struct TrafficGenerator {
    generation_prob: f64,
    frame_length: u64,
}

impl TrafficGenerator {
    pub fn new(generation_prob: f64, frame_length: u64) -> Self {
        Self {
            generation_prob,
            frame_length,
        }
    }

    /// Offer every node a new frame for this slot, visiting nodes in the
    /// given traversal order.
    ///
    /// The draw happens for every node so the random stream does not depend
    /// on which nodes currently hold frames; a node that already holds one is
    /// skipped without queueing a second.
    pub fn generation_pass(
        &self,
        nodes: &mut [Node],
        now: SimTime,
        order: &[usize],
        rng: &mut impl Rng,
    ) {
        for &index in order {
            if !rng.gen_bool(self.generation_prob) {
                continue;
            }

            let node = &mut nodes[index];
            if node.has_message() {
                continue;
            }

            let message = match Message::new(
                node.address(),
                PLACEHOLDER_RECEIVER,
                self.frame_length,
                now,
            ) {
                Ok(message) => message,
                Err(e) => {
                    warn!("failed to build frame for node {}: {:?}", node.address(), e);
                    continue;
                }
            };

            trace!("node {} generating a message", node.address());
            if let Err(e) = node.generate_message(message) {
                warn!("failed to load frame on node {}: {:?}", node.address(), e);
            }
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
