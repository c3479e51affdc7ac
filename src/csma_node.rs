// The node state machine. One `Node` is one station contending for the
// shared medium.

use log::trace;

use crate::csma_interface::{Message, NodeAddress, NodeError, SimTime};
use crate::csma_metrics::NodeMetrics;

// ============================================================================
// Node State Machine
// ============================================================================

/// Transmit state of a station.
///
/// Transitions: `Idle -> {BackedOff, Transmitting}`,
/// `BackedOff -> {BackedOff, Transmitting}`, `Transmitting -> Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Not contending; may or may not hold a generated frame
    Idle,

    /// Holds a frame queued for a first attempt. The arbitration passes drive
    /// stations straight from Idle into Transmitting or BackedOff, so this
    /// state is currently never entered.
    Pending,

    /// Occupying the medium until `transmit_completion_time`
    Transmitting,

    /// Waiting out a back-off until `next_attempt_time`
    BackedOff,
}

impl NodeState {
    pub fn is_transmitting(&self) -> bool {
        matches!(self, NodeState::Transmitting)
    }

    pub fn is_backed_off(&self) -> bool {
        matches!(self, NodeState::BackedOff)
    }
}

/// One simulated station.
///
/// Holds at most one frame at a time; a second frame is not queued while one
/// is pending. Exactly one of the two schedule fields is set at any time, and
/// only while the node is in the matching state.
pub struct Node {
    address: NodeAddress,
    state: NodeState,
    pending_message: Option<Message>,
    transmit_completion_time: Option<SimTime>,
    next_attempt_time: Option<SimTime>,
    consecutive_retries: u32,
    metrics: NodeMetrics,
}

impl Node {
    pub fn new(address: NodeAddress) -> Self {
        Self {
            address,
            state: NodeState::Idle,
            pending_message: None,
            transmit_completion_time: None,
            next_attempt_time: None,
            consecutive_retries: 0,
            metrics: NodeMetrics::default(),
        }
    }

    /// Attach a freshly generated frame.
    ///
    /// Fails with `AlreadyHasMessage` while a frame is pending; the
    /// single-frame contract never queues a second one.
    pub fn generate_message(&mut self, message: Message) -> Result<(), NodeError> {
        if self.pending_message.is_some() {
            return Err(NodeError::AlreadyHasMessage);
        }

        self.pending_message = Some(message);
        self.metrics.messages_generated += 1;
        Ok(())
    }

    /// Begin occupying the medium at `now`.
    ///
    /// Sets the completion slot from the frame size, clears any back-off
    /// schedule and resets the consecutive-retry streak.
    pub fn start_transmit(&mut self, now: SimTime) -> Result<(), NodeError> {
        let message = self.pending_message.as_ref().ok_or(NodeError::NoMessage)?;

        self.transmit_completion_time = Some(now + message.size());
        self.state = NodeState::Transmitting;
        self.next_attempt_time = None;
        self.consecutive_retries = 0;

        trace!(
            "node {} starting transmit with completion time set to: {}",
            self.address,
            now + message.size()
        );
        Ok(())
    }

    /// Finish the in-progress transmission at `now`.
    ///
    /// Clears the frame, returns to Idle and accounts the frame's wait time
    /// (completion slot minus creation slot). Calling this on a node that is
    /// not transmitting is a recoverable caller-ordering bug.
    pub fn complete_transmit(&mut self, now: SimTime) -> Result<(), NodeError> {
        if self.state != NodeState::Transmitting {
            return Err(NodeError::NotTransmitting);
        }

        // Removing the frame is more symbolic than anything; only its timing
        // is observable.
        if let Some(message) = self.pending_message.take() {
            self.metrics.slots_waited += now.saturating_sub(message.created_at());
        }

        self.state = NodeState::Idle;
        self.transmit_completion_time = None;
        self.metrics.messages_transmitted += 1;

        trace!("node {} completed message transmission", self.address);
        Ok(())
    }

    /// Back off until `next_attempt_time`, extending the retry streak.
    pub fn back_off(&mut self, next_attempt_time: SimTime) -> Result<(), NodeError> {
        if self.pending_message.is_none() {
            return Err(NodeError::NoMessage);
        }

        self.state = NodeState::BackedOff;
        self.next_attempt_time = Some(next_attempt_time);
        self.transmit_completion_time = None;
        self.consecutive_retries += 1;
        self.metrics.record_retries(self.consecutive_retries);

        trace!(
            "node {} will back off, reattempting transmission at time {}, retry streak: {}",
            self.address,
            next_attempt_time,
            self.consecutive_retries
        );
        Ok(())
    }

    pub fn address(&self) -> NodeAddress {
        self.address
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn has_message(&self) -> bool {
        self.pending_message.is_some()
    }

    pub fn pending_message(&self) -> Option<&Message> {
        self.pending_message.as_ref()
    }

    pub fn transmit_completion_time(&self) -> Option<SimTime> {
        self.transmit_completion_time
    }

    pub fn next_attempt_time(&self) -> Option<SimTime> {
        self.next_attempt_time
    }

    pub fn consecutive_retries(&self) -> u32 {
        self.consecutive_retries
    }

    pub fn metrics(&self) -> &NodeMetrics {
        &self.metrics
    }

    pub fn metrics_mut(&mut self) -> &mut NodeMetrics {
        &mut self.metrics
    }

    /// True when the schedule fields agree with the state: a completion slot
    /// only while Transmitting, a reattempt slot only while BackedOff,
    /// neither otherwise.
    pub fn schedule_consistent(&self) -> bool {
        match self.state {
            NodeState::Transmitting => {
                self.transmit_completion_time.is_some() && self.next_attempt_time.is_none()
            }
            NodeState::BackedOff => {
                self.next_attempt_time.is_some() && self.transmit_completion_time.is_none()
            }
            NodeState::Idle | NodeState::Pending => {
                self.transmit_completion_time.is_none() && self.next_attempt_time.is_none()
            }
        }
    }
}

/// True iff no station in the population currently occupies the medium.
///
/// O(N) scan, invoked up to once per contending node per slot.
pub fn medium_is_idle(nodes: &[Node]) -> bool {
    !nodes.iter().any(|node| node.state().is_transmitting())
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csma_interface::PLACEHOLDER_RECEIVER;

    fn frame(sender: NodeAddress, size: u64, created_at: SimTime) -> Message {
        Message::new(sender, PLACEHOLDER_RECEIVER, size, created_at).unwrap()
    }

    #[test]
    fn test_new_node_is_idle_and_consistent() {
        let node = Node::new(7);
        assert_eq!(node.address(), 7);
        assert_eq!(node.state(), NodeState::Idle);
        assert!(!node.has_message());
        assert_eq!(node.transmit_completion_time(), None);
        assert_eq!(node.next_attempt_time(), None);
        assert!(node.schedule_consistent());
    }

    #[test]
    fn test_generate_message_rejects_second_frame() {
        let mut node = Node::new(0);

        node.generate_message(frame(0, 3, 0)).unwrap();
        assert!(node.has_message());
        assert_eq!(node.metrics().messages_generated, 1);

        // Still Idle until the contention pass picks it up
        assert_eq!(node.state(), NodeState::Idle);

        assert_eq!(
            node.generate_message(frame(0, 3, 1)),
            Err(NodeError::AlreadyHasMessage)
        );
        assert_eq!(node.metrics().messages_generated, 1);
    }

    #[test]
    fn test_start_transmit_requires_message() {
        let mut node = Node::new(0);
        assert_eq!(node.start_transmit(5), Err(NodeError::NoMessage));
        assert_eq!(node.state(), NodeState::Idle);
    }

    #[test]
    fn test_start_transmit_schedules_completion() {
        let mut node = Node::new(0);
        node.generate_message(frame(0, 4, 2)).unwrap();
        node.back_off(3).unwrap();
        assert_eq!(node.consecutive_retries(), 1);

        node.start_transmit(10).unwrap();
        assert_eq!(node.state(), NodeState::Transmitting);
        assert_eq!(node.transmit_completion_time(), Some(14));
        assert_eq!(node.next_attempt_time(), None);
        // Streak resets to exactly 0 on a successful start
        assert_eq!(node.consecutive_retries(), 0);
        assert!(node.schedule_consistent());
    }

    #[test]
    fn test_complete_transmit_out_of_state_is_recoverable() {
        let mut node = Node::new(0);
        assert_eq!(node.complete_transmit(0), Err(NodeError::NotTransmitting));

        // No mutation happened
        assert_eq!(node.state(), NodeState::Idle);
        assert_eq!(node.metrics().messages_transmitted, 0);
        assert!(node.schedule_consistent());
    }

    #[test]
    fn test_complete_transmit_accounts_wait_time() {
        let mut node = Node::new(0);
        node.generate_message(frame(0, 3, 2)).unwrap();
        node.start_transmit(6).unwrap();

        node.complete_transmit(9).unwrap();
        assert_eq!(node.state(), NodeState::Idle);
        assert!(!node.has_message());
        assert_eq!(node.transmit_completion_time(), None);
        assert_eq!(node.metrics().messages_transmitted, 1);
        // Created at slot 2, fully sent at slot 9
        assert_eq!(node.metrics().slots_waited, 7);
        assert!(node.schedule_consistent());
    }

    #[test]
    fn test_back_off_requires_message() {
        let mut node = Node::new(0);
        assert_eq!(node.back_off(4), Err(NodeError::NoMessage));
    }

    #[test]
    fn test_retry_streak_grows_until_transmit() {
        let mut node = Node::new(0);
        node.generate_message(frame(0, 3, 0)).unwrap();

        for expected in 1..=5 {
            node.back_off(expected as SimTime).unwrap();
            assert_eq!(node.state(), NodeState::BackedOff);
            assert_eq!(node.consecutive_retries(), expected);
            assert!(node.schedule_consistent());
        }
        assert_eq!(node.metrics().max_consecutive_retries, 5);

        node.start_transmit(20).unwrap();
        assert_eq!(node.consecutive_retries(), 0);
        // The high-water mark survives the reset
        assert_eq!(node.metrics().max_consecutive_retries, 5);
    }

    #[test]
    fn test_medium_idle_scan() {
        assert!(medium_is_idle(&[]));

        let mut nodes: Vec<Node> = (0..3).map(Node::new).collect();
        assert!(medium_is_idle(&nodes));

        nodes[1].generate_message(frame(1, 3, 0)).unwrap();
        nodes[1].start_transmit(0).unwrap();
        assert!(!medium_is_idle(&nodes));

        nodes[1].complete_transmit(3).unwrap();
        assert!(medium_is_idle(&nodes));
    }
}
