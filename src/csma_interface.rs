// Shared types for the slotted CSMA simulation.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Discrete simulation time, measured in slots.
pub type SimTime = u64;

/// Station identity, assigned densely 0..N-1 at population creation.
pub type NodeAddress = usize;

/// Destination used for every generated frame.
// TODO: route to a real destination once addressed delivery exists
pub const PLACEHOLDER_RECEIVER: NodeAddress = 0;

// Configuration ranges, enforced again by the core as a defensive double-check
// of values it is handed directly.
pub const MAX_NODE_COUNT: usize = 100;
pub const MAX_TIME_SLOT_COUNT: u64 = 2_500_000;
pub const MAX_SIMULATION_COUNT: u32 = 100;
pub const MIN_FRAME_LENGTH: u64 = 3;
pub const MAX_FRAME_LENGTH: u64 = 20;
pub const MAX_BACKOFF_EXPONENT_LIMIT: u32 = 1024;

// ============================================================================
// CSMA Variant
// ============================================================================

/// The carrier-sense persistence discipline under simulation.
///
/// The serialized names match the protocol strings the scenario files use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum CsmaType {
    /// On busy medium, wait a randomized exponential interval before resensing.
    #[serde(rename = "Non-Persistent")]
    NonPersistent,

    /// On busy medium, resense every slot and transmit as soon as it is idle.
    #[serde(rename = "1-Persistent")]
    OnePersistent,

    /// On idle medium, transmit with probability p, else wait one slot.
    #[serde(rename = "p-Persistent")]
    PPersistent,
}

impl FromStr for CsmaType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Non-Persistent" => Ok(CsmaType::NonPersistent),
            "1-Persistent" => Ok(CsmaType::OnePersistent),
            "p-Persistent" => Ok(CsmaType::PPersistent),
            other => Err(ConfigError::UnknownProtocol(other.to_string())),
        }
    }
}

impl fmt::Display for CsmaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CsmaType::NonPersistent => "Non-Persistent",
            CsmaType::OnePersistent => "1-Persistent",
            CsmaType::PPersistent => "p-Persistent",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Message
// ============================================================================

/// A symbolic frame. Immutable once constructed; the payload itself is never
/// modeled, only the slots it occupies on the medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message {
    sender: NodeAddress,
    receiver: NodeAddress,
    /// Slots required to transmit this frame.
    size: u64,
    /// Slot in which the frame was generated.
    created_at: SimTime,
}

impl Message {
    /// Build a frame, rejecting a size that could never occupy the medium.
    pub fn new(
        sender: NodeAddress,
        receiver: NodeAddress,
        size: u64,
        created_at: SimTime,
    ) -> Result<Self, NodeError> {
        if size == 0 {
            return Err(NodeError::ZeroLengthFrame);
        }

        Ok(Self {
            sender,
            receiver,
            size,
            created_at,
        })
    }

    pub fn sender(&self) -> NodeAddress {
        self.sender
    }

    pub fn receiver(&self) -> NodeAddress {
        self.receiver
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn created_at(&self) -> SimTime {
        self.created_at
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Failures of node-level operations.
///
/// All variants except `ZeroLengthFrame` indicate a caller-ordering bug in the
/// arbitration engine rather than bad input; the engine logs them as warnings
/// and continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeError {
    /// A frame is already pending on this node
    AlreadyHasMessage,

    /// The operation requires a pending frame and the node holds none
    NoMessage,

    /// `complete_transmit` was invoked while the node was not transmitting
    NotTransmitting,

    /// A frame was constructed with a zero slot count
    ZeroLengthFrame,
}

/// Failures while building or validating a run configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A parameter fell outside its documented range
    OutOfRange {
        field: &'static str,
        valid: &'static str,
    },

    /// Protocol string did not name one of the three CSMA variants
    UnknownProtocol(String),

    /// Scenario file could not be read
    Io(String),

    /// Scenario file could not be parsed
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::OutOfRange { field, valid } => {
                write!(f, "invalid {} value; valid if {}", field, valid)
            }
            ConfigError::UnknownProtocol(s) => write!(f, "unrecognized protocol type: {}", s),
            ConfigError::Io(e) => write!(f, "failed to read scenario: {}", e),
            ConfigError::Parse(e) => write!(f, "failed to parse scenario: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_construction() {
        let msg = Message::new(3, PLACEHOLDER_RECEIVER, 5, 100).unwrap();
        assert_eq!(msg.sender(), 3);
        assert_eq!(msg.receiver(), PLACEHOLDER_RECEIVER);
        assert_eq!(msg.size(), 5);
        assert_eq!(msg.created_at(), 100);
    }

    #[test]
    fn test_message_rejects_zero_size() {
        assert_eq!(
            Message::new(0, 0, 0, 0),
            Err(NodeError::ZeroLengthFrame)
        );
    }

    #[test]
    fn test_protocol_strings_round_trip() {
        for variant in [
            CsmaType::NonPersistent,
            CsmaType::OnePersistent,
            CsmaType::PPersistent,
        ] {
            let parsed: CsmaType = variant.to_string().parse().unwrap();
            assert_eq!(parsed, variant);
        }
    }

    #[test]
    fn test_unknown_protocol_string_rejected() {
        let err = "2-Persistent".parse::<CsmaType>().unwrap_err();
        assert_eq!(err, ConfigError::UnknownProtocol("2-Persistent".into()));
    }
}
