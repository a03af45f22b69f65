//! Authorization: decide whether a packet may be relayed.
//!
//! Checks run in a fixed order and the first match wins:
//!
//! 1. exempt sender: forwarded, even if the payload is still encrypted
//! 2. encrypted payload: rejected
//! 3. no bitfield: rejected unless legacy firmware is tolerated
//! 4. bit 0 of the bitfield decides

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::envelope::{Packet, Payload};
use crate::types::NodeId;

/// Bit 0 of the bitfield: the sender allows relaying to the bus.
pub const OK_TO_MQTT_MASK: u8 = 0x01;

/// Why a packet was not forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Payload could not be decrypted with any configured key.
    Encrypted,
    /// Decoded data carries no bitfield (older firmware).
    NoBitfield,
    /// The sender cleared the relay bit.
    BitfieldDisabled,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::Encrypted => "encrypted",
            RejectReason::NoBitfield => "no_bitfield",
            RejectReason::BitfieldDisabled => "bitfield_disabled",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of one processed message. Exactly one holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum Outcome {
    Forwarded { exempt: bool },
    Rejected { reason: RejectReason },
}

impl Outcome {
    pub fn is_forwarded(&self) -> bool {
        matches!(self, Outcome::Forwarded { .. })
    }

    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            Outcome::Rejected { reason } => Some(*reason),
            Outcome::Forwarded { .. } => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Forwarded { exempt: true } => f.write_str("forwarded (exempt)"),
            Outcome::Forwarded { exempt: false } => f.write_str("forwarded"),
            Outcome::Rejected { reason } => write!(f, "rejected ({reason})"),
        }
    }
}

/// Senders that are always forwarded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExemptNodeSet {
    nodes: HashSet<NodeId>,
}

impl ExemptNodeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse identifiers in any accepted format. Entries that do not parse
    /// are logged and skipped.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut nodes = HashSet::new();
        for entry in entries {
            match entry.as_ref().parse::<NodeId>() {
                Ok(id) => {
                    tracing::info!(node = %id, "exempt node");
                    nodes.insert(id);
                }
                Err(e) => tracing::warn!(error = %e, "skipping exempt node entry"),
            }
        }
        Self { nodes }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.iter()
    }
}

impl FromIterator<NodeId> for ExemptNodeSet {
    fn from_iter<T: IntoIterator<Item = NodeId>>(iter: T) -> Self {
        Self {
            nodes: iter.into_iter().collect(),
        }
    }
}

/// Authorization policy, fixed at construction.
#[derive(Debug, Clone, Default)]
pub struct Policy {
    pub exempt: ExemptNodeSet,
    /// Forward decoded packets that carry no bitfield.
    pub allow_no_bitfield: bool,
}

impl Policy {
    pub fn new(exempt: ExemptNodeSet, allow_no_bitfield: bool) -> Self {
        Self {
            exempt,
            allow_no_bitfield,
        }
    }

    pub fn evaluate(&self, packet: &Packet) -> Outcome {
        evaluate(packet, &self.exempt, self.allow_no_bitfield)
    }
}

/// Classify a packet.
pub fn evaluate(packet: &Packet, exempt: &ExemptNodeSet, allow_no_bitfield: bool) -> Outcome {
    if exempt.contains(packet.from) {
        return Outcome::Forwarded { exempt: true };
    }

    let data = match packet.payload() {
        Payload::Encrypted(_) => {
            return Outcome::Rejected {
                reason: RejectReason::Encrypted,
            }
        }
        Payload::Decoded(data) => data,
    };

    match data.bitfield {
        None if allow_no_bitfield => Outcome::Forwarded { exempt: false },
        None => Outcome::Rejected {
            reason: RejectReason::NoBitfield,
        },
        Some(bits) if bits & OK_TO_MQTT_MASK != 0 => Outcome::Forwarded { exempt: false },
        Some(_) => Outcome::Rejected {
            reason: RejectReason::BitfieldDisabled,
        },
    }
}
