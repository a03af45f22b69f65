//! Strong type definitions for mesh identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::InvalidNodeId;

/// A 32-bit mesh node identifier.
///
/// Displayed in the mesh convention `!xxxxxxxx`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    /// The broadcast address.
    pub const BROADCAST: Self = Self(u32::MAX);

    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    /// Little-endian bytes, widened to 64 bits as used in the CTR nonce.
    pub fn to_le_bytes_u64(&self) -> [u8; 8] {
        u64::from(self.0).to_le_bytes()
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId(!{:08x})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "!{:08x}", self.0)
    }
}

impl From<u32> for NodeId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl From<NodeId> for u32 {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

impl FromStr for NodeId {
    type Err = InvalidNodeId;

    /// Accepts `0x1234abcd`, `!1234abcd`, bare hex, and decimal.
    ///
    /// An all-digit string of exactly eight characters is the canonical
    /// hex form without its sigil and is read as hex; any other all-digit
    /// string is decimal.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = |reason| InvalidNodeId {
            input: s.to_string(),
            reason,
        };

        if trimmed.is_empty() {
            return Err(invalid("empty"));
        }

        let (digits, radix) = if let Some(rest) = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .or_else(|| trimmed.strip_prefix('!'))
        {
            (rest, 16)
        } else if trimmed.bytes().all(|b| b.is_ascii_digit()) && trimmed.len() != 8 {
            (trimmed, 10)
        } else {
            (trimmed, 16)
        };

        if digits.is_empty() {
            return Err(invalid("no digits after prefix"));
        }
        // from_str_radix tolerates a leading sign
        if digits.starts_with(['+', '-']) {
            return Err(invalid("signed value"));
        }

        u32::from_str_radix(digits, radix)
            .map(NodeId)
            .map_err(|e| match e.kind() {
                std::num::IntErrorKind::PosOverflow => invalid("does not fit in 32 bits"),
                _ => invalid("not a hex or decimal number"),
            })
    }
}
