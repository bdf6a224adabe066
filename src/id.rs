//! DHT Node Identity and Distance Metric
//!
//! This module provides the `NodeId` type, a 160-bit identifier used
//! throughout the Kademlia routing table and lookup engine. Distance
//! between two ids is bitwise XOR, interpreted as an unsigned integer:
//! smaller is closer.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Number of bytes in a `NodeId` (160 bits, per BEP 5).
pub const ID_LEN: usize = 20;

/// 160-bit node/info-hash identifier.
///
/// The same type represents both DHT node ids and torrent info-hashes;
/// both are opaque 160-bit quantities under the XOR metric.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId([u8; ID_LEN]);

/// Info-hashes and node ids share the same representation.
pub type InfoHash = NodeId;

impl NodeId {
    /// Number of bits in a `NodeId`.
    pub const BITS: usize = ID_LEN * 8;

    /// The all-zero id.
    pub const ZERO: NodeId = NodeId([0u8; ID_LEN]);

    /// Generate a random `NodeId` using the system RNG.
    #[must_use]
    pub fn random() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; ID_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Build a `NodeId` from raw big-endian bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Get the raw big-endian bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; ID_LEN] {
        &self.0
    }

    /// Build a `NodeId` from a small integer, for tests and range math.
    #[must_use]
    pub fn from_u64(value: u64) -> Self {
        let mut bytes = [0u8; ID_LEN];
        bytes[ID_LEN - 8..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }

    /// XOR distance to another id, itself representable as a `NodeId`
    /// since XOR of two 160-bit values is a 160-bit value.
    #[must_use]
    pub fn distance(&self, other: &NodeId) -> NodeId {
        let mut out = [0u8; ID_LEN];
        for (o, (a, b)) in out.iter_mut().zip(self.0.iter().zip(other.0.iter())) {
            *o = a ^ b;
        }
        NodeId(out)
    }

    /// Count leading zero bits, used to locate the differing high bit
    /// between two ids (debugging / bucket-index diagnostics).
    #[must_use]
    pub fn leading_zeros(&self) -> usize {
        let mut count = 0;
        for byte in &self.0 {
            if *byte == 0 {
                count += 8;
            } else {
                count += byte.leading_zeros() as usize;
                break;
            }
        }
        count.min(Self::BITS)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

impl PartialOrd for NodeId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NodeId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

/// Minimal hex encoding, avoiding a dependency for a one-line need.
mod hex {
    pub fn encode(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }
}

/// 21-byte widened representation used internally to do arithmetic
/// that can reach exactly 2^160 (one past the largest `NodeId`) without
/// overflow, e.g. for bucket-range width and median calculations.
mod wide {
    use super::{ID_LEN, NodeId};

    pub type Wide = [u8; ID_LEN + 1];

    pub fn widen(id: &NodeId) -> Wide {
        let mut w = [0u8; ID_LEN + 1];
        w[1..].copy_from_slice(id.as_bytes());
        w
    }

    /// The value 2^160 itself, used as the exclusive upper bound of the
    /// whole id space (no `NodeId` can represent this).
    pub fn top() -> Wide {
        let mut w = [0u8; ID_LEN + 1];
        w[0] = 1;
        w
    }

    pub fn add(a: &Wide, b: &Wide) -> Wide {
        let mut out = [0u8; ID_LEN + 1];
        let mut carry = 0u16;
        for i in (0..out.len()).rev() {
            let sum = u16::from(a[i]) + u16::from(b[i]) + carry;
            out[i] = sum as u8;
            carry = sum >> 8;
        }
        out
    }

    /// `a - b`, assuming `a >= b`.
    pub fn sub(a: &Wide, b: &Wide) -> Wide {
        let mut out = [0u8; ID_LEN + 1];
        let mut borrow = 0i16;
        for i in (0..out.len()).rev() {
            let diff = i16::from(a[i]) - i16::from(b[i]) - borrow;
            if diff < 0 {
                out[i] = (diff + 256) as u8;
                borrow = 1;
            } else {
                out[i] = diff as u8;
                borrow = 0;
            }
        }
        out
    }

    pub fn shr1(a: &Wide) -> Wide {
        let mut out = [0u8; ID_LEN + 1];
        let mut carry = 0u8;
        for i in 0..a.len() {
            out[i] = (a[i] >> 1) | (carry << 7);
            carry = a[i] & 1;
        }
        out
    }

    pub fn narrow(w: &Wide) -> NodeId {
        debug_assert_eq!(w[0], 0, "value does not fit in a NodeId");
        let mut bytes = [0u8; ID_LEN];
        bytes.copy_from_slice(&w[1..]);
        NodeId(bytes)
    }
}

/// Midpoint of a bucket range `[min, max)`, where `max = None` means the
/// exclusive upper bound 2^160 (the top of the whole id space).
#[must_use]
pub(crate) fn range_median(min: &NodeId, max: Option<&NodeId>) -> NodeId {
    let min_w = wide::widen(min);
    let max_w = max.map_or_else(wide::top, wide::widen);
    wide::narrow(&wide::shr1(&wide::add(&min_w, &max_w)))
}

/// Whether `[min, max)` is at least `k` ids wide, used to decide if a
/// bucket is eligible for splitting.
#[must_use]
pub(crate) fn range_width_at_least(min: &NodeId, max: Option<&NodeId>, k: u64) -> bool {
    let min_w = wide::widen(min);
    let max_w = max.map_or_else(wide::top, wide::widen);
    let width = wide::sub(&max_w, &min_w);
    width >= wide::widen(&NodeId::from_u64(k))
}
