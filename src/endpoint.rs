//! IPv4 endpoint type and its compact wire form.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// An IPv4 address and UDP port, as used throughout the DHT.
///
/// Mainline DHT's compact node/peer forms are IPv4-only (BEP 5); IPv6
/// support is a separate, additive wire form and out of scope here.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub ip: Ipv4Addr,
    pub port: u16,
}

impl Endpoint {
    #[must_use]
    pub const fn new(ip: Ipv4Addr, port: u16) -> Self {
        Self { ip, port }
    }

    /// Compact 6-byte wire form: 4 address bytes followed by a
    /// big-endian port.
    #[must_use]
    pub fn to_compact(self) -> [u8; 6] {
        let mut out = [0u8; 6];
        out[..4].copy_from_slice(&self.ip.octets());
        out[4..].copy_from_slice(&self.port.to_be_bytes());
        out
    }

    /// Decode a compact 6-byte endpoint.
    #[must_use]
    pub fn from_compact(bytes: [u8; 6]) -> Self {
        let ip = Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3]);
        let port = u16::from_be_bytes([bytes[4], bytes[5]]);
        Self { ip, port }
    }

    /// Canonical string form used as the message input to token
    /// hashing. Pinned to the exact text the original implementation
    /// hashes (a Python address tuple's `str()`), so a minter and
    /// validator running different code still agree byte-for-byte.
    #[must_use]
    pub fn token_string(self) -> String {
        format!("('{}', {})", self.ip, self.port)
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_round_trip() {
        let ep = Endpoint::new(Ipv4Addr::new(1, 2, 3, 4), 40000);
        assert_eq!(Endpoint::from_compact(ep.to_compact()), ep);
    }

    #[test]
    fn token_string_matches_python_tuple_repr() {
        let ep = Endpoint::new(Ipv4Addr::new(1, 2, 3, 4), 40000);
        assert_eq!(ep.token_string(), "('1.2.3.4', 40000)");
    }
}
