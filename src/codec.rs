//! Compact wire encode/decode for node and peer lists.
//!
//! These are the binary forms BEP 5 uses inside bencoded KRPC messages.
//! Producing/consuming the bencode envelope itself is the transport's
//! job (§6 of the spec); this module only does the fixed-width compact
//! encoding layered inside it.

use crate::endpoint::Endpoint;
use crate::error::DhtError;
use crate::id::{ID_LEN, NodeId};
use crate::node_record::NodeRecord;

const RECORD_LEN: usize = ID_LEN + 6;
const PEER_LEN: usize = 6;

/// Encode a single id to its 20-byte big-endian form.
#[must_use]
pub fn encode_id(id: &NodeId) -> [u8; ID_LEN] {
    *id.as_bytes()
}

/// Decode a 20-byte big-endian id.
///
/// # Errors
///
/// Returns [`DhtError::BadLength`] unless `bytes.len() == 20`.
pub fn decode_id(bytes: &[u8]) -> Result<NodeId, DhtError> {
    let arr: [u8; ID_LEN] = bytes
        .try_into()
        .map_err(|_| DhtError::BadLength { expected: ID_LEN, actual: bytes.len() })?;
    Ok(NodeId::from_bytes(arr))
}

/// Encode a list of `(id, addr)` node records as concatenated 26-byte
/// entries.
#[must_use]
pub fn encode_nodes(nodes: &[NodeRecord]) -> Vec<u8> {
    let mut out = Vec::with_capacity(nodes.len() * RECORD_LEN);
    for node in nodes {
        out.extend_from_slice(node.id.as_bytes());
        out.extend_from_slice(&node.addr.to_compact());
    }
    out
}

/// Decode a concatenated list of 26-byte node records.
///
/// # Errors
///
/// Returns [`DhtError::BadLength`] unless the input length is a
/// multiple of 26.
pub fn decode_nodes(bytes: &[u8]) -> Result<Vec<NodeRecord>, DhtError> {
    if bytes.len() % RECORD_LEN != 0 {
        return Err(DhtError::BadLength { expected: RECORD_LEN, actual: bytes.len() });
    }
    bytes
        .chunks_exact(RECORD_LEN)
        .map(|chunk| {
            let id = decode_id(&chunk[..ID_LEN])?;
            let mut addr_bytes = [0u8; 6];
            addr_bytes.copy_from_slice(&chunk[ID_LEN..]);
            Ok(NodeRecord::new(id, Endpoint::from_compact(addr_bytes)))
        })
        .collect()
}

/// Encode a list of peer endpoints as concatenated 6-byte entries.
#[must_use]
pub fn encode_peers(peers: &[Endpoint]) -> Vec<Vec<u8>> {
    peers.iter().map(|p| p.to_compact().to_vec()).collect()
}

/// Decode a list of 6-byte peer entries.
///
/// # Errors
///
/// Returns [`DhtError::BadLength`] if any entry is not 6 bytes.
pub fn decode_peers(entries: &[Vec<u8>]) -> Result<Vec<Endpoint>, DhtError> {
    entries
        .iter()
        .map(|entry| {
            let bytes: [u8; PEER_LEN] = entry
                .as_slice()
                .try_into()
                .map_err(|_| DhtError::BadLength { expected: PEER_LEN, actual: entry.len() })?;
            Ok(Endpoint::from_compact(bytes))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn id_round_trips() {
        let id = NodeId::random();
        assert_eq!(decode_id(&encode_id(&id)).unwrap(), id);
    }

    #[test]
    fn decode_id_rejects_wrong_length() {
        assert!(decode_id(&[0u8; 19]).is_err());
        assert!(decode_id(&[0u8; 21]).is_err());
    }

    #[test]
    fn nodes_round_trip() {
        let nodes = vec![
            NodeRecord::new(NodeId::random(), Endpoint::new(Ipv4Addr::new(1, 2, 3, 4), 1)),
            NodeRecord::new(NodeId::random(), Endpoint::new(Ipv4Addr::new(5, 6, 7, 8), 2)),
        ];
        let encoded = encode_nodes(&nodes);
        assert_eq!(encoded.len(), nodes.len() * RECORD_LEN);
        assert_eq!(decode_nodes(&encoded).unwrap(), nodes);
    }

    #[test]
    fn decode_nodes_fails_iff_not_multiple_of_26() {
        assert!(decode_nodes(&vec![0u8; 26]).is_ok());
        assert!(decode_nodes(&vec![0u8; 25]).is_err());
        assert!(decode_nodes(&vec![0u8; 52]).is_ok());
        assert!(decode_nodes(&vec![0u8; 27]).is_err());
    }

    #[test]
    fn peers_round_trip() {
        let peers = vec![
            Endpoint::new(Ipv4Addr::new(1, 2, 3, 4), 1),
            Endpoint::new(Ipv4Addr::new(5, 6, 7, 8), 2),
        ];
        let encoded = encode_peers(&peers);
        assert_eq!(decode_peers(&encoded).unwrap(), peers);
    }
}
