//! Inbound query handling: the four KRPC methods this node answers.
//!
//! Every handler refreshes the routing table with the sender before
//! doing anything else (spec §4.5); results always carry `id = local_id`.

use crate::endpoint::Endpoint;
use crate::error::DhtError;
use crate::id::{InfoHash, NodeId};
use crate::peer_store::PeerStore;
use crate::routing::RoutingTable;
use crate::token::TokenMinter;
use crate::transport::RpcResult;

/// Stateless dispatcher for inbound queries; all mutable state it
/// touches is borrowed from the owning `DhtNode`.
#[derive(Debug, Default)]
pub struct QueryHandlers;

impl QueryHandlers {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    pub fn ping(&self, local_id: NodeId, routing_table: &mut RoutingTable, sender: Endpoint, sender_id: NodeId) -> RpcResult {
        routing_table.add(sender_id, sender);
        RpcResult::Ping { id: local_id }
    }

    pub fn find_node(
        &self,
        local_id: NodeId,
        routing_table: &mut RoutingTable,
        sender: Endpoint,
        sender_id: NodeId,
        target: NodeId,
    ) -> RpcResult {
        routing_table.add(sender_id, sender);
        RpcResult::FindNode { id: local_id, nodes: routing_table.k_closest(&target, crate::routing::K) }
    }

    pub fn get_peers(
        &self,
        local_id: NodeId,
        routing_table: &mut RoutingTable,
        peer_store: &PeerStore,
        token_minter: &TokenMinter,
        sender: Endpoint,
        sender_id: NodeId,
        info_hash: InfoHash,
    ) -> RpcResult {
        routing_table.add(sender_id, sender);
        let token = token_minter.issue(sender);
        let values = peer_store.get_peers(&info_hash);
        if values.is_empty() {
            RpcResult::GetPeers { id: local_id, token, values: Vec::new(), nodes: routing_table.k_closest(&info_hash, crate::routing::K) }
        } else {
            RpcResult::GetPeers { id: local_id, token, values, nodes: Vec::new() }
        }
    }

    /// # Errors
    ///
    /// Returns [`DhtError::BadToken`] if `token` does not validate
    /// against `sender`; `peer_store` is left unmodified in that case.
    pub fn announce_peer(
        &self,
        local_id: NodeId,
        routing_table: &mut RoutingTable,
        peer_store: &mut PeerStore,
        token_minter: &TokenMinter,
        sender: Endpoint,
        sender_id: NodeId,
        info_hash: InfoHash,
        port: u16,
        token: &[u8],
        implied_port: bool,
    ) -> Result<RpcResult, DhtError> {
        routing_table.add(sender_id, sender);
        if !token_minter.validate(sender, token) {
            return Err(DhtError::BadToken);
        }
        peer_store.record_peer(info_hash, sender, port, implied_port);
        Ok(RpcResult::AnnouncePeer { id: local_id })
    }
}
