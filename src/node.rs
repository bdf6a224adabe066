//! `DhtNode`: binds routing table, peer store, token minter, and
//! transport together and exposes the three public operations
//! (spec §4.9).

use crate::config::DhtConfig;
use crate::endpoint::Endpoint;
use crate::handlers::QueryHandlers;
use crate::id::{InfoHash, NodeId};
use crate::lookup::{LookupEngine, Operation};
use crate::node_record::NodeRecord;
use crate::peer_store::PeerStore;
use crate::routing::RoutingTable;
use crate::scheduler::{PeriodicScheduler, SharedState};
use crate::token::TokenMinter;
use crate::transport::{InboundDispatch, RpcArgs, RpcResult, Transport, TransportError};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tracing::info;

/// A well-known bootstrap peer. `id` is optional since well-known
/// bootstrap nodes are often known only by address (supplemented
/// ambient plumbing, not present in the distilled operation list).
#[derive(Clone, Copy, Debug)]
pub struct BootstrapNode {
    pub id: Option<NodeId>,
    pub addr: Endpoint,
}

impl BootstrapNode {
    #[must_use]
    pub const fn by_addr(addr: Endpoint) -> Self {
        Self { id: None, addr }
    }

    #[must_use]
    pub const fn with_id(id: NodeId, addr: Endpoint) -> Self {
        Self { id: Some(id), addr }
    }
}

/// A standalone participant in the Mainline DHT.
pub struct DhtNode {
    local_id: NodeId,
    config: DhtConfig,
    transport: Arc<dyn Transport>,
    routing_table: RoutingTable,
    peer_store: PeerStore,
    token_minter: TokenMinter,
    handlers: QueryHandlers,
}

impl DhtNode {
    #[must_use]
    pub fn new(local_id: NodeId, transport: Arc<dyn Transport>, config: DhtConfig) -> Self {
        Self {
            local_id,
            config,
            transport,
            routing_table: RoutingTable::new(local_id),
            peer_store: PeerStore::new(),
            token_minter: TokenMinter::new(),
            handlers: QueryHandlers::new(),
        }
    }

    #[must_use]
    pub const fn local_id(&self) -> NodeId {
        self.local_id
    }

    #[must_use]
    pub const fn routing_table(&self) -> &RoutingTable {
        &self.routing_table
    }

    pub fn routing_table_mut(&mut self) -> &mut RoutingTable {
        &mut self.routing_table
    }

    #[must_use]
    pub const fn handlers(&self) -> &QueryHandlers {
        &self.handlers
    }

    pub fn peer_store_mut(&mut self) -> &mut PeerStore {
        &mut self.peer_store
    }

    pub fn token_minter(&self) -> &TokenMinter {
        &self.token_minter
    }

    fn lookup_engine(&self) -> LookupEngine {
        LookupEngine::new(
            Arc::clone(&self.transport),
            self.local_id,
            self.config.k,
            self.config.rpc_timeout,
            self.config.max_lookup_rounds,
        )
    }

    /// Run a `FindNode` lookup toward our own id, seeded from `peers`
    /// rather than from table state (bootstrap peers are raw addresses
    /// we haven't confirmed are live yet; they enter the routing table
    /// only once they actually respond, via the lookup round's normal
    /// responder-insertion step).
    pub async fn bootstrap(&mut self, peers: &[BootstrapNode]) {
        let seed: Vec<NodeRecord> = peers.iter().map(|p| NodeRecord::new(p.id.unwrap_or_else(NodeId::random), p.addr)).collect();

        let local_id = self.local_id;
        let report = self.lookup_engine().run_from(local_id, Operation::FindNode, seed, &mut self.routing_table).await;
        info!(rounds = report.rounds, "bootstrap converged");
    }

    /// Discover peers announced for `info_hash` via an iterative
    /// `GetPeers` lookup.
    pub async fn get_peers(&mut self, info_hash: InfoHash) -> Vec<Endpoint> {
        let report = self.lookup_engine().run(info_hash, Operation::GetPeers, &mut self.routing_table).await;
        report.values
    }

    /// Announce this node as a peer-holder for `info_hash`. When `port`
    /// is `None`, `implied_port` is used so the remote records our UDP
    /// source port instead.
    pub async fn announce(&mut self, info_hash: InfoHash, port: Option<u16>) {
        self.lookup_engine().run(info_hash, Operation::Announce { port }, &mut self.routing_table).await;
    }

    /// Move the node's state behind a shared lock, register its query
    /// handlers as the transport's inbound dispatcher, and spawn the
    /// refresh/rotate-salts/forget-torrents background loops. Once
    /// called, inbound query handling and the periodic loops both go
    /// through [`SharedState`] rather than `&mut self`.
    #[must_use]
    pub fn into_shared(self) -> (Arc<SharedState>, PeriodicScheduler) {
        let state = Arc::new(SharedState {
            local_id: self.local_id,
            routing_table: Mutex::new(self.routing_table),
            peer_store: Mutex::new(self.peer_store),
            token_minter: Mutex::new(self.token_minter),
        });

        let dispatcher: Arc<dyn InboundDispatch> = Arc::new(NodeDispatcher { state: Arc::clone(&state), handlers: self.handlers });
        self.transport.register_callback(dispatcher);
        self.transport.connection_made();

        let scheduler = PeriodicScheduler::spawn(Arc::clone(&state), Arc::clone(&self.transport), self.config);
        (state, scheduler)
    }
}

/// Routes inbound KRPC queries against a node's [`SharedState`]; the
/// counterpart this crate registers with a [`Transport`] for its four
/// `register_callback`ed methods in the original.
struct NodeDispatcher {
    state: Arc<SharedState>,
    handlers: QueryHandlers,
}

#[async_trait]
impl InboundDispatch for NodeDispatcher {
    async fn dispatch(&self, sender: Endpoint, sender_id: NodeId, args: RpcArgs) -> Result<RpcResult, TransportError> {
        let local_id = self.state.local_id;

        match args {
            RpcArgs::Ping { .. } => {
                let mut table = self.state.routing_table.lock().unwrap();
                Ok(self.handlers.ping(local_id, &mut table, sender, sender_id))
            }
            RpcArgs::FindNode { target, .. } => {
                let mut table = self.state.routing_table.lock().unwrap();
                Ok(self.handlers.find_node(local_id, &mut table, sender, sender_id, target))
            }
            RpcArgs::GetPeers { info_hash, .. } => {
                let mut table = self.state.routing_table.lock().unwrap();
                let store = self.state.peer_store.lock().unwrap();
                let minter = self.state.token_minter.lock().unwrap();
                Ok(self.handlers.get_peers(local_id, &mut table, &store, &minter, sender, sender_id, info_hash))
            }
            RpcArgs::AnnouncePeer { info_hash, port, token, implied_port, .. } => {
                let mut table = self.state.routing_table.lock().unwrap();
                let mut store = self.state.peer_store.lock().unwrap();
                let minter = self.state.token_minter.lock().unwrap();
                self.handlers
                    .announce_peer(local_id, &mut table, &mut store, &minter, sender, sender_id, info_hash, port, &token, implied_port)
                    .map_err(|err| TransportError::Protocol(err.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    struct EchoTransport;

    #[async_trait]
    impl Transport for EchoTransport {
        async fn call_remote(&self, addr: Endpoint, args: RpcArgs) -> Result<(Endpoint, RpcResult), TransportError> {
            match args {
                RpcArgs::FindNode { .. } => Ok((addr, RpcResult::FindNode { id: NodeId::random(), nodes: Vec::new() })),
                _ => Ok((addr, RpcResult::Ping { id: NodeId::random() })),
            }
        }
    }

    #[tokio::test]
    async fn bootstrap_with_no_peers_converges_immediately() {
        let mut node = DhtNode::new(NodeId::random(), Arc::new(EchoTransport), DhtConfig::default());
        node.bootstrap(&[]).await;
        assert_eq!(node.routing_table().peer_count(), 0);
    }

    #[tokio::test]
    async fn bootstrap_seeds_routing_table_from_provided_peers() {
        let mut node = DhtNode::new(NodeId::random(), Arc::new(EchoTransport), DhtConfig::default());
        let seed = BootstrapNode::by_addr(Endpoint::new(Ipv4Addr::new(1, 2, 3, 4), 6881));
        node.bootstrap(&[seed]).await;
        assert!(node.routing_table().peer_count() >= 1);
    }

    #[tokio::test]
    async fn get_peers_on_empty_table_returns_empty() {
        let mut node = DhtNode::new(NodeId::random(), Arc::new(EchoTransport), DhtConfig::default());
        let peers = node.get_peers(NodeId::random()).await;
        assert!(peers.is_empty());
    }

    /// A transport whose only job is to capture whatever `into_shared`
    /// registers with it, so the test can drive an inbound query
    /// through the same path a real socket would use.
    #[derive(Default)]
    struct RecordingTransport {
        registered: std::sync::Mutex<Option<Arc<dyn InboundDispatch>>>,
        connection_made_called: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn call_remote(&self, addr: Endpoint, _args: RpcArgs) -> Result<(Endpoint, RpcResult), TransportError> {
            Ok((addr, RpcResult::Ping { id: NodeId::random() }))
        }

        fn register_callback(&self, handler: Arc<dyn InboundDispatch>) {
            *self.registered.lock().unwrap() = Some(handler);
        }

        fn connection_made(&self) {
            self.connection_made_called.store(true, std::sync::atomic::Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn into_shared_wires_inbound_queries_to_the_registered_transport() {
        let local_id = NodeId::from_u64(1);
        let transport = Arc::new(RecordingTransport::default());
        let node = DhtNode::new(local_id, Arc::clone(&transport) as Arc<dyn Transport>, DhtConfig::default());

        let (state, scheduler) = node.into_shared();
        assert!(transport.connection_made_called.load(std::sync::atomic::Ordering::SeqCst));

        let dispatcher = transport.registered.lock().unwrap().clone().expect("callback was registered");
        let sender = Endpoint::new(Ipv4Addr::new(1, 2, 3, 4), 6881);
        let sender_id = NodeId::from_u64(2);

        let result = dispatcher.dispatch(sender, sender_id, RpcArgs::Ping { id: sender_id }).await.unwrap();
        assert!(matches!(result, RpcResult::Ping { id } if id == local_id));
        assert!(state.routing_table.lock().unwrap().contains(&sender_id));

        scheduler.shutdown();
    }
}
