//! Periodic background tasks: table refresh, salt rotation, and
//! peer-store cleanup, each run at a fixed cadence for the node's
//! lifetime (spec §4.8).

use crate::config::DhtConfig;
use crate::endpoint::Endpoint;
use crate::id::NodeId;
use crate::peer_store::PeerStore;
use crate::routing::RoutingTable;
use crate::token::TokenMinter;
use crate::transport::{RpcArgs, RpcResult, Transport};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::debug;

/// Shared state the three periodic tasks mutate, behind a single
/// mutex: the one place spec §5's "exclusive-mutation guard" is
/// actually needed, since periodic tasks and externally-driven
/// handlers are logically concurrent writers.
pub struct SharedState {
    pub local_id: NodeId,
    pub routing_table: Mutex<RoutingTable>,
    pub peer_store: Mutex<PeerStore>,
    pub token_minter: Mutex<TokenMinter>,
}

/// Spawns the three `tokio::time::interval` loops and hands back their
/// join handles so a caller can abort them on shutdown (spec §9's note
/// on running periodics through explicit handles rather than cyclic
/// `Arc` references back into the node).
pub struct PeriodicScheduler {
    refresh: JoinHandle<()>,
    rotate: JoinHandle<()>,
    forget: JoinHandle<()>,
}

impl PeriodicScheduler {
    #[must_use]
    pub fn spawn(state: Arc<SharedState>, transport: Arc<dyn Transport>, config: DhtConfig) -> Self {
        let refresh = tokio::spawn(refresh_nodes_loop(Arc::clone(&state), transport, config));
        let rotate = tokio::spawn(rotate_salts_loop(Arc::clone(&state), config));
        let forget = tokio::spawn(forget_torrents_loop(state, config));
        Self { refresh, rotate, forget }
    }

    /// Stop all three loops immediately.
    pub fn shutdown(self) {
        self.refresh.abort();
        self.rotate.abort();
        self.forget.abort();
    }
}

async fn refresh_nodes_loop(state: Arc<SharedState>, transport: Arc<dyn Transport>, config: DhtConfig) {
    let mut interval = tokio::time::interval(config.periodic_interval);
    loop {
        interval.tick().await;
        let endpoints: Vec<Endpoint> = state.routing_table.lock().unwrap().enum_refresh_endpoints();
        debug!(count = endpoints.len(), "refresh_nodes tick");

        let futures = endpoints.into_iter().map(|addr| {
            let transport = Arc::clone(&transport);
            let local_id = state.local_id;
            let timeout = config.rpc_timeout;
            async move { tokio::time::timeout(timeout, transport.call_remote(addr, RpcArgs::Ping { id: local_id })).await }
        });
        let results = futures_util::future::join_all(futures).await;

        let mut table = state.routing_table.lock().unwrap();
        for result in results {
            if let Ok(Ok((addr, RpcResult::Ping { id }))) = result {
                table.add(id, addr);
            }
        }
    }
}

async fn rotate_salts_loop(state: Arc<SharedState>, config: DhtConfig) {
    let mut interval = tokio::time::interval(config.periodic_interval);
    loop {
        interval.tick().await;
        state.token_minter.lock().unwrap().rotate();
        debug!("rotate_salts tick");
    }
}

async fn forget_torrents_loop(state: Arc<SharedState>, config: DhtConfig) {
    let mut interval = tokio::time::interval(config.periodic_interval);
    loop {
        interval.tick().await;
        state.peer_store.lock().unwrap().evict_expired();
        debug!("forget_torrents tick");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportError;
    use async_trait::async_trait;

    struct NoopTransport;

    #[async_trait]
    impl Transport for NoopTransport {
        async fn call_remote(&self, addr: Endpoint, _args: RpcArgs) -> Result<(Endpoint, RpcResult), TransportError> {
            Ok((addr, RpcResult::Ping { id: NodeId::ZERO }))
        }
    }

    #[tokio::test]
    async fn scheduler_can_be_spawned_and_shut_down() {
        let state = Arc::new(SharedState {
            local_id: NodeId::random(),
            routing_table: Mutex::new(RoutingTable::new(NodeId::random())),
            peer_store: Mutex::new(PeerStore::new()),
            token_minter: Mutex::new(TokenMinter::new()),
        });
        let mut config = DhtConfig::default();
        config.periodic_interval = std::time::Duration::from_millis(10);

        let scheduler = PeriodicScheduler::spawn(state, Arc::new(NoopTransport), config);
        tokio::time::sleep(std::time::Duration::from_millis(25)).await;
        scheduler.shutdown();
    }
}
