//! Iterative convergent lookup: the shared engine behind bootstrap,
//! `get_peers`, and `announce` (spec §4.6).

use crate::endpoint::Endpoint;
use crate::id::NodeId;
use crate::node_record::NodeRecord;
use crate::routing::{self, RoutingTable};
use crate::transport::{RpcArgs, RpcResult, Transport};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Which KRPC method a lookup round dispatches, and what convergence
/// does afterward.
#[derive(Clone, Copy, Debug)]
pub enum Operation {
    /// Plain node discovery; used for bootstrap and table refresh.
    FindNode,
    /// Peer discovery for an info-hash; harvests tokens along the way
    /// in case the caller later wants to announce.
    GetPeers,
    /// Like `GetPeers`, but on convergence issues `announce_peer` to
    /// every endpoint a token was harvested from.
    Announce { port: Option<u16> },
}

/// Outcome of a completed lookup.
#[derive(Debug, Default, Clone)]
pub struct LookupReport {
    /// Peer endpoints accumulated from `get_peers` responses.
    pub values: Vec<Endpoint>,
    /// Number of rounds the search took before converging.
    pub rounds: usize,
}

/// Drives one iterative convergent search to completion.
pub struct LookupEngine {
    transport: Arc<dyn Transport>,
    local_id: NodeId,
    k: usize,
    rpc_timeout: Duration,
    max_rounds: usize,
}

impl LookupEngine {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, local_id: NodeId, k: usize, rpc_timeout: Duration, max_rounds: usize) -> Self {
        Self { transport, local_id, k, rpc_timeout, max_rounds }
    }

    /// Run `operation` toward `target`, seeding the frontier from
    /// `routing_table`'s current k-closest and writing any newly
    /// discovered nodes (from `FindNode` responses) back into it.
    pub async fn run(&self, target: NodeId, operation: Operation, routing_table: &mut RoutingTable) -> LookupReport {
        let seed = routing_table.k_closest(&target, self.k);
        self.run_from(target, operation, seed, routing_table).await
    }

    /// Like [`Self::run`], but the initial frontier is supplied
    /// explicitly rather than read from `routing_table`. Used by
    /// bootstrap, whose seed peers are not yet confirmed-live routing
    /// table members (spec §4.9's bootstrap seeds from raw addresses,
    /// not from table state).
    pub async fn run_from(
        &self,
        target: NodeId,
        operation: Operation,
        seed_frontier: Vec<NodeRecord>,
        routing_table: &mut RoutingTable,
    ) -> LookupReport {
        let mut known: HashSet<NodeId> = HashSet::new();
        let mut frontier: Vec<NodeRecord> = seed_frontier;
        let mut values: Vec<Endpoint> = Vec::new();
        let mut tokens: HashMap<Endpoint, Vec<u8>> = HashMap::new();
        let mut rounds = 0usize;

        while !frontier.is_empty() && rounds < self.max_rounds {
            rounds += 1;
            debug!(round = rounds, frontier = frontier.len(), "lookup round");

            let responses = self.dispatch_round(target, operation, &frontier).await;

            let mut candidate_pool: Vec<NodeRecord> = Vec::new();
            for (responder, result) in responses {
                match result {
                    RpcResult::FindNode { id, nodes } => {
                        if id == self.local_id {
                            continue;
                        }
                        routing_table.add(id, responder);
                        candidate_pool.extend(nodes);
                    }
                    RpcResult::GetPeers { id, token, values: v, nodes } => {
                        if id == self.local_id {
                            continue;
                        }
                        values.extend(v);
                        candidate_pool.extend(nodes);
                        tokens.insert(responder, token);
                    }
                    RpcResult::Ping { .. } | RpcResult::AnnouncePeer { .. } => {}
                }
            }

            let unseen: Vec<NodeRecord> = candidate_pool.iter().filter(|n| !known.contains(&n.id)).copied().collect();
            let closer = routing::k_closest_of(&target, unseen, |n| n.id, self.k);

            if closer.is_empty() {
                break;
            }
            known.extend(candidate_pool.iter().map(|n| n.id));
            frontier = closer;
        }

        if let Operation::Announce { port } = operation {
            self.announce_to_harvested(target, port, &tokens).await;
        }

        info!(rounds, values = values.len(), "lookup converged");
        LookupReport { values, rounds }
    }

    async fn dispatch_round(&self, target: NodeId, operation: Operation, frontier: &[NodeRecord]) -> Vec<(Endpoint, RpcResult)> {
        let futures = frontier.iter().map(|node| {
            let args = self.build_args(target, operation);
            let addr = node.addr;
            let transport = Arc::clone(&self.transport);
            let timeout = self.rpc_timeout;
            async move {
                match tokio::time::timeout(timeout, transport.call_remote(addr, args)).await {
                    Ok(Ok(response)) => Some(response),
                    Ok(Err(err)) => {
                        warn!(%addr, error = %err, "rpc failed");
                        None
                    }
                    Err(_) => {
                        warn!(%addr, "rpc timed out");
                        None
                    }
                }
            }
        });
        futures_util::future::join_all(futures).await.into_iter().flatten().collect()
    }

    fn build_args(&self, target: NodeId, operation: Operation) -> RpcArgs {
        match operation {
            Operation::FindNode => RpcArgs::FindNode { id: self.local_id, target },
            Operation::GetPeers | Operation::Announce { .. } => RpcArgs::GetPeers { id: self.local_id, info_hash: target },
        }
    }

    async fn announce_to_harvested(&self, info_hash: NodeId, port: Option<u16>, tokens: &HashMap<Endpoint, Vec<u8>>) {
        let futures = tokens.iter().map(|(addr, token)| {
            let args = RpcArgs::AnnouncePeer {
                id: self.local_id,
                info_hash,
                port: port.unwrap_or(0),
                token: token.clone(),
                implied_port: port.is_none(),
            };
            let transport = Arc::clone(&self.transport);
            let addr = *addr;
            async move {
                if let Err(err) = transport.call_remote(addr, args).await {
                    warn!(%addr, error = %err, "announce_peer failed");
                }
            }
        });
        futures_util::future::join_all(futures).await;
    }
}
