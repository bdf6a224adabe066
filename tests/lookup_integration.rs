//! End-to-end convergent lookup over a handful of simulated nodes
//! wired together through an in-memory `Transport`, each one routing a
//! `find_node` toward its two closest known neighbors.

use async_trait::async_trait;
use mdht::lookup::{LookupEngine, Operation};
use mdht::node_record::NodeRecord;
use mdht::routing::{self, RoutingTable};
use mdht::transport::{RpcArgs, RpcResult, Transport, TransportError};
use mdht::{Endpoint, NodeId};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

struct SimulatedSwarm {
    by_addr: HashMap<Endpoint, NodeId>,
    all: Vec<NodeRecord>,
}

#[async_trait]
impl Transport for SimulatedSwarm {
    async fn call_remote(&self, addr: Endpoint, args: RpcArgs) -> Result<(Endpoint, RpcResult), TransportError> {
        let responder_id = *self.by_addr.get(&addr).expect("unknown address dialed");
        match args {
            RpcArgs::FindNode { target, .. } => {
                let mut nodes = self.all.clone();
                nodes.sort_by_key(|n| n.id.distance(&target));
                nodes.truncate(2);
                Ok((addr, RpcResult::FindNode { id: responder_id, nodes }))
            }
            RpcArgs::Ping { .. } => Ok((addr, RpcResult::Ping { id: responder_id })),
            _ => Err(TransportError::Protocol("unsupported in this simulation".into())),
        }
    }
}

fn endpoint(last: u8) -> Endpoint {
    Endpoint::new(Ipv4Addr::new(192, 168, 1, last), 6881)
}

#[tokio::test]
async fn convergent_lookup_reaches_closest_known_nodes_in_bounded_rounds() {
    let local_id = NodeId::ZERO;

    let swarm_size = 40u8;
    let mut by_addr = HashMap::new();
    let mut all = Vec::new();
    for i in 1..=swarm_size {
        let id = NodeId::from_u64(u64::from(i));
        let addr = endpoint(i);
        by_addr.insert(addr, id);
        all.push(NodeRecord::new(id, addr));
    }

    let transport = Arc::new(SimulatedSwarm { by_addr, all: all.clone() });

    let mut table = RoutingTable::new(local_id);
    table.add(all[0].id, all[0].addr);

    let engine = LookupEngine::new(transport, local_id, routing::K, Duration::from_secs(3), 32);
    let report = engine.run(local_id, Operation::FindNode, &mut table).await;

    assert!(report.rounds > 0, "lookup should take at least one round to converge");
    assert!(report.rounds < 32, "lookup should converge well before the iteration cap");

    let closest = table.k_closest(&local_id, routing::K);
    assert_eq!(closest.len(), routing::K.min(table.peer_count()));
    for pair in closest.windows(2) {
        assert!(pair[0].id.distance(&local_id) <= pair[1].id.distance(&local_id));
    }
}
