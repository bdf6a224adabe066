//! Kademlia-based BitTorrent Mainline DHT node.
//!
//! A participant in the overlay: a routing table of known peers
//! organized by XOR distance, an iterative lookup engine shared by
//! bootstrap/peer-discovery/announce, and query/response state (token
//! issuance, peer store). The KRPC-over-UDP wire format, bencode
//! framing, and transaction matching are external collaborators
//! reached through [`transport::Transport`]; this crate only defines
//! the typed shapes that boundary produces and consumes.

pub mod bucket;
pub mod codec;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod handlers;
pub mod id;
pub mod lookup;
pub mod node;
pub mod node_record;
pub mod peer_store;
pub mod routing;
pub mod scheduler;
pub mod token;
pub mod transport;

pub use config::DhtConfig;
pub use endpoint::Endpoint;
pub use error::DhtError;
pub use id::{InfoHash, NodeId};
pub use node::{BootstrapNode, DhtNode};
pub use transport::{InboundDispatch, RpcArgs, RpcResult, SpawnedFuture, Transport, TransportError};
