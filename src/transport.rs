//! The boundary to the external KRPC-over-UDP transport: bencode
//! framing, transaction matching, and wire-level timeouts all live on
//! the other side of this trait (out of scope here).

use crate::endpoint::Endpoint;
use crate::id::{InfoHash, NodeId};
use crate::node_record::NodeRecord;
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Typed arguments for the four KRPC methods this node issues.
#[derive(Clone, Debug)]
pub enum RpcArgs {
    Ping { id: NodeId },
    FindNode { id: NodeId, target: NodeId },
    GetPeers { id: NodeId, info_hash: InfoHash },
    AnnouncePeer { id: NodeId, info_hash: InfoHash, port: u16, token: Vec<u8>, implied_port: bool },
}

/// Typed results for the four KRPC methods.
#[derive(Clone, Debug)]
pub enum RpcResult {
    Ping { id: NodeId },
    FindNode { id: NodeId, nodes: Vec<NodeRecord> },
    /// `get_peers` carries either `values` (peers known for the
    /// info-hash) or `nodes` (closer routing candidates), never both.
    GetPeers { id: NodeId, token: Vec<u8>, values: Vec<Endpoint>, nodes: Vec<NodeRecord> },
    AnnouncePeer { id: NodeId },
}

/// Failure modes visible at the transport boundary. Every variant
/// collapses to `None` once it reaches `LookupEngine`/`DhtNode` — they
/// exist only so a `Transport` impl and its tests have something
/// concrete to report.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("rpc timed out")]
    Timeout,
    #[error("remote returned a protocol error: {0}")]
    Protocol(String),
    #[error("outbound or inbound schema violation: {0}")]
    Schema(String),
    #[error("transport io error: {0}")]
    Io(String),
}

/// A future the transport runs to completion as a background task,
/// the role `aiobtdht`'s `_run_future` hook plays for periodic
/// coroutines (spec §2, §6).
pub type SpawnedFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Inbound dispatch surface: decodes and answers one KRPC query
/// against this node's state. `DhtNode` registers an implementation of
/// this with its `Transport` once it goes into shared mode, the same
/// role `aiobtdht`'s `register_callback`-wired handler methods play
/// (spec §2's data flow from inbound datagram to `QueryHandlers`).
#[async_trait]
pub trait InboundDispatch: Send + Sync {
    /// Answer one inbound query from `sender`, claiming `sender_id` as
    /// the KRPC `id` argument.
    async fn dispatch(&self, sender: Endpoint, sender_id: NodeId, args: RpcArgs) -> Result<RpcResult, TransportError>;
}

/// External collaborator: encodes/decodes KRPC messages, matches
/// transactions, and enforces the wire-level timeout. This crate only
/// consumes it.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue one RPC to `addr` and await its response or failure.
    async fn call_remote(&self, addr: Endpoint, args: RpcArgs) -> Result<(Endpoint, RpcResult), TransportError>;

    /// Register the handler that answers inbound queries this
    /// transport decodes off the wire. Transports used only to drive
    /// outbound lookups (most of this crate's tests) can leave this a
    /// no-op.
    fn register_callback(&self, handler: Arc<dyn InboundDispatch>) {
        let _ = handler;
    }

    /// Called once the underlying socket is bound and ready to
    /// receive, after `register_callback`.
    fn connection_made(&self) {}

    /// Spawn `fut` as a background task on the transport's runtime.
    fn run_future(&self, fut: SpawnedFuture) {
        tokio::spawn(fut);
    }
}
