//! Storage of peers announced against info-hashes via `announce_peer`.

use crate::endpoint::Endpoint;
use crate::id::InfoHash;
use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

/// How long an announced peer is retained without being refreshed by
/// another `announce_peer`.
pub const PEER_TTL: Duration = Duration::from_secs(30 * 60);

/// One peer announced against an info-hash.
///
/// `implied_port` mirrors BEP 5's `implied_port` argument: when set,
/// the port the peer is reachable on is the source port of the
/// announcing UDP packet rather than the `port` argument it sent.
#[derive(Debug, Clone, Copy)]
pub struct PeerInfo {
    from_ip: Ipv4Addr,
    from_port: u16,
    announced_port: u16,
    implied_port: bool,
    added: Instant,
}

impl PeerInfo {
    #[must_use]
    pub fn new(from_addr: Endpoint, announced_port: u16, implied_port: bool) -> Self {
        Self {
            from_ip: from_addr.ip,
            from_port: from_addr.port,
            announced_port,
            implied_port,
            added: Instant::now(),
        }
    }

    /// The effective endpoint this peer is reachable on, applying the
    /// `implied_port` rule.
    #[must_use]
    pub fn effective_endpoint(&self) -> Endpoint {
        let port = if self.implied_port { self.from_port } else { self.announced_port };
        Endpoint::new(self.from_ip, port)
    }

    #[must_use]
    pub fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.added) >= PEER_TTL
    }
}

impl PartialEq for PeerInfo {
    fn eq(&self, other: &Self) -> bool {
        self.effective_endpoint() == other.effective_endpoint()
    }
}
impl Eq for PeerInfo {}

impl std::hash::Hash for PeerInfo {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.effective_endpoint().hash(state);
    }
}

/// In-memory store of peers announced per info-hash (spec §4.4).
#[derive(Debug, Default)]
pub struct PeerStore {
    entries: HashMap<InfoHash, HashSet<PeerInfo>>,
}

impl PeerStore {
    #[must_use]
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    /// Record (or refresh) a peer announcement for `info_hash`.
    pub fn record_peer(&mut self, info_hash: InfoHash, from_addr: Endpoint, announced_port: u16, implied_port: bool) {
        let info = PeerInfo::new(from_addr, announced_port, implied_port);
        let set = self.entries.entry(info_hash).or_default();
        set.replace(info);
    }

    /// All live peers currently stored for `info_hash`.
    #[must_use]
    pub fn get_peers(&self, info_hash: &InfoHash) -> Vec<Endpoint> {
        let now = Instant::now();
        self.entries
            .get(info_hash)
            .into_iter()
            .flatten()
            .filter(|info| !info.is_expired(now))
            .map(PeerInfo::effective_endpoint)
            .collect()
    }

    #[must_use]
    pub fn contains_info_hash(&self, info_hash: &InfoHash) -> bool {
        self.entries.contains_key(info_hash)
    }

    /// Drop expired peers and any info-hash left with no peers (the
    /// scheduler's periodic `forget_torrents` task).
    pub fn evict_expired(&mut self) {
        let now = Instant::now();
        self.entries.retain(|_, peers| {
            peers.retain(|info| !info.is_expired(now));
            !peers.is_empty()
        });
    }

    #[must_use]
    pub fn info_hash_count(&self) -> usize {
        self.entries.len()
    }
}
