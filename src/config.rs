//! Tunable constants, gathered into one `Default`-able struct so tests
//! can shrink timeouts/cadences without touching core logic (grounded
//! on the teacher's `NodeConfig`/`BootstrapConfig::with_defaults`
//! pattern in `wraith-cli`/`wraith-discovery`).

use std::time::Duration;

/// Tunables for a `DhtNode` and the subsystems it owns.
#[derive(Clone, Copy, Debug)]
pub struct DhtConfig {
    /// Bucket capacity / lookup fan-out (`k`).
    pub k: usize,
    /// Below this age since `last_response`, a node is fresh.
    pub fresh_threshold: Duration,
    /// Above this age since `last_response`, a node is dead.
    pub dead_threshold: Duration,
    /// How long an announced peer is retained without renewal.
    pub peer_ttl: Duration,
    /// Cadence of the refresh/rotate-salts/forget-torrents tasks.
    pub periodic_interval: Duration,
    /// Per-call timeout for a single remote RPC.
    pub rpc_timeout: Duration,
    /// Safety cap on lookup rounds, guarding against non-convergence.
    pub max_lookup_rounds: usize,
}

impl Default for DhtConfig {
    fn default() -> Self {
        Self {
            k: 8,
            fresh_threshold: Duration::from_secs(15 * 60),
            dead_threshold: Duration::from_secs(30 * 60),
            peer_ttl: Duration::from_secs(30 * 60),
            periodic_interval: Duration::from_secs(60),
            rpc_timeout: Duration::from_secs(3),
            max_lookup_rounds: 32,
        }
    }
}
