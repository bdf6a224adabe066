//! A single known peer's identity, address, and freshness state.

use crate::endpoint::Endpoint;
use crate::id::NodeId;
use std::time::{Duration, Instant};

/// Freshness threshold below which a node is considered fresh.
pub const FRESH_THRESHOLD: Duration = Duration::from_secs(15 * 60);
/// Freshness threshold above which a node is considered dead.
pub const DEAD_THRESHOLD: Duration = Duration::from_secs(30 * 60);

/// A node's identity and address, as stored in a routing-table bucket.
///
/// Equality and ordering are structural on both fields: `Ord` orders by
/// `id` first, then `addr`, which is exactly the deterministic
/// lexicographic tie-break `RoutingTable::k_closest` needs when two
/// candidates are equidistant from a target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeRecord {
    pub id: NodeId,
    pub addr: Endpoint,
}

impl NodeRecord {
    #[must_use]
    pub const fn new(id: NodeId, addr: Endpoint) -> Self {
        Self { id, addr }
    }
}

/// Liveness bookkeeping for one `NodeRecord`.
///
/// Created on first insertion into a bucket; mutated only by `renew()`
/// on an observed response. `last_response` never decreases.
#[derive(Clone, Copy, Debug)]
pub struct LivenessStat {
    first_seen: Instant,
    last_response: Instant,
}

impl LivenessStat {
    /// A freshly observed node: both timestamps are "now".
    #[must_use]
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            first_seen: now,
            last_response: now,
        }
    }

    /// Record a new observed response.
    pub fn renew(&mut self) {
        self.last_response = Instant::now();
    }

    #[must_use]
    pub const fn first_seen(&self) -> Instant {
        self.first_seen
    }

    #[must_use]
    pub const fn last_response(&self) -> Instant {
        self.last_response
    }

    /// Freshness rate: positive while fresh, zero while stale, negative
    /// once dead. Elapsed time is read as total seconds (`Duration`
    /// makes any days-truncation reading structurally unreachable), per
    /// the spec's resolution of the original implementation's ambiguity.
    ///
    /// The fresh branch returns a value in `[1.0, 1.5)` that grows with
    /// elapsed time rather than a flat `1.0`, mirroring the original's
    /// blend so two fresh nodes can still be ordered by recency if a
    /// caller wants finer-grained liveness comparisons.
    #[must_use]
    pub fn rate(&self) -> f64 {
        let elapsed = self.last_response.elapsed();
        if elapsed < FRESH_THRESHOLD {
            elapsed.as_secs_f64() / DEAD_THRESHOLD.as_secs_f64() + 1.0
        } else if elapsed > DEAD_THRESHOLD {
            -1.0
        } else {
            0.0
        }
    }

    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.rate() > 0.0
    }

    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.rate() < 0.0
    }

    /// Back-date this stat by `age`, for tests that need to simulate a
    /// node that has gone stale or dead without sleeping in real time.
    #[cfg(test)]
    pub(crate) fn age_by(&mut self, age: Duration) {
        self.first_seen -= age;
        self.last_response -= age;
    }
}

impl Default for LivenessStat {
    fn default() -> Self {
        Self::new()
    }
}
