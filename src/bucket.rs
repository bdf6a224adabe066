//! Bounded set of `NodeRecord`s over an id range, with eviction.

use crate::endpoint::Endpoint;
use crate::id::NodeId;
use crate::node_record::{LivenessStat, NodeRecord};
use std::collections::VecDeque;

/// Kademlia bucket capacity (`k` in the spec).
pub const CAPACITY: usize = 8;

/// A bucket covering the half-open id range `[range_min, range_max)`.
/// `range_max = None` means the range extends to the top of the id
/// space (2^160, one past the largest representable `NodeId`).
///
/// Ordered by insertion so refresh/eviction iteration is deterministic,
/// per the spec's design notes (§9) on preferring an ordered container
/// over an unordered map.
#[derive(Clone, Debug)]
pub struct Bucket {
    range_min: NodeId,
    range_max: Option<NodeId>,
    capacity: usize,
    nodes: VecDeque<(NodeRecord, LivenessStat)>,
}

/// Outcome of a bucket insert attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The node was new and freshly inserted, or already present and
    /// renewed.
    Inserted,
    /// The bucket is full of live nodes; caller may want to split.
    Refused,
}

impl Bucket {
    #[must_use]
    pub fn new(range_min: NodeId, range_max: Option<NodeId>) -> Self {
        Self::with_capacity(range_min, range_max, CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(range_min: NodeId, range_max: Option<NodeId>, capacity: usize) -> Self {
        Self {
            range_min,
            range_max,
            capacity,
            nodes: VecDeque::new(),
        }
    }

    #[must_use]
    pub const fn range_min(&self) -> &NodeId {
        &self.range_min
    }

    #[must_use]
    pub const fn range_max(&self) -> Option<&NodeId> {
        self.range_max.as_ref()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether `id` falls within `[range_min, range_max)`.
    #[must_use]
    pub fn id_in_range(&self, id: &NodeId) -> bool {
        *id >= self.range_min && self.range_max.is_none_or(|max| *id < max)
    }

    /// Whether this bucket's range is wide enough to be split (at
    /// least `capacity` ids across).
    #[must_use]
    pub fn is_splittable(&self) -> bool {
        crate::id::range_width_at_least(&self.range_min, self.range_max.as_ref(), self.capacity as u64)
    }

    /// The median point of this bucket's range, used by
    /// `RoutingTable::split`.
    #[must_use]
    pub(crate) fn median(&self) -> NodeId {
        crate::id::range_median(&self.range_min, self.range_max.as_ref())
    }

    /// Insert or renew a node.
    ///
    /// Inserting a node whose id is outside this bucket's range is a
    /// programmer error and panics, per spec §4.1.
    pub fn add(&mut self, node: NodeRecord) -> InsertOutcome {
        assert!(
            self.id_in_range(&node.id),
            "node id {} is out of bucket range [{}, {:?})",
            node.id,
            self.range_min,
            self.range_max
        );

        if let Some(pos) = self.nodes.iter().position(|(n, _)| *n == node) {
            self.nodes[pos].1.renew();
            return InsertOutcome::Inserted;
        }

        if self.nodes.len() < self.capacity {
            self.nodes.push_back((node, LivenessStat::new()));
            return InsertOutcome::Inserted;
        }

        let dead: Vec<usize> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, (_, stat))| stat.is_dead())
            .map(|(i, _)| i)
            .collect();

        if dead.is_empty() {
            return InsertOutcome::Refused;
        }

        for idx in dead.into_iter().rev() {
            self.nodes.remove(idx);
        }
        self.add(node)
    }

    /// Nodes whose freshness rate is positive.
    #[must_use]
    pub fn live_nodes(&self) -> Vec<NodeRecord> {
        self.nodes
            .iter()
            .filter(|(_, stat)| stat.is_fresh())
            .map(|(n, _)| *n)
            .collect()
    }

    /// Every `(id, addr)` pair in the bucket regardless of liveness,
    /// used by `RoutingTable::k_closest` and `split`.
    #[must_use]
    pub fn all_nodes(&self) -> Vec<NodeRecord> {
        self.nodes.iter().map(|(n, _)| *n).collect()
    }

    /// All `(node, stat)` pairs, preserved across a split.
    pub(crate) fn drain_all(&mut self) -> Vec<(NodeRecord, LivenessStat)> {
        self.nodes.drain(..).collect()
    }

    /// Re-insert a node with a preserved `LivenessStat`, bypassing the
    /// renew-on-exists / evict-on-full path used by `add`. Used when
    /// redistributing nodes across a split.
    pub(crate) fn insert_preserving_stat(&mut self, node: NodeRecord, stat: LivenessStat) {
        self.nodes.push_back((node, stat));
    }

    /// Insert `node` even if the bucket is already at capacity. Used by
    /// `RoutingTable::add` when a single split doesn't separate a new
    /// node from the bucket's existing members (they all share too
    /// long a common prefix): the bucket is left over capacity with a
    /// split still pending rather than recursing into further splits.
    pub(crate) fn insert_over_capacity(&mut self, node: NodeRecord) -> InsertOutcome {
        if let Some(pos) = self.nodes.iter().position(|(n, _)| *n == node) {
            self.nodes[pos].1.renew();
        } else {
            self.nodes.push_back((node, LivenessStat::new()));
        }
        InsertOutcome::Inserted
    }

    /// Endpoints of nodes whose freshness is non-positive (stale or
    /// dead): candidates the scheduler should ping.
    #[must_use]
    pub fn nodes_for_refresh(&self) -> Vec<Endpoint> {
        self.nodes
            .iter()
            .filter(|(_, stat)| stat.rate() <= 0.0)
            .map(|(n, _)| n.addr)
            .collect()
    }

    #[must_use]
    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.iter().any(|(n, _)| n.id == *id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn node(byte: u8) -> NodeRecord {
        NodeRecord::new(
            NodeId::from_u64(u64::from(byte)),
            Endpoint::new(Ipv4Addr::new(127, 0, 0, 1), 1000 + u16::from(byte)),
        )
    }

    #[test]
    fn insert_fills_up_to_capacity() {
        let mut bucket = Bucket::with_capacity(NodeId::ZERO, None, 3);
        for i in 1..=3 {
            assert_eq!(bucket.add(node(i)), InsertOutcome::Inserted);
        }
        assert_eq!(bucket.len(), 3);
        assert_eq!(bucket.add(node(4)), InsertOutcome::Refused);
    }

    #[test]
    fn insert_existing_node_renews_instead_of_duplicating() {
        let mut bucket = Bucket::with_capacity(NodeId::ZERO, None, 3);
        bucket.add(node(1));
        bucket.add(node(1));
        assert_eq!(bucket.len(), 1);
    }

    #[test]
    fn full_bucket_with_dead_node_accepts_after_eviction() {
        let mut bucket = Bucket::with_capacity(NodeId::ZERO, None, 1);
        bucket.add(node(1));
        // Back-date the sole occupant past the dead threshold.
        let mut drained = bucket.drain_all();
        let (n, mut stat) = drained.pop().unwrap();
        stat.age_by(std::time::Duration::from_secs(31 * 60));
        bucket.insert_preserving_stat(n, stat);

        assert_eq!(bucket.add(node(2)), InsertOutcome::Inserted);
        assert_eq!(bucket.len(), 1);
        assert!(bucket.contains(&NodeId::from_u64(2)));
    }

    #[test]
    fn out_of_range_insert_panics() {
        let mut bucket = Bucket::with_capacity(NodeId::from_u64(10), Some(NodeId::from_u64(20)), 8);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            bucket.add(node(1));
        }));
        assert!(result.is_err());
    }

    #[test]
    fn id_in_range_respects_half_open_bounds() {
        let bucket = Bucket::with_capacity(NodeId::from_u64(10), Some(NodeId::from_u64(20)), 8);
        assert!(bucket.id_in_range(&NodeId::from_u64(10)));
        assert!(bucket.id_in_range(&NodeId::from_u64(19)));
        assert!(!bucket.id_in_range(&NodeId::from_u64(20)));
        assert!(!bucket.id_in_range(&NodeId::from_u64(9)));
    }

    #[test]
    fn narrow_bucket_is_not_splittable() {
        let bucket = Bucket::with_capacity(NodeId::from_u64(0), Some(NodeId::from_u64(4)), 8);
        assert!(!bucket.is_splittable());
    }

    #[test]
    fn wide_bucket_is_splittable() {
        let bucket = Bucket::with_capacity(NodeId::ZERO, None, 8);
        assert!(bucket.is_splittable());
    }
}
