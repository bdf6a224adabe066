//! Error taxonomy for the DHT core.
//!
//! Schema violations, RPC timeouts, and protocol-level KRPC errors all
//! collapse to `None` at the `Transport`/`LookupEngine` boundary (spec
//! §4.7, §7) rather than surfacing as `DhtError` — there is nothing for
//! a caller to branch on differently between those three cases.

use thiserror::Error;

/// Errors surfaced by the DHT core's own operations.
#[derive(Debug, Error)]
pub enum DhtError {
    /// A compact wire form had the wrong length.
    #[error("bad compact form length: expected multiple of {expected}, got {actual}")]
    BadLength { expected: usize, actual: usize },

    /// `announce_peer` presented a token that does not validate against
    /// any salt currently held by the `TokenMinter`.
    #[error("bad token")]
    BadToken,

    /// A bucket is full of live nodes and cannot accept an insert.
    #[error("bucket is full")]
    BucketFull,
}
