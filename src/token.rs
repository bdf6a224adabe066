//! Announce tokens: proof that a peer was recently told this node's
//! address via `get_peers`, required before `announce_peer` is honored.

use crate::endpoint::Endpoint;
use sha1::{Digest, Sha1};
use std::collections::VecDeque;

/// Number of salts kept at once. A token validates against any salt
/// still in the ring, so this bounds how long ago a `get_peers` token
/// can have been issued and still be accepted.
pub const SALT_RING_SIZE: usize = 10;

/// A single rotating-salt token value.
pub type Token = Vec<u8>;

/// Issues and validates `announce_peer` tokens from a ring of rotating
/// salts. `rotate()` is expected to be called periodically (the
/// 60-second cadence is owned by the scheduler, not this type).
#[derive(Debug)]
pub struct TokenMinter {
    salts: VecDeque<[u8; 8]>,
}

impl TokenMinter {
    /// A minter with one freshly generated salt.
    #[must_use]
    pub fn new() -> Self {
        let mut minter = Self { salts: VecDeque::new() };
        minter.rotate();
        minter
    }

    /// Prepend a new random salt, dropping the oldest once the ring
    /// exceeds [`SALT_RING_SIZE`].
    pub fn rotate(&mut self) {
        use rand::RngCore;
        let mut salt = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut salt);
        self.salts.push_front(salt);
        self.salts.truncate(SALT_RING_SIZE);
    }

    /// Issue a token for `addr`, hashed against the newest salt.
    #[must_use]
    pub fn issue(&self, addr: Endpoint) -> Token {
        let salt = self.salts.front().expect("minter always holds at least one salt");
        hash(addr, salt)
    }

    /// Validate `token` against `addr`: true iff it matches the hash
    /// produced by any salt still held in the ring.
    #[must_use]
    pub fn validate(&self, addr: Endpoint, token: &[u8]) -> bool {
        self.salts.iter().any(|salt| hash(addr, salt) == token)
    }
}

impl Default for TokenMinter {
    fn default() -> Self {
        Self::new()
    }
}

fn hash(addr: Endpoint, salt: &[u8]) -> Token {
    let mut hasher = Sha1::new();
    hasher.update(addr.token_string().as_bytes());
    hasher.update(salt);
    hasher.finalize().to_vec()
}
