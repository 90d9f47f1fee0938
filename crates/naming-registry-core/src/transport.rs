//! KV transport contract
//!
//! The registry is built on four primitives of a strongly consistent
//! hierarchical key-value store. Implementations live in
//! `naming-registry-store`; the registry client only ever talks to this trait.

use async_trait::async_trait;

use crate::error::TransportResult;
use crate::node::KvNode;

/// Options for [`KvTransport::get`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GetOptions {
    /// Require a majority of replicas to agree on the result
    pub quorum: bool,
    /// Include children of nested directories
    pub recursive: bool,
}

impl GetOptions {
    /// Linearizable read of a single node.
    pub fn quorum() -> Self {
        Self {
            quorum: true,
            recursive: false,
        }
    }

    pub fn recursive(mut self) -> Self {
        self.recursive = true;
        self
    }
}

/// The store primitives the registry relies on.
///
/// Conditional operations must be atomic at the key level: the condition and
/// the write happen as one store operation.
#[async_trait]
pub trait KvTransport: Send + Sync {
    /// Write `value` at `key` only if no node exists there.
    async fn create(&self, key: &str, value: &str) -> TransportResult<()>;

    /// Replace the value at `key` only if it exists and currently equals `prev_value`.
    async fn compare_and_set(&self, key: &str, value: &str, prev_value: &str)
        -> TransportResult<()>;

    /// Fetch the node at `key`.
    async fn get(&self, key: &str, options: GetOptions) -> TransportResult<KvNode>;

    /// Remove the node at `key`, and its subtree when `recursive` is set.
    async fn delete(&self, key: &str, recursive: bool) -> TransportResult<()>;
}
