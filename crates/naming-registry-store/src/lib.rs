//! KV transports for the naming registry
//!
//! This crate provides implementations of [`naming_registry_core::KvTransport`]:
//! - [`EtcdTransport`]: the etcd v2 keys API over HTTP, with endpoint failover
//! - [`MemoryTransport`]: an in-process store with the same key semantics
//!
//! Neither adds behavior of its own; both report store outcomes as structured
//! [`naming_registry_core::StoreError`]s for the registry layer to classify.

pub mod etcd;
pub mod memory;
mod wire;

pub use etcd::{EtcdTransport, DEFAULT_REQUEST_TIMEOUT};
pub use memory::MemoryTransport;
