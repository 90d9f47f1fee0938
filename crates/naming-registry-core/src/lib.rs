//! Core types for the naming registry
//!
//! This crate defines the vocabulary shared by every other crate in the
//! workspace:
//! - [`ServiceType`]: the value a registered name resolves to
//! - [`KvNode`] / [`NodeKind`]: what the backing store returns for a key
//! - [`KvTransport`]: the four store primitives the registry is built on
//! - [`TransportError`] / [`RegistryError`]: store-level and registry-level failures

pub mod error;
pub mod node;
pub mod service_type;
pub mod transport;

pub use error::{
    RegistryError, RegistryResult, StoreError, StoreErrorCode, TransportError, TransportResult,
};
pub use node::{KvNode, NodeKind};
pub use service_type::ServiceType;
pub use transport::{GetOptions, KvTransport};
