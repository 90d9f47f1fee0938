//! Naming registry client
//!
//! Reserve, resolve, update, remove and enumerate names in a hierarchical
//! namespace kept in a strongly consistent KV store. Each name maps to a
//! [`ServiceType`].
//!
//! ```no_run
//! use naming_registry_service::{RegistryClient, ServiceType};
//!
//! # async fn demo() -> Result<(), naming_registry_service::RegistryError> {
//! let client = RegistryClient::connect(["http://127.0.0.1:2379"])?;
//! client.create("charms/mysql", ServiceType::CHARM).await?;
//! client
//!     .update("charms/mysql", ServiceType::CHARM, ServiceType::MODEL)
//!     .await?;
//! assert_eq!(client.read("charms/mysql").await?, ServiceType::MODEL);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;

pub use client::RegistryClient;
pub use config::{ClientConfig, ConfigError, ConfigResult};

// Re-export the vocabulary callers need alongside the client
pub use naming_registry_core::{
    GetOptions, KvNode, KvTransport, NodeKind, RegistryError, RegistryResult, ServiceType,
    StoreError, StoreErrorCode, TransportError, TransportResult,
};
pub use naming_registry_store::{EtcdTransport, MemoryTransport};
