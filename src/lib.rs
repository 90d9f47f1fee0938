//! Shared fixtures for the naming registry integration tests

use naming_registry_service::{MemoryTransport, RegistryClient};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::Arc;

/// A client over a fresh, empty in-memory store.
pub fn memory_client() -> RegistryClient {
    RegistryClient::new(Arc::new(MemoryTransport::new()))
}

/// Two independent clients sharing one in-memory store.
pub fn memory_client_pair() -> (RegistryClient, RegistryClient) {
    let store = MemoryTransport::new();
    (
        RegistryClient::new(Arc::new(store.clone())),
        RegistryClient::new(Arc::new(store)),
    )
}

/// A namespace name no other test uses.
pub fn unique_namespace(prefix: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect();
    format!("{}-{}", prefix, suffix.to_lowercase())
}
