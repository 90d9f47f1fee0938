//! Registry client
//!
//! Maps the five registry operations onto single store primitives and turns
//! store outcomes into [`RegistryError`]s:
//!
//! | operation | primitive                                   | classified store codes |
//! |-----------|---------------------------------------------|------------------------|
//! | create    | conditional create (key must not exist)     | 105 -> `KeyExists` |
//! | update    | compare-and-set (key exists, value matches) | 100 -> `KeyNotFound`, 101 -> `PreconditionFailed` |
//! | read      | quorum get                                  | 100 -> `KeyNotFound` |
//! | delete    | recursive delete                            | 100 -> `KeyNotFound` |
//! | list      | non-quorum get                              | 100 -> `KeyNotFound` |
//!
//! Every other store failure is returned unmodified as
//! [`RegistryError::Transport`]. Nothing is retried and nothing is read before a
//! conditional write: concurrent creates and updates are arbitrated by the
//! store alone.

use naming_registry_core::{
    GetOptions, KvTransport, NodeKind, RegistryError, RegistryResult, ServiceType,
    StoreErrorCode, TransportError,
};
use naming_registry_store::EtcdTransport;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::config::ClientConfig;

/// Naming registry client
///
/// Holds nothing but a shared transport handle, so it is cheap to clone and
/// safe to use from many tasks at once.
#[derive(Clone)]
pub struct RegistryClient {
    transport: Arc<dyn KvTransport>,
    enforce_known_types: bool,
}

impl fmt::Debug for RegistryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryClient")
            .field("enforce_known_types", &self.enforce_known_types)
            .finish_non_exhaustive()
    }
}

impl RegistryClient {
    /// Create a client on top of an existing transport.
    pub fn new(transport: Arc<dyn KvTransport>) -> Self {
        Self {
            transport,
            enforce_known_types: false,
        }
    }

    /// Connect to an etcd cluster with the default per-request timeout.
    pub fn connect<I, S>(endpoints: I) -> RegistryResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let transport = EtcdTransport::with_default_timeout(endpoints)?;
        Ok(Self::new(Arc::new(transport)))
    }

    /// Connect to the etcd cluster described by `config`.
    pub fn from_config(config: &ClientConfig) -> RegistryResult<Self> {
        let transport = EtcdTransport::new(&config.endpoints, config.request_timeout())?;
        Ok(Self::new(Arc::new(transport)).with_known_types_enforced(config.enforce_known_types))
    }

    /// Reject service types outside [`ServiceType::known`] on create and update.
    pub fn with_known_types_enforced(mut self, enforce: bool) -> Self {
        self.enforce_known_types = enforce;
        self
    }

    pub fn enforces_known_types(&self) -> bool {
        self.enforce_known_types
    }

    fn check_service_type(&self, service_type: &ServiceType) -> RegistryResult<()> {
        if self.enforce_known_types && !service_type.is_known() {
            return Err(RegistryError::UnknownServiceType(service_type.clone()));
        }
        Ok(())
    }

    /// Register `name` with the given service type.
    ///
    /// Fails with [`RegistryError::KeyExists`] if anything, leaf or directory,
    /// already occupies `name`.
    #[instrument(skip(self))]
    pub async fn create(&self, name: &str, service_type: ServiceType) -> RegistryResult<()> {
        check_name(name)?;
        self.check_service_type(&service_type)?;

        match self.transport.create(name, service_type.as_str()).await {
            Ok(()) => {
                debug!(name = %name, service_type = %service_type, "Registered name");
                Ok(())
            }
            Err(err) if err.store_code() == Some(StoreErrorCode::NodeExist) => {
                Err(RegistryError::KeyExists(name.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Change the service type of `name` from `expected` to `new_type`.
    ///
    /// Compare-and-swap: succeeds only if `name` exists and still holds
    /// `expected`. Fails with [`RegistryError::KeyNotFound`] when the name is
    /// absent and [`RegistryError::PreconditionFailed`] when it holds another
    /// value.
    #[instrument(skip(self))]
    pub async fn update(
        &self,
        name: &str,
        expected: ServiceType,
        new_type: ServiceType,
    ) -> RegistryResult<()> {
        check_name(name)?;
        self.check_service_type(&new_type)?;

        let result = self
            .transport
            .compare_and_set(name, new_type.as_str(), expected.as_str())
            .await;

        match result {
            Ok(()) => {
                debug!(name = %name, from = %expected, to = %new_type, "Updated name");
                Ok(())
            }
            Err(err) => Err(match err.store_code() {
                Some(StoreErrorCode::KeyNotFound) => RegistryError::KeyNotFound(name.to_string()),
                Some(StoreErrorCode::TestFailed) => RegistryError::PreconditionFailed {
                    key: name.to_string(),
                    expected,
                },
                _ => err.into(),
            }),
        }
    }

    /// Resolve `name` with a quorum read.
    ///
    /// The stored value is returned verbatim, known or not.
    #[instrument(skip(self))]
    pub async fn read(&self, name: &str) -> RegistryResult<ServiceType> {
        check_name(name)?;
        let node = self
            .transport
            .get(name, GetOptions::quorum())
            .await
            .map_err(|err| missing_key(name, err))?;

        match node.kind {
            NodeKind::Leaf(value) => Ok(ServiceType::from(value)),
            NodeKind::Directory(_) => Err(RegistryError::IsDirectory(name.to_string())),
        }
    }

    /// Unregister `name`.
    ///
    /// CAUTION: if `name` is a directory, everything below it is removed too.
    /// The namespace root itself is refused.
    #[instrument(skip(self))]
    pub async fn delete(&self, name: &str) -> RegistryResult<()> {
        check_name(name)?;
        if name.trim_matches('/').is_empty() {
            return Err(RegistryError::InvalidName {
                name: name.to_string(),
                reason: "refusing to delete the namespace root".to_string(),
            });
        }

        self.transport
            .delete(name, true)
            .await
            .map_err(|err| missing_key(name, err))?;

        debug!(name = %name, "Deleted name");
        Ok(())
    }

    /// Registered names directly inside `namespace`.
    ///
    /// Keys are returned as the store reports them (absolute paths such as
    /// `/foo/bar`). Nested directories are skipped. This is a non-quorum read
    /// and may lag behind the latest writes.
    #[instrument(skip(self))]
    pub async fn list(&self, namespace: &str) -> RegistryResult<BTreeMap<String, ServiceType>> {
        check_name(namespace)?;
        let node = self
            .transport
            .get(namespace, GetOptions::default())
            .await
            .map_err(|err| missing_key(namespace, err))?;

        if !node.is_dir() {
            return Err(RegistryError::NotADirectory(namespace.to_string()));
        }

        let names: BTreeMap<_, _> = node
            .child_leaves()
            .map(|(key, value)| (key.to_string(), ServiceType::from(value)))
            .collect();
        debug!(namespace = %namespace, count = names.len(), "Listed names");
        Ok(names)
    }

    /// Registered names at any depth below `namespace`.
    ///
    /// Same rules as [`RegistryClient::list`], with a single recursive read.
    #[instrument(skip(self))]
    pub async fn list_recursive(
        &self,
        namespace: &str,
    ) -> RegistryResult<BTreeMap<String, ServiceType>> {
        check_name(namespace)?;
        let node = self
            .transport
            .get(namespace, GetOptions::default().recursive())
            .await
            .map_err(|err| missing_key(namespace, err))?;

        if !node.is_dir() {
            return Err(RegistryError::NotADirectory(namespace.to_string()));
        }

        Ok(node
            .descendant_leaves()
            .map(|(key, value)| (key.to_string(), ServiceType::from(value)))
            .collect())
    }
}

/// Names are store keys as given; relative segments, plain or percent-encoded,
/// would be resolved by the transport and address a different key.
fn check_name(name: &str) -> RegistryResult<()> {
    let is_relative = |segment: &str| {
        let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
        decoded == "." || decoded == ".."
    };
    if name.split('/').any(is_relative) {
        return Err(RegistryError::InvalidName {
            name: name.to_string(),
            reason: "'.' and '..' segments are not allowed".to_string(),
        });
    }
    Ok(())
}

fn missing_key(name: &str, err: TransportError) -> RegistryError {
    match err.store_code() {
        Some(StoreErrorCode::KeyNotFound) => RegistryError::KeyNotFound(name.to_string()),
        _ => err.into(),
    }
}
