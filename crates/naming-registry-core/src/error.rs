//! Error taxonomy
//!
//! Two layers:
//! - [`TransportError`]: what the KV transport reports, including structured
//!   store errors carrying a machine-readable [`StoreErrorCode`]
//! - [`RegistryError`]: what registry callers see; store errors are classified
//!   once into a registry kind or passed through unmodified

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::service_type::ServiceType;

// ============================================================================
// Store errors
// ============================================================================

/// Machine-readable error code reported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u16", into = "u16")]
pub enum StoreErrorCode {
    /// The key does not exist
    KeyNotFound,
    /// A compare condition (previous value) did not hold
    TestFailed,
    /// The operation needs a leaf but found a directory
    NotFile,
    /// A path component is a leaf where a directory is required
    NotDir,
    /// The key already exists
    NodeExist,
    /// The root of the namespace cannot be written or removed
    RootReadOnly,
    /// The directory is not empty
    DirNotEmpty,
    /// The connection is not permitted to perform the operation
    Unauthorized,
    /// A compare-and-swap was issued without a previous value
    PrevValueRequired,
    /// A request field was rejected
    InvalidField,
    /// The request form was rejected
    InvalidForm,
    /// The replicated log failed internally
    RaftInternal,
    /// A leader election was in progress
    LeaderElect,
    /// Any code not listed above
    Other(u16),
}

impl StoreErrorCode {
    pub fn as_u16(self) -> u16 {
        match self {
            Self::KeyNotFound => 100,
            Self::TestFailed => 101,
            Self::NotFile => 102,
            Self::NotDir => 104,
            Self::NodeExist => 105,
            Self::RootReadOnly => 107,
            Self::DirNotEmpty => 108,
            Self::Unauthorized => 110,
            Self::PrevValueRequired => 201,
            Self::InvalidField => 209,
            Self::InvalidForm => 210,
            Self::RaftInternal => 300,
            Self::LeaderElect => 301,
            Self::Other(code) => code,
        }
    }
}

impl From<u16> for StoreErrorCode {
    fn from(code: u16) -> Self {
        match code {
            100 => Self::KeyNotFound,
            101 => Self::TestFailed,
            102 => Self::NotFile,
            104 => Self::NotDir,
            105 => Self::NodeExist,
            107 => Self::RootReadOnly,
            108 => Self::DirNotEmpty,
            110 => Self::Unauthorized,
            201 => Self::PrevValueRequired,
            209 => Self::InvalidField,
            210 => Self::InvalidForm,
            300 => Self::RaftInternal,
            301 => Self::LeaderElect,
            other => Self::Other(other),
        }
    }
}

impl From<StoreErrorCode> for u16 {
    fn from(code: StoreErrorCode) -> Self {
        code.as_u16()
    }
}

impl fmt::Display for StoreErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

/// Structured error reported by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreError {
    pub code: StoreErrorCode,
    pub message: String,
    /// Usually the key (or compare expression) the error refers to
    pub cause: Option<String>,
    /// Store index at the time of the error
    pub index: u64,
}

impl StoreError {
    pub fn new(code: StoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            cause: None,
            index: 0,
        }
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn with_index(mut self, index: u64) -> Self {
        self.index = index;
        self
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        if let Some(cause) = &self.cause {
            write!(f, " ({})", cause)?;
        }
        write!(f, " [{}]", self.index)
    }
}

impl std::error::Error for StoreError {}

// ============================================================================
// Transport errors
// ============================================================================

/// Errors from the KV transport
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("store error {0}")]
    Store(#[from] StoreError),
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("invalid response (status {status}): {message}")]
    InvalidResponse { status: u16, message: String },
    #[error("no store endpoints configured")]
    NoEndpoints,
    #[error("invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
}

impl TransportError {
    /// The store error code, when the store itself rejected the request.
    pub fn store_code(&self) -> Option<StoreErrorCode> {
        match self {
            Self::Store(err) => Some(err.code),
            _ => None,
        }
    }
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

// ============================================================================
// Registry errors
// ============================================================================

/// Errors seen by registry callers
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("key '{0}' exists")]
    KeyExists(String),
    #[error("key '{0}' does not exist")]
    KeyNotFound(String),
    #[error("cannot read directory '{0}'")]
    IsDirectory(String),
    #[error("'{0}' is not a directory")]
    NotADirectory(String),
    #[error("key '{key}' does not hold '{expected}'")]
    PreconditionFailed { key: String, expected: ServiceType },
    #[error("unknown service type '{0}'")]
    UnknownServiceType(ServiceType),
    #[error("invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl RegistryError {
    /// The store error code, for errors passed through from the store.
    pub fn store_code(&self) -> Option<StoreErrorCode> {
        match self {
            Self::Transport(err) => err.store_code(),
            _ => None,
        }
    }
}

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;
