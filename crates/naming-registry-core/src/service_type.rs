//! Service types
//!
//! A registered name resolves to a [`ServiceType`]. By convention the value is
//! one of `charm`, `model` or `page`, but the store holds arbitrary strings and
//! reads return them verbatim.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// The kind of resource a registered name identifies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceType(Cow<'static, str>);

impl ServiceType {
    /// The name identifies a charm.
    pub const CHARM: ServiceType = ServiceType(Cow::Borrowed("charm"));
    /// The name identifies a model.
    pub const MODEL: ServiceType = ServiceType(Cow::Borrowed("model"));
    /// The name identifies a page.
    pub const PAGE: ServiceType = ServiceType(Cow::Borrowed("page"));

    /// Wrap an arbitrary value without checking it against the known set.
    pub fn new(value: impl Into<String>) -> Self {
        Self(Cow::Owned(value.into()))
    }

    /// All service types defined by convention.
    pub fn known() -> [ServiceType; 3] {
        [Self::CHARM, Self::MODEL, Self::PAGE]
    }

    /// Whether this value is one of [`ServiceType::known`].
    pub fn is_known(&self) -> bool {
        Self::known().iter().any(|known| known == self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ServiceType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl From<&str> for ServiceType {
    fn from(value: &str) -> Self {
        Self::known()
            .into_iter()
            .find(|known| known.as_str() == value)
            .unwrap_or_else(|| Self::new(value))
    }
}

impl From<String> for ServiceType {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl AsRef<str> for ServiceType {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}
