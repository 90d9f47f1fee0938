//! JSON bodies of the etcd v2 keys API

use naming_registry_core::{KvNode, StoreError, StoreErrorCode};
use serde::Deserialize;

/// Successful response to any keys request.
#[derive(Debug, Deserialize)]
pub(crate) struct KeysResponse {
    pub node: WireNode,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireNode {
    /// Absent for the root directory
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub dir: bool,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub nodes: Vec<WireNode>,
}

impl From<WireNode> for KvNode {
    fn from(node: WireNode) -> Self {
        if node.dir {
            let children = node.nodes.into_iter().map(KvNode::from).collect();
            KvNode::directory(node.key, children)
        } else {
            KvNode::leaf(node.key, node.value.unwrap_or_default())
        }
    }
}

/// Error body returned with any non-2xx status.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireError {
    pub error_code: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub cause: Option<String>,
    #[serde(default)]
    pub index: u64,
}

impl From<WireError> for StoreError {
    fn from(err: WireError) -> Self {
        StoreError {
            code: StoreErrorCode::from(err.error_code),
            message: err.message,
            cause: err.cause,
            index: err.index,
        }
    }
}
