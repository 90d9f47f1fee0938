//! In-memory transport
//!
//! A single-process store with the key semantics of the etcd v2 keys API:
//! directories are created implicitly when a child is written, keys are
//! reported as absolute paths, and failures carry the same store error codes.
//! Every conditional check and its write happen under one write lock.
//!
//! Clones share the same store, so several registry clients built on clones
//! observe each other's writes.

use async_trait::async_trait;
use naming_registry_core::{
    GetOptions, KvNode, KvTransport, StoreError, StoreErrorCode, TransportError, TransportResult,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

#[derive(Debug, Clone)]
enum Stored {
    Leaf(String),
    Dir(BTreeMap<String, Stored>),
}

impl Stored {
    fn empty_dir() -> Self {
        Stored::Dir(BTreeMap::new())
    }
}

#[derive(Debug)]
struct StoreState {
    root: Stored,
    /// Incremented on every successful mutation
    index: u64,
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            root: Stored::empty_dir(),
            index: 0,
        }
    }
}

/// KV transport holding the whole namespace in process memory
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    state: Arc<RwLock<StoreState>>,
}

impl MemoryTransport {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Current store index (number of successful mutations)
    pub async fn index(&self) -> u64 {
        self.state.read().await.index
    }
}

fn segments(key: &str) -> Vec<&str> {
    key.split('/').filter(|segment| !segment.is_empty()).collect()
}

fn path_of(segments: &[&str]) -> String {
    format!("/{}", segments.join("/"))
}

fn child_path(parent: &str, name: &str) -> String {
    format!("{}/{}", parent.trim_end_matches('/'), name)
}

fn store_error(code: StoreErrorCode, cause: String, index: u64) -> TransportError {
    let message = match code {
        StoreErrorCode::KeyNotFound => "Key not found",
        StoreErrorCode::TestFailed => "Compare failed",
        StoreErrorCode::NotFile => "Not a file",
        StoreErrorCode::NotDir => "Not a directory",
        StoreErrorCode::NodeExist => "Key already exists",
        StoreErrorCode::RootReadOnly => "Root is read only",
        _ => "Store error",
    };
    StoreError::new(code, message)
        .with_cause(cause)
        .with_index(index)
        .into()
}

/// Walk `segments` down from `node`.
fn lookup<'a>(mut node: &'a Stored, segments: &[&str], index: u64) -> TransportResult<&'a Stored> {
    for (depth, segment) in segments.iter().enumerate() {
        node = match node {
            Stored::Dir(children) => match children.get(*segment) {
                Some(child) => child,
                None => {
                    return Err(store_error(
                        StoreErrorCode::KeyNotFound,
                        path_of(segments),
                        index,
                    ))
                }
            },
            Stored::Leaf(_) => {
                return Err(store_error(
                    StoreErrorCode::NotDir,
                    path_of(&segments[..depth]),
                    index,
                ))
            }
        };
    }
    Ok(node)
}

fn lookup_mut<'a>(
    mut node: &'a mut Stored,
    segments: &[&str],
    index: u64,
) -> TransportResult<&'a mut Stored> {
    for (depth, segment) in segments.iter().enumerate() {
        node = match node {
            Stored::Dir(children) => match children.get_mut(*segment) {
                Some(child) => child,
                None => {
                    return Err(store_error(
                        StoreErrorCode::KeyNotFound,
                        path_of(segments),
                        index,
                    ))
                }
            },
            Stored::Leaf(_) => {
                return Err(store_error(
                    StoreErrorCode::NotDir,
                    path_of(&segments[..depth]),
                    index,
                ))
            }
        };
    }
    Ok(node)
}

/// Render a stored node. Nested directories carry children only when `recursive`.
fn render(node: &Stored, key: String, recursive: bool) -> KvNode {
    match node {
        Stored::Leaf(value) => KvNode::leaf(key, value.clone()),
        Stored::Dir(children) => {
            let rendered = children
                .iter()
                .map(|(name, child)| {
                    let path = child_path(&key, name);
                    match child {
                        Stored::Dir(_) if !recursive => KvNode::directory(path, vec![]),
                        _ => render(child, path, recursive),
                    }
                })
                .collect();
            KvNode::directory(key, rendered)
        }
    }
}

#[async_trait]
impl KvTransport for MemoryTransport {
    #[instrument(skip(self, value))]
    async fn create(&self, key: &str, value: &str) -> TransportResult<()> {
        let segments = segments(key);
        let mut state = self.state.write().await;
        let StoreState { root, index } = &mut *state;

        let Some((last, parents)) = segments.split_last() else {
            return Err(store_error(StoreErrorCode::RootReadOnly, "/".into(), *index));
        };

        let mut node = root;
        for (depth, segment) in parents.iter().enumerate() {
            node = match node {
                Stored::Dir(children) => children
                    .entry(segment.to_string())
                    .or_insert_with(Stored::empty_dir),
                Stored::Leaf(_) => {
                    return Err(store_error(
                        StoreErrorCode::NotDir,
                        path_of(&segments[..depth]),
                        *index,
                    ))
                }
            };
        }

        let children = match node {
            Stored::Dir(children) => children,
            Stored::Leaf(_) => {
                return Err(store_error(StoreErrorCode::NotDir, path_of(parents), *index))
            }
        };
        if children.contains_key(*last) {
            return Err(store_error(
                StoreErrorCode::NodeExist,
                path_of(&segments),
                *index,
            ));
        }

        children.insert(last.to_string(), Stored::Leaf(value.to_string()));
        *index += 1;
        debug!(key = %key, index = *index, "Created key in memory store");
        Ok(())
    }

    #[instrument(skip(self, value, prev_value))]
    async fn compare_and_set(
        &self,
        key: &str,
        value: &str,
        prev_value: &str,
    ) -> TransportResult<()> {
        let segments = segments(key);
        let mut state = self.state.write().await;
        let StoreState { root, index } = &mut *state;

        if segments.is_empty() {
            return Err(store_error(StoreErrorCode::RootReadOnly, "/".into(), *index));
        }

        match lookup_mut(root, &segments, *index)? {
            Stored::Dir(_) => Err(store_error(
                StoreErrorCode::NotFile,
                path_of(&segments),
                *index,
            )),
            Stored::Leaf(current) if current.as_str() != prev_value => Err(store_error(
                StoreErrorCode::TestFailed,
                format!("[{} != {}]", prev_value, current),
                *index,
            )),
            Stored::Leaf(current) => {
                *current = value.to_string();
                *index += 1;
                debug!(key = %key, index = *index, "Swapped key value in memory store");
                Ok(())
            }
        }
    }

    #[instrument(skip(self))]
    async fn get(&self, key: &str, options: GetOptions) -> TransportResult<KvNode> {
        let segments = segments(key);
        let state = self.state.read().await;

        let node = lookup(&state.root, &segments, state.index)?;
        Ok(render(node, path_of(&segments), options.recursive))
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str, recursive: bool) -> TransportResult<()> {
        let segments = segments(key);
        let mut state = self.state.write().await;
        let StoreState { root, index } = &mut *state;

        let Some((last, parents)) = segments.split_last() else {
            return Err(store_error(StoreErrorCode::RootReadOnly, "/".into(), *index));
        };

        let children = match lookup_mut(root, parents, *index) {
            Ok(Stored::Dir(children)) => children,
            Ok(Stored::Leaf(_)) => {
                return Err(store_error(StoreErrorCode::NotDir, path_of(parents), *index))
            }
            // A missing ancestor means the key itself is missing
            Err(err) if err.store_code() == Some(StoreErrorCode::KeyNotFound) => {
                return Err(store_error(
                    StoreErrorCode::KeyNotFound,
                    path_of(&segments),
                    *index,
                ))
            }
            Err(err) => return Err(err),
        };

        let is_dir = match children.get(*last) {
            Some(node) => matches!(node, Stored::Dir(_)),
            None => {
                return Err(store_error(
                    StoreErrorCode::KeyNotFound,
                    path_of(&segments),
                    *index,
                ))
            }
        };
        if is_dir && !recursive {
            return Err(store_error(
                StoreErrorCode::NotFile,
                path_of(&segments),
                *index,
            ));
        }

        children.remove(*last);
        *index += 1;
        debug!(key = %key, index = *index, "Deleted key from memory store");
        Ok(())
    }
}
