//! Linear reading order of a book.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::import::{Container, NavNode};
use crate::util::strip_file_name;

/// Where a [`ReadingOrder`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSource {
    Navigation,
    Spine,
}

/// Content documents in the order a reader traverses them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadingOrder {
    /// Container keys, duplicates kept.
    pub keys: Vec<String>,
    pub source: OrderSource,
}

impl ReadingOrder {
    /// Derive the order from the navigation tree, else from the spine.
    pub fn from_container<C: Container + ?Sized>(container: &C) -> Result<Self> {
        if let Some(nav) = container.navigation() {
            let keys = navigation_keys(nav);
            if !keys.is_empty() {
                return Ok(Self {
                    keys,
                    source: OrderSource::Navigation,
                });
            }
        }

        if container.spine().is_empty() {
            return Err(Error::NoReadingOrder);
        }

        Ok(Self {
            keys: container.spine().to_vec(),
            source: OrderSource::Spine,
        })
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Bare file names, the persisted form of the order.
    pub fn file_names(&self) -> Vec<&str> {
        self.keys.iter().map(|key| strip_file_name(key)).collect()
    }
}

/// Depth-first: each node's children come before the node's own link.
///
/// Nodes without a link contribute only their children.
pub fn navigation_keys(nodes: &[NavNode]) -> Vec<String> {
    let mut keys = Vec::new();
    collect(nodes, &mut keys);
    keys
}

fn collect(nodes: &[NavNode], keys: &mut Vec<String>) {
    for node in nodes {
        collect(&node.children, keys);
        if let Some(link) = &node.link {
            keys.push(link.clone());
        }
    }
}
