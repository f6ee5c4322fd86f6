//! Node directory: index and name lookup for registered nodes.

use std::collections::{BTreeMap, HashMap};

use crate::config::NameCollision;
use crate::error::RoutingError;
use crate::node::{Node, NodeIndex, NodeSpec};

/// Owns every registered [`Node`], keyed by index, with a unique-name index.
///
/// Iteration is in ascending index order, which is also registration order.
#[derive(Debug, Default)]
pub struct NodeDirectory {
    nodes: BTreeMap<NodeIndex, Node>,
    names: HashMap<String, NodeIndex>,
    next_index: u32,
}

impl NodeDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates `spec` and inserts it as a new node.
    ///
    /// The name is resolved according to `collision`: rejected outright, or suffixed
    /// with `.2`, `.3`, ... until unique.
    pub(crate) fn insert(
        &mut self,
        spec: NodeSpec,
        collision: NameCollision,
        max_channels: u8,
    ) -> Result<NodeIndex, RoutingError> {
        if spec.name.trim().is_empty() {
            return Err(RoutingError::InvalidName {
                reason: "node names must not be empty".to_string(),
            });
        }
        if spec.channels == 0 || spec.channels > max_channels {
            return Err(RoutingError::InvalidChannels {
                channels: spec.channels,
                max: max_channels,
            });
        }

        let name = self.resolve_name(&spec.name, collision)?;
        let index = NodeIndex(self.next_index);
        self.next_index += 1;

        self.names.insert(name.clone(), index);
        self.nodes.insert(index, Node::from_spec(index, name, spec));
        Ok(index)
    }

    fn resolve_name(&self, name: &str, collision: NameCollision) -> Result<String, RoutingError> {
        if !self.names.contains_key(name) {
            return Ok(name.to_string());
        }
        match collision {
            NameCollision::Reject => Err(RoutingError::duplicate_name(name)),
            NameCollision::Rename => {
                let mut suffix = 2u32;
                loop {
                    let candidate = format!("{name}.{suffix}");
                    if !self.names.contains_key(&candidate) {
                        return Ok(candidate);
                    }
                    suffix += 1;
                }
            }
        }
    }

    /// Removes a node, freeing its name for reuse. The index is never reused.
    pub(crate) fn remove(&mut self, index: NodeIndex) -> Option<Node> {
        let node = self.nodes.remove(&index)?;
        self.names.remove(&node.name);
        Some(node)
    }

    /// Returns the node with the given index.
    pub fn get(&self, index: NodeIndex) -> Option<&Node> {
        self.nodes.get(&index)
    }

    pub(crate) fn get_mut(&mut self, index: NodeIndex) -> Option<&mut Node> {
        self.nodes.get_mut(&index)
    }

    /// Returns the node registered under `name`.
    pub fn by_name(&self, name: &str) -> Option<&Node> {
        self.names.get(name).and_then(|index| self.nodes.get(index))
    }

    /// Returns true if a node with the given index exists.
    pub fn contains(&self, index: NodeIndex) -> bool {
        self.nodes.contains_key(&index)
    }

    /// Iterates over all nodes in index order.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.values_mut()
    }

    /// Returns all node indices in index order.
    pub fn indices(&self) -> Vec<NodeIndex> {
        self.nodes.keys().copied().collect()
    }

    /// Returns the number of registered nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if no node is registered.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Direction;

    fn spk(name: &str) -> NodeSpec {
        NodeSpec::device(name, Direction::Output)
    }

    #[test]
    fn indices_are_sequential_and_not_reused() {
        let mut dir = NodeDirectory::new();
        let a = dir.insert(spk("a"), NameCollision::Reject, 32).unwrap();
        let b = dir.insert(spk("b"), NameCollision::Reject, 32).unwrap();
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);

        dir.remove(a).unwrap();
        let c = dir.insert(spk("a"), NameCollision::Reject, 32).unwrap();
        assert_eq!(c.index(), 2);
        assert!(dir.get(a).is_none());
    }

    #[test]
    fn duplicate_rejected() {
        let mut dir = NodeDirectory::new();
        dir.insert(spk("hdmi"), NameCollision::Reject, 32).unwrap();
        let err = dir
            .insert(spk("hdmi"), NameCollision::Reject, 32)
            .unwrap_err();
        assert_eq!(err, RoutingError::duplicate_name("hdmi"));
        assert_eq!(dir.len(), 1);
    }

    #[test]
    fn duplicate_renamed() {
        let mut dir = NodeDirectory::new();
        dir.insert(spk("hdmi"), NameCollision::Rename, 32).unwrap();
        let second = dir.insert(spk("hdmi"), NameCollision::Rename, 32).unwrap();
        let third = dir.insert(spk("hdmi"), NameCollision::Rename, 32).unwrap();
        assert_eq!(dir.get(second).unwrap().name(), "hdmi.2");
        assert_eq!(dir.get(third).unwrap().name(), "hdmi.3");
        assert_eq!(dir.by_name("hdmi.3").unwrap().index(), third);
    }

    #[test]
    fn removal_frees_name() {
        let mut dir = NodeDirectory::new();
        let a = dir.insert(spk("usb"), NameCollision::Reject, 32).unwrap();
        dir.remove(a);
        assert!(dir.by_name("usb").is_none());
        assert!(dir.insert(spk("usb"), NameCollision::Reject, 32).is_ok());
    }

    #[test]
    fn channel_and_name_validation() {
        let mut dir = NodeDirectory::new();
        assert!(matches!(
            dir.insert(spk("x").with_channels(0), NameCollision::Reject, 8),
            Err(RoutingError::InvalidChannels { channels: 0, max: 8 })
        ));
        assert!(matches!(
            dir.insert(spk("x").with_channels(9), NameCollision::Reject, 8),
            Err(RoutingError::InvalidChannels { channels: 9, max: 8 })
        ));
        assert!(matches!(
            dir.insert(spk("  "), NameCollision::Reject, 8),
            Err(RoutingError::InvalidName { .. })
        ));
        assert!(dir.is_empty());
    }
}
