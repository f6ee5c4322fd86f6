//! Routing groups: ordered candidate sets for implicit target selection.
//!
//! A [`RoutingGroup`] holds nodes of one direction, kept sorted by the group's
//! comparator so the most preferred target is always first. Nodes are *offered* to
//! groups when they register or when an ordering-relevant attribute changes; the group's
//! `accept` predicate decides membership.
//!
//! Membership is distinct from *assignment*: a stream assigned to the
//! `default-output` group is routed to that group's first member, but is not a member.
//! The [`GroupTable`] records both the groups and the class routes that assign whole
//! node classes to a group.

use core::cmp::Ordering;
use core::fmt;
use std::collections::{BTreeMap, HashMap};

use crate::error::RoutingError;
use crate::node::{Direction, Node, NodeClass, NodeIndex};
use crate::policy::PolicyId;
use crate::registry::NodeDirectory;

/// Membership predicate of a group or policy.
pub type AcceptFn = Box<dyn Fn(&Node) -> bool>;

/// Preference order of a group or policy. `Less` means "`a` is preferred over `b`".
pub type CompareFn = Box<dyn Fn(&Node, &Node) -> Ordering>;

/// Unique identifier for a routing group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupId(pub(crate) u32);

impl GroupId {
    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group#{}", self.0)
    }
}

/// A named, direction-scoped, priority-ordered list of target nodes.
pub struct RoutingGroup {
    pub(crate) id: GroupId,
    name: String,
    direction: Direction,
    accept: AcceptFn,
    compare: CompareFn,
    members: Vec<NodeIndex>,
    pub(crate) owner: PolicyId,
}

impl fmt::Debug for RoutingGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutingGroup")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("direction", &self.direction)
            .field("members", &self.members)
            .finish_non_exhaustive()
    }
}

impl RoutingGroup {
    /// Creates an empty group.
    ///
    /// `compare` must be a strict weak ordering; members that compare equal keep their
    /// insertion order.
    pub fn new(
        name: impl Into<String>,
        direction: Direction,
        accept: impl Fn(&Node) -> bool + 'static,
        compare: impl Fn(&Node, &Node) -> Ordering + 'static,
    ) -> Self {
        Self {
            id: GroupId(u32::MAX),
            name: name.into(),
            direction,
            accept: Box::new(accept),
            compare: Box::new(compare),
            members: Vec::new(),
            owner: PolicyId::FALLBACK,
        }
    }

    /// Returns the group id. Unregistered groups report `u32::MAX`.
    pub fn id(&self) -> GroupId {
        self.id
    }

    /// Returns the group name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the direction of the group's members.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Returns the members, most preferred first.
    pub fn members(&self) -> &[NodeIndex] {
        &self.members
    }

    /// Returns the number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns true if the group has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Returns true if `index` is a member.
    pub fn contains(&self, index: NodeIndex) -> bool {
        self.members.contains(&index)
    }

    /// Returns true if the node has the group's direction and passes `accept`.
    pub fn accepts(&self, node: &Node) -> bool {
        node.direction() == self.direction && (self.accept)(node)
    }

    /// Compares two nodes with the group's comparator.
    pub fn compare(&self, a: &Node, b: &Node) -> Ordering {
        (self.compare)(a, b)
    }

    fn compare_indices(&self, a: NodeIndex, b: NodeIndex, nodes: &NodeDirectory) -> Ordering {
        match (nodes.get(a), nodes.get(b)) {
            (Some(a), Some(b)) => (self.compare)(a, b),
            _ => Ordering::Equal,
        }
    }

    /// Offers a node to the group.
    ///
    /// If `accept` passes, the node is inserted after every member that is not worse
    /// than it, and `true` is returned. Offering an existing member is a no-op that
    /// reports `true`.
    pub fn offer(&mut self, node: &Node, nodes: &NodeDirectory) -> bool {
        if !self.accepts(node) {
            return false;
        }
        if self.contains(node.index()) {
            return true;
        }
        let compare = &self.compare;
        let position = self.members.partition_point(|&member| match nodes.get(member) {
            Some(member) => compare(member, node) != Ordering::Greater,
            None => true,
        });
        self.members.insert(position, node.index());
        true
    }

    /// Removes a member. Returns false if it was not a member.
    ///
    /// O(n) in the group size: members live in one sorted `Vec`, so removal shifts the
    /// tail regardless of how the slot is found. The node's `member_of` back-link
    /// names the one group to search, so unregistering never scans other groups.
    pub fn remove(&mut self, index: NodeIndex) -> bool {
        match self.members.iter().position(|&m| m == index) {
            Some(position) => {
                self.members.remove(position);
                true
            }
            None => false,
        }
    }

    /// Stable-sorts the members with the comparator and reports whether the order
    /// changed.
    pub fn resort(&mut self, nodes: &NodeDirectory) -> bool {
        let before = self.members.clone();
        let mut members = core::mem::take(&mut self.members);
        members.sort_by(|&a, &b| self.compare_indices(a, b, nodes));
        self.members = members;
        before != self.members
    }

    /// Evicts every member and returns them.
    pub(crate) fn clear(&mut self) -> Vec<NodeIndex> {
        core::mem::take(&mut self.members)
    }
}

/// All routing groups plus the class routes pointing into them.
#[derive(Debug, Default)]
pub struct GroupTable {
    groups: BTreeMap<GroupId, RoutingGroup>,
    class_routes: HashMap<(NodeClass, Direction), GroupId>,
    next_id: u32,
}

impl GroupTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a group on behalf of `owner`.
    pub(crate) fn insert(
        &mut self,
        mut group: RoutingGroup,
        owner: PolicyId,
    ) -> Result<GroupId, RoutingError> {
        if group.name.trim().is_empty() {
            return Err(RoutingError::InvalidName {
                reason: "group names must not be empty".to_string(),
            });
        }
        if self.by_name(&group.name).is_some() {
            return Err(RoutingError::duplicate_name(group.name));
        }
        let id = GroupId(self.next_id);
        self.next_id += 1;
        group.id = id;
        group.owner = owner;
        group.members.clear();
        self.groups.insert(id, group);
        Ok(id)
    }

    /// Removes a group together with the class routes that point to it.
    pub(crate) fn remove(&mut self, id: GroupId) -> Option<RoutingGroup> {
        let group = self.groups.remove(&id)?;
        self.class_routes.retain(|_, target| *target != id);
        Some(group)
    }

    /// Returns the group with the given id.
    pub fn get(&self, id: GroupId) -> Option<&RoutingGroup> {
        self.groups.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: GroupId) -> Option<&mut RoutingGroup> {
        self.groups.get_mut(&id)
    }

    /// Returns the group registered under `name`.
    pub fn by_name(&self, name: &str) -> Option<&RoutingGroup> {
        self.groups.values().find(|g| g.name == name)
    }

    /// Iterates over all groups in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &RoutingGroup> {
        self.groups.values()
    }

    /// Returns the number of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Returns true if there are no groups.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Returns the ids of every group owned by `owner`.
    pub(crate) fn owned_by(&self, owner: PolicyId) -> Vec<GroupId> {
        self.groups
            .values()
            .filter(|g| g.owner == owner)
            .map(|g| g.id)
            .collect()
    }

    /// Routes every node of `class` and `direction` through `group`.
    ///
    /// The group must hold nodes of the opposite direction.
    pub(crate) fn route_class(
        &mut self,
        class: NodeClass,
        direction: Direction,
        group: GroupId,
    ) -> Result<(), RoutingError> {
        let target = self.get(group).ok_or(RoutingError::UnknownGroup(group))?;
        if target.direction() != direction.opposite() {
            return Err(RoutingError::invalid_assignment(format!(
                "{direction} {class:?} nodes cannot be routed through {} group '{}'",
                target.direction(),
                target.name()
            )));
        }
        self.class_routes.insert((class, direction), group);
        Ok(())
    }

    /// Returns the group that nodes of `class` and `direction` are routed through.
    pub fn class_route(&self, class: NodeClass, direction: Direction) -> Option<GroupId> {
        self.class_routes.get(&(class, direction)).copied()
    }

    /// Returns the first group, in creation order, that accepts `node`.
    pub(crate) fn first_accepting(&self, node: &Node) -> Option<GroupId> {
        self.groups
            .values()
            .find(|g| g.accepts(node))
            .map(|g| g.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NameCollision;
    use crate::node::NodeSpec;

    fn by_priority(a: &Node, b: &Node) -> Ordering {
        b.priority().cmp(&a.priority())
    }

    fn directory(priorities: &[i32]) -> (NodeDirectory, Vec<NodeIndex>) {
        let mut dir = NodeDirectory::new();
        let indices = priorities
            .iter()
            .enumerate()
            .map(|(i, &p)| {
                dir.insert(
                    NodeSpec::device(format!("out{i}"), Direction::Output).with_priority(p),
                    NameCollision::Reject,
                    32,
                )
                .unwrap()
            })
            .collect();
        (dir, indices)
    }

    #[test]
    fn offer_keeps_descending_order() {
        let (dir, idx) = directory(&[5, 10, 7]);
        let mut group = RoutingGroup::new("out", Direction::Output, |_| true, by_priority);
        for &i in &idx {
            assert!(group.offer(dir.get(i).unwrap(), &dir));
        }
        assert_eq!(group.members(), &[idx[1], idx[2], idx[0]]);
    }

    #[test]
    fn equal_elements_keep_insertion_order() {
        let (dir, idx) = directory(&[3, 3, 3]);
        let mut group = RoutingGroup::new("out", Direction::Output, |_| true, by_priority);
        for &i in &idx {
            group.offer(dir.get(i).unwrap(), &dir);
        }
        assert_eq!(group.members(), idx.as_slice());
        assert!(!group.resort(&dir));
    }

    #[test]
    fn offer_respects_direction_and_accept() {
        let mut dir = NodeDirectory::new();
        let input = dir
            .insert(NodeSpec::device("mic", Direction::Input), NameCollision::Reject, 32)
            .unwrap();
        let hidden = dir
            .insert(
                NodeSpec::device("null", Direction::Output).with_visible(false),
                NameCollision::Reject,
                32,
            )
            .unwrap();
        let mut group =
            RoutingGroup::new("out", Direction::Output, |n| n.is_visible(), by_priority);
        assert!(!group.offer(dir.get(input).unwrap(), &dir));
        assert!(!group.offer(dir.get(hidden).unwrap(), &dir));
        assert!(group.is_empty());
    }

    #[test]
    fn resort_reports_change() {
        let (mut dir, idx) = directory(&[10, 5]);
        let mut group = RoutingGroup::new("out", Direction::Output, |_| true, by_priority);
        for &i in &idx {
            group.offer(dir.get(i).unwrap(), &dir);
        }
        assert!(!group.resort(&dir));

        dir.get_mut(idx[1]).unwrap().priority = 20;
        assert!(group.resort(&dir));
        assert_eq!(group.members(), &[idx[1], idx[0]]);
    }

    #[test]
    fn remove_member() {
        let (dir, idx) = directory(&[1, 2]);
        let mut group = RoutingGroup::new("out", Direction::Output, |_| true, by_priority);
        for &i in &idx {
            group.offer(dir.get(i).unwrap(), &dir);
        }
        assert!(group.remove(idx[0]));
        assert!(!group.remove(idx[0]));
        assert_eq!(group.members(), &[idx[1]]);
    }

    #[test]
    fn removal_from_middle_keeps_order() {
        let (dir, idx) = directory(&[9, 7, 5, 3]);
        let mut group = RoutingGroup::new("out", Direction::Output, |_| true, by_priority);
        for &i in &idx {
            group.offer(dir.get(i).unwrap(), &dir);
        }
        assert!(group.remove(idx[1]));
        assert_eq!(group.members(), &[idx[0], idx[2], idx[3]]);
        assert!(!group.resort(&dir));
    }

    #[test]
    fn table_rejects_duplicate_names() {
        let mut table = GroupTable::new();
        let g = RoutingGroup::new("speakers", Direction::Output, |_| true, by_priority);
        table.insert(g, PolicyId::FALLBACK).unwrap();
        let dup = RoutingGroup::new("speakers", Direction::Output, |_| true, by_priority);
        assert_eq!(
            table.insert(dup, PolicyId::FALLBACK).unwrap_err(),
            RoutingError::duplicate_name("speakers")
        );
    }

    #[test]
    fn class_routes_require_opposite_direction() {
        let mut table = GroupTable::new();
        let out = table
            .insert(
                RoutingGroup::new("out", Direction::Output, |_| true, by_priority),
                PolicyId::FALLBACK,
            )
            .unwrap();
        assert!(
            table
                .route_class(NodeClass::Player, Direction::Input, out)
                .is_ok()
        );
        assert!(matches!(
            table.route_class(NodeClass::Player, Direction::Output, out),
            Err(RoutingError::InvalidAssignment { .. })
        ));
        assert_eq!(
            table.class_route(NodeClass::Player, Direction::Input),
            Some(out)
        );

        table.remove(out);
        assert_eq!(table.class_route(NodeClass::Player, Direction::Input), None);
    }
}
