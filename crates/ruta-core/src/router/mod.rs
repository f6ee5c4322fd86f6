//! Router: owner of nodes, groups, domains, connections and the active policy.
//!
//! [`Router`] is the main entry point. Collaborators register nodes and domains, request
//! explicit connections and install a routing policy; the router records the effects and
//! marks a routing pass as pending. The pass itself ([`Router::make_routing`]) lives in
//! the `routing` submodule.
//!
//! Everything here runs on one control thread. Backend callbacks never receive a router
//! reference: follow-up mutations they need are queued on a [`Deferred`] and applied once
//! the pass is over.

mod routing;

pub use routing::RoutingReport;

use std::collections::BTreeSet;

use crate::config::RouterConfig;
use crate::connection::{
    Connection, ConnectionDirectory, ConnectionId, ConnectionKey, ConnectionKind,
};
use crate::domain::{Command, Deferred, DomainBackend, DomainId, DomainTable, Epoch};
use crate::error::RoutingError;
use crate::group::{GroupId, GroupTable, RoutingGroup};
use crate::hooks::{Hooks, NodeAdded, NodeRemoved, Verdict};
use crate::node::{Direction, Node, NodeClass, NodeIndex, NodeSpec};
use crate::policy::{FallbackPolicy, PolicyId, PolicySetup, RoutingPolicy};
use crate::registry::NodeDirectory;

/// The routing core.
///
/// # Example
///
/// ```
/// use ruta_core::{ConnectionKind, Direction, NodeClass, NodeSpec, Router, RouterConfig};
///
/// let mut router = Router::new(RouterConfig::default())?;
/// let speakers = router.register_node(NodeSpec::device("speakers", Direction::Output))?;
/// let player = router.register_node(
///     NodeSpec::stream("music", Direction::Input).with_class(NodeClass::Player),
/// )?;
///
/// router.make_routing();
/// let conn = router.connection_between(player, speakers).unwrap();
/// assert_eq!(conn.kind(), ConnectionKind::Implicit);
/// # Ok::<(), ruta_core::RoutingError>(())
/// ```
pub struct Router {
    config: RouterConfig,
    nodes: NodeDirectory,
    domains: DomainTable,
    groups: GroupTable,
    /// Implicit candidates, in policy order.
    candidates: Vec<NodeIndex>,
    connections: ConnectionDirectory,
    /// Outstanding explicit requests.
    explicit: BTreeSet<ConnectionKey>,
    policy: Box<dyn RoutingPolicy>,
    policy_id: PolicyId,
    next_policy_id: u32,
    epoch: Epoch,
    pending: bool,
    deferred: Deferred,
    hooks: Hooks,
}

impl core::fmt::Debug for Router {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Router")
            .field("policy", &self.policy.name())
            .field("epoch", &self.epoch)
            .field("nodes", &self.nodes.len())
            .field("groups", &self.groups.len())
            .field("domains", &self.domains.len())
            .field("connections", &self.connections.len())
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

impl Router {
    /// Creates a router with a native domain that has no backend.
    ///
    /// The fallback policy is installed immediately.
    pub fn new(config: RouterConfig) -> Result<Self, RoutingError> {
        Self::build(config, None)
    }

    /// Creates a router whose native domain is realized by `backend`.
    pub fn with_native_backend(
        config: RouterConfig,
        backend: impl DomainBackend + 'static,
    ) -> Result<Self, RoutingError> {
        Self::build(config, Some(Box::new(backend)))
    }

    fn build(
        config: RouterConfig,
        native: Option<Box<dyn DomainBackend>>,
    ) -> Result<Self, RoutingError> {
        config.validate()?;
        let domains = DomainTable::new(config.native_domain_priority, native);
        let mut router = Self {
            policy: Box::new(FallbackPolicy::new(config.fallback.default_groups)),
            config,
            nodes: NodeDirectory::new(),
            domains,
            groups: GroupTable::new(),
            candidates: Vec::new(),
            connections: ConnectionDirectory::new(),
            explicit: BTreeSet::new(),
            policy_id: PolicyId::FALLBACK,
            next_policy_id: 1,
            epoch: Epoch::default(),
            pending: false,
            deferred: Deferred::default(),
            hooks: Hooks::default(),
        };
        router.install_fallback();
        Ok(router)
    }

    // ── Nodes ──────────────────────────────────────────────────────────

    /// Registers a node.
    ///
    /// `node_register` interceptors run first and may modify or veto the spec. The node
    /// is then offered to the routing groups, its group assignment is resolved and
    /// `node_added` observers are notified.
    pub fn register_node(&mut self, mut spec: NodeSpec) -> Result<NodeIndex, RoutingError> {
        if self.hooks.node_register.run(&mut spec) == Verdict::Veto {
            tracing::debug!("node_register: '{}' vetoed", spec.name);
            return Err(RoutingError::NodeVetoed { name: spec.name });
        }
        if let Some(&unknown) = spec.domains.iter().find(|&&d| !self.domains.contains(d)) {
            return Err(RoutingError::UnknownDomain(unknown));
        }

        let index = self
            .nodes
            .insert(spec, self.config.name_collision, self.config.max_channels)?;
        self.refresh_node(index);
        self.rebuild_candidates();
        self.pending = true;

        let name = self.node_name(index);
        tracing::debug!(node = %index, "node_register: '{name}'");
        self.hooks.node_added.notify(&NodeAdded { index, name });
        Ok(index)
    }

    /// Unregisters a node.
    ///
    /// Its group membership and candidate status are dropped immediately. Connections
    /// touching it stay recorded until the next pass sweeps them.
    pub fn unregister_node(&mut self, index: NodeIndex) -> Result<(), RoutingError> {
        let node = self
            .nodes
            .remove(index)
            .ok_or(RoutingError::UnknownNode(index))?;
        if let Some(group) = node.member_of.and_then(|g| self.groups.get_mut(g)) {
            group.remove(index);
        }
        self.candidates.retain(|&c| c != index);
        self.pending = true;

        tracing::debug!(node = %index, "node_unregister: '{}'", node.name);
        self.hooks.node_removed.notify(&NodeRemoved {
            index,
            name: node.name,
        });
        Ok(())
    }

    /// Changes a node's availability. Returns `Ok(false)` if it was unchanged.
    pub fn set_available(
        &mut self,
        index: NodeIndex,
        available: bool,
    ) -> Result<bool, RoutingError> {
        self.update_node(index, |node| {
            let changed = node.available != available;
            node.available = available;
            changed
        })
    }

    /// Changes a node's priority. Returns `Ok(false)` if it was unchanged.
    pub fn set_priority(
        &mut self,
        index: NodeIndex,
        priority: i32,
    ) -> Result<bool, RoutingError> {
        self.update_node(index, |node| {
            let changed = node.priority != priority;
            node.priority = priority;
            changed
        })
    }

    /// Sets or clears a node's ignore flag. Returns `Ok(false)` if it was unchanged.
    ///
    /// Ignored nodes are neither implicit candidates nor implicit targets.
    pub fn set_ignore(&mut self, index: NodeIndex, ignore: bool) -> Result<bool, RoutingError> {
        self.update_node(index, |node| {
            let changed = node.ignore != ignore;
            node.ignore = ignore;
            changed
        })
    }

    /// Applies an attribute change.
    ///
    /// A pass is scheduled only if the change can alter its outcome: the node moved
    /// between groups, its group was reordered, its assignment changed, the candidate
    /// list changed, or a group member became (un)routable as an implicit target.
    fn update_node(
        &mut self,
        index: NodeIndex,
        apply: impl FnOnce(&mut Node) -> bool,
    ) -> Result<bool, RoutingError> {
        let node = self
            .nodes
            .get_mut(index)
            .ok_or(RoutingError::UnknownNode(index))?;
        let was_routable = node.is_routable();
        if !apply(node) {
            return Ok(false);
        }
        let regrouped = self.refresh_node(index);
        let reordered = self.rebuild_candidates();
        let target_flipped = self
            .nodes
            .get(index)
            .is_some_and(|n| n.member_of.is_some() && n.is_routable() != was_routable);
        tracing::debug!(
            node = %index,
            regrouped,
            reordered,
            target_flipped,
            "node_update: attributes changed"
        );
        if regrouped || reordered || target_flipped {
            self.pending = true;
        }
        Ok(true)
    }

    /// Routes one node through `group`, overriding its class route.
    pub fn assign_node(&mut self, index: NodeIndex, group: GroupId) -> Result<(), RoutingError> {
        let node = self.nodes.get(index).ok_or(RoutingError::UnknownNode(index))?;
        let target = self.groups.get(group).ok_or(RoutingError::UnknownGroup(group))?;
        if target.direction() != node.direction().opposite() {
            return Err(RoutingError::invalid_assignment(format!(
                "{} node '{}' cannot be routed through {} group '{}'",
                node.direction(),
                node.name(),
                target.direction(),
                target.name()
            )));
        }
        if let Some(node) = self.nodes.get_mut(index) {
            node.pinned = Some(group);
        }
        self.refresh_node(index);
        self.rebuild_candidates();
        self.pending = true;
        Ok(())
    }

    /// Removes an explicit assignment; the node falls back to its class route.
    pub fn unassign_node(&mut self, index: NodeIndex) -> Result<(), RoutingError> {
        let node = self
            .nodes
            .get_mut(index)
            .ok_or(RoutingError::UnknownNode(index))?;
        if node.pinned.take().is_some() {
            self.refresh_node(index);
            self.rebuild_candidates();
            self.pending = true;
        }
        Ok(())
    }

    /// Returns the node with the given index.
    pub fn node(&self, index: NodeIndex) -> Option<&Node> {
        self.nodes.get(index)
    }

    /// Returns the node registered under `name`.
    pub fn node_by_name(&self, name: &str) -> Option<&Node> {
        self.nodes.by_name(name)
    }

    /// Returns the node directory.
    pub fn nodes(&self) -> &NodeDirectory {
        &self.nodes
    }

    /// Returns the implicit candidates in routing order.
    pub fn candidates(&self) -> &[NodeIndex] {
        &self.candidates
    }

    fn node_name(&self, index: NodeIndex) -> String {
        self.nodes
            .get(index)
            .map(|n| n.name().to_string())
            .unwrap_or_default()
    }

    // ── Domains ────────────────────────────────────────────────────────

    /// Registers an external domain.
    pub fn register_domain(
        &mut self,
        name: impl Into<String>,
        priority: i32,
        backend: impl DomainBackend + 'static,
    ) -> Result<DomainId, RoutingError> {
        let id = self.domains.insert(name, priority, Some(Box::new(backend)))?;
        tracing::debug!(domain = %id, priority, "domain_register");
        self.pending = true;
        Ok(id)
    }

    /// Unregisters an external domain and hands its backend back.
    ///
    /// Refused while any connection is owned by, or still realized in, the domain.
    pub fn unregister_domain(
        &mut self,
        id: DomainId,
    ) -> Result<Option<Box<dyn DomainBackend>>, RoutingError> {
        if id == DomainId::NATIVE {
            return Err(RoutingError::NativeDomain);
        }
        if !self.domains.contains(id) {
            return Err(RoutingError::UnknownDomain(id));
        }
        let connections = self.connections.count_in_domain(id);
        if connections > 0 {
            tracing::warn!(domain = %id, connections, "domain_unregister: refused, still in use");
            return Err(RoutingError::DomainInUse {
                domain: id,
                connections,
            });
        }
        let domain = self.domains.remove(id).ok_or(RoutingError::UnknownDomain(id))?;
        tracing::debug!(domain = %id, "domain_unregister: '{}'", domain.name());
        self.pending = true;
        Ok(domain.into_backend())
    }

    /// Returns the domain table.
    pub fn domains(&self) -> &DomainTable {
        &self.domains
    }

    // ── Policy ─────────────────────────────────────────────────────────

    /// Installs a module policy in place of the fallback.
    ///
    /// Fails without side effects if a module policy is already active. If the policy's
    /// `install` fails, everything it created is rolled back, the fallback is
    /// reinstated and the error is returned.
    pub fn register_policy(
        &mut self,
        policy: Box<dyn RoutingPolicy>,
    ) -> Result<PolicyId, RoutingError> {
        if !self.policy_id.is_fallback() {
            return Err(RoutingError::PolicyAlreadyRegistered {
                active: self.policy.name().to_string(),
            });
        }

        self.teardown_groups(PolicyId::FALLBACK);
        let id = PolicyId(self.next_policy_id);
        self.next_policy_id += 1;

        let mut setup = PolicySetup::new(&mut self.groups, id);
        let installed = policy.install(&mut setup);
        let created = setup.into_created();
        if let Err(err) = installed {
            tracing::warn!(policy = policy.name(), "policy_register: install failed: {err}");
            for group in created {
                self.groups.remove(group);
            }
            self.install_fallback();
            self.refresh_all();
            return Err(err);
        }

        tracing::debug!(
            policy = policy.name(),
            groups = created.len(),
            "policy_register: {id}"
        );
        self.policy = policy;
        self.policy_id = id;
        self.refresh_all();
        Ok(id)
    }

    /// Removes the module policy, tears down its groups and reinstates the fallback.
    pub fn unregister_policy(&mut self) -> Result<(), RoutingError> {
        if self.policy_id.is_fallback() {
            return Err(RoutingError::NoPolicyRegistered);
        }
        tracing::debug!(policy = self.policy.name(), "policy_unregister: {}", self.policy_id);
        self.teardown_groups(self.policy_id);
        self.install_fallback();
        self.refresh_all();
        Ok(())
    }

    /// Returns the name of the active policy.
    pub fn policy_name(&self) -> &str {
        self.policy.name()
    }

    /// Returns the id of the active policy.
    pub fn policy_id(&self) -> PolicyId {
        self.policy_id
    }

    fn install_fallback(&mut self) {
        let fallback = FallbackPolicy::new(self.config.fallback.default_groups);
        let mut setup = PolicySetup::new(&mut self.groups, PolicyId::FALLBACK);
        let installed = fallback.install(&mut setup);
        let created = setup.into_created();
        if let Err(err) = installed {
            tracing::error!("policy_fallback: default groups unavailable: {err}");
            for group in created {
                self.groups.remove(group);
            }
        }
        self.policy = Box::new(fallback);
        self.policy_id = PolicyId::FALLBACK;
    }

    /// Destroys every group owned by `owner`, detaching members and pins.
    fn teardown_groups(&mut self, owner: PolicyId) {
        for id in self.groups.owned_by(owner) {
            self.detach_group(id);
        }
    }

    fn detach_group(&mut self, id: GroupId) {
        let Some(mut group) = self.groups.remove(id) else {
            return;
        };
        for member in group.clear() {
            if let Some(node) = self.nodes.get_mut(member) {
                node.member_of = None;
            }
        }
        for node in self.nodes.iter_mut() {
            if node.pinned == Some(id) {
                node.pinned = None;
            }
            if node.routed_via == Some(id) {
                node.routed_via = None;
            }
        }
        tracing::debug!(group = %id, "group_destroy: '{}'", group.name());
    }

    // ── Groups ─────────────────────────────────────────────────────────

    /// Registers a group owned by the active policy and offers every node to it.
    pub fn create_group(&mut self, group: RoutingGroup) -> Result<GroupId, RoutingError> {
        let id = self.groups.insert(group, self.policy_id)?;
        tracing::debug!(group = %id, owner = %self.policy_id, "group_create");
        self.refresh_all();
        Ok(id)
    }

    /// Destroys a group, evicting its members and dropping routes through it.
    pub fn destroy_group(&mut self, id: GroupId) -> Result<(), RoutingError> {
        if self.groups.get(id).is_none() {
            return Err(RoutingError::UnknownGroup(id));
        }
        self.detach_group(id);
        self.refresh_all();
        Ok(())
    }

    /// Routes every node of `class` and `direction` through `group`.
    pub fn route_class(
        &mut self,
        class: NodeClass,
        direction: Direction,
        group: GroupId,
    ) -> Result<(), RoutingError> {
        self.groups.route_class(class, direction, group)?;
        self.refresh_all();
        Ok(())
    }

    /// Returns the group with the given id.
    pub fn group(&self, id: GroupId) -> Option<&RoutingGroup> {
        self.groups.get(id)
    }

    /// Returns the group registered under `name`.
    pub fn group_by_name(&self, name: &str) -> Option<&RoutingGroup> {
        self.groups.by_name(name)
    }

    /// Returns the group table.
    pub fn groups(&self) -> &GroupTable {
        &self.groups
    }

    // ── Connections ────────────────────────────────────────────────────

    /// Requests an explicit connection from `input` to `output`.
    ///
    /// The connection is recorded immediately and realized by the next pass. Requesting
    /// a pair that is already connected returns the existing id, upgraded to explicit.
    pub fn connection_request(
        &mut self,
        input: NodeIndex,
        output: NodeIndex,
    ) -> Result<ConnectionId, RoutingError> {
        if input == output {
            return Err(RoutingError::SelfConnection(input));
        }
        let source = self.nodes.get(input).ok_or(RoutingError::UnknownNode(input))?;
        let sink = self.nodes.get(output).ok_or(RoutingError::UnknownNode(output))?;
        for (node, expected) in [(source, Direction::Input), (sink, Direction::Output)] {
            if node.direction() != expected {
                return Err(RoutingError::DirectionMismatch {
                    node: node.index(),
                    expected,
                    actual: node.direction(),
                });
            }
        }
        let domain = self
            .domains
            .best_common(source, sink)
            .ok_or(RoutingError::NoCommonDomain { input, output })?;

        let key = ConnectionKey::new(input, output);
        self.explicit.insert(key);
        let id = self
            .connections
            .upsert(key, ConnectionKind::Explicit, domain, self.epoch);
        tracing::debug!(connection = %id, domain = %domain, "connection_request: {key}");
        self.pending = true;
        Ok(id)
    }

    /// Releases an explicit connection.
    ///
    /// The edge is torn down by the next pass unless that pass derives it implicitly.
    pub fn connection_release(&mut self, id: ConnectionId) -> Result<(), RoutingError> {
        let key = self
            .connections
            .get(id)
            .map(Connection::key)
            .ok_or(RoutingError::UnknownConnection(id))?;
        if !self.explicit.remove(&key) {
            return Err(RoutingError::NotExplicit(id));
        }
        tracing::debug!(connection = %id, "connection_release: {key}");
        self.pending = true;
        Ok(())
    }

    /// Returns the connection with the given id.
    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(id)
    }

    /// Returns the connection between `input` and `output`.
    pub fn connection_between(&self, input: NodeIndex, output: NodeIndex) -> Option<&Connection> {
        self.connections.find(input, output)
    }

    /// Returns the connection directory.
    pub fn connections(&self) -> &ConnectionDirectory {
        &self.connections
    }

    /// Returns true if an explicit request for the pair is outstanding.
    pub fn is_explicitly_requested(&self, input: NodeIndex, output: NodeIndex) -> bool {
        self.explicit.contains(&ConnectionKey::new(input, output))
    }

    // ── Scheduling ─────────────────────────────────────────────────────

    /// Marks a routing pass as pending.
    pub fn schedule_routing(&mut self) {
        self.pending = true;
    }

    /// Returns true if state changed since the last pass.
    pub fn is_routing_pending(&self) -> bool {
        self.pending
    }

    /// Runs one routing pass if one is pending.
    pub fn process_pending(&mut self) -> Option<RoutingReport> {
        self.pending.then(|| self.make_routing())
    }

    /// Returns the epoch of the last routing pass.
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// Returns the router configuration.
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Returns the hooks for subscription.
    pub fn hooks_mut(&mut self) -> &mut Hooks {
        &mut self.hooks
    }

    /// Applies commands queued by backend callbacks during a pass.
    fn apply_deferred(&mut self) {
        for command in self.deferred.drain() {
            let outcome = match command {
                Command::SetAvailable(node, available) => {
                    self.set_available(node, available).map(drop)
                }
                Command::SetPriority(node, priority) => {
                    self.set_priority(node, priority).map(drop)
                }
                Command::Unregister(node) => self.unregister_node(node),
                Command::Release(id) => self.connection_release(id),
                Command::Reroute => {
                    self.pending = true;
                    Ok(())
                }
            };
            if let Err(err) = outcome {
                tracing::warn!("deferred: {command:?} failed: {err}");
            }
            self.pending = true;
        }
    }

    // ── Membership and assignment ─────────────────────────────────────

    /// Re-evaluates one node's group membership and assignment. Returns true if its
    /// membership, its group's order or its assignment changed.
    fn refresh_node(&mut self, index: NodeIndex) -> bool {
        let Some(node) = self.nodes.get(index) else {
            return false;
        };
        let current = node.member_of;
        let wanted = self.groups.first_accepting(node);
        let mut changed = current != wanted;
        if current == wanted {
            if let Some(group) = current.and_then(|g| self.groups.get_mut(g)) {
                changed = group.resort(&self.nodes);
            }
        } else {
            if let Some(group) = current.and_then(|g| self.groups.get_mut(g)) {
                group.remove(index);
            }
            if let Some(group) = wanted.and_then(|g| self.groups.get_mut(g)) {
                group.offer(node, &self.nodes);
            }
        }
        let routed_via = node
            .pinned
            .filter(|&g| self.groups.get(g).is_some())
            .or_else(|| {
                // Class routes only apply to nodes whose class matches their kind.
                (node.class().is_stream_class() == node.is_stream())
                    .then(|| self.groups.class_route(node.class(), node.direction()))
                    .flatten()
            });

        changed |= node.routed_via != routed_via;

        if let Some(node) = self.nodes.get_mut(index) {
            node.member_of = wanted;
            node.routed_via = routed_via;
        }
        changed
    }

    fn refresh_all(&mut self) {
        for index in self.nodes.indices() {
            self.refresh_node(index);
        }
        self.rebuild_candidates();
        self.pending = true;
    }

    /// Rebuilds the candidate list: routable nodes accepted by the policy that are
    /// routed through a group, in policy order. Returns true if the list changed.
    fn rebuild_candidates(&mut self) -> bool {
        let policy = &self.policy;
        let mut candidates: Vec<&Node> = self
            .nodes
            .iter()
            .filter(|n| n.routed_via.is_some() && n.is_routable() && policy.accept(n))
            .collect();
        candidates.sort_by(|a, b| policy.compare(a, b));
        let candidates: Vec<NodeIndex> = candidates.into_iter().map(Node::index).collect();
        let changed = candidates != self.candidates;
        self.candidates = candidates;
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{DEFAULT_INPUT_GROUP, DEFAULT_OUTPUT_GROUP, FnPolicy, fallback_compare};

    fn router() -> Router {
        Router::new(RouterConfig::default()).unwrap()
    }

    #[test]
    fn fallback_groups_installed_at_startup() {
        let r = router();
        assert!(r.policy_id().is_fallback());
        assert_eq!(r.policy_name(), "fallback");
        assert!(r.group_by_name(DEFAULT_OUTPUT_GROUP).is_some());
        assert!(r.group_by_name(DEFAULT_INPUT_GROUP).is_some());
        assert!(!r.is_routing_pending());
    }

    #[test]
    fn invalid_config_rejected() {
        let config = RouterConfig {
            max_channels: 0,
            ..Default::default()
        };
        assert!(matches!(
            Router::new(config),
            Err(RoutingError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn devices_join_default_groups_streams_are_assigned() {
        let mut r = router();
        let spk = r
            .register_node(NodeSpec::device("spk", Direction::Output))
            .unwrap();
        let player = r
            .register_node(NodeSpec::stream("p", Direction::Input).with_class(NodeClass::Player))
            .unwrap();
        let out = r.group_by_name(DEFAULT_OUTPUT_GROUP).unwrap().id();

        assert_eq!(r.node(spk).unwrap().group(), Some(out));
        assert_eq!(r.node(player).unwrap().group(), None);
        assert_eq!(r.node(player).unwrap().routed_via(), Some(out));
        assert_eq!(r.candidates(), &[player]);
        assert!(r.is_routing_pending());
    }

    #[test]
    fn unavailable_device_leaves_group() {
        let mut r = router();
        let spk = r
            .register_node(NodeSpec::device("spk", Direction::Output))
            .unwrap();
        assert!(r.set_available(spk, false).unwrap());
        assert!(!r.set_available(spk, false).unwrap());
        assert_eq!(r.node(spk).unwrap().group(), None);
        assert!(r.group_by_name(DEFAULT_OUTPUT_GROUP).unwrap().is_empty());

        r.set_available(spk, true).unwrap();
        assert!(r.group_by_name(DEFAULT_OUTPUT_GROUP).unwrap().contains(spk));
    }

    #[test]
    fn priority_change_resorts_group() {
        let mut r = router();
        let a = r
            .register_node(NodeSpec::device("a", Direction::Output).with_priority(10))
            .unwrap();
        let b = r
            .register_node(NodeSpec::device("b", Direction::Output).with_priority(5))
            .unwrap();
        let out = r.group_by_name(DEFAULT_OUTPUT_GROUP).unwrap().id();
        assert_eq!(r.group(out).unwrap().members(), &[a, b]);

        r.set_priority(b, 20).unwrap();
        assert_eq!(r.group(out).unwrap().members(), &[b, a]);
    }

    #[test]
    fn only_effective_changes_schedule_a_pass() {
        let mut r = router();
        r.register_node(NodeSpec::device("a", Direction::Output).with_priority(10))
            .unwrap();
        let b = r
            .register_node(NodeSpec::device("b", Direction::Output).with_priority(5))
            .unwrap();
        r.make_routing();
        assert!(!r.is_routing_pending());

        // Group order unchanged.
        assert!(r.set_priority(b, 7).unwrap());
        assert!(!r.is_routing_pending());

        assert!(r.set_priority(b, 20).unwrap());
        assert!(r.is_routing_pending());
    }

    #[test]
    fn ungrouped_node_changes_leave_no_pass_pending() {
        let mut r = bare_router();
        let spk = r
            .register_node(NodeSpec::device("spk", Direction::Output))
            .unwrap();
        r.make_routing();

        assert!(r.set_priority(spk, 3).unwrap());
        assert!(r.set_available(spk, false).unwrap());
        assert!(!r.is_routing_pending());
    }

    #[test]
    fn member_routability_schedules_a_pass() {
        let mut r = bare_router();
        let zone = r
            .create_group(RoutingGroup::new(
                "zone",
                Direction::Output,
                |n: &Node| n.is_device(),
                fallback_compare,
            ))
            .unwrap();
        let spk = r
            .register_node(NodeSpec::device("spk", Direction::Output))
            .unwrap();
        r.make_routing();

        assert!(r.set_available(spk, false).unwrap());
        assert_eq!(r.group(zone).unwrap().members(), &[spk]);
        assert!(r.is_routing_pending());
    }

    #[test]
    fn ignored_stream_is_not_a_candidate() {
        let mut r = router();
        let s = r
            .register_node(NodeSpec::stream("s", Direction::Input).with_class(NodeClass::Game))
            .unwrap();
        assert_eq!(r.candidates(), &[s]);
        assert!(r.set_ignore(s, true).unwrap());
        assert!(r.candidates().is_empty());
    }

    #[test]
    fn unregister_drops_membership_and_candidacy() {
        let mut r = router();
        let spk = r
            .register_node(NodeSpec::device("spk", Direction::Output))
            .unwrap();
        let s = r
            .register_node(NodeSpec::stream("s", Direction::Input).with_class(NodeClass::Player))
            .unwrap();
        r.unregister_node(spk).unwrap();
        r.unregister_node(s).unwrap();
        assert!(r.group_by_name(DEFAULT_OUTPUT_GROUP).unwrap().is_empty());
        assert!(r.candidates().is_empty());
        assert_eq!(r.unregister_node(s), Err(RoutingError::UnknownNode(s)));
    }

    #[test]
    fn vetoed_node_is_not_registered() {
        let mut r = router();
        r.hooks_mut().node_register.subscribe(|spec| {
            if spec.name.ends_with(".monitor") {
                Verdict::Veto
            } else {
                Verdict::Accept
            }
        });
        let err = r
            .register_node(NodeSpec::device("hdmi.monitor", Direction::Input))
            .unwrap_err();
        assert_eq!(
            err,
            RoutingError::NodeVetoed {
                name: "hdmi.monitor".into()
            }
        );
        assert!(r.nodes().is_empty());
    }

    #[test]
    fn unknown_domain_in_spec_rejected() {
        let mut r = router();
        let err = r
            .register_node(NodeSpec::device("x", Direction::Output).with_domain(DomainId(9)))
            .unwrap_err();
        assert_eq!(err, RoutingError::UnknownDomain(DomainId(9)));
    }

    fn bare_router() -> Router {
        let mut config = RouterConfig::default();
        config.fallback.default_groups = false;
        Router::new(config).unwrap()
    }

    #[test]
    fn assign_node_checks_direction() {
        let mut r = bare_router();
        let out = r
            .create_group(RoutingGroup::new(
                "zone-out",
                Direction::Output,
                |_| true,
                fallback_compare,
            ))
            .unwrap();
        let input = r
            .create_group(RoutingGroup::new(
                "zone-in",
                Direction::Input,
                |_| true,
                fallback_compare,
            ))
            .unwrap();
        let s = r
            .register_node(NodeSpec::stream("s", Direction::Input))
            .unwrap();

        assert!(r.candidates().is_empty());
        assert!(matches!(
            r.assign_node(s, input),
            Err(RoutingError::InvalidAssignment { .. })
        ));
        r.assign_node(s, out).unwrap();
        assert_eq!(r.node(s).unwrap().routed_via(), Some(out));
        assert_eq!(r.candidates(), &[s]);

        r.unassign_node(s).unwrap();
        assert_eq!(r.node(s).unwrap().routed_via(), None);
    }

    #[test]
    fn devices_ignore_stream_class_routes() {
        let mut r = router();
        let spk = r
            .register_node(NodeSpec::device("spk", Direction::Output))
            .unwrap();
        assert_eq!(r.node(spk).unwrap().class(), NodeClass::Unknown);
        assert_eq!(r.node(spk).unwrap().routed_via(), None);
        assert!(r.candidates().is_empty());
    }

    #[test]
    fn explicit_request_validation() {
        let mut r = router();
        let mic = r
            .register_node(NodeSpec::device("mic", Direction::Input))
            .unwrap();
        let spk = r
            .register_node(NodeSpec::device("spk", Direction::Output))
            .unwrap();
        assert_eq!(
            r.connection_request(spk, mic),
            Err(RoutingError::DirectionMismatch {
                node: spk,
                expected: Direction::Input,
                actual: Direction::Output,
            })
        );
        assert_eq!(
            r.connection_request(mic, mic),
            Err(RoutingError::SelfConnection(mic))
        );

        let id = r.connection_request(mic, spk).unwrap();
        assert_eq!(r.connection_request(mic, spk).unwrap(), id);
        assert!(r.is_explicitly_requested(mic, spk));

        r.connection_release(id).unwrap();
        assert_eq!(r.connection_release(id), Err(RoutingError::NotExplicit(id)));
    }

    #[test]
    fn policy_exclusivity_and_teardown() {
        let mut r = router();
        let spk = r
            .register_node(NodeSpec::device("spk", Direction::Output))
            .unwrap();
        let policy = FnPolicy::new("car", |_| true, fallback_compare).with_install(|setup| {
            let zone = setup.add_group(RoutingGroup::new(
                "front",
                Direction::Output,
                |n| n.is_device(),
                fallback_compare,
            ))?;
            setup.route_stream_classes(Direction::Input, zone)
        });
        r.register_policy(Box::new(policy)).unwrap();
        assert!(r.group_by_name(DEFAULT_OUTPUT_GROUP).is_none());
        let front = r.group_by_name("front").unwrap().id();
        assert_eq!(r.node(spk).unwrap().group(), Some(front));

        let second = FnPolicy::new("other", |_| false, fallback_compare);
        assert_eq!(
            r.register_policy(Box::new(second)),
            Err(RoutingError::PolicyAlreadyRegistered {
                active: "car".into()
            })
        );
        assert_eq!(r.group(front).unwrap().members(), &[spk]);

        r.unregister_policy().unwrap();
        assert!(r.group_by_name("front").is_none());
        let out = r.group_by_name(DEFAULT_OUTPUT_GROUP).unwrap().id();
        assert_eq!(r.node(spk).unwrap().group(), Some(out));
        assert_eq!(r.unregister_policy(), Err(RoutingError::NoPolicyRegistered));
    }

    #[test]
    fn failed_install_rolls_back() {
        let mut r = router();
        let policy = FnPolicy::new("broken", |_| true, fallback_compare).with_install(|setup| {
            setup.add_group(RoutingGroup::new(
                "zone",
                Direction::Output,
                |_| true,
                fallback_compare,
            ))?;
            setup.add_group(RoutingGroup::new(
                "zone",
                Direction::Output,
                |_| true,
                fallback_compare,
            ))?;
            Ok(())
        });
        assert_eq!(
            r.register_policy(Box::new(policy)),
            Err(RoutingError::duplicate_name("zone"))
        );
        assert!(r.group_by_name("zone").is_none());
        assert!(r.policy_id().is_fallback());
        assert!(r.group_by_name(DEFAULT_OUTPUT_GROUP).is_some());
    }

    #[test]
    fn destroy_group_clears_pins() {
        let mut r = bare_router();
        let zone = r
            .create_group(RoutingGroup::new(
                "zone",
                Direction::Output,
                |n| n.is_device(),
                fallback_compare,
            ))
            .unwrap();
        let s = r
            .register_node(NodeSpec::stream("s", Direction::Input))
            .unwrap();
        r.assign_node(s, zone).unwrap();
        r.destroy_group(zone).unwrap();
        assert_eq!(r.node(s).unwrap().routed_via(), None);
        assert_eq!(r.destroy_group(zone), Err(RoutingError::UnknownGroup(zone)));
    }

    #[test]
    fn native_domain_cannot_be_unregistered() {
        let mut r = router();
        assert!(matches!(
            r.unregister_domain(DomainId::NATIVE),
            Err(RoutingError::NativeDomain)
        ));
        assert!(matches!(
            r.unregister_domain(DomainId(5)),
            Err(RoutingError::UnknownDomain(_))
        ));
    }
}
