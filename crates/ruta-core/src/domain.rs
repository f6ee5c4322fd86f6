//! Routing domains: backends able to realize connections.
//!
//! A [`Domain`] wraps one [`DomainBackend`]: the built-in native domain for the
//! server's own stream graph, plus any number of externally registered ones (for
//! example an external audio manager reached over IPC).
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────┐
//! │         Router::make_routing     │
//! └──────────────┬───────────────────┘
//!                │ per pass: create_plan / delete_plan
//!                │ per edge: implement / delete
//!                ▼
//! ┌──────────────────────────────────┐
//! │        DomainBackend trait       │
//! └──────────────┬───────────────────┘
//!        ┌───────┴────────┐
//!        ▼                ▼
//! ┌─────────────┐  ┌─────────────┐
//! │   native    │  │  external   │
//! │ stream graph│  │  managers   │
//! └─────────────┘  └─────────────┘
//! ```
//!
//! Backend callbacks must not block. Any I/O they need is dispatched asynchronously by
//! the backend itself and reported back later through the router's mutation entry
//! points, or queued on the [`Deferred`] handed to every callback.

use core::any::Any;
use core::fmt;
use std::collections::BTreeMap;

use crate::connection::{Connection, ConnectionId};
use crate::error::{BackendError, RoutingError};
use crate::node::{Node, NodeIndex};

/// Name of the built-in domain.
pub const NATIVE_DOMAIN_NAME: &str = "native";

/// Unique identifier for a domain. The native domain is always [`DomainId::NATIVE`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DomainId(pub(crate) u32);

impl DomainId {
    /// The built-in native domain.
    pub const NATIVE: DomainId = DomainId(0);

    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "domain#{}", self.0)
    }
}

/// Identifier of one routing pass.
///
/// 64 bits wide, so wrap-around is not a practical concern.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Epoch(pub(crate) u64);

impl Epoch {
    /// Returns the raw counter value.
    #[inline]
    pub fn value(self) -> u64 {
        self.0
    }

    /// Returns the epoch following this one.
    pub(crate) fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "epoch#{}", self.0)
    }
}

/// Per-domain scratch object bracketing one routing pass.
///
/// Created for every domain at the start of a pass and handed back to
/// [`DomainBackend::delete_plan`] at its end; it never outlives the pass.
pub struct RoutingPlan {
    domain: DomainId,
    epoch: Epoch,
    payload: Option<Box<dyn Any>>,
}

impl fmt::Debug for RoutingPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutingPlan")
            .field("domain", &self.domain)
            .field("epoch", &self.epoch)
            .field("has_payload", &self.payload.is_some())
            .finish()
    }
}

impl RoutingPlan {
    pub(crate) fn new(domain: DomainId, epoch: Epoch) -> Self {
        Self {
            domain,
            epoch,
            payload: None,
        }
    }

    /// Returns the domain the plan belongs to.
    pub fn domain(&self) -> DomainId {
        self.domain
    }

    /// Returns the pass the plan belongs to.
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// Stores a domain-specific payload, replacing any previous one.
    pub fn set_payload<T: Any>(&mut self, payload: T) {
        self.payload = Some(Box::new(payload));
    }

    /// Returns the payload if it has type `T`.
    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.as_ref()?.downcast_ref()
    }

    /// Returns the payload mutably if it has type `T`.
    pub fn payload_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.payload.as_mut()?.downcast_mut()
    }

    /// Removes and returns the payload if it has type `T`.
    pub fn take_payload<T: Any>(&mut self) -> Option<T> {
        let payload = self.payload.take()?;
        match payload.downcast::<T>() {
            Ok(value) => Some(*value),
            Err(other) => {
                self.payload = Some(other);
                None
            }
        }
    }
}

/// A connection together with its endpoints, as seen by a backend.
///
/// An endpoint is `None` when the node was unregistered before the connection was torn
/// down; backends should fall back to whatever they recorded at implement time.
#[derive(Clone, Copy, Debug)]
pub struct Link<'a> {
    /// The connection being implemented or deleted.
    pub connection: &'a Connection,
    /// Input endpoint.
    pub input: Option<&'a Node>,
    /// Output endpoint.
    pub output: Option<&'a Node>,
}

/// Work a backend callback asks the router to do once the current pass is over.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Change a node's availability.
    SetAvailable(NodeIndex, bool),
    /// Change a node's priority.
    SetPriority(NodeIndex, i32),
    /// Unregister a node.
    Unregister(NodeIndex),
    /// Release an explicit connection.
    Release(ConnectionId),
    /// Run another routing pass.
    Reroute,
}

/// Queue of [`Command`]s collected during a routing pass.
///
/// Routing is never re-entered from a backend callback: everything queued here is
/// applied after the pass, and coalesced into a single pending pass.
#[derive(Debug, Default)]
pub struct Deferred {
    commands: Vec<Command>,
}

impl Deferred {
    /// Queues a command.
    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    /// Queues an availability change.
    pub fn set_available(&mut self, node: NodeIndex, available: bool) {
        self.push(Command::SetAvailable(node, available));
    }

    /// Queues a priority change.
    pub fn set_priority(&mut self, node: NodeIndex, priority: i32) {
        self.push(Command::SetPriority(node, priority));
    }

    /// Queues a node removal.
    pub fn unregister(&mut self, node: NodeIndex) {
        self.push(Command::Unregister(node));
    }

    /// Queues the release of an explicit connection.
    pub fn release(&mut self, connection: ConnectionId) {
        self.push(Command::Release(connection));
    }

    /// Requests another routing pass.
    pub fn request_routing(&mut self) {
        self.push(Command::Reroute);
    }

    /// Returns the number of queued commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub(crate) fn drain(&mut self) -> Vec<Command> {
        core::mem::take(&mut self.commands)
    }
}

/// Backend-specific realization of routing decisions.
///
/// Every callback is optional; the defaults do nothing and succeed. Failures are
/// logged by the router and never abort a pass: a connection that fails to implement
/// stays recorded and is retried on the next pass.
pub trait DomainBackend {
    /// Prepares backend state for a pass.
    fn create_plan(&mut self, _plan: &mut RoutingPlan) -> Result<(), BackendError> {
        Ok(())
    }

    /// Finishes a pass; the plan is dropped afterwards.
    fn delete_plan(&mut self, _plan: &mut RoutingPlan) {}

    /// Materializes (or refreshes) a connection.
    fn implement(
        &mut self,
        _plan: &mut RoutingPlan,
        _link: Link<'_>,
        _deferred: &mut Deferred,
    ) -> Result<(), BackendError> {
        Ok(())
    }

    /// Tears a connection down.
    fn delete(
        &mut self,
        _plan: &mut RoutingPlan,
        _link: Link<'_>,
        _deferred: &mut Deferred,
    ) -> Result<(), BackendError> {
        Ok(())
    }
}

/// A registered routing domain.
pub struct Domain {
    id: DomainId,
    name: String,
    priority: i32,
    pub(crate) backend: Option<Box<dyn DomainBackend>>,
}

impl fmt::Debug for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Domain")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("has_backend", &self.backend.is_some())
            .finish()
    }
}

impl Domain {
    /// Returns the domain id.
    pub fn id(&self) -> DomainId {
        self.id
    }

    /// Returns the domain name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the domain priority. Higher wins when endpoints share several domains.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Returns true for the built-in native domain.
    pub fn is_native(&self) -> bool {
        self.id == DomainId::NATIVE
    }

    /// Consumes the domain, returning its backend.
    pub fn into_backend(self) -> Option<Box<dyn DomainBackend>> {
        self.backend
    }
}

/// The set of registered domains.
#[derive(Debug)]
pub struct DomainTable {
    domains: BTreeMap<DomainId, Domain>,
    next_id: u32,
}

impl DomainTable {
    /// Creates a table holding only the native domain.
    pub(crate) fn new(native_priority: i32, native: Option<Box<dyn DomainBackend>>) -> Self {
        let mut domains = BTreeMap::new();
        domains.insert(
            DomainId::NATIVE,
            Domain {
                id: DomainId::NATIVE,
                name: NATIVE_DOMAIN_NAME.to_string(),
                priority: native_priority,
                backend: native,
            },
        );
        Self {
            domains,
            next_id: 1,
        }
    }

    pub(crate) fn insert(
        &mut self,
        name: impl Into<String>,
        priority: i32,
        backend: Option<Box<dyn DomainBackend>>,
    ) -> Result<DomainId, RoutingError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(RoutingError::InvalidName {
                reason: "domain names must not be empty".to_string(),
            });
        }
        if self.by_name(&name).is_some() {
            return Err(RoutingError::duplicate_name(name));
        }
        let id = DomainId(self.next_id);
        self.next_id += 1;
        self.domains.insert(
            id,
            Domain {
                id,
                name,
                priority,
                backend,
            },
        );
        Ok(id)
    }

    pub(crate) fn remove(&mut self, id: DomainId) -> Option<Domain> {
        self.domains.remove(&id)
    }

    /// Returns the domain with the given id.
    pub fn get(&self, id: DomainId) -> Option<&Domain> {
        self.domains.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: DomainId) -> Option<&mut Domain> {
        self.domains.get_mut(&id)
    }

    /// Returns the domain registered under `name`.
    pub fn by_name(&self, name: &str) -> Option<&Domain> {
        self.domains.values().find(|d| d.name == name)
    }

    /// Returns true if a domain with the given id exists.
    pub fn contains(&self, id: DomainId) -> bool {
        self.domains.contains_key(&id)
    }

    /// Iterates over all domains in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Domain> {
        self.domains.values()
    }

    pub(crate) fn ids(&self) -> Vec<DomainId> {
        self.domains.keys().copied().collect()
    }

    /// Returns the number of domains, native included.
    pub fn len(&self) -> usize {
        self.domains.len()
    }

    /// Always false: the native domain exists for the table's whole lifetime.
    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    /// Picks the owning domain for a connection between two nodes: the highest-priority
    /// domain both can reach, ties broken by lowest id.
    pub fn best_common(&self, a: &Node, b: &Node) -> Option<DomainId> {
        let reach = |node: &Node, id: DomainId| {
            if node.domains().is_empty() {
                id == DomainId::NATIVE
            } else {
                node.domains().contains(&id)
            }
        };
        self.domains
            .values()
            .filter(|d| reach(a, d.id) && reach(b, d.id))
            .min_by(|x, y| y.priority.cmp(&x.priority).then(x.id.cmp(&y.id)))
            .map(|d| d.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NameCollision;
    use crate::node::{Direction, NodeSpec};
    use crate::registry::NodeDirectory;

    #[test]
    fn native_domain_always_present() {
        let table = DomainTable::new(0, None);
        let native = table.get(DomainId::NATIVE).unwrap();
        assert!(native.is_native());
        assert_eq!(native.name(), NATIVE_DOMAIN_NAME);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn duplicate_domain_names_rejected() {
        let mut table = DomainTable::new(0, None);
        assert_eq!(
            table.insert(NATIVE_DOMAIN_NAME, 1, None).unwrap_err(),
            RoutingError::duplicate_name(NATIVE_DOMAIN_NAME)
        );
        let am = table.insert("audiomanager", 1, None).unwrap();
        assert_eq!(am, DomainId(1));
        assert!(table.insert("audiomanager", 2, None).is_err());
    }

    #[test]
    fn best_common_prefers_priority() {
        let mut table = DomainTable::new(0, None);
        let am = table.insert("audiomanager", 10, None).unwrap();
        let low = table.insert("low", -5, None).unwrap();

        let mut dir = NodeDirectory::new();
        let both = dir
            .insert(
                NodeSpec::stream("s", Direction::Input)
                    .with_domain(DomainId::NATIVE)
                    .with_domain(am)
                    .with_domain(low),
                NameCollision::Reject,
                32,
            )
            .unwrap();
        let native_only = dir
            .insert(
                NodeSpec::device("d", Direction::Output),
                NameCollision::Reject,
                32,
            )
            .unwrap();
        let am_only = dir
            .insert(
                NodeSpec::device("e", Direction::Output).with_domain(am),
                NameCollision::Reject,
                32,
            )
            .unwrap();
        let low_only = dir
            .insert(
                NodeSpec::device("f", Direction::Output).with_domain(low),
                NameCollision::Reject,
                32,
            )
            .unwrap();

        let s = dir.get(both).unwrap();
        assert_eq!(
            table.best_common(s, dir.get(native_only).unwrap()),
            Some(DomainId::NATIVE)
        );
        assert_eq!(table.best_common(s, dir.get(am_only).unwrap()), Some(am));
        assert_eq!(table.best_common(s, dir.get(low_only).unwrap()), Some(low));
        assert_eq!(
            table.best_common(dir.get(native_only).unwrap(), dir.get(am_only).unwrap()),
            None
        );
    }

    #[test]
    fn plan_payload_roundtrip() {
        let mut plan = RoutingPlan::new(DomainId::NATIVE, Epoch(3));
        assert!(plan.payload::<u32>().is_none());
        plan.set_payload(vec![1u32, 2]);
        plan.payload_mut::<Vec<u32>>().unwrap().push(3);
        assert!(plan.take_payload::<String>().is_none());
        assert_eq!(plan.take_payload::<Vec<u32>>(), Some(vec![1, 2, 3]));
        assert_eq!(plan.epoch().value(), 3);
    }

    #[test]
    fn deferred_collects_commands() {
        let mut deferred = Deferred::default();
        deferred.set_available(NodeIndex(1), false);
        deferred.request_routing();
        assert_eq!(deferred.len(), 2);
        assert_eq!(
            deferred.drain(),
            vec![Command::SetAvailable(NodeIndex(1), false), Command::Reroute]
        );
        assert!(deferred.is_empty());
    }
}
