//! Typed event hooks.
//!
//! Each event kind has its own observer list. Observers are invoked synchronously on the
//! control thread, in subscription order, after the state change they describe has
//! been applied. Observers receive the event by reference and cannot reach back into
//! the router; collaborators that need to react with a mutation do so on their next
//! turn through the normal router operations.

use crate::connection::{ConnectionId, ConnectionKind};
use crate::domain::{DomainId, Epoch};
use crate::node::{NodeIndex, NodeSpec};

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// An ordered list of observers for one event type.
pub struct Observers<E> {
    entries: Vec<(SubscriptionId, Box<dyn FnMut(&E)>)>,
    next_id: u64,
}

impl<E> Default for Observers<E> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
        }
    }
}

impl<E> core::fmt::Debug for Observers<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Observers")
            .field("len", &self.entries.len())
            .finish()
    }
}

impl<E> Observers<E> {
    /// Adds an observer at the end of the list.
    pub fn subscribe(&mut self, observer: impl FnMut(&E) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, Box::new(observer)));
        id
    }

    /// Removes an observer. Returns false if the id is unknown.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        before != self.entries.len()
    }

    /// Invokes every observer in subscription order.
    pub fn notify(&mut self, event: &E) {
        for (_, observer) in &mut self.entries {
            observer(event);
        }
    }

    /// Returns the number of observers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no observers.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Outcome of a pre-registration interceptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Let the (possibly modified) node register.
    Accept,
    /// Refuse the node.
    Veto,
}

/// Interceptors run before a node is registered.
///
/// Each one may modify the [`NodeSpec`] in place. The first veto stops the chain and
/// the registration fails.
#[derive(Default)]
pub struct Interceptors {
    entries: Vec<(SubscriptionId, Box<dyn FnMut(&mut NodeSpec) -> Verdict>)>,
    next_id: u64,
}

impl core::fmt::Debug for Interceptors {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Interceptors")
            .field("len", &self.entries.len())
            .finish()
    }
}

impl Interceptors {
    /// Adds an interceptor at the end of the chain.
    pub fn subscribe(
        &mut self,
        interceptor: impl FnMut(&mut NodeSpec) -> Verdict + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, Box::new(interceptor)));
        id
    }

    /// Removes an interceptor. Returns false if the id is unknown.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        before != self.entries.len()
    }

    /// Runs the chain over `spec`.
    pub fn run(&mut self, spec: &mut NodeSpec) -> Verdict {
        for (_, interceptor) in &mut self.entries {
            if interceptor(spec) == Verdict::Veto {
                return Verdict::Veto;
            }
        }
        Verdict::Accept
    }

    /// Returns the number of interceptors.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no interceptors.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A node became visible.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeAdded {
    /// Index of the new node.
    pub index: NodeIndex,
    /// Registered name.
    pub name: String,
}

/// A node was unregistered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeRemoved {
    /// Index the node had.
    pub index: NodeIndex,
    /// Name the node had.
    pub name: String,
}

/// A connection was materialized (or refreshed) by its domain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionImplemented {
    /// Connection id.
    pub id: ConnectionId,
    /// Input endpoint.
    pub input: NodeIndex,
    /// Output endpoint.
    pub output: NodeIndex,
    /// Explicit or implicit.
    pub kind: ConnectionKind,
    /// Domain that realized it.
    pub domain: DomainId,
    /// Routing pass that confirmed it.
    pub epoch: Epoch,
}

/// A previously implemented connection was torn down.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionRemoved {
    /// Connection id.
    pub id: ConnectionId,
    /// Input endpoint.
    pub input: NodeIndex,
    /// Output endpoint.
    pub output: NodeIndex,
    /// Kind it had when last implemented.
    pub kind: ConnectionKind,
    /// Domain that had realized it.
    pub domain: DomainId,
}

/// Every hook the router exposes.
#[derive(Debug, Default)]
pub struct Hooks {
    /// Runs before a node registers; may modify or veto it.
    pub node_register: Interceptors,
    /// Fired after a node registered.
    pub node_added: Observers<NodeAdded>,
    /// Fired after a node was unregistered.
    pub node_removed: Observers<NodeRemoved>,
    /// Fired after a domain implemented a connection.
    pub connection_implemented: Observers<ConnectionImplemented>,
    /// Fired after an implemented connection was removed.
    pub connection_removed: Observers<ConnectionRemoved>,
}
