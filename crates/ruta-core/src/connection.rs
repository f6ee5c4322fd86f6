//! Connections and the connection directory.
//!
//! A [`Connection`] is a directed edge from an input node to an output node. The
//! `(input, output)` pair is the identity key: the [`ConnectionDirectory`] never holds
//! two connections for the same pair, and ids are never reused.

use core::fmt;
use std::collections::HashMap;

use crate::domain::{DomainId, Epoch};
use crate::node::NodeIndex;

/// Unique identifier for a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(pub(crate) u32);

impl ConnectionId {
    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// How a connection came to exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConnectionKind {
    /// Requested directly by a collaborator; lives until released.
    Explicit,
    /// Derived by the implicit pass; lives as long as each pass re-derives it.
    Implicit,
}

impl fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Explicit => "explicit",
            Self::Implicit => "implicit",
        })
    }
}

/// Identity key of a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionKey {
    /// Input (producing) endpoint.
    pub input: NodeIndex,
    /// Output (consuming) endpoint.
    pub output: NodeIndex,
}

impl ConnectionKey {
    /// Creates a key.
    pub fn new(input: NodeIndex, output: NodeIndex) -> Self {
        Self { input, output }
    }

    /// Returns true if `node` is either endpoint.
    pub fn touches(&self, node: NodeIndex) -> bool {
        self.input == node || self.output == node
    }
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.input, self.output)
    }
}

/// A recorded edge between two nodes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Connection {
    id: ConnectionId,
    key: ConnectionKey,
    pub(crate) kind: ConnectionKind,
    pub(crate) domain: DomainId,
    pub(crate) epoch: Epoch,
    /// Kind and domain of the last successful `implement`, if any.
    pub(crate) implemented: Option<(ConnectionKind, DomainId)>,
}

impl Connection {
    /// Returns the connection id.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the identity key.
    pub fn key(&self) -> ConnectionKey {
        self.key
    }

    /// Returns the input endpoint.
    pub fn input(&self) -> NodeIndex {
        self.key.input
    }

    /// Returns the output endpoint.
    pub fn output(&self) -> NodeIndex {
        self.key.output
    }

    /// Returns the connection kind.
    pub fn kind(&self) -> ConnectionKind {
        self.kind
    }

    /// Returns true for explicit connections.
    pub fn is_explicit(&self) -> bool {
        self.kind == ConnectionKind::Explicit
    }

    /// Returns the owning domain.
    pub fn domain(&self) -> DomainId {
        self.domain
    }

    /// Returns the last routing pass that confirmed the connection.
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// Returns true once the owning domain has implemented the current kind.
    pub fn is_implemented(&self) -> bool {
        !self.needs_implement()
    }

    /// Returns true if the domain has not yet realized the connection as it stands:
    /// it is new, changed kind or domain, or failed to implement last time.
    pub(crate) fn needs_implement(&self) -> bool {
        self.implemented != Some((self.kind, self.domain))
    }
}

/// Every recorded connection, keyed by `(input, output)`.
#[derive(Debug, Default)]
pub struct ConnectionDirectory {
    by_key: HashMap<ConnectionKey, Connection>,
    by_id: HashMap<ConnectionId, ConnectionKey>,
    next_id: u32,
}

impl ConnectionDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a connection, or refreshes the existing one for the same pair.
    ///
    /// An existing connection takes the new kind, domain and epoch, except that an
    /// implicit upsert never downgrades an explicit connection already confirmed in
    /// the same epoch.
    pub(crate) fn upsert(
        &mut self,
        key: ConnectionKey,
        kind: ConnectionKind,
        domain: DomainId,
        epoch: Epoch,
    ) -> ConnectionId {
        if let Some(existing) = self.by_key.get_mut(&key) {
            let keeps_explicit = existing.epoch == epoch
                && existing.kind == ConnectionKind::Explicit
                && kind == ConnectionKind::Implicit;
            if !keeps_explicit {
                existing.kind = kind;
                existing.domain = domain;
            }
            existing.epoch = epoch;
            return existing.id;
        }

        let id = ConnectionId(self.next_id);
        self.next_id += 1;
        self.by_id.insert(id, key);
        self.by_key.insert(
            key,
            Connection {
                id,
                key,
                kind,
                domain,
                epoch,
                implemented: None,
            },
        );
        id
    }

    /// Removes a connection and returns it.
    pub(crate) fn remove(&mut self, id: ConnectionId) -> Option<Connection> {
        let key = self.by_id.remove(&id)?;
        self.by_key.remove(&key)
    }

    /// Returns the connection for the given pair.
    pub fn find(&self, input: NodeIndex, output: NodeIndex) -> Option<&Connection> {
        self.by_key.get(&ConnectionKey::new(input, output))
    }

    /// Returns the connection with the given id.
    pub fn get(&self, id: ConnectionId) -> Option<&Connection> {
        self.by_id.get(&id).and_then(|key| self.by_key.get(key))
    }

    pub(crate) fn get_mut(&mut self, id: ConnectionId) -> Option<&mut Connection> {
        let key = self.by_id.get(&id)?;
        self.by_key.get_mut(key)
    }

    /// Iterates over all connections in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.by_key.values()
    }

    /// Returns every connection id in ascending order.
    pub fn ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<_> = self.by_id.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Returns the number of connections.
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    /// Returns true if there are no connections.
    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    /// Counts connections that are owned by, or still realized in, `domain`.
    pub fn count_in_domain(&self, domain: DomainId) -> usize {
        self.by_key
            .values()
            .filter(|c| c.domain == domain || c.implemented.is_some_and(|(_, d)| d == domain))
            .count()
    }
}
