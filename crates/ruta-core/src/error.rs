//! Error types for routing operations.
//!
//! Errors are split into two categories:
//! - **Request errors** ([`RoutingError`]): a registration or request did not take effect.
//!   The router state is unchanged and the caller decides how to recover.
//! - **Backend errors** ([`BackendError`]): a [`DomainBackend`](crate::DomainBackend)
//!   failed to materialize or tear down an edge. These never escape a routing pass; they
//!   are logged, counted in the [`RoutingReport`](crate::RoutingReport) and retried on the
//!   next pass.

use crate::connection::ConnectionId;
use crate::domain::DomainId;
use crate::group::GroupId;
use crate::node::{Direction, NodeIndex};

/// Errors returned by [`Router`](crate::Router) operations.
///
/// None of these are fatal: every variant means "this change did not take effect" and
/// the router remains in a consistent, resolvable state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoutingError {
    /// A node, group or domain with this name is already registered.
    #[error("name already registered: {name}")]
    DuplicateName {
        /// The conflicting name.
        name: String,
    },

    /// Names must be non-empty.
    #[error("invalid name: {reason}")]
    InvalidName {
        /// Why the name was rejected.
        reason: String,
    },

    /// The channel count is outside `1..=max`.
    #[error("channel count {channels} out of range (1..={max})")]
    InvalidChannels {
        /// Requested channel count.
        channels: u8,
        /// Configured upper bound.
        max: u8,
    },

    /// A pre-registration hook vetoed the node.
    #[error("node '{name}' vetoed before registration")]
    NodeVetoed {
        /// Name the node was registered under.
        name: String,
    },

    /// No node with this index exists.
    #[error("unknown node: {0}")]
    UnknownNode(NodeIndex),

    /// No routing group with this id exists.
    #[error("unknown routing group: {0}")]
    UnknownGroup(GroupId),

    /// No domain with this id exists.
    #[error("unknown domain: {0}")]
    UnknownDomain(DomainId),

    /// No connection with this id exists.
    #[error("unknown connection: {0}")]
    UnknownConnection(ConnectionId),

    /// The connection exists but was not requested explicitly.
    #[error("connection {0} is not an explicit connection")]
    NotExplicit(ConnectionId),

    /// An endpoint has the wrong direction for its side of the connection.
    #[error("node {node} has direction {actual}, expected {expected}")]
    DirectionMismatch {
        /// Offending node.
        node: NodeIndex,
        /// Direction required on that side.
        expected: Direction,
        /// Direction the node actually has.
        actual: Direction,
    },

    /// A connection from a node to itself was requested.
    #[error("node {0} cannot be connected to itself")]
    SelfConnection(NodeIndex),

    /// The two endpoints share no domain able to realize the connection.
    #[error("nodes {input} and {output} share no domain")]
    NoCommonDomain {
        /// Input endpoint.
        input: NodeIndex,
        /// Output endpoint.
        output: NodeIndex,
    },

    /// A module policy is already active; unregister it first.
    #[error("routing policy '{active}' is already registered")]
    PolicyAlreadyRegistered {
        /// Name of the active policy.
        active: String,
    },

    /// Only the fallback policy is active, there is nothing to unregister.
    #[error("no routing policy registered")]
    NoPolicyRegistered,

    /// The built-in native domain can never be unregistered.
    #[error("the native domain cannot be unregistered")]
    NativeDomain,

    /// Live connections still depend on the domain.
    #[error("domain {domain} is still used by {connections} connection(s)")]
    DomainInUse {
        /// Domain that was asked to go away.
        domain: DomainId,
        /// Number of connections owned by it.
        connections: usize,
    },

    /// A node or class was routed through a group it cannot be routed through.
    #[error("invalid group assignment: {reason}")]
    InvalidAssignment {
        /// Why the assignment was rejected.
        reason: String,
    },

    /// The router configuration is out of range.
    #[error("invalid router configuration: {reason}")]
    InvalidConfig {
        /// Description of the problem.
        reason: String,
    },
}

impl RoutingError {
    /// Creates a duplicate name error.
    pub fn duplicate_name(name: impl Into<String>) -> Self {
        Self::DuplicateName { name: name.into() }
    }

    /// Creates an invalid assignment error with the given reason.
    pub fn invalid_assignment(reason: impl Into<String>) -> Self {
        Self::InvalidAssignment {
            reason: reason.into(),
        }
    }

    /// Creates an invalid configuration error with the given reason.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}

/// Errors raised by a [`DomainBackend`](crate::DomainBackend) implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The backend refused the request.
    #[error("rejected by backend: {reason}")]
    Rejected {
        /// Description of why the request was refused.
        reason: String,
    },

    /// The backend (or the system behind it) is currently unreachable.
    #[error("backend unavailable: {reason}")]
    Unavailable {
        /// Description of what is unavailable.
        reason: String,
    },

    /// Custom error for backend implementations.
    #[error("{0}")]
    Custom(String),
}

impl BackendError {
    /// Creates a rejection with the given reason.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    /// Creates an unavailable error with the given reason.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Creates a custom backend error with the given message.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_name_display() {
        let err = RoutingError::duplicate_name("alsa_output.speakers");
        assert_eq!(
            err.to_string(),
            "name already registered: alsa_output.speakers"
        );
    }

    #[test]
    fn direction_mismatch_display() {
        let err = RoutingError::DirectionMismatch {
            node: NodeIndex(4),
            expected: Direction::Input,
            actual: Direction::Output,
        };
        assert_eq!(
            err.to_string(),
            "node node#4 has direction output, expected input"
        );
    }

    #[test]
    fn domain_in_use_display() {
        let err = RoutingError::DomainInUse {
            domain: DomainId(2),
            connections: 3,
        };
        assert!(err.to_string().contains("3 connection(s)"));
    }

    #[test]
    fn backend_error_constructors() {
        assert_eq!(
            BackendError::rejected("no route").to_string(),
            "rejected by backend: no route"
        );
        assert_eq!(
            BackendError::unavailable("bus down").to_string(),
            "backend unavailable: bus down"
        );
        assert_eq!(BackendError::custom("boom").to_string(), "boom");
    }
}
