//! Ruta Core - policy-driven audio routing
//!
//! This crate decides, and keeps re-deciding, which audio endpoints connect to which,
//! across one or more backends able to realize those connections.
//!
//! # Core Abstractions
//!
//! ## Graph Model
//!
//! - [`Node`] - A device or stream endpoint, registered from a [`NodeSpec`]
//! - [`RoutingGroup`] - Direction-scoped, priority-ordered set of implicit targets
//! - [`Connection`] - Edge from an input node to an output node, explicit or implicit
//!
//! ## Backends
//!
//! - [`DomainBackend`] - Trait realizing connections (native graph or external manager)
//! - [`RoutingPlan`] - Per-domain scratch object bracketing one routing pass
//! - [`Deferred`] - Follow-up work a backend queues during a pass
//!
//! ## Policy
//!
//! - [`RoutingPolicy`] - Candidate filter, candidate order and group installation
//! - [`FnPolicy`] - Policy assembled from closures
//! - [`FallbackPolicy`] - Built-in policy active whenever no module policy is registered
//!
//! ## Orchestration
//!
//! - [`Router`] - Owns everything above and runs [`Router::make_routing`]
//! - [`Hooks`] - Typed observer lists for node and connection events
//!
//! # Example
//!
//! ```rust
//! use ruta_core::{
//!     Direction, FnPolicy, NodeClass, NodeSpec, Router, RouterConfig, RoutingGroup,
//!     fallback_compare,
//! };
//!
//! let mut router = Router::new(RouterConfig::default())?;
//!
//! // A policy routing media streams to the best available speaker.
//! router.register_policy(Box::new(
//!     FnPolicy::new("media", |n| n.is_stream(), fallback_compare).with_install(|setup| {
//!         let speakers = setup.add_group(RoutingGroup::new(
//!             "speakers",
//!             Direction::Output,
//!             |n| n.is_device() && n.is_routable(),
//!             fallback_compare,
//!         ))?;
//!         setup.route_class(NodeClass::Player, Direction::Input, speakers)
//!     }),
//! ))?;
//!
//! let front = router.register_node(NodeSpec::device("front", Direction::Output).with_priority(10))?;
//! let rear = router.register_node(NodeSpec::device("rear", Direction::Output))?;
//! let music = router.register_node(
//!     NodeSpec::stream("music", Direction::Input).with_class(NodeClass::Player),
//! )?;
//!
//! router.make_routing();
//! assert!(router.connection_between(music, front).is_some());
//!
//! // Losing the front speaker moves the stream on the next pass.
//! router.set_available(front, false)?;
//! router.process_pending();
//! assert!(router.connection_between(music, front).is_none());
//! assert!(router.connection_between(music, rear).is_some());
//! # Ok::<(), ruta_core::RoutingError>(())
//! ```
//!
//! # Design Principles
//!
//! - **Single control thread**: no locking; all mutation goes through [`Router`]
//! - **No re-entrancy**: backends never see the router, they queue on [`Deferred`]
//! - **Failures degrade**: backend errors are logged and retried, never fatal

pub mod config;
pub mod connection;
pub mod domain;
pub mod error;
pub mod group;
pub mod hooks;
pub mod node;
pub mod policy;
pub mod registry;
pub mod router;

// Re-export main types at crate root
pub use config::{FallbackConfig, NameCollision, RouterConfig};
pub use connection::{
    Connection, ConnectionDirectory, ConnectionId, ConnectionKey, ConnectionKind,
};
pub use domain::{
    Command, Deferred, Domain, DomainBackend, DomainId, DomainTable, Epoch, Link,
    NATIVE_DOMAIN_NAME, RoutingPlan,
};
pub use error::{BackendError, RoutingError};
pub use group::{AcceptFn, CompareFn, GroupId, GroupTable, RoutingGroup};
pub use hooks::{
    ConnectionImplemented, ConnectionRemoved, Hooks, Interceptors, NodeAdded, NodeRemoved,
    Observers, SubscriptionId, Verdict,
};
pub use node::{
    CHANNELS_MAX, Direction, Implement, LinkType, Location, Node, NodeClass, NodeContext,
    NodeIndex, NodeSpec, NodeType, Position, Privacy,
};
pub use policy::{
    DEFAULT_INPUT_GROUP, DEFAULT_OUTPUT_GROUP, FallbackPolicy, FnPolicy, PolicyId, PolicySetup,
    RoutingPolicy, fallback_compare,
};
pub use registry::NodeDirectory;
pub use router::{Router, RoutingReport};
