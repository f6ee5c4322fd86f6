//! Routing policies.
//!
//! Exactly one policy governs automatic routing at any time. A policy supplies:
//!
//! - `accept`: whether a node is a candidate for implicit routing,
//! - `compare`: the order in which candidates are routed,
//! - `install`: the groups and class routes it needs, created once at load time.
//!
//! When no module has registered a policy, the built-in [`FallbackPolicy`] is active,
//! so the router is always in a well-defined state.

use core::cmp::Ordering;
use core::fmt;

use crate::error::RoutingError;
use crate::group::{AcceptFn, CompareFn, GroupId, GroupTable, RoutingGroup};
use crate::node::{Direction, Node, NodeClass};

/// Name of the fallback group holding output devices.
pub const DEFAULT_OUTPUT_GROUP: &str = "default-output";

/// Name of the fallback group holding input devices.
pub const DEFAULT_INPUT_GROUP: &str = "default-input";

/// Identifies one installation of a policy. The fallback is always [`PolicyId::FALLBACK`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PolicyId(pub(crate) u32);

impl PolicyId {
    /// The built-in fallback policy.
    pub const FALLBACK: PolicyId = PolicyId(0);

    /// Returns true for the fallback policy.
    pub fn is_fallback(self) -> bool {
        self == Self::FALLBACK
    }
}

impl fmt::Display for PolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "policy#{}", self.0)
    }
}

/// A pluggable routing policy.
pub trait RoutingPolicy {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Returns true if `node` should be routed implicitly.
    fn accept(&self, node: &Node) -> bool;

    /// Orders implicit candidates; `Less` routes `a` before `b`.
    fn compare(&self, a: &Node, b: &Node) -> Ordering;

    /// Creates the policy's routing groups and class routes.
    ///
    /// Everything created here is owned by the policy and torn down when it is
    /// unregistered. An error aborts registration and rolls back what was created.
    fn install(&self, _setup: &mut PolicySetup<'_>) -> Result<(), RoutingError> {
        Ok(())
    }
}

/// Default candidate order: descending priority, then ascending index.
pub fn fallback_compare(a: &Node, b: &Node) -> Ordering {
    b.priority()
        .cmp(&a.priority())
        .then_with(|| a.index().cmp(&b.index()))
}

/// The built-in policy active whenever no module policy is registered.
///
/// Accepts every node. With default groups enabled it creates one group per direction
/// holding the routable devices of that direction and routes every stream class
/// through the group of the opposite direction, so each stream follows the
/// highest-priority available device.
#[derive(Debug, Clone)]
pub struct FallbackPolicy {
    default_groups: bool,
}

impl FallbackPolicy {
    /// Creates the fallback policy.
    pub fn new(default_groups: bool) -> Self {
        Self { default_groups }
    }
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self::new(true)
    }
}

impl RoutingPolicy for FallbackPolicy {
    fn name(&self) -> &str {
        "fallback"
    }

    fn accept(&self, _node: &Node) -> bool {
        true
    }

    fn compare(&self, a: &Node, b: &Node) -> Ordering {
        fallback_compare(a, b)
    }

    fn install(&self, setup: &mut PolicySetup<'_>) -> Result<(), RoutingError> {
        if !self.default_groups {
            return Ok(());
        }
        for (name, direction) in [
            (DEFAULT_OUTPUT_GROUP, Direction::Output),
            (DEFAULT_INPUT_GROUP, Direction::Input),
        ] {
            let group = setup.add_group(RoutingGroup::new(
                name,
                direction,
                |node: &Node| node.is_device() && node.is_routable(),
                fallback_compare,
            ))?;
            setup.route_stream_classes(direction.opposite(), group)?;
        }
        Ok(())
    }
}

type InstallFn = Box<dyn Fn(&mut PolicySetup<'_>) -> Result<(), RoutingError>>;

/// A policy assembled from closures.
///
/// # Example
///
/// ```
/// use ruta_core::{Direction, FnPolicy, RoutingGroup, fallback_compare};
///
/// let policy = FnPolicy::new("media-only", |n| n.is_stream(), fallback_compare)
///     .with_install(|setup| {
///         let out = setup.add_group(RoutingGroup::new(
///             "speakers",
///             Direction::Output,
///             |n| n.is_device(),
///             fallback_compare,
///         ))?;
///         setup.route_stream_classes(Direction::Input, out)
///     });
/// # let _ = policy;
/// ```
pub struct FnPolicy {
    name: String,
    accept: AcceptFn,
    compare: CompareFn,
    install: Option<InstallFn>,
}

impl FnPolicy {
    /// Creates a policy from an accept/compare pair.
    pub fn new(
        name: impl Into<String>,
        accept: impl Fn(&Node) -> bool + 'static,
        compare: impl Fn(&Node, &Node) -> Ordering + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            accept: Box::new(accept),
            compare: Box::new(compare),
            install: None,
        }
    }

    /// Sets the closure that creates the policy's groups.
    pub fn with_install(
        mut self,
        install: impl Fn(&mut PolicySetup<'_>) -> Result<(), RoutingError> + 'static,
    ) -> Self {
        self.install = Some(Box::new(install));
        self
    }
}

impl fmt::Debug for FnPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnPolicy")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl RoutingPolicy for FnPolicy {
    fn name(&self) -> &str {
        &self.name
    }

    fn accept(&self, node: &Node) -> bool {
        (self.accept)(node)
    }

    fn compare(&self, a: &Node, b: &Node) -> Ordering {
        (self.compare)(a, b)
    }

    fn install(&self, setup: &mut PolicySetup<'_>) -> Result<(), RoutingError> {
        match &self.install {
            Some(install) => install(setup),
            None => Ok(()),
        }
    }
}

/// Handed to [`RoutingPolicy::install`] to create groups owned by the policy.
pub struct PolicySetup<'a> {
    groups: &'a mut GroupTable,
    owner: PolicyId,
    created: Vec<GroupId>,
}

impl<'a> PolicySetup<'a> {
    pub(crate) fn new(groups: &'a mut GroupTable, owner: PolicyId) -> Self {
        Self {
            groups,
            owner,
            created: Vec::new(),
        }
    }

    /// Registers a group owned by the policy being installed.
    pub fn add_group(&mut self, group: RoutingGroup) -> Result<GroupId, RoutingError> {
        let id = self.groups.insert(group, self.owner)?;
        self.created.push(id);
        Ok(id)
    }

    /// Routes nodes of `class` and `direction` through `group`.
    pub fn route_class(
        &mut self,
        class: NodeClass,
        direction: Direction,
        group: GroupId,
    ) -> Result<(), RoutingError> {
        self.groups.route_class(class, direction, group)
    }

    /// Routes every stream class of `direction` through `group`.
    pub fn route_stream_classes(
        &mut self,
        direction: Direction,
        group: GroupId,
    ) -> Result<(), RoutingError> {
        for class in NodeClass::STREAM_CLASSES {
            self.groups.route_class(class, direction, group)?;
        }
        Ok(())
    }

    /// Looks up a group by name.
    pub fn group_by_name(&self, name: &str) -> Option<GroupId> {
        self.groups.by_name(name).map(RoutingGroup::id)
    }

    /// Groups created so far during this installation.
    pub(crate) fn into_created(self) -> Vec<GroupId> {
        self.created
    }
}
