//! Routable endpoints.
//!
//! A [`Node`] is one device or stream endpoint, facing either into the server
//! ([`Direction::Input`], a producer of audio) or out of it ([`Direction::Output`], a
//! consumer). Connections always run from an input node to an output node.
//!
//! Nodes are requested with a [`NodeSpec`] and owned by the router once registered. The
//! registered [`Node`] is read-only to collaborators: every attribute that affects
//! routing order changes through a [`Router`](crate::Router) operation so group order and
//! candidate order stay consistent.

use core::fmt;

use crate::domain::DomainId;
use crate::group::GroupId;

/// Upper bound for the channel count of any node.
pub const CHANNELS_MAX: u8 = 32;

/// Unique identifier for a registered node.
///
/// Indices are assigned sequentially and never reused within a router instance, so a
/// stale index simply resolves to nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeIndex(pub(crate) u32);

impl NodeIndex {
    /// Returns the raw numeric index.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Which way audio flows through a node, seen from the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Audio enters the server here (playback streams, capture devices).
    Input,
    /// Audio leaves the server here (playback devices, record streams).
    Output,
}

impl Direction {
    /// Returns the direction a counterpart node must have.
    pub const fn opposite(self) -> Self {
        match self {
            Self::Input => Self::Output,
            Self::Output => Self::Input,
        }
    }

    /// Returns a lowercase name for the direction.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether a node is backed by hardware or by a client stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Implement {
    /// A sink, source or port on a card.
    Device,
    /// A client stream.
    Stream,
}

/// Where the endpoint physically lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Location {
    /// Built into the system (speakers, internal microphone).
    #[default]
    Internal,
    /// Attached from outside (headsets, phones, network renderers).
    External,
}

/// Whether audio on the endpoint is audible to others.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Privacy {
    /// Audible to everybody around (speakers).
    #[default]
    Public,
    /// Audible to one person only (headphones, headsets).
    Private,
}

/// Semantic category of a node.
///
/// Stream classes describe what a client plays or records; device classes describe the
/// kind of hardware.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum NodeClass {
    /// Not classified.
    #[default]
    Unknown,
    /// Music or media player.
    Player,
    /// Broadcast radio tuner.
    Radio,
    /// Navigation prompts.
    Navigator,
    /// Telephony.
    Phone,
    /// Games.
    Game,
    /// Web browser.
    Browser,
    /// Camera capture.
    Camera,
    /// Alarms and ring tones.
    Alert,
    /// Short notification sounds.
    Event,
    /// System sounds.
    System,
    /// Loudspeakers.
    Speakers,
    /// Microphone.
    Microphone,
    /// Headset (speaker plus microphone).
    Headset,
    /// Headphones.
    Headphone,
    /// Line jack.
    Jack,
    /// S/PDIF digital output.
    Spdif,
    /// HDMI audio.
    Hdmi,
    /// Car kit.
    Carkit,
    /// Null sink or source.
    Null,
}

impl NodeClass {
    /// All stream classes, in declaration order.
    pub const STREAM_CLASSES: [NodeClass; 11] = [
        NodeClass::Unknown,
        NodeClass::Player,
        NodeClass::Radio,
        NodeClass::Navigator,
        NodeClass::Phone,
        NodeClass::Game,
        NodeClass::Browser,
        NodeClass::Camera,
        NodeClass::Alert,
        NodeClass::Event,
        NodeClass::System,
    ];

    /// Returns true for classes that describe client streams.
    ///
    /// [`NodeClass::Unknown`] counts as a stream class: unclassified streams still need
    /// a route.
    pub const fn is_stream_class(self) -> bool {
        matches!(
            self,
            Self::Unknown
                | Self::Player
                | Self::Radio
                | Self::Navigator
                | Self::Phone
                | Self::Game
                | Self::Browser
                | Self::Camera
                | Self::Alert
                | Self::Event
                | Self::System
        )
    }

    /// Returns true for classes that describe hardware.
    pub const fn is_device_class(self) -> bool {
        !self.is_stream_class()
    }
}

/// Sub-position of a device within its class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Position {
    /// No particular position.
    #[default]
    Any,
    /// Front of the cabin or room.
    Front,
    /// Rear of the cabin or room.
    Rear,
}

/// How the endpoint is attached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum LinkType {
    /// Built-in hardware.
    #[default]
    Builtin,
    /// Analog or digital wire.
    Wired,
    /// USB audio class device.
    Usb,
    /// Bluetooth hands-free / headset profile.
    BluetoothSco,
    /// Bluetooth high-quality audio profile.
    BluetoothA2dp,
    /// Network renderer or source.
    Network,
    /// Purely software endpoint.
    Virtual,
}

/// Type tag of a node: class, sub-position and link type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct NodeType {
    /// Semantic category.
    pub class: NodeClass,
    /// Sub-position within the class.
    pub position: Position,
    /// Attachment.
    pub link: LinkType,
}

impl NodeType {
    /// Type tag for a stream of the given class.
    pub const fn stream(class: NodeClass) -> Self {
        Self {
            class,
            position: Position::Any,
            link: LinkType::Virtual,
        }
    }

    /// Type tag for a device of the given class and link type.
    pub const fn device(class: NodeClass, link: LinkType) -> Self {
        Self {
            class,
            position: Position::Any,
            link,
        }
    }

    /// Returns a copy with the given sub-position.
    pub const fn at(mut self, position: Position) -> Self {
        self.position = position;
        self
    }
}

/// The hosting context of a device node: card, profile and port names.
///
/// Purely informational for the router; discovery uses it to map nodes back to the
/// objects they were created from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeContext {
    /// Name of the card hosting the node.
    pub card: Option<String>,
    /// Card profile the node belongs to.
    pub profile: Option<String>,
    /// Port on the card.
    pub port: Option<String>,
}

/// Registration request for a node.
///
/// # Example
///
/// ```
/// use ruta_core::{Direction, LinkType, NodeClass, NodeSpec, NodeType};
///
/// let spec = NodeSpec::device("alsa_output.speakers", Direction::Output)
///     .with_type(NodeType::device(NodeClass::Speakers, LinkType::Builtin))
///     .with_priority(10)
///     .with_channels(2);
/// assert_eq!(spec.priority, 10);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeSpec {
    /// Requested unique name.
    pub name: String,
    /// Human readable description.
    pub description: String,
    /// Flow direction.
    pub direction: Direction,
    /// Device or stream.
    pub implement: Implement,
    /// Internal or external.
    pub location: Location,
    /// Public or private.
    pub privacy: Privacy,
    /// Type tag.
    pub node_type: NodeType,
    /// Channel count, `1..=max_channels`.
    pub channels: u8,
    /// Default tie-break priority (higher is preferred).
    pub priority: i32,
    /// Shown to users.
    pub visible: bool,
    /// Currently usable (e.g. a port with something plugged in).
    pub available: bool,
    /// Excluded from automatic routing.
    pub ignore: bool,
    /// Hosting card/profile/port.
    pub context: Option<NodeContext>,
    /// Index of the externally owned audio object the node represents.
    pub object_index: Option<u32>,
    /// Domains able to realize connections touching this node. Empty means native only.
    pub domains: Vec<DomainId>,
}

impl NodeSpec {
    fn new(name: impl Into<String>, direction: Direction, implement: Implement) -> Self {
        let name = name.into();
        Self {
            description: name.clone(),
            name,
            direction,
            implement,
            location: Location::Internal,
            privacy: Privacy::Public,
            node_type: NodeType::default(),
            channels: 2,
            priority: 0,
            visible: true,
            available: true,
            ignore: false,
            context: None,
            object_index: None,
            domains: Vec::new(),
        }
    }

    /// Requests a device node.
    pub fn device(name: impl Into<String>, direction: Direction) -> Self {
        Self::new(name, direction, Implement::Device).with_type(NodeType::device(
            NodeClass::Unknown,
            LinkType::Builtin,
        ))
    }

    /// Requests a stream node.
    pub fn stream(name: impl Into<String>, direction: Direction) -> Self {
        Self::new(name, direction, Implement::Stream).with_type(NodeType::stream(
            NodeClass::Unknown,
        ))
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the type tag.
    pub fn with_type(mut self, node_type: NodeType) -> Self {
        self.node_type = node_type;
        self
    }

    /// Sets only the class of the type tag.
    pub fn with_class(mut self, class: NodeClass) -> Self {
        self.node_type.class = class;
        self
    }

    /// Sets the location.
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    /// Sets the privacy.
    pub fn with_privacy(mut self, privacy: Privacy) -> Self {
        self.privacy = privacy;
        self
    }

    /// Sets the channel count.
    pub fn with_channels(mut self, channels: u8) -> Self {
        self.channels = channels;
        self
    }

    /// Sets the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Sets availability.
    pub fn with_available(mut self, available: bool) -> Self {
        self.available = available;
        self
    }

    /// Sets visibility.
    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Sets the ignore flag.
    pub fn with_ignore(mut self, ignore: bool) -> Self {
        self.ignore = ignore;
        self
    }

    /// Sets the hosting context.
    pub fn with_context(mut self, context: NodeContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Sets the index of the external audio object.
    pub fn with_object_index(mut self, index: u32) -> Self {
        self.object_index = Some(index);
        self
    }

    /// Adds a domain the node is reachable through.
    pub fn with_domain(mut self, domain: DomainId) -> Self {
        if !self.domains.contains(&domain) {
            self.domains.push(domain);
        }
        self
    }
}

/// A registered device or stream endpoint.
#[derive(Clone, Debug)]
pub struct Node {
    pub(crate) index: NodeIndex,
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) direction: Direction,
    pub(crate) implement: Implement,
    pub(crate) location: Location,
    pub(crate) privacy: Privacy,
    pub(crate) node_type: NodeType,
    pub(crate) channels: u8,
    pub(crate) priority: i32,
    pub(crate) visible: bool,
    pub(crate) available: bool,
    pub(crate) ignore: bool,
    pub(crate) context: Option<NodeContext>,
    pub(crate) object_index: Option<u32>,
    pub(crate) domains: Vec<DomainId>,
    /// Group the node is a member (target) of.
    pub(crate) member_of: Option<GroupId>,
    /// Group the node is routed through, when it is an implicit candidate.
    pub(crate) routed_via: Option<GroupId>,
    /// Explicit assignment overriding the class routes.
    pub(crate) pinned: Option<GroupId>,
}

impl Node {
    /// Builds a node from an already validated spec under its final name.
    pub(crate) fn from_spec(index: NodeIndex, name: String, spec: NodeSpec) -> Self {
        Self {
            index,
            name,
            description: spec.description,
            direction: spec.direction,
            implement: spec.implement,
            location: spec.location,
            privacy: spec.privacy,
            node_type: spec.node_type,
            channels: spec.channels,
            priority: spec.priority,
            visible: spec.visible,
            available: spec.available,
            ignore: spec.ignore,
            context: spec.context,
            object_index: spec.object_index,
            domains: spec.domains,
            member_of: None,
            routed_via: None,
            pinned: None,
        }
    }

    /// Returns the node index.
    pub fn index(&self) -> NodeIndex {
        self.index
    }

    /// Returns the registered (possibly collision-renamed) name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the direction.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Returns whether the node is a device or a stream.
    pub fn implement(&self) -> Implement {
        self.implement
    }

    /// Returns true for device nodes.
    pub fn is_device(&self) -> bool {
        self.implement == Implement::Device
    }

    /// Returns true for stream nodes.
    pub fn is_stream(&self) -> bool {
        self.implement == Implement::Stream
    }

    /// Returns the location.
    pub fn location(&self) -> Location {
        self.location
    }

    /// Returns the privacy.
    pub fn privacy(&self) -> Privacy {
        self.privacy
    }

    /// Returns the type tag.
    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    /// Returns the class of the type tag.
    pub fn class(&self) -> NodeClass {
        self.node_type.class
    }

    /// Returns the channel count.
    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Returns the priority.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Returns the visibility flag.
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Returns the availability flag.
    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Returns the ignore flag.
    pub fn is_ignored(&self) -> bool {
        self.ignore
    }

    /// Returns true if the node can currently take part in automatic routing.
    pub fn is_routable(&self) -> bool {
        self.available && !self.ignore
    }

    /// Returns the hosting context, if any.
    pub fn context(&self) -> Option<&NodeContext> {
        self.context.as_ref()
    }

    /// Returns the index of the external audio object, if any.
    pub fn object_index(&self) -> Option<u32> {
        self.object_index
    }

    /// Returns the domains this node is reachable through.
    pub fn domains(&self) -> &[DomainId] {
        &self.domains
    }

    /// Returns the group this node is a target member of.
    pub fn group(&self) -> Option<GroupId> {
        self.member_of
    }

    /// Returns the group this node is implicitly routed through.
    pub fn routed_via(&self) -> Option<GroupId> {
        self.routed_via
    }
}
