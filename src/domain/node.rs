//! The RASE node model.
//!
//! A document is a forest of [`Node`]s. A [`Tag`] is a single assertion about a
//! property of a building entity. A [`Container`] groups tags (or further
//! containers) into a section that plays one of the four RASE roles.

use std::{fmt, ops::Deref, str::FromStr};

use non_empty_string::NonEmptyString;

use crate::domain::{
    rule::RulePath,
    sanitize::{Comparator, sanitize_property},
};

/// A document-unique, non-empty node identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct NodeId(NonEmptyString);

impl NodeId {
    /// Creates a new `NodeId`.
    ///
    /// # Errors
    ///
    /// Returns [`EmptyIdError`] if the string is empty.
    pub fn new(id: String) -> Result<Self, EmptyIdError> {
        NonEmptyString::new(id).map(Self).map_err(|_| EmptyIdError)
    }

    /// Returns the string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Derives the id of a node cloned out of this one, e.g. `t1` -> `t1a`.
    #[must_use]
    pub fn suffixed(&self, suffix: &str) -> Self {
        Self(
            NonEmptyString::new(format!("{}{suffix}", self.as_str()))
                .unwrap_or_else(|_| self.0.clone()),
        )
    }
}

impl Deref for NodeId {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeId {
    type Err = EmptyIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<&str> for NodeId {
    type Error = EmptyIdError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value.to_string())
    }
}

/// Error returned when a node id is empty.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("node ids must not be empty")]
pub struct EmptyIdError;

/// The role a tag or section plays in a compliance clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Kind {
    /// Something the entity must satisfy.
    Requirement,
    /// Narrows which entities the clause applies to.
    Application,
    /// One of several alternatives, any of which makes the clause apply.
    Selection,
    /// Excludes entities the clause would otherwise apply to.
    Exception,
}

impl Kind {
    /// The name used for a tag of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Requirement => "Requirement",
            Self::Application => "Application",
            Self::Selection => "Selection",
            Self::Exception => "Exception",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kind {
    type Err = InvalidKindError;

    /// Accepts tag names (`requirement`) and section names
    /// (`RequirementSection`), ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let name = lower.strip_suffix("section").unwrap_or(&lower);
        match name {
            "requirement" => Ok(Self::Requirement),
            "application" => Ok(Self::Application),
            "selection" => Ok(Self::Selection),
            "exception" => Ok(Self::Exception),
            _ => Err(InvalidKindError(s.to_string())),
        }
    }
}

/// Error returned when a kind name is not one of the four RASE roles.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown RASE kind '{0}': expected requirement, application, selection or exception")]
pub struct InvalidKindError(String);

/// A leaf assertion: `property comparator value unit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    id: NodeId,
    document_reference: String,
    kind: Kind,
    property: String,
    comparator: Option<String>,
    value: String,
    unit: String,
}

impl Tag {
    /// Creates a tag asserting that `property` is true.
    #[must_use]
    pub fn new(id: NodeId, kind: Kind, property: impl Into<String>) -> Self {
        Self {
            id,
            document_reference: String::new(),
            kind,
            property: property.into(),
            comparator: None,
            value: default_value(),
            unit: String::new(),
        }
    }

    /// Sets the raw comparator token.
    #[must_use]
    pub fn with_comparator(mut self, comparator: impl Into<String>) -> Self {
        self.comparator = Some(comparator.into());
        self
    }

    /// Sets the target value. Empty values mean `true`; values are lower-cased.
    #[must_use]
    pub fn with_value(mut self, value: &str) -> Self {
        self.value = if value.is_empty() {
            default_value()
        } else {
            value.to_lowercase()
        };
        self
    }

    /// Sets the unit of the target value.
    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Sets the citation of the tag.
    #[must_use]
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.document_reference = reference.into();
        self
    }

    /// The tag id.
    #[must_use]
    pub const fn id(&self) -> &NodeId {
        &self.id
    }

    /// The citation location of the tag.
    #[must_use]
    pub fn document_reference(&self) -> &str {
        &self.document_reference
    }

    /// The RASE role of the tag.
    #[must_use]
    pub const fn kind(&self) -> Kind {
        self.kind
    }

    /// The property name exactly as authored.
    #[must_use]
    pub fn property(&self) -> &str {
        &self.property
    }

    /// The property name as it appears in rules.
    #[must_use]
    pub fn sanitised_property(&self) -> String {
        sanitize_property(&self.property)
    }

    /// The comparator token exactly as authored.
    #[must_use]
    pub fn raw_comparator(&self) -> Option<&str> {
        self.comparator.as_deref()
    }

    /// The normalised comparator.
    ///
    /// Unrecognised tokens are reported and passed through unchanged.
    #[must_use]
    pub fn comparator(&self) -> Comparator {
        let comparator = Comparator::parse(self.comparator.as_deref());
        if !comparator.is_recognised() {
            tracing::warn!(tag = %self.id, "unrecognised comparator '{comparator}'");
        }
        comparator
    }

    /// The lower-cased target value (`true` when none was given).
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// The unit of the target value, empty when none was given.
    #[must_use]
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Copies this tag under a new id and kind, keeping its assertion.
    #[must_use]
    pub fn cloned_as(&self, id: NodeId, kind: Kind) -> Self {
        Self {
            id,
            kind,
            ..self.clone()
        }
    }
}

fn default_value() -> String {
    "true".to_string()
}

/// A typed section grouping child nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    id: NodeId,
    document_reference: String,
    kind: Kind,
    children: Vec<Node>,
}

impl Container {
    /// Creates an empty container.
    #[must_use]
    pub const fn new(id: NodeId, kind: Kind) -> Self {
        Self {
            id,
            document_reference: String::new(),
            kind,
            children: Vec::new(),
        }
    }

    /// Sets the citation of the container.
    #[must_use]
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.document_reference = reference.into();
        self
    }

    /// Appends a child.
    #[must_use]
    pub fn with_child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Appends several children.
    #[must_use]
    pub fn with_children(mut self, children: impl IntoIterator<Item = Node>) -> Self {
        self.children.extend(children);
        self
    }

    /// The container id.
    #[must_use]
    pub const fn id(&self) -> &NodeId {
        &self.id
    }

    /// The citation location of the container.
    #[must_use]
    pub fn document_reference(&self) -> &str {
        &self.document_reference
    }

    /// The RASE role of the section.
    #[must_use]
    pub const fn kind(&self) -> Kind {
        self.kind
    }

    /// The path rules about this section are named after.
    #[must_use]
    pub fn clause_path(&self) -> RulePath {
        RulePath::of(&self.document_reference, self.id.as_str())
    }

    /// Number of direct children.
    #[must_use]
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Whether the container has no children.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// The children, in document order.
    #[must_use]
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Mutable access to the children.
    pub fn children_mut(&mut self) -> &mut Vec<Node> {
        &mut self.children
    }

    /// Children of the given kind, in document order.
    pub fn of_kind(&self, kind: Kind) -> impl Iterator<Item = &Node> {
        self.children.iter().filter(move |child| child.kind() == kind)
    }

    /// Direct tag children.
    pub fn tags(&self) -> impl Iterator<Item = &Tag> {
        self.children.iter().filter_map(Node::as_tag)
    }

    /// Direct container children.
    pub fn containers(&self) -> impl Iterator<Item = &Self> {
        self.children.iter().filter_map(Node::as_container)
    }

    /// Whether any direct child is a tag.
    #[must_use]
    pub fn has_tags(&self) -> bool {
        self.tags().next().is_some()
    }

    /// Whether any direct child is a container.
    #[must_use]
    pub fn has_containers(&self) -> bool {
        self.containers().next().is_some()
    }

    /// Whether the children are all tags or all containers.
    #[must_use]
    pub fn is_homogeneous(&self) -> bool {
        !(self.has_tags() && self.has_containers())
    }
}

/// A node of the RASE tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// A leaf assertion.
    Tag(Tag),
    /// A section.
    Container(Container),
}

impl Node {
    /// The node id.
    #[must_use]
    pub const fn id(&self) -> &NodeId {
        match self {
            Self::Tag(tag) => tag.id(),
            Self::Container(container) => container.id(),
        }
    }

    /// The RASE role of the node.
    #[must_use]
    pub const fn kind(&self) -> Kind {
        match self {
            Self::Tag(tag) => tag.kind(),
            Self::Container(container) => container.kind(),
        }
    }

    /// The citation location of the node.
    #[must_use]
    pub fn document_reference(&self) -> &str {
        match self {
            Self::Tag(tag) => tag.document_reference(),
            Self::Container(container) => container.document_reference(),
        }
    }

    /// The tag, if this node is one.
    #[must_use]
    pub const fn as_tag(&self) -> Option<&Tag> {
        match self {
            Self::Tag(tag) => Some(tag),
            Self::Container(_) => None,
        }
    }

    /// The container, if this node is one.
    #[must_use]
    pub const fn as_container(&self) -> Option<&Container> {
        match self {
            Self::Container(container) => Some(container),
            Self::Tag(_) => None,
        }
    }

    /// Visits every tag in the subtree, depth first.
    pub fn walk_tags<'a>(&'a self, visit: &mut impl FnMut(&'a Tag)) {
        match self {
            Self::Tag(tag) => visit(tag),
            Self::Container(container) => {
                for child in container.children() {
                    child.walk_tags(visit);
                }
            }
        }
    }
}

impl From<Tag> for Node {
    fn from(tag: Tag) -> Self {
        Self::Tag(tag)
    }
}

impl From<Container> for Node {
    fn from(container: Container) -> Self {
        Self::Container(container)
    }
}
