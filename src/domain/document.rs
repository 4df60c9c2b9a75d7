//! A whole compliance document, ready for compilation.

use tracing::instrument;

use crate::domain::{
    node::{Container, Kind, Node, NodeId},
    normalize::{MixedContentError, validate_section},
    rule::RulePath,
};

/// Why a document cannot be compiled as a whole.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RootError {
    /// A tag sits at the top level of the document.
    #[error("tag '{0}' is not inside any section")]
    TagAtRoot(NodeId),

    /// A top-level section is not a requirement section.
    #[error("top-level section '{container}' has kind {kind}, expected Requirement")]
    NotRequirement {
        /// The offending section.
        container: NodeId,
        /// Its kind.
        kind: Kind,
    },

    /// A section mixes several tags with nested sections.
    #[error(transparent)]
    MixedContent(#[from] MixedContentError),
}

/// The extracted RASE structure of one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    base: String,
    items: Vec<Node>,
    tables: Vec<Container>,
}

impl Document {
    /// Creates a document.
    ///
    /// `base` identifies the document (jurisdiction, type, title, version and
    /// start section joined by `/`). `tables` are the synthetic requirement
    /// sections built from tabular compliance matrices.
    #[must_use]
    pub fn new(base: impl Into<String>, items: Vec<Node>, tables: Vec<Container>) -> Self {
        Self {
            base: base.into(),
            items,
            tables,
        }
    }

    /// The document identity.
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// The path document level rules are attached to.
    #[must_use]
    pub fn path(&self) -> RulePath {
        RulePath::new(&self.base)
    }

    /// The top-level nodes extracted from the body.
    #[must_use]
    pub fn items(&self) -> &[Node] {
        &self.items
    }

    /// The synthetic sections built from tables.
    #[must_use]
    pub fn tables(&self) -> &[Container] {
        &self.tables
    }

    /// Every top-level section: body sections first, then table sections.
    pub fn sections(&self) -> impl Iterator<Item = &Container> {
        self.items
            .iter()
            .filter_map(Node::as_container)
            .chain(&self.tables)
    }

    /// Every node of the document, tables included.
    pub fn nodes(&self) -> impl Iterator<Item = Node> + '_ {
        self.items
            .iter()
            .cloned()
            .chain(self.tables.iter().cloned().map(Node::Container))
    }

    /// Checks the document can be compiled.
    ///
    /// # Errors
    ///
    /// Returns the first [`RootError`] found.
    pub fn validate(&self) -> Result<(), RootError> {
        self.violations().into_iter().next().map_or(Ok(()), Err)
    }

    /// Every reason the document cannot be compiled, in document order.
    ///
    /// Each top-level section contributes at most one mixed-content violation.
    #[instrument(skip(self), fields(base = %self.base))]
    #[must_use]
    pub fn violations(&self) -> Vec<RootError> {
        let mut violations = Vec::new();
        for node in &self.items {
            match node {
                Node::Tag(tag) => violations.push(RootError::TagAtRoot(tag.id().clone())),
                Node::Container(container) => {
                    if container.kind() != Kind::Requirement {
                        violations.push(RootError::NotRequirement {
                            container: container.id().clone(),
                            kind: container.kind(),
                        });
                    }
                    if let Err(error) = validate_section(container) {
                        violations.push(error.into());
                    }
                }
            }
        }
        for table in &self.tables {
            if let Err(error) = validate_section(table) {
                violations.push(error.into());
            }
        }
        violations
    }
}
