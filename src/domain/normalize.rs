//! Repair of containers that mix tags with sections.
//!
//! Markup extraction regularly leaves a single tag sitting next to nested
//! sections. Such a tag is wrapped in a section of its own so that every
//! container ends up holding either only tags or only containers. More than one
//! stray tag cannot be repaired and is rejected.

use tracing::{debug, instrument};

use crate::domain::node::{Container, Kind, Node, NodeId};

/// A container holds more than one tag alongside nested containers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("container '{container}' mixes {tags} tags with nested sections")]
pub struct MixedContentError {
    /// The offending container.
    pub container: NodeId,
    /// Number of direct tag children found.
    pub tags: usize,
}

/// Makes the direct children of `container` homogeneous.
///
/// A single tag next to containers is replaced, in place, by a container of the
/// same kind and id holding a copy of the tag with the id suffixed by `a`. The
/// copy keeps the `Application` kind (so it can still declare context) and is a
/// `Requirement` otherwise.
///
/// Normalising an already normalised container is a no-op.
///
/// # Errors
///
/// Returns [`MixedContentError`] if more than one tag shares the container with
/// nested containers.
pub fn normalize(container: &mut Container) -> Result<(), MixedContentError> {
    check(container)?;
    if !container.has_containers() {
        return Ok(());
    }

    for child in container.children_mut() {
        let Node::Tag(tag) = child else {
            continue;
        };
        let clone_kind = if tag.kind() == Kind::Application {
            Kind::Application
        } else {
            Kind::Requirement
        };
        let clone = tag.cloned_as(tag.id().suffixed("a"), clone_kind);
        debug!(tag = %tag.id(), "wrapping stray tag in a {} section", tag.kind());
        let wrapper = Container::new(tag.id().clone(), tag.kind())
            .with_reference(tag.document_reference())
            .with_child(clone);
        *child = Node::Container(wrapper);
    }
    Ok(())
}

/// Normalises `container` and every container below it.
///
/// # Errors
///
/// Returns the first [`MixedContentError`] found, depth first.
pub fn normalize_tree(container: &mut Container) -> Result<(), MixedContentError> {
    normalize(container)?;
    for child in container.children_mut() {
        if let Node::Container(inner) = child {
            normalize_tree(inner)?;
        }
    }
    Ok(())
}

/// Rejects any container in the forest that holds more than one tag alongside
/// nested containers.
///
/// This runs over the whole document before anything is compiled so that a
/// malformed document fails before any rules are produced.
///
/// # Errors
///
/// Returns a [`MixedContentError`] naming the first offending container.
#[instrument(skip_all)]
pub fn validate_document(nodes: &[Node]) -> Result<(), MixedContentError> {
    for node in nodes {
        if let Node::Container(container) = node {
            validate_section(container)?;
        }
    }
    Ok(())
}

/// [`validate_document`] for a single section and everything below it.
///
/// # Errors
///
/// Returns a [`MixedContentError`] naming the first offending container.
pub fn validate_section(container: &Container) -> Result<(), MixedContentError> {
    check(container)?;
    container.containers().try_for_each(validate_section)
}

fn check(container: &Container) -> Result<(), MixedContentError> {
    let tags = container.tags().count();
    if tags > 1 && container.has_containers() {
        return Err(MixedContentError {
            container: container.id().clone(),
            tags,
        });
    }
    Ok(())
}


#[cfg(test)]
mod proptests {
    use proptest::prelude::*;

    use super::*;
    use crate::domain::node::Tag;

    fn kind() -> impl Strategy<Value = Kind> {
        prop_oneof![
            Just(Kind::Requirement),
            Just(Kind::Application),
            Just(Kind::Selection),
            Just(Kind::Exception),
        ]
    }

    fn leaf() -> impl Strategy<Value = Node> {
        (kind(), "[a-z]{1,8}").prop_map(|(kind, property)| {
            Node::from(Tag::new(NodeId::try_from("leaf").unwrap(), kind, property))
        })
    }

    /// Trees where every container has at most one tag next to sections.
    fn tree() -> impl Strategy<Value = Container> {
        let leaf_group = (kind(), prop::collection::vec(leaf(), 0..4))
            .prop_map(|(kind, tags)| {
                Container::new(NodeId::try_from("group").unwrap(), kind).with_children(tags)
            });

        leaf_group.prop_recursive(4, 32, 4, |inner| {
            (
                kind(),
                prop::collection::vec(inner, 1..4),
                prop::option::of(leaf()),
                any::<prop::sample::Index>(),
            )
                .prop_map(|(kind, sections, stray, position)| {
                    let mut children: Vec<Node> = sections.into_iter().map(Node::from).collect();
                    if let Some(stray) = stray {
                        let at = position.index(children.len() + 1);
                        children.insert(at, stray);
                    }
                    Container::new(NodeId::try_from("section").unwrap(), kind)
                        .with_children(children)
                })
        })
    }

    fn all_homogeneous(container: &Container) -> bool {
        container.is_homogeneous() && container.containers().all(all_homogeneous)
    }

    proptest! {
        #[test]
        fn normalisation_is_idempotent(mut tree in tree()) {
            normalize_tree(&mut tree).unwrap();
            let once = tree.clone();
            normalize_tree(&mut tree).unwrap();
            prop_assert_eq!(tree, once);
        }

        #[test]
        fn normalised_trees_are_homogeneous(mut tree in tree()) {
            prop_assert!(validate_document(&[Node::from(tree.clone())]).is_ok());
            normalize_tree(&mut tree).unwrap();
            prop_assert!(all_homogeneous(&tree));
        }
    }
}
