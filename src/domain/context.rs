//! Inference of the object class a group of tags applies to.
//!
//! Each tag narrows the set of object classes that could own every property in
//! the group. Whatever survives the narrowing is the context. Ties are broken by
//! the ancestor's context first and then by an explicitly declared object; any
//! other ambiguity is an error.

use std::collections::BTreeSet;

use tracing::{debug, instrument, warn};

use crate::domain::{
    dictionary::TypeDictionary,
    node::{NodeId, Tag},
};

/// Why no context could be resolved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// A tag names a property the dictionary does not know.
    #[error("property '{property}' (tag '{tag}') is not in the dictionary")]
    UnknownProperty {
        /// The tag naming the property.
        tag: NodeId,
        /// The raw property name.
        property: String,
    },

    /// A tag's property is not owned by the object the section declares.
    #[error("property '{property}' (tag '{tag}') does not belong to the declared object '{object}'")]
    InconsistentObject {
        /// The tag naming the property.
        tag: NodeId,
        /// The raw property name.
        property: String,
        /// The declared object.
        object: String,
    },

    /// No object class owns every property in the section.
    #[error("no object class owns every property of '{container}'")]
    NoViableParent {
        /// The section being resolved.
        container: NodeId,
    },

    /// Several object classes remain and nothing breaks the tie.
    #[error("'{container}' could apply to any of {}", .candidates.iter().cloned().collect::<Vec<_>>().join(", "))]
    AmbiguousParent {
        /// The section being resolved.
        container: NodeId,
        /// The remaining candidates.
        candidates: BTreeSet<String>,
    },
}

/// Resolves the object class shared by `tags`.
///
/// A tag whose property is itself an object class adds that class to the
/// candidate set. Any other tag narrows the set to the classes owning its
/// property; the first such tag seeds it.
///
/// When more than one candidate survives, `ancestor` wins if it is a candidate,
/// then `explicit`. The result is lower-cased.
///
/// # Errors
///
/// See [`ResolveError`]. Every variant is fatal to the compilation.
#[instrument(level = "debug", skip(dictionary, tags))]
pub fn determine_parent<'a>(
    dictionary: &dyn TypeDictionary,
    tags: impl IntoIterator<Item = &'a Tag>,
    explicit: Option<&str>,
    container: &NodeId,
    ancestor: Option<&str>,
) -> Result<String, ResolveError> {
    let explicit = explicit.map(str::to_lowercase);
    let ancestor = ancestor.map(str::to_lowercase);

    let mut candidates: Option<BTreeSet<String>> = None;
    for tag in tags {
        if dictionary.contains_object(tag.property()) {
            candidates
                .get_or_insert_with(BTreeSet::new)
                .insert(tag.property().trim().to_lowercase());
            continue;
        }
        let classes = classes_of(dictionary, tag, explicit.as_deref())?;
        candidates = Some(match candidates {
            None => classes,
            Some(running) => {
                let narrowed: BTreeSet<String> =
                    running.intersection(&classes).cloned().collect();
                if narrowed.is_empty() {
                    warn!(
                        container = %container,
                        tag = %tag.id(),
                        "property '{}' shares no object class with the rest of the section",
                        tag.property()
                    );
                }
                narrowed
            }
        });
    }

    let candidates = candidates.unwrap_or_default();
    let context = match candidates.len() {
        0 => {
            return Err(ResolveError::NoViableParent {
                container: container.clone(),
            });
        }
        1 => candidates.first().cloned(),
        _ => [ancestor, explicit]
            .into_iter()
            .flatten()
            .find(|preferred| candidates.contains(preferred)),
    };

    let Some(context) = context else {
        return Err(ResolveError::AmbiguousParent {
            container: container.clone(),
            candidates,
        });
    };
    debug!(container = %container, "resolved context '{context}'");
    Ok(context)
}

/// The object classes owning the property of a non-object tag.
fn classes_of(
    dictionary: &dyn TypeDictionary,
    tag: &Tag,
    explicit: Option<&str>,
) -> Result<BTreeSet<String>, ResolveError> {
    let property = tag.property();
    let classes = dictionary.objects_with_property(property);
    if classes.is_empty() {
        return Err(ResolveError::UnknownProperty {
            tag: tag.id().clone(),
            property: property.to_string(),
        });
    }
    match explicit {
        Some(object) if !classes.contains(object) => Err(ResolveError::InconsistentObject {
            tag: tag.id().clone(),
            property: property.to_string(),
            object: object.to_string(),
        }),
        _ => Ok(classes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{dictionary::Dictionary, node::Kind};

    fn id(s: &str) -> NodeId {
        NodeId::try_from(s).unwrap()
    }

    fn tag(name: &str, property: &str) -> Tag {
        Tag::new(id(name), Kind::Requirement, property)
    }

    /// `p1` is owned by A and B, `p2` by B and C, `p3` by A only, `p4` by B only.
    fn dictionary() -> Dictionary {
        Dictionary::default()
            .with_property("A", "p1")
            .with_property("B", "p1")
            .with_property("B", "p2")
            .with_property("C", "p2")
            .with_property("A", "p3")
            .with_property("B", "p4")
            .with_property("door", "width")
            .with_property("window", "width")
    }

    #[test]
    fn narrowing_picks_the_shared_class() {
        let tags = [tag("t1", "p1"), tag("t2", "p2")];
        let context = determine_parent(&dictionary(), &tags, None, &id("s1"), None).unwrap();
        assert_eq!(context, "b");
    }

    #[test]
    fn disjoint_classes_have_no_viable_parent() {
        let tags = [tag("t3", "p3"), tag("t4", "p4")];
        let error = determine_parent(&dictionary(), &tags, None, &id("s1"), None).unwrap_err();
        assert_eq!(error, ResolveError::NoViableParent { container: id("s1") });
    }

    #[test]
    fn ancestor_wins_over_explicit_parent() {
        let tags = [tag("t1", "p1")];
        let context =
            determine_parent(&dictionary(), &tags, Some("A"), &id("s1"), Some("B")).unwrap();
        assert_eq!(context, "b");
    }

    #[test]
    fn explicit_parent_breaks_tie_without_ancestor() {
        let tags = [tag("t1", "width")];
        let context =
            determine_parent(&dictionary(), &tags, Some("Door"), &id("s1"), Some("stair"))
                .unwrap();
        assert_eq!(context, "door");
    }

    #[test]
    fn unresolved_tie_is_ambiguous() {
        let tags = [tag("t1", "width")];
        let error = determine_parent(&dictionary(), &tags, None, &id("s1"), None).unwrap_err();
        assert_eq!(
            error,
            ResolveError::AmbiguousParent {
                container: id("s1"),
                candidates: BTreeSet::from(["door".to_string(), "window".to_string()]),
            }
        );
    }

    #[test]
    fn unknown_property_is_fatal() {
        let tags = [tag("t1", "p1"), tag("t9", "colour")];
        let error = determine_parent(&dictionary(), &tags, None, &id("s1"), None).unwrap_err();
        assert!(matches!(
            error,
            ResolveError::UnknownProperty { ref property, .. } if property == "colour"
        ));
    }

    #[test]
    fn property_outside_declared_object_is_inconsistent() {
        let tags = [tag("t1", "p2")];
        let error =
            determine_parent(&dictionary(), &tags, Some("a"), &id("s1"), None).unwrap_err();
        assert!(matches!(
            error,
            ResolveError::InconsistentObject { ref object, .. } if object == "a"
        ));
    }

    #[test]
    fn object_tag_declares_its_class() {
        let tags = [tag("t1", "Door"), tag("t2", "width")];
        let context =
            determine_parent(&dictionary(), &tags, Some("door"), &id("s1"), None).unwrap();
        assert_eq!(context, "door");
    }

    #[test]
    fn object_tag_after_properties_joins_rather_than_narrows() {
        let tags = [tag("t1", "width"), tag("t2", "window")];
        let context =
            determine_parent(&dictionary(), &tags, Some("window"), &id("s1"), None).unwrap();
        assert_eq!(context, "window");

        let error = determine_parent(&dictionary(), &tags, None, &id("s1"), None).unwrap_err();
        assert!(matches!(error, ResolveError::AmbiguousParent { .. }));
    }

    #[test]
    fn single_candidate_ignores_ancestor() {
        let tags = [tag("t3", "p3")];
        let context =
            determine_parent(&dictionary(), &tags, None, &id("s1"), Some("b")).unwrap();
        assert_eq!(context, "a");
    }

    #[test]
    fn no_tags_has_no_viable_parent() {
        let error =
            determine_parent(&dictionary(), std::iter::empty(), None, &id("s1"), None)
                .unwrap_err();
        assert!(matches!(error, ResolveError::NoViableParent { .. }));
    }
}
