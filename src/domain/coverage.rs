//! Cross-checks documents against a dictionary.
//!
//! The compiler fails on the first property the dictionary does not know. The
//! audit instead reports every gap at once, in both directions, so a
//! dictionary can be curated before compiling.

use std::{collections::BTreeSet, fmt};

use tracing::instrument;

use crate::domain::{
    dictionary::{DataType, Dictionary, TypeDictionary},
    node::{Node, Tag},
};

/// Where a tag sits in its document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Citation(String);

impl Citation {
    fn of(tag: &Tag) -> Self {
        Self(format!("{}/{}", tag.document_reference(), tag.id()))
    }
}

impl fmt::Display for Citation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One discrepancy between the documents and the dictionary.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Finding {
    /// A tag uses a property no object class owns.
    UnknownProperty {
        /// The property as written.
        property: String,
        /// The tag.
        citation: Citation,
    },
    /// A dictionary property no tag uses.
    UnusedProperty {
        /// The owning object class.
        object: String,
        /// The property.
        property: String,
    },
    /// A tag expresses a value in a unit the dictionary does not list.
    UnlistedUnit {
        /// The owning object class.
        object: String,
        /// The property.
        property: String,
        /// The unit as written.
        unit: String,
        /// The tag.
        citation: Citation,
    },
    /// A tag's value does not look like the property's data type.
    DataTypeMismatch {
        /// The owning object class.
        object: String,
        /// The property.
        property: String,
        /// The curated data type.
        expected: DataType,
        /// The value as written.
        value: String,
        /// The tag.
        citation: Citation,
    },
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownProperty { property, citation } => {
                write!(f, "'{property}' is not in the dictionary [{citation}]")
            }
            Self::UnusedProperty { object, property } => {
                write!(f, "{object}:{property} is not used by any document")
            }
            Self::UnlistedUnit {
                object,
                property,
                unit,
                citation,
            } => write!(f, "{object}:{property} does not list unit '{unit}' [{citation}]"),
            Self::DataTypeMismatch {
                object,
                property,
                expected,
                value,
                citation,
            } => write!(
                f,
                "{object}:{property} expects a {expected:?} value, found '{value}' [{citation}]"
            ),
        }
    }
}

/// The outcome of an audit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    /// Number of tags inspected.
    pub tags: usize,
    /// Discrepancies, sorted.
    pub findings: Vec<Finding>,
}

impl Report {
    /// Whether the documents and the dictionary agree.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

/// Audits every tag below `nodes` against `dictionary`.
///
/// Tags naming an object class are declarations and are not checked.
#[instrument(skip_all)]
#[must_use]
pub fn audit(nodes: &[Node], dictionary: &Dictionary) -> Report {
    let mut tags = Vec::new();
    for node in nodes {
        node.walk_tags(&mut |tag| tags.push(tag));
    }

    let mut findings = BTreeSet::new();
    let mut used = BTreeSet::new();
    for tag in &tags {
        if dictionary.contains_object(tag.property()) {
            continue;
        }
        let objects = dictionary.objects_with_property(tag.property());
        if objects.is_empty() {
            findings.insert(Finding::UnknownProperty {
                property: tag.property().to_string(),
                citation: Citation::of(tag),
            });
            continue;
        }
        for object in objects {
            let Some(descriptor) = dictionary.property(&object, tag.property()) else {
                continue;
            };
            used.insert((object.clone(), descriptor.name.clone()));

            let unit = tag.unit();
            if !unit.is_empty() && !descriptor.units.iter().any(|u| u.eq_ignore_ascii_case(unit))
            {
                findings.insert(Finding::UnlistedUnit {
                    object: object.clone(),
                    property: descriptor.name.clone(),
                    unit: unit.to_string(),
                    citation: Citation::of(tag),
                });
            }
            if let Some(expected) = descriptor.data_type {
                if DataType::infer(tag.value()) != expected {
                    findings.insert(Finding::DataTypeMismatch {
                        object: object.clone(),
                        property: descriptor.name.clone(),
                        expected,
                        value: tag.value().to_string(),
                        citation: Citation::of(tag),
                    });
                }
            }
        }
    }

    for (object, descriptor) in dictionary.properties() {
        if !used.contains(&(object.to_string(), descriptor.name.clone())) {
            findings.insert(Finding::UnusedProperty {
                object: object.to_string(),
                property: descriptor.name.clone(),
            });
        }
    }

    Report {
        tags: tags.len(),
        findings: findings.into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        dictionary::PropertyDescriptor,
        node::{Container, Kind, NodeId},
    };

    fn id(s: &str) -> NodeId {
        NodeId::try_from(s).unwrap()
    }

    fn dictionary() -> Dictionary {
        let mut dictionary = Dictionary::default();
        dictionary.add_property(
            "door",
            PropertyDescriptor::named("width")
                .with_data_type(DataType::Number)
                .with_unit("mm"),
        );
        dictionary.add_property("door", PropertyDescriptor::named("fire rating"));
        dictionary.add_object("space");
        dictionary
    }

    fn document(tags: Vec<Tag>) -> Vec<Node> {
        vec![
            Container::new(id("s1"), Kind::Requirement)
                .with_children(tags.into_iter().map(Node::from))
                .into(),
        ]
    }

    fn tag(name: &str, property: &str) -> Tag {
        Tag::new(id(name), Kind::Requirement, property).with_reference("/b/1")
    }

    #[test]
    fn consistent_document_is_clean() {
        let nodes = document(vec![
            tag("t1", "Space").with_value(""),
            tag("t2", "Width").with_value("800").with_unit("MM"),
            tag("t3", "Fire Rating").with_value("30"),
        ]);

        let report = audit(&nodes, &dictionary());

        assert_eq!(report.tags, 3);
        assert!(report.is_clean(), "{:?}", report.findings);
    }

    #[test]
    fn every_gap_is_reported() {
        let nodes = document(vec![
            tag("t1", "height"),
            tag("t2", "width").with_value("wide").with_unit("in"),
        ]);

        let report = audit(&nodes, &dictionary());

        assert_eq!(
            report.findings,
            [
                Finding::UnknownProperty {
                    property: "height".to_string(),
                    citation: Citation("/b/1/t1".to_string()),
                },
                Finding::UnusedProperty {
                    object: "door".to_string(),
                    property: "fire rating".to_string(),
                },
                Finding::UnlistedUnit {
                    object: "door".to_string(),
                    property: "width".to_string(),
                    unit: "in".to_string(),
                    citation: Citation("/b/1/t2".to_string()),
                },
                Finding::DataTypeMismatch {
                    object: "door".to_string(),
                    property: "width".to_string(),
                    expected: DataType::Number,
                    value: "wide".to_string(),
                    citation: Citation("/b/1/t2".to_string()),
                },
            ]
        );
        assert_eq!(
            report.findings[0].to_string(),
            "'height' is not in the dictionary [/b/1/t1]"
        );
    }
}
