//! Compilation of RASE documents into production rules.
//!
//! The traversal is depth first. A section's context (the object class its
//! rules match) comes back up from its children, so children are compiled
//! before the section's own rules are emitted.

use std::collections::BTreeSet;

use nonempty::NonEmpty;
use tracing::{debug, info, instrument, warn};

use crate::domain::{
    Config,
    context::{ResolveError, determine_parent},
    dictionary::TypeDictionary,
    document::{Document, RootError},
    node::{Container, Kind, Node, NodeId},
    normalize::{MixedContentError, normalize},
    rule::{RulePath, RuleSet},
};

pub mod records;
pub mod synthesis;

use synthesis::{Operand, Scope, Sections};

/// Errors that abort a compilation run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A section mixes several tags with nested sections.
    #[error(transparent)]
    MixedContent(#[from] MixedContentError),

    /// A section's context could not be resolved.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// A node id was compiled twice.
    #[error("node '{0}' appears more than once in the document")]
    DuplicateNode(NodeId),

    /// The document is not a forest of requirement sections.
    #[error("invalid document root: {0}")]
    InvalidRoot(#[from] RootError),

    /// A clause record names a command that cannot be compiled.
    #[error("unknown command '{command}' in step '{step}'")]
    UnknownCommand {
        /// The offending step.
        step: String,
        /// The command as written.
        command: String,
    },
}

/// The state of one compilation run.
///
/// Holds the ids compiled so far and the rules emitted so far. A compiler is
/// meant to be used for a single document.
pub struct Compiler<'a> {
    dictionary: &'a dyn TypeDictionary,
    config: &'a Config,
    visited: BTreeSet<NodeId>,
    rules: RuleSet,
}

impl<'a> Compiler<'a> {
    /// Creates a compiler backed by `dictionary`.
    #[must_use]
    pub fn new(dictionary: &'a dyn TypeDictionary, config: &'a Config) -> Self {
        Self {
            dictionary,
            config,
            visited: BTreeSet::new(),
            rules: RuleSet::default(),
        }
    }

    /// The rules emitted so far.
    #[must_use]
    pub const fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Consumes the compiler, returning its rules.
    #[must_use]
    pub fn into_rules(self) -> RuleSet {
        self.rules
    }

    /// Compiles a section and everything below it, returning its context.
    ///
    /// `parent_context` is the context of the enclosing section and `ancestor`
    /// its path. The section is normalised in place first. Application sections
    /// that only declared context are removed from it.
    ///
    /// A section whose id was already compiled is skipped and `parent_context`
    /// returned, unless the configuration rejects duplicates.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] on any fatal problem; the rules emitted so far
    /// should then be discarded.
    #[instrument(level = "debug", skip(self, container), fields(container = %container.id()))]
    pub fn compile(
        &mut self,
        container: &mut Container,
        parent_context: Option<&str>,
        ancestor: Option<&RulePath>,
    ) -> Result<Option<String>, Error> {
        if !self.visited.insert(container.id().clone()) {
            if self.config.reject_duplicate_nodes {
                return Err(Error::DuplicateNode(container.id().clone()));
            }
            warn!(container = %container.id(), "skipping duplicate node");
            return Ok(parent_context.map(str::to_string));
        }

        normalize(container)?;

        if container.has_containers() {
            self.compile_sections(container, parent_context, ancestor)
        } else if container.has_tags() {
            self.compile_leaf_group(container, parent_context, ancestor)
                .map(Some)
        } else {
            Ok(parent_context.map(str::to_string))
        }
    }

    fn compile_sections(
        &mut self,
        container: &mut Container,
        parent_context: Option<&str>,
        ancestor: Option<&RulePath>,
    ) -> Result<Option<String>, Error> {
        let path = container.clause_path();
        let mut context = parent_context.map(str::to_string);
        let mut sections = Sections::default();
        let mut child_contexts: Vec<(NodeId, RulePath, Option<String>)> = Vec::new();

        // application sections narrow the context for everything after them
        let mut spent = Vec::new();
        for (index, child) in container.children_mut().iter_mut().enumerate() {
            let Node::Container(child) = child else {
                continue;
            };
            if child.kind() != Kind::Application {
                continue;
            }
            context = self.compile(child, context.as_deref(), Some(&path))?;
            if child.is_empty() {
                debug!(section = %child.id(), "application section only declared context");
                spent.push(index);
                continue;
            }
            sections.applies.push(Operand::section(child));
            child_contexts.push((child.id().clone(), child.clause_path(), context.clone()));
        }
        for index in spent.into_iter().rev() {
            container.children_mut().remove(index);
        }

        for kind in [Kind::Selection, Kind::Exception, Kind::Requirement] {
            for child in container.children_mut() {
                let Node::Container(child) = child else {
                    continue;
                };
                if child.kind() != kind {
                    continue;
                }
                let child_context = self.compile(child, context.as_deref(), Some(&path))?;
                sections.list_mut(kind).push(Operand::section(child));
                child_contexts.push((child.id().clone(), child.clause_path(), child_context));
            }
        }

        let config = self.config;
        let entity_type = context
            .as_deref()
            .unwrap_or_else(|| config.fallback_object());
        self.rules.extend(synthesis::main_rules(
            &Scope {
                path: &path,
                kind: container.kind(),
                ancestor,
                entity_type,
            },
            &sections,
        ));

        for (child_id, child_path, child_context) in &child_contexts {
            if child_context.as_deref() != Some(entity_type) {
                debug!(section = %child_id, "transferring results to '{entity_type}'");
                self.rules.extend(synthesis::transfer_rules(
                    &path,
                    entity_type,
                    child_id,
                    child_path,
                ));
            }
        }

        self.rules.extend(synthesis::aggregation_rules(&path));
        Ok(context)
    }

    fn compile_leaf_group(
        &mut self,
        container: &mut Container,
        parent_context: Option<&str>,
        ancestor: Option<&RulePath>,
    ) -> Result<String, Error> {
        // the last application tag naming an object class declares the context
        let object_tag = container
            .children()
            .iter()
            .enumerate()
            .filter_map(|(index, child)| Some((index, child.as_tag()?)))
            .filter(|(_, tag)| {
                tag.kind() == Kind::Application && self.dictionary.contains_object(tag.property())
            })
            .map(|(index, tag)| (index, tag.property().trim().to_lowercase()))
            .next_back();
        let explicit = object_tag.as_ref().map(|(_, object)| object.as_str());

        let context = determine_parent(
            self.dictionary,
            container.tags(),
            explicit,
            container.id(),
            parent_context,
        )?;

        if let Some((index, object)) = &object_tag {
            debug!(container = %container.id(), "section declares object '{object}'");
            container.children_mut().remove(*index);
        }

        if !container.is_empty() {
            let path = container.clause_path();
            let sections = Sections::from_tags(container.tags());
            self.rules.extend(synthesis::main_rules(
                &Scope {
                    path: &path,
                    kind: container.kind(),
                    ancestor,
                    entity_type: &context,
                },
                &sections,
            ));
            self.rules.extend(synthesis::aggregation_rules(&path));
        }

        Ok(context)
    }
}

/// Compiles a whole document.
///
/// The document root is validated first: every top-level node must be a
/// requirement section and no section may mix several tags with nested
/// sections. Each top-level section (tables included) is then compiled, and
/// the document verdict rules are added over all of them.
///
/// # Errors
///
/// Returns the first fatal [`Error`]. No rules are returned in that case.
#[instrument(skip_all, fields(document = %document.base()))]
pub fn compile_document(
    document: &Document,
    dictionary: &dyn TypeDictionary,
    config: &Config,
) -> Result<RuleSet, Error> {
    document.validate()?;

    let mut compiler = Compiler::new(dictionary, config);
    let mut compiled = Vec::new();
    for section in document.sections() {
        let mut section = section.clone();
        compiler.compile(&mut section, None, None)?;
        compiled.push(section.clause_path());
    }

    let mut rules = compiler.into_rules();
    if let Some(sections) = NonEmpty::from_vec(compiled) {
        rules.extend(synthesis::document_rules(&document.path(), &sections));
    }

    info!(rules = rules.len(), "compiled document");
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        dictionary::Dictionary,
        node::Tag,
        rule::{BooleanExpr, CompiledRule, Effect, PropertyTest, Purpose, Status},
        sanitize::Comparator,
    };

    fn id(s: &str) -> NodeId {
        NodeId::try_from(s).unwrap()
    }

    fn dictionary() -> Dictionary {
        Dictionary::default()
            .with_property("door", "FireDoor")
            .with_property("door", "width")
            .with_property("door", "fire rating")
            .with_property("window", "width")
            .with_property("space", "area")
            .with_property("building", "height")
    }

    fn section(name: &str, kind: Kind) -> Container {
        Container::new(id(name), kind).with_reference("/b/1")
    }

    fn fire_door() -> Container {
        section("s1", Kind::Requirement)
            .with_child(
                Tag::new(id("t1"), Kind::Application, "FireDoor")
                    .with_comparator("==")
                    .with_value("true"),
            )
            .with_child(
                Tag::new(id("t2"), Kind::Requirement, "Width")
                    .with_comparator(">=")
                    .with_value("800")
                    .with_unit("mm"),
            )
    }

    fn rule<'r>(rules: &'r RuleSet, id: &str) -> &'r CompiledRule {
        rules.get(id).unwrap_or_else(|| {
            let ids: Vec<_> = rules.iter().map(|r| &r.id).collect();
            panic!("no rule '{id}' in {ids:#?}")
        })
    }

    fn conjuncts(rule: &CompiledRule) -> &[BooleanExpr] {
        match &rule.guard {
            BooleanExpr::And(terms) => terms,
            other => panic!("expected a conjunction, got {other:?}"),
        }
    }

    fn width_test() -> BooleanExpr {
        BooleanExpr::Property(PropertyTest {
            property: "Width".to_string(),
            comparator: Comparator::GreaterOrEqual,
            value: "800".to_string(),
            unit: "mm".to_string(),
        })
    }

    fn fire_door_test() -> BooleanExpr {
        BooleanExpr::Property(PropertyTest {
            property: "FireDoor".to_string(),
            comparator: Comparator::Equal,
            value: "true".to_string(),
            unit: String::new(),
        })
    }

    #[test]
    fn fire_door_scenario() {
        let dictionary = dictionary();
        let config = Config::default();
        let mut compiler = Compiler::new(&dictionary, &config);
        let mut container = fire_door();

        let context = compiler.compile(&mut container, None, None).unwrap();

        assert_eq!(context.as_deref(), Some("door"));
        let rules = compiler.into_rules();
        let path = RulePath::new("/b/1/s1");

        let applicable = rule(&rules, "/b/1/s1_Applicable");
        assert_eq!(applicable.entity_type.as_deref(), Some("door"));
        assert_eq!(
            conjuncts(applicable),
            [
                BooleanExpr::lacks(path.clone(), Status::Applicable),
                BooleanExpr::lacks(path.clone(), Status::NotApplicable),
                fire_door_test(),
            ]
        );

        let pass = rule(&rules, "/b/1/s1_Pass");
        assert_eq!(
            conjuncts(pass),
            [
                BooleanExpr::lacks(path.clone(), Status::Fail),
                BooleanExpr::lacks(path.clone(), Status::Pass),
                BooleanExpr::has(path.clone(), Status::Applicable),
                width_test(),
            ]
        );

        let fail = rule(&rules, "/b/1/s1_Fail");
        assert_eq!(
            conjuncts(fail).last(),
            Some(&BooleanExpr::Or(vec![!width_test()]))
        );

        let not_applicable = rule(&rules, "/b/1/s1_NotApplicable");
        assert_eq!(
            conjuncts(not_applicable).last(),
            Some(&BooleanExpr::Or(vec![!fire_door_test()]))
        );
        assert_eq!(
            not_applicable.effect,
            Effect::SetStatus {
                target: path,
                statuses: vec![Status::NotApplicable, Status::Pass]
            }
        );

        // four status rules and three summaries
        assert_eq!(rules.len(), 7);
    }

    #[test]
    fn no_requirements_means_no_fail_rule() {
        let dictionary = dictionary();
        let config = Config::default();
        let mut compiler = Compiler::new(&dictionary, &config);
        let mut container = section("s1", Kind::Requirement)
            .with_child(Tag::new(id("t1"), Kind::Application, "FireDoor"));

        compiler.compile(&mut container, None, None).unwrap();

        let purposes: BTreeSet<_> = compiler.rules().iter().map(|r| r.purpose).collect();
        assert!(!purposes.contains(&Purpose::Fail));
        assert!(purposes.contains(&Purpose::NotApplicable));
        assert!(purposes.contains(&Purpose::Applicable));
        assert!(purposes.contains(&Purpose::Pass));
    }

    #[test]
    fn duplicate_node_returns_parent_context_without_new_rules() {
        let dictionary = dictionary();
        let config = Config::default();
        let mut compiler = Compiler::new(&dictionary, &config);

        compiler.compile(&mut fire_door(), None, None).unwrap();
        let before = compiler.rules().clone();

        let context = compiler
            .compile(&mut fire_door(), Some("space"), None)
            .unwrap();

        assert_eq!(context.as_deref(), Some("space"));
        assert_eq!(compiler.rules(), &before);
    }

    #[test]
    fn duplicate_node_can_be_rejected() {
        let dictionary = dictionary();
        let mut config = Config::default();
        config.reject_duplicate_nodes = true;
        let mut compiler = Compiler::new(&dictionary, &config);

        compiler.compile(&mut fire_door(), None, None).unwrap();
        let error = compiler.compile(&mut fire_door(), None, None).unwrap_err();

        assert!(matches!(error, Error::DuplicateNode(ref node) if node == &id("s1")));
    }

    #[test]
    fn empty_section_keeps_parent_context() {
        let dictionary = dictionary();
        let config = Config::default();
        let mut compiler = Compiler::new(&dictionary, &config);

        let context = compiler
            .compile(&mut section("s1", Kind::Requirement), Some("door"), None)
            .unwrap();

        assert_eq!(context.as_deref(), Some("door"));
        assert!(compiler.rules().is_empty());
    }

    #[test]
    fn object_declaration_threads_context_and_is_dropped() {
        let dictionary = dictionary();
        let config = Config::default();
        let mut compiler = Compiler::new(&dictionary, &config);
        let mut container = section("s1", Kind::Requirement)
            .with_child(
                section("s2", Kind::Application)
                    .with_child(Tag::new(id("t1"), Kind::Application, "Door")),
            )
            .with_child(
                section("s3", Kind::Requirement)
                    .with_child(Tag::new(id("t2"), Kind::Requirement, "width")),
            );

        let context = compiler.compile(&mut container, None, None).unwrap();

        assert_eq!(context.as_deref(), Some("door"));
        let ids: Vec<_> = container.children().iter().map(|c| c.id().to_string()).collect();
        assert_eq!(ids, ["s3"]);

        let rules = compiler.rules();
        // the declaration section emits nothing of its own
        assert!(rules.iter().all(|r| !r.id.starts_with("/b/1/s2")));
        // the requirement section matches the parent's entities: no transfer
        assert!(rules.iter().all(|r| r.purpose != Purpose::TransferPass));

        let applicable = rule(rules, "/b/1/s1_Applicable");
        assert_eq!(applicable.entity_type.as_deref(), Some("door"));

        let child_pass = rule(rules, "/b/1/s3_Pass");
        assert!(conjuncts(child_pass).contains(&BooleanExpr::has(
            RulePath::new("/b/1/s1"),
            Status::Applicable
        )));

        let parent_fail = rule(rules, "/b/1/s1_Fail");
        assert_eq!(
            conjuncts(parent_fail).last(),
            Some(&BooleanExpr::Or(vec![BooleanExpr::has(
                RulePath::new("/b/1/s3"),
                Status::Fail
            )]))
        );
    }

    #[test]
    fn child_in_another_context_is_transferred() {
        let dictionary = dictionary();
        let config = Config::default();
        let mut compiler = Compiler::new(&dictionary, &config);
        let mut container = section("s1", Kind::Requirement)
            .with_child(
                section("s2", Kind::Requirement)
                    .with_child(Tag::new(id("t1"), Kind::Requirement, "height")),
            )
            .with_child(
                section("s3", Kind::Requirement)
                    .with_child(Tag::new(id("t2"), Kind::Requirement, "area")),
            );

        let context = compiler.compile(&mut container, None, None).unwrap();

        assert_eq!(context, None);
        let rules = compiler.rules();
        for child in ["s2", "s3"] {
            let transfer = rule(rules, &format!("/b/1/s1_Transfer_{child}_Pass"));
            assert_eq!(transfer.entity_type.as_deref(), Some("Building"));
            rule(rules, &format!("/b/1/s1_Transfer_{child}_Pass2"));
            rule(rules, &format!("/b/1/s1_Transfer_{child}_Fail"));
        }
        assert_eq!(
            rule(rules, "/b/1/s2_Pass").entity_type.as_deref(),
            Some("building")
        );
    }

    #[test]
    fn application_sections_compile_first() {
        let dictionary = dictionary();
        let config = Config::default();
        let mut compiler = Compiler::new(&dictionary, &config);
        // the requirement section comes first but needs the declared context
        let mut container = section("s1", Kind::Requirement)
            .with_child(
                section("s3", Kind::Requirement)
                    .with_child(Tag::new(id("t2"), Kind::Requirement, "width")),
            )
            .with_child(
                section("s2", Kind::Application)
                    .with_child(Tag::new(id("t1"), Kind::Application, "Door"))
                    .with_child(Tag::new(id("t3"), Kind::Application, "fire rating")),
            );

        let context = compiler.compile(&mut container, None, None).unwrap();

        assert_eq!(context.as_deref(), Some("door"));
        let applicable = rule(compiler.rules(), "/b/1/s1_Applicable");
        assert!(conjuncts(applicable).contains(&BooleanExpr::has(
            RulePath::new("/b/1/s2"),
            Status::Pass
        )));
    }

    #[test]
    fn stray_tag_is_compiled_as_its_own_section() {
        let dictionary = dictionary();
        let config = Config::default();
        let mut compiler = Compiler::new(&dictionary, &config);
        let mut container = section("s1", Kind::Requirement)
            .with_child(Tag::new(id("t1"), Kind::Requirement, "height").with_reference("/b/1"))
            .with_child(
                section("s2", Kind::Requirement)
                    .with_child(Tag::new(id("t2"), Kind::Requirement, "height")),
            );

        compiler.compile(&mut container, None, None).unwrap();

        rule(compiler.rules(), "/b/1/t1_Pass");
    }

    #[test]
    fn ambiguous_context_is_fatal() {
        let dictionary = dictionary();
        let config = Config::default();
        let mut compiler = Compiler::new(&dictionary, &config);
        let mut container = section("s1", Kind::Requirement)
            .with_child(Tag::new(id("t1"), Kind::Requirement, "width"));

        let error = compiler.compile(&mut container, None, None).unwrap_err();

        assert!(matches!(
            error,
            Error::Resolve(ResolveError::AmbiguousParent { .. })
        ));
    }

    #[test]
    fn document_gets_final_rules() {
        let dictionary = dictionary();
        let document = Document::new(
            "GB/Regulation/B",
            vec![fire_door().into()],
            vec![
                Container::new(id("Table1_R1_C_1"), Kind::Requirement)
                    .with_reference("GB/Regulation/B/Table/1")
                    .with_child(Tag::new(id("t9"), Kind::Requirement, "height")),
            ],
        );

        let rules = compile_document(&document, &dictionary, &Config::default()).unwrap();

        let pass = rule(&rules, "GB/Regulation/B_FINAL_PASS");
        let BooleanExpr::And(sections) = &conjuncts(pass)[0] else {
            panic!("final pass is a conjunction over sections");
        };
        assert_eq!(sections.len(), 2);
        rule(&rules, "GB/Regulation/B_FINAL_FAIL");
        rule(&rules, "GB/Regulation/B/Table/1/Table1_R1_C_1_Pass");
    }

    #[test]
    fn invalid_root_is_rejected_before_compiling() {
        let dictionary = dictionary();
        let document = Document::new(
            "doc",
            vec![section("s1", Kind::Selection).into()],
            Vec::new(),
        );

        let error = compile_document(&document, &dictionary, &Config::default()).unwrap_err();

        assert!(matches!(
            error,
            Error::InvalidRoot(RootError::NotRequirement { .. })
        ));
    }

    #[test]
    fn compilation_is_deterministic() {
        let dictionary = dictionary();
        let document = Document::new("doc", vec![fire_door().into()], Vec::new());

        let first = compile_document(&document, &dictionary, &Config::default()).unwrap();
        let second = compile_document(&document, &dictionary, &Config::default()).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.fingerprint(), second.fingerprint());
    }
}
