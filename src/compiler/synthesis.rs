//! Builders for the rule families emitted per section.
//!
//! These functions only assemble [`CompiledRule`] values. Deciding which
//! sections get which rules is the traversal's job.

use nonempty::NonEmpty;

use crate::domain::{
    node::{Container, Kind, NodeId, Tag},
    rule::{BooleanExpr, CompiledRule, Effect, Outcome, PropertyTest, Purpose, RulePath, Status},
};

/// One condition of a section: a tag of a leaf group, or a nested section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// A property test on the matched entity.
    Test(PropertyTest),
    /// The outcome of a nested section.
    Section(RulePath),
}

impl Operand {
    /// The operand for a tag.
    #[must_use]
    pub fn tag(tag: &Tag) -> Self {
        Self::Test(PropertyTest {
            property: tag.sanitised_property(),
            comparator: tag.comparator(),
            value: tag.value().to_string(),
            unit: tag.unit().to_string(),
        })
    }

    /// The operand for a nested section.
    #[must_use]
    pub fn section(container: &Container) -> Self {
        Self::Section(container.clause_path())
    }

    /// The operand is satisfied.
    #[must_use]
    pub fn holds(&self) -> BooleanExpr {
        match self {
            Self::Test(test) => BooleanExpr::Property(test.clone()),
            Self::Section(path) => BooleanExpr::has(path.clone(), Status::Pass),
        }
    }

    /// The operand is violated.
    #[must_use]
    pub fn fails(&self) -> BooleanExpr {
        match self {
            Self::Test(test) => !BooleanExpr::Property(test.clone()),
            Self::Section(path) => BooleanExpr::has(path.clone(), Status::Fail),
        }
    }
}

/// The operands of a section, partitioned by role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sections {
    /// Conditions that must all hold for the section to apply.
    pub applies: Vec<Operand>,
    /// Alternatives, one of which must hold for the section to apply.
    pub selects: Vec<Operand>,
    /// Conditions that stop the section applying.
    pub excepts: Vec<Operand>,
    /// What an applicable entity must satisfy.
    pub requires: Vec<Operand>,
}

impl Sections {
    /// Partitions the tags of a leaf group by kind, keeping document order.
    pub fn from_tags<'a>(tags: impl IntoIterator<Item = &'a Tag>) -> Self {
        let mut sections = Self::default();
        for tag in tags {
            sections.list_mut(tag.kind()).push(Operand::tag(tag));
        }
        sections
    }

    /// The operand list for a kind.
    pub const fn list_mut(&mut self, kind: Kind) -> &mut Vec<Operand> {
        match kind {
            Kind::Application => &mut self.applies,
            Kind::Selection => &mut self.selects,
            Kind::Exception => &mut self.excepts,
            Kind::Requirement => &mut self.requires,
        }
    }

    fn has_conditions(&self) -> bool {
        !(self.applies.is_empty() && self.selects.is_empty() && self.excepts.is_empty())
    }
}

/// When an entity is in scope: every application holds, no exception holds,
/// and at least one selection holds (if there are any).
#[must_use]
pub fn applicability_condition(sections: &Sections) -> BooleanExpr {
    BooleanExpr::And(applicability_terms(sections))
}

fn applicability_terms(sections: &Sections) -> Vec<BooleanExpr> {
    let mut terms: Vec<BooleanExpr> = sections.applies.iter().map(Operand::holds).collect();
    terms.extend(sections.excepts.iter().map(Operand::fails));
    if !sections.selects.is_empty() {
        terms.push(BooleanExpr::Or(
            sections.selects.iter().map(Operand::holds).collect(),
        ));
    }
    terms
}

/// When an entity is out of scope: every selection fails, or some application
/// fails, or some exception holds.
///
/// `None` when the section has no conditions at all, in which case every
/// entity is in scope.
#[must_use]
pub fn inapplicability_condition(sections: &Sections) -> Option<BooleanExpr> {
    if !sections.has_conditions() {
        return None;
    }
    let mut terms = Vec::new();
    if !sections.selects.is_empty() {
        terms.push(BooleanExpr::And(
            sections.selects.iter().map(Operand::fails).collect(),
        ));
    }
    terms.extend(sections.applies.iter().map(Operand::fails));
    terms.extend(sections.excepts.iter().map(Operand::holds));
    Some(BooleanExpr::Or(terms))
}

/// Where a section sits: its own path and kind, the enclosing section, and the
/// object class its rules match.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    /// The section's own path.
    pub path: &'a RulePath,
    /// The section's kind.
    pub kind: Kind,
    /// The enclosing section, if any.
    pub ancestor: Option<&'a RulePath>,
    /// The object class matched entities must have.
    pub entity_type: &'a str,
}

impl Scope<'_> {
    /// The conjuncts every status rule of the section starts with.
    ///
    /// The enclosing section must not have concluded yet; a requirement
    /// section additionally needs its enclosing section to apply.
    fn ancestor_guard(&self) -> Vec<BooleanExpr> {
        let Some(ancestor) = self.ancestor else {
            return Vec::new();
        };
        let mut guard = vec![
            BooleanExpr::lacks(ancestor.clone(), Status::Fail),
            BooleanExpr::lacks(ancestor.clone(), Status::Pass),
        ];
        if self.kind == Kind::Requirement {
            guard.push(BooleanExpr::has(ancestor.clone(), Status::Applicable));
        }
        guard
    }

    fn status_rule(
        &self,
        purpose: Purpose,
        terms: impl IntoIterator<Item = BooleanExpr>,
        statuses: Vec<Status>,
    ) -> CompiledRule {
        let mut guard = self.ancestor_guard();
        guard.extend(terms);
        CompiledRule {
            id: self.path.rule_id(purpose.suffix()),
            clause: self.path.clone(),
            purpose,
            entity_type: Some(self.entity_type.to_string()),
            guard: BooleanExpr::And(guard),
            effect: Effect::SetStatus {
                target: self.path.clone(),
                statuses,
            },
        }
    }
}

/// The per-entity status rules of a section.
///
/// The `NotApplicable` rule is only emitted when the section has conditions,
/// and the `Fail` rule only when it has requirements.
#[must_use]
pub fn main_rules(scope: &Scope<'_>, sections: &Sections) -> Vec<CompiledRule> {
    let path = scope.path;
    let mut rules = Vec::with_capacity(4);

    if let Some(condition) = inapplicability_condition(sections) {
        rules.push(scope.status_rule(
            Purpose::NotApplicable,
            [
                BooleanExpr::lacks(path.clone(), Status::NotApplicable),
                BooleanExpr::lacks(path.clone(), Status::Applicable),
                condition,
            ],
            vec![Status::NotApplicable, Status::Pass],
        ));
    }

    let mut applicable = vec![
        BooleanExpr::lacks(path.clone(), Status::Applicable),
        BooleanExpr::lacks(path.clone(), Status::NotApplicable),
    ];
    applicable.extend(applicability_terms(sections));
    rules.push(scope.status_rule(Purpose::Applicable, applicable, vec![Status::Applicable]));

    let concluded = [
        BooleanExpr::lacks(path.clone(), Status::Fail),
        BooleanExpr::lacks(path.clone(), Status::Pass),
        BooleanExpr::has(path.clone(), Status::Applicable),
    ];

    let mut pass = concluded.to_vec();
    pass.extend(sections.requires.iter().map(Operand::holds));
    rules.push(scope.status_rule(Purpose::Pass, pass, vec![Status::Pass]));

    if !sections.requires.is_empty() {
        let mut fail = concluded.to_vec();
        fail.push(BooleanExpr::Or(
            sections.requires.iter().map(Operand::fails).collect(),
        ));
        rules.push(scope.status_rule(Purpose::Fail, fail, vec![Status::Fail]));
    }

    rules
}

/// Rules carrying a nested section's result, computed for entities of a
/// different class, over to the entities of the enclosing section.
#[must_use]
pub fn transfer_rules(
    parent: &RulePath,
    parent_entity: &str,
    child_id: &NodeId,
    child: &RulePath,
) -> [CompiledRule; 3] {
    let rule = |purpose: Purpose, guard: BooleanExpr, status: Status| CompiledRule {
        id: parent.rule_id(&format!("Transfer_{child_id}_{}", purpose.suffix())),
        clause: parent.clone(),
        purpose,
        entity_type: Some(parent_entity.to_string()),
        guard,
        effect: Effect::SetStatus {
            target: child.clone(),
            statuses: vec![status],
        },
    };
    let applicable = || BooleanExpr::has(child.clone(), Status::Applicable);

    [
        rule(
            Purpose::TransferPass,
            BooleanExpr::ForAll {
                condition: Box::new(applicable()),
                consequence: Box::new(BooleanExpr::has(child.clone(), Status::Pass)),
            },
            Status::Pass,
        ),
        rule(
            Purpose::TransferPassVacuous,
            BooleanExpr::NotExists(Box::new(applicable())),
            Status::Pass,
        ),
        rule(
            Purpose::TransferFail,
            BooleanExpr::Exists(Box::new(BooleanExpr::has(child.clone(), Status::Fail))),
            Status::Fail,
        ),
    ]
}

/// A summary rule inserting a result fact once.
pub(crate) fn summary_rule(
    path: &RulePath,
    purpose: Purpose,
    condition: BooleanExpr,
    outcome: Outcome,
) -> CompiledRule {
    CompiledRule {
        id: path.rule_id(purpose.suffix()),
        clause: path.clone(),
        purpose,
        entity_type: None,
        guard: BooleanExpr::And(vec![
            condition,
            !BooleanExpr::Result {
                rule: path.clone(),
                outcome,
            },
        ]),
        effect: Effect::InsertResult {
            rule: path.clone(),
            outcome,
        },
    }
}

/// Rules summarising a section's per-entity results into one result fact.
#[must_use]
pub fn aggregation_rules(path: &RulePath) -> [CompiledRule; 3] {
    let status = |status| BooleanExpr::has(path.clone(), status);
    [
        summary_rule(
            path,
            Purpose::MetaPass,
            BooleanExpr::ForAll {
                condition: Box::new(status(Status::Applicable)),
                consequence: Box::new(status(Status::Pass)),
            },
            Outcome::Pass,
        ),
        summary_rule(
            path,
            Purpose::MetaPassVacuous,
            BooleanExpr::NotExists(Box::new(status(Status::Applicable))),
            Outcome::Pass,
        ),
        summary_rule(
            path,
            Purpose::MetaFail,
            BooleanExpr::Exists(Box::new(status(Status::Fail))),
            Outcome::Fail,
        ),
    ]
}

/// The document verdict over its top-level sections.
#[must_use]
pub fn document_rules(document: &RulePath, sections: &NonEmpty<RulePath>) -> [CompiledRule; 2] {
    let exists = |path: &RulePath, status| {
        BooleanExpr::Exists(Box::new(BooleanExpr::has(path.clone(), status)))
    };
    [
        summary_rule(
            document,
            Purpose::DocumentFinalPass,
            BooleanExpr::And(sections.iter().map(|path| exists(path, Status::Pass)).collect()),
            Outcome::Pass,
        ),
        summary_rule(
            document,
            Purpose::DocumentFinalFail,
            BooleanExpr::Or(sections.iter().map(|path| exists(path, Status::Fail)).collect()),
            Outcome::Fail,
        ),
    ]
}
