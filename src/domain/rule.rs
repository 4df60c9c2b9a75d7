//! The structured rule representation produced by compilation.
//!
//! Compilers build [`CompiledRule`] values out of [`BooleanExpr`] guards and
//! [`Effect`]s; renderers turn a [`RuleSet`] into a concrete rule language.
//! Nothing here knows any rule syntax.

use std::{collections::BTreeSet, fmt};

use borsh::BorshSerialize;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::sanitize::{Comparator, sanitize_rule_id};

/// The sanitised path of a compiled clause, e.g. `GBRegulation/b/1/s1`.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, BorshSerialize,
)]
#[serde(transparent)]
pub struct RulePath(String);

impl RulePath {
    /// Builds the path of a node from its citation and id.
    #[must_use]
    pub fn of(document_reference: &str, id: &str) -> Self {
        Self(sanitize_rule_id(&format!("{document_reference}/{id}")))
    }

    /// Builds a path from free text.
    #[must_use]
    pub fn new(text: &str) -> Self {
        Self(sanitize_rule_id(text))
    }

    /// The path as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The id of the rule at this path with the given purpose suffix.
    #[must_use]
    pub fn rule_id(&self, suffix: &str) -> String {
        format!("{}_{suffix}", self.0)
    }
}

impl fmt::Display for RulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The four status facts a clause can reach for an entity.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    BorshSerialize,
)]
#[borsh(use_discriminant = true)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// The clause does not apply to the entity.
    NotApplicable = 0,
    /// The clause applies to the entity.
    Applicable = 1,
    /// The entity satisfies the clause.
    Pass = 2,
    /// The entity violates the clause.
    Fail = 3,
}

/// A document level result fact.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    BorshSerialize,
)]
#[borsh(use_discriminant = true)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    /// Every applicable entity passed.
    Pass = 0,
    /// Some entity failed.
    Fail = 1,
}

impl Outcome {
    /// The result token stored in result facts.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
        }
    }
}

/// A test of one entity property: `property comparator value unit`.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, BorshSerialize,
)]
pub struct PropertyTest {
    /// Sanitised property name.
    pub property: String,
    /// Normalised comparator.
    pub comparator: Comparator,
    /// Lower-cased target value.
    pub value: String,
    /// Unit of the target value, possibly empty.
    pub unit: String,
}

/// A rule guard.
///
/// `Property` and `Status` constrain the entity the rule matches. The
/// quantified forms range over every entity in working memory, and `Result`
/// matches a document level result fact.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, BorshSerialize,
)]
#[serde(rename_all = "snake_case")]
pub enum BooleanExpr {
    /// The entity's property satisfies the test.
    Property(PropertyTest),
    /// The entity has (or, when negated, lacks) a status for a clause.
    Status {
        /// The clause.
        target: RulePath,
        /// The status.
        status: Status,
        /// Whether the status must be absent.
        negated: bool,
    },
    /// Negation.
    Not(Box<Self>),
    /// Conjunction; true when empty.
    And(Vec<Self>),
    /// Disjunction; false when empty.
    Or(Vec<Self>),
    /// Every entity satisfying `condition` also satisfies `consequence`.
    ForAll {
        /// The range of the quantifier.
        condition: Box<Self>,
        /// What must hold across the range.
        consequence: Box<Self>,
    },
    /// Some entity satisfies the condition.
    Exists(Box<Self>),
    /// No entity satisfies the condition.
    NotExists(Box<Self>),
    /// A result fact with this outcome has been inserted for the clause.
    Result {
        /// The clause.
        rule: RulePath,
        /// The outcome.
        outcome: Outcome,
    },
}

impl BooleanExpr {
    /// The entity has `status` for `target`.
    #[must_use]
    pub const fn has(target: RulePath, status: Status) -> Self {
        Self::Status {
            target,
            status,
            negated: false,
        }
    }

    /// The entity does not have `status` for `target`.
    #[must_use]
    pub const fn lacks(target: RulePath, status: Status) -> Self {
        Self::Status {
            target,
            status,
            negated: true,
        }
    }

    /// Evaluates the expression, delegating every atom to `atom`.
    ///
    /// Atoms are `Property`, non-negated `Status`, the quantifiers and
    /// `Result`. A negated status is evaluated as the negation of its positive
    /// form.
    pub fn evaluate(&self, atom: &impl Fn(&Self) -> bool) -> bool {
        match self {
            Self::Not(inner) => !inner.evaluate(atom),
            Self::And(terms) => terms.iter().all(|term| term.evaluate(atom)),
            Self::Or(terms) => terms.iter().any(|term| term.evaluate(atom)),
            Self::Status {
                target,
                status,
                negated: true,
            } => !atom(&Self::has(target.clone(), *status)),
            _ => atom(self),
        }
    }
}

impl std::ops::Not for BooleanExpr {
    type Output = Self;

    fn not(self) -> Self::Output {
        Self::Not(Box::new(self))
    }
}

/// What a rule does when it fires.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, BorshSerialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    /// Records statuses for a clause on the matched entity.
    SetStatus {
        /// The clause.
        target: RulePath,
        /// The statuses, in the order they are set.
        statuses: Vec<Status>,
    },
    /// Inserts a document level result fact.
    InsertResult {
        /// The clause.
        rule: RulePath,
        /// The outcome.
        outcome: Outcome,
    },
}

/// Which evaluation phase a rule belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    /// Per-entity status computation.
    Compute,
    /// Document level summarisation, after computation settles.
    Summary,
}

impl Phase {
    /// The agenda group name of the phase.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Compute => "compute",
            Self::Summary => "summary",
        }
    }
}

/// Why a rule was emitted.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    BorshSerialize,
)]
#[borsh(use_discriminant = true)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    /// Marks an entity the clause does not apply to.
    NotApplicable = 0,
    /// Marks an entity the clause applies to.
    Applicable = 1,
    /// Marks an applicable entity that satisfies the clause.
    Pass = 2,
    /// Marks an applicable entity that violates the clause.
    Fail = 3,
    /// Re-attributes a child's universal pass to the parent's entities.
    TransferPass = 4,
    /// Re-attributes a child's vacuous pass to the parent's entities.
    TransferPassVacuous = 5,
    /// Re-attributes a child's failure to the parent's entities.
    TransferFail = 6,
    /// Summarises a clause that every applicable entity passed.
    MetaPass = 7,
    /// Summarises a clause no entity was applicable to.
    MetaPassVacuous = 8,
    /// Summarises a clause some entity failed.
    MetaFail = 9,
    /// The document passes.
    DocumentFinalPass = 10,
    /// The document fails.
    DocumentFinalFail = 11,
    /// A clause-record step succeeded.
    StepPass = 12,
    /// No step of a clause record failed.
    ClausePass = 13,
    /// Some step of a clause record failed.
    ClauseFail = 14,
}

impl Purpose {
    /// The suffix appended to the clause path to form the rule id.
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::NotApplicable => "NotApplicable",
            Self::Applicable => "Applicable",
            Self::Pass | Self::TransferPass | Self::ClausePass => "Pass",
            Self::TransferPassVacuous => "Pass2",
            Self::Fail | Self::TransferFail | Self::ClauseFail => "Fail",
            Self::MetaPass => "Meta_Pass",
            Self::MetaPassVacuous => "Meta_Pass2",
            Self::MetaFail => "Meta_Fail",
            Self::DocumentFinalPass => "FINAL_PASS",
            Self::DocumentFinalFail => "FINAL_FAIL",
            Self::StepPass => "Step",
        }
    }

    /// The phase the rule runs in.
    #[must_use]
    pub const fn phase(self) -> Phase {
        match self {
            Self::NotApplicable
            | Self::Applicable
            | Self::Pass
            | Self::Fail
            | Self::TransferPass
            | Self::TransferPassVacuous
            | Self::TransferFail
            | Self::StepPass => Phase::Compute,
            Self::MetaPass
            | Self::MetaPassVacuous
            | Self::MetaFail
            | Self::DocumentFinalPass
            | Self::DocumentFinalFail
            | Self::ClausePass
            | Self::ClauseFail => Phase::Summary,
        }
    }
}

/// One production rule.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, BorshSerialize,
)]
pub struct CompiledRule {
    /// Unique rule name.
    pub id: String,
    /// The clause the rule belongs to; property lookups are attributed to it.
    pub clause: RulePath,
    /// Why the rule exists.
    pub purpose: Purpose,
    /// The object class of the matched entity. `None` for rules that only
    /// match result facts and quantified patterns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    /// The condition under which the rule fires.
    pub guard: BooleanExpr,
    /// What the rule does.
    pub effect: Effect,
}

/// A deterministic, duplicate-free collection of rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet(BTreeSet<CompiledRule>);

impl RuleSet {
    /// Adds a rule. Returns `false` if an identical rule was already present.
    pub fn insert(&mut self, rule: CompiledRule) -> bool {
        self.0.insert(rule)
    }

    /// Number of distinct rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set holds no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The rules, ordered.
    pub fn iter(&self) -> impl Iterator<Item = &CompiledRule> {
        self.0.iter()
    }

    /// The rule with the given id, if any.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&CompiledRule> {
        self.0.iter().find(|rule| rule.id == id)
    }

    /// Calculate the fingerprint of the rule set.
    ///
    /// The fingerprint is a SHA256 hash of the Borsh-serialized rules in set
    /// order. Two compilations of the same input produce the same fingerprint.
    ///
    /// # Panics
    ///
    /// Panics if borsh serialization fails (which should never happen for this
    /// data structure).
    #[must_use]
    pub fn fingerprint(&self) -> String {
        // encode using [borsh](https://borsh.io/)
        let encoded = borsh::to_vec(&self.0).expect("this should never fail");

        let hash = Sha256::digest(encoded);

        format!("{hash:x}")
    }
}

impl Extend<CompiledRule> for RuleSet {
    fn extend<T: IntoIterator<Item = CompiledRule>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}

impl FromIterator<CompiledRule> for RuleSet {
    fn from_iter<T: IntoIterator<Item = CompiledRule>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a CompiledRule;
    type IntoIter = std::collections::btree_set::Iter<'a, CompiledRule>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(id: &str, purpose: Purpose) -> CompiledRule {
        let clause = RulePath::new("/b/1/s1");
        CompiledRule {
            id: clause.rule_id(id),
            clause: clause.clone(),
            purpose,
            entity_type: Some("door".to_string()),
            guard: BooleanExpr::And(vec![
                BooleanExpr::lacks(clause.clone(), Status::Pass),
                BooleanExpr::has(clause.clone(), Status::Applicable),
            ]),
            effect: Effect::SetStatus {
                target: clause,
                statuses: vec![Status::Pass],
            },
        }
    }

    #[test]
    fn paths_are_sanitised() {
        let path = RulePath::of("GB/Regulation/Approved Document B/2019/1", "s(1)");
        assert_eq!(path.as_str(), "GB/Regulation/ApprovedDocumentB/2019/1/s1");
        assert_eq!(path.rule_id("Pass"), "GB/Regulation/ApprovedDocumentB/2019/1/s1_Pass");
    }

    #[test]
    fn identical_rules_collapse() {
        let mut rules = RuleSet::default();
        assert!(rules.insert(rule("Pass", Purpose::Pass)));
        assert!(!rules.insert(rule("Pass", Purpose::Pass)));
        assert!(rules.insert(rule("Fail", Purpose::Fail)));
        assert_eq!(rules.len(), 2);
        assert!(rules.get("/b/1/s1_Fail").is_some());
    }

    #[test]
    fn fingerprint_is_order_independent() {
        let a: RuleSet = [rule("Pass", Purpose::Pass), rule("Fail", Purpose::Fail)]
            .into_iter()
            .collect();
        let b: RuleSet = [rule("Fail", Purpose::Fail), rule("Pass", Purpose::Pass)]
            .into_iter()
            .collect();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);

        let c: RuleSet = [rule("Pass", Purpose::Pass)].into_iter().collect();
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn phases() {
        assert_eq!(Purpose::Applicable.phase(), Phase::Compute);
        assert_eq!(Purpose::TransferFail.phase(), Phase::Compute);
        assert_eq!(Purpose::MetaPassVacuous.phase(), Phase::Summary);
        assert_eq!(Purpose::DocumentFinalFail.phase(), Phase::Summary);
    }

    #[test]
    fn evaluation_handles_negated_status() {
        let clause = RulePath::new("c");
        let expr = BooleanExpr::And(vec![
            BooleanExpr::lacks(clause.clone(), Status::Fail),
            !BooleanExpr::Or(vec![]),
        ]);
        let nothing_set = |_: &BooleanExpr| false;
        assert!(expr.evaluate(&nothing_set));

        let failed =
            |atom: &BooleanExpr| *atom == BooleanExpr::has(RulePath::new("c"), Status::Fail);
        assert!(!expr.evaluate(&failed));
    }

    #[test]
    fn json_shape() {
        let json = serde_json::to_value(rule("Pass", Purpose::Pass)).unwrap();
        assert_eq!(json["purpose"], "pass");
        assert_eq!(json["clause"], "/b/1/s1");
        assert_eq!(json["effect"]["set_status"]["statuses"][0], "pass");
    }
}
