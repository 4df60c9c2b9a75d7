//! Compilation of clause records.
//!
//! A clause record is a flat list of steps, each testing one noun. Steps are
//! grouped by clause; a clause passes when none of its steps failed and the
//! document passes when none of its clauses failed.

use std::{collections::BTreeMap, str::FromStr};

use tracing::{debug, info, instrument, warn};

use super::{Error, synthesis::summary_rule};
use crate::domain::{
    rule::{BooleanExpr, CompiledRule, Effect, Outcome, PropertyTest, Purpose, RulePath, RuleSet},
    sanitize::{Comparator, sanitize_property},
};

/// One step of a clause record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// The clause the step belongs to.
    pub clause: String,
    /// The step number within the clause.
    pub number: String,
    /// The command, e.g. `IS`.
    pub command: String,
    /// What the command applies to.
    pub noun: String,
    /// How control continues after the step, e.g. `NEXT`.
    pub keyword: Option<String>,
}

/// A named sequence of steps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordGroup {
    /// The group name.
    pub name: String,
    /// The steps, in record order.
    pub steps: Vec<Step>,
}

/// What a step checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Some entity has the noun as a true property.
    Is,
    /// The step named by the noun passed.
    To,
    /// The paragraph rule named by the noun passed.
    Run,
    /// The document named by the noun passed.
    XRun,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "IS" => Ok(Self::Is),
            "TO" => Ok(Self::To),
            "RUN" => Ok(Self::Run),
            "XRUN" => Ok(Self::XRun),
            other => Err(other.to_string()),
        }
    }
}

impl Command {
    fn guard(self, noun: &str) -> BooleanExpr {
        let passed = |rule: String| BooleanExpr::Result {
            rule: RulePath::new(&rule),
            outcome: Outcome::Pass,
        };
        match self {
            Self::Is => BooleanExpr::Exists(Box::new(BooleanExpr::Property(PropertyTest {
                property: sanitize_property(noun),
                comparator: Comparator::Equal,
                value: "true".to_string(),
                unit: String::new(),
            }))),
            Self::To => passed(noun.to_string()),
            Self::Run => passed(format!("Rule-Para{noun}-1")),
            Self::XRun => passed(format!("Document{noun}")),
        }
    }
}

/// How control continues after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Keyword {
    Next,
    Goto,
}

impl Keyword {
    fn parse(step: &str, raw: Option<&str>) -> Option<Self> {
        match raw.map(str::trim) {
            Some("NEXT") => Some(Self::Next),
            Some("GOTO") => Some(Self::Goto),
            None => None,
            Some(other) => {
                warn!(step, "ignoring unrecognised step keyword {other:?}");
                None
            }
        }
    }
}

/// The step compiled just before the current one.
struct Previous {
    path: RulePath,
    command: Command,
    keyword: Option<Keyword>,
}

impl Previous {
    /// A step following an `IS ... NEXT` step only runs once that step passed.
    fn chains(&self) -> bool {
        self.command == Command::Is && self.keyword == Some(Keyword::Next)
    }
}

/// Compiles clause records into rules.
///
/// Every step becomes a rule inserting its own `Pass` result; every clause
/// gets a pass and a fail summary over its steps; `document` gets the final
/// verdict over all clauses. The chaining of `IS ... NEXT` steps carries over
/// clause boundaries within a group but not across groups.
///
/// # Errors
///
/// Returns [`Error::UnknownCommand`] for a command other than `IS`, `TO`, `RUN`
/// or `XRUN`.
#[instrument(skip(groups), fields(groups = groups.len()))]
pub fn compile_records(document: &str, groups: &[RecordGroup]) -> Result<RuleSet, Error> {
    let mut rules = RuleSet::default();
    let mut clauses: BTreeMap<RulePath, Vec<RulePath>> = BTreeMap::new();

    for group in groups {
        debug!(group = %group.name, steps = group.steps.len(), "compiling record group");
        let mut previous: Option<Previous> = None;
        for step in &group.steps {
            let clause = RulePath::new(&step.clause);
            let id = clause.rule_id(&step.number);
            let path = RulePath::new(&id);

            let command = step.command.parse::<Command>().map_err(|command| {
                Error::UnknownCommand {
                    step: id.clone(),
                    command,
                }
            })?;

            let mut guard = Vec::with_capacity(2);
            if let Some(previous) = previous.as_ref().filter(|previous| previous.chains()) {
                guard.push(BooleanExpr::Result {
                    rule: previous.path.clone(),
                    outcome: Outcome::Pass,
                });
            }
            guard.push(command.guard(&step.noun));

            rules.insert(CompiledRule {
                id: id.clone(),
                clause: clause.clone(),
                purpose: Purpose::StepPass,
                entity_type: None,
                guard: BooleanExpr::And(guard),
                effect: Effect::InsertResult {
                    rule: path.clone(),
                    outcome: Outcome::Pass,
                },
            });

            clauses.entry(clause).or_default().push(path.clone());
            previous = Some(Previous {
                path,
                command,
                keyword: Keyword::parse(&id, step.keyword.as_deref()),
            });
        }
    }

    for (clause, steps) in &clauses {
        rules.extend(verdict_rules(
            clause,
            steps,
            [Purpose::ClausePass, Purpose::ClauseFail],
        ));
    }

    let paths: Vec<RulePath> = clauses.into_keys().collect();
    if !paths.is_empty() {
        rules.extend(verdict_rules(
            &RulePath::new(document),
            &paths,
            [Purpose::DocumentFinalPass, Purpose::DocumentFinalFail],
        ));
    }

    info!(rules = rules.len(), "compiled clause records");
    Ok(rules)
}

/// A pass rule (no part failed) and a fail rule (some part failed).
fn verdict_rules(
    path: &RulePath,
    parts: &[RulePath],
    [pass, fail]: [Purpose; 2],
) -> [CompiledRule; 2] {
    let failed = |part: &RulePath| BooleanExpr::Result {
        rule: part.clone(),
        outcome: Outcome::Fail,
    };
    [
        summary_rule(
            path,
            pass,
            BooleanExpr::And(parts.iter().map(|part| !failed(part)).collect()),
            Outcome::Pass,
        ),
        summary_rule(
            path,
            fail,
            BooleanExpr::Or(parts.iter().map(failed).collect()),
            Outcome::Fail,
        ),
    ]
}
