//! The forward-chaining rule language read by the evaluator.
//!
//! Every rule matches `RuleEngineComplianceObject` entities and
//! `RuleEngineResult` facts. Entity constraints go inside the `$entity`
//! pattern; quantified conditions and result facts become conditional
//! elements of their own.

use std::io;

use super::Renderer;
use crate::domain::{
    Config,
    rule::{BooleanExpr, CompiledRule, Effect, PropertyTest, RuleSet, Status},
};

const ENTITY: &str = "RuleEngineComplianceObject";
const RESULT: &str = "RuleEngineResult";

/// Renders rules as a DRL file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drl {
    imports: Vec<String>,
}

impl Drl {
    /// A renderer writing `imports` at the top of the file.
    #[must_use]
    pub fn new(imports: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            imports: imports.into_iter().map(Into::into).collect(),
        }
    }

    /// A renderer using the imports of `config`.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.imports().iter().cloned())
    }
}

impl Default for Drl {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl Renderer for Drl {
    fn render(&self, rules: &RuleSet, out: &mut dyn io::Write) -> io::Result<()> {
        writeln!(out, "// fingerprint: {}", rules.fingerprint())?;
        for import in &self.imports {
            writeln!(out, "{import}")?;
        }
        for rule in rules {
            writeln!(out)?;
            write_rule(rule, out)?;
        }
        Ok(())
    }
}

fn write_rule(rule: &CompiledRule, out: &mut dyn io::Write) -> io::Result<()> {
    writeln!(
        out,
        "rule {} agenda-group {}",
        quote(&rule.id),
        quote(rule.purpose.phase().as_str())
    )?;
    writeln!(out, "when")?;
    for line in conditions(rule)? {
        writeln!(out, "\t{line}")?;
    }
    writeln!(out, "then")?;
    writeln!(out, "\t{}", action(rule)?)?;
    writeln!(out, "end")
}

/// The left hand side, one conditional element per line.
fn conditions(rule: &CompiledRule) -> io::Result<Vec<String>> {
    let clause = rule.clause.as_str();
    let terms: Vec<&BooleanExpr> = match &rule.guard {
        BooleanExpr::And(terms) => terms.iter().collect(),
        guard => vec![guard],
    };

    let mut lines = Vec::with_capacity(terms.len() + 1);
    match &rule.entity_type {
        Some(entity_type) => {
            let mut constraints = vec![format!("type contains {}", quote(entity_type))];
            let mut patterns = Vec::new();
            for term in terms {
                match constraint(term, clause) {
                    Some(text) => constraints.push(text),
                    None => patterns.push(pattern(term, clause)?),
                }
            }
            lines.push(format!("$entity: {ENTITY}({})", constraints.join(" && ")));
            lines.extend(patterns);
        }
        None => {
            for term in terms {
                lines.push(pattern(term, clause)?);
            }
        }
    }
    Ok(lines)
}

/// An expression over the matched entity's own fields, or `None` if the
/// expression needs a conditional element.
fn constraint(expr: &BooleanExpr, clause: &str) -> Option<String> {
    match expr {
        BooleanExpr::Property(test) => Some(property(test, clause)),
        BooleanExpr::Status {
            target,
            status,
            negated,
        } => Some(format!(
            "{} {}contains {}",
            status_field(*status),
            if *negated { "not " } else { "" },
            quote(target.as_str())
        )),
        BooleanExpr::Not(inner) => {
            let inner = constraint(inner, clause)?;
            Some(if inner.starts_with("get(") || inner.starts_with('(') {
                format!("!{inner}")
            } else {
                format!("!({inner})")
            })
        }
        BooleanExpr::And(terms) => junction(terms, clause, " && ", "true"),
        BooleanExpr::Or(terms) => junction(terms, clause, " || ", "false"),
        BooleanExpr::ForAll { .. }
        | BooleanExpr::Exists(_)
        | BooleanExpr::NotExists(_)
        | BooleanExpr::Result { .. } => None,
    }
}

fn junction(terms: &[BooleanExpr], clause: &str, operator: &str, empty: &str) -> Option<String> {
    let parts = terms
        .iter()
        .map(|term| constraint(term, clause))
        .collect::<Option<Vec<_>>>()?;
    Some(match parts.as_slice() {
        [] => empty.to_string(),
        [single] => single.clone(),
        _ => format!("({})", parts.join(operator)),
    })
}

/// A conditional element.
fn pattern(expr: &BooleanExpr, clause: &str) -> io::Result<String> {
    if let Some(text) = constraint(expr, clause) {
        return Ok(format!("exists {ENTITY}({text})"));
    }
    Ok(match expr {
        BooleanExpr::ForAll {
            condition,
            consequence,
        } => format!(
            "forall ( $x: {ENTITY}({}) {ENTITY}(this == $x, {}) )",
            entity_constraint(condition, clause)?,
            entity_constraint(consequence, clause)?
        ),
        BooleanExpr::Exists(inner) => match constraint(inner, clause) {
            Some(text) => format!("exists {ENTITY}({text})"),
            None => format!("exists ( {} )", pattern(inner, clause)?),
        },
        BooleanExpr::NotExists(inner) => match constraint(inner, clause) {
            Some(text) => format!("not {ENTITY}({text})"),
            None => format!("not ( {} )", pattern(inner, clause)?),
        },
        BooleanExpr::Result { rule, outcome } => format!(
            "{RESULT}(ruleId == {}, result == {})",
            quote(rule.as_str()),
            quote(outcome.as_str())
        ),
        BooleanExpr::Not(inner) => match inner.as_ref() {
            BooleanExpr::Result { .. } => format!("not {}", pattern(inner, clause)?),
            _ => format!("not ( {} )", pattern(inner, clause)?),
        },
        BooleanExpr::And(terms) => pattern_junction(terms, clause, " and ", "eval(true)")?,
        BooleanExpr::Or(terms) => pattern_junction(terms, clause, " or ", "eval(false)")?,
        BooleanExpr::Property(_) | BooleanExpr::Status { .. } => {
            // always rendered as constraints above
            return Err(invalid(format!("unexpected entity constraint {expr:?}")));
        }
    })
}

fn pattern_junction(
    terms: &[BooleanExpr],
    clause: &str,
    operator: &str,
    empty: &str,
) -> io::Result<String> {
    let parts = terms
        .iter()
        .map(|term| pattern(term, clause))
        .collect::<io::Result<Vec<_>>>()?;
    Ok(match parts.as_slice() {
        [] => empty.to_string(),
        [single] => single.clone(),
        _ => format!("( {} )", parts.join(operator)),
    })
}

fn entity_constraint(expr: &BooleanExpr, clause: &str) -> io::Result<String> {
    constraint(expr, clause).ok_or_else(|| {
        invalid(format!(
            "quantified condition is not an entity constraint: {expr:?}"
        ))
    })
}

fn property(test: &PropertyTest, clause: &str) -> String {
    format!(
        "get({},{},{},{},{})",
        quote(&test.property),
        quote(test.comparator.symbol()),
        quote(&test.value),
        quote(&test.unit),
        quote(clause)
    )
}

const fn status_field(status: Status) -> &'static str {
    match status {
        Status::NotApplicable => "notApplicable",
        Status::Applicable => "applicable",
        Status::Pass => "pass",
        Status::Fail => "fail",
    }
}

const fn status_setter(status: Status) -> &'static str {
    match status {
        Status::NotApplicable => "setNotApplicable",
        Status::Applicable => "setApplicable",
        Status::Pass => "setPass",
        Status::Fail => "setFail",
    }
}

/// The right hand side.
fn action(rule: &CompiledRule) -> io::Result<String> {
    match &rule.effect {
        Effect::SetStatus { target, statuses } => {
            if rule.entity_type.is_none() {
                return Err(invalid(format!(
                    "rule '{}' sets a status without matching an entity",
                    rule.id
                )));
            }
            let setters: Vec<String> = statuses
                .iter()
                .map(|status| format!("{}({})", status_setter(*status), quote(target.as_str())))
                .collect();
            Ok(format!("modify($entity) {{ {} }};", setters.join(", ")))
        }
        Effect::InsertResult { rule, outcome } => Ok(format!(
            "insert(new {RESULT}({}, {}));",
            quote(rule.as_str()),
            quote(outcome.as_str())
        )),
    }
}

fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

fn invalid(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        compiler::synthesis::{
            Operand, Scope, Sections, aggregation_rules, main_rules, transfer_rules,
        },
        domain::{
            node::{Kind, NodeId},
            rule::{Outcome, Purpose, RulePath},
            sanitize::Comparator,
        },
    };

    fn test(property: &str, comparator: Comparator, value: &str, unit: &str) -> PropertyTest {
        PropertyTest {
            property: property.to_string(),
            comparator,
            value: value.to_string(),
            unit: unit.to_string(),
        }
    }

    fn render(rules: impl IntoIterator<Item = CompiledRule>) -> String {
        Drl::default()
            .render_to_string(&rules.into_iter().collect())
            .unwrap()
    }

    fn fire_door_rules() -> Vec<CompiledRule> {
        let path = RulePath::new("/b/1/s1");
        let sections = Sections {
            applies: vec![Operand::Test(test("FireDoor", Comparator::Equal, "true", ""))],
            requires: vec![Operand::Test(test(
                "Width",
                Comparator::GreaterOrEqual,
                "800",
                "mm",
            ))],
            ..Sections::default()
        };
        main_rules(
            &Scope {
                path: &path,
                kind: Kind::Requirement,
                ancestor: None,
                entity_type: "door",
            },
            &sections,
        )
    }

    #[test]
    fn header_carries_fingerprint_and_imports() {
        let rules: RuleSet = fire_door_rules().into_iter().collect();
        let text = Drl::new(["import a.B;"]).render_to_string(&rules).unwrap();

        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some(format!("// fingerprint: {}", rules.fingerprint()).as_str())
        );
        assert_eq!(lines.next(), Some("import a.B;"));
        assert_eq!(text.matches("\nend\n").count(), rules.len());
    }

    #[test]
    fn status_rules_constrain_the_entity() {
        let text = render(fire_door_rules());

        assert!(text.contains(
            "rule \"/b/1/s1_Pass\" agenda-group \"compute\"\nwhen\n\t$entity: RuleEngineComplianceObject(type contains \"door\" && fail not contains \"/b/1/s1\" && pass not contains \"/b/1/s1\" && applicable contains \"/b/1/s1\" && get(\"Width\",\">=\",\"800\",\"mm\",\"/b/1/s1\"))\nthen\n\tmodify($entity) { setPass(\"/b/1/s1\") };\nend"
        ));
        assert!(text.contains("!get(\"Width\",\">=\",\"800\",\"mm\",\"/b/1/s1\")"));
        assert!(text.contains(
            "modify($entity) { setNotApplicable(\"/b/1/s1\"), setPass(\"/b/1/s1\") };"
        ));
    }

    #[test]
    fn transfer_rules_quantify_over_entities() {
        let parent = RulePath::new("/b/s1");
        let child = RulePath::new("/b/s2");
        let text = render(transfer_rules(
            &parent,
            "Building",
            &NodeId::try_from("s2").unwrap(),
            &child,
        ));

        assert!(text.contains(
            "\t$entity: RuleEngineComplianceObject(type contains \"Building\")\n\tforall ( $x: RuleEngineComplianceObject(applicable contains \"/b/s2\") RuleEngineComplianceObject(this == $x, pass contains \"/b/s2\") )\n"
        ));
        assert!(text.contains("\tnot RuleEngineComplianceObject(applicable contains \"/b/s2\")\n"));
        assert!(text.contains("\texists RuleEngineComplianceObject(fail contains \"/b/s2\")\n"));
    }

    #[test]
    fn summary_rules_insert_results_once() {
        let text = render(aggregation_rules(&RulePath::new("/b/s1")));

        assert!(text.contains("rule \"/b/s1_Meta_Fail\" agenda-group \"summary\""));
        assert!(text.contains(
            "\tnot RuleEngineResult(ruleId == \"/b/s1\", result == \"FAIL\")\nthen\n\tinsert(new RuleEngineResult(\"/b/s1\", \"FAIL\"));"
        ));
        assert!(!text.contains("$entity"));
    }

    #[test]
    fn grouped_patterns_are_parenthesised() {
        let rule = CompiledRule {
            id: "doc_FINAL_FAIL".to_string(),
            clause: RulePath::new("doc"),
            purpose: Purpose::DocumentFinalFail,
            entity_type: None,
            guard: BooleanExpr::Or(vec![
                BooleanExpr::Exists(Box::new(BooleanExpr::has(RulePath::new("a"), Status::Fail))),
                BooleanExpr::Result {
                    rule: RulePath::new("b"),
                    outcome: Outcome::Fail,
                },
            ]),
            effect: Effect::InsertResult {
                rule: RulePath::new("doc"),
                outcome: Outcome::Fail,
            },
        };

        let text = render([rule]);

        assert!(text.contains(
            "\t( exists RuleEngineComplianceObject(fail contains \"a\") or RuleEngineResult(ruleId == \"b\", result == \"FAIL\") )\n"
        ));
    }

    #[test]
    fn quotes_are_escaped() {
        assert_eq!(quote(r#"say "hi""#), r#""say \"hi\"""#);
    }

    #[test]
    fn status_effect_needs_an_entity() {
        let mut rule = fire_door_rules().remove(0);
        rule.entity_type = None;

        let error = Drl::default()
            .render_to_string(&[rule].into_iter().collect())
            .unwrap_err();

        assert_eq!(error.kind(), io::ErrorKind::InvalidInput);
    }
}
