use std::io;

use super::Renderer;
use crate::domain::rule::RuleSet;

/// Renders rules as pretty JSON, for tooling that builds its own rule syntax.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Json;

impl Renderer for Json {
    fn render(&self, rules: &RuleSet, out: &mut dyn io::Write) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut *out, rules)?;
        writeln!(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{compiler::synthesis::aggregation_rules, domain::rule::RulePath};

    #[test]
    fn rules_survive_a_json_trip() {
        let rules: RuleSet = aggregation_rules(&RulePath::new("/b/s1")).into_iter().collect();

        let text = Json.render_to_string(&rules).unwrap();

        assert!(text.contains("\"id\": \"/b/s1_Meta_Pass\""));
        assert!(text.contains("\"purpose\": \"meta_fail\""));
        assert!(!text.contains("entity_type"));
        let parsed: RuleSet = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, rules);
    }
}
