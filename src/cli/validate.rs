use std::path::PathBuf;

use clap::Parser;
use rase::{
    Dictionary, Document,
    domain::{
        coverage::{Finding, audit},
        document::RootError,
    },
    storage::document,
};
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, Parser)]
pub struct Validate {
    /// The RASE document (`.yaml`, `.yml` or `.json`)
    document: PathBuf,

    /// Also check that every tagged property is in this dictionary
    #[arg(long)]
    dictionary: Option<PathBuf>,

    /// Suppress all output except errors
    #[arg(long, short)]
    quiet: bool,
}

impl Validate {
    #[instrument]
    pub fn run(self) -> anyhow::Result<()> {
        let document = document::load(&self.document)?;

        let violations = document.violations();
        let unknown = match &self.dictionary {
            Some(path) => unknown_properties(&document, &Dictionary::load(path)?),
            None => Vec::new(),
        };

        if !self.quiet {
            Self::print_report(&document, &violations, &unknown);
        }

        if !violations.is_empty() || !unknown.is_empty() {
            std::process::exit(2);
        }

        Ok(())
    }

    fn print_report(document: &Document, violations: &[RootError], unknown: &[String]) {
        println!("Validating {}...\n", document.base());

        if violations.is_empty() {
            println!(
                "✓ Structure:  {} sections, all compilable",
                document.sections().count()
            );
        } else {
            println!(
                "{}",
                format!("✗ Structure:  {} issues found", violations.len()).warning()
            );
            for violation in violations {
                println!("  • {violation}");
            }
        }

        if unknown.is_empty() {
            println!("✓ Properties: all tagged properties known");
        } else {
            println!(
                "{}",
                format!("✗ Properties: {} unknown properties", unknown.len()).warning()
            );
            for finding in unknown {
                println!("  • {finding}");
            }
        }

        let total = violations.len() + unknown.len();
        if total == 0 {
            println!("\n{}", "Document is compilable (0 issues)".success());
        } else {
            println!("\n{}", format!("Summary: {total} issues found").warning());
        }
    }
}

/// Dictionary findings for properties the dictionary has never heard of.
fn unknown_properties(document: &Document, dictionary: &Dictionary) -> Vec<String> {
    let nodes: Vec<_> = document.nodes().collect();
    audit(&nodes, dictionary)
        .findings
        .into_iter()
        .filter(|finding| matches!(finding, Finding::UnknownProperty { .. }))
        .map(|finding| finding.to_string())
        .collect()
}
