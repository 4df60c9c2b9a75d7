use std::path::{Path, PathBuf};

use clap::Parser;
use rase::{
    Dictionary,
    domain::{Node, coverage},
    storage::{Format, document},
};
use tracing::{debug, instrument};
use walkdir::WalkDir;

use super::terminal::Colorize;

#[derive(Debug, Parser)]
pub struct Check {
    /// The type dictionary (JSON)
    dictionary: PathBuf,

    /// Documents, or directories searched for documents
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Suppress all output except errors
    #[arg(long, short)]
    quiet: bool,
}

impl Check {
    #[instrument]
    pub fn run(self) -> anyhow::Result<()> {
        let dictionary = Dictionary::load(&self.dictionary)?;

        let files = document_files(&self.paths);
        let mut nodes: Vec<Node> = Vec::new();
        for path in &files {
            let document = document::load(path)?;
            debug!(path = %path.display(), "loaded document");
            nodes.extend(document.nodes());
        }

        let report = coverage::audit(&nodes, &dictionary);

        if !self.quiet {
            println!("Checked {} tags in {} documents\n", report.tags, files.len());
            if report.is_clean() {
                println!("{}", "✓ Documents and dictionary agree".success());
            } else {
                println!("{}", format!("✗ {} findings", report.findings.len()).warning());
                for finding in &report.findings {
                    println!("  • {finding}");
                }
            }
        }

        if !report.is_clean() {
            std::process::exit(2);
        }

        Ok(())
    }
}

/// Expands directories into the document files below them, in path order.
fn document_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = paths
        .iter()
        .flat_map(|path| {
            WalkDir::new(path)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|entry| entry.file_type().is_file() && is_document(entry.path()))
                .map(walkdir::DirEntry::into_path)
        })
        .collect();
    files.sort();
    files.dedup();
    files
}

fn is_document(path: &Path) -> bool {
    Format::from_path(path).is_some()
}
