use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use rase::{compiler::records::compile_records, storage::records};
use tracing::instrument;

use super::{RuleFormat, emit, load_config};

#[derive(Debug, Parser)]
pub struct Records {
    /// The clause record file (JSON)
    records: PathBuf,

    /// Document name used for the document verdict rules
    ///
    /// Defaults to the file name without its extension.
    #[arg(long)]
    name: Option<String>,

    /// Write the rules to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Rule syntax to emit
    #[arg(short, long, value_enum, default_value_t)]
    format: RuleFormat,

    /// Compiler configuration (TOML)
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Records {
    #[instrument]
    pub fn run(self) -> anyhow::Result<()> {
        let config = load_config(self.config.as_deref())?;
        let groups = records::load(&self.records)?;

        let name = match self.name {
            Some(name) => name,
            None => self
                .records
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .context("cannot derive a document name, pass --name")?,
        };

        let rules = compile_records(&name, &groups)
            .with_context(|| format!("failed to compile '{}'", self.records.display()))?;

        emit(&rules, self.format, &config, self.output.as_ref())
    }
}
