use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use rase::{Dictionary, compile_document, storage::document};
use tracing::instrument;

use super::{RuleFormat, emit, load_config};

#[derive(Debug, Parser)]
pub struct Compile {
    /// The RASE document (`.yaml`, `.yml` or `.json`)
    document: PathBuf,

    /// The type dictionary (JSON)
    dictionary: PathBuf,

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

impl Compile {
    #[instrument]
    pub fn run(self) -> anyhow::Result<()> {
        let config = load_config(self.config.as_deref())?;
        let dictionary = Dictionary::load(&self.dictionary)?;
        let document = document::load(&self.document)?;

        let rules = compile_document(&document, &dictionary, &config)
            .with_context(|| format!("failed to compile '{}'", self.document.display()))?;

        emit(&rules, self.format, &config, self.output.as_ref())
    }
}
