use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

mod check;
mod compile;
mod records;
mod terminal;
mod validate;

use anyhow::Context;
use check::Check;
use clap::ArgAction;
use compile::Compile;
use rase::{
    Config, RuleSet,
    render::{Drl, Json, Renderer},
};
use records::Records;
use terminal::Colorize;
use tracing::info;
use validate::Validate;

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global=true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);

        self.command.run()
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(io::stderr)
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[derive(Debug, clap::Parser)]
pub enum Command {
    /// Compile a RASE document into rules
    Compile(Compile),

    /// Check a document can be compiled
    ///
    /// Reports root-level tags, top-level sections that are not requirement
    /// sections, and sections mixing several tags with nested sections.
    Validate(Validate),

    /// Audit documents against a dictionary
    Check(Check),

    /// Compile a clause record file into rules
    Records(Records),
}

impl Command {
    fn run(self) -> anyhow::Result<()> {
        match self {
            Self::Compile(command) => command.run()?,
            Self::Validate(command) => command.run()?,
            Self::Check(command) => command.run()?,
            Self::Records(command) => command.run()?,
        }
        Ok(())
    }
}

/// Syntax of the emitted rules.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum RuleFormat {
    /// Drools rule language
    #[default]
    Drl,
    /// The structured rules as JSON
    Json,
}

/// Loads the configuration, or the defaults if no file is given.
fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    Ok(Config::load(path)?)
}

/// Renders `rules` and writes them to `output`, or stdout.
///
/// The rules are rendered in full before the file is created, so a failure
/// never leaves a partial rule file behind.
fn emit(
    rules: &RuleSet,
    format: RuleFormat,
    config: &Config,
    output: Option<&PathBuf>,
) -> anyhow::Result<()> {
    let text = match format {
        RuleFormat::Drl => Drl::from_config(config).render_to_string(rules)?,
        RuleFormat::Json => Json.render_to_string(rules)?,
    };

    match output {
        Some(path) => {
            fs::write(path, text)
                .with_context(|| format!("failed to write rules to '{}'", path.display()))?;
            info!(path = %path.display(), "wrote rules");
            println!(
                "{}",
                format!("✓ {} rules written to {}", rules.len(), path.display()).success()
            );
        }
        None => io::stdout().lock().write_all(text.as_bytes())?,
    }
    Ok(())
}
