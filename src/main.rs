//! `rasec`: compiles RASE-annotated compliance documents into rules.

use clap::Parser;

mod cli;
use cli::Cli;

fn main() -> anyhow::Result<()> {
    Cli::parse().run()
}
