use clap::{Parser, Subcommand};

use self::{inspect::InspectArg, learn::LearnArg};

mod inspect;
mod learn;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Learn an automaton from a training file
    Learn(#[clap(flatten)] LearnArg),
    /// Print a persisted automaton, optionally scoring it against a training file
    Inspect(#[clap(flatten)] InspectArg),
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    match args.mode {
        Mode::Learn(arg) => learn::run(&arg)?,
        Mode::Inspect(arg) => inspect::run(&arg)?,
    }
    Ok(())
}
