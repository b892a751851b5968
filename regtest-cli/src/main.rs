use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use regtest::{Config, Encoding};

mod commands;
mod output;

use commands::compare::{ArtifactKind, CompareArgs};
use output::Output;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compares an obtained artifact with a baseline using the comparator of the given kind.
    /// Exits with status 1 when they differ
    Compare {
        kind: ArtifactKind,
        obtained: PathBuf,
        baseline: PathBuf,
        /// Absolute tolerance; defaults to the configured one for the kind
        #[clap(long)]
        atol: Option<f64>,
        /// Relative tolerance; defaults to the configured one for the kind
        #[clap(long)]
        rtol: Option<f64>,
        /// Compare `file` artifacts byte for byte
        #[clap(long)]
        binary: bool,
        /// Text encoding of `file` artifacts (utf-8, utf-16-le, utf-16-be, latin-1)
        #[clap(long)]
        encoding: Option<Encoding>,
    },
    /// Lists the obtained artifacts of a directory and the state of their baselines
    List {
        obtained_dir: PathBuf,
        /// Where the baselines live. A directory named `obtained` defaults to its sibling
        /// `baseline` directory, anything else to itself
        #[clap(long)]
        baseline_dir: Option<PathBuf>,
    },
    /// Copies every obtained artifact over its baseline
    Accept {
        obtained_dir: PathBuf,
        baseline_dir: PathBuf,
        /// Only report what would be copied
        #[clap(long)]
        dry_run: bool,
    },
}

#[derive(Parser)]
#[clap(version, author, about)]
pub struct Cli {
    /// Output results as JSON
    #[clap(long, global = true)]
    pub json: bool,

    #[clap(subcommand)]
    pub command: Command,
}

/// Returns false when a comparison found differences.
fn try_main() -> Result<bool> {
    env_logger::init();

    let cli = Cli::parse();
    let current_dir = std::env::current_dir()?;
    let output = Output::new(cli.json);

    match cli.command {
        Command::Compare {
            kind,
            obtained,
            baseline,
            atol,
            rtol,
            binary,
            encoding,
        } => {
            let config = Config::find(&current_dir).transpose()?.unwrap_or_default();
            let args = CompareArgs {
                atol,
                rtol,
                binary,
                encoding,
            };
            return commands::compare::run(&output, kind, obtained, baseline, &args, &config);
        }
        Command::List {
            obtained_dir,
            baseline_dir,
        } => {
            let baseline_dir =
                baseline_dir.unwrap_or_else(|| commands::default_baseline_dir(&obtained_dir));
            commands::list::run(&output, &obtained_dir, &baseline_dir)?;
        }
        Command::Accept {
            obtained_dir,
            baseline_dir,
            dry_run,
        } => {
            commands::accept::run(&output, &obtained_dir, &baseline_dir, dry_run)?;
        }
    }
    Ok(true)
}

fn main() {
    match try_main() {
        Ok(true) => {}
        Ok(false) => ::std::process::exit(1),
        Err(e) => {
            eprintln!("{e:?}");
            ::std::process::exit(1)
        }
    }
}
