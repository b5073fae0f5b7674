//! Strand CLI, the command-line front end for the Strand simulator.
//!
//! Provides `strand list` to show the built-in demonstration designs and
//! `strand run` to simulate one of them for a number of cycles, optionally
//! dumping a VCD waveform and a metrics report.

#![warn(missing_docs)]

mod designs;
mod list;
mod run;

use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Strand, a cycle-based logic simulator.
#[derive(Parser, Debug)]
#[command(name = "strand", version, about = "Strand cycle simulator")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a custom `strand.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the built-in designs.
    List,
    /// Simulate a built-in design.
    Run(RunArgs),
}

/// Arguments for the `strand run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Name of the design to simulate (see `strand list`).
    pub design: String,

    /// Number of clock cycles to run after reset.
    #[arg(short = 'n', long, default_value_t = 8)]
    pub cycles: u64,

    /// Write a VCD waveform to this path (overrides `waveform.path`).
    #[arg(long)]
    pub vcd: Option<String>,

    /// Print simulation metrics after the run.
    #[arg(long)]
    pub metrics: bool,

    /// Print metrics as JSON instead of text.
    #[arg(long, requires = "metrics")]
    pub json: bool,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Optional path to a custom config file.
    pub config: Option<String>,
}

impl GlobalArgs {
    /// Default log directive for these flags; `RUST_LOG` takes precedence.
    fn log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else if self.verbose {
            "debug"
        } else {
            "warn"
        }
    }
}

fn init_logging(global: &GlobalArgs) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(global.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        config: cli.config,
    };
    init_logging(&global);

    let result = match cli.command {
        Command::List => list::run(&global),
        Command::Run(ref args) => run::run(args, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}
