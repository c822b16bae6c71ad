//! simbox CLI: sandboxed HDL simulation from the command line.
//!
//! Provides `simbox run` to simulate local source files, `simbox request` to
//! serve one JSON request body, `simbox detect`, `simbox harness` and
//! `simbox wave` to inspect individual steps, and `simbox doctor` to report
//! on the installed toolchain.

#![warn(missing_docs)]

mod context;
mod doctor;
mod inspect;
mod run;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

/// simbox: compile, run, and trace HDL designs in disposable sandboxes.
#[derive(Parser, Debug)]
#[command(name = "simbox", version, about = "Sandboxed HDL simulation")]
pub struct Cli {
    /// Only log warnings and errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a `simbox.toml` file, or a directory containing one.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Simulate source files and print the JSON result.
    Run(RunArgs),
    /// Simulate a JSON request body and print the JSON response.
    Request(RequestArgs),
    /// Report the source features that shape the harness and compiler flags.
    Detect(DetectArgs),
    /// Print the generated C++ harness.
    Harness(HarnessArgs),
    /// Parse a VCD file and print its signal timelines.
    Wave(WaveArgs),
    /// Report the discovered toolchain.
    Doctor(DoctorArgs),
}

/// Arguments for the `simbox run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Source files, staged under their file names in the given order.
    #[arg(required = true, num_args = 1..)]
    pub files: Vec<PathBuf>,

    /// Top-level module (default from config, normally `tb_top`).
    #[arg(long)]
    pub top: Option<String>,

    /// Leave the raw VCD text out of the result.
    #[arg(long)]
    pub no_raw_trace: bool,

    /// Pretty-print the JSON result.
    #[arg(long)]
    pub pretty: bool,
}

/// Arguments for the `simbox request` subcommand.
#[derive(Parser, Debug)]
pub struct RequestArgs {
    /// JSON request file; `-` or omitted reads standard input.
    pub input: Option<String>,

    /// Pretty-print the JSON response.
    #[arg(long)]
    pub pretty: bool,
}

/// Arguments for the `simbox detect` subcommand.
#[derive(Parser, Debug)]
pub struct DetectArgs {
    /// Source files to classify.
    #[arg(required = true, num_args = 1..)]
    pub files: Vec<PathBuf>,

    /// Top-level module checked for a clock port.
    #[arg(long)]
    pub top: Option<String>,
}

/// Arguments for the `simbox harness` subcommand.
#[derive(Parser, Debug)]
pub struct HarnessArgs {
    /// Top-level module the harness instantiates.
    #[arg(long)]
    pub top: Option<String>,

    /// Drive the top module's `clk` input.
    #[arg(long)]
    pub clock: bool,

    /// Iteration ceiling (default from config).
    #[arg(long)]
    pub max_steps: Option<u64>,
}

/// Arguments for the `simbox wave` subcommand.
#[derive(Parser, Debug)]
pub struct WaveArgs {
    /// The VCD file to parse.
    pub file: PathBuf,

    /// Pretty-print the JSON signal map.
    #[arg(long)]
    pub pretty: bool,
}

/// Arguments for the `simbox doctor` subcommand.
#[derive(Parser, Debug)]
pub struct DoctorArgs {
    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to restrict logging to warnings and errors.
    pub quiet: bool,
    /// Whether to log debug information.
    pub verbose: bool,
    /// Optional path to a config file or directory.
    pub config: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        config: cli.config,
    };
    init_tracing(&global);

    let result = match cli.command {
        Command::Run(ref args) => run::run(args, &global),
        Command::Request(ref args) => run::request(args, &global),
        Command::Detect(ref args) => inspect::detect(args, &global),
        Command::Harness(ref args) => inspect::harness(args, &global),
        Command::Wave(ref args) => inspect::wave(args),
        Command::Doctor(ref args) => doctor::run(args, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

/// Default log filter for the global flags; `RUST_LOG` takes precedence.
fn default_filter(global: &GlobalArgs) -> &'static str {
    if global.verbose {
        "debug"
    } else if global.quiet {
        "warn"
    } else {
        "info"
    }
}

/// Logs go to stderr so JSON on stdout stays machine-readable.
fn init_tracing(global: &GlobalArgs) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(global).into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
