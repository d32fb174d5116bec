use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Procgen Developers",
    version,
    about = "procgen - build, modify and analyse molecular simulation configurations with procedural node graphs.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Number of worker threads nodes may use for per-molecule work.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a procedure and write the resulting configuration.
    Run(RunArgs),
    /// Read and validate a procedure without running it.
    Check(CheckArgs),
    /// Convert a procedure between the text and TOML forms.
    Convert(ConvertArgs),
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Procedure file (text, or TOML if the extension is `.toml`).
    #[arg(value_name = "PROCEDURE")]
    pub procedure: Option<PathBuf>,

    /// System file defining species and reference configurations.
    #[arg(short, long, value_name = "PATH")]
    pub system: Option<PathBuf>,

    /// Output XYZ file for the final configuration.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Directory to write published histograms into as CSV.
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Prefix under which nodes publish their data.
    #[arg(long, value_name = "PREFIX")]
    pub data_prefix: Option<String>,

    /// Reference configuration (from the system file) to start from.
    #[arg(long = "start", value_name = "NAME")]
    pub starting_configuration: Option<String>,

    /// Random seed for reproducible runs.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    /// Run configuration file in TOML format. Command-line flags take precedence.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Arguments for the `check` subcommand.
#[derive(Args, Debug)]
pub struct CheckArgs {
    #[arg(value_name = "PROCEDURE")]
    pub procedure: PathBuf,

    /// System file defining species and reference configurations.
    #[arg(short, long, value_name = "PATH")]
    pub system: Option<PathBuf>,
}

/// Arguments for the `convert` subcommand.
#[derive(Args, Debug)]
pub struct ConvertArgs {
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// System file defining species and reference configurations.
    #[arg(short, long, value_name = "PATH")]
    pub system: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_flags_parse() {
        let cli = Cli::parse_from([
            "procgen", "-vv", "-j", "4", "run", "gen.txt", "--system", "sys.toml", "--seed", "9",
            "--start", "Liquid",
        ]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.threads, Some(4));
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.procedure, Some(PathBuf::from("gen.txt")));
        assert_eq!(args.seed, Some(9));
        assert_eq!(args.starting_configuration.as_deref(), Some("Liquid"));
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["procgen", "-q", "-v", "check", "a.txt"]).is_err());
    }
}
