//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use contracts::ClusterImplementation;
use std::path::PathBuf;

/// user-migrate - move user documents into a relational store with a worker pool
#[derive(Parser, Debug)]
#[command(
    name = "user-migrate",
    author,
    version,
    about = "Clustered user migration",
    long_about = "Reads user documents page by page, dispatches every page round-robin to a \n\
                  fixed pool of workers (processes, threads or cooperative tasks), and \n\
                  lets each worker insert its batches into the configured sink."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "USER_MIGRATE_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "compact",
        global = true,
        env = "USER_MIGRATE_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn log_settings(&self) -> LogSettings {
        LogSettings {
            format: self.log_format,
            verbose: self.verbose,
            quiet: self.quiet,
        }
    }
}

/// Global logging flags, as parsed and as handed down to worker processes
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSettings {
    pub format: LogFormat,
    pub verbose: u8,
    pub quiet: bool,
}

impl LogSettings {
    /// Level used when `RUST_LOG` is unset
    pub fn default_level(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    /// Global flags reproducing these settings on a child command line
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec!["--log-format".to_string(), self.format.as_str().to_string()];
        if self.quiet {
            args.push("--quiet".to_string());
        } else if self.verbose > 0 {
            args.push(format!("-{}", "v".repeat(usize::from(self.verbose))));
        }
        args
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the migration
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Run the migration once per cluster implementation and compare timings
    Bench(BenchArgs),

    /// Write synthetic user documents as JSON lines
    Seed(SeedArgs),

    /// Serve one worker of a process cluster over stdin/stdout
    #[command(hide = true)]
    Worker(WorkerArgs),
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Run(_) => "run",
            Self::Validate(_) => "validate",
            Self::Bench(_) => "bench",
            Self::Seed(_) => "seed",
            Self::Worker(_) => "worker",
        }
    }
}

/// Cluster and source overrides shared by `run` and `bench`
#[derive(Parser, Debug, Clone, Default)]
pub struct Overrides {
    /// Override the number of workers
    #[arg(long, env = "USER_MIGRATE_CLUSTER_SIZE")]
    pub cluster_size: Option<usize>,

    /// Override the records fetched per page
    #[arg(long, env = "USER_MIGRATE_PAGE_SIZE")]
    pub page_size: Option<usize>,

    /// Override the expected total used for progress
    #[arg(long)]
    pub total_records: Option<u64>,

    /// Write into process memory instead of the configured sink
    #[arg(long)]
    pub dry_run: bool,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "migrate.toml",
        env = "USER_MIGRATE_CONFIG"
    )]
    pub config: PathBuf,

    /// Override the cluster implementation (multiprocessing, threading, asyncio)
    #[arg(long, env = "USER_MIGRATE_IMPLEMENTATION")]
    pub implementation: Option<ClusterImplementation>,

    #[command(flatten)]
    pub overrides: Overrides,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "USER_MIGRATE_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "migrate.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `bench` command
#[derive(Parser, Debug, Clone)]
pub struct BenchArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "migrate.toml",
        env = "USER_MIGRATE_CONFIG"
    )]
    pub config: PathBuf,

    /// Where to write the JSON results
    #[arg(short, long, default_value = "benchmark_results.json")]
    pub output: PathBuf,

    /// Seconds to wait between two runs
    #[arg(long, default_value = "2")]
    pub pause_secs: u64,

    #[command(flatten)]
    pub overrides: Overrides,
}

/// Arguments for the `seed` command
#[derive(Parser, Debug)]
pub struct SeedArgs {
    /// JSON-lines file to write
    #[arg(short, long, default_value = "users.jsonl")]
    pub output: PathBuf,

    /// Number of users to generate
    #[arg(short = 'n', long, default_value = "10000")]
    pub count: usize,

    /// RNG seed, for reproducible data sets
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Arguments for the hidden `worker` command
#[derive(Parser, Debug)]
pub struct WorkerArgs {
    /// Configuration file of the parent run
    #[arg(short, long)]
    pub config: PathBuf,

    /// Zero-based worker index
    #[arg(long)]
    pub worker: usize,

    /// Write into process memory instead of the configured sink
    #[arg(long)]
    pub dry_run: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    Pretty,
    /// Compact single-line format
    #[default]
    Compact,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Pretty => "pretty",
            Self::Compact => "compact",
        }
    }
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_overrides_parse() {
        let cli = Cli::try_parse_from([
            "user-migrate",
            "run",
            "--config",
            "m.toml",
            "--implementation",
            "Threading",
            "--cluster-size",
            "4",
            "--page-size",
            "2",
            "--dry-run",
        ])
        .unwrap();

        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.config, PathBuf::from("m.toml"));
        assert_eq!(args.implementation, Some(ClusterImplementation::Threading));
        assert_eq!(args.overrides.cluster_size, Some(4));
        assert_eq!(args.overrides.page_size, Some(2));
        assert!(args.overrides.dry_run);
    }

    #[test]
    fn test_unknown_implementation_rejected() {
        let result = Cli::try_parse_from(["user-migrate", "run", "--implementation", "fibers"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_worker_command_takes_global_flags_first() {
        let cli = Cli::try_parse_from([
            "user-migrate",
            "--log-format",
            "json",
            "worker",
            "--config",
            "m.toml",
            "--worker",
            "3",
        ])
        .unwrap();

        assert!(matches!(cli.log_format, LogFormat::Json));
        let Commands::Worker(args) = cli.command else {
            panic!("expected worker");
        };
        assert_eq!(args.worker, 3);
        assert!(!args.dry_run);
    }

    #[test]
    fn test_log_settings_survive_a_round_trip_through_args() {
        for flags in [vec![], vec!["-q"], vec!["-vv"], vec!["--verbose"]] {
            let mut argv = vec!["user-migrate"];
            argv.extend(flags.iter().copied());
            argv.extend(["--log-format", "json", "seed", "--output", "u.jsonl"]);
            let parent = Cli::try_parse_from(argv).unwrap().log_settings();

            let mut child = vec!["user-migrate".to_string()];
            child.extend(parent.to_args());
            child.extend(["worker", "--config", "m.toml", "--worker", "0"].map(String::from));
            let inherited = Cli::try_parse_from(child).unwrap().log_settings();

            assert_eq!(inherited.default_level(), parent.default_level());
            assert!(matches!(inherited.format, LogFormat::Json));
        }
    }
}
