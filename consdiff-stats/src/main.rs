use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::Level;

mod commands;

use commands::{analyze::run_analyze, list::run_list};
use consensus_reader::{MalformedPolicy, ParseOptions, document::DEFAULT_AUX_MARKER};
use diffstats_model::{CostModel, SweepConfig, estimator, sweep};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "consdiff-stats")]
#[command(
    about = "Estimate consensus diff and microdescriptor download savings from archived consensuses"
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log progress every N consensuses (0 disables)
    #[arg(long, default_value_t = 1000, global = true)]
    progress_every: u64,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest archives and sweep retention depth x diff interval
    Analyze {
        #[command(flatten)]
        input: InputArgs,

        /// Largest retention depth in hours
        #[arg(long, default_value_t = sweep::MAX_KEEP, value_parser = parse_hours)]
        max_keep: usize,

        /// Largest diff interval in hours
        #[arg(long, default_value_t = sweep::MAX_INTERVAL, value_parser = parse_hours)]
        max_interval: usize,

        /// Framing bytes added per relay entry in a diff
        #[arg(long, default_value_t = estimator::ADD_OVERHEAD)]
        add_overhead: f64,

        /// Bytes per relay removed by a diff
        #[arg(long, default_value_t = estimator::REMOVE_COST)]
        remove_cost: f64,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Print one line per consensus, in time order
    List {
        #[command(flatten)]
        input: InputArgs,
    },
}

#[derive(Args, Debug, Clone)]
pub(crate) struct InputArgs {
    /// Consensus archives (.tar.xz, .tar.bz2, .tar.gz, .tar.zst or .tar)
    #[arg(value_name = "ARCHIVE")]
    pub(crate) archives: Vec<PathBuf>,

    /// Directory searched when no archive is given
    #[arg(long, default_value = ".")]
    pub(crate) dir: PathBuf,

    /// File name pattern used when searching --dir
    #[arg(long, default_value = "consensuses-*.tar.*")]
    pub(crate) pattern: String,

    /// Path marker identifying microdescriptor entries
    #[arg(long, default_value = DEFAULT_AUX_MARKER)]
    pub(crate) aux_marker: String,

    /// Skip relays with short r/m lines instead of aborting
    #[arg(long)]
    pub(crate) lenient: bool,
}

impl InputArgs {
    pub(crate) fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            malformed: if self.lenient {
                MalformedPolicy::Skip
            } else {
                MalformedPolicy::Fail
            },
            aux_marker: self.aux_marker.clone(),
        }
    }
}

fn parse_hours(s: &str) -> std::result::Result<usize, String> {
    let hours: usize = s.parse().map_err(|e| format!("{e}"))?;
    if hours > sweep::HOURS_LIMIT {
        return Err(format!("must be at most {}", sweep::HOURS_LIMIT));
    }
    Ok(hours)
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Analyze {
            input,
            max_keep,
            max_interval,
            add_overhead,
            remove_cost,
            format,
        } => {
            let config = SweepConfig {
                max_keep,
                max_interval,
                cost: CostModel {
                    add_overhead,
                    remove_cost,
                },
            };
            run_analyze(&input, config, format, cli.progress_every)
        }
        Commands::List { input } => run_list(&input, cli.progress_every),
    }
}
