use std::num::NonZeroUsize;
use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use covmerge::cli;
use covmerge::report::ParseOptions;

/// covmerge: merge llvm-cov HTML coverage reports into a side-by-side comparison.
#[derive(Parser)]
#[command(name = "covmerge", version, about)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Number of detail pages parsed in parallel (default: available cores).
    #[arg(long, global = true)]
    jobs: Option<NonZeroUsize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge two or more reports into a new output directory.
    Merge {
        /// Reports to merge, as NAME=PATH (PATH is the html report root).
        #[arg(required = true, num_args = 2.., value_parser = cli::parse_report_arg)]
        reports: Vec<(String, PathBuf)>,

        /// Output directory. Must not exist yet.
        #[arg(short, long)]
        output: PathBuf,

        /// Title shown on the merged pages.
        #[arg(long)]
        title: Option<String>,
    },

    /// Show the totals of a single report.
    Summary {
        /// Report root (the directory holding index.html).
        root: PathBuf,
    },

    /// List per-file coverage of a single report.
    Files {
        /// Report root.
        root: PathBuf,

        /// Sort by line coverage rate ascending (show worst files first).
        #[arg(long)]
        sort_by_coverage: bool,
    },

    /// Show uncovered lines and regions of one source file.
    Uncovered {
        /// Report root.
        root: PathBuf,

        /// The relative source path, as listed in the report index.
        source_file: String,
    },
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut options = ParseOptions::default();
    if let Some(jobs) = cli.jobs {
        options.jobs = jobs;
    }

    let output = match cli.command {
        Commands::Merge {
            reports,
            output,
            title,
        } => cli::cmd_merge(&reports, &output, title.as_deref(), &options)?,
        Commands::Summary { root } => cli::cmd_summary(&root, &options)?,
        Commands::Files {
            root,
            sort_by_coverage,
        } => cli::cmd_files(&root, sort_by_coverage, &options)?,
        Commands::Uncovered { root, source_file } => {
            cli::cmd_uncovered(&root, &source_file, &options)?
        }
    };
    print!("{output}");
    Ok(())
}
