//! arch-guard CLI tool.
//!
//! Usage:
//! ```bash
//! arch-guard check [OPTIONS] [PATH]
//! arch-guard watch [PATH]
//! arch-guard fix [--dry-run] [PATH]
//! arch-guard stats [--days N] [PATH]
//! arch-guard presets [NAME]
//! arch-guard init [--preset NAME]
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config_resolver;

/// Layered-architecture import guard for TypeScript and JavaScript projects
#[derive(Parser)]
#[command(name = "arch-guard")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Preset to enforce (overrides the configuration file)
    #[arg(short, long, global = true, env = "ARCH_GUARD_PRESET")]
    preset: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a source tree once
    Check {
        /// Path to analyze (default: current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        /// Strict mode: warnings fail the check as well
        #[arg(long)]
        ci: bool,

        /// Append a scan record to the statistics store
        #[arg(long)]
        record: bool,
    },

    /// Watch a source tree and re-check changed files
    Watch {
        /// Path to watch (default: current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Debounce window in milliseconds (overrides the configuration file)
        #[arg(long)]
        debounce_ms: Option<u64>,
    },

    /// Apply mechanical corrections, keeping them only if the tree verifies
    Fix {
        /// Path to correct (default: current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Only list the corrections that would be applied
        #[arg(long)]
        dry_run: bool,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show the violation trend and per-boundary statistics
    Stats {
        /// Project root (default: current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Trailing window in days
        #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(i64).range(0..))]
        days: i64,

        /// Also check the tree and break violations down by layer boundary
        #[arg(long)]
        layers: bool,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// List available presets, or show one preset's hierarchy
    Presets {
        /// Preset to describe
        name: Option<String>,
    },

    /// Initialize configuration file
    Init {
        /// Overwrite existing config
        #[arg(long)]
        force: bool,
    },
}

/// Output format for guard results.
#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output.
    Json,
    /// One-line-per-violation compact format.
    Compact,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let options = commands::GlobalOptions {
        config: cli.config,
        preset: cli.preset,
    };

    match cli.command {
        Commands::Check {
            path,
            format,
            ci,
            record,
        } => commands::check::run(&path, format, ci, record, &options),
        Commands::Watch { path, debounce_ms } => commands::watch::run(&path, debounce_ms, &options),
        Commands::Fix {
            path,
            dry_run,
            format,
        } => commands::fix::run(&path, dry_run, format, &options),
        Commands::Stats {
            path,
            days,
            layers,
            format,
        } => commands::stats::run(&path, days, layers, format, &options),
        Commands::Presets { name } => commands::presets::run(name.as_deref(), &options),
        Commands::Init { force } => commands::init::run(force, options.preset.as_deref()),
    }
}
