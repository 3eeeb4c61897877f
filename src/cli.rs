//! CLI argument parsing for the replay binary

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for replayed request reports
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable tables (default)
    Text,
    /// JSON report for machine parsing
    Json,
    /// CSV export of persisted samples
    Csv,
}

#[derive(Parser, Debug)]
#[command(name = "pulso")]
#[command(version)]
#[command(about = "Replay a recorded request event stream and report where the time went", long_about = None)]
pub struct Cli {
    /// Recorded request trace (JSON lines); reads stdin when omitted
    pub trace: Option<PathBuf>,

    /// Profiler configuration file (TOML)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Enable hook-level profiling with per-component attribution
    #[arg(long = "hooks")]
    pub hooks: bool,

    /// Override the configured sampling rate (percent, 0-100)
    #[arg(long = "sample-rate", value_name = "PCT")]
    pub sample_rate: Option<u8>,

    /// Number of slowest queries to show
    #[arg(short = 'n', long = "slowest", value_name = "N")]
    pub slowest: Option<usize>,

    /// Page URL recorded against the persisted sample
    #[arg(long = "page-url", default_value = "/")]
    pub page_url: String,

    /// Seed the sampling gate for reproducible runs
    #[arg(long = "seed", value_name = "SEED")]
    pub seed: Option<u64>,

    /// Enable debug logging to stderr
    #[arg(long = "debug")]
    pub debug: bool,
}
