//! Command-line parsing for the county dashboard.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the normalization/aggregation code.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "cvd", version, about = "County COVID-19 case dashboard (terminal)")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch the latest data, print summary tables, and optionally plot.
    Report(ReportArgs),
    /// Print the top-by-city table only (useful for scripting).
    Cities(ReportArgs),
    /// Export every aggregate view to CSV files (and optionally a JSON bundle).
    Export(ExportArgs),
    /// Launch the interactive TUI.
    ///
    /// This uses the same underlying reporting cycle as `cvd report`, but
    /// renders the views as charts in a terminal UI using Ratatui.
    Tui(ReportArgs),
}

/// Common options for reporting and the TUI.
#[derive(Debug, Parser, Clone)]
pub struct ReportArgs {
    /// Restrict views to a city (repeatable). Empty means county-wide.
    #[arg(short = 'c', long = "city", value_name = "CITY")]
    pub cities: Vec<String>,

    /// Use the deaths feed instead of the cases feed.
    #[arg(long)]
    pub deaths: bool,

    /// Show top-N cities.
    #[arg(long, default_value_t = 15)]
    pub top: usize,

    /// Trailing days shown in daily tables.
    #[arg(long, default_value_t = 14)]
    pub days: usize,

    /// Render an ASCII chart of the daily series.
    #[arg(long)]
    pub plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,
}

/// Options for exporting views.
#[derive(Debug, Parser)]
pub struct ExportArgs {
    /// Output directory for the CSV files.
    #[arg(long, value_name = "DIR")]
    pub out: PathBuf,

    /// Also write a single JSON bundle of all views.
    #[arg(long, value_name = "JSON")]
    pub json: Option<PathBuf>,

    /// Restrict views to a city (repeatable). Empty means county-wide.
    #[arg(short = 'c', long = "city", value_name = "CITY")]
    pub cities: Vec<String>,

    /// Use the deaths feed instead of the cases feed.
    #[arg(long)]
    pub deaths: bool,
}
