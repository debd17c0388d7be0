//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - resolves configuration from the environment
//! - runs the reporting cycle (fetch, normalize, aggregate)
//! - prints reports/plots
//! - writes optional exports

use clap::Parser;

use crate::cli::{Command, ExportArgs, ReportArgs};
use crate::domain::{DashConfig, FeedKind};
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `cvd` binary.
pub fn run() -> Result<(), AppError> {
    // We want `cvd` and `cvd -c Loveland` to behave like `cvd tui ...`.
    //
    // Clap requires a subcommand name, so we do a small, explicit rewrite of the
    // argv list before parsing. This preserves a clean clap structure while
    // retaining the requested UX.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    let config = DashConfig::from_env()?;

    match cli.command {
        Command::Report(args) => handle_report(&config, args, OutputMode::Full),
        Command::Cities(args) => handle_report(&config, args, OutputMode::CitiesOnly),
        Command::Export(args) => handle_export(&config, args),
        Command::Tui(args) => handle_tui(&config, args),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Full,
    CitiesOnly,
}

fn feed_kind(deaths: bool) -> FeedKind {
    if deaths { FeedKind::Deaths } else { FeedKind::Cases }
}

fn handle_report(config: &DashConfig, args: ReportArgs, mode: OutputMode) -> Result<(), AppError> {
    let run = pipeline::run_cycle(config, feed_kind(args.deaths), &args.cities)?;

    if mode == OutputMode::CitiesOnly {
        println!("{}", crate::report::format_top_cities(&run.views.top_cities, args.top));
        return Ok(());
    }

    print!("{}", crate::report::format_run_summary(&run));
    println!("{}", crate::report::format_top_cities(&run.views.top_cities, args.top));
    println!(
        "{}",
        crate::report::format_recent_daily(&run.views.cumulative, &run.views.daily_average, args.days)
    );
    println!(
        "{}",
        crate::report::format_histogram(
            &format!("Total {} by age range", run.kind.display_name()),
            &run.views.age_histogram
        )
    );
    println!(
        "{}",
        crate::report::format_histogram(
            &format!("Total {} by sex", run.kind.display_name()),
            &run.views.sex_histogram
        )
    );

    if !run.filter.is_empty() {
        println!("{}", crate::report::format_city_blocks(&run, args.days));
    }

    if args.plot {
        let plot = crate::plot::render_daily_plot(
            &run.views.daily,
            &run.views.daily_average,
            args.width,
            args.height,
        );
        println!("{plot}");
    }

    Ok(())
}

fn handle_export(config: &DashConfig, args: ExportArgs) -> Result<(), AppError> {
    let run = pipeline::run_cycle(config, feed_kind(args.deaths), &args.cities)?;

    if run.ingest.rows_used == 0 {
        return Err(AppError::empty(
            "No valid rows in the feed; nothing to export.",
        ));
    }

    crate::io::export::write_views_csv(&args.out, &run)?;
    if let Some(path) = &args.json {
        crate::io::export::write_views_json(path, &run)?;
    }

    println!(
        "Exported {} views to {} ({} rows).",
        run.kind.display_name(),
        args.out.display(),
        run.ingest.rows_used
    );
    Ok(())
}

fn handle_tui(config: &DashConfig, args: ReportArgs) -> Result<(), AppError> {
    crate::tui::run(config.clone(), args)
}

/// Rewrite argv so `cvd` defaults to `cvd tui`.
///
/// Rules:
/// - `cvd`                      -> `cvd tui`
/// - `cvd -c Loveland ...`      -> `cvd tui -c Loveland ...`
/// - `cvd --help/--version/-h`  -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("tui".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "report" | "cities" | "export" | "tui");
    if is_subcommand {
        return argv;
    }

    // If the first token is a flag, treat it as "tui flags".
    if arg1.starts_with('-') {
        argv.insert(1, "tui".to_string());
        return argv;
    }

    // Otherwise, leave as-is.
    argv
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_invocation_defaults_to_tui() {
        assert_eq!(rewrite_args(args(&["cvd"])), args(&["cvd", "tui"]));
    }

    #[test]
    fn leading_flag_defaults_to_tui() {
        assert_eq!(
            rewrite_args(args(&["cvd", "-c", "Loveland"])),
            args(&["cvd", "tui", "-c", "Loveland"])
        );
    }

    #[test]
    fn subcommands_and_help_are_untouched() {
        assert_eq!(
            rewrite_args(args(&["cvd", "report", "--plot"])),
            args(&["cvd", "report", "--plot"])
        );
        assert_eq!(rewrite_args(args(&["cvd", "--help"])), args(&["cvd", "--help"]));
    }
}
