//! Command-line parsing for the `epg` binary.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! normalization and indicator code.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::domain::Group;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "epg", version, about = "Regional case series normalizer and EPG indicator calculator")]
pub struct Cli {
    /// Log at debug level (`RUST_LOG` takes precedence).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Normalize raw sources, compute indicators, print a summary and optionally export.
    Run(RunArgs),
    /// Recompute indicators from a previously exported table (derived columns are ignored).
    Recompute(RecomputeArgs),
    /// Print the effective source configuration as TOML.
    Sources(ConfigArgs),
}

/// A `<group>=<path>` pair naming one raw source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceArg {
    pub group: Group,
    pub path: PathBuf,
}

fn parse_source_arg(s: &str) -> Result<SourceArg, String> {
    let (group, path) = s
        .split_once('=')
        .ok_or_else(|| format!("expected <group>=<csv path>, got '{s}'"))?;
    let group = group.trim();
    let path = path.trim();
    if group.is_empty() || path.is_empty() {
        return Err(format!("expected <group>=<csv path>, got '{s}'"));
    }
    Ok(SourceArg {
        group: Group::from(group),
        path: PathBuf::from(path),
    })
}

#[derive(Debug, Args, Clone)]
pub struct ConfigArgs {
    /// Pipeline config (TOML). Defaults to `$EPG_CONFIG`, then built-in sources.
    #[arg(long, value_name = "TOML")]
    pub config: Option<PathBuf>,
}

/// Selection and output options shared by `run` and `recompute`.
#[derive(Debug, Args, Clone)]
pub struct OutputArgs {
    /// First date to report (inclusive). Indicators still use earlier history.
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Last date to report (inclusive).
    #[arg(long)]
    pub end: Option<NaiveDate>,

    /// Only report this area.
    #[arg(long)]
    pub area: Option<String>,

    /// Only report this group.
    #[arg(long)]
    pub group: Option<String>,

    /// Show the top-N areas per group by recent incidence (0 disables).
    #[arg(long, default_value_t = 0)]
    pub top: usize,

    /// Window (days) used for the top-areas ranking.
    #[arg(long, default_value_t = 30)]
    pub last_days: u32,

    /// Export the selected rows (canonical + indicator columns) to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Export the selected rows to JSON.
    #[arg(long = "export-json")]
    pub export_json: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    /// Raw source, as `<group>=<csv path>` (repeatable).
    #[arg(long = "source", value_name = "GROUP=CSV", value_parser = parse_source_arg, required = true)]
    pub sources: Vec<SourceArg>,

    /// Population reference CSV (`group,area,population`). Overrides the config file.
    #[arg(long)]
    pub populations: Option<PathBuf>,

    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Args, Clone)]
pub struct RecomputeArgs {
    /// CSV previously written by `epg run --export`.
    #[arg(long, value_name = "CSV")]
    pub input: PathBuf,

    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}
