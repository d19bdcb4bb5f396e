//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and installs logging
//! - loads the pipeline config and population reference data
//! - normalizes raw sources and computes indicators
//! - prints summaries and writes optional exports

use clap::Parser;

use crate::cli::{Command, ConfigArgs, OutputArgs, RecomputeArgs, RunArgs};
use crate::config::PipelineConfig;
use crate::domain::{Group, IndicatorRow};
use crate::error::AppError;
use crate::indicators::{IndicatorEngine, IndicatorTable};
use crate::report;

pub mod pipeline;

/// Entry point for the `epg` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();
    crate::logging::init(cli.verbose);

    match cli.command {
        Command::Run(args) => handle_run(args),
        Command::Recompute(args) => handle_recompute(args),
        Command::Sources(args) => handle_sources(args),
    }
}

fn load_config(args: &ConfigArgs) -> Result<PipelineConfig, AppError> {
    Ok(PipelineConfig::discover(args.config.as_deref())?)
}

fn handle_run(args: RunArgs) -> Result<(), AppError> {
    let mut config = load_config(&args.config)?;
    if let Some(path) = &args.populations {
        config.populations = Some(path.clone());
    }
    let populations = pipeline::load_populations(&config)?;

    let inputs: Vec<pipeline::SourceInput> = args
        .sources
        .iter()
        .map(|s| pipeline::SourceInput {
            group: s.group.clone(),
            path: s.path.clone(),
        })
        .collect();
    let run = pipeline::run_files(&config, &inputs, &populations)?;

    println!("{}", report::format_normalize_summary(&run.reports));
    for failure in &run.failures {
        eprintln!("source {} failed: {}", failure.group, failure.error);
    }

    if run.failures.len() == inputs.len() {
        // Nothing was computed; surface the first failure's exit code.
        if let Some(first) = run.failures.into_iter().next() {
            return Err(first.error.into());
        }
        return Ok(());
    }

    present(&config, &run.table, &args.output)?;

    if !run.failures.is_empty() {
        return Err(AppError::new(
            2,
            format!("{} of {} sources failed", run.failures.len(), inputs.len()),
        ));
    }
    Ok(())
}

fn handle_recompute(args: RecomputeArgs) -> Result<(), AppError> {
    let config = load_config(&args.config)?;
    let records = crate::io::read_canonical_csv(&args.input)?;
    let engine = IndicatorEngine::new(config.windows.clone())?;
    let table = engine.compute(&records);
    present(&config, &table, &args.output)
}

fn handle_sources(args: ConfigArgs) -> Result<(), AppError> {
    let config = load_config(&args)?;
    let text = toml::to_string_pretty(&config)
        .map_err(|e| AppError::new(2, format!("failed to render config: {e}")))?;
    println!("{text}");
    Ok(())
}

/// Select, print and export. Indicators are always computed on the full
/// history before any selection is applied.
fn present(config: &PipelineConfig, table: &IndicatorTable, output: &OutputArgs) -> Result<(), AppError> {
    let selected = select_rows(&table.rows, output);

    println!("{}", report::format_latest(&report::latest_by_area(&selected)));

    if output.top > 0 {
        for group in groups(&selected) {
            let Some(as_of) = report::last_date(&selected, &group) else {
                continue;
            };
            let exclude = config.source(group.as_str()).and_then(|s| s.aggregate_area.as_deref());
            let top = report::top_areas(&selected, &group, exclude, as_of, output.last_days, output.top);
            println!("{}", report::format_top_areas(&group, output.last_days, &top));
        }
    }

    let issues = report::format_issues(&table.issues);
    if !issues.is_empty() {
        eprint!("{issues}");
    }

    if let Some(path) = &output.export {
        crate::io::write_indicator_csv(path, &selected)?;
    }
    if let Some(path) = &output.export_json {
        crate::io::write_indicator_json(path, &selected)?;
    }
    Ok(())
}

fn select_rows(rows: &[IndicatorRow], output: &OutputArgs) -> Vec<IndicatorRow> {
    let mut selected = report::select_period(rows, output.start, output.end);
    if let Some(group) = &output.group {
        let group = Group::from(group.as_str());
        selected.retain(|r| r.record.group == group);
    }
    if let Some(area) = &output.area {
        selected = report::select_area(&selected, area, None);
    }
    selected
}

fn groups(rows: &[IndicatorRow]) -> Vec<Group> {
    let mut groups: Vec<Group> = rows.iter().map(|r| r.record.group.clone()).collect();
    groups.sort();
    groups.dedup();
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use crate::domain::CaseRecord;

    fn row(group: &str, area: &str, d: u32) -> IndicatorRow {
        IndicatorRow {
            record: CaseRecord::new(
                Group::from(group),
                area,
                NaiveDate::from_ymd_opt(2020, 10, d).unwrap(),
                1,
            ),
            confirmed_rolling_mean: 0.0,
            confirmed_rolling_sum: 0.0,
            rho: 0.0,
            rho_7: 0.0,
            ia_14: 0.0,
            epg: 0.0,
        }
    }

    fn output() -> OutputArgs {
        OutputArgs {
            start: None,
            end: None,
            area: None,
            group: None,
            top: 0,
            last_days: 30,
            export: None,
            export_json: None,
        }
    }

    #[test]
    fn selection_combines_group_area_and_period() {
        let rows = vec![
            row("cat-comarques", "Osona", 1),
            row("cat-comarques", "Osona", 2),
            row("cat-comarques", "Aran", 2),
            row("gre-nomoi", "Osona", 2),
        ];
        let mut out = output();
        out.start = NaiveDate::from_ymd_opt(2020, 10, 2);
        out.group = Some("cat-comarques".to_string());
        out.area = Some("Osona".to_string());

        let selected = select_rows(&rows, &out);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].record.area, "Osona");
        assert_eq!(selected[0].record.group.as_str(), "cat-comarques");

        assert_eq!(groups(&rows).len(), 2);
    }
}
