//! Shared "raw sources -> indicators" workflow.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! read raw CSVs -> normalize per source -> attach populations -> indicators
//!
//! The binary can then focus on presentation (printing vs exporting).

use std::path::PathBuf;

use tracing::{error, info};

use crate::config::PipelineConfig;
use crate::domain::{CaseRecord, Group};
use crate::error::PipelineError;
use crate::indicators::{IndicatorEngine, IndicatorTable};
use crate::io::ingest::{RawTable, read_raw_csv};
use crate::normalize::{NormalizeReport, Normalizer};
use crate::population::{PopulationTable, fill_aggregate_population};

/// One raw source file to normalize.
#[derive(Debug, Clone)]
pub struct SourceInput {
    pub group: Group,
    pub path: PathBuf,
}

/// A source whose normalization was aborted.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFailure {
    pub group: Group,
    pub error: PipelineError,
}

/// All computed outputs of a single run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub reports: Vec<NormalizeReport>,
    pub failures: Vec<SourceFailure>,
    /// Combined canonical table (all groups) with populations attached.
    pub records: Vec<CaseRecord>,
    pub table: IndicatorTable,
}

/// Read every source file and run the pipeline.
///
/// A file that cannot be read counts as a failure of that source only.
pub fn run_files(
    config: &PipelineConfig,
    inputs: &[SourceInput],
    populations: &PopulationTable,
) -> Result<RunOutput, PipelineError> {
    let mut tables = Vec::with_capacity(inputs.len());
    let mut read_failures = Vec::new();
    for input in inputs {
        match read_raw_csv(&input.path, input.group.as_str()) {
            Ok(table) => tables.push((input.group.clone(), table)),
            Err(err) => {
                error!(group = %input.group, %err, "failed to read source");
                read_failures.push(SourceFailure {
                    group: input.group.clone(),
                    error: err,
                });
            }
        }
    }

    let mut output = run_tables(config, &tables, populations)?;
    read_failures.append(&mut output.failures);
    output.failures = read_failures;
    Ok(output)
}

/// Normalize raw tables (one per group), attach populations and compute indicators.
///
/// A structural failure in one source aborts that source only; it is returned
/// in `RunOutput::failures` while the other sources are still computed. An
/// unknown group or an invalid engine configuration aborts the run.
pub fn run_tables(
    config: &PipelineConfig,
    tables: &[(Group, RawTable)],
    populations: &PopulationTable,
) -> Result<RunOutput, PipelineError> {
    let engine = IndicatorEngine::new(config.windows.clone())?;

    let mut reports = Vec::new();
    let mut failures = Vec::new();
    let mut records = Vec::new();

    for (group, raw) in tables {
        let source = config
            .source(group.as_str())
            .ok_or_else(|| PipelineError::Config(format!("no source configured for group `{group}`")))?;
        let normalizer = Normalizer::new(source.clone())?;

        match normalizer.normalize(raw) {
            Ok(normalized) => {
                records.extend(normalized.records);
                reports.push(normalized.report);
            }
            Err(err) => {
                error!(group = %group, %err, "normalization failed");
                failures.push(SourceFailure {
                    group: group.clone(),
                    error: err,
                });
            }
        }
    }

    let mut records = populations.attach(records);
    for report in &reports {
        let Some(source) = report.group.as_ref().and_then(|g| config.source(g.as_str())) else {
            continue;
        };
        if let (true, Some(aggregate)) = (source.synthesize_aggregate, source.aggregate_area.as_deref()) {
            records = fill_aggregate_population(records, &source.group, aggregate);
        }
    }
    let table = engine.compute(&records);

    info!(
        sources = tables.len(),
        failed = failures.len(),
        rows = table.rows.len(),
        "pipeline finished"
    );

    Ok(RunOutput {
        reports,
        failures,
        records,
        table,
    })
}

/// Load the population table named by the config, or an empty one.
pub fn load_populations(config: &PipelineConfig) -> Result<PopulationTable, PipelineError> {
    match &config.populations {
        Some(path) => PopulationTable::load(path),
        None => Ok(PopulationTable::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GROUP_CAT_COMARQUES, GROUP_GRE_PERIFERIES};
    use crate::io::ingest::read_raw_from_reader;

    fn cat_table() -> RawTable {
        let mut csv = String::from("TipusCasData,ComarcaDescripcio,TipusCasDescripcio,NumCasos\n");
        for d in 1..=14 {
            csv.push_str(&format!("{d:02}/10/2020,Osona,Positiu PCR,10\n"));
            csv.push_str(&format!("{d:02}/10/2020,Osona,Sospitós,3\n"));
        }
        read_raw_from_reader(csv.as_bytes(), GROUP_CAT_COMARQUES).unwrap()
    }

    fn populations() -> PopulationTable {
        let mut table = PopulationTable::new();
        table.insert(Some(&Group::from(GROUP_CAT_COMARQUES)), "Osona", 100_000);
        table
    }

    #[test]
    fn end_to_end_catalan_source() {
        let config = PipelineConfig::default();
        let tables = vec![(Group::from(GROUP_CAT_COMARQUES), cat_table())];
        let out = run_tables(&config, &tables, &populations()).unwrap();

        assert!(out.failures.is_empty());
        assert_eq!(out.reports[0].dropped_total(), 14);

        let group = Group::from(GROUP_CAT_COMARQUES);
        let osona: Vec<_> = out.table.area_rows(&group, "Osona").collect();
        assert_eq!(osona.len(), 14);
        let last = osona[13];
        assert_eq!(last.ia_14, 140.0);
        assert!((last.epg - 140.0).abs() < 1e-9);

        // Osona is the only comarca, so the aggregate inherits its population.
        let total: Vec<_> = out.table.area_rows(&group, "Catalunya").collect();
        assert_eq!(total.len(), 14);
        assert_eq!(total[13].record.population, Some(100_000));
        assert!((total[13].epg - 140.0).abs() < 1e-9);
        assert!(!out.table.issues.iter().any(|i| i.area == "Catalunya"));
    }

    #[test]
    fn aggregate_population_stays_unknown_when_an_area_lacks_one() {
        let config = PipelineConfig::default();
        let mut csv = String::from("TipusCasData,ComarcaDescripcio,TipusCasDescripcio,NumCasos\n");
        csv.push_str("01/10/2020,Osona,Positiu PCR,10\n");
        csv.push_str("01/10/2020,Moianès,Positiu PCR,2\n");
        let raw = read_raw_from_reader(csv.as_bytes(), GROUP_CAT_COMARQUES).unwrap();
        let tables = vec![(Group::from(GROUP_CAT_COMARQUES), raw)];
        let out = run_tables(&config, &tables, &populations()).unwrap();

        let group = Group::from(GROUP_CAT_COMARQUES);
        let total: Vec<_> = out.table.area_rows(&group, "Catalunya").collect();
        assert_eq!(total[0].record.population, None);
        assert_eq!(total[0].record.confirmed, 12);
        assert!(out.table.issues.iter().any(|i| i.area == "Catalunya"));
    }

    #[test]
    fn one_broken_source_does_not_stop_the_others() {
        let config = PipelineConfig::default();
        let broken = read_raw_from_reader(
            "date,region,total_cases\n2020/10/01,Attica,5\n".as_bytes(),
            GROUP_GRE_PERIFERIES,
        )
        .unwrap();
        let tables = vec![
            (Group::from(GROUP_GRE_PERIFERIES), broken),
            (Group::from(GROUP_CAT_COMARQUES), cat_table()),
        ];
        let out = run_tables(&config, &tables, &populations()).unwrap();

        assert_eq!(out.failures.len(), 1);
        assert!(matches!(out.failures[0].error, PipelineError::MalformedSourceData { .. }));
        assert_eq!(out.reports.len(), 1);
        assert!(!out.table.rows.is_empty());
    }

    #[test]
    fn unknown_group_is_a_config_error() {
        let config = PipelineConfig::default();
        let tables = vec![(Group::from("esp-ccaa"), cat_table())];
        assert!(matches!(
            run_tables(&config, &tables, &PopulationTable::new()).unwrap_err(),
            PipelineError::Config(_)
        ));
    }

    #[test]
    fn unreadable_file_is_a_source_failure() {
        let config = PipelineConfig::default();
        let inputs = vec![SourceInput {
            group: Group::from(GROUP_CAT_COMARQUES),
            path: PathBuf::from("/nonexistent/cat.csv"),
        }];
        let out = run_files(&config, &inputs, &PopulationTable::new()).unwrap();
        assert_eq!(out.failures.len(), 1);
        assert!(matches!(out.failures[0].error, PipelineError::Io { .. }));
        assert!(out.table.rows.is_empty());
    }
}
