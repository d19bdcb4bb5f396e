//! Raw source table -> canonical `CaseRecord`s.
//!
//! One `Normalizer` handles every source; what differs between sources
//! (column names, date format, layout, running totals vs daily counts,
//! case-type allow-list, aggregate area) lives in its `SourceConfig`.
//!
//! Steps, in order:
//!
//! 1. select the date / area / value (+ parent, population) columns
//! 2. parse dates with the source's exact format
//! 3. cleanse area names so one logical area yields one key
//! 4. sum rows sharing the same (date, area)
//! 5. difference running totals into daily counts (cumulative sources only)
//! 6. optionally synthesize the aggregate area
//! 7. fill every area's date range so it has no missing days
//! 8. tag rows with the group and sort by (area, date)

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::config::{Layout, SourceConfig};
use crate::domain::{CaseRecord, Group};
use crate::error::PipelineError;
use crate::io::ingest::{RawRow, RawTable};

pub mod cleanse;
pub mod series;

pub use cleanse::*;
pub use series::*;

/// What happened while normalizing one source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub group: Option<Group>,
    pub rows_read: usize,
    /// Observations that survived filtering (before duplicate merging).
    pub observations: usize,
    pub blank_values: usize,
    /// Rows dropped because their case-type tag is not in the allow-list.
    pub dropped_classifications: BTreeMap<String, usize>,
    /// Raw rows carrying the aggregate area's name, discarded in favour of the synthesized sum.
    pub discarded_aggregate_rows: usize,
    pub duplicates_merged: usize,
    pub negative_deltas_clamped: usize,
    pub aggregate_rows: usize,
    pub gap_rows_filled: usize,
    pub areas: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

impl NormalizeReport {
    pub fn dropped_total(&self) -> usize {
        self.dropped_classifications.values().sum()
    }
}

/// Normalizer output: canonical rows sorted by (area, date) + report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub records: Vec<CaseRecord>,
    pub report: NormalizeReport,
}

/// A single parsed raw observation.
#[derive(Debug, Clone)]
struct Observation {
    line: usize,
    date: NaiveDate,
    area: String,
    parents: Vec<String>,
    population: Option<u64>,
    value: i64,
}

/// Resolved raw column indices for one table.
#[derive(Debug, Clone)]
struct ColumnPlan {
    area: usize,
    parents: Vec<usize>,
    population: Option<usize>,
    classification: Option<usize>,
    /// Long layout: date + value columns.
    long: Option<(usize, usize)>,
    /// Wide layout: (column, date) for every date header.
    wide: Vec<(usize, NaiveDate)>,
}

/// Generic, configuration-driven normalizer.
#[derive(Debug, Clone)]
pub struct Normalizer {
    config: SourceConfig,
}

impl Normalizer {
    pub fn new(config: SourceConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Normalize one raw table into canonical rows for this source's group.
    pub fn normalize(&self, raw: &RawTable) -> Result<Normalized, PipelineError> {
        let group = self.config.group.clone();
        let mut report = NormalizeReport {
            group: Some(group.clone()),
            rows_read: raw.rows.len(),
            ..Default::default()
        };

        if raw.is_empty() {
            return self.empty_or_error(raw, report);
        }

        let plan = self.resolve_columns(raw)?;
        let observations = match self.config.layout {
            Layout::Long => self.extract_long(raw, &plan, &mut report)?,
            Layout::Wide => self.extract_wide(raw, &plan, &mut report)?,
        };
        report.observations = observations.len();

        for (tag, count) in &report.dropped_classifications {
            warn!(source = %raw.source, tag = %tag, rows = count, "dropped rows with unknown case classification");
        }
        if report.discarded_aggregate_rows > 0 {
            warn!(
                source = %raw.source,
                rows = report.discarded_aggregate_rows,
                "discarded raw rows named after the aggregate area"
            );
        }

        if observations.is_empty() {
            warn!(source = %raw.source, rows_read = report.rows_read, "no usable observations");
            return self.empty_or_error(raw, report);
        }

        let totals = merge_duplicates(&raw.source, observations, &mut report)?;
        let mut daily = self.to_daily(&raw.source, totals, &mut report)?;
        if report.negative_deltas_clamped > 0 {
            warn!(
                source = %raw.source,
                count = report.negative_deltas_clamped,
                "clamped negative daily counts to 0"
            );
        }

        if self.config.synthesize_aggregate {
            if let Some(name) = self.config.aggregate_area.as_deref() {
                let aggregate = synthesize_aggregate(&daily);
                report.aggregate_rows = aggregate.counts.len();
                daily.insert(clean_identifier(name), aggregate);
            }
        }

        let records = self.fill_and_tag(daily, &mut report);

        info!(
            group = %group,
            rows_read = report.rows_read,
            records = records.len(),
            areas = report.areas,
            dropped = report.dropped_total(),
            gaps_filled = report.gap_rows_filled,
            "normalized source"
        );

        Ok(Normalized { records, report })
    }

    fn empty_or_error(&self, raw: &RawTable, report: NormalizeReport) -> Result<Normalized, PipelineError> {
        if self.config.allow_empty {
            info!(source = %raw.source, "source is empty (allowed)");
            return Ok(Normalized {
                records: Vec::new(),
                report,
            });
        }
        Err(PipelineError::EmptyInput {
            source_name: raw.source.clone(),
        })
    }

    fn resolve_columns(&self, raw: &RawTable) -> Result<ColumnPlan, PipelineError> {
        let cfg = &self.config;
        let required = |name: &str| {
            raw.column(name)
                .ok_or_else(|| PipelineError::malformed(&raw.source, 1, format!("missing required column `{name}`")))
        };

        let area = required(cfg.area_column.as_str())?;
        let parents = cfg
            .parent_columns
            .iter()
            .map(|c| required(c.as_str()))
            .collect::<Result<Vec<_>, _>>()?;
        let population = cfg.population_column.as_deref().map(|c| required(c)).transpose()?;

        let classification = match &cfg.classification {
            Some(c) => Some(raw.column(&c.column).ok_or_else(|| PipelineError::UnknownClassificationSchema {
                source_name: raw.source.clone(),
                column: c.column.clone(),
            })?),
            None => None,
        };

        let mut plan = ColumnPlan {
            area,
            parents,
            population,
            classification,
            long: None,
            wide: Vec::new(),
        };

        match cfg.layout {
            Layout::Long => {
                let date_col = cfg.date_column.as_deref().unwrap_or_default();
                let value_col = cfg.value_column.as_deref().unwrap_or_default();
                plan.long = Some((required(date_col)?, required(value_col)?));
            }
            Layout::Wide => {
                let id_columns: Vec<usize> = std::iter::once(plan.area)
                    .chain(plan.parents.iter().copied())
                    .chain(plan.population)
                    .chain(plan.classification)
                    .collect();
                plan.wide = raw
                    .headers
                    .iter()
                    .enumerate()
                    .filter(|(idx, _)| !id_columns.contains(idx))
                    .filter_map(|(idx, h)| parse_date(h, &cfg.date_format).ok().map(|d| (idx, d)))
                    .collect();
                if plan.wide.is_empty() {
                    return Err(PipelineError::malformed(
                        &raw.source,
                        1,
                        format!("wide layout but no header parses as a date with `{}`", cfg.date_format),
                    ));
                }
                debug!(source = %raw.source, date_columns = plan.wide.len(), "resolved wide date columns");
            }
        }

        Ok(plan)
    }

    /// Common per-row fields; `None` when the row is filtered out.
    fn row_identity(
        &self,
        raw: &RawTable,
        row: &RawRow,
        plan: &ColumnPlan,
        report: &mut NormalizeReport,
    ) -> Result<Option<(String, Vec<String>, Option<u64>)>, PipelineError> {
        if let (Some(idx), Some(c)) = (plan.classification, &self.config.classification) {
            let tag = clean_identifier(raw.cell(row, idx).unwrap_or_default());
            if !c.allow.iter().any(|a| clean_identifier(a) == tag) {
                *report.dropped_classifications.entry(tag).or_insert(0) += 1;
                return Ok(None);
            }
        }

        let area = raw
            .cell(row, plan.area)
            .map(clean_identifier)
            .filter(|a| !a.is_empty())
            .ok_or_else(|| PipelineError::malformed(&raw.source, row.line, "missing area name"))?;

        if self.config.synthesize_aggregate
            && self.config.aggregate_area.as_deref().map(clean_identifier).as_deref() == Some(area.as_str())
        {
            report.discarded_aggregate_rows += 1;
            return Ok(None);
        }

        let parents: Vec<String> = plan
            .parents
            .iter()
            .map(|&idx| raw.cell(row, idx).map(clean_identifier).unwrap_or_default())
            .collect();
        let parents = if parents.iter().all(String::is_empty) { Vec::new() } else { parents };

        let population = plan
            .population
            .and_then(|idx| raw.cell(row, idx))
            .map(parse_population)
            .transpose()
            .map_err(|e| PipelineError::malformed(&raw.source, row.line, e))?;

        Ok(Some((area, parents, population)))
    }

    fn extract_long(
        &self,
        raw: &RawTable,
        plan: &ColumnPlan,
        report: &mut NormalizeReport,
    ) -> Result<Vec<Observation>, PipelineError> {
        let Some((date_idx, value_idx)) = plan.long else {
            return Ok(Vec::new());
        };

        let mut out = Vec::with_capacity(raw.rows.len());
        for row in &raw.rows {
            let Some((area, parents, population)) = self.row_identity(raw, row, plan, report)? else {
                continue;
            };

            let date_cell = raw
                .cell(row, date_idx)
                .ok_or_else(|| PipelineError::malformed(&raw.source, row.line, "missing date"))?;
            let date = parse_date(date_cell, &self.config.date_format)
                .map_err(|e| PipelineError::malformed(&raw.source, row.line, e))?;

            let Some(value_cell) = raw.cell(row, value_idx) else {
                report.blank_values += 1;
                continue;
            };
            let value = parse_count(value_cell).map_err(|e| PipelineError::malformed(&raw.source, row.line, e))?;

            out.push(Observation {
                line: row.line,
                date,
                area,
                parents,
                population,
                value,
            });
        }
        Ok(out)
    }

    fn extract_wide(
        &self,
        raw: &RawTable,
        plan: &ColumnPlan,
        report: &mut NormalizeReport,
    ) -> Result<Vec<Observation>, PipelineError> {
        let mut out = Vec::with_capacity(raw.rows.len() * plan.wide.len());
        for row in &raw.rows {
            let Some((area, parents, population)) = self.row_identity(raw, row, plan, report)? else {
                continue;
            };

            for &(idx, date) in &plan.wide {
                let Some(cell) = raw.cell(row, idx) else {
                    report.blank_values += 1;
                    continue;
                };
                let value = parse_count(cell).map_err(|e| {
                    PipelineError::malformed(&raw.source, row.line, format!("column {}: {e}", raw.headers[idx]))
                })?;
                out.push(Observation {
                    line: row.line,
                    date,
                    area: area.clone(),
                    parents: parents.clone(),
                    population,
                    value,
                });
            }
        }
        Ok(out)
    }

    fn to_daily(
        &self,
        source: &str,
        totals: BTreeMap<String, RawSeries>,
        report: &mut NormalizeReport,
    ) -> Result<BTreeMap<String, DailySeries>, PipelineError> {
        let mut out = BTreeMap::new();
        for (area, raw) in totals {
            let dates: Vec<NaiveDate> = raw.values.keys().copied().collect();
            let values: Vec<i64> = raw.values.values().map(|v| v.value).collect();
            let deltas = if self.config.cumulative {
                cumulative_to_daily(&values).map_err(|i| {
                    let line = raw.values.values().nth(i).map_or(0, |v| v.line);
                    PipelineError::malformed(source, line, format!("running total of `{area}` on {} overflows", dates[i]))
                })?
            } else {
                values.into_iter().map(Some).collect()
            };
            let (counts, clamped) = coerce_counts(&deltas);
            report.negative_deltas_clamped += clamped;

            let series = DailySeries {
                parents: raw.parents,
                population: raw.population,
                counts: dates.into_iter().zip(counts).collect(),
            };
            out.insert(area, series);
        }
        Ok(out)
    }

    fn fill_and_tag(&self, daily: BTreeMap<String, DailySeries>, report: &mut NormalizeReport) -> Vec<CaseRecord> {
        let mut records = Vec::new();
        report.areas = daily.len();

        // BTreeMap iteration order is (area asc), and each filled series is date asc.
        for (area, series) in daily {
            let (filled, n_filled) = fill_gaps(&series.counts);
            report.gap_rows_filled += n_filled;
            for (date, confirmed) in filled {
                report.first_date = Some(report.first_date.map_or(date, |d| d.min(date)));
                report.last_date = Some(report.last_date.map_or(date, |d| d.max(date)));
                records.push(CaseRecord {
                    date,
                    area: area.clone(),
                    confirmed,
                    group: self.config.group.clone(),
                    population: series.population,
                    parents: series.parents.clone(),
                });
            }
        }
        records
    }
}

/// Raw (possibly cumulative) values per area after duplicate merging.
#[derive(Debug, Clone, Default)]
struct RawSeries {
    parents: Vec<String>,
    population: Option<u64>,
    values: BTreeMap<NaiveDate, RawValue>,
}

/// A merged value and the last raw line that contributed to it.
#[derive(Debug, Clone, Copy)]
struct RawValue {
    value: i64,
    line: usize,
}

fn merge_duplicates(
    source: &str,
    observations: Vec<Observation>,
    report: &mut NormalizeReport,
) -> Result<BTreeMap<String, RawSeries>, PipelineError> {
    let mut out: BTreeMap<String, RawSeries> = BTreeMap::new();
    for obs in observations {
        let series = out.entry(obs.area.clone()).or_default();
        if series.parents.is_empty() {
            series.parents = obs.parents;
        }
        if series.population.is_none() {
            series.population = obs.population;
        }
        match series.values.get_mut(&obs.date) {
            Some(v) => {
                v.value = v.value.checked_add(obs.value).ok_or_else(|| {
                    PipelineError::malformed(source, obs.line, format!("sum of `{}` on {} overflows", obs.area, obs.date))
                })?;
                v.line = obs.line;
                report.duplicates_merged += 1;
            }
            None => {
                series.values.insert(
                    obs.date,
                    RawValue {
                        value: obs.value,
                        line: obs.line,
                    },
                );
            }
        }
    }
    Ok(out)
}
