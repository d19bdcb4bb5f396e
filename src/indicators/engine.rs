//! Multi-area indicator computation.
//!
//! The combined canonical table is split into (group, area) partitions, each
//! partition is sorted by date and computed independently (in parallel), and
//! the per-partition columns are joined back onto their rows. Because nothing
//! is shared between partitions, the order in which areas appear in the input
//! cannot change any area's values.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::WindowConfig;
use crate::domain::{CaseRecord, Group, IndicatorRow};
use crate::error::PipelineError;
use crate::indicators::epg::{PartitionIndicators, compute_partition};

/// A problem confined to one (group, area) partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueKind {
    /// No usable population: `ia_14` and `epg` are 0 for the whole partition.
    MissingPopulation,
    /// The same date appears twice; the partition is skipped.
    DuplicateDate(NaiveDate),
    /// Days are missing inside the date range; values are computed on the rows present.
    NonContiguous { missing_days: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionIssue {
    pub group: Group,
    pub area: String,
    pub kind: IssueKind,
}

impl fmt::Display for PartitionIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            IssueKind::MissingPopulation => {
                write!(f, "{}/{}: missing population (ia_14 and epg set to 0)", self.group, self.area)
            }
            IssueKind::DuplicateDate(date) => {
                write!(f, "{}/{}: duplicate date {date} (area skipped)", self.group, self.area)
            }
            IssueKind::NonContiguous { missing_days } => {
                write!(f, "{}/{}: {missing_days} missing day(s) in range", self.group, self.area)
            }
        }
    }
}

/// Engine output: the canonical rows plus derived columns, sorted by
/// (group, area, date), and any per-partition issues.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorTable {
    pub rows: Vec<IndicatorRow>,
    pub issues: Vec<PartitionIssue>,
}

impl IndicatorTable {
    /// The canonical rows without derived columns.
    pub fn canonical(&self) -> Vec<CaseRecord> {
        self.rows.iter().map(|r| r.record.clone()).collect()
    }

    pub fn area_rows<'a>(&'a self, group: &'a Group, area: &'a str) -> impl Iterator<Item = &'a IndicatorRow> + 'a {
        self.rows
            .iter()
            .filter(move |r| &r.record.group == group && r.record.area == area)
    }
}

type PartitionKey = (Group, String);

#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    windows: WindowConfig,
}

impl IndicatorEngine {
    pub fn new(windows: WindowConfig) -> Result<Self, PipelineError> {
        windows.validate()?;
        Ok(Self { windows })
    }

    /// Compute every indicator column for a combined multi-group, multi-area table.
    ///
    /// The input is not mutated and its order does not matter.
    pub fn compute(&self, records: &[CaseRecord]) -> IndicatorTable {
        let partitions: Vec<(PartitionKey, Vec<&CaseRecord>)> = partition(records).into_iter().collect();

        let results: Vec<(Vec<IndicatorRow>, Vec<PartitionIssue>)> = partitions
            .par_iter()
            .map(|(key, rows)| compute_one(key, rows, &self.windows))
            .collect();

        let mut table = IndicatorTable::default();
        for (rows, issues) in results {
            table.rows.extend(rows);
            table.issues.extend(issues);
        }

        for issue in &table.issues {
            warn!(%issue, "partition issue");
        }
        info!(
            partitions = partitions.len(),
            rows = table.rows.len(),
            issues = table.issues.len(),
            "computed indicators"
        );
        table
    }
}

fn partition(records: &[CaseRecord]) -> BTreeMap<PartitionKey, Vec<&CaseRecord>> {
    let mut out: BTreeMap<PartitionKey, Vec<&CaseRecord>> = BTreeMap::new();
    for r in records {
        out.entry((r.group.clone(), r.area.clone())).or_default().push(r);
    }
    out
}

fn compute_one(
    key: &PartitionKey,
    rows: &[&CaseRecord],
    windows: &WindowConfig,
) -> (Vec<IndicatorRow>, Vec<PartitionIssue>) {
    let (group, area) = key;
    let issue = |kind| PartitionIssue {
        group: group.clone(),
        area: area.clone(),
        kind,
    };

    let mut rows = rows.to_vec();
    rows.sort_by_key(|r| r.date);

    if let Some(pair) = rows.windows(2).find(|w| w[0].date == w[1].date) {
        return (Vec::new(), vec![issue(IssueKind::DuplicateDate(pair[0].date))]);
    }

    let mut issues = Vec::new();
    if let (Some(first), Some(last)) = (rows.first(), rows.last()) {
        let span = (last.date - first.date).num_days() + 1;
        let missing_days = span - rows.len() as i64;
        if missing_days > 0 {
            issues.push(issue(IssueKind::NonContiguous { missing_days }));
        }
    }

    // The latest known population applies to the whole partition.
    let population = rows.iter().rev().find_map(|r| r.population).filter(|p| *p > 0);
    if population.is_none() {
        issues.push(issue(IssueKind::MissingPopulation));
    }

    let confirmed: Vec<u64> = rows.iter().map(|r| r.confirmed).collect();
    let columns = compute_partition(&confirmed, population, windows);
    debug!(group = %group, area = %area, rows = rows.len(), "computed partition");

    (join_columns(&rows, &columns), issues)
}

/// Join index-aligned derived columns back onto their canonical rows.
fn join_columns(rows: &[&CaseRecord], columns: &PartitionIndicators) -> Vec<IndicatorRow> {
    rows.iter()
        .enumerate()
        .map(|(i, r)| IndicatorRow {
            record: (*r).clone(),
            confirmed_rolling_mean: columns.rolling_mean[i],
            confirmed_rolling_sum: columns.rolling_sum[i],
            rho: columns.rho[i],
            rho_7: columns.rho_7[i],
            ia_14: columns.ia_14[i],
            epg: columns.epg[i],
        })
        .collect()
}
