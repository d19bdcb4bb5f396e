//! Population reference data.
//!
//! Populations are injected reference data loaded once per run (from a CSV
//! with `group,area,population` columns), never literals in the computation
//! code. An entry with an empty group applies to that area name in any group;
//! a group-specific entry wins over it.

use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::domain::{CaseRecord, Group};
use crate::error::PipelineError;
use crate::normalize::{clean_identifier, sum_populations};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulationTable {
    by_group: HashMap<(String, String), u64>,
    any_group: HashMap<String, u64>,
}

#[derive(Debug, Deserialize)]
struct PopulationEntry {
    #[serde(default)]
    group: Option<String>,
    area: String,
    population: u64,
}

impl PopulationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_group.len() + self.any_group.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn insert(&mut self, group: Option<&Group>, area: &str, population: u64) {
        let area = clean_identifier(area);
        match group {
            Some(g) => {
                self.by_group.insert((g.as_str().to_string(), area), population);
            }
            None => {
                self.any_group.insert(area, population);
            }
        }
    }

    pub fn get(&self, group: &Group, area: &str) -> Option<u64> {
        let area = clean_identifier(area);
        self.by_group
            .get(&(group.as_str().to_string(), area.clone()))
            .or_else(|| self.any_group.get(&area))
            .copied()
    }

    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let file = std::fs::File::open(path).map_err(|e| PipelineError::io(path, e))?;
        let table = Self::from_reader(file, &path.display().to_string())?;
        tracing::info!(path = %path.display(), entries = table.len(), "loaded population table");
        Ok(table)
    }

    pub fn from_reader<R: Read>(reader: R, source: &str) -> Result<Self, PipelineError> {
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut table = Self::new();
        for (idx, result) in reader.deserialize::<PopulationEntry>().enumerate() {
            let entry = result.map_err(|e| PipelineError::malformed(source, idx + 2, format!("population row: {e}")))?;
            let group = entry
                .group
                .as_deref()
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(Group::from);
            table.insert(group.as_ref(), &entry.area, entry.population);
        }
        Ok(table)
    }

    /// Fill `population` on records that do not carry one yet.
    ///
    /// Source-provided populations are kept as they are.
    pub fn attach(&self, records: Vec<CaseRecord>) -> Vec<CaseRecord> {
        records
            .into_iter()
            .map(|r| {
                if r.population.is_some() {
                    return r;
                }
                let population = self.get(&r.group, &r.area);
                r.with_population(population)
            })
            .collect()
    }
}

/// Give a synthesized aggregate area the summed population of its group's
/// elementary areas, once those are known.
///
/// Aggregate rows that already carry a population are left alone. When any
/// elementary area still lacks a population the aggregate stays unknown.
pub fn fill_aggregate_population(mut records: Vec<CaseRecord>, group: &Group, aggregate: &str) -> Vec<CaseRecord> {
    let aggregate = clean_identifier(aggregate);

    let mut by_area: BTreeMap<&str, Option<u64>> = BTreeMap::new();
    for r in records.iter().filter(|r| &r.group == group && r.area != aggregate) {
        let slot = by_area.entry(r.area.as_str()).or_insert(None);
        if r.population.is_some() {
            *slot = r.population;
        }
    }
    let Some(total) = sum_populations(by_area.into_values()) else {
        return records;
    };

    for r in records
        .iter_mut()
        .filter(|r| &r.group == group && r.area == aggregate && r.population.is_none())
    {
        r.population = Some(total);
    }
    debug!(group = %group, area = %aggregate, population = total, "derived aggregate population");
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const CSV: &str = "group,area,population\n\
                       cat-comarques,Barcelonès,2264301\n\
                       cat-comarques,Catalunya,7619494\n\
                       ,Alt Camp,44424\n\
                       gre-nomoi,ΧΑΝΙΩΝ,156585\n";

    #[test]
    fn group_specific_entries_win() {
        let mut table = PopulationTable::from_reader(CSV.as_bytes(), "pop").unwrap();
        assert_eq!(table.len(), 4);
        let cat = Group::from("cat-comarques");
        assert_eq!(table.get(&cat, "Barcelonès"), Some(2_264_301));
        assert_eq!(table.get(&cat, "Alt\u{a0}Camp"), Some(44_424));
        assert_eq!(table.get(&Group::from("other"), "Barcelonès"), None);

        table.insert(Some(&cat), "Alt Camp", 45_000);
        assert_eq!(table.get(&cat, "Alt Camp"), Some(45_000));
        assert_eq!(table.get(&Group::from("other"), "Alt Camp"), Some(44_424));
    }

    #[test]
    fn attach_keeps_source_population() {
        let table = PopulationTable::from_reader(CSV.as_bytes(), "pop").unwrap();
        let date = NaiveDate::from_ymd_opt(2020, 11, 1).unwrap();
        let nomoi = Group::from("gre-nomoi");
        let records = vec![
            CaseRecord::new(nomoi.clone(), "ΧΑΝΙΩΝ", date, 3),
            CaseRecord::new(nomoi.clone(), "ΧΑΝΙΩΝ", date, 3).with_population(Some(150_000)),
            CaseRecord::new(nomoi, "ΛΑΣΙΘΙΟΥ", date, 1),
        ];
        let out = table.attach(records);
        assert_eq!(out[0].population, Some(156_585));
        assert_eq!(out[1].population, Some(150_000));
        assert_eq!(out[2].population, None);
    }

    #[test]
    fn rejects_bad_population() {
        let err = PopulationTable::from_reader("group,area,population\n,X,lots\n".as_bytes(), "pop").unwrap_err();
        assert!(matches!(err, PipelineError::MalformedSourceData { line: 2, .. }));
    }

    #[test]
    fn aggregate_population_follows_attached_areas() {
        let cat = Group::from("cat-comarques");
        let other = Group::from("gre-nomoi");
        let date = NaiveDate::from_ymd_opt(2020, 11, 1).unwrap();
        let records = vec![
            CaseRecord::new(cat.clone(), "Osona", date, 3).with_population(Some(160_000)),
            CaseRecord::new(cat.clone(), "Aran", date, 1).with_population(Some(10_000)),
            CaseRecord::new(cat.clone(), "Catalunya", date, 4),
            CaseRecord::new(other.clone(), "ΧΑΝΙΩΝ", date, 2),
        ];

        let out = fill_aggregate_population(records.clone(), &cat, "Catalunya");
        assert_eq!(out[2].population, Some(170_000));
        assert_eq!(out[3].population, None);

        let mut partial = records;
        partial[1].population = None;
        let out = fill_aggregate_population(partial, &cat, "Catalunya");
        assert_eq!(out[2].population, None);
    }
}
