//! Export indicator tables to CSV / JSON.
//!
//! The CSV is meant to be easy to consume in spreadsheets or downstream
//! renderers, and can be read back with `read_canonical_csv` (derived columns
//! are ignored on the way in and recomputed).

use std::fs::File;
use std::io::Write;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{CaseRecord, IndicatorRow, RiskBand};
use crate::error::PipelineError;

/// Separator used to flatten parent areas into one CSV cell.
pub const PARENTS_SEPARATOR: char = ';';

#[derive(Debug, Serialize)]
struct IndicatorCsvRow<'a> {
    #[serde(rename = "Date")]
    date: NaiveDate,
    #[serde(rename = "Group")]
    group: &'a str,
    #[serde(rename = "Area")]
    area: &'a str,
    #[serde(rename = "Confirmed")]
    confirmed: u64,
    #[serde(rename = "Population")]
    population: Option<u64>,
    #[serde(rename = "Parents")]
    parents: String,
    #[serde(rename = "Confirmed_rolling_mean")]
    confirmed_rolling_mean: f64,
    #[serde(rename = "Confirmed_rolling_sum")]
    confirmed_rolling_sum: f64,
    rho: f64,
    rho_7: f64,
    ia_14: f64,
    epg: f64,
    risk_band: RiskBand,
}

/// Canonical columns as read back from an exported CSV.
#[derive(Debug, Deserialize)]
pub(crate) struct CanonicalCsvRow {
    #[serde(rename = "Date")]
    pub date: NaiveDate,
    #[serde(rename = "Group")]
    pub group: String,
    #[serde(rename = "Area")]
    pub area: String,
    #[serde(rename = "Confirmed")]
    pub confirmed: u64,
    #[serde(rename = "Population", default)]
    pub population: Option<u64>,
    #[serde(rename = "Parents", default)]
    pub parents: Option<String>,
}

impl CanonicalCsvRow {
    pub(crate) fn into_record(self) -> CaseRecord {
        let parents = match self.parents.as_deref() {
            None | Some("") => Vec::new(),
            Some(p) => p.split(PARENTS_SEPARATOR).map(str::to_string).collect(),
        };
        CaseRecord {
            date: self.date,
            area: self.area,
            confirmed: self.confirmed,
            group: self.group.as_str().into(),
            population: self.population,
            parents,
        }
    }
}

#[derive(Debug, Serialize)]
struct IndicatorJsonRow<'a> {
    #[serde(flatten)]
    row: &'a IndicatorRow,
    risk_band: RiskBand,
}

/// Write canonical + derived columns as CSV.
pub fn write_indicator_csv(path: &Path, rows: &[IndicatorRow]) -> Result<(), PipelineError> {
    let file = File::create(path).map_err(|e| PipelineError::io(path, e))?;
    write_indicator_csv_to(file, rows).map_err(|e| PipelineError::io(path, e))?;
    tracing::info!(path = %path.display(), rows = rows.len(), "wrote indicator CSV");
    Ok(())
}

/// Write canonical + derived columns as CSV to any writer.
pub fn write_indicator_csv_to<W: Write>(writer: W, rows: &[IndicatorRow]) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(writer);
    for r in rows {
        let record = &r.record;
        let parents = record.parents.join(&PARENTS_SEPARATOR.to_string());
        writer.serialize(IndicatorCsvRow {
            date: record.date,
            group: record.group.as_str(),
            area: &record.area,
            confirmed: record.confirmed,
            population: record.population,
            parents,
            confirmed_rolling_mean: r.confirmed_rolling_mean,
            confirmed_rolling_sum: r.confirmed_rolling_sum,
            rho: r.rho,
            rho_7: r.rho_7,
            ia_14: r.ia_14,
            epg: r.epg,
            risk_band: r.risk_band(),
        })?;
    }
    writer.flush()?;
    Ok(())
}

/// Write rows (with their risk band) as a pretty JSON array.
pub fn write_indicator_json(path: &Path, rows: &[IndicatorRow]) -> Result<(), PipelineError> {
    let file = File::create(path).map_err(|e| PipelineError::io(path, e))?;
    let out: Vec<IndicatorJsonRow<'_>> = rows
        .iter()
        .map(|row| IndicatorJsonRow {
            row,
            risk_band: row.risk_band(),
        })
        .collect();
    serde_json::to_writer_pretty(file, &out).map_err(|e| PipelineError::io(path, e))?;
    tracing::info!(path = %path.display(), rows = rows.len(), "wrote indicator JSON");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Group;

    fn row(epg: f64) -> IndicatorRow {
        let mut record = CaseRecord::new(
            Group::from("gre-nomoi"),
            "ΙΩΑΝΝΙΝΩΝ",
            NaiveDate::from_ymd_opt(2020, 11, 2).unwrap(),
            41,
        )
        .with_population(Some(167_901));
        record.parents = vec!["Περιφέρεια Ηπείρου".to_string(), "Ήπειρος".to_string()];
        IndicatorRow {
            record,
            confirmed_rolling_mean: 35.5,
            confirmed_rolling_sum: 497.0,
            rho: 1.2,
            rho_7: 1.1,
            ia_14: 296.0,
            epg,
        }
    }

    #[test]
    fn csv_has_header_and_risk_band() {
        let mut buf = Vec::new();
        write_indicator_csv_to(&mut buf, &[row(325.6)]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Date,Group,Area,Confirmed,Population,Parents,Confirmed_rolling_mean,Confirmed_rolling_sum,rho,rho_7,ia_14,epg,risk_band"
        );
        let data = lines.next().unwrap();
        assert!(data.starts_with("2020-11-02,gre-nomoi,ΙΩΑΝΝΙΝΩΝ,41,167901,Περιφέρεια Ηπείρου;Ήπειρος,"));
        assert!(data.ends_with(",very-high"));
    }

    #[test]
    fn json_rows_are_flat() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        write_indicator_json(&path, &[row(12.0)]).unwrap();
        let value: serde_json::Value = serde_json::from_reader(File::open(&path).unwrap()).unwrap();
        let first = &value[0];
        assert_eq!(first["area"], "ΙΩΑΝΝΙΝΩΝ");
        assert_eq!(first["group"], "gre-nomoi");
        assert_eq!(first["risk_band"], "low");
        assert_eq!(first["epg"], 12.0);
    }
}
