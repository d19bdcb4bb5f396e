//! Reporting utilities: period/area selection, latest snapshot per area, and
//! top areas by recent incidence.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};

use crate::domain::{Group, INCIDENCE_PER, IndicatorRow};

pub mod format;

pub use format::*;

/// Rows whose date lies in `[start, end]` (either bound optional).
pub fn select_period(rows: &[IndicatorRow], start: Option<NaiveDate>, end: Option<NaiveDate>) -> Vec<IndicatorRow> {
    rows.iter()
        .filter(|r| start.is_none_or(|s| r.record.date >= s))
        .filter(|r| end.is_none_or(|e| r.record.date <= e))
        .cloned()
        .collect()
}

/// Rows of one area, optionally restricted to one group.
pub fn select_area(rows: &[IndicatorRow], area: &str, group: Option<&Group>) -> Vec<IndicatorRow> {
    rows.iter()
        .filter(|r| r.record.area == area)
        .filter(|r| group.is_none_or(|g| &r.record.group == g))
        .cloned()
        .collect()
}

/// The most recent row of every (group, area), sorted by (group, area).
pub fn latest_by_area(rows: &[IndicatorRow]) -> Vec<&IndicatorRow> {
    let mut latest: BTreeMap<(&Group, &str), &IndicatorRow> = BTreeMap::new();
    for r in rows {
        let key = (&r.record.group, r.record.area.as_str());
        match latest.get(&key) {
            Some(prev) if prev.record.date >= r.record.date => {}
            _ => {
                latest.insert(key, r);
            }
        }
    }
    latest.into_values().collect()
}

/// Recent case load of one area.
#[derive(Debug, Clone, PartialEq)]
pub struct TopArea {
    pub area: String,
    pub confirmed: u64,
    pub population: Option<u64>,
    /// Cases per 100k inhabitants over the window; `None` without population.
    pub per_100k: Option<f64>,
}

/// Rank a group's areas by confirmed cases per 100k over the `last_n_days`
/// days ending at `as_of` (inclusive).
///
/// `exclude` names an area to leave out, typically the aggregate area.
/// Areas without a population rank after all others, by raw count.
pub fn top_areas(
    rows: &[IndicatorRow],
    group: &Group,
    exclude: Option<&str>,
    as_of: NaiveDate,
    last_n_days: u32,
    n: usize,
) -> Vec<TopArea> {
    let first_day = as_of
        .checked_sub_signed(Duration::days(i64::from(last_n_days.max(1)) - 1))
        .unwrap_or(NaiveDate::MIN);

    let mut by_area: BTreeMap<&str, (u64, Option<u64>)> = BTreeMap::new();
    for r in rows {
        let rec = &r.record;
        if &rec.group != group || Some(rec.area.as_str()) == exclude {
            continue;
        }
        if rec.date < first_day || rec.date > as_of {
            continue;
        }
        let entry = by_area.entry(rec.area.as_str()).or_insert((0, None));
        entry.0 = entry.0.saturating_add(rec.confirmed);
        if rec.population.is_some() {
            entry.1 = rec.population;
        }
    }

    let mut out: Vec<TopArea> = by_area
        .into_iter()
        .map(|(area, (confirmed, population))| TopArea {
            area: area.to_string(),
            confirmed,
            population,
            per_100k: population
                .filter(|p| *p > 0)
                .map(|p| confirmed as f64 / (p as f64 / INCIDENCE_PER)),
        })
        .collect();

    out.sort_by(|a, b| match (a.per_100k, b.per_100k) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b.confirmed.cmp(&a.confirmed),
    }
    .then_with(|| a.area.cmp(&b.area)));

    out.truncate(n);
    out
}

/// Latest date present for a group.
pub fn last_date(rows: &[IndicatorRow], group: &Group) -> Option<NaiveDate> {
    rows.iter()
        .filter(|r| &r.record.group == group)
        .map(|r| r.record.date)
        .max()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CaseRecord;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 11, d).unwrap()
    }

    fn row(group: &str, area: &str, d: u32, confirmed: u64, population: Option<u64>, epg: f64) -> IndicatorRow {
        IndicatorRow {
            record: CaseRecord::new(Group::from(group), area, day(d), confirmed).with_population(population),
            confirmed_rolling_mean: 0.0,
            confirmed_rolling_sum: 0.0,
            rho: 0.0,
            rho_7: 0.0,
            ia_14: 0.0,
            epg,
        }
    }

    fn rows() -> Vec<IndicatorRow> {
        vec![
            row("cat", "Osona", 1, 10, Some(158_758), 20.0),
            row("cat", "Osona", 2, 30, Some(158_758), 45.0),
            row("cat", "Osona", 3, 40, Some(158_758), 80.0),
            row("cat", "Aran", 2, 5, Some(9_971), 10.0),
            row("cat", "Aran", 3, 6, Some(9_971), 130.0),
            row("cat", "Moianès", 3, 50, None, 0.0),
            row("cat", "Catalunya", 3, 96, Some(7_619_494), 60.0),
            row("gre", "Osona", 3, 999, Some(1), 0.0),
        ]
    }

    #[test]
    fn period_bounds_are_inclusive() {
        let rows = rows();
        let selected = select_period(&rows, Some(day(2)), Some(day(2)));
        assert_eq!(selected.len(), 2);
        assert_eq!(select_period(&rows, None, None).len(), rows.len());
        assert_eq!(select_period(&rows, Some(day(3)), None).len(), 5);
    }

    #[test]
    fn area_selection_respects_group() {
        let rows = rows();
        assert_eq!(select_area(&rows, "Osona", None).len(), 4);
        assert_eq!(select_area(&rows, "Osona", Some(&Group::from("cat"))).len(), 3);
    }

    #[test]
    fn latest_row_per_area() {
        let rows = rows();
        let latest = latest_by_area(&rows);
        assert_eq!(latest.len(), 5);
        let osona = latest
            .iter()
            .find(|r| r.record.area == "Osona" && r.record.group.as_str() == "cat")
            .unwrap();
        assert_eq!(osona.record.date, day(3));
        assert_eq!(osona.risk_band(), crate::domain::RiskBand::High);
    }

    #[test]
    fn top_areas_rank_by_incidence_and_skip_aggregate() {
        let rows = rows();
        let top = top_areas(&rows, &Group::from("cat"), Some("Catalunya"), day(3), 2, 10);
        let names: Vec<&str> = top.iter().map(|t| t.area.as_str()).collect();
        // Aran: 11 / 0.09971 ≈ 110; Osona: 70 / 1.58758 ≈ 44; Moianès has no population.
        assert_eq!(names, vec!["Aran", "Osona", "Moianès"]);
        assert_eq!(top[1].confirmed, 70);
        assert!(top[2].per_100k.is_none());

        let top1 = top_areas(&rows, &Group::from("cat"), Some("Catalunya"), day(3), 2, 1);
        assert_eq!(top1.len(), 1);
    }

    #[test]
    fn huge_window_covers_the_whole_history() {
        let rows = rows();
        let cat = Group::from("cat");
        let top = top_areas(&rows, &cat, Some("Catalunya"), day(3), u32::MAX, 5);
        assert_eq!(top.len(), 3);
        assert_eq!(top.iter().find(|t| t.area == "Osona").unwrap().confirmed, 80);
        assert!(top_areas(&[], &cat, None, day(3), u32::MAX, 5).is_empty());
    }

    #[test]
    fn last_date_per_group() {
        let rows = rows();
        assert_eq!(last_date(&rows, &Group::from("cat")), Some(day(3)));
        assert_eq!(last_date(&rows, &Group::from("none")), None);
    }
}
