//! Per-area series transforms: cumulative differencing, aggregate synthesis
//! and daily gap filling.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};

/// Daily counts for one area, keyed by date (so always date-ordered).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DailySeries {
    pub parents: Vec<String>,
    pub population: Option<u64>,
    pub counts: BTreeMap<NaiveDate, u64>,
}

/// Difference a running total into daily deltas.
///
/// The first value has no predecessor and yields `None`. A difference that
/// does not fit in an `i64` fails with the index of the offending value.
pub fn cumulative_to_daily(totals: &[i64]) -> Result<Vec<Option<i64>>, usize> {
    let mut out = Vec::with_capacity(totals.len());
    let mut prev: Option<i64> = None;
    for (i, &total) in totals.iter().enumerate() {
        let delta = match prev {
            Some(p) => Some(total.checked_sub(p).ok_or(i)?),
            None => None,
        };
        out.push(delta);
        prev = Some(total);
    }
    Ok(out)
}

/// Resolve nulls to 0 and clamp negative corrections to 0.
///
/// Returns the counts and how many negative values were clamped.
pub fn coerce_counts(values: &[Option<i64>]) -> (Vec<u64>, usize) {
    let mut clamped = 0usize;
    let counts = values
        .iter()
        .map(|v| match v {
            Some(v) if *v < 0 => {
                clamped += 1;
                0
            }
            Some(v) => *v as u64,
            None => 0,
        })
        .collect();
    (counts, clamped)
}

/// Sum every elementary area per date.
///
/// The population is the sum of the elementary populations, but only when
/// every elementary area has one. Counts saturate at `u64::MAX`.
pub fn synthesize_aggregate(areas: &BTreeMap<String, DailySeries>) -> DailySeries {
    let mut counts: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for series in areas.values() {
        for (date, count) in &series.counts {
            let total = counts.entry(*date).or_insert(0);
            *total = total.saturating_add(*count);
        }
    }

    let population = sum_populations(areas.values().map(|s| s.population));

    DailySeries {
        parents: Vec::new(),
        population,
        counts,
    }
}

/// Sum of all populations; `None` when the input is empty, any value is
/// unknown, or the sum overflows.
pub fn sum_populations(populations: impl IntoIterator<Item = Option<u64>>) -> Option<u64> {
    let mut any = false;
    let mut total: u64 = 0;
    for p in populations {
        total = total.checked_add(p?)?;
        any = true;
    }
    any.then_some(total)
}

/// Expand a series to every day in `[first, last]`, filling missing days with 0.
///
/// Returns the contiguous series and the number of filled days.
pub fn fill_gaps(counts: &BTreeMap<NaiveDate, u64>) -> (Vec<(NaiveDate, u64)>, usize) {
    let (Some((&first, _)), Some((&last, _))) = (counts.first_key_value(), counts.last_key_value()) else {
        return (Vec::new(), 0);
    };

    let span = (last - first).num_days() as usize + 1;
    let mut out = Vec::with_capacity(span);
    let mut filled = 0usize;
    let mut date = first;
    while date <= last {
        match counts.get(&date) {
            Some(&c) => out.push((date, c)),
            None => {
                out.push((date, 0));
                filled += 1;
            }
        }
        date += Duration::days(1);
    }
    (out, filled)
}
