//! Formatted terminal output.
//!
//! Formatting lives in one place so the normalization/indicator code stays
//! free of presentation concerns.

use crate::domain::{Group, IndicatorRow};
use crate::indicators::PartitionIssue;
use crate::normalize::NormalizeReport;
use crate::report::TopArea;

/// One line per normalized source.
pub fn format_normalize_summary(reports: &[NormalizeReport]) -> String {
    let mut out = String::new();
    out.push_str("=== epg - sources ===\n");
    for r in reports {
        let group = r.group.as_ref().map(Group::as_str).unwrap_or("?");
        let span = match (r.first_date, r.last_date) {
            (Some(a), Some(b)) => format!("{a}..{b}"),
            _ => "empty".to_string(),
        };
        out.push_str(&format!(
            "{group:<16} rows={:<7} areas={:<4} span={span} gaps_filled={} dropped={} clamped={}\n",
            r.rows_read,
            r.areas,
            r.gap_rows_filled,
            r.dropped_total(),
            r.negative_deltas_clamped,
        ));
    }
    out
}

/// Table of the latest indicator values per area.
pub fn format_latest(rows: &[&IndicatorRow]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<16} {:<28} {:<10} {:>9} {:>9} {:>8} {:>9} {:>9} {:<10}\n",
            "group", "area", "date", "confirmed", "mean_7", "rho_7", "ia_14", "epg", "risk"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:-<16} {:-<28} {:-<10} {:-<9} {:-<9} {:-<8} {:-<9} {:-<9} {:-<10}\n",
            "", "", "", "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for r in rows {
        let rec = &r.record;
        out.push_str(
            format!(
                "{:<16} {:<28} {:<10} {:>9} {:>9.1} {:>8.2} {:>9.1} {:>9.1} {:<10}\n",
                truncate(rec.group.as_str(), 16),
                truncate(&rec.area, 28),
                rec.date,
                rec.confirmed,
                r.confirmed_rolling_mean,
                r.rho_7,
                r.ia_14,
                r.epg,
                r.risk_band().label(),
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

/// Table of the areas with the highest recent incidence.
pub fn format_top_areas(group: &Group, last_n_days: u32, top: &[TopArea]) -> String {
    let mut out = String::new();
    out.push_str(&format!("Top areas in {group} (last {last_n_days} days):\n"));
    for (i, t) in top.iter().enumerate() {
        let rate = t
            .per_100k
            .map(|v| format!("{v:>9.1}/100k"))
            .unwrap_or_else(|| format!("{:>14}", "n/a"));
        out.push_str(&format!("{:>3}. {:<28} {:>8} {rate}\n", i + 1, truncate(&t.area, 28), t.confirmed));
    }
    out
}

pub fn format_issues(issues: &[PartitionIssue]) -> String {
    if issues.is_empty() {
        return String::new();
    }
    let mut out = String::from("Warnings:\n");
    for issue in issues {
        out.push_str(&format!("- {issue}\n"));
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}
