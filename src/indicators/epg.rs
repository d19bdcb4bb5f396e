//! rho / ia_14 / EPG for a single area's series.
//!
//! All inputs are one partition's daily counts, dates ascending, no gaps.
//! Every function returns a fresh column; nothing is computed in place.
//!
//! ```text
//! rho_A(n) = sum(confirmed[n-2..=n])
//! rho_B(n) = rho_A(n - lag)
//! rho(n)   = rho_A(n) / rho_B(n)            (0 when rho_B is undefined or 0)
//! rho_7(n) = mean(rho[n-6..=n])
//! ia_14(n) = sum(confirmed[n-13..=n]) / (population / 100_000)
//! epg(n)   = rho_7(n) * ia_14(n)
//! ```

use crate::config::WindowConfig;
use crate::indicators::rolling::{lagged, rolling_mean, rolling_sum};

/// The derived columns of one partition, index-aligned with its rows.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionIndicators {
    pub rolling_mean: Vec<f64>,
    pub rolling_sum: Vec<f64>,
    pub rho: Vec<f64>,
    pub rho_7: Vec<f64>,
    pub ia_14: Vec<f64>,
    pub epg: Vec<f64>,
}

impl PartitionIndicators {
    pub fn len(&self) -> usize {
        self.epg.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epg.is_empty()
    }
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() { v } else { 0.0 }
}

/// Short case sum (`rho_A`).
pub fn rho_a(confirmed: &[f64], short_window: usize) -> Vec<f64> {
    rolling_sum(confirmed, short_window)
}

/// Growth ratio between the current short sum and the one `lag` days earlier.
pub fn rho(rho_a: &[f64], lag: usize) -> Vec<f64> {
    let rho_b = lagged(rho_a, lag);
    rho_a
        .iter()
        .zip(rho_b)
        .map(|(&a, b)| match b {
            Some(b) if b != 0.0 => finite_or_zero(a / b),
            _ => 0.0,
        })
        .collect()
}

/// Cumulative incidence per `scale` inhabitants over `window` days.
///
/// Unknown or zero population gives an all-zero column.
pub fn ia(confirmed: &[f64], population: Option<u64>, window: usize, scale: f64) -> Vec<f64> {
    let Some(population) = population.filter(|p| *p > 0) else {
        return vec![0.0; confirmed.len()];
    };
    let per_scale = population as f64 / scale;
    rolling_sum(confirmed, window)
        .into_iter()
        .map(|sum| finite_or_zero(sum / per_scale))
        .collect()
}

/// `rho_7 * ia_14`, with any non-finite product resolved to 0.
pub fn epg(rho_7: &[f64], ia_14: &[f64]) -> Vec<f64> {
    rho_7
        .iter()
        .zip(ia_14)
        .map(|(r, ia)| finite_or_zero(r * ia))
        .collect()
}

/// Compute every derived column for one partition.
pub fn compute_partition(confirmed: &[u64], population: Option<u64>, windows: &WindowConfig) -> PartitionIndicators {
    let confirmed: Vec<f64> = confirmed.iter().map(|&c| c as f64).collect();

    let rho = rho(&rho_a(&confirmed, windows.rho_short), windows.rho_lag);
    let rho_7 = rolling_mean(&rho, windows.rho_mean);
    let ia_14 = ia(&confirmed, population, windows.ia_window, windows.incidence_scale);
    let epg = epg(&rho_7, &ia_14);

    PartitionIndicators {
        rolling_mean: rolling_mean(&confirmed, windows.mean),
        rolling_sum: rolling_sum(&confirmed, windows.sum),
        rho,
        rho_7,
        ia_14,
        epg,
    }
}
