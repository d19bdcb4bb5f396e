//! Trailing-window aggregates with a "minimum periods = 1" policy.
//!
//! At position `n` the window is `values[n + 1 - w ..= n]`, shortened at the
//! start of the series instead of producing a missing value. Each window is
//! summed from scratch (no running total) so results do not depend on how
//! the series was reached and are bit-for-bit reproducible.

/// The (start, end) slice bounds of the trailing window ending at `n`.
fn window_bounds(n: usize, window: usize) -> (usize, usize) {
    let window = window.max(1);
    (n + 1 - window.min(n + 1), n + 1)
}

/// Trailing sum over `window` values.
pub fn rolling_sum(values: &[f64], window: usize) -> Vec<f64> {
    (0..values.len())
        .map(|n| {
            let (start, end) = window_bounds(n, window);
            values[start..end].iter().sum()
        })
        .collect()
}

/// Trailing mean over `window` values (fewer at the start of the series).
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    (0..values.len())
        .map(|n| {
            let (start, end) = window_bounds(n, window);
            let slice = &values[start..end];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect()
}

/// The series shifted `lag` positions later; the first `lag` entries are undefined.
pub fn lagged(values: &[f64], lag: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|n| n.checked_sub(lag).map(|i| values[i]))
        .collect()
}
