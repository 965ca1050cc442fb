//! Small numeric helpers shared by the reducers, forecaster and providers.

use serde::{Deserialize, Serialize};

/// Divisor used for the standard deviation of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StdDevKind {
    /// Divide by `n - 1`.
    #[default]
    Sample,
    /// Divide by `n`.
    Population,
}

/// Largest number of decimal digits `round_to` honours.
pub const MAX_PRECISION: u32 = 10;

pub fn round_to(value: f64, digits: u32) -> f64 {
    let factor = 10f64.powi(digits.min(MAX_PRECISION) as i32);
    (value * factor).round() / factor
}

/// Sorts in place using IEEE total ordering, so callers get the same
/// reduction order regardless of input order.
pub fn sort_values(values: &mut [f64]) {
    values.sort_by(f64::total_cmp);
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Median of a slice that is already sorted ascending.
pub fn median_sorted(sorted: &[f64]) -> Option<f64> {
    let n = sorted.len();
    match n {
        0 => None,
        _ if n % 2 == 1 => Some(sorted[n / 2]),
        _ => Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0),
    }
}

/// `None` for fewer than two values.
pub fn std_dev(values: &[f64], kind: StdDevKind) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }

    let mean = mean(values)?;
    let squares = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>();
    let divisor = match kind {
        StdDevKind::Sample => (n - 1) as f64,
        StdDevKind::Population => n as f64,
    };

    Some((squares / divisor).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round_to(1.005_1, 2), 1.01);
        assert_eq!(round_to(-2.346, 2), -2.35);
        assert_eq!(round_to(7.0, 2), 7.0);
    }

    #[test]
    fn huge_precision_is_capped() {
        assert_eq!(round_to(1.25, u32::MAX), 1.25);
        assert!(round_to(-3.5, 1_000).is_finite());
    }

    #[test]
    fn median_odd_and_even() {
        assert_eq!(median_sorted(&[]), None);
        assert_eq!(median_sorted(&[1.0, 2.0, 9.0]), Some(2.0));
        assert_eq!(median_sorted(&[1.0, 2.0, 4.0, 9.0]), Some(3.0));
    }

    #[test]
    fn std_dev_kinds() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(std_dev(&values, StdDevKind::Population), Some(2.0));

        let sample = std_dev(&values, StdDevKind::Sample).expect("two or more values");
        assert!((sample - 2.138_089_935).abs() < 1e-6);

        assert_eq!(std_dev(&[3.0], StdDevKind::Sample), None);
    }
}
