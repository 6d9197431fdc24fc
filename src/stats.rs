//! Descriptive statistics with explicit undefined results.
//!
//! Every helper returns `None` instead of dividing by zero, so no `NaN` can leak
//! into sorting or later arithmetic.

use serde::Serialize;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (N - 1 denominator). A single value has stddev 0.
pub fn sample_stddev(values: &[f64]) -> Option<f64> {
    match values.len() {
        0 => None,
        1 => Some(0.0),
        n => {
            let m = mean(values)?;
            let sum_sq: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
            Some((sum_sq / (n as f64 - 1.0)).sqrt())
        }
    }
}

/// Count, mean and sample stddev of a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub count: usize,
    pub mean: Option<f64>,
    pub stddev: Option<f64>,
}

impl Summary {
    pub fn of(values: &[f64]) -> Self {
        Self {
            count: values.len(),
            mean: mean(values),
            stddev: sample_stddev(values),
        }
    }

    /// `mean + stddev`, the self-calibrating alert threshold.
    pub fn upper_threshold(&self) -> Option<f64> {
        Some(self.mean? + self.stddev?)
    }

    /// How many standard deviations `value` sits above the mean. Undefined for a
    /// zero-variance series.
    pub fn sigma_above_mean(&self, value: f64) -> Option<f64> {
        let stddev = self.stddev?;
        if stddev == 0.0 {
            return None;
        }
        Some((value - self.mean?) / stddev)
    }
}

/// Exact integer test for `count > mean + sample_stddev` over a count series
/// described by its length, sum and sum of squares.
///
/// Both sides are rearranged so that no division or square root is needed, which
/// keeps the result independent of uniform scaling of the counts.
pub fn exceeds_mean_plus_stddev(count: u64, n: u64, sum: u64, sum_sq: u64) -> bool {
    if n < 2 {
        return false;
    }
    let (count, n, sum, sum_sq) = (count as i128, n as i128, sum as i128, sum_sq as i128);
    // n * (count - mean)
    let d = n * count - sum;
    if d <= 0 {
        return false;
    }
    // (count - mean)^2 > var  <=>  d^2 * (n - 1) > n * (n * sum_sq - sum^2)
    d * d * (n - 1) > n * (n * sum_sq - sum * sum)
}
