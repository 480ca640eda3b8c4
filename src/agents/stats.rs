//! Batch statistics helpers shared by the analysis agents.
//!
//! Thin wrappers over `statrs` that return `None` for empty or degenerate
//! inputs instead of NaN, so callers can thread missing-column semantics
//! through with `Option`.

use statrs::statistics::{Data, OrderStatistics, Statistics};

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().mean())
}

/// Sample standard deviation; None for fewer than two values.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    Some(values.iter().std_dev())
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut data = Data::new(values.to_vec());
    Some(data.median())
}

/// Empirical quantile with linear interpolation, tau in [0, 1].
pub fn quantile(values: &[f64], tau: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut data = Data::new(values.to_vec());
    Some(data.quantile(tau))
}

pub fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    let mut iter = values.iter().copied();
    let first = iter.next()?;
    let (mut min, mut max) = (first, first);
    for v in iter {
        min = min.min(v);
        max = max.max(v);
    }
    Some((min, max))
}

/// Pearson correlation coefficient.
///
/// Returns None for mismatched lengths, fewer than 3 pairs, or a degenerate
/// (zero-variance) input.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len();
    if n < 3 || n != y.len() {
        return None;
    }

    let nf = n as f64;
    let sum_x: f64 = x.iter().sum();
    let sum_y: f64 = y.iter().sum();
    let sum_xy: f64 = x.iter().zip(y.iter()).map(|(a, b)| a * b).sum();
    let sum_x2: f64 = x.iter().map(|a| a * a).sum();
    let sum_y2: f64 = y.iter().map(|a| a * a).sum();

    let numerator = nf * sum_xy - sum_x * sum_y;
    let denominator = ((nf * sum_x2 - sum_x.powi(2)) * (nf * sum_y2 - sum_y.powi(2))).sqrt();

    if denominator == 0.0 {
        None
    } else {
        Some(numerator / denominator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_inputs_yield_none() {
        assert!(mean(&[]).is_none());
        assert!(median(&[]).is_none());
        assert!(quantile(&[], 0.95).is_none());
        assert!(std_dev(&[1.0]).is_none());
    }

    #[test]
    fn quantile_brackets_the_distribution() {
        let values: Vec<f64> = (1..=100).map(f64::from).collect();
        let q95 = quantile(&values, 0.95).expect("non-empty");
        assert!(q95 > 90.0 && q95 <= 100.0, "q95 = {q95}");
        let above = values.iter().filter(|&&v| v > q95).count();
        assert!(above <= 5, "{above} values above the 95th percentile");
    }

    #[test]
    fn pearson_detects_perfect_linear_relation() {
        let x: Vec<f64> = (0..50).map(f64::from).collect();
        let y: Vec<f64> = x.iter().map(|v| 3.0 * v + 2.0).collect();
        let r = pearson(&x, &y).expect("defined");
        assert!((r - 1.0).abs() < 1e-9);

        let y_neg: Vec<f64> = x.iter().map(|v| -v).collect();
        let r_neg = pearson(&x, &y_neg).expect("defined");
        assert!((r_neg + 1.0).abs() < 1e-9);
    }

    #[test]
    fn pearson_rejects_degenerate_input() {
        let x = [1.0, 2.0, 3.0];
        let constant = [5.0, 5.0, 5.0];
        assert!(pearson(&x, &constant).is_none());
        assert!(pearson(&x[..2], &constant[..2]).is_none());
    }
}
