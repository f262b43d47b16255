//! Pure statistics over plain slices and month-paired series.
//!
//! Every function returns `None` when the statistic is undefined for its input
//! (too few values, zero variance, zero mean) instead of a sentinel number.

use serde::{Deserialize, Serialize};

use crate::domain::{MonthlySeries, YearMonth};

// ─── Single-sample statistics ───────────────────────────────────────

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1 denominator).
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Adjusted Fisher–Pearson skewness `G1 = sqrt(n(n-1)) / (n-2) * m3 / m2^1.5`.
///
/// Needs at least three values and non-zero spread.
pub fn skewness(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 3 {
        return None;
    }
    let m = mean(values)?;
    let nf = n as f64;
    let m2 = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / nf;
    let m3 = values.iter().map(|v| (v - m).powi(3)).sum::<f64>() / nf;
    if m2 == 0.0 || is_constant(values.iter().copied()) {
        return None;
    }
    let g1 = m3 / m2.powf(1.5);
    Some(g1 * (nf * (nf - 1.0)).sqrt() / (nf - 2.0))
}

/// Coefficient of variation: sample std / mean. Undefined for a zero mean.
pub fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    if m == 0.0 {
        return None;
    }
    Some(sample_std(values)? / m)
}

// ─── Paired statistics ──────────────────────────────────────────────

/// Pearson correlation over complete pairs.
///
/// `None` with fewer than two pairs or when either side is constant.
pub fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
    let n = pairs.len();
    if n < 2 || is_constant(pairs.iter().map(|p| p.0)) || is_constant(pairs.iter().map(|p| p.1)) {
        return None;
    }
    let nf = n as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / nf;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / nf;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in pairs {
        let dx = x - mx;
        let dy = y - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return None;
    }
    Some((sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0))
}

/// Ordinary least squares fit of `y = intercept + slope * x`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    pub n: usize,
}

/// `None` with fewer than two pairs or a constant `x`.
pub fn ols(pairs: &[(f64, f64)]) -> Option<LinearFit> {
    let n = pairs.len();
    if n < 2 || is_constant(pairs.iter().map(|p| p.0)) {
        return None;
    }
    let nf = n as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / nf;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / nf;
    let sxx: f64 = pairs.iter().map(|(x, _)| (x - mx).powi(2)).sum();
    if sxx <= 0.0 {
        return None;
    }
    let sxy: f64 = pairs.iter().map(|(x, y)| (x - mx) * (y - my)).sum();
    let slope = sxy / sxx;
    let intercept = my - slope * mx;
    let r_squared = pearson(pairs).map_or(0.0, |r| r * r);
    Some(LinearFit {
        slope,
        intercept,
        r_squared,
        n,
    })
}

fn is_constant(mut values: impl Iterator<Item = f64>) -> bool {
    match values.next() {
        Some(first) => values.all(|v| v == first),
        None => true,
    }
}

// ─── Month pairing ──────────────────────────────────────────────────

/// Pairs `(a[t - lag], b[t])` for every month `t` where both are present.
///
/// `a` leads `b` by `lag` months. Months are matched by calendar, so the two
/// series need not share a start month.
pub fn paired_lagged(a: &MonthlySeries, b: &MonthlySeries, lag: usize) -> Vec<(f64, f64)> {
    b.observed()
        .filter_map(|(m, y)| a.get(m.offset(-(lag as i64))).map(|x| (x, y)))
        .collect()
}

/// Same-month pairs restricted to months accepted by `keep`.
pub fn paired_where(
    a: &MonthlySeries,
    b: &MonthlySeries,
    keep: impl Fn(YearMonth) -> bool,
) -> Vec<(f64, f64)> {
    b.observed()
        .filter(|(m, _)| keep(*m))
        .filter_map(|(m, y)| a.get(m).map(|x| (x, y)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn mean_and_std_known_values() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!(approx(mean(&v).unwrap(), 5.0));
        // population std is 2.0; sample std = sqrt(32/7)
        assert!(approx(sample_std(&v).unwrap(), (32.0f64 / 7.0).sqrt()));
    }

    #[test]
    fn std_needs_two_values() {
        assert_eq!(sample_std(&[1.0]), None);
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn median_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn skewness_symmetric_is_zero() {
        assert!(approx(skewness(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap(), 0.0));
    }

    #[test]
    fn skewness_matches_adjusted_estimator() {
        // right tail: m2 = 5.84, m3 = 12.672
        let v = [1.0, 2.0, 3.0, 4.0, 8.0];
        let g1 = 12.672 / 5.84f64.powf(1.5);
        let expected = g1 * (20.0f64).sqrt() / 3.0;
        assert!(approx(skewness(&v).unwrap(), expected));
        assert!(skewness(&v).unwrap() > 0.0);
    }

    #[test]
    fn skewness_of_constant_is_undefined() {
        assert_eq!(skewness(&[3.0, 3.0, 3.0, 3.0]), None);
    }

    #[test]
    fn cv_is_std_over_mean() {
        let v = [9.0, 10.0, 11.0];
        assert!(approx(coefficient_of_variation(&v).unwrap(), 0.1));
        assert_eq!(coefficient_of_variation(&[-1.0, 1.0]), None);
    }

    #[test]
    fn pearson_perfect_and_inverse() {
        let up: Vec<(f64, f64)> = (0..10).map(|i| (i as f64, 2.0 * i as f64 + 1.0)).collect();
        let down: Vec<(f64, f64)> = (0..10).map(|i| (i as f64, -(i as f64))).collect();
        assert!(approx(pearson(&up).unwrap(), 1.0));
        assert!(approx(pearson(&down).unwrap(), -1.0));
    }

    #[test]
    fn pearson_constant_side_is_undefined() {
        let flat: Vec<(f64, f64)> = (0..10).map(|i| (i as f64, 3.0)).collect();
        assert_eq!(pearson(&flat), None);
    }

    #[test]
    fn ols_recovers_line() {
        let pts: Vec<(f64, f64)> = (0..20).map(|i| (i as f64, 0.5 * i as f64 - 2.0)).collect();
        let fit = ols(&pts).unwrap();
        assert!(approx(fit.slope, 0.5));
        assert!(approx(fit.intercept, -2.0));
        assert!(approx(fit.r_squared, 1.0));
        assert_eq!(fit.n, 20);
    }

    #[test]
    fn paired_lagged_matches_by_calendar() {
        let ym = |s: &str| s.parse::<YearMonth>().unwrap();
        let a = MonthlySeries::from_points("a", vec![(ym("2020-01"), 1.0), (ym("2020-02"), 2.0)]);
        let b = MonthlySeries::from_points("b", vec![(ym("2020-02"), 10.0), (ym("2020-03"), 20.0)]);
        assert_eq!(paired_lagged(&a, &b, 0), vec![(2.0, 10.0)]);
        assert_eq!(paired_lagged(&a, &b, 1), vec![(1.0, 10.0), (2.0, 20.0)]);
    }
}
