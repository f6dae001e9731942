//! Small deterministic statistics helpers shared by KPIs and models.
//!
//! Summation always runs in slice order, so identical inputs give
//! bit-identical outputs.

/// Arithmetic mean; `None` for an empty slice.
pub fn mean(xs: &[f64]) -> Option<f64> {
    if xs.is_empty() {
        return None;
    }
    Some(xs.iter().sum::<f64>() / (xs.len() as f64))
}

/// Weighted mean over `(value, weight)` pairs; `None` when total weight is 0.
pub fn weighted_mean(pairs: &[(f64, f64)]) -> Option<f64> {
    let total_weight: f64 = pairs.iter().map(|(_, w)| w).sum();
    if total_weight <= 0.0 {
        return None;
    }
    Some(pairs.iter().map(|(v, w)| v * w).sum::<f64>() / total_weight)
}

/// Sample standard deviation (n-1).
pub fn stddev_sample(xs: &[f64], mean: f64) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let var = xs
        .iter()
        .map(|x| {
            let d = x - mean;
            d * d
        })
        .sum::<f64>()
        / ((xs.len() - 1) as f64);
    var.sqrt()
}

/// Coefficient of variation (sample stddev / mean); 0 with fewer than two
/// points or a non-positive mean.
pub fn coefficient_of_variation(xs: &[f64]) -> f64 {
    match mean(xs) {
        Some(m) if xs.len() >= 2 && m > f64::EPSILON => stddev_sample(xs, m) / m,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_and_weighted_mean() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[2.0, 4.0]), Some(3.0));
        assert_eq!(weighted_mean(&[(4.0, 1.0), (1.0, 3.0)]), Some(1.75));
        assert_eq!(weighted_mean(&[(4.0, 0.0)]), None);
    }

    #[test]
    fn variation_needs_two_points() {
        assert_eq!(coefficient_of_variation(&[40.0]), 0.0);
        let cv = coefficient_of_variation(&[30.0, 50.0]);
        assert!((cv - (200.0f64.sqrt() / 40.0)).abs() < 1e-12);
    }
}
