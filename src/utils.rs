//! Numeric helpers shared by the speed estimator.
use nalgebra::Point2;

/// Percentile `p` (0..=100) of an ascending slice, interpolating linearly
/// between neighbouring order statistics.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64))
}

/// First and third quartile of unsorted values.
pub fn quartiles(values: &[f64]) -> Option<(f64, f64)> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    Some((percentile(&sorted, 25.0)?, percentile(&sorted, 75.0)?))
}

/// `n` weights rising linearly from `start` to `end`. A single weight is 1.
pub fn linear_weights(n: usize, start: f64, end: f64) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => (0..n)
            .map(|i| start + (end - start) * i as f64 / (n - 1) as f64)
            .collect(),
    }
}

/// Weighted mean, summed in slice order.
pub fn weighted_mean(values: &[f64], weights: &[f64]) -> Option<f64> {
    let total: f64 = weights.iter().sum();
    if values.is_empty() || values.len() != weights.len() || total <= 0.0 {
        return None;
    }
    let sum: f64 = values.iter().zip(weights).map(|(v, w)| v * w).sum();
    Some(sum / total)
}

/// Pixel distance between two bounding-box centres.
pub fn centroid_distance(a: &Point2<i32>, b: &Point2<i32>) -> f64 {
    let a = Point2::new(a.x as f64, a.y as f64);
    let b = Point2::new(b.x as f64, b.y as f64);
    nalgebra::distance(&a, &b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_percentile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(percentile(&sorted, 25.0).unwrap(), 1.75);
        assert_relative_eq!(percentile(&sorted, 50.0).unwrap(), 2.5);
        assert_relative_eq!(percentile(&sorted, 100.0).unwrap(), 4.0);
        assert_eq!(percentile(&[], 50.0), None);
        assert_relative_eq!(percentile(&[7.0], 75.0).unwrap(), 7.0);
    }

    #[test]
    fn test_quartiles_of_unsorted() {
        let (q1, q3) = quartiles(&[64.2, 65.1, 64.8, 63.9, 500.0]).unwrap();
        assert_relative_eq!(q1, 64.2);
        assert_relative_eq!(q3, 65.1);
    }

    #[test]
    fn test_linear_weights() {
        assert!(linear_weights(0, 0.5, 1.0).is_empty());
        assert_eq!(linear_weights(1, 0.5, 1.0), vec![1.0]);
        let w = linear_weights(3, 0.5, 1.0);
        assert_relative_eq!(w[0], 0.5);
        assert_relative_eq!(w[1], 0.75);
        assert_relative_eq!(w[2], 1.0);
    }

    #[test]
    fn test_weighted_mean() {
        assert_relative_eq!(weighted_mean(&[10.0, 20.0], &[1.0, 3.0]).unwrap(), 17.5);
        assert_eq!(weighted_mean(&[], &[]), None);
        assert_eq!(weighted_mean(&[1.0], &[1.0, 2.0]), None);
    }

    #[test]
    fn test_centroid_distance() {
        let d = centroid_distance(&Point2::new(100, 100), &Point2::new(103, 104));
        assert_relative_eq!(d, 5.0);
    }
}
