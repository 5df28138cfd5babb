//! Trailing-window aggregates

/// Trailing slice of `values` ending at `end` (inclusive), at most `size` long.
///
/// Near the start of a series the slice is shorter than `size`; it is never empty.
pub fn trailing_window(values: &[f64], end: usize, size: usize) -> &[f64] {
    let start = (end + 1).saturating_sub(size);
    &values[start..=end]
}

/// Arithmetic mean. Zero for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance (n - 1 denominator). Zero with fewer than two samples.
pub fn sample_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean(values);
    let squares: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
    squares / (values.len() - 1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_windows_at_series_start() {
        let values = [10.0, 20.0, 30.0, 40.0, 50.0, 60.0];
        assert_eq!(trailing_window(&values, 0, 5), &[10.0]);
        assert_eq!(trailing_window(&values, 2, 5), &[10.0, 20.0, 30.0]);
        assert_eq!(trailing_window(&values, 5, 5), &[20.0, 30.0, 40.0, 50.0, 60.0]);
    }

    #[test]
    fn test_mean_and_variance() {
        assert_eq!(mean(&[10.0, 20.0, 30.0]), 20.0);
        assert_eq!(sample_variance(&[10.0, 20.0, 30.0]), 100.0);
        assert_eq!(sample_variance(&[42.0]), 0.0);
        assert_eq!(mean(&[]), 0.0);
    }
}
