//! Outlier-resistant reduction of one channel's sample set.

use crate::{SamplingError, SamplingResult};

/// How a sample set is collapsed to one value.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum AggregationMode {
    #[default]
    /// Middle element, or the mean of the two central elements for even counts.
    Median,
    /// Mean after dropping `outlier_ratio / 2` of the samples from each tail.
    ///
    /// `outlier_ratio` must lie in `[0, 1)`.
    TrimmedMean { outlier_ratio: f64 },
}

impl AggregationMode {
    pub fn validate(&self) -> SamplingResult<()> {
        match *self {
            AggregationMode::Median => Ok(()),
            AggregationMode::TrimmedMean { outlier_ratio } => {
                if outlier_ratio.is_finite() && (0.0..1.0).contains(&outlier_ratio) {
                    Ok(())
                } else {
                    Err(SamplingError::invalid(format!(
                        "outlier ratio {outlier_ratio} outside [0, 1)"
                    )))
                }
            }
        }
    }
}

/// Reduce `readings` to a single robust scalar. The input is not modified.
pub fn aggregate(readings: &[f64], mode: AggregationMode) -> SamplingResult<f64> {
    mode.validate()?;
    if readings.is_empty() {
        return Err(SamplingError::EmptyInput);
    }
    if let Some(bad) = readings.iter().find(|v| !v.is_finite()) {
        return Err(SamplingError::invalid(format!("non-finite reading {bad}")));
    }

    let mut sorted = readings.to_vec();
    sorted.sort_by(f64::total_cmp);

    match mode {
        AggregationMode::Median => Ok(median_of_sorted(&sorted)),
        AggregationMode::TrimmedMean { outlier_ratio } => {
            // floor(n * r / 2) < n / 2 for r < 1, so at least one sample survives.
            let trim = (sorted.len() as f64 * outlier_ratio / 2.0).floor() as usize;
            let kept = &sorted[trim..sorted.len() - trim];
            Ok(kept.iter().sum::<f64>() / kept.len() as f64)
        }
    }
}

fn median_of_sorted(sorted: &[f64]) -> f64 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_odd_and_even() {
        assert_eq!(aggregate(&[3.0, 1.0, 2.0], AggregationMode::Median).unwrap(), 2.0);
        assert_eq!(
            aggregate(&[4.0, 1.0, 3.0, 2.0], AggregationMode::Median).unwrap(),
            2.5
        );
        assert_eq!(aggregate(&[7.5], AggregationMode::Median).unwrap(), 7.5);
    }

    #[test]
    fn median_ignores_a_spike() {
        let readings = [1.0, 1.1, 0.9, 250.0, 1.0];
        assert_eq!(aggregate(&readings, AggregationMode::Median).unwrap(), 1.0);
    }

    #[test]
    fn trimmed_mean_drops_tails() {
        // n = 10, r = 0.4 -> drop 2 from each end.
        let readings = [-100.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 900.0];
        let mode = AggregationMode::TrimmedMean { outlier_ratio: 0.4 };
        assert!((aggregate(&readings, mode).unwrap() - 4.5).abs() < 1e-12);
    }

    #[test]
    fn trimmed_mean_zero_ratio_is_mean() {
        let readings = [1.0, 2.0, 3.0, 10.0];
        let mode = AggregationMode::TrimmedMean { outlier_ratio: 0.0 };
        assert_eq!(aggregate(&readings, mode).unwrap(), 4.0);
    }

    #[test]
    fn empty_input_rejected() {
        assert_eq!(
            aggregate(&[], AggregationMode::Median),
            Err(SamplingError::EmptyInput)
        );
    }

    #[test]
    fn outlier_ratio_out_of_range_rejected() {
        for r in [-0.1, 1.0, 1.5, f64::NAN] {
            let mode = AggregationMode::TrimmedMean { outlier_ratio: r };
            assert!(matches!(
                aggregate(&[1.0, 2.0], mode),
                Err(SamplingError::InvalidParameter { .. })
            ));
        }
    }

    #[test]
    fn parameter_checked_before_emptiness() {
        let mode = AggregationMode::TrimmedMean { outlier_ratio: 2.0 };
        assert!(matches!(
            aggregate(&[], mode),
            Err(SamplingError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn nan_reading_rejected() {
        assert!(aggregate(&[1.0, f64::NAN], AggregationMode::Median).is_err());
    }
}
