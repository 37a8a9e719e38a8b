use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::BenchError;
use crate::sample::DurationSample;

/// Summary of one (operation, size) pairing. Durations are milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub ops_per_second: f64,
    #[serde(default)]
    pub percentiles: BTreeMap<String, f64>,
}

impl OperationStats {
    pub fn percentile(&self, label: &str) -> Option<f64> {
        self.percentiles.get(label).copied()
    }
}

/// Folds the samples of one (operation, size) pairing. Samples from more than
/// one pairing are rejected.
pub fn aggregate(
    samples: &[DurationSample],
    quantiles: &[f64],
) -> Result<OperationStats, BenchError> {
    if let Some(first) = samples.first() {
        if let Some(other) = samples
            .iter()
            .find(|s| s.kind != first.kind || s.size != first.size)
        {
            return Err(BenchError::InvalidConfig(format!(
                "cannot aggregate {} {} together with {} {}",
                first.kind, first.size, other.kind, other.size
            )));
        }
    }
    let millis: Vec<f64> = samples.iter().map(|sample| sample.millis).collect();
    aggregate_millis(&millis, quantiles)
}

/// Folds raw millisecond durations into `OperationStats`.
///
/// The input is left in call order; percentiles are cut from a sorted copy.
pub fn aggregate_millis(
    millis: &[f64],
    quantiles: &[f64],
) -> Result<OperationStats, BenchError> {
    if millis.is_empty() {
        return Err(BenchError::EmptySample);
    }
    if let Some(bad) = millis.iter().find(|v| !v.is_finite() || **v < 0.0) {
        return Err(BenchError::InvalidSample(*bad));
    }

    let mut sorted = millis.to_vec();
    sorted.sort_by(f64::total_cmp);

    let min = sorted[0];
    let max = sorted[sorted.len() - 1];
    // Rounding in the sum can push the mean a hair outside [min, max].
    let avg = (sorted.iter().sum::<f64>() / sorted.len() as f64).clamp(min, max);
    let ops_per_second = throughput(avg)?;

    let mut percentiles = BTreeMap::new();
    for &q in quantiles {
        if let Some(value) = percentile(&sorted, q) {
            percentiles.insert(percentile_label(q), value);
        }
    }

    Ok(OperationStats {
        count: sorted.len(),
        min,
        max,
        avg,
        ops_per_second,
        percentiles,
    })
}

/// Operations per second for a mean latency in milliseconds.
pub fn throughput(mean_millis: f64) -> Result<f64, BenchError> {
    if mean_millis == 0.0 {
        return Err(BenchError::DivisionUndefined);
    }
    if !mean_millis.is_finite() || mean_millis < 0.0 {
        return Err(BenchError::InvalidSample(mean_millis));
    }
    Ok(1000.0 / mean_millis)
}

/// Value at index `floor(q * n)` of an ascending slice, clamped to the last
/// element. `None` for an empty slice or `q` outside `(0, 1]`.
pub fn percentile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() || !(q > 0.0 && q <= 1.0) {
        return None;
    }
    let idx = ((q * sorted.len() as f64).floor() as usize).min(sorted.len() - 1);
    sorted.get(idx).copied()
}

/// `0.5` -> `p50`, `0.999` -> `p99.9`.
pub fn percentile_label(q: f64) -> String {
    let scaled = (q * 100.0 * 10_000.0).round() / 10_000.0;
    format!("p{}", scaled)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const QUANTILES: [f64; 4] = [0.5, 0.9, 0.95, 0.99];

    #[test]
    fn five_sample_scenario() {
        let stats = aggregate_millis(&[1.0, 2.0, 3.0, 4.0, 5.0], &QUANTILES).unwrap();
        assert_eq!(stats.count, 5);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 5.0);
        assert_eq!(stats.avg, 3.0);
        assert!((stats.ops_per_second - 333.333_333).abs() < 1e-3);
        assert_eq!(stats.percentile("p50"), Some(3.0));
        assert_eq!(stats.percentile("p99"), Some(5.0));
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(matches!(
            aggregate_millis(&[], &QUANTILES),
            Err(BenchError::EmptySample)
        ));
        assert!(matches!(aggregate(&[], &QUANTILES), Err(BenchError::EmptySample)));
    }

    #[test]
    fn mixed_pairings_are_rejected() {
        use crate::sample::{OperationKind, SizeDescriptor, ValueCategory};

        let small = SizeDescriptor::new(ValueCategory::Scalar, 10);
        let large = SizeDescriptor::new(ValueCategory::Scalar, 1000);
        let sample = |kind, size, millis| DurationSample { kind, size, millis };

        let same = [
            sample(OperationKind::Get, small, 1.0),
            sample(OperationKind::Get, small, 3.0),
        ];
        assert_eq!(aggregate(&same, &QUANTILES).unwrap().avg, 2.0);

        let mixed_size = [
            sample(OperationKind::Get, small, 1.0),
            sample(OperationKind::Get, large, 3.0),
        ];
        assert!(matches!(
            aggregate(&mixed_size, &QUANTILES),
            Err(BenchError::InvalidConfig(_))
        ));

        let mixed_kind = [
            sample(OperationKind::Get, small, 1.0),
            sample(OperationKind::Set, small, 3.0),
        ];
        assert!(matches!(
            aggregate(&mixed_kind, &QUANTILES),
            Err(BenchError::InvalidConfig(_))
        ));
    }

    #[test]
    fn zero_mean_is_division_undefined() {
        assert!(matches!(
            aggregate_millis(&[0.0, 0.0], &QUANTILES),
            Err(BenchError::DivisionUndefined)
        ));
    }

    #[test]
    fn nan_is_rejected() {
        assert!(matches!(
            aggregate_millis(&[1.0, f64::NAN], &QUANTILES),
            Err(BenchError::InvalidSample(_))
        ));
    }

    #[test]
    fn input_order_is_preserved() {
        let samples = vec![3.0, 1.0, 2.0];
        let stats = aggregate_millis(&samples, &QUANTILES).unwrap();
        assert_eq!(samples, vec![3.0, 1.0, 2.0]);
        assert_eq!(stats.min, 1.0);
    }

    #[test]
    fn percentile_clamps_to_last_index() {
        let sorted = [1.0, 2.0, 3.0];
        assert_eq!(percentile(&sorted, 1.0), Some(3.0));
        assert_eq!(percentile(&sorted, 0.99), Some(3.0));
        assert_eq!(percentile(&sorted, 0.0), None);
        assert_eq!(percentile(&[], 0.5), None);
    }

    #[test]
    fn identical_values_give_identical_percentiles() {
        let values = vec![7.25; 100];
        let stats = aggregate_millis(&values, &[0.01, 0.25, 0.5, 0.9, 0.99, 1.0]).unwrap();
        assert!(stats.percentiles.values().all(|v| *v == 7.25));
        assert_eq!(stats.percentiles.len(), 6);
    }

    #[test]
    fn labels() {
        assert_eq!(percentile_label(0.5), "p50");
        assert_eq!(percentile_label(0.99), "p99");
        assert_eq!(percentile_label(0.999), "p99.9");
        assert_eq!(percentile_label(1.0), "p100");
    }

    proptest! {
        #[test]
        fn bounds_hold(values in prop::collection::vec(0.001f64..10_000.0, 1..300)) {
            let stats = aggregate_millis(&values, &QUANTILES).unwrap();
            prop_assert!(stats.min <= stats.avg && stats.avg <= stats.max);
            for value in stats.percentiles.values() {
                prop_assert!(stats.min <= *value && *value <= stats.max);
            }
            prop_assert!(stats.ops_per_second > 0.0);
        }

        #[test]
        fn throughput_decreases_with_latency(a in 0.001f64..10_000.0, delta in 0.001f64..10_000.0) {
            prop_assert!(throughput(a + delta).unwrap() < throughput(a).unwrap());
        }
    }
}
