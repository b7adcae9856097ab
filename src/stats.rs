use ndarray::{Array1, ArrayView1};

use crate::models::{Histogram, NormalizationMethod};

/// Aggregate statistics over a non-empty intensity sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SummaryStatistics {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub std_dev: f64,
    pub coefficient_of_variation: f64,
}

/// Computes mean, range, population standard deviation and CV. `None` for an empty slice.
pub fn summarize(values: &[f64]) -> Option<SummaryStatistics> {
    let array = ArrayView1::from(values);
    let mean = array.mean()?;
    let min = array.fold(f64::INFINITY, |a, &b| a.min(b));
    let max = array.fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    let std_dev = std_dev(values)?;
    let coefficient_of_variation = if mean != 0.0 { std_dev / mean } else { 0.0 };

    Some(SummaryStatistics {
        count: array.len(),
        mean,
        min,
        max,
        std_dev,
        coefficient_of_variation,
    })
}

pub fn mean(values: &[f64]) -> Option<f64> {
    ArrayView1::from(values).mean()
}

/// Population standard deviation (divides by n).
pub fn std_dev(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(ArrayView1::from(values).std(0.0))
}

/// Equal-width histogram spanning `[min, max]` of the sample.
///
/// Each value lands in `floor((v - min) / width)`, clamped to the last bin so the maximum is
/// counted. A zero-width range puts every value in the first bin.
pub fn histogram(values: &[f64], bins: usize) -> Histogram {
    if bins == 0 {
        return Histogram {
            bin_edges: Vec::new(),
            counts: Vec::new(),
        };
    }

    let array = ArrayView1::from(values);
    let (min, max) = if array.is_empty() {
        (0.0, 0.0)
    } else {
        (
            array.fold(f64::INFINITY, |a, &b| a.min(b)),
            array.fold(f64::NEG_INFINITY, |a, &b| a.max(b)),
        )
    };
    let width = (max - min) / bins as f64;

    let mut counts = vec![0_u64; bins];
    for &value in array.iter() {
        let index = if width > 0.0 {
            (((value - min) / width).floor() as usize).min(bins - 1)
        } else {
            0
        };
        counts[index] += 1;
    }

    let mut bin_edges: Vec<f64> = (0..=bins).map(|i| min + width * i as f64).collect();
    // Accumulated floating error must not push the last edge off the observed maximum.
    bin_edges[bins] = max;

    Histogram { bin_edges, counts }
}

/// Rescales intensities for display. Division guards return zeros instead of NaN.
pub fn normalize(values: &[f64], method: NormalizationMethod) -> Array1<f64> {
    let array = ArrayView1::from(values);
    let Some(stats) = summarize(values) else {
        return Array1::zeros(0);
    };

    match method {
        NormalizationMethod::Max => scale(array, stats.max),
        NormalizationMethod::Mean => scale(array, stats.mean),
        NormalizationMethod::MinMax => {
            let range = stats.max - stats.min;
            if range > 0.0 {
                array.mapv(|v| (v - stats.min) / range)
            } else {
                Array1::zeros(array.len())
            }
        }
        NormalizationMethod::None => array.to_owned(),
    }
}

fn scale(array: ArrayView1<f64>, divisor: f64) -> Array1<f64> {
    if divisor != 0.0 {
        array.mapv(|v| v / divisor)
    } else {
        Array1::zeros(array.len())
    }
}

/// Half-up rounding to `places` decimals: `floor(x * 10^places + 0.5) / 10^places`.
pub fn round_dp(value: f64, places: i32) -> f64 {
    let factor = 10_f64.powi(places);
    (value * factor + 0.5).floor() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_uses_population_std_dev() {
        let stats = summarize(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).expect("stats");
        assert_eq!(stats.count, 8);
        assert!((stats.mean - 5.0).abs() < 1e-12);
        assert!((stats.std_dev - 2.0).abs() < 1e-12);
        assert!((stats.coefficient_of_variation - 0.4).abs() < 1e-12);
        assert_eq!(stats.min, 2.0);
        assert_eq!(stats.max, 9.0);
    }

    #[test]
    fn empty_slice_has_no_summary() {
        assert!(summarize(&[]).is_none());
        assert!(mean(&[]).is_none());
        assert!(std_dev(&[]).is_none());
    }

    #[test]
    fn zero_mean_yields_zero_cv() {
        let stats = summarize(&[0.0, 0.0]).expect("stats");
        assert_eq!(stats.coefficient_of_variation, 0.0);
    }

    #[test]
    fn histogram_counts_every_value_once() {
        let values = [0.0, 1.0, 2.5, 5.0, 7.5, 9.9, 10.0];
        let hist = histogram(&values, 4);
        assert_eq!(hist.counts.len(), 4);
        assert_eq!(hist.bin_edges.len(), 5);
        assert_eq!(hist.counts.iter().sum::<u64>(), values.len() as u64);
        // The maximum is clamped into the last bin.
        assert_eq!(hist.counts, vec![2, 1, 1, 3]);
        assert_eq!(hist.bin_edges[0], 0.0);
        assert_eq!(hist.bin_edges[4], 10.0);
    }

    #[test]
    fn constant_sample_fills_first_bin() {
        let hist = histogram(&[3.0, 3.0, 3.0], 20);
        assert_eq!(hist.counts.len(), 20);
        assert_eq!(hist.counts[0], 3);
        assert_eq!(hist.counts.iter().sum::<u64>(), 3);
    }

    #[test]
    fn normalization_methods() {
        let values = [1.0, 2.0, 4.0];
        assert_eq!(normalize(&values, NormalizationMethod::Max).to_vec(), vec![0.25, 0.5, 1.0]);
        let minmax = normalize(&values, NormalizationMethod::MinMax).to_vec();
        assert_eq!(minmax[0], 0.0);
        assert_eq!(minmax[2], 1.0);
        assert!((minmax[1] - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(normalize(&values, NormalizationMethod::None).to_vec(), values.to_vec());
        assert_eq!(
            normalize(&[0.0, 0.0], NormalizationMethod::Max).to_vec(),
            vec![0.0, 0.0]
        );
    }

    #[test]
    fn rounding_is_half_up() {
        assert_eq!(round_dp(2.7100125, 2), 2.71);
        assert_eq!(round_dp(16.666_666, 1), 16.7);
        assert_eq!(round_dp(0.125, 2), 0.13);
        assert_eq!(round_dp(-2.5, 0), -2.0);
        assert_eq!(round_dp(-80.0, 1), -80.0);
    }
}
