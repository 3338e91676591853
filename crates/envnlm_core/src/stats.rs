//! Running and summary statistics over float samples.

use std::cmp::Ordering;

use crate::float_trait::NlmFloat;

/// Welford running mean / variance.
#[derive(Debug, Clone, Copy)]
pub struct RunningStats<F: NlmFloat> {
    count: usize,
    mean: F,
    m2: F,
}

impl<F: NlmFloat> Default for RunningStats<F> {
    fn default() -> Self {
        Self {
            count: 0,
            mean: F::zero(),
            m2: F::zero(),
        }
    }
}

impl<F: NlmFloat> RunningStats<F> {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push(&mut self, x: F) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / F::usize_as(self.count);
        self.m2 += delta * (x - self.mean);
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn mean(&self) -> F {
        self.mean
    }

    /// Sample standard deviation (divisor N - 1), zero below two samples.
    pub fn sample_std(&self) -> F {
        if self.count < 2 {
            return F::zero();
        }
        (self.m2 / F::usize_as(self.count - 1)).max(F::zero()).sqrt()
    }
}

/// Mean / std / median / max / min of a sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SummaryStats<F: NlmFloat> {
    pub mean: F,
    pub std: F,
    pub median: F,
    pub max: F,
    pub min: F,
}

impl<F: NlmFloat> SummaryStats<F> {
    /// Summarise `data`. An empty slice gives all zeros.
    pub fn from_slice(data: &[F]) -> Self {
        let n = data.len();
        if n == 0 {
            return Self {
                mean: F::zero(),
                std: F::zero(),
                median: F::zero(),
                max: F::zero(),
                min: F::zero(),
            };
        }

        let mut running = RunningStats::new();
        let mut min = F::infinity();
        let mut max = F::neg_infinity();
        for &x in data {
            running.push(x);
            min = min.min(x);
            max = max.max(x);
        }

        let mut sorted = data.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        let median = if n % 2 == 1 {
            sorted[n / 2]
        } else {
            (sorted[n / 2 - 1] + sorted[n / 2]) / F::from_f64_c(2.0)
        };

        Self {
            mean: running.mean(),
            std: running.sample_std(),
            median,
            max,
            min,
        }
    }

    /// `[mean, std, median, max, min]`
    pub fn to_array(&self) -> [F; 5] {
        [self.mean, self.std, self.median, self.max, self.min]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() < eps
    }

    #[test]
    fn test_running_stats_matches_two_pass() {
        let data = [2.0f64, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let mut rs = RunningStats::new();
        for &x in &data {
            rs.push(x);
        }
        let mean = data.iter().sum::<f64>() / 8.0;
        let var = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / 7.0;
        assert!(approx_eq(rs.mean(), 5.0, 1e-12));
        assert!(approx_eq(rs.sample_std(), var.sqrt(), 1e-12));
        assert_eq!(rs.count(), 8);
    }

    #[test]
    fn test_running_stats_large_offset() {
        // Catastrophic cancellation would show up here with a naive sum of squares
        let mut rs = RunningStats::<f32>::new();
        for x in [1.0e6f32 + 1.0, 1.0e6 + 2.0, 1.0e6 + 3.0] {
            rs.push(x);
        }
        assert!((rs.sample_std() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_running_stats_single_sample() {
        let mut rs = RunningStats::<f32>::new();
        rs.push(3.5);
        assert_eq!(rs.mean(), 3.5);
        assert_eq!(rs.sample_std(), 0.0);
    }

    #[test]
    fn test_summary_odd_and_even_median() {
        let odd = SummaryStats::from_slice(&[3.0f64, 1.0, 2.0]);
        assert_eq!(odd.median, 2.0);
        assert_eq!(odd.min, 1.0);
        assert_eq!(odd.max, 3.0);
        assert!(approx_eq(odd.std, 1.0, 1e-12));

        let even = SummaryStats::from_slice(&[4.0f64, 1.0, 3.0, 2.0]);
        assert_eq!(even.median, 2.5);
        assert_eq!(even.mean, 2.5);
    }

    #[test]
    fn test_summary_empty() {
        let s = SummaryStats::<f32>::from_slice(&[]);
        assert_eq!(s.to_array(), [0.0; 5]);
    }
}
