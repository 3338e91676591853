//! Pair tests run inside the denoising pass: the cheap descriptor-statistics
//! prefilter and the full rotational comparison.

use crate::environment_table::EnvironmentTable;
use crate::float_trait::NlmFloat;
use crate::octant::{RotationTable, OCTANTS, ROTATIONS};

/// Which descriptor statistics the prefilter looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrefilterMode {
    /// `|Δmean| < eps * hd`
    #[default]
    Mean,
    /// `|Δmean + Δstd| < eps * hd` and `|Δmean - Δstd| < eps * hd`
    MeanAndStd,
}

/// Cheap necessary test that skips clearly dissimilar pairs.
///
/// Smaller tolerances prune more pairs and may drop pairs whose kernel weight
/// would not have been negligible. A large enough tolerance accepts every
/// pair the full comparison would weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prefilter<F: NlmFloat> {
    pub enabled: bool,
    pub mode: PrefilterMode,
    pub tolerance: F,
}

impl<F: NlmFloat> Prefilter<F> {
    pub fn new(enabled: bool, mode: PrefilterMode, tolerance: F) -> Self {
        Self {
            enabled,
            mode,
            tolerance,
        }
    }

    /// Whether the pair `(i, j)` should go on to the full comparison.
    #[inline]
    pub fn passes(&self, table: &EnvironmentTable<F>, i: usize, j: usize, hd: F) -> bool {
        if !self.enabled {
            return true;
        }
        let window = self.tolerance * hd;
        let d_mean = table.mean(i) - table.mean(j);
        match self.mode {
            PrefilterMode::Mean => d_mean.abs() < window,
            PrefilterMode::MeanAndStd => {
                let d_std = table.std(i) - table.std(j);
                (d_mean + d_std).abs() < window && (d_mean - d_std).abs() < window
            }
        }
    }
}

/// Distance between two descriptors of one table.
///
/// The pass evaluates each unordered pair once, as `distance(i, j)` with
/// `i < j`, and applies the result to both voxels.
pub trait PairComparator<F: NlmFloat>: Sync {
    fn distance(&self, table: &EnvironmentTable<F>, i: usize, j: usize) -> F;
}

/// Minimum mean squared octant difference over the rotation table.
#[derive(Debug, Clone, Default)]
pub struct RotationalComparator {
    rotations: RotationTable,
}

impl RotationalComparator {
    pub fn new(rotations: RotationTable) -> Self {
        Self { rotations }
    }

    pub fn rotations(&self) -> &RotationTable {
        &self.rotations
    }

    /// `min_r Σ_o (a[rot[r][o]] - b[o])² / 8`, identity included.
    #[inline]
    pub fn min_rotated_sq_distance<F: NlmFloat>(&self, a: &[F], b: &[F]) -> F {
        let inv = F::from_f64_c(1.0 / OCTANTS as f64);
        let mut best = F::infinity();
        for r in 0..ROTATIONS {
            let row = self.rotations.row(r);
            let mut acc = F::zero();
            for o in 0..OCTANTS {
                let diff = a[row[o] as usize] - b[o];
                acc += diff * diff;
            }
            best = best.min(acc * inv);
        }
        best
    }
}

impl<F: NlmFloat> PairComparator<F> for RotationalComparator {
    #[inline]
    fn distance(&self, table: &EnvironmentTable<F>, i: usize, j: usize) -> F {
        self.min_rotated_sq_distance(table.octants(i), table.octants(j))
    }
}
