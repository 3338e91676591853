//! Dense per-voxel descriptor table.

use rayon::prelude::*;

use crate::environment::{
    Environment, EnvironmentBuilder, DESCRIPTOR_LEN, MEAN_COLUMN, STD_COLUMN,
};
use crate::float_trait::NlmFloat;
use crate::grid::ScalarField;
use crate::octant::OCTANTS;

/// Voxels per Rayon task when filling the table.
const TABLE_CHUNK_VOXELS: usize = 256;

/// One descriptor row per voxel, in the field's linear index order.
///
/// Stored as a single contiguous `N x 10` buffer: 8 octant averages, then
/// the descriptor mean (column 8) and std (column 9).
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentTable<F: NlmFloat> {
    data: Vec<F>,
    voxels: usize,
}

impl<F: NlmFloat> EnvironmentTable<F> {
    /// Build the descriptor of every voxel of `field`.
    pub fn build(field: &ScalarField<F>, builder: &EnvironmentBuilder<F>, parallel: bool) -> Self {
        let voxels = field.len();
        let mut data = vec![F::zero(); voxels * DESCRIPTOR_LEN];

        let fill = |index: usize, row: &mut [F]| {
            let (u, v, w) = field.coords(index);
            builder.build_environment(field, u, v, w).write_row(row);
        };

        if parallel {
            data.par_chunks_mut(TABLE_CHUNK_VOXELS * DESCRIPTOR_LEN)
                .enumerate()
                .for_each(|(chunk_idx, chunk)| {
                    let base = chunk_idx * TABLE_CHUNK_VOXELS;
                    for (k, row) in chunk.chunks_exact_mut(DESCRIPTOR_LEN).enumerate() {
                        fill(base + k, row);
                    }
                });
        } else {
            for (index, row) in data.chunks_exact_mut(DESCRIPTOR_LEN).enumerate() {
                fill(index, row);
            }
        }

        Self { data, voxels }
    }

    pub fn len(&self) -> usize {
        self.voxels
    }

    pub fn is_empty(&self) -> bool {
        self.voxels == 0
    }

    /// Full 10-value row of voxel `i`.
    #[inline(always)]
    pub fn row(&self, i: usize) -> &[F] {
        &self.data[i * DESCRIPTOR_LEN..(i + 1) * DESCRIPTOR_LEN]
    }

    #[inline(always)]
    pub fn octants(&self, i: usize) -> &[F] {
        &self.data[i * DESCRIPTOR_LEN..i * DESCRIPTOR_LEN + OCTANTS]
    }

    #[inline(always)]
    pub fn mean(&self, i: usize) -> F {
        self.data[i * DESCRIPTOR_LEN + MEAN_COLUMN]
    }

    #[inline(always)]
    pub fn std(&self, i: usize) -> F {
        self.data[i * DESCRIPTOR_LEN + STD_COLUMN]
    }

    pub fn environment(&self, i: usize) -> Environment<F> {
        Environment::from_row(self.row(i))
    }

    /// Descriptor mean of every voxel, in linear index order.
    pub fn descriptor_means(&self) -> Vec<F> {
        (0..self.voxels).map(|i| self.mean(i)).collect()
    }

    /// `(min, max)` over descriptor means; `(0, 0)` for an empty table.
    pub fn mean_range(&self) -> (F, F) {
        if self.is_empty() {
            return (F::zero(), F::zero());
        }
        (0..self.voxels).fold((F::infinity(), F::neg_infinity()), |(lo, hi), i| {
            let m = self.mean(i);
            (lo.min(m), hi.max(m))
        })
    }

    /// Raw `N x 10` buffer.
    pub fn as_slice(&self) -> &[F] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::CentralBlend;
    use crate::grid::NeighborTable;

    fn builder(radius: f64) -> EnvironmentBuilder<f64> {
        let neighbors = NeighborTable::within_radius(radius, [1.0, 1.0, 1.0]).unwrap();
        EnvironmentBuilder::new(&neighbors, CentralBlend::AllButFar, false)
    }

    #[test]
    fn test_rows_follow_linear_index() {
        let field = ScalarField::from_fn((3, 4, 2), |u, v, w| (u * u + 2 * v + 5 * w) as f64);
        let b = builder(1.5);
        let table = EnvironmentTable::build(&field, &b, false);
        assert_eq!(table.len(), 24);
        assert_eq!(table.as_slice().len(), 24 * DESCRIPTOR_LEN);

        for w in 0..2 {
            for v in 0..4 {
                for u in 0..3 {
                    let i = field.linear_index(u, v, w);
                    assert_eq!(table.environment(i), b.build_environment(&field, u, v, w));
                }
            }
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        // More voxels than one chunk so several tasks run
        let level = |u: usize, v: usize, w: usize| ((u * 7 + v * 3 + w * 11) % 13) as f64 * 0.1;
        let field = ScalarField::from_fn((9, 8, 7), level);
        let b = builder(1.0);
        let seq = EnvironmentTable::build(&field, &b, false);
        let par = EnvironmentTable::build(&field, &b, true);
        assert_eq!(seq, par);
    }

    #[test]
    fn test_mean_range_and_columns() {
        let field = ScalarField::from_vec((2, 1, 1), vec![1.0f64, 2.0]).unwrap();
        let table = EnvironmentTable::build(&field, &builder(1.0), true);
        let (lo, hi) = table.mean_range();
        assert!((lo - 1.09375).abs() < 1e-12);
        assert!((hi - 1.90625).abs() < 1e-12);
        assert_eq!(table.descriptor_means(), vec![table.mean(0), table.mean(1)]);
        assert_eq!(table.octants(1), &[2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 1.5, 1.75]);
        assert!(table.std(0) > 0.0);
    }

    #[test]
    fn test_empty_field() {
        let field = ScalarField::<f64>::zeros((0, 3, 3));
        let table = EnvironmentTable::build(&field, &builder(1.0), true);
        assert!(table.is_empty());
        assert_eq!(table.mean_range(), (0.0, 0.0));
    }
}
