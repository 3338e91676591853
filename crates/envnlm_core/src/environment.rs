//! Rotation-comparable environment descriptors.
//!
//! The environment of a voxel summarises its neighbourhood as one average
//! per octant, plus the mean and sample standard deviation of those eight
//! averages. Neighbour offsets are classified into octants once, up front,
//! so building a descriptor is a gather plus eight divisions.

use crate::float_trait::NlmFloat;
use crate::grid::{NeighborTable, ScalarField};
use crate::octant::{Axis, Octant, FAR_OCTANT, OCTANTS};
use crate::stats::RunningStats;

/// Values stored per voxel: 8 octant averages, mean, std.
pub const DESCRIPTOR_LEN: usize = OCTANTS + 2;

/// Column of the descriptor mean in a table row.
pub const MEAN_COLUMN: usize = OCTANTS;

/// Column of the descriptor standard deviation in a table row.
pub const STD_COLUMN: usize = OCTANTS + 1;

/// Which octant buckets receive the central voxel's own value.
///
/// The central voxel touches seven octants and belongs to none of them, so
/// the default blends it into every bucket except the all-positive one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CentralBlend {
    /// Blend into octants 0..=6, leave octant 7 as a plain average.
    #[default]
    AllButFar,
    /// Blend into all eight octants.
    All,
    /// Plain averages everywhere.
    None,
}

impl CentralBlend {
    #[inline]
    fn includes(self, octant: usize) -> bool {
        match self {
            CentralBlend::AllButFar => octant != FAR_OCTANT,
            CentralBlend::All => true,
            CentralBlend::None => false,
        }
    }
}

/// Descriptor of one voxel's neighbourhood.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Environment<F: NlmFloat> {
    pub octants: [F; OCTANTS],
    pub mean: F,
    pub std: F,
}

impl<F: NlmFloat> Environment<F> {
    /// Derive mean and sample std (divisor 7) from the octant averages.
    pub fn from_octants(octants: [F; OCTANTS]) -> Self {
        let mut stats = RunningStats::new();
        for &x in &octants {
            stats.push(x);
        }
        Self {
            octants,
            mean: stats.mean(),
            std: stats.sample_std(),
        }
    }

    /// Read back a table row.
    pub fn from_row(row: &[F]) -> Self {
        let mut octants = [F::zero(); OCTANTS];
        octants.copy_from_slice(&row[..OCTANTS]);
        Self {
            octants,
            mean: row[MEAN_COLUMN],
            std: row[STD_COLUMN],
        }
    }

    pub fn write_row(&self, row: &mut [F]) {
        row[..OCTANTS].copy_from_slice(&self.octants);
        row[MEAN_COLUMN] = self.mean;
        row[STD_COLUMN] = self.std;
    }
}

#[derive(Debug, Clone)]
struct PartitionEntry<F: NlmFloat> {
    offset: [isize; 3],
    /// (octant, weight); weights of one entry sum to 1
    shares: Vec<(usize, F)>,
}

/// Neighbour offsets pre-assigned to octant buckets.
#[derive(Debug, Clone)]
pub struct OffsetPartition<F: NlmFloat> {
    entries: Vec<PartitionEntry<F>>,
}

impl<F: NlmFloat> OffsetPartition<F> {
    /// Classify every offset of `neighbors`.
    ///
    /// Without `split_zero` a zero component counts as non-negative. With it,
    /// the sample is split across both half-spaces of each zero axis with
    /// half the weight, so the origin lands in all eight octants at 1/8.
    pub fn new(neighbors: &NeighborTable, split_zero: bool) -> Self {
        let half = F::from_f64_c(0.5);
        let entries = neighbors
            .offsets()
            .iter()
            .map(|&offset| {
                let base = Octant::from_offset(offset);
                let mut shares = vec![(base, F::one())];
                if split_zero {
                    let axes = [
                        (Axis::U, offset[0]),
                        (Axis::V, offset[1]),
                        (Axis::W, offset[2]),
                    ];
                    for (axis, component) in axes {
                        if component != 0 {
                            continue;
                        }
                        shares = shares
                            .into_iter()
                            .flat_map(|(o, wt)| [(o, wt * half), (o.mirrored(axis), wt * half)])
                            .collect();
                    }
                }
                PartitionEntry {
                    offset,
                    shares: shares.into_iter().map(|(o, wt)| (o.index(), wt)).collect(),
                }
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total sample weight landing in each octant.
    pub fn octant_population(&self) -> [F; OCTANTS] {
        let mut population = [F::zero(); OCTANTS];
        for entry in &self.entries {
            for &(o, wt) in &entry.shares {
                population[o] += wt;
            }
        }
        population
    }
}

/// Builds [`Environment`] descriptors for voxels of a field.
#[derive(Debug, Clone)]
pub struct EnvironmentBuilder<F: NlmFloat> {
    partition: OffsetPartition<F>,
    blend: CentralBlend,
}

impl<F: NlmFloat> EnvironmentBuilder<F> {
    pub fn new(neighbors: &NeighborTable, blend: CentralBlend, split_zero: bool) -> Self {
        Self {
            partition: OffsetPartition::new(neighbors, split_zero),
            blend,
        }
    }

    pub fn partition(&self) -> &OffsetPartition<F> {
        &self.partition
    }

    pub fn blend(&self) -> CentralBlend {
        self.blend
    }

    /// Descriptor of voxel `(u, v, w)`, with periodic neighbour lookup.
    ///
    /// An octant that receives no samples (and no central blend) averages to
    /// the central value, so an empty neighbour table yields the central
    /// value replicated eight times.
    pub fn build_environment(
        &self,
        field: &ScalarField<F>,
        u: usize,
        v: usize,
        w: usize,
    ) -> Environment<F> {
        let central = field.value(u, v, w);
        let mut sums = [F::zero(); OCTANTS];
        let mut weights = [F::zero(); OCTANTS];

        for entry in &self.partition.entries {
            let x = field.value_periodic(u, v, w, entry.offset);
            for &(o, wt) in &entry.shares {
                sums[o] += wt * x;
                weights[o] += wt;
            }
        }

        let mut octants = [F::zero(); OCTANTS];
        for o in 0..OCTANTS {
            octants[o] = if self.blend.includes(o) {
                (sums[o] + central) / (weights[o] + F::one())
            } else if weights[o] > F::zero() {
                sums[o] / weights[o]
            } else {
                central
            };
        }

        Environment::from_octants(octants)
    }
}
