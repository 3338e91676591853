//! Rotation-invariant non-local means over a periodic grid.
//!
//! The pass runs in three steps, each a distinct type:
//!
//! 1. [`NlmDenoiser`] holds a validated [`NlmConfig`], the neighbour table
//!    and the comparator.
//! 2. [`NlmDenoiser::build_table`] borrows a field, materialises its
//!    [`EnvironmentTable`] and derives the bandwidth, giving a
//!    [`PreparedDenoiser`].
//! 3. [`PreparedDenoiser::run`] visits every unordered voxel pair once,
//!    accumulates kernel-weighted sums symmetrically and returns a
//!    [`DenoiseOutput`].
//!
//! Every voxel contributes to itself with unit weight, so the normalising
//! weight never drops below one.

use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::environment::{CentralBlend, EnvironmentBuilder, DESCRIPTOR_LEN};
use crate::environment_table::EnvironmentTable;
use crate::error::{NlmError, NlmResult};
use crate::float_trait::NlmFloat;
use crate::grid::{NeighborTable, ScalarField};
use crate::matching::{PairComparator, Prefilter, PrefilterMode, RotationalComparator};
use crate::octant::OCTANTS;
use crate::stats::SummaryStats;

// =============================================================================
// Constants
// =============================================================================

/// Default neighbour radius, in units of `voxel_spacing`.
pub const DEFAULT_RADIUS: f64 = 1.0;

/// Default fraction of the descriptor-mean range used as bandwidth.
pub const DEFAULT_PERCENTILE_THRESHOLD: f64 = 0.1;

/// Default prefilter window, as a fraction of the bandwidth.
pub const DEFAULT_PREFILTER_TOLERANCE: f64 = 1.0;

/// Minimum number of reference rows per Rayon partial.
/// Each partial owns full-length accumulators, so fewer, larger partials
/// keep memory bounded on small grids.
const RAYON_MIN_CHUNK_LEN: usize = 64;

const PROFILE_TIMING_ENV: &str = "ENVNLM_PROFILE_TIMING";

fn resolve_profile_timing() -> bool {
    std::env::var(PROFILE_TIMING_ENV)
        .ok()
        .map(|value| {
            let v = value.trim();
            v == "1"
                || v.eq_ignore_ascii_case("true")
                || v.eq_ignore_ascii_case("yes")
                || v.eq_ignore_ascii_case("on")
        })
        .unwrap_or(false)
}

// =============================================================================
// Configuration
// =============================================================================

/// How the pair pass is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Execution {
    Sequential,
    /// Rayon workers with private accumulators merged at the end.
    #[default]
    Parallel,
}

/// Denoiser parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct NlmConfig<F: NlmFloat> {
    /// Neighbour radius in the units of `voxel_spacing`.
    pub radius: F,
    /// Physical step along (u, v, w).
    pub voxel_spacing: [F; 3],
    /// Bandwidth as a fraction of the descriptor-mean range, in `[0, 1]`.
    /// Zero returns the input unchanged.
    pub percentile_threshold: F,
    pub enable_prefilter: bool,
    pub prefilter_mode: PrefilterMode,
    /// Prefilter window as a fraction of the bandwidth.
    pub prefilter_tolerance: F,
    pub central_blend: CentralBlend,
    /// Split samples with zero offset components across both half-spaces.
    pub split_zero: bool,
    pub execution: Execution,
    /// Reject grids whose estimated footprint exceeds this many bytes.
    pub memory_budget_bytes: Option<usize>,
}

impl<F: NlmFloat> Default for NlmConfig<F> {
    fn default() -> Self {
        Self {
            radius: F::from_f64_c(DEFAULT_RADIUS),
            voxel_spacing: [F::one(); 3],
            percentile_threshold: F::from_f64_c(DEFAULT_PERCENTILE_THRESHOLD),
            enable_prefilter: true,
            prefilter_mode: PrefilterMode::Mean,
            prefilter_tolerance: F::from_f64_c(DEFAULT_PREFILTER_TOLERANCE),
            central_blend: CentralBlend::AllButFar,
            split_zero: false,
            execution: Execution::Parallel,
            memory_budget_bytes: None,
        }
    }
}

impl<F: NlmFloat> NlmConfig<F> {
    pub fn validate(&self) -> NlmResult<()> {
        if !self.radius.is_finite() || self.radius < F::zero() {
            return Err(NlmError::parameter(
                "radius",
                format!("must be finite and >= 0, got {:?}", self.radius),
            ));
        }
        if self
            .voxel_spacing
            .iter()
            .any(|s| !s.is_finite() || *s <= F::zero())
        {
            return Err(NlmError::parameter(
                "voxel_spacing",
                format!(
                    "all steps must be finite and > 0, got {:?}",
                    self.voxel_spacing
                ),
            ));
        }
        NeighborTable::candidate_count(self.radius, self.voxel_spacing)?;
        if !self.percentile_threshold.is_finite()
            || self.percentile_threshold < F::zero()
            || self.percentile_threshold > F::one()
        {
            return Err(NlmError::parameter(
                "percentile_threshold",
                format!("must be in [0, 1], got {:?}", self.percentile_threshold),
            ));
        }
        if !self.prefilter_tolerance.is_finite() || self.prefilter_tolerance < F::zero() {
            return Err(NlmError::parameter(
                "prefilter_tolerance",
                format!(
                    "must be finite and >= 0, got {:?}",
                    self.prefilter_tolerance
                ),
            ));
        }
        Ok(())
    }

    fn prefilter(&self) -> Prefilter<F> {
        Prefilter::new(
            self.enable_prefilter,
            self.prefilter_mode,
            self.prefilter_tolerance,
        )
    }

    fn worker_count(&self) -> usize {
        match self.execution {
            Execution::Sequential => 1,
            Execution::Parallel => rayon::current_num_threads().max(1),
        }
    }
}

// =============================================================================
// Memory footprint
// =============================================================================

/// Estimated peak allocation of one denoising call, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryFootprint {
    /// `N x 10` descriptor table.
    pub table_bytes: usize,
    /// Sum, weight and pass-count buffers, one set per worker.
    pub accumulator_bytes: usize,
    /// Denoised field and descriptor-mean vector.
    pub output_bytes: usize,
    /// Neighbour offsets and their octant shares.
    pub neighbor_bytes: usize,
    pub total_bytes: usize,
}

impl MemoryFootprint {
    /// Bytes held per neighbour offset: the table entry plus its partition
    /// entry with one octant share.
    pub fn neighbor_entry_bytes(float_bytes: usize) -> usize {
        2 * std::mem::size_of::<[isize; 3]>()
            + std::mem::size_of::<Vec<(usize, f64)>>()
            + std::mem::size_of::<usize>()
            + float_bytes
    }

    pub fn estimate(voxels: usize, neighbors: usize, workers: usize, float_bytes: usize) -> Self {
        let table_bytes = voxels
            .saturating_mul(DESCRIPTOR_LEN)
            .saturating_mul(float_bytes);
        let per_voxel_acc = 2 * float_bytes + std::mem::size_of::<u64>();
        let accumulator_bytes = voxels
            .saturating_mul(per_voxel_acc)
            .saturating_mul(workers.max(1));
        let output_bytes = voxels.saturating_mul(2 * float_bytes);
        let neighbor_bytes = neighbors.saturating_mul(Self::neighbor_entry_bytes(float_bytes));
        Self {
            table_bytes,
            accumulator_bytes,
            output_bytes,
            neighbor_bytes,
            total_bytes: table_bytes
                .saturating_add(accumulator_bytes)
                .saturating_add(output_bytes)
                .saturating_add(neighbor_bytes),
        }
    }
}

// =============================================================================
// Output
// =============================================================================

/// Observational statistics of one pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostics<F: NlmFloat> {
    /// Kernel bandwidth `hd`.
    pub bandwidth: F,
    pub descriptor_min: F,
    pub descriptor_max: F,
    /// Per-voxel fraction of partners that passed the prefilter.
    pub pass_fraction: SummaryStats<F>,
    pub pairs_compared: u64,
    pub pairs_total: u64,
    /// Weighted neighbour samples per octant.
    pub octant_population: [F; OCTANTS],
    pub mean_octant_population: F,
}

impl<F: NlmFloat> Diagnostics<F> {
    /// `[mean, std, median, max, min]` of the prefilter pass fraction.
    pub fn monitoring_vector(&self) -> [F; 5] {
        self.pass_fraction.to_array()
    }

    /// Fraction of all unordered pairs that reached the full comparison.
    pub fn acceptance_rate(&self) -> f64 {
        if self.pairs_total == 0 {
            0.0
        } else {
            self.pairs_compared as f64 / self.pairs_total as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DenoiseOutput<F: NlmFloat> {
    pub denoised: ScalarField<F>,
    /// Descriptor mean per voxel, in linear index order.
    pub descriptor_means: Vec<F>,
    pub diagnostics: Diagnostics<F>,
}

// =============================================================================
// Accumulation
// =============================================================================

/// Private kernel sums of one worker.
struct PairAccumulator<F: NlmFloat> {
    sum: Vec<F>,
    weight: Vec<F>,
    passes: Vec<u64>,
    compared: u64,
}

impl<F: NlmFloat> PairAccumulator<F> {
    fn new(n: usize) -> Self {
        Self {
            sum: vec![F::zero(); n],
            weight: vec![F::zero(); n],
            passes: vec![0; n],
            compared: 0,
        }
    }

    fn merge(mut self, other: Self) -> Self {
        for (a, b) in self.sum.iter_mut().zip(&other.sum) {
            *a += *b;
        }
        for (a, b) in self.weight.iter_mut().zip(&other.weight) {
            *a += *b;
        }
        for (a, b) in self.passes.iter_mut().zip(&other.passes) {
            *a += *b;
        }
        self.compared += other.compared;
        self
    }
}

/// `exp(-d² / (2 hd²))`, zero for a degenerate bandwidth.
#[inline]
fn kernel_weight<F: NlmFloat>(d_sq: F, two_hd_sq: F) -> F {
    if two_hd_sq > F::zero() {
        (-d_sq / two_hd_sq).exp()
    } else {
        F::zero()
    }
}

// =============================================================================
// Denoiser
// =============================================================================

/// Configured denoiser, not yet bound to a field.
#[derive(Debug, Clone)]
pub struct NlmDenoiser<F: NlmFloat, C: PairComparator<F> = RotationalComparator> {
    config: NlmConfig<F>,
    neighbors: NeighborTable,
    builder: EnvironmentBuilder<F>,
    comparator: C,
}

impl<F: NlmFloat> NlmDenoiser<F, RotationalComparator> {
    pub fn new(config: NlmConfig<F>) -> NlmResult<Self> {
        Self::with_comparator(config, RotationalComparator::default())
    }
}

impl<F: NlmFloat, C: PairComparator<F>> NlmDenoiser<F, C> {
    /// Denoiser with a custom pair distance.
    pub fn with_comparator(config: NlmConfig<F>, comparator: C) -> NlmResult<Self> {
        config.validate()?;
        // The offset scan visits the whole bounding box.
        if let Some(budget) = config.memory_budget_bytes {
            let candidates = NeighborTable::candidate_count(config.radius, config.voxel_spacing)?;
            let required = MemoryFootprint::estimate(0, candidates, 1, F::BYTES).total_bytes;
            if required > budget {
                return Err(NlmError::TooLarge { required, budget });
            }
        }
        let neighbors = NeighborTable::within_radius(config.radius, config.voxel_spacing)?;
        let builder = EnvironmentBuilder::new(&neighbors, config.central_blend, config.split_zero);
        Ok(Self {
            config,
            neighbors,
            builder,
            comparator,
        })
    }

    pub fn config(&self) -> &NlmConfig<F> {
        &self.config
    }

    pub fn neighbors(&self) -> &NeighborTable {
        &self.neighbors
    }

    /// Footprint of denoising `voxels` voxels with this configuration.
    pub fn footprint(&self, voxels: usize) -> MemoryFootprint {
        MemoryFootprint::estimate(
            voxels,
            self.neighbors.len(),
            self.config.worker_count(),
            F::BYTES,
        )
    }

    /// Build the environment table of `field` and derive the bandwidth.
    pub fn build_table<'a>(
        &'a self,
        field: &'a ScalarField<F>,
    ) -> NlmResult<PreparedDenoiser<'a, F, C>> {
        let voxels = field.len();
        if let Some(budget) = self.config.memory_budget_bytes {
            let required = self.footprint(voxels).total_bytes;
            if required > budget {
                return Err(NlmError::TooLarge { required, budget });
            }
        }

        let started = Instant::now();
        let parallel = self.config.execution == Execution::Parallel;
        let table = EnvironmentTable::build(field, &self.builder, parallel);
        let table_time = started.elapsed();

        let (descriptor_min, descriptor_max) = table.mean_range();
        let bandwidth = self.config.percentile_threshold * (descriptor_max - descriptor_min);
        debug!(
            voxels,
            neighbors = self.neighbors.len(),
            bandwidth = ?bandwidth,
            "environment table built"
        );
        if voxels > 1 && descriptor_max == descriptor_min {
            warn!("descriptor range is flat; output will equal input");
        }

        Ok(PreparedDenoiser {
            denoiser: self,
            field,
            table,
            bandwidth,
            descriptor_min,
            descriptor_max,
            table_time,
        })
    }
}

/// Denoiser bound to a field, with its environment table built.
#[derive(Debug)]
pub struct PreparedDenoiser<'a, F: NlmFloat, C: PairComparator<F> = RotationalComparator> {
    denoiser: &'a NlmDenoiser<F, C>,
    field: &'a ScalarField<F>,
    table: EnvironmentTable<F>,
    bandwidth: F,
    descriptor_min: F,
    descriptor_max: F,
    table_time: Duration,
}

impl<'a, F: NlmFloat, C: PairComparator<F>> PreparedDenoiser<'a, F, C> {
    pub fn table(&self) -> &EnvironmentTable<F> {
        &self.table
    }

    pub fn bandwidth(&self) -> F {
        self.bandwidth
    }

    /// Compare row `i` against every `j > i` and add both symmetric terms.
    #[inline]
    fn accumulate_row(
        &self,
        i: usize,
        prefilter: &Prefilter<F>,
        two_hd_sq: F,
        acc: &mut PairAccumulator<F>,
    ) {
        let values = self.field.as_slice();
        let comparator = &self.denoiser.comparator;
        for j in (i + 1)..values.len() {
            if !prefilter.passes(&self.table, i, j, self.bandwidth) {
                continue;
            }
            acc.passes[i] += 1;
            acc.passes[j] += 1;
            acc.compared += 1;

            let k = kernel_weight(comparator.distance(&self.table, i, j), two_hd_sq);
            acc.sum[i] += k * values[j];
            acc.sum[j] += k * values[i];
            acc.weight[i] += k;
            acc.weight[j] += k;
        }
    }

    fn accumulate(&self) -> PairAccumulator<F> {
        let n = self.table.len();
        let prefilter = self.denoiser.config.prefilter();
        let two_hd_sq = F::from_f64_c(2.0) * self.bandwidth * self.bandwidth;

        match self.denoiser.config.execution {
            Execution::Sequential => {
                let mut acc = PairAccumulator::new(n);
                for i in 0..n {
                    self.accumulate_row(i, &prefilter, two_hd_sq, &mut acc);
                }
                acc
            }
            Execution::Parallel => {
                // Rows are dealt round-robin so every partial gets a similar
                // share of the upper triangle.
                let partials = rayon::current_num_threads()
                    .max(1)
                    .min(n.div_ceil(RAYON_MIN_CHUNK_LEN))
                    .max(1);
                (0..partials)
                    .into_par_iter()
                    .map(|p| {
                        let mut acc = PairAccumulator::new(n);
                        for i in (p..n).step_by(partials) {
                            self.accumulate_row(i, &prefilter, two_hd_sq, &mut acc);
                        }
                        acc
                    })
                    .reduce_with(PairAccumulator::merge)
                    .unwrap_or_else(|| PairAccumulator::new(n))
            }
        }
    }

    /// Run the pair pass and normalise.
    pub fn run(self) -> DenoiseOutput<F> {
        let n = self.table.len();
        let population = self.denoiser.builder.partition().octant_population();
        let mean_population = population.iter().copied().sum::<F>() / F::usize_as(OCTANTS);

        if n == 0 {
            debug!("empty field, nothing to denoise");
            return DenoiseOutput {
                denoised: self.field.clone(),
                descriptor_means: Vec::new(),
                diagnostics: Diagnostics {
                    bandwidth: F::zero(),
                    descriptor_min: F::zero(),
                    descriptor_max: F::zero(),
                    pass_fraction: SummaryStats::from_slice(&[]),
                    pairs_compared: 0,
                    pairs_total: 0,
                    octant_population: population,
                    mean_octant_population: mean_population,
                },
            };
        }

        let profile_timing = resolve_profile_timing();
        let started = Instant::now();
        let acc = self.accumulate();
        let pass_time = started.elapsed();

        let values = self.field.as_slice();
        let denoised: Vec<F> = values
            .iter()
            .zip(acc.sum.iter().zip(&acc.weight))
            .map(|(&x, (&s, &wt))| (x + s) / (F::one() + wt))
            .collect();
        let (nu, nv, nw) = self.field.dimensions();
        let denoised = ScalarField::from_vec((nu, nv, nw), denoised)
            .unwrap_or_else(|_| unreachable!("output has the input's length"));

        let fractions: Vec<F> = if n > 1 {
            let partners = F::usize_as(n - 1);
            acc.passes
                .iter()
                .map(|&p| F::usize_as(p as usize) / partners)
                .collect()
        } else {
            vec![F::zero(); n]
        };
        let pairs_total = (n as u64) * (n as u64 - 1) / 2;

        let diagnostics = Diagnostics {
            bandwidth: self.bandwidth,
            descriptor_min: self.descriptor_min,
            descriptor_max: self.descriptor_max,
            pass_fraction: SummaryStats::from_slice(&fractions),
            pairs_compared: acc.compared,
            pairs_total,
            octant_population: population,
            mean_octant_population: mean_population,
        };
        debug!(
            pairs_compared = diagnostics.pairs_compared,
            pairs_total,
            "pair pass complete"
        );

        if profile_timing {
            info!(
                "envnlm_profile voxels={} neighbors={} execution={:?} pairs_compared={} pairs_total={} acceptance={:.4} table_ms={:.3} pass_ms={:.3}",
                n,
                self.denoiser.neighbors.len(),
                self.denoiser.config.execution,
                diagnostics.pairs_compared,
                pairs_total,
                diagnostics.acceptance_rate(),
                self.table_time.as_secs_f64() * 1e3,
                pass_time.as_secs_f64() * 1e3,
            );
        }

        DenoiseOutput {
            denoised,
            descriptor_means: self.table.descriptor_means(),
            diagnostics,
        }
    }
}

/// Validate `config`, build the table of `field` and run the pass.
pub fn nlm_denoise<F: NlmFloat>(
    field: &ScalarField<F>,
    config: NlmConfig<F>,
) -> NlmResult<DenoiseOutput<F>> {
    let denoiser = NlmDenoiser::new(config)?;
    let prepared = denoiser.build_table(field)?;
    Ok(prepared.run())
}
