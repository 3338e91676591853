//! Environment NLM Core Library
//!
//! Rotation-invariant non-local means denoising for scalar densities sampled
//! on periodic 3D lattices. Each voxel is summarised by the average density
//! in the eight octants around it; voxel pairs are compared under the ten
//! axis rotations that permute those octants, and each voxel is replaced by
//! a kernel-weighted average over the voxels whose environments match.

pub mod denoiser;
pub mod environment;
pub mod environment_table;
pub mod error;
pub mod float_trait;
pub mod grid;
pub mod matching;
pub mod noise;
pub mod octant;
pub mod stats;

// Re-export commonly used types at the crate root
pub use denoiser::{
    nlm_denoise, DenoiseOutput, Diagnostics, Execution, MemoryFootprint, NlmConfig, NlmDenoiser,
    PreparedDenoiser,
};
pub use environment::{CentralBlend, Environment, EnvironmentBuilder};
pub use environment_table::EnvironmentTable;
pub use error::{NlmError, NlmResult};
pub use float_trait::NlmFloat;
pub use grid::{NeighborTable, ScalarField};
pub use matching::{PairComparator, Prefilter, PrefilterMode, RotationalComparator};
pub use noise::{add_gaussian_noise, normalize_0_1};
pub use octant::{Octant, RotationTable};
pub use stats::{RunningStats, SummaryStats};
