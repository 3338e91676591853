//! Synthetic noise and range normalisation applied before denoising.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use crate::error::{NlmError, NlmResult};
use crate::float_trait::NlmFloat;
use crate::grid::ScalarField;

/// Copy of `field` with zero-mean Gaussian noise of standard deviation
/// `sigma` added to every voxel. Deterministic for a given `seed`.
pub fn add_gaussian_noise<F: NlmFloat>(
    field: &ScalarField<F>,
    sigma: F,
    seed: u64,
) -> NlmResult<ScalarField<F>> {
    if !sigma.is_finite() || sigma < F::zero() {
        return Err(NlmError::parameter(
            "sigma",
            format!("must be finite and >= 0, got {:?}", sigma),
        ));
    }
    if sigma == F::zero() {
        return Ok(field.clone());
    }

    let std_dev = sigma
        .to_f64()
        .ok_or_else(|| NlmError::parameter("sigma", "not representable as f64"))?;
    let normal = Normal::new(0.0, std_dev)
        .map_err(|e| NlmError::parameter("sigma", e.to_string()))?;
    let mut rng = StdRng::seed_from_u64(seed);

    let noisy = field
        .as_slice()
        .iter()
        .map(|&x| x + F::from_f64_c(normal.sample(&mut rng)))
        .collect();
    ScalarField::from_vec(field.dimensions(), noisy)
}

/// Affine map of `field` onto `[0, 1]`. A flat field maps to zeros.
pub fn normalize_0_1<F: NlmFloat>(field: &ScalarField<F>) -> ScalarField<F> {
    let lo = field.min_value();
    let span = field.max_value() - lo;
    let mut out = ScalarField::zeros(field.dimensions());
    if span <= F::zero() {
        return out;
    }
    let (nu, nv, nw) = field.dimensions();
    for w in 0..nw {
        for v in 0..nv {
            for u in 0..nu {
                out.set_value(u, v, w, (field.value(u, v, w) - lo) / span);
            }
        }
    }
    out
}
