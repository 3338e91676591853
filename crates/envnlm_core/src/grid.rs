//! Periodic 3D scalar grid and lattice neighbour offsets.
//!
//! The field is stored as an `ndarray::Array3` of shape `(Nw, Nv, Nu)` in
//! standard (row-major) layout, so the flat slice index of `(u, v, w)` is
//! `(w * Nv + v) * Nu + u`. Every table in the crate is indexed with this
//! same linear index.

use ndarray::{Array3, ArrayView3};

use crate::error::{NlmError, NlmResult};
use crate::float_trait::NlmFloat;

/// Scalar density sampled on a periodic `(Nu, Nv, Nw)` lattice.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarField<F: NlmFloat> {
    /// Shape is [Nw, Nv, Nu]
    data: Array3<F>,
}

impl<F: NlmFloat> ScalarField<F> {
    /// Create a field of zeros with dimensions `(nu, nv, nw)`.
    pub fn zeros(dims: (usize, usize, usize)) -> Self {
        let (nu, nv, nw) = dims;
        Self {
            data: Array3::zeros((nw, nv, nu)),
        }
    }

    /// Create a field from values already in linear `(w, v, u)` order.
    pub fn from_vec(dims: (usize, usize, usize), values: Vec<F>) -> NlmResult<Self> {
        let (nu, nv, nw) = dims;
        let expected = nu
            .checked_mul(nv)
            .and_then(|n| n.checked_mul(nw))
            .ok_or_else(|| {
                NlmError::InvalidDimensions(format!("{}x{}x{} overflows usize", nu, nv, nw))
            })?;
        if values.len() != expected {
            return Err(NlmError::InvalidDimensions(format!(
                "expected {} values for a {}x{}x{} grid, got {}",
                expected,
                nu,
                nv,
                nw,
                values.len()
            )));
        }
        let data = Array3::from_shape_vec((nw, nv, nu), values)
            .map_err(|e| NlmError::InvalidDimensions(e.to_string()))?;
        Ok(Self { data })
    }

    /// Wrap an existing array of shape `(Nw, Nv, Nu)`.
    ///
    /// Non-standard layouts are copied into standard order so the linear
    /// index convention holds.
    pub fn from_array(data: Array3<F>) -> Self {
        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().to_owned()
        };
        Self { data }
    }

    /// Build a field by evaluating `f(u, v, w)` at every grid point.
    pub fn from_fn(
        dims: (usize, usize, usize),
        mut f: impl FnMut(usize, usize, usize) -> F,
    ) -> Self {
        let (nu, nv, nw) = dims;
        Self {
            data: Array3::from_shape_fn((nw, nv, nu), |(w, v, u)| f(u, v, w)),
        }
    }

    /// Grid dimensions `(Nu, Nv, Nw)`.
    pub fn dimensions(&self) -> (usize, usize, usize) {
        let (nw, nv, nu) = self.data.dim();
        (nu, nv, nw)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn value(&self, u: usize, v: usize, w: usize) -> F {
        self.data[[w, v, u]]
    }

    #[inline]
    pub fn set_value(&mut self, u: usize, v: usize, w: usize, value: F) {
        self.data[[w, v, u]] = value;
    }

    /// Value at `(u + du, v + dv, w + dw)` with periodic wrap-around.
    #[inline]
    pub fn value_periodic(&self, u: usize, v: usize, w: usize, offset: [isize; 3]) -> F {
        let (nu, nv, nw) = self.dimensions();
        let uu = wrap(u, offset[0], nu);
        let vv = wrap(v, offset[1], nv);
        let ww = wrap(w, offset[2], nw);
        self.data[[ww, vv, uu]]
    }

    /// Linear index of `(u, v, w)`: `(w * Nv + v) * Nu + u`.
    #[inline]
    pub fn linear_index(&self, u: usize, v: usize, w: usize) -> usize {
        let (nu, nv, _) = self.dimensions();
        (w * nv + v) * nu + u
    }

    /// Inverse of [`ScalarField::linear_index`].
    #[inline]
    pub fn coords(&self, index: usize) -> (usize, usize, usize) {
        let (nu, nv, _) = self.dimensions();
        let u = index % nu;
        let v = (index / nu) % nv;
        let w = index / (nu * nv);
        (u, v, w)
    }

    /// Flat values in linear index order.
    pub fn as_slice(&self) -> &[F] {
        // Standard layout is an invariant of every constructor.
        self.data
            .as_slice()
            .unwrap_or_else(|| unreachable!("ScalarField is always in standard layout"))
    }

    pub fn view(&self) -> ArrayView3<'_, F> {
        self.data.view()
    }

    pub fn into_array(self) -> Array3<F> {
        self.data
    }

    /// Minimum value, or zero for an empty field.
    pub fn min_value(&self) -> F {
        if self.is_empty() {
            return F::zero();
        }
        self.data
            .iter()
            .copied()
            .fold(F::infinity(), |a, b| if b < a { b } else { a })
    }

    /// Maximum value, or zero for an empty field.
    pub fn max_value(&self) -> F {
        if self.is_empty() {
            return F::zero();
        }
        self.data
            .iter()
            .copied()
            .fold(F::neg_infinity(), |a, b| if b > a { b } else { a })
    }

    /// Arithmetic mean, or zero for an empty field.
    pub fn mean_value(&self) -> F {
        if self.is_empty() {
            return F::zero();
        }
        self.data.iter().copied().sum::<F>() / F::usize_as(self.len())
    }
}

#[inline]
fn wrap(base: usize, offset: isize, n: usize) -> usize {
    (base as isize + offset).rem_euclid(n as isize) as usize
}

/// Integer lattice offsets within a radius of the origin.
///
/// The origin itself is part of the table. Offsets are enumerated in
/// `(w, v, u)` row-major order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborTable {
    /// (du, dv, dw)
    offsets: Vec<[isize; 3]>,
}

impl NeighborTable {
    /// Largest offset `(ru, rv, rw)` reachable along each axis.
    ///
    /// Fails when `radius / step` does not fit in an `isize`.
    pub fn reach<F: NlmFloat>(radius: F, spacing: [F; 3]) -> NlmResult<[isize; 3]> {
        let mut reach = [0isize; 3];
        for (slot, step) in reach.iter_mut().zip(spacing) {
            let steps = (radius / step).floor();
            let Some(steps) = steps.to_isize().filter(|r| *r < isize::MAX) else {
                return Err(NlmError::parameter(
                    "radius",
                    format!("{:?} / {:?} exceeds isize", radius, step),
                ));
            };
            *slot = steps.max(0);
        }
        Ok(reach)
    }

    /// Number of lattice points in the bounding box scanned for `radius`.
    ///
    /// This bounds the table length from above and is known before the scan.
    pub fn candidate_count<F: NlmFloat>(radius: F, spacing: [F; 3]) -> NlmResult<usize> {
        let reach = Self::reach(radius, spacing)?;
        reach
            .iter()
            .try_fold(1usize, |acc, &r| {
                (r as usize)
                    .checked_mul(2)
                    .and_then(|d| d.checked_add(1))
                    .and_then(|d| acc.checked_mul(d))
            })
            .ok_or_else(|| {
                NlmError::parameter(
                    "radius",
                    format!("{:?} spans more lattice points than usize holds", radius),
                )
            })
    }

    /// All offsets with `(du*su)^2 + (dv*sv)^2 + (dw*sw)^2 <= radius^2`.
    ///
    /// `spacing` is the physical step `(su, sv, sw)` along each lattice axis.
    /// Callers validate `radius >= 0` and `spacing > 0` first.
    pub fn within_radius<F: NlmFloat>(radius: F, spacing: [F; 3]) -> NlmResult<Self> {
        let r_sq = radius * radius;
        let [ru, rv, rw] = Self::reach(radius, spacing)?;

        let mut offsets = Vec::new();
        for dw in -rw..=rw {
            for dv in -rv..=rv {
                for du in -ru..=ru {
                    let x = F::isize_as(du) * spacing[0];
                    let y = F::isize_as(dv) * spacing[1];
                    let z = F::isize_as(dw) * spacing[2];
                    if x * x + y * y + z * z <= r_sq {
                        offsets.push([du, dv, dw]);
                    }
                }
            }
        }
        Ok(Self { offsets })
    }

    /// Table from an explicit list of offsets.
    pub fn from_offsets(offsets: Vec<[isize; 3]>) -> Self {
        Self { offsets }
    }

    pub fn offsets(&self) -> &[[isize; 3]] {
        &self.offsets
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}
