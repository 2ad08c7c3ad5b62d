use std::f64::consts::PI;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::{SphtError, SphtResult};

/// Equiangular sampling: `Ntheta` colatitudes from pole to pole inclusive,
/// `Nphi` longitudes on `[0, 2π)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "GridShape")]
pub struct EquiangularGrid {
    ntheta: usize,
    nphi: usize,
}

#[derive(Deserialize)]
struct GridShape {
    ntheta: usize,
    nphi: usize,
}

impl TryFrom<GridShape> for EquiangularGrid {
    type Error = SphtError;

    fn try_from(shape: GridShape) -> SphtResult<Self> {
        Self::new(shape.ntheta, shape.nphi)
    }
}

impl EquiangularGrid {
    pub fn new(ntheta: usize, nphi: usize) -> SphtResult<Self> {
        if ntheta < 2 || nphi < 1 {
            return Err(SphtError::InvalidGrid { ntheta, nphi });
        }
        Ok(Self { ntheta, nphi })
    }

    /// Smallest grid on which transforms up to `lmax` are exact.
    #[must_use]
    pub fn minimal(lmax: usize) -> Self {
        Self {
            ntheta: (lmax + 2).max(2),
            nphi: 2 * lmax + 1,
        }
    }

    #[must_use]
    pub const fn ntheta(&self) -> usize {
        self.ntheta
    }

    #[must_use]
    pub const fn nphi(&self) -> usize {
        self.nphi
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.ntheta * self.nphi
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rows of the periodic colatitude extension, `2·(Ntheta−1)`.
    #[must_use]
    pub const fn extended_rows(&self) -> usize {
        2 * (self.ntheta - 1)
    }

    #[must_use]
    pub fn theta(&self, i: usize) -> f64 {
        i as f64 * PI / (self.ntheta - 1) as f64
    }

    #[must_use]
    pub fn phi(&self, j: usize) -> f64 {
        j as f64 * 2.0 * PI / self.nphi as f64
    }

    #[must_use]
    pub fn thetas(&self) -> Vec<f64> {
        (0..self.ntheta).map(|i| self.theta(i)).collect()
    }

    #[must_use]
    pub fn phis(&self) -> Vec<f64> {
        (0..self.nphi).map(|j| self.phi(j)).collect()
    }

    /// Whether band-limited content up to `lmax` is resolved without aliasing.
    #[must_use]
    pub const fn resolves(&self, lmax: usize) -> bool {
        self.nphi > 2 * lmax && self.ntheta >= lmax + 2
    }
}

/// Complex samples on an [`EquiangularGrid`], row-major with colatitude as
/// the slow axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MapSamples")]
pub struct SphereMap {
    grid: EquiangularGrid,
    data: Vec<Complex64>,
}

#[derive(Deserialize)]
struct MapSamples {
    grid: EquiangularGrid,
    data: Vec<Complex64>,
}

impl TryFrom<MapSamples> for SphereMap {
    type Error = SphtError;

    fn try_from(samples: MapSamples) -> SphtResult<Self> {
        Self::new(samples.grid, samples.data)
    }
}

impl SphereMap {
    pub fn new(grid: EquiangularGrid, data: Vec<Complex64>) -> SphtResult<Self> {
        if data.len() != grid.len() {
            return Err(SphtError::shape(
                "sphere map samples",
                format!("{}x{}", grid.ntheta, grid.nphi),
                data.len(),
            ));
        }
        Ok(Self { grid, data })
    }

    #[must_use]
    pub fn zeros(grid: EquiangularGrid) -> Self {
        Self {
            grid,
            data: vec![Complex64::new(0.0, 0.0); grid.len()],
        }
    }

    /// Samples `f(θ, φ)` at every grid point.
    pub fn from_fn(grid: EquiangularGrid, mut f: impl FnMut(f64, f64) -> Complex64) -> Self {
        let phis = grid.phis();
        let mut data = Vec::with_capacity(grid.len());
        for i in 0..grid.ntheta {
            let theta = grid.theta(i);
            data.extend(phis.iter().map(|&phi| f(theta, phi)));
        }
        Self { grid, data }
    }

    /// Real-valued samples, e.g. a spin-0 temperature map.
    pub fn from_real(grid: EquiangularGrid, values: &[f64]) -> SphtResult<Self> {
        Self::new(
            grid,
            values.iter().map(|&v| Complex64::new(v, 0.0)).collect(),
        )
    }

    #[must_use]
    pub const fn grid(&self) -> EquiangularGrid {
        self.grid
    }

    #[must_use]
    pub const fn ntheta(&self) -> usize {
        self.grid.ntheta
    }

    #[must_use]
    pub const fn nphi(&self) -> usize {
        self.grid.nphi
    }

    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> Option<Complex64> {
        if i >= self.grid.ntheta || j >= self.grid.nphi {
            return None;
        }
        Some(self.data[i * self.grid.nphi + j])
    }

    #[must_use]
    pub fn row(&self, i: usize) -> Option<&[Complex64]> {
        let nphi = self.grid.nphi;
        self.data.get(i * nphi..(i + 1) * nphi)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Complex64] {
        &self.data
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<Complex64> {
        self.data
    }

    pub(crate) fn is_finite(&self) -> bool {
        self.data
            .iter()
            .all(|value| value.re.is_finite() && value.im.is_finite())
    }
}
