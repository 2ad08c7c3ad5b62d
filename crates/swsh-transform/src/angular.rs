//! Two-stage angular DFT between extended maps and signed frequency matrices.

use std::f64::consts::PI;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use swsh_fft::{FftEngine, frequency_bin, signed_frequency};

use crate::error::SphtResult;
use crate::extend::ExtendedMap;
use crate::grid::{EquiangularGrid, SphereMap};

/// Coefficients `I_{m,m′}` for signed `m, m′ ∈ [−lmax, lmax]`.
///
/// `m` is the longitude frequency (row), `m′` the extended-colatitude
/// frequency (column).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyMatrix {
    lmax: usize,
    data: Vec<Complex64>,
}

impl FrequencyMatrix {
    #[must_use]
    pub fn zeros(lmax: usize) -> Self {
        let width = 2 * lmax + 1;
        Self {
            lmax,
            data: vec![Complex64::new(0.0, 0.0); width * width],
        }
    }

    #[must_use]
    pub const fn lmax(&self) -> usize {
        self.lmax
    }

    #[must_use]
    pub const fn width(&self) -> usize {
        2 * self.lmax + 1
    }

    #[must_use]
    pub fn get(&self, m: i64, m_prime: i64) -> Option<Complex64> {
        self.offset(m, m_prime).map(|at| self.data[at])
    }

    /// Overwrites one coefficient; returns `false` when out of range.
    pub fn set(&mut self, m: i64, m_prime: i64, value: Complex64) -> bool {
        match self.offset(m, m_prime) {
            Some(at) => {
                self.data[at] = value;
                true
            }
            None => false,
        }
    }

    /// All `m′` coefficients for longitude frequency `m`, from `m′ = −lmax`.
    #[must_use]
    pub fn row(&self, m: i64) -> Option<&[Complex64]> {
        let lmax = self.lmax as i64;
        if m.abs() > lmax {
            return None;
        }
        let width = self.width();
        let start = (m + lmax) as usize * width;
        Some(&self.data[start..start + width])
    }

    pub(crate) fn row_mut(&mut self, m: i64) -> &mut [Complex64] {
        let width = self.width();
        let start = (m + self.lmax as i64) as usize * width;
        &mut self.data[start..start + width]
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Complex64] {
        &self.data
    }

    fn offset(&self, m: i64, m_prime: i64) -> Option<usize> {
        let lmax = self.lmax as i64;
        if m.abs() > lmax || m_prime.abs() > lmax {
            return None;
        }
        Some((m + lmax) as usize * self.width() + (m_prime + lmax) as usize)
    }
}

/// Forward stage: normalized 2-D DFT of the extended map, truncated to `|m|, |m′| ≤ lmax`.
pub(crate) fn forward(
    engine: &FftEngine,
    ext: &ExtendedMap,
    lmax: usize,
) -> SphtResult<FrequencyMatrix> {
    let rows = ext.rows();
    let nphi = ext.nphi();
    let shape = (rows, nphi);
    let mut data = ext.as_slice().to_vec();

    engine.transform_rows_unscaled(&mut data, shape, false)?;
    if ext.convention().displaced(nphi) {
        let step = PI / nphi as f64;
        for row in data.chunks_mut(nphi).skip(ext.source_ntheta()) {
            for (bin, value) in row.iter_mut().enumerate() {
                *value *= Complex64::from_polar(1.0, signed_frequency(bin, nphi) as f64 * step);
            }
        }
    }
    engine.transform_columns_unscaled(&mut data, shape, false)?;

    let scale = 1.0 / (rows * nphi) as f64;
    let band = lmax as i64;
    let mut matrix = FrequencyMatrix::zeros(lmax);
    for (kbin, row) in data.chunks(nphi).enumerate() {
        let k = signed_frequency(kbin, rows);
        if k.abs() > band {
            continue;
        }
        for (mbin, &value) in row.iter().enumerate() {
            let m = signed_frequency(mbin, nphi);
            if m.abs() <= band {
                matrix.set(m, k, value * scale);
            }
        }
    }
    Ok(matrix)
}

/// Inverse stage: alias frequencies onto the extended grid, inverse DFT,
/// then keep the half-sphere rows.
pub(crate) fn inverse(
    engine: &FftEngine,
    matrix: &FrequencyMatrix,
    grid: EquiangularGrid,
) -> SphtResult<SphereMap> {
    let rows = grid.extended_rows();
    let nphi = grid.nphi();
    let band = matrix.lmax() as i64;
    let mut data = vec![Complex64::new(0.0, 0.0); rows * nphi];
    for m in -band..=band {
        let col = frequency_bin(m, nphi);
        let Some(coefficients) = matrix.row(m) else {
            continue;
        };
        for (k, &value) in (-band..=band).zip(coefficients) {
            data[frequency_bin(k, rows) * nphi + col] += value;
        }
    }
    engine.transform_2d_unscaled(&mut data, (rows, nphi), true)?;
    data.truncate(grid.len());
    SphereMap::new(grid, data)
}

#[cfg(test)]
mod tests {
    use num_complex::Complex64;
    use swsh_fft::FftEngine;

    use super::{FrequencyMatrix, forward, inverse};
    use crate::extend::{ExtensionConvention, extend_with};
    use crate::grid::{EquiangularGrid, SphereMap};

    #[test]
    fn signed_access_is_bounds_checked() {
        let mut matrix = FrequencyMatrix::zeros(2);
        assert_eq!(matrix.width(), 5);
        assert!(matrix.set(-2, 1, Complex64::new(3.0, 0.0)));
        assert!(!matrix.set(3, 0, Complex64::new(1.0, 0.0)));
        assert_eq!(matrix.get(-2, 1), Some(Complex64::new(3.0, 0.0)));
        assert_eq!(matrix.get(0, -3), None);
        assert_eq!(matrix.row(-2).map(|row| row[3]), Some(Complex64::new(3.0, 0.0)));
    }

    #[test]
    fn spin_consistent_tone_pair_lands_in_two_cells() {
        // 2i·sinθ·e^{2iφ} = e^{2iφ}(e^{iθ} − e^{−iθ}) extends periodically for s = 1
        let grid = EquiangularGrid::new(5, 7).expect("grid");
        let map = SphereMap::from_fn(grid, |theta, phi| {
            Complex64::new(0.0, 2.0 * theta.sin()) * Complex64::from_polar(1.0, 2.0 * phi)
        });
        let engine = FftEngine::default();
        let ext = extend_with(&engine, &map, 1, ExtensionConvention::Mw).expect("extend");
        let matrix = forward(&engine, &ext, 3).expect("forward");
        assert!((matrix.get(2, 1).expect("cell") - Complex64::new(1.0, 0.0)).norm() < 1e-13);
        assert!((matrix.get(2, -1).expect("cell") + Complex64::new(1.0, 0.0)).norm() < 1e-13);
        let energy: f64 = matrix.as_slice().iter().map(|v| v.norm_sqr()).sum();
        assert!((energy - 2.0).abs() < 1e-12);
    }

    #[test]
    fn inverse_evaluates_tones_at_grid_points() {
        let grid = EquiangularGrid::new(4, 5).expect("grid");
        let mut matrix = FrequencyMatrix::zeros(2);
        matrix.set(-1, 2, Complex64::new(0.0, 2.0));
        let map = inverse(&FftEngine::default(), &matrix, grid).expect("inverse");
        for i in 0..4 {
            for j in 0..5 {
                let expected =
                    Complex64::new(0.0, 2.0) * Complex64::from_polar(1.0, 2.0 * grid.theta(i) - grid.phi(j));
                assert!((map.get(i, j).expect("sample") - expected).norm() < 1e-13);
            }
        }
    }

    #[test]
    fn legacy_compensation_matches_mw_for_odd_nphi() {
        let grid = EquiangularGrid::new(6, 9).expect("grid");
        let map = SphereMap::from_fn(grid, |theta, phi| {
            Complex64::from_polar(theta.sin().powi(2), 3.0 * phi)
                + Complex64::new(theta.cos(), 0.5) * Complex64::from_polar(1.0, -phi)
        });
        let engine = FftEngine::default();
        let mw = extend_with(&engine, &map, 0, ExtensionConvention::Mw).expect("mw");
        let legacy = extend_with(&engine, &map, 0, ExtensionConvention::Legacy).expect("legacy");
        assert_ne!(mw.as_slice(), legacy.as_slice());
        let a = forward(&engine, &mw, 4).expect("forward mw");
        let b = forward(&engine, &legacy, 4).expect("forward legacy");
        let diff = a
            .as_slice()
            .iter()
            .zip(b.as_slice())
            .map(|(x, y)| (x - y).norm())
            .fold(0.0, f64::max);
        assert!(diff < 1e-13, "diff={diff}");
    }
}
