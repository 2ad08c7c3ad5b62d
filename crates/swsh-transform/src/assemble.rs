//! Coupling between frequency matrices and mode coefficients.
//!
//! With `Δ = d(π/2)` the reduced rotation matrix factors as
//! `d^l_{m,−s}(θ) = i^{−s−m} Σ_k Δ^l_{km} Δ^l_{k,−s} e^{ikθ}`, so both
//! directions reduce to sums over `k ≥ 0` after folding `±k` with
//! `Δ^l_{−k,m} = (−1)^{l+m} Δ^l_{km}`.

use std::f64::consts::PI;

use num_complex::Complex64;
use rayon::prelude::*;

use crate::angular::FrequencyMatrix;
use crate::engine::check_band_limit;
use crate::error::{SphtError, SphtResult};
use crate::index::{mode_count, mode_offset};
use crate::quadrature::QuadratureWeights;
use crate::wigner::{DeltaRecursion, LogFactorials, SpinColumns};

const ZERO: Complex64 = Complex64 { re: 0.0, im: 0.0 };

/// `i^p`.
fn i_pow(p: i64) -> Complex64 {
    match p.rem_euclid(4) {
        0 => Complex64::new(1.0, 0.0),
        1 => Complex64::new(0.0, 1.0),
        2 => Complex64::new(-1.0, 0.0),
        _ => Complex64::new(0.0, -1.0),
    }
}

fn parity(p: i64) -> f64 {
    if p.rem_euclid(2) == 0 { 1.0 } else { -1.0 }
}

/// `(−1)^s √((2l+1)/4π)`.
fn harmonic_norm(l: usize, spin: i32) -> f64 {
    parity(i64::from(spin)) * ((2 * l + 1) as f64 / (4.0 * PI)).sqrt()
}

/// Per-call assembler for one spin weight and band limit.
#[derive(Debug, Clone)]
pub struct HarmonicAssembler {
    spin: i32,
    lmax: usize,
    factorials: LogFactorials,
    columns: SpinColumns,
}

impl HarmonicAssembler {
    pub fn new(spin: i32, lmax: usize) -> SphtResult<Self> {
        check_band_limit(lmax, spin)?;
        let factorials = LogFactorials::for_lmax(lmax);
        let columns = SpinColumns::new(spin, lmax, &factorials)?;
        Ok(Self {
            spin,
            lmax,
            factorials,
            columns,
        })
    }

    #[must_use]
    pub const fn spin(&self) -> i32 {
        self.spin
    }

    #[must_use]
    pub const fn lmax(&self) -> usize {
        self.lmax
    }

    /// Lowest degree a spin-`s` field can populate.
    #[must_use]
    pub fn min_degree(&self) -> usize {
        self.spin.unsigned_abs() as usize
    }

    /// Mode coefficients from a forward frequency matrix.
    ///
    /// `weights` must come from a colatitude resolution of at least
    /// `2·lmax+1` so the `m′` convolution does not alias.
    pub fn analyze(
        &self,
        matrix: &FrequencyMatrix,
        weights: &QuadratureWeights,
        parallel: bool,
    ) -> SphtResult<Vec<Complex64>> {
        self.check_matrix(matrix)?;
        let band = self.lmax as i64;
        let rows = run_rows(band, parallel, |m| {
            let row = matrix.row(m).unwrap_or(&[]);
            self.analysis_row(m, row, weights)
        })?;

        let mut alm = vec![ZERO; mode_count(self.lmax)];
        for (m, acc) in (-band..=band).zip(rows) {
            let first = self.min_degree().max(m.unsigned_abs() as usize);
            for l in first..=self.lmax {
                alm[mode_offset(l, m as i32)] = acc[l];
            }
        }
        Ok(alm)
    }

    /// Frequency matrix of the map whose coefficients are `alm`.
    ///
    /// Entries with `l < |s|` are ignored; callers apply their below-spin
    /// policy beforehand.
    pub fn synthesize(&self, alm: &[Complex64], parallel: bool) -> SphtResult<FrequencyMatrix> {
        if alm.len() != mode_count(self.lmax) {
            return Err(SphtError::shape(
                "mode coefficients",
                mode_count(self.lmax),
                alm.len(),
            ));
        }
        let band = self.lmax as i64;
        let rows = run_rows(band, parallel, |m| self.synthesis_row(m, alm))?;

        let mut matrix = FrequencyMatrix::zeros(self.lmax);
        for (m, row) in (-band..=band).zip(rows) {
            matrix.row_mut(m).copy_from_slice(&row);
        }
        Ok(matrix)
    }

    fn check_matrix(&self, matrix: &FrequencyMatrix) -> SphtResult<()> {
        if matrix.lmax() != self.lmax {
            return Err(SphtError::shape(
                "frequency matrix band limit",
                self.lmax,
                matrix.lmax(),
            ));
        }
        Ok(())
    }

    /// Coefficients of order `m`, indexed by degree.
    fn analysis_row(
        &self,
        m: i64,
        row: &[Complex64],
        weights: &QuadratureWeights,
    ) -> SphtResult<Vec<Complex64>> {
        let band = self.lmax as i64;
        // J_{m,k} = 2π Σ_{m″} W(m″ − k) I_{m,m″}
        let convolved: Vec<Complex64> = (-band..=band)
            .map(|k| {
                let sum: Complex64 = (-band..=band)
                    .zip(row)
                    .map(|(k2, &value)| value * weights.weight(k2 - k))
                    .sum();
                sum * (2.0 * PI)
            })
            .collect();

        let fold = parity(m + i64::from(self.spin));
        let first = self.min_degree().max(m.unsigned_abs() as usize);
        let mut acc = vec![ZERO; self.lmax + 1];
        for k in 0..=self.lmax {
            let centre = self.lmax;
            let folded = if k == 0 {
                convolved[centre]
            } else {
                convolved[centre + k] + convolved[centre - k] * fold
            };
            let mut rec = DeltaRecursion::new(k as i32, m as i32, &self.factorials);
            let start = rec.degree().max(first);
            rec.advance_to(start)?;
            for l in start..=self.lmax {
                acc[l] += folded * (rec.value() * self.columns.get(k, l));
                if l < self.lmax {
                    rec.advance()?;
                }
            }
        }

        let phase = i_pow(i64::from(self.spin) + m);
        for (l, value) in acc.iter_mut().enumerate().skip(first) {
            *value *= phase * harmonic_norm(l, self.spin);
        }
        Ok(acc)
    }

    /// `G_{m,m′}` for `m′ = −lmax..=lmax`.
    fn synthesis_row(&self, m: i64, alm: &[Complex64]) -> SphtResult<Vec<Complex64>> {
        let first = self.min_degree().max(m.unsigned_abs() as usize);
        let scaled: Vec<Complex64> = (0..=self.lmax)
            .map(|l| {
                if l < first {
                    ZERO
                } else {
                    alm[mode_offset(l, m as i32)] * harmonic_norm(l, self.spin)
                }
            })
            .collect();

        let phase = i_pow(-i64::from(self.spin) - m);
        let fold = parity(m + i64::from(self.spin));
        let centre = self.lmax;
        let mut out = vec![ZERO; 2 * self.lmax + 1];
        for k in 0..=self.lmax {
            let mut rec = DeltaRecursion::new(k as i32, m as i32, &self.factorials);
            let start = rec.degree().max(first);
            rec.advance_to(start)?;
            let mut sum = ZERO;
            for l in start..=self.lmax {
                sum += scaled[l] * (rec.value() * self.columns.get(k, l));
                if l < self.lmax {
                    rec.advance()?;
                }
            }
            let value = sum * phase;
            out[centre + k] = value;
            if k > 0 {
                out[centre - k] = value * fold;
            }
        }
        Ok(out)
    }
}

fn run_rows<F>(band: i64, parallel: bool, row: F) -> SphtResult<Vec<Vec<Complex64>>>
where
    F: Fn(i64) -> SphtResult<Vec<Complex64>> + Send + Sync,
{
    if parallel {
        (-band..=band).into_par_iter().map(row).collect()
    } else {
        (-band..=band).map(row).collect()
    }
}
