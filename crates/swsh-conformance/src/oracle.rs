//! Reference values by direct summation.
//!
//! Nothing here shares code with the fast transform: Wigner `d` comes from
//! the explicit finite sum with log-factorial prefactors, and synthesis is a
//! plain double loop over modes and grid points. Cost is `O(L² · Nθ · Nφ · L)`,
//! so keep fixtures small.

use std::f64::consts::PI;

use num_complex::Complex64;
use swsh_transform::{EquiangularGrid, SphereMap, modes};

/// `ln n!` for `n ≤ max`.
#[derive(Debug, Clone)]
pub struct FactorialTable {
    ln: Vec<f64>,
}

impl FactorialTable {
    #[must_use]
    pub fn new(max: usize) -> Self {
        let mut ln = Vec::with_capacity(max + 1);
        let mut acc = 0.0f64;
        ln.push(acc);
        for n in 1..=max {
            acc += (n as f64).ln();
            ln.push(acc);
        }
        Self { ln }
    }

    fn at(&self, n: i64) -> f64 {
        self.ln[n as usize]
    }
}

/// `d^l_{m′m}(β)`, rotation about the y axis.
///
/// Callers guarantee `|m′|, |m| ≤ l` and a table covering `2l`.
#[must_use]
pub fn wigner_d(table: &FactorialTable, l: i64, mp: i64, m: i64, beta: f64) -> f64 {
    let (c, s) = ((beta / 2.0).cos(), (beta / 2.0).sin());
    let half = 0.5 * (table.at(l + mp) + table.at(l - mp) + table.at(l + m) + table.at(l - m));
    let mut sum = 0.0;
    for k in 0..=2 * l {
        let (a, b, d) = (l + m - k, mp - m + k, l - mp - k);
        if a < 0 || b < 0 || d < 0 {
            continue;
        }
        let magnitude = (half - table.at(a) - table.at(k) - table.at(b) - table.at(d)).exp();
        let sign = if b % 2 == 0 { 1.0 } else { -1.0 };
        sum += sign
            * magnitude
            * c.powi((2 * l + m - mp - 2 * k) as i32)
            * s.powi((mp - m + 2 * k) as i32);
    }
    sum
}

/// `sY_lm(θ, φ) = (−1)^s √((2l+1)/4π) d^l_{m,−s}(θ) e^{imφ}`.
#[must_use]
pub fn sylm(table: &FactorialTable, spin: i32, l: i32, m: i32, theta: f64, phi: f64) -> Complex64 {
    let sign = if spin % 2 == 0 { 1.0 } else { -1.0 };
    let norm = sign * (f64::from(2 * l + 1) / (4.0 * PI)).sqrt();
    let d = wigner_d(
        table,
        i64::from(l),
        i64::from(m),
        -i64::from(spin),
        theta,
    );
    Complex64::from_polar(norm * d, f64::from(m) * phi)
}

/// Field with coefficients `alm` evaluated at every grid point.
///
/// Modes below degree `|s|` are skipped.
#[must_use]
pub fn direct_synthesis(
    alm: &[Complex64],
    spin: i32,
    lmax: usize,
    grid: EquiangularGrid,
) -> SphereMap {
    let table = FactorialTable::new(2 * lmax + 1);
    let floor = spin.unsigned_abs() as i32;
    SphereMap::from_fn(grid, |theta, phi| {
        modes(lmax)
            .filter(|&(_, l, _)| l >= floor)
            .map(|(index, l, m)| alm[index] * sylm(&table, spin, l, m, theta, phi))
            .sum()
    })
}

/// Deterministic band-limited coefficients, zero below degree `|s|`.
#[must_use]
pub fn seeded_coefficients(spin: i32, lmax: usize, seed: u64) -> Vec<Complex64> {
    let floor = spin.unsigned_abs() as i32;
    let phase = (seed % 997) as f64 * 0.013 + 0.618;
    modes(lmax)
        .map(|(index, l, _)| {
            if l < floor {
                Complex64::new(0.0, 0.0)
            } else {
                let x = (index as f64 + 1.0) * phase;
                Complex64::new(x.sin(), (1.7 * x).cos())
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::f64::consts::{FRAC_1_SQRT_2, PI};

    use super::{FactorialTable, sylm, wigner_d};

    #[test]
    fn low_degree_closed_forms() {
        let table = FactorialTable::new(8);
        let beta: f64 = 0.73;
        assert!((wigner_d(&table, 0, 0, 0, beta) - 1.0).abs() < 1e-15);
        assert!((wigner_d(&table, 1, 0, 0, beta) - beta.cos()).abs() < 1e-15);
        assert!((wigner_d(&table, 1, 1, 0, beta) + beta.sin() * FRAC_1_SQRT_2).abs() < 1e-15);
        assert!((wigner_d(&table, 1, 1, 1, beta) - (1.0 + beta.cos()) / 2.0).abs() < 1e-15);
        let p2 = (3.0 * beta.cos().powi(2) - 1.0) / 2.0;
        assert!((wigner_d(&table, 2, 0, 0, beta) - p2).abs() < 1e-14);
    }

    #[test]
    fn scalar_monopole_is_constant() {
        let table = FactorialTable::new(2);
        let expected = 1.0 / (4.0 * PI).sqrt();
        for theta in [0.0, 0.4, PI] {
            let value = sylm(&table, 0, 0, 0, theta, 1.3);
            assert!((value.re - expected).abs() < 1e-15);
            assert!(value.im.abs() < 1e-15);
        }
    }

    #[test]
    fn rows_are_normalized() {
        let table = FactorialTable::new(20);
        for l in 0..=6i64 {
            for m in -l..=l {
                let norm: f64 = (-l..=l).map(|k| wigner_d(&table, l, k, m, 1.1).powi(2)).sum();
                assert!((norm - 1.0).abs() < 1e-12, "l={l} m={m}");
            }
        }
    }
}
