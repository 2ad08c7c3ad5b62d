//! Reduced rotation-matrix elements at `β = π/2`.
//!
//! `Δ^l_{kn} = d^l_{kn}(π/2)` is generated by the three-term recursion in `l`
//! at fixed `(k, n)`, seeded in closed form at `l₀ = max(|k|, |n|)`. Seeds
//! shrink like `2^{−l₀}`, so each recursion carries a base-2 exponent until its
//! mantissa has grown back into the normal double range.

use std::f64::consts::LN_2;

use rayon::prelude::*;

use crate::error::{SphtError, SphtResult};

const RESCALE_BITS: i32 = 256;
const SCALED_SEED_EXPONENT: i32 = -600;

/// Table of `ln(i!)` for `i = 0..=n`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogFactorials {
    table: Vec<f64>,
}

impl LogFactorials {
    #[must_use]
    pub fn new(n: usize) -> Self {
        let mut table = Vec::with_capacity(n + 1);
        let mut acc = 0.0_f64;
        table.push(acc);
        for i in 1..=n {
            acc += (i as f64).ln();
            table.push(acc);
        }
        Self { table }
    }

    /// Table sized for every seed up to degree `lmax`.
    #[must_use]
    pub fn for_lmax(lmax: usize) -> Self {
        Self::new(2 * lmax)
    }

    #[must_use]
    pub fn max_argument(&self) -> usize {
        self.table.len() - 1
    }

    #[must_use]
    pub fn ln_factorial(&self, i: usize) -> f64 {
        self.table[i]
    }
}

/// Closed-form `Δ^{l₀}_{kn}` at `l₀ = max(|k|, |n|)` as `(sign, ln|Δ|)`.
fn seed(k: i64, n: i64, lf: &LogFactorials) -> (f64, f64) {
    let (j, other, mut sign) = if k.abs() >= n.abs() {
        let j = k.abs();
        let positive = k < 0 || (j - n) % 2 == 0;
        (j, n, if positive { 1.0 } else { -1.0 })
    } else {
        let j = n.abs();
        let positive = n < 0 || (j - k) % 2 == 0;
        (j, k, if positive { 1.0 } else { -1.0 })
    };
    if k.abs() < n.abs() && (k - n) % 2 != 0 {
        sign = -sign;
    }
    let ln_magnitude = -(j as f64) * LN_2
        + 0.5
            * (lf.ln_factorial((2 * j) as usize)
                - lf.ln_factorial((j + other) as usize)
                - lf.ln_factorial((j - other) as usize));
    (sign, ln_magnitude)
}

/// `x · 2^e` without overflowing or flushing the intermediate power.
fn ldexp(x: f64, e: i32) -> f64 {
    let half = e / 2;
    x * 2.0_f64.powi(half) * 2.0_f64.powi(e - half)
}

/// Stateful `Δ^l_{kn}` generator advanced one degree at a time.
#[derive(Debug, Clone, PartialEq)]
pub struct DeltaRecursion {
    k: f64,
    n: f64,
    degree: usize,
    prev: f64,
    cur: f64,
    exponent: i32,
}

impl DeltaRecursion {
    /// Starts at degree `max(|k|, |n|)`; `lf` must cover twice that degree.
    #[must_use]
    pub fn new(k: i32, n: i32, lf: &LogFactorials) -> Self {
        let (k, n) = (i64::from(k), i64::from(n));
        let (sign, ln_magnitude) = seed(k, n, lf);
        let binary_exponent = (ln_magnitude / LN_2).floor();
        let (cur, exponent) = if binary_exponent < f64::from(SCALED_SEED_EXPONENT) {
            let e = binary_exponent as i32;
            (sign * (ln_magnitude - f64::from(e) * LN_2).exp(), e)
        } else {
            (sign * ln_magnitude.exp(), 0)
        };
        Self {
            k: k as f64,
            n: n as f64,
            degree: k.abs().max(n.abs()) as usize,
            prev: 0.0,
            cur,
            exponent,
        }
    }

    /// Degree of the current value.
    #[must_use]
    pub const fn degree(&self) -> usize {
        self.degree
    }

    /// `Δ^{degree}_{kn}`; values below the double range read as zero.
    #[must_use]
    pub fn value(&self) -> f64 {
        if self.exponent == 0 {
            self.cur
        } else {
            ldexp(self.cur, self.exponent)
        }
    }

    /// Step to the next degree.
    pub fn advance(&mut self) -> SphtResult<()> {
        let l = self.degree as f64;
        let next = if self.degree == 0 {
            // only reachable for k = n = 0, where Δ¹₀₀ = cos(π/2)
            0.0
        } else {
            let (k, n) = (self.k, self.n);
            let up = l * (((l + 1.0).powi(2) - k * k) * ((l + 1.0).powi(2) - n * n)).sqrt();
            let mid = -(2.0 * l + 1.0) * k * n;
            let down = (l + 1.0) * ((l * l - k * k) * (l * l - n * n)).sqrt();
            (mid * self.cur - down * self.prev) / up
        };
        self.prev = self.cur;
        self.cur = next;
        self.degree += 1;

        if !self.cur.is_finite() {
            return Err(SphtError::NumericalInstability {
                degree: self.degree,
                detail: format!(
                    "rotation recursion for (k={}, n={}) produced {}",
                    self.k, self.n, self.cur
                ),
            });
        }
        if self.exponent < 0 && self.cur.abs() > 2.0_f64.powi(RESCALE_BITS) {
            let shift = RESCALE_BITS.min(-self.exponent);
            let factor = 2.0_f64.powi(-shift);
            self.prev *= factor;
            self.cur *= factor;
            self.exponent += shift;
        }
        Ok(())
    }

    /// Advance until the current degree is at least `degree`.
    pub fn advance_to(&mut self, degree: usize) -> SphtResult<()> {
        while self.degree < degree {
            self.advance()?;
        }
        Ok(())
    }
}

/// Single element `Δ^l_{kn}`, zero when `l < max(|k|, |n|)`.
pub fn delta(l: usize, k: i32, n: i32) -> SphtResult<f64> {
    let start = k.unsigned_abs().max(n.unsigned_abs()) as usize;
    if l < start {
        return Ok(0.0);
    }
    let lf = LogFactorials::new(2 * start);
    let mut rec = DeltaRecursion::new(k, n, &lf);
    rec.advance_to(l)?;
    Ok(rec.value())
}

/// Per-call arena of the spin columns `Δ^l_{k,−s}` for `k = 0..=lmax`.
#[derive(Debug, Clone, PartialEq)]
pub struct SpinColumns {
    spin: i32,
    lmax: usize,
    starts: Vec<usize>,
    columns: Vec<Vec<f64>>,
}

impl SpinColumns {
    pub fn new(spin: i32, lmax: usize, lf: &LogFactorials) -> SphtResult<Self> {
        let built = (0..=lmax)
            .into_par_iter()
            .map(|k| {
                let mut rec = DeltaRecursion::new(k as i32, -spin, lf);
                let start = rec.degree();
                let mut column = Vec::with_capacity((lmax + 1).saturating_sub(start));
                if start <= lmax {
                    column.push(rec.value());
                    for _ in start..lmax {
                        rec.advance()?;
                        column.push(rec.value());
                    }
                }
                Ok((start, column))
            })
            .collect::<SphtResult<Vec<_>>>()?;
        let (starts, columns) = built.into_iter().unzip();
        Ok(Self {
            spin,
            lmax,
            starts,
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

    /// First degree with a stored value for row `k`.
    #[must_use]
    pub fn start(&self, k: usize) -> usize {
        self.starts[k]
    }

    /// `Δ^l_{k,−s}`, zero outside the stored range.
    #[must_use]
    pub fn get(&self, k: usize, l: usize) -> f64 {
        let start = self.starts[k];
        if l < start {
            return 0.0;
        }
        self.columns[k].get(l - start).copied().unwrap_or(0.0)
    }
}
