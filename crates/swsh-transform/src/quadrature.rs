//! Fourier-domain weights of the exact colatitude quadrature.
//!
//! `w(p) = ∫₀^π sinθ e^{ipθ} dθ`, stored in DFT bin order over the extended
//! colatitude circle of `2·(Ntheta−1)` samples.

use std::f64::consts::FRAC_PI_2;
use std::sync::Arc;

use num_complex::Complex64;
use swsh_fft::{BoundedCache, CacheStats, PlanCacheConfig, frequency_bin, signed_frequency};

use crate::error::{SphtError, SphtResult};

#[derive(Debug, Clone, PartialEq)]
pub struct QuadratureWeights {
    ntheta: usize,
    weights: Vec<Complex64>,
}

impl QuadratureWeights {
    #[must_use]
    pub const fn ntheta(&self) -> usize {
        self.ntheta
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Complex64] {
        &self.weights
    }

    /// Weight for a signed frequency difference, aliased onto the table.
    #[must_use]
    pub fn weight(&self, difference: i64) -> Complex64 {
        self.weights[frequency_bin(difference, self.weights.len())]
    }
}

fn sine_moment(p: i64) -> Complex64 {
    match p {
        1 => Complex64::new(0.0, FRAC_PI_2),
        -1 => Complex64::new(0.0, -FRAC_PI_2),
        p if p % 2 == 0 => {
            let p = p as f64;
            Complex64::new(2.0 / (1.0 - p * p), 0.0)
        }
        _ => Complex64::new(0.0, 0.0),
    }
}

/// Weight table for colatitude resolution `ntheta`.
pub fn quadrature_weights(ntheta: usize) -> SphtResult<QuadratureWeights> {
    if ntheta < 2 {
        return Err(SphtError::InvalidGrid { ntheta, nphi: 1 });
    }
    let len = 2 * (ntheta - 1);
    let weights = (0..len)
        .map(|bin| {
            if len % 2 == 0 && bin == len / 2 {
                // self-conjugate bin: average both aliases so the table stays Hermitian
                let p = (len / 2) as i64;
                (sine_moment(p) + sine_moment(-p)) * 0.5
            } else {
                sine_moment(signed_frequency(bin, len))
            }
        })
        .collect();
    Ok(QuadratureWeights { ntheta, weights })
}

/// Bounded, thread-safe memo of weight tables keyed by `Ntheta`.
#[derive(Debug)]
pub struct QuadratureCache {
    tables: BoundedCache<usize, QuadratureWeights>,
}

impl QuadratureCache {
    #[must_use]
    pub fn new(config: PlanCacheConfig) -> Self {
        Self {
            tables: BoundedCache::new(config),
        }
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(PlanCacheConfig::default().with_capacity(capacity))
    }

    /// Shared table for `ntheta`, and whether it was already cached.
    pub fn get(&self, ntheta: usize) -> SphtResult<(Arc<QuadratureWeights>, bool)> {
        self.tables
            .get_or_try_insert_with(ntheta, || quadrature_weights(ntheta).map(Arc::new))
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.tables.stats()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn clear(&self) {
        self.tables.clear();
    }
}

impl Default for QuadratureCache {
    fn default() -> Self {
        Self::new(PlanCacheConfig::default())
    }
}
