#![forbid(unsafe_code)]

//! Spin-weighted spherical-harmonic transforms on equiangular grids.
//!
//! A spin-`s` field sampled at `θ_i = iπ/(Nθ−1)`, `φ_j = 2πj/Nφ` is extended
//! to a periodic function of colatitude, Fourier transformed in both angles,
//! and coupled to mode coefficients `a_{lm}` through Wigner `d(π/2)` values.
//! Both directions are exact for band limits the grid resolves.
//!
//! The free functions build a default [`SpinTransform`] per call. Reuse one
//! engine to share FFT plans and quadrature tables across calls.

pub mod angular;
pub mod assemble;
pub mod batch;
pub mod engine;
pub mod error;
pub mod extend;
pub mod grid;
pub mod index;
pub mod options;
pub mod quadrature;
pub mod wigner;

pub use angular::FrequencyMatrix;
pub use assemble::HarmonicAssembler;
pub use batch::{MapBatch, ModeBatch, SpinWeights};
pub use engine::SpinTransform;
pub use error::{SphtError, SphtResult};
pub use extend::{ExtendedMap, ExtensionConvention};
pub use grid::{EquiangularGrid, SphereMap};
pub use index::{index_lm, lm_index, mode_count, modes};
pub use options::{BelowSpinPolicy, TransformOptions};
pub use quadrature::{QuadratureCache, QuadratureWeights, quadrature_weights};
pub use swsh_fft::{BackendKind, CacheStats, Complex64, WorkerPolicy};
pub use swsh_runtime::{RuntimeMode, TransformEvidenceEntry, TransformOperation};

/// Mode coefficients of a spin-`s` map up to degree `lmax`.
pub fn map2salm(map: &SphereMap, spin: i32, lmax: usize) -> SphtResult<Vec<Complex64>> {
    SpinTransform::default().map2salm(map, spin, lmax)
}

/// Samples of the spin-`s` field with coefficients `alm` on an `(ntheta, nphi)` grid.
pub fn salm2map(
    alm: &[Complex64],
    spin: i32,
    lmax: usize,
    ntheta: usize,
    nphi: usize,
) -> SphtResult<SphereMap> {
    SpinTransform::default().salm2map(alm, spin, lmax, ntheta, nphi)
}

/// Periodic colatitude extension of `map` onto `2(Nθ−1)` rows.
pub fn extend_map(
    map: &SphereMap,
    spin: i32,
    convention: ExtensionConvention,
) -> SphtResult<ExtendedMap> {
    SpinTransform::new(TransformOptions::default().with_extension(convention))?
        .extend_map(map, spin)
}
