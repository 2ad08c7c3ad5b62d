use swsh_fft::FftError;
use thiserror::Error;

pub type SphtResult<T> = Result<T, SphtError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SphtError {
    #[error("domain error: {detail}")]
    Domain { detail: String },
    #[error("invalid grid: ntheta={ntheta} (needs >= 2), nphi={nphi} (needs >= 1)")]
    InvalidGrid { ntheta: usize, nphi: usize },
    #[error("lmax={lmax} incompatible with spin {spin}: need lmax >= max(1, |s|)")]
    Configuration { lmax: usize, spin: i32 },
    #[error("shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: &'static str,
        expected: String,
        actual: String,
    },
    #[error("numerical instability at degree {degree}: {detail}")]
    NumericalInstability { degree: usize, detail: String },
    #[error("non-finite input rejected by policy")]
    NonFiniteInput,
    #[error("invalid worker count: {requested}")]
    InvalidWorkers { requested: usize },
    #[error(transparent)]
    Fft(#[from] FftError),
}

impl SphtError {
    pub(crate) fn domain(detail: impl Into<String>) -> Self {
        Self::Domain {
            detail: detail.into(),
        }
    }

    pub(crate) fn shape(
        context: &'static str,
        expected: impl std::fmt::Display,
        actual: impl std::fmt::Display,
    ) -> Self {
        Self::ShapeMismatch {
            context,
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}
