use serde::{Deserialize, Serialize};
use swsh_fft::{BackendKind, FftError, FftOptions, PlanCacheConfig, WorkerPolicy};
use swsh_runtime::RuntimeMode;

use crate::error::{SphtError, SphtResult};
use crate::extend::ExtensionConvention;

/// Treatment of nonzero synthesis input below degree `|s|`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BelowSpinPolicy {
    /// Treat the offending coefficients as zero and log how many were dropped.
    #[default]
    ZeroFill,
    /// Fail with a domain error.
    Reject,
}

/// Configuration shared by every entrypoint of a [`crate::SpinTransform`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformOptions {
    pub mode: RuntimeMode,
    pub extension: ExtensionConvention,
    pub below_spin: BelowSpinPolicy,
    pub workers: WorkerPolicy,
    pub check_finite: bool,
    pub fft_backend: BackendKind,
    pub quadrature_cache_capacity: usize,
    /// Record per-engine FFT traces, drained with `SpinTransform::take_fft_traces`.
    #[serde(default)]
    pub fft_tracing: bool,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            mode: RuntimeMode::Strict,
            extension: ExtensionConvention::Mw,
            below_spin: BelowSpinPolicy::ZeroFill,
            workers: WorkerPolicy::Auto,
            check_finite: false,
            fft_backend: BackendKind::RustFft,
            quadrature_cache_capacity: 16,
            fft_tracing: false,
        }
    }
}

impl TransformOptions {
    #[must_use]
    pub fn with_mode(mut self, mode: RuntimeMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_extension(mut self, extension: ExtensionConvention) -> Self {
        self.extension = extension;
        self
    }

    #[must_use]
    pub fn with_below_spin(mut self, below_spin: BelowSpinPolicy) -> Self {
        self.below_spin = below_spin;
        self
    }

    #[must_use]
    pub fn with_workers(mut self, workers: WorkerPolicy) -> Self {
        self.workers = workers;
        self
    }

    #[must_use]
    pub fn with_check_finite(mut self, check_finite: bool) -> Self {
        self.check_finite = check_finite;
        self
    }

    #[must_use]
    pub fn with_fft_backend(mut self, fft_backend: BackendKind) -> Self {
        self.fft_backend = fft_backend;
        self
    }

    #[must_use]
    pub fn with_quadrature_cache_capacity(mut self, capacity: usize) -> Self {
        self.quadrature_cache_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_fft_tracing(mut self, fft_tracing: bool) -> Self {
        self.fft_tracing = fft_tracing;
        self
    }

    /// Hardened mode always rejects below-spin input.
    #[must_use]
    pub fn effective_below_spin(&self) -> BelowSpinPolicy {
        match self.mode {
            RuntimeMode::Hardened => BelowSpinPolicy::Reject,
            RuntimeMode::Strict => self.below_spin,
        }
    }

    #[must_use]
    pub fn should_check_finite(&self) -> bool {
        self.check_finite || self.mode.forces_finite_checks()
    }

    pub fn validate(&self) -> SphtResult<()> {
        self.workers.validate().map_err(|err| match err {
            FftError::InvalidWorkers { requested } => SphtError::InvalidWorkers { requested },
            other => SphtError::Fft(other),
        })
    }

    pub(crate) fn fft_options(&self) -> FftOptions {
        FftOptions::default()
            .with_mode(self.mode)
            .with_workers(self.workers)
            .with_backend(self.fft_backend)
            .with_check_finite(self.check_finite)
            .with_tracing(self.fft_tracing)
    }

    pub(crate) fn quadrature_cache_config(&self) -> PlanCacheConfig {
        PlanCacheConfig::default().with_capacity(self.quadrature_cache_capacity)
    }
}
