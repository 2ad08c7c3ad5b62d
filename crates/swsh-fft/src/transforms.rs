use std::collections::VecDeque;
use std::f64::consts::PI;
use std::fmt::{Display, Formatter};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use swsh_runtime::RuntimeMode;

pub use num_complex::Complex64;

use crate::plan::{CacheStats, FftPlanCache, PlanCacheConfig, PlanKey};
use crate::TransformKind;

/// Backends that can serve FFT requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    RustFft,
    /// O(n^2) direct DFT, kept as a reference implementation.
    NaiveDft,
}

impl BackendKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::RustFft => "rustfft",
            Self::NaiveDft => "naive_dft",
        }
    }
}

/// In-place unscaled transform over consecutive chunks of `len` values.
pub trait FftBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Transforms every `len`-sized chunk of `data`. Returns `true` when the
    /// backend reused a cached plan.
    fn process_chunks(&self, data: &mut [Complex64], len: usize, inverse: bool, parallel: bool)
    -> bool;

    fn plan_stats(&self) -> Option<CacheStats> {
        None
    }
}

#[derive(Debug, Default)]
pub struct NaiveDftBackend;

impl NaiveDftBackend {
    fn transform_one(chunk: &mut [Complex64], inverse: bool) {
        let n = chunk.len();
        if n == 0 {
            return;
        }
        let sign = if inverse { 1.0 } else { -1.0 };
        let input = chunk.to_vec();
        for (k, out) in chunk.iter_mut().enumerate() {
            let mut acc = Complex64::new(0.0, 0.0);
            for (t, &value) in input.iter().enumerate() {
                let phase = ((k * t) % n) as f64;
                let angle = sign * 2.0 * PI * phase / (n as f64);
                acc += value * Complex64::from_polar(1.0, angle);
            }
            *out = acc;
        }
    }
}

impl FftBackend for NaiveDftBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::NaiveDft
    }

    fn process_chunks(
        &self,
        data: &mut [Complex64],
        len: usize,
        inverse: bool,
        parallel: bool,
    ) -> bool {
        if len == 0 {
            return false;
        }
        if parallel {
            data.par_chunks_mut(len)
                .for_each(|chunk| Self::transform_one(chunk, inverse));
        } else {
            data.chunks_mut(len)
                .for_each(|chunk| Self::transform_one(chunk, inverse));
        }
        false
    }
}

/// rustfft-backed transforms with an engine-local plan cache.
#[derive(Debug)]
pub struct RustFftBackend {
    plans: FftPlanCache,
}

impl RustFftBackend {
    #[must_use]
    pub fn new(config: PlanCacheConfig) -> Self {
        Self {
            plans: FftPlanCache::new(config),
        }
    }
}

impl FftBackend for RustFftBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::RustFft
    }

    fn process_chunks(
        &self,
        data: &mut [Complex64],
        len: usize,
        inverse: bool,
        parallel: bool,
    ) -> bool {
        if len == 0 || data.is_empty() {
            return false;
        }
        let (plan, hit) = self.plans.plan(PlanKey::new(len, inverse));
        if parallel {
            data.par_chunks_mut(len).for_each(|chunk| plan.process(chunk));
        } else {
            plan.process(data);
        }
        hit
    }

    fn plan_stats(&self) -> Option<CacheStats> {
        Some(self.plans.stats())
    }
}

/// Worker control policy for transform execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WorkerPolicy {
    /// Let the rayon global pool pick an execution width.
    #[default]
    Auto,
    /// Require an exact worker count.
    Exact(usize),
    /// Upper-bound worker count.
    Max(usize),
}

impl WorkerPolicy {
    pub fn validate(self) -> Result<(), FftError> {
        match self {
            Self::Exact(0) | Self::Max(0) => Err(FftError::InvalidWorkers { requested: 0 }),
            Self::Auto | Self::Exact(_) | Self::Max(_) => Ok(()),
        }
    }

    /// Whether more than one worker may run.
    #[must_use]
    pub const fn allows_parallel(self) -> bool {
        match self {
            Self::Auto => true,
            Self::Exact(n) | Self::Max(n) => n > 1,
        }
    }

    /// Worker count to size a dedicated pool with, or `None` for the global pool.
    #[must_use]
    pub fn pool_size(self) -> Option<usize> {
        match self {
            Self::Auto => None,
            Self::Exact(n) => Some(n),
            Self::Max(n) => Some(n.min(rayon::current_num_threads().max(1))),
        }
    }
}

/// Common options shared by FFT transform entrypoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FftOptions {
    pub mode: RuntimeMode,
    pub workers: WorkerPolicy,
    pub backend: BackendKind,
    pub check_finite: bool,
    pub plan_cache: PlanCacheConfig,
    /// Keep the last [`TRACE_LOG_CAPACITY`] transform traces on the engine.
    pub tracing: bool,
}

impl Default for FftOptions {
    fn default() -> Self {
        Self {
            mode: RuntimeMode::Strict,
            workers: WorkerPolicy::Auto,
            backend: BackendKind::RustFft,
            check_finite: false,
            plan_cache: PlanCacheConfig::default(),
            tracing: false,
        }
    }
}

impl FftOptions {
    #[must_use]
    pub fn with_mode(mut self, mode: RuntimeMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_workers(mut self, workers: WorkerPolicy) -> Self {
        self.workers = workers;
        self
    }

    #[must_use]
    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    #[must_use]
    pub fn with_check_finite(mut self, check_finite: bool) -> Self {
        self.check_finite = check_finite;
        self
    }

    #[must_use]
    pub fn with_plan_cache(mut self, plan_cache: PlanCacheConfig) -> Self {
        self.plan_cache = plan_cache;
        self
    }

    #[must_use]
    pub fn with_tracing(mut self, tracing: bool) -> Self {
        self.tracing = tracing;
        self
    }

    fn should_check_finite(&self) -> bool {
        self.check_finite || self.mode.forces_finite_checks()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FftError {
    InvalidShape { detail: &'static str },
    InvalidWorkers { requested: usize },
    LengthMismatch { expected: usize, actual: usize },
    NonFiniteInput,
}

impl Display for FftError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidShape { detail } => write!(f, "invalid shape: {detail}"),
            Self::InvalidWorkers { requested } => write!(f, "invalid worker count: {requested}"),
            Self::LengthMismatch { expected, actual } => {
                write!(f, "length mismatch: expected {expected}, got {actual}")
            }
            Self::NonFiniteInput => write!(f, "non-finite input rejected by policy"),
        }
    }
}

impl std::error::Error for FftError {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransformTrace {
    pub operation_id: String,
    pub kind: TransformKind,
    pub direction: &'static str,
    pub shape: (usize, usize),
    pub backend: BackendKind,
    pub plan_cache_hit: bool,
    pub mode: RuntimeMode,
    pub timing_ns: u64,
}

impl TransformTrace {
    #[must_use]
    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}

/// Traces kept per engine before the oldest is evicted.
pub const TRACE_LOG_CAPACITY: usize = 4096;

static OPERATION_COUNTER: AtomicU64 = AtomicU64::new(1);

fn next_operation_id() -> String {
    let next = OPERATION_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("fft-op-{next:016x}")
}

/// FFT executor bound to one set of options and one plan cache.
///
/// Every entrypoint is unscaled; callers apply their own normalization. The
/// trace log exists only when `options.tracing` is set.
pub struct FftEngine {
    options: FftOptions,
    backend: Box<dyn FftBackend>,
    traces: Option<Mutex<VecDeque<TransformTrace>>>,
}

impl std::fmt::Debug for FftEngine {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FftEngine")
            .field("options", &self.options)
            .field("backend", &self.backend.kind())
            .field("tracing", &self.traces.is_some())
            .finish()
    }
}

impl Default for FftEngine {
    fn default() -> Self {
        Self::from_valid_options(FftOptions::default())
    }
}

impl FftEngine {
    pub fn new(options: FftOptions) -> Result<Self, FftError> {
        options.workers.validate()?;
        Ok(Self::from_valid_options(options))
    }

    fn from_valid_options(options: FftOptions) -> Self {
        let backend: Box<dyn FftBackend> = match options.backend {
            BackendKind::RustFft => Box::new(RustFftBackend::new(options.plan_cache)),
            BackendKind::NaiveDft => Box::new(NaiveDftBackend),
        };
        let traces = options.tracing.then(|| Mutex::new(VecDeque::new()));
        Self {
            options,
            backend,
            traces,
        }
    }

    #[must_use]
    pub const fn options(&self) -> &FftOptions {
        &self.options
    }

    #[must_use]
    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Plan cache counters; `None` for backends without plans.
    #[must_use]
    pub fn plan_stats(&self) -> Option<CacheStats> {
        self.backend.plan_stats()
    }

    /// Drains the recorded traces, oldest first; empty when tracing is off.
    #[must_use]
    pub fn take_traces(&self) -> Vec<TransformTrace> {
        self.traces
            .as_ref()
            .and_then(|log| log.lock().ok())
            .map(|mut log| log.drain(..).collect())
            .unwrap_or_default()
    }

    /// Unscaled transform of every row of a row-major `(rows, cols)` array, in place.
    pub fn transform_rows_unscaled(
        &self,
        data: &mut [Complex64],
        shape: (usize, usize),
        inverse: bool,
    ) -> Result<(), FftError> {
        self.validate(data, shape)?;
        let kind = if inverse {
            TransformKind::InverseRows
        } else {
            TransformKind::Rows
        };
        let started = Instant::now();
        let hit = self
            .backend
            .process_chunks(data, shape.1, inverse, self.parallel_for(shape));
        self.trace(kind, shape, inverse, hit, started);
        Ok(())
    }

    /// Unscaled transform of every column of a row-major `(rows, cols)` array, in place.
    pub fn transform_columns_unscaled(
        &self,
        data: &mut [Complex64],
        shape: (usize, usize),
        inverse: bool,
    ) -> Result<(), FftError> {
        self.validate(data, shape)?;
        let kind = if inverse {
            TransformKind::InverseColumns
        } else {
            TransformKind::Columns
        };
        let started = Instant::now();
        let (rows, cols) = shape;
        let hit = if cols == 1 {
            self.backend
                .process_chunks(data, rows, inverse, self.parallel_for(shape))
        } else {
            self.columns_unscaled(data, shape, inverse)
        };
        self.trace(kind, shape, inverse, hit, started);
        Ok(())
    }

    /// Unscaled 2-D transform of a row-major `(rows, cols)` array, in place.
    pub fn transform_2d_unscaled(
        &self,
        data: &mut [Complex64],
        shape: (usize, usize),
        inverse: bool,
    ) -> Result<(), FftError> {
        self.validate(data, shape)?;
        let kind = if inverse {
            TransformKind::InverseGrid
        } else {
            TransformKind::Grid
        };
        let started = Instant::now();
        let hit = self.grid_unscaled(data, shape, inverse);
        self.trace(kind, shape, inverse, hit, started);
        Ok(())
    }

    fn grid_unscaled(&self, data: &mut [Complex64], shape: (usize, usize), inverse: bool) -> bool {
        let (rows, cols) = shape;
        let row_hit = self
            .backend
            .process_chunks(data, cols, inverse, self.parallel_for(shape));
        if rows == 1 {
            return row_hit;
        }
        let col_hit = self.columns_unscaled(data, shape, inverse);
        row_hit && col_hit
    }

    fn columns_unscaled(&self, data: &mut [Complex64], shape: (usize, usize), inverse: bool) -> bool {
        let (rows, cols) = shape;
        let mut columns = transpose(data, rows, cols);
        let hit = self.backend.process_chunks(
            &mut columns,
            rows,
            inverse,
            self.parallel_for((cols, rows)),
        );
        let restored = transpose(&columns, cols, rows);
        data.copy_from_slice(&restored);
        hit
    }

    fn validate(&self, data: &[Complex64], shape: (usize, usize)) -> Result<(), FftError> {
        if shape.0 == 0 || shape.1 == 0 {
            return Err(FftError::InvalidShape {
                detail: "transform dimensions must be greater than zero",
            });
        }
        let expected = shape.0.checked_mul(shape.1).ok_or(FftError::InvalidShape {
            detail: "shape product overflow",
        })?;
        if data.len() != expected {
            return Err(FftError::LengthMismatch {
                expected,
                actual: data.len(),
            });
        }
        if self.options.should_check_finite()
            && data.iter().any(|value| !value.re.is_finite() || !value.im.is_finite())
        {
            return Err(FftError::NonFiniteInput);
        }
        Ok(())
    }

    fn parallel_for(&self, shape: (usize, usize)) -> bool {
        const PARALLEL_THRESHOLD: usize = 1 << 12;
        self.options.workers.allows_parallel()
            && shape.0 > 1
            && shape.0.saturating_mul(shape.1) >= PARALLEL_THRESHOLD
    }

    fn trace(
        &self,
        kind: TransformKind,
        shape: (usize, usize),
        inverse: bool,
        plan_cache_hit: bool,
        started: Instant,
    ) {
        let Some(log) = &self.traces else {
            return;
        };
        let trace = TransformTrace {
            operation_id: next_operation_id(),
            kind,
            direction: if inverse { "inverse" } else { "forward" },
            shape,
            backend: self.backend.kind(),
            plan_cache_hit,
            mode: self.options.mode,
            timing_ns: u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX),
        };
        if let Ok(mut log) = log.lock() {
            if log.len() >= TRACE_LOG_CAPACITY {
                log.pop_front();
            }
            log.push_back(trace);
        }
    }
}

fn transpose(data: &[Complex64], rows: usize, cols: usize) -> Vec<Complex64> {
    let mut out = vec![Complex64::new(0.0, 0.0); data.len()];
    for r in 0..rows {
        for c in 0..cols {
            out[c * rows + r] = data[r * cols + c];
        }
    }
    out
}
