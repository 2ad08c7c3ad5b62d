use std::sync::{Arc, Mutex};
use std::time::Instant;

use num_complex::Complex64;
use rayon::{ThreadPool, ThreadPoolBuilder};
use swsh_fft::{CacheStats, FftEngine, TransformTrace};
use swsh_runtime::{TransformEvidenceEntry, TransformEvidenceLedger, TransformOperation};
use tracing::{debug, warn};

use crate::angular::{self, FrequencyMatrix};
use crate::assemble::HarmonicAssembler;
use crate::error::{SphtError, SphtResult};
use crate::extend::{ExtendedMap, extend_with};
use crate::grid::{EquiangularGrid, SphereMap};
use crate::index::mode_count;
use crate::options::{BelowSpinPolicy, TransformOptions};
use crate::quadrature::{QuadratureCache, QuadratureWeights};

/// Transform engine owning its FFT plans, quadrature tables and evidence ledger.
///
/// One engine can serve many calls concurrently; caches are read-mostly and
/// every call owns its intermediate buffers.
pub struct SpinTransform {
    options: TransformOptions,
    fft: FftEngine,
    quadrature: QuadratureCache,
    pool: Option<Arc<ThreadPool>>,
    ledger: Mutex<TransformEvidenceLedger>,
}

impl std::fmt::Debug for SpinTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpinTransform")
            .field("options", &self.options)
            .field("fft", &self.fft)
            .field("quadrature", &self.quadrature)
            .field("dedicated_pool", &self.pool.is_some())
            .finish_non_exhaustive()
    }
}

struct CallRecord {
    operation: TransformOperation,
    spin: i32,
    lmax: usize,
    grid: (usize, usize),
    zero_filled_modes: usize,
    quadrature_cache_hit: bool,
    exact_resolution: bool,
}

pub(crate) fn check_band_limit(lmax: usize, spin: i32) -> SphtResult<()> {
    if lmax < 1 || (spin.unsigned_abs() as usize) > lmax {
        return Err(SphtError::Configuration { lmax, spin });
    }
    Ok(())
}

impl SpinTransform {
    pub fn new(options: TransformOptions) -> SphtResult<Self> {
        options.validate()?;
        let fft = FftEngine::new(options.fft_options())?;
        let quadrature = QuadratureCache::new(options.quadrature_cache_config());
        let pool = match options.workers.pool_size() {
            Some(threads) if threads > 1 => {
                match ThreadPoolBuilder::new().num_threads(threads).build() {
                    Ok(pool) => Some(Arc::new(pool)),
                    Err(err) => {
                        warn!(threads, error = %err, "dedicated pool unavailable; using the global pool");
                        None
                    }
                }
            }
            _ => None,
        };
        Ok(Self {
            options,
            fft,
            quadrature,
            pool,
            ledger: Mutex::new(TransformEvidenceLedger::default()),
        })
    }

    #[must_use]
    pub const fn options(&self) -> &TransformOptions {
        &self.options
    }

    /// Mode coefficients `alm` of a spin-`s` map, exact when the grid resolves `lmax`.
    pub fn map2salm(&self, map: &SphereMap, spin: i32, lmax: usize) -> SphtResult<Vec<Complex64>> {
        let started = Instant::now();
        check_band_limit(lmax, spin)?;
        self.check_map(map)?;
        let grid = map.grid();
        let exact_resolution = self.note_resolution(grid, lmax);

        let (alm, quadrature_cache_hit) = self.install(|| {
            let assembler = HarmonicAssembler::new(spin, lmax)?;
            let ext = extend_with(&self.fft, map, spin, self.options.extension)?;
            let matrix = angular::forward(&self.fft, &ext, lmax)?;
            let (weights, hit) = self.quadrature.get(grid.ntheta().max(2 * lmax + 1))?;
            let alm = assembler.analyze(&matrix, &weights, self.parallel())?;
            Ok::<_, SphtError>((alm, hit))
        })?;

        debug!(
            spin,
            lmax,
            ntheta = grid.ntheta(),
            nphi = grid.nphi(),
            quadrature_cache_hit,
            "map2salm"
        );
        self.record(
            CallRecord {
                operation: TransformOperation::Map2Salm,
                spin,
                lmax,
                grid: (grid.ntheta(), grid.nphi()),
                zero_filled_modes: 0,
                quadrature_cache_hit,
                exact_resolution,
            },
            started,
        );
        Ok(alm)
    }

    /// Samples of the spin-`s` field with coefficients `alm` on an `(ntheta, nphi)` grid.
    pub fn salm2map(
        &self,
        alm: &[Complex64],
        spin: i32,
        lmax: usize,
        ntheta: usize,
        nphi: usize,
    ) -> SphtResult<SphereMap> {
        let started = Instant::now();
        let grid = EquiangularGrid::new(ntheta, nphi)?;
        check_band_limit(lmax, spin)?;
        if alm.len() != mode_count(lmax) {
            return Err(SphtError::shape("mode coefficients", mode_count(lmax), alm.len()));
        }
        if self.options.should_check_finite()
            && alm.iter().any(|v| !v.re.is_finite() || !v.im.is_finite())
        {
            return Err(SphtError::NonFiniteInput);
        }
        let zero_filled_modes = self.below_spin_modes(alm, spin)?;
        let exact_resolution = self.note_resolution(grid, lmax);

        let map = self.install(|| {
            let assembler = HarmonicAssembler::new(spin, lmax)?;
            let matrix = assembler.synthesize(alm, self.parallel())?;
            angular::inverse(&self.fft, &matrix, grid)
        })?;

        debug!(spin, lmax, ntheta, nphi, zero_filled_modes, "salm2map");
        self.record(
            CallRecord {
                operation: TransformOperation::Salm2Map,
                spin,
                lmax,
                grid: (ntheta, nphi),
                zero_filled_modes,
                quadrature_cache_hit: false,
                exact_resolution,
            },
            started,
        );
        Ok(map)
    }

    /// Periodic colatitude extension using the configured convention.
    pub fn extend_map(&self, map: &SphereMap, spin: i32) -> SphtResult<ExtendedMap> {
        let started = Instant::now();
        self.check_map(map)?;
        let ext = extend_with(&self.fft, map, spin, self.options.extension)?;
        debug!(
            spin,
            ntheta = map.ntheta(),
            nphi = map.nphi(),
            convention = self.options.extension.name(),
            "extend_map"
        );
        self.record(
            CallRecord {
                operation: TransformOperation::ExtendMap,
                spin,
                lmax: 0,
                grid: (map.ntheta(), map.nphi()),
                zero_filled_modes: 0,
                quadrature_cache_hit: false,
                exact_resolution: true,
            },
            started,
        );
        Ok(ext)
    }

    /// Signed frequency matrix `I_{m,m′}` of an extended map, truncated to `lmax`.
    pub fn frequency_matrix(&self, ext: &ExtendedMap, lmax: usize) -> SphtResult<FrequencyMatrix> {
        let started = Instant::now();
        check_band_limit(lmax, ext.spin())?;
        let matrix = angular::forward(&self.fft, ext, lmax)?;
        debug!(lmax, rows = ext.rows(), nphi = ext.nphi(), "frequency_matrix");
        self.record(
            CallRecord {
                operation: TransformOperation::FrequencyMatrix,
                spin: ext.spin(),
                lmax,
                grid: (ext.source_ntheta(), ext.nphi()),
                zero_filled_modes: 0,
                quadrature_cache_hit: false,
                exact_resolution: ext.nphi() > 2 * lmax && ext.source_ntheta() >= lmax + 2,
            },
            started,
        );
        Ok(matrix)
    }

    /// Cached quadrature table for `ntheta`.
    pub fn quadrature_weights(&self, ntheta: usize) -> SphtResult<Arc<QuadratureWeights>> {
        self.quadrature.get(ntheta).map(|(table, _)| table)
    }

    #[must_use]
    pub fn quadrature_stats(&self) -> CacheStats {
        self.quadrature.stats()
    }

    /// FFT plan cache counters, when the backend keeps plans.
    #[must_use]
    pub fn plan_stats(&self) -> Option<CacheStats> {
        self.fft.plan_stats()
    }

    /// Drains FFT traces; empty unless `fft_tracing` is enabled.
    #[must_use]
    pub fn take_fft_traces(&self) -> Vec<TransformTrace> {
        self.fft.take_traces()
    }

    /// Snapshot of recorded invocations, oldest first.
    #[must_use]
    pub fn evidence(&self) -> Vec<TransformEvidenceEntry> {
        self.ledger
            .lock()
            .map(|ledger| ledger.iter().cloned().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn evidence_jsonl(&self) -> String {
        self.ledger
            .lock()
            .map(|ledger| ledger.serialize_jsonl())
            .unwrap_or_default()
    }

    pub fn clear_evidence(&self) {
        if let Ok(mut ledger) = self.ledger.lock() {
            ledger.clear();
        }
    }

    pub(crate) fn install<R, F>(&self, op: F) -> R
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }

    pub(crate) fn parallel(&self) -> bool {
        self.options.workers.allows_parallel()
    }

    fn check_map(&self, map: &SphereMap) -> SphtResult<()> {
        if self.options.should_check_finite() && !map.is_finite() {
            return Err(SphtError::NonFiniteInput);
        }
        Ok(())
    }

    /// Count of nonzero coefficients with `l < |s|`, after applying the below-spin policy.
    fn below_spin_modes(&self, alm: &[Complex64], spin: i32) -> SphtResult<usize> {
        let floor = spin.unsigned_abs() as usize;
        let below = (floor * floor).min(alm.len());
        let nonzero = alm[..below].iter().filter(|v| v.norm_sqr() != 0.0).count();
        if nonzero == 0 {
            return Ok(0);
        }
        match self.options.effective_below_spin() {
            BelowSpinPolicy::Reject => Err(SphtError::domain(format!(
                "{nonzero} nonzero coefficients below degree |s|={floor}"
            ))),
            BelowSpinPolicy::ZeroFill => {
                warn!(spin, nonzero, "dropping coefficients below degree |s|");
                Ok(nonzero)
            }
        }
    }

    fn note_resolution(&self, grid: EquiangularGrid, lmax: usize) -> bool {
        let exact = grid.resolves(lmax);
        if !exact {
            warn!(
                lmax,
                ntheta = grid.ntheta(),
                nphi = grid.nphi(),
                "grid does not resolve lmax; transform is not exact"
            );
        }
        exact
    }

    fn record(&self, call: CallRecord, started: Instant) {
        let entry = TransformEvidenceEntry {
            operation: call.operation,
            mode: self.options.mode,
            spin: call.spin,
            lmax: call.lmax,
            ntheta: call.grid.0,
            nphi: call.grid.1,
            zero_filled_modes: call.zero_filled_modes,
            quadrature_cache_hit: call.quadrature_cache_hit,
            exact_resolution: call.exact_resolution,
            timing_ns: u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX),
        };
        if let Ok(mut ledger) = self.ledger.lock() {
            ledger.record(entry);
        }
    }
}

impl Default for SpinTransform {
    fn default() -> Self {
        let options = TransformOptions::default();
        Self {
            fft: FftEngine::default(),
            quadrature: QuadratureCache::new(options.quadrature_cache_config()),
            pool: None,
            ledger: Mutex::new(TransformEvidenceLedger::default()),
            options,
        }
    }
}
