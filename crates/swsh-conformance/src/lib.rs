#![forbid(unsafe_code)]

pub mod oracle;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use blake3::hash;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use swsh_runtime::{RuntimeMode, max_abs_diff, now_unix_ms};
use swsh_transform::{
    EquiangularGrid, ExtensionConvention, SphereMap, SphtError, SpinTransform, TransformOptions,
    index_lm, lm_index, mode_count,
};
use thiserror::Error;

use crate::oracle::{direct_synthesis, seeded_coefficients};

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub fixture_root: PathBuf,
    pub artifact_root: PathBuf,
    pub strict_mode: bool,
}

impl HarnessConfig {
    #[must_use]
    pub fn default_paths() -> Self {
        let fixture_root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures");
        Self {
            artifact_root: fixture_root.join("artifacts"),
            fixture_root,
            strict_mode: true,
        }
    }

    #[must_use]
    pub fn with_artifact_root(mut self, artifact_root: impl Into<PathBuf>) -> Self {
        self.artifact_root = artifact_root.into();
        self
    }

    #[must_use]
    pub fn artifact_dir_for(&self, packet_id: &str) -> PathBuf {
        self.artifact_root.join(packet_id)
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self::default_paths()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessReport {
    pub suite: &'static str,
    pub fixture_count: usize,
    pub strict_mode: bool,
}

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("fixture load failed for {path}: {source}")]
    FixtureIo { path: PathBuf, source: io::Error },
    #[error("fixture parse failed for {path}: {source}")]
    FixtureParse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("artifact write failed for {path}: {source}")]
    ArtifactIo { path: PathBuf, source: io::Error },
    #[error("report serialization failed: {0}")]
    ReportEncode(serde_json::Error),
    #[error("transform engine setup failed: {0}")]
    Transform(#[from] SphtError),
}

/// One nonzero mode coefficient in a fixture.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FixtureMode {
    pub l: i32,
    pub m: i32,
    pub re: f64,
    #[serde(default)]
    pub im: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformCase {
    /// `index_lm(index) == (l, m)` and back.
    Index {
        case_id: String,
        lmax: usize,
        index: usize,
        l: i32,
        m: i32,
    },
    /// Fast synthesis against the direct sum.
    Synthesis {
        case_id: String,
        spin: i32,
        lmax: usize,
        ntheta: usize,
        nphi: usize,
        modes: Vec<FixtureMode>,
        atol: f64,
    },
    /// Fast analysis of a directly synthesized map recovers the modes.
    Analysis {
        case_id: String,
        spin: i32,
        lmax: usize,
        ntheta: usize,
        nphi: usize,
        modes: Vec<FixtureMode>,
        atol: f64,
        #[serde(default)]
        convention: ExtensionConvention,
    },
    /// Seeded dense coefficients survive synthesis then analysis.
    RoundTrip {
        case_id: String,
        spin: i32,
        lmax: usize,
        ntheta: usize,
        nphi: usize,
        seed: u64,
        atol: f64,
        #[serde(default)]
        convention: ExtensionConvention,
    },
    /// Synthesis must fail with the named error kind.
    RejectsSynthesis {
        case_id: String,
        spin: i32,
        lmax: usize,
        ntheta: usize,
        nphi: usize,
        #[serde(default)]
        modes: Vec<FixtureMode>,
        #[serde(default)]
        mode: RuntimeMode,
        error: String,
    },
    /// Analysis of a zero map, optionally poisoned with NaN, must fail.
    RejectsAnalysis {
        case_id: String,
        spin: i32,
        lmax: usize,
        ntheta: usize,
        nphi: usize,
        #[serde(default)]
        nan_at: Option<usize>,
        #[serde(default)]
        mode: RuntimeMode,
        error: String,
    },
}

impl TransformCase {
    #[must_use]
    pub fn case_id(&self) -> &str {
        match self {
            Self::Index { case_id, .. }
            | Self::Synthesis { case_id, .. }
            | Self::Analysis { case_id, .. }
            | Self::RoundTrip { case_id, .. }
            | Self::RejectsSynthesis { case_id, .. }
            | Self::RejectsAnalysis { case_id, .. } => case_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PacketFixture {
    pub packet_id: String,
    pub family: String,
    pub cases: Vec<TransformCase>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaseResult {
    pub case_id: String,
    pub passed: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_diff: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PacketReport {
    pub packet_id: String,
    pub family: String,
    pub case_results: Vec<CaseResult>,
    pub passed_cases: usize,
    pub failed_cases: usize,
    pub generated_unix_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PacketSummary {
    pub packet_id: String,
    pub family: String,
    pub passed_cases: usize,
    pub failed_cases: usize,
    pub total_cases: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParityArtifactBundle {
    pub report_path: PathBuf,
    pub digest_path: PathBuf,
    pub digest: String,
}

/// Stable name of an error variant, as used in fixtures.
#[must_use]
pub fn error_kind(err: &SphtError) -> &'static str {
    match err {
        SphtError::Domain { .. } => "domain",
        SphtError::InvalidGrid { .. } => "invalid_grid",
        SphtError::Configuration { .. } => "configuration",
        SphtError::ShapeMismatch { .. } => "shape_mismatch",
        SphtError::NumericalInstability { .. } => "numerical_instability",
        SphtError::NonFiniteInput => "non_finite_input",
        SphtError::InvalidWorkers { .. } => "invalid_workers",
        SphtError::Fft(_) => "fft",
    }
}

#[must_use]
pub fn run_smoke(config: &HarnessConfig) -> HarnessReport {
    let fixture_count = fs::read_dir(&config.fixture_root)
        .ok()
        .into_iter()
        .flat_map(|it| it.filter_map(Result::ok))
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "json"))
        .count();

    HarnessReport {
        suite: "smoke",
        fixture_count,
        strict_mode: config.strict_mode,
    }
}

pub fn load_fixture(path: &Path) -> Result<PacketFixture, HarnessError> {
    let raw = fs::read_to_string(path).map_err(|source| HarnessError::FixtureIo {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| HarnessError::FixtureParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Runs every case of `fixtures/<fixture_name>` and collects per-case verdicts.
pub fn run_packet(config: &HarnessConfig, fixture_name: &str) -> Result<PacketReport, HarnessError> {
    let fixture = load_fixture(&config.fixture_root.join(fixture_name))?;
    run_fixture(&fixture)
}

pub fn run_fixture(fixture: &PacketFixture) -> Result<PacketReport, HarnessError> {
    let strict = SpinTransform::new(TransformOptions::default())?;
    let hardened =
        SpinTransform::new(TransformOptions::default().with_mode(RuntimeMode::Hardened))?;
    let legacy = SpinTransform::new(
        TransformOptions::default().with_extension(ExtensionConvention::Legacy),
    )?;
    let engines = Engines {
        strict: &strict,
        hardened: &hardened,
        legacy: &legacy,
    };

    let case_results = fixture
        .cases
        .iter()
        .map(|case| execute_case(&engines, case))
        .collect();
    Ok(build_packet_report(
        fixture.packet_id.clone(),
        fixture.family.clone(),
        case_results,
    ))
}

pub fn load_packet_reports(config: &HarnessConfig) -> Result<Vec<PacketReport>, HarnessError> {
    let artifact_root = &config.artifact_root;
    if !artifact_root.exists() {
        return Ok(Vec::new());
    }

    let mut reports = Vec::new();
    for packet_dir in fs::read_dir(artifact_root).map_err(|source| HarnessError::ArtifactIo {
        path: artifact_root.clone(),
        source,
    })? {
        let packet_dir = packet_dir
            .map_err(|source| HarnessError::ArtifactIo {
                path: artifact_root.clone(),
                source,
            })?
            .path();
        let report_path = packet_dir.join("parity_report.json");
        if !packet_dir.is_dir() || !report_path.exists() {
            continue;
        }
        let raw = fs::read_to_string(&report_path).map_err(|source| HarnessError::ArtifactIo {
            path: report_path.clone(),
            source,
        })?;
        let report: PacketReport =
            serde_json::from_str(&raw).map_err(|source| HarnessError::FixtureParse {
                path: report_path,
                source,
            })?;
        reports.push(report);
    }

    reports.sort_by(|a, b| a.packet_id.cmp(&b.packet_id));
    Ok(reports)
}

#[must_use]
pub fn packet_summary(report: &PacketReport) -> PacketSummary {
    PacketSummary {
        packet_id: report.packet_id.clone(),
        family: report.family.clone(),
        passed_cases: report.passed_cases,
        failed_cases: report.failed_cases,
        total_cases: report.case_results.len(),
    }
}

/// Writes the report and its blake3 digest under the packet's artifact dir.
pub fn write_parity_artifacts(
    config: &HarnessConfig,
    report: &PacketReport,
) -> Result<ParityArtifactBundle, HarnessError> {
    let output_dir = config.artifact_dir_for(&report.packet_id);
    fs::create_dir_all(&output_dir).map_err(|source| HarnessError::ArtifactIo {
        path: output_dir.clone(),
        source,
    })?;

    let report_path = output_dir.join("parity_report.json");
    let report_bytes = serde_json::to_vec_pretty(report).map_err(HarnessError::ReportEncode)?;
    fs::write(&report_path, &report_bytes).map_err(|source| HarnessError::ArtifactIo {
        path: report_path.clone(),
        source,
    })?;

    let digest = hash(&report_bytes).to_hex().to_string();
    let digest_path = output_dir.join("parity_report.blake3");
    fs::write(&digest_path, &digest).map_err(|source| HarnessError::ArtifactIo {
        path: digest_path.clone(),
        source,
    })?;

    Ok(ParityArtifactBundle {
        report_path,
        digest_path,
        digest,
    })
}

/// Whether the report on disk still hashes to the recorded digest.
pub fn verify_parity_artifacts(bundle: &ParityArtifactBundle) -> Result<bool, HarnessError> {
    let bytes = fs::read(&bundle.report_path).map_err(|source| HarnessError::ArtifactIo {
        path: bundle.report_path.clone(),
        source,
    })?;
    let recorded =
        fs::read_to_string(&bundle.digest_path).map_err(|source| HarnessError::ArtifactIo {
            path: bundle.digest_path.clone(),
            source,
        })?;
    Ok(hash(&bytes).to_hex().as_str() == recorded.trim())
}

struct Engines<'a> {
    strict: &'a SpinTransform,
    hardened: &'a SpinTransform,
    legacy: &'a SpinTransform,
}

impl Engines<'_> {
    fn for_mode(&self, mode: RuntimeMode) -> &SpinTransform {
        match mode {
            RuntimeMode::Strict => self.strict,
            RuntimeMode::Hardened => self.hardened,
        }
    }

    fn for_convention(&self, convention: ExtensionConvention) -> &SpinTransform {
        match convention {
            ExtensionConvention::Mw => self.strict,
            ExtensionConvention::Legacy => self.legacy,
        }
    }
}

fn execute_case(engines: &Engines<'_>, case: &TransformCase) -> CaseResult {
    let outcome = match case {
        TransformCase::Index {
            lmax, index, l, m, ..
        } => check_index(*lmax, *index, *l, *m),
        TransformCase::Synthesis {
            spin,
            lmax,
            ntheta,
            nphi,
            modes,
            atol,
            ..
        } => check_synthesis(engines.strict, *spin, *lmax, (*ntheta, *nphi), modes, *atol),
        TransformCase::Analysis {
            spin,
            lmax,
            ntheta,
            nphi,
            modes,
            atol,
            convention,
            ..
        } => check_analysis(
            engines.for_convention(*convention),
            *spin,
            *lmax,
            (*ntheta, *nphi),
            modes,
            *atol,
        ),
        TransformCase::RoundTrip {
            spin,
            lmax,
            ntheta,
            nphi,
            seed,
            atol,
            convention,
            ..
        } => check_round_trip(
            engines.for_convention(*convention),
            *spin,
            *lmax,
            (*ntheta, *nphi),
            *seed,
            *atol,
        ),
        TransformCase::RejectsSynthesis {
            spin,
            lmax,
            ntheta,
            nphi,
            modes,
            mode,
            error,
            ..
        } => dense(modes, *lmax).map(|alm| {
            expect_error(
                engines
                    .for_mode(*mode)
                    .salm2map(&alm, *spin, *lmax, *ntheta, *nphi)
                    .map(|_| ()),
                error,
            )
        }),
        TransformCase::RejectsAnalysis {
            spin,
            lmax,
            ntheta,
            nphi,
            nan_at,
            mode,
            error,
            ..
        } => EquiangularGrid::new(*ntheta, *nphi)
            .and_then(|grid| {
                let mut samples = vec![Complex64::new(0.0, 0.0); grid.len()];
                if let Some(slot) = nan_at.and_then(|at| samples.get_mut(at)) {
                    *slot = Complex64::new(f64::NAN, 0.0);
                }
                SphereMap::new(grid, samples)
            })
            .map(|map| {
                expect_error(
                    engines.for_mode(*mode).map2salm(&map, *spin, *lmax).map(|_| ()),
                    error,
                )
            }),
    };

    let (passed, message, max_diff) = match outcome {
        Ok(verdict) => verdict,
        Err(err) => (false, format!("case setup failed: {err}"), None),
    };
    CaseResult {
        case_id: case.case_id().to_owned(),
        passed,
        message,
        max_diff,
    }
}

type Verdict = (bool, String, Option<f64>);

fn dense(modes: &[FixtureMode], lmax: usize) -> Result<Vec<Complex64>, SphtError> {
    let mut alm = vec![Complex64::new(0.0, 0.0); mode_count(lmax)];
    for mode in modes {
        alm[lm_index(mode.l, mode.m, lmax)?] += Complex64::new(mode.re, mode.im);
    }
    Ok(alm)
}

fn within(max_diff: f64, atol: f64, what: &str) -> Verdict {
    let passed = max_diff <= atol;
    let message = if passed {
        format!("{what} matched within atol={atol:e}")
    } else {
        format!("{what} mismatch: max_diff={max_diff:e} exceeds atol={atol:e}")
    };
    (passed, message, Some(max_diff))
}

fn check_index(lmax: usize, index: usize, l: i32, m: i32) -> Result<Verdict, SphtError> {
    let pair = index_lm(index, lmax)?;
    let back = lm_index(l, m, lmax)?;
    let passed = pair == (l, m) && back == index;
    let message = if passed {
        "index and pair agree".to_owned()
    } else {
        format!("expected {index} <-> ({l}, {m}); got pair {pair:?}, index {back}")
    };
    Ok((passed, message, None))
}

fn check_synthesis(
    engine: &SpinTransform,
    spin: i32,
    lmax: usize,
    (ntheta, nphi): (usize, usize),
    modes: &[FixtureMode],
    atol: f64,
) -> Result<Verdict, SphtError> {
    let alm = dense(modes, lmax)?;
    let fast = engine.salm2map(&alm, spin, lmax, ntheta, nphi)?;
    let reference = direct_synthesis(&alm, spin, lmax, fast.grid());
    Ok(within(
        max_abs_diff(fast.as_slice(), reference.as_slice()),
        atol,
        "synthesis",
    ))
}

fn check_analysis(
    engine: &SpinTransform,
    spin: i32,
    lmax: usize,
    (ntheta, nphi): (usize, usize),
    modes: &[FixtureMode],
    atol: f64,
) -> Result<Verdict, SphtError> {
    let alm = dense(modes, lmax)?;
    let grid = EquiangularGrid::new(ntheta, nphi)?;
    let map = direct_synthesis(&alm, spin, lmax, grid);
    let recovered = engine.map2salm(&map, spin, lmax)?;
    Ok(within(max_abs_diff(&recovered, &alm), atol, "analysis"))
}

fn check_round_trip(
    engine: &SpinTransform,
    spin: i32,
    lmax: usize,
    (ntheta, nphi): (usize, usize),
    seed: u64,
    atol: f64,
) -> Result<Verdict, SphtError> {
    let alm = seeded_coefficients(spin, lmax, seed);
    let map = engine.salm2map(&alm, spin, lmax, ntheta, nphi)?;
    let back = engine.map2salm(&map, spin, lmax)?;
    Ok(within(max_abs_diff(&back, &alm), atol, "round trip"))
}

fn expect_error(result: Result<(), SphtError>, expected: &str) -> Verdict {
    match result {
        Err(err) if error_kind(&err) == expected => {
            (true, format!("rejected as expected: {err}"), None)
        }
        Err(err) => (
            false,
            format!("expected `{expected}` error, got `{}`: {err}", error_kind(&err)),
            None,
        ),
        Ok(()) => (false, format!("expected `{expected}` error, call succeeded"), None),
    }
}

fn build_packet_report(
    packet_id: String,
    family: String,
    case_results: Vec<CaseResult>,
) -> PacketReport {
    let passed_cases = case_results.iter().filter(|r| r.passed).count();
    let failed_cases = case_results.len().saturating_sub(passed_cases);
    PacketReport {
        packet_id,
        family,
        case_results,
        passed_cases,
        failed_cases,
        generated_unix_ms: now_unix_ms(),
    }
}
