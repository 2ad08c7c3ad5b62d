#![forbid(unsafe_code)]

//! swsh runtime: execution modes, transform evidence ledger and the shared
//! test tooling used across the workspace.
//!
//! ## Module layout
//!
//! | Module      | Contents                                                        |
//! |-------------|-----------------------------------------------------------------|
//! | `mode`      | [`RuntimeMode`] enum (Strict / Hardened)                        |
//! | `evidence`  | [`TransformEvidenceLedger`], [`TransformEvidenceEntry`]         |
//!
//! The crate root carries [`TestLogEntry`] and the `assert_close*` helpers.

pub mod evidence;
pub mod mode;

pub use evidence::{TransformEvidenceEntry, TransformEvidenceLedger, TransformOperation};
pub use mode::RuntimeMode;

use std::time::{SystemTime, UNIX_EPOCH};

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// Wall-clock timestamp used by log and evidence entries.
#[must_use]
pub fn now_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}

// Shared test assertions and structured log entries.

/// Structured test log entry for forensic comparison across runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestLogEntry {
    pub test_id: String,
    pub timestamp_ms: u64,
    pub level: TestLogLevel,
    pub module: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixture_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<RuntimeMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<TestResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_abs_error: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestLogLevel {
    Info,
    Warn,
    Error,
    Debug,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestResult {
    Pass,
    Fail,
    Skip,
    Warn,
}

impl TestLogEntry {
    #[must_use]
    pub fn new(
        test_id: impl Into<String>,
        module: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            test_id: test_id.into(),
            timestamp_ms: now_unix_ms(),
            level: TestLogLevel::Info,
            module: module.into(),
            message: message.into(),
            seed: None,
            fixture_id: None,
            mode: None,
            result: None,
            max_abs_error: None,
        }
    }

    #[must_use]
    pub fn with_result(mut self, result: TestResult) -> Self {
        self.result = Some(result);
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: RuntimeMode) -> Self {
        self.mode = Some(mode);
        self
    }

    #[must_use]
    pub fn with_fixture(mut self, fixture_id: impl Into<String>) -> Self {
        self.fixture_id = Some(fixture_id.into());
        self
    }

    #[must_use]
    pub fn with_max_abs_error(mut self, error: f64) -> Self {
        self.max_abs_error = Some(error);
        self
    }

    /// Serialize to JSON line for structured logging.
    #[must_use]
    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}

/// Assert two f64 values are close within combined absolute and relative tolerance.
///
/// Uses the formula: |actual - expected| <= atol + rtol * |expected|
pub fn assert_close(actual: f64, expected: f64, atol: f64, rtol: f64) {
    let tol = atol + rtol * expected.abs();
    assert!(
        (actual - expected).abs() <= tol,
        "assert_close failed: actual={actual} expected={expected} diff={} tol={tol} (atol={atol}, rtol={rtol})",
        (actual - expected).abs()
    );
}

/// Assert two complex slices are element-wise close, measuring the modulus of the difference.
pub fn assert_close_complex_slice(
    actual: &[Complex64],
    expected: &[Complex64],
    atol: f64,
    rtol: f64,
) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "assert_close_complex_slice: length mismatch: actual={} expected={}",
        actual.len(),
        expected.len()
    );
    for (idx, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        let tol = atol + rtol * e.norm();
        assert!(
            (a - e).norm() <= tol,
            "assert_close_complex_slice[{idx}]: actual={a} expected={e} diff={} tol={tol}",
            (a - e).norm()
        );
    }
}

/// Largest element-wise modulus of `actual - expected`; `f64::INFINITY` on length mismatch.
#[must_use]
pub fn max_abs_diff(actual: &[Complex64], expected: &[Complex64]) -> f64 {
    if actual.len() != expected.len() {
        return f64::INFINITY;
    }
    actual
        .iter()
        .zip(expected)
        .map(|(a, e)| (a - e).norm())
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_entry_serializes_optional_fields_only_when_set() {
        let entry = TestLogEntry::new("roundtrip", "swsh_runtime", "ok")
            .with_result(TestResult::Pass)
            .with_seed(7);
        let json = entry.to_json_line();
        let parsed: serde_json::Value = serde_json::from_str(&json).expect("valid json");
        assert_eq!(parsed["result"], "pass");
        assert_eq!(parsed["seed"], 7);
        assert!(parsed.get("fixture_id").is_none());
        assert!(parsed.get("max_abs_error").is_none());
    }

    #[test]
    fn max_abs_diff_measures_modulus() {
        let a = [Complex64::new(1.0, 0.0), Complex64::new(0.0, 0.0)];
        let b = [Complex64::new(1.0, 0.0), Complex64::new(3.0, 4.0)];
        assert_eq!(max_abs_diff(&a, &b), 5.0);
        assert!(max_abs_diff(&a, &b[..1]).is_infinite());
    }

    #[test]
    #[should_panic(expected = "assert_close_complex_slice[1]")]
    fn complex_assertion_reports_offending_index() {
        let a = [Complex64::new(0.0, 0.0), Complex64::new(1.0, 0.0)];
        let b = [Complex64::new(0.0, 0.0), Complex64::new(0.0, 1.0)];
        assert_close_complex_slice(&a, &b, 1e-12, 0.0);
    }
}
