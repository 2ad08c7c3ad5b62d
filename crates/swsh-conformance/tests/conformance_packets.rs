//! Fixture packets run end to end, with parity artifacts written to a
//! scratch directory.

use std::path::PathBuf;

use swsh_conformance::{
    HarnessConfig, load_packet_reports, packet_summary, run_packet, run_smoke,
    verify_parity_artifacts, write_parity_artifacts,
};
use swsh_runtime::{RuntimeMode, TestLogEntry, TestResult};

const PACKETS: [&str; 3] = [
    "SWSH-P001_synthesis.json",
    "SWSH-P002_analysis.json",
    "SWSH-P003_index_and_errors.json",
];

fn scratch_config(name: &str) -> HarnessConfig {
    let root: PathBuf = std::env::temp_dir().join(format!(
        "swsh-conformance-{name}-{}",
        std::process::id()
    ));
    HarnessConfig::default_paths().with_artifact_root(root)
}

#[test]
fn smoke_sees_every_fixture() {
    let report = run_smoke(&HarnessConfig::default_paths());
    assert_eq!(report.fixture_count, PACKETS.len());
    assert!(report.strict_mode);
}

#[test]
fn every_packet_passes() {
    let config = HarnessConfig::default_paths();
    for fixture in PACKETS {
        let report = run_packet(&config, fixture).expect("packet runs");
        let failures: Vec<_> = report.case_results.iter().filter(|c| !c.passed).collect();
        assert!(failures.is_empty(), "{fixture}: {failures:#?}");
        assert!(report.passed_cases > 0);

        let worst = report
            .case_results
            .iter()
            .filter_map(|c| c.max_diff)
            .fold(0.0, f64::max);
        let entry = TestLogEntry::new("every_packet_passes", "swsh_conformance", fixture)
            .with_fixture(report.packet_id.clone())
            .with_mode(RuntimeMode::Strict)
            .with_result(TestResult::Pass)
            .with_max_abs_error(worst);
        eprintln!("{}", entry.to_json_line());
    }
}

#[test]
fn parity_artifacts_round_trip_through_disk() {
    let config = scratch_config("artifacts");
    let report = run_packet(&config, PACKETS[2]).expect("packet runs");
    let bundle = write_parity_artifacts(&config, &report).expect("artifacts written");
    assert_eq!(bundle.digest.len(), 64);
    assert!(verify_parity_artifacts(&bundle).expect("verify"));

    let loaded = load_packet_reports(&config).expect("reports load");
    assert_eq!(loaded.len(), 1);
    assert_eq!(packet_summary(&loaded[0]), packet_summary(&report));

    std::fs::write(&bundle.report_path, b"{}").expect("tamper");
    assert!(!verify_parity_artifacts(&bundle).expect("verify"));
    let _ = std::fs::remove_dir_all(&config.artifact_root);
}

#[test]
fn missing_fixture_is_an_io_error() {
    let err = run_packet(&HarnessConfig::default_paths(), "absent.json").expect_err("missing");
    assert!(err.to_string().contains("fixture load failed"));
}
