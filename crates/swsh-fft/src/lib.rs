#![forbid(unsafe_code)]

//! Complex FFT surface for the swsh transform workspace.
//!
//! - `transforms`: unscaled row, column and 2-D complex transforms over a
//!   pluggable backend (rustfft by default, naive DFT as reference)
//! - `plan`: explicit bounded caches for FFT plans and other per-size tables
//! - `helpers`: signed-frequency bookkeeping for DFT bins

pub mod helpers;
pub mod plan;
pub mod transforms;

pub use helpers::{frequency_bin, signed_frequency};
pub use plan::{BoundedCache, CacheAdmissionPolicy, CacheStats, FftPlanCache, PlanCacheConfig, PlanKey};
pub use transforms::{
    BackendKind, Complex64, FftBackend, FftEngine, FftError, FftOptions, NaiveDftBackend,
    RustFftBackend, TRACE_LOG_CAPACITY, TransformTrace, WorkerPolicy,
};

use serde::{Deserialize, Serialize};

/// Transform entrypoints recorded in transform traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformKind {
    Grid,
    InverseGrid,
    Rows,
    InverseRows,
    Columns,
    InverseColumns,
}

#[cfg(test)]
mod tests {
    use super::TransformKind;

    #[test]
    fn transform_kind_order_is_stable() {
        assert!(TransformKind::Grid < TransformKind::InverseColumns);
    }

    #[test]
    fn transform_kind_serializes_snake_case() {
        let json = serde_json::to_string(&TransformKind::InverseRows).expect("serialize");
        assert_eq!(json, "\"inverse_rows\"");
    }
}
