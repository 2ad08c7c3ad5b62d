#![forbid(unsafe_code)]

//! Runtime mode definitions for Strict (reference-compatible) and Hardened operation.

use serde::{Deserialize, Serialize};

/// Operational mode governing compatibility/safety trade-offs.
///
/// - **Strict**: Match the reference transform behaviour; modes below the spin
///   weight are assumed to be zero on synthesis and silently dropped.
/// - **Hardened**: Extra validation on top of Strict; non-finite samples and
///   nonzero below-spin modes are rejected instead of being passed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RuntimeMode {
    #[default]
    Strict,
    Hardened,
}

impl RuntimeMode {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Strict => "Strict",
            Self::Hardened => "Hardened",
        }
    }

    /// Whether this mode forces finite-value checks regardless of caller options.
    #[must_use]
    pub const fn forces_finite_checks(self) -> bool {
        matches!(self, Self::Hardened)
    }
}
