#![forbid(unsafe_code)]

//! Bounded FIFO evidence ledger for transform audit trails.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::mode::RuntimeMode;

/// Engine entrypoint that produced an evidence entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformOperation {
    Map2Salm,
    Salm2Map,
    ExtendMap,
    FrequencyMatrix,
}

impl TransformOperation {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Map2Salm => "map2salm",
            Self::Salm2Map => "salm2map",
            Self::ExtendMap => "extend_map",
            Self::FrequencyMatrix => "frequency_matrix",
        }
    }
}

/// Complete record of a single transform invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformEvidenceEntry {
    pub operation: TransformOperation,
    pub mode: RuntimeMode,
    pub spin: i32,
    pub lmax: usize,
    pub ntheta: usize,
    pub nphi: usize,
    /// Below-spin modes dropped from a synthesis input.
    pub zero_filled_modes: usize,
    pub quadrature_cache_hit: bool,
    /// `false` when the grid is too coarse for the quadrature to be exact at `lmax`.
    pub exact_resolution: bool,
    pub timing_ns: u64,
}

/// Bounded FIFO evidence buffer recording transform invocations.
///
/// Capacity is enforced via `capacity.max(1)`, including for deserialized
/// ledgers. When full, the oldest entry is evicted before a new entry is
/// appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "LedgerState")]
pub struct TransformEvidenceLedger {
    capacity: usize,
    entries: VecDeque<TransformEvidenceEntry>,
}

#[derive(Deserialize)]
struct LedgerState {
    capacity: usize,
    entries: VecDeque<TransformEvidenceEntry>,
}

impl From<LedgerState> for TransformEvidenceLedger {
    fn from(state: LedgerState) -> Self {
        let mut ledger = Self::new(state.capacity);
        let skip = state.entries.len().saturating_sub(ledger.capacity);
        ledger.entries = state.entries.into_iter().skip(skip).collect();
        ledger
    }
}

impl TransformEvidenceLedger {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::new(),
        }
    }

    /// Append an entry, evicting the oldest if at capacity.
    pub fn record(&mut self, entry: TransformEvidenceEntry) {
        while self.entries.len() >= self.capacity {
            let _ = self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The most recently recorded entry.
    #[must_use]
    pub fn latest(&self) -> Option<&TransformEvidenceEntry> {
        self.entries.back()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &TransformEvidenceEntry> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Serialize the ledger to JSONL, oldest entry first.
    #[must_use]
    pub fn serialize_jsonl(&self) -> String {
        self.entries
            .iter()
            .filter_map(|entry| serde_json::to_string(entry).ok())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for TransformEvidenceLedger {
    fn default() -> Self {
        Self::new(256)
    }
}
