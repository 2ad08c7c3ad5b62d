//! Periodic extension of a half-sphere map to a full colatitude circle.
//!
//! Continuing past the pole at `θ = π` reaches `θ' = 2π − θ` on the far
//! meridian, so the extended row at `θ'` is `(−1)^s f(θ, φ + π)`.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use swsh_fft::{FftEngine, signed_frequency};

use crate::error::{SphtError, SphtResult};
use crate::grid::{EquiangularGrid, SphereMap};

/// How the half-turn longitude shift is realized for odd `Nphi`.
///
/// Even `Nphi` is always an exact cyclic reindex and both conventions agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionConvention {
    /// Exact band-limited shift in longitude frequency space.
    #[default]
    Mw,
    /// Cyclic reindex by `(Nphi−1)/2`, leaving a `−π/Nphi` displacement that the
    /// forward FFT stage removes.
    Legacy,
}

impl ExtensionConvention {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Mw => "mw",
            Self::Legacy => "legacy",
        }
    }

    /// Whether rows past `θ = π` carry a residual half-step displacement.
    #[must_use]
    pub(crate) const fn displaced(self, nphi: usize) -> bool {
        matches!(self, Self::Legacy) && nphi % 2 == 1
    }
}

/// A `(2·(Ntheta−1), Nphi)` map covering colatitude `[0, 2π)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ExtendedSamples")]
pub struct ExtendedMap {
    source_ntheta: usize,
    nphi: usize,
    spin: i32,
    convention: ExtensionConvention,
    data: Vec<Complex64>,
}

#[derive(Deserialize)]
struct ExtendedSamples {
    source_ntheta: usize,
    nphi: usize,
    spin: i32,
    convention: ExtensionConvention,
    data: Vec<Complex64>,
}

impl TryFrom<ExtendedSamples> for ExtendedMap {
    type Error = SphtError;

    fn try_from(samples: ExtendedSamples) -> SphtResult<Self> {
        let grid = EquiangularGrid::new(samples.source_ntheta, samples.nphi)?;
        let expected = grid.extended_rows() * grid.nphi();
        if samples.data.len() != expected {
            return Err(SphtError::shape(
                "extended map samples",
                format!("{}x{}", grid.extended_rows(), grid.nphi()),
                samples.data.len(),
            ));
        }
        Ok(Self {
            source_ntheta: samples.source_ntheta,
            nphi: samples.nphi,
            spin: samples.spin,
            convention: samples.convention,
            data: samples.data,
        })
    }
}

impl ExtendedMap {
    #[must_use]
    pub const fn rows(&self) -> usize {
        2 * (self.source_ntheta - 1)
    }

    #[must_use]
    pub const fn nphi(&self) -> usize {
        self.nphi
    }

    #[must_use]
    pub const fn source_ntheta(&self) -> usize {
        self.source_ntheta
    }

    #[must_use]
    pub const fn spin(&self) -> i32 {
        self.spin
    }

    #[must_use]
    pub const fn convention(&self) -> ExtensionConvention {
        self.convention
    }

    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<Complex64> {
        if row >= self.rows() || col >= self.nphi {
            return None;
        }
        Some(self.data[row * self.nphi + col])
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Complex64] {
        &self.data
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<Complex64> {
        self.data
    }
}

pub(crate) const fn spin_sign(spin: i32) -> f64 {
    if spin % 2 == 0 { 1.0 } else { -1.0 }
}

pub(crate) fn extend_with(
    engine: &FftEngine,
    map: &SphereMap,
    spin: i32,
    convention: ExtensionConvention,
) -> SphtResult<ExtendedMap> {
    let ntheta = map.ntheta();
    let nphi = map.nphi();
    let rows = 2 * (ntheta - 1);
    let sign = spin_sign(spin);

    let mut data = Vec::with_capacity(rows * nphi);
    data.extend_from_slice(map.as_slice());

    // source rows ntheta-2 down to 1, in extended-row order
    let interior = ntheta.saturating_sub(2);
    let mirrored_rows = || map.as_slice().chunks(nphi).skip(1).take(interior).rev();

    let half_turn = if nphi % 2 == 0 {
        Some(nphi / 2)
    } else if convention == ExtensionConvention::Legacy {
        Some((nphi - 1) / 2)
    } else {
        None
    };

    match half_turn {
        Some(shift) => {
            for source in mirrored_rows() {
                data.extend((0..nphi).map(|p| source[(p + shift) % nphi] * sign));
            }
        }
        None => {
            let mirrored = interior;
            if mirrored > 0 {
                let mut block = Vec::with_capacity(mirrored * nphi);
                for source in mirrored_rows() {
                    block.extend_from_slice(source);
                }
                engine.transform_rows_unscaled(&mut block, (mirrored, nphi), false)?;
                for row in block.chunks_mut(nphi) {
                    for (bin, value) in row.iter_mut().enumerate() {
                        if signed_frequency(bin, nphi) % 2 != 0 {
                            *value = -*value;
                        }
                    }
                }
                engine.transform_rows_unscaled(&mut block, (mirrored, nphi), true)?;
                let scale = sign / nphi as f64;
                data.extend(block.into_iter().map(|value| value * scale));
            }
        }
    }

    Ok(ExtendedMap {
        source_ntheta: ntheta,
        nphi,
        spin,
        convention,
        data,
    })
}

#[cfg(test)]
mod tests {
    use num_complex::Complex64;
    use swsh_fft::FftEngine;
    use swsh_runtime::assert_close_complex_slice;

    use super::{ExtendedMap, ExtensionConvention, extend_with};
    use crate::grid::{EquiangularGrid, SphereMap};

    fn ramp(ntheta: usize, nphi: usize) -> SphereMap {
        let grid = EquiangularGrid::new(ntheta, nphi).expect("grid");
        let mut k = 0.0;
        SphereMap::from_fn(grid, |_, _| {
            k += 1.0;
            Complex64::new(k, -0.5 * k)
        })
    }

    #[test]
    fn first_rows_are_copied() {
        let map = ramp(4, 6);
        let ext = extend_with(&FftEngine::default(), &map, 0, ExtensionConvention::Mw)
            .expect("extend");
        assert_eq!(ext.rows(), 6);
        assert_eq!(&ext.as_slice()[..24], map.as_slice());
    }

    #[test]
    fn even_nphi_reindexes_by_half_turn_with_spin_sign() {
        let map = ramp(4, 6);
        let ext = extend_with(&FftEngine::default(), &map, 1, ExtensionConvention::Mw)
            .expect("extend");
        for j in 4..6 {
            for p in 0..6 {
                let expected = -map.get(6 - j, (p + 3) % 6).expect("sample");
                assert_eq!(ext.get(j, p), Some(expected));
            }
        }
    }

    #[test]
    fn conventions_agree_for_even_nphi() {
        let map = ramp(5, 8);
        let engine = FftEngine::default();
        let mw = extend_with(&engine, &map, -2, ExtensionConvention::Mw).expect("mw");
        let legacy = extend_with(&engine, &map, -2, ExtensionConvention::Legacy).expect("legacy");
        assert_eq!(mw.as_slice(), legacy.as_slice());
    }

    #[test]
    fn odd_nphi_mw_shift_is_exact_for_band_limited_rows() {
        let nphi = 7;
        let grid = EquiangularGrid::new(4, nphi).expect("grid");
        let f = |theta: f64, phi: f64| {
            Complex64::new(theta.cos(), 0.0) + Complex64::from_polar(theta.sin(), 2.0 * phi)
                - Complex64::from_polar(0.5, -3.0 * phi)
        };
        let map = SphereMap::from_fn(grid, f);
        let ext = extend_with(&FftEngine::default(), &map, 2, ExtensionConvention::Mw)
            .expect("extend");
        let mut expected = Vec::new();
        for j in 4..6 {
            let theta = grid.theta(6 - j);
            for p in 0..nphi {
                expected.push(f(theta, grid.phi(p) + std::f64::consts::PI));
            }
        }
        assert_close_complex_slice(&ext.as_slice()[4 * nphi..], &expected, 1e-13, 0.0);
    }

    #[test]
    fn odd_nphi_legacy_uses_nearest_reindex() {
        let map = ramp(3, 5);
        let ext = extend_with(&FftEngine::default(), &map, 0, ExtensionConvention::Legacy)
            .expect("extend");
        for p in 0..5 {
            assert_eq!(ext.get(3, p), map.get(1, (p + 2) % 5));
        }
    }

    #[test]
    fn two_row_grid_extends_to_poles_only() {
        let map = ramp(2, 3);
        let ext = extend_with(&FftEngine::default(), &map, 3, ExtensionConvention::Mw)
            .expect("extend");
        assert_eq!(ext.rows(), 2);
        assert_eq!(ext.as_slice(), map.as_slice());
    }

    #[test]
    fn deserialized_extensions_are_validated() {
        let ext = extend_with(&FftEngine::default(), &ramp(3, 4), 1, ExtensionConvention::Mw)
            .expect("extend");
        let json = serde_json::to_string(&ext).expect("serialize");
        let back: ExtendedMap = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, ext);

        let degenerate = r#"{"source_ntheta":1,"nphi":2,"spin":0,"convention":"mw","data":[]}"#;
        assert!(serde_json::from_str::<ExtendedMap>(degenerate).is_err());
        let short = r#"{"source_ntheta":3,"nphi":2,"spin":0,"convention":"mw","data":[[1,0]]}"#;
        let err = serde_json::from_str::<ExtendedMap>(short).expect_err("short data");
        assert!(err.to_string().contains("extended map samples"));
    }
}
