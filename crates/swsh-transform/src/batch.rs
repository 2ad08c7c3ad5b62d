//! Independent per-slice transforms over an outer batch shape.

use num_complex::Complex64;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::{SpinTransform, check_band_limit};
use crate::error::{SphtError, SphtResult};
use crate::grid::{EquiangularGrid, SphereMap};
use crate::index::mode_count;

fn slice_count(shape: &[usize]) -> SphtResult<usize> {
    shape
        .iter()
        .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
        .ok_or_else(|| SphtError::shape("batch shape", "a product within usize", format!("{shape:?}")))
}

/// Spin weight for each batch slice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpinWeights {
    /// One spin broadcast to every slice.
    Uniform(i32),
    /// One spin per slice; `shape` must equal the batch shape.
    PerSlice { shape: Vec<usize>, values: Vec<i32> },
}

impl SpinWeights {
    pub fn per_slice(shape: Vec<usize>, values: Vec<i32>) -> SphtResult<Self> {
        let expected = slice_count(&shape)?;
        if values.len() != expected {
            return Err(SphtError::shape("spin weights", expected, values.len()));
        }
        Ok(Self::PerSlice { shape, values })
    }

    /// Spin of every slice of a batch with `batch_shape`, in slice order.
    pub fn resolve(&self, batch_shape: &[usize]) -> SphtResult<Vec<i32>> {
        let count = slice_count(batch_shape)?;
        match self {
            Self::Uniform(spin) => Ok(vec![*spin; count]),
            Self::PerSlice { shape, values } => {
                if shape.as_slice() != batch_shape || values.len() != count {
                    return Err(SphtError::shape(
                        "spin weights",
                        format!("{batch_shape:?}"),
                        format!("{shape:?}"),
                    ));
                }
                Ok(values.clone())
            }
        }
    }
}

impl From<i32> for SpinWeights {
    fn from(spin: i32) -> Self {
        Self::Uniform(spin)
    }
}

/// Maps sharing one grid, arranged in a row-major outer shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapBatch {
    shape: Vec<usize>,
    grid: EquiangularGrid,
    maps: Vec<SphereMap>,
}

impl MapBatch {
    pub fn new(shape: Vec<usize>, grid: EquiangularGrid, maps: Vec<SphereMap>) -> SphtResult<Self> {
        let count = slice_count(&shape)?;
        if maps.len() != count {
            return Err(SphtError::shape("map batch slices", count, maps.len()));
        }
        if let Some(other) = maps.iter().find(|map| map.grid() != grid) {
            return Err(SphtError::shape(
                "map batch grid",
                format!("{}x{}", grid.ntheta(), grid.nphi()),
                format!("{}x{}", other.ntheta(), other.nphi()),
            ));
        }
        Ok(Self { shape, grid, maps })
    }

    /// Splits contiguous samples of shape `shape × (ntheta, nphi)` into slices.
    pub fn from_flat(
        shape: Vec<usize>,
        grid: EquiangularGrid,
        data: &[Complex64],
    ) -> SphtResult<Self> {
        let count = slice_count(&shape)?;
        let expected = count.checked_mul(grid.len()).unwrap_or(usize::MAX);
        if data.len() != expected {
            return Err(SphtError::shape("map batch samples", expected, data.len()));
        }
        let maps = data
            .chunks(grid.len())
            .map(|chunk| SphereMap::new(grid, chunk.to_vec()))
            .collect::<SphtResult<Vec<_>>>()?;
        Ok(Self { shape, grid, maps })
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[must_use]
    pub const fn grid(&self) -> EquiangularGrid {
        self.grid
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.maps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    #[must_use]
    pub fn maps(&self) -> &[SphereMap] {
        &self.maps
    }

    #[must_use]
    pub fn into_maps(self) -> Vec<SphereMap> {
        self.maps
    }
}

/// Coefficient vectors sharing one `lmax`, arranged in a row-major outer shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeBatch {
    shape: Vec<usize>,
    lmax: usize,
    slices: Vec<Vec<Complex64>>,
}

impl ModeBatch {
    pub fn new(shape: Vec<usize>, lmax: usize, slices: Vec<Vec<Complex64>>) -> SphtResult<Self> {
        let count = slice_count(&shape)?;
        if slices.len() != count {
            return Err(SphtError::shape("mode batch slices", count, slices.len()));
        }
        if let Some(slice) = slices.iter().find(|slice| slice.len() != mode_count(lmax)) {
            return Err(SphtError::shape(
                "mode batch coefficients",
                mode_count(lmax),
                slice.len(),
            ));
        }
        Ok(Self {
            shape,
            lmax,
            slices,
        })
    }

    /// Splits contiguous coefficients of shape `shape × (lmax+1)²` into slices.
    pub fn from_flat(shape: Vec<usize>, lmax: usize, data: &[Complex64]) -> SphtResult<Self> {
        let count = slice_count(&shape)?;
        let expected = count.checked_mul(mode_count(lmax)).unwrap_or(usize::MAX);
        if data.len() != expected {
            return Err(SphtError::shape("mode batch coefficients", expected, data.len()));
        }
        let slices = data.chunks(mode_count(lmax)).map(<[_]>::to_vec).collect();
        Ok(Self {
            shape,
            lmax,
            slices,
        })
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[must_use]
    pub const fn lmax(&self) -> usize {
        self.lmax
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    #[must_use]
    pub fn get(&self, slice: usize) -> Option<&[Complex64]> {
        self.slices.get(slice).map(Vec::as_slice)
    }

    #[must_use]
    pub fn slices(&self) -> &[Vec<Complex64>] {
        &self.slices
    }
}

impl SpinTransform {
    /// [`SpinTransform::map2salm`] applied to every slice of `maps`.
    pub fn map2salm_batch(
        &self,
        maps: &MapBatch,
        spins: &SpinWeights,
        lmax: usize,
    ) -> SphtResult<ModeBatch> {
        let spins = spins.resolve(maps.shape())?;
        for &spin in &spins {
            check_band_limit(lmax, spin)?;
        }
        debug!(slices = maps.len(), lmax, "map2salm batch");
        let slices = self.dispatch(maps.len(), |i| self.map2salm(&maps.maps[i], spins[i], lmax))?;
        Ok(ModeBatch {
            shape: maps.shape.clone(),
            lmax,
            slices,
        })
    }

    /// [`SpinTransform::salm2map`] applied to every slice of `modes`.
    pub fn salm2map_batch(
        &self,
        modes: &ModeBatch,
        spins: &SpinWeights,
        ntheta: usize,
        nphi: usize,
    ) -> SphtResult<MapBatch> {
        let grid = EquiangularGrid::new(ntheta, nphi)?;
        let spins = spins.resolve(modes.shape())?;
        for &spin in &spins {
            check_band_limit(modes.lmax, spin)?;
        }
        debug!(slices = modes.len(), lmax = modes.lmax, ntheta, nphi, "salm2map batch");
        let maps = self.dispatch(modes.len(), |i| {
            self.salm2map(&modes.slices[i], spins[i], modes.lmax, ntheta, nphi)
        })?;
        Ok(MapBatch {
            shape: modes.shape.clone(),
            grid,
            maps,
        })
    }

    fn dispatch<T, F>(&self, count: usize, slice: F) -> SphtResult<Vec<T>>
    where
        T: Send,
        F: Fn(usize) -> SphtResult<T> + Send + Sync,
    {
        if self.parallel() && count > 1 {
            self.install(|| (0..count).into_par_iter().map(&slice).collect())
        } else {
            (0..count).map(slice).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use num_complex::Complex64;

    use super::{MapBatch, ModeBatch, SpinWeights};
    use crate::SphtError;
    use crate::engine::SpinTransform;
    use crate::grid::{EquiangularGrid, SphereMap};
    use crate::index::mode_count;

    #[test]
    fn uniform_spin_broadcasts() {
        assert_eq!(SpinWeights::Uniform(-1).resolve(&[2, 2]), Ok(vec![-1; 4]));
        assert_eq!(SpinWeights::from(3).resolve(&[]), Ok(vec![3]));
    }

    #[test]
    fn per_slice_spin_must_match_shape_exactly() {
        let spins = SpinWeights::per_slice(vec![3], vec![0, 1, 2]).expect("spins");
        assert_eq!(spins.resolve(&[3]), Ok(vec![0, 1, 2]));
        assert!(matches!(spins.resolve(&[1, 3]), Err(SphtError::ShapeMismatch { .. })));
        assert!(matches!(spins.resolve(&[4]), Err(SphtError::ShapeMismatch { .. })));
        assert!(SpinWeights::per_slice(vec![2, 2], vec![0; 3]).is_err());
    }

    #[test]
    fn batches_check_slice_counts_and_grids() {
        let grid = EquiangularGrid::new(4, 5).expect("grid");
        let other = EquiangularGrid::new(5, 5).expect("grid");
        assert!(MapBatch::new(vec![2], grid, vec![SphereMap::zeros(grid)]).is_err());
        assert!(
            MapBatch::new(vec![2], grid, vec![SphereMap::zeros(grid), SphereMap::zeros(other)])
                .is_err()
        );
        assert!(ModeBatch::new(vec![1], 2, vec![vec![Complex64::new(0.0, 0.0); 8]]).is_err());
        let flat = vec![Complex64::new(1.0, 0.0); 2 * mode_count(2)];
        let modes = ModeBatch::from_flat(vec![2], 2, &flat).expect("flat");
        assert_eq!(modes.len(), 2);
        assert_eq!(modes.get(1).map(<[_]>::len), Some(9));
    }

    #[test]
    fn batch_slices_match_single_transforms_bitwise() {
        let lmax = 4;
        let spins = SpinWeights::per_slice(vec![2, 2], vec![0, 1, -2, 3]).expect("spins");
        let slices: Vec<Vec<Complex64>> = [0i32, 1, -2, 3]
            .iter()
            .enumerate()
            .map(|(b, &s)| {
                let floor = s.unsigned_abs() as usize;
                (0..mode_count(lmax))
                    .map(|i| {
                        let l = (i as f64).sqrt() as usize;
                        if l < floor {
                            Complex64::new(0.0, 0.0)
                        } else {
                            Complex64::new((i + b) as f64 * 0.1, 1.0 / (1.0 + i as f64))
                        }
                    })
                    .collect()
            })
            .collect();
        let modes = ModeBatch::new(vec![2, 2], lmax, slices).expect("batch");
        let engine = SpinTransform::default();
        let maps = engine.salm2map_batch(&modes, &spins, 7, 9).expect("batch synthesis");
        assert_eq!(maps.shape(), &[2, 2]);
        for (i, &s) in [0, 1, -2, 3].iter().enumerate() {
            let alone = engine
                .salm2map(modes.get(i).expect("slice"), s, lmax, 7, 9)
                .expect("single");
            assert_eq!(maps.maps()[i], alone);
        }

        let back = engine.map2salm_batch(&maps, &spins, lmax).expect("batch analysis");
        for (i, &s) in [0, 1, -2, 3].iter().enumerate() {
            let alone = engine.map2salm(&maps.maps()[i], s, lmax).expect("single");
            assert_eq!(back.get(i), Some(alone.as_slice()));
        }
    }

    #[test]
    fn spin_above_lmax_in_any_slice_fails_before_dispatch() {
        let engine = SpinTransform::default();
        let grid = EquiangularGrid::new(5, 5).expect("grid");
        let maps = MapBatch::new(vec![2], grid, vec![SphereMap::zeros(grid); 2]).expect("batch");
        let spins = SpinWeights::per_slice(vec![2], vec![0, 3]).expect("spins");
        assert_eq!(
            engine.map2salm_batch(&maps, &spins, 2),
            Err(SphtError::Configuration { lmax: 2, spin: 3 })
        );
        assert!(engine.evidence().is_empty());
    }
}
