//! Fast transforms against the direct-summation oracle on random single modes.
//!
//! Reproduce: `PROPTEST_SEED=<seed> cargo test -p swsh-conformance --test oracle_properties`

use proptest::prelude::*;
use swsh_conformance::oracle::{direct_synthesis, seeded_coefficients};
use swsh_runtime::max_abs_diff;
use swsh_transform::{Complex64, EquiangularGrid, SpinTransform, lm_index, mode_count};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_oracle_single_mode_synthesis(
        lmax in 1usize..7,
        pick in any::<(u16, u16, u16)>(),
        extra in (0usize..3, 0usize..4),
        value in (-2.0f64..2.0, -2.0f64..2.0),
    ) {
        let lmax_i = lmax as i32;
        let spin = i32::from(pick.0) % (2 * lmax_i + 1) - lmax_i;
        let floor = spin.abs();
        let l = floor + i32::from(pick.1) % (lmax_i - floor + 1);
        let m = i32::from(pick.2) % (2 * l + 1) - l;
        let mut alm = vec![Complex64::new(0.0, 0.0); mode_count(lmax)];
        alm[lm_index(l, m, lmax).expect("index")] = Complex64::new(value.0, value.1);

        let (ntheta, nphi) = (lmax + 2 + extra.0, 2 * lmax + 1 + extra.1);
        let engine = SpinTransform::default();
        let fast = engine.salm2map(&alm, spin, lmax, ntheta, nphi).expect("synthesis");
        let reference = direct_synthesis(&alm, spin, lmax, fast.grid());
        let err = max_abs_diff(fast.as_slice(), reference.as_slice());
        prop_assert!(err < 1e-11, "s={} l={} m={} err={}", spin, l, m, err);
    }

    #[test]
    fn test_oracle_analysis_of_direct_maps(lmax in 1usize..6, spin in -2i32..3, seed in any::<u64>()) {
        prop_assume!(spin.unsigned_abs() as usize <= lmax);
        let alm = seeded_coefficients(spin, lmax, seed);
        let grid = EquiangularGrid::minimal(lmax);
        let map = direct_synthesis(&alm, spin, lmax, grid);
        let recovered = SpinTransform::default().map2salm(&map, spin, lmax).expect("analysis");
        prop_assert!(max_abs_diff(&recovered, &alm) < 1e-10);
    }
}
