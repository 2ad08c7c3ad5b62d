//! Differential checks against direct summation of `sYlm`, plus the
//! metamorphic relations a correct transform pair must satisfy.

use std::f64::consts::PI;

use swsh_runtime::{TestLogEntry, TestResult, assert_close, assert_close_complex_slice, max_abs_diff};
use swsh_transform::{
    BelowSpinPolicy, Complex64, EquiangularGrid, ExtensionConvention, RuntimeMode, SphereMap,
    SphtError, SpinTransform, TransformOptions, lm_index, map2salm, mode_count, modes,
    quadrature_weights, salm2map,
};

fn factorial(n: i64) -> f64 {
    (1..=n).map(|k| k as f64).product()
}

/// `d^l_{m′m}(β)` by the explicit finite sum.
fn wigner_d(l: i64, mp: i64, m: i64, beta: f64) -> f64 {
    let pre = (factorial(l + mp) * factorial(l - mp) * factorial(l + m) * factorial(l - m)).sqrt();
    let (c, s) = ((beta / 2.0).cos(), (beta / 2.0).sin());
    let mut sum = 0.0;
    for k in 0..=2 * l {
        let (a, b, d) = (l + m - k, mp - m + k, l - mp - k);
        if a < 0 || b < 0 || d < 0 {
            continue;
        }
        let sign = if (mp - m + k) % 2 == 0 { 1.0 } else { -1.0 };
        sum += sign * c.powi((2 * l + m - mp - 2 * k) as i32) * s.powi((mp - m + 2 * k) as i32)
            / (factorial(a) * factorial(k) * factorial(b) * factorial(d));
    }
    pre * sum
}

fn sylm(spin: i64, l: i64, m: i64, theta: f64, phi: f64) -> Complex64 {
    let sign = if spin % 2 == 0 { 1.0 } else { -1.0 };
    let norm = sign * ((2 * l + 1) as f64 / (4.0 * PI)).sqrt();
    Complex64::from_polar(norm * wigner_d(l, m, -spin, theta), m as f64 * phi)
}

fn direct_synthesis(alm: &[Complex64], spin: i32, lmax: usize, grid: EquiangularGrid) -> SphereMap {
    SphereMap::from_fn(grid, |theta, phi| {
        modes(lmax)
            .map(|(index, l, m)| {
                alm[index] * sylm(i64::from(spin), i64::from(l), i64::from(m), theta, phi)
            })
            .sum()
    })
}

fn band_limited(spin: i32, lmax: usize, seed: u64) -> Vec<Complex64> {
    let floor = spin.unsigned_abs() as i32;
    modes(lmax)
        .map(|(index, l, _)| {
            if l < floor {
                Complex64::new(0.0, 0.0)
            } else {
                let x = (index as f64 + 1.0) * (seed as f64 + 0.618);
                Complex64::new(x.sin(), (1.7 * x).cos())
            }
        })
        .collect()
}

fn log_pass(test_id: &str, message: &str, err: f64) {
    let entry = TestLogEntry::new(test_id, "swsh_transform::differential", message)
        .with_mode(RuntimeMode::Strict)
        .with_result(TestResult::Pass)
        .with_max_abs_error(err);
    eprintln!("{}", entry.to_json_line());
}

#[test]
fn diff_single_mode_matches_direct_sylm() {
    let (lmax, spin) = (4, -2);
    let mut alm = vec![Complex64::new(0.0, 0.0); mode_count(lmax)];
    alm[lm_index(2, 2, lmax).expect("index")] = Complex64::new(1.0, 0.0);
    let map = salm2map(&alm, spin, lmax, 9, 9).expect("synthesis");
    let grid = map.grid();
    for i in 0..grid.ntheta() {
        for j in 0..grid.nphi() {
            let expected = sylm(-2, 2, 2, grid.theta(i), grid.phi(j));
            let actual = map.get(i, j).expect("sample");
            assert!((actual - expected).norm() < 1e-12, "({i},{j}) {actual} vs {expected}");
        }
    }
}

#[test]
fn diff_dense_synthesis_matches_direct_sum() {
    for (spin, lmax, ntheta, nphi) in [(0, 5, 7, 11), (1, 4, 6, 9), (-3, 5, 8, 12), (2, 3, 5, 8)] {
        let alm = band_limited(spin, lmax, 3);
        let fast = salm2map(&alm, spin, lmax, ntheta, nphi).expect("synthesis");
        let direct = direct_synthesis(&alm, spin, lmax, fast.grid());
        let err = max_abs_diff(fast.as_slice(), direct.as_slice());
        assert!(err < 1e-11, "spin={spin} lmax={lmax} err={err}");
        log_pass("diff_dense_synthesis_matches_direct_sum", "fast synthesis vs direct sum", err);
    }
}

#[test]
fn diff_analysis_recovers_directly_synthesized_maps() {
    for (spin, lmax, ntheta, nphi) in [(0, 4, 6, 9), (-1, 4, 6, 10), (2, 5, 7, 11)] {
        let alm = band_limited(spin, lmax, 11);
        let grid = EquiangularGrid::new(ntheta, nphi).expect("grid");
        let map = direct_synthesis(&alm, spin, lmax, grid);
        let back = map2salm(&map, spin, lmax).expect("analysis");
        assert_close_complex_slice(&back, &alm, 1e-11, 0.0);
        log_pass(
            "diff_analysis_recovers_directly_synthesized_maps",
            &format!("spin={spin} lmax={lmax} grid={ntheta}x{nphi}"),
            max_abs_diff(&back, &alm),
        );
    }
}

#[test]
fn diff_constant_map_projects_onto_monopole() {
    let grid = EquiangularGrid::new(7, 7).expect("grid");
    let map = SphereMap::from_fn(grid, |_, _| Complex64::new(1.0, 0.0));
    let alm = map2salm(&map, 0, 3).expect("analysis");
    assert_close(alm[0].re, (4.0 * PI).sqrt(), 1e-12, 0.0);
    assert!(alm[0].im.abs() < 1e-12);
    assert!(alm[1..].iter().all(|v| v.norm() < 1e-12));
}

#[test]
fn meta_round_trip_at_minimal_resolution() {
    let (lmax, spin) = (8, -2);
    let mut alm = vec![Complex64::new(0.0, 0.0); mode_count(lmax)];
    alm[lm_index(2, 2, lmax).expect("index")] = Complex64::new(1.0, 0.0);
    for (ntheta, nphi) in [(17, 17), (10, 17)] {
        let map = salm2map(&alm, spin, lmax, ntheta, nphi).expect("synthesis");
        let back = map2salm(&map, spin, lmax).expect("analysis");
        let err = max_abs_diff(&back, &alm);
        assert!(err < 1e-10, "{ntheta}x{nphi} err={err}");
        log_pass(
            "meta_round_trip_at_minimal_resolution",
            &format!("spin={spin} lmax={lmax} grid={ntheta}x{nphi}"),
            err,
        );
    }
    let grid = EquiangularGrid::minimal(lmax);
    assert_eq!((grid.ntheta(), grid.nphi()), (10, 17));
    assert!(grid.resolves(lmax));
}

#[test]
fn meta_smallest_exact_grid_round_trips() {
    for spin in [-2, 0, 1, 3] {
        let lmax = 4;
        let alm = band_limited(spin, lmax, 5);
        let map = salm2map(&alm, spin, lmax, lmax + 2, 2 * lmax + 1).expect("synthesis");
        let back = map2salm(&map, spin, lmax).expect("analysis");
        assert_close_complex_slice(&back, &alm, 1e-11, 0.0);
    }
}

#[test]
fn meta_conventions_agree_on_coefficients() {
    let lmax = 4;
    let alm = band_limited(1, lmax, 2);
    for nphi in [9, 10, 13] {
        let map = salm2map(&alm, 1, lmax, 7, nphi).expect("synthesis");
        let mut results = Vec::new();
        for convention in [ExtensionConvention::Mw, ExtensionConvention::Legacy] {
            let engine =
                SpinTransform::new(TransformOptions::default().with_extension(convention))
                    .expect("engine");
            results.push(engine.map2salm(&map, 1, lmax).expect("analysis"));
        }
        assert_close_complex_slice(&results[0], &alm, 1e-11, 0.0);
        assert_close_complex_slice(&results[1], &results[0], 1e-11, 0.0);
    }
}

#[test]
fn meta_longitude_shift_rotates_phases() {
    let (lmax, spin, nphi) = (4, 2, 11);
    let alm = band_limited(spin, lmax, 7);
    let map = salm2map(&alm, spin, lmax, 7, nphi).expect("synthesis");
    let grid = map.grid();
    let shifted = SphereMap::from_fn(grid, {
        let mut cursor = 0usize;
        move |_, _| {
            let (i, j) = (cursor / nphi, cursor % nphi);
            cursor += 1;
            map.get(i, (j + 1) % nphi).unwrap_or_default()
        }
    });
    let back = map2salm(&shifted, spin, lmax).expect("analysis");
    let step = 2.0 * PI / nphi as f64;
    let expected: Vec<Complex64> = modes(lmax)
        .map(|(index, _, m)| alm[index] * Complex64::from_polar(1.0, f64::from(m) * step))
        .collect();
    assert_close_complex_slice(&back, &expected, 1e-11, 0.0);
}

#[test]
fn meta_real_scalar_maps_have_conjugate_symmetric_modes() {
    let grid = EquiangularGrid::new(8, 12).expect("grid");
    let map = SphereMap::from_fn(grid, |theta, phi| {
        Complex64::new(
            theta.cos().powi(3) + theta.sin().powi(2) * (2.0 * phi).cos() + theta.sin() * phi.sin(),
            0.0,
        )
    });
    let lmax = 5;
    let alm = map2salm(&map, 0, lmax).expect("analysis");
    for (index, l, m) in modes(lmax) {
        let mirror = alm[lm_index(l, -m, lmax).expect("index")];
        let sign = if m % 2 == 0 { 1.0 } else { -1.0 };
        assert!((alm[index] - mirror.conj() * sign).norm() < 1e-12, "l={l} m={m}");
    }
}

#[test]
fn adv_boundary_configurations_are_rejected() {
    assert_eq!(
        salm2map(&[Complex64::new(0.0, 0.0); 4], 0, 1, 1, 4),
        Err(SphtError::InvalidGrid { ntheta: 1, nphi: 4 })
    );
    let grid = EquiangularGrid::new(4, 4).expect("grid");
    assert_eq!(
        map2salm(&SphereMap::zeros(grid), 1, 0),
        Err(SphtError::Configuration { lmax: 0, spin: 1 })
    );
    assert!(matches!(
        salm2map(&[Complex64::new(0.0, 0.0); 5], 0, 1, 4, 4),
        Err(SphtError::ShapeMismatch { .. })
    ));
}

#[test]
fn adv_below_spin_policy_by_mode() {
    let lmax = 3;
    let mut alm = band_limited(2, lmax, 1);
    alm[lm_index(1, 1, lmax).expect("index")] = Complex64::new(1.0, 0.0);

    let strict = SpinTransform::default();
    let filled = strict.salm2map(&alm, 2, lmax, 6, 7).expect("zero-filled");
    let clean = strict
        .salm2map(&band_limited(2, lmax, 1), 2, lmax, 6, 7)
        .expect("clean");
    assert_eq!(filled, clean);

    let hardened = SpinTransform::new(
        TransformOptions::default()
            .with_mode(RuntimeMode::Hardened)
            .with_below_spin(BelowSpinPolicy::ZeroFill),
    )
    .expect("engine");
    assert!(matches!(
        hardened.salm2map(&alm, 2, lmax, 6, 7),
        Err(SphtError::Domain { .. })
    ));
}

#[test]
fn quadrature_table_integrates_sine() {
    for ntheta in [2, 3, 9, 16] {
        let weights = quadrature_weights(ntheta).expect("weights");
        assert_eq!(weights.len(), 2 * (ntheta - 1));
        assert_close(weights.weight(0).re, 2.0, 1e-15, 0.0);
        for p in 1..(ntheta as i64 - 1) {
            assert!((weights.weight(-p) - weights.weight(p).conj()).norm() < 1e-15);
        }
    }
}
