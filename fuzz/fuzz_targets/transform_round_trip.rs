#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use num_complex::Complex64;
use swsh_runtime::{RuntimeMode, max_abs_diff};
use swsh_transform::{SpinTransform, TransformOptions, mode_count, modes};

#[derive(Debug, Arbitrary)]
struct RoundTripInput {
    lmax: u8,
    spin: i8,
    extra_theta: u8,
    extra_phi: u8,
    hardened: bool,
    coefficients: Vec<(i16, i16)>,
}

fuzz_target!(|input: RoundTripInput| {
    let lmax = usize::from(input.lmax % 12).max(1);
    let spin = i32::from(input.spin) % (lmax as i32 + 1);
    if input.coefficients.is_empty() {
        return;
    }
    let floor = spin.unsigned_abs() as i32;
    let alm: Vec<Complex64> = modes(lmax)
        .map(|(index, l, _)| {
            let (re, im) = input.coefficients[index % input.coefficients.len()];
            if l < floor {
                Complex64::new(0.0, 0.0)
            } else {
                Complex64::new(f64::from(re) / 1024.0, f64::from(im) / 1024.0)
            }
        })
        .collect();
    assert_eq!(alm.len(), mode_count(lmax));

    let mode = if input.hardened {
        RuntimeMode::Hardened
    } else {
        RuntimeMode::Strict
    };
    let Ok(engine) = SpinTransform::new(TransformOptions::default().with_mode(mode)) else {
        return;
    };
    let ntheta = lmax + 2 + usize::from(input.extra_theta % 4);
    let nphi = 2 * lmax + 1 + usize::from(input.extra_phi % 4);
    let map = engine
        .salm2map(&alm, spin, lmax, ntheta, nphi)
        .expect("valid synthesis input");
    let back = engine.map2salm(&map, spin, lmax).expect("valid analysis input");
    let scale = alm.iter().map(|v| v.norm()).fold(1.0, f64::max);
    assert!(max_abs_diff(&back, &alm) <= 1e-9 * scale);
});
