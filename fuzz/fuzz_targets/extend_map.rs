#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use num_complex::Complex64;
use swsh_transform::{EquiangularGrid, ExtensionConvention, SphereMap, extend_map};

#[derive(Debug, Arbitrary)]
struct ExtendInput {
    ntheta: u8,
    nphi: u8,
    spin: i8,
    legacy: bool,
    samples: Vec<(f64, f64)>,
}

fuzz_target!(|input: ExtendInput| {
    let Ok(grid) = EquiangularGrid::new(usize::from(input.ntheta % 24), usize::from(input.nphi % 24))
    else {
        return;
    };
    let mut samples = input.samples.iter().cycle();
    let map = SphereMap::from_fn(grid, |_, _| {
        samples
            .next()
            .map_or(Complex64::new(0.0, 0.0), |&(re, im)| Complex64::new(re, im))
    });
    let convention = if input.legacy {
        ExtensionConvention::Legacy
    } else {
        ExtensionConvention::Mw
    };
    if let Ok(ext) = extend_map(&map, i32::from(input.spin), convention) {
        assert_eq!(ext.rows(), 2 * (grid.ntheta() - 1));
        assert_eq!(ext.as_slice().len(), ext.rows() * grid.nphi());
    }
});
