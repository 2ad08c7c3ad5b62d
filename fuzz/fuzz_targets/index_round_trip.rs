#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use swsh_transform::{index_lm, lm_index, mode_count};

#[derive(Debug, Arbitrary)]
struct IndexInput {
    lmax: u16,
    index: u32,
    l: i32,
    m: i32,
}

fuzz_target!(|input: IndexInput| {
    let lmax = usize::from(input.lmax);
    let index = input.index as usize;
    match index_lm(index, lmax) {
        Ok((l, m)) => {
            assert!(index < mode_count(lmax));
            assert_eq!(lm_index(l, m, lmax), Ok(index));
        }
        Err(_) => assert!(index >= mode_count(lmax)),
    }
    if let Ok(at) = lm_index(input.l, input.m, lmax) {
        assert_eq!(index_lm(at, lmax), Ok((input.l, input.m)));
    }
});
