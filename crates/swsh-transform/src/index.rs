//! Linear storage order of mode coefficients.
//!
//! Modes are stored row-major by increasing degree `l`, then increasing
//! order `m`, starting at `(0, 0)`: index `l² + l + m`.

use crate::error::{SphtError, SphtResult};

/// Number of `(l, m)` modes with `l <= lmax`.
#[must_use]
pub const fn mode_count(lmax: usize) -> usize {
    (lmax + 1) * (lmax + 1)
}

/// Storage index of mode `(l, m)`.
pub fn lm_index(l: i32, m: i32, lmax: usize) -> SphtResult<usize> {
    if l < 0 {
        return Err(SphtError::domain(format!("degree l={l} is negative")));
    }
    let degree = l as usize;
    if degree > lmax {
        return Err(SphtError::domain(format!(
            "degree l={l} exceeds lmax={lmax}"
        )));
    }
    if m.unsigned_abs() > l.unsigned_abs() {
        return Err(SphtError::domain(format!(
            "order m={m} outside [-{l}, {l}]"
        )));
    }
    Ok(mode_offset(degree, m))
}

/// Inverse of [`lm_index`].
pub fn index_lm(index: usize, lmax: usize) -> SphtResult<(i32, i32)> {
    let count = mode_count(lmax);
    if index >= count {
        return Err(SphtError::domain(format!(
            "index {index} outside [0, {count}) for lmax={lmax}"
        )));
    }
    let l = degree_of(index);
    let m = index as i64 - (l * l + l) as i64;
    Ok((l as i32, m as i32))
}

/// Iterator over `(index, l, m)` in storage order.
pub fn modes(lmax: usize) -> impl Iterator<Item = (usize, i32, i32)> {
    (0..=lmax as i32)
        .flat_map(|l| (-l..=l).map(move |m| (l, m)))
        .enumerate()
        .map(|(index, (l, m))| (index, l, m))
}

/// Unchecked storage offset; callers guarantee `|m| <= l`.
#[inline]
pub(crate) fn mode_offset(l: usize, m: i32) -> usize {
    ((l * l + l) as i64 + i64::from(m)) as usize
}

fn degree_of(index: usize) -> usize {
    let mut l = (index as f64).sqrt() as usize;
    while l * l > index {
        l -= 1;
    }
    while (l + 1) * (l + 1) <= index {
        l += 1;
    }
    l
}
