/// Signed frequency of DFT bin `bin` for a length-`n` transform.
///
/// Bins below `ceil(n/2)` are non-negative; the rest wrap to negative
/// frequencies, so the Nyquist bin of an even length is reported as `-n/2`.
#[must_use]
pub fn signed_frequency(bin: usize, n: usize) -> i64 {
    if bin < n.div_ceil(2) {
        bin as i64
    } else {
        bin as i64 - n as i64
    }
}

/// DFT bin holding signed frequency `freq` for a length-`n` transform.
///
/// Frequencies outside the resolvable range alias modulo `n`.
#[must_use]
pub fn frequency_bin(freq: i64, n: usize) -> usize {
    debug_assert!(n > 0);
    freq.rem_euclid(n as i64) as usize
}
