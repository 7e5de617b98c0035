//! Bit manipulation helpers shared by the interval and value-set arithmetic.

/// Returns `true` if `n` is a non-zero power of two.
///
/// Used to recognise masks of the form `2^k - 1`: a mask `m` bounds an index to
/// `[0, m]` exactly when `m + 1` is a power of two.
///
/// # Examples
///
/// ```rust,ignore
/// use backwalk::utils::is_even_power_of_two;
///
/// assert!(is_even_power_of_two(8));
/// assert!(!is_even_power_of_two(0));
/// assert!(!is_even_power_of_two(6));
/// ```
#[must_use]
#[allow(clippy::cast_sign_loss)] // n > 0 verified above
pub fn is_even_power_of_two(n: i128) -> bool {
    if n <= 0 {
        return false;
    }
    (n as u128).is_power_of_two()
}

/// Sign-extends the low `bits` bits of `value` to 64 bits.
///
/// Bits of `value` above position `bits` are ignored. A width of 0 yields 0 and a
/// width of 64 or more returns `value` unchanged.
///
/// # Arguments
///
/// * `value` - The raw value
/// * `bits` - Width of the value's sign bit position plus one
#[must_use]
pub fn sign_extend(value: u64, bits: u32) -> u64 {
    if bits == 0 {
        return 0;
    }
    if bits >= 64 {
        return value;
    }
    let sign = 1u64 << (bits - 1);
    let value = value & low_mask(bits);
    (value ^ sign).wrapping_sub(sign)
}

/// Returns a mask with the low `bits` bits set.
#[must_use]
pub fn low_mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}
