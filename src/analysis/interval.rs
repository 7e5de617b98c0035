//! Strided intervals.

use std::fmt;

use crate::{ir::Constant, Error, Result};

/// The set `{low, low + stride, low + 2·stride, ..., high}`.
///
/// A stride of 0 denotes the singleton `{low}`. The sentinel [`StridedInterval::EMPTY`],
/// stored as stride `-1`, stands for "no information": an index range that could not be
/// determined or represented.
///
/// # Display
///
/// `{stride}[{low},{high}]` with all three numbers in upper-case hexadecimal and negative
/// bounds printed as `-` followed by the hexadecimal magnitude. `EMPTY` prints as `⟘`.
///
/// ```rust
/// use backwalk::analysis::StridedInterval;
///
/// assert_eq!(StridedInterval::create(4, 9, 29)?.to_string(), "4[9,1D]");
/// assert_eq!(StridedInterval::create(16, -256, 256)?.to_string(), "10[-100,100]");
/// assert_eq!(StridedInterval::EMPTY.to_string(), "\u{27D8}");
/// # Ok::<(), backwalk::Error>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StridedInterval {
    stride: i32,
    low: i64,
    high: i64,
}

impl StridedInterval {
    /// The empty, "unknown" interval.
    pub const EMPTY: StridedInterval = StridedInterval {
        stride: -1,
        low: 0,
        high: 0,
    };

    /// Creates a strided interval.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `stride` is negative or `low > high`.
    pub fn create(stride: i32, low: i64, high: i64) -> Result<Self> {
        if stride < 0 {
            return Err(Error::InvalidArgument(format!(
                "negative stride {stride} is not allowed"
            )));
        }
        if low > high {
            return Err(Error::InvalidArgument(format!(
                "low bound {low} must not exceed high bound {high}"
            )));
        }
        Ok(StridedInterval { stride, low, high })
    }

    /// Creates the singleton interval holding `c`.
    #[must_use]
    pub fn constant(c: &Constant) -> Self {
        let v = c.to_i64();
        StridedInterval {
            stride: 0,
            low: v,
            high: v,
        }
    }

    /// Distance between consecutive members, `-1` for [`StridedInterval::EMPTY`].
    #[must_use]
    pub const fn stride(&self) -> i32 {
        self.stride
    }

    /// Smallest member.
    #[must_use]
    pub const fn low(&self) -> i64 {
        self.low
    }

    /// Largest member.
    #[must_use]
    pub const fn high(&self) -> i64 {
        self.high
    }

    /// Returns `true` for the [`StridedInterval::EMPTY`] sentinel.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.stride < 0
    }

    /// Returns `true` if the interval holds exactly one value.
    #[must_use]
    pub const fn is_singleton(&self) -> bool {
        !self.is_empty() && (self.stride == 0 || self.low == self.high)
    }
}

impl Default for StridedInterval {
    fn default() -> Self {
        StridedInterval::EMPTY
    }
}

struct SignedHex(i64);

impl fmt::Display for SignedHex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 < 0 {
            write!(f, "-{:X}", self.0.unsigned_abs())
        } else {
            write!(f, "{:X}", self.0)
        }
    }
}

impl fmt::Display for StridedInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "\u{27D8}");
        }
        write!(
            f,
            "{:X}[{},{}]",
            self.stride,
            SignedHex(self.low),
            SignedHex(self.high)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_validates() {
        assert!(StridedInterval::create(1, 0, 4).is_ok());
        assert!(matches!(
            StridedInterval::create(-1, 0, 4),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            StridedInterval::create(1, 5, 4),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_constant_is_singleton() {
        let si = StridedInterval::constant(&Constant::word32(0x42));
        assert_eq!(si.stride(), 0);
        assert_eq!(si.low(), 0x42);
        assert_eq!(si.high(), 0x42);
        assert!(si.is_singleton());
        assert_eq!(si.to_string(), "0[42,42]");
    }

    #[test]
    fn test_empty() {
        assert!(StridedInterval::EMPTY.is_empty());
        assert!(!StridedInterval::EMPTY.is_singleton());
        assert_eq!(StridedInterval::default(), StridedInterval::EMPTY);
        assert_eq!(StridedInterval::EMPTY.to_string(), "\u{27D8}");
    }

    #[test]
    fn test_display_hex() {
        let si = StridedInterval::create(4, 0, 20).unwrap();
        assert_eq!(si.to_string(), "4[0,14]");
        let si = StridedInterval::create(1, i64::MIN, -1).unwrap();
        assert_eq!(si.to_string(), "1[-8000000000000000,-1]");
    }
}
