//! Half-open bit ranges within a storage location.

use std::{
    fmt,
    hash::{Hash, Hasher},
    ops::{BitAnd, BitOr, Sub},
};

use crate::ir::DataType;

/// The bits `[lsb, msb)` of a value.
///
/// A range with `lsb >= msb` is empty, and all empty ranges compare equal. Union,
/// intersection and difference operate on the covered span rather than on exact bit sets:
/// the union of `[0, 8)` and `[16, 24)` is `[0, 24)`.
///
/// # Examples
///
/// ```rust
/// use backwalk::analysis::BitRange;
///
/// let low = BitRange::new(0, 8);
/// let word = BitRange::new(0, 16);
///
/// assert_eq!(low | BitRange::new(8, 16), word);
/// assert_eq!(word & BitRange::new(4, 32), BitRange::new(4, 16));
/// assert_eq!(word - low, BitRange::new(8, 16));
/// assert_eq!(low.to_string(), "[0..7]");
/// ```
#[derive(Debug, Clone, Copy, Eq)]
pub struct BitRange {
    lsb: i16,
    msb: i16,
}

impl BitRange {
    /// The canonical empty range.
    pub const EMPTY: BitRange = BitRange { lsb: 0, msb: 0 };

    /// Creates the range `[lsb, msb)`.
    #[must_use]
    pub const fn new(lsb: i16, msb: i16) -> Self {
        BitRange { lsb, msb }
    }

    /// Creates the range of `bit_size` bits starting at `bit_address`.
    ///
    /// Positions beyond `i16::MAX` saturate.
    #[must_use]
    pub fn span(bit_address: u32, bit_size: u32) -> Self {
        let clamp = |v: u32| i16::try_from(v).unwrap_or(i16::MAX);
        BitRange::new(clamp(bit_address), clamp(bit_address.saturating_add(bit_size)))
    }

    /// Returns the range covering every bit of `data_type`.
    #[must_use]
    pub fn of_type(data_type: DataType) -> Self {
        BitRange::span(0, data_type.bit_size())
    }

    /// Position of the least significant bit.
    #[must_use]
    pub const fn lsb(&self) -> i16 {
        self.lsb
    }

    /// Position one past the most significant bit.
    #[must_use]
    pub const fn msb(&self) -> i16 {
        self.msb
    }

    /// Number of bits covered, zero for an empty range.
    #[must_use]
    pub fn extent(&self) -> i32 {
        (i32::from(self.msb) - i32::from(self.lsb)).max(0)
    }

    /// Returns `true` if the range covers no bits.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.lsb >= self.msb
    }
}

impl Default for BitRange {
    fn default() -> Self {
        BitRange::EMPTY
    }
}

impl PartialEq for BitRange {
    fn eq(&self, other: &Self) -> bool {
        if self.is_empty() {
            return other.is_empty();
        }
        self.lsb == other.lsb && self.msb == other.msb
    }
}

impl Hash for BitRange {
    fn hash<H: Hasher>(&self, state: &mut H) {
        if self.is_empty() {
            0i16.hash(state);
            0i16.hash(state);
        } else {
            self.lsb.hash(state);
            self.msb.hash(state);
        }
    }
}

impl BitOr for BitRange {
    type Output = BitRange;

    fn bitor(self, rhs: BitRange) -> BitRange {
        if self.is_empty() {
            return rhs;
        }
        if rhs.is_empty() {
            return self;
        }
        BitRange::new(self.lsb.min(rhs.lsb), self.msb.max(rhs.msb))
    }
}

impl BitAnd for BitRange {
    type Output = BitRange;

    fn bitand(self, rhs: BitRange) -> BitRange {
        BitRange::new(self.lsb.max(rhs.lsb), self.msb.min(rhs.msb))
    }
}

impl Sub for BitRange {
    type Output = BitRange;

    /// Removes `rhs` from `self` when the overlap touches one end of `self`.
    ///
    /// An overlap strictly inside `self` would split it in two; `self` is then returned
    /// unchanged.
    fn sub(self, rhs: BitRange) -> BitRange {
        let overlap = self & rhs;
        if overlap.is_empty() {
            return self;
        }
        if overlap.lsb == self.lsb {
            BitRange::new(overlap.msb, self.msb)
        } else if overlap.msb == self.msb {
            BitRange::new(self.lsb, overlap.lsb)
        } else {
            self
        }
    }
}

impl fmt::Display for BitRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "[]")
        } else {
            write!(f, "[{}..{}]", self.lsb, self.msb - 1)
        }
    }
}
