//! Typed constants and code/data addresses.

use std::fmt;

use crate::{ir::DataType, utils::sign_extend};

/// A constant value of a primitive [`DataType`].
///
/// The raw bits are always stored masked to the type's width, so two constants of the same
/// type compare equal exactly when they denote the same value. A constant whose type is
/// [`DataType::INVALID`] is the `Invalid` sentinel produced by out-of-range memory reads.
///
/// # Display
///
/// Signed integers print in decimal. Every other type prints as upper-case hexadecimal with
/// a `0x` prefix, zero-padded to the type's byte width:
///
/// ```rust
/// use backwalk::ir::{Constant, DataType};
///
/// assert_eq!(Constant::word32(0x123400).to_string(), "0x00123400");
/// assert_eq!(Constant::int32(-2).to_string(), "-2");
/// assert_eq!(Constant::invalid().to_string(), "<invalid>");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Constant {
    data_type: DataType,
    bits: u64,
}

impl Constant {
    /// Creates a constant from raw bits, masking them to the width of `data_type`.
    #[must_use]
    pub fn new(data_type: DataType, bits: u64) -> Self {
        Constant {
            data_type,
            bits: bits & data_type.mask(),
        }
    }

    /// Creates a constant from a signed value, wrapping it into the width of `data_type`.
    #[must_use]
    #[allow(clippy::cast_sign_loss)] // two's complement reinterpretation is intended
    pub fn create(data_type: DataType, value: i64) -> Self {
        Constant::new(data_type, value as u64)
    }

    /// Returns the `Invalid` sentinel.
    #[must_use]
    pub const fn invalid() -> Self {
        Constant {
            data_type: DataType::INVALID,
            bits: 0,
        }
    }

    /// Creates a `byte` constant.
    #[must_use]
    pub fn byte(value: u8) -> Self {
        Constant::new(DataType::BYTE, u64::from(value))
    }

    /// Creates a `word16` constant.
    #[must_use]
    pub fn word16(value: u16) -> Self {
        Constant::new(DataType::WORD16, u64::from(value))
    }

    /// Creates a `word32` constant.
    #[must_use]
    pub fn word32(value: u32) -> Self {
        Constant::new(DataType::WORD32, u64::from(value))
    }

    /// Creates a `word64` constant.
    #[must_use]
    pub fn word64(value: u64) -> Self {
        Constant::new(DataType::WORD64, value)
    }

    /// Creates an untyped constant of `bit_size` bits.
    #[must_use]
    pub fn word(bit_size: u32, value: u64) -> Self {
        Constant::new(DataType::word(bit_size), value)
    }

    /// Creates an `int32` constant.
    #[must_use]
    pub fn int32(value: i32) -> Self {
        Constant::create(DataType::INT32, i64::from(value))
    }

    /// Creates an `int64` constant.
    #[must_use]
    pub fn int64(value: i64) -> Self {
        Constant::create(DataType::INT64, value)
    }

    /// Returns the type of this constant.
    #[must_use]
    pub const fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Returns `false` for the `Invalid` sentinel.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        !self.data_type.is_invalid()
    }

    /// Returns the raw bits, zero-extended to 64 bits.
    #[must_use]
    pub const fn to_u64(&self) -> u64 {
        self.bits
    }

    /// Returns the value as a signed 64-bit integer.
    ///
    /// Signed types are sign-extended from their width; all other types are zero-extended,
    /// so a `word32` holding `0xFFFFFFFF` yields `4294967295`.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)] // 64-bit values reinterpret as two's complement
    pub fn to_i64(&self) -> i64 {
        if self.data_type.is_signed() {
            sign_extend(self.bits, self.data_type.bit_size()) as i64
        } else {
            self.bits as i64
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_valid() {
            return write!(f, "<invalid>");
        }
        if self.data_type.is_signed() {
            return write!(f, "{}", self.to_i64());
        }
        if self.data_type == DataType::BOOL {
            return write!(f, "{}", self.bits != 0);
        }
        write!(f, "0x{:0width$X}", self.bits, width = self.data_type.size() * 2)
    }
}

/// A linear code or data address.
///
/// The bit size records the pointer width the address was created with; it only affects
/// display, where the address prints as zero-padded hexadecimal without prefix.
///
/// ```rust
/// use backwalk::ir::Address;
///
/// assert_eq!(Address::ptr32(0x200).to_string(), "00000200");
/// assert_eq!(Address::ptr16(0x42).to_string(), "0042");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address {
    value: u64,
    bit_size: u32,
}

impl Address {
    /// Creates a 16-bit address.
    #[must_use]
    pub const fn ptr16(value: u16) -> Self {
        Address {
            value: value as u64,
            bit_size: 16,
        }
    }

    /// Creates a 32-bit address.
    #[must_use]
    pub const fn ptr32(value: u32) -> Self {
        Address {
            value: value as u64,
            bit_size: 32,
        }
    }

    /// Creates a 64-bit address.
    #[must_use]
    pub const fn ptr64(value: u64) -> Self {
        Address {
            value,
            bit_size: 64,
        }
    }

    /// Creates an address of the given pointer width, truncating `value` to fit.
    #[must_use]
    pub fn new(value: u64, bit_size: u32) -> Self {
        Address {
            value: value & crate::utils::low_mask(bit_size),
            bit_size,
        }
    }

    /// Returns the linear value of this address.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.value
    }

    /// Returns the pointer width of this address in bits.
    #[must_use]
    pub const fn bit_size(&self) -> u32 {
        self.bit_size
    }

    /// Returns the pointer type matching this address' width.
    #[must_use]
    pub const fn data_type(&self) -> DataType {
        DataType::new(crate::ir::TypeDomain::Pointer, self.bit_size)
    }

    /// Returns this address displaced by `offset` bytes, wrapping at the pointer width.
    #[must_use]
    pub fn offset(&self, offset: u64) -> Self {
        Address::new(self.value.wrapping_add(offset), self.bit_size)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.bit_size.div_ceil(4) as usize;
        write!(f, "{:0width$X}", self.value, width = width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_masks_to_width() {
        let c = Constant::new(DataType::BYTE, 0x1FF);
        assert_eq!(c.to_u64(), 0xFF);
        assert_eq!(Constant::create(DataType::WORD16, -1).to_u64(), 0xFFFF);
    }

    #[test]
    fn test_constant_to_i64() {
        assert_eq!(Constant::int32(-4).to_i64(), -4);
        assert_eq!(Constant::word32(0xFFFF_FFFF).to_i64(), 0xFFFF_FFFF);
        assert_eq!(Constant::create(DataType::INT8, 0x80).to_i64(), -128);
    }

    #[test]
    fn test_constant_display() {
        assert_eq!(Constant::word32(0x0012_3400).to_string(), "0x00123400");
        assert_eq!(Constant::byte(7).to_string(), "0x07");
        assert_eq!(Constant::int32(2).to_string(), "2");
        assert_eq!(Constant::new(DataType::BOOL, 1).to_string(), "true");
        assert_eq!(Constant::invalid().to_string(), "<invalid>");
    }

    #[test]
    fn test_invalid_sentinel() {
        assert!(!Constant::invalid().is_valid());
        assert!(Constant::word32(0).is_valid());
    }

    #[test]
    fn test_address() {
        let addr = Address::ptr32(0x0012_0000);
        assert_eq!(addr.to_string(), "00120000");
        assert_eq!(addr.offset(4).value(), 0x0012_0004);
        assert_eq!(Address::new(0x1_0000_0010, 32).value(), 0x10);
        assert_eq!(addr.data_type(), DataType::PTR32);
    }
}
