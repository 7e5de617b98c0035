//! Primitive data types carried by RTL expressions.
//!
//! Only the information the slicer and the value-set evaluator need is modelled: a bit
//! width, used for wraparound and truncation, and a [`TypeDomain`], used to decide whether
//! a widening cast sign-extends.

use std::fmt;

/// The interpretation of a primitive type's bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypeDomain {
    /// Untyped bits (`byte`, `word32`, ...)
    Word,
    /// Two's complement signed integer
    SignedInt,
    /// Unsigned integer
    UnsignedInt,
    /// Code or data pointer
    Pointer,
    /// Boolean truth value
    Boolean,
    /// Marker for the `Invalid` constant sentinel
    Invalid,
}

/// A primitive data type: a [`TypeDomain`] and a width in bits.
///
/// # Examples
///
/// ```rust
/// use backwalk::ir::DataType;
///
/// assert_eq!(DataType::WORD32.bit_size(), 32);
/// assert_eq!(DataType::WORD32.size(), 4);
/// assert!(DataType::INT16.is_signed());
/// assert_eq!(DataType::BYTE.to_string(), "byte");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DataType {
    domain: TypeDomain,
    bit_size: u32,
}

impl DataType {
    /// 8 untyped bits
    pub const BYTE: DataType = DataType::new(TypeDomain::Word, 8);
    /// 16 untyped bits
    pub const WORD16: DataType = DataType::new(TypeDomain::Word, 16);
    /// 32 untyped bits
    pub const WORD32: DataType = DataType::new(TypeDomain::Word, 32);
    /// 64 untyped bits
    pub const WORD64: DataType = DataType::new(TypeDomain::Word, 64);
    /// Signed 8-bit integer
    pub const INT8: DataType = DataType::new(TypeDomain::SignedInt, 8);
    /// Signed 16-bit integer
    pub const INT16: DataType = DataType::new(TypeDomain::SignedInt, 16);
    /// Signed 32-bit integer
    pub const INT32: DataType = DataType::new(TypeDomain::SignedInt, 32);
    /// Signed 64-bit integer
    pub const INT64: DataType = DataType::new(TypeDomain::SignedInt, 64);
    /// Unsigned 8-bit integer
    pub const UINT8: DataType = DataType::new(TypeDomain::UnsignedInt, 8);
    /// Unsigned 16-bit integer
    pub const UINT16: DataType = DataType::new(TypeDomain::UnsignedInt, 16);
    /// Unsigned 32-bit integer
    pub const UINT32: DataType = DataType::new(TypeDomain::UnsignedInt, 32);
    /// Unsigned 64-bit integer
    pub const UINT64: DataType = DataType::new(TypeDomain::UnsignedInt, 64);
    /// 16-bit pointer
    pub const PTR16: DataType = DataType::new(TypeDomain::Pointer, 16);
    /// 32-bit pointer
    pub const PTR32: DataType = DataType::new(TypeDomain::Pointer, 32);
    /// 64-bit pointer
    pub const PTR64: DataType = DataType::new(TypeDomain::Pointer, 64);
    /// Boolean
    pub const BOOL: DataType = DataType::new(TypeDomain::Boolean, 1);
    /// Type of the `Invalid` constant
    pub const INVALID: DataType = DataType::new(TypeDomain::Invalid, 0);

    /// Creates a data type from a domain and a bit width.
    #[must_use]
    pub const fn new(domain: TypeDomain, bit_size: u32) -> Self {
        DataType { domain, bit_size }
    }

    /// Creates an untyped word of the given width.
    #[must_use]
    pub const fn word(bit_size: u32) -> Self {
        DataType::new(TypeDomain::Word, bit_size)
    }

    /// Creates a signed integer of the given width.
    #[must_use]
    pub const fn int(bit_size: u32) -> Self {
        DataType::new(TypeDomain::SignedInt, bit_size)
    }

    /// Returns the domain of this type.
    #[must_use]
    pub const fn domain(&self) -> TypeDomain {
        self.domain
    }

    /// Returns the width of this type in bits.
    #[must_use]
    pub const fn bit_size(&self) -> u32 {
        self.bit_size
    }

    /// Returns the width of this type in bytes, rounded up.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.bit_size.div_ceil(8) as usize
    }

    /// Returns a mask covering every bit of this type.
    #[must_use]
    pub fn mask(&self) -> u64 {
        crate::utils::low_mask(self.bit_size)
    }

    /// Returns `true` for signed integer types.
    #[must_use]
    pub const fn is_signed(&self) -> bool {
        matches!(self.domain, TypeDomain::SignedInt)
    }

    /// Returns `true` for the type of the `Invalid` sentinel.
    #[must_use]
    pub const fn is_invalid(&self) -> bool {
        matches!(self.domain, TypeDomain::Invalid)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.domain {
            TypeDomain::Word if self.bit_size == 8 => write!(f, "byte"),
            TypeDomain::Word => write!(f, "word{}", self.bit_size),
            TypeDomain::SignedInt => write!(f, "int{}", self.bit_size),
            TypeDomain::UnsignedInt => write!(f, "uint{}", self.bit_size),
            TypeDomain::Pointer => write!(f, "ptr{}", self.bit_size),
            TypeDomain::Boolean => write!(f, "bool"),
            TypeDomain::Invalid => write!(f, "<invalid>"),
        }
    }
}
