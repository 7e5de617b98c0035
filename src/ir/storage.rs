//! Storage locations and the identifiers that name them.
//!
//! Every [`Identifier`] is bound to a [`Storage`]. Storages that overlap physically share a
//! [`StorageDomain`]: `al`, `ah`, `ax` and `eax` all live in the domain of register 0 and
//! differ only in their bit address and bit size. The slicer relies on this to notice that
//! a write to `al` affects a live `eax`.

use std::fmt;

use crate::ir::DataType;

/// The maximal physical location a storage is part of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StorageDomain {
    /// A machine register, identified by its architecture register number
    Register(u32),
    /// A processor status register holding condition-code flag groups
    FlagRegister(u32),
    /// A lifter temporary
    Temporary(u32),
}

impl fmt::Display for StorageDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageDomain::Register(n) => write!(f, "reg{n}"),
            StorageDomain::FlagRegister(n) => write!(f, "flags{n}"),
            StorageDomain::Temporary(n) => write!(f, "tmp{n}"),
        }
    }
}

/// A storage location: a bit span `[bit_address, bit_address + bit_size)` in a domain.
///
/// # Examples
///
/// ```rust
/// use backwalk::ir::Storage;
///
/// let eax = Storage::register(0, 0, 32);
/// let ah = Storage::register(0, 8, 8);
/// assert!(eax.covers(&ah));
/// assert_eq!(eax.offset_of(&ah), Some(8));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Storage {
    domain: StorageDomain,
    bit_address: u32,
    bit_size: u32,
}

impl Storage {
    /// Creates a (sub-)register storage.
    ///
    /// # Arguments
    ///
    /// * `number` - Register number of the enclosing full-width register
    /// * `bit_address` - Position of the least significant bit inside that register
    /// * `bit_size` - Width of the (sub-)register
    #[must_use]
    pub const fn register(number: u32, bit_address: u32, bit_size: u32) -> Self {
        Storage {
            domain: StorageDomain::Register(number),
            bit_address,
            bit_size,
        }
    }

    /// Creates a flag-group storage inside the flag register `number`.
    #[must_use]
    pub const fn flag_group(number: u32, bit_size: u32) -> Self {
        Storage {
            domain: StorageDomain::FlagRegister(number),
            bit_address: 0,
            bit_size,
        }
    }

    /// Creates a temporary storage.
    #[must_use]
    pub const fn temporary(number: u32, bit_size: u32) -> Self {
        Storage {
            domain: StorageDomain::Temporary(number),
            bit_address: 0,
            bit_size,
        }
    }

    /// Returns the domain this storage belongs to.
    #[must_use]
    pub const fn domain(&self) -> StorageDomain {
        self.domain
    }

    /// Returns the bit position of this storage inside its domain.
    #[must_use]
    pub const fn bit_address(&self) -> u32 {
        self.bit_address
    }

    /// Returns the width of this storage in bits.
    #[must_use]
    pub const fn bit_size(&self) -> u32 {
        self.bit_size
    }

    /// Returns `true` if `other` lies in the same domain and inside this storage's bits.
    #[must_use]
    pub fn covers(&self, other: &Storage) -> bool {
        self.domain == other.domain
            && self.bit_address <= other.bit_address
            && other.bit_address + other.bit_size <= self.bit_address + self.bit_size
    }

    /// Returns the bit offset of `other` relative to this storage, if this storage covers it.
    #[must_use]
    pub fn offset_of(&self, other: &Storage) -> Option<u32> {
        if self.covers(other) {
            Some(other.bit_address - self.bit_address)
        } else {
            None
        }
    }
}

/// A named reference to a [`Storage`].
///
/// Identifiers compare, order and hash by value (name, type and storage), never by
/// reference, so two separately built `r1` identifiers are the same key in a live set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identifier {
    name: String,
    data_type: DataType,
    storage: Storage,
}

impl Identifier {
    /// Creates an identifier.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: DataType, storage: Storage) -> Self {
        Identifier {
            name: name.into(),
            data_type,
            storage,
        }
    }

    /// Creates an identifier for the full-width register `number`.
    #[must_use]
    pub fn register(name: impl Into<String>, data_type: DataType, number: u32) -> Self {
        let bit_size = data_type.bit_size();
        Identifier::new(name, data_type, Storage::register(number, 0, bit_size))
    }

    /// Creates an identifier for a sub-register of register `number`.
    #[must_use]
    pub fn sub_register(
        name: impl Into<String>,
        data_type: DataType,
        number: u32,
        bit_address: u32,
    ) -> Self {
        let bit_size = data_type.bit_size();
        Identifier::new(
            name,
            data_type,
            Storage::register(number, bit_address, bit_size),
        )
    }

    /// Creates an identifier for a flag group of the flag register `number`.
    #[must_use]
    pub fn flag_group(name: impl Into<String>, number: u32) -> Self {
        Identifier::new(name, DataType::BYTE, Storage::flag_group(number, 8))
    }

    /// Creates an identifier for a lifter temporary.
    #[must_use]
    pub fn temporary(name: impl Into<String>, data_type: DataType, number: u32) -> Self {
        let bit_size = data_type.bit_size();
        Identifier::new(name, data_type, Storage::temporary(number, bit_size))
    }

    /// Returns the identifier's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the identifier's data type.
    #[must_use]
    pub const fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Returns the storage the identifier refers to.
    #[must_use]
    pub const fn storage(&self) -> &Storage {
        &self.storage
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
