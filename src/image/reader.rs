//! Typed cursor over the bytes of a memory area.

use crate::{
    image::io::{read_be_at, read_le_at, ImageIO},
    ir::{Constant, DataType},
    Error::OutOfBounds,
    Result,
};

/// Byte order of multi-byte values in the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endianness {
    /// Least significant byte first
    #[default]
    Little,
    /// Most significant byte first
    Big,
}

/// A bounds-checked reader positioned inside a memory area.
///
/// # Examples
///
/// ```rust
/// use backwalk::image::{Endianness, ImageReader};
/// use backwalk::ir::{Constant, DataType};
///
/// let bytes = [0x00, 0x30, 0x00, 0x00, 0x28, 0x30, 0x00, 0x00];
/// let mut reader = ImageReader::new(&bytes, 4, Endianness::Little)?;
/// assert_eq!(reader.read(DataType::WORD32)?, Constant::word32(0x3028));
/// assert!(reader.read(DataType::WORD32).is_err());
/// # Ok::<(), backwalk::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct ImageReader<'a> {
    data: &'a [u8],
    position: usize,
    endianness: Endianness,
}

impl<'a> ImageReader<'a> {
    /// Creates a reader over `data` positioned at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if `offset` lies past the end of `data`.
    pub fn new(data: &'a [u8], offset: usize, endianness: Endianness) -> Result<Self> {
        if offset > data.len() {
            return Err(OutOfBounds);
        }
        Ok(ImageReader {
            data,
            position: offset,
            endianness,
        })
    }

    /// Returns the current offset into the data.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Returns `true` while unread bytes remain.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Reads a little-endian `T` and advances past it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the read would pass the end of the data.
    pub fn read_le<T: ImageIO>(&mut self) -> Result<T> {
        read_le_at(self.data, &mut self.position)
    }

    /// Reads a big-endian `T` and advances past it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the read would pass the end of the data.
    pub fn read_be<T: ImageIO>(&mut self) -> Result<T> {
        read_be_at(self.data, &mut self.position)
    }

    fn read_ordered<T: ImageIO>(&mut self) -> Result<u64> {
        let value = match self.endianness {
            Endianness::Little => self.read_le::<T>()?,
            Endianness::Big => self.read_be::<T>()?,
        };
        Ok(value.widen())
    }

    /// Reads a constant of type `data_type` in the reader's byte order.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the read would pass the end of the data, or
    /// [`crate::Error::InvalidArgument`] if `data_type` is not 1, 2, 4 or 8 bytes wide.
    pub fn read(&mut self, data_type: DataType) -> Result<Constant> {
        let bits = match data_type.size() {
            1 => self.read_ordered::<u8>()?,
            2 => self.read_ordered::<u16>()?,
            4 => self.read_ordered::<u32>()?,
            8 => self.read_ordered::<u64>()?,
            other => {
                return Err(crate::Error::InvalidArgument(format!(
                    "cannot read a {other}-byte value of type {data_type}"
                )))
            }
        };
        Ok(Constant::new(data_type, bits))
    }
}
