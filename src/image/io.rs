//! Endian-aware, bounds-checked reads of primitive integers from byte buffers.

use crate::{Error::OutOfBounds, Result};

/// Primitive integers that can be decoded from image bytes.
pub trait ImageIO: Sized {
    /// Fixed-size byte representation of the type
    type Bytes: Sized + for<'a> TryFrom<&'a [u8]>;

    /// Decodes a little-endian value.
    fn from_le_bytes(bytes: Self::Bytes) -> Self;

    /// Decodes a big-endian value.
    fn from_be_bytes(bytes: Self::Bytes) -> Self;

    /// Widens the value to 64 bits.
    fn widen(self) -> u64;
}

macro_rules! impl_image_io {
    ($($ty:ty => $n:literal),* $(,)?) => {
        $(
            impl ImageIO for $ty {
                type Bytes = [u8; $n];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }

                fn from_be_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_be_bytes(bytes)
                }

                fn widen(self) -> u64 {
                    u64::from(self)
                }
            }
        )*
    };
}

impl_image_io!(u8 => 1, u16 => 2, u32 => 4, u64 => 8);

/// Reads a little-endian `T` at `*offset` and advances the offset past it.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if fewer than `size_of::<T>()` bytes remain.
pub fn read_le_at<T: ImageIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let bytes = take::<T>(data, offset)?;
    Ok(T::from_le_bytes(bytes))
}

/// Reads a big-endian `T` at `*offset` and advances the offset past it.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if fewer than `size_of::<T>()` bytes remain.
pub fn read_be_at<T: ImageIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let bytes = take::<T>(data, offset)?;
    Ok(T::from_be_bytes(bytes))
}

fn take<T: ImageIO>(data: &[u8], offset: &mut usize) -> Result<T::Bytes> {
    let type_len = std::mem::size_of::<T>();
    let end = offset.checked_add(type_len).ok_or(OutOfBounds)?;
    if end > data.len() {
        return Err(OutOfBounds);
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(OutOfBounds);
    };

    *offset = end;
    Ok(read)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATA: [u8; 8] = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];

    #[test]
    fn test_read_le() {
        let mut offset = 0;
        let v: u32 = read_le_at(&DATA, &mut offset).unwrap();
        assert_eq!(v, 0x0403_0201);
        assert_eq!(offset, 4);

        let v: u16 = read_le_at(&DATA, &mut offset).unwrap();
        assert_eq!(v, 0x0605);
        assert_eq!(offset, 6);
    }

    #[test]
    fn test_read_be() {
        let mut offset = 0;
        let v: u64 = read_be_at(&DATA, &mut offset).unwrap();
        assert_eq!(v, 0x0102_0304_0506_0708);
    }

    #[test]
    fn test_out_of_bounds() {
        let mut offset = 6;
        let result: Result<u32> = read_le_at(&DATA, &mut offset);
        assert!(matches!(result, Err(OutOfBounds)));
        assert_eq!(offset, 6);

        let mut offset = usize::MAX;
        let result: Result<u8> = read_le_at(&DATA, &mut offset);
        assert!(result.is_err());
    }
}
