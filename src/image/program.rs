use crate::{
    image::{Endianness, ImageReader, ImageSegment, SegmentMap},
    ir::{Address, Constant, DataType},
    Error::OutOfBounds,
    Result,
};

/// The loaded program image: its segments and byte order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    segment_map: SegmentMap,
    endianness: Endianness,
}

impl Program {
    /// Creates a program from its segment map.
    #[must_use]
    pub fn new(segment_map: SegmentMap, endianness: Endianness) -> Self {
        Program {
            segment_map,
            endianness,
        }
    }

    /// Returns the program's segments.
    #[must_use]
    pub const fn segment_map(&self) -> &SegmentMap {
        &self.segment_map
    }

    /// Returns the byte order of the image.
    #[must_use]
    pub const fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Creates a reader over `segment` positioned at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if `address` lies outside `segment`.
    pub fn create_image_reader<'a>(
        &self,
        segment: &'a ImageSegment,
        address: Address,
    ) -> Result<ImageReader<'a>> {
        let memory = segment.memory();
        let offset = memory.offset_of(address).ok_or(OutOfBounds)?;
        ImageReader::new(memory.bytes(), offset, self.endianness)
    }

    /// Reads a `data_type` value at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if `address` is unmapped or the value runs past
    /// the end of its segment.
    pub fn read(&self, address: Address, data_type: DataType) -> Result<Constant> {
        let segment = self
            .segment_map
            .try_find_segment(address)
            .ok_or(OutOfBounds)?;
        self.create_image_reader(segment, address)?.read(data_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{AccessMode, MemoryArea};

    #[test]
    fn test_program_read() {
        let mut bytes = vec![0u8; 16];
        bytes[4..8].copy_from_slice(&0x0012_0040u32.to_le_bytes());
        let data = ImageSegment::new(
            ".rdata",
            MemoryArea::new(Address::ptr32(0x3000), bytes),
            AccessMode::READ,
        );
        let program = Program::new(
            SegmentMap::new(Address::ptr32(0x3000), vec![data]),
            Endianness::Little,
        );

        assert_eq!(
            program.read(Address::ptr32(0x3004), DataType::WORD32).unwrap(),
            Constant::word32(0x0012_0040)
        );
        assert!(program.read(Address::ptr32(0x300E), DataType::WORD32).is_err());
        assert!(program.read(Address::ptr32(0x4000), DataType::WORD32).is_err());
    }
}
