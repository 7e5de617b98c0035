//! Memory areas, image segments and the segment map.

use std::{collections::BTreeMap, fmt};

use bitflags::bitflags;

use crate::ir::Address;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Access rights of an image segment
    pub struct AccessMode: u8 {
        /// Segment is readable
        const READ = 0x01;
        /// Segment is writable
        const WRITE = 0x02;
        /// Segment contains executable code
        const EXECUTE = 0x04;
        /// Readable code
        const READ_EXECUTE = Self::READ.bits() | Self::EXECUTE.bits();
        /// Readable and writable data
        const READ_WRITE = Self::READ.bits() | Self::WRITE.bits();
    }
}

/// A contiguous run of image bytes loaded at `base`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryArea {
    base: Address,
    bytes: Vec<u8>,
}

impl MemoryArea {
    /// Creates a memory area.
    #[must_use]
    pub fn new(base: Address, bytes: Vec<u8>) -> Self {
        MemoryArea { base, bytes }
    }

    /// Returns the load address of the first byte.
    #[must_use]
    pub const fn base(&self) -> Address {
        self.base
    }

    /// Returns the area's contents.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the area's contents for patching.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Returns the size of the area in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` if the area holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns `true` if `address` falls inside the area.
    #[must_use]
    pub fn contains(&self, address: Address) -> bool {
        self.offset_of(address).is_some()
    }

    /// Returns the byte offset of `address` within the area, if it falls inside.
    #[must_use]
    pub fn offset_of(&self, address: Address) -> Option<usize> {
        let delta = address.value().checked_sub(self.base.value())?;
        let offset = usize::try_from(delta).ok()?;
        (offset < self.bytes.len()).then_some(offset)
    }
}

/// A named, access-controlled region of the program image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSegment {
    name: String,
    memory: MemoryArea,
    access: AccessMode,
}

impl ImageSegment {
    /// Creates a segment covering all of `memory`.
    #[must_use]
    pub fn new(name: impl Into<String>, memory: MemoryArea, access: AccessMode) -> Self {
        ImageSegment {
            name: name.into(),
            memory,
            access,
        }
    }

    /// Returns the segment name, e.g. `.text`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the segment's start address.
    #[must_use]
    pub const fn address(&self) -> Address {
        self.memory.base()
    }

    /// Returns the backing memory.
    #[must_use]
    pub const fn memory(&self) -> &MemoryArea {
        &self.memory
    }

    /// Returns the backing memory for patching.
    pub fn memory_mut(&mut self) -> &mut MemoryArea {
        &mut self.memory
    }

    /// Returns the segment's access rights.
    #[must_use]
    pub const fn access(&self) -> AccessMode {
        self.access
    }

    /// Returns `true` if `address` falls inside the segment.
    #[must_use]
    pub fn contains(&self, address: Address) -> bool {
        self.memory.contains(address)
    }
}

impl fmt::Display for ImageSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({} bytes)",
            self.name,
            self.address(),
            self.memory.len()
        )
    }
}

/// The segments of a program image, ordered by start address.
///
/// # Examples
///
/// ```rust
/// use backwalk::image::{AccessMode, ImageSegment, MemoryArea, SegmentMap};
/// use backwalk::ir::Address;
///
/// let text = ImageSegment::new(
///     ".text",
///     MemoryArea::new(Address::ptr32(0x1000), vec![0; 0x100]),
///     AccessMode::READ_EXECUTE,
/// );
/// let map = SegmentMap::new(Address::ptr32(0x1000), vec![text]);
///
/// assert_eq!(map.try_find_segment(Address::ptr32(0x1080)).unwrap().name(), ".text");
/// assert!(map.try_find_segment(Address::ptr32(0x1100)).is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentMap {
    base: Address,
    segments: BTreeMap<u64, ImageSegment>,
}

impl SegmentMap {
    /// Creates a segment map with the given image base and initial segments.
    #[must_use]
    pub fn new(base: Address, segments: Vec<ImageSegment>) -> Self {
        let mut map = SegmentMap {
            base,
            segments: BTreeMap::new(),
        };
        for segment in segments {
            map.add_segment(segment);
        }
        map
    }

    /// Returns the image base address.
    #[must_use]
    pub const fn base(&self) -> Address {
        self.base
    }

    /// Adds `segment`, replacing any segment that starts at the same address.
    pub fn add_segment(&mut self, segment: ImageSegment) {
        self.segments.insert(segment.address().value(), segment);
    }

    /// Iterates over the segments in address order.
    pub fn segments(&self) -> impl Iterator<Item = &ImageSegment> {
        self.segments.values()
    }

    /// Returns the segment containing `address`, if any.
    #[must_use]
    pub fn try_find_segment(&self, address: Address) -> Option<&ImageSegment> {
        self.segments
            .range(..=address.value())
            .next_back()
            .map(|(_, segment)| segment)
            .filter(|segment| segment.contains(address))
    }

    /// Converts a linear address to an [`Address`] of the image's pointer width.
    #[must_use]
    pub fn map_linear_address(&self, linear: u64) -> Address {
        Address::new(linear, self.base.bit_size())
    }
}

impl Default for SegmentMap {
    fn default() -> Self {
        SegmentMap::new(Address::ptr32(0), Vec::new())
    }
}
