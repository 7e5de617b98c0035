//! The program image: segments, their bytes and typed reads.
//!
//! The value-set evaluator reads jump-table entries through [`Program::read`]. Reads never
//! block and fail with [`crate::Error::OutOfBounds`] outside mapped memory, which the
//! evaluator turns into `Invalid` table entries.

mod io;
mod program;
mod reader;
mod segment;

pub use io::{read_be_at, read_le_at, ImageIO};
pub use program::Program;
pub use reader::{Endianness, ImageReader};
pub use segment::{AccessMode, ImageSegment, MemoryArea, SegmentMap};
