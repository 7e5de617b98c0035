// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(clippy::too_many_arguments)]
#![deny(unsafe_code)]

//! # backwalk
//!
//! Backward jump-table slicing for binary decompilation.
//!
//! Starting from an indirect control transfer such as `goto Mem[0x00123400 + r1 * 4]` in
//! lifted register-transfer-list (RTL) code, `backwalk` walks backward through the
//! instructions and predecessor blocks that feed the jump target and reconstructs:
//!
//! - the symbolic expression that computes the destination (the *jump-table format*),
//! - the sub-expression that acts as the table index,
//! - the bounded [`StridedInterval`](analysis::StridedInterval) that index can take.
//!
//! Once the range is known the [`ValueSetEvaluator`](analysis::ValueSetEvaluator) evaluates the
//! format forward over the index range and reads the table entries out of the program image.
//!
//! ## Quick Start
//!
//! ```rust
//! use backwalk::prelude::*;
//!
//! let r1 = Identifier::register("r1", DataType::WORD32, 1);
//! let r2 = Identifier::register("r2", DataType::WORD32, 2);
//! let m = RtlEmitter::new();
//!
//! let mut block = RtlBlock::new(Address::ptr32(0x100), "l00000100");
//! block.emit(|e| e.assign(r1.clone(), m.shl(r2.clone(), 2)));
//! block.emit(|e| e.goto(m.iadd(r1.clone(), 0x0012_3400)));
//!
//! let mut graph = BlockGraph::new();
//! let id = graph.add_block(block);
//! let host = RtlBackwalkHost::new(graph, Program::default());
//!
//! let mut slicer = BackwardSlicer::new(&host, SlicerConfig::default());
//! assert!(slicer.start(host.block(id).unwrap())?);
//! assert!(slicer.step()?);
//! assert_eq!(slicer.live().unwrap().len(), 1);
//! # Ok::<(), backwalk::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`ir`] - The immutable RTL instruction and expression trees the slicer consumes
//! - [`image`] - Segment map and typed reader over the program image
//! - [`analysis`] - Bit ranges, strided intervals, value sets, the backward slicer and the
//!   jump-table resolver built on top of it
//! - [`Error`] and [`Result`] - Error handling
//!
//! ## Logging
//!
//! Diagnostics are emitted through the [`log`] facade under the `backwalk` target. Verbosity
//! is chosen per slicer through [`SlicerConfig::trace_level`](analysis::SlicerConfig::trace_level),
//! which defaults to off.

#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

pub(crate) mod utils;

/// Convenient re-exports of the most commonly used types.
pub mod prelude;

/// Register-transfer-list instructions and expressions.
///
/// The slicer consumes these trees read-only. They are produced by an instruction lifter
/// outside this crate; [`ir::RtlEmitter`] builds them by hand for tests and tools.
pub mod ir;

/// Program image access.
///
/// A [`image::SegmentMap`] of [`image::ImageSegment`]s and the bounds-checked
/// [`image::ImageReader`] the value-set evaluator uses to read jump-table entries.
pub mod image;

/// Jump-table analysis.
///
/// # Key Types
///
/// - [`analysis::BackwardSlicer`] - Worklist driver of the backward walk
/// - [`analysis::SliceState`] - The backward transfer function at one walk position
/// - [`analysis::ValueSetEvaluator`] - Forward evaluation of expressions over value sets
/// - [`analysis::JumpTableResolver`] - Runs both to enumerate table destinations
pub mod analysis;

pub use error::Error;

/// `backwalk` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
