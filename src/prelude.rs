//! # backwalk Prelude
//!
//! Re-exports of the types needed to build RTL input, describe a program image and run the
//! slicer. Import it with `use backwalk::prelude::*;`.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all backwalk operations
pub use crate::Error;

/// The result type used throughout backwalk
pub use crate::Result;

// ================================================================================================
// RTL Input
// ================================================================================================

/// Expression and instruction trees
pub use crate::ir::{Expression, Instruction, RtlBlock, RtlInstructionCluster};

/// Leaves of expression trees
pub use crate::ir::{Address, Constant, Identifier};

/// Operators and condition codes
pub use crate::ir::{BinaryOp, ConditionCode, UnaryOp};

/// Types and storage
pub use crate::ir::{DataType, Storage, StorageDomain};

/// Builder for RTL instructions and expressions
pub use crate::ir::RtlEmitter;

// ================================================================================================
// Program Image
// ================================================================================================

/// Segments and the loaded program
pub use crate::image::{AccessMode, Endianness, ImageSegment, MemoryArea, Program, SegmentMap};

// ================================================================================================
// Analysis
// ================================================================================================

/// Abstract domains
pub use crate::analysis::{BitRange, StridedInterval, ValueSet};

/// Forward evaluation
pub use crate::analysis::ValueSetEvaluator;

/// Backward slicing
pub use crate::analysis::{BackwardSlicer, LiveMap, SliceState};

/// Host interface and its in-memory implementation
pub use crate::analysis::{BackwalkHost, BlockGraph, BlockId, RtlBackwalkHost};

/// Configuration
pub use crate::analysis::{JumpTableConfig, SlicerConfig};

/// Jump-table recovery
pub use crate::analysis::{JumpTable, JumpTableResolver};
