//! Jump-table analysis over RTL code.
//!
//! The analysis runs in two phases. The backward phase starts at an indirect jump and walks
//! towards the entry of the procedure, tracking which expressions still feed the jump target
//! and rewriting the target in terms of them until a mask or a range check bounds the index.
//! The forward phase evaluates the recovered target expression over the index range with
//! value sets and reads the table entries out of the image.
//!
//! # Architecture
//!
//! - [`BitRange`], [`StridedInterval`] - Abstract domains for live bits and index values
//! - [`ValueSet`] - Interval and concrete value sets with their arithmetic
//! - [`ValueSetEvaluator`] - Forward evaluation over value sets
//! - [`SliceState`], [`BackwardSlicer`] - The backward transfer function and its worklist driver
//! - [`BackwalkHost`], [`RtlBackwalkHost`], [`BlockGraph`] - What the walk needs to know
//!   about the surrounding program
//! - [`JumpTableResolver`] - Both phases end to end
//!
//! # Usage
//!
//! ```rust
//! use backwalk::prelude::*;
//!
//! let r1 = Identifier::register("r1", DataType::WORD32, 1);
//! let m = RtlEmitter::new();
//! let mut block = RtlBlock::new(Address::ptr32(0x100), "l00000100");
//! block.emit(|e| e.assign(r1.clone(), m.and(r1.clone(), 7)));
//! block.emit(|e| e.goto(m.mem32(m.iadd(Constant::word32(0x2000), m.imul(r1.clone(), 4)))));
//!
//! let mut graph = BlockGraph::new();
//! let id = graph.add_block(block);
//! let host = RtlBackwalkHost::new(graph, Program::default());
//!
//! let mut slicer = BackwardSlicer::new(&host, SlicerConfig::default());
//! assert!(slicer.start(host.block(id).unwrap())?);
//! assert!(!slicer.step()?);
//! assert_eq!(slicer.jump_table_index_interval(), StridedInterval::create(1, 0, 7)?);
//! # Ok::<(), backwalk::Error>(())
//! ```

mod bitrange;
mod config;
mod evaluator;
mod graph;
mod host;
mod interval;
mod jumptable;
mod slicer;
mod valueset;

pub use bitrange::BitRange;
pub use config::{JumpTableConfig, SlicerConfig};
pub use evaluator::ValueSetEvaluator;
pub use graph::{BlockGraph, BlockId};
pub use host::{BackwalkHost, RtlBackwalkHost};
pub use interval::StridedInterval;
pub use jumptable::{JumpTable, JumpTableResolver};
pub use slicer::{BackwardSlicer, LiveMap, SliceState, SlicerResult};
pub use valueset::{ValueSet, ValueSetOp, Values};
