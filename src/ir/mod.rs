//! # Register Transfer Lists
//!
//! The low-level intermediate representation the slicer walks. A lifter turns each machine
//! instruction into an [`RtlInstructionCluster`] of [`Instruction`]s whose operands are
//! [`Expression`] trees; clusters are grouped into [`RtlBlock`]s.
//!
//! ## Module Organization
//!
//! - `types` - Primitive data types and their bit widths
//! - `constant` - Typed constants and addresses
//! - `storage` - Storage domains and the identifiers that name them
//! - `operator` - Binary/unary operators and condition codes
//! - `expression` - The closed expression sum type
//! - `instruction` - Instructions, clusters and blocks
//! - `emitter` - Hand construction of RTL code

mod constant;
mod emitter;
mod expression;
mod instruction;
mod operator;
mod storage;
mod types;

pub use constant::{Address, Constant};
pub use emitter::{Operand, RtlEmitter};
pub use expression::Expression;
pub use instruction::{Instruction, RtlBlock, RtlInstructionCluster};
pub use operator::{BinaryOp, ConditionCode, UnaryOp};
pub use storage::{Identifier, Storage, StorageDomain};
pub use types::{DataType, TypeDomain};
