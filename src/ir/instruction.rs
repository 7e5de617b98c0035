//! RTL instructions, instruction clusters and blocks.

use std::fmt;

use crate::ir::{Address, Expression, RtlEmitter};

/// A single register-transfer-list instruction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Instruction {
    /// `dst = src`
    Assignment {
        /// Written location
        dst: Expression,
        /// Assigned value
        src: Expression,
    },
    /// Conditional transfer to `target`
    Branch {
        /// Branch condition, usually a [`Expression::TestCondition`]
        condition: Expression,
        /// Destination when the condition holds
        target: Expression,
    },
    /// Unconditional direct or indirect transfer
    Goto {
        /// Destination expression
        target: Expression,
    },
    /// Procedure call
    Call {
        /// Called expression
        target: Expression,
    },
    /// Procedure return
    Return,
    /// Expression evaluated for its side effect only
    SideEffect(Expression),
    /// No operation
    Nop,
    /// Predicated instruction
    If {
        /// Predicate
        condition: Expression,
        /// Instruction executed when the predicate holds
        instruction: Box<Instruction>,
    },
    /// Undecodable or illegal instruction
    Invalid,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Assignment { dst, src } => write!(f, "{dst} = {src}"),
            Instruction::Branch { condition, target } => {
                write!(f, "if ({condition}) branch {target}")
            }
            Instruction::Goto { target } => write!(f, "goto {target}"),
            Instruction::Call { target } => write!(f, "call {target}"),
            Instruction::Return => write!(f, "return"),
            Instruction::SideEffect(e) => write!(f, "{e}"),
            Instruction::Nop => write!(f, "nop"),
            Instruction::If {
                condition,
                instruction,
            } => write!(f, "if ({condition}) {instruction}"),
            Instruction::Invalid => write!(f, "<invalid>"),
        }
    }
}

/// The RTL instructions lifted from one machine instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtlInstructionCluster {
    address: Address,
    length: u32,
    instructions: Vec<Instruction>,
}

impl RtlInstructionCluster {
    /// Creates a cluster for the machine instruction at `address` of `length` bytes.
    #[must_use]
    pub fn new(address: Address, length: u32, instructions: Vec<Instruction>) -> Self {
        RtlInstructionCluster {
            address,
            length,
            instructions,
        }
    }

    /// Returns the address of the machine instruction.
    #[must_use]
    pub const fn address(&self) -> Address {
        self.address
    }

    /// Returns the length of the machine instruction in bytes.
    #[must_use]
    pub const fn length(&self) -> u32 {
        self.length
    }

    /// Returns the lifted instructions in execution order.
    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }
}

/// A basic block of lifted code.
///
/// # Examples
///
/// ```rust
/// use backwalk::ir::{Address, DataType, Identifier, RtlBlock, RtlEmitter};
///
/// let r1 = Identifier::register("r1", DataType::WORD32, 1);
/// let mut block = RtlBlock::new(Address::ptr32(0x100), "l00000100");
/// block.emit(|m| m.assign(r1.clone(), 0u32));
/// block.emit(|m| m.goto(r1.clone()));
///
/// assert_eq!(block.clusters().len(), 2);
/// assert_eq!(block.clusters()[1].address(), Address::ptr32(0x104));
/// assert_eq!(block.instructions().count(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtlBlock {
    address: Address,
    name: String,
    clusters: Vec<RtlInstructionCluster>,
}

impl RtlBlock {
    /// Length assumed for machine instructions appended by [`RtlBlock::emit`].
    pub const DEFAULT_INSTRUCTION_LENGTH: u32 = 4;

    /// Creates an empty block.
    #[must_use]
    pub fn new(address: Address, name: impl Into<String>) -> Self {
        RtlBlock {
            address,
            name: name.into(),
            clusters: Vec::new(),
        }
    }

    /// Returns the block's start address.
    #[must_use]
    pub const fn address(&self) -> Address {
        self.address
    }

    /// Returns the block's label.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the clusters of the block in address order.
    #[must_use]
    pub fn clusters(&self) -> &[RtlInstructionCluster] {
        &self.clusters
    }

    /// Appends a cluster.
    pub fn push(&mut self, cluster: RtlInstructionCluster) {
        self.clusters.push(cluster);
    }

    /// Appends a cluster built by `build`.
    ///
    /// The cluster is placed directly after the previous one, assuming every machine
    /// instruction is [`RtlBlock::DEFAULT_INSTRUCTION_LENGTH`] bytes long.
    pub fn emit(&mut self, build: impl FnOnce(&mut RtlEmitter)) {
        let mut emitter = RtlEmitter::new();
        build(&mut emitter);

        let next = self
            .clusters
            .last()
            .map(|c| c.address().offset(u64::from(c.length())))
            .unwrap_or(self.address);
        self.clusters.push(RtlInstructionCluster::new(
            next,
            Self::DEFAULT_INSTRUCTION_LENGTH,
            emitter.into_instructions(),
        ));
    }

    /// Iterates over all instructions of the block, flattened across clusters.
    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.clusters.iter().flat_map(|c| c.instructions.iter())
    }
}

impl fmt::Display for RtlBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", self.name)?;
        for cluster in &self.clusters {
            for instr in &cluster.instructions {
                writeln!(f, "  {} {instr}", cluster.address)?;
            }
        }
        Ok(())
    }
}
