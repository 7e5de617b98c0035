//! Hand construction of RTL code.
//!
//! [`RtlEmitter`] plays the role of an instruction lifter for tests, benchmarks and tools:
//! its `&mut self` methods append instructions, its `&self` methods build expressions.
//! Integer literals passed as operands are typed from context through [`Operand`].

use crate::ir::{
    Address, BinaryOp, ConditionCode, Constant, DataType, Expression, Identifier, Instruction,
};

/// Conversion of a builder argument into an expression of a contextual type.
///
/// Expressions, identifiers, constants and addresses keep their own type. Integer literals
/// become a [`Constant`] of the type supplied by the operation, e.g. the type of the other
/// operand of an addition.
pub trait Operand {
    /// Converts `self`, using `data_type` for untyped literals.
    fn into_operand(self, data_type: DataType) -> Expression;
}

impl Operand for Expression {
    fn into_operand(self, _data_type: DataType) -> Expression {
        self
    }
}

impl Operand for Identifier {
    fn into_operand(self, _data_type: DataType) -> Expression {
        Expression::Identifier(self)
    }
}

impl Operand for Constant {
    fn into_operand(self, _data_type: DataType) -> Expression {
        Expression::Constant(self)
    }
}

impl Operand for Address {
    fn into_operand(self, _data_type: DataType) -> Expression {
        Expression::Address(self)
    }
}

impl Operand for i32 {
    fn into_operand(self, data_type: DataType) -> Expression {
        Constant::create(data_type, i64::from(self)).into()
    }
}

impl Operand for i64 {
    fn into_operand(self, data_type: DataType) -> Expression {
        Constant::create(data_type, self).into()
    }
}

impl Operand for u32 {
    fn into_operand(self, data_type: DataType) -> Expression {
        Constant::new(data_type, u64::from(self)).into()
    }
}

impl Operand for u64 {
    fn into_operand(self, data_type: DataType) -> Expression {
        Constant::new(data_type, self).into()
    }
}

/// Builder of RTL instructions and expressions.
///
/// # Examples
///
/// ```rust
/// use backwalk::ir::{ConditionCode, DataType, Identifier, RtlEmitter};
///
/// let r2 = Identifier::register("r2", DataType::WORD32, 2);
/// let cz = Identifier::flag_group("CZ", 0);
///
/// let mut m = RtlEmitter::new();
/// let cmp = m.cond(m.isub(r2.clone(), 4));
/// m.assign(cz.clone(), cmp);
/// let instrs = m.into_instructions();
/// assert_eq!(instrs[0].to_string(), "CZ = cond(r2 - 0x00000004)");
/// ```
#[derive(Debug, Default)]
pub struct RtlEmitter {
    instructions: Vec<Instruction>,
}

impl RtlEmitter {
    /// Creates an emitter with no instructions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes the emitter, returning the emitted instructions.
    #[must_use]
    pub fn into_instructions(self) -> Vec<Instruction> {
        self.instructions
    }

    /// Emits `dst = src`. Literal sources take the type of `dst`.
    pub fn assign(&mut self, dst: impl Into<Expression>, src: impl Operand) {
        let dst = dst.into();
        let src = src.into_operand(dst.data_type());
        self.instructions.push(Instruction::Assignment { dst, src });
    }

    /// Emits a conditional branch to `target`.
    pub fn branch(&mut self, condition: impl Into<Expression>, target: impl Into<Expression>) {
        self.instructions.push(Instruction::Branch {
            condition: condition.into(),
            target: target.into(),
        });
    }

    /// Emits an unconditional transfer to `target`.
    pub fn goto(&mut self, target: impl Into<Expression>) {
        self.instructions.push(Instruction::Goto {
            target: target.into(),
        });
    }

    /// Emits a call of `target`.
    pub fn call(&mut self, target: impl Into<Expression>) {
        self.instructions.push(Instruction::Call {
            target: target.into(),
        });
    }

    /// Emits a return.
    pub fn ret(&mut self) {
        self.instructions.push(Instruction::Return);
    }

    /// Emits a no-op.
    pub fn nop(&mut self) {
        self.instructions.push(Instruction::Nop);
    }

    /// Emits an expression evaluated for its side effects.
    pub fn side_effect(&mut self, expression: impl Into<Expression>) {
        self.instructions
            .push(Instruction::SideEffect(expression.into()));
    }

    /// Emits an instruction that is executed only if `condition` holds.
    pub fn emit_if(&mut self, condition: impl Into<Expression>, instruction: Instruction) {
        self.instructions.push(Instruction::If {
            condition: condition.into(),
            instruction: Box::new(instruction),
        });
    }

    /// Emits an invalid instruction.
    pub fn invalid(&mut self) {
        self.instructions.push(Instruction::Invalid);
    }

    fn bin(&self, op: BinaryOp, left: impl Into<Expression>, right: impl Operand) -> Expression {
        let left = left.into();
        let data_type = left.data_type();
        let right = right.into_operand(data_type);
        Expression::binary(op, data_type, left, right)
    }

    fn shift(&self, op: BinaryOp, left: impl Into<Expression>, amount: impl Operand) -> Expression {
        let left = left.into();
        let data_type = left.data_type();
        Expression::binary(op, data_type, left, amount.into_operand(DataType::INT32))
    }

    /// `left + right`
    #[must_use]
    pub fn iadd(&self, left: impl Into<Expression>, right: impl Operand) -> Expression {
        self.bin(BinaryOp::IAdd, left, right)
    }

    /// `left - right`
    #[must_use]
    pub fn isub(&self, left: impl Into<Expression>, right: impl Operand) -> Expression {
        self.bin(BinaryOp::ISub, left, right)
    }

    /// `left * right`
    #[must_use]
    pub fn imul(&self, left: impl Into<Expression>, right: impl Operand) -> Expression {
        self.bin(BinaryOp::IMul, left, right)
    }

    /// `left & right`
    #[must_use]
    pub fn and(&self, left: impl Into<Expression>, right: impl Operand) -> Expression {
        self.bin(BinaryOp::And, left, right)
    }

    /// `left | right`
    #[must_use]
    pub fn or(&self, left: impl Into<Expression>, right: impl Operand) -> Expression {
        self.bin(BinaryOp::Or, left, right)
    }

    /// `left ^ right`
    #[must_use]
    pub fn xor(&self, left: impl Into<Expression>, right: impl Operand) -> Expression {
        self.bin(BinaryOp::Xor, left, right)
    }

    /// `left << amount`; literal amounts are `int32`.
    #[must_use]
    pub fn shl(&self, left: impl Into<Expression>, amount: impl Operand) -> Expression {
        self.shift(BinaryOp::Shl, left, amount)
    }

    /// Logical `left >>u amount`.
    #[must_use]
    pub fn shr(&self, left: impl Into<Expression>, amount: impl Operand) -> Expression {
        self.shift(BinaryOp::Shr, left, amount)
    }

    /// Arithmetic `left >> amount`.
    #[must_use]
    pub fn sar(&self, left: impl Into<Expression>, amount: impl Operand) -> Expression {
        self.shift(BinaryOp::Sar, left, amount)
    }

    /// Load of `data_type` from `effective_address`.
    #[must_use]
    pub fn mem(&self, data_type: DataType, effective_address: impl Into<Expression>) -> Expression {
        Expression::mem(data_type, effective_address.into())
    }

    /// Load of a `byte`.
    #[must_use]
    pub fn mem8(&self, effective_address: impl Into<Expression>) -> Expression {
        self.mem(DataType::BYTE, effective_address)
    }

    /// Load of a `word16`.
    #[must_use]
    pub fn mem16(&self, effective_address: impl Into<Expression>) -> Expression {
        self.mem(DataType::WORD16, effective_address)
    }

    /// Load of a `word32`.
    #[must_use]
    pub fn mem32(&self, effective_address: impl Into<Expression>) -> Expression {
        self.mem(DataType::WORD32, effective_address)
    }

    /// Segmented load of `data_type` from `segment:effective_address`.
    #[must_use]
    pub fn seg_mem(
        &self,
        data_type: DataType,
        segment: impl Into<Expression>,
        effective_address: impl Into<Expression>,
    ) -> Expression {
        Expression::SegmentedAccess {
            segment: Box::new(segment.into()),
            effective_address: Box::new(effective_address.into()),
            data_type,
        }
    }

    /// Condition codes resulting from `expression`.
    #[must_use]
    pub fn cond(&self, expression: impl Into<Expression>) -> Expression {
        Expression::ConditionOf(Box::new(expression.into()))
    }

    /// Test of condition `cc` on the flag group `expression`.
    #[must_use]
    pub fn test(&self, cc: ConditionCode, expression: impl Into<Expression>) -> Expression {
        Expression::TestCondition {
            cc,
            expression: Box::new(expression.into()),
        }
    }

    /// Conversion of `expression` to `data_type`.
    #[must_use]
    pub fn cast(&self, data_type: DataType, expression: impl Into<Expression>) -> Expression {
        Expression::cast(data_type, expression.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_typing() {
        let m = RtlEmitter::new();
        let r1 = Identifier::register("r1", DataType::WORD32, 1);

        let sum = m.iadd(r1.clone(), 0x0012_3400);
        assert_eq!(sum.to_string(), "r1 + 0x00123400");
        assert_eq!(sum.data_type(), DataType::WORD32);

        let shifted = m.shl(r1, 2);
        assert_eq!(shifted.to_string(), "r1 << 2");
    }

    #[test]
    fn test_instruction_emission() {
        let mut m = RtlEmitter::new();
        let r1 = Identifier::register("r1", DataType::WORD32, 1);
        m.assign(r1.clone(), 7);
        m.goto(Address::ptr32(0x200));
        m.nop();
        let instrs = m.into_instructions();

        assert_eq!(instrs.len(), 3);
        assert_eq!(instrs[0].to_string(), "r1 = 0x00000007");
        assert_eq!(instrs[1].to_string(), "goto 00000200");
        assert_eq!(instrs[2], Instruction::Nop);
    }
}
