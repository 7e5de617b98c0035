//! Forward evaluation of address expressions over value sets.
//!
//! [`ValueSetEvaluator`] runs once the backward slicer has bounded the jump-table index. With
//! the index bound to its interval, evaluating the jump-table format yields the set of
//! destinations, reading table entries from the program image where the format loads them.
//! Only the sublanguage seen in table address computations is understood; every other node
//! kind fails with [`crate::Error::Unsupported`].

use std::collections::HashMap;

use crate::{
    analysis::{StridedInterval, ValueSet},
    image::Program,
    ir::{BinaryOp, Constant, DataType, Expression},
    Result,
};

/// Evaluates expressions to [`ValueSet`]s under a binding of sub-expressions to value sets.
#[derive(Debug)]
pub struct ValueSetEvaluator<'a> {
    program: &'a Program,
    /// Value sets bound to expressions, usually identifiers.
    context: HashMap<Expression, ValueSet>,
    /// Upper bound on addresses read per memory access.
    max_reads: usize,
}

impl<'a> ValueSetEvaluator<'a> {
    /// Default bound on the number of addresses read by one memory access.
    pub const DEFAULT_MAX_READS: usize = 0x1_0000;

    /// Creates an evaluator over `program` with the given bindings.
    ///
    /// # Arguments
    ///
    /// * `program` - Image that memory accesses read from
    /// * `context` - Value sets of the free sub-expressions, e.g. the table index
    #[must_use]
    pub fn new(program: &'a Program, context: HashMap<Expression, ValueSet>) -> Self {
        ValueSetEvaluator {
            program,
            context,
            max_reads: Self::DEFAULT_MAX_READS,
        }
    }

    /// Limits the number of addresses a single memory access reads.
    ///
    /// Address sets larger than the limit are read only up to it. This keeps evaluation
    /// bounded when an index range is open-ended, as after an unsigned `>=` test.
    #[must_use]
    pub fn with_max_reads(mut self, max_reads: usize) -> Self {
        self.max_reads = max_reads;
        self
    }

    /// Binds `expression` to `value_set`, replacing any previous binding.
    pub fn bind(&mut self, expression: impl Into<Expression>, value_set: ValueSet) {
        self.context.insert(expression.into(), value_set);
    }

    /// Evaluates `expression`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Unsupported`] for expression shapes outside the modelled
    /// sublanguage, [`crate::Error::NotSupported`] when a value-set representation lacks the
    /// required operation, and [`crate::Error::InvalidArgument`] when an interval result
    /// cannot be represented.
    pub fn evaluate(&self, expression: &Expression) -> Result<ValueSet> {
        match expression {
            Expression::Binary {
                op, left, right, ..
            } => self.evaluate_binary(*op, left, right),
            Expression::Cast {
                data_type,
                expression,
            } => self.evaluate_cast(*data_type, expression),
            Expression::Identifier(_) => Ok(self
                .context
                .get(expression)
                .cloned()
                .unwrap_or_else(|| ValueSet::empty(expression.data_type()))),
            Expression::MemoryAccess {
                effective_address,
                data_type,
            } => self.evaluate_load(effective_address, *data_type),
            Expression::Constant(c) => Ok(ValueSet::interval(
                c.data_type(),
                StridedInterval::constant(c),
            )),
            Expression::Address(_)
            | Expression::Unary { .. }
            | Expression::SegmentedAccess { .. }
            | Expression::ConditionOf(_)
            | Expression::TestCondition { .. }
            | Expression::MkSequence { .. }
            | Expression::DepositBits { .. }
            | Expression::Slice { .. }
            | Expression::FieldAccess { .. }
            | Expression::ArrayAccess { .. }
            | Expression::PointerAddition { .. }
            | Expression::MemberPointerSelector { .. }
            | Expression::ScopeResolution { .. }
            | Expression::ProcedureConstant { .. }
            | Expression::Phi { .. }
            | Expression::OutArgument { .. }
            | Expression::Application { .. }
            | Expression::Conditional { .. }
            | Expression::Dereference { .. } => Err(unsupported_error!(
                "value-set evaluation of {}",
                expression
            )),
        }
    }

    fn evaluate_binary(
        &self,
        op: BinaryOp,
        left: &Expression,
        right: &Expression,
    ) -> Result<ValueSet> {
        match (left.as_constant(), right.as_constant()) {
            (Some(l), Some(r)) => {
                let c = op.apply_constants(l, r)?;
                return Ok(ValueSet::interval(
                    c.data_type(),
                    StridedInterval::constant(&c),
                ));
            }
            (None, Some(c)) => {
                let vs = self.evaluate(left)?;
                match op {
                    BinaryOp::IAdd => return vs.add_constant(c),
                    BinaryOp::And => return vs.and(c),
                    BinaryOp::Shl => return vs.shl(c),
                    BinaryOp::IMul => return vs.imul(c),
                    _ => {}
                }
            }
            (Some(c), None) => {
                let vs = self.evaluate(right)?;
                match op {
                    BinaryOp::IAdd => return vs.add_constant(c),
                    BinaryOp::And => return vs.and(c),
                    BinaryOp::IMul => return vs.imul(c),
                    _ => {}
                }
            }
            (None, None) => {
                if op == BinaryOp::IAdd && left == right {
                    return self.evaluate(left)?.shl(&Constant::int32(1));
                }
            }
        }
        Err(unsupported_error!(
            "value-set evaluation of {} {} {}",
            left,
            op,
            right
        ))
    }

    fn evaluate_cast(&self, data_type: DataType, inner: &Expression) -> Result<ValueSet> {
        let vs = self.evaluate(inner)?;
        if data_type.bit_size() < inner.data_type().bit_size() {
            return vs.truncate(data_type);
        }
        if data_type.is_signed() {
            return vs.sign_extend(data_type);
        }
        Err(unsupported_error!(
            "value-set evaluation of cast from {} to {}",
            inner.data_type(),
            data_type
        ))
    }

    fn evaluate_load(&self, effective_address: &Expression, data_type: DataType) -> Result<ValueSet> {
        let addresses = self.evaluate(effective_address)?;
        let values = addresses
            .values()
            .take(self.max_reads)
            .map(|addr| self.read_value(data_type, &addr))
            .collect();
        Ok(ValueSet::concrete(data_type, values))
    }

    /// Reads `data_type` at the linear address `addr`; unmapped or truncated reads give
    /// `Invalid`.
    fn read_value(&self, data_type: DataType, addr: &Constant) -> Constant {
        if !addr.is_valid() {
            return Constant::invalid();
        }
        let address = self
            .program
            .segment_map()
            .map_linear_address(addr.to_u64());
        self.program
            .read(address, data_type)
            .unwrap_or_else(|_| Constant::invalid())
    }
}
