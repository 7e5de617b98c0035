//! The backward transfer function.
//!
//! A [`SliceState`] is the walk position inside one block together with everything learned
//! so far: which expressions are still live, the symbolic jump-table format, and the index
//! and its bounds once a mask or range check has been found. Each call to
//! [`SliceState::step`] moves one RTL instruction closer to the start of the block.
//!
//! An expression is *live* if the jump target still depends on it at the current point.
//! Each live expression carries the [`BitRange`] of its bits that matter, so a write to
//! `bh` does not disturb a live `bl`.
//!
//! # Uses
//!
//! - **Jump-table format**: the target expression, rewritten in terms of earlier values
//!   each time a live register is defined
//! - **Index bounds**: the strided interval the index is limited to by a mask or by a
//!   comparison guarding the jump
//!
//! # Algorithm
//!
//! The seed visits the indirect transfer and makes its target the format. Walking
//! backward, each instruction is handled as follows:
//!
//! - `dst := src` with `dst` a register: every live register in the same storage domain is
//!   killed, the first of them is replaced by `src` in the format, and the identifiers of
//!   `src` become live over the bits `dst` covers. Other assignments are skipped.
//! - `if (Test(cc, flags)) branch target`: `flags` becomes live and the index, `cc` is
//!   remembered, and the condition is inverted when the walk arrived along the fall-through
//!   edge.
//! - `flags := cond(x - n)` where `flags` is the index: `x` becomes the index, bounded to
//!   `[0, n]` for `<=u` and `[n, i64::MAX]` for `>=u`.
//! - `x & (2^k - 1)`: `x` becomes the index, bounded to `[0, 2^k - 1]`.
//! - `r ^ r` on the high byte of the register being defined: the definition zero-extends the
//!   low byte, so only bits `[0, 8)` stay live.
//! - `x + x` is rewritten to `x * 2`.
//! - Memory and segmented accesses pass liveness to the effective address only. The
//!   segment register never becomes live.
//!
//! The path stops when a mask bounds the index, or a comparison bounds it and the index is
//! the only live expression left. It also stops when nothing is live any more. Calls,
//! returns, unary operators and the other expression kinds outside this list are reported
//! as [`crate::Error::Unsupported`].

use imbl::OrdMap;
use log::Level;

use crate::{
    analysis::{BitRange, SlicerConfig, StridedInterval},
    ir::{
        Address, BinaryOp, ConditionCode, Constant, DataType, Expression, Instruction, RtlBlock,
        StorageDomain,
    },
    utils::is_even_power_of_two,
    Result,
};

/// Live expressions and the bits of each that still matter.
///
/// Ordered by expression, so iteration and logging are deterministic. Cloning is O(1), which
/// keeps predecessor fan-out cheap.
pub type LiveMap = OrdMap<Expression, BitRange>;

/// What visiting one instruction or expression contributed to the slice.
#[derive(Debug, Clone, PartialEq)]
pub struct SlicerResult {
    src_expr: Expression,
    live_exprs: LiveMap,
    stop: bool,
}

impl SlicerResult {
    fn new(src_expr: Expression) -> Self {
        SlicerResult {
            src_expr,
            live_exprs: LiveMap::new(),
            stop: false,
        }
    }

    /// The visited expression, rewritten where an idiom was recognised.
    #[must_use]
    pub fn src_expr(&self) -> &Expression {
        &self.src_expr
    }

    /// Expressions the visited node made live.
    #[must_use]
    pub fn live_exprs(&self) -> &LiveMap {
        &self.live_exprs
    }

    /// `true` if the walk along this path should end here.
    #[must_use]
    pub fn stop(&self) -> bool {
        self.stop
    }
}

/// Merges `from` into `into`, widening ranges of expressions present in both.
fn merge_live(into: &mut LiveMap, from: LiveMap) {
    for (expr, range) in from {
        let merged = match into.get(&expr) {
            Some(existing) => *existing | range,
            None => range,
        };
        into.insert(expr, merged);
    }
}

fn domain_of(expression: &Expression) -> Result<StorageDomain> {
    match expression.as_identifier() {
        Some(id) => Ok(id.storage().domain()),
        None => Err(unsupported_error!(
            "storage domain of non-identifier {}",
            expression
        )),
    }
}

/// The state of a backward walk through one block.
///
/// # Examples
///
/// ```rust
/// use backwalk::analysis::{BitRange, SliceState, SlicerConfig};
/// use backwalk::ir::{Address, DataType, Identifier, RtlBlock, RtlEmitter};
///
/// let r1 = Identifier::register("r1", DataType::WORD32, 1);
/// let r2 = Identifier::register("r2", DataType::WORD32, 2);
/// let m = RtlEmitter::new();
///
/// let mut block = RtlBlock::new(Address::ptr32(0x100), "l00000100");
/// block.emit(|e| e.assign(r1.clone(), m.shl(r2.clone(), 2)));
/// block.emit(|e| e.goto(m.iadd(r1.clone(), 0x0012_3400)));
///
/// let mut state = SliceState::new(&block, SlicerConfig::default());
/// assert!(state.start()?);
/// assert_eq!(state.live().get(&r1.clone().into()), Some(&BitRange::new(0, 32)));
///
/// assert!(state.step()?);
/// assert!(state.is_at_beginning());
/// assert_eq!(state.dump_live(), "{ { r2, [0..31] } }");
/// assert_eq!(
///     state.jump_table_format().unwrap().to_string(),
///     "(r2 << 2) + 0x00123400"
/// );
/// # Ok::<(), backwalk::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct SliceState<'h> {
    config: SlicerConfig,
    block: &'h RtlBlock,
    instrs: Vec<&'h Instruction>,
    /// Number of instructions not yet visited; the next one is `instrs[pos - 1]`.
    pos: usize,
    /// Start of the block the walk came from.
    addr_succ: Option<Address>,
    /// Condition code of the most recent branch test.
    cc_next: Option<ConditionCode>,
    /// Live expression being redefined by the assignment under visit.
    assign_lhs: Option<Expression>,
    /// Set when the walk followed the fall-through edge of a branch.
    invert_condition: bool,
    live: LiveMap,
    jump_table_format: Option<Expression>,
    jump_table_index: Option<Expression>,
    jump_table_index_interval: StridedInterval,
}

impl<'h> SliceState<'h> {
    /// Creates a state positioned after the last instruction of `block`.
    #[must_use]
    pub fn new(block: &'h RtlBlock, config: SlicerConfig) -> Self {
        let instrs: Vec<&'h Instruction> = block.instructions().collect();
        SliceState {
            config,
            block,
            pos: instrs.len(),
            instrs,
            addr_succ: None,
            cc_next: None,
            assign_lhs: None,
            invert_condition: false,
            live: LiveMap::new(),
            jump_table_format: None,
            jump_table_index: None,
            jump_table_index_interval: StridedInterval::EMPTY,
        }
    }

    /// Creates the state continuing this walk at the end of the predecessor `block`.
    ///
    /// Everything learned so far carries over. `addr_succ` is the start of the block the
    /// walk is leaving, used to tell which edge of a branch in `block` was followed.
    #[must_use]
    pub fn create_new(&self, block: &'h RtlBlock, addr_succ: Address) -> Self {
        SliceState {
            addr_succ: Some(addr_succ),
            cc_next: self.cc_next,
            invert_condition: self.invert_condition,
            live: self.live.clone(),
            jump_table_format: self.jump_table_format.clone(),
            jump_table_index: self.jump_table_index.clone(),
            jump_table_index_interval: self.jump_table_index_interval,
            ..SliceState::new(block, self.config)
        }
    }

    /// Seeds the walk from the block's last instruction, normally an indirect `goto`.
    ///
    /// Returns `false` if the instruction makes nothing live, e.g. a jump to a constant
    /// address, or if the block is empty.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Unsupported`] if the last instruction is outside the modelled
    /// sublanguage.
    pub fn start(&mut self) -> Result<bool> {
        let Some(instr) = self.current_instruction() else {
            slice_log!(
                self.config,
                Level::Warn,
                "Block {} has no instructions",
                self.block.address()
            );
            return Ok(false);
        };

        slice_log!(self.config, Level::Debug, "Starting at instruction {}", instr);
        let result = self.visit_instruction(instr)?;
        self.pos -= 1;

        self.live = result.map(|r| r.live_exprs).unwrap_or_default();
        if self.live.is_empty() {
            slice_log!(self.config, Level::Warn, "  No indirect registers?");
            return Ok(false);
        }
        slice_log!(self.config, Level::Trace, "  live: {}", self.dump_live());
        Ok(true)
    }

    /// Visits the next instruction backward.
    ///
    /// Returns `false` once this path is finished: a mask or range check stopped it, the
    /// live set drained, or the state was already at the beginning of its block.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Unsupported`] for instructions and expressions outside the
    /// modelled sublanguage, and [`crate::Error::InvalidArgument`] if a discovered range
    /// cannot be represented.
    pub fn step(&mut self) -> Result<bool> {
        let Some(instr) = self.current_instruction() else {
            return Ok(false);
        };

        slice_log!(self.config, Level::Debug, "Stepping to instruction {}", instr);
        let result = self.visit_instruction(instr)?;
        self.pos -= 1;

        let Some(result) = result else {
            return Ok(true);
        };
        merge_live(&mut self.live, result.live_exprs);

        if result.stop {
            slice_log!(self.config, Level::Trace, "  Was asked to stop, stopping.");
            self.log_outcome();
            return Ok(false);
        }
        if self.live.is_empty() {
            slice_log!(
                self.config,
                Level::Trace,
                "  No more live expressions, stopping."
            );
            self.log_outcome();
            return Ok(false);
        }
        slice_log!(self.config, Level::Trace, "  live: {}", self.dump_live());
        Ok(true)
    }

    /// Returns `true` once every instruction of the block has been visited.
    #[must_use]
    pub fn is_at_beginning(&self) -> bool {
        self.pos == 0
    }

    /// The block this state walks through.
    #[must_use]
    pub fn block(&self) -> &'h RtlBlock {
        self.block
    }

    /// Start of the block the walk came from, `None` for the seeding block.
    #[must_use]
    pub fn successor(&self) -> Option<Address> {
        self.addr_succ
    }

    /// Expressions that still influence the jump target.
    #[must_use]
    pub fn live(&self) -> &LiveMap {
        &self.live
    }

    /// The expression computing the jump destination, in terms of the live expressions.
    #[must_use]
    pub fn jump_table_format(&self) -> Option<&Expression> {
        self.jump_table_format.as_ref()
    }

    /// The expression indexing the jump table, once a mask or comparison names it.
    #[must_use]
    pub fn jump_table_index(&self) -> Option<&Expression> {
        self.jump_table_index.as_ref()
    }

    /// Values the index can take; [`StridedInterval::EMPTY`] while unknown.
    #[must_use]
    pub fn jump_table_index_interval(&self) -> StridedInterval {
        self.jump_table_index_interval
    }

    /// Formats the live set as `{ { expr, range },... }`, sorted by expression text.
    #[must_use]
    pub fn dump_live(&self) -> String {
        let mut entries: Vec<(String, BitRange)> = self
            .live
            .iter()
            .map(|(expr, range)| (expr.to_string(), *range))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let body = entries
            .iter()
            .map(|(expr, range)| format!("{{ {expr}, {range} }}"))
            .collect::<Vec<_>>()
            .join(",");
        format!("{{ {body} }}")
    }

    fn current_instruction(&self) -> Option<&'h Instruction> {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.instrs.get(i).copied())
    }

    fn log_outcome(&self) {
        slice_log!(
            self.config,
            Level::Trace,
            "  index: {} ({})",
            self.jump_table_index
                .as_ref()
                .map_or_else(|| "<none>".to_string(), ToString::to_string),
            self.jump_table_index_interval
        );
        slice_log!(
            self.config,
            Level::Trace,
            "  expr:  {}",
            self.jump_table_format
                .as_ref()
                .map_or_else(|| "<none>".to_string(), ToString::to_string)
        );
    }

    /// Applies the transfer function of `instr`.
    ///
    /// Returns `None` for instructions that do not touch the slice, such as an assignment
    /// to a register that is not live.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Unsupported`] for calls, returns, side effects, predicated and
    /// invalid instructions, and for unsupported expressions inside the instruction.
    pub fn visit_instruction(&mut self, instr: &Instruction) -> Result<Option<SlicerResult>> {
        match instr {
            Instruction::Assignment { dst, src } => self.visit_assignment(dst, src),
            Instruction::Branch { condition, target } => {
                self.visit_branch(condition, target).map(Some)
            }
            Instruction::Goto { target } => {
                let result = self.visit_expression(target, BitRange::of_type(target.data_type()))?;
                if self.jump_table_format.is_none() {
                    self.jump_table_format = Some(target.clone());
                }
                Ok(Some(result))
            }
            Instruction::Nop => Ok(None),
            Instruction::Call { .. }
            | Instruction::Return
            | Instruction::SideEffect(_)
            | Instruction::If { .. }
            | Instruction::Invalid => Err(unsupported_error!("slicing through {}", instr)),
        }
    }

    fn visit_assignment(
        &mut self,
        dst: &Expression,
        src: &Expression,
    ) -> Result<Option<SlicerResult>> {
        // Writes to memory do not redefine anything live.
        let Some(id) = dst.as_identifier() else {
            return Ok(None);
        };

        let domain = id.storage().domain();
        let dead: Vec<Expression> = self
            .live
            .keys()
            .filter(|live| {
                live.as_identifier()
                    .is_some_and(|l| l.storage().domain() == domain)
            })
            .cloned()
            .collect();
        let Some(lhs) = dead.first().cloned() else {
            return Ok(None);
        };
        for reg in &dead {
            self.live.remove(reg);
        }

        let ctx = BitRange::span(id.storage().bit_address(), id.storage().bit_size());
        self.assign_lhs = Some(lhs.clone());
        let result = self.visit_expression(src, ctx);
        self.assign_lhs = None;
        let result = result?;

        if let Some(format) = &self.jump_table_format {
            self.jump_table_format = Some(format.replace(&lhs, &result.src_expr));
        }
        Ok(Some(result))
    }

    fn visit_branch(&mut self, condition: &Expression, target: &Expression) -> Result<SlicerResult> {
        let result = self.visit_expression(condition, BitRange::EMPTY)?;
        let Expression::Address(target) = target else {
            return Err(unsupported_error!("branch to computed target {}", target));
        };
        if self.addr_succ != Some(*target) {
            self.invert_condition = true;
        }
        Ok(result)
    }

    /// Applies the transfer function of `expression`, whose bits `ctx` are of interest.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Unsupported`] for expression kinds outside the modelled
    /// sublanguage.
    pub fn visit_expression(&mut self, expression: &Expression, ctx: BitRange) -> Result<SlicerResult> {
        match expression {
            Expression::Identifier(_) => Ok(SlicerResult {
                live_exprs: LiveMap::unit(expression.clone(), ctx),
                ..SlicerResult::new(expression.clone())
            }),
            Expression::Constant(_) | Expression::Address(_) => {
                Ok(SlicerResult::new(expression.clone()))
            }
            Expression::Binary {
                op,
                data_type,
                left,
                right,
            } => self.visit_binary(*op, *data_type, left, right, ctx),
            Expression::Cast {
                data_type,
                expression: inner,
            } => {
                let mut result = self.visit_expression(inner, BitRange::of_type(inner.data_type()))?;
                result.src_expr = Expression::cast(*data_type, result.src_expr);
                Ok(result)
            }
            Expression::MemoryAccess {
                effective_address,
                data_type,
            } => {
                let mut result = self.visit_expression(effective_address, ctx)?;
                result.src_expr = Expression::mem(*data_type, result.src_expr);
                Ok(result)
            }
            Expression::SegmentedAccess {
                segment,
                effective_address,
                data_type,
            } => {
                let mut result = self.visit_expression(effective_address, ctx)?;
                result.src_expr = Expression::SegmentedAccess {
                    segment: segment.clone(),
                    effective_address: Box::new(result.src_expr),
                    data_type: *data_type,
                };
                Ok(result)
            }
            Expression::ConditionOf(inner) => self.visit_condition_of(expression, inner),
            Expression::TestCondition {
                cc,
                expression: inner,
            } => {
                let mut result = self.visit_expression(inner, BitRange::of_type(inner.data_type()))?;
                self.cc_next = Some(*cc);
                self.jump_table_index = Some((**inner).clone());
                result.src_expr = expression.clone();
                Ok(result)
            }
            Expression::Unary { .. }
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
            | Expression::Dereference { .. } => {
                Err(unsupported_error!("slicing through {}", expression))
            }
        }
    }

    fn visit_binary(
        &mut self,
        op: BinaryOp,
        data_type: DataType,
        left: &Expression,
        right: &Expression,
        ctx: BitRange,
    ) -> Result<SlicerResult> {
        if op == BinaryOp::Xor && left == right {
            if let Some(result) = self.zero_extension_idiom(left) {
                return Ok(result);
            }
        }

        let lhs = self.visit_expression(left, ctx)?;
        let rhs = self.visit_expression(right, ctx)?;
        match op {
            BinaryOp::And => {
                self.jump_table_index = Some(left.clone());
                self.jump_table_index_interval = make_interval_and(right.as_constant())?;
                slice_log!(
                    self.config,
                    Level::Trace,
                    "  Found mask on {}: {}",
                    left,
                    self.jump_table_index_interval
                );
                return Ok(SlicerResult {
                    stop: true,
                    ..SlicerResult::new(Expression::binary(op, data_type, lhs.src_expr, rhs.src_expr))
                });
            }
            BinaryOp::IAdd if left == right => {
                // x + x => x * 2
                let two = Constant::word(data_type.bit_size(), 2);
                return Ok(SlicerResult {
                    live_exprs: lhs.live_exprs,
                    ..SlicerResult::new(Expression::binary(
                        BinaryOp::IMul,
                        data_type,
                        lhs.src_expr,
                        two.into(),
                    ))
                });
            }
            _ => {}
        }

        let mut live = lhs.live_exprs;
        merge_live(&mut live, rhs.live_exprs);
        Ok(SlicerResult {
            live_exprs: live,
            ..SlicerResult::new(Expression::binary(op, data_type, lhs.src_expr, rhs.src_expr))
        })
    }

    /// Recognises `hi = hi ^ hi` clearing the high byte of the live register being
    /// assigned, the 8086 way of zero-extending its low byte.
    fn zero_extension_idiom(&self, operand: &Expression) -> Option<SlicerResult> {
        let lhs = self.assign_lhs.as_ref()?;
        let dst = lhs.as_identifier()?;
        let hi = operand.as_identifier()?;
        if dst.storage().domain() != hi.storage().domain()
            || dst.storage().offset_of(hi.storage()) != Some(8)
        {
            return None;
        }

        let zero_extended = Expression::cast(
            dst.data_type(),
            Expression::cast(DataType::BYTE, lhs.clone()),
        );
        Some(SlicerResult {
            live_exprs: LiveMap::unit(lhs.clone(), BitRange::new(0, 8)),
            ..SlicerResult::new(zero_extended)
        })
    }

    fn visit_condition_of(&mut self, cof: &Expression, inner: &Expression) -> Result<SlicerResult> {
        if let Expression::Binary {
            op, left, right, ..
        } = inner
        {
            if *op != BinaryOp::ISub {
                return Err(unsupported_error!("condition of {}", inner));
            }

            let dom_left = domain_of(left)?;
            let mut bounded = false;
            for live in self.live.keys() {
                if domain_of(live)? == dom_left && self.assign_lhs == self.jump_table_index {
                    bounded = true;
                    break;
                }
            }

            if bounded {
                self.jump_table_index = Some((**left).clone());
                self.jump_table_index_interval = self.make_interval_isub(right.as_constant())?;
                slice_log!(
                    self.config,
                    Level::Trace,
                    "  Found range of {}: {}",
                    left,
                    self.jump_table_index_interval
                );
                return Ok(SlicerResult {
                    stop: self.live.len() == 1,
                    ..SlicerResult::new(cof.clone())
                });
            }
        }

        let mut result = self.visit_expression(inner, BitRange::of_type(inner.data_type()))?;
        result.src_expr = cof.clone();
        self.jump_table_index = Some(inner.clone());
        Ok(result)
    }

    /// Bounds the index from `index - right` tested by the pending branch condition.
    fn make_interval_isub(&self, right: Option<&Constant>) -> Result<StridedInterval> {
        let Some(right) = right else {
            return Ok(StridedInterval::EMPTY);
        };
        let Some(mut cc) = self.cc_next else {
            return Err(unsupported_error!(
                "comparison with {} outside a branch condition",
                right
            ));
        };
        if self.invert_condition {
            cc = cc.invert();
        }
        match cc {
            ConditionCode::Ule => StridedInterval::create(1, 0, right.to_i64()),
            ConditionCode::Uge => StridedInterval::create(1, right.to_i64(), i64::MAX),
            _ => Err(unsupported_error!("Unimplemented condition code {}.", cc)),
        }
    }
}

/// `x & (2^k - 1)` bounds `x` to `[0, 2^k - 1]`.
fn make_interval_and(mask: Option<&Constant>) -> Result<StridedInterval> {
    let Some(mask) = mask else {
        return Ok(StridedInterval::EMPTY);
    };
    let n = mask.to_i64();
    if is_even_power_of_two(i128::from(n) + 1) {
        StridedInterval::create(1, 0, n)
    } else {
        Ok(StridedInterval::EMPTY)
    }
}
