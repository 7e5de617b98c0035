//! The RTL expression tree.
//!
//! [`Expression`] is a closed sum type: every consumer matches on it exhaustively, so a new
//! node kind cannot be added without revisiting the slicer and the evaluator. Expressions are
//! immutable values. Equality, ordering and hashing are structural, which is what lets them
//! serve directly as keys of the slicer's live map.

use std::fmt;

use crate::ir::{Address, BinaryOp, ConditionCode, Constant, DataType, Identifier, UnaryOp};

/// A node of the RTL expression tree.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Expression {
    /// Reference to a register, flag group or temporary
    Identifier(Identifier),
    /// Typed constant
    Constant(Constant),
    /// Code or data address
    Address(Address),
    /// Binary operation
    Binary {
        /// Operator
        op: BinaryOp,
        /// Result type
        data_type: DataType,
        /// Left operand
        left: Box<Expression>,
        /// Right operand
        right: Box<Expression>,
    },
    /// Unary operation
    Unary {
        /// Operator
        op: UnaryOp,
        /// Result type
        data_type: DataType,
        /// Operand
        operand: Box<Expression>,
    },
    /// Conversion of `expression` to `data_type`
    Cast {
        /// Target type
        data_type: DataType,
        /// Converted expression
        expression: Box<Expression>,
    },
    /// Load of `data_type` from a linear effective address
    MemoryAccess {
        /// Effective address
        effective_address: Box<Expression>,
        /// Loaded type
        data_type: DataType,
    },
    /// Load of `data_type` from a segment:offset address
    SegmentedAccess {
        /// Segment selector
        segment: Box<Expression>,
        /// Offset within the segment
        effective_address: Box<Expression>,
        /// Loaded type
        data_type: DataType,
    },
    /// The condition codes produced by evaluating the inner expression
    ConditionOf(Box<Expression>),
    /// Test of a condition code against a flag group
    TestCondition {
        /// Tested condition
        cc: ConditionCode,
        /// Flag group expression
        expression: Box<Expression>,
    },
    /// Concatenation of `parts`, most significant first
    MkSequence {
        /// Result type
        data_type: DataType,
        /// Concatenated parts
        parts: Vec<Expression>,
    },
    /// `source` with `inserted` deposited at `bit_position`
    DepositBits {
        /// Value receiving the bits
        source: Box<Expression>,
        /// Deposited bits
        inserted: Box<Expression>,
        /// Bit position of the deposit
        bit_position: u32,
    },
    /// Bit slice of `expression` starting at `bit_offset`
    Slice {
        /// Slice type, determines the width
        data_type: DataType,
        /// Sliced expression
        expression: Box<Expression>,
        /// Position of the slice's least significant bit
        bit_offset: u32,
    },
    /// Access of a named field of a structure
    FieldAccess {
        /// Field type
        data_type: DataType,
        /// Structure expression
        structure: Box<Expression>,
        /// Field name
        field: String,
    },
    /// Indexed array element
    ArrayAccess {
        /// Element type
        data_type: DataType,
        /// Array expression
        array: Box<Expression>,
        /// Index expression
        index: Box<Expression>,
    },
    /// Typed pointer displaced by a byte offset
    PointerAddition {
        /// Result type
        data_type: DataType,
        /// Base pointer
        pointer: Box<Expression>,
        /// Byte offset
        offset: i64,
    },
    /// C++ style `base->*member`
    MemberPointerSelector {
        /// Result type
        data_type: DataType,
        /// Base pointer
        base: Box<Expression>,
        /// Member pointer
        member: Box<Expression>,
    },
    /// Reference to a scope-qualified global name
    ScopeResolution {
        /// Result type
        data_type: DataType,
        /// Qualified name
        name: String,
    },
    /// Reference to a procedure by entry address
    ProcedureConstant {
        /// Entry address
        address: Address,
        /// Procedure name
        name: String,
    },
    /// SSA phi function
    Phi {
        /// Result type
        data_type: DataType,
        /// Incoming values
        arguments: Vec<Expression>,
    },
    /// An argument passed by reference to receive a result
    OutArgument {
        /// Argument type
        data_type: DataType,
        /// Receiving expression
        expression: Box<Expression>,
    },
    /// Call of `procedure` with `arguments`
    Application {
        /// Result type
        data_type: DataType,
        /// Called expression
        procedure: Box<Expression>,
        /// Actual arguments
        arguments: Vec<Expression>,
    },
    /// `condition ? then_expr : else_expr`
    Conditional {
        /// Result type
        data_type: DataType,
        /// Selector
        condition: Box<Expression>,
        /// Value when the selector is true
        then_expr: Box<Expression>,
        /// Value when the selector is false
        else_expr: Box<Expression>,
    },
    /// High-level pointer dereference
    Dereference {
        /// Result type
        data_type: DataType,
        /// Dereferenced pointer
        expression: Box<Expression>,
    },
}

impl Expression {
    /// Creates a binary expression.
    #[must_use]
    pub fn binary(op: BinaryOp, data_type: DataType, left: Expression, right: Expression) -> Self {
        Expression::Binary {
            op,
            data_type,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Creates a cast of `expression` to `data_type`.
    #[must_use]
    pub fn cast(data_type: DataType, expression: Expression) -> Self {
        Expression::Cast {
            data_type,
            expression: Box::new(expression),
        }
    }

    /// Creates a memory load of `data_type` from `effective_address`.
    #[must_use]
    pub fn mem(data_type: DataType, effective_address: Expression) -> Self {
        Expression::MemoryAccess {
            effective_address: Box::new(effective_address),
            data_type,
        }
    }

    /// Returns the type of the value this expression produces.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        match self {
            Expression::Identifier(id) => id.data_type(),
            Expression::Constant(c) => c.data_type(),
            Expression::Address(a) => a.data_type(),
            Expression::ProcedureConstant { address, .. } => address.data_type(),
            Expression::ConditionOf(_) => DataType::BYTE,
            Expression::TestCondition { .. } => DataType::BOOL,
            Expression::DepositBits { source, .. } => source.data_type(),
            Expression::Binary { data_type, .. }
            | Expression::Unary { data_type, .. }
            | Expression::Cast { data_type, .. }
            | Expression::MemoryAccess { data_type, .. }
            | Expression::SegmentedAccess { data_type, .. }
            | Expression::MkSequence { data_type, .. }
            | Expression::Slice { data_type, .. }
            | Expression::FieldAccess { data_type, .. }
            | Expression::ArrayAccess { data_type, .. }
            | Expression::PointerAddition { data_type, .. }
            | Expression::MemberPointerSelector { data_type, .. }
            | Expression::ScopeResolution { data_type, .. }
            | Expression::Phi { data_type, .. }
            | Expression::OutArgument { data_type, .. }
            | Expression::Application { data_type, .. }
            | Expression::Conditional { data_type, .. }
            | Expression::Dereference { data_type, .. } => *data_type,
        }
    }

    /// Returns the identifier if this is an identifier leaf.
    #[must_use]
    pub fn as_identifier(&self) -> Option<&Identifier> {
        match self {
            Expression::Identifier(id) => Some(id),
            _ => None,
        }
    }

    /// Returns the constant if this is a constant leaf.
    #[must_use]
    pub fn as_constant(&self) -> Option<&Constant> {
        match self {
            Expression::Constant(c) => Some(c),
            _ => None,
        }
    }

    /// Returns the direct sub-expressions of this node, left to right.
    #[must_use]
    pub fn children(&self) -> Vec<&Expression> {
        match self {
            Expression::Identifier(_)
            | Expression::Constant(_)
            | Expression::Address(_)
            | Expression::ScopeResolution { .. }
            | Expression::ProcedureConstant { .. } => Vec::new(),
            Expression::Binary { left, right, .. } => vec![left, right],
            Expression::Unary { operand, .. } => vec![operand],
            Expression::Cast { expression, .. }
            | Expression::ConditionOf(expression)
            | Expression::TestCondition { expression, .. }
            | Expression::Slice { expression, .. }
            | Expression::OutArgument { expression, .. }
            | Expression::Dereference { expression, .. } => vec![expression],
            Expression::MemoryAccess {
                effective_address, ..
            } => vec![effective_address],
            Expression::SegmentedAccess {
                segment,
                effective_address,
                ..
            } => vec![segment, effective_address],
            Expression::MkSequence { parts, .. } => parts.iter().collect(),
            Expression::DepositBits {
                source, inserted, ..
            } => vec![source, inserted],
            Expression::FieldAccess { structure, .. } => vec![structure],
            Expression::ArrayAccess { array, index, .. } => vec![array, index],
            Expression::PointerAddition { pointer, .. } => vec![pointer],
            Expression::MemberPointerSelector { base, member, .. } => vec![base, member],
            Expression::Phi { arguments, .. } => arguments.iter().collect(),
            Expression::Application {
                procedure,
                arguments,
                ..
            } => std::iter::once(&**procedure).chain(arguments.iter()).collect(),
            Expression::Conditional {
                condition,
                then_expr,
                else_expr,
                ..
            } => vec![condition, then_expr, else_expr],
        }
    }

    /// Rebuilds this node with every direct sub-expression passed through `f`.
    fn map_children(&self, f: &mut impl FnMut(&Expression) -> Expression) -> Expression {
        let mut bx = |e: &Expression| Box::new(f(e));
        match self {
            Expression::Identifier(_)
            | Expression::Constant(_)
            | Expression::Address(_)
            | Expression::ScopeResolution { .. }
            | Expression::ProcedureConstant { .. } => self.clone(),
            Expression::Binary {
                op,
                data_type,
                left,
                right,
            } => Expression::Binary {
                op: *op,
                data_type: *data_type,
                left: bx(left),
                right: bx(right),
            },
            Expression::Unary {
                op,
                data_type,
                operand,
            } => Expression::Unary {
                op: *op,
                data_type: *data_type,
                operand: bx(operand),
            },
            Expression::Cast {
                data_type,
                expression,
            } => Expression::Cast {
                data_type: *data_type,
                expression: bx(expression),
            },
            Expression::MemoryAccess {
                effective_address,
                data_type,
            } => Expression::MemoryAccess {
                effective_address: bx(effective_address),
                data_type: *data_type,
            },
            Expression::SegmentedAccess {
                segment,
                effective_address,
                data_type,
            } => Expression::SegmentedAccess {
                segment: bx(segment),
                effective_address: bx(effective_address),
                data_type: *data_type,
            },
            Expression::ConditionOf(expression) => Expression::ConditionOf(bx(expression)),
            Expression::TestCondition { cc, expression } => Expression::TestCondition {
                cc: *cc,
                expression: bx(expression),
            },
            Expression::MkSequence { data_type, parts } => Expression::MkSequence {
                data_type: *data_type,
                parts: parts.iter().map(|p| *bx(p)).collect(),
            },
            Expression::DepositBits {
                source,
                inserted,
                bit_position,
            } => Expression::DepositBits {
                source: bx(source),
                inserted: bx(inserted),
                bit_position: *bit_position,
            },
            Expression::Slice {
                data_type,
                expression,
                bit_offset,
            } => Expression::Slice {
                data_type: *data_type,
                expression: bx(expression),
                bit_offset: *bit_offset,
            },
            Expression::FieldAccess {
                data_type,
                structure,
                field,
            } => Expression::FieldAccess {
                data_type: *data_type,
                structure: bx(structure),
                field: field.clone(),
            },
            Expression::ArrayAccess {
                data_type,
                array,
                index,
            } => Expression::ArrayAccess {
                data_type: *data_type,
                array: bx(array),
                index: bx(index),
            },
            Expression::PointerAddition {
                data_type,
                pointer,
                offset,
            } => Expression::PointerAddition {
                data_type: *data_type,
                pointer: bx(pointer),
                offset: *offset,
            },
            Expression::MemberPointerSelector {
                data_type,
                base,
                member,
            } => Expression::MemberPointerSelector {
                data_type: *data_type,
                base: bx(base),
                member: bx(member),
            },
            Expression::Phi {
                data_type,
                arguments,
            } => Expression::Phi {
                data_type: *data_type,
                arguments: arguments.iter().map(|a| *bx(a)).collect(),
            },
            Expression::OutArgument {
                data_type,
                expression,
            } => Expression::OutArgument {
                data_type: *data_type,
                expression: bx(expression),
            },
            Expression::Application {
                data_type,
                procedure,
                arguments,
            } => Expression::Application {
                data_type: *data_type,
                procedure: bx(procedure),
                arguments: arguments.iter().map(|a| *bx(a)).collect(),
            },
            Expression::Conditional {
                data_type,
                condition,
                then_expr,
                else_expr,
            } => Expression::Conditional {
                data_type: *data_type,
                condition: bx(condition),
                then_expr: bx(then_expr),
                else_expr: bx(else_expr),
            },
            Expression::Dereference {
                data_type,
                expression,
            } => Expression::Dereference {
                data_type: *data_type,
                expression: bx(expression),
            },
        }
    }

    /// Returns a copy of this tree with every occurrence of `old` replaced by `new`.
    ///
    /// Matching is structural. Replacement is not applied inside the substituted `new`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use backwalk::ir::{DataType, Expression, Identifier, RtlEmitter};
    ///
    /// let m = RtlEmitter::new();
    /// let r1 = Identifier::register("r1", DataType::WORD32, 1);
    /// let r2 = Identifier::register("r2", DataType::WORD32, 2);
    ///
    /// let format = m.iadd(r1.clone(), 0x1000);
    /// let spliced = format.replace(&r1.into(), &m.shl(r2, 2));
    /// assert_eq!(spliced.to_string(), "(r2 << 2) + 0x00001000");
    /// ```
    #[must_use]
    pub fn replace(&self, old: &Expression, new: &Expression) -> Expression {
        if self == old {
            return new.clone();
        }
        self.map_children(&mut |child| child.replace(old, new))
    }

    /// Collects the distinct identifiers of this tree in order of first appearance.
    #[must_use]
    pub fn identifiers(&self) -> Vec<Identifier> {
        let mut found = Vec::new();
        self.collect_identifiers(&mut found);
        found
    }

    fn collect_identifiers(&self, found: &mut Vec<Identifier>) {
        if let Expression::Identifier(id) = self {
            if !found.contains(id) {
                found.push(id.clone());
            }
            return;
        }
        for child in self.children() {
            child.collect_identifiers(found);
        }
    }

    fn fmt_operand(
        &self,
        f: &mut fmt::Formatter<'_>,
        parent: u8,
        right_side: bool,
    ) -> fmt::Result {
        let needs_parens = match self {
            Expression::Binary { op, .. } => {
                let own = op.precedence();
                own < parent || (right_side && own == parent)
            }
            Expression::Conditional { .. } => true,
            _ => false,
        };
        if needs_parens {
            write!(f, "({self})")
        } else {
            write!(f, "{self}")
        }
    }
}

fn fmt_list(f: &mut fmt::Formatter<'_>, items: &[Expression]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Identifier(id) => write!(f, "{id}"),
            Expression::Constant(c) => write!(f, "{c}"),
            Expression::Address(a) => write!(f, "{a}"),
            Expression::Binary {
                op, left, right, ..
            } => {
                let prec = op.precedence();
                left.fmt_operand(f, prec, false)?;
                write!(f, " {op} ")?;
                right.fmt_operand(f, prec, true)
            }
            Expression::Unary { op, operand, .. } => {
                write!(f, "{op}")?;
                operand.fmt_operand(f, u8::MAX, false)
            }
            Expression::Cast {
                data_type,
                expression,
            } => {
                write!(f, "({data_type}) ")?;
                expression.fmt_operand(f, u8::MAX, false)
            }
            Expression::MemoryAccess {
                effective_address,
                data_type,
            } => write!(f, "Mem[{effective_address}:{data_type}]"),
            Expression::SegmentedAccess {
                segment,
                effective_address,
                data_type,
            } => write!(f, "Mem[{segment}:{effective_address}:{data_type}]"),
            Expression::ConditionOf(expression) => write!(f, "cond({expression})"),
            Expression::TestCondition { cc, expression } => write!(f, "Test({cc},{expression})"),
            Expression::MkSequence { parts, .. } => {
                f.write_str("SEQ(")?;
                fmt_list(f, parts)?;
                f.write_str(")")
            }
            Expression::DepositBits {
                source,
                inserted,
                bit_position,
            } => write!(f, "DPB({source}, {inserted}, {bit_position})"),
            Expression::Slice {
                data_type,
                expression,
                bit_offset,
            } => write!(f, "SLICE({expression}, {data_type}, {bit_offset})"),
            Expression::FieldAccess {
                structure, field, ..
            } => {
                structure.fmt_operand(f, u8::MAX, false)?;
                write!(f, ".{field}")
            }
            Expression::ArrayAccess { array, index, .. } => {
                array.fmt_operand(f, u8::MAX, false)?;
                write!(f, "[{index}]")
            }
            Expression::PointerAddition {
                pointer, offset, ..
            } => write!(f, "PTRADD({pointer}, {offset})"),
            Expression::MemberPointerSelector { base, member, .. } => {
                base.fmt_operand(f, u8::MAX, false)?;
                f.write_str("->*")?;
                member.fmt_operand(f, u8::MAX, false)
            }
            Expression::ScopeResolution { name, .. } => write!(f, "{name}"),
            Expression::ProcedureConstant { name, .. } => write!(f, "{name}"),
            Expression::Phi { arguments, .. } => {
                f.write_str("PHI(")?;
                fmt_list(f, arguments)?;
                f.write_str(")")
            }
            Expression::OutArgument { expression, .. } => write!(f, "out {expression}"),
            Expression::Application {
                procedure,
                arguments,
                ..
            } => {
                procedure.fmt_operand(f, u8::MAX, false)?;
                f.write_str("(")?;
                fmt_list(f, arguments)?;
                f.write_str(")")
            }
            Expression::Conditional {
                condition,
                then_expr,
                else_expr,
                ..
            } => write!(f, "{condition} ? {then_expr} : {else_expr}"),
            Expression::Dereference { expression, .. } => {
                f.write_str("*")?;
                expression.fmt_operand(f, u8::MAX, false)
            }
        }
    }
}

impl From<Identifier> for Expression {
    fn from(id: Identifier) -> Self {
        Expression::Identifier(id)
    }
}

impl From<Constant> for Expression {
    fn from(c: Constant) -> Self {
        Expression::Constant(c)
    }
}

impl From<Address> for Expression {
    fn from(a: Address) -> Self {
        Expression::Address(a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(n: u32) -> Expression {
        Identifier::register(format!("r{n}"), DataType::WORD32, n).into()
    }

    fn w(v: u32) -> Expression {
        Constant::word32(v).into()
    }

    #[test]
    fn test_display_precedence() {
        let shl = Expression::binary(BinaryOp::Shl, DataType::WORD32, r(2), Constant::int32(2).into());
        let sum = Expression::binary(BinaryOp::IAdd, DataType::WORD32, shl.clone(), w(0x0012_3400));
        assert_eq!(sum.to_string(), "(r2 << 2) + 0x00123400");

        let prod = Expression::binary(BinaryOp::IMul, DataType::WORD32, r(1), w(4));
        let ea = Expression::binary(BinaryOp::IAdd, DataType::WORD32, w(0x1000), prod);
        assert_eq!(ea.to_string(), "0x00001000 + r1 * 0x00000004");

        let diff = Expression::binary(BinaryOp::ISub, DataType::WORD32, r(1), r(2));
        let nested = Expression::binary(BinaryOp::ISub, DataType::WORD32, r(3), diff);
        assert_eq!(nested.to_string(), "r3 - (r1 - r2)");
    }

    #[test]
    fn test_display_special_nodes() {
        let load = Expression::mem(DataType::WORD32, r(1));
        assert_eq!(load.to_string(), "Mem[r1:word32]");

        let cast = Expression::cast(DataType::BYTE, r(1));
        assert_eq!(cast.to_string(), "(byte) r1");

        let cond = Expression::ConditionOf(Box::new(r(1)));
        assert_eq!(cond.to_string(), "cond(r1)");
        assert_eq!(cond.data_type(), DataType::BYTE);
    }

    #[test]
    fn test_replace_is_structural() {
        let sum = Expression::binary(BinaryOp::IAdd, DataType::WORD32, r(1), r(1));
        let replaced = sum.replace(&r(1), &r(2));
        assert_eq!(replaced, Expression::binary(BinaryOp::IAdd, DataType::WORD32, r(2), r(2)));

        let untouched = sum.replace(&r(3), &r(2));
        assert_eq!(untouched, sum);
    }

    #[test]
    fn test_identifiers_distinct_in_order() {
        let inner = Expression::binary(BinaryOp::IAdd, DataType::WORD32, r(2), r(1));
        let outer = Expression::binary(BinaryOp::IAdd, DataType::WORD32, inner, r(2));
        let names: Vec<String> = outer.identifiers().iter().map(|i| i.name().to_string()).collect();
        assert_eq!(names, vec!["r2", "r1"]);
    }
}
