//! Operators and condition codes.

use strum::{Display, EnumIter};

use crate::{
    ir::{Constant, DataType},
    utils::sign_extend,
    Error, Result,
};

/// Binary operators of the RTL expression language.
///
/// The `Display` form is the infix symbol used when printing expressions. Unsigned
/// variants carry a `u` suffix (`<u`, `>>u`), following the usual decompiler notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter)]
pub enum BinaryOp {
    /// Integer addition
    #[strum(serialize = "+")]
    IAdd,
    /// Integer subtraction
    #[strum(serialize = "-")]
    ISub,
    /// Integer multiplication, signedness unknown
    #[strum(serialize = "*")]
    IMul,
    /// Signed multiplication
    #[strum(serialize = "*s")]
    SMul,
    /// Unsigned multiplication
    #[strum(serialize = "*u")]
    UMul,
    /// Signed division
    #[strum(serialize = "/")]
    SDiv,
    /// Unsigned division
    #[strum(serialize = "/u")]
    UDiv,
    /// Bitwise and
    #[strum(serialize = "&")]
    And,
    /// Bitwise or
    #[strum(serialize = "|")]
    Or,
    /// Bitwise exclusive or
    #[strum(serialize = "^")]
    Xor,
    /// Shift left
    #[strum(serialize = "<<")]
    Shl,
    /// Logical shift right
    #[strum(serialize = ">>u")]
    Shr,
    /// Arithmetic shift right
    #[strum(serialize = ">>")]
    Sar,
    /// Equality
    #[strum(serialize = "==")]
    Eq,
    /// Inequality
    #[strum(serialize = "!=")]
    Ne,
    /// Signed less than
    #[strum(serialize = "<")]
    Lt,
    /// Signed less than or equal
    #[strum(serialize = "<=")]
    Le,
    /// Signed greater than
    #[strum(serialize = ">")]
    Gt,
    /// Signed greater than or equal
    #[strum(serialize = ">=")]
    Ge,
    /// Unsigned less than
    #[strum(serialize = "<u")]
    Ult,
    /// Unsigned less than or equal
    #[strum(serialize = "<=u")]
    Ule,
    /// Unsigned greater than
    #[strum(serialize = ">u")]
    Ugt,
    /// Unsigned greater than or equal
    #[strum(serialize = ">=u")]
    Uge,
}

impl BinaryOp {
    /// Returns `true` if the operands of this operator may be swapped.
    #[must_use]
    pub const fn is_commutative(self) -> bool {
        matches!(
            self,
            BinaryOp::IAdd
                | BinaryOp::IMul
                | BinaryOp::SMul
                | BinaryOp::UMul
                | BinaryOp::And
                | BinaryOp::Or
                | BinaryOp::Xor
                | BinaryOp::Eq
                | BinaryOp::Ne
        )
    }

    /// Returns `true` for the comparison operators, whose result is a `bool`.
    #[must_use]
    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::Ne
                | BinaryOp::Lt
                | BinaryOp::Le
                | BinaryOp::Gt
                | BinaryOp::Ge
                | BinaryOp::Ult
                | BinaryOp::Ule
                | BinaryOp::Ugt
                | BinaryOp::Uge
        )
    }

    /// Binding strength when printed infix; higher binds tighter.
    #[must_use]
    pub const fn precedence(self) -> u8 {
        match self {
            BinaryOp::IMul
            | BinaryOp::SMul
            | BinaryOp::UMul
            | BinaryOp::SDiv
            | BinaryOp::UDiv => 13,
            BinaryOp::IAdd | BinaryOp::ISub => 12,
            BinaryOp::Shl | BinaryOp::Shr | BinaryOp::Sar => 11,
            BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge
            | BinaryOp::Ult
            | BinaryOp::Ule
            | BinaryOp::Ugt
            | BinaryOp::Uge => 10,
            BinaryOp::Eq | BinaryOp::Ne => 9,
            BinaryOp::And => 8,
            BinaryOp::Xor => 7,
            BinaryOp::Or => 6,
        }
    }

    /// Folds the operator over two constants.
    ///
    /// Arithmetic wraps in the width of `left`; comparisons produce a `bool`. An `Invalid`
    /// operand yields `Invalid`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] on division by zero.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn apply_constants(self, left: &Constant, right: &Constant) -> Result<Constant> {
        if !left.is_valid() || !right.is_valid() {
            return Ok(Constant::invalid());
        }

        let dt = left.data_type();
        let bits = dt.bit_size();
        let l = left.to_u64();
        let r = right.to_u64();
        let sl = sign_extend(l, bits) as i64;
        let sr = sign_extend(r, right.data_type().bit_size()) as i64;

        let value = match self {
            BinaryOp::IAdd => l.wrapping_add(r),
            BinaryOp::ISub => l.wrapping_sub(r),
            BinaryOp::IMul | BinaryOp::UMul => l.wrapping_mul(r),
            BinaryOp::SMul => sl.wrapping_mul(sr) as u64,
            BinaryOp::UDiv => {
                if r == 0 {
                    return Err(Error::InvalidArgument("division by zero".to_string()));
                }
                l / r
            }
            BinaryOp::SDiv => {
                if sr == 0 {
                    return Err(Error::InvalidArgument("division by zero".to_string()));
                }
                sl.wrapping_div(sr) as u64
            }
            BinaryOp::And => l & r,
            BinaryOp::Or => l | r,
            BinaryOp::Xor => l ^ r,
            BinaryOp::Shl => {
                if r >= u64::from(bits) {
                    0
                } else {
                    l << r
                }
            }
            BinaryOp::Shr => {
                if r >= u64::from(bits) {
                    0
                } else {
                    l >> r
                }
            }
            BinaryOp::Sar => (sl >> r.min(63)) as u64,
            BinaryOp::Eq => return Ok(Self::truth(l == r)),
            BinaryOp::Ne => return Ok(Self::truth(l != r)),
            BinaryOp::Lt => return Ok(Self::truth(sl < sr)),
            BinaryOp::Le => return Ok(Self::truth(sl <= sr)),
            BinaryOp::Gt => return Ok(Self::truth(sl > sr)),
            BinaryOp::Ge => return Ok(Self::truth(sl >= sr)),
            BinaryOp::Ult => return Ok(Self::truth(l < r)),
            BinaryOp::Ule => return Ok(Self::truth(l <= r)),
            BinaryOp::Ugt => return Ok(Self::truth(l > r)),
            BinaryOp::Uge => return Ok(Self::truth(l >= r)),
        };
        Ok(Constant::new(dt, value))
    }

    fn truth(value: bool) -> Constant {
        Constant::new(DataType::BOOL, u64::from(value))
    }
}

/// Unary operators of the RTL expression language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter)]
pub enum UnaryOp {
    /// Two's complement negation
    #[strum(serialize = "-")]
    Neg,
    /// One's complement
    #[strum(serialize = "~")]
    Comp,
    /// Logical not
    #[strum(serialize = "!")]
    Not,
}

/// Condition codes tested by conditional branches.
///
/// Displayed in upper case (`ULE`, `GE`, ...). The flag groups a code reads are decided by
/// the lifter; the slicer only cares about the code itself and its inverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter)]
#[strum(serialize_all = "UPPERCASE")]
pub enum ConditionCode {
    /// Unsigned greater than
    Ugt,
    /// Unsigned less than or equal
    Ule,
    /// Unsigned less than
    Ult,
    /// Unsigned greater than or equal
    Uge,
    /// Signed greater than
    Gt,
    /// Signed less than or equal
    Le,
    /// Signed greater than or equal
    Ge,
    /// Signed less than
    Lt,
    /// No overflow
    No,
    /// Overflow
    Ov,
    /// Sign set
    Sg,
    /// Sign clear
    Ns,
    /// Equal
    Eq,
    /// Not equal
    Ne,
    /// Parity even
    Pe,
    /// Parity odd
    Po,
    /// Always taken
    Always,
    /// Never taken
    Never,
}

impl ConditionCode {
    /// Returns the condition that holds exactly when `self` does not.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use backwalk::ir::ConditionCode;
    ///
    /// assert_eq!(ConditionCode::Ule.invert(), ConditionCode::Ugt);
    /// assert_eq!(ConditionCode::Always.invert(), ConditionCode::Never);
    /// ```
    #[must_use]
    pub const fn invert(self) -> Self {
        match self {
            ConditionCode::Ugt => ConditionCode::Ule,
            ConditionCode::Ule => ConditionCode::Ugt,
            ConditionCode::Ult => ConditionCode::Uge,
            ConditionCode::Uge => ConditionCode::Ult,
            ConditionCode::Gt => ConditionCode::Le,
            ConditionCode::Le => ConditionCode::Gt,
            ConditionCode::Ge => ConditionCode::Lt,
            ConditionCode::Lt => ConditionCode::Ge,
            ConditionCode::No => ConditionCode::Ov,
            ConditionCode::Ov => ConditionCode::No,
            ConditionCode::Sg => ConditionCode::Ns,
            ConditionCode::Ns => ConditionCode::Sg,
            ConditionCode::Eq => ConditionCode::Ne,
            ConditionCode::Ne => ConditionCode::Eq,
            ConditionCode::Pe => ConditionCode::Po,
            ConditionCode::Po => ConditionCode::Pe,
            ConditionCode::Always => ConditionCode::Never,
            ConditionCode::Never => ConditionCode::Always,
        }
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_invert_is_involution() {
        for cc in ConditionCode::iter() {
            assert_ne!(cc, cc.invert());
            assert_eq!(cc, cc.invert().invert());
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(BinaryOp::Shl.to_string(), "<<");
        assert_eq!(BinaryOp::Ule.to_string(), "<=u");
        assert_eq!(ConditionCode::Ule.to_string(), "ULE");
        assert_eq!(ConditionCode::Always.to_string(), "ALWAYS");
        assert_eq!(UnaryOp::Comp.to_string(), "~");
    }

    #[test]
    fn test_apply_constants_wraps() {
        let sum = BinaryOp::IAdd
            .apply_constants(&Constant::byte(0xF0), &Constant::byte(0x20))
            .unwrap();
        assert_eq!(sum, Constant::byte(0x10));

        let shifted = BinaryOp::Shl
            .apply_constants(&Constant::word32(3), &Constant::int32(2))
            .unwrap();
        assert_eq!(shifted, Constant::word32(12));

        let sar = BinaryOp::Sar
            .apply_constants(&Constant::int32(-8), &Constant::int32(1))
            .unwrap();
        assert_eq!(sar.to_i64(), -4);
    }

    #[test]
    fn test_apply_constants_compare_and_invalid() {
        let lt = BinaryOp::Ult
            .apply_constants(&Constant::word32(1), &Constant::word32(2))
            .unwrap();
        assert_eq!(lt, Constant::new(DataType::BOOL, 1));

        let inv = BinaryOp::IAdd
            .apply_constants(&Constant::invalid(), &Constant::word32(2))
            .unwrap();
        assert!(!inv.is_valid());

        assert!(BinaryOp::UDiv
            .apply_constants(&Constant::word32(1), &Constant::word32(0))
            .is_err());
    }

    #[test]
    fn test_commutativity() {
        assert!(BinaryOp::IAdd.is_commutative());
        assert!(!BinaryOp::ISub.is_commutative());
        assert!(!BinaryOp::Shl.is_commutative());
    }
}
