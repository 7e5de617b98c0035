//! Abstract numeric value sets.
//!
//! A [`ValueSet`] is either a strided interval, cheap but approximate, or an explicit list of
//! constants, exact but only produced by loads and by multiplications of explicit lists.
//! Every operation returns a new set. Not every representation implements every operation;
//! [`ValueSet::supports`] exposes the capability table and an unsupported combination fails
//! with [`Error::NotSupported`].
//!
//! | operation       | interval | concrete |
//! |-----------------|----------|----------|
//! | `add`           | no       | no       |
//! | `add_constant`  | yes      | no       |
//! | `and`           | yes      | no       |
//! | `imul`          | yes      | yes      |
//! | `shl`           | yes      | no       |
//! | `sign_extend`   | no       | yes      |
//! | `truncate`      | yes      | yes      |

use std::fmt;

use strum::{Display, EnumIter};

use crate::{
    analysis::StridedInterval,
    ir::{BinaryOp, Constant, DataType},
    utils::sign_extend,
    Error, Result,
};

/// Operations of the [`ValueSet`] algebra.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum ValueSetOp {
    /// Sum of two value sets
    Add,
    /// Sum with a constant
    AddConstant,
    /// Bitwise and with a constant mask
    And,
    /// Product with a constant
    IMul,
    /// Left shift by a constant
    Shl,
    /// Sign extension to a wider type
    SignExtend,
    /// Truncation to a narrower type
    Truncate,
}

/// A set of values of a given [`DataType`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSet {
    /// The members of a strided interval
    Interval {
        /// Type of the members
        data_type: DataType,
        /// Member set
        interval: StridedInterval,
    },
    /// An explicit list of members, possibly containing `Invalid` constants
    Concrete {
        /// Type of the members
        data_type: DataType,
        /// Members in evaluation order
        values: Vec<Constant>,
    },
}

impl ValueSet {
    /// Creates an interval value set.
    #[must_use]
    pub const fn interval(data_type: DataType, interval: StridedInterval) -> Self {
        ValueSet::Interval {
            data_type,
            interval,
        }
    }

    /// Creates the empty interval value set.
    #[must_use]
    pub const fn empty(data_type: DataType) -> Self {
        ValueSet::interval(data_type, StridedInterval::EMPTY)
    }

    /// Creates a concrete value set.
    #[must_use]
    pub fn concrete(data_type: DataType, values: Vec<Constant>) -> Self {
        ValueSet::Concrete { data_type, values }
    }

    /// Returns the type of the members.
    #[must_use]
    pub const fn data_type(&self) -> DataType {
        match self {
            ValueSet::Interval { data_type, .. } | ValueSet::Concrete { data_type, .. } => {
                *data_type
            }
        }
    }

    /// Returns the strided interval of an interval set.
    #[must_use]
    pub const fn as_interval(&self) -> Option<&StridedInterval> {
        match self {
            ValueSet::Interval { interval, .. } => Some(interval),
            ValueSet::Concrete { .. } => None,
        }
    }

    /// Name of the backing representation.
    #[must_use]
    pub const fn representation(&self) -> &'static str {
        match self {
            ValueSet::Interval { .. } => "interval",
            ValueSet::Concrete { .. } => "concrete",
        }
    }

    /// Returns `true` if this representation implements `op`.
    #[must_use]
    pub const fn supports(&self, op: ValueSetOp) -> bool {
        match self {
            ValueSet::Interval { .. } => !matches!(op, ValueSetOp::Add | ValueSetOp::SignExtend),
            ValueSet::Concrete { .. } => matches!(
                op,
                ValueSetOp::IMul | ValueSetOp::SignExtend | ValueSetOp::Truncate
            ),
        }
    }

    fn not_supported(&self, operation: &'static str) -> Error {
        Error::NotSupported {
            operation,
            representation: self.representation(),
        }
    }

    /// Enumerates the members as constants of the set's type.
    ///
    /// An empty interval yields nothing and a singleton yields one value. Strided intervals
    /// are enumerated lazily, so callers bound wide ranges with [`Iterator::take`].
    #[must_use]
    pub fn values(&self) -> Values<'_> {
        match self {
            ValueSet::Interval {
                data_type,
                interval,
            } => Values(ValuesInner::Strided {
                data_type: *data_type,
                next: (!interval.is_empty()).then_some(interval.low()),
                stride: i64::from(interval.stride()),
                high: interval.high(),
            }),
            ValueSet::Concrete { values, .. } => Values(ValuesInner::Listed(values.iter())),
        }
    }

    /// Adds another value set.
    ///
    /// # Errors
    ///
    /// Always [`Error::NotSupported`]; neither representation implements it.
    pub fn add(&self, _right: &ValueSet) -> Result<ValueSet> {
        Err(self.not_supported("add"))
    }

    /// Adds a constant to every member.
    ///
    /// # Errors
    ///
    /// [`Error::NotSupported`] for concrete sets.
    pub fn add_constant(&self, right: &Constant) -> Result<ValueSet> {
        match self {
            ValueSet::Interval {
                data_type,
                interval,
            } => {
                if interval.is_empty() {
                    return Ok(self.clone());
                }
                let v = right.to_i64();
                let si = StridedInterval::create(
                    interval.stride(),
                    interval.low().saturating_add(v),
                    interval.high().saturating_add(v),
                )?;
                Ok(ValueSet::interval(*data_type, si))
            }
            ValueSet::Concrete { .. } => Err(self.not_supported("add_constant")),
        }
    }

    /// Masks every member with `right`.
    ///
    /// For an interval the result is `[0, right]` with stride 1, whatever the input.
    ///
    /// # Errors
    ///
    /// [`Error::NotSupported`] for concrete sets; [`Error::InvalidArgument`] for a mask that
    /// is negative as a 64-bit integer.
    pub fn and(&self, right: &Constant) -> Result<ValueSet> {
        match self {
            ValueSet::Interval {
                data_type,
                interval,
            } => {
                if interval.is_empty() {
                    return Ok(self.clone());
                }
                let si = StridedInterval::create(1, 0, right.to_i64())?;
                Ok(ValueSet::interval(*data_type, si))
            }
            ValueSet::Concrete { .. } => Err(self.not_supported("and")),
        }
    }

    /// Multiplies every member by `right`.
    ///
    /// A negative factor swaps the bounds of an interval.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if the resulting stride does not fit 32 bits.
    pub fn imul(&self, right: &Constant) -> Result<ValueSet> {
        match self {
            ValueSet::Interval {
                data_type,
                interval,
            } => {
                if interval.is_empty() {
                    return Ok(self.clone());
                }
                let v = right.to_i64();
                let stride = i64::from(interval.stride()).saturating_mul(v.saturating_abs());
                let stride = i32::try_from(stride).map_err(|_| {
                    Error::InvalidArgument(format!("stride {stride} does not fit 32 bits"))
                })?;
                let a = interval.low().saturating_mul(v);
                let b = interval.high().saturating_mul(v);
                let si = StridedInterval::create(stride, a.min(b), a.max(b))?;
                Ok(ValueSet::interval(*data_type, si))
            }
            ValueSet::Concrete { data_type, values } => {
                let values = values
                    .iter()
                    .map(|v| BinaryOp::IMul.apply_constants(v, right))
                    .collect::<Result<Vec<_>>>()?;
                Ok(ValueSet::concrete(*data_type, values))
            }
        }
    }

    /// Shifts every member left by `right` bits.
    ///
    /// # Errors
    ///
    /// [`Error::NotSupported`] for concrete sets; [`Error::InvalidArgument`] for a shift
    /// amount outside `0..=62` or a stride that overflows 32 bits.
    pub fn shl(&self, right: &Constant) -> Result<ValueSet> {
        match self {
            ValueSet::Interval {
                data_type,
                interval,
            } => {
                if interval.is_empty() {
                    return Ok(self.clone());
                }
                let amount = right.to_i64();
                if !(0..=62).contains(&amount) {
                    return Err(Error::InvalidArgument(format!(
                        "shift amount {amount} is out of range"
                    )));
                }
                let factor = 1i64 << amount;
                let stride = i32::try_from(i64::from(interval.stride()).saturating_mul(factor))
                    .map_err(|_| {
                        Error::InvalidArgument(format!("stride overflow shifting by {amount}"))
                    })?;
                let si = StridedInterval::create(
                    stride,
                    interval.low().saturating_mul(factor),
                    interval.high().saturating_mul(factor),
                )?;
                Ok(ValueSet::interval(*data_type, si))
            }
            ValueSet::Concrete { .. } => Err(self.not_supported("shl")),
        }
    }

    /// Sign-extends every member from the set's width to `data_type`.
    ///
    /// # Errors
    ///
    /// [`Error::NotSupported`] for interval sets.
    pub fn sign_extend(&self, data_type: DataType) -> Result<ValueSet> {
        match self {
            ValueSet::Interval { .. } => Err(self.not_supported("sign_extend")),
            ValueSet::Concrete {
                data_type: from,
                values,
            } => {
                let bits = from.bit_size();
                let values = values
                    .iter()
                    .map(|v| {
                        if v.is_valid() {
                            Constant::new(data_type, sign_extend(v.to_u64(), bits))
                        } else {
                            *v
                        }
                    })
                    .collect();
                Ok(ValueSet::concrete(data_type, values))
            }
        }
    }

    /// Truncates every member to the width of `data_type`.
    ///
    /// A singleton interval stays exact. Any other interval widens to every value of
    /// `data_type`, `[0, mask]` with stride 1.
    ///
    /// # Errors
    ///
    /// Never fails for the current representations.
    pub fn truncate(&self, data_type: DataType) -> Result<ValueSet> {
        match self {
            ValueSet::Interval { interval, .. } => {
                if interval.is_empty() {
                    return Ok(self.clone());
                }
                let si = if interval.is_singleton() {
                    StridedInterval::constant(&Constant::create(data_type, interval.low()))
                } else {
                    let mask = i64::try_from(data_type.mask()).unwrap_or(i64::MAX);
                    StridedInterval::create(1, 0, mask)?
                };
                Ok(ValueSet::interval(data_type, si))
            }
            ValueSet::Concrete { values, .. } => {
                let values = values
                    .iter()
                    .map(|v| {
                        if v.is_valid() {
                            Constant::new(data_type, v.to_u64())
                        } else {
                            *v
                        }
                    })
                    .collect();
                Ok(ValueSet::concrete(data_type, values))
            }
        }
    }
}

impl fmt::Display for ValueSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueSet::Interval { interval, .. } => write!(f, "{interval}"),
            ValueSet::Concrete { values, .. } => {
                f.write_str("[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Iterator over the members of a [`ValueSet`], see [`ValueSet::values`].
#[derive(Debug, Clone)]
pub struct Values<'a>(ValuesInner<'a>);

#[derive(Debug, Clone)]
enum ValuesInner<'a> {
    Strided {
        data_type: DataType,
        next: Option<i64>,
        stride: i64,
        high: i64,
    },
    Listed(std::slice::Iter<'a, Constant>),
}

impl Iterator for Values<'_> {
    type Item = Constant;

    fn next(&mut self) -> Option<Constant> {
        match &mut self.0 {
            ValuesInner::Strided {
                data_type,
                next,
                stride,
                high,
            } => {
                let current = (*next)?;
                *next = if *stride == 0 || current >= *high {
                    None
                } else {
                    current.checked_add(*stride).filter(|v| *v <= *high)
                };
                Some(Constant::create(*data_type, current))
            }
            ValuesInner::Listed(iter) => iter.next().copied(),
        }
    }
}
