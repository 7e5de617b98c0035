use thiserror::Error;

macro_rules! unsupported_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Unsupported {
            construct: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Unsupported {
            construct: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// The slicer distinguishes three kinds of failure. Running into a construct outside the
/// modelled sublanguage is an [`Error::Unsupported`]; it is fatal to the current slice and
/// callers are expected to catch it per indirect jump. Asking a [`ValueSet`](crate::analysis::ValueSet)
/// for an operation its representation does not implement is an [`Error::NotSupported`].
/// Constructing an impossible interval is an [`Error::InvalidArgument`].
///
/// "No jump table here" is not an error at all: [`BackwardSlicer::start`](crate::analysis::BackwardSlicer::start)
/// and [`BackwardSlicer::step`](crate::analysis::BackwardSlicer::step) report it by returning `false`.
///
/// # Examples
///
/// ```rust
/// use backwalk::{analysis::StridedInterval, Error};
///
/// match StridedInterval::create(1, 10, 0) {
///     Err(Error::InvalidArgument(message)) => println!("rejected: {message}"),
///     Err(e) => println!("other error: {e}"),
///     Ok(si) => println!("created {si}"),
/// }
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// An expression or instruction kind the slicer or the value-set evaluator does not model.
    ///
    /// Only the narrow address/index arithmetic that appears in jump-table computations is
    /// understood. Anything else fails loudly instead of producing a wrong slice. The error
    /// carries the source location where the construct was rejected.
    ///
    /// # Fields
    ///
    /// * `construct` - Description of the rejected construct
    /// * `file` - Source file where the construct was rejected
    /// * `line` - Source line where the construct was rejected
    #[error("Unsupported - {file}:{line}: {construct}")]
    Unsupported {
        /// The construct that could not be handled
        construct: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A value-set operation is not implemented for the receiving representation.
    ///
    /// Concrete value sets are only produced by memory loads and multiplications, so
    /// operations such as `Shl` are deliberately missing on them.
    #[error("{operation} is not supported on {representation} value sets")]
    NotSupported {
        /// The operation that was requested
        operation: &'static str,
        /// The representation that rejected it
        representation: &'static str,
    },

    /// An argument violated a constructor invariant.
    ///
    /// Raised for strided intervals with a negative stride or inverted bounds, which
    /// indicates a programming error in the caller rather than bad traced data.
    #[error("Invalid argument - {0}")]
    InvalidArgument(String),

    /// An out of bound access was attempted while reading the program image.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,
}
