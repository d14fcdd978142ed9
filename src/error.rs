use thiserror::Error;

use crate::metadata::token::Token;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// This enum covers every failure mode of layout computation and of the supporting type
/// registry. Layout faults are scoped to the type whose computation triggered them; they
/// never invalidate results already cached on other types.
///
/// # Error Categories
///
/// ## Layout Faults
/// - [`Error::LayoutCycle`] - A layout computation re-entered itself through a containment chain
/// - [`Error::InvalidExplicitLayout`] - An explicitly placed field violates the type's bounds
/// - [`Error::UnsupportedPacking`] - A packing directive is not representable
/// - [`Error::IndeterminateSize`] - A concrete size/offset was demanded where none exists yet
/// - [`Error::NotFloatAggregate`] - HFA element query on a type without the HFA classification
///
/// ## Type System Errors
/// - [`Error::TypeInsert`] - Failed to register new type in the registry
/// - [`Error::TypeNotFound`] - Requested type not found in the registry
/// - [`Error::TypeMissingParent`] - A weak base/field-type reference has been dropped
///
/// ## Infrastructure Errors
/// - [`Error::LockError`] - Thread synchronization failure
/// - [`Error::Malformed`] - Inconsistent input metadata
#[derive(Error, Debug)]
pub enum Error {
    /// A type's layout computation re-entered itself.
    ///
    /// Raised when a value type inlines itself through a field chain, or when any of the
    /// memoized layout queries (instance layout, shape, GC containment) recurses back into
    /// the type it started from. The in-progress marker on the per-type memo cell converts
    /// what would be unbounded recursion into this fault.
    ///
    /// The associated [`Token`] identifies the type at which the cycle was detected.
    #[error("Layout computation re-entered itself at type {0}")]
    LayoutCycle(Token),

    /// An explicitly placed field violates the declared bounds of its type.
    ///
    /// Raised for explicit-layout types when a field carries no declared offset, or when a
    /// field's extent (offset plus size) falls outside the type's declared class size.
    /// Overlapping fields are *not* an error for explicit layout; only out-of-bounds
    /// extents and missing offsets are.
    #[error("Invalid explicit layout on type {token}: {message}")]
    InvalidExplicitLayout {
        /// The type carrying the invalid explicit layout
        token: Token,
        /// What exactly was violated
        message: String,
    },

    /// A packing directive cannot be honored.
    ///
    /// Packing must be 0 (unset, runtime default) or a power of two no larger than 128,
    /// mirroring the runtime's ClassLayout constraints.
    #[error("Unsupported packing {packing} on type {token} - must be 0 or a power of 2 up to 128")]
    UnsupportedPacking {
        /// The type carrying the packing directive
        token: Token,
        /// The rejected packing value
        packing: u16,
    },

    /// A concrete size or offset was requested for a type whose size is indeterminate.
    ///
    /// Types flowing through unresolved generic sharing have no concrete magnitude yet.
    /// Sizes-only requests report this as a normal partial result; only contexts that
    /// *require* a concrete number (field offsets past an indeterminate field, for
    /// example) raise this fault.
    #[error("Type {0} has an indeterminate size in a context requiring a concrete one")]
    IndeterminateSize(Token),

    /// The homogeneous-float-aggregate element type was queried on a non-HFA type.
    ///
    /// `hfa_element_type` is defined only when the type's shape characteristics carry the
    /// HFA flag; calling it otherwise is a precondition violation by the caller.
    #[error("Type {0} is not a homogeneous float aggregate")]
    NotFloatAggregate(Token),

    /// The parent of the current type is missing.
    ///
    /// A weak reference to a base type or a field's declared type could not be upgraded
    /// because the referenced type has been dropped. The layout engine never owns type
    /// identity, so a dropped referent is a lifecycle error in the embedding type system.
    #[error("A type referenced from {0} has been dropped")]
    TypeMissingParent(Token),

    /// Failed to find type in the registry.
    ///
    /// The associated [`Token`] identifies which type was not found.
    #[error("Failed to find type in TypeRegistry - {0}")]
    TypeNotFound(Token),

    /// Failed to insert new type into the registry.
    ///
    /// Typically caused by a conflicting metadata token.
    ///
    /// The associated [`Token`] identifies which type caused the failure.
    #[error("Failed to insert new type into TypeRegistry - {0}")]
    TypeInsert(Token),

    /// Recursion limit reached.
    ///
    /// To prevent stack overflow or unbounded iteration over malformed inheritance
    /// chains, a maximum depth is enforced. Well-formed input never reaches it.
    ///
    /// The associated value shows the limit that was reached.
    #[error("Reached the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),

    /// Failed to lock target.
    ///
    /// This error occurs when thread synchronization fails, typically when a memo cell's
    /// mutex has been poisoned by a panicking computation.
    #[error("Failed to lock target")]
    LockError,

    /// The input metadata is inconsistent.
    ///
    /// Used for validation failures that do not fit a more specific layout fault, such as
    /// a field declared with type `void`. The error includes the source location where the
    /// malformation was detected for debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },
}
