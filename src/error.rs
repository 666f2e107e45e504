use thiserror::Error;

use crate::cfg::BlockId;

/// The generic Error type, which provides coverage for all errors this library can
/// potentially return.
///
/// Every error is scoped to the method currently being processed. The batch driver
/// catches method-level failures and records them without aborting the run, so none
/// of these variants ever escapes past a single method boundary.
///
/// # Error Categories
///
/// ## Structural Errors
/// - [`Error::UnreachableBlock`] - A block with no path from the method entry
/// - [`Error::AmbiguousDominator`] - Immediate-dominator reduction did not yield a unique block
/// - [`Error::RepairLimit`] - The CFG repair fixpoint exceeded its iteration bound
///
/// Structural errors indicate degenerate or obfuscated input the engine cannot
/// structure. They are always fatal to the current method only.
///
/// ## Bounded-Recursion Errors
/// - [`Error::RecursionLimit`] - A constant/move chain exceeded the inlining depth bound
/// - [`Error::InlineRetryLimit`] - The expression reconstruction driver kept oscillating
///
/// ## Input Errors
/// - [`Error::Empty`] - A method with no instructions was submitted
/// - [`Error::Malformed`] - Inconsistent input data (bad offsets, dangling references)
///
/// # Examples
///
/// ```rust
/// use regscope::{Error, ir::RawMethod, pipeline, types::TypeHierarchy};
///
/// let types = TypeHierarchy::new();
/// let result = pipeline::process_method(RawMethod::default(), &types);
/// assert!(!result.status.is_ok());
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The submitted method has no instructions.
    #[error("Method contains no instructions")]
    Empty,

    /// A block other than the method entry has no predecessors, or is not reachable
    /// from the entry at all.
    ///
    /// After the CFG repair fixpoint every block must be reachable; a block that is
    /// not indicates broken jump attributes or an internal consistency bug, and the
    /// method is rejected rather than silently dropping code.
    #[error("Block {0} is unreachable from the method entry")]
    UnreachableBlock(BlockId),

    /// Immediate-dominator reduction produced no candidate, or more than one.
    ///
    /// The immediate dominator of a block is the unique strict dominator that
    /// dominates none of the block's other strict dominators. Zero or multiple
    /// candidates indicate a block reachable by no valid path.
    #[error("Block {0} has no unique immediate dominator")]
    AmbiguousDominator(BlockId),

    /// The CFG repair fixpoint did not stabilize within its iteration bound.
    ///
    /// The associated value is the bound that was exceeded.
    #[error("CFG repair did not stabilize within {0} iterations")]
    RepairLimit(usize),

    /// A constant/move inlining chain exceeded the recursion depth bound.
    ///
    /// Pathological chains are converted into this reported error instead of
    /// overflowing the stack. The associated value is the depth bound.
    #[error("Reached the maximum inlining recursion depth allowed - {0}")]
    RecursionLimit(usize),

    /// The expression reconstruction driver exceeded its retry bound without
    /// reaching a fixpoint.
    #[error("Expression reconstruction did not stabilize within {0} passes")]
    InlineRetryLimit(usize),

    /// Inconsistent input or graph state.
    ///
    /// Covers dangling instruction/block/variable references, out-of-range
    /// offsets in jump or try-range records, and similar malformations detected
    /// while editing the method graph.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error was raised
        file: &'static str,
        /// The source line in which this error was raised
        line: u32,
    },
}

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        $crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        $crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

pub(crate) use malformed_error;
