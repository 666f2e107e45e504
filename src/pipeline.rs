//! The per-method pipeline and the parallel batch driver.
//!
//! Each method runs through the stages in a fixed order: CFG construction,
//! exception attachment, structural repair, exception post-processing, the
//! caller-supplied SSA binding step, and finally expression reconstruction.
//! A failure anywhere marks that method failed and is carried in the
//! result; it never aborts the batch.
//!
//! Methods share nothing mutable, so batches are processed in parallel with
//! one method per worker. The type hierarchy is the only shared input and
//! is read-only during processing.

use rayon::prelude::*;

use crate::{
    cfg, exceptions, expr,
    ir::{MethodBody, RawMethod},
    types::TypeHierarchy,
    Result,
};

/// Outcome classification for one processed method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodStatus {
    /// All stages completed.
    Ok,
    /// A stage failed; the message describes the first error.
    Failed(String),
}

impl MethodStatus {
    /// Returns `true` if every stage completed.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, MethodStatus::Ok)
    }
}

/// The per-method result: the (possibly partial) reconstructed body plus
/// the outcome status.
///
/// A failed method still carries whatever the completed stages produced, so
/// callers can render an error marker alongside the partial output instead
/// of dropping the method silently.
#[derive(Debug)]
pub struct MethodResult {
    /// The reconstructed body; `None` only when CFG construction failed.
    pub body: Option<MethodBody>,
    /// The outcome.
    pub status: MethodStatus,
}

/// Processes one method through the full pipeline.
///
/// # Examples
///
/// ```rust
/// use regscope::ir::{InsnNode, Opcode, RawMethod};
/// use regscope::pipeline::process_method;
/// use regscope::types::TypeHierarchy;
///
/// let raw = RawMethod {
///     instructions: vec![Some(InsnNode::new(Opcode::Return, vec![]))],
///     ..RawMethod::default()
/// };
/// let result = process_method(raw, &TypeHierarchy::new());
/// assert!(result.status.is_ok());
/// ```
pub fn process_method(raw: RawMethod, types: &TypeHierarchy) -> MethodResult {
    process_method_with(raw, types, |_| Ok(()))
}

/// Processes one method, invoking `ssa` to bind SSA variables between
/// structural repair and expression reconstruction.
///
/// SSA construction is supplied by the caller; the pipeline only requires
/// that afterwards every register definition has a variable with an
/// accurate use list.
pub fn process_method_with<F>(raw: RawMethod, types: &TypeHierarchy, ssa: F) -> MethodResult
where
    F: FnOnce(&mut MethodBody) -> Result<()>,
{
    let mut body = match cfg::build(&raw) {
        Ok(body) => body,
        Err(err) => {
            return MethodResult {
                body: None,
                status: MethodStatus::Failed(err.to_string()),
            }
        }
    };

    let outcome = run_stages(&mut body, &raw, types, ssa);
    MethodResult {
        body: Some(body),
        status: match outcome {
            Ok(()) => MethodStatus::Ok,
            Err(err) => MethodStatus::Failed(err.to_string()),
        },
    }
}

fn run_stages<F>(
    body: &mut MethodBody,
    raw: &RawMethod,
    types: &TypeHierarchy,
    ssa: F,
) -> Result<()>
where
    F: FnOnce(&mut MethodBody) -> Result<()>,
{
    // Exception edges must exist before the first dominator computation,
    // otherwise handler blocks are flagged unreachable.
    exceptions::attach(body, &raw.try_ranges, types)?;
    cfg::repair::run(body)?;
    exceptions::finish(body, types)?;
    ssa(body)?;
    expr::reconstruct(body)
}

/// Processes a batch of methods across the worker pool.
///
/// Results are returned in input order. A malformed method yields a failed
/// result at its position; the rest of the batch is unaffected.
#[must_use]
pub fn process_batch(methods: Vec<RawMethod>, types: &TypeHierarchy) -> Vec<MethodResult> {
    methods
        .into_par_iter()
        .map(|raw| process_method(raw, types))
        .collect()
}
