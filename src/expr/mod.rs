//! Expression reconstruction over SSA form.
//!
//! Collapses each block's flat three-address instruction list back into
//! nested expression trees. Three cooperating passes run to a method-level
//! fixpoint:
//!
//! - constant inlining substitutes literal definitions at their use sites
//!   and deletes fully substituted definitions
//! - redundant-move elimination erases copies whose value can be read from
//!   the source variable directly
//! - single-use tree inlining wraps a definition into its only use site as a
//!   sub-expression, when reordering it there is provably safe
//!
//! Every removal can unlock further inlining, so the driver re-runs the
//! passes until none of them changes anything, bounded by a fixed retry
//! count.
//!
//! # Pipeline position
//!
//! Runs last, after the repaired graph has exception attributes and every
//! register definition carries an SSA variable with an accurate use list.

mod consts;
mod inline;

use crate::{
    cfg::{dominators, BlockId},
    ir::{InsnId, MethodBody},
    Error, Result,
};

/// Maximum number of whole-method reconstruction rounds.
pub const INLINE_RETRY_LIMIT: usize = 10;

/// Runs expression reconstruction on a method to a fixpoint.
///
/// Re-running this on its own output is a no-op; the passes only report a
/// change when they substituted, rebound or removed something.
///
/// # Errors
///
/// - [`Error::InlineRetryLimit`] if the passes are still finding work after
///   [`INLINE_RETRY_LIMIT`] rounds
/// - [`Error::RecursionLimit`] for pathologically deep constant chains
/// - consistency errors propagated from instruction removal
pub fn reconstruct(body: &mut MethodBody) -> Result<()> {
    if !body.analysis_valid() {
        dominators::compute(body)?;
    }
    for _ in 0..INLINE_RETRY_LIMIT {
        let constants = consts::run(body)?;
        let moves = inline::eliminate_moves(body)?;
        let trees = inline::inline_trees(body)?;
        if !(constants || moves || trees) {
            return Ok(());
        }
    }
    Err(Error::InlineRetryLimit(INLINE_RETRY_LIMIT))
}

/// Finds the block currently listing an instruction.
pub(crate) fn owning_block(body: &MethodBody, insn: InsnId) -> Option<BlockId> {
    body.block_ids()
        .find(|&b| body.block(b).insns.contains(&insn))
}
