//! Iterative bit-set dominator computation.
//!
//! Classic dataflow: every block's dominator set starts as "all blocks", the
//! entry's set is restricted to itself, and
//! `dom(b) = {b} ∪ ⋂ dom(pred)` is iterated over reverse postorder until no
//! set changes. Block counts per method are small, so the dense [`BitSet`]
//! representation beats the asymptotically better alternatives in practice
//! and keeps the repair loop simple: every structural edit just recomputes.
//!
//! The immediate dominator of `b` is the unique member of `dom(b) \ {b}`
//! that dominates none of the other members. Zero or more than one candidate
//! means `b` is reachable by no valid path, which is an internal-consistency
//! error rather than a recoverable condition.

use crate::{cfg::BlockId, ir::MethodBody, utils::BitSet, Error, Result};

/// Computes dominator sets and immediate dominators for every live block.
///
/// Also validates reachability: a block the entry cannot reach is reported
/// as [`Error::UnreachableBlock`], never silently dropped.
///
/// # Errors
///
/// - [`Error::Empty`] if the method has no entry block
/// - [`Error::UnreachableBlock`] for blocks without a path from the entry
/// - [`Error::AmbiguousDominator`] if idom reduction fails for a block
pub fn compute(body: &mut MethodBody) -> Result<()> {
    let entry = body.entry().ok_or(Error::Empty)?;

    let reachable = body.reachable_from_entry();
    for id in body.block_ids().collect::<Vec<_>>() {
        if !reachable[id.index()] {
            return Err(Error::UnreachableBlock(id));
        }
    }

    let capacity = body.block_count();
    let order = body.reverse_postorder();

    // Initialize: entry dominates only itself, everything else starts full.
    for &id in &order {
        let doms = if id == entry {
            let mut set = BitSet::new(capacity);
            set.insert(id.index());
            set
        } else {
            BitSet::full(capacity)
        };
        body.block_mut(id).doms = doms;
    }

    let mut scratch = BitSet::new(capacity);
    let mut changed = true;
    while changed {
        changed = false;
        for &id in &order {
            if id == entry {
                continue;
            }
            let preds = body.block(id).preds.clone();
            scratch.fill();
            for pred in preds {
                scratch.intersect_with(&body.block(pred).doms);
            }
            scratch.insert(id.index());
            if scratch != body.block(id).doms {
                body.block_mut(id).doms.copy_from(&scratch);
                changed = true;
            }
        }
    }

    compute_idoms(body, entry, &order)
}

/// Reduces each block's dominator set to its immediate dominator.
fn compute_idoms(body: &mut MethodBody, entry: BlockId, order: &[BlockId]) -> Result<()> {
    for &id in order {
        if id == entry {
            body.block_mut(id).idom = None;
            continue;
        }
        let strict: Vec<usize> = body
            .block(id)
            .doms
            .iter()
            .filter(|&d| d != id.index())
            .collect();

        let mut candidate = None;
        for &c in &strict {
            // The idom dominates none of the other strict dominators.
            let dominates_other = strict
                .iter()
                .any(|&other| other != c && body.blocks_doms_contains(other, c));
            if !dominates_other {
                if candidate.is_some() {
                    return Err(Error::AmbiguousDominator(id));
                }
                candidate = Some(c);
            }
        }

        match candidate {
            Some(c) => {
                body.block_mut(id).idom = Some(BlockId(u32::try_from(c).unwrap_or(u32::MAX)));
            }
            None => return Err(Error::AmbiguousDominator(id)),
        }
    }
    body.set_analysis_valid();
    Ok(())
}

/// Returns `true` if block `a` dominates block `b`.
///
/// Valid only after [`compute`] has run on the current graph shape.
#[must_use]
pub fn dominates(body: &MethodBody, a: BlockId, b: BlockId) -> bool {
    let doms = &body.block(b).doms;
    a.index() < doms.len() && doms.contains(a.index())
}

impl MethodBody {
    /// Returns `true` if the dominator set of the block at arena index
    /// `block` contains the arena index `dom`.
    pub(crate) fn blocks_doms_contains(&self, block: usize, dom: usize) -> bool {
        let doms = &self
            .block(BlockId(u32::try_from(block).unwrap_or(u32::MAX)))
            .doms;
        dom < doms.len() && doms.contains(dom)
    }
}
