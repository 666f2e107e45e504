//! Redundant-move elimination and single-use expression-tree inlining.
//!
//! Tree inlining wraps a definition into its only use site, turning
//! `v2 = v0 + v1; return v2` into `return v0 + v1`. Moving a definition
//! forward past other instructions is only legal when none of them assigns
//! a register the definition reads; constant producers are always safe to
//! pass. Cross-block wraps additionally require a dominating path, the
//! definition sitting last in its block, and interference-free paths and
//! use-block prefix.

use std::collections::HashSet;

use crate::{
    cfg::{dominators, BlockId},
    expr::owning_block,
    ir::{InsnArg, InsnFlags, InsnId, MethodBody, Opcode, VarId},
    Result,
};

/// Erases redundant `Move` instructions.
///
/// A move collapses unconditionally when source and destination belong to
/// the same code variable (the copy is invisible in the emitted source).
/// Otherwise it collapses only when every use of the destination sits after
/// the move in the same block and none of them is a phi join, in which case
/// the uses are rebound to the source variable directly.
///
/// # Errors
///
/// Propagates consistency errors from instruction removal.
pub fn eliminate_moves(body: &mut MethodBody) -> Result<bool> {
    let mut changed = false;
    for block in body.block_ids().collect::<Vec<_>>() {
        for insn in body.block(block).insns.clone() {
            let node = body.insn(insn);
            if node.opcode != Opcode::Move
                || node.is_removed()
                || node.flags.contains(InsnFlags::DONT_INLINE)
            {
                continue;
            }
            let Some(src) = node.args.first().and_then(|a| a.as_reg()) else {
                continue;
            };
            let (src_reg, Some(src_var)) = (src.reg, src.var) else {
                continue;
            };
            let Some(dst_var) = node.result.as_ref().and_then(|r| r.var) else {
                continue;
            };

            let same_storage = match (body.var(src_var).code_var, body.var(dst_var).code_var)
            {
                (Some(a), Some(b)) => a == b,
                _ => false,
            };
            if same_storage || uses_confined_after(body, block, insn, dst_var) {
                rebind_uses(body, dst_var, src_var, src_reg);
                body.remove_insn(block, insn)?;
                changed = true;
            }
        }
    }
    Ok(changed)
}

/// Returns `true` if every use of `var` sits after `mv` in `block` and none
/// of them is a phi join.
fn uses_confined_after(body: &MethodBody, block: BlockId, mv: InsnId, var: VarId) -> bool {
    let insns = &body.block(block).insns;
    let Some(position) = insns.iter().position(|&i| i == mv) else {
        return false;
    };
    body.var(var).uses().iter().all(|&use_insn| {
        body.insn(use_insn).opcode != Opcode::Phi
            && insns
                .iter()
                .position(|&i| i == use_insn)
                .is_some_and(|p| p > position)
    })
}

/// Rewrites every use of `from` to read `to` instead.
fn rebind_uses(body: &mut MethodBody, from: VarId, to: VarId, to_reg: u16) {
    let uses = body.var(from).uses().to_vec();
    for use_insn in uses {
        for arg in &mut body.insn_mut(use_insn).args {
            if let InsnArg::Reg(reg) = arg {
                if reg.var == Some(from) {
                    reg.var = Some(to);
                    reg.reg = to_reg;
                }
            }
        }
        body.var_mut(to).add_use(use_insn);
    }
    body.var_mut(from).clear_uses();
}

/// Runs single-use tree inlining per block to a local fixpoint, then
/// collapses leftover moves that wrap a sub-expression.
///
/// # Errors
///
/// Propagates consistency errors from the graph edit API.
pub fn inline_trees(body: &mut MethodBody) -> Result<bool> {
    let mut changed = false;
    for block in body.block_ids().collect::<Vec<_>>() {
        while apply_one_wrap(body, block)? {
            changed = true;
        }
        changed |= promote_wrapped_moves(body, block)?;
    }
    Ok(changed)
}

/// Finds and applies the latest legal wrap in a block.
///
/// Instructions and their argument slots are walked in reverse so the
/// deepest pending use is wrapped first and nested wraps compose bottom-up.
/// Returns `true` if a wrap was applied; positions shift on every edit, so
/// the caller rescans.
fn apply_one_wrap(body: &mut MethodBody, block: BlockId) -> Result<bool> {
    let insns = body.block(block).insns.clone();
    for &use_insn in insns.iter().rev() {
        if body.insn(use_insn).opcode == Opcode::Phi {
            continue;
        }
        for index in (0..body.insn(use_insn).args.len()).rev() {
            let InsnArg::Reg(reg) = &body.insn(use_insn).args[index] else {
                continue;
            };
            let Some(var) = reg.var else {
                continue;
            };
            let Some(def) = body.var(var).def() else {
                continue;
            };
            if def == use_insn {
                continue;
            }
            // A constructed object's receiver slot reads its own
            // definition; that self-use does not count against single-use
            // inlining.
            let external_uses = body
                .var(var)
                .uses()
                .iter()
                .filter(|&&u| u != def)
                .count();
            if external_uses != 1 {
                continue;
            }
            let def_node = body.insn(def);
            if def_node.is_removed()
                || def_node
                    .flags
                    .intersects(InsnFlags::WRAPPED | InsnFlags::DONT_INLINE)
                || !wrappable(def_node.opcode)
            {
                continue;
            }
            let Some(def_block) = owning_block(body, def) else {
                continue;
            };

            let legal = if def_block == block {
                same_block_safe(body, block, def, use_insn)
            } else {
                cross_block_safe(body, def_block, def, block, use_insn)
            };
            if legal {
                body.detach_for_wrap(def_block, def)?;
                body.var_mut(var).remove_use(use_insn);
                body.insn_mut(use_insn).args[index] = InsnArg::Wrapped(def);
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// Opcodes that may become sub-expressions.
fn wrappable(opcode: Opcode) -> bool {
    matches!(
        opcode,
        Opcode::Const
            | Opcode::Move
            | Opcode::Arith(_)
            | Opcode::Cmp
            | Opcode::Invoke(_)
            | Opcode::Construct
            | Opcode::ArrayLength
    )
}

/// Checks that every instruction between the definition and its use in one
/// block is reorder-safe with respect to the definition's reads.
fn same_block_safe(body: &MethodBody, block: BlockId, def: InsnId, use_insn: InsnId) -> bool {
    let insns = &body.block(block).insns;
    let (Some(def_pos), Some(use_pos)) = (
        insns.iter().position(|&i| i == def),
        insns.iter().position(|&i| i == use_insn),
    ) else {
        return false;
    };
    if def_pos >= use_pos {
        return false;
    }
    let mut reads = HashSet::new();
    collect_reads(body, def, &mut reads);
    insns[def_pos + 1..use_pos]
        .iter()
        .all(|&mid| reorder_safe(body, mid, &reads))
}

/// Checks the cross-block wrap conditions: a dominating path, the
/// definition last in its block, and no interfering writes on any path
/// between the blocks or in the use block's prefix.
fn cross_block_safe(
    body: &MethodBody,
    def_block: BlockId,
    def: InsnId,
    use_block: BlockId,
    use_insn: InsnId,
) -> bool {
    if !dominators::dominates(body, def_block, use_block) {
        return false;
    }
    if body.block(def_block).last_insn() != Some(def) {
        return false;
    }
    let mut reads = HashSet::new();
    collect_reads(body, def, &mut reads);

    let forward = forward_reachable(body, def_block);
    let backward = backward_reachable(body, use_block);
    for mid in body.block_ids() {
        if mid == def_block || mid == use_block {
            continue;
        }
        if forward[mid.index()] && backward[mid.index()] {
            let clean = body
                .block(mid)
                .insns
                .iter()
                .all(|&i| reorder_safe(body, i, &reads));
            if !clean {
                return false;
            }
        }
    }

    let insns = &body.block(use_block).insns;
    let Some(use_pos) = insns.iter().position(|&i| i == use_insn) else {
        return false;
    };
    insns[..use_pos]
        .iter()
        .all(|&i| reorder_safe(body, i, &reads))
}

/// Collects the registers an instruction reads, recursing through wrapped
/// sub-expressions.
fn collect_reads(body: &MethodBody, insn: InsnId, out: &mut HashSet<u16>) {
    for arg in &body.insn(insn).args {
        match arg {
            InsnArg::Reg(reg) => {
                out.insert(reg.reg);
            }
            InsnArg::Wrapped(child) => collect_reads(body, *child, out),
            InsnArg::Lit(_) => {}
        }
    }
}

/// Returns `true` if moving a definition reading `reads` past `insn` keeps
/// its value unchanged.
fn reorder_safe(body: &MethodBody, insn: InsnId, reads: &HashSet<u16>) -> bool {
    let node = body.insn(insn);
    if node.is_removed() || node.opcode.is_const_producer() {
        return true;
    }
    node.result.as_ref().is_none_or(|r| !reads.contains(&r.reg))
}

/// Marks blocks reachable from `start` by forward edges.
fn forward_reachable(body: &MethodBody, start: BlockId) -> Vec<bool> {
    let mut seen = vec![false; body.block_count()];
    let mut worklist: Vec<BlockId> = body.block(start).successors().collect();
    while let Some(block) = worklist.pop() {
        if seen[block.index()] {
            continue;
        }
        seen[block.index()] = true;
        worklist.extend(body.block(block).successors());
    }
    seen
}

/// Marks blocks that can reach `end` by forward edges.
fn backward_reachable(body: &MethodBody, end: BlockId) -> Vec<bool> {
    let mut seen = vec![false; body.block_count()];
    let mut worklist = body.block(end).preds.clone();
    while let Some(block) = worklist.pop() {
        if seen[block.index()] {
            continue;
        }
        seen[block.index()] = true;
        worklist.extend(body.block(block).preds.iter().copied());
    }
    seen
}

/// Promotes moves that ended up wrapping a sub-expression.
///
/// A `Move` in the block list whose single argument is a wrapped
/// instruction is replaced by that instruction, which inherits the move's
/// result binding and catch attribute. Wrapped moves nested inside argument
/// slots collapse the same way.
fn promote_wrapped_moves(body: &mut MethodBody, block: BlockId) -> Result<bool> {
    let mut changed = false;
    for position in 0..body.block(block).insns.len() {
        let insn = body.block(block).insns[position];
        changed |= collapse_wrapped_moves(body, insn);

        let node = body.insn(insn);
        if node.opcode != Opcode::Move || node.flags.contains(InsnFlags::DONT_INLINE) {
            continue;
        }
        let Some(InsnArg::Wrapped(inner)) = node.args.first() else {
            continue;
        };
        let inner = *inner;
        let result = node.result.clone();
        let catch = node.catch;

        body.insn_mut(inner).flags.remove(InsnFlags::WRAPPED);
        body.insn_mut(inner).result = result.clone();
        if body.insn(inner).catch.is_none() {
            body.insn_mut(inner).catch = catch;
        }
        if let Some(var) = result.and_then(|r| r.var) {
            body.var_mut(var).set_def(Some(inner));
        }
        body.block_mut(block).insns[position] = inner;
        body.insn_mut(insn).flags |= InsnFlags::REMOVED;
        changed = true;
    }
    Ok(changed)
}

/// Collapses `Wrapped(Move(Wrapped(x)))` argument chains into `Wrapped(x)`.
fn collapse_wrapped_moves(body: &mut MethodBody, parent: InsnId) -> bool {
    let mut changed = false;
    for index in 0..body.insn(parent).args.len() {
        let InsnArg::Wrapped(child) = body.insn(parent).args[index] else {
            continue;
        };
        changed |= collapse_wrapped_moves(body, child);
        let child_node = body.insn(child);
        if child_node.opcode == Opcode::Move && !child_node.flags.contains(InsnFlags::DONT_INLINE)
        {
            if let Some(InsnArg::Wrapped(inner)) = child_node.args.first() {
                let inner = *inner;
                body.insn_mut(parent).args[index] = InsnArg::Wrapped(inner);
                body.insn_mut(child).flags |= InsnFlags::REMOVED;
                changed = true;
            }
        }
    }
    changed
}
