//! The bounded structural repair fixpoint.
//!
//! Later passes assume a handful of structural guarantees the raw block
//! graph does not provide: every loop header has exactly one back edge, loop
//! exit edges land on dedicated blocks, and methods have either one return
//! site per predecessor (non-void) or a single merged return block (void).
//! Each repair edits the graph, which invalidates the cached dominator and
//! loop data, so the whole analysis is recomputed and the repairs are
//! re-applied until nothing changes. The iteration count is bounded; a graph
//! still changing after [`REPAIR_LIMIT`] rounds is reported as an error
//! rather than looping forever.

use std::collections::HashMap;

use crate::{
    cfg::{builder, dominators, loops, BlockFlags, BlockId, EdgeKind},
    ir::{InsnFlags, MethodBody, Opcode},
    Error, Result,
};

/// Maximum number of repair rounds before giving up on a method.
pub const REPAIR_LIMIT: usize = 100;

/// Runs the repair fixpoint: recompute dominators, exits and loops, apply
/// the structural repairs, and iterate until the graph is stable.
///
/// # Errors
///
/// - [`Error::RepairLimit`] if the graph has not stabilized after
///   [`REPAIR_LIMIT`] rounds
/// - analysis errors propagated from the dominator computation
pub fn run(body: &mut MethodBody) -> Result<()> {
    for _ in 0..REPAIR_LIMIT {
        dominators::compute(body)?;
        builder::mark_exits(body);
        loops::detect(body)?;

        if fix_multi_backedge(body)
            || fix_loop_exits(body)?
            || split_return(body)?
            || merge_void_exits(body)?
        {
            continue;
        }
        return Ok(());
    }
    Err(Error::RepairLimit(REPAIR_LIMIT))
}

/// Gives a loop header with more than one back edge a synthetic pre-tail
/// block that absorbs all back edges and falls through to the header.
///
/// After this the header has a single back edge again, which is what the
/// region-shaping consumers downstream expect.
fn fix_multi_backedge(body: &mut MethodBody) -> bool {
    let mut headers: Vec<BlockId> = Vec::new();
    let mut tails: HashMap<BlockId, Vec<BlockId>> = HashMap::new();
    for info in &body.loops {
        if !headers.contains(&info.header) {
            headers.push(info.header);
        }
        tails.entry(info.header).or_default().push(info.tail);
    }

    for header in headers {
        let Some(tails) = tails.get(&header) else {
            continue;
        };
        if tails.len() < 2 {
            continue;
        }
        let merged = body.add_synthetic_block();
        for &tail in tails {
            body.remove_edge(tail, header);
            body.add_edge(tail, merged, EdgeKind::Normal);
        }
        body.add_edge(merged, header, EdgeKind::Normal);
        return true;
    }
    false
}

/// Inserts a synthetic block on every exit edge of a multi-exit loop whose
/// target is not already synthetic.
fn fix_loop_exits(body: &mut MethodBody) -> Result<bool> {
    let loops = body.loops.clone();
    for info in loops {
        if info.exit_edges.len() < 2 {
            continue;
        }
        let mut changed = false;
        for (from, to) in info.exit_edges {
            if body.block(to).is_synthetic() {
                continue;
            }
            body.insert_block_on_edge(from, to)?;
            changed = true;
        }
        if changed {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Splits the single shared return of a non-void method into one synthetic
/// return block per predecessor.
///
/// The clone of the return instruction keeps its SSA binding, so the
/// returned variable gains one registered use per copy.
fn split_return(body: &mut MethodBody) -> Result<bool> {
    if body.ret_type.is_none() {
        return Ok(false);
    }
    let exits = body.exit_blocks();
    let [exit] = exits[..] else {
        return Ok(false);
    };
    let block = body.block(exit);
    if block.insns.len() != 1 || block.preds.len() < 2 {
        return Ok(false);
    }
    let ret_id = block.insns[0];
    if body.insn(ret_id).opcode != Opcode::Return {
        return Ok(false);
    }

    let mut template = body.insn(ret_id).clone();
    template.flags |= InsnFlags::SYNTHETIC;
    template.jump_targets.clear();
    let ret_var = template
        .args
        .first()
        .and_then(|a| a.as_reg())
        .and_then(|r| r.var);

    for pred in block.preds.clone() {
        let cloned = body.add_insn(template.clone());
        if let Some(var) = ret_var {
            body.var_mut(var).add_use(cloned);
        }
        let copy = body.add_synthetic_block();
        body.push_insn(copy, cloned);
        body.block_mut(copy).flags |= BlockFlags::EXIT;
        body.remove_edge(pred, exit);
        body.add_edge(pred, copy, EdgeKind::Normal);
    }

    body.remove_insn(exit, ret_id)?;
    body.remove_block(exit);
    Ok(true)
}

/// Merges the value-less return blocks of a void method into one.
///
/// Only single-predecessor blocks holding nothing but the return are
/// candidates; everything else keeps its own exit.
fn merge_void_exits(body: &mut MethodBody) -> Result<bool> {
    if body.ret_type.is_some() {
        return Ok(false);
    }
    let candidates: Vec<BlockId> = body
        .exit_blocks()
        .into_iter()
        .filter(|&id| {
            let block = body.block(id);
            block.insns.len() == 1 && block.preds.len() == 1 && {
                let insn = body.insn(block.insns[0]);
                insn.opcode == Opcode::Return && insn.args.is_empty()
            }
        })
        .collect();
    if candidates.len() < 2 {
        return Ok(false);
    }

    let keep = candidates[0];
    for &id in &candidates[1..] {
        for pred in body.block(id).preds.clone() {
            body.remove_edge(pred, id);
            // A predecessor already branching to the kept exit must keep
            // both outcomes distinct; the duplicate edge is routed through
            // a synthetic block since the edge lists hold no parallels.
            if body.block(pred).successors().any(|s| s == keep) {
                let mid = body.add_synthetic_block();
                body.add_edge(pred, mid, EdgeKind::Normal);
                body.add_edge(mid, keep, EdgeKind::Normal);
            } else {
                body.add_edge(pred, keep, EdgeKind::Normal);
            }
        }
        let ret = body.block(id).insns[0];
        body.remove_insn(id, ret)?;
        body.remove_block(id);
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{ArgType, InsnArg, InsnNode, JumpRecord, RawMethod};

    fn insn(opcode: Opcode) -> Option<InsnNode> {
        Some(InsnNode::new(opcode, vec![]))
    }

    fn graph(n: usize, edges: &[(u32, u32)]) -> MethodBody {
        let mut body = MethodBody::new();
        let blocks: Vec<BlockId> = (0..n).map(|_| body.add_block(None)).collect();
        body.set_entry(blocks[0]);
        for &(from, to) in edges {
            body.add_edge(blocks[from as usize], blocks[to as usize], EdgeKind::Normal);
        }
        body
    }

    #[test]
    fn test_stable_graph_converges_immediately() {
        let mut body = graph(3, &[(0, 1), (1, 2)]);
        run(&mut body).unwrap();
        assert!(body.analysis_valid());
    }

    #[test]
    fn test_multi_backedge_header_gets_merge_block() {
        // Both 2 -> 1 and 3 -> 1 are back edges into header 1.
        let mut body = graph(5, &[(0, 1), (1, 2), (1, 3), (2, 1), (3, 1), (3, 4)]);
        run(&mut body).unwrap();

        // A single synthetic tail now carries the only back edge.
        assert_eq!(body.loops.len(), 1);
        let info = &body.loops[0];
        assert_eq!(info.header, BlockId(1));
        assert!(body.block(info.tail).is_synthetic());
        assert_eq!(
            body.block(BlockId(1))
                .preds
                .iter()
                .filter(|&&p| p != BlockId(0))
                .count(),
            1
        );
    }

    #[test]
    fn test_multi_exit_loop_gets_synthetic_exit_targets() {
        let mut body = graph(5, &[(0, 1), (1, 2), (2, 1), (1, 3), (2, 4)]);
        run(&mut body).unwrap();

        assert_eq!(body.loops.len(), 1);
        let info = &body.loops[0];
        assert!(info.exit_edges.len() >= 2);
        for &(_, target) in &info.exit_edges {
            assert!(body.block(target).is_synthetic());
        }
    }

    #[test]
    fn test_shared_return_split_per_predecessor() {
        // if -> 2; goto -> 3; nop; return r0
        let raw = RawMethod {
            instructions: vec![
                Some(InsnNode::new(Opcode::If, vec![InsnArg::reg(0)])),
                insn(Opcode::Goto),
                insn(Opcode::Nop),
                Some(InsnNode::new(Opcode::Return, vec![InsnArg::reg(0)])),
            ],
            jumps: vec![JumpRecord::new(0, 2), JumpRecord::new(1, 3)],
            try_ranges: vec![],
            ret_type: Some(ArgType::Int),
        };
        let mut body = crate::cfg::build(&raw).unwrap();
        run(&mut body).unwrap();

        let exits = body.exit_blocks();
        assert_eq!(exits.len(), 2);
        for exit in exits {
            let block = body.block(exit);
            assert!(block.is_synthetic());
            assert_eq!(block.insns.len(), 1);
            let ret = body.insn(block.insns[0]);
            assert_eq!(ret.opcode, Opcode::Return);
            assert!(ret.flags.contains(InsnFlags::SYNTHETIC));
        }
    }

    #[test]
    fn test_split_return_registers_cloned_uses() {
        let raw = RawMethod {
            instructions: vec![
                Some(InsnNode::new(Opcode::If, vec![InsnArg::reg(0)])),
                insn(Opcode::Goto),
                insn(Opcode::Nop),
                Some(InsnNode::new(Opcode::Return, vec![InsnArg::reg(0)])),
            ],
            jumps: vec![JumpRecord::new(0, 2), JumpRecord::new(1, 3)],
            try_ranges: vec![],
            ret_type: Some(ArgType::Int),
        };
        let mut body = crate::cfg::build(&raw).unwrap();

        // Bind the returned register to an SSA variable before repair.
        let var = body.new_var(0, 0);
        let index = body.offset_index();
        let (_, ret_insn) = index[&3];
        body.bind_use(ret_insn, 0, var).unwrap();
        assert_eq!(body.var(var).use_count(), 1);

        run(&mut body).unwrap();

        // One use per cloned return; the original's use is unregistered.
        assert_eq!(body.var(var).use_count(), 2);
        for &use_insn in body.var(var).uses() {
            assert!(!body.insn(use_insn).is_removed());
        }
    }

    #[test]
    fn test_void_returns_merged() {
        // if -> 2; return; return
        let raw = RawMethod {
            instructions: vec![
                Some(InsnNode::new(Opcode::If, vec![InsnArg::reg(0)])),
                insn(Opcode::Return),
                insn(Opcode::Return),
            ],
            jumps: vec![JumpRecord::new(0, 2)],
            try_ranges: vec![],
            ret_type: None,
        };
        let mut body = crate::cfg::build(&raw).unwrap();
        run(&mut body).unwrap();

        let exits = body.exit_blocks();
        assert_eq!(exits.len(), 1);
        assert_eq!(body.block(exits[0]).preds.len(), 2);

        // The conditional branch keeps two distinct successors; the
        // duplicate path into the merged exit runs through a synthetic
        // block.
        let entry = body.entry().unwrap();
        assert_eq!(body.block(entry).succs.len(), 2);
        assert!(body
            .block(exits[0])
            .preds
            .iter()
            .any(|&p| body.block(p).is_synthetic()));
    }
}
