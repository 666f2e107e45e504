//! Block splitting and edge wiring.
//!
//! Walks the flat instruction array in offset order and starts a new block
//! whenever the previous instruction terminated one, the current offset is
//! named by a jump attribute (as destination, or the previous offset as
//! source), a do-while shaped back branch targets the block being built, or
//! the instruction opens a try region. Try-region entries get an empty
//! synthetic splitter block inserted ahead of them so exception edges have a
//! stable attachment point distinct from normal fallthrough.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::{
    cfg::{BlockFlags, BlockId, EdgeKind},
    error::malformed_error,
    ir::{InsnFlags, InsnId, MethodBody, Opcode, RawMethod},
    Error, Result,
};

/// Builds the basic-block graph for a raw method.
///
/// On return the method has its blocks, normal edges, entry and exit
/// registration in place. Dominators, loops and the structural repair
/// fixpoint are applied by [`crate::cfg::repair::run`]; exception edges are
/// attached by the exception region builder.
///
/// # Errors
///
/// - [`Error::Empty`] if the method has no instructions
/// - [`Error::Malformed`] for jump records naming offsets without instructions
pub fn build(raw: &RawMethod) -> Result<MethodBody> {
    let mut body = MethodBody::new();
    body.ret_type = raw.ret_type.clone();

    // Ingest instructions, preserving their source offsets.
    let mut insn_at: BTreeMap<u32, InsnId> = BTreeMap::new();
    for (offset, slot) in raw.instructions.iter().enumerate() {
        if let Some(template) = slot {
            let offset = u32::try_from(offset).unwrap_or(u32::MAX);
            let mut insn = template.clone();
            insn.offset = Some(offset);
            let id = body.add_insn(insn);
            insn_at.insert(offset, id);
        }
    }
    if insn_at.is_empty() {
        return Err(Error::Empty);
    }

    // Attach jump attributes to their source instructions.
    let mut jump_dests: HashSet<u32> = HashSet::new();
    let mut jump_sources: HashSet<u32> = HashSet::new();
    for jump in &raw.jumps {
        let source = *insn_at
            .get(&jump.source)
            .ok_or_else(|| malformed_error!("jump source {} has no instruction", jump.source))?;
        if !insn_at.contains_key(&jump.dest) {
            return Err(malformed_error!(
                "jump destination {} has no instruction",
                jump.dest
            ));
        }
        body.insn_mut(source).jump_targets.push(jump.dest);
        jump_sources.insert(jump.source);
        jump_dests.insert(jump.dest);
    }

    // Mark try-region entries; full catch attachment is the exception
    // region builder's job. Handler entry offsets must start their own
    // blocks so exception edges have a block-level target, so they join the
    // split set alongside jump destinations.
    for range in &raw.try_ranges {
        if let Some((_, &first)) = insn_at.range(range.start..range.end).next() {
            body.insn_mut(first).flags |= InsnFlags::TRY_ENTER;
        }
        // Covered code must not share a block with what follows the range,
        // so the first instruction past the end starts a new one.
        if let Some((&after, _)) = insn_at.range(range.end..).next() {
            jump_dests.insert(after);
        }
        for &(offset, _) in &range.handlers {
            jump_dests.insert(offset);
        }
        if let Some(offset) = range.catch_all {
            jump_dests.insert(offset);
        }
    }

    let (ordered, block_of_offset, splitter_of) =
        split_blocks(&mut body, &insn_at, &jump_dests, &jump_sources);

    wire_edges(&mut body, &ordered, &insn_at, &block_of_offset, &splitter_of)?;

    body.set_entry(ordered[0]);
    mark_exits(&mut body);
    Ok(body)
}

/// Splits the offset-ordered instruction stream into blocks.
///
/// Returns the blocks in layout order, the offset-to-block map, and the
/// splitter block inserted ahead of each try-entry block.
fn split_blocks(
    body: &mut MethodBody,
    insn_at: &BTreeMap<u32, InsnId>,
    jump_dests: &HashSet<u32>,
    jump_sources: &HashSet<u32>,
) -> (Vec<BlockId>, HashMap<u32, BlockId>, HashMap<BlockId, BlockId>) {
    let mut ordered: Vec<BlockId> = Vec::new();
    let mut block_of_offset: HashMap<u32, BlockId> = HashMap::new();
    let mut splitter_of: HashMap<BlockId, BlockId> = HashMap::new();
    let mut current: Option<(BlockId, u32)> = None;
    let mut prev: Option<(u32, Opcode)> = None;

    let entries: Vec<(u32, InsnId)> = insn_at.iter().map(|(&o, &i)| (o, i)).collect();
    for (offset, insn_id) in entries {
        let insn = body.insn(insn_id);
        let opcode = insn.opcode;
        let try_enter = insn.flags.contains(InsnFlags::TRY_ENTER);
        let targets = insn.jump_targets.clone();

        let mut start_new = current.is_none();
        if let Some((prev_offset, prev_opcode)) = prev {
            if prev_opcode.is_terminator() || jump_sources.contains(&prev_offset) {
                start_new = true;
            }
        }
        if jump_dests.contains(&offset) {
            start_new = true;
        }
        // Monitor instructions must sit alone at a block start.
        if matches!(opcode, Opcode::MonitorEnter | Opcode::MonitorExit) {
            start_new = true;
        }
        // A do-while shaped conditional branches back into the block that is
        // still being built; the branch must open its own block.
        if !start_new && opcode == Opcode::If {
            if let Some((_, block_start)) = current {
                if targets.iter().any(|&t| t >= block_start && t <= offset) {
                    start_new = true;
                }
            }
        }

        if start_new || try_enter {
            let mut splitter = None;
            if try_enter {
                let block = body.add_synthetic_block();
                ordered.push(block);
                splitter = Some(block);
            }
            let block = body.add_block(Some(offset));
            ordered.push(block);
            if let Some(splitter) = splitter {
                splitter_of.insert(block, splitter);
            }
            current = Some((block, offset));
        }
        if let Some((block, _)) = current {
            body.push_insn(block, insn_id);
            block_of_offset.insert(offset, block);
        }
        prev = Some((offset, opcode));
    }
    (ordered, block_of_offset, splitter_of)
}

/// Wires fallthrough and jump edges between the split blocks.
fn wire_edges(
    body: &mut MethodBody,
    ordered: &[BlockId],
    insn_at: &BTreeMap<u32, InsnId>,
    block_of_offset: &HashMap<u32, BlockId>,
    splitter_of: &HashMap<BlockId, BlockId>,
) -> Result<()> {
    // Fallthrough between layout neighbours. Empty splitter blocks always
    // fall through; monitor blocks get their explicit fallthrough edge here
    // as well since they never branch.
    for window in ordered.windows(2) {
        let (from, to) = (window[0], window[1]);
        let falls = match body.block(from).last_insn() {
            None => true,
            Some(last) => !body.insn(last).opcode.is_no_fallthrough(),
        };
        if falls {
            body.add_edge(from, to, EdgeKind::Normal);
        }
    }

    // Branch edges from the jump attributes. Jumps into a try region are
    // routed through its splitter block so every path enters through it.
    for (&offset, &insn_id) in insn_at {
        let targets = body.insn(insn_id).jump_targets.clone();
        if targets.is_empty() {
            continue;
        }
        let from = *block_of_offset
            .get(&offset)
            .ok_or_else(|| malformed_error!("no block covers offset {offset}"))?;
        for target in targets {
            let to = *block_of_offset
                .get(&target)
                .ok_or_else(|| malformed_error!("no block covers jump target {target}"))?;
            let to = splitter_of.get(&to).copied().unwrap_or(to);
            body.add_edge(from, to, EdgeKind::Normal);
        }
    }
    Ok(())
}

/// Flags every block ending in a return or throw as a method exit.
pub(crate) fn mark_exits(body: &mut MethodBody) {
    for id in body.block_ids().collect::<Vec<_>>() {
        let is_exit = body
            .block(id)
            .last_insn()
            .is_some_and(|last| body.insn(last).opcode.is_exit());
        if is_exit {
            body.block_mut(id).flags |= BlockFlags::EXIT;
        } else {
            body.block_mut(id).flags &= !BlockFlags::EXIT;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{InsnArg, InsnNode, JumpRecord, TryRange};

    fn insn(opcode: Opcode) -> Option<InsnNode> {
        Some(InsnNode::new(opcode, vec![]))
    }

    /// `v0 = const; if -> 3; return; return` with a branch from 1 to 3.
    fn branchy_method() -> RawMethod {
        RawMethod {
            instructions: vec![
                Some(InsnNode::new(Opcode::Const, vec![InsnArg::lit_int(1)]).with_result(0)),
                Some(InsnNode::new(Opcode::If, vec![InsnArg::reg(0)])),
                insn(Opcode::Return),
                insn(Opcode::Return),
            ],
            jumps: vec![JumpRecord::new(1, 3)],
            try_ranges: vec![],
            ret_type: None,
        }
    }

    #[test]
    fn test_empty_method_rejected() {
        assert!(matches!(build(&RawMethod::new()), Err(Error::Empty)));
    }

    #[test]
    fn test_branch_splits_blocks() {
        let body = build(&branchy_method()).unwrap();

        // Blocks: [const, if], [return], [return]
        let live: Vec<_> = body.block_ids().collect();
        assert_eq!(live.len(), 3);

        let entry = body.entry().unwrap();
        assert_eq!(body.block(entry).insns.len(), 2);

        let succs: Vec<_> = body.block(entry).successors().collect();
        assert_eq!(succs.len(), 2);

        assert_eq!(body.exit_blocks().len(), 2);
    }

    #[test]
    fn test_bad_jump_target_rejected() {
        let mut raw = branchy_method();
        raw.jumps = vec![JumpRecord::new(1, 17)];
        assert!(matches!(build(&raw), Err(Error::Malformed { .. })));
    }

    #[test]
    fn test_goto_has_no_fallthrough_edge() {
        let raw = RawMethod {
            instructions: vec![
                insn(Opcode::Goto),
                insn(Opcode::Return),
                insn(Opcode::Return),
            ],
            jumps: vec![JumpRecord::new(0, 2)],
            try_ranges: vec![],
            ret_type: None,
        };
        let body = build(&raw).unwrap();
        let entry = body.entry().unwrap();

        let succs: Vec<_> = body.block(entry).successors().collect();
        assert_eq!(succs.len(), 1);
        // The goto jumps over the unreachable return at offset 1.
        assert_eq!(body.block(succs[0]).start_offset, Some(2));
    }

    #[test]
    fn test_monitor_instructions_isolated_with_fallthrough() {
        let raw = RawMethod {
            instructions: vec![
                insn(Opcode::MonitorEnter),
                insn(Opcode::Nop),
                insn(Opcode::MonitorExit),
                insn(Opcode::Return),
            ],
            jumps: vec![],
            try_ranges: vec![],
            ret_type: None,
        };
        let body = build(&raw).unwrap();

        // Four blocks, each chained to the next by a fallthrough edge.
        let live: Vec<_> = body.block_ids().collect();
        assert_eq!(live.len(), 4);
        for window in live.windows(2) {
            let succs: Vec<_> = body.block(window[0]).successors().collect();
            assert_eq!(succs, vec![window[1]]);
        }
    }

    #[test]
    fn test_try_entry_gets_splitter_block() {
        let raw = RawMethod {
            instructions: vec![
                insn(Opcode::Nop),
                insn(Opcode::Nop),
                insn(Opcode::Return),
            ],
            jumps: vec![],
            try_ranges: vec![TryRange {
                start: 1,
                end: 2,
                handlers: vec![],
                catch_all: Some(2),
            }],
            ret_type: None,
        };
        let body = build(&raw).unwrap();

        // nop | splitter | nop(try) ... with the splitter on the
        // fallthrough chain.
        let entry = body.entry().unwrap();
        let succs: Vec<_> = body.block(entry).successors().collect();
        assert_eq!(succs.len(), 1);
        let splitter = body.block(succs[0]);
        assert!(splitter.is_synthetic());
        assert!(splitter.insns.is_empty());

        let try_block_id = splitter.successors().next().unwrap();
        let first_insn = body.block(try_block_id).insns[0];
        assert!(body.insn(first_insn).flags.contains(InsnFlags::TRY_ENTER));
    }

    #[test]
    fn test_try_range_end_starts_new_block() {
        let raw = RawMethod {
            instructions: vec![
                insn(Opcode::Nop),
                insn(Opcode::Nop),
                insn(Opcode::Nop),
                insn(Opcode::Return),
            ],
            jumps: vec![],
            try_ranges: vec![TryRange {
                start: 1,
                end: 3,
                handlers: vec![],
                catch_all: None,
            }],
            ret_type: None,
        };
        let body = build(&raw).unwrap();

        // The covered run [1, 3) forms its own block; offset 3 opens the
        // block after the range.
        let index = body.offset_index();
        let (covered, _) = index[&1];
        let (after, _) = index[&3];
        assert_ne!(covered, after);
        assert_eq!(body.block(covered).insns.len(), 2);
        assert_eq!(body.block(after).start_offset, Some(3));
    }

    #[test]
    fn test_do_while_back_branch_opens_block() {
        // nop; nop; if -> 1  (back branch into the block being built)
        let raw = RawMethod {
            instructions: vec![
                insn(Opcode::Nop),
                insn(Opcode::Nop),
                Some(InsnNode::new(Opcode::If, vec![InsnArg::reg(0)])),
                insn(Opcode::Return),
            ],
            jumps: vec![JumpRecord::new(2, 1)],
            try_ranges: vec![],
            ret_type: None,
        };
        let body = build(&raw).unwrap();

        // The If must sit in its own block so the back edge does not target
        // the middle of a block.
        let live: Vec<_> = body.block_ids().collect();
        let if_block = live
            .iter()
            .find(|&&b| {
                body.block(b)
                    .insns
                    .iter()
                    .any(|&i| body.insn(i).opcode == Opcode::If)
            })
            .copied()
            .unwrap();
        assert_eq!(body.block(if_block).insns.len(), 1);
    }
}
