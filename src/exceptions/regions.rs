//! Try/catch region construction over the block graph.
//!
//! Runs in two phases around the structural repair fixpoint:
//!
//! 1. [`attach`] consumes the raw try-range records, builds the shared
//!    handler table, shadow-filters each region's handler list, stamps catch
//!    attributes onto covered instructions, and wires exception edges from
//!    each covered block (or its splitter) to the handler entries. This must
//!    happen before dominators are first computed, since handler blocks are
//!    unreachable until their exception edges exist.
//! 2. [`finish`] runs once the graph is stable: it pins exception variable
//!    types at handler entries, collects each handler's dominated region,
//!    strips bytecode-level lock cleanup from handler regions, merges
//!    regions linked by rethrows, and tags whole-block try membership.

use std::collections::{HashMap, HashSet};

use crate::{
    cfg::{dominators, BlockFlags, BlockId, EdgeKind},
    error::malformed_error,
    exceptions::{ExceptionHandler, HandlerId, TryBlockId, TryCatchBlock},
    ir::{ArgType, InsnFlags, InsnId, InsnNode, MethodBody, Opcode, TryRange},
    types::{TypeHierarchy, TypeRef},
    Result,
};

/// Builds handlers and catch attributes from raw try ranges and wires
/// exception edges into the block graph.
///
/// Handlers are shared: a handler offset targeted by several try ranges gets
/// exactly one [`ExceptionHandler`] object, with catch types accumulated
/// across all ranges that reference it. Each range's handler list is
/// shadow-filtered at construction time.
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] when a handler offset carries no
/// instruction at all.
pub fn attach(body: &mut MethodBody, ranges: &[TryRange], types: &TypeHierarchy) -> Result<()> {
    if ranges.is_empty() {
        return Ok(());
    }

    let mut handler_at_offset: HashMap<u32, HandlerId> = HashMap::new();
    for range in ranges {
        let tcb = TryBlockId(u32::try_from(body.try_blocks.len()).unwrap_or(u32::MAX));
        body.try_blocks.push(TryCatchBlock::default());

        let mut entries: Vec<(u32, Option<TypeRef>)> = range.handlers.clone();
        if let Some(offset) = range.catch_all {
            entries.push((offset, None));
        }

        let mut listed: Vec<HandlerId> = Vec::new();
        for (offset, catch_type) in entries {
            let id = *handler_at_offset.entry(offset).or_insert_with(|| {
                let id = HandlerId(u32::try_from(body.handlers.len()).unwrap_or(u32::MAX));
                body.handlers.push(ExceptionHandler::new(offset, tcb));
                id
            });
            if let Some(catch_type) = catch_type {
                body.handlers[id.index()].add_catch_type(catch_type);
            }
            if !listed.contains(&id) {
                listed.push(id);
            }
        }
        body.try_blocks[tcb.index()].handlers = filter_shadowed(body, &listed, types);

        mark_range(body, range, tcb)?;
    }

    resolve_handler_blocks(body)?;
    wire_exception_edges(body)?;
    prune_dead_handlers(body)
}

/// Removes the code of handlers that survived in no region's handler list.
///
/// Shadow removal can leave a handler without any referencing region; its
/// entry block then has no incoming edge, and the reachability check run by
/// the dominator pass treats that as a fatal inconsistency. The dead code is
/// dropped here instead, stopping at anything still reachable from the
/// entry.
fn prune_dead_handlers(body: &mut MethodBody) -> Result<()> {
    let live: HashSet<HandlerId> = body
        .try_blocks
        .iter()
        .flat_map(|t| t.handlers.iter().copied())
        .collect();
    let mut dead_entries: Vec<BlockId> = Vec::new();
    for index in 0..body.handlers.len() {
        let id = HandlerId(u32::try_from(index).unwrap_or(u32::MAX));
        if !live.contains(&id) {
            if let Some(block) = body.handlers[index].block.take() {
                dead_entries.push(block);
            }
        }
    }
    if dead_entries.is_empty() {
        return Ok(());
    }

    let reachable = body.reachable_from_entry();
    let mut removed: HashSet<BlockId> = HashSet::new();
    let mut worklist = dead_entries;
    while let Some(block) = worklist.pop() {
        if reachable[block.index()] || !removed.insert(block) {
            continue;
        }
        worklist.extend(body.block(block).successors().collect::<Vec<_>>());
        for insn in body.block(block).insns.clone() {
            body.remove_insn(block, insn)?;
        }
        body.remove_block(block);
    }
    Ok(())
}

/// Drops handlers shadowed by an earlier survivor in the same region.
///
/// A later handler is dead when its maximal catch type is comparable with an
/// earlier survivor's in either direction: wider means it can never fire,
/// equal-or-narrower means the earlier handler already catches everything it
/// would. The pass is a single left-to-right sweep; a wide handler admitted
/// early shadows everything after it, which mirrors declaration-order
/// semantics rather than a full pairwise check.
fn filter_shadowed(
    body: &MethodBody,
    handlers: &[HandlerId],
    types: &TypeHierarchy,
) -> Vec<HandlerId> {
    let mut kept: Vec<HandlerId> = Vec::new();
    let mut kept_types: Vec<TypeRef> = Vec::new();
    for &id in handlers {
        let max = maximal_type(&body.handlers[id.index()], types);
        let shadowed = kept_types.iter().any(|earlier| {
            types.is_wider_or_equal(&max, earlier) || types.is_wider_or_equal(earlier, &max)
        });
        if !shadowed {
            kept.push(id);
            kept_types.push(max);
        }
    }
    kept
}

/// Reduces a handler's declared catch types to a single maximal type.
///
/// Catch-all maps to the any-throwable sentinel; a multi-catch list is
/// folded through the least-upper-bound.
fn maximal_type(handler: &ExceptionHandler, types: &TypeHierarchy) -> TypeRef {
    let mut catch_types = handler.catch_types.iter();
    let Some(first) = catch_types.next() else {
        return TypeRef::AllThrowable;
    };
    catch_types.fold(first.clone(), |acc, t| types.least_upper_bound(&acc, t))
}

/// Stamps a region's catch attribute onto every covered instruction and
/// marks the range boundaries.
///
/// An instruction already owned by another region forces a merge of the two
/// regions; an empty range gets a synthetic no-op as marker carrier.
fn mark_range(body: &mut MethodBody, range: &TryRange, tcb: TryBlockId) -> Result<()> {
    let index = body.offset_index();
    let mut covered: Vec<(u32, BlockId, InsnId)> = index
        .iter()
        .filter(|(&offset, _)| offset >= range.start && offset < range.end)
        .map(|(&offset, &(block, insn))| (offset, block, insn))
        .collect();
    covered.sort_by_key(|&(offset, _, _)| offset);

    if covered.is_empty() {
        let (block, insn) = synthesize_range_carrier(body, range, &index)?;
        covered.push((range.start, block, insn));
    }

    let mut current = tcb;
    let last = covered.len() - 1;
    for (position, &(_, _, insn)) in covered.iter().enumerate() {
        if let Some(existing) = body.insn(insn).catch {
            if existing != current {
                merge_try_blocks(body, existing, current);
                current = existing;
            }
        }
        let node = body.insn_mut(insn);
        node.catch = Some(current);
        if position == 0 {
            node.flags |= InsnFlags::TRY_ENTER;
        }
        if position == last {
            node.flags |= InsnFlags::TRY_LEAVE;
        }
    }
    Ok(())
}

/// Inserts a synthetic no-op to carry try markers for a range that covers no
/// real instruction, placed ahead of the first instruction past the range.
fn synthesize_range_carrier(
    body: &mut MethodBody,
    range: &TryRange,
    index: &HashMap<u32, (BlockId, InsnId)>,
) -> Result<(BlockId, InsnId)> {
    let follow = index
        .iter()
        .filter(|(&offset, _)| offset >= range.end)
        .min_by_key(|(&offset, _)| offset)
        .map(|(_, &at)| at);
    let (block, position) = match follow {
        Some((block, insn)) => {
            let position = body
                .block(block)
                .insns
                .iter()
                .position(|&i| i == insn)
                .ok_or_else(|| malformed_error!("instruction {insn} missing from {block}"))?;
            (block, position)
        }
        None => {
            let block = body
                .block_ids()
                .last()
                .ok_or_else(|| malformed_error!("try range in a method without blocks"))?;
            let position = body.block(block).insns.len();
            (block, position)
        }
    };
    let nop = body.add_insn(InsnNode::synthetic_nop(range.start));
    body.insert_insn(block, position, nop);
    Ok((block, nop))
}

/// Unions `absorb` into `keep`, rewriting every reference to the absorbed
/// region. The absorbed region's handler list is left empty.
fn merge_try_blocks(body: &mut MethodBody, keep: TryBlockId, absorb: TryBlockId) {
    if keep == absorb {
        return;
    }
    let moved = std::mem::take(&mut body.try_blocks[absorb.index()].handlers);
    for id in moved {
        if !body.try_blocks[keep.index()].handlers.contains(&id) {
            body.try_blocks[keep.index()].handlers.push(id);
        }
    }
    for handler in &mut body.handlers {
        if handler.owner == absorb {
            handler.owner = keep;
        }
    }
    for index in 0..body.insn_count() {
        let id = InsnId(u32::try_from(index).unwrap_or(u32::MAX));
        if body.insn(id).catch == Some(absorb) {
            body.insn_mut(id).catch = Some(keep);
        }
    }
    for block in body.block_ids().collect::<Vec<_>>() {
        if body.block(block).catch == Some(absorb) {
            body.block_mut(block).catch = Some(keep);
        }
    }
}

/// Resolves each handler's entry block and flags it.
///
/// The entry offset is expected to hold a `MoveException`; anything else
/// gets a synthetic no-op inserted ahead of it as the handler carrier.
fn resolve_handler_blocks(body: &mut MethodBody) -> Result<()> {
    for index in 0..body.handlers.len() {
        let offset = body.handlers[index].offset;
        let offsets = body.offset_index();
        let &(block, insn) = offsets
            .get(&offset)
            .ok_or_else(|| malformed_error!("no instruction at handler offset {offset}"))?;
        if body.insn(insn).opcode != Opcode::MoveException {
            let position = body
                .block(block)
                .insns
                .iter()
                .position(|&i| i == insn)
                .ok_or_else(|| malformed_error!("instruction {insn} missing from {block}"))?;
            let nop = body.add_insn(InsnNode::synthetic_nop(offset));
            body.insert_insn(block, position, nop);
        }
        let id = HandlerId(u32::try_from(index).unwrap_or(u32::MAX));
        body.handlers[index].block = Some(block);
        body.block_mut(block).handler = Some(id);
        body.block_mut(block).flags |= BlockFlags::EXC_HANDLER;
    }
    Ok(())
}

/// Connects every covered block to its region's handler entries.
///
/// The edge source is the block's splitter when one exists, so exceptional
/// flow stays distinct from the fallthrough path. A handler covering its own
/// entry block gets no self edge.
fn wire_exception_edges(body: &mut MethodBody) -> Result<()> {
    for block in body.block_ids().collect::<Vec<_>>() {
        let mut regions: Vec<TryBlockId> = Vec::new();
        for &insn in &body.block(block).insns {
            if let Some(tcb) = body.insn(insn).catch {
                if !regions.contains(&tcb) {
                    regions.push(tcb);
                }
            }
        }
        if regions.is_empty() {
            continue;
        }
        let source = splitter_pred(body, block).unwrap_or(block);
        for tcb in regions {
            for id in body.try_blocks[tcb.index()].handlers.clone() {
                let target = body.handlers[id.index()]
                    .block
                    .ok_or_else(|| malformed_error!("handler {} has no entry block", id.0))?;
                if target != source && target != block {
                    body.add_edge(source, target, EdgeKind::Exception);
                }
            }
        }
    }
    Ok(())
}

/// Returns the empty synthetic splitter sitting directly in front of a
/// try-entry block, if any.
fn splitter_pred(body: &MethodBody, block: BlockId) -> Option<BlockId> {
    body.block(block).preds.iter().copied().find(|&pred| {
        let candidate = body.block(pred);
        candidate.is_synthetic() && candidate.insns.is_empty() && candidate.succs.len() == 1
    })
}

/// Block-level post-pass, run once the repaired graph has valid dominators.
///
/// Pins exception variable types at handler entries, collects each
/// handler's dominated region, strips pre-acquire `MonitorExit` cleanup
/// inside handler regions, merges regions connected by an attributed
/// rethrow, and tags blocks fully covered by one region.
///
/// # Errors
///
/// Propagates dominator computation errors when the cached analysis is
/// stale, and consistency errors from instruction removal.
pub fn finish(body: &mut MethodBody, types: &TypeHierarchy) -> Result<()> {
    if body.handlers.is_empty() {
        return Ok(());
    }
    if !body.analysis_valid() {
        dominators::compute(body)?;
    }
    force_exception_types(body, types);
    collect_handler_regions(body)?;
    tag_try_blocks(body);
    Ok(())
}

/// Pins the declared type of each handler's exception variable to the
/// handler's maximal catch type. Catch-all handlers get the generic
/// throwable type.
fn force_exception_types(body: &mut MethodBody, types: &TypeHierarchy) {
    for index in 0..body.handlers.len() {
        let Some(block) = body.handlers[index].block else {
            continue;
        };
        let Some(&entry) = body.block(block).insns.first() else {
            continue;
        };
        if body.insn(entry).opcode != Opcode::MoveException {
            continue;
        }
        let class = maximal_type(&body.handlers[index], types).name().to_string();
        let typ = ArgType::Object(class);
        let var = body.insn(entry).result.as_ref().and_then(|r| r.var);
        if let Some(result) = body.insn_mut(entry).result.as_mut() {
            result.typ = typ.clone();
        }
        if let Some(var) = var {
            body.var_mut(var).typ = typ;
        }
    }
}

/// Collects each handler's dominated block region, strips bytecode lock
/// cleanup inside it, and merges regions linked by a rethrow that carries
/// its own catch attribute.
fn collect_handler_regions(body: &mut MethodBody) -> Result<()> {
    let order = body.reverse_postorder();
    for index in 0..body.handlers.len() {
        let Some(entry) = body.handlers[index].block else {
            continue;
        };
        let region: Vec<BlockId> = order
            .iter()
            .copied()
            .filter(|&b| dominators::dominates(body, entry, b))
            .collect();
        body.handlers[index].region = region.clone();

        strip_monitor_cleanup(body, &region)?;

        // A throw inside one handler caught by an enclosing region ties the
        // two regions together.
        let owner = body.handlers[index].owner;
        for &block in &region {
            for insn in body.block(block).insns.clone() {
                if body.insn(insn).opcode == Opcode::Throw {
                    if let Some(other) = body.insn(insn).catch {
                        if other != owner {
                            merge_try_blocks(body, other, owner);
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

/// Removes `MonitorExit` instructions occurring before any `MonitorEnter`
/// in a handler region. Lock cleanup is regenerated structurally later, so
/// the copied bytecode form is dropped here.
fn strip_monitor_cleanup(body: &mut MethodBody, region: &[BlockId]) -> Result<()> {
    let mut seen_enter = false;
    for &block in region {
        for insn in body.block(block).insns.clone() {
            match body.insn(insn).opcode {
                Opcode::MonitorEnter => seen_enter = true,
                Opcode::MonitorExit if !seen_enter => {
                    body.remove_insn(block, insn)?;
                }
                _ => {}
            }
        }
    }
    Ok(())
}

/// Tags blocks whose instructions all share one catch attribute as whole
/// try blocks.
fn tag_try_blocks(body: &mut MethodBody) {
    for block in body.block_ids().collect::<Vec<_>>() {
        let insns = &body.block(block).insns;
        if insns.is_empty() {
            continue;
        }
        let first = body.insn(insns[0]).catch;
        if first.is_some() && insns.iter().all(|&i| body.insn(i).catch == first) {
            body.block_mut(block).catch = first;
            body.block_mut(block).flags |= BlockFlags::TRY_BLOCK;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{InsnArg, RawMethod};

    fn insn(opcode: Opcode) -> Option<InsnNode> {
        Some(InsnNode::new(opcode, vec![]))
    }

    fn throwables() -> TypeHierarchy {
        let types = TypeHierarchy::new();
        types.add_class("java.lang.Exception", Some("java.lang.Throwable"));
        types.add_class("java.lang.RuntimeException", Some("java.lang.Exception"));
        types.add_class(
            "java.lang.NullPointerException",
            Some("java.lang.RuntimeException"),
        );
        types.add_class("java.io.IOException", Some("java.lang.Exception"));
        types
    }

    /// Linear method with a handler entry at offset 5.
    fn guarded_method(ranges: Vec<TryRange>) -> RawMethod {
        RawMethod {
            instructions: vec![
                insn(Opcode::Nop),
                insn(Opcode::Nop),
                insn(Opcode::Nop),
                insn(Opcode::Nop),
                insn(Opcode::Return),
                Some(InsnNode::new(Opcode::MoveException, vec![]).with_result(0)),
                Some(InsnNode::new(Opcode::Throw, vec![InsnArg::reg(0)])),
            ],
            jumps: vec![],
            try_ranges: ranges,
            ret_type: None,
        }
    }

    fn range(start: u32, end: u32, handlers: Vec<(u32, Option<TypeRef>)>) -> TryRange {
        TryRange {
            start,
            end,
            handlers,
            catch_all: None,
        }
    }

    #[test]
    fn test_shared_handler_offset_yields_one_object() {
        let npe = TypeRef::class("java.lang.NullPointerException");
        let ranges = vec![
            range(1, 3, vec![(5, Some(npe.clone()))]),
            range(3, 4, vec![(5, Some(npe))]),
        ];
        let raw = guarded_method(ranges.clone());
        let mut body = crate::cfg::build(&raw).unwrap();
        attach(&mut body, &ranges, &throwables()).unwrap();

        assert_eq!(body.handlers.len(), 1);
        assert_eq!(body.try_blocks.len(), 2);
        assert!(body.try_blocks[0].contains(HandlerId(0)));
        assert!(body.try_blocks[1].contains(HandlerId(0)));
    }

    #[test]
    fn test_covered_instructions_carry_catch_attribute() {
        let ranges = vec![range(
            1,
            4,
            vec![(5, Some(TypeRef::class("java.io.IOException")))],
        )];
        let raw = guarded_method(ranges.clone());
        let mut body = crate::cfg::build(&raw).unwrap();
        attach(&mut body, &ranges, &throwables()).unwrap();

        let index = body.offset_index();
        for offset in 1..4 {
            let (_, insn) = index[&offset];
            assert_eq!(body.insn(insn).catch, Some(TryBlockId(0)));
        }
        let (_, first) = index[&1];
        let (_, last) = index[&3];
        assert!(body.insn(first).flags.contains(InsnFlags::TRY_ENTER));
        assert!(body.insn(last).flags.contains(InsnFlags::TRY_LEAVE));
        // Instructions outside the range stay clean.
        let (_, outside) = index[&4];
        assert_eq!(body.insn(outside).catch, None);
    }

    #[test]
    fn test_later_wider_handler_removed() {
        let npe = TypeRef::class("java.lang.NullPointerException");
        let ex = TypeRef::class("java.lang.Exception");
        let raw = RawMethod {
            instructions: vec![
                insn(Opcode::Nop),
                insn(Opcode::Return),
                Some(InsnNode::new(Opcode::MoveException, vec![]).with_result(0)),
                Some(InsnNode::new(Opcode::Throw, vec![InsnArg::reg(0)])),
                Some(InsnNode::new(Opcode::MoveException, vec![]).with_result(0)),
                Some(InsnNode::new(Opcode::Throw, vec![InsnArg::reg(0)])),
            ],
            jumps: vec![],
            try_ranges: vec![range(0, 1, vec![(2, Some(npe)), (4, Some(ex))])],
            ret_type: None,
        };
        let mut body = crate::cfg::build(&raw).unwrap();
        attach(&mut body, &raw.try_ranges, &throwables()).unwrap();

        // The narrow handler comes first; the wider one after it is dead.
        assert_eq!(body.try_blocks[0].handlers, vec![HandlerId(0)]);
    }

    #[test]
    fn test_later_narrower_handler_removed() {
        let npe = TypeRef::class("java.lang.NullPointerException");
        let ex = TypeRef::class("java.lang.Exception");
        let raw = RawMethod {
            instructions: vec![
                insn(Opcode::Nop),
                insn(Opcode::Return),
                Some(InsnNode::new(Opcode::MoveException, vec![]).with_result(0)),
                Some(InsnNode::new(Opcode::Throw, vec![InsnArg::reg(0)])),
                Some(InsnNode::new(Opcode::MoveException, vec![]).with_result(0)),
                Some(InsnNode::new(Opcode::Throw, vec![InsnArg::reg(0)])),
            ],
            jumps: vec![],
            try_ranges: vec![range(0, 1, vec![(2, Some(ex)), (4, Some(npe))])],
            ret_type: None,
        };
        let mut body = crate::cfg::build(&raw).unwrap();
        attach(&mut body, &raw.try_ranges, &throwables()).unwrap();

        assert_eq!(body.try_blocks[0].handlers, vec![HandlerId(0)]);
    }

    #[test]
    fn test_unrelated_handlers_both_kept() {
        let npe = TypeRef::class("java.lang.NullPointerException");
        let io = TypeRef::class("java.io.IOException");
        let raw = RawMethod {
            instructions: vec![
                insn(Opcode::Nop),
                insn(Opcode::Return),
                Some(InsnNode::new(Opcode::MoveException, vec![]).with_result(0)),
                Some(InsnNode::new(Opcode::Throw, vec![InsnArg::reg(0)])),
                Some(InsnNode::new(Opcode::MoveException, vec![]).with_result(0)),
                Some(InsnNode::new(Opcode::Throw, vec![InsnArg::reg(0)])),
            ],
            jumps: vec![],
            try_ranges: vec![range(0, 1, vec![(2, Some(npe)), (4, Some(io))])],
            ret_type: None,
        };
        let mut body = crate::cfg::build(&raw).unwrap();
        attach(&mut body, &raw.try_ranges, &throwables()).unwrap();

        assert_eq!(
            body.try_blocks[0].handlers,
            vec![HandlerId(0), HandlerId(1)]
        );
    }

    #[test]
    fn test_exception_edges_wired_to_handler_entry() {
        let ranges = vec![range(
            1,
            4,
            vec![(5, Some(TypeRef::class("java.io.IOException")))],
        )];
        let raw = guarded_method(ranges.clone());
        let mut body = crate::cfg::build(&raw).unwrap();
        attach(&mut body, &ranges, &throwables()).unwrap();

        let handler_block = body.handlers[0].block.unwrap();
        assert!(body
            .block(handler_block)
            .flags
            .contains(BlockFlags::EXC_HANDLER));
        assert!(!body.block(handler_block).preds.is_empty());

        // The edge into the handler is exceptional and excluded from the
        // clean successor view.
        for &pred in &body.block(handler_block).preds {
            let edge = body
                .block(pred)
                .succs
                .iter()
                .find(|e| e.target == handler_block)
                .unwrap();
            assert_eq!(edge.kind, EdgeKind::Exception);
            assert!(!body
                .block(pred)
                .clean_successors()
                .any(|s| s == handler_block));
        }
    }

    #[test]
    fn test_empty_range_gets_synthetic_carrier() {
        // Offset 1 is a hole, so the range [1, 2) covers no instruction.
        let ranges = vec![range(
            1,
            2,
            vec![(3, Some(TypeRef::class("java.io.IOException")))],
        )];
        let raw = RawMethod {
            instructions: vec![
                insn(Opcode::Nop),
                None,
                insn(Opcode::Return),
                Some(InsnNode::new(Opcode::MoveException, vec![]).with_result(0)),
                Some(InsnNode::new(Opcode::Throw, vec![InsnArg::reg(0)])),
            ],
            jumps: vec![],
            try_ranges: ranges.clone(),
            ret_type: None,
        };
        let mut body = crate::cfg::build(&raw).unwrap();
        attach(&mut body, &ranges, &throwables()).unwrap();

        let carrier = (0..body.insn_count())
            .map(|i| InsnId(u32::try_from(i).unwrap()))
            .find(|&i| {
                let node = body.insn(i);
                node.flags.contains(InsnFlags::SYNTHETIC) && node.catch.is_some()
            })
            .expect("synthetic carrier nop");
        let node = body.insn(carrier);
        assert_eq!(node.opcode, Opcode::Nop);
        assert!(node.flags.contains(InsnFlags::TRY_ENTER));
        assert!(node.flags.contains(InsnFlags::TRY_LEAVE));
    }

    #[test]
    fn test_finish_forces_exception_variable_type() {
        let io = TypeRef::class("java.io.IOException");
        let ranges = vec![range(1, 4, vec![(5, Some(io))])];
        let raw = guarded_method(ranges.clone());
        let types = throwables();
        let mut body = crate::cfg::build(&raw).unwrap();
        attach(&mut body, &ranges, &types).unwrap();
        crate::cfg::repair::run(&mut body).unwrap();
        finish(&mut body, &types).unwrap();

        let handler_block = body.handlers[0].block.unwrap();
        let entry = body.block(handler_block).insns[0];
        assert_eq!(body.insn(entry).opcode, Opcode::MoveException);
        assert_eq!(
            body.insn(entry).result.as_ref().unwrap().typ,
            ArgType::Object("java.io.IOException".to_string())
        );
    }

    #[test]
    fn test_finish_collects_dominated_region_and_tags_try_blocks() {
        let ranges = vec![range(1, 4, vec![(5, None)])];
        let raw = guarded_method(ranges.clone());
        let types = throwables();
        let mut body = crate::cfg::build(&raw).unwrap();
        attach(&mut body, &ranges, &types).unwrap();
        crate::cfg::repair::run(&mut body).unwrap();
        finish(&mut body, &types).unwrap();

        let handler_block = body.handlers[0].block.unwrap();
        assert!(body.handlers[0].region.contains(&handler_block));

        // The fully covered block is tagged as a try block.
        let index = body.offset_index();
        let (covered_block, _) = index[&1];
        assert!(body
            .block(covered_block)
            .flags
            .contains(BlockFlags::TRY_BLOCK));
        assert_eq!(body.block(covered_block).catch, Some(TryBlockId(0)));
    }

    #[test]
    fn test_finish_strips_monitor_exit_before_enter_in_handler() {
        // Handler at offset 3: move-exception, monitor-exit, throw.
        let ranges = vec![range(1, 2, vec![(3, None)])];
        let raw = RawMethod {
            instructions: vec![
                insn(Opcode::Nop),
                insn(Opcode::Nop),
                insn(Opcode::Return),
                Some(InsnNode::new(Opcode::MoveException, vec![]).with_result(0)),
                insn(Opcode::MonitorExit),
                Some(InsnNode::new(Opcode::Throw, vec![InsnArg::reg(0)])),
            ],
            jumps: vec![],
            try_ranges: ranges.clone(),
            ret_type: None,
        };
        let types = throwables();
        let mut body = crate::cfg::build(&raw).unwrap();
        attach(&mut body, &ranges, &types).unwrap();
        crate::cfg::repair::run(&mut body).unwrap();
        finish(&mut body, &types).unwrap();

        let index = body.offset_index();
        assert!(!index.contains_key(&4), "monitor-exit should be removed");
    }
}
