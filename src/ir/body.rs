//! The per-method graph arena and its edit API.
//!
//! All passes mutate one [`MethodBody`] in place. Blocks, instructions and
//! SSA variables live in arenas addressed by stable ids, so attribute
//! references and use lists survive every edit. Structural edits (edges,
//! block insertion) invalidate the cached dominator and loop information;
//! the repair fixpoint recomputes them.

use std::collections::HashMap;
use std::fmt::Write as _;

use crate::{
    cfg::{BlockFlags, BlockId, BlockNode, Edge, EdgeKind, LoopId, LoopInfo},
    error::malformed_error,
    exceptions::{ExceptionHandler, TryCatchBlock},
    ir::{ArgType, CodeVar, CodeVarId, InsnArg, InsnFlags, InsnNode, InsnId, SsaVar, VarId},
    utils::escape_dot,
    Result,
};

/// A method under reconstruction: instruction arena, block graph, SSA
/// metadata and exception attributes, owned exclusively by one worker.
///
/// # Examples
///
/// ```rust
/// use regscope::ir::{InsnArg, InsnNode, MethodBody, Opcode};
///
/// let mut body = MethodBody::new();
/// let entry = body.add_block(Some(0));
/// body.set_entry(entry);
///
/// let ret = body.add_insn(InsnNode::new(Opcode::Return, vec![]).at_offset(0));
/// body.push_insn(entry, ret);
/// assert_eq!(body.block(entry).insns.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MethodBody {
    /// Instruction arena. Removed instructions keep their slot, flagged
    /// [`InsnFlags::REMOVED`].
    insns: Vec<InsnNode>,
    /// Block arena. Removed blocks keep their slot, flagged
    /// [`BlockFlags::REMOVED`].
    blocks: Vec<BlockNode>,
    /// SSA variable table.
    vars: Vec<SsaVar>,
    /// Code variable (name group) table.
    code_vars: Vec<CodeVar>,
    /// Exception handler table.
    pub handlers: Vec<ExceptionHandler>,
    /// Try/catch region table.
    pub try_blocks: Vec<TryCatchBlock>,
    /// Natural loop table, rebuilt by the loop pass.
    pub loops: Vec<LoopInfo>,
    /// The method entry block.
    entry: Option<BlockId>,
    /// Declared return type; `None` for void methods.
    pub ret_type: Option<ArgType>,
    /// Whether cached dominator/loop data matches the current graph.
    analysis_valid: bool,
}

impl MethodBody {
    /// Creates an empty method body.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Instructions
    // ------------------------------------------------------------------

    /// Adds an instruction to the arena and returns its id.
    pub fn add_insn(&mut self, insn: InsnNode) -> InsnId {
        let id = InsnId(u32::try_from(self.insns.len()).unwrap_or(u32::MAX));
        self.insns.push(insn);
        id
    }

    /// Returns the instruction with the given id.
    ///
    /// Ids are only minted by this arena, so the lookup cannot fail.
    #[must_use]
    pub fn insn(&self, id: InsnId) -> &InsnNode {
        &self.insns[id.index()]
    }

    /// Returns a mutable reference to the instruction with the given id.
    pub fn insn_mut(&mut self, id: InsnId) -> &mut InsnNode {
        &mut self.insns[id.index()]
    }

    /// Returns the number of arena slots (including removed instructions).
    #[must_use]
    pub fn insn_count(&self) -> usize {
        self.insns.len()
    }

    /// Appends an instruction id to a block's instruction list.
    pub fn push_insn(&mut self, block: BlockId, insn: InsnId) {
        self.blocks[block.index()].insns.push(insn);
    }

    /// Inserts an instruction id at a position in a block's instruction list.
    pub fn insert_insn(&mut self, block: BlockId, index: usize, insn: InsnId) {
        self.blocks[block.index()].insns.insert(index, insn);
    }

    /// Removes an instruction from a block and unregisters all of its SSA
    /// uses and its result definition, recursively through wrapped
    /// sub-expressions.
    ///
    /// # Errors
    ///
    /// Returns an error if the instruction is not in the block's list.
    pub fn remove_insn(&mut self, block: BlockId, insn: InsnId) -> Result<()> {
        let list = &mut self.blocks[block.index()].insns;
        let pos = list
            .iter()
            .position(|&i| i == insn)
            .ok_or_else(|| malformed_error!("instruction {insn} not found in block {block}"))?;
        list.remove(pos);
        self.unregister_insn(insn);
        Ok(())
    }

    /// Unbinds an instruction's SSA uses and definition and flags it removed.
    ///
    /// Wrapped sub-expressions are unregistered recursively: their uses and
    /// definitions die with the parent.
    pub fn unregister_insn(&mut self, insn: InsnId) {
        let args = self.insns[insn.index()].args.clone();
        for arg in args {
            match arg {
                InsnArg::Reg(reg) => {
                    if let Some(var) = reg.var {
                        self.vars[var.index()].remove_use(insn);
                    }
                }
                InsnArg::Wrapped(child) => self.unregister_insn(child),
                InsnArg::Lit(_) => {}
            }
        }
        if let Some(result) = &self.insns[insn.index()].result {
            if let Some(var) = result.var {
                self.vars[var.index()].set_def(None);
            }
        }
        self.insns[insn.index()].flags |= InsnFlags::REMOVED;
    }

    /// Removes an instruction id from a block's list without touching its
    /// SSA registrations, flagging it as owned by a wrapped-argument slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the instruction is not in the block's list.
    pub fn detach_for_wrap(&mut self, block: BlockId, insn: InsnId) -> Result<()> {
        let list = &mut self.blocks[block.index()].insns;
        let pos = list
            .iter()
            .position(|&i| i == insn)
            .ok_or_else(|| malformed_error!("instruction {insn} not found in block {block}"))?;
        list.remove(pos);
        self.insns[insn.index()].flags |= InsnFlags::WRAPPED;
        Ok(())
    }

    /// Replaces the argument at `index` with a literal, unregistering the
    /// use it previously represented.
    pub fn replace_arg_with_lit(&mut self, insn: InsnId, index: usize, lit: InsnArg) {
        if let Some(InsnArg::Reg(reg)) = self.insns[insn.index()].args.get(index) {
            if let Some(var) = reg.var {
                self.vars[var.index()].remove_use(insn);
            }
        }
        self.insns[insn.index()].args[index] = lit;
    }

    // ------------------------------------------------------------------
    // Blocks and edges
    // ------------------------------------------------------------------

    /// Adds a block to the arena and returns its id.
    pub fn add_block(&mut self, start_offset: Option<u32>) -> BlockId {
        let id = BlockId(u32::try_from(self.blocks.len()).unwrap_or(u32::MAX));
        self.blocks.push(BlockNode::new(id, start_offset));
        self.analysis_valid = false;
        id
    }

    /// Adds a synthetic block.
    pub fn add_synthetic_block(&mut self) -> BlockId {
        let id = self.add_block(None);
        self.blocks[id.index()].flags |= BlockFlags::SYNTHETIC;
        id
    }

    /// Returns the block with the given id.
    #[must_use]
    pub fn block(&self, id: BlockId) -> &BlockNode {
        &self.blocks[id.index()]
    }

    /// Returns a mutable reference to the block with the given id.
    pub fn block_mut(&mut self, id: BlockId) -> &mut BlockNode {
        &mut self.blocks[id.index()]
    }

    /// Returns the number of block arena slots (including removed blocks).
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Returns the ids of all live (non-removed) blocks, in arena order.
    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.blocks
            .iter()
            .filter(|b| !b.flags.contains(BlockFlags::REMOVED))
            .map(|b| b.id)
    }

    /// Returns the method entry block.
    #[must_use]
    pub fn entry(&self) -> Option<BlockId> {
        self.entry
    }

    /// Sets the method entry block.
    pub fn set_entry(&mut self, entry: BlockId) {
        self.entry = Some(entry);
    }

    /// Returns the ids of all blocks flagged as method exits.
    #[must_use]
    pub fn exit_blocks(&self) -> Vec<BlockId> {
        self.block_ids()
            .filter(|&b| self.blocks[b.index()].is_exit())
            .collect()
    }

    /// Adds an edge between two blocks. Parallel edges are not created.
    pub fn add_edge(&mut self, from: BlockId, to: BlockId, kind: EdgeKind) {
        if self.blocks[from.index()]
            .succs
            .iter()
            .any(|e| e.target == to && e.kind == kind)
        {
            return;
        }
        self.blocks[from.index()].succs.push(Edge { target: to, kind });
        self.blocks[to.index()].preds.push(from);
        self.analysis_valid = false;
    }

    /// Removes the edge between two blocks, if present.
    pub fn remove_edge(&mut self, from: BlockId, to: BlockId) {
        let succs = &mut self.blocks[from.index()].succs;
        if let Some(pos) = succs.iter().position(|e| e.target == to) {
            succs.remove(pos);
        }
        let preds = &mut self.blocks[to.index()].preds;
        if let Some(pos) = preds.iter().position(|&p| p == from) {
            preds.remove(pos);
        }
        self.analysis_valid = false;
    }

    /// Inserts a new synthetic block on the edge `from -> to`, preserving
    /// the original edge kind on the incoming half.
    ///
    /// # Errors
    ///
    /// Returns an error if no such edge exists.
    pub fn insert_block_on_edge(&mut self, from: BlockId, to: BlockId) -> Result<BlockId> {
        let kind = self.blocks[from.index()]
            .succs
            .iter()
            .find(|e| e.target == to)
            .map(|e| e.kind)
            .ok_or_else(|| malformed_error!("no edge {from} -> {to}"))?;
        let mid = self.add_synthetic_block();
        self.remove_edge(from, to);
        self.add_edge(from, mid, kind);
        self.add_edge(mid, to, EdgeKind::Normal);
        Ok(mid)
    }

    /// Detaches a block from the graph, flagging its arena slot removed.
    ///
    /// The caller is responsible for rewiring any edges first; remaining
    /// edges are dropped.
    pub fn remove_block(&mut self, id: BlockId) {
        let preds = self.blocks[id.index()].preds.clone();
        for pred in preds {
            self.remove_edge(pred, id);
        }
        let succs: Vec<BlockId> = self.blocks[id.index()].successors().collect();
        for succ in succs {
            self.remove_edge(id, succ);
        }
        self.blocks[id.index()].flags |= BlockFlags::REMOVED;
        self.analysis_valid = false;
    }

    /// Marks cached dominator/loop data stale.
    pub fn invalidate_analysis(&mut self) {
        self.analysis_valid = false;
    }

    /// Returns whether cached dominator/loop data matches the graph.
    #[must_use]
    pub fn analysis_valid(&self) -> bool {
        self.analysis_valid
    }

    pub(crate) fn set_analysis_valid(&mut self) {
        self.analysis_valid = true;
    }

    /// Drops all loop records and per-block loop markers.
    pub fn clear_loops(&mut self) {
        self.loops.clear();
        for block in &mut self.blocks {
            block.loops.clear();
            block.flags &= !(BlockFlags::LOOP_START | BlockFlags::LOOP_END);
        }
    }

    /// Records a loop and attaches it to its header and tail blocks.
    pub fn add_loop(&mut self, info: LoopInfo) -> LoopId {
        let id = LoopId(u32::try_from(self.loops.len()).unwrap_or(u32::MAX));
        let header = info.header;
        let tail = info.tail;
        self.loops.push(info);
        self.blocks[header.index()].loops.push(id);
        self.blocks[header.index()].flags |= BlockFlags::LOOP_START;
        if tail != header {
            self.blocks[tail.index()].loops.push(id);
        }
        self.blocks[tail.index()].flags |= BlockFlags::LOOP_END;
        id
    }

    // ------------------------------------------------------------------
    // SSA metadata
    // ------------------------------------------------------------------

    /// Creates a fresh SSA variable for a register version.
    pub fn new_var(&mut self, reg: u16, version: u32) -> VarId {
        let id = VarId(u32::try_from(self.vars.len()).unwrap_or(u32::MAX));
        self.vars.push(SsaVar::new(reg, version));
        id
    }

    /// Returns the SSA variable with the given id.
    #[must_use]
    pub fn var(&self, id: VarId) -> &SsaVar {
        &self.vars[id.index()]
    }

    /// Returns a mutable reference to the SSA variable with the given id.
    pub fn var_mut(&mut self, id: VarId) -> &mut SsaVar {
        &mut self.vars[id.index()]
    }

    /// Returns the number of SSA variables.
    #[must_use]
    pub fn var_count(&self) -> usize {
        self.vars.len()
    }

    /// Binds an instruction's result register to an SSA variable.
    ///
    /// # Errors
    ///
    /// Returns an error if the instruction has no result register.
    pub fn bind_def(&mut self, insn: InsnId, var: VarId) -> Result<()> {
        let node = &mut self.insns[insn.index()];
        let result = node
            .result
            .as_mut()
            .ok_or_else(|| malformed_error!("instruction {insn} has no result register"))?;
        result.var = Some(var);
        self.vars[var.index()].set_def(Some(insn));
        Ok(())
    }

    /// Binds a register argument to an SSA variable and registers the use.
    ///
    /// # Errors
    ///
    /// Returns an error if the argument at `index` is not a register.
    pub fn bind_use(&mut self, insn: InsnId, index: usize, var: VarId) -> Result<()> {
        match self.insns[insn.index()].args.get_mut(index) {
            Some(InsnArg::Reg(reg)) => {
                reg.var = Some(var);
                self.vars[var.index()].add_use(insn);
                Ok(())
            }
            _ => Err(malformed_error!(
                "argument {index} of {insn} is not a register"
            )),
        }
    }

    /// Groups SSA variables into one code variable (shared source name).
    pub fn merge_into_code_var(&mut self, vars: Vec<VarId>) -> CodeVarId {
        let id = CodeVarId(u32::try_from(self.code_vars.len()).unwrap_or(u32::MAX));
        for &v in &vars {
            self.vars[v.index()].code_var = Some(id);
        }
        self.code_vars.push(CodeVar::of(vars));
        id
    }

    /// Returns the code variable with the given id.
    #[must_use]
    pub fn code_var(&self, id: CodeVarId) -> &CodeVar {
        &self.code_vars[id.0 as usize]
    }

    // ------------------------------------------------------------------
    // Traversal
    // ------------------------------------------------------------------

    /// Returns live blocks in reverse postorder from the entry, following
    /// all edges (exception edges included).
    #[must_use]
    pub fn reverse_postorder(&self) -> Vec<BlockId> {
        let Some(entry) = self.entry else {
            return Vec::new();
        };
        let mut visited = vec![false; self.blocks.len()];
        let mut order = Vec::with_capacity(self.blocks.len());
        // Iterative DFS with an explicit phase marker to emit postorder.
        let mut stack = vec![(entry, false)];
        while let Some((block, emit)) = stack.pop() {
            if emit {
                order.push(block);
                continue;
            }
            if visited[block.index()] {
                continue;
            }
            visited[block.index()] = true;
            stack.push((block, true));
            for succ in self.blocks[block.index()].successors() {
                if !visited[succ.index()] {
                    stack.push((succ, false));
                }
            }
        }
        order.reverse();
        order
    }

    /// Returns the set of block arena indices reachable from the entry.
    #[must_use]
    pub fn reachable_from_entry(&self) -> Vec<bool> {
        let mut reachable = vec![false; self.blocks.len()];
        let Some(entry) = self.entry else {
            return reachable;
        };
        let mut worklist = vec![entry];
        while let Some(block) = worklist.pop() {
            if reachable[block.index()] {
                continue;
            }
            reachable[block.index()] = true;
            worklist.extend(self.blocks[block.index()].successors());
        }
        reachable
    }

    // ------------------------------------------------------------------
    // Consistency and debug output
    // ------------------------------------------------------------------

    /// Verifies basic graph and SSA consistency.
    ///
    /// Checks that every live non-entry block has at least one predecessor
    /// and that every registered use is visible in the using instruction's
    /// argument list.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found.
    pub fn verify(&self) -> Result<()> {
        for id in self.block_ids() {
            let block = self.block(id);
            if Some(id) != self.entry && block.preds.is_empty() {
                return Err(crate::Error::UnreachableBlock(id));
            }
        }
        for (idx, var) in self.vars.iter().enumerate() {
            let var_id = VarId(u32::try_from(idx).unwrap_or(u32::MAX));
            for &use_insn in var.uses() {
                if !self.insn(use_insn).uses_var(var_id) {
                    return Err(malformed_error!(
                        "stale use of {var_id} registered on {use_insn}"
                    ));
                }
            }
        }
        Ok(())
    }

    /// Generates a DOT representation of the block graph.
    ///
    /// Entry blocks are highlighted in green, exit blocks in red, exception
    /// edges drawn dashed.
    #[must_use]
    pub fn to_dot(&self, title: Option<&str>) -> String {
        let mut dot = String::new();
        dot.push_str("digraph CFG {\n");
        if let Some(name) = title {
            let _ = writeln!(dot, "    label=\"{}\";", escape_dot(name));
        }
        dot.push_str("    node [shape=box, fontname=\"Courier\", fontsize=10];\n\n");

        for id in self.block_ids() {
            let block = self.block(id);
            let mut label = match block.start_offset {
                Some(off) => format!("{id} @{off:04X}"),
                None => format!("{id} (synthetic)"),
            };
            label.push_str("\\l");
            for &insn_id in &block.insns {
                let insn = self.insn(insn_id);
                let _ = write!(label, "{}", insn.opcode);
                if let Some(result) = &insn.result {
                    let _ = write!(label, " -> r{}", result.reg);
                }
                label.push_str("\\l");
            }
            let style = if Some(id) == self.entry {
                ", style=filled, fillcolor=lightgreen"
            } else if block.is_exit() {
                ", style=filled, fillcolor=lightcoral"
            } else {
                ""
            };
            let _ = writeln!(dot, "    {id} [label=\"{label}\"{style}];");
        }

        dot.push('\n');
        for id in self.block_ids() {
            for edge in &self.block(id).succs {
                let style = match edge.kind {
                    EdgeKind::Normal => "",
                    EdgeKind::Exception => " [style=dashed, color=purple]",
                };
                let _ = writeln!(dot, "    {id} -> {}{style};", edge.target);
            }
        }
        dot.push_str("}\n");
        dot
    }

    /// Builds a map from source offset to the instruction currently at it.
    ///
    /// Synthetic and removed instructions are skipped; when several
    /// instructions share an offset (a synthesized carrier plus the original)
    /// the first one in block order wins.
    #[must_use]
    pub fn offset_index(&self) -> HashMap<u32, (BlockId, InsnId)> {
        let mut index = HashMap::new();
        for block_id in self.block_ids() {
            for &insn_id in &self.block(block_id).insns {
                let insn = self.insn(insn_id);
                if let Some(offset) = insn.offset {
                    index.entry(offset).or_insert((block_id, insn_id));
                }
            }
        }
        index
    }
}
