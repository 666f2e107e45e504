//! Basic block nodes.

use bitflags::bitflags;

use crate::{
    exceptions::{HandlerId, TryBlockId},
    ir::InsnId,
    utils::BitSet,
};

/// Identifier of a basic block in a method's block arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

impl BlockId {
    /// Returns the arena index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "B{}", self.0)
    }
}

/// Identifier of a loop in a method's loop table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoopId(pub u32);

/// Classification of a control-flow edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// Ordinary control transfer (fallthrough, branch, switch case).
    Normal,
    /// Transfer into an exception handler entry.
    Exception,
}

/// An outgoing edge of a basic block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    /// The target block.
    pub target: BlockId,
    /// The edge classification.
    pub kind: EdgeKind,
}

bitflags! {
    /// Per-block flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct BlockFlags: u16 {
        /// Created by a repair or splitting pass, has no source offset range.
        const SYNTHETIC = 1 << 0;
        /// Header of a natural loop.
        const LOOP_START = 1 << 1;
        /// Tail of a back edge.
        const LOOP_END = 1 << 2;
        /// Entry block of an exception handler.
        const EXC_HANDLER = 1 << 3;
        /// Method exit (ends in return or throw).
        const EXIT = 1 << 4;
        /// Every instruction in this block shares one catch attribute.
        const TRY_BLOCK = 1 << 5;
        /// Detached from the graph; the arena slot is kept to preserve ids.
        const REMOVED = 1 << 6;
    }
}

/// A basic block: an ordered instruction run with explicit edge lists and
/// cached dominance information.
///
/// Edits to the edge lists and instruction list must go through
/// [`crate::ir::MethodBody`] so that SSA metadata and dominator/loop caches
/// stay consistent.
#[derive(Debug, Clone)]
pub struct BlockNode {
    /// This block's id in the arena.
    pub id: BlockId,
    /// Offset of the first original instruction; `None` for synthetic blocks.
    pub start_offset: Option<u32>,
    /// Ordered instruction list.
    pub insns: Vec<InsnId>,
    /// Predecessor blocks.
    pub preds: Vec<BlockId>,
    /// Successor edges.
    pub succs: Vec<Edge>,
    /// Dominator set over block arena indices; rebuilt by the dominator pass.
    pub doms: BitSet,
    /// Immediate dominator; `None` for the entry block.
    pub idom: Option<BlockId>,
    /// Block flags.
    pub flags: BlockFlags,
    /// The try/catch region all instructions of this block share, if tagged.
    pub catch: Option<TryBlockId>,
    /// The handler whose entry this block is, if any.
    pub handler: Option<HandlerId>,
    /// Loops this block heads or ends.
    pub loops: Vec<LoopId>,
}

impl BlockNode {
    pub(crate) fn new(id: BlockId, start_offset: Option<u32>) -> Self {
        Self {
            id,
            start_offset,
            insns: Vec::new(),
            preds: Vec::new(),
            succs: Vec::new(),
            doms: BitSet::new(0),
            idom: None,
            flags: BlockFlags::empty(),
            catch: None,
            handler: None,
            loops: Vec::new(),
        }
    }

    /// Returns all successor block ids, exception edges included.
    pub fn successors(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.succs.iter().map(|e| e.target)
    }

    /// Returns successor block ids reachable through normal control flow
    /// only (the "clean" view used by structuring).
    pub fn clean_successors(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.succs
            .iter()
            .filter(|e| e.kind == EdgeKind::Normal)
            .map(|e| e.target)
    }

    /// Returns `true` if this block was synthesized by a pass.
    #[must_use]
    pub fn is_synthetic(&self) -> bool {
        self.flags.contains(BlockFlags::SYNTHETIC)
    }

    /// Returns `true` if this block is a registered method exit.
    #[must_use]
    pub fn is_exit(&self) -> bool {
        self.flags.contains(BlockFlags::EXIT)
    }

    /// Returns the last instruction of the block, if any.
    #[must_use]
    pub fn last_insn(&self) -> Option<InsnId> {
        self.insns.last().copied()
    }
}
