//! The method-level intermediate representation.
//!
//! A method is an arena of [`InsnNode`]s and basic blocks addressed by stable
//! small-integer ids ([`InsnId`], [`crate::cfg::BlockId`], [`VarId`]). All
//! graph and instruction edits go through [`MethodBody`], which keeps SSA
//! use lists consistent and invalidates dominator/loop caches on every
//! structural change.
//!
//! # Ownership
//!
//! An instruction is referenced from exactly one place at a time: a block's
//! ordered instruction list, or a parent instruction's wrapped-argument slot
//! once expression inlining has moved it there. The arena slot itself never
//! moves, so ids held by SSA use lists and attributes stay valid across
//! edits.

mod arg;
mod body;
mod insn;
mod raw;
mod ssa;

pub use arg::{ArgType, InsnArg, LiteralArg, LiteralValue, RegisterArg};
pub use body::MethodBody;
pub use insn::{ArithOp, InsnFlags, InsnNode, InvokeKind, Opcode};
pub use raw::{JumpRecord, RawMethod, TryRange};
pub use ssa::{CodeVar, CodeVarId, SsaVar};

/// Identifier of an instruction in a method's instruction arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InsnId(pub u32);

impl InsnId {
    /// Returns the arena index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for InsnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "i{}", self.0)
    }
}

/// Identifier of an SSA variable in a method's variable table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub u32);

impl VarId {
    /// Returns the table index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for VarId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}
