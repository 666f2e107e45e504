//! Typed instruction nodes.
//!
//! Every instruction carries an operation tag, an argument list, an optional
//! result register, its source offset (synthetic instructions have none), and
//! a small flag set used as a side channel by later passes. Catch metadata is
//! a typed field referencing the owning try/catch region rather than an
//! open-ended attribute bag.

use bitflags::bitflags;
use strum::Display;

use crate::{
    exceptions::TryBlockId,
    ir::{ArgType, InsnArg, LiteralValue, RegisterArg},
};

/// Arithmetic operation kinds carried by [`Opcode::Arith`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ArithOp {
    /// Addition.
    Add,
    /// Subtraction.
    Sub,
    /// Multiplication.
    Mul,
    /// Division.
    Div,
    /// Remainder.
    Rem,
    /// Bitwise and.
    And,
    /// Bitwise or.
    Or,
    /// Bitwise xor.
    Xor,
    /// Left shift.
    Shl,
    /// Right shift.
    Shr,
}

/// Dispatch kind of an [`Opcode::Invoke`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum InvokeKind {
    /// Static call, no receiver.
    Static,
    /// Instance call; the first argument is the receiver.
    Virtual,
}

/// Operation tags for the register-VM instruction set.
///
/// The set is intentionally small: it covers exactly the shapes the
/// control-flow and expression passes distinguish. Front-end opcodes that
/// behave alike (e.g. all comparison branches) map onto one tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Opcode {
    /// No operation. Also synthesized to carry try-region markers for
    /// otherwise empty ranges.
    Nop,
    /// Load a literal into the result register.
    Const,
    /// Copy a register or literal into the result register.
    Move,
    /// Receive the caught exception at a handler entry.
    MoveException,
    /// Binary arithmetic on two arguments.
    Arith(ArithOp),
    /// Three-way comparison producing an int.
    Cmp,
    /// Conditional branch. The branch target comes from the jump attribute;
    /// the false edge is the fallthrough.
    If,
    /// Unconditional branch.
    Goto,
    /// Multi-way branch over case targets, falling through to the default.
    Switch,
    /// Return from the method, with an optional value argument.
    Return,
    /// Throw the exception in the argument.
    Throw,
    /// Method call.
    Invoke(InvokeKind),
    /// Object allocation plus constructor call; the first argument is the
    /// receiver being constructed.
    Construct,
    /// Array length read.
    ArrayLength,
    /// Acquire a monitor.
    MonitorEnter,
    /// Release a monitor.
    MonitorExit,
    /// SSA phi join.
    Phi,
}

impl Opcode {
    /// Returns `true` for instructions that terminate a basic block.
    ///
    /// Monitor instructions do not branch, but they must not be merged
    /// across a block boundary, so they terminate blocks as well.
    #[must_use]
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Opcode::Return
                | Opcode::Goto
                | Opcode::Throw
                | Opcode::If
                | Opcode::Switch
                | Opcode::MonitorEnter
                | Opcode::MonitorExit
        )
    }

    /// Returns `true` for instructions that never fall through to the next
    /// offset.
    #[must_use]
    pub fn is_no_fallthrough(&self) -> bool {
        matches!(self, Opcode::Return | Opcode::Goto | Opcode::Throw)
    }

    /// Returns `true` for instructions that exit the method.
    #[must_use]
    pub fn is_exit(&self) -> bool {
        matches!(self, Opcode::Return | Opcode::Throw)
    }

    /// Returns `true` if the instruction has no side effects and produces a
    /// constant, making it reorderable past anything.
    #[must_use]
    pub fn is_const_producer(&self) -> bool {
        matches!(self, Opcode::Const)
    }
}

bitflags! {
    /// Per-instruction flags used as a side channel between passes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct InsnFlags: u16 {
        /// This instruction's result must never be inlined at its use sites.
        const DONT_INLINE = 1 << 0;
        /// Synthesized by a pass, not present in the input bytecode.
        const SYNTHETIC = 1 << 1;
        /// First instruction covered by a try region.
        const TRY_ENTER = 1 << 2;
        /// Last instruction covered by a try region.
        const TRY_LEAVE = 1 << 3;
        /// Owned by a parent argument slot instead of a block list.
        const WRAPPED = 1 << 4;
        /// Removed from the method; the arena slot is kept to preserve ids.
        const REMOVED = 1 << 5;
    }
}

/// A single instruction node.
///
/// Nodes are owned by the method's instruction arena and referenced by id
/// from exactly one place: a block's instruction list, or a parent
/// instruction's [`InsnArg::Wrapped`] slot once expression inlining has run.
#[derive(Debug, Clone)]
pub struct InsnNode {
    /// The operation tag.
    pub opcode: Opcode,
    /// Argument slots.
    pub args: Vec<InsnArg>,
    /// The register defined by this instruction, if any.
    pub result: Option<RegisterArg>,
    /// Source offset; `None` for synthesized instructions.
    pub offset: Option<u32>,
    /// Pass side-channel flags.
    pub flags: InsnFlags,
    /// The try/catch region covering this instruction, if any.
    pub catch: Option<TryBlockId>,
    /// Branch destinations by offset, from the pre-parsed jump attributes.
    pub jump_targets: Vec<u32>,
}

impl InsnNode {
    /// Creates an instruction with the given tag and arguments.
    #[must_use]
    pub fn new(opcode: Opcode, args: Vec<InsnArg>) -> Self {
        Self {
            opcode,
            args,
            result: None,
            offset: None,
            flags: InsnFlags::empty(),
            catch: None,
            jump_targets: Vec::new(),
        }
    }

    /// Sets the result register.
    #[must_use]
    pub fn with_result(mut self, reg: u16) -> Self {
        self.result = Some(RegisterArg::new(reg));
        self
    }

    /// Sets the source offset.
    #[must_use]
    pub fn at_offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Creates a synthetic no-op (carrier for try-region markers).
    #[must_use]
    pub fn synthetic_nop(offset: u32) -> Self {
        let mut insn = Self::new(Opcode::Nop, Vec::new()).at_offset(offset);
        insn.flags |= InsnFlags::SYNTHETIC;
        insn
    }

    /// Returns the literal value if this is a `Const` (or a `Move` whose
    /// single argument is a literal).
    #[must_use]
    pub fn literal_value(&self) -> Option<&LiteralValue> {
        match self.opcode {
            Opcode::Const | Opcode::Move => match self.args.first() {
                Some(InsnArg::Lit(lit)) => Some(&lit.value),
                _ => None,
            },
            _ => None,
        }
    }

    /// Returns the resolved type of the argument at `index`, if known.
    #[must_use]
    pub fn arg_type(&self, index: usize) -> ArgType {
        match self.args.get(index) {
            Some(InsnArg::Reg(r)) => r.typ.clone(),
            Some(InsnArg::Lit(l)) => l.typ.clone(),
            _ => ArgType::Unknown,
        }
    }

    /// Returns `true` if the instruction is flagged [`InsnFlags::REMOVED`].
    #[must_use]
    pub fn is_removed(&self) -> bool {
        self.flags.contains(InsnFlags::REMOVED)
    }

    /// Returns `true` if any argument is a register bound to `var`.
    #[must_use]
    pub fn uses_var(&self, var: crate::ir::VarId) -> bool {
        self.args
            .iter()
            .any(|a| matches!(a, InsnArg::Reg(r) if r.var == Some(var)))
    }
}
