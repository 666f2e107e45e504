//! Instruction arguments: registers, literals, and wrapped sub-expressions.
//!
//! Arguments are a tagged union. A [`InsnArg::Reg`] reads a VM register (and,
//! once SSA is attached, a specific SSA version of it). A [`InsnArg::Lit`] is
//! an immediate produced by constant inlining. A [`InsnArg::Wrapped`] embeds
//! another instruction as a sub-expression, which is how flat three-address
//! code grows back into expression trees: the wrapped instruction is removed
//! from its block's instruction list and owned by the argument slot instead.

use crate::ir::{InsnId, VarId};

/// The value type carried by a register or literal argument.
///
/// This is deliberately coarse. The reconstruction passes only need enough
/// typing to keep literals printable and to pin down the declared type of
/// exception variables; full type inference belongs to a later phase.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ArgType {
    /// Not yet known.
    #[default]
    Unknown,
    /// Any integral primitive.
    Int,
    /// Any floating primitive.
    Float,
    /// A boolean.
    Boolean,
    /// A reference type with a class name.
    Object(String),
}

impl ArgType {
    /// Returns `true` for reference types.
    #[must_use]
    pub fn is_object(&self) -> bool {
        matches!(self, ArgType::Object(_))
    }
}

/// A literal constant value.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    /// An integral constant (covers booleans and chars as well).
    Int(i64),
    /// A floating constant.
    Float(f64),
    /// The null reference.
    Null,
}

impl LiteralValue {
    /// Returns `true` for `0`, `0.0` and `null`.
    ///
    /// Zero/null literals must not be substituted into call receivers or
    /// array-length operands; see the constant inlining pass.
    #[must_use]
    pub fn is_zero_or_null(&self) -> bool {
        match self {
            LiteralValue::Int(v) => *v == 0,
            LiteralValue::Float(v) => *v == 0.0,
            LiteralValue::Null => true,
        }
    }
}

impl std::fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LiteralValue::Int(v) => write!(f, "{v}"),
            LiteralValue::Float(v) => write!(f, "{v}"),
            LiteralValue::Null => f.write_str("null"),
        }
    }
}

/// A reference to a VM register, optionally bound to an SSA variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterArg {
    /// The register number.
    pub reg: u16,
    /// The SSA variable this occurrence is bound to, once SSA is attached.
    pub var: Option<VarId>,
    /// The resolved value type of this occurrence.
    pub typ: ArgType,
}

impl RegisterArg {
    /// Creates an untyped, unbound register reference.
    #[must_use]
    pub fn new(reg: u16) -> Self {
        Self {
            reg,
            var: None,
            typ: ArgType::Unknown,
        }
    }

    /// Creates a typed register reference.
    #[must_use]
    pub fn typed(reg: u16, typ: ArgType) -> Self {
        Self {
            reg,
            var: None,
            typ,
        }
    }
}

/// A literal argument with its resolved type.
#[derive(Debug, Clone, PartialEq)]
pub struct LiteralArg {
    /// The constant value.
    pub value: LiteralValue,
    /// The type the value had at its original use site.
    pub typ: ArgType,
}

/// One argument slot of an instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum InsnArg {
    /// A register read.
    Reg(RegisterArg),
    /// An immediate constant.
    Lit(LiteralArg),
    /// An instruction used as a sub-expression of this one.
    ///
    /// Ownership of the wrapped instruction moves out of the block list into
    /// this slot; the id stays valid in the method's instruction arena.
    Wrapped(InsnId),
}

impl InsnArg {
    /// Creates a register argument.
    #[must_use]
    pub fn reg(reg: u16) -> Self {
        InsnArg::Reg(RegisterArg::new(reg))
    }

    /// Creates an integer literal argument.
    #[must_use]
    pub fn lit_int(value: i64) -> Self {
        InsnArg::Lit(LiteralArg {
            value: LiteralValue::Int(value),
            typ: ArgType::Int,
        })
    }

    /// Creates a null literal argument.
    #[must_use]
    pub fn lit_null() -> Self {
        InsnArg::Lit(LiteralArg {
            value: LiteralValue::Null,
            typ: ArgType::Unknown,
        })
    }

    /// Returns the register reference if this is a register argument.
    #[must_use]
    pub fn as_reg(&self) -> Option<&RegisterArg> {
        match self {
            InsnArg::Reg(r) => Some(r),
            _ => None,
        }
    }

    /// Returns the literal if this is a literal argument.
    #[must_use]
    pub fn as_lit(&self) -> Option<&LiteralArg> {
        match self {
            InsnArg::Lit(l) => Some(l),
            _ => None,
        }
    }

    /// Returns the wrapped instruction id if this is a wrapped argument.
    #[must_use]
    pub fn as_wrapped(&self) -> Option<InsnId> {
        match self {
            InsnArg::Wrapped(id) => Some(*id),
            _ => None,
        }
    }
}
