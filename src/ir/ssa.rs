//! SSA variable metadata.
//!
//! Each register definition site has exactly one SSA variable with a use
//! list. SSA construction itself is an external collaborator; this module
//! only holds the metadata and the consistency rules the expression
//! reconstructor depends on: use counts and definitions stay mutually
//! consistent under every instruction edit, because all edits go through
//! [`crate::ir::MethodBody`], which unregisters argument uses and result
//! definitions when an instruction is removed.
//!
//! Use lists are weak back-references: a variable stores the ids of the
//! instructions that read it, never pointers. The concrete argument slot is
//! found by scanning the using instruction's arguments for the variable.

use crate::ir::{ArgType, InsnId, VarId};

/// Identifier of a [`CodeVar`] in the method's code-variable table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodeVarId(pub u32);

/// A single-static-assignment variable.
///
/// One defining instruction, an ordered list of using instructions. The same
/// instruction id may appear more than once when it reads the variable in
/// several argument slots.
#[derive(Debug, Clone)]
pub struct SsaVar {
    /// The register this variable versions.
    pub reg: u16,
    /// The SSA version number of the register.
    pub version: u32,
    /// The defining instruction, if currently bound.
    def: Option<InsnId>,
    /// Instructions reading this variable, in registration order.
    uses: Vec<InsnId>,
    /// The declared type, once known (e.g. forced from a catch type).
    pub typ: ArgType,
    /// The code variable this SSA variable was merged into, if any.
    pub code_var: Option<CodeVarId>,
}

impl SsaVar {
    /// Creates an unbound variable for a register version.
    #[must_use]
    pub fn new(reg: u16, version: u32) -> Self {
        Self {
            reg,
            version,
            def: None,
            uses: Vec::new(),
            typ: ArgType::Unknown,
            code_var: None,
        }
    }

    /// Returns the defining instruction.
    #[must_use]
    pub fn def(&self) -> Option<InsnId> {
        self.def
    }

    /// Returns the use list.
    #[must_use]
    pub fn uses(&self) -> &[InsnId] {
        &self.uses
    }

    /// Returns the number of registered uses.
    #[must_use]
    pub fn use_count(&self) -> usize {
        self.uses.len()
    }

    pub(crate) fn set_def(&mut self, insn: Option<InsnId>) {
        self.def = insn;
    }

    pub(crate) fn add_use(&mut self, insn: InsnId) {
        self.uses.push(insn);
    }

    /// Removes one registered use of `insn`. Returns `true` if one was found.
    pub(crate) fn remove_use(&mut self, insn: InsnId) -> bool {
        if let Some(pos) = self.uses.iter().position(|&u| u == insn) {
            self.uses.remove(pos);
            true
        } else {
            false
        }
    }

    pub(crate) fn clear_uses(&mut self) {
        self.uses.clear();
    }
}

/// A source-level variable grouping one or more SSA variables.
///
/// SSA variables merged through phi joins must share a single name in the
/// emitted source; the grouping is recorded here and consumed by the
/// renaming phase.
#[derive(Debug, Clone, Default)]
pub struct CodeVar {
    /// Assigned source name, if already chosen.
    pub name: Option<String>,
    /// The SSA variables sharing this name.
    pub ssa_vars: Vec<VarId>,
    /// The declared type shared by the group.
    pub typ: ArgType,
}

impl CodeVar {
    /// Creates an anonymous group over the given SSA variables.
    #[must_use]
    pub fn of(ssa_vars: Vec<VarId>) -> Self {
        Self {
            name: None,
            ssa_vars,
            typ: ArgType::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_use_list_add_remove() {
        let mut var = SsaVar::new(3, 0);
        var.add_use(InsnId(1));
        var.add_use(InsnId(2));
        var.add_use(InsnId(1));
        assert_eq!(var.use_count(), 3);

        // Removes a single occurrence, not all of them.
        assert!(var.remove_use(InsnId(1)));
        assert_eq!(var.use_count(), 2);
        assert!(var.remove_use(InsnId(1)));
        assert!(!var.remove_use(InsnId(1)));
        assert_eq!(var.uses(), &[InsnId(2)]);
    }
}
