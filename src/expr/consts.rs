//! Constant and literal-move inlining.
//!
//! A `Const` (or a `Move` whose argument has already become a literal)
//! defines a value every use site can absorb as an immediate. Substituting
//! it turns downstream `Move`s into literal producers themselves, so chains
//! collapse recursively, guarded by an explicit depth bound.
//!
//! Zero and null literals are never substituted into a call receiver or an
//! array-length operand: `null.foo()` is not emittable and the explicit
//! variable keeps the null check visible. The defining link of the chain is
//! pinned with [`InsnFlags::DONT_INLINE`] instead, which also keeps the
//! tree inliner from wrapping it into the same slot later.

use crate::{
    expr::owning_block,
    ir::{ArgType, InsnArg, InsnFlags, InsnId, InvokeKind, LiteralArg, LiteralValue, MethodBody, Opcode},
    Error, Result,
};

/// Maximum depth of a constant/move chain before the method is rejected.
pub(crate) const RECURSION_LIMIT: usize = 100;

/// Runs constant inlining over every live instruction.
///
/// Returns `true` if any substitution or removal happened.
///
/// # Errors
///
/// - [`Error::RecursionLimit`] for move chains deeper than the bound
/// - consistency errors from instruction removal
pub fn run(body: &mut MethodBody) -> Result<bool> {
    let mut changed = false;
    for block in body.block_ids().collect::<Vec<_>>() {
        for insn in body.block(block).insns.clone() {
            changed |= try_inline(body, insn, 0)?;
        }
    }
    Ok(changed)
}

/// Substitutes one literal definition at its use sites, recursing into
/// moves that became literal-valued through the substitution.
fn try_inline(body: &mut MethodBody, insn: InsnId, depth: usize) -> Result<bool> {
    if depth >= RECURSION_LIMIT {
        return Err(Error::RecursionLimit(RECURSION_LIMIT));
    }
    let node = body.insn(insn);
    if node.is_removed() || node.flags.contains(InsnFlags::DONT_INLINE) {
        return Ok(false);
    }
    let Some(value) = node.literal_value().cloned() else {
        return Ok(false);
    };
    let Some(var) = node.result.as_ref().and_then(|r| r.var) else {
        return Ok(false);
    };

    let mut changed = false;
    let mut blocked = false;
    for use_insn in body.var(var).uses().to_vec() {
        let slots: Vec<usize> = body
            .insn(use_insn)
            .args
            .iter()
            .enumerate()
            .filter(|(_, a)| matches!(a, InsnArg::Reg(r) if r.var == Some(var)))
            .map(|(index, _)| index)
            .collect();
        for index in slots {
            if forbidden_substitution(body, use_insn, index, &value) {
                body.insn_mut(insn).flags |= InsnFlags::DONT_INLINE;
                blocked = true;
                continue;
            }
            let mut typ = body.insn(use_insn).arg_type(index);
            if typ == ArgType::Unknown {
                typ = body.insn(insn).arg_type(0);
            }
            body.replace_arg_with_lit(
                use_insn,
                index,
                InsnArg::Lit(LiteralArg {
                    value: value.clone(),
                    typ,
                }),
            );
            changed = true;
            if body.insn(use_insn).opcode == Opcode::Move {
                try_inline(body, use_insn, depth + 1)?;
            }
        }
    }

    if changed && !blocked && body.var(var).use_count() == 0 {
        if let Some(block) = owning_block(body, insn) {
            body.remove_insn(block, insn)?;
        }
    }
    Ok(changed)
}

/// Returns `true` when substituting `value` into the argument would produce
/// an illegal or misleading expression.
fn forbidden_substitution(
    body: &MethodBody,
    use_insn: InsnId,
    index: usize,
    value: &LiteralValue,
) -> bool {
    if !value.is_zero_or_null() {
        return false;
    }
    match body.insn(use_insn).opcode {
        Opcode::Invoke(InvokeKind::Virtual) | Opcode::Construct => index == 0,
        Opcode::ArrayLength => true,
        _ => false,
    }
}
