//! The input surface supplied by the bytecode-loading front end.
//!
//! The loader hands over a flat, offset-indexed instruction array (holes are
//! permitted in mid-instruction regions), pre-parsed jump records, and raw
//! try-range records. Nothing here is interpreted yet; the CFG and exception
//! builders consume these as-is.

use crate::{
    ir::{ArgType, InsnNode},
    types::TypeRef,
};

/// A pre-parsed jump attribute: one branch from `source` to `dest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JumpRecord {
    /// Offset of the branching instruction.
    pub source: u32,
    /// Offset of the branch destination.
    pub dest: u32,
}

impl JumpRecord {
    /// Creates a jump record.
    #[must_use]
    pub fn new(source: u32, dest: u32) -> Self {
        Self { source, dest }
    }
}

/// A raw try/catch range record.
///
/// Covers instruction offsets `start..end`. Each handler entry pairs the
/// handler's entry offset with its declared catch type; `None` marks a
/// catch-all entry, as does the separate `catch_all` offset.
#[derive(Debug, Clone, PartialEq)]
pub struct TryRange {
    /// First covered offset (inclusive).
    pub start: u32,
    /// End of the covered range (exclusive).
    pub end: u32,
    /// `(handler offset, declared catch type)` pairs.
    pub handlers: Vec<(u32, Option<TypeRef>)>,
    /// Offset of the catch-all handler, if present.
    pub catch_all: Option<u32>,
}

/// A method as delivered by the loader.
///
/// `instructions` is indexed by offset; `None` entries are holes inside
/// multi-unit instructions.
#[derive(Debug, Clone, Default)]
pub struct RawMethod {
    /// Offset-indexed instruction array.
    pub instructions: Vec<Option<InsnNode>>,
    /// Pre-parsed jump attributes.
    pub jumps: Vec<JumpRecord>,
    /// Raw try/catch ranges.
    pub try_ranges: Vec<TryRange>,
    /// The declared return type; `None` for void methods.
    pub ret_type: Option<ArgType>,
}

impl RawMethod {
    /// Creates an empty method description.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}
