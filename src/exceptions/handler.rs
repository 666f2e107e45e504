//! Exception handler and try/catch region objects.

use crate::{cfg::BlockId, types::TypeRef};

/// Identifier of an [`ExceptionHandler`] in a method's handler table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(pub u32);

impl HandlerId {
    /// Returns the table index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Identifier of a [`TryCatchBlock`] in a method's region table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TryBlockId(pub u32);

impl TryBlockId {
    /// Returns the table index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One exception handler: an entry point plus the catch types it declares.
///
/// A handler registered at an offset is shared by every try range that
/// targets that offset; only its owning [`TryCatchBlock`] back-reference
/// points at the region that created it first.
#[derive(Debug, Clone)]
pub struct ExceptionHandler {
    /// Entry offset of the handler code.
    pub offset: u32,
    /// Entry block, resolved once catch attributes are attached.
    pub block: Option<BlockId>,
    /// Declared catch types. Empty means catch-all.
    pub catch_types: Vec<TypeRef>,
    /// The region that first registered this handler.
    pub owner: TryBlockId,
    /// Blocks dominated by the handler entry, collected by the post-pass.
    pub region: Vec<BlockId>,
}

impl ExceptionHandler {
    pub(crate) fn new(offset: u32, owner: TryBlockId) -> Self {
        Self {
            offset,
            block: None,
            catch_types: Vec::new(),
            owner,
            region: Vec::new(),
        }
    }

    /// Returns `true` if this handler catches everything.
    #[must_use]
    pub fn is_catch_all(&self) -> bool {
        self.catch_types.is_empty()
    }

    /// Adds a declared catch type, ignoring duplicates accumulated across
    /// try ranges that share this handler.
    pub(crate) fn add_catch_type(&mut self, typ: TypeRef) {
        if !self.catch_types.contains(&typ) {
            self.catch_types.push(typ);
        }
    }
}

/// The set of handlers guarding one try region.
///
/// Instructions covered by the region carry this block's id as their catch
/// attribute.
#[derive(Debug, Clone, Default)]
pub struct TryCatchBlock {
    /// Handlers in declaration order, shadow-filtered at construction time.
    pub handlers: Vec<HandlerId>,
}

impl TryCatchBlock {
    /// Returns `true` if `handler` belongs to this region.
    #[must_use]
    pub fn contains(&self, handler: HandlerId) -> bool {
        self.handlers.contains(&handler)
    }
}
