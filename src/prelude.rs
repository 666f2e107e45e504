//! # regscope Prelude
//!
//! This module provides a convenient prelude for the most commonly used
//! types from the regscope library. Import this module to get quick access
//! to the essentials for bytecode reconstruction.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all regscope operations
pub use crate::Error;

/// The result type used throughout regscope
pub use crate::Result;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Per-method and batch processing drivers
pub use crate::pipeline::{process_batch, process_method, process_method_with};

/// Per-method processing outcome
pub use crate::pipeline::{MethodResult, MethodStatus};

// ================================================================================================
// Instruction Model
// ================================================================================================

/// The method under reconstruction and its arena ids
pub use crate::ir::{InsnId, MethodBody, VarId};

/// Instruction nodes, arguments and flags
pub use crate::ir::{ArgType, ArithOp, InsnArg, InsnFlags, InsnNode, InvokeKind, Opcode};

/// The loader-facing input surface
pub use crate::ir::{JumpRecord, RawMethod, TryRange};

/// SSA variable metadata
pub use crate::ir::{CodeVar, CodeVarId, SsaVar};

// ================================================================================================
// Control Flow
// ================================================================================================

/// Basic blocks, edges and loop records
pub use crate::cfg::{BlockFlags, BlockId, BlockNode, Edge, EdgeKind, LoopInfo};

// ================================================================================================
// Exceptions and Types
// ================================================================================================

/// Exception handlers and try/catch regions
pub use crate::exceptions::{ExceptionHandler, HandlerId, TryBlockId, TryCatchBlock};

/// The catch-type lattice
pub use crate::types::{TypeHierarchy, TypeRef};
