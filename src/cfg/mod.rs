//! Control-flow graph construction and analysis.
//!
//! The CFG builder splits a method's flat, offset-addressed instruction
//! stream into basic blocks, wires edges from the pre-parsed jump
//! attributes, computes dominators, detects natural loops, and repairs
//! structurally degenerate shapes by synthetic block insertion, iterating to
//! a fixpoint.
//!
//! # Pipeline position
//!
//! [`build`] is the first stage of per-method processing. Exception edges
//! are attached before [`repair::run`] iterates, since the dominator pass
//! treats unreachable blocks as fatal; the expression reconstructor runs
//! once the repaired graph is stable.
//!
//! # Key components
//!
//! - [`build`] - block splitting and edge wiring over a [`crate::ir::RawMethod`]
//! - [`dominators::compute`] - iterative bit-set dominator dataflow
//! - [`loops::detect`] - back-edge based natural loop detection
//! - [`repair::run`] - the bounded structural repair fixpoint

mod block;
mod builder;
pub mod dominators;
pub mod loops;
pub mod repair;

pub use block::{BlockFlags, BlockId, BlockNode, Edge, EdgeKind, LoopId};
pub use builder::build;
pub use loops::LoopInfo;
