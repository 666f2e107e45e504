//! Exception handler and try/catch region reconstruction.
//!
//! Maps the loader's raw try-range records onto the block graph: builds the
//! shared handler table, removes shadowed handlers through the catch-type
//! lattice, stamps catch attributes onto covered instructions, and wires
//! exceptional edges so handlers participate in dominator and loop analysis
//! like any other block.
//!
//! # Pipeline position
//!
//! [`attach`] runs right after CFG construction and before the structural
//! repair fixpoint, because handler blocks are only reachable once their
//! exception edges exist. [`finish`] runs after repair, when dominators are
//! final, to collect handler regions and block-level try membership.

mod handler;
mod regions;

pub use handler::{ExceptionHandler, HandlerId, TryBlockId, TryCatchBlock};
pub use regions::{attach, finish};
