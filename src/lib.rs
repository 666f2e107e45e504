// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # regscope
//!
//! A framework for reconstructing structured program representations from
//! register-based virtual machine bytecode. `regscope` recovers what a
//! forward compiler discarded: the control-flow graph, the exception-handling
//! regions, and the nested expression trees behind a flat, offset-addressed
//! instruction stream.
//!
//! ## Features
//!
//! - **Control-flow recovery** - Basic-block splitting, dominator trees,
//!   natural loop detection, and bounded structural repair of degenerate
//!   graph shapes
//! - **Exception region reconstruction** - Raw try/catch ranges mapped onto
//!   the block graph, shared handler deduplication, and shadowed-handler
//!   removal through a catch-type lattice
//! - **Expression reconstruction** - SSA-driven constant inlining,
//!   redundant-move elimination, and single-use expression-tree inlining
//!   with reorder-safety checks
//! - **Parallel batch processing** - Methods share nothing mutable and run
//!   one per worker; a malformed method fails alone, never the batch
//!
//! ## Quick Start
//!
//! Add `regscope` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! regscope = "0.2"
//! ```
//!
//! ### Using the Prelude
//!
//! For convenient access to the most commonly used types, import the
//! prelude:
//!
//! ```rust
//! use regscope::prelude::*;
//!
//! let raw = RawMethod {
//!     instructions: vec![Some(InsnNode::new(Opcode::Return, vec![]))],
//!     ..RawMethod::default()
//! };
//! let result = process_method(raw, &TypeHierarchy::new());
//! assert!(result.status.is_ok());
//! ```
//!
//! ### Basic Usage
//!
//! ```rust
//! use regscope::ir::{InsnArg, InsnNode, JumpRecord, Opcode, RawMethod};
//! use regscope::pipeline::process_batch;
//! use regscope::types::TypeHierarchy;
//!
//! // The type hierarchy is built once and shared read-only by all workers.
//! let types = TypeHierarchy::new();
//! types.add_class("java.lang.Exception", Some("java.lang.Throwable"));
//!
//! let method = RawMethod {
//!     instructions: vec![
//!         Some(InsnNode::new(Opcode::If, vec![InsnArg::reg(0)])),
//!         Some(InsnNode::new(Opcode::Return, vec![])),
//!         Some(InsnNode::new(Opcode::Return, vec![])),
//!     ],
//!     jumps: vec![JumpRecord::new(0, 2)],
//!     ..RawMethod::default()
//! };
//!
//! for result in process_batch(vec![method], &types) {
//!     assert!(result.status.is_ok());
//! }
//! ```
//!
//! ## Architecture
//!
//! Per-method processing runs three stages in a fixed order, each mutating
//! one shared [`crate::ir::MethodBody`] in place:
//!
//! 1. [`cfg`] - block splitting, edge wiring, dominators, loops, and the
//!    bounded repair fixpoint
//! 2. [`exceptions`] - handler construction, shadow removal, catch
//!    attribute and exception edge attachment
//! 3. [`expr`] - constant/move inlining and expression-tree reconstruction
//!    over externally supplied SSA form
//!
//! The [`pipeline`] module drives the stages per method and schedules
//! batches across a worker pool.

pub mod cfg;
pub(crate) mod error;
pub mod exceptions;
pub mod expr;
pub mod ir;
pub mod pipeline;
pub mod prelude;
pub mod types;
pub mod utils;

pub use error::Error;

/// Convenience alias for a [`Result`](std::result::Result) carrying
/// [`enum@Error`].
pub type Result<T> = std::result::Result<T, Error>;
