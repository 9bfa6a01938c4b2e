//! Function-level IR for the skein kernel compiler.
//!
//! A compact, mutable IR shaped like a linked compute module: a
//! [`Module`] owns an ordered list of [`Function`]s; a function owns its
//! basic blocks, instructions, and SSA values. All cross-references are
//! `Copy` index handles ([`FuncId`], [`InstId`], [`BlockId`],
//! [`Value`]), so passes can hold work lists and maps without fighting
//! the borrow checker over pointers.
//!
//! # Module Organization
//!
//! - [`types`] - scalar types, signatures, linkage, calling conventions
//! - [`func`] - functions, blocks, instructions, values
//! - [`module`] - the module and function handles
//! - [`builder`] - instruction builder with insert-before support
//! - [`clone`] - function body cloning with callee remapping
//! - [`print`] - deterministic textual output
//!
//! Call sites always name their callee directly; [`InstData::CallIndirect`]
//! exists so passes that cannot handle virtual calls have something
//! concrete to reject.

pub mod builder;
pub mod clone;
pub mod error;
pub mod func;
pub mod module;
pub mod print;
pub mod types;

#[cfg(test)]
pub mod test;

pub use builder::FunctionBuilder;
pub use clone::clone_function_body;
pub use error::{Error, Result};
pub use func::{BinaryOp, Block, BlockId, Function, InstData, InstId, Subprogram, Value, ValueDef};
pub use module::{FuncId, Module};
pub use print::function_to_string;
pub use types::{CallingConv, Linkage, PointerWidth, Signature, Type};
