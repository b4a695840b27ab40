// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(unknown_lints)]
#![allow(clippy::doc_lazy_continuation)]
// Use README.md as crate documentation.
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/README.md"))]

//! ```text
//!  compile(Module, EngineConfig) -> CompiledModule
//!  instantiate(CompiledModule, imports) -> Instance
//!  instance.call(export_name, args).await -> Result<Option<Value>, Trap>
//! ```
//!
//! The pipeline above is the whole external surface. Everything else —
//! classification, sequence registration, the clean/dirty gate, the
//! recursive evaluator — exists to make `call`'s future a cheap, cooperative
//! thing to hold onto across host calls and debugger hooks, not something a
//! caller needs to reach past this module to use.

mod ast;
mod classifier;
mod compiler;
mod debug;
mod eval;
mod frame;
mod instance;
mod module;
mod scheduler;
mod tracer;
mod trap;
mod value;

pub use ast::{
    BinaryOp, BlockType, Expr, ExprKind, ExprRef, FuncBody, FuncDesc, FuncType, GlobalDesc,
    GlobalType, LabelTarget, MemArg, MemoryDesc, Module, NodeId, TableDesc, UnaryOp, ValType,
    PAGE_SIZE,
};
pub use frame::{FrameSnapshot, SuspendReason};
pub use instance::Instance;
pub use module::{compile, instantiate, CompiledModule, EngineConfig};
pub use scheduler::{DebuggerHook, HostFunction, LocalBoxFuture};
pub use trap::{Trap, TrapKind};
pub use value::Value;
