// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The module-level glue above the compiler: [`EngineConfig`], [`compile`],
//! and [`CompiledModule`], the compiler's output shared read-only by every
//! [`crate::instance::Instance`] instantiated from it. `instantiate` itself
//! lives on [`CompiledModule`] rather than as a free function, keeping the
//! already-parsed-state split explicit: compiling happens once, instantiating
//! happens per embedding.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::ast::{FuncBody, Module};
use crate::compiler::{self, CompileCx, CompiledFunction};
use crate::debug::DebugLayout;
use crate::instance::Instance;
use crate::scheduler::HostFunction;

/// Engine-wide knobs read once at compile/instantiate time: a small number
/// of setters on an owned value, rather than a generic options struct with
/// public fields.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    debug: bool,
    initial_single_step: bool,
    step_limit: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            debug: true,
            initial_single_step: false,
            step_limit: None,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `compile` should build the debug-enabled instrumentation at
    /// all. With this off, every sequence gate is permanently closed and no
    /// breakpoint can ever be armed — the engine still runs the exact same
    /// clean-path code, it just has nothing to turn dirty. Flipping this
    /// must never change an exported call's observable results.
    pub fn debug(mut self, on: bool) -> Self {
        self.debug = on;
        self
    }

    /// Whether newly instantiated instances start with single-step armed.
    pub fn initial_single_step(mut self, on: bool) -> Self {
        self.initial_single_step = on;
        self
    }

    /// A defensive instruction-count ceiling, unrelated to raw throughput —
    /// this bounds a runaway or adversarial module, not the interpreter's
    /// speed. `None` disables it.
    pub fn step_limit(mut self, limit: Option<u64>) -> Self {
        self.step_limit = limit;
        self
    }

    pub(crate) fn initial_single_step_flag(&self) -> bool {
        self.initial_single_step
    }

    pub(crate) fn step_limit_value(&self) -> Option<u64> {
        self.step_limit
    }
}

/// The compiler's output for one module: every locally-defined function
/// lowered to a [`CompiledFunction`], the shared [`DebugLayout`], and the
/// decoded module data instantiation needs (globals, memory/table
/// descriptors, the function table's element list).
#[derive(Debug)]
pub struct CompiledModule {
    pub(crate) decoded: Module,
    pub(crate) functions: Vec<Option<Rc<CompiledFunction>>>,
    pub(crate) layout: Rc<DebugLayout>,
    pub(crate) config: EngineConfig,
}

impl CompiledModule {
    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.decoded.funcs.iter().map(|f| f.name.as_str())
    }
}

/// Lower a decoded [`Module`] into a [`CompiledModule`]. The wire-format
/// parse itself is out of scope here; callers hand us the already-decoded
/// tree.
pub fn compile(decoded: Module, config: EngineConfig) -> CompiledModule {
    let mut cx = CompileCx::new();
    let functions = decoded
        .funcs
        .iter()
        .map(|desc| match &desc.body {
            FuncBody::Local { .. } => Some(Rc::new(compiler::compile_function(&mut cx, desc))),
            FuncBody::Import { .. } => None,
        })
        .collect();

    let layout = if config.debug {
        Rc::new(cx.layout.finish())
    } else {
        // An empty layout: every node is simply unregistered, `index_of`
        // returns `None` everywhere, and `Instance::set_breakpoint` has
        // nothing to arm — the clean path runs unconditionally.
        Rc::new(DebugLayout::default())
    };

    log::debug!(
        "compiled module with {} functions, {} breakpoint indices",
        decoded.funcs.len(),
        layout.num_indices()
    );

    CompiledModule {
        decoded,
        functions,
        layout,
        config,
    }
}

/// Instantiate `module`, binding `imports` by `(module_name, field_name)` to
/// the compiled import slots in declaration order. Surfaces `Err` if an
/// import descriptor has no matching entry in `imports` — this is eager,
/// not lazy, since exports must be ready to call immediately after
/// `instantiate` returns.
pub fn instantiate(
    module: Rc<CompiledModule>,
    imports: IndexMap<(String, String), Rc<dyn HostFunction>>,
) -> anyhow::Result<Instance> {
    Instance::new(module, imports)
}
