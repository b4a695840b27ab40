// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The live instantiation state plus the public debugger-facing surface:
//! [`Instance`] owns everything one instantiation needs at run time —
//! compiled functions, globals, linear memory, the function table, the
//! tracer stack, and the debug registry — and is the thing `compiled.rs`'s
//! `instantiate` hands back.
//!
//! `Instance` is a thin `Rc`-wrapped handle (`Clone`, cheap) rather than an
//! owned value, because evaluating a `Call` node means recursively invoking
//! another function *on this same instance*, and that recursive call has to
//! own an instance reference that outlives the borrow of whichever `Frame`
//! is currently executing — the same `Rc<RefCell<...>>` shape solves this
//! wherever a tree-walking evaluator needs to re-enter itself.

use std::cell::{Cell, RefCell};
use std::ops::Deref;
use std::rc::Rc;

use futures::future::FutureExt;
use indexmap::IndexMap;

use crate::ast::{FuncBody, GlobalType};
use crate::debug::{BreakpointIndex, DebugRegistry};
use crate::eval;
use crate::frame::{Frame, FrameSnapshot};
use crate::module::CompiledModule;
use crate::scheduler::{DebuggerHook, HostFunction, LocalBoxFuture};
use crate::tracer::TracerStack;
use crate::trap::{Trap, TrapKind};
use crate::value::Value;

/// A function slot, indexed the same way as `CompiledModule::decoded.funcs`.
pub(crate) enum FunctionSlot {
    Local(Rc<crate::compiler::CompiledFunction>),
    Import(Rc<dyn HostFunction>),
}

pub struct InstanceInner {
    pub(crate) module: Rc<CompiledModule>,
    pub(crate) functions: Vec<FunctionSlot>,
    pub(crate) globals: Vec<RefCell<Value>>,
    pub(crate) memory: Option<Rc<RefCell<Vec<u8>>>>,
    pub(crate) table: Vec<Option<u32>>,
    pub(crate) tracer: TracerStack,
    pub(crate) debug: RefCell<DebugRegistry>,
    pub(crate) debugger_hook: RefCell<Option<DebuggerHook>>,
    pub(crate) step_count: Cell<u64>,
    exports_by_name: IndexMap<String, u32>,
    globals_by_name: IndexMap<String, u32>,
}

/// A handle to one instantiation. Cheap to `Clone` (one `Rc` bump); every
/// clone refers to the same live memory, globals, and tracer stack.
#[derive(Clone)]
pub struct Instance(Rc<InstanceInner>);

impl Deref for Instance {
    type Target = InstanceInner;
    fn deref(&self) -> &InstanceInner {
        &self.0
    }
}

impl Instance {
    pub(crate) fn new(
        module: Rc<CompiledModule>,
        mut imports: IndexMap<(String, String), Rc<dyn HostFunction>>,
    ) -> anyhow::Result<Instance> {
        let mut functions = Vec::with_capacity(module.decoded.funcs.len());
        let mut exports_by_name = IndexMap::new();
        for (i, desc) in module.decoded.funcs.iter().enumerate() {
            let slot = match &desc.body {
                FuncBody::Local { .. } => {
                    let compiled = module.functions[i]
                        .as_ref()
                        .expect("local function body was compiled")
                        .clone();
                    FunctionSlot::Local(compiled)
                }
                FuncBody::Import { module: m, name } => {
                    let host = imports.swap_remove(&(m.clone(), name.clone())).ok_or_else(|| {
                        anyhow::anyhow!("missing import {m}.{name} required by function {}", desc.name)
                    })?;
                    FunctionSlot::Import(host)
                }
            };
            functions.push(slot);
            if let Some(export_name) = &desc.export_name {
                exports_by_name.insert(export_name.clone(), i as u32);
            }
        }

        let globals = module
            .decoded
            .globals
            .iter()
            .map(|g| RefCell::new(g.init))
            .collect();
        let mut globals_by_name = IndexMap::new();
        for (i, g) in module.decoded.globals.iter().enumerate() {
            if let Some(name) = &g.export_name {
                globals_by_name.insert(name.clone(), i as u32);
            }
        }

        let memory = module
            .decoded
            .memory
            .as_ref()
            .map(|m| Rc::new(RefCell::new(vec![0u8; m.initial_pages as usize * crate::ast::PAGE_SIZE])));

        let table = module
            .decoded
            .table
            .as_ref()
            .map(|t| {
                let mut elems = vec![None; t.initial as usize];
                for (slot, elem) in elems.iter_mut().zip(module.decoded.table_elements.iter()) {
                    *slot = *elem;
                }
                elems
            })
            .unwrap_or_default();

        let debug = RefCell::new(DebugRegistry::new(module.layout.clone()));

        let inner = InstanceInner {
            module,
            functions,
            globals,
            memory,
            table,
            tracer: TracerStack::new(),
            debug,
            debugger_hook: RefCell::new(None),
            step_count: Cell::new(0),
            exports_by_name,
            globals_by_name,
        };
        let instance = Instance(Rc::new(inner));
        if instance.0.module.config.initial_single_step_flag() {
            instance.0.debug.borrow_mut().set_single_step(true);
        }
        Ok(instance)
    }

    /// Invoke the exported function `name` — exports are suspendable
    /// operations. Rejects re-entrant top-level calls while a previous
    /// invocation on this instance is still suspended, failing fast with
    /// `Trap::Reentrant` rather than interleaving two calls on one frame
    /// stack.
    pub async fn call(&self, name: &str, args: Vec<Value>) -> Result<Option<Value>, Trap> {
        let index = *self
            .exports_by_name
            .get(name)
            .unwrap_or_else(|| panic!("no exported function named {name:?}"));
        if !self.tracer.is_empty() {
            return Err(Trap::new(crate::ast::NodeId(0), TrapKind::Reentrant));
        }
        self.call_function(index, args).await
    }

    /// Entry point used both by the public `call` above and by `Call`/
    /// `CallIndirect` node evaluation — internal nested calls are ordinary
    /// recursion, not re-entrancy, so they skip the check in `call`.
    pub(crate) fn call_function(
        &self,
        index: u32,
        args: Vec<Value>,
    ) -> LocalBoxFuture<'_, Result<Option<Value>, Trap>> {
        let this = self.clone();
        async move {
            match &this.functions[index as usize] {
                FunctionSlot::Import(host) => host
                    .call(&args)
                    .await
                    .map_err(|e| Trap::with_message(crate::ast::NodeId(0), TrapKind::ImportError, e.to_string())),
                FunctionSlot::Local(compiled) => this.run_compiled(compiled.clone(), args).await,
            }
        }
        .boxed_local()
    }

    async fn run_compiled(
        &self,
        compiled: Rc<crate::compiler::CompiledFunction>,
        args: Vec<Value>,
    ) -> Result<Option<Value>, Trap> {
        let mut locals: Vec<Value> = Vec::with_capacity(compiled.local_types.len());
        for (i, ty) in compiled.local_types.iter().enumerate() {
            locals.push(match args.get(i) {
                Some(v) => v.coerce(*ty),
                None => Value::default_for(*ty),
            });
        }

        let entry_loc = compiled
            .body
            .first()
            .map(|e| e.id)
            .unwrap_or(crate::ast::NodeId(0));
        let mut frame = Frame::new(compiled.name.clone(), locals, entry_loc);
        frame.stack.reserve(compiled.max_stack_depth);
        let frame = Rc::new(RefCell::new(frame));

        self.tracer.push(frame.clone());
        let _guard = TracerGuard { tracer: &self.tracer };

        let cx = eval::EvalCtx {
            instance: self,
            frame: frame.clone(),
        };
        let flow = eval::eval_body(&compiled.body, &cx).await?;
        match flow {
            eval::Flow::Value(v) | eval::Flow::Return(v) => Ok(v),
            eval::Flow::Break { .. } => {
                unreachable!("branch target escaped its function body (validation bug upstream)")
            }
        }
    }

    /// Indirect-call helper: resolves a table slot and checks its signature
    /// against the expected type before dispatching.
    pub(crate) fn resolve_table_call(
        &self,
        table_index: u32,
        type_index: u32,
        elem_index: i64,
    ) -> Result<u32, TrapKind> {
        let _ = table_index; // MVP has at most one table.
        let idx = usize::try_from(elem_index).map_err(|_| TrapKind::TableOutOfBounds)?;
        let Some(Some(func_index)) = self.table.get(idx) else {
            return Err(TrapKind::TableOutOfBounds);
        };
        let actual_type = self.module.decoded.func_type_indices[*func_index as usize];
        if actual_type != type_index {
            return Err(TrapKind::IndirectCallTypeMismatch);
        }
        Ok(*func_index)
    }

    pub(crate) async fn invoke_debugger_hook(&self, loc: crate::ast::NodeId) -> Result<(), Trap> {
        let hook = self.debugger_hook.borrow().clone();
        if let Some(hook) = hook {
            hook()
                .await
                .map_err(|e| Trap::with_message(loc, TrapKind::DebuggerAbort, e.to_string()))?;
        }
        Ok(())
    }

    pub fn set_debugger(&self, hook: Option<DebuggerHook>) {
        *self.debugger_hook.borrow_mut() = hook;
    }

    pub fn set_single_step(&self, on: bool) {
        self.debug.borrow_mut().set_single_step(on);
    }

    pub fn single_step(&self) -> bool {
        self.debug.borrow().single_step()
    }

    pub fn set_breakpoint(&self, loc: crate::ast::NodeId) {
        self.debug.borrow_mut().set_breakpoint(loc);
    }

    pub fn clear_breakpoint(&self, loc: crate::ast::NodeId) {
        self.debug.borrow_mut().clear_breakpoint(loc);
    }

    pub fn has_breakpoint(&self, loc: crate::ast::NodeId) -> bool {
        self.debug.borrow().has_breakpoint(loc)
    }

    pub fn breakpoints(&self) -> Vec<crate::ast::NodeId> {
        self.debug.borrow().breakpoints()
    }

    /// Snapshot the frames in the half-open range `[start, end)`, negatives
    /// counted from the end of the live tracer stack. Innermost frame
    /// first.
    pub fn stack_trace(&self, start: Option<i64>, end: Option<i64>) -> Vec<FrameSnapshot> {
        let all = self.tracer.snapshot();
        let len = all.len() as i64;
        let resolve = |v: i64| -> i64 {
            if v < 0 {
                (len + v).max(0)
            } else {
                v.min(len)
            }
        };
        let start = resolve(start.unwrap_or(0));
        let end = resolve(end.unwrap_or(len));
        if start >= end {
            return vec![];
        }
        all[start as usize..end as usize].to_vec()
    }

    pub fn global_get(&self, name: &str) -> Option<Value> {
        let i = *self.globals_by_name.get(name)?;
        Some(*self.globals[i as usize].borrow())
    }

    pub fn global_set(&self, name: &str, v: Value) -> Option<()> {
        let i = *self.globals_by_name.get(name)?;
        let ty = self.module.decoded.globals[i as usize].ty;
        self.set_global_by_index(i, v, ty);
        Some(())
    }

    pub(crate) fn set_global_by_index(&self, i: u32, v: Value, ty: GlobalType) {
        *self.globals[i as usize].borrow_mut() = v.coerce(ty.ty);
    }

    pub(crate) fn global_by_index(&self, i: u32) -> Value {
        *self.globals[i as usize].borrow()
    }

    /// The current linear memory size, in pages, or `0` if the instance has
    /// no memory.
    pub fn memory_size_pages(&self) -> i32 {
        self.memory
            .as_ref()
            .map(|m| crate::compiler::memory_ops::size_pages(&m.borrow()))
            .unwrap_or(0)
    }

    /// Copy `len` bytes starting at `offset` out of linear memory, for host
    /// glue that wants to read a module's memory between calls.
    pub fn memory_read(&self, offset: usize, len: usize) -> Option<Vec<u8>> {
        let mem = self.memory.as_ref()?.borrow();
        mem.get(offset..offset + len).map(|s| s.to_vec())
    }

    pub fn memory_write(&self, offset: usize, bytes: &[u8]) -> Option<()> {
        let mut mem = self.memory.as_ref()?.borrow_mut();
        mem.get_mut(offset..offset + bytes.len())?.copy_from_slice(bytes);
        Some(())
    }

    pub(crate) fn breakpoint_index(&self, loc: crate::ast::NodeId) -> Option<BreakpointIndex> {
        self.debug.borrow().index_of(loc)
    }
}

/// Guarantees the tracer pop happens even if the invocation traps, the
/// debugger hook aborts, or the top-level future is dropped before it
/// resolves — dropping the top-level future is itself a cooperative
/// cancellation, not a special case.
struct TracerGuard<'a> {
    tracer: &'a TracerStack,
}

impl Drop for TracerGuard<'_> {
    fn drop(&mut self) {
        self.tracer.pop();
    }
}
