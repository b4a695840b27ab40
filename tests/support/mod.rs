// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Shared AST-building helpers and host/debugger stand-ins for the
//! integration tests in the sibling directories. Mirrors the manual
//! `Module`/`FuncDesc`/`Expr` construction pattern already used by
//! `src/lib.rs`'s own unit tests, just factored out so every scenario doesn't
//! repeat the boilerplate.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use async_trait::async_trait;
use wasm_step::{
    BinaryOp, BlockType, DebuggerHook, Expr, ExprKind, ExprRef, FrameSnapshot, FuncBody, FuncDesc,
    FuncType, GlobalDesc, GlobalType, HostFunction, Instance, LabelTarget, MemArg, MemoryDesc,
    TableDesc, UnaryOp, ValType, Value,
};

pub fn const_i32(v: i32) -> ExprRef {
    Expr::new(Some(ValType::I32), ExprKind::Const { value: Value::I32(v) })
}

pub fn const_i64(v: i64) -> ExprRef {
    Expr::new(Some(ValType::I64), ExprKind::Const { value: Value::I64(v) })
}

pub fn const_f32(v: f32) -> ExprRef {
    Expr::new(Some(ValType::F32), ExprKind::Const { value: Value::F32(v) })
}

pub fn const_f64(v: f64) -> ExprRef {
    Expr::new(Some(ValType::F64), ExprKind::Const { value: Value::F64(v) })
}

pub fn local_get(ty: ValType, index: u32) -> ExprRef {
    Expr::new(Some(ty), ExprKind::LocalGet { index })
}

pub fn local_set(index: u32, value: ExprRef) -> ExprRef {
    Expr::new(None, ExprKind::LocalSet { index, value, tee: false })
}

pub fn local_tee(ty: ValType, index: u32, value: ExprRef) -> ExprRef {
    Expr::new(Some(ty), ExprKind::LocalSet { index, value, tee: true })
}

pub fn global_get(ty: ValType, index: u32) -> ExprRef {
    Expr::new(Some(ty), ExprKind::GlobalGet { index })
}

pub fn global_set(index: u32, value: ExprRef) -> ExprRef {
    Expr::new(None, ExprKind::GlobalSet { index, value })
}

pub fn binary(ty: ValType, op: BinaryOp, lhs: ExprRef, rhs: ExprRef) -> ExprRef {
    Expr::new(Some(ty), ExprKind::Binary { op, lhs, rhs })
}

pub fn unary(ty: ValType, op: UnaryOp, operand: ExprRef) -> ExprRef {
    Expr::new(Some(ty), ExprKind::Unary { op, operand })
}

pub fn block(ty: BlockType, body: Vec<ExprRef>) -> ExprRef {
    Expr::new(ty, ExprKind::Block { body })
}

pub fn loop_(ty: BlockType, body: Vec<ExprRef>) -> ExprRef {
    Expr::new(ty, ExprKind::Loop { body })
}

pub fn if_(ty: BlockType, cond: ExprRef, then_body: Vec<ExprRef>, else_body: Vec<ExprRef>) -> ExprRef {
    Expr::new(ty, ExprKind::If { cond, then_body, else_body })
}

pub fn brk(relative_depth: u32, is_loop: bool, value: Option<ExprRef>) -> ExprRef {
    Expr::new(None, ExprKind::Break { target: LabelTarget { relative_depth, is_loop }, value })
}

pub fn switch(index: ExprRef, targets: Vec<LabelTarget>, default: LabelTarget, value: Option<ExprRef>) -> ExprRef {
    Expr::new(None, ExprKind::Switch { index, targets, default, value })
}

pub fn call(ty: BlockType, func_index: u32, args: Vec<ExprRef>) -> ExprRef {
    Expr::new(ty, ExprKind::Call { func_index, args })
}

pub fn call_indirect(
    ty: BlockType,
    type_index: u32,
    table_index: u32,
    callee: ExprRef,
    args: Vec<ExprRef>,
) -> ExprRef {
    Expr::new(ty, ExprKind::CallIndirect { type_index, table_index, callee, args })
}

pub fn ret(value: Option<ExprRef>) -> ExprRef {
    Expr::new(None, ExprKind::Return { value })
}

pub fn unreachable_() -> ExprRef {
    Expr::new(None, ExprKind::Unreachable)
}

pub fn nop() -> ExprRef {
    Expr::new(None, ExprKind::Nop)
}

pub fn drop_(value: ExprRef) -> ExprRef {
    Expr::new(None, ExprKind::Drop { value })
}

pub fn select(ty: ValType, cond: ExprRef, a: ExprRef, b: ExprRef) -> ExprRef {
    Expr::new(Some(ty), ExprKind::Select { cond, a, b })
}

pub fn load(ty: ValType, width: u8, signed: bool, offset: u32, addr: ExprRef) -> ExprRef {
    Expr::new(Some(ty), ExprKind::Load { arg: MemArg { offset, width, signed }, addr })
}

pub fn store(width: u8, offset: u32, addr: ExprRef, value: ExprRef) -> ExprRef {
    Expr::new(None, ExprKind::Store { arg: MemArg { offset, width, signed: false }, addr, value })
}

pub fn memory_size() -> ExprRef {
    Expr::new(Some(ValType::I32), ExprKind::MemorySize)
}

pub fn memory_grow(delta: ExprRef) -> ExprRef {
    Expr::new(Some(ValType::I32), ExprKind::MemoryGrow { delta })
}

/// A locally-defined function descriptor.
pub fn local_func(
    name: &str,
    params: Vec<ValType>,
    result: BlockType,
    locals: Vec<ValType>,
    body: Vec<ExprRef>,
    export: Option<&str>,
) -> FuncDesc {
    FuncDesc {
        name: name.into(),
        ty: FuncType { params, result },
        body: FuncBody::Local { locals, body },
        export_name: export.map(Into::into),
    }
}

/// An imported function descriptor, bound by `(module, field)` at
/// instantiation time.
pub fn import_func(name: &str, module: &str, field: &str, params: Vec<ValType>, result: BlockType) -> FuncDesc {
    FuncDesc {
        name: name.into(),
        ty: FuncType { params, result },
        body: FuncBody::Import { module: module.into(), name: field.into() },
        export_name: None,
    }
}

pub fn global(name: &str, ty: ValType, mutable: bool, init: Value, export: Option<&str>) -> GlobalDesc {
    GlobalDesc {
        name: name.into(),
        ty: GlobalType { ty, mutable },
        init,
        export_name: export.map(Into::into),
    }
}

pub fn memory(initial_pages: u32, max_pages: Option<u32>, export: Option<&str>) -> MemoryDesc {
    MemoryDesc { initial_pages, max_pages, export_name: export.map(Into::into) }
}

pub fn table(initial: u32, max: Option<u32>, export: Option<&str>) -> TableDesc {
    TableDesc { initial, max, export_name: export.map(Into::into) }
}

/// A host import that always resolves immediately to a fixed value —
/// exercises a suspension point without needing a real external system.
pub struct ConstHost(pub Value);

#[async_trait(?Send)]
impl HostFunction for ConstHost {
    async fn call(&self, _args: &[Value]) -> anyhow::Result<Option<Value>> {
        Ok(Some(self.0))
    }
}

/// A host import that always rejects, to exercise `TrapKind::ImportError`.
pub struct FailingHost(pub String);

#[async_trait(?Send)]
impl HostFunction for FailingHost {
    async fn call(&self, _args: &[Value]) -> anyhow::Result<Option<Value>> {
        Err(anyhow::anyhow!(self.0.clone()))
    }
}

/// A host import that, while the module is suspended waiting on it, records
/// the module's own live stack trace — and, separately, can poke directly at
/// the instance's memory to exercise the "host can mutate state visible to
/// the module across a suspension" concern.
///
/// `instance` is filled in after `instantiate` returns, since the import has
/// to exist before the instance that will own it does; every test using this
/// host calls `bind` once construction is complete, mirroring how a real
/// embedder would wire a closure-captured handle back into its own import.
pub struct RecordingHost {
    pub value: Value,
    pub instance: RefCell<Option<Instance>>,
    pub captured: RefCell<Option<Vec<FrameSnapshot>>>,
    pub memory_patch: Option<(usize, Vec<u8>)>,
}

impl RecordingHost {
    pub fn new(value: Value) -> Rc<Self> {
        Rc::new(RecordingHost {
            value,
            instance: RefCell::new(None),
            captured: RefCell::new(None),
            memory_patch: None,
        })
    }

    pub fn with_memory_patch(value: Value, offset: usize, bytes: Vec<u8>) -> Rc<Self> {
        Rc::new(RecordingHost {
            value,
            instance: RefCell::new(None),
            captured: RefCell::new(None),
            memory_patch: Some((offset, bytes)),
        })
    }

    pub fn bind(&self, instance: Instance) {
        *self.instance.borrow_mut() = Some(instance);
    }
}

#[async_trait(?Send)]
impl HostFunction for RecordingHost {
    async fn call(&self, _args: &[Value]) -> anyhow::Result<Option<Value>> {
        if let Some(instance) = self.instance.borrow().as_ref() {
            *self.captured.borrow_mut() = Some(instance.stack_trace(None, None));
            if let Some((offset, bytes)) = &self.memory_patch {
                instance.memory_write(*offset, bytes);
            }
        }
        Ok(Some(self.value))
    }
}

/// A debugger hook that just counts how many times it fired.
pub fn counting_hook(counter: Rc<RefCell<u32>>) -> DebuggerHook {
    Rc::new(move || {
        let counter = counter.clone();
        Box::pin(async move {
            *counter.borrow_mut() += 1;
            Ok(())
        })
    })
}

/// A debugger hook that rejects, to exercise `TrapKind::DebuggerAbort`.
pub fn aborting_hook(message: &'static str) -> DebuggerHook {
    Rc::new(move || Box::pin(async move { Err(anyhow::anyhow!(message)) }))
}
