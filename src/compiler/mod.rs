// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Lowers one function body into a [`CompiledFunction`] — the local-slot
//! layout, the registered debug sequences, and the max operand-stack depth
//! used to pre-size a [`crate::frame::Frame`] at entry.
//!
//! The runtime half lives in [`crate::eval`]: rather than literally emitting
//! a closure per opcode, this engine keeps the decoded tree and walks it
//! with a recursive async evaluator, consulting the metadata this module
//! computes to pick the clean or dirty path per node. Rust's own `async`
//! state-machine transform plays the role a hand-rolled "spill and jump back
//! in" continuation would otherwise need, so there is no separate "emit
//! optimized fragment" codegen step to speak of.

pub mod context;
pub mod memory_ops;
pub mod numeric;

pub use context::CompileCx;

use std::rc::Rc;

use crate::ast::{BlockType, ExprKind, ExprRef, FuncBody, FuncDesc, ValType};
use crate::debug::BreakpointIndex;

/// One locally-defined function, ready to run: its local-slot layout and its
/// (still-`Rc`-shared) body tree. Imports never reach here — see
/// `crate::module::CompiledModule::functions`, which keeps them as a
/// separate `FunctionSlot::Import` variant.
#[derive(Debug)]
pub struct CompiledFunction {
    pub name: Rc<str>,
    pub param_types: Vec<ValType>,
    pub result_ty: BlockType,
    /// Params followed by declared locals, in local-index order.
    pub local_types: Vec<ValType>,
    pub body: Vec<ExprRef>,
    pub max_stack_depth: usize,
}

/// Lower `desc` (which must carry a [`FuncBody::Local`]) into a
/// [`CompiledFunction`], registering every node's breakpoint index and every
/// maximal clean subtree's sequence into `cx.layout` along the way, the
/// first time each source location is referenced by the compiler.
pub fn compile_function(cx: &mut CompileCx, desc: &FuncDesc) -> CompiledFunction {
    let (locals, body) = match &desc.body {
        FuncBody::Local { locals, body } => (locals, body),
        FuncBody::Import { .. } => panic!("compile_function called on an import descriptor"),
    };

    let mut local_types = desc.ty.params.clone();
    local_types.extend_from_slice(locals);

    cx.reset_for_function(local_types.len());
    for e in body {
        measure_depth(cx, e);
    }
    for e in body {
        register_sequences(cx, e);
    }

    CompiledFunction {
        name: Rc::from(desc.name.as_str()),
        param_types: desc.ty.params.clone(),
        result_ty: desc.ty.result,
        local_types,
        body: body.clone(),
        max_stack_depth: cx.max_depth(),
    }
}

/// Walk `expr`, pushing/popping `cx`'s virtual stack exactly as the runtime
/// operand stack will, purely to record
/// the high-water mark used to pre-size [`crate::frame::Frame::stack`] via
/// `Vec::with_capacity`. This walk has no bearing on correctness — dropping
/// it would just mean a frame's stack grows by reallocation instead of
/// starting right-sized.
fn measure_depth(cx: &mut CompileCx, expr: &ExprRef) {
    use ExprKind::*;
    match &expr.kind {
        Block { body } => {
            cx.enter_label(false, expr.result_ty);
            for e in body {
                measure_depth(cx, e);
            }
            cx.exit_label();
            if expr.result_ty.is_some() {
                cx.push_value();
            }
        }
        Loop { body } => {
            cx.enter_label(true, expr.result_ty);
            for e in body {
                measure_depth(cx, e);
            }
            cx.exit_label();
            if expr.result_ty.is_some() {
                cx.push_value();
            }
        }
        If {
            cond,
            then_body,
            else_body,
        } => {
            measure_depth(cx, cond);
            cx.pop_value();
            cx.enter_label(false, expr.result_ty);
            for e in then_body {
                measure_depth(cx, e);
            }
            cx.exit_label();
            cx.enter_label(false, expr.result_ty);
            for e in else_body {
                measure_depth(cx, e);
            }
            cx.exit_label();
            if expr.result_ty.is_some() {
                cx.push_value();
            }
        }
        Break { value, .. } => {
            if let Some(v) = value {
                measure_depth(cx, v);
                cx.pop_value();
            }
        }
        Switch { index, value, .. } => {
            measure_depth(cx, index);
            cx.pop_value();
            if let Some(v) = value {
                measure_depth(cx, v);
                cx.pop_value();
            }
        }
        Call { args, .. } => {
            for a in args {
                measure_depth(cx, a);
            }
            cx.pop_n(args.len());
            if expr.result_ty.is_some() {
                cx.push_value();
            }
        }
        CallIndirect { callee, args, .. } => {
            for a in args {
                measure_depth(cx, a);
            }
            measure_depth(cx, callee);
            cx.pop_n(args.len() + 1);
            if expr.result_ty.is_some() {
                cx.push_value();
            }
        }
        LocalGet { .. } | GlobalGet { .. } | Const { .. } | MemorySize | Nop | Unreachable => {
            if expr.result_ty.is_some() {
                cx.push_value();
            }
        }
        LocalSet { value, tee, .. } => {
            measure_depth(cx, value);
            cx.pop_value();
            if *tee {
                cx.push_value();
            }
        }
        GlobalSet { value, .. } => {
            measure_depth(cx, value);
            cx.pop_value();
        }
        Load { addr, .. } => {
            measure_depth(cx, addr);
            cx.pop_value();
            cx.push_value();
        }
        Store { addr, value, .. } => {
            measure_depth(cx, addr);
            measure_depth(cx, value);
            cx.pop_n(2);
        }
        Unary { operand, .. } => {
            measure_depth(cx, operand);
            cx.pop_value();
            cx.push_value();
        }
        Binary { lhs, rhs, .. } => {
            measure_depth(cx, lhs);
            measure_depth(cx, rhs);
            cx.pop_n(2);
            cx.push_value();
        }
        Select { cond, a, b } => {
            measure_depth(cx, cond);
            measure_depth(cx, a);
            measure_depth(cx, b);
            cx.pop_n(3);
            cx.push_value();
        }
        Drop { value } => {
            measure_depth(cx, value);
            cx.pop_value();
        }
        Return { value } => {
            if let Some(v) = value {
                measure_depth(cx, v);
                cx.pop_value();
            }
        }
        MemoryGrow { delta } => {
            measure_depth(cx, delta);
            cx.pop_value();
            cx.push_value();
        }
    }
}

/// Assign every node a breakpoint index, and group each maximal clean
/// (infallible-and-uninterruptible) subtree into one sequence sharing a
/// single gate.
///
/// Classification already propagates "this subtree contains a
/// fallible/interruptible node" up to every ancestor, so a node that
/// classifies clean necessarily roots an entirely clean subtree. The
/// recursion below therefore only has to find the *outermost* clean node
/// and sweep every id beneath it into one sequence; an unclean node gets its
/// own (unsequenced) index and recurses into its children independently,
/// each of which may start its own nested sequence — e.g. a clean `a + b`
/// passed as an argument to a `call` is its own sequence even though the
/// call itself never joins one.
fn register_sequences(cx: &mut CompileCx, expr: &ExprRef) {
    let c = cx.classifier.classify(expr);
    if c.infallible && c.uninterruptible {
        let mut members = Vec::new();
        collect_ids(cx, expr, &mut members);
        cx.layout.register_sequence(&members);
    } else {
        cx.layout.index_for(expr.id);
        for child in children_of(expr) {
            register_sequences(cx, child);
        }
    }
}

fn collect_ids(cx: &mut CompileCx, expr: &ExprRef, out: &mut Vec<BreakpointIndex>) {
    out.push(cx.layout.index_for(expr.id));
    for child in children_of(expr) {
        collect_ids(cx, child, out);
    }
}

/// Generic child enumeration used only by the compile-time sequence walk
/// above, which doesn't care about node semantics — just connectivity.
fn children_of(expr: &ExprRef) -> Vec<&ExprRef> {
    use ExprKind::*;
    match &expr.kind {
        Block { body } | Loop { body } => body.iter().collect(),
        If {
            cond,
            then_body,
            else_body,
        } => {
            let mut v = vec![cond];
            v.extend(then_body.iter());
            v.extend(else_body.iter());
            v
        }
        Break { value, .. } => value.iter().collect(),
        Switch { index, value, .. } => {
            let mut v = vec![index];
            v.extend(value.iter());
            v
        }
        Call { args, .. } => args.iter().collect(),
        CallIndirect { callee, args, .. } => {
            let mut v: Vec<&ExprRef> = args.iter().collect();
            v.push(callee);
            v
        }
        LocalSet { value, .. } | GlobalSet { value, .. } | Drop { value } => vec![value],
        Load { addr, .. } => vec![addr],
        Store { addr, value, .. } => vec![addr, value],
        Unary { operand, .. } => vec![operand],
        Binary { lhs, rhs, .. } => vec![lhs, rhs],
        Select { cond, a, b } => vec![cond, a, b],
        Return { value } => value.iter().collect(),
        MemoryGrow { delta } => vec![delta],
        LocalGet { .. } | GlobalGet { .. } | Const { .. } | MemorySize | Nop | Unreachable => {
            vec![]
        }
    }
}
