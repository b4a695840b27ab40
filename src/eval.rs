// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The recursive async tree walker that actually runs a compiled body.
//!
//! There is exactly one suspension shape below: `eval_expr` is boxed
//! (`LocalBoxFuture`) so it can call itself, and every other function here
//! is a plain `async fn` that recurses through it. A `Call`/`CallIndirect`
//! node `.await`s `Instance::call_function`, and a dirty-path node
//! `.await`s `Instance::invoke_debugger_hook` — both are ordinary `.await`
//! points inside an `async fn`, so whatever locals are live across them
//! (partially evaluated operands of an enclosing expression included) are
//! captured by Rust's own generator transform. That is the whole of this
//! engine's suspend/resume story; there is no hand-rolled continuation or
//! spill stack to maintain.
//!
//! `Flow` is what every node evaluates to: a plain value, or one of the two
//! ways control can leave a subtree early (`Break` unwinding to an
//! enclosing label, `Return` unwinding to the function's caller). The
//! `eval_operand!` macro below exists only to collapse "evaluate this
//! child, and if it diverted control instead of producing a value,
//! propagate that diversion out of the *current* function" into one line
//! at every call site that needs a concrete operand.

use std::cell::RefCell;
use std::rc::Rc;

use futures::future::FutureExt;

use crate::ast::{ExprKind, ExprRef};
use crate::frame::{Frame, SuspendReason};
use crate::instance::Instance;
use crate::scheduler::LocalBoxFuture;
use crate::trap::{Trap, TrapKind};
use crate::value::Value;

/// Borrowed state threaded through one function activation's evaluation.
pub(crate) struct EvalCtx<'a> {
    pub instance: &'a Instance,
    pub frame: Rc<RefCell<Frame>>,
}

/// What a node (or a straight-line run of them) evaluates to.
pub(crate) enum Flow {
    /// Ordinary completion, carrying the node's result if it has one.
    Value(Option<Value>),
    /// A `br`/`br_table` still unwinding; `relative_depth` counts remaining
    /// enclosing labels to pass through before it's consumed by the label it
    /// names.
    Break {
        relative_depth: u32,
        value: Option<Value>,
    },
    /// A `return`, unwinding all the way to the function's own caller.
    Return(Option<Value>),
}

macro_rules! eval_operand {
    ($cx:expr, $e:expr) => {{
        match eval_expr($e, $cx).await? {
            Flow::Value(Some(v)) => v,
            Flow::Value(None) => {
                unreachable!("operand expression produced no value (validation bug upstream of this engine)")
            }
            other => return Ok(other),
        }
    }};
}

/// Evaluate a straight-line list of nodes (a function body, or one arm of a
/// `Block`/`Loop`/`If`), stopping early on the first `Break`/`Return`. The
/// list's own "value" is whatever the last node produced, matching
/// validation's guarantee that every earlier node's stack effect nets to
/// zero.
pub(crate) async fn eval_body(body: &[ExprRef], cx: &EvalCtx<'_>) -> Result<Flow, Trap> {
    let mut last = None;
    for e in body {
        match eval_expr(e, cx).await? {
            Flow::Value(v) => last = v,
            other => return Ok(other),
        }
    }
    Ok(Flow::Value(last))
}

/// Evaluate one node: the per-node debug check, then dispatch on shape.
/// Boxed so the tree recursion below can call back into it.
pub(crate) fn eval_expr<'a>(expr: &'a ExprRef, cx: &'a EvalCtx<'a>) -> LocalBoxFuture<'a, Result<Flow, Trap>> {
    async move {
        check_step_limit(cx.instance, expr.id)?;
        if let Some(idx) = cx.instance.breakpoint_index(expr.id) {
            let (dirty, should_hook) = {
                let debug = cx.instance.debug.borrow();
                (debug.is_dirty(idx), debug.is_active(idx))
            };
            if dirty {
                cx.frame.borrow_mut().current_location = expr.id;
                if should_hook {
                    cx.frame.borrow_mut().suspend_reason = Some(SuspendReason::DebuggerHook);
                    cx.instance.invoke_debugger_hook(expr.id).await?;
                    cx.frame.borrow_mut().suspend_reason = None;
                }
            }
        }
        eval_kind(expr, cx).await
    }
    .boxed_local()
}

fn check_step_limit(instance: &Instance, loc: crate::ast::NodeId) -> Result<(), Trap> {
    if let Some(limit) = instance.module.config.step_limit_value() {
        let n = instance.step_count.get() + 1;
        instance.step_count.set(n);
        if n > limit {
            return Err(Trap::new(loc, TrapKind::StepLimitExceeded));
        }
    }
    Ok(())
}

/// Run `block`'s statements, then fold the result back into the enclosing
/// node's own `Flow` the way a `Block`/`If` arm (not a `Loop`, which instead
/// re-enters on a depth-0 `Break`) resolves: exit the label on ordinary
/// completion or on a `Break` that targets exactly this label, truncating
/// the operand stack back to the label's entry depth either way; anything
/// deeper just has one level of nesting peeled off and keeps unwinding.
async fn eval_labelled_arm(body: &[ExprRef], cx: &EvalCtx<'_>) -> Result<Flow, Trap> {
    let depth_before = cx.frame.borrow().stack.len();
    let flow = eval_body(body, cx).await?;
    match flow {
        Flow::Value(v) => {
            cx.frame.borrow_mut().truncate_to(depth_before);
            if let Some(v) = v {
                cx.frame.borrow_mut().push(v);
            }
            Ok(Flow::Value(v))
        }
        Flow::Break { relative_depth: 0, value } => {
            cx.frame.borrow_mut().truncate_to(depth_before);
            if let Some(v) = value {
                cx.frame.borrow_mut().push(v);
            }
            Ok(Flow::Value(value))
        }
        Flow::Break { relative_depth, value } => Ok(Flow::Break {
            relative_depth: relative_depth - 1,
            value,
        }),
        ret @ Flow::Return(_) => Ok(ret),
    }
}

async fn eval_kind(expr: &ExprRef, cx: &EvalCtx<'_>) -> Result<Flow, Trap> {
    use ExprKind::*;
    match &expr.kind {
        Block { body } => eval_labelled_arm(body, cx).await,
        If { cond, then_body, else_body } => {
            let c = eval_operand!(cx, cond);
            cx.frame.borrow_mut().pop();
            let body = if c.unwrap_i32() != 0 { then_body } else { else_body };
            eval_labelled_arm(body, cx).await
        }
        Loop { body } => loop {
            let depth_before = cx.frame.borrow().stack.len();
            match eval_body(body, cx).await? {
                Flow::Value(v) => {
                    cx.frame.borrow_mut().truncate_to(depth_before);
                    if let Some(v) = v {
                        cx.frame.borrow_mut().push(v);
                    }
                    return Ok(Flow::Value(v));
                }
                Flow::Break { relative_depth: 0, .. } => {
                    // A loop's own label names its *head*: reaching it
                    // re-enters the loop rather than exiting it, discarding
                    // whatever value the break carried (the MVP has no loop
                    // parameters to feed it).
                    cx.frame.borrow_mut().truncate_to(depth_before);
                    continue;
                }
                Flow::Break { relative_depth, value } => {
                    return Ok(Flow::Break {
                        relative_depth: relative_depth - 1,
                        value,
                    });
                }
                ret @ Flow::Return(_) => return Ok(ret),
            }
        },
        Break { target, value } => {
            let v = match value {
                Some(e) => {
                    let v = eval_operand!(cx, e);
                    cx.frame.borrow_mut().pop();
                    Some(v)
                }
                None => None,
            };
            Ok(Flow::Break {
                relative_depth: target.relative_depth,
                value: v,
            })
        }
        Switch {
            index,
            targets,
            default,
            value,
        } => {
            let i = eval_operand!(cx, index).unwrap_i32();
            cx.frame.borrow_mut().pop();
            let v = match value {
                Some(e) => {
                    let v = eval_operand!(cx, e);
                    cx.frame.borrow_mut().pop();
                    Some(v)
                }
                None => None,
            };
            let target = usize::try_from(i)
                .ok()
                .and_then(|i| targets.get(i))
                .copied()
                .unwrap_or(*default);
            Ok(Flow::Break {
                relative_depth: target.relative_depth,
                value: v,
            })
        }
        Call { func_index, args } => {
            let mut vals = Vec::with_capacity(args.len());
            for a in args {
                vals.push(eval_operand!(cx, a));
            }
            if !vals.is_empty() {
                cx.frame.borrow_mut().pop_n(vals.len());
            }
            cx.frame.borrow_mut().suspend_reason = Some(SuspendReason::HostCall);
            let result = cx.instance.call_function(*func_index, vals).await?;
            cx.frame.borrow_mut().suspend_reason = None;
            if let Some(v) = result {
                cx.frame.borrow_mut().push(v);
            }
            Ok(Flow::Value(result))
        }
        CallIndirect {
            type_index,
            table_index,
            callee,
            args,
        } => {
            let mut vals = Vec::with_capacity(args.len());
            for a in args {
                vals.push(eval_operand!(cx, a));
            }
            let elem = i64::from(eval_operand!(cx, callee).unwrap_i32());
            cx.frame.borrow_mut().pop_n(vals.len() + 1);
            let func_index = cx
                .instance
                .resolve_table_call(*table_index, *type_index, elem)
                .map_err(|kind| Trap::new(expr.id, kind))?;
            cx.frame.borrow_mut().suspend_reason = Some(SuspendReason::HostCall);
            let result = cx.instance.call_function(func_index, vals).await?;
            cx.frame.borrow_mut().suspend_reason = None;
            if let Some(v) = result {
                cx.frame.borrow_mut().push(v);
            }
            Ok(Flow::Value(result))
        }
        LocalGet { index } => {
            let v = cx.frame.borrow().locals[*index as usize];
            cx.frame.borrow_mut().push(v);
            Ok(Flow::Value(Some(v)))
        }
        LocalSet { index, value, tee } => {
            let v = eval_operand!(cx, value);
            cx.frame.borrow_mut().pop();
            cx.frame.borrow_mut().locals[*index as usize] = v;
            if *tee {
                cx.frame.borrow_mut().push(v);
                Ok(Flow::Value(Some(v)))
            } else {
                Ok(Flow::Value(None))
            }
        }
        GlobalGet { index } => {
            let v = cx.instance.global_by_index(*index);
            cx.frame.borrow_mut().push(v);
            Ok(Flow::Value(Some(v)))
        }
        GlobalSet { index, value } => {
            let v = eval_operand!(cx, value);
            cx.frame.borrow_mut().pop();
            let ty = cx.instance.module.decoded.globals[*index as usize].ty;
            cx.instance.set_global_by_index(*index, v, ty);
            Ok(Flow::Value(None))
        }
        Load { arg, addr } => {
            let a = eval_operand!(cx, addr);
            cx.frame.borrow_mut().pop();
            let result_ty = expr.result_ty.expect("a load always produces a value");
            let mem = cx
                .instance
                .memory
                .as_ref()
                .ok_or_else(|| Trap::new(expr.id, TrapKind::MemoryAccess))?;
            let v = crate::compiler::memory_ops::do_load(&mem.borrow(), arg, a, result_ty, expr.id)?;
            cx.frame.borrow_mut().push(v);
            Ok(Flow::Value(Some(v)))
        }
        Store { arg, addr, value } => {
            let a = eval_operand!(cx, addr);
            let v = eval_operand!(cx, value);
            cx.frame.borrow_mut().pop_n(2);
            let mem = cx
                .instance
                .memory
                .as_ref()
                .ok_or_else(|| Trap::new(expr.id, TrapKind::MemoryAccess))?;
            crate::compiler::memory_ops::do_store(&mut mem.borrow_mut(), arg, a, v, expr.id)?;
            Ok(Flow::Value(None))
        }
        Const { value } => {
            cx.frame.borrow_mut().push(*value);
            Ok(Flow::Value(Some(*value)))
        }
        Unary { op, operand } => {
            let v = eval_operand!(cx, operand);
            cx.frame.borrow_mut().pop();
            let result_ty = expr.result_ty.expect("a unary op always produces a value");
            let out = crate::compiler::numeric::eval_unary(*op, v, result_ty, expr.id)?;
            cx.frame.borrow_mut().push(out);
            Ok(Flow::Value(Some(out)))
        }
        Binary { op, lhs, rhs } => {
            let a = eval_operand!(cx, lhs);
            let b = eval_operand!(cx, rhs);
            cx.frame.borrow_mut().pop_n(2);
            let out = crate::compiler::numeric::eval_binary(*op, a, b, expr.id)?;
            cx.frame.borrow_mut().push(out);
            Ok(Flow::Value(Some(out)))
        }
        Select { cond, a, b } => {
            let cv = eval_operand!(cx, cond);
            let av = eval_operand!(cx, a);
            let bv = eval_operand!(cx, b);
            cx.frame.borrow_mut().pop_n(3);
            let out = if cv.unwrap_i32() != 0 { av } else { bv };
            cx.frame.borrow_mut().push(out);
            Ok(Flow::Value(Some(out)))
        }
        Drop { value } => {
            let _ = eval_operand!(cx, value);
            cx.frame.borrow_mut().pop();
            Ok(Flow::Value(None))
        }
        Return { value } => {
            let v = match value {
                Some(e) => {
                    let v = eval_operand!(cx, e);
                    cx.frame.borrow_mut().pop();
                    Some(v)
                }
                None => None,
            };
            Ok(Flow::Return(v))
        }
        MemorySize => {
            let v = Value::I32(cx.instance.memory_size_pages());
            cx.frame.borrow_mut().push(v);
            Ok(Flow::Value(Some(v)))
        }
        MemoryGrow { delta } => {
            let d = eval_operand!(cx, delta).unwrap_i32();
            cx.frame.borrow_mut().pop();
            let grown = match &cx.instance.memory {
                Some(mem) if d >= 0 => {
                    let max = cx.instance.module.decoded.memory.as_ref().and_then(|m| m.max_pages);
                    crate::compiler::memory_ops::grow(&mut mem.borrow_mut(), d as u32, max)
                }
                _ => -1,
            };
            let v = Value::I32(grown);
            cx.frame.borrow_mut().push(v);
            Ok(Flow::Value(Some(v)))
        }
        Nop => Ok(Flow::Value(None)),
        Unreachable => Err(Trap::new(expr.id, TrapKind::Unreachable)),
    }
}
