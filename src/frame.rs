// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The live per-invocation frame, and the snapshot of it a debugger observes
//! via `stackTrace()`. The live frame is mutated in place as the compiled
//! tree runs;
//! a snapshot is an owned, frozen copy safe to hand to a host that might hold
//! onto it past the point where the frame itself moves on.

use std::rc::Rc;

use serde::Serialize;

use crate::ast::NodeId;
use crate::value::Value;

/// Named, for logging only — not a control-flow discriminant. Carried
/// on the frame so a `log::trace!` at a `.await` point can say what it's
/// waiting on without threading the reason through every call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspendReason {
    HostCall,
    DebuggerHook,
}

/// One activation record. Locals occupy the low indices of `stack`'s slot
/// space conceptually, but are kept in their own vector here since they're
/// addressed by a stable index (`local.get`/`local.set`) rather than pushed
/// and popped; `stack` is the true operand stack, growing and shrinking as
/// the compiled tree evaluates.
#[derive(Debug)]
pub struct Frame {
    pub func_name: Rc<str>,
    pub locals: Vec<Value>,
    pub stack: Vec<Value>,
    /// The node currently executing, spilled here only on the dirty path —
    /// the clean path leaves this stale, which is fine, since nothing
    /// observes it while the clean path runs uninterrupted.
    pub current_location: NodeId,
    pub suspend_reason: Option<SuspendReason>,
}

impl Frame {
    pub fn new(func_name: Rc<str>, locals: Vec<Value>, entry: NodeId) -> Self {
        Frame {
            func_name,
            locals,
            stack: Vec::new(),
            current_location: entry,
            suspend_reason: None,
        }
    }

    pub fn push(&mut self, v: Value) {
        self.stack.push(v);
    }

    pub fn pop(&mut self) -> Value {
        self.stack
            .pop()
            .expect("operand stack underflow (validation bug upstream of this engine)")
    }

    pub fn pop_n(&mut self, n: usize) -> Vec<Value> {
        let at = self.stack.len() - n;
        self.stack.split_off(at)
    }

    /// Unwind the operand stack back to `depth`, discarding anything above
    /// it — used when a `Break`/`Switch` exits a block.
    pub fn truncate_to(&mut self, depth: usize) {
        self.stack.truncate(depth);
    }

    pub fn snapshot(&self) -> FrameSnapshot {
        FrameSnapshot {
            func_name: self.func_name.clone(),
            location: self.current_location,
            locals: self.locals.clone(),
            stack: self.stack.clone(),
        }
    }
}

/// An owned, frozen copy of a [`Frame`] at one point in time — what
/// `Instance::stack_trace()` hands back.
#[derive(Debug, Clone, Serialize)]
pub struct FrameSnapshot {
    pub func_name: Rc<str>,
    pub location: NodeId,
    pub locals: Vec<Value>,
    pub stack: Vec<Value>,
}
