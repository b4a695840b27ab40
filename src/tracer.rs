// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The call stack a debugger walks. One [`TracerStack`] lives on the
//! [`crate::instance::Instance`] and is shared (via `Rc<RefCell<_>>`) by every
//! `Frame` pushed for the duration of one top-level invocation; its emptiness
//! between invocations is also how re-entrancy is detected: a non-empty
//! stack at the start of a new top-level call means rejecting it with
//! `Trap::Reentrant` rather than interleaving.

use std::cell::RefCell;
use std::rc::Rc;

use crate::frame::{Frame, FrameSnapshot};

#[derive(Debug, Default)]
pub struct TracerStack {
    frames: RefCell<Vec<Rc<RefCell<Frame>>>>,
}

impl TracerStack {
    pub fn new() -> Self {
        TracerStack::default()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.borrow().is_empty()
    }

    pub fn push(&self, frame: Rc<RefCell<Frame>>) {
        self.frames.borrow_mut().push(frame);
    }

    pub fn pop(&self) {
        self.frames.borrow_mut().pop();
    }

    pub fn depth(&self) -> usize {
        self.frames.borrow().len()
    }

    /// Innermost frame first, matching the conventional stack-trace order.
    pub fn snapshot(&self) -> Vec<FrameSnapshot> {
        self.frames
            .borrow()
            .iter()
            .rev()
            .map(|f| f.borrow().snapshot())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NodeId;

    #[test]
    fn snapshot_is_innermost_first() {
        let tracer = TracerStack::new();
        let outer = Rc::new(RefCell::new(Frame::new(Rc::from("outer"), vec![], NodeId(0))));
        let inner = Rc::new(RefCell::new(Frame::new(Rc::from("inner"), vec![], NodeId(1))));
        tracer.push(outer);
        tracer.push(inner);
        let snap = tracer.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(&*snap[0].func_name, "inner");
        assert_eq!(&*snap[1].func_name, "outer");
    }

    #[test]
    fn empty_stack_means_not_reentrant() {
        let tracer = TracerStack::new();
        assert!(tracer.is_empty());
        let f = Rc::new(RefCell::new(Frame::new(Rc::from("f"), vec![], NodeId(0))));
        tracer.push(f);
        assert!(!tracer.is_empty());
        tracer.pop();
        assert!(tracer.is_empty());
    }
}
