// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The three parallel arrays backing the debug registry, plus its arming
//! operations, generalized from a flat breakpoint set into a sequence-aware
//! gate so a clean run never has to consult per-node state at all.
//!
//! Split in two: [`DebugLayout`] is the structural part the compiler builds
//! once per module (which locations exist, which sequence each belongs to)
//! and is shared, read-only, by every instance of that module; [`DebugRegistry`]
//! is the mutable arming state, one per [`crate::instance::Instance`], sized
//! from the layout at instantiation time.

use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use crate::ast::NodeId;

/// Dense index into the registry's parallel arrays, one per distinct source
/// location the compiler has referenced so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BreakpointIndex(pub u32);

/// Dense index of a *sequence*: a maximal run of uninterruptible, infallible
/// nodes sharing one gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SequenceId(pub u32);

/// Built once by the compiler, shared read-only by every instance of a
/// compiled module.
#[derive(Debug, Default)]
pub struct DebugLayout {
    index_of: BTreeMap<NodeId, BreakpointIndex>,
    sequence_of: Vec<Option<SequenceId>>,
    num_sequences: usize,
}

impl DebugLayout {
    pub fn builder() -> DebugLayoutBuilder {
        DebugLayoutBuilder::default()
    }

    pub fn index_of(&self, loc: NodeId) -> Option<BreakpointIndex> {
        self.index_of.get(&loc).copied()
    }

    pub fn sequence_of(&self, i: BreakpointIndex) -> Option<SequenceId> {
        self.sequence_of[i.0 as usize]
    }

    pub fn num_indices(&self) -> usize {
        self.sequence_of.len()
    }
}

/// Compile-time builder: allocates dense indices as the compiler walks the
/// AST and groups them into sequences.
#[derive(Debug, Default)]
pub struct DebugLayoutBuilder {
    index_of: BTreeMap<NodeId, BreakpointIndex>,
    sequence_of: Vec<Option<SequenceId>>,
    num_sequences: usize,
}

impl DebugLayoutBuilder {
    /// Allocate a dense breakpoint index for `loc` the first time the
    /// compiler references it; idempotent on repeat calls for the same
    /// location (e.g. a node visited once, asked about twice).
    pub fn index_for(&mut self, loc: NodeId) -> BreakpointIndex {
        if let Some(i) = self.index_of.get(&loc) {
            return *i;
        }
        let i = BreakpointIndex(self.sequence_of.len() as u32);
        self.sequence_of.push(None);
        self.index_of.insert(loc, i);
        i
    }

    /// Register a sequence spanning `members` (breakpoint indices, in
    /// program order) and return its id. Called once per sequence emitted
    /// by the compiler.
    pub fn register_sequence(&mut self, members: &[BreakpointIndex]) -> SequenceId {
        let seq = SequenceId(self.num_sequences as u32);
        self.num_sequences += 1;
        for &m in members {
            self.sequence_of[m.0 as usize] = Some(seq);
        }
        seq
    }

    pub fn index_of(&self, loc: NodeId) -> Option<BreakpointIndex> {
        self.index_of.get(&loc).copied()
    }

    pub fn sequence_of(&self, i: BreakpointIndex) -> Option<SequenceId> {
        self.sequence_of[i.0 as usize]
    }

    pub fn finish(self) -> DebugLayout {
        DebugLayout {
            index_of: self.index_of,
            sequence_of: self.sequence_of,
            num_sequences: self.num_sequences,
        }
    }
}

/// The instrumentation state of one instance: which breakpoint indices are
/// currently armed, and the derived per-sequence gate counts.
#[derive(Debug)]
pub struct DebugRegistry {
    layout: Rc<DebugLayout>,
    /// 0 or 1 per breakpoint index — "must call the debugger hook here".
    active: Vec<u8>,
    /// Count of active breakpoints per sequence; non-zero opens the gate.
    active_sequence_count: Vec<u32>,
    /// User-visible view: the armed set.
    armed: BTreeSet<NodeId>,
    single_step: bool,
}

impl DebugRegistry {
    pub fn new(layout: Rc<DebugLayout>) -> Self {
        let active = vec![0u8; layout.num_indices()];
        let active_sequence_count = vec![0u32; layout.num_sequences];
        DebugRegistry {
            layout,
            active,
            active_sequence_count,
            armed: BTreeSet::new(),
            single_step: false,
        }
    }

    pub fn is_active(&self, i: BreakpointIndex) -> bool {
        self.active[i.0 as usize] != 0
    }

    pub fn sequence_of(&self, i: BreakpointIndex) -> Option<SequenceId> {
        self.layout.sequence_of[i.0 as usize]
    }

    /// Is *any* breakpoint in `seq` currently armed?
    pub fn sequence_gate_open(&self, seq: SequenceId) -> bool {
        self.active_sequence_count[seq.0 as usize] != 0
    }

    pub fn index_of(&self, loc: NodeId) -> Option<BreakpointIndex> {
        self.layout.index_of(loc)
    }

    /// Whether `i` must spill its source location this evaluation.
    /// Interruptible or fallible nodes always execute the dirty path: a
    /// sequence member only spills when its sequence's gate is open, but a
    /// node that never joined a sequence is permanently on the dirty path
    /// regardless of whether any breakpoint happens to be armed there — its
    /// *own* `active` flag only decides whether the hook fires, not whether
    /// the location is recorded (needed so a trap or host-call suspension
    /// can always produce an accurate frame snapshot).
    pub fn is_dirty(&self, i: BreakpointIndex) -> bool {
        match self.sequence_of(i) {
            Some(seq) => self.sequence_gate_open(seq),
            None => true,
        }
    }

    pub fn set_breakpoint(&mut self, loc: NodeId) {
        if self.armed.insert(loc) {
            log::debug!("breakpoint armed at {loc:?}");
            if !self.single_step {
                self.arm_index(self.layout.index_of(loc));
            }
        }
    }

    pub fn clear_breakpoint(&mut self, loc: NodeId) {
        if self.armed.remove(&loc) {
            log::debug!("breakpoint cleared at {loc:?}");
            if !self.single_step {
                self.disarm_index(self.layout.index_of(loc));
            }
        }
    }

    pub fn has_breakpoint(&self, loc: NodeId) -> bool {
        self.armed.contains(&loc)
    }

    /// Snapshot of the user-visible armed set.
    pub fn breakpoints(&self) -> Vec<NodeId> {
        self.armed.iter().copied().collect()
    }

    fn arm_index(&mut self, i: Option<BreakpointIndex>) {
        let Some(i) = i else { return };
        if self.active[i.0 as usize] == 0 {
            self.active[i.0 as usize] = 1;
            if let Some(seq) = self.layout.sequence_of[i.0 as usize] {
                self.active_sequence_count[seq.0 as usize] += 1;
            }
        }
    }

    fn disarm_index(&mut self, i: Option<BreakpointIndex>) {
        let Some(i) = i else { return };
        if self.active[i.0 as usize] != 0 {
            self.active[i.0 as usize] = 0;
            if let Some(seq) = self.layout.sequence_of[i.0 as usize] {
                self.active_sequence_count[seq.0 as usize] -= 1;
            }
        }
    }

    /// Enabling floods every gate open regardless of the armed set;
    /// disabling clears everything, then re-applies the armed set — the
    /// user-visible breakpoints never change, only the gating.
    pub fn set_single_step(&mut self, on: bool) {
        if on == self.single_step {
            return;
        }
        self.single_step = on;
        log::trace!("single-step set to {on}");
        if on {
            self.active.iter_mut().for_each(|a| *a = 1);
            self.active_sequence_count
                .iter_mut()
                .for_each(|c| *c = c.max(1));
        } else {
            self.active.iter_mut().for_each(|a| *a = 0);
            self.active_sequence_count.iter_mut().for_each(|c| *c = 0);
            let armed = self.armed.clone();
            for loc in armed {
                self.arm_index(self.layout.index_of(loc));
            }
        }
    }

    pub fn single_step(&self) -> bool {
        self.single_step
    }
}
