// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The trap taxonomy. A `Trap` is what unwinds a task: every frame pops its
//! tracer entry on the way out, and the trap surfaces to the caller of the
//! top-level export unchanged.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ast::NodeId;

/// Which of the named failure modes occurred. Carried inside [`Trap`]
/// alongside the location and a human-readable message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrapKind {
    Unreachable,
    MemoryAccess,
    IntegerDivideByZero,
    IntegerOverflow,
    InvalidConversion,
    IndirectCallTypeMismatch,
    TableOutOfBounds,
    ImportError,
    DebuggerAbort,
    /// Required to make the engine-wide `step_limit` observable as a normal
    /// error rather than a panic.
    StepLimitExceeded,
    /// A top-level call was issued while a previous invocation on this
    /// instance is still suspended.
    Reentrant,
}

impl TrapKind {
    const fn description(self) -> &'static str {
        match self {
            TrapKind::Unreachable => "unreachable instruction executed",
            TrapKind::MemoryAccess => "out of bounds memory access",
            TrapKind::IntegerDivideByZero => "integer divide by zero",
            TrapKind::IntegerOverflow => "integer overflow",
            TrapKind::InvalidConversion => "invalid conversion to integer",
            TrapKind::IndirectCallTypeMismatch => "indirect call type mismatch",
            TrapKind::TableOutOfBounds => "table access out of bounds",
            TrapKind::ImportError => "host import failed",
            TrapKind::DebuggerAbort => "debugger hook aborted the invocation",
            TrapKind::StepLimitExceeded => "instruction step limit exceeded",
            TrapKind::Reentrant => "re-entrant call into a suspended instance",
        }
    }
}

/// A runtime trap: location, kind, and message. Serializable so a host
/// embedding this engine across a process or language boundary can report
/// it without inventing its own wire shape.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("trap at node {location:?}: {kind:?} ({message})")]
pub struct Trap {
    pub location: NodeId,
    pub kind: TrapKind,
    pub message: String,
}

impl Trap {
    pub fn new(location: NodeId, kind: TrapKind) -> Self {
        Trap {
            location,
            kind,
            message: kind.description().to_string(),
        }
    }

    pub fn with_message(location: NodeId, kind: TrapKind, message: impl Into<String>) -> Self {
        Trap {
            location,
            kind,
            message: message.into(),
        }
    }
}

pub type Result<T> = core::result::Result<T, Trap>;
