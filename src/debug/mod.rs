// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The instrumentation layer — breakpoint registry, sequence registry, and
//! the clean/dirty gate that makes disabled debugging free.

mod registry;

pub use registry::{BreakpointIndex, DebugLayout, DebugRegistry, SequenceId};
