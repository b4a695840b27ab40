// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The quantified debugger invariants: debug-build transparency, the
//! zero-active-sequence-count/no-hook-calls guarantee, and the arming/
//! single-step round-trips, all exercised through the public `Instance`
//! surface rather than `DebugRegistry` directly (that's covered at the unit
//! level in `src/debug/registry.rs`).

use std::cell::RefCell;
use std::rc::Rc;

use futures::executor::block_on;
use indexmap::IndexMap;
use wasm_step::{compile, instantiate, BinaryOp, EngineConfig, HostFunction, Module, ValType, Value};

use crate::support::*;

fn loopy_module() -> Module {
    let increment = local_set(
        0,
        binary(ValType::I32, BinaryOp::Add, local_get(ValType::I32, 0), const_i32(1)),
    );
    let cond = binary(ValType::I32, BinaryOp::LtS, local_get(ValType::I32, 0), const_i32(5));
    // Both `if` arms exit via `br`, so the loop's result has to ride out on
    // the exiting break's value rather than a fall-through expression —
    // nothing after the `if` is reachable.
    let branch = if_(
        None,
        cond,
        vec![brk(1, true, None)],
        vec![brk(2, false, Some(local_get(ValType::I32, 0)))],
    );
    let body = loop_(Some(ValType::I32), vec![increment, branch]);
    Module {
        funcs: vec![local_func(
            "five",
            vec![],
            Some(ValType::I32),
            vec![ValType::I32],
            vec![block(Some(ValType::I32), vec![body])],
            Some("five"),
        )],
        ..Module::default()
    }
}

#[test]
fn disabling_the_debug_build_does_not_change_results() {
    let with_debug = compile(loopy_module(), EngineConfig::new().debug(true));
    let without_debug = compile(loopy_module(), EngineConfig::new().debug(false));
    let a = instantiate(Rc::new(with_debug), IndexMap::new()).unwrap();
    let b = instantiate(Rc::new(without_debug), IndexMap::new()).unwrap();
    let ra = block_on(a.call("five", vec![])).unwrap();
    let rb = block_on(b.call("five", vec![])).unwrap();
    assert_eq!(ra, rb);
    assert_eq!(ra, Some(Value::I32(5)));
}

#[test]
fn setting_a_breakpoint_on_a_debug_disabled_instance_is_inert() {
    let compiled = compile(loopy_module(), EngineConfig::new().debug(false));
    let instance = instantiate(Rc::new(compiled), IndexMap::new()).unwrap();
    // Layout is empty: every NodeId is unregistered, so arming one is a
    // silent no-op, not an error.
    instance.set_breakpoint(wasm_step::NodeId(0));
    let counter = Rc::new(RefCell::new(0u32));
    instance.set_debugger(Some(counting_hook(counter.clone())));
    let result = block_on(instance.call("five", vec![])).unwrap();
    assert_eq!(result, Some(Value::I32(5)));
    assert_eq!(*counter.borrow(), 0);
}

#[test]
fn zero_armed_breakpoints_means_zero_hook_calls_even_across_a_host_suspension() {
    let call_node = call(None, 0, vec![]);
    let module = Module {
        funcs: vec![
            import_func("sink", "env", "sink", vec![], None),
            local_func("go", vec![], None, vec![], vec![call_node], Some("go")),
        ],
        ..Module::default()
    };
    let compiled = compile(module, EngineConfig::new());
    let mut imports: IndexMap<(String, String), Rc<dyn HostFunction>> = IndexMap::new();
    imports.insert(("env".into(), "sink".into()), Rc::new(ConstHost(Value::I32(0))) as Rc<dyn HostFunction>);
    let instance = instantiate(Rc::new(compiled), imports).unwrap();

    let counter = Rc::new(RefCell::new(0u32));
    instance.set_debugger(Some(counting_hook(counter.clone())));
    block_on(instance.call("go", vec![])).unwrap();
    assert_eq!(*counter.borrow(), 0);
}

#[test]
fn set_then_clear_breakpoint_round_trips_to_the_empty_set() {
    let compiled = compile(loopy_module(), EngineConfig::new());
    let instance = instantiate(Rc::new(compiled), IndexMap::new()).unwrap();
    let loc = wasm_step::NodeId(0);
    assert!(instance.breakpoints().is_empty());
    instance.set_breakpoint(loc);
    assert!(instance.has_breakpoint(loc));
    instance.clear_breakpoint(loc);
    assert!(!instance.has_breakpoint(loc));
    assert!(instance.breakpoints().is_empty());
}

#[test]
fn single_step_toggle_round_trips_without_disturbing_the_armed_set() {
    let compiled = compile(loopy_module(), EngineConfig::new());
    let instance = instantiate(Rc::new(compiled), IndexMap::new()).unwrap();
    let loc = wasm_step::NodeId(1);
    instance.set_breakpoint(loc);
    assert!(!instance.single_step());
    instance.set_single_step(true);
    assert!(instance.single_step());
    instance.set_single_step(false);
    assert!(!instance.single_step());
    assert!(instance.has_breakpoint(loc));
}
