// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The concrete scenarios this engine must get right end to end: each one
//! builds a small hand-written module, instantiates it, and drives an
//! exported call with `futures::executor::block_on`, the same way the
//! teacher's own `tests/engine` module drives `regorus::Engine`.

use std::cell::RefCell;
use std::rc::Rc;

use futures::executor::block_on;
use indexmap::IndexMap;
use wasm_step::{compile, instantiate, BinaryOp, EngineConfig, Module, TrapKind, ValType, Value};

use crate::support::*;

#[test]
fn identity_export_round_trips_the_high_bit() {
    let module = Module {
        funcs: vec![local_func(
            "id",
            vec![ValType::I32],
            Some(ValType::I32),
            vec![],
            vec![local_get(ValType::I32, 0)],
            Some("id"),
        )],
        ..Module::default()
    };
    let compiled = compile(module, EngineConfig::new());
    let instance = instantiate(Rc::new(compiled), IndexMap::new()).unwrap();
    let result = block_on(instance.call("id", vec![Value::I32(-2147483647)])).unwrap();
    assert_eq!(result, Some(Value::I32(-2147483647)));
}

#[test]
fn imported_host_stack_trace_observes_the_call_node_while_suspended() {
    let call_node = call(Some(ValType::F64), 0, vec![]);
    let call_id = call_node.id;
    let module = Module {
        funcs: vec![
            import_func("random", "env", "random", vec![], Some(ValType::F64)),
            local_func("use_random", vec![], Some(ValType::F64), vec![], vec![call_node], Some("use_random")),
        ],
        ..Module::default()
    };
    let compiled = compile(module, EngineConfig::new());

    let host = RecordingHost::new(Value::F64(0.25));
    let mut imports: IndexMap<(String, String), Rc<dyn wasm_step::HostFunction>> = IndexMap::new();
    imports.insert(("env".into(), "random".into()), host.clone());
    let instance = instantiate(Rc::new(compiled), imports).unwrap();
    host.bind(instance.clone());

    let result = block_on(instance.call("use_random", vec![])).unwrap();
    assert_eq!(result, Some(Value::F64(0.25)));

    let captured = host.captured.borrow().clone().expect("host observed the suspended stack");
    assert_eq!(captured.len(), 1);
    assert_eq!(&*captured[0].func_name, "use_random");
    assert_eq!(captured[0].location, call_id);
}

/// Builds `(block (loop (local.set 0 (i32.add (local.get 0) (i32.const 1)))
/// (nop) (if (i32.lt_s (local.get 0) (i32.const 10)) (then (br 1)) (else (br
/// 2)))))`: a loop that runs exactly 10 times, with `nop_id` (returned
/// alongside) as the one location inside the body that scenarios 3 and 4 both
/// instrument.
fn ten_iteration_loop_module() -> (Module, wasm_step::NodeId) {
    let increment = local_set(
        0,
        binary(ValType::I32, BinaryOp::Add, local_get(ValType::I32, 0), const_i32(1)),
    );
    let marker = nop();
    let marker_id = marker.id;
    let cond = binary(ValType::I32, BinaryOp::LtS, local_get(ValType::I32, 0), const_i32(10));
    let branch = if_(None, cond, vec![brk(1, true, None)], vec![brk(2, false, None)]);
    let body = loop_(None, vec![increment, marker, branch]);
    let outer = block(None, vec![body]);
    let module = Module {
        funcs: vec![local_func(
            "count_to_ten",
            vec![],
            None,
            vec![ValType::I32],
            vec![outer],
            Some("count_to_ten"),
        )],
        ..Module::default()
    };
    (module, marker_id)
}

#[test]
fn breakpoint_inside_a_loop_fires_once_per_iteration() {
    let (module, marker_id) = ten_iteration_loop_module();
    let compiled = compile(module, EngineConfig::new());
    let instance = instantiate(Rc::new(compiled), IndexMap::new()).unwrap();

    let counter = Rc::new(RefCell::new(0u32));
    instance.set_debugger(Some(counting_hook(counter.clone())));
    instance.set_breakpoint(marker_id);

    block_on(instance.call("count_to_ten", vec![])).unwrap();
    assert_eq!(*counter.borrow(), 10);
}

#[test]
fn single_step_fires_once_per_ast_node_evaluated() {
    let (module, _marker_id) = ten_iteration_loop_module();
    let compiled = compile(module, EngineConfig::new());
    let instance = instantiate(Rc::new(compiled), IndexMap::new()).unwrap();

    let counter = Rc::new(RefCell::new(0u32));
    instance.set_debugger(Some(counting_hook(counter.clone())));
    instance.set_single_step(true);

    block_on(instance.call("count_to_ten", vec![])).unwrap();
    // Per iteration: local.set(+add+local.get+const) = 4, nop = 1,
    // if(+cond local.get+const, +one taken br) = 5; ten iterations of 10,
    // plus the outer block and loop container nodes themselves once each.
    assert_eq!(*counter.borrow(), 10 * 10 + 2);
}

#[test]
fn memory_grow_zero_fills_the_page_a_subsequent_load_observes() {
    const PAGE: u32 = wasm_step::PAGE_SIZE as u32;
    let body = vec![
        drop_(memory_grow(const_i32(1))),
        load(ValType::I32, 1, false, PAGE, const_i32(0)),
    ];
    let module = Module {
        funcs: vec![local_func("grow_and_read", vec![], Some(ValType::I32), vec![], body, Some("grow_and_read"))],
        memory: Some(memory(1, None, None)),
        ..Module::default()
    };
    let compiled = compile(module, EngineConfig::new());
    let instance = instantiate(Rc::new(compiled), IndexMap::new()).unwrap();
    let result = block_on(instance.call("grow_and_read", vec![])).unwrap();
    assert_eq!(result, Some(Value::I32(0)));
}

#[test]
fn unreachable_nested_in_loop_in_block_traps_at_its_own_location() {
    let trap_node = unreachable_();
    let trap_id = trap_node.id;
    let body = vec![block(None, vec![loop_(None, vec![trap_node])])];
    let module = Module {
        funcs: vec![local_func("boom", vec![], None, vec![], body, Some("boom"))],
        ..Module::default()
    };
    let compiled = compile(module, EngineConfig::new());
    let instance = instantiate(Rc::new(compiled), IndexMap::new()).unwrap();
    let err = block_on(instance.call("boom", vec![])).unwrap_err();
    assert_eq!(err.kind, TrapKind::Unreachable);
    assert_eq!(err.location, trap_id);
}
