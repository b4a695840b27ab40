// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Boundary behavior and round-trip properties, driven end to end through
//! compiled, instantiated modules rather than the lower-level unit tests
//! already covering `compiler::memory_ops`/`compiler::numeric` in isolation.

use std::rc::Rc;

use futures::executor::block_on;
use indexmap::IndexMap;
use wasm_step::{compile, instantiate, BinaryOp, EngineConfig, Module, TrapKind, UnaryOp, ValType, Value};

use crate::support::*;

fn one_func_module(name: &str, result: Option<ValType>, body: Vec<wasm_step::ExprRef>) -> Module {
    Module {
        funcs: vec![local_func(name, vec![], result, vec![], body, Some(name))],
        memory: Some(memory(1, None, None)),
        ..Module::default()
    }
}

fn run(module: Module, name: &str) -> Result<Option<Value>, wasm_step::Trap> {
    let compiled = compile(module, EngineConfig::new());
    let instance = instantiate(Rc::new(compiled), IndexMap::new()).unwrap();
    block_on(instance.call(name, vec![]))
}

#[test]
fn load_at_length_minus_width_succeeds_and_at_length_minus_width_plus_one_traps() {
    const PAGE: i32 = wasm_step::PAGE_SIZE as i32;
    let ok = one_func_module(
        "ok",
        Some(ValType::I32),
        vec![load(ValType::I32, 4, false, 0, const_i32(PAGE - 4))],
    );
    assert_eq!(run(ok, "ok").unwrap(), Some(Value::I32(0)));

    let bad = one_func_module(
        "bad",
        Some(ValType::I32),
        vec![load(ValType::I32, 4, false, 0, const_i32(PAGE - 3))],
    );
    let err = run(bad, "bad").unwrap_err();
    assert_eq!(err.kind, TrapKind::MemoryAccess);
}

#[test]
fn signed_divide_of_int_min_by_minus_one_traps_at_both_widths() {
    let body32 = vec![binary(ValType::I32, BinaryOp::DivS, const_i32(i32::MIN), const_i32(-1))];
    let err32 = run(one_func_module("d32", Some(ValType::I32), body32), "d32").unwrap_err();
    assert_eq!(err32.kind, TrapKind::IntegerOverflow);

    let body64 = vec![binary(ValType::I64, BinaryOp::DivS, const_i64(i64::MIN), const_i64(-1))];
    let err64 = run(one_func_module("d64", Some(ValType::I64), body64), "d64").unwrap_err();
    assert_eq!(err64.kind, TrapKind::IntegerOverflow);
}

#[test]
fn unsigned_divide_by_zero_traps_at_both_widths() {
    let body32 = vec![binary(ValType::I32, BinaryOp::DivU, const_i32(7), const_i32(0))];
    let err32 = run(one_func_module("u32", Some(ValType::I32), body32), "u32").unwrap_err();
    assert_eq!(err32.kind, TrapKind::IntegerDivideByZero);

    let body64 = vec![binary(ValType::I64, BinaryOp::DivU, const_i64(7), const_i64(0))];
    let err64 = run(one_func_module("u64", Some(ValType::I64), body64), "u64").unwrap_err();
    assert_eq!(err64.kind, TrapKind::IntegerDivideByZero);
}

#[test]
fn reinterpret_round_trips_non_nan_i32_f32_bits() {
    let body = vec![unary(
        ValType::I32,
        UnaryOp::ReinterpretF32AsI32,
        unary(ValType::F32, UnaryOp::ReinterpretI32AsF32, const_i32(0x4049_0fdb)),
    )];
    let result = run(one_func_module("rt32", Some(ValType::I32), body), "rt32").unwrap();
    assert_eq!(result, Some(Value::I32(0x4049_0fdb)));
}

#[test]
fn reinterpret_round_trips_non_nan_i64_f64_bits() {
    let bits: i64 = 0x4009_21fb_5444_2d18;
    let body = vec![unary(
        ValType::I64,
        UnaryOp::ReinterpretF64AsI64,
        unary(ValType::F64, UnaryOp::ReinterpretI64AsF64, const_i64(bits)),
    )];
    let result = run(one_func_module("rt64", Some(ValType::I64), body), "rt64").unwrap();
    assert_eq!(result, Some(Value::I64(bits)));
}

#[test]
fn store_then_load_same_address_and_width_round_trips() {
    let body = vec![
        drop_(store(4, 0, const_i32(16), const_i32(-12345))),
        load(ValType::I32, 4, true, 0, const_i32(16)),
    ];
    let result = run(one_func_module("sl", Some(ValType::I32), body), "sl").unwrap();
    assert_eq!(result, Some(Value::I32(-12345)));
}
