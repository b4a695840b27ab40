// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Numeric instruction semantics: wrapping integer arithmetic, trapping
//! divide/rem/truncation, and IEEE-754 float ops including wasm's
//! NaN-propagating, signed-zero-aware min/max. Kept free of any notion of
//! sequences or breakpoints — `compiler::emit` is the only caller, and it
//! owns the trapping/suspension plumbing around these pure functions.

use crate::ast::{BinaryOp, NodeId, UnaryOp, ValType};
use crate::trap::{Trap, TrapKind};
use crate::value::Value;

type Result<T> = core::result::Result<T, Trap>;

pub fn eval_unary(op: UnaryOp, v: Value, result_ty: ValType, loc: NodeId) -> Result<Value> {
    use UnaryOp::*;
    Ok(match op {
        Clz => match v {
            Value::I32(x) => Value::I32(x.leading_zeros() as i32),
            Value::I64(x) => Value::I64(x.leading_zeros() as i64),
            _ => unreachable!("clz on non-integer (validation bug upstream of this engine)"),
        },
        Ctz => match v {
            Value::I32(x) => Value::I32(x.trailing_zeros() as i32),
            Value::I64(x) => Value::I64(x.trailing_zeros() as i64),
            _ => unreachable!("ctz on non-integer (validation bug upstream of this engine)"),
        },
        Popcnt => match v {
            Value::I32(x) => Value::I32(x.count_ones() as i32),
            Value::I64(x) => Value::I64(x.count_ones() as i64),
            _ => unreachable!("popcnt on non-integer (validation bug upstream of this engine)"),
        },
        Eqz => match v {
            Value::I32(x) => Value::I32(i32::from(x == 0)),
            Value::I64(x) => Value::I64(i32::from(x == 0) as i64),
            _ => unreachable!("eqz on non-integer (validation bug upstream of this engine)"),
        },
        Abs => match v {
            Value::F32(x) => Value::F32(x.abs()),
            Value::F64(x) => Value::F64(x.abs()),
            _ => unreachable!("fabs on non-float (validation bug upstream of this engine)"),
        },
        Neg => match v {
            Value::F32(x) => Value::F32(-x),
            Value::F64(x) => Value::F64(-x),
            _ => unreachable!("fneg on non-float (validation bug upstream of this engine)"),
        },
        Sqrt => match v {
            Value::F32(x) => Value::F32(x.sqrt()),
            Value::F64(x) => Value::F64(x.sqrt()),
            _ => unreachable!("sqrt on non-float (validation bug upstream of this engine)"),
        },
        Ceil => match v {
            Value::F32(x) => Value::F32(x.ceil()),
            Value::F64(x) => Value::F64(x.ceil()),
            _ => unreachable!("ceil on non-float (validation bug upstream of this engine)"),
        },
        Floor => match v {
            Value::F32(x) => Value::F32(x.floor()),
            Value::F64(x) => Value::F64(x.floor()),
            _ => unreachable!("floor on non-float (validation bug upstream of this engine)"),
        },
        Trunc => match v {
            Value::F32(x) => Value::F32(x.trunc()),
            Value::F64(x) => Value::F64(x.trunc()),
            _ => unreachable!("trunc on non-float (validation bug upstream of this engine)"),
        },
        Nearest => match v {
            Value::F32(x) => Value::F32(round_ties_even_f32(x)),
            Value::F64(x) => Value::F64(round_ties_even_f64(x)),
            _ => unreachable!("nearest on non-float (validation bug upstream of this engine)"),
        },
        Wrap64To32 => Value::I32(v.unwrap_i64() as i32),
        ExtendI32S => Value::I64(v.unwrap_i32() as i64),
        ExtendI32U => Value::I64(v.unwrap_u32() as u64 as i64),
        TruncF32S => from_trunc_i64(trunc_to_i64(v.unwrap_f32() as f64, loc)?, result_ty, loc)?,
        TruncF32U => from_trunc_u64(trunc_to_u64(v.unwrap_f32() as f64, loc)?, result_ty, loc)?,
        TruncF64S => from_trunc_i64(trunc_to_i64(v.unwrap_f64(), loc)?, result_ty, loc)?,
        TruncF64U => from_trunc_u64(trunc_to_u64(v.unwrap_f64(), loc)?, result_ty, loc)?,
        ConvertI32S => int_to_float(v.unwrap_i32() as f64, result_ty),
        ConvertI32U => int_to_float(v.unwrap_u32() as f64, result_ty),
        ConvertI64S => int_to_float(v.unwrap_i64() as f64, result_ty),
        ConvertI64U => int_to_float(v.unwrap_u64() as f64, result_ty),
        DemoteF64 => Value::F32(v.unwrap_f64() as f32),
        PromoteF32 => Value::F64(v.unwrap_f32() as f64),
        ReinterpretI32AsF32 => Value::F32(f32::from_bits(v.unwrap_i32() as u32)),
        ReinterpretI64AsF64 => Value::F64(f64::from_bits(v.unwrap_i64() as u64)),
        ReinterpretF32AsI32 => Value::I32(v.unwrap_f32().to_bits() as i32),
        ReinterpretF64AsI64 => Value::I64(v.unwrap_f64().to_bits() as i64),
    })
}

pub fn eval_binary(op: BinaryOp, lhs: Value, rhs: Value, loc: NodeId) -> Result<Value> {
    use BinaryOp::*;
    Ok(match op {
        Add => match (lhs, rhs) {
            (Value::I32(a), Value::I32(b)) => Value::I32(a.wrapping_add(b)),
            (Value::I64(a), Value::I64(b)) => Value::I64(a.wrapping_add(b)),
            _ => unreachable!("add on non-integer (validation bug upstream of this engine)"),
        },
        Sub => match (lhs, rhs) {
            (Value::I32(a), Value::I32(b)) => Value::I32(a.wrapping_sub(b)),
            (Value::I64(a), Value::I64(b)) => Value::I64(a.wrapping_sub(b)),
            _ => unreachable!("sub on non-integer (validation bug upstream of this engine)"),
        },
        Mul => match (lhs, rhs) {
            (Value::I32(a), Value::I32(b)) => Value::I32(a.wrapping_mul(b)),
            (Value::I64(a), Value::I64(b)) => Value::I64(a.wrapping_mul(b)),
            _ => unreachable!("mul on non-integer (validation bug upstream of this engine)"),
        },
        DivS => match (lhs, rhs) {
            (Value::I32(a), Value::I32(b)) => Value::I32(checked_div_s32(a, b, loc)?),
            (Value::I64(a), Value::I64(b)) => Value::I64(checked_div_s64(a, b, loc)?),
            _ => unreachable!("div_s on non-integer (validation bug upstream of this engine)"),
        },
        DivU => match (lhs, rhs) {
            (Value::I32(a), Value::I32(b)) => {
                Value::I32(checked_div_u(a as u32 as u64, b as u32 as u64, loc)? as u32 as i32)
            }
            (Value::I64(a), Value::I64(b)) => {
                Value::I64(checked_div_u(a as u64, b as u64, loc)? as i64)
            }
            _ => unreachable!("div_u on non-integer (validation bug upstream of this engine)"),
        },
        RemS => match (lhs, rhs) {
            (Value::I32(a), Value::I32(b)) => Value::I32(checked_rem_s32(a, b, loc)?),
            (Value::I64(a), Value::I64(b)) => Value::I64(checked_rem_s64(a, b, loc)?),
            _ => unreachable!("rem_s on non-integer (validation bug upstream of this engine)"),
        },
        RemU => match (lhs, rhs) {
            (Value::I32(a), Value::I32(b)) => {
                Value::I32(checked_rem_u(a as u32 as u64, b as u32 as u64, loc)? as u32 as i32)
            }
            (Value::I64(a), Value::I64(b)) => {
                Value::I64(checked_rem_u(a as u64, b as u64, loc)? as i64)
            }
            _ => unreachable!("rem_u on non-integer (validation bug upstream of this engine)"),
        },
        And => match (lhs, rhs) {
            (Value::I32(a), Value::I32(b)) => Value::I32(a & b),
            (Value::I64(a), Value::I64(b)) => Value::I64(a & b),
            _ => unreachable!("and on non-integer (validation bug upstream of this engine)"),
        },
        Or => match (lhs, rhs) {
            (Value::I32(a), Value::I32(b)) => Value::I32(a | b),
            (Value::I64(a), Value::I64(b)) => Value::I64(a | b),
            _ => unreachable!("or on non-integer (validation bug upstream of this engine)"),
        },
        Xor => match (lhs, rhs) {
            (Value::I32(a), Value::I32(b)) => Value::I32(a ^ b),
            (Value::I64(a), Value::I64(b)) => Value::I64(a ^ b),
            _ => unreachable!("xor on non-integer (validation bug upstream of this engine)"),
        },
        Shl => match (lhs, rhs) {
            (Value::I32(a), Value::I32(b)) => Value::I32(a.wrapping_shl(b as u32)),
            (Value::I64(a), Value::I64(b)) => Value::I64(a.wrapping_shl(b as u32)),
            _ => unreachable!("shl on non-integer (validation bug upstream of this engine)"),
        },
        ShrS => match (lhs, rhs) {
            (Value::I32(a), Value::I32(b)) => Value::I32(a.wrapping_shr(b as u32)),
            (Value::I64(a), Value::I64(b)) => Value::I64(a.wrapping_shr(b as u32)),
            _ => unreachable!("shr_s on non-integer (validation bug upstream of this engine)"),
        },
        ShrU => match (lhs, rhs) {
            (Value::I32(a), Value::I32(b)) => Value::I32((a as u32).wrapping_shr(b as u32) as i32),
            (Value::I64(a), Value::I64(b)) => Value::I64((a as u64).wrapping_shr(b as u32) as i64),
            _ => unreachable!("shr_u on non-integer (validation bug upstream of this engine)"),
        },
        Rotl => match (lhs, rhs) {
            (Value::I32(a), Value::I32(b)) => Value::I32((a as u32).rotate_left(b as u32) as i32),
            (Value::I64(a), Value::I64(b)) => Value::I64((a as u64).rotate_left(b as u32) as i64),
            _ => unreachable!("rotl on non-integer (validation bug upstream of this engine)"),
        },
        Rotr => match (lhs, rhs) {
            (Value::I32(a), Value::I32(b)) => Value::I32((a as u32).rotate_right(b as u32) as i32),
            (Value::I64(a), Value::I64(b)) => {
                Value::I64((a as u64).rotate_right(b as u32) as i64)
            }
            _ => unreachable!("rotr on non-integer (validation bug upstream of this engine)"),
        },
        FAdd => match (lhs, rhs) {
            (Value::F32(a), Value::F32(b)) => Value::F32(a + b),
            (Value::F64(a), Value::F64(b)) => Value::F64(a + b),
            _ => unreachable!("fadd on non-float (validation bug upstream of this engine)"),
        },
        FSub => match (lhs, rhs) {
            (Value::F32(a), Value::F32(b)) => Value::F32(a - b),
            (Value::F64(a), Value::F64(b)) => Value::F64(a - b),
            _ => unreachable!("fsub on non-float (validation bug upstream of this engine)"),
        },
        FMul => match (lhs, rhs) {
            (Value::F32(a), Value::F32(b)) => Value::F32(a * b),
            (Value::F64(a), Value::F64(b)) => Value::F64(a * b),
            _ => unreachable!("fmul on non-float (validation bug upstream of this engine)"),
        },
        FDiv => match (lhs, rhs) {
            (Value::F32(a), Value::F32(b)) => Value::F32(a / b),
            (Value::F64(a), Value::F64(b)) => Value::F64(a / b),
            _ => unreachable!("fdiv on non-float (validation bug upstream of this engine)"),
        },
        FMin => match (lhs, rhs) {
            (Value::F32(a), Value::F32(b)) => Value::F32(fmin32(a, b)),
            (Value::F64(a), Value::F64(b)) => Value::F64(fmin64(a, b)),
            _ => unreachable!("fmin on non-float (validation bug upstream of this engine)"),
        },
        FMax => match (lhs, rhs) {
            (Value::F32(a), Value::F32(b)) => Value::F32(fmax32(a, b)),
            (Value::F64(a), Value::F64(b)) => Value::F64(fmax64(a, b)),
            _ => unreachable!("fmax on non-float (validation bug upstream of this engine)"),
        },
        FCopysign => match (lhs, rhs) {
            (Value::F32(a), Value::F32(b)) => Value::F32(a.copysign(b)),
            (Value::F64(a), Value::F64(b)) => Value::F64(a.copysign(b)),
            _ => unreachable!("copysign on non-float (validation bug upstream of this engine)"),
        },
        Eq => Value::I32(i32::from(lhs == rhs)),
        Ne => Value::I32(i32::from(lhs != rhs)),
        LtS => Value::I32(i32::from(signed_cmp(lhs, rhs, |a, b| a < b))),
        LtU => Value::I32(i32::from(unsigned_cmp(lhs, rhs, |a, b| a < b))),
        GtS => Value::I32(i32::from(signed_cmp(lhs, rhs, |a, b| a > b))),
        GtU => Value::I32(i32::from(unsigned_cmp(lhs, rhs, |a, b| a > b))),
        LeS => Value::I32(i32::from(signed_cmp(lhs, rhs, |a, b| a <= b))),
        LeU => Value::I32(i32::from(unsigned_cmp(lhs, rhs, |a, b| a <= b))),
        GeS => Value::I32(i32::from(signed_cmp(lhs, rhs, |a, b| a >= b))),
        GeU => Value::I32(i32::from(unsigned_cmp(lhs, rhs, |a, b| a >= b))),
        FEq => Value::I32(i32::from(float_cmp(lhs, rhs, |a, b| a == b))),
        FNe => Value::I32(i32::from(float_cmp(lhs, rhs, |a, b| a != b))),
        FLt => Value::I32(i32::from(float_cmp(lhs, rhs, |a, b| a < b))),
        FGt => Value::I32(i32::from(float_cmp(lhs, rhs, |a, b| a > b))),
        FLe => Value::I32(i32::from(float_cmp(lhs, rhs, |a, b| a <= b))),
        FGe => Value::I32(i32::from(float_cmp(lhs, rhs, |a, b| a >= b))),
    })
}

fn signed_cmp(lhs: Value, rhs: Value, cmp: impl Fn(i64, i64) -> bool) -> bool {
    match (lhs, rhs) {
        (Value::I32(a), Value::I32(b)) => cmp(a as i64, b as i64),
        (Value::I64(a), Value::I64(b)) => cmp(a, b),
        _ => unreachable!("signed compare on non-integer (validation bug upstream of this engine)"),
    }
}

fn unsigned_cmp(lhs: Value, rhs: Value, cmp: impl Fn(u64, u64) -> bool) -> bool {
    match (lhs, rhs) {
        (Value::I32(a), Value::I32(b)) => cmp(a as u32 as u64, b as u32 as u64),
        (Value::I64(a), Value::I64(b)) => cmp(a as u64, b as u64),
        _ => {
            unreachable!("unsigned compare on non-integer (validation bug upstream of this engine)")
        }
    }
}

fn float_cmp(lhs: Value, rhs: Value, cmp: impl Fn(f64, f64) -> bool) -> bool {
    match (lhs, rhs) {
        (Value::F32(a), Value::F32(b)) => cmp(a as f64, b as f64),
        (Value::F64(a), Value::F64(b)) => cmp(a, b),
        _ => unreachable!("float compare on non-float (validation bug upstream of this engine)"),
    }
}

/// wasm `f32.min`/`f64.min`: NaN-propagating, and `-0.0 < 0.0` (unlike IEEE
/// `min`, which treats signed zeros as equal).
fn fmin32(a: f32, b: f32) -> f32 {
    if a.is_nan() || b.is_nan() {
        f32::NAN
    } else if a == 0.0 && b == 0.0 {
        if a.is_sign_negative() || b.is_sign_negative() {
            -0.0
        } else {
            0.0
        }
    } else {
        a.min(b)
    }
}

fn fmax32(a: f32, b: f32) -> f32 {
    if a.is_nan() || b.is_nan() {
        f32::NAN
    } else if a == 0.0 && b == 0.0 {
        if a.is_sign_positive() || b.is_sign_positive() {
            0.0
        } else {
            -0.0
        }
    } else {
        a.max(b)
    }
}

fn fmin64(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else if a == 0.0 && b == 0.0 {
        if a.is_sign_negative() || b.is_sign_negative() {
            -0.0
        } else {
            0.0
        }
    } else {
        a.min(b)
    }
}

fn fmax64(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else if a == 0.0 && b == 0.0 {
        if a.is_sign_positive() || b.is_sign_positive() {
            0.0
        } else {
            -0.0
        }
    } else {
        a.max(b)
    }
}

fn round_ties_even_f32(x: f32) -> f32 {
    let r = x.round();
    if (x - x.trunc()).abs() == 0.5 && (r as i64) % 2 != 0 {
        r - x.signum()
    } else {
        r
    }
}

fn round_ties_even_f64(x: f64) -> f64 {
    let r = x.round();
    if (x - x.trunc()).abs() == 0.5 && (r as i64) % 2 != 0 {
        r - x.signum()
    } else {
        r
    }
}

fn checked_div_s32(a: i32, b: i32, loc: NodeId) -> Result<i32> {
    if b == 0 {
        return Err(Trap::new(loc, TrapKind::IntegerDivideByZero));
    }
    a.checked_div(b)
        .ok_or_else(|| Trap::new(loc, TrapKind::IntegerOverflow))
}

fn checked_div_s64(a: i64, b: i64, loc: NodeId) -> Result<i64> {
    if b == 0 {
        return Err(Trap::new(loc, TrapKind::IntegerDivideByZero));
    }
    a.checked_div(b)
        .ok_or_else(|| Trap::new(loc, TrapKind::IntegerOverflow))
}

fn checked_div_u(a: u64, b: u64, loc: NodeId) -> Result<u64> {
    if b == 0 {
        return Err(Trap::new(loc, TrapKind::IntegerDivideByZero));
    }
    Ok(a / b)
}

fn checked_rem_s32(a: i32, b: i32, loc: NodeId) -> Result<i32> {
    if b == 0 {
        return Err(Trap::new(loc, TrapKind::IntegerDivideByZero));
    }
    Ok(a.wrapping_rem(b))
}

fn checked_rem_s64(a: i64, b: i64, loc: NodeId) -> Result<i64> {
    if b == 0 {
        return Err(Trap::new(loc, TrapKind::IntegerDivideByZero));
    }
    Ok(a.wrapping_rem(b))
}

fn checked_rem_u(a: u64, b: u64, loc: NodeId) -> Result<u64> {
    if b == 0 {
        return Err(Trap::new(loc, TrapKind::IntegerDivideByZero));
    }
    Ok(a % b)
}

fn trunc_to_i64(x: f64, loc: NodeId) -> Result<i64> {
    if x.is_nan() {
        return Err(Trap::new(loc, TrapKind::InvalidConversion));
    }
    let t = x.trunc();
    if t < i64::MIN as f64 || t >= 9_223_372_036_854_775_808.0 {
        return Err(Trap::new(loc, TrapKind::IntegerOverflow));
    }
    Ok(t as i64)
}

fn trunc_to_u64(x: f64, loc: NodeId) -> Result<u64> {
    if x.is_nan() {
        return Err(Trap::new(loc, TrapKind::InvalidConversion));
    }
    let t = x.trunc();
    if t < 0.0 || t >= 18_446_744_073_709_551_616.0 {
        return Err(Trap::new(loc, TrapKind::IntegerOverflow));
    }
    Ok(t as u64)
}

fn int_to_float(x: f64, result_ty: ValType) -> Value {
    match result_ty {
        ValType::F32 => Value::F32(x as f32),
        ValType::F64 => Value::F64(x),
        _ => unreachable!("convert target must be a float type (validation bug upstream of this engine)"),
    }
}

fn from_trunc_i64(v: i64, result_ty: ValType, loc: NodeId) -> Result<Value> {
    Ok(match result_ty {
        ValType::I32 => {
            Value::I32(i32::try_from(v).map_err(|_| Trap::new(loc, TrapKind::IntegerOverflow))?)
        }
        ValType::I64 => Value::I64(v),
        _ => unreachable!(
            "trunc target must be an integer type (validation bug upstream of this engine)"
        ),
    })
}

fn from_trunc_u64(v: u64, result_ty: ValType, loc: NodeId) -> Result<Value> {
    Ok(match result_ty {
        ValType::I32 => Value::I32(
            u32::try_from(v).map_err(|_| Trap::new(loc, TrapKind::IntegerOverflow))? as i32,
        ),
        ValType::I64 => Value::I64(v as i64),
        _ => unreachable!(
            "trunc target must be an integer type (validation bug upstream of this engine)"
        ),
    })
}
