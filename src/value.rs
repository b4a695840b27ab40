// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The WebAssembly MVP value domain: a tagged union over the four numeric
//! types, plus the coercions the host boundary needs (import arguments,
//! export results) and the little-endian byte codecs [`Value::load`] and
//! [`Value::store`] the memory compiler calls into.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::ast::ValType;

/// A WebAssembly MVP runtime value.
///
/// `i32`/`f32`/`f64` all fit in a 64-bit slot; `i64` is carried as a signed
/// 64-bit integer. Bit patterns, not mathematical values, are what the
/// interpreter manipulates — `reinterpret` and the sign/zero-extending loads
/// all operate on the underlying bits via `to_bits`/`from_bits`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Value {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl Value {
    /// The zero value of `ty`, used to initialize non-parameter locals.
    pub const fn default_for(ty: ValType) -> Self {
        match ty {
            ValType::I32 => Value::I32(0),
            ValType::I64 => Value::I64(0),
            ValType::F32 => Value::F32(0.0),
            ValType::F64 => Value::F64(0.0),
        }
    }

    pub const fn ty(&self) -> ValType {
        match self {
            Value::I32(_) => ValType::I32,
            Value::I64(_) => ValType::I64,
            Value::F32(_) => ValType::F32,
            Value::F64(_) => ValType::F64,
        }
    }

    pub fn unwrap_i32(&self) -> i32 {
        match self {
            Value::I32(v) => *v,
            _ => panic!("expected i32, found {self:?} (validation bug upstream of this engine)"),
        }
    }

    pub fn unwrap_i64(&self) -> i64 {
        match self {
            Value::I64(v) => *v,
            _ => panic!("expected i64, found {self:?} (validation bug upstream of this engine)"),
        }
    }

    pub fn unwrap_f32(&self) -> f32 {
        match self {
            Value::F32(v) => *v,
            _ => panic!("expected f32, found {self:?} (validation bug upstream of this engine)"),
        }
    }

    pub fn unwrap_f64(&self) -> f64 {
        match self {
            Value::F64(v) => *v,
            _ => panic!("expected f64, found {self:?} (validation bug upstream of this engine)"),
        }
    }

    /// i32 reinterpreted as u32, the representation most integer opcodes work in.
    pub fn unwrap_u32(&self) -> u32 {
        self.unwrap_i32() as u32
    }

    pub fn unwrap_u64(&self) -> u64 {
        self.unwrap_i64() as u64
    }

    /// Coerce a host-supplied argument to `ty` the way an import boundary
    /// would: i32 truncation, i64 wrapping, f32 rounding ("fround"), f64
    /// identity. Imports always observe already-coerced arguments.
    pub fn coerce(self, ty: ValType) -> Value {
        match (self, ty) {
            (Value::I32(v), ValType::I32) => Value::I32(v),
            (v, ValType::I32) => Value::I32(v.as_f64() as i64 as i32),
            (Value::I64(v), ValType::I64) => Value::I64(v),
            (v, ValType::I64) => Value::I64(v.as_f64() as i64),
            (Value::F32(v), ValType::F32) => Value::F32(v),
            (v, ValType::F32) => Value::F32(v.as_f64() as f32),
            (Value::F64(v), ValType::F64) => Value::F64(v),
            (v, ValType::F64) => Value::F64(v.as_f64()),
        }
    }

    fn as_f64(&self) -> f64 {
        match self {
            Value::I32(v) => f64::from(*v),
            Value::I64(v) => *v as f64,
            Value::F32(v) => f64::from(*v),
            Value::F64(v) => *v,
        }
    }

    /// Read `width` little-endian bytes from `bytes` and reassemble them into
    /// `ty`, sign- or zero-extending narrow integer loads as directed.
    ///
    /// `bytes` must already be the `width`-byte window at the effective
    /// address; bounds checking happens in the caller.
    pub fn load(bytes: &[u8], width: u8, signed: bool, ty: ValType) -> Value {
        debug_assert_eq!(bytes.len(), usize::from(width));
        let mut buf = [0u8; 8];
        buf[..bytes.len()].copy_from_slice(bytes);
        let raw = u64::from_le_bytes(buf);
        match ty {
            ValType::I32 => Value::I32(sign_or_zero_extend_32(raw, width, signed)),
            ValType::I64 => Value::I64(sign_or_zero_extend_64(raw, width, signed)),
            ValType::F32 => Value::F32(f32::from_bits(raw as u32)),
            ValType::F64 => Value::F64(f64::from_bits(raw)),
        }
    }

    /// Encode the low `width` bytes of this value, little-endian, for a Store.
    /// i64 narrow stores convert through a 32-bit intermediate.
    pub fn store(&self, width: u8) -> [u8; 8] {
        let raw: u64 = match self {
            Value::I32(v) => u64::from(*v as u32),
            Value::I64(v) => *v as u64,
            Value::F32(v) => u64::from(v.to_bits()),
            Value::F64(v) => v.to_bits(),
        };
        let mut buf = raw.to_le_bytes();
        if usize::from(width) < buf.len() {
            for b in &mut buf[usize::from(width)..] {
                *b = 0;
            }
        }
        buf
    }
}

fn sign_or_zero_extend_32(raw: u64, width: u8, signed: bool) -> i32 {
    match (width, signed) {
        (1, false) => raw as u8 as i32,
        (1, true) => raw as u8 as i8 as i32,
        (2, false) => raw as u16 as i32,
        (2, true) => raw as u16 as i16 as i32,
        (4, _) => raw as u32 as i32,
        _ => unreachable!("i32 load width must be 1, 2, or 4"),
    }
}

fn sign_or_zero_extend_64(raw: u64, width: u8, signed: bool) -> i64 {
    match (width, signed) {
        (1, false) => raw as u8 as i64,
        (1, true) => raw as u8 as i8 as i64,
        (2, false) => raw as u16 as i64,
        (2, true) => raw as u16 as i16 as i64,
        (4, false) => raw as u32 as i64,
        (4, true) => raw as u32 as i32 as i64,
        (8, _) => raw as i64,
        _ => unreachable!("i64 load width must be 1, 2, 4, or 8"),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::I32(v) => write!(f, "{v}"),
            Value::I64(v) => write!(f, "{v}"),
            Value::F32(v) => write!(f, "{v}"),
            Value::F64(v) => write!(f, "{v}"),
        }
    }
}
