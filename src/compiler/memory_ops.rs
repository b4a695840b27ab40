// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Linear memory access: effective-address computation, bounds checking, and
//! the page-granular `memory.grow`. Kept independent of `Frame`/`Instance`
//! so the bounds-check arithmetic can
//! be unit tested without standing up a whole module.

use crate::ast::{MemArg, NodeId, PAGE_SIZE, ValType};
use crate::trap::{Trap, TrapKind};
use crate::value::Value;

type Result<T> = core::result::Result<T, Trap>;

/// `addr + offset`, both unsigned 32-bit quantities widened to 64 bits so the
/// addition itself never wraps — only the bounds check below can trap.
fn effective_address(addr: i32, offset: u32) -> u64 {
    u64::from(addr as u32) + u64::from(offset)
}

fn in_bounds(mem_len: usize, effective: u64, width: u8) -> bool {
    match effective.checked_add(u64::from(width)) {
        Some(end) => end <= mem_len as u64,
        None => false,
    }
}

pub fn do_load(mem: &[u8], arg: &MemArg, addr: Value, result_ty: ValType, loc: NodeId) -> Result<Value> {
    let effective = effective_address(addr.unwrap_i32(), arg.offset);
    if !in_bounds(mem.len(), effective, arg.width) {
        return Err(Trap::new(loc, TrapKind::MemoryAccess));
    }
    let start = effective as usize;
    let end = start + usize::from(arg.width);
    Ok(Value::load(&mem[start..end], arg.width, arg.signed, result_ty))
}

pub fn do_store(mem: &mut [u8], arg: &MemArg, addr: Value, value: Value, loc: NodeId) -> Result<()> {
    let effective = effective_address(addr.unwrap_i32(), arg.offset);
    if !in_bounds(mem.len(), effective, arg.width) {
        return Err(Trap::new(loc, TrapKind::MemoryAccess));
    }
    let start = effective as usize;
    let end = start + usize::from(arg.width);
    let bytes = value.store(arg.width);
    mem[start..end].copy_from_slice(&bytes[..usize::from(arg.width)]);
    Ok(())
}

pub fn size_pages(mem: &[u8]) -> i32 {
    (mem.len() / PAGE_SIZE) as i32
}

/// Grows `mem` by `delta` pages, zero-filling the new region, respecting
/// `max_pages` if set. Returns the *previous* size in pages on success, or
/// `-1` if the request would exceed the cap — `memory.grow`'s failure mode
/// is a sentinel return, not a trap.
pub fn grow(mem: &mut Vec<u8>, delta: u32, max_pages: Option<u32>) -> i32 {
    let previous = size_pages(mem);
    let Some(new_total) = previous.checked_add(delta as i32) else {
        return -1;
    };
    if let Some(max) = max_pages {
        if new_total as u32 > max {
            return -1;
        }
    }
    // The MVP caps linear memory at 4 GiB (65536 pages); guard against a
    // host-side allocation past that even when no explicit max was declared.
    if new_total > 65536 {
        return -1;
    }
    mem.resize(mem.len() + (delta as usize) * PAGE_SIZE, 0);
    previous
}
