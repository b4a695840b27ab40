// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The decoded expression tree this engine compiles. Producing this tree
//! from the wire format is out of scope — it is assumed to arrive already
//! validated against the WebAssembly type system. What lives here is the
//! shape of that tree plus the function/module descriptors around it.

use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

/// One of the four MVP value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValType {
    I32,
    I64,
    F32,
    F64,
}

/// A function's result arity in the MVP: at most one value.
pub type BlockType = Option<ValType>;

/// A dense, stable identity for an AST node, used as a *source location*.
///
/// Using a node's address would be a stopgap; this engine instead assigns a
/// dense `u32` at construction time, via [`NodeId::fresh`].
/// Ids are comparable, `Copy`, and stable for the instance's lifetime —
/// exactly what the debug registry and frame snapshots require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

static NEXT_NODE_ID: AtomicU32 = AtomicU32::new(0);

impl NodeId {
    /// Allocate the next id in construction order. Construction is assumed to
    /// happen single-threaded (at decode time), same as the rest of module
    /// building; the atomic only buys us interior mutability without a
    /// `RefCell` thread through every AST builder call.
    pub fn fresh() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    // Integer
    Clz,
    Ctz,
    Popcnt,
    Eqz,
    // Float
    Abs,
    Neg,
    Sqrt,
    Ceil,
    Floor,
    Trunc,
    Nearest,
    // Conversions (fallible iff truncating float->int; see classifier)
    Wrap64To32,
    ExtendI32S,
    ExtendI32U,
    TruncF32S,
    TruncF32U,
    TruncF64S,
    TruncF64U,
    ConvertI32S,
    ConvertI32U,
    ConvertI64S,
    ConvertI64U,
    DemoteF64,
    PromoteF32,
    ReinterpretI32AsF32,
    ReinterpretI64AsF64,
    ReinterpretF32AsI32,
    ReinterpretF64AsI64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    DivS,
    DivU,
    RemS,
    RemU,
    And,
    Or,
    Xor,
    Shl,
    ShrS,
    ShrU,
    Rotl,
    Rotr,
    // Float arithmetic
    FAdd,
    FSub,
    FMul,
    FDiv,
    FMin,
    FMax,
    FCopysign,
    // Comparisons (produce i32 0/1)
    Eq,
    Ne,
    LtS,
    LtU,
    GtS,
    GtU,
    LeS,
    LeU,
    GeS,
    GeU,
    FEq,
    FNe,
    FLt,
    FGt,
    FLe,
    FGe,
}

/// Width and signedness of a Load/Store, independent of the node's declared
/// value type (e.g. `i64.load8_s` loads 1 byte, sign-extends into i64).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemArg {
    pub offset: u32,
    pub width: u8,
    pub signed: bool,
}

/// A label target for `Break`/`Switch`: how many block levels to unwind and
/// whether the target is a loop head (re-enter) or a block end (exit once,
/// optionally carrying the top-of-stack value as the block's result).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelTarget {
    pub relative_depth: u32,
    pub is_loop: bool,
}

/// One decoded instruction. `result_ty` is `None` for instructions producing
/// no stack value.
#[derive(Debug, Clone)]
pub struct Expr {
    pub id: NodeId,
    pub result_ty: BlockType,
    pub kind: ExprKind,
}

impl Expr {
    pub fn new(result_ty: BlockType, kind: ExprKind) -> Rc<Expr> {
        Rc::new(Expr {
            id: NodeId::fresh(),
            result_ty,
            kind,
        })
    }
}

pub type ExprRef = Rc<Expr>;

#[derive(Debug, Clone)]
pub enum ExprKind {
    Block {
        body: Vec<ExprRef>,
    },
    If {
        cond: ExprRef,
        then_body: Vec<ExprRef>,
        else_body: Vec<ExprRef>,
    },
    Loop {
        body: Vec<ExprRef>,
    },
    Break {
        target: LabelTarget,
        value: Option<ExprRef>,
    },
    /// `br_table`: an index expression selects one of `targets`, defaulting
    /// to `default` when out of range.
    Switch {
        index: ExprRef,
        targets: Vec<LabelTarget>,
        default: LabelTarget,
        value: Option<ExprRef>,
    },
    Call {
        func_index: u32,
        args: Vec<ExprRef>,
    },
    CallIndirect {
        type_index: u32,
        table_index: u32,
        callee: ExprRef,
        args: Vec<ExprRef>,
    },
    LocalGet {
        index: u32,
    },
    LocalSet {
        index: u32,
        value: ExprRef,
        tee: bool,
    },
    GlobalGet {
        index: u32,
    },
    GlobalSet {
        index: u32,
        value: ExprRef,
    },
    Load {
        arg: MemArg,
        addr: ExprRef,
    },
    Store {
        arg: MemArg,
        addr: ExprRef,
        value: ExprRef,
    },
    Const {
        value: crate::value::Value,
    },
    Unary {
        op: UnaryOp,
        operand: ExprRef,
    },
    Binary {
        op: BinaryOp,
        lhs: ExprRef,
        rhs: ExprRef,
    },
    Select {
        cond: ExprRef,
        a: ExprRef,
        b: ExprRef,
    },
    Drop {
        value: ExprRef,
    },
    Return {
        value: Option<ExprRef>,
    },
    MemorySize,
    MemoryGrow {
        delta: ExprRef,
    },
    Nop,
    Unreachable,
}

/// A function signature.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FuncType {
    pub params: Vec<ValType>,
    pub result: BlockType,
}

/// The body of a locally-defined function, or the absence of one for an
/// import: imports are descriptors whose body is replaced by a host handle.
#[derive(Debug, Clone)]
pub enum FuncBody {
    Local {
        /// Types of locals beyond the parameters, appended after params in
        /// the local-index space.
        locals: Vec<ValType>,
        body: Vec<ExprRef>,
    },
    Import { module: String, name: String },
}

/// A function descriptor, decoded and ready to compile.
#[derive(Debug, Clone)]
pub struct FuncDesc {
    pub name: String,
    pub ty: FuncType,
    pub body: FuncBody,
    /// `Some` iff this function is exported under this name.
    pub export_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalType {
    pub ty: ValType,
    pub mutable: bool,
}

#[derive(Debug, Clone)]
pub struct GlobalDesc {
    pub name: String,
    pub ty: GlobalType,
    pub init: crate::value::Value,
    pub export_name: Option<String>,
}

/// Linear memory grows in 64 KiB units.
pub const PAGE_SIZE: usize = 65_536;

#[derive(Debug, Clone)]
pub struct MemoryDesc {
    pub initial_pages: u32,
    pub max_pages: Option<u32>,
    /// `Some` iff the memory is exported under this name: tables, memories,
    /// and globals are exposed as handles.
    pub export_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TableDesc {
    pub initial: u32,
    pub max: Option<u32>,
    pub export_name: Option<String>,
}

/// A fully decoded module, handed to the compiler as the unit of compilation.
#[derive(Debug, Clone, Default)]
pub struct Module {
    pub funcs: Vec<FuncDesc>,
    pub globals: Vec<GlobalDesc>,
    pub memory: Option<MemoryDesc>,
    pub table: Option<TableDesc>,
    /// Function-table elements, by table slot, as indices into `funcs`.
    pub table_elements: Vec<Option<u32>>,
    /// Function types, consulted by `CallIndirect` to check signatures
    /// against `IndirectCallTypeMismatch`.
    pub types: Vec<FuncType>,
    /// `funcs[i]`'s declared type index, parallel to `funcs`.
    pub func_type_indices: Vec<u32>,
}
