// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The *infallible* and *uninterruptible* predicates the compiler consults
//! to decide what belongs in a sequence.
//!
//! Both predicates are computed exactly once per node and memoized by node
//! identity, so a deeply nested expression isn't re-walked for every ancestor
//! that asks "can any of my descendants fail or suspend".

use std::collections::HashMap;

use crate::ast::{Expr, ExprKind, NodeId, UnaryOp};

/// The two classifier bits, cached per node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub infallible: bool,
    pub uninterruptible: bool,
}

/// Memoization table, keyed by [`NodeId`]. One instance lives per compile
/// (not per instance) — the classification is a property of the AST, not of
/// any particular run.
#[derive(Debug, Default)]
pub struct Classifier {
    cache: HashMap<NodeId, Classification>,
}

impl Classifier {
    pub fn new() -> Self {
        Classifier {
            cache: HashMap::new(),
        }
    }

    /// Classify `expr`, recursing into children and memoizing the result.
    pub fn classify(&mut self, expr: &Expr) -> Classification {
        if let Some(c) = self.cache.get(&expr.id) {
            return *c;
        }
        // Insert a conservative placeholder before recursing so a
        // (hypothetically) self-referential id can't recurse forever; the
        // AST is a tree so this never triggers, but costs nothing to guard.
        let c = self.classify_uncached(expr);
        self.cache.insert(expr.id, c);
        c
    }

    fn classify_uncached(&mut self, expr: &Expr) -> Classification {
        use ExprKind::*;
        match &expr.kind {
            // Always fallible: the callee is unknown statically (direct
            // calls can still trap inside the callee; indirect calls can
            // additionally trap on signature mismatch or OOB table index).
            // Always interruptible: a call may suspend into an async host.
            Call { args, .. } => self.fold_fallible_children(args, false, false),
            CallIndirect { callee, args, .. } => {
                self.classify(callee);
                for a in args {
                    self.classify(a);
                }
                Classification {
                    infallible: false,
                    uninterruptible: false,
                }
            }
            Unreachable => Classification {
                infallible: false,
                uninterruptible: false,
            },

            // Fallible but uninterruptible: they trap, they don't suspend.
            Load { addr, .. } => {
                let c = self.classify(addr);
                Classification {
                    infallible: false,
                    uninterruptible: c.uninterruptible,
                }
            }
            Store { addr, value, .. } => {
                let c = self.fold(&[addr, value]);
                Classification {
                    infallible: false,
                    uninterruptible: c.uninterruptible,
                }
            }
            MemoryGrow { delta } => {
                let c = self.classify(delta);
                Classification {
                    infallible: true,
                    uninterruptible: c.uninterruptible,
                }
            }

            Binary { op, lhs, rhs } => {
                let c = self.fold(&[lhs, rhs]);
                let fallible_op = matches!(
                    op,
                    crate::ast::BinaryOp::DivS
                        | crate::ast::BinaryOp::DivU
                        | crate::ast::BinaryOp::RemS
                        | crate::ast::BinaryOp::RemU
                );
                Classification {
                    infallible: c.infallible && !fallible_op,
                    uninterruptible: c.uninterruptible,
                }
            }

            // Float-to-int truncation traps on NaN/out-of-range input, so it
            // must be fallible even though most unary ops are not.
            Unary { op, operand } => {
                let c = self.classify(operand);
                let truncating = matches!(
                    op,
                    UnaryOp::TruncF32S
                        | UnaryOp::TruncF32U
                        | UnaryOp::TruncF64S
                        | UnaryOp::TruncF64U
                );
                Classification {
                    infallible: c.infallible && !truncating,
                    uninterruptible: c.uninterruptible,
                }
            }

            Const { .. } | LocalGet { .. } | GlobalGet { .. } | MemorySize | Nop => {
                Classification {
                    infallible: true,
                    uninterruptible: true,
                }
            }

            LocalSet { value, .. } | GlobalSet { value, .. } | Drop { value } => {
                self.fold(&[value])
            }

            Select { cond, a, b } => self.fold(&[cond, a, b]),

            Return { value } => {
                let mut c = Classification {
                    infallible: true,
                    uninterruptible: true,
                };
                if let Some(v) = value {
                    c = self.fold(&[v]);
                }
                c
            }

            Break { value, .. } => {
                let mut c = Classification {
                    infallible: true,
                    uninterruptible: true,
                };
                if let Some(v) = value {
                    c = self.fold(&[v]);
                }
                c
            }

            Switch { index, value, .. } => {
                let mut children = vec![index.clone()];
                if let Some(v) = value {
                    children.push(v.clone());
                }
                self.fold_owned(&children)
            }

            // Control structures: conservatively, any fallible or
            // interruptible descendant taints the whole construct, since
            // sequences only ever gate whole runs of nodes and can't span a
            // control-flow boundary anyway (see compiler::emit).
            Block { body } | Loop { body } => self.fold_owned(body),
            If {
                cond,
                then_body,
                else_body,
            } => {
                let mut c = self.classify(cond);
                for e in then_body.iter().chain(else_body.iter()) {
                    let ec = self.classify(e);
                    c = Classification {
                        infallible: c.infallible && ec.infallible,
                        uninterruptible: c.uninterruptible && ec.uninterruptible,
                    };
                }
                c
            }
        }
    }

    fn fold(&mut self, children: &[&crate::ast::ExprRef]) -> Classification {
        children.iter().fold(
            Classification {
                infallible: true,
                uninterruptible: true,
            },
            |acc, e| {
                let c = self.classify(e);
                Classification {
                    infallible: acc.infallible && c.infallible,
                    uninterruptible: acc.uninterruptible && c.uninterruptible,
                }
            },
        )
    }

    fn fold_owned(&mut self, children: &[crate::ast::ExprRef]) -> Classification {
        children.iter().fold(
            Classification {
                infallible: true,
                uninterruptible: true,
            },
            |acc, e| {
                let c = self.classify(e);
                Classification {
                    infallible: acc.infallible && c.infallible,
                    uninterruptible: acc.uninterruptible && c.uninterruptible,
                }
            },
        )
    }

    fn fold_fallible_children(
        &mut self,
        children: &[crate::ast::ExprRef],
        infallible: bool,
        uninterruptible: bool,
    ) -> Classification {
        for e in children {
            self.classify(e);
        }
        Classification {
            infallible,
            uninterruptible,
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}
