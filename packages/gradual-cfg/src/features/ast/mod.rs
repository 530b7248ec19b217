//! Desugared AST - the builder's input contract
//!
//! The desugarer hands over one method body built only from the primitive
//! node kinds below: operator assignment, destructuring, test DSL blocks and
//! the like are already rewritten into sends, assigns and sequences.
//! Locals arrive resolved to `(name, unique)` pairs so shadowing closure
//! parameters never collide with outer locals.

pub mod mk;

use crate::shared::models::{CastKind, LiteralType, NameRef, ParamKind, Span, SymbolRef, TypeRef};
use crate::shared::stack::ensure_sufficient_stack;
use std::collections::BTreeSet;
use std::fmt;

/// A resolved local variable reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalRef {
    pub name: NameRef,
    /// Disambiguates shadowing locals that share a name (0 = outermost)
    pub unique: u32,
}

impl LocalRef {
    pub fn new(name: NameRef) -> Self {
        Self { name, unique: 0 }
    }
}

/// Constructs the builder deliberately does not model
///
/// Each lowers to a single `NotSupported` instruction whose reason is
/// [`UnsupportedConstruct::reason`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnsupportedConstruct {
    /// `case/in` pattern matching
    PatternMatch,
    /// `retry` inside a rescue clause
    Retry,
    /// `redo` inside a loop
    Redo,
    /// Zero-argument `super` forwarding the caller's arguments implicitly
    ZSuper,
    /// Class definition nested in a method body
    NestedClassDef,
    /// Method definition nested in a method body
    NestedMethodDef,
    /// `&blk` argument passed to a call
    BlockPass,
    /// `*args` splat in call position
    Splat,
    /// `break` with no enclosing loop or closure
    BreakOutsideLoop,
    /// `next` with no enclosing loop or closure
    NextOutsideLoop,
    /// Nesting past the configured recursion limit
    NestingTooDeep,
}

impl UnsupportedConstruct {
    pub const ALL: [UnsupportedConstruct; 11] = [
        UnsupportedConstruct::PatternMatch,
        UnsupportedConstruct::Retry,
        UnsupportedConstruct::Redo,
        UnsupportedConstruct::ZSuper,
        UnsupportedConstruct::NestedClassDef,
        UnsupportedConstruct::NestedMethodDef,
        UnsupportedConstruct::BlockPass,
        UnsupportedConstruct::Splat,
        UnsupportedConstruct::BreakOutsideLoop,
        UnsupportedConstruct::NextOutsideLoop,
        UnsupportedConstruct::NestingTooDeep,
    ];

    pub fn reason(&self) -> &'static str {
        match self {
            UnsupportedConstruct::PatternMatch => "pattern matching is not supported",
            UnsupportedConstruct::Retry => "retry is not supported",
            UnsupportedConstruct::Redo => "redo is not supported",
            UnsupportedConstruct::ZSuper => "implicit argument forwarding via super is not supported",
            UnsupportedConstruct::NestedClassDef => "class definitions inside methods are not supported",
            UnsupportedConstruct::NestedMethodDef => "method definitions inside methods are not supported",
            UnsupportedConstruct::BlockPass => "passing a block argument with & is not supported",
            UnsupportedConstruct::Splat => "splat arguments are not supported",
            UnsupportedConstruct::BreakOutsideLoop => "break outside of a loop or block",
            UnsupportedConstruct::NextOutsideLoop => "next outside of a loop or block",
            UnsupportedConstruct::NestingTooDeep => "expression nesting exceeds the configured limit",
        }
    }
}

impl fmt::Display for UnsupportedConstruct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

/// Expression node
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub span: Span,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Absent expression; evaluates to nil
    EmptyTree,
    Literal(LiteralType),
    Local(LocalRef),
    /// `lhs = rhs`; the desugarer only produces `Local` on the left
    Assign { lhs: Box<Expr>, rhs: Box<Expr> },
    SelfRef,
    /// Reference to a resolved constant
    Constant(SymbolRef),
    Send(Box<SendExpr>),
    If {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Option<Box<Expr>>,
    },
    While { cond: Box<Expr>, body: Box<Expr> },
    Break(Option<Box<Expr>>),
    Next(Option<Box<Expr>>),
    Return(Option<Box<Expr>>),
    /// Statements evaluated for effect, then `expr` for the value
    InsSeq { stats: Vec<Expr>, expr: Box<Expr> },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Cast {
        expr: Box<Expr>,
        ty: TypeRef,
        kind: CastKind,
    },
    Rescue(Box<RescueExpr>),
    Array(Vec<Expr>),
    /// Key/value pairs in source order
    Hash(Vec<(Expr, Expr)>),
    Unsupported(UnsupportedConstruct),
}

/// Method call, optionally with an attached closure
#[derive(Debug, Clone, PartialEq)]
pub struct SendExpr {
    pub recv: Expr,
    pub fun: NameRef,
    pub args: Vec<Expr>,
    pub closure: Option<Closure>,
}

/// Block literal attached to a call
#[derive(Debug, Clone, PartialEq)]
pub struct Closure {
    pub params: Vec<Param>,
    pub body: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub local: LocalRef,
    pub kind: ParamKind,
    pub span: Span,
}

/// `begin; body; rescue ...; else ...; ensure ...; end`
#[derive(Debug, Clone, PartialEq)]
pub struct RescueExpr {
    pub body: Expr,
    pub clauses: Vec<RescueClause>,
    pub else_body: Option<Expr>,
    pub ensure: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RescueClause {
    /// Exception classes; empty catches everything
    pub exceptions: Vec<Expr>,
    /// `=> e` binding; the desugarer only produces `Local` here
    pub var: Option<Expr>,
    pub body: Expr,
    pub span: Span,
}

/// One desugared method body
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDef {
    pub name: NameRef,
    /// Enclosing class or module
    pub owner: SymbolRef,
    pub params: Vec<Param>,
    pub body: Expr,
    pub span: Span,
}

impl Expr {
    pub fn new(span: Span, kind: ExprKind) -> Self {
        Self { span, kind }
    }

    pub fn as_local(&self) -> Option<LocalRef> {
        match self.kind {
            ExprKind::Local(local) => Some(local),
            _ => None,
        }
    }

    /// Locals written inside this expression, closure bodies included, down
    /// to `levels` nesting levels (this expression is the first level)
    ///
    /// Closure parameters are excluded: they are rebound on every closure
    /// entry and never flow around the closure header.
    pub fn assigned_locals(&self, levels: usize) -> BTreeSet<LocalRef> {
        let mut out = BTreeSet::new();
        self.collect_assigned(levels, &mut out);
        out
    }

    fn collect_assigned(&self, levels: usize, out: &mut BTreeSet<LocalRef>) {
        if levels == 0 {
            return;
        }
        ensure_sufficient_stack(|| self.collect_children(levels - 1, out))
    }

    fn collect_children(&self, levels: usize, out: &mut BTreeSet<LocalRef>) {
        match &self.kind {
            ExprKind::EmptyTree
            | ExprKind::Literal(_)
            | ExprKind::Local(_)
            | ExprKind::SelfRef
            | ExprKind::Constant(_)
            | ExprKind::Unsupported(_) => {}
            ExprKind::Assign { lhs, rhs } => {
                if let Some(local) = lhs.as_local() {
                    out.insert(local);
                }
                rhs.collect_assigned(levels, out);
            }
            ExprKind::Send(send) => {
                send.recv.collect_assigned(levels, out);
                for arg in &send.args {
                    arg.collect_assigned(levels, out);
                }
                if let Some(closure) = &send.closure {
                    let mut inner = BTreeSet::new();
                    closure.body.collect_assigned(levels, &mut inner);
                    for param in &closure.params {
                        inner.remove(&param.local);
                    }
                    out.extend(inner);
                }
            }
            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                cond.collect_assigned(levels, out);
                then_branch.collect_assigned(levels, out);
                if let Some(else_branch) = else_branch {
                    else_branch.collect_assigned(levels, out);
                }
            }
            ExprKind::While { cond, body } => {
                cond.collect_assigned(levels, out);
                body.collect_assigned(levels, out);
            }
            ExprKind::Break(value) | ExprKind::Next(value) | ExprKind::Return(value) => {
                if let Some(value) = value {
                    value.collect_assigned(levels, out);
                }
            }
            ExprKind::InsSeq { stats, expr } => {
                for stat in stats {
                    stat.collect_assigned(levels, out);
                }
                expr.collect_assigned(levels, out);
            }
            ExprKind::And(left, right) | ExprKind::Or(left, right) => {
                left.collect_assigned(levels, out);
                right.collect_assigned(levels, out);
            }
            ExprKind::Cast { expr, .. } => expr.collect_assigned(levels, out),
            ExprKind::Rescue(rescue) => {
                rescue.body.collect_assigned(levels, out);
                for clause in &rescue.clauses {
                    for exception in &clause.exceptions {
                        exception.collect_assigned(levels, out);
                    }
                    if let Some(local) = clause.var.as_ref().and_then(Expr::as_local) {
                        out.insert(local);
                    }
                    clause.body.collect_assigned(levels, out);
                }
                if let Some(else_body) = &rescue.else_body {
                    else_body.collect_assigned(levels, out);
                }
                if let Some(ensure) = &rescue.ensure {
                    ensure.collect_assigned(levels, out);
                }
            }
            ExprKind::Array(elems) => {
                for elem in elems {
                    elem.collect_assigned(levels, out);
                }
            }
            ExprKind::Hash(pairs) => {
                for (key, value) in pairs {
                    key.collect_assigned(levels, out);
                    value.collect_assigned(levels, out);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mk;
    use super::*;

    fn local(n: u32) -> LocalRef {
        LocalRef::new(NameRef(n))
    }

    #[test]
    fn test_assigned_locals_sees_through_control_flow() {
        let body = mk::ins_seq(
            vec![
                mk::assign(local(1), mk::int(1)),
                mk::if_(
                    mk::local(local(1)),
                    mk::assign(local(2), mk::int(2)),
                    None,
                ),
            ],
            mk::while_(mk::true_(), mk::assign(local(3), mk::nil())),
        );

        let assigned: Vec<_> = body.assigned_locals(usize::MAX).into_iter().collect();
        assert_eq!(assigned, vec![local(1), local(2), local(3)]);
    }

    #[test]
    fn test_assigned_locals_excludes_closure_params() {
        let closure = mk::closure(
            vec![mk::param(local(7))],
            mk::ins_seq(
                vec![mk::assign(local(7), mk::int(0))],
                mk::assign(local(8), mk::local(local(7))),
            ),
        );
        let call = mk::send_with_closure(mk::self_(), NameRef(100), vec![], closure);

        let assigned: Vec<_> = call.assigned_locals(usize::MAX).into_iter().collect();
        assert_eq!(assigned, vec![local(8)]);
    }

    #[test]
    fn test_assigned_locals_stops_at_level_limit() {
        // assign(1) sits at level 3, assign(2) at level 4
        let body = mk::while_(
            mk::true_(),
            mk::ins_seq(
                vec![mk::assign(local(1), mk::int(1))],
                mk::if_(mk::true_(), mk::assign(local(2), mk::int(2)), None),
            ),
        );

        assert!(body.assigned_locals(2).is_empty());
        assert_eq!(body.assigned_locals(3).into_iter().collect::<Vec<_>>(), vec![local(1)]);
        assert_eq!(body.assigned_locals(4).len(), 2);
    }

    #[test]
    fn test_every_unsupported_construct_has_reason() {
        for construct in UnsupportedConstruct::ALL {
            assert!(!construct.reason().is_empty());
        }
    }
}
