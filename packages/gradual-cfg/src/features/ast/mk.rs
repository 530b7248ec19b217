//! Node constructors
//!
//! Shorthand used by the desugarer's tests and by ours. Every node gets a
//! zero span; chain [`Expr::at`] to place it.

use super::*;

impl Expr {
    /// Place this node at `span`
    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

fn node(kind: ExprKind) -> Expr {
    Expr::new(Span::zero(), kind)
}

pub fn empty() -> Expr {
    node(ExprKind::EmptyTree)
}

pub fn literal(value: LiteralType) -> Expr {
    node(ExprKind::Literal(value))
}

pub fn nil() -> Expr {
    literal(LiteralType::Nil)
}

pub fn true_() -> Expr {
    literal(LiteralType::True)
}

pub fn false_() -> Expr {
    literal(LiteralType::False)
}

pub fn int(value: i64) -> Expr {
    literal(LiteralType::Integer(value))
}

pub fn string(text: NameRef) -> Expr {
    literal(LiteralType::String(text))
}

pub fn symbol(text: NameRef) -> Expr {
    literal(LiteralType::Symbol(text))
}

pub fn local(local: LocalRef) -> Expr {
    node(ExprKind::Local(local))
}

pub fn assign(lhs: LocalRef, rhs: Expr) -> Expr {
    node(ExprKind::Assign {
        lhs: Box::new(local(lhs)),
        rhs: Box::new(rhs),
    })
}

pub fn self_() -> Expr {
    node(ExprKind::SelfRef)
}

pub fn constant(symbol: SymbolRef) -> Expr {
    node(ExprKind::Constant(symbol))
}

pub fn send(recv: Expr, fun: NameRef, args: Vec<Expr>) -> Expr {
    node(ExprKind::Send(Box::new(SendExpr {
        recv,
        fun,
        args,
        closure: None,
    })))
}

pub fn send_with_closure(recv: Expr, fun: NameRef, args: Vec<Expr>, closure: Closure) -> Expr {
    node(ExprKind::Send(Box::new(SendExpr {
        recv,
        fun,
        args,
        closure: Some(closure),
    })))
}

pub fn closure(params: Vec<Param>, body: Expr) -> Closure {
    Closure {
        params,
        body,
        span: Span::zero(),
    }
}

pub fn param(local: LocalRef) -> Param {
    param_of_kind(local, ParamKind::Positional)
}

pub fn param_of_kind(local: LocalRef, kind: ParamKind) -> Param {
    Param {
        local,
        kind,
        span: Span::zero(),
    }
}

pub fn if_(cond: Expr, then_branch: Expr, else_branch: Option<Expr>) -> Expr {
    node(ExprKind::If {
        cond: Box::new(cond),
        then_branch: Box::new(then_branch),
        else_branch: else_branch.map(Box::new),
    })
}

pub fn while_(cond: Expr, body: Expr) -> Expr {
    node(ExprKind::While {
        cond: Box::new(cond),
        body: Box::new(body),
    })
}

pub fn break_(value: Option<Expr>) -> Expr {
    node(ExprKind::Break(value.map(Box::new)))
}

pub fn next(value: Option<Expr>) -> Expr {
    node(ExprKind::Next(value.map(Box::new)))
}

pub fn return_(value: Option<Expr>) -> Expr {
    node(ExprKind::Return(value.map(Box::new)))
}

pub fn ins_seq(stats: Vec<Expr>, expr: Expr) -> Expr {
    node(ExprKind::InsSeq {
        stats,
        expr: Box::new(expr),
    })
}

pub fn and(left: Expr, right: Expr) -> Expr {
    node(ExprKind::And(Box::new(left), Box::new(right)))
}

pub fn or(left: Expr, right: Expr) -> Expr {
    node(ExprKind::Or(Box::new(left), Box::new(right)))
}

pub fn cast(expr: Expr, ty: TypeRef, kind: CastKind) -> Expr {
    node(ExprKind::Cast {
        expr: Box::new(expr),
        ty,
        kind,
    })
}

pub fn rescue(
    body: Expr,
    clauses: Vec<RescueClause>,
    else_body: Option<Expr>,
    ensure: Option<Expr>,
) -> Expr {
    node(ExprKind::Rescue(Box::new(RescueExpr {
        body,
        clauses,
        else_body,
        ensure,
    })))
}

pub fn rescue_clause(exceptions: Vec<Expr>, var: Option<LocalRef>, body: Expr) -> RescueClause {
    RescueClause {
        exceptions,
        var: var.map(local),
        body,
        span: Span::zero(),
    }
}

pub fn array(elems: Vec<Expr>) -> Expr {
    node(ExprKind::Array(elems))
}

pub fn hash(pairs: Vec<(Expr, Expr)>) -> Expr {
    node(ExprKind::Hash(pairs))
}

pub fn unsupported(construct: UnsupportedConstruct) -> Expr {
    node(ExprKind::Unsupported(construct))
}

pub fn method(name: NameRef, owner: SymbolRef, params: Vec<Param>, body: Expr) -> MethodDef {
    MethodDef {
        name,
        owner,
        params,
        body,
        span: Span::zero(),
    }
}
