//! Call/closure link
//!
//! One record per call site that passes a closure. The `Send`, the closure's
//! `LoadYieldParams`, every `BlockReturn` inside it and the trailing
//! `SolveConstraint` all hold the same [`LinkId`], so the constraint solver
//! can reach every participant from any one of them without extra edges.

use crate::shared::models::{NameRef, ParamKind, Span, TypeRef};
use once_cell::sync::OnceCell;
use std::fmt;

/// Stable handle into [`crate::features::cfg::Cfg::links`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId(pub u32);

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link#{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct SendAndBlockLink {
    /// Method the closure is passed to
    pub fun: NameRef,
    /// Closure nesting id of the closure body (see `BasicBlock::closure_id`)
    pub closure_id: u32,
    /// Declared parameter shapes, in order
    pub param_kinds: Vec<ParamKind>,
    pub span: Span,
    solved: OnceCell<TypeRef>,
}

impl SendAndBlockLink {
    pub fn new(fun: NameRef, closure_id: u32, param_kinds: Vec<ParamKind>, span: Span) -> Self {
        Self {
            fun,
            closure_id,
            param_kinds,
            span,
            solved: OnceCell::new(),
        }
    }

    pub fn arity(&self) -> usize {
        self.param_kinds.len()
    }

    /// Result recorded by the solver, if any
    pub fn solved(&self) -> Option<TypeRef> {
        self.solved.get().copied()
    }

    /// Record the solver's result. The first result wins; a second attempt
    /// hands back the rejected value.
    pub fn resolve(&self, ty: TypeRef) -> Result<(), TypeRef> {
        self.solved.set(ty)
    }
}

impl PartialEq for SendAndBlockLink {
    fn eq(&self, other: &Self) -> bool {
        self.fun == other.fun
            && self.closure_id == other.closure_id
            && self.param_kinds == other.param_kinds
            && self.span == other.span
            && self.solved() == other.solved()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_is_set_once() {
        let link = SendAndBlockLink::new(NameRef(1), 1, vec![ParamKind::Positional], Span::zero());
        assert_eq!(link.solved(), None);

        assert!(link.resolve(TypeRef(4)).is_ok());
        assert_eq!(link.resolve(TypeRef(5)), Err(TypeRef(5)));
        assert_eq!(link.solved(), Some(TypeRef(4)));
        assert_eq!(link.arity(), 1);
    }
}
