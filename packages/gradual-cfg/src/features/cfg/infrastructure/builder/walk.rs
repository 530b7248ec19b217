//! Expression walk
//!
//! `lower` evaluates an expression into a target slot: when it returns, the
//! cursor's environment holds a fresh version of `target` with the value.
//! Control-flow constructs live in `control`, calls in `calls`, and
//! `begin/rescue` in `rescue`.

use super::context::{BuilderContext, Cursor};
use crate::errors::Result;
use crate::features::ast::{Expr, ExprKind, UnsupportedConstruct};
use crate::features::cfg::domain::{
    Alias, Cast, DebugEnvironment, Ident, Literal, LocalSlot, LocalVariable, NotSupported, SelfRef, Send,
};
use crate::shared::models::{AnnotationPos, LiteralType, Location, NameRef, Span};
use crate::shared::stack::ensure_sufficient_stack;

impl<'a> BuilderContext<'a> {
    pub(crate) fn lower(&mut self, mut cursor: Cursor, expr: &Expr, target: LocalSlot) -> Result<Cursor> {
        if self.depth >= self.config.max_nesting_depth {
            tracing::warn!(
                method = %self.method_name(),
                depth = self.depth,
                "expression nesting exceeds limit"
            );
            self.not_supported(&mut cursor, target, UnsupportedConstruct::NestingTooDeep, expr.span);
            return Ok(cursor);
        }

        self.emit_annotations_before(&mut cursor, expr.span);

        self.depth += 1;
        let lowered = ensure_sufficient_stack(|| self.lower_kind(cursor, expr, target));
        self.depth -= 1;
        lowered
    }

    fn lower_kind(&mut self, mut cursor: Cursor, expr: &Expr, target: LocalSlot) -> Result<Cursor> {
        let span = expr.span;
        match &expr.kind {
            ExprKind::EmptyTree => {
                self.nil(&mut cursor, target, span);
                Ok(cursor)
            }
            ExprKind::Literal(value) => {
                self.emit(&mut cursor, target, Literal { value: *value }, span);
                Ok(cursor)
            }
            ExprKind::Local(local) => {
                let slot = self.source_slot(*local);
                match cursor.get(slot) {
                    Some(what) => {
                        self.emit(&mut cursor, target, Ident { what }, span);
                    }
                    // Unassigned locals read as nil
                    None => {
                        self.nil(&mut cursor, target, span);
                    }
                }
                Ok(cursor)
            }
            ExprKind::Assign { lhs, rhs } => {
                let local = lhs
                    .as_local()
                    .ok_or_else(|| self.invariant(lhs.span, "assignment to a non-local expression"))?;
                let slot = self.source_slot(local);
                let mut cursor = self.lower(cursor, rhs, slot)?;
                let what = self.value(&mut cursor, slot, span)?;
                self.emit(&mut cursor, target, Ident { what }, span);
                Ok(cursor)
            }
            ExprKind::SelfRef => {
                let klass = self.method.owner;
                self.emit(&mut cursor, target, SelfRef { klass }, span);
                Ok(cursor)
            }
            ExprKind::Constant(symbol) => {
                self.emit(&mut cursor, target, Alias { what: *symbol }, span);
                Ok(cursor)
            }
            ExprKind::Send(send) => self.lower_send(cursor, send, span, target),
            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => self.lower_if(cursor, cond, then_branch, else_branch.as_deref(), span, target),
            ExprKind::While { cond, body } => self.lower_while(cursor, cond, body, span, target),
            ExprKind::Break(value) => self.lower_break(cursor, value.as_deref(), span, target),
            ExprKind::Next(value) => self.lower_next(cursor, value.as_deref(), span, target),
            ExprKind::Return(value) => self.lower_return(cursor, value.as_deref(), span, target),
            ExprKind::InsSeq { stats, expr } => self.lower_ins_seq(cursor, stats, expr, target),
            ExprKind::And(left, right) => self.lower_short_circuit(cursor, left, right, true, span, target),
            ExprKind::Or(left, right) => self.lower_short_circuit(cursor, left, right, false, span, target),
            ExprKind::Cast { expr, ty, kind } => {
                let (mut cursor, value) = self.operand(cursor, expr, self.names.stat_temp)?;
                self.emit(
                    &mut cursor,
                    target,
                    Cast {
                        value,
                        ty: *ty,
                        cast: *kind,
                    },
                    span,
                );
                Ok(cursor)
            }
            ExprKind::Rescue(rescue) => self.lower_rescue(cursor, rescue, span, target),
            ExprKind::Array(elems) => {
                let fun = self.names.build_array;
                self.lower_intrinsic(cursor, fun, elems.iter(), span, target)
            }
            ExprKind::Hash(pairs) => {
                let fun = self.names.build_hash;
                let flat = pairs.iter().flat_map(|(key, value)| [key, value]);
                self.lower_intrinsic(cursor, fun, flat, span, target)
            }
            ExprKind::Unsupported(construct) => {
                self.not_supported(&mut cursor, target, *construct, span);
                Ok(cursor)
            }
        }
    }

    /// Evaluate `expr` to a local. Assigned locals are used in place; anything
    /// else goes through a fresh temporary named `temp_name`.
    pub(crate) fn operand(&mut self, cursor: Cursor, expr: &Expr, temp_name: NameRef) -> Result<(Cursor, LocalVariable)> {
        if let Some(local) = expr.as_local() {
            if let Some(slot) = self.locals.lookup_source(local) {
                if let Some(var) = cursor.get(slot) {
                    return Ok((cursor, var));
                }
            }
        }
        let temp = self.fresh_temp(temp_name);
        let mut cursor = self.lower(cursor, expr, temp)?;
        let var = self.value(&mut cursor, temp, expr.span)?;
        Ok((cursor, var))
    }

    /// Statements for effect, then the final expression into `target`
    fn lower_ins_seq(&mut self, mut cursor: Cursor, stats: &[Expr], expr: &Expr, target: LocalSlot) -> Result<Cursor> {
        for stat in stats {
            let temp = self.fresh_temp(self.names.stat_temp);
            cursor = self.lower(cursor, stat, temp)?;
        }
        self.lower(cursor, expr, target)
    }

    /// `Send(<magic>, fun, elems)` for literals the runtime builds
    fn lower_intrinsic<'e>(
        &mut self,
        cursor: Cursor,
        fun: NameRef,
        elems: impl Iterator<Item = &'e Expr>,
        span: Span,
        target: LocalSlot,
    ) -> Result<Cursor> {
        let mut cursor = cursor;
        let mut args = Vec::new();
        let mut arg_spans = Vec::new();
        for elem in elems {
            let (next, var) = self.operand(cursor, elem, self.names.arg_temp)?;
            cursor = next;
            args.push(var);
            arg_spans.push(elem.span);
        }
        let recv = self.magic(&mut cursor, span);
        self.emit(
            &mut cursor,
            target,
            Send {
                recv,
                fun,
                receiver_span: span,
                args,
                arg_spans,
                link: None,
            },
            span,
        );
        Ok(cursor)
    }

    pub(crate) fn magic(&mut self, cursor: &mut Cursor, span: Span) -> LocalVariable {
        let slot = self.fresh_temp(self.names.magic);
        let what = self.table.magic_symbol();
        self.emit(cursor, slot, Alias { what }, span)
    }

    pub(crate) fn nil(&mut self, cursor: &mut Cursor, target: LocalSlot, span: Span) -> LocalVariable {
        self.emit_synthetic(
            cursor,
            target,
            Literal {
                value: LiteralType::Nil,
            },
            span,
        )
    }

    pub(crate) fn not_supported(
        &mut self,
        cursor: &mut Cursor,
        target: LocalSlot,
        construct: UnsupportedConstruct,
        span: Span,
    ) -> LocalVariable {
        tracing::debug!(method = %self.method_name(), %span, reason = construct.reason(), "not supported");
        let why = construct.reason().to_string();
        self.emit(cursor, target, NotSupported { why }, span)
    }

    /// Emit `DebugEnvironment` for every pending annotation at or before the
    /// position where `span` starts. Generated nodes carry zero spans and
    /// never trigger one.
    fn emit_annotations_before(&mut self, cursor: &mut Cursor, span: Span) {
        if span.is_zero() {
            return;
        }
        while let Some(pos) = self.annotations.front().copied() {
            if Location::new(pos.line, pos.column) > span.start() {
                break;
            }
            self.annotations.pop_front();
            self.debug_environment(cursor, pos);
        }
    }

    pub(crate) fn emit_remaining_annotations(&mut self, cursor: &mut Cursor) {
        while let Some(pos) = self.annotations.pop_front() {
            self.debug_environment(cursor, pos);
        }
    }

    fn debug_environment(&mut self, cursor: &mut Cursor, pos: AnnotationPos) {
        let slot = self.fresh_temp(self.names.debug_env);
        self.emit(cursor, slot, DebugEnvironment::new(pos), Span::line(pos.line));
    }
}
