//! `begin/rescue/else/ensure`
//!
//! An exception may surface before the body runs or after it finishes, so
//! both points read a fresh `<exceptionValue> = <unanalyzable>` and branch to
//! the handler chain. Handlers test their classes in order with `===`; an
//! exception no clause matches runs the ensure body and is re-raised through
//! `<Magic>.<reraise>`, leaving the method.

use super::context::{BuilderContext, Cursor};
use crate::errors::Result;
use crate::features::ast::{RescueClause, RescueExpr};
use crate::features::cfg::domain::{BlockRole, Ident, LocalSlot, Send, Unanalyzable};
use crate::shared::models::Span;

impl<'a> BuilderContext<'a> {
    pub(crate) fn lower_rescue(&mut self, cursor: Cursor, rescue: &RescueExpr, span: Span, target: LocalSlot) -> Result<Cursor> {
        if rescue.clauses.is_empty() && rescue.ensure.is_none() {
            return Err(self.invariant(span, "rescue without clauses or ensure"));
        }

        let exception = self.fresh_temp(self.names.exception_value);
        let start = self.new_block(BlockRole::Rescue, span);
        let handlers = self.new_block(BlockRole::Rescue, span);
        let body_block = self.new_block(BlockRole::Body, rescue.body.span);
        let else_block = self.new_block(BlockRole::Body, rescue.else_body.as_ref().map_or(span, |e| e.span));

        self.jump(cursor, start)?;
        let mut start_cursor = self.open(start);
        let raised = self.emit(&mut start_cursor, exception, Unanalyzable, span);
        self.branch(start_cursor, raised, handlers, body_block)?;

        let body_cursor = self.open(body_block);
        let mut body_cursor = self.lower(body_cursor, &rescue.body, target)?;
        let raised = self.emit(&mut body_cursor, exception, Unanalyzable, rescue.body.span);
        self.branch(body_cursor, raised, handlers, else_block)?;

        let mut ends = Vec::with_capacity(rescue.clauses.len() + 1);
        let mut unmatched = self.open(handlers);
        for clause in &rescue.clauses {
            let (handled, rest) = self.lower_clause(unmatched, clause, exception, target)?;
            ends.push(handled);
            unmatched = rest;
        }
        self.reraise(unmatched, rescue, exception, span)?;

        let else_cursor = self.open(else_block);
        let else_cursor = match &rescue.else_body {
            Some(else_body) => self.lower(else_cursor, else_body, target)?,
            None => else_cursor,
        };
        ends.push(else_cursor);

        let join = self.new_block(BlockRole::Ensure, span);
        for end in ends {
            self.jump(end, join)?;
        }
        let mut cursor = self.open(join);
        if let Some(ensure) = &rescue.ensure {
            let temp = self.fresh_temp(self.names.stat_temp);
            cursor = self.lower(cursor, ensure, temp)?;
        }
        Ok(cursor)
    }

    /// Lower one clause. Returns the end of its handler body and the cursor
    /// where the next clause continues testing.
    fn lower_clause(
        &mut self,
        cursor: Cursor,
        clause: &RescueClause,
        exception: LocalSlot,
        target: LocalSlot,
    ) -> Result<(Cursor, Cursor)> {
        let var_slot = match &clause.var {
            None => None,
            Some(var) => {
                let local = var
                    .as_local()
                    .ok_or_else(|| self.invariant(var.span, "rescue binding is not a local"))?;
                Some(self.source_slot(local))
            }
        };

        let handler = self.new_block(BlockRole::Rescue, clause.body.span);
        let mut cursor = cursor;
        if clause.exceptions.is_empty() {
            self.jump(cursor, handler)?;
            cursor = self.dead_cursor(clause.span);
        } else {
            for class in &clause.exceptions {
                let (mut test_cursor, class_var) = self.operand(cursor, class, self.names.recv_temp)?;
                let exc = self.value(&mut test_cursor, exception, class.span)?;
                let check = self.fresh_temp(self.names.isa_check);
                let fun = self.names.triple_eq;
                let matched = self.emit(
                    &mut test_cursor,
                    check,
                    Send {
                        recv: class_var,
                        fun,
                        receiver_span: class.span,
                        args: vec![exc],
                        arg_spans: vec![clause.span],
                        link: None,
                    },
                    class.span,
                );
                let next_test = self.new_block(BlockRole::Rescue, clause.span);
                self.branch(test_cursor, matched, handler, next_test)?;
                cursor = self.open(next_test);
            }
        }

        let mut handler_cursor = self.open(handler);
        if let Some(slot) = var_slot {
            let what = self.value(&mut handler_cursor, exception, clause.span)?;
            self.emit(&mut handler_cursor, slot, Ident { what }, clause.span);
        }
        let handled = self.lower(handler_cursor, &clause.body, target)?;
        Ok((handled, cursor))
    }

    /// Nothing matched: run ensure, re-raise, leave the method
    fn reraise(&mut self, cursor: Cursor, rescue: &RescueExpr, exception: LocalSlot, span: Span) -> Result<()> {
        let mut cursor = cursor;
        if let Some(ensure) = &rescue.ensure {
            let temp = self.fresh_temp(self.names.stat_temp);
            cursor = self.lower(cursor, ensure, temp)?;
        }
        if !self.is_live(cursor.block) {
            return self.exit(cursor);
        }
        let exc = self.value(&mut cursor, exception, span)?;
        let magic = self.magic(&mut cursor, span);
        let temp = self.fresh_temp(self.names.stat_temp);
        let fun = self.names.reraise;
        self.emit(
            &mut cursor,
            temp,
            Send {
                recv: magic,
                fun,
                receiver_span: span,
                args: vec![exc],
                arg_spans: vec![span],
                link: None,
            },
            span,
        );
        self.exit(cursor)
    }
}
