//! Conditionals, loops and non-local transfers

use super::context::{BuilderContext, Cursor, Frame};
use crate::errors::Result;
use crate::features::ast::{Expr, UnsupportedConstruct};
use crate::features::cfg::domain::{BlockId, BlockReturn, BlockRole, Ident, LinkId, LocalSlot, Return};
use crate::shared::models::Span;
use std::collections::BTreeSet;

impl<'a> BuilderContext<'a> {
    pub(crate) fn lower_if(
        &mut self,
        cursor: Cursor,
        cond: &Expr,
        then_branch: &Expr,
        else_branch: Option<&Expr>,
        span: Span,
        target: LocalSlot,
    ) -> Result<Cursor> {
        let cond_slot = self.fresh_temp(self.names.cond_temp);
        let mut cursor = self.lower(cursor, cond, cond_slot)?;
        let cond_var = self.value(&mut cursor, cond_slot, cond.span)?;

        let then_block = self.new_block(BlockRole::Then, then_branch.span);
        let else_block = self.new_block(BlockRole::Else, else_branch.map_or(span, |e| e.span));
        self.branch(cursor, cond_var, then_block, else_block)?;

        let then_cursor = self.open(then_block);
        let then_cursor = self.lower(then_cursor, then_branch, target)?;

        let mut else_cursor = self.open(else_block);
        let else_cursor = match else_branch {
            Some(else_branch) => self.lower(else_cursor, else_branch, target)?,
            None => {
                self.nil(&mut else_cursor, target, span);
                else_cursor
            }
        };

        let join = self.new_block(BlockRole::Join, span);
        self.jump(then_cursor, join)?;
        self.jump(else_cursor, join)?;
        Ok(self.open(join))
    }

    /// Evaluates to nil. `break` leaves for the after-loop block and `next`
    /// re-tests the condition; the values they carry are evaluated and dropped.
    pub(crate) fn lower_while(
        &mut self,
        cursor: Cursor,
        cond: &Expr,
        body: &Expr,
        span: Span,
        target: LocalSlot,
    ) -> Result<Cursor> {
        let outer_depth = self.loop_depth;
        self.loop_depth += 1;
        let header = self.new_block(BlockRole::LoopHeader, cond.span);
        let body_block = self.new_block(BlockRole::LoopBody, body.span);
        let after = self.new_block_in(BlockRole::AfterLoop, span, self.closure_id, outer_depth);

        let carried = self.loop_carried_slots(&[cond, body]);
        self.jump(cursor, header)?;
        let header_cursor = self.open_merging(header, &carried);

        self.frames.push(Frame::Loop { header, after });
        let lowered = self.lower_loop(header_cursor, cond, body, header, body_block, after);
        self.frames.pop();
        self.loop_depth = outer_depth;
        lowered?;

        let mut cursor = self.open(after);
        self.nil(&mut cursor, target, span);
        Ok(cursor)
    }

    fn lower_loop(
        &mut self,
        cursor: Cursor,
        cond: &Expr,
        body: &Expr,
        header: BlockId,
        body_block: BlockId,
        after: BlockId,
    ) -> Result<()> {
        let cond_slot = self.fresh_temp(self.names.cond_temp);
        let mut cursor = self.lower(cursor, cond, cond_slot)?;
        let cond_var = self.value(&mut cursor, cond_slot, cond.span)?;
        self.branch(cursor, cond_var, body_block, after)?;

        let body_cursor = self.open(body_block);
        let body_slot = self.fresh_temp(self.names.stat_temp);
        let body_cursor = self.lower(body_cursor, body, body_slot)?;
        self.jump(body_cursor, header)
    }

    /// Source slots a header must carry around its back-edges
    ///
    /// `exprs` are lowered one level below the current depth, so the scan
    /// stops where the nesting limit would cut them.
    pub(crate) fn loop_carried_slots(&mut self, exprs: &[&Expr]) -> BTreeSet<LocalSlot> {
        let levels = self.config.max_nesting_depth.saturating_sub(self.depth);
        let mut slots = BTreeSet::new();
        for expr in exprs {
            for local in expr.assigned_locals(levels) {
                slots.insert(self.source_slot(local));
            }
        }
        slots
    }

    pub(crate) fn lower_break(&mut self, cursor: Cursor, value: Option<&Expr>, span: Span, target: LocalSlot) -> Result<Cursor> {
        match self.frames.last().copied() {
            None => {
                let mut cursor = cursor;
                self.not_supported(&mut cursor, target, UnsupportedConstruct::BreakOutsideLoop, span);
                Ok(cursor)
            }
            Some(Frame::Loop { after, .. }) => {
                let cursor = self.discard(cursor, value)?;
                self.jump(cursor, after)?;
                Ok(self.after_transfer(target, span))
            }
            Some(Frame::Closure { post, call_target, .. }) => {
                let mut cursor = cursor;
                match value {
                    Some(value) => cursor = self.lower(cursor, value, call_target)?,
                    None => {
                        self.nil(&mut cursor, call_target, span);
                    }
                }
                self.jump(cursor, post)?;
                Ok(self.after_transfer(target, span))
            }
        }
    }

    pub(crate) fn lower_next(&mut self, cursor: Cursor, value: Option<&Expr>, span: Span, target: LocalSlot) -> Result<Cursor> {
        match self.frames.last().copied() {
            None => {
                let mut cursor = cursor;
                self.not_supported(&mut cursor, target, UnsupportedConstruct::NextOutsideLoop, span);
                Ok(cursor)
            }
            Some(Frame::Loop { header, .. }) => {
                let cursor = self.discard(cursor, value)?;
                self.jump(cursor, header)?;
                Ok(self.after_transfer(target, span))
            }
            Some(Frame::Closure { header, link, .. }) => {
                let cursor = self.block_return(cursor, value, link, span)?;
                self.jump(cursor, header)?;
                Ok(self.after_transfer(target, span))
            }
        }
    }

    /// Leave the method. Control continues in a dead block so the caller can
    /// keep lowering whatever follows.
    pub(crate) fn lower_return(&mut self, cursor: Cursor, value: Option<&Expr>, span: Span, target: LocalSlot) -> Result<Cursor> {
        let (mut cursor, what) = match value {
            Some(value) => self.operand(cursor, value, self.names.stat_temp)?,
            None => {
                let mut cursor = cursor;
                let temp = self.fresh_temp(self.names.stat_temp);
                let what = self.nil(&mut cursor, temp, span);
                (cursor, what)
            }
        };
        let return_slot = self.return_slot;
        self.emit(&mut cursor, return_slot, Return { what }, span);
        self.exit(cursor)?;
        Ok(self.after_transfer(target, span))
    }

    /// `value` as the closure's result: `BlockReturn(link, value)`
    pub(crate) fn block_return(
        &mut self,
        cursor: Cursor,
        value: Option<&Expr>,
        link: LinkId,
        span: Span,
    ) -> Result<Cursor> {
        let slot = self.fresh_temp(self.names.block_return_temp);
        let mut cursor = match value {
            Some(value) => self.lower(cursor, value, slot)?,
            None => {
                let mut cursor = cursor;
                self.nil(&mut cursor, slot, span);
                cursor
            }
        };
        let what = self.value(&mut cursor, slot, span)?;
        self.emit(&mut cursor, slot, BlockReturn { link, what }, span);
        Ok(cursor)
    }

    fn discard(&mut self, cursor: Cursor, value: Option<&Expr>) -> Result<Cursor> {
        match value {
            Some(value) => {
                let temp = self.fresh_temp(self.names.stat_temp);
                self.lower(cursor, value, temp)
            }
            None => Ok(cursor),
        }
    }

    /// Unreachable continuation after an unconditional transfer
    fn after_transfer(&mut self, target: LocalSlot, span: Span) -> Cursor {
        let mut cursor = self.dead_cursor(span);
        self.nil(&mut cursor, target, span);
        cursor
    }

    /// `a && b` and `a || b`: `b` runs in one arm only
    pub(crate) fn lower_short_circuit(
        &mut self,
        cursor: Cursor,
        left: &Expr,
        right: &Expr,
        is_and: bool,
        span: Span,
        target: LocalSlot,
    ) -> Result<Cursor> {
        let name = if is_and { self.names.and_temp } else { self.names.or_temp };
        let temp = self.fresh_temp(name);
        let mut cursor = self.lower(cursor, left, temp)?;
        let left_var = self.value(&mut cursor, temp, left.span)?;

        let rhs_block = self.new_block(if is_and { BlockRole::Then } else { BlockRole::Else }, right.span);
        let short_block = self.new_block(if is_and { BlockRole::Else } else { BlockRole::Then }, left.span);
        if is_and {
            self.branch(cursor, left_var, rhs_block, short_block)?;
        } else {
            self.branch(cursor, left_var, short_block, rhs_block)?;
        }

        let rhs_cursor = self.open(rhs_block);
        let rhs_cursor = self.lower(rhs_cursor, right, target)?;

        let mut short_cursor = self.open(short_block);
        self.emit(&mut short_cursor, target, Ident { what: left_var }, left.span);

        let join = self.new_block(BlockRole::Join, span);
        self.jump(rhs_cursor, join)?;
        self.jump(short_cursor, join)?;
        Ok(self.open(join))
    }
}
