//! Calls and closures
//!
//! A call with a closure splices the closure body into the method graph:
//!
//! ```text
//!   <sendTemp> = recv.fun(args) do<link>
//!        |
//!   closure header  <blockCall> = <unanalyzable>  <-------+
//!     then |          else |                               |
//!   closure body      solve block                          |
//!     <blk> = load_yield_params<link>                      |
//!     param_i = <blk>.[](i)                                |
//!     ...                                                  |
//!     blockreturn<link> v  --------------------------------+
//!                     target = solve<link>
//!                          |
//!                     post-call block
//! ```

use super::context::{BuilderContext, Cursor, Frame};
use crate::errors::Result;
use crate::features::ast::{Closure, Param, SendExpr};
use crate::features::cfg::domain::{
    BlockId, BlockRole, LinkId, Literal, LoadYieldParams, LocalSlot, LocalVariable, Send, SendAndBlockLink, SolveConstraint,
    Unanalyzable,
};
use crate::shared::models::{LiteralType, Span};
use ahash::AHashSet;

impl<'a> BuilderContext<'a> {
    pub(crate) fn lower_send(&mut self, cursor: Cursor, send: &SendExpr, span: Span, target: LocalSlot) -> Result<Cursor> {
        let (mut cursor, recv) = self.operand(cursor, &send.recv, self.names.recv_temp)?;
        let mut args = Vec::with_capacity(send.args.len());
        let mut arg_spans = Vec::with_capacity(send.args.len());
        for arg in &send.args {
            let (next, var) = self.operand(cursor, arg, self.names.arg_temp)?;
            cursor = next;
            args.push(var);
            arg_spans.push(arg.span);
        }

        let call = Send {
            recv,
            fun: send.fun,
            receiver_span: send.recv.span,
            args,
            arg_spans,
            link: None,
        };

        match &send.closure {
            None => {
                self.emit(&mut cursor, target, call, span);
                Ok(cursor)
            }
            Some(closure) => self.lower_closure_call(cursor, call, closure, span, target),
        }
    }

    fn lower_closure_call(
        &mut self,
        mut cursor: Cursor,
        mut call: Send,
        closure: &Closure,
        span: Span,
        target: LocalSlot,
    ) -> Result<Cursor> {
        self.check_unique_params(&closure.params, closure.span)?;

        let outer_closure = self.closure_id;
        let outer_depth = self.loop_depth;
        let closure_id = self.next_closure_id();
        let param_kinds = closure.params.iter().map(|param| param.kind).collect();
        // The link covers the call and its closure
        let link_span = span.join(&closure.span);
        let link = self.push_link(SendAndBlockLink::new(call.fun, closure_id, param_kinds, link_span));
        call.link = Some(link);

        let send_temp = self.fresh_temp(self.names.send_temp);
        self.emit(&mut cursor, send_temp, call, span);

        let header = self.new_block_in(BlockRole::ClosureHeader, closure.span, outer_closure, outer_depth + 1);
        let body_block = self.new_block_in(BlockRole::ClosureBody, closure.body.span, closure_id, outer_depth + 1);
        let solve_block = self.new_block(BlockRole::PostCall, span);
        let post = self.new_block(BlockRole::Join, span);

        let carried = self.loop_carried_slots(&[&closure.body]);
        self.jump(cursor, header)?;
        let mut header_cursor = self.open_merging(header, &carried);
        let block_call = self.fresh_temp(self.names.block_call);
        let block_call = self.emit(&mut header_cursor, block_call, Unanalyzable, closure.span);
        self.branch(header_cursor, block_call, body_block, solve_block)?;

        self.closure_id = closure_id;
        self.loop_depth = outer_depth + 1;
        self.frames.push(Frame::Closure {
            header,
            post,
            link,
            call_target: target,
        });
        let lowered = self.lower_closure_body(body_block, closure, link);
        self.frames.pop();
        self.closure_id = outer_closure;
        self.loop_depth = outer_depth;
        let body_cursor = lowered?;
        self.jump(body_cursor, header)?;

        let mut solve_cursor = self.open(solve_block);
        self.emit(&mut solve_cursor, target, SolveConstraint { link }, span);
        self.jump(solve_cursor, post)?;

        tracing::trace!(method = %self.method_name(), %link, closure_id, "spliced closure");
        Ok(self.open(post))
    }

    /// Parameter loads, the body, then `BlockReturn` of its value
    fn lower_closure_body(
        &mut self,
        body_block: BlockId,
        closure: &Closure,
        link: LinkId,
    ) -> Result<Cursor> {
        let mut cursor = self.open(body_block);
        let blk_slot = self.fresh_temp(self.names.blk);
        let owner = self.method.owner;
        let blk = self.emit(&mut cursor, blk_slot, LoadYieldParams { link, block: owner }, closure.span);

        for (index, param) in closure.params.iter().enumerate() {
            self.load_yielded_param(&mut cursor, blk, index, param);
        }

        self.block_return(cursor, Some(&closure.body), link, closure.body.span)
    }

    /// `param = <blk>.[](index)`
    fn load_yielded_param(&mut self, cursor: &mut Cursor, blk: LocalVariable, index: usize, param: &Param) {
        let index_slot = self.fresh_temp(self.names.arg_temp);
        let index_var = self.emit(
            cursor,
            index_slot,
            Literal {
                value: LiteralType::Integer(index as i64),
            },
            param.span,
        );
        let slot = self.source_slot(param.local);
        let fun = self.names.square_brackets;
        self.emit(
            cursor,
            slot,
            Send {
                recv: blk,
                fun,
                receiver_span: param.span,
                args: vec![index_var],
                arg_spans: vec![param.span],
                link: None,
            },
            param.span,
        );
    }

    /// Parameter lists never repeat a local
    pub(crate) fn check_unique_params(&self, params: &[Param], span: Span) -> Result<()> {
        let mut seen = AHashSet::with_capacity(params.len());
        for param in params {
            if !seen.insert(param.local) {
                let name = self.table.name_text(param.local.name);
                return Err(self.invariant(
                    if param.span.is_zero() { span } else { param.span },
                    format!("parameter `{}` declared twice", name),
                ));
            }
        }
        Ok(())
    }
}
