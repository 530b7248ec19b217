//! CFG builder
//!
//! Lowers one desugared method body into a [`Cfg`]. The walk threads a
//! [`Cursor`](context::Cursor) (current block plus the version of every
//! local on the path) through the recursion; nothing is global, so any
//! number of methods can be lowered concurrently against one symbol table.
//!
//! # Pipeline
//! ```text
//! MethodDef ─▶ walk (blocks, versions, links) ─▶ finalize ─▶ verify? ─▶ Cfg
//! ```

mod calls;
pub(crate) mod context;
mod control;
mod rescue;
mod walk;

use self::context::BuilderContext;
use super::finalize::finalize;
use crate::config::LoweringConfig;
use crate::errors::{LoweringError, Result};
use crate::features::ast::MethodDef;
use crate::features::cfg::domain::{Cfg, LoadArg, LocalVariable, Return};
use crate::shared::ports::SymbolTable;

/// Lower `method` into its control-flow graph
///
/// Fails only when the tree breaks the desugarer's contract (or, with
/// `verify_after_build`, when the finished graph does not verify).
pub fn build_cfg(method: &MethodDef, table: &dyn SymbolTable, config: &LoweringConfig) -> Result<Cfg> {
    let mut ctx = BuilderContext::new(config, table, method);
    ctx.check_unique_params(&method.params, method.span)?;

    let mut cursor = ctx.open_entry(method.span);
    for (index, param) in method.params.iter().enumerate() {
        let slot = ctx.source_slot(param.local);
        ctx.emit(
            &mut cursor,
            slot,
            LoadArg {
                receiver: LocalVariable::receiver(),
                method: method.name,
                arg: index as u32,
            },
            param.span,
        );
    }

    let result_slot = ctx.result_slot;
    let mut cursor = ctx.lower(cursor, &method.body, result_slot)?;
    ctx.emit_remaining_annotations(&mut cursor);

    if ctx.is_live(cursor.block) {
        let what = ctx.value(&mut cursor, result_slot, method.span)?;
        let return_slot = ctx.return_slot;
        ctx.emit(&mut cursor, return_slot, Return { what }, method.span);
    }
    ctx.exit(cursor)?;

    let name = ctx.method_name();
    let drafts = ctx.blocks.len();
    let cfg = finalize(ctx)?;
    tracing::debug!(
        method = %name,
        blocks = cfg.len(),
        pruned = drafts - cfg.len(),
        instructions = cfg.instruction_count(),
        links = cfg.links().len(),
        "built cfg"
    );

    if config.verify_after_build {
        let violations = cfg.verify();
        if !violations.is_empty() {
            let message = violations
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(LoweringError::invariant(
                name,
                method.span,
                format!("graph failed verification: {}", message),
            ));
        }
    }

    #[cfg(feature = "trace")]
    tracing::trace!(method = %name, "\n{}", cfg.to_text(table));

    Ok(cfg)
}
