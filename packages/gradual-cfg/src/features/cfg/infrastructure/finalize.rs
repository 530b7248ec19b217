//! Finalization: draft blocks to an immutable graph
//!
//! 1. Prune blocks unreachable from the entry (code after `return`,
//!    `break`, `next`, and whatever only they reach).
//! 2. Compact block ids, keeping creation order.
//! 3. Drop links no surviving instruction refers to and compact link ids.
//! 4. Renumber versions per slot in block-then-position order, block
//!    arguments first, so every slot's versions count up from 1 along the
//!    block order.

use super::builder::context::{BlockDraft, BuilderContext};
use crate::errors::{LoweringError, Result};
use crate::features::cfg::domain::{
    BasicBlock, BlockExit, BlockId, Cfg, LinkId, LocalVariable, SendAndBlockLink,
};
use ahash::AHashMap;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;

pub(crate) fn finalize(ctx: BuilderContext<'_>) -> Result<Cfg> {
    let method_name = ctx.method_name();
    let method = ctx.method;
    let slot_count = ctx.locals.len();
    let drafts = ctx.blocks;
    let links = ctx.links;
    let locals = ctx.locals;

    let reachable = reachable_blocks(&drafts);
    let mut new_ids: Vec<Option<BlockId>> = vec![None; drafts.len()];
    let mut next_id = 0u32;
    for (index, keep) in reachable.iter().enumerate() {
        if *keep {
            new_ids[index] = Some(BlockId(next_id));
            next_id += 1;
        }
    }
    let remap = |id: BlockId| new_ids.get(id.index()).copied().flatten();

    let mut blocks = Vec::with_capacity(next_id as usize);
    for (index, draft) in drafts.into_iter().enumerate() {
        let Some(id) = new_ids[index] else {
            continue;
        };
        let mut exit = draft.exit.ok_or_else(|| {
            LoweringError::invariant(&method_name, draft.span, format!("reachable bb{} has no exit", index))
        })?;
        if exit.successors().iter().any(|(succ, _)| remap(*succ).is_none()) {
            return Err(LoweringError::invariant(
                &method_name,
                draft.span,
                format!("bb{} jumps to a pruned block", index),
            ));
        }
        exit.remap(|succ| remap(succ).unwrap_or(succ));

        let predecessors: Vec<BlockId> = draft.predecessors.iter().filter_map(|pred| remap(*pred)).collect();
        let mut args = draft.args;
        for arg in &mut args {
            arg.incoming = arg
                .incoming
                .iter()
                .filter_map(|(pred, var)| remap(*pred).map(|pred| (pred, *var)))
                .collect();
        }

        blocks.push(BasicBlock {
            id,
            role: draft.role,
            closure_id: draft.closure_id,
            loop_depth: draft.loop_depth,
            span: draft.span,
            args,
            instructions: draft.instructions,
            exit,
            predecessors,
        });
    }

    let links = compact_links(&mut blocks, links);
    renumber_versions(&mut blocks, slot_count);

    Ok(Cfg::new(method.name, method.owner, method.span, blocks, links, locals))
}

fn reachable_blocks(drafts: &[BlockDraft]) -> Vec<bool> {
    let mut graph: DiGraph<(), ()> = DiGraph::with_capacity(drafts.len(), drafts.len() * 2);
    let nodes: Vec<NodeIndex> = drafts.iter().map(|_| graph.add_node(())).collect();
    for (index, draft) in drafts.iter().enumerate() {
        if let Some(exit) = &draft.exit {
            for (succ, _) in exit.successors() {
                graph.add_edge(nodes[index], nodes[succ.index()], ());
            }
        }
    }

    let mut reachable = vec![false; drafts.len()];
    if let Some(&entry) = nodes.first() {
        let mut dfs = Dfs::new(&graph, entry);
        while let Some(node) = dfs.next(&graph) {
            reachable[node.index()] = true;
        }
    }
    reachable
}

fn compact_links(blocks: &mut [BasicBlock], links: Vec<SendAndBlockLink>) -> Vec<SendAndBlockLink> {
    let mut used = vec![false; links.len()];
    for block in blocks.iter() {
        for binding in &block.instructions {
            if let Some(link) = binding.value.link() {
                used[link.0 as usize] = true;
            }
        }
    }

    let mut new_ids = vec![LinkId(0); links.len()];
    let mut kept = Vec::new();
    for (index, link) in links.into_iter().enumerate() {
        if used[index] {
            new_ids[index] = LinkId(kept.len() as u32);
            kept.push(link);
        }
    }

    for block in blocks.iter_mut() {
        for binding in &mut block.instructions {
            if let Some(link) = binding.value.link_mut() {
                *link = new_ids[link.0 as usize];
            }
        }
    }
    kept
}

fn renumber_versions(blocks: &mut [BasicBlock], slot_count: usize) {
    let mut next = vec![1u32; slot_count];
    let mut renamed: AHashMap<LocalVariable, LocalVariable> = AHashMap::new();
    let mut fresh = |var: LocalVariable| {
        let counter = &mut next[var.slot.0 as usize];
        let new = LocalVariable::new(var.slot, *counter);
        *counter += 1;
        renamed.insert(var, new);
        new
    };

    for block in blocks.iter_mut() {
        for arg in &mut block.args {
            arg.var = fresh(arg.var);
        }
        for binding in &mut block.instructions {
            binding.bind = fresh(binding.bind);
        }
    }

    let rename = |var: &mut LocalVariable| {
        if let Some(new) = renamed.get(var) {
            *var = *new;
        }
    };
    for block in blocks.iter_mut() {
        for arg in &mut block.args {
            for (_, incoming) in &mut arg.incoming {
                if let Some(var) = incoming {
                    rename(var);
                }
            }
        }
        for binding in &mut block.instructions {
            for read in binding.value.reads_mut() {
                rename(read);
            }
        }
        if let BlockExit::Branch { cond, .. } = &mut block.exit {
            rename(cond);
        }
    }
}
