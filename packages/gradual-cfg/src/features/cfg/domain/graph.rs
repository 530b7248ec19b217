//! Finished control-flow graph of one method
//!
//! Built once by the builder, immutable afterwards. Block ids are dense and
//! follow creation order, so `blocks()[id.index()]` is the block `id`.

use super::block::{BasicBlock, BlockId};
use super::instruction::{Binding, InstructionKind, RenderContext};
use super::link::{LinkId, SendAndBlockLink};
use super::local::{LocalTable, LocalVariable};
use crate::shared::models::{NameRef, Span, SymbolRef};
use crate::shared::ports::SymbolTable;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct Cfg {
    method: NameRef,
    owner: SymbolRef,
    span: Span,
    blocks: Vec<BasicBlock>,
    links: Vec<SendAndBlockLink>,
    locals: LocalTable,
}

impl Cfg {
    pub(crate) fn new(
        method: NameRef,
        owner: SymbolRef,
        span: Span,
        blocks: Vec<BasicBlock>,
        links: Vec<SendAndBlockLink>,
        locals: LocalTable,
    ) -> Self {
        Self {
            method,
            owner,
            span,
            blocks,
            links,
            locals,
        }
    }

    pub fn method(&self) -> NameRef {
        self.method
    }

    pub fn owner(&self) -> SymbolRef {
        self.owner
    }

    pub fn span(&self) -> Span {
        self.span
    }

    /// The entry block is always the first block
    pub fn entry(&self) -> BlockId {
        BlockId(0)
    }

    pub fn entry_block(&self) -> &BasicBlock {
        &self.blocks[0]
    }

    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.get(id.index())
    }

    pub fn blocks(&self) -> &[BasicBlock] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Blocks with no successors
    pub fn exit_blocks(&self) -> Vec<BlockId> {
        self.blocks
            .iter()
            .filter(|block| block.is_exit())
            .map(|block| block.id)
            .collect()
    }

    pub fn links(&self) -> &[SendAndBlockLink] {
        &self.links
    }

    pub fn link(&self, id: LinkId) -> Option<&SendAndBlockLink> {
        self.links.get(id.0 as usize)
    }

    pub fn locals(&self) -> &LocalTable {
        &self.locals
    }

    pub fn is_synthetic(&self, var: LocalVariable) -> bool {
        self.locals.is_synthetic(var)
    }

    /// Every binding with its block, in block-then-position order
    pub fn bindings(&self) -> impl Iterator<Item = (BlockId, &Binding)> + '_ {
        self.blocks
            .iter()
            .flat_map(|block| block.instructions.iter().map(move |binding| (block.id, binding)))
    }

    pub fn instruction_count(&self) -> usize {
        self.blocks.iter().map(|block| block.instructions.len()).sum()
    }

    /// Instruction counts per kind
    pub fn instruction_histogram(&self) -> BTreeMap<InstructionKind, usize> {
        let mut histogram = BTreeMap::new();
        for (_, binding) in self.bindings() {
            *histogram.entry(binding.value.kind()).or_insert(0) += 1;
        }
        histogram
    }

    pub fn render_context<'a>(&'a self, table: &'a dyn SymbolTable) -> RenderContext<'a> {
        RenderContext {
            table,
            locals: &self.locals,
            links: &self.links,
        }
    }

    /// `Owner#method`, as used in diagnostics
    pub fn qualified_name(&self, table: &dyn SymbolTable) -> String {
        format!("{}#{}", table.symbol_name(self.owner), table.name_text(self.method))
    }
}
