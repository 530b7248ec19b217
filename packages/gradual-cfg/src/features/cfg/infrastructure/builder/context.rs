//! Builder state
//!
//! Blocks are allocated as soon as something may jump to them and opened
//! once every forward edge into them is known. Opening computes the block's
//! entry environment from the environments its predecessors left behind,
//! declaring block arguments where they disagree. Loop and closure headers
//! are opened before their back-edges exist, so they get arguments up front
//! for every slot the body assigns.

use crate::config::LoweringConfig;
use crate::errors::{LoweringError, Result};
use crate::features::ast::{LocalRef, MethodDef};
use crate::features::cfg::domain::{
    BlockArgument, BlockExit, BlockId, BlockRole, Binding, Instruction, LinkId, Literal, LocalSlot,
    LocalTable, LocalVariable, SendAndBlockLink, SlotOrigin,
};
use crate::shared::models::{AnnotationPos, LiteralType, NameRef, Span};
use crate::shared::ports::SymbolTable;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Current version of every slot defined along the path being lowered
pub(crate) type Env = BTreeMap<LocalSlot, LocalVariable>;

/// Insertion point: a block plus the environment at its end
#[derive(Debug)]
pub(crate) struct Cursor {
    pub block: BlockId,
    pub env: Env,
}

impl Cursor {
    pub fn get(&self, slot: LocalSlot) -> Option<LocalVariable> {
        self.env.get(&slot).copied()
    }
}

#[derive(Debug)]
pub(crate) struct BlockDraft {
    pub role: BlockRole,
    pub closure_id: u32,
    pub loop_depth: u32,
    pub span: Span,
    pub args: Vec<BlockArgument>,
    pub instructions: Vec<Binding>,
    pub exit: Option<BlockExit>,
    pub predecessors: Vec<BlockId>,
    /// Environments of edges that arrived before the block was opened
    pending: Vec<(BlockId, Env)>,
    opened: bool,
}

/// Where `break` and `next` go
#[derive(Debug, Clone, Copy)]
pub(crate) enum Frame {
    Loop {
        header: BlockId,
        after: BlockId,
    },
    Closure {
        header: BlockId,
        post: BlockId,
        link: LinkId,
        /// Slot receiving the call's value; `break v` writes it directly
        call_target: LocalSlot,
    },
}

/// Names the builder interns once per method
#[derive(Debug, Clone, Copy)]
pub(crate) struct WellKnownNames {
    pub self_: NameRef,
    pub result: NameRef,
    pub return_: NameRef,
    pub stat_temp: NameRef,
    pub cond_temp: NameRef,
    pub and_temp: NameRef,
    pub or_temp: NameRef,
    pub arg_temp: NameRef,
    pub recv_temp: NameRef,
    pub block_call: NameRef,
    pub blk: NameRef,
    pub block_return_temp: NameRef,
    pub send_temp: NameRef,
    pub exception_value: NameRef,
    pub isa_check: NameRef,
    pub magic: NameRef,
    pub debug_env: NameRef,
    pub square_brackets: NameRef,
    pub triple_eq: NameRef,
    pub build_array: NameRef,
    pub build_hash: NameRef,
    pub reraise: NameRef,
}

impl WellKnownNames {
    pub fn enter(table: &dyn SymbolTable) -> Self {
        Self {
            self_: table.enter_name("<self>"),
            result: table.enter_name("<result>"),
            return_: table.enter_name("<return>"),
            stat_temp: table.enter_name("<statTemp>"),
            cond_temp: table.enter_name("<condTemp>"),
            and_temp: table.enter_name("<andTemp>"),
            or_temp: table.enter_name("<orTemp>"),
            arg_temp: table.enter_name("<argTemp>"),
            recv_temp: table.enter_name("<recvTemp>"),
            block_call: table.enter_name("<blockCall>"),
            blk: table.enter_name("<blk>"),
            block_return_temp: table.enter_name("<blockReturnTemp>"),
            send_temp: table.enter_name("<sendTemp>"),
            exception_value: table.enter_name("<exceptionValue>"),
            isa_check: table.enter_name("<isaCheck>"),
            magic: table.enter_name("<magic>"),
            debug_env: table.enter_name("<debugEnv>"),
            square_brackets: table.enter_name("[]"),
            triple_eq: table.enter_name("==="),
            build_array: table.enter_name("<build-array>"),
            build_hash: table.enter_name("<build-hash>"),
            reraise: table.enter_name("<reraise>"),
        }
    }
}

pub(crate) struct BuilderContext<'a> {
    pub config: &'a LoweringConfig,
    pub table: &'a dyn SymbolTable,
    pub method: &'a MethodDef,
    pub names: WellKnownNames,
    pub blocks: Vec<BlockDraft>,
    pub links: Vec<SendAndBlockLink>,
    pub locals: LocalTable,
    pub frames: Vec<Frame>,
    /// Closure id and loop depth given to newly allocated blocks
    pub closure_id: u32,
    pub loop_depth: u32,
    closures_seen: u32,
    /// Current expression nesting
    pub depth: usize,
    /// Annotations not yet emitted, in position order
    pub annotations: VecDeque<AnnotationPos>,
    pub result_slot: LocalSlot,
    pub return_slot: LocalSlot,
    next_version: Vec<u32>,
}

impl<'a> BuilderContext<'a> {
    pub fn new(config: &'a LoweringConfig, table: &'a dyn SymbolTable, method: &'a MethodDef) -> Self {
        let names = WellKnownNames::enter(table);
        let mut locals = LocalTable::new(names.self_);
        let result_slot = locals.reserved_temporary(names.result);
        let return_slot = locals.reserved_temporary(names.return_);

        let mut annotations: Vec<AnnotationPos> = config.debug_annotations.clone();
        annotations.sort_by_key(|pos| (pos.line, pos.column));

        Self {
            config,
            table,
            method,
            names,
            blocks: Vec::new(),
            links: Vec::new(),
            locals,
            frames: Vec::new(),
            closure_id: 0,
            loop_depth: 0,
            closures_seen: 0,
            depth: 0,
            annotations: annotations.into(),
            result_slot,
            return_slot,
            next_version: Vec::new(),
        }
    }

    pub fn method_name(&self) -> String {
        format!(
            "{}#{}",
            self.table.symbol_name(self.method.owner),
            self.table.name_text(self.method.name)
        )
    }

    pub fn invariant(&self, span: Span, message: impl Into<String>) -> LoweringError {
        LoweringError::invariant(self.method_name(), span, message)
    }

    // ─── Slots and versions ─────────────────────────────────────────────

    pub fn fresh_temp(&mut self, name: NameRef) -> LocalSlot {
        self.locals.fresh_temporary(name)
    }

    pub fn source_slot(&mut self, local: LocalRef) -> LocalSlot {
        self.locals.source_slot(local)
    }

    fn fresh_version(&mut self, slot: LocalSlot) -> LocalVariable {
        let index = slot.0 as usize;
        if self.next_version.len() <= index {
            self.next_version.resize(index + 1, 1);
        }
        let version = self.next_version[index];
        self.next_version[index] += 1;
        LocalVariable::new(slot, version)
    }

    /// Next closure id; ids are handed out in source order starting at 1
    pub fn next_closure_id(&mut self) -> u32 {
        self.closures_seen += 1;
        self.closures_seen
    }

    pub fn push_link(&mut self, link: SendAndBlockLink) -> LinkId {
        let id = LinkId(self.links.len() as u32);
        self.links.push(link);
        id
    }

    // ─── Blocks ─────────────────────────────────────────────────────────

    pub fn new_block(&mut self, role: BlockRole, span: Span) -> BlockId {
        let (closure_id, loop_depth) = (self.closure_id, self.loop_depth);
        self.new_block_in(role, span, closure_id, loop_depth)
    }

    pub fn new_block_in(&mut self, role: BlockRole, span: Span, closure_id: u32, loop_depth: u32) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(BlockDraft {
            role,
            closure_id,
            loop_depth,
            span,
            args: Vec::new(),
            instructions: Vec::new(),
            exit: None,
            predecessors: Vec::new(),
            pending: Vec::new(),
            opened: false,
        });
        id
    }

    fn draft(&mut self, id: BlockId) -> &mut BlockDraft {
        &mut self.blocks[id.index()]
    }

    /// The entry block is live by definition; any other block only while
    /// something reaches it.
    pub fn is_live(&self, id: BlockId) -> bool {
        id.index() == 0 || !self.blocks[id.index()].predecessors.is_empty()
    }

    /// Open the entry block
    pub fn open_entry(&mut self, span: Span) -> Cursor {
        let entry = self.new_block(BlockRole::Entry, span);
        self.draft(entry).opened = true;
        let mut env = Env::new();
        env.insert(LocalSlot::RECEIVER, LocalVariable::receiver());
        Cursor { block: entry, env }
    }

    /// Allocate and immediately open a block nothing jumps to
    pub fn dead_cursor(&mut self, span: Span) -> Cursor {
        let block = self.new_block(BlockRole::Dead, span);
        self.open(block)
    }

    pub fn open(&mut self, block: BlockId) -> Cursor {
        self.open_merging(block, &BTreeSet::new())
    }

    /// Open `block`, forcing an argument for every slot in `forced`
    pub fn open_merging(&mut self, block: BlockId, forced: &BTreeSet<LocalSlot>) -> Cursor {
        let pending = std::mem::take(&mut self.draft(block).pending);
        self.draft(block).opened = true;

        let mut slots: BTreeSet<LocalSlot> = forced.clone();
        for (_, env) in &pending {
            slots.extend(env.keys().copied());
        }

        let mut env = Env::new();
        let mut args = Vec::new();
        for slot in slots {
            let incoming: Vec<(BlockId, Option<LocalVariable>)> = pending
                .iter()
                .map(|(pred, pred_env)| (*pred, pred_env.get(&slot).copied()))
                .collect();

            if !forced.contains(&slot) {
                let first = incoming.first().and_then(|(_, var)| *var);
                let unanimous = incoming.iter().all(|(_, var)| *var == first);
                if unanimous {
                    if let Some(var) = first {
                        env.insert(slot, var);
                    }
                    continue;
                }
                let everywhere = incoming.iter().all(|(_, var)| var.is_some());
                if self.locals.info(slot).origin == SlotOrigin::Synthetic && !everywhere {
                    continue;
                }
            }

            let var = self.fresh_version(slot);
            env.insert(slot, var);
            args.push(BlockArgument { var, incoming });
        }

        self.draft(block).args = args;
        Cursor { block, env }
    }

    /// Record an edge `from -> to` carrying `env`
    fn connect(&mut self, from: BlockId, to: BlockId, env: &Env) {
        if !self.is_live(from) {
            return;
        }
        let target = self.draft(to);
        target.predecessors.push(from);
        if target.opened {
            for arg in &mut target.args {
                arg.incoming.push((from, env.get(&arg.var.slot).copied()));
            }
        } else {
            target.pending.push((from, env.clone()));
        }
    }

    fn set_exit(&mut self, block: BlockId, exit: BlockExit) -> Result<()> {
        let span = self.blocks[block.index()].span;
        if self.blocks[block.index()].exit.is_some() {
            return Err(self.invariant(span, format!("exit of {} set twice", block)));
        }
        self.draft(block).exit = Some(exit);
        Ok(())
    }

    pub fn jump(&mut self, cursor: Cursor, to: BlockId) -> Result<()> {
        self.set_exit(cursor.block, BlockExit::Jump(to))?;
        self.connect(cursor.block, to, &cursor.env);
        Ok(())
    }

    pub fn branch(&mut self, cursor: Cursor, cond: LocalVariable, then_block: BlockId, else_block: BlockId) -> Result<()> {
        self.set_exit(
            cursor.block,
            BlockExit::Branch {
                cond,
                then_block,
                else_block,
            },
        )?;
        self.connect(cursor.block, then_block, &cursor.env);
        self.connect(cursor.block, else_block, &cursor.env);
        Ok(())
    }

    pub fn exit(&mut self, cursor: Cursor) -> Result<()> {
        self.set_exit(cursor.block, BlockExit::Exit)
    }

    // ─── Instructions ───────────────────────────────────────────────────

    /// Append `slot = insn`, making the new version current
    pub fn emit(&mut self, cursor: &mut Cursor, slot: LocalSlot, insn: impl Into<Instruction>, span: Span) -> LocalVariable {
        let synthetic = self.locals.info(slot).origin == SlotOrigin::Synthetic;
        self.push_binding(cursor, slot, insn.into(), span, synthetic)
    }

    /// Like [`Self::emit`], but the binding is marked synthetic regardless of the slot
    pub fn emit_synthetic(&mut self, cursor: &mut Cursor, slot: LocalSlot, insn: impl Into<Instruction>, span: Span) -> LocalVariable {
        self.push_binding(cursor, slot, insn.into(), span, true)
    }

    fn push_binding(&mut self, cursor: &mut Cursor, slot: LocalSlot, value: Instruction, span: Span, synthetic: bool) -> LocalVariable {
        let bind = self.fresh_version(slot);
        self.draft(cursor.block).instructions.push(Binding {
            bind,
            span,
            value,
            synthetic,
        });
        cursor.env.insert(slot, bind);
        bind
    }

    /// Current version of a slot the builder itself just wrote
    ///
    /// Unreachable blocks start with an empty environment; there the slot
    /// reads as nil.
    pub fn value(&mut self, cursor: &mut Cursor, slot: LocalSlot, span: Span) -> Result<LocalVariable> {
        if let Some(var) = cursor.get(slot) {
            return Ok(var);
        }
        if self.is_live(cursor.block) {
            return Err(self.invariant(span, format!("slot {} read before it was written", slot.0)));
        }
        Ok(self.emit_synthetic(
            cursor,
            slot,
            Literal {
                value: LiteralType::Nil,
            },
            span,
        ))
    }
}
