//! Basic blocks

use super::instruction::Binding;
use super::local::LocalVariable;
use crate::shared::models::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u32);

impl BlockId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// Why a block exists; used by dumps and tests, never by the semantics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockRole {
    Entry,
    Body,
    Then,
    Else,
    Join,
    LoopHeader,
    LoopBody,
    AfterLoop,
    ClosureHeader,
    ClosureBody,
    PostCall,
    Rescue,
    Ensure,
    /// Code following an unconditional transfer; pruned unless re-entered
    Dead,
}

impl BlockRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockRole::Entry => "entry",
            BlockRole::Body => "body",
            BlockRole::Then => "then",
            BlockRole::Else => "else",
            BlockRole::Join => "join",
            BlockRole::LoopHeader => "loop_header",
            BlockRole::LoopBody => "loop_body",
            BlockRole::AfterLoop => "after_loop",
            BlockRole::ClosureHeader => "closure_header",
            BlockRole::ClosureBody => "closure_body",
            BlockRole::PostCall => "post_call",
            BlockRole::Rescue => "rescue",
            BlockRole::Ensure => "ensure",
            BlockRole::Dead => "dead",
        }
    }
}

impl fmt::Display for BlockRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Edge label between two blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Jump,
    Then,
    Else,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Jump => "jump",
            EdgeKind::Then => "then",
            EdgeKind::Else => "else",
        }
    }
}

/// How control leaves a block
#[derive(Debug, Clone, PartialEq)]
pub enum BlockExit {
    /// No successors: the method returns or raises here
    Exit,
    Jump(BlockId),
    /// Two successors keyed by one local; `then_block` is taken when it is truthy
    Branch {
        cond: LocalVariable,
        then_block: BlockId,
        else_block: BlockId,
    },
}

impl BlockExit {
    /// Successors in fixed (then, else) order
    pub fn successors(&self) -> Vec<(BlockId, EdgeKind)> {
        match self {
            BlockExit::Exit => Vec::new(),
            BlockExit::Jump(target) => vec![(*target, EdgeKind::Jump)],
            BlockExit::Branch {
                then_block,
                else_block,
                ..
            } => vec![(*then_block, EdgeKind::Then), (*else_block, EdgeKind::Else)],
        }
    }

    pub fn is_exit(&self) -> bool {
        matches!(self, BlockExit::Exit)
    }

    pub(crate) fn remap(&mut self, mut f: impl FnMut(BlockId) -> BlockId) {
        match self {
            BlockExit::Exit => {}
            BlockExit::Jump(target) => *target = f(*target),
            BlockExit::Branch {
                then_block,
                else_block,
                ..
            } => {
                *then_block = f(*then_block);
                *else_block = f(*else_block);
            }
        }
    }
}

/// Merge point for one slot
///
/// Defines a fresh version on block entry; `incoming` names the version each
/// predecessor brings. `None` means the slot is unassigned along that edge,
/// which reads as nil.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockArgument {
    pub var: LocalVariable,
    pub incoming: Vec<(BlockId, Option<LocalVariable>)>,
}

impl BlockArgument {
    pub fn incoming_from(&self, pred: BlockId) -> Option<Option<LocalVariable>> {
        self.incoming
            .iter()
            .find(|(from, _)| *from == pred)
            .map(|(_, var)| *var)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BasicBlock {
    pub id: BlockId,
    pub role: BlockRole,
    /// 0 for the method body, n for blocks inside the n-th closure
    pub closure_id: u32,
    /// Number of enclosing loops and closures
    pub loop_depth: u32,
    pub span: Span,
    pub args: Vec<BlockArgument>,
    pub instructions: Vec<Binding>,
    pub exit: BlockExit,
    pub predecessors: Vec<BlockId>,
}

impl BasicBlock {
    pub fn successors(&self) -> Vec<BlockId> {
        self.exit.successors().into_iter().map(|(id, _)| id).collect()
    }

    pub fn is_exit(&self) -> bool {
        self.exit.is_exit()
    }

    /// Versions defined here, block arguments first
    pub fn definitions(&self) -> impl Iterator<Item = LocalVariable> + '_ {
        self.args
            .iter()
            .map(|arg| arg.var)
            .chain(self.instructions.iter().map(|binding| binding.bind))
    }
}
