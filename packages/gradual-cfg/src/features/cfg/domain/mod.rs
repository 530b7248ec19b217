//! CFG domain: locals, instructions, blocks and the finished graph

pub mod block;
pub mod graph;
pub mod instruction;
pub mod link;
pub mod local;

pub use block::{BasicBlock, BlockArgument, BlockExit, BlockId, BlockRole, EdgeKind};
pub use graph::Cfg;
pub use instruction::{
    Alias, Binding, BlockReturn, Cast, DebugEnvironment, Ident, Instruction, InstructionKind,
    InstructionVariant, Literal, LoadArg, LoadYieldParams, NotSupported, RenderContext, Return,
    SelfRef, Send, SolveConstraint, Unanalyzable,
};
pub use link::{LinkId, SendAndBlockLink};
pub use local::{LocalSlot, LocalTable, LocalVariable, SlotInfo, SlotOrigin};
