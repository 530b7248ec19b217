//! Graph dumps: plain text, Graphviz dot and JSON
//!
//! Text form, one block per paragraph:
//!
//! ```text
//! method Foo#bar {
//! bb0 (entry):
//!     x@1 = load_arg(<self>@0#bar, 0)
//!     <condTemp>$3@1 = x@1
//!     branch <condTemp>$3@1 ? bb1 : bb2
//! ...
//! }
//! ```

use crate::features::cfg::domain::{BasicBlock, BlockExit, BlockRole, Cfg, RenderContext};
use crate::shared::ports::SymbolTable;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

fn render_block(block: &BasicBlock, ctx: &RenderContext<'_>, out: &mut String) {
    let _ = write!(out, "{} ({}", block.id, block.role);
    if block.closure_id > 0 {
        let _ = write!(out, ", closure {}", block.closure_id);
    }
    if !block.predecessors.is_empty() {
        let preds: Vec<String> = block.predecessors.iter().map(ToString::to_string).collect();
        let _ = write!(out, ", preds {}", preds.join(" "));
    }
    out.push_str("):\n");

    for arg in &block.args {
        let incoming: Vec<String> = arg
            .incoming
            .iter()
            .map(|(pred, var)| match var {
                Some(var) => format!("{}: {}", pred, ctx.local(*var)),
                None => format!("{}: nil", pred),
            })
            .collect();
        let _ = writeln!(out, "    {} = phi({})", ctx.local(arg.var), incoming.join(", "));
    }
    for binding in &block.instructions {
        let _ = writeln!(out, "    {}", binding.render(ctx));
    }
    let _ = writeln!(out, "    {}", render_exit(&block.exit, ctx));
}

fn render_exit(exit: &BlockExit, ctx: &RenderContext<'_>) -> String {
    match exit {
        BlockExit::Exit => "exit".to_string(),
        BlockExit::Jump(target) => format!("jump {}", target),
        BlockExit::Branch {
            cond,
            then_block,
            else_block,
        } => format!("branch {} ? {} : {}", ctx.local(*cond), then_block, else_block),
    }
}

/// Text dump of the whole graph
pub fn to_text(cfg: &Cfg, table: &dyn SymbolTable) -> String {
    let ctx = cfg.render_context(table);
    let mut out = String::new();
    let _ = writeln!(out, "method {} {{", cfg.qualified_name(table));
    for (index, block) in cfg.blocks().iter().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        render_block(block, &ctx, &mut out);
    }
    out.push_str("}\n");
    out
}

fn dot_escape(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('<', "\\<")
        .replace('>', "\\>")
        .replace('{', "\\{")
        .replace('}', "\\}")
        .replace('|', "\\|")
}

/// Graphviz rendering; closure bodies are drawn dashed
pub fn to_dot(cfg: &Cfg, table: &dyn SymbolTable) -> String {
    let ctx = cfg.render_context(table);
    let mut out = String::new();
    let _ = writeln!(out, "digraph \"{}\" {{", cfg.qualified_name(table).replace('"', "\\\""));
    out.push_str("    node [shape=record, fontname=\"monospace\"];\n");

    for block in cfg.blocks() {
        let mut lines = vec![format!("{} ({})", block.id, block.role)];
        for arg in &block.args {
            lines.push(format!("{} = phi", ctx.local(arg.var)));
        }
        lines.extend(block.instructions.iter().map(|binding| binding.render(&ctx)));
        let label: Vec<String> = lines.iter().map(|line| dot_escape(line)).collect();
        let style = if block.closure_id > 0 { ", style=dashed" } else { "" };
        let shape = if block.is_exit() { ", peripheries=2" } else { "" };
        let _ = writeln!(
            out,
            "    {} [label=\"{{{}\\l}}\"{}{}];",
            block.id,
            label.join("\\l|"),
            style,
            shape
        );
    }
    for block in cfg.blocks() {
        for (succ, kind) in block.exit.successors() {
            let _ = writeln!(out, "    {} -> {} [label=\"{}\"];", block.id, succ, kind.as_str());
        }
    }
    out.push_str("}\n");
    out
}

/// Serializable snapshot of a graph, names already resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CfgDump {
    pub method: String,
    pub entry: u32,
    pub exits: Vec<u32>,
    pub blocks: Vec<BlockDump>,
    pub links: Vec<LinkDump>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockDump {
    pub id: u32,
    pub role: BlockRole,
    pub closure_id: u32,
    pub loop_depth: u32,
    pub args: Vec<String>,
    pub instructions: Vec<String>,
    pub exit: String,
    pub successors: Vec<u32>,
    pub predecessors: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkDump {
    pub id: u32,
    pub fun: String,
    pub closure_id: u32,
    pub arity: usize,
}

impl CfgDump {
    pub fn new(cfg: &Cfg, table: &dyn SymbolTable) -> Self {
        let ctx = cfg.render_context(table);
        let blocks = cfg
            .blocks()
            .iter()
            .map(|block| BlockDump {
                id: block.id.0,
                role: block.role,
                closure_id: block.closure_id,
                loop_depth: block.loop_depth,
                args: block.args.iter().map(|arg| ctx.local(arg.var)).collect(),
                instructions: block.instructions.iter().map(|b| b.render(&ctx)).collect(),
                exit: render_exit(&block.exit, &ctx),
                successors: block.successors().iter().map(|id| id.0).collect(),
                predecessors: block.predecessors.iter().map(|id| id.0).collect(),
            })
            .collect();
        let links = cfg
            .links()
            .iter()
            .enumerate()
            .map(|(index, link)| LinkDump {
                id: index as u32,
                fun: table.name_text(link.fun),
                closure_id: link.closure_id,
                arity: link.arity(),
            })
            .collect();

        Self {
            method: cfg.qualified_name(table),
            entry: cfg.entry().0,
            exits: cfg.exit_blocks().iter().map(|id| id.0).collect(),
            blocks,
            links,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

impl Cfg {
    pub fn to_text(&self, table: &dyn SymbolTable) -> String {
        to_text(self, table)
    }

    pub fn to_dot(&self, table: &dyn SymbolTable) -> String {
        to_dot(self, table)
    }

    pub fn dump(&self, table: &dyn SymbolTable) -> CfgDump {
        CfgDump::new(self, table)
    }
}
