//! Graph algorithms over a finished CFG
//!
//! The CFG is mirrored into a `petgraph::DiGraph` whose node index equals the
//! block index, then handed to petgraph's traversal and dominator routines.

use crate::features::cfg::domain::{BlockId, Cfg, EdgeKind};
use petgraph::algo::dominators::{self, Dominators};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, DfsPostOrder};

/// Node `i` is block `bbi`; edges carry their branch label
pub fn to_graph(cfg: &Cfg) -> DiGraph<BlockId, EdgeKind> {
    let edge_count = cfg.blocks().iter().map(|block| block.successors().len()).sum();
    let mut graph = DiGraph::with_capacity(cfg.len(), edge_count);
    for block in cfg.blocks() {
        graph.add_node(block.id);
    }
    for block in cfg.blocks() {
        for (succ, kind) in block.exit.successors() {
            graph.add_edge(node(block.id), node(succ), kind);
        }
    }
    graph
}

fn node(id: BlockId) -> NodeIndex {
    NodeIndex::new(id.index())
}

/// Per block: reachable from the entry
pub fn reachable(cfg: &Cfg) -> Vec<bool> {
    let graph = to_graph(cfg);
    let mut seen = vec![false; cfg.len()];
    if cfg.is_empty() {
        return seen;
    }
    let mut dfs = Dfs::new(&graph, node(cfg.entry()));
    while let Some(n) = dfs.next(&graph) {
        seen[n.index()] = true;
    }
    seen
}

/// Reachable blocks in reverse postorder from the entry
pub fn reverse_postorder(cfg: &Cfg) -> Vec<BlockId> {
    if cfg.is_empty() {
        return Vec::new();
    }
    let graph = to_graph(cfg);
    let mut order = Vec::with_capacity(cfg.len());
    let mut dfs = DfsPostOrder::new(&graph, node(cfg.entry()));
    while let Some(n) = dfs.next(&graph) {
        order.push(graph[n]);
    }
    order.reverse();
    order
}

fn dominator_tree(cfg: &Cfg, graph: &DiGraph<BlockId, EdgeKind>) -> Dominators<NodeIndex> {
    dominators::simple_fast(graph, node(cfg.entry()))
}

/// Immediate dominator of every block; `None` for the entry
pub fn immediate_dominators(cfg: &Cfg) -> Vec<Option<BlockId>> {
    if cfg.is_empty() {
        return Vec::new();
    }
    let graph = to_graph(cfg);
    let doms = dominator_tree(cfg, &graph);
    (0..cfg.len())
        .map(|index| doms.immediate_dominator(NodeIndex::new(index)).map(|n| graph[n]))
        .collect()
}

/// Edges `from -> to` where `to` dominates `from`: loop and closure re-entry
pub fn back_edges(cfg: &Cfg) -> Vec<(BlockId, BlockId)> {
    if cfg.is_empty() {
        return Vec::new();
    }
    let graph = to_graph(cfg);
    let doms = dominator_tree(cfg, &graph);
    let mut edges = Vec::new();
    for block in cfg.blocks() {
        for succ in block.successors() {
            let dominated = doms
                .dominators(node(block.id))
                .map_or(false, |mut chain| chain.any(|d| d == node(succ)));
            if dominated {
                edges.push((block.id, succ));
            }
        }
    }
    edges
}

impl Cfg {
    pub fn reverse_postorder(&self) -> Vec<BlockId> {
        reverse_postorder(self)
    }

    pub fn back_edges(&self) -> Vec<(BlockId, BlockId)> {
        back_edges(self)
    }

    pub fn immediate_dominators(&self) -> Vec<Option<BlockId>> {
        immediate_dominators(self)
    }
}
