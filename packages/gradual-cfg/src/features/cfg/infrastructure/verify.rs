//! Structural verifier
//!
//! Checks the properties inference relies on. An empty result means the
//! graph is well formed; the builder runs this after every build when
//! `verify_after_build` is set, and the tests run it on everything they
//! build.

use super::analysis::reachable;
use crate::features::cfg::domain::{BlockExit, BlockId, Cfg, Instruction, LinkId, LocalVariable};
use ahash::{AHashMap, AHashSet};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CfgViolation {
    #[error("entry block has predecessors {preds:?}")]
    EntryHasPredecessors { preds: Vec<BlockId> },

    #[error("{block} has no predecessors")]
    NoPredecessors { block: BlockId },

    #[error("{block} is unreachable from the entry")]
    Unreachable { block: BlockId },

    #[error("edge {from} -> {to} is not recorded as a predecessor")]
    MissingPredecessor { from: BlockId, to: BlockId },

    #[error("{block} lists {pred} as a predecessor but {pred} does not jump there")]
    StalePredecessor { block: BlockId, pred: BlockId },

    #[error("{block} targets nonexistent {target}")]
    DanglingEdge { block: BlockId, target: BlockId },

    #[error("{block} branches on undefined {cond}")]
    UndefinedBranchCondition { block: BlockId, cond: LocalVariable },

    #[error("{var} is defined more than once")]
    Redefined { var: LocalVariable },

    #[error("{var} in {block} is not newer than an earlier version of its slot")]
    VersionOrder { block: BlockId, var: LocalVariable },

    #[error("{block} reads undefined {var}")]
    UndefinedRead { block: BlockId, var: LocalVariable },

    #[error("argument {var} of {block} has incoming values for {found:?}, predecessors are {expected:?}")]
    ArgumentEdges {
        block: BlockId,
        var: LocalVariable,
        found: Vec<BlockId>,
        expected: Vec<BlockId>,
    },

    #[error("{link}: {message}")]
    Link { link: LinkId, message: String },
}

/// Every violation found, in a stable order
pub fn verify(cfg: &Cfg) -> Vec<CfgViolation> {
    let mut violations = Vec::new();
    check_edges(cfg, &mut violations);
    let defined = check_versions(cfg, &mut violations);
    check_reads(cfg, &defined, &mut violations);
    check_links(cfg, &mut violations);
    violations
}

fn check_edges(cfg: &Cfg, out: &mut Vec<CfgViolation>) {
    let entry = cfg.entry_block();
    if !entry.predecessors.is_empty() {
        out.push(CfgViolation::EntryHasPredecessors {
            preds: entry.predecessors.clone(),
        });
    }

    let mut dangling = false;
    for block in cfg.blocks() {
        for succ in block.successors() {
            match cfg.block(succ) {
                None => {
                    dangling = true;
                    out.push(CfgViolation::DanglingEdge {
                        block: block.id,
                        target: succ,
                    });
                }
                Some(target) if !target.predecessors.contains(&block.id) => {
                    out.push(CfgViolation::MissingPredecessor {
                        from: block.id,
                        to: succ,
                    });
                }
                Some(_) => {}
            }
        }
        for pred in &block.predecessors {
            let jumps_here = cfg
                .block(*pred)
                .map_or(false, |pred_block| pred_block.successors().contains(&block.id));
            if !jumps_here {
                out.push(CfgViolation::StalePredecessor {
                    block: block.id,
                    pred: *pred,
                });
            }
        }
        if block.id != cfg.entry() && block.predecessors.is_empty() {
            out.push(CfgViolation::NoPredecessors { block: block.id });
        }

        let mut expected = block.predecessors.clone();
        expected.sort();
        for arg in &block.args {
            let mut found: Vec<BlockId> = arg.incoming.iter().map(|(pred, _)| *pred).collect();
            found.sort();
            if found != expected {
                out.push(CfgViolation::ArgumentEdges {
                    block: block.id,
                    var: arg.var,
                    found,
                    expected: expected.clone(),
                });
            }
        }
    }

    if dangling {
        return;
    }
    for (index, seen) in reachable(cfg).into_iter().enumerate() {
        if !seen {
            out.push(CfgViolation::Unreachable {
                block: BlockId(index as u32),
            });
        }
    }
}

/// Definitions must be unique and, per slot, strictly increasing in
/// block-then-position order. Returns the set of defined versions.
fn check_versions(cfg: &Cfg, out: &mut Vec<CfgViolation>) -> AHashSet<LocalVariable> {
    let mut defined = AHashSet::new();
    defined.insert(LocalVariable::receiver());
    let mut latest: AHashMap<u32, u32> = AHashMap::new();

    for block in cfg.blocks() {
        for var in block.definitions() {
            if !defined.insert(var) {
                out.push(CfgViolation::Redefined { var });
                continue;
            }
            let last = latest.entry(var.slot.0).or_insert(0);
            if var.version <= *last {
                out.push(CfgViolation::VersionOrder { block: block.id, var });
            }
            *last = (*last).max(var.version);
        }
    }
    defined
}

fn check_reads(cfg: &Cfg, defined: &AHashSet<LocalVariable>, out: &mut Vec<CfgViolation>) {
    for block in cfg.blocks() {
        for arg in &block.args {
            for var in arg.incoming.iter().filter_map(|(_, var)| *var) {
                if !defined.contains(&var) {
                    out.push(CfgViolation::UndefinedRead { block: block.id, var });
                }
            }
        }
        for binding in &block.instructions {
            for var in binding.value.reads() {
                if !defined.contains(&var) {
                    out.push(CfgViolation::UndefinedRead { block: block.id, var });
                }
            }
        }
        if let BlockExit::Branch { cond, .. } = block.exit {
            if !defined.contains(&cond) {
                out.push(CfgViolation::UndefinedBranchCondition { block: block.id, cond });
            }
        }
    }
}

#[derive(Default)]
struct LinkUse {
    sends: usize,
    loads: usize,
    loads_at_entry: usize,
    load_closure_ids: Vec<u32>,
    block_returns: usize,
    solves: usize,
}

fn check_links(cfg: &Cfg, out: &mut Vec<CfgViolation>) {
    let mut uses: Vec<LinkUse> = cfg.links().iter().map(|_| LinkUse::default()).collect();

    for block in cfg.blocks() {
        for (position, binding) in block.instructions.iter().enumerate() {
            let Some(link) = binding.value.link() else {
                continue;
            };
            let Some(usage) = uses.get_mut(link.0 as usize) else {
                out.push(CfgViolation::Link {
                    link,
                    message: format!("referenced from {} but not in the link arena", block.id),
                });
                continue;
            };
            match &binding.value {
                Instruction::Send(_) => usage.sends += 1,
                Instruction::LoadYieldParams(_) => {
                    usage.loads += 1;
                    if position == 0 {
                        usage.loads_at_entry += 1;
                    }
                    usage.load_closure_ids.push(block.closure_id);
                }
                Instruction::BlockReturn(_) => usage.block_returns += 1,
                Instruction::SolveConstraint(_) => usage.solves += 1,
                _ => {}
            }
        }
    }

    for (index, usage) in uses.iter().enumerate() {
        let link = LinkId(index as u32);
        let mut fail = |message: String| out.push(CfgViolation::Link { link, message });
        if usage.sends != 1 {
            fail(format!("expected exactly one send, found {}", usage.sends));
        }
        if usage.loads != 1 {
            fail(format!("expected exactly one load_yield_params, found {}", usage.loads));
        } else if usage.loads_at_entry != 1 {
            fail("load_yield_params is not the first instruction of its block".to_string());
        }
        if usage.loads + usage.block_returns == 0 {
            fail("no closure body refers to this link".to_string());
        }
        if usage.solves > 1 {
            fail(format!("expected at most one solve, found {}", usage.solves));
        }
        if let Some(record) = cfg.link(link) {
            if usage.load_closure_ids.iter().any(|id| *id != record.closure_id) {
                fail(format!("closure body is not closure {}", record.closure_id));
            }
        }
    }
}

impl Cfg {
    /// Structural violations; empty for a well-formed graph
    pub fn verify(&self) -> Vec<CfgViolation> {
        verify(self)
    }
}
