//! Custom assertions for graph verification

use gradual_cfg::features::cfg::{BlockRole, Cfg, InstructionKind};
use gradual_cfg::shared::ports::SymbolTable;

/// Assert that the verifier finds nothing
pub fn assert_well_formed(cfg: &Cfg, table: &dyn SymbolTable) {
    let violations = cfg.verify();
    assert!(
        violations.is_empty(),
        "Expected a well-formed graph, got {:?}\n{}",
        violations,
        cfg.to_text(table)
    );
}

/// Assert the number of blocks
pub fn assert_block_count(cfg: &Cfg, expected: usize) {
    assert_eq!(
        cfg.len(),
        expected,
        "Expected {expected} blocks, got {}: {:?}",
        cfg.len(),
        cfg.blocks().iter().map(|b| b.role).collect::<Vec<_>>()
    );
}

/// Number of instructions of one kind across the graph
pub fn count_kind(cfg: &Cfg, kind: InstructionKind) -> usize {
    cfg.instruction_histogram().get(&kind).copied().unwrap_or(0)
}

/// Roles of all blocks in id order
pub fn roles(cfg: &Cfg) -> Vec<BlockRole> {
    cfg.blocks().iter().map(|b| b.role).collect()
}
