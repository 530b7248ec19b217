/*
 * gradual-cfg - Control-flow graph builder for a gradual type checker
 *
 * Feature-First Hexagonal Architecture:
 * - shared/      : Common models (Span, ids, literals) and the symbol table port
 * - features/    : Vertical slices (desugared ast → cfg)
 * - config/      : Lowering configuration (YAML, validation)
 * - errors       : Crate error type
 *
 * Performance:
 * - One builder per method, no shared mutable state
 * - Rayon work-stealing across the methods of a unit
 */

// Crate-level lint configuration
#![allow(clippy::too_many_arguments)] // Lowering helpers thread cursor, span and target
#![allow(clippy::new_without_default)] // Default impl not always needed
#![allow(clippy::module_inception)] // Module naming intentional
#![allow(clippy::unnecessary_map_or)] // map_or style for compatibility

// ═══════════════════════════════════════════════════════════════════════════
// Module Exports - Feature-First Architecture
// ═══════════════════════════════════════════════════════════════════════════

/// Shared models and ports
pub mod shared;

/// Feature modules (ast, cfg)
pub mod features;

/// Configuration
pub mod config;

/// Error types
pub mod errors;

pub use config::LoweringConfig;
pub use errors::{LoweringError, Result};
pub use features::ast::{Expr, ExprKind, MethodDef, UnsupportedConstruct};
pub use features::cfg::{
    build_cfg, BasicBlock, BlockExit, BlockId, Cfg, CfgLoweringUseCase, CfgLoweringUseCaseImpl, CfgViolation,
    Instruction, LinkId, LocalVariable,
};
pub use shared::{InMemorySymbolTable, SymbolTable};
