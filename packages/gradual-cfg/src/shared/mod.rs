//! Shared module - Common types and ports
//!
//! Types here are used by every feature: source spans, externally-owned
//! identifiers, literal values and the symbol table port.

pub mod models;
pub mod ports;
pub(crate) mod stack;

// Re-exports for convenience
pub use models::*;
pub use ports::{InMemorySymbolTable, SymbolTable};
