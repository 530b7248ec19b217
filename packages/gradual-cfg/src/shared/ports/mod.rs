//! Ports to external collaborators

mod symbol_table;

pub use symbol_table::{InMemorySymbolTable, SymbolTable};
