//! Feature slices: the desugared input tree and the CFG built from it

pub mod ast;
pub mod cfg;
