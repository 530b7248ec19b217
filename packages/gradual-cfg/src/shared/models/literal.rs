//! Small value types shared by the desugared tree and the instruction set

use super::ids::NameRef;
use crate::shared::ports::SymbolTable;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Literal singleton type
///
/// The one corner of the type lattice the builder constructs itself: every
/// literal in source becomes the type of exactly that value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LiteralType {
    Nil,
    True,
    False,
    Integer(i64),
    Float(f64),
    String(NameRef),
    Symbol(NameRef),
}

impl LiteralType {
    pub fn is_truthy(&self) -> bool {
        !matches!(self, LiteralType::Nil | LiteralType::False)
    }

    pub fn render(&self, table: &dyn SymbolTable) -> String {
        match self {
            LiteralType::Nil => "nil".to_string(),
            LiteralType::True => "true".to_string(),
            LiteralType::False => "false".to_string(),
            LiteralType::Integer(value) => value.to_string(),
            LiteralType::Float(value) => format!("{:?}", value),
            LiteralType::String(name) => format!("{:?}", table.name_text(*name)),
            LiteralType::Symbol(name) => format!(":{}", table.name_text(*name)),
        }
    }
}

/// Kind of explicit type assertion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CastKind {
    /// Declares the type of a fresh binding
    Let,
    /// Unchecked coercion
    Cast,
    /// Erases the static type entirely
    Unsafe,
    /// Checked assertion that the value already has the type
    AssertType,
    /// Strips nil from the value's type
    Must,
}

impl CastKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CastKind::Let => "let",
            CastKind::Cast => "cast",
            CastKind::Unsafe => "unsafe",
            CastKind::AssertType => "assert_type!",
            CastKind::Must => "must",
        }
    }
}

impl fmt::Display for CastKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared parameter shape of a method or closure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    Positional,
    Optional,
    Rest,
    Keyword,
    Block,
}

/// Source position at which a test asks for the inferred environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnnotationPos {
    pub line: u32,
    pub column: u32,
}

impl AnnotationPos {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for AnnotationPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}
