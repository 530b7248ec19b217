//! Source location types
//!
//! These types represent positions in source code. Every binding in the
//! graph carries one, so diagnostics can point back at the desugared tree.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Single location in source code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// Span in source code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl Span {
    pub fn new(start_line: u32, start_col: u32, end_line: u32, end_col: u32) -> Self {
        Self {
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// Create a zero span (0:0-0:0), used for compiler-generated bindings
    pub fn zero() -> Self {
        Self::new(0, 0, 0, 0)
    }

    /// Single-line span
    pub fn line(line: u32) -> Self {
        Self::new(line, 0, line, 0)
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::zero()
    }

    pub fn start(&self) -> Location {
        Location::new(self.start_line, self.start_col)
    }

    pub fn end(&self) -> Location {
        Location::new(self.end_line, self.end_col)
    }

    /// Smallest span covering both
    pub fn join(&self, other: &Span) -> Span {
        if self.is_zero() {
            return *other;
        }
        if other.is_zero() {
            return *self;
        }
        let start = self.start().min(other.start());
        let end = self.end().max(other.end());
        Span::new(start.line, start.column, end.line, end.column)
    }
}

impl Default for Span {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}-{}:{}",
            self.start_line, self.start_col, self.end_line, self.end_col
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locations_order_by_line_then_column() {
        let span = Span::new(2, 4, 3, 0);
        assert!(Location::new(2, 3) < span.start());
        assert!(Location::new(2, 4) <= span.start());
        assert!(Location::new(1, 80) < span.start());
        assert_eq!(span.end(), Location::new(3, 0));
    }

    #[test]
    fn test_span_join_ignores_zero() {
        let a = Span::new(3, 4, 3, 10);
        assert_eq!(a.join(&Span::zero()), a);
        assert_eq!(Span::zero().join(&a), a);

        let b = Span::new(1, 2, 2, 0);
        assert_eq!(a.join(&b), Span::new(1, 2, 3, 10));
    }

    #[test]
    fn test_span_display() {
        assert_eq!(Span::new(1, 2, 3, 4).to_string(), "1:2-3:4");
    }
}
