//! Source location tracking for error reporting.

use std::fmt;

/// A span of source code, represented by its starting position.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    /// Line number (1-indexed).
    pub line: u32,
    /// Column number (1-indexed, byte-based).
    pub col: u32,
    /// Length in bytes.
    pub len: u32,
}

impl Span {
    /// Create a new span from a line, column, and length.
    #[inline]
    pub fn new(line: u32, col: u32, len: u32) -> Self {
        Self { line, col, len }
    }

    /// Create a zero-length span at a position.
    #[inline]
    pub fn point(line: u32, col: u32) -> Self {
        Self { line, col, len: 0 }
    }

    /// Whether this span is empty (zero length).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_line_colon_col() {
        assert_eq!(Span::point(12, 4).to_string(), "12:4");
    }
}
