/// A saved cursor position, used to rewind the lexer.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct SourcePos {
    /// Byte offset from start of source.
    pub offset: u32,
    /// Line number (1-indexed).
    pub line: u32,
    /// Column number (1-indexed, byte-based).
    pub column: u32,
}

/// A cursor over source text that tracks position.
///
/// Provides low-level character access with peek/advance semantics.
/// Tracks byte offset, line number, and column number as it advances, and
/// can be moved back to any previously observed [`SourcePos`].
pub struct Cursor<'src> {
    source: &'src str,
    rest: &'src str,
    offset: u32,
    line: u32,
    column: u32,
}

impl<'src> Cursor<'src> {
    /// Create a new cursor at the start of the source.
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            rest: source,
            offset: 0,
            line: 1,
            column: 1,
        }
    }

    #[inline]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    #[inline]
    pub fn line(&self) -> u32 {
        self.line
    }

    #[inline]
    pub fn column(&self) -> u32 {
        self.column
    }

    /// Snapshot of the current position.
    #[inline]
    pub fn position(&self) -> SourcePos {
        SourcePos {
            offset: self.offset,
            line: self.line,
            column: self.column,
        }
    }

    /// Move to a position previously returned by [`position`](Self::position).
    ///
    /// Offsets past the end clamp to end of input.
    pub fn seek(&mut self, pos: SourcePos) {
        let offset = (pos.offset as usize).min(self.source.len());
        self.rest = &self.source[offset..];
        self.offset = offset as u32;
        self.line = pos.line;
        self.column = pos.column;
    }

    /// Peek at the current character without consuming it.
    #[inline]
    pub fn peek(&self) -> Option<char> {
        self.rest.chars().next()
    }

    /// Peek at the nth character ahead (0 = current).
    #[inline]
    pub fn peek_nth(&self, n: usize) -> Option<char> {
        self.rest.chars().nth(n)
    }

    /// Check if the current character satisfies a predicate.
    #[inline]
    pub fn check(&self, f: impl Fn(char) -> bool) -> bool {
        self.peek().is_some_and(f)
    }

    /// Check if the upcoming bytes match the given string.
    #[inline]
    pub fn check_str(&self, s: &str) -> bool {
        self.rest.starts_with(s)
    }

    /// Consume the current character and advance.
    ///
    /// Returns the consumed character, or `None` if at EOF.
    pub fn advance(&mut self) -> Option<char> {
        let ch = self.rest.chars().next()?;
        let len = ch.len_utf8();
        self.rest = &self.rest[len..];
        self.offset += len as u32;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += len as u32;
        }
        Some(ch)
    }

    /// Consume if the current character matches.
    #[inline]
    pub fn eat(&mut self, ch: char) -> bool {
        if self.peek() == Some(ch) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consume characters while the predicate matches, returning the slice.
    pub fn eat_while(&mut self, f: impl Fn(char) -> bool) -> &'src str {
        let start = self.offset as usize;
        while self.check(&f) {
            self.advance();
        }
        &self.source[start..self.offset as usize]
    }

    /// Skip spaces, tabs and newlines.
    pub fn skip_whitespace(&mut self) {
        self.eat_while(|c| c.is_whitespace());
    }

    /// Slice of source from a starting offset to the current position.
    #[inline]
    pub fn slice_from(&self, start: u32) -> &'src str {
        &self.source[start as usize..self.offset as usize]
    }
}

#[inline]
pub fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

#[inline]
pub fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_tracks_lines_and_columns() {
        let mut cursor = Cursor::new("ab\ncd");
        cursor.advance();
        cursor.advance();
        assert_eq!((cursor.line(), cursor.column()), (1, 3));
        cursor.advance();
        assert_eq!((cursor.line(), cursor.column()), (2, 1));
        assert_eq!(cursor.peek(), Some('c'));
    }

    #[test]
    fn seek_restores_position() {
        let mut cursor = Cursor::new("hello\nworld");
        cursor.eat_while(|c| c != 'w');
        let saved = cursor.position();
        cursor.eat_while(|_| true);
        assert_eq!(cursor.peek(), None);
        cursor.seek(saved);
        assert_eq!(cursor.peek(), Some('w'));
        assert_eq!(cursor.line(), 2);
        assert_eq!(cursor.offset(), 6);
    }

    #[test]
    fn eat_while_returns_slice() {
        let mut cursor = Cursor::new("abc123 rest");
        assert_eq!(cursor.eat_while(is_ident_continue), "abc123");
        assert!(cursor.eat(' '));
        assert_eq!(cursor.slice_from(7), "");
    }
}
