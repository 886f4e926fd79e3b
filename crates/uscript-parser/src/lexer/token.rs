//! Token types.
//!
//! Reserved words are not a separate token class: the compiler compares
//! identifier text case-insensitively, so `If`, `if` and `IF` are the same
//! keyword and a word is only special where the grammar expects it.

use std::fmt;

use ordered_float::OrderedFloat;
use uscript_core::Span;

/// A literal value resolved by the lexer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Constant {
    /// An enumeration tag reclassified through a type hint.
    Enum { enum_name: String, value: u8 },
    Int(i32),
    Bool(bool),
    Float(OrderedFloat<f32>),
    Name(String),
    String(String),
    Vector([OrderedFloat<f32>; 3]),
    Rotator([i32; 3]),
    /// The `none` object reference.
    NoObject,
    /// A class reference, `class'Name'`.
    Class(String),
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Enum { value, .. } => write!(f, "{value}"),
            Constant::Int(v) => write!(f, "{v}"),
            Constant::Bool(b) => write!(f, "{b}"),
            Constant::Float(v) => write!(f, "{:?}", v.0),
            Constant::Name(n) => write!(f, "'{n}'"),
            Constant::String(s) => write!(f, "\"{s}\""),
            Constant::Vector([x, y, z]) => write!(f, "vect({:?},{:?},{:?})", x.0, y.0, z.0),
            Constant::Rotator([p, y, r]) => write!(f, "rot({p},{y},{r})"),
            Constant::NoObject => f.write_str("none"),
            Constant::Class(c) => write!(f, "class'{c}'"),
        }
    }
}

/// The kind of token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Identifier(String),
    Symbol(&'static str),
    Const(Constant),
    Eof,
}

/// A token with its source location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Identifier text, if this is an identifier.
    pub fn ident(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Identifier(s) => Some(s),
            _ => None,
        }
    }

    /// Whether this is the identifier `word`, ignoring case.
    pub fn is_ident(&self, word: &str) -> bool {
        self.ident().is_some_and(|s| s.eq_ignore_ascii_case(word))
    }

    pub fn is_symbol(&self, symbol: &str) -> bool {
        matches!(self.kind, TokenKind::Symbol(s) if s == symbol)
    }

    pub fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }

    /// Text used to look the token up as an operator name: symbols and
    /// identifiers both qualify.
    pub fn operator_text(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Identifier(s) => Some(s),
            TokenKind::Symbol(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TokenKind::Identifier(s) => f.write_str(s),
            TokenKind::Symbol(s) => f.write_str(s),
            TokenKind::Const(c) => write!(f, "{c}"),
            TokenKind::Eof => f.write_str("end of file"),
        }
    }
}

/// Multi-character symbols, longest first.
pub(crate) const LONG_SYMBOLS: &[&str] = &[
    "==", "!=", "<=", ">=", "&&", "||", "^^", "++", "--", "+=", "-=", "*=", "/=", "<<", ">>", "**",
    "~=", "$=",
];

/// Single-character symbols.
pub(crate) const SHORT_SYMBOLS: &[&str] = &[
    "+", "-", "*", "/", "%", "<", ">", "=", "!", "~", "&", "|", "^", "(", ")", "[", "]", "{", "}",
    ";", ",", ".", ":", "?", "@", "$", "#",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_match_ignores_case() {
        let tok = Token::new(TokenKind::Identifier("While".into()), Span::default());
        assert!(tok.is_ident("while"));
        assert!(!tok.is_symbol("while"));
        assert_eq!(tok.operator_text(), Some("While"));
    }

    #[test]
    fn constant_display_round_trips_source_forms() {
        assert_eq!(Constant::Name("Begin".into()).to_string(), "'Begin'");
        assert_eq!(Constant::Class("Pawn".into()).to_string(), "class'Pawn'");
        assert_eq!(
            Constant::Vector([OrderedFloat(1.0), OrderedFloat(0.5), OrderedFloat(-2.0)]).to_string(),
            "vect(1.0,0.5,-2.0)"
        );
    }
}
