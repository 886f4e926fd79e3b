//! Error types for lexing and compilation.
//!
//! Errors fall into five categories:
//!
//! - **Lexical**: malformed tokens (overlong identifiers, unterminated strings)
//! - **Syntactic**: missing or unexpected tokens
//! - **Semantic**: unknown identifiers, type mismatches, overload failures
//! - **Structural**: nesting overflow, unresolved labels, code overflow
//! - **Driver**: class-level failures in the unit set

use std::fmt;
use thiserror::Error;

use crate::Span;

/// Error raised while turning characters into tokens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("at {span}: identifier exceeds {max} characters")]
    IdentifierTooLong { max: usize, span: Span },

    #[error("at {span}: string constant exceeds {max} characters")]
    StringTooLong { max: usize, span: Span },

    #[error("at {span}: name constant exceeds {max} characters")]
    NameTooLong { max: usize, span: Span },

    #[error("at {span}: unterminated string constant")]
    UnterminatedString { span: Span },

    #[error("at {span}: unterminated name constant")]
    UnterminatedName { span: Span },

    #[error("at {span}: unterminated block comment")]
    UnterminatedComment { span: Span },

    #[error("at {span}: invalid numeric constant '{text}'")]
    InvalidNumber { text: String, span: Span },

    #[error("at {span}: malformed {what} constant")]
    MalformedConstant { what: &'static str, span: Span },

    #[error("at {span}: unexpected character '{ch}'")]
    UnexpectedChar { ch: char, span: Span },
}

impl LexError {
    pub fn span(&self) -> Span {
        match self {
            LexError::IdentifierTooLong { span, .. }
            | LexError::StringTooLong { span, .. }
            | LexError::NameTooLong { span, .. }
            | LexError::UnterminatedString { span }
            | LexError::UnterminatedName { span }
            | LexError::UnterminatedComment { span }
            | LexError::InvalidNumber { span, .. }
            | LexError::MalformedConstant { span, .. }
            | LexError::UnexpectedChar { span, .. } => *span,
        }
    }
}

/// Which side of an operator failed to match any overload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandSide {
    Left,
    Right,
    Both,
    Operand,
}

impl fmt::Display for OperandSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperandSide::Left => "left operand",
            OperandSide::Right => "right operand",
            OperandSide::Both => "both operands",
            OperandSide::Operand => "operand",
        })
    }
}

/// Broad classification of a [`CompileError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Lexical,
    Syntactic,
    Semantic,
    Structural,
    Driver,
}

/// Error raised while compiling a class.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error("at {span}: expected {expected}, found '{found}'")]
    Expected {
        expected: String,
        found: String,
        span: Span,
    },

    #[error("at {span}: unknown identifier '{name}'")]
    UnknownIdentifier { name: String, span: Span },

    #[error("at {span}: unknown type '{name}'")]
    UnknownType { name: String, span: Span },

    #[error("at {span}: type mismatch: {message}")]
    TypeMismatch { message: String, span: Span },

    #[error("at {span}: ambiguous operator '{op}' between {candidates}")]
    AmbiguousOperator {
        op: String,
        candidates: String,
        span: Span,
    },

    #[error("at {span}: {side} incompatible with operator '{op}'")]
    IncompatibleOperands {
        op: String,
        side: OperandSide,
        span: Span,
    },

    #[error("at {span}: '{name}' {message}")]
    Redefinition {
        name: String,
        message: String,
        span: Span,
    },

    #[error("at {span}: {message}")]
    Semantic { message: String, span: Span },

    #[error("at {span}: {construct} nesting exceeds {max} levels")]
    NestingOverflow {
        construct: &'static str,
        max: usize,
        span: Span,
    },

    #[error("at {span}: label '{name}' not found")]
    UnresolvedLabel { name: String, span: Span },

    #[error("at {span}: code size exceeds {max} bytes")]
    CodeOverflow { max: usize, span: Span },

    #[error("unknown class '{name}'")]
    UnknownClass { name: String },

    #[error("class '{class}' cannot compile: parent '{parent}' failed")]
    ParentFailed { class: String, parent: String },

    #[error("class '{class}' rolled back: it uses '{dependency}', which failed")]
    DependencyFailed { class: String, dependency: String },

    #[error("at {span}: directive failed: {message}")]
    Directive { message: String, span: Span },

    #[error("internal compiler error: {message}")]
    Internal { message: String },
}

impl CompileError {
    pub fn semantic(message: impl Into<String>, span: Span) -> Self {
        CompileError::Semantic {
            message: message.into(),
            span,
        }
    }

    pub fn mismatch(message: impl Into<String>, span: Span) -> Self {
        CompileError::TypeMismatch {
            message: message.into(),
            span,
        }
    }

    pub fn expected(expected: impl Into<String>, found: impl Into<String>, span: Span) -> Self {
        CompileError::Expected {
            expected: expected.into(),
            found: found.into(),
            span,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        CompileError::Internal {
            message: message.into(),
        }
    }

    /// Location of the error. Driver errors report a default span.
    pub fn span(&self) -> Span {
        match self {
            CompileError::Lex(e) => e.span(),
            CompileError::Expected { span, .. }
            | CompileError::UnknownIdentifier { span, .. }
            | CompileError::UnknownType { span, .. }
            | CompileError::TypeMismatch { span, .. }
            | CompileError::AmbiguousOperator { span, .. }
            | CompileError::IncompatibleOperands { span, .. }
            | CompileError::Redefinition { span, .. }
            | CompileError::Semantic { span, .. }
            | CompileError::NestingOverflow { span, .. }
            | CompileError::UnresolvedLabel { span, .. }
            | CompileError::CodeOverflow { span, .. }
            | CompileError::Directive { span, .. } => *span,
            CompileError::UnknownClass { .. }
            | CompileError::ParentFailed { .. }
            | CompileError::DependencyFailed { .. }
            | CompileError::Internal { .. } => Span::default(),
        }
    }

    /// Line number of the error (0 when unknown).
    pub fn line(&self) -> u32 {
        self.span().line
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            CompileError::Lex(_) => ErrorCategory::Lexical,
            CompileError::Expected { .. } => ErrorCategory::Syntactic,
            CompileError::UnknownIdentifier { .. }
            | CompileError::UnknownType { .. }
            | CompileError::TypeMismatch { .. }
            | CompileError::AmbiguousOperator { .. }
            | CompileError::IncompatibleOperands { .. }
            | CompileError::Redefinition { .. }
            | CompileError::Semantic { .. } => ErrorCategory::Semantic,
            CompileError::NestingOverflow { .. }
            | CompileError::UnresolvedLabel { .. }
            | CompileError::CodeOverflow { .. } => ErrorCategory::Structural,
            CompileError::UnknownClass { .. }
            | CompileError::ParentFailed { .. }
            | CompileError::DependencyFailed { .. }
            | CompileError::Directive { .. }
            | CompileError::Internal { .. } => ErrorCategory::Driver,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lex_errors_convert_and_keep_span() {
        let err: CompileError = LexError::UnterminatedString {
            span: Span::point(4, 9),
        }
        .into();
        assert_eq!(err.line(), 4);
        assert_eq!(err.category(), ErrorCategory::Lexical);
        assert!(err.to_string().contains("unterminated string"));
    }

    #[test]
    fn operand_side_message() {
        let err = CompileError::IncompatibleOperands {
            op: "+".into(),
            side: OperandSide::Right,
            span: Span::point(2, 3),
        };
        assert_eq!(
            err.to_string(),
            "at 2:3: right operand incompatible with operator '+'"
        );
        assert_eq!(err.category(), ErrorCategory::Semantic);
    }

    #[test]
    fn driver_errors_have_no_line() {
        let err = CompileError::UnknownClass { name: "Foo".into() };
        assert_eq!(err.line(), 0);
        assert_eq!(err.category(), ErrorCategory::Driver);
    }
}
