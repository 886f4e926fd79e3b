//! Expression compiler.
//!
//! Expressions are compiled in a single left-to-right pass straight into
//! the class code buffer:
//! - a primand (constant, variable, call, cast, parenthesized expression or
//!   prefix operator) followed by `[index]` and `.member` selectors
//! - postfix operators, applied whenever one is declared for the token
//! - binary operators, taken while their precedence is below the ceiling
//!   (a lower number binds tighter, equal precedence associates left)
//!
//! Operator and conversion headers are spliced in front of operand bytes
//! once the operator is known; see [`CodeBuffer::move_tail`](crate::emit::CodeBuffer::move_tail).

mod binary;
mod calls;
mod cast;
mod identifiers;
mod literals;
mod member;
mod unary;

pub(crate) use calls::Dispatch;

use uscript_core::{CompileError, PropType, Property, Span};
use uscript_parser::TokenKind;

use crate::bytecode::{CastKind, OpCode};
use crate::compiler::{ClassCompiler, Result};
use crate::conversion::{ConversionCost, conversion_cost, implicit_cast};
use crate::symbols::{ClassTable, OperatorKind};

/// Highest ceiling: every binary operator may be taken.
pub(crate) const MAX_PRECEDENCE: u8 = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprStatus {
    Ok,
    /// Compiled, but not convertible to the required type.
    Mismatch,
    /// No expression starts here; nothing was consumed.
    Absent,
}

/// Result descriptor of a compiled expression.
#[derive(Debug, Clone)]
pub struct ExprOutcome {
    pub status: ExprStatus,
    pub ty: Property,
    /// Designates storage (variable, element, component).
    pub lvalue: bool,
    pub is_const: bool,
    /// Position of the `u16` offset operand of the underlying variable.
    pub var_operand: Option<usize>,
    /// Class named by a `class'Name'` literal.
    pub class_literal: Option<String>,
    /// Enum whose tags the next operand should recognize.
    pub enum_hint: Option<String>,
    pub has_effect: bool,
    /// Result of calling an iterator function.
    pub iterator: bool,
    /// Value of a bare integer literal, eligible for byte narrowing.
    pub int_literal: Option<i32>,
    /// Where the expression's bytes begin.
    pub start: usize,
    pub span: Span,
}

impl ExprOutcome {
    pub(crate) fn absent(start: usize, span: Span) -> Self {
        Self {
            status: ExprStatus::Absent,
            ..Self::value(PropType::None, start, span)
        }
    }

    pub(crate) fn value(ty: PropType, start: usize, span: Span) -> Self {
        let enum_hint = ty.enum_name().map(str::to_string);
        Self {
            status: ExprStatus::Ok,
            ty: Property::value(ty),
            lvalue: false,
            is_const: false,
            var_operand: None,
            class_literal: None,
            enum_hint,
            has_effect: false,
            iterator: false,
            int_literal: None,
            start,
            span,
        }
    }

    #[inline]
    pub fn is_absent(&self) -> bool {
        self.status == ExprStatus::Absent
    }

    /// Assignable storage that is not `const`.
    #[inline]
    pub fn is_writable(&self) -> bool {
        self.lvalue && !self.is_const
    }
}

impl ClassCompiler<'_> {
    /// Compile one expression.
    ///
    /// `required` converts the result (or marks it [`ExprStatus::Mismatch`]);
    /// `max_prec` is the binary-operator ceiling; `hint` names an enum whose
    /// tags are constants in the first primand.
    pub(crate) fn compile_expr(
        &mut self,
        required: Option<&Property>,
        max_prec: u8,
        hint: Option<&str>,
    ) -> Result<ExprOutcome> {
        let lex_hint = required.and_then(|r| r.ty.enum_name()).or(hint).map(str::to_string);
        let mut expr = self.compile_primand(lex_hint.as_deref())?;
        if expr.is_absent() {
            return Ok(expr);
        }

        loop {
            let token = self.next_plain()?;
            let Some(op) = token.operator_text().map(str::to_string) else {
                self.lexer.unget();
                break;
            };
            let post = self.collect_operators(self.this, &op, OperatorKind::Post);
            if !post.is_empty() {
                expr = self.apply_postfix(&op, &post, expr, token.span)?;
                continue;
            }
            let binary = self.collect_operators(self.this, &op, OperatorKind::Binary);
            let precedence = binary.first().and_then(|&r| self.node(r)).and_then(|n| n.kind.precedence());
            match precedence {
                Some(prec) if prec < max_prec => {
                    expr = self.apply_binary(&op, &binary, prec, expr, token.span)?;
                }
                _ => {
                    self.lexer.unget();
                    break;
                }
            }
        }

        if let Some(required) = required {
            self.coerce_to(&mut expr, required)?;
        }
        Ok(expr)
    }

    /// Compile an expression that must exist and convert to `required`.
    pub(crate) fn compile_required(&mut self, required: &Property, what: &str) -> Result<ExprOutcome> {
        let here = self.lexer.here();
        let expr = self.compile_expr(Some(required), MAX_PRECEDENCE, None)?;
        match expr.status {
            ExprStatus::Ok => Ok(expr),
            ExprStatus::Absent => Err(self.missing(what, here)),
            ExprStatus::Mismatch => Err(CompileError::mismatch(
                format!("{what} expects {}, got {}", required.ty, expr.ty.ty),
                expr.span,
            )),
        }
    }

    /// Error for an expression that should have started at `span`.
    pub(crate) fn missing(&mut self, what: &str, span: Span) -> CompileError {
        let found = self.next_plain().map(|t| t.to_string()).unwrap_or_default();
        CompileError::expected(what.to_string(), found, span)
    }

    /// Convert `expr` in place to `required`, or mark it a mismatch.
    pub(crate) fn coerce_to(&mut self, expr: &mut ExprOutcome, required: &Property) -> Result<()> {
        if expr.status != ExprStatus::Ok {
            return Ok(());
        }
        if required.ty == PropType::Byte
            && !required.is_out()
            && let Some(value) = expr.int_literal
            && let Ok(byte) = u8::try_from(value)
        {
            self.code.truncate(expr.start);
            self.code.emit_op(OpCode::ByteConst);
            self.code.emit_u8(byte);
            expr.ty = Property::value(PropType::Byte);
            expr.int_literal = None;
            return Ok(());
        }

        let cost = conversion_cost(required, &expr.ty, self);
        if !cost.is_compatible() {
            expr.status = ExprStatus::Mismatch;
            return Ok(());
        }
        if cost == ConversionCost::IDENTICAL {
            return Ok(());
        }
        if let Some(cast) = implicit_cast(&required.ty, &expr.ty.ty) {
            self.insert_cast(cast, expr.start);
            expr.lvalue = false;
            expr.var_operand = None;
        }
        expr.ty = Property::value(required.ty.clone());
        expr.int_literal = None;
        Ok(())
    }

    /// Splice `Conversion cast` in front of the operand starting at `at`.
    pub(crate) fn insert_cast(&mut self, cast: CastKind, at: usize) {
        let header = self.code.len();
        self.code.emit_op(OpCode::Conversion);
        self.code.emit_u8(cast.into());
        self.code.move_tail(header, at);
    }

    /// Primand followed by any `[index]` and `.member` selectors.
    fn compile_primand(&mut self, hint: Option<&str>) -> Result<ExprOutcome> {
        let start = self.code.len();
        let token = self.next_hinted(hint)?;
        let span = token.span;

        let mut expr = match token.kind {
            TokenKind::Eof => {
                self.lexer.unget();
                return Ok(ExprOutcome::absent(start, span));
            }
            TokenKind::Const(constant) => self.compile_constant(&constant, start, span)?,
            TokenKind::Symbol("(") => {
                let mut inner = self.compile_expr(None, MAX_PRECEDENCE, hint)?;
                if inner.is_absent() {
                    return Err(self.missing("expression", span));
                }
                self.expect_symbol(")")?;
                inner.start = start;
                inner
            }
            TokenKind::Symbol(symbol) => {
                let pre = self.collect_operators(self.this, symbol, OperatorKind::Pre);
                if pre.is_empty() {
                    self.lexer.unget();
                    return Ok(ExprOutcome::absent(start, span));
                }
                self.apply_prefix(symbol, &pre, hint, start, span)?
            }
            TokenKind::Identifier(word) => match self.compile_identifier(&word, hint, start, span)? {
                Some(expr) => expr,
                None => {
                    let pre = self.collect_operators(self.this, &word, OperatorKind::Pre);
                    if pre.is_empty() {
                        return Err(CompileError::UnknownIdentifier { name: word, span });
                    }
                    self.apply_prefix(&word, &pre, hint, start, span)?
                }
            },
        };

        loop {
            if self.match_symbol("[")? {
                expr = self.compile_index(expr)?;
            } else if self.match_symbol(".")? {
                expr = self.compile_member(expr)?;
            } else {
                break;
            }
        }
        if expr.ty.is_array() {
            return Err(CompileError::semantic(
                format!("array '{}' must be indexed", expr.ty.name),
                expr.span,
            ));
        }
        Ok(expr)
    }
}
