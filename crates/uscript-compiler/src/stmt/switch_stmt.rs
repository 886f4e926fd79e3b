//! `switch` with `case` and `default` labels.
//!
//! Bytecode layout:
//! ```text
//!   Switch end <scrutinee>
//!   Case next1 <value>
//!   <statements>
//! next1:
//!   Case next2 <value>
//!   <statements>
//! next2:
//!   Case 0xFFFF            ; default, emitted empty when absent
//!   <statements>
//! end:
//! ```
//! Statements fall through from one case into the next; each `Case` only
//! decides whether to enter at its label.

use uscript_core::{CompileError, Property, Span};

use crate::bytecode::{NO_TARGET, OpCode};
use crate::compiler::{ClassCompiler, Result};
use crate::emit::FixupSlot;
use crate::expr::MAX_PRECEDENCE;
use crate::scope::{NestKind, StmtMask};

impl ClassCompiler<'_> {
    pub(super) fn compile_switch(&mut self, span: Span) -> Result<()> {
        self.scopes.push(NestKind::Switch, None, span)?;

        let end_at = self.emit_jump(OpCode::Switch);
        self.frame_mut()?.set_slot(FixupSlot::End, end_at);
        self.expect_symbol("(")?;
        let start = self.lexer.here();
        let scrutinee = self.compile_expr(None, MAX_PRECEDENCE, None)?;
        if scrutinee.is_absent() {
            return Err(self.missing("switch expression", start));
        }
        self.expect_symbol(")")?;
        self.frame_mut()?.scrutinee = Some(Property::value(scrutinee.ty.ty.clone()));

        self.expect_symbol("{")?;
        loop {
            let token = self.next_plain()?;
            if token.is_symbol("}") {
                break;
            }
            if token.is_ident("case") {
                self.compile_case(token.span)?;
            } else if token.is_ident("default") && self.peek_symbol(":")? {
                self.compile_default_case(token.span)?;
            } else {
                self.lexer.unget();
                self.compile_statement()?;
            }
        }

        if let Some(next) = self.frame_mut()?.take_slot(FixupSlot::NextCase) {
            self.patch_here(next, span)?;
        }
        if !self.frame_mut()?.saw_default {
            self.emit_jump_to(OpCode::Case, NO_TARGET);
        }
        let end = self.code.len();
        if let Some(end_at) = self.frame_mut()?.take_slot(FixupSlot::End) {
            self.patch_to(end_at, end, span)?;
        }
        self.close_frame(end)
    }

    /// Close the previous case's skip jump at the current position.
    fn close_previous_case(&mut self, span: Span) -> Result<()> {
        if !self.scopes.allows(StmtMask::CASE) {
            return Err(CompileError::semantic("'case' must appear directly inside a switch", span));
        }
        let frame = self.frame_mut()?;
        if frame.saw_default {
            return Err(CompileError::semantic("'default' must be the last case of a switch", span));
        }
        if let Some(next) = frame.take_slot(FixupSlot::NextCase) {
            self.patch_here(next, span)?;
        }
        Ok(())
    }

    fn compile_case(&mut self, span: Span) -> Result<()> {
        self.close_previous_case(span)?;
        let next = self.emit_jump(OpCode::Case);
        self.frame_mut()?.set_slot(FixupSlot::NextCase, next);
        let required = self
            .frame_mut()?
            .scrutinee
            .clone()
            .ok_or_else(|| CompileError::internal("switch without scrutinee"))?;
        self.compile_required(&required, "case value")?;
        self.expect_symbol(":")?;
        Ok(())
    }

    fn compile_default_case(&mut self, span: Span) -> Result<()> {
        self.close_previous_case(span)?;
        self.expect_symbol(":")?;
        self.emit_jump_to(OpCode::Case, NO_TARGET);
        self.frame_mut()?.saw_default = true;
        Ok(())
    }
}
