//! `break`, `goto` and labels.
//!
//! A `break` records a request on the innermost loop or switch, resolved
//! when that construct closes. A `goto Label` records a request on the
//! enclosing function or state, resolved against its labels when the
//! definition closes. In state code `goto 'Label'` (a name expression)
//! compiles to a run-time `GotoLabel` instead.

use uscript_core::{CompileError, PropType, Property, Span};
use uscript_parser::TokenKind;

use crate::bytecode::OpCode;
use crate::compiler::{ClassCompiler, Result};
use crate::emit::{FixupKind, FixupRequest};
use crate::scope::{LabelRecord, StmtMask};

impl ClassCompiler<'_> {
    pub(super) fn compile_break(&mut self, span: Span) -> Result<()> {
        if !self.scopes.allows(StmtMask::BREAK) {
            return Err(CompileError::semantic("'break' outside of a loop or switch", span));
        }
        let at = self.emit_jump(OpCode::Jump);
        self.scopes
            .breakable_mut()
            .ok_or_else(|| CompileError::internal("break without a breakable frame"))?
            .requests
            .push(FixupRequest::new(FixupKind::Break, at, span));
        self.expect_symbol(";")?;
        Ok(())
    }

    pub(super) fn compile_goto(&mut self, span: Span) -> Result<()> {
        let token = self.next_plain()?;
        if let TokenKind::Identifier(label) = token.kind {
            let at = self.emit_jump(OpCode::Jump);
            self.scopes
                .definition_mut()
                .ok_or_else(|| CompileError::internal("goto outside of a definition"))?
                .requests
                .push(FixupRequest::new(FixupKind::Goto(label), at, token.span));
        } else {
            self.lexer.unget();
            if !self.scopes.in_state_code() {
                return Err(CompileError::semantic("'goto' with a name expression is only allowed in state code", span));
            }
            self.code.emit_op(OpCode::GotoLabel);
            self.compile_required(&Property::value(PropType::Name), "goto label")?;
        }
        self.expect_symbol(";")?;
        Ok(())
    }

    pub(super) fn compile_label(&mut self, name: String, span: Span) -> Result<()> {
        if !self.scopes.allows(StmtMask::LABEL) {
            return Err(CompileError::semantic("labels are not allowed here", span));
        }
        let offset = self.here(span)?;
        let def = self
            .scopes
            .definition_mut()
            .ok_or_else(|| CompileError::internal("label outside of a definition"))?;
        if def.labels.iter().any(|l| l.name.eq_ignore_ascii_case(&name)) {
            return Err(CompileError::Redefinition {
                name,
                message: "label is already defined".into(),
                span,
            });
        }
        def.labels.push(LabelRecord { name, offset, span });
        Ok(())
    }
}
