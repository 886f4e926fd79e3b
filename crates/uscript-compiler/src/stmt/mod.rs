//! Statement compiler.
//!
//! Statements are read token by token from the body of the function or
//! state being compiled. Control-flow statements push a
//! [`NestFrame`](crate::scope::NestFrame) that records what may appear
//! inside them and collects the forward jumps patched when they close.

mod block;
mod do_until_stmt;
mod for_stmt;
mod foreach_stmt;
mod if_stmt;
mod jumps;
mod return_stmt;
mod switch_stmt;
mod var_decl;
mod while_stmt;

use uscript_core::{CompileError, PropType, Property, Span};
use uscript_parser::TokenKind;

use crate::bytecode::OpCode;
use crate::compiler::{ClassCompiler, Result};
use crate::emit::FixupKind;
use crate::expr::MAX_PRECEDENCE;
use crate::scope::{NestFrame, StmtMask};

impl ClassCompiler<'_> {
    /// Compile one statement.
    pub(crate) fn compile_statement(&mut self) -> Result<()> {
        let before = self.lexer.position();
        let token = self.next_plain()?;
        let span = token.span;

        let keyword = match &token.kind {
            TokenKind::Eof => return Err(CompileError::expected("statement", "end of file", span)),
            TokenKind::Symbol("{") => {
                self.begin_command(span)?;
                return self.compile_block();
            }
            TokenKind::Symbol(";") => return Ok(()),
            TokenKind::Identifier(word) => word.to_ascii_lowercase(),
            _ => String::new(),
        };

        match keyword.as_str() {
            "local" => return self.compile_local(span),
            "case" => return Err(CompileError::semantic("'case' outside of a switch", span)),
            "default" if self.peek_symbol(":")? => {
                return Err(CompileError::semantic("'default' outside of a switch", span));
            }
            _ => {}
        }

        self.begin_command(span)?;
        match keyword.as_str() {
            "if" => self.compile_if(span),
            "while" => self.compile_while(span),
            "do" => self.compile_do_until(span),
            "for" => self.compile_for(span),
            "foreach" => self.compile_foreach(span),
            "switch" => self.compile_switch(span),
            "return" => self.compile_return(span),
            "stop" => self.compile_stop(span),
            "break" => self.compile_break(span),
            "goto" => self.compile_goto(span),
            _ => {
                if let TokenKind::Identifier(name) = token.kind
                    && self.match_symbol(":")?
                {
                    return self.compile_label(name, span);
                }
                self.lexer.seek(before);
                self.compile_expression_statement(";")
            }
        }
    }

    /// Executable statements end the local-declaration prologue.
    fn begin_command(&mut self, span: Span) -> Result<()> {
        if !self.scopes.allows(StmtMask::COMMAND) {
            return Err(CompileError::semantic("statement not allowed here", span));
        }
        if let Some(def) = self.scopes.definition_mut() {
            def.saw_command = true;
        }
        Ok(())
    }

    /// An assignment, or an expression with a side effect, then `terminator`.
    pub(super) fn compile_expression_statement(&mut self, terminator: &str) -> Result<()> {
        let span = self.lexer.here();
        let target = self.compile_expr(None, MAX_PRECEDENCE, None)?;
        if target.is_absent() {
            return Err(self.missing("statement", span));
        }
        if self.match_symbol("=")? {
            if !target.lvalue {
                return Err(CompileError::semantic("left side of '=' is not assignable", target.span));
            }
            if target.is_const {
                return Err(CompileError::semantic(
                    format!("cannot assign to const '{}'", target.ty.name),
                    target.span,
                ));
            }
            let op = if target.ty.ty == PropType::Bool { OpCode::LetBool } else { OpCode::Let };
            let header = self.code.len();
            self.code.emit_op(op);
            self.code.move_tail(header, target.start);
            self.compile_required(&Property::value(target.ty.ty.clone()), "right side of '='")?;
        } else if !target.has_effect {
            return Err(CompileError::semantic("expression has no effect", target.span));
        }
        self.expect_symbol(terminator)?;
        Ok(())
    }

    /// `( bool-expression )`.
    pub(super) fn compile_paren_condition(&mut self) -> Result<()> {
        self.expect_symbol("(")?;
        self.compile_required(&Property::value(PropType::Bool), "condition")?;
        self.expect_symbol(")")?;
        Ok(())
    }

    pub(super) fn frame_mut(&mut self) -> Result<&mut NestFrame> {
        self.scopes
            .top_mut()
            .ok_or_else(|| CompileError::internal("statement compiled outside of any scope"))
    }

    /// Pop the innermost frame and point its `break` and if-exit jumps at
    /// absolute position `target`.
    pub(super) fn close_frame(&mut self, target: usize) -> Result<()> {
        let frame = self
            .scopes
            .pop()
            .ok_or_else(|| CompileError::internal("scope stack underflow"))?;
        for request in frame.requests {
            match request.kind {
                FixupKind::Break | FixupKind::IfExit => self.patch_to(request.at, target, request.span)?,
                FixupKind::Goto(_) => {
                    return Err(CompileError::internal("goto request recorded outside a definition frame"));
                }
            }
        }
        Ok(())
    }
}
