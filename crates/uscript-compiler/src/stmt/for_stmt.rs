//! `for (init; cond; step)` loops.
//!
//! Bytecode layout:
//! ```text
//!   <init>
//! top:
//!   JumpIfNot end <cond>
//!   <body>
//!   <step>
//!   Jump top
//! end:
//! ```
//! The step is written before the body in source but emitted after it, so
//! its tokens are skipped on the first read and compiled on a second visit.

use uscript_core::{CompileError, PropType, Property, Span};

use crate::bytecode::OpCode;
use crate::compiler::{ClassCompiler, Result};
use crate::scope::NestKind;

impl ClassCompiler<'_> {
    pub(super) fn compile_for(&mut self, span: Span) -> Result<()> {
        self.scopes.push(NestKind::For, None, span)?;
        self.expect_symbol("(")?;
        self.compile_expression_statement(";")?;

        let top = self.here(span)?;
        let exit = self.emit_jump(OpCode::JumpIfNot);
        self.compile_required(&Property::value(PropType::Bool), "for condition")?;
        self.expect_symbol(";")?;

        let step = self.lexer.position();
        self.skip_past_close_paren(span)?;
        self.compile_statement()?;
        let resume = self.lexer.position();
        self.lexer.seek(step);
        self.compile_expression_statement(")")?;
        self.lexer.seek(resume);

        self.emit_jump_to(OpCode::Jump, top);
        self.patch_here(exit, span)?;
        let end = self.code.len();
        self.close_frame(end)
    }

    fn skip_past_close_paren(&mut self, span: Span) -> Result<()> {
        let mut depth = 1usize;
        while depth > 0 {
            let token = self.next_plain()?;
            if token.is_eof() {
                return Err(CompileError::expected("')'", "end of file", span));
            }
            if token.is_symbol("(") {
                depth += 1;
            } else if token.is_symbol(")") {
                depth -= 1;
            }
        }
        Ok(())
    }
}
