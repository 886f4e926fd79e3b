//! `while` loops.
//!
//! Bytecode layout:
//! ```text
//! top:
//!   JumpIfNot end <cond>
//!   <body>
//!   Jump top
//! end:
//! ```

use uscript_core::Span;

use crate::bytecode::OpCode;
use crate::compiler::{ClassCompiler, Result};
use crate::scope::NestKind;

impl ClassCompiler<'_> {
    pub(super) fn compile_while(&mut self, span: Span) -> Result<()> {
        self.scopes.push(NestKind::While, None, span)?;
        let top = self.here(span)?;
        let exit = self.emit_jump(OpCode::JumpIfNot);
        self.compile_paren_condition()?;
        self.compile_statement()?;
        self.emit_jump_to(OpCode::Jump, top);
        self.patch_here(exit, span)?;
        let end = self.code.len();
        self.close_frame(end)
    }
}
