//! `do ... until (cond)` loops.
//!
//! Bytecode layout:
//! ```text
//! top:
//!   <body>
//!   JumpIfNot top <cond>
//! end:
//! ```

use uscript_core::Span;

use crate::bytecode::OpCode;
use crate::compiler::{ClassCompiler, Result};
use crate::scope::NestKind;

impl ClassCompiler<'_> {
    pub(super) fn compile_do_until(&mut self, span: Span) -> Result<()> {
        self.scopes.push(NestKind::Do, None, span)?;
        let top = self.here(span)?;
        self.compile_statement()?;
        self.expect_keyword("until")?;
        self.emit_jump_to(OpCode::JumpIfNot, top);
        self.compile_paren_condition()?;
        self.match_symbol(";")?;
        let end = self.code.len();
        self.close_frame(end)
    }
}
