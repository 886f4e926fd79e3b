//! `if` / `else if` / `else`.
//!
//! Bytecode layout:
//! ```text
//!   JumpIfNot next <cond>
//!   <then>
//!   Jump end              ; only when an else follows
//! next:
//!   <else or next link of the chain>
//! end:
//! ```
//! Every link of an `else if` chain shares the frame, so all exit jumps
//! land on the same `end`.

use uscript_core::{CompileError, Span};

use crate::bytecode::OpCode;
use crate::compiler::{ClassCompiler, Result};
use crate::emit::{FixupKind, FixupRequest, FixupSlot};
use crate::scope::NestKind;

impl ClassCompiler<'_> {
    pub(super) fn compile_if(&mut self, span: Span) -> Result<()> {
        self.scopes.push(NestKind::If, None, span)?;
        loop {
            let next = self.emit_jump(OpCode::JumpIfNot);
            self.frame_mut()?.set_slot(FixupSlot::Condition, next);
            self.compile_paren_condition()?;
            self.compile_statement()?;

            let has_else = self.match_keyword("else")?;
            if has_else {
                let exit = self.emit_jump(OpCode::Jump);
                self.frame_mut()?.requests.push(FixupRequest::new(FixupKind::IfExit, exit, span));
            }
            let next = self
                .frame_mut()?
                .take_slot(FixupSlot::Condition)
                .ok_or_else(|| CompileError::internal("if condition jump lost"))?;
            self.patch_here(next, span)?;

            if !has_else {
                break;
            }
            if !self.match_keyword("if")? {
                self.compile_statement()?;
                break;
            }
        }
        let end = self.code.len();
        self.close_frame(end)
    }
}
