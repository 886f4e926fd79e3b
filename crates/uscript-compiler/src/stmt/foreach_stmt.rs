//! `foreach Iterator(args) body`.
//!
//! Bytecode layout:
//! ```text
//!   Iterator <call> u16 end
//!   <body>
//!   IteratorNext
//! end:
//!   IteratorPop
//! ```
//! `break` jumps to the `IteratorPop`; `return` inside the body pops every
//! open iterator itself.

use uscript_core::{CompileError, Span};

use crate::bytecode::OpCode;
use crate::compiler::{ClassCompiler, Result};
use crate::expr::MAX_PRECEDENCE;
use crate::scope::NestKind;

impl ClassCompiler<'_> {
    pub(super) fn compile_foreach(&mut self, span: Span) -> Result<()> {
        self.scopes.push(NestKind::ForEach, None, span)?;
        self.code.emit_op(OpCode::Iterator);

        self.iterator_head = true;
        let head = self.compile_expr(None, MAX_PRECEDENCE, None);
        self.iterator_head = false;
        let head = head?;
        if !head.iterator {
            return Err(CompileError::semantic("'foreach' requires an iterator function call", head.span));
        }

        let end = self.code.placeholder();
        self.compile_statement()?;
        self.code.emit_op(OpCode::IteratorNext);
        self.patch_here(end, span)?;
        let pop = self.code.len();
        self.code.emit_op(OpCode::IteratorPop);
        self.close_frame(pop)
    }
}
