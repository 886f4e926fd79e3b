//! `return` and `stop`.
//!
//! Bytecode layout:
//! ```text
//!   IteratorPop * open foreach loops
//!   Return <value | Nothing>
//!
//!   Stop
//! ```

use uscript_core::{CompileError, Property, Span};

use crate::bytecode::OpCode;
use crate::compiler::{ClassCompiler, Result};
use crate::scope::StmtMask;

impl ClassCompiler<'_> {
    pub(super) fn compile_return(&mut self, span: Span) -> Result<()> {
        if !self.scopes.allows(StmtMask::RETURN) {
            return Err(CompileError::semantic("'return' is not allowed in state code", span));
        }
        for _ in 0..self.scopes.foreach_depth() {
            self.code.emit_op(OpCode::IteratorPop);
        }
        self.code.emit_op(OpCode::Return);

        let value = self
            .scopes
            .current_node()
            .and_then(|node| self.symbols.return_prop(node))
            .map(|ret| Property::value(ret.ty.clone()));
        match value {
            Some(required) => {
                self.compile_required(&required, "return value")?;
            }
            None => {
                if !self.peek_symbol(";")? {
                    return Err(CompileError::semantic("function does not return a value", span));
                }
                self.code.emit_op(OpCode::Nothing);
            }
        }
        self.expect_symbol(";")?;
        Ok(())
    }

    pub(super) fn compile_stop(&mut self, span: Span) -> Result<()> {
        if !self.scopes.in_state_code() {
            return Err(CompileError::semantic("'stop' is only allowed in state code", span));
        }
        self.code.emit_op(OpCode::Stop);
        self.expect_symbol(";")?;
        Ok(())
    }
}
