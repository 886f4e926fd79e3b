//! Braced blocks.

use crate::compiler::{ClassCompiler, Result};

impl ClassCompiler<'_> {
    /// Statements up to the closing `}`; the `{` has been consumed.
    pub(crate) fn compile_block(&mut self) -> Result<()> {
        while !self.match_symbol("}")? {
            self.compile_statement()?;
        }
        Ok(())
    }
}
