//! `local` declarations.

use uscript_core::{Bin, CompileError, Property, Span};

use crate::compiler::{ClassCompiler, Result};
use crate::scope::StmtMask;

impl ClassCompiler<'_> {
    /// `local Type A, B[4];` allocates frame slots after the parameters.
    pub(super) fn compile_local(&mut self, span: Span) -> Result<()> {
        if !self.scopes.allows(StmtMask::LOCAL) {
            return Err(CompileError::semantic("'local' is only allowed at the top of a function body", span));
        }
        if self.scopes.definition().is_some_and(|f| f.saw_command) {
            return Err(CompileError::semantic("local declarations must come before any statements", span));
        }
        let node = self
            .scopes
            .current_node()
            .ok_or_else(|| CompileError::internal("local outside of a function"))?;

        let (ty, _) = self.parse_type()?;
        loop {
            let (name, name_span) = self.expect_ident()?;
            let dim = self.parse_array_dim()?;
            if self.symbols.find_frame_var(node, &name).is_some() {
                return Err(CompileError::Redefinition {
                    name,
                    message: "is already declared in this function".into(),
                    span: name_span,
                });
            }

            let frame_size = self.symbols.node(node).map(|n| n.frame_size).unwrap_or(0);
            let mut prop = Property::new(name, ty.clone()).with_bin(Bin::Frame).with_dim(dim);
            prop.offset = frame_size;
            let end = frame_size
                .checked_add(prop.size())
                .ok_or_else(|| CompileError::semantic("local variables exceed the frame size limit", name_span))?;
            let index = self.symbols.add_property(prop);
            if let Some(n) = self.symbols.node_mut(node) {
                n.locals.push(index);
                n.frame_size = end;
            }

            if !self.match_symbol(",")? {
                break;
            }
        }
        self.expect_symbol(";")?;
        Ok(())
    }
}
