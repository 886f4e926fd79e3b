//! Prefix and postfix operators.

use uscript_core::{NodeRef, Span};

use super::ExprOutcome;
use crate::compiler::{ClassCompiler, Result};

impl ClassCompiler<'_> {
    /// `op operand`; `op` has been consumed. The operand takes no binary
    /// operators, only its own selectors and postfix operators.
    pub(super) fn apply_prefix(
        &mut self,
        op: &str,
        candidates: &[NodeRef],
        hint: Option<&str>,
        start: usize,
        span: Span,
    ) -> Result<ExprOutcome> {
        let operand = self.compile_expr(None, 0, hint)?;
        if operand.is_absent() {
            return Err(self.missing(&format!("operand of '{op}'"), span));
        }
        let chosen = self.resolve_operator(op, candidates, &[&operand.ty], span)?;
        let mut expr = self.finish_operator(chosen, vec![operand], span)?;
        expr.start = start;
        Ok(expr)
    }

    /// `operand op`; `op` has been consumed.
    pub(super) fn apply_postfix(
        &mut self,
        op: &str,
        candidates: &[NodeRef],
        operand: ExprOutcome,
        span: Span,
    ) -> Result<ExprOutcome> {
        let chosen = self.resolve_operator(op, candidates, &[&operand.ty], span)?;
        self.finish_operator(chosen, vec![operand], span)
    }
}
