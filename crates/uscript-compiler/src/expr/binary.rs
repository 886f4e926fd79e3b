//! Binary operators and the shared operator-call splice.
//!
//! Bytecode layout for `a + b * c` with `+` at 20 and `*` at 16:
//! ```text
//! [+] a [*] b c EndFunctionParms EndFunctionParms
//! ```
//! Each operand is compiled before its operator is chosen; the chosen
//! operator's conversions and header are then moved in front of it.

use uscript_core::{CompileError, NodeRef, PropType, Property, Span};

use super::{Dispatch, ExprOutcome};
use crate::bytecode::OpCode;
use crate::compiler::{ClassCompiler, Result};
use crate::conversion::implicit_cast;
use crate::overload::OverloadMatch;
use crate::symbols::ClassTable;

impl ClassCompiler<'_> {
    /// `left op right`; `op` has been consumed.
    ///
    /// The right operand is compiled with `precedence` as its ceiling, so
    /// operators of equal precedence associate to the left.
    pub(super) fn apply_binary(
        &mut self,
        op: &str,
        candidates: &[NodeRef],
        precedence: u8,
        left: ExprOutcome,
        span: Span,
    ) -> Result<ExprOutcome> {
        let right = self.compile_expr(None, precedence, left.enum_hint.as_deref())?;
        if right.is_absent() {
            return Err(self.missing(&format!("right operand of '{op}'"), span));
        }
        let chosen = self.resolve_operator(op, candidates, &[&left.ty, &right.ty], span)?;
        self.finish_operator(chosen, vec![left, right], span)
    }

    /// Splice conversions and the operator header around compiled operands.
    pub(super) fn finish_operator(
        &mut self,
        chosen: OverloadMatch,
        operands: Vec<ExprOutcome>,
        span: Span,
    ) -> Result<ExprOutcome> {
        let node = self
            .node(chosen.node)
            .cloned()
            .ok_or_else(|| CompileError::internal(format!("dangling operator {}", chosen.node)))?;

        for (param, operand) in chosen.params.iter().zip(&operands) {
            if param.is_out() && !operand.is_writable() {
                return Err(CompileError::semantic(
                    format!("operand of '{}' must be a writable variable", node.name),
                    operand.span,
                ));
            }
        }
        // Later operands first, so earlier start positions stay valid.
        for (param, operand) in chosen.params.iter().zip(&operands).rev() {
            if let Some(cast) = implicit_cast(&param.ty, &operand.ty.ty) {
                self.insert_cast(cast, operand.start);
            }
        }
        self.note_dependency(chosen.node.class);

        let start = operands.first().map(|o| o.start).unwrap_or_else(|| self.code.len());
        let header = self.code.len();
        // Operators always bind statically.
        self.emit_call_header(chosen.node, &node, Dispatch::Super, span)?;
        self.code.move_tail(header, start);
        self.code.emit_op(OpCode::EndFunctionParms);

        let ret = self.return_value(chosen.node).map(|p| p.ty).unwrap_or(PropType::None);
        let mut expr = ExprOutcome::value(ret, start, span);
        expr.has_effect = chosen.params.iter().any(Property::is_out) || node.native_index.is_none();
        Ok(expr)
    }
}
