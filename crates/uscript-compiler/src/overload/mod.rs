//! Operator overload resolution.
//!
//! Each candidate is scored by the worst conversion any operand needs; the
//! lowest score wins and a tie at the lowest score is an error. When no
//! candidate accepts the operands, the error names the side at fault.

mod ranking;

pub(crate) use ranking::find_best_match;

use uscript_core::{CompileError, NodeRef, OperandSide, Property, Span};

use crate::compiler::{ClassCompiler, Result};
use crate::conversion::{ConversionCost, conversion_cost};
use crate::symbols::ClassTable;

/// A candidate with its declared parameters and score.
#[derive(Debug, Clone)]
pub struct OverloadMatch {
    pub node: NodeRef,
    pub params: Vec<Property>,
    pub cost: ConversionCost,
}

impl ClassCompiler<'_> {
    /// Pick the operator among `candidates` that best accepts `operands`.
    pub(crate) fn resolve_operator(
        &self,
        op: &str,
        candidates: &[NodeRef],
        operands: &[&Property],
        span: Span,
    ) -> Result<OverloadMatch> {
        let scored: Vec<OverloadMatch> = candidates
            .iter()
            .map(|&node| {
                let params = self.params(node);
                let cost = signature_cost(self, &params, operands);
                OverloadMatch { node, params, cost }
            })
            .collect();

        if !scored.iter().any(|m| m.cost.is_compatible()) {
            return Err(CompileError::IncompatibleOperands {
                op: op.to_string(),
                side: self.blame_side(&scored, operands),
                span,
            });
        }

        find_best_match(op, &scored, span, |m| self.describe_signature(op, m))
    }

    /// Which operand no candidate could accept.
    fn blame_side(&self, scored: &[OverloadMatch], operands: &[&Property]) -> OperandSide {
        if operands.len() == 1 {
            return OperandSide::Operand;
        }
        let accepts = |side: usize| {
            scored.iter().any(|m| {
                m.params.len() == operands.len() && conversion_cost(&m.params[side], operands[side], self).is_compatible()
            })
        };
        match (accepts(0), accepts(1)) {
            (false, true) => OperandSide::Left,
            (true, false) => OperandSide::Right,
            _ => OperandSide::Both,
        }
    }

    fn describe_signature(&self, op: &str, m: &OverloadMatch) -> String {
        let params: Vec<String> = m.params.iter().map(|p| p.ty.to_string()).collect();
        format!("{op}({}) in {}", params.join(", "), self.class_name(m.node.class))
    }
}

/// The worst conversion cost over all operands.
pub(crate) fn signature_cost<T: ClassTable>(table: &T, params: &[Property], operands: &[&Property]) -> ConversionCost {
    if params.len() != operands.len() {
        return ConversionCost::INCOMPATIBLE;
    }
    params
        .iter()
        .zip(operands)
        .map(|(param, &operand)| conversion_cost(param, operand, table))
        .max()
        .unwrap_or(ConversionCost::IDENTICAL)
}
