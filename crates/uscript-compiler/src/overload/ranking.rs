//! Cost-based ranking for overload resolution.

use uscript_core::{CompileError, Span};

use super::OverloadMatch;

/// Select the unique lowest-cost candidate.
///
/// `describe` renders a candidate for the ambiguity message. The caller
/// guarantees at least one candidate is compatible.
pub(crate) fn find_best_match(
    op: &str,
    scored: &[OverloadMatch],
    span: Span,
    describe: impl Fn(&OverloadMatch) -> String,
) -> Result<OverloadMatch, CompileError> {
    let best_cost = scored
        .iter()
        .map(|m| m.cost)
        .min()
        .ok_or_else(|| CompileError::internal("overload resolution with no candidates"))?;

    let mut best = scored.iter().filter(|m| m.cost == best_cost);
    let Some(first) = best.next() else {
        return Err(CompileError::internal("overload resolution lost its best candidate"));
    };
    let rest: Vec<&OverloadMatch> = best.collect();
    if rest.is_empty() {
        return Ok(first.clone());
    }

    let candidates: Vec<String> = std::iter::once(first).chain(rest).map(describe).collect();
    Err(CompileError::AmbiguousOperator {
        op: op.to_string(),
        candidates: candidates.join(" and "),
        span,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::ConversionCost;
    use uscript_core::{ClassId, NodeIndex, NodeRef, PropType, Property};

    fn candidate(node: u16, cost: u32) -> OverloadMatch {
        OverloadMatch {
            node: NodeRef::new(ClassId(0), NodeIndex(node)),
            params: vec![Property::value(PropType::Int), Property::value(PropType::Int)],
            cost: ConversionCost(cost),
        }
    }

    fn describe(m: &OverloadMatch) -> String {
        format!("+(#{})", m.node.node.0)
    }

    #[test]
    fn lowest_cost_wins() {
        let scored = [candidate(1, 102), candidate(2, 101), candidate(3, u32::MAX)];
        let best = find_best_match("+", &scored, Span::default(), describe).unwrap();
        assert_eq!(best.node.node, NodeIndex(2));
    }

    #[test]
    fn tie_at_best_is_ambiguous() {
        let scored = [candidate(1, 101), candidate(2, 101), candidate(3, 0xFFFF)];
        let err = find_best_match("+", &scored, Span::default(), describe).unwrap_err();
        match err {
            CompileError::AmbiguousOperator { op, candidates, .. } => {
                assert_eq!(op, "+");
                assert_eq!(candidates, "+(#1) and +(#2)");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn tie_above_best_is_fine() {
        let scored = [candidate(1, 104), candidate(2, 104), candidate(3, 1)];
        assert!(find_best_match("+", &scored, Span::default(), describe).is_ok());
    }
}
