//! Nesting stack for the statement compiler.
//!
//! One [`NestFrame`] per open construct. Each frame records which
//! statements are legal inside it, its pending forward jumps, and, for
//! function and state frames, the labels and `goto` requests that are
//! resolved when the definition closes.

use bitflags::bitflags;
use uscript_core::{CompileError, NodeIndex, Property, Span};

use crate::emit::{FixupRequest, FixupSlot};

type Result<T> = std::result::Result<T, CompileError>;

bitflags! {
    /// Statement categories a frame accepts.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
    pub struct StmtMask: u16 {
        /// Variable, function, state and enum declarations.
        const DECLARATION = 1 << 0;
        const LOCAL = 1 << 1;
        /// Executable statements.
        const COMMAND = 1 << 2;
        const LABEL = 1 << 3;
        const BREAK = 1 << 4;
        const CASE = 1 << 5;
        const RETURN = 1 << 6;
        /// `stop`, runtime `goto` and latent calls.
        const STATE_CODE = 1 << 7;
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NestKind {
    Class,
    State,
    Function,
    If,
    While,
    Do,
    For,
    ForEach,
    Switch,
}

impl NestKind {
    pub fn name(self) -> &'static str {
        match self {
            NestKind::Class => "class",
            NestKind::State => "state",
            NestKind::Function => "function",
            NestKind::If => "if",
            NestKind::While => "while",
            NestKind::Do => "do",
            NestKind::For => "for",
            NestKind::ForEach => "foreach",
            NestKind::Switch => "switch",
        }
    }

    /// Frames that own labels and `goto` requests.
    #[inline]
    pub fn is_definition(self) -> bool {
        matches!(self, NestKind::State | NestKind::Function)
    }

    /// Frames a `break` leaves.
    #[inline]
    pub fn is_breakable(self) -> bool {
        matches!(self, NestKind::While | NestKind::Do | NestKind::For | NestKind::ForEach | NestKind::Switch)
    }
}

#[derive(Clone, Debug)]
pub struct LabelRecord {
    pub name: String,
    /// Offset relative to the callable entry.
    pub offset: u16,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct NestFrame {
    pub kind: NestKind,
    pub allowed: StmtMask,
    /// Node being compiled, for definition frames.
    pub node: Option<NodeIndex>,
    pub slots: [Option<usize>; FixupSlot::COUNT],
    pub requests: Vec<FixupRequest>,
    pub labels: Vec<LabelRecord>,
    /// Type of the `switch` expression.
    pub scrutinee: Option<Property>,
    pub saw_default: bool,
    /// An executable statement was compiled; locals are no longer allowed.
    pub saw_command: bool,
    pub span: Span,
}

impl NestFrame {
    fn new(kind: NestKind, allowed: StmtMask, node: Option<NodeIndex>, span: Span) -> Self {
        Self {
            kind,
            allowed,
            node,
            slots: [None; FixupSlot::COUNT],
            requests: Vec::new(),
            labels: Vec::new(),
            scrutinee: None,
            saw_default: false,
            saw_command: false,
            span,
        }
    }

    pub fn set_slot(&mut self, slot: FixupSlot, at: usize) {
        self.slots[slot as usize] = Some(at);
    }

    pub fn take_slot(&mut self, slot: FixupSlot) -> Option<usize> {
        self.slots[slot as usize].take()
    }
}

/// Stack of open constructs, innermost last.
#[derive(Debug)]
pub struct ScopeStack {
    frames: Vec<NestFrame>,
    max_depth: usize,
}

impl ScopeStack {
    pub fn new(max_depth: usize) -> Self {
        Self {
            frames: Vec::new(),
            max_depth,
        }
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Open a construct. Statement rules derive from the enclosing frame.
    pub fn push(&mut self, kind: NestKind, node: Option<NodeIndex>, span: Span) -> Result<()> {
        if self.frames.len() >= self.max_depth {
            return Err(CompileError::NestingOverflow {
                construct: kind.name(),
                max: self.max_depth,
                span,
            });
        }
        let inherited = self.frames.last().map(|f| f.allowed).unwrap_or_default()
            - StmtMask::LOCAL
            - StmtMask::CASE
            - StmtMask::DECLARATION;
        let allowed = match kind {
            NestKind::Class => StmtMask::DECLARATION,
            NestKind::State => StmtMask::DECLARATION | StmtMask::COMMAND | StmtMask::LABEL | StmtMask::STATE_CODE,
            NestKind::Function => StmtMask::LOCAL | StmtMask::COMMAND | StmtMask::LABEL | StmtMask::RETURN,
            NestKind::If => inherited,
            NestKind::While | NestKind::Do | NestKind::For | NestKind::ForEach => inherited | StmtMask::BREAK,
            NestKind::Switch => inherited | StmtMask::BREAK | StmtMask::CASE,
        };
        self.frames.push(NestFrame::new(kind, allowed, node, span));
        Ok(())
    }

    pub fn pop(&mut self) -> Option<NestFrame> {
        self.frames.pop()
    }

    pub fn top(&self) -> Option<&NestFrame> {
        self.frames.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut NestFrame> {
        self.frames.last_mut()
    }

    /// Whether the innermost frame accepts every category in `mask`.
    pub fn allows(&self, mask: StmtMask) -> bool {
        self.top().is_some_and(|f| f.allowed.contains(mask))
    }

    fn definition_index(&self) -> Option<usize> {
        self.frames.iter().rposition(|f| f.kind.is_definition())
    }

    /// Innermost function or state frame.
    pub fn definition(&self) -> Option<&NestFrame> {
        self.definition_index().map(|i| &self.frames[i])
    }

    pub fn definition_mut(&mut self) -> Option<&mut NestFrame> {
        self.definition_index().map(|i| &mut self.frames[i])
    }

    /// Node of the innermost function or state.
    pub fn current_node(&self) -> Option<NodeIndex> {
        self.definition().and_then(|f| f.node)
    }

    pub fn in_state_code(&self) -> bool {
        self.definition().is_some_and(|f| f.kind == NestKind::State)
    }

    /// Innermost loop or switch inside the current definition.
    pub fn breakable_mut(&mut self) -> Option<&mut NestFrame> {
        let floor = self.definition_index().unwrap_or(0);
        self.frames[floor..].iter_mut().rev().find(|f| f.kind.is_breakable())
    }

    /// Open `foreach` loops inside the current definition.
    pub fn foreach_depth(&self) -> usize {
        let floor = self.definition_index().unwrap_or(0);
        self.frames[floor..].iter().filter(|f| f.kind == NestKind::ForEach).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn function_scope() -> ScopeStack {
        let mut scopes = ScopeStack::new(16);
        scopes.push(NestKind::Function, Some(NodeIndex(1)), Span::default()).unwrap();
        scopes
    }

    #[test]
    fn locals_only_at_function_level() {
        let mut scopes = function_scope();
        assert!(scopes.allows(StmtMask::LOCAL));
        scopes.push(NestKind::If, None, Span::default()).unwrap();
        assert!(!scopes.allows(StmtMask::LOCAL));
        assert!(scopes.allows(StmtMask::RETURN));
    }

    #[test]
    fn break_needs_a_loop() {
        let mut scopes = function_scope();
        assert!(!scopes.allows(StmtMask::BREAK));
        scopes.push(NestKind::While, None, Span::default()).unwrap();
        scopes.push(NestKind::If, None, Span::default()).unwrap();
        assert!(scopes.allows(StmtMask::BREAK));
        assert_eq!(scopes.breakable_mut().map(|f| f.kind), Some(NestKind::While));
    }

    #[test]
    fn case_only_directly_in_switch() {
        let mut scopes = function_scope();
        scopes.push(NestKind::Switch, None, Span::default()).unwrap();
        assert!(scopes.allows(StmtMask::CASE));
        scopes.push(NestKind::If, None, Span::default()).unwrap();
        assert!(!scopes.allows(StmtMask::CASE));
    }

    #[test]
    fn state_code_rules() {
        let mut scopes = ScopeStack::new(16);
        scopes.push(NestKind::State, Some(NodeIndex(2)), Span::default()).unwrap();
        scopes.push(NestKind::ForEach, None, Span::default()).unwrap();
        assert!(scopes.in_state_code());
        assert!(scopes.allows(StmtMask::STATE_CODE));
        assert!(!scopes.allows(StmtMask::RETURN));
        assert!(!scopes.allows(StmtMask::DECLARATION));
        assert_eq!(scopes.foreach_depth(), 1);
        assert_eq!(scopes.current_node(), Some(NodeIndex(2)));
    }

    #[test]
    fn nesting_overflow_is_reported() {
        let mut scopes = ScopeStack::new(2);
        scopes.push(NestKind::Function, None, Span::default()).unwrap();
        scopes.push(NestKind::If, None, Span::default()).unwrap();
        let err = scopes.push(NestKind::While, None, Span::default()).unwrap_err();
        assert!(matches!(err, CompileError::NestingOverflow { construct: "while", max: 2, .. }));
    }
}
