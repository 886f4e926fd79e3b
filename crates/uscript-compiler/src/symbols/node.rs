//! Call-stack nodes: the class, its states, functions and operators.

use bitflags::bitflags;
use uscript_core::{NodeIndex, NodeRef, PropIndex, Span};
use uscript_parser::SourcePos;

bitflags! {
    /// Declaration modifiers and compile state of a node.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
    pub struct NodeFlags: u16 {
        const FINAL = 1 << 0;
        const PRIVATE = 1 << 1;
        const STATIC = 1 << 2;
        /// Suspends the calling state; callable from state code only.
        const LATENT = 1 << 3;
        /// Callable only as the head of a `foreach`.
        const ITERATOR = 1 << 4;
        const SIMULATED = 1 << 5;
        const INTRINSIC = 1 << 6;
        const EVENT = 1 << 7;
        /// Initial state of the class.
        const AUTO = 1 << 8;
        /// A body was compiled for this node.
        const DEFINED = 1 << 9;
    }
}

/// Which of the three operator forms a node declares.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum OperatorKind {
    Binary,
    Pre,
    Post,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NodeKind {
    Class,
    State,
    Function,
    /// Binary operator; a lower precedence binds tighter.
    Operator { precedence: u8 },
    PreOperator,
    PostOperator,
}

impl NodeKind {
    pub fn operator_kind(self) -> Option<OperatorKind> {
        match self {
            NodeKind::Operator { .. } => Some(OperatorKind::Binary),
            NodeKind::PreOperator => Some(OperatorKind::Pre),
            NodeKind::PostOperator => Some(OperatorKind::Post),
            _ => None,
        }
    }

    #[inline]
    pub fn is_operator(self) -> bool {
        self.operator_kind().is_some()
    }

    /// Functions and operators; the nodes a call can target.
    #[inline]
    pub fn is_callable(self) -> bool {
        matches!(self, NodeKind::Function) || self.is_operator()
    }

    pub fn precedence(self) -> Option<u8> {
        match self {
            NodeKind::Operator { precedence } => Some(precedence),
            _ => None,
        }
    }
}

/// Location of a callable's bytecode in the class code buffer.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct CodeRange {
    pub start: u32,
    pub len: u32,
}

impl CodeRange {
    pub fn as_range(self) -> std::ops::Range<usize> {
        self.start as usize..(self.start + self.len) as usize
    }
}

/// A scope-bearing declaration.
///
/// Nodes are arena entries in their class; `outer` and `children` are
/// indices into the same arena, `parent_item` points at the overridden
/// declaration in an ancestor class.
#[derive(Clone, Debug)]
pub struct StackNode {
    pub name: String,
    pub kind: NodeKind,
    pub flags: NodeFlags,
    pub outer: Option<NodeIndex>,
    pub children: Vec<NodeIndex>,
    pub parent_item: Option<NodeRef>,
    /// Parameters in declaration order, excluding the return value.
    pub params: Vec<PropIndex>,
    pub return_prop: Option<PropIndex>,
    pub locals: Vec<PropIndex>,
    pub frame_size: u16,
    pub native_index: Option<u16>,
    /// Where pass 1 resumes: the body's `{`, or the first state label.
    pub body: Option<SourcePos>,
    pub code: Option<CodeRange>,
    pub span: Span,
}

impl StackNode {
    pub fn new(name: impl Into<String>, kind: NodeKind, span: Span) -> Self {
        Self {
            name: name.into(),
            kind,
            flags: NodeFlags::empty(),
            outer: None,
            children: Vec::new(),
            parent_item: None,
            params: Vec::new(),
            return_prop: None,
            locals: Vec::new(),
            frame_size: 0,
            native_index: None,
            body: None,
            code: None,
            span,
        }
    }

    #[inline]
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Bound statically: no virtual lookup at run time.
    #[inline]
    pub fn is_final(&self) -> bool {
        self.flags.intersects(NodeFlags::FINAL | NodeFlags::PRIVATE)
    }

    /// Calls dispatch to a native entry point instead of bytecode.
    pub fn native_call(&self) -> Option<u16> {
        self.native_index.filter(|_| self.flags.contains(NodeFlags::FINAL) || self.kind.is_operator())
    }

    /// Parameters, return value, then locals.
    pub fn frame(&self) -> impl Iterator<Item = PropIndex> + '_ {
        self.params.iter().chain(self.return_prop.iter()).chain(self.locals.iter()).copied()
    }
}
