//! Forward-jump bookkeeping.

use uscript_core::Span;

/// Per-frame slots for forward jumps whose target is the frame's own
/// structure (the false branch of an `if`, the next `case`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum FixupSlot {
    /// Pending `JumpIfNot` of the innermost condition.
    Condition = 0,
    /// Pending `Case` operand waiting for the following case.
    NextCase = 1,
    /// End-of-construct operand (`Switch`, `Iterator`).
    End = 2,
}

impl FixupSlot {
    pub const COUNT: usize = 3;
}

/// What a deferred jump is waiting for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixupKind {
    /// `break`, resolved when the enclosing loop or switch closes.
    Break,
    /// Jump past the remaining branches of an if/else chain.
    IfExit,
    /// `goto Label`, resolved when the enclosing function or state closes.
    Goto(String),
}

/// A 2-byte placeholder waiting for a jump target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixupRequest {
    pub kind: FixupKind,
    /// Absolute position of the placeholder in the class code buffer.
    pub at: usize,
    pub span: Span,
}

impl FixupRequest {
    pub fn new(kind: FixupKind, at: usize, span: Span) -> Self {
        Self { kind, at, span }
    }
}
