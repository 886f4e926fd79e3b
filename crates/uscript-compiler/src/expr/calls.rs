//! Function calls.
//!
//! Bytecode layout:
//! ```text
//! <header> <arg>* EndFunctionParms
//!
//! header = Native u16 index                 intrinsic final functions, operators
//!        | FinalFunction u16 class u16 node  Super calls, final/private functions
//!        | GlobalFunction u16 name           Global.F, skips state overrides
//!        | VirtualFunction u16 name          everything else
//! ```
//!
//! Omitted optional arguments compile to `Nothing`.

use uscript_core::{CompileError, NodeRef, PropType, PropertyFlags, Span};

use super::ExprOutcome;
use crate::bytecode::OpCode;
use crate::compiler::{ClassCompiler, Result};
use crate::symbols::{ClassTable, NodeFlags, StackNode};

/// How a call was written, which decides its header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dispatch {
    /// `F(...)` resolved through the current scope.
    Plain,
    /// `Super.F(...)` or `Super(Class).F(...)`.
    Super,
    /// `Global.F(...)`.
    Global,
    /// `Obj.F(...)`.
    Context,
}

impl ClassCompiler<'_> {
    /// Compile a call to `target`; the next token must be `(`.
    pub(crate) fn compile_call(
        &mut self,
        target: NodeRef,
        dispatch: Dispatch,
        start: usize,
        span: Span,
    ) -> Result<ExprOutcome> {
        let node = self
            .node(target)
            .cloned()
            .ok_or_else(|| CompileError::internal(format!("dangling call target {target}")))?;
        let is_head = std::mem::take(&mut self.iterator_head);

        if node.flags.contains(NodeFlags::ITERATOR) && !is_head {
            return Err(CompileError::semantic(
                format!("iterator function '{}' can only be called as a foreach head", node.name),
                span,
            ));
        }
        if node.flags.contains(NodeFlags::LATENT) && !self.scopes.in_state_code() {
            return Err(CompileError::semantic(
                format!("latent function '{}' can only be called from state code", node.name),
                span,
            ));
        }
        if node.flags.contains(NodeFlags::PRIVATE) && target.class != self.this {
            return Err(CompileError::semantic(
                format!("'{}' is private to class '{}'", node.name, self.class_name(target.class)),
                span,
            ));
        }
        self.note_dependency(target.class);

        self.emit_call_header(target, &node, dispatch, span)?;
        self.expect_symbol("(")?;
        self.compile_arguments(target, &node)?;
        self.expect_symbol(")")?;
        self.code.emit_op(OpCode::EndFunctionParms);

        let ret = self.return_value(target).map(|p| p.ty).unwrap_or(PropType::None);
        let mut expr = ExprOutcome::value(ret, start, span);
        expr.has_effect = true;
        expr.iterator = node.flags.contains(NodeFlags::ITERATOR);
        Ok(expr)
    }

    pub(crate) fn emit_call_header(
        &mut self,
        target: NodeRef,
        node: &StackNode,
        dispatch: Dispatch,
        span: Span,
    ) -> Result<()> {
        if let Some(index) = node.native_call() {
            self.code.emit_op(OpCode::Native);
            self.code.emit_u16(index);
            return Ok(());
        }
        match dispatch {
            Dispatch::Global => {
                let name = self.intern(&node.name, span)?;
                self.code.emit_op(OpCode::GlobalFunction);
                self.code.emit_u16(name);
            }
            Dispatch::Super => self.emit_final_header(target, span)?,
            Dispatch::Plain | Dispatch::Context if node.is_final() => self.emit_final_header(target, span)?,
            Dispatch::Plain | Dispatch::Context => {
                let name = self.intern(&node.name, span)?;
                self.code.emit_op(OpCode::VirtualFunction);
                self.code.emit_u16(name);
            }
        }
        Ok(())
    }

    fn emit_final_header(&mut self, target: NodeRef, span: Span) -> Result<()> {
        let owner = self.class_name(target.class).to_string();
        let owner = self.intern(&owner, span)?;
        self.code.emit_op(OpCode::FinalFunction);
        self.code.emit_u16(owner);
        self.code.emit_u16(target.node.0);
        Ok(())
    }

    /// Arguments up to, not including, the closing `)`.
    fn compile_arguments(&mut self, target: NodeRef, node: &StackNode) -> Result<()> {
        let params = self.params(target);
        let iterator = node.flags.contains(NodeFlags::ITERATOR);
        let mut class_literal: Option<String> = None;

        for (i, param) in params.iter().enumerate() {
            if i > 0 && !self.peek_symbol(")")? {
                self.expect_symbol(",")?;
            }
            if self.peek_symbol(",")? || self.peek_symbol(")")? {
                if !param.flags.contains(PropertyFlags::OPTIONAL_PARM) {
                    let span = self.lexer.here();
                    return Err(CompileError::semantic(
                        format!("call to '{}' is missing parameter '{}'", node.name, param.name),
                        span,
                    ));
                }
                self.code.emit_op(OpCode::Nothing);
                continue;
            }

            let mut expected = param.clone();
            if iterator
                && i == 1
                && let Some(class) = &class_literal
                && let Some(declared) = param.ty.class_name()
            {
                self.check_iterator_class(class, declared)?;
                expected.ty = PropType::object(class.clone());
            }

            let what = format!("parameter '{}' of '{}'", param.name, node.name);
            let arg = self.compile_required(&expected, &what)?;
            if param.is_out() && !arg.is_writable() {
                return Err(CompileError::semantic(format!("{what} must be a writable variable"), arg.span));
            }
            if i == 0 {
                class_literal = arg.class_literal;
            }
        }

        if !self.peek_symbol(")")? {
            let token = self.next_plain()?;
            return Err(CompileError::semantic(
                format!("too many parameters in call to '{}'", node.name),
                token.span,
            ));
        }
        Ok(())
    }

    /// The class literal given to an iterator must derive from the declared
    /// type of its output parameter.
    fn check_iterator_class(&self, literal: &str, declared: &str) -> Result<()> {
        let (Some(literal_id), Some(declared_id)) = (self.find_class(literal), self.find_class(declared)) else {
            return Ok(());
        };
        if self.is_child_of(literal_id, declared_id) {
            Ok(())
        } else {
            Err(CompileError::mismatch(
                format!("class '{literal}' is not a '{declared}'"),
                self.lexer.here(),
            ))
        }
    }
}
