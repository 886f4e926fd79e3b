//! Identifier primands: `self`, `Default.`, `Super`, `Global.`, variables,
//! calls and type casts.

use uscript_core::{Bin, CompileError, PropType, Property, PropertyFlags, Span};

use super::{Dispatch, ExprOutcome};
use crate::bytecode::OpCode;
use crate::compiler::{ClassCompiler, Result, keyword_type};
use crate::symbols::ClassTable;

impl ClassCompiler<'_> {
    /// Compile a primand that starts with identifier `word`.
    ///
    /// Returns `None` when the word names nothing an expression can start
    /// with, so the caller can try it as a prefix operator.
    pub(super) fn compile_identifier(
        &mut self,
        word: &str,
        hint: Option<&str>,
        start: usize,
        span: Span,
    ) -> Result<Option<ExprOutcome>> {
        match word.to_ascii_lowercase().as_str() {
            "self" => {
                self.code.emit_op(OpCode::SelfObject);
                let class = self.symbols.name.clone();
                return Ok(Some(ExprOutcome::value(PropType::object(class), start, span)));
            }
            "default" => return self.compile_default(start, span).map(Some),
            "super" => return self.compile_super(start, span).map(Some),
            "global" => {
                self.expect_symbol(".")?;
                let (name, name_span) = self.expect_ident()?;
                let target = self
                    .find_class_function(self.this, &name)
                    .ok_or(CompileError::UnknownIdentifier { name, span: name_span })?;
                return self.compile_call(target, Dispatch::Global, start, name_span).map(Some);
            }
            _ => {}
        }

        if let Some(ty) = keyword_type(word)
            && !word.eq_ignore_ascii_case("class")
            && self.match_symbol("(")?
        {
            return self.compile_conversion_cast(ty, hint, start, span).map(Some);
        }

        if let Some(prop) = self.find_variable(word) {
            return Ok(Some(self.emit_variable(&prop, start, span)));
        }

        if self.peek_symbol("(")? {
            if let Some(target) = self.find_function(self.this, self.current_state(), word) {
                return self.compile_call(target, Dispatch::Plain, start, span).map(Some);
            }
            if let Some(def) = self.find_enum(self.this, word) {
                let ty = PropType::Enum(def.name.clone());
                self.expect_symbol("(")?;
                return self.compile_conversion_cast(ty, hint, start, span).map(Some);
            }
            if let Some(class) = self.find_class(word) {
                self.expect_symbol("(")?;
                return self.compile_dynamic_cast(class, start, span).map(Some);
            }
        }
        Ok(None)
    }

    /// Emit a variable reference.
    pub(super) fn emit_variable(&mut self, prop: &Property, start: usize, span: Span) -> ExprOutcome {
        let op = match prop.bin {
            Bin::Frame => OpCode::LocalVariable,
            Bin::Instance => OpCode::InstanceVariable,
            Bin::Static => OpCode::StaticVariable,
        };
        self.code.emit_op(op);
        let operand = self.code.len();
        self.code.emit_u16(prop.offset);
        self.variable_outcome(prop, operand, start, span)
    }

    fn variable_outcome(&self, prop: &Property, operand: usize, start: usize, span: Span) -> ExprOutcome {
        let mut expr = ExprOutcome::value(prop.ty.clone(), start, span);
        expr.ty = prop.clone();
        expr.lvalue = true;
        expr.is_const = prop.flags.contains(PropertyFlags::CONST);
        expr.var_operand = Some(operand);
        expr
    }

    /// `Default.Var`: the class-default value of an instance variable.
    fn compile_default(&mut self, start: usize, span: Span) -> Result<ExprOutcome> {
        self.expect_symbol(".")?;
        let (name, name_span) = self.expect_ident()?;
        let prop = self
            .find_member_variable(self.this, &name)
            .filter(|p| p.bin == Bin::Instance)
            .ok_or(CompileError::UnknownIdentifier { name, span: name_span })?;
        self.code.emit_op(OpCode::DefaultVariable);
        let operand = self.code.len();
        self.code.emit_u16(prop.offset);
        Ok(self.variable_outcome(&prop, operand, start, span))
    }

    /// `Super.F(...)` or `Super(Class).F(...)`.
    fn compile_super(&mut self, start: usize, span: Span) -> Result<ExprOutcome> {
        let target_class = if self.match_symbol("(")? {
            let (name, class_span) = self.expect_ident()?;
            self.expect_symbol(")")?;
            let class = self
                .find_class(&name)
                .ok_or_else(|| CompileError::UnknownType { name: name.clone(), span: class_span })?;
            if class == self.this || !self.is_child_of(self.this, class) {
                return Err(CompileError::semantic(
                    format!("'{name}' is not a parent class of '{}'", self.symbols.name),
                    class_span,
                ));
            }
            class
        } else {
            self.symbols
                .parent
                .ok_or_else(|| CompileError::semantic(format!("'{}' has no parent class", self.symbols.name), span))?
        };

        self.expect_symbol(".")?;
        let (name, name_span) = self.expect_ident()?;
        let target = self
            .find_class_function(target_class, &name)
            .ok_or(CompileError::UnknownIdentifier { name, span: name_span })?;
        self.compile_call(target, Dispatch::Super, start, name_span)
    }
}

