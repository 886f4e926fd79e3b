//! Explicit conversions `Type(expr)` and downcasts `Class(expr)`.

use uscript_core::{ClassId, CompileError, PropType, Span, TypeTag};

use super::{ExprOutcome, MAX_PRECEDENCE};
use crate::bytecode::OpCode;
use crate::compiler::{ClassCompiler, Result};
use crate::conversion::lookup;
use crate::symbols::ClassTable;

/// Enum values convert as bytes.
fn storage(ty: &PropType) -> TypeTag {
    match ty {
        PropType::Enum(_) => TypeTag::Byte,
        other => other.tag(),
    }
}

impl ClassCompiler<'_> {
    /// Operand of a cast, up to and including the closing `)`.
    fn cast_operand(&mut self, hint: Option<&str>, span: Span) -> Result<ExprOutcome> {
        let inner = self.compile_expr(None, MAX_PRECEDENCE, hint)?;
        if inner.is_absent() {
            return Err(self.missing("expression to cast", span));
        }
        self.expect_symbol(")")?;
        if inner.ty.is_array() {
            return Err(CompileError::semantic("cannot cast an array", inner.span));
        }
        Ok(inner)
    }

    /// `byte(e)`, `string(e)`, `EPhysics(e)`, ...
    ///
    /// A cast to an enum type converts to its byte storage. A cast that does
    /// not change the storage type is rejected as redundant.
    pub(super) fn compile_conversion_cast(
        &mut self,
        dest: PropType,
        hint: Option<&str>,
        start: usize,
        span: Span,
    ) -> Result<ExprOutcome> {
        let inner = self.cast_operand(hint, span)?;
        let dest_tag = storage(&dest);
        let src_tag = storage(&inner.ty.ty);
        if dest_tag == src_tag {
            return Err(CompileError::semantic(
                format!("cast from {} to {} is redundant", inner.ty.ty, dest),
                span,
            ));
        }
        let conversion = lookup(dest_tag, src_tag).ok_or_else(|| {
            CompileError::mismatch(format!("cannot convert {} to {}", inner.ty.ty, dest), span)
        })?;
        self.insert_cast(conversion.cast, inner.start);

        let result = if dest_tag == TypeTag::Byte { PropType::Byte } else { dest };
        let mut expr = ExprOutcome::value(result, start, span);
        expr.enum_hint = inner.enum_hint;
        Ok(expr)
    }

    /// `Class(obj)`: runtime-checked downcast.
    pub(super) fn compile_dynamic_cast(&mut self, class: ClassId, start: usize, span: Span) -> Result<ExprOutcome> {
        let inner = self.cast_operand(None, span)?;
        let target = self.class_name(class).to_string();
        let Some(source) = inner.ty.ty.class_name() else {
            return Err(CompileError::mismatch(format!("cannot cast {} to {target}", inner.ty.ty), span));
        };
        let source_id = self
            .find_class(source)
            .ok_or_else(|| CompileError::UnknownType { name: source.to_string(), span })?;

        if source_id == class {
            return Err(CompileError::semantic(format!("cast from {target} to {target} is redundant"), span));
        }
        if self.is_child_of(source_id, class) {
            return Err(CompileError::semantic(
                format!("cast from {source} to {target} is unnecessary; {source} is already a {target}"),
                span,
            ));
        }
        if !self.is_child_of(class, source_id) {
            return Err(CompileError::mismatch(
                format!("cast from {source} to {target} will always fail"),
                span,
            ));
        }

        self.note_dependency(class);
        let name = self.intern(&target, span)?;
        let header = self.code.len();
        self.code.emit_op(OpCode::DynamicCast);
        self.code.emit_u16(name);
        self.code.move_tail(header, inner.start);
        Ok(ExprOutcome::value(PropType::object(target), start, span))
    }
}
