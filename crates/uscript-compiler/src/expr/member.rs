//! Selectors: `[index]` and `.member`.

use uscript_core::{CompileError, PropType, Property, Span};

use super::{Dispatch, ExprOutcome};
use crate::bytecode::OpCode;
use crate::compiler::{ClassCompiler, Result};
use crate::symbols::ClassTable;

/// `ArrayElement` plus its two `u16` operands.
const ARRAY_HEADER_LEN: usize = 5;

impl ClassCompiler<'_> {
    /// Index into a static array variable; `[` has been consumed.
    ///
    /// Bytecode layout:
    /// ```text
    /// ArrayElement u16 dim u16 element_size <variable> <int index>
    /// ```
    /// For a member array, `<variable>` is the whole context access, so the
    /// index sits after the `Context` block rather than inside its skip range:
    /// ```text
    /// ArrayElement u16 dim u16 element_size Context <object> u16 skip <member> <int index>
    /// ```
    /// A constant index outside `0..dim` is rejected.
    pub(super) fn compile_index(&mut self, array: ExprOutcome) -> Result<ExprOutcome> {
        let Some(operand) = array.var_operand.filter(|_| array.ty.is_array()) else {
            return Err(CompileError::semantic("'[' applied to something that is not an array", array.span));
        };
        let header = self.code.len();
        self.code.emit_op(OpCode::ArrayElement);
        self.code.emit_u16(array.ty.array_dim);
        self.code.emit_u16(array.ty.ty.element_size());
        self.code.move_tail(header, array.start);

        let index = self.compile_required(&Property::value(PropType::Int), "array index")?;
        let dim = array.ty.array_dim;
        if let Some(value) = index.int_literal
            && !(0..i32::from(dim)).contains(&value)
        {
            return Err(CompileError::semantic(
                format!("index {value} is out of bounds for '{}[{dim}]'", array.ty.name),
                index.span,
            ));
        }
        self.expect_symbol("]")?;

        let mut element = array;
        element.ty.array_dim = 1;
        element.var_operand = Some(operand + ARRAY_HEADER_LEN);
        Ok(element)
    }

    /// Member of a vector, rotator or object; `.` has been consumed.
    pub(super) fn compile_member(&mut self, base: ExprOutcome) -> Result<ExprOutcome> {
        let (name, span) = self.expect_ident()?;
        let class = match &base.ty.ty {
            PropType::Vector | PropType::Rotator => None,
            PropType::Object(Some(class)) => Some(class.clone()),
            PropType::Object(None) => return Err(CompileError::semantic("member access on 'none'", span)),
            other => {
                return Err(CompileError::semantic(
                    format!("'.{name}' applied to {other}; expected an object, vector or rotator"),
                    span,
                ));
            }
        };
        match class {
            Some(class) => self.compile_context(base, &class, name, span),
            None => self.compile_component(base, &name, span),
        }
    }

    /// `Vec.X`: rewrite the variable's offset operand in place.
    fn compile_component(&mut self, base: ExprOutcome, name: &str, span: Span) -> Result<ExprOutcome> {
        let Some((_, delta, ty)) = base.ty.ty.components().iter().find(|(n, _, _)| n.eq_ignore_ascii_case(name))
        else {
            return Err(CompileError::UnknownIdentifier {
                name: name.to_string(),
                span,
            });
        };
        let Some(operand) = base.var_operand else {
            return Err(CompileError::semantic(
                format!("component '{name}' can only be selected from a variable"),
                span,
            ));
        };
        let offset = self
            .code
            .read_u16(operand)
            .checked_add(*delta)
            .ok_or_else(|| CompileError::semantic("component offset out of range", span))?;
        self.code.patch_u16(operand, offset);

        let mut component = base;
        component.ty = Property::value(ty.clone());
        component.enum_hint = None;
        component.int_literal = None;
        Ok(component)
    }

    /// `Obj.Member`.
    ///
    /// Bytecode layout:
    /// ```text
    /// Context <object> u16 skip <member>
    /// ```
    /// `skip` is the member's byte length, so a `none` object can be stepped over.
    fn compile_context(&mut self, base: ExprOutcome, class: &str, name: String, span: Span) -> Result<ExprOutcome> {
        let class_id = self
            .find_class(class)
            .ok_or_else(|| CompileError::UnknownClass { name: class.to_string() })?;
        self.note_dependency(class_id);

        let header = self.code.len();
        self.code.emit_op(OpCode::Context);
        self.code.move_tail(header, base.start);
        let skip = self.code.placeholder();
        let member_start = self.code.len();

        let member = if self.peek_symbol("(")? {
            let target = self
                .find_class_function(class_id, &name)
                .ok_or(CompileError::UnknownIdentifier { name, span })?;
            self.compile_call(target, Dispatch::Context, member_start, span)?
        } else {
            let prop = self
                .find_member_variable(class_id, &name)
                .ok_or(CompileError::UnknownIdentifier { name, span })?;
            self.emit_variable(&prop, member_start, span)
        };

        let len = u16::try_from(self.code.len() - member_start).map_err(|_| self.code_overflow(span))?;
        self.code.patch_u16(skip, len);

        let mut expr = member;
        expr.start = base.start;
        Ok(expr)
    }
}
