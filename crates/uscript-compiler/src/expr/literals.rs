//! Constant emission.

use uscript_core::{CompileError, PropType, Span};
use uscript_parser::Constant;

use super::ExprOutcome;
use crate::bytecode::OpCode;
use crate::compiler::{ClassCompiler, Result};
use crate::symbols::ClassTable;

impl ClassCompiler<'_> {
    pub(super) fn compile_constant(&mut self, constant: &Constant, start: usize, span: Span) -> Result<ExprOutcome> {
        let ty = match constant {
            Constant::Enum { enum_name, value } => {
                self.code.emit_op(OpCode::ByteConst);
                self.code.emit_u8(*value);
                PropType::Enum(enum_name.clone())
            }
            Constant::Int(value) => {
                match value {
                    0 => self.code.emit_op(OpCode::IntZero),
                    1 => self.code.emit_op(OpCode::IntOne),
                    _ => {
                        self.code.emit_op(OpCode::IntConst);
                        self.code.emit_i32(*value);
                    }
                }
                let mut expr = ExprOutcome::value(PropType::Int, start, span);
                expr.int_literal = Some(*value);
                return Ok(expr);
            }
            Constant::Bool(value) => {
                self.code.emit_op(if *value { OpCode::True } else { OpCode::False });
                PropType::Bool
            }
            Constant::Float(value) => {
                self.code.emit_op(OpCode::FloatConst);
                self.code.emit_f32(value.0);
                PropType::Float
            }
            Constant::Name(name) => {
                let index = self.intern(name, span)?;
                self.code.emit_op(OpCode::NameConst);
                self.code.emit_u16(index);
                PropType::Name
            }
            Constant::String(text) => {
                self.code.emit_op(OpCode::StringConst);
                self.code.emit_cstr(text);
                PropType::String
            }
            Constant::Vector(components) => {
                self.code.emit_op(OpCode::VectorConst);
                for c in components {
                    self.code.emit_f32(c.0);
                }
                PropType::Vector
            }
            Constant::Rotator(components) => {
                self.code.emit_op(OpCode::RotationConst);
                for &c in components {
                    self.code.emit_i32(c);
                }
                PropType::Rotator
            }
            Constant::NoObject => {
                self.code.emit_op(OpCode::NoObject);
                PropType::Object(None)
            }
            Constant::Class(name) => {
                let class = self.find_class(name).ok_or_else(|| CompileError::UnknownType {
                    name: name.clone(),
                    span,
                })?;
                self.note_dependency(class);
                let canonical = self.class_name(class).to_string();
                let index = self.intern(&canonical, span)?;
                self.code.emit_op(OpCode::ObjectConst);
                self.code.emit_u16(index);
                let mut expr = ExprOutcome::value(PropType::object("Class"), start, span);
                expr.class_literal = Some(canonical);
                return Ok(expr);
            }
        };
        Ok(ExprOutcome::value(ty, start, span))
    }
}
