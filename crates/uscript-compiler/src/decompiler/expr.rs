//! Expression decoding.
//!
//! Decoding walks the prefix-encoded bytes and rebuilds the text the
//! expression compiler would turn back into the same bytes. Wherever the
//! compiler's output depends on context (the required type of a value, the
//! enumeration hint of a left operand) the decoder is given the same
//! context, so it knows which conversions were implicit and which tags
//! were written by name.

use uscript_core::{Bin, ClassId, NodeIndex, NodeRef, PropType, Property, TypeTag};

use super::{DecompileError, Result};
use crate::bytecode::{CastKind, NamePool, OpCode, read_f32, read_i32, read_u16};
use crate::conversion::{ConversionCost, conversion_cost, implicit_cast, lookup};
use crate::overload::signature_cost;
use crate::symbols::{ClassTable, OperatorKind};
use crate::unit_set::CompilationUnitSet;

/// How a decoded expression binds when it becomes an operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Form {
    Atom,
    Prefix,
    Postfix,
    Binary(u8),
}

/// Source text of one expression and what the compiler knew about it.
#[derive(Debug, Clone)]
pub(super) struct Decoded {
    pub text: String,
    pub ty: PropType,
    pub form: Form,
    pub enum_hint: Option<String>,
    /// Value of a bare integer literal.
    int_literal: Option<i32>,
    /// Component selector written after the index of an array element.
    pending: Option<&'static str>,
    /// A variable at component offset 0 reads the same as its first
    /// component; the consumer's type decides which was written.
    zero_component: Option<(&'static str, PropType)>,
}

impl Decoded {
    fn atom(text: impl Into<String>, ty: PropType) -> Self {
        Self {
            text: text.into(),
            enum_hint: ty.enum_name().map(str::to_string),
            ty,
            form: Form::Atom,
            int_literal: None,
            pending: None,
            zero_component: None,
        }
    }

    fn int(value: i32) -> Self {
        Self {
            int_literal: Some(value),
            ..Self::atom(value.to_string(), PropType::Int)
        }
    }

    /// Read the first component instead of the whole variable.
    pub(super) fn select(&mut self, name: &str, ty: PropType) {
        self.text.push('.');
        self.text.push_str(name);
        self.ty = ty;
        self.enum_hint = None;
        self.zero_component = None;
    }

    /// Ambiguous first component, if any.
    pub(super) fn zero_component(&self) -> Option<(&'static str, PropType)> {
        self.zero_component.clone()
    }

    fn parenthesized(&self) -> String {
        format!("({})", self.text)
    }
}

/// An operator operand and the conversion the operator put in front of it.
struct Operand {
    value: Decoded,
    cast: Option<CastKind>,
}

impl Operand {
    fn explicit(self) -> Decoded {
        match self.cast {
            Some(cast) => cast_text(cast, self.value),
            None => self.value,
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_symbol_char(c: char) -> bool {
    !is_ident_char(c) && !c.is_whitespace() && !matches!(c, '(' | ')' | '[' | ']' | '\'' | '"' | '.')
}

/// Concatenate, with a space where the two sides would lex as one token.
fn join_tokens(left: &str, right: &str) -> String {
    let merge = match (left.chars().last(), right.chars().next()) {
        (Some(a), Some(b)) => (is_symbol_char(a) && is_symbol_char(b)) || (is_ident_char(a) && is_ident_char(b)),
        _ => false,
    };
    if merge { format!("{left} {right}") } else { format!("{left}{right}") }
}

fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn float_text(value: f32) -> String {
    format!("{value:?}")
}

fn cast_result(cast: CastKind) -> PropType {
    match cast.dest() {
        TypeTag::Byte => PropType::Byte,
        TypeTag::Int => PropType::Int,
        TypeTag::Bool => PropType::Bool,
        TypeTag::Float => PropType::Float,
        TypeTag::Name => PropType::Name,
        TypeTag::String => PropType::String,
        TypeTag::Vector => PropType::Vector,
        TypeTag::Rotator => PropType::Rotator,
        _ => PropType::None,
    }
}

/// `keyword(inner)`.
fn cast_text(cast: CastKind, inner: Decoded) -> Decoded {
    let mut expr = Decoded::atom(format!("{}({})", cast.dest_keyword(), inner.text), cast_result(cast));
    expr.enum_hint = inner.enum_hint;
    expr
}

/// Whether `cast` converts from values of type `ty`.
fn converts_from(cast: CastKind, ty: &PropType) -> bool {
    lookup(cast.dest(), ty.tag()).is_some_and(|c| c.cast == cast)
}

/// Reads one callable's bytes back into source text.
pub(super) struct CodeReader<'a> {
    pub(super) set: &'a CompilationUnitSet,
    pub(super) class: ClassId,
    pub(super) node: NodeIndex,
    /// State whose functions plain calls see first.
    pub(super) state: Option<NodeIndex>,
    pub(super) code: &'a [u8],
    pub(super) names: &'a NamePool,
}

impl<'a> CodeReader<'a> {
    // =========================================
    // Operands
    // =========================================

    pub(super) fn byte(&self, at: &mut usize) -> Result<u8> {
        let byte = *self.code.get(*at).ok_or(DecompileError::Truncated { at: *at })?;
        *at += 1;
        Ok(byte)
    }

    pub(super) fn word(&self, at: &mut usize) -> Result<u16> {
        let value = read_u16(self.code, *at).ok_or(DecompileError::Truncated { at: *at })?;
        *at += 2;
        Ok(value)
    }

    fn int(&self, at: &mut usize) -> Result<i32> {
        let value = read_i32(self.code, *at).ok_or(DecompileError::Truncated { at: *at })?;
        *at += 4;
        Ok(value)
    }

    fn float(&self, at: &mut usize) -> Result<f32> {
        let value = read_f32(self.code, *at).ok_or(DecompileError::Truncated { at: *at })?;
        *at += 4;
        Ok(value)
    }

    pub(super) fn op(&self, at: &mut usize) -> Result<OpCode> {
        let start = *at;
        let byte = self.byte(at)?;
        OpCode::from_u8(byte).ok_or(DecompileError::UnknownOpcode { byte, at: start })
    }

    pub(super) fn peek(&self, at: usize) -> Result<OpCode> {
        let mut ahead = at;
        self.op(&mut ahead)
    }

    pub(super) fn expect(&self, at: &mut usize, expected: OpCode) -> Result<()> {
        let start = *at;
        let op = self.op(at)?;
        if op == expected {
            Ok(())
        } else {
            Err(DecompileError::Unexpected { op, at: start })
        }
    }

    pub(super) fn name(&self, at: &mut usize) -> Result<&'a str> {
        let index = self.word(at)?;
        self.names.get(index).ok_or(DecompileError::UnknownName { index })
    }

    fn cstr(&self, at: &mut usize) -> Result<String> {
        let rest = self.code.get(*at..).unwrap_or_default();
        let len = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(DecompileError::Truncated { at: *at })?;
        let text = String::from_utf8_lossy(&rest[..len]).into_owned();
        *at += len + 1;
        Ok(text)
    }

    fn cast(&self, at: &mut usize) -> Result<CastKind> {
        let start = *at;
        let byte = self.byte(at)?;
        CastKind::from_u8(byte).ok_or(DecompileError::UnknownCast { byte, at: start })
    }

    // =========================================
    // Expressions
    // =========================================

    /// Decode the expression at `at`.
    ///
    /// `expected` is the type the compiler converted the value to, if any;
    /// `hint` the enumeration whose tags were constants in its first operand.
    pub(super) fn expr(&self, at: &mut usize, expected: Option<&Property>, hint: Option<&str>) -> Result<Decoded> {
        let lex_hint = expected.and_then(|e| e.ty.enum_name()).or(hint);
        let start = *at;
        let op = self.op(at)?;
        let decoded = match op {
            OpCode::LocalVariable | OpCode::InstanceVariable | OpCode::StaticVariable | OpCode::DefaultVariable => {
                self.variable(op, at, self.class)?
            }
            OpCode::SelfObject => Decoded::atom("self", PropType::object(self.set.class_name(self.class))),
            OpCode::Context => self.context(at)?,
            OpCode::ArrayElement => self.array_element(at)?,
            op if op.is_call() => self.call(op, at, None, lex_hint)?,
            OpCode::Conversion => return self.conversion(at, expected, lex_hint),
            OpCode::DynamicCast => {
                let class = self.name(at)?;
                let inner = self.expr(at, None, None)?;
                Decoded::atom(format!("{class}({})", inner.text), PropType::object(class))
            }
            OpCode::IntConst => Decoded::int(self.int(at)?),
            OpCode::IntZero => Decoded::int(0),
            OpCode::IntOne => Decoded::int(1),
            OpCode::ByteConst => {
                let value = self.byte(at)?;
                self.byte_const(value, expected, lex_hint)
            }
            OpCode::FloatConst => Decoded::atom(float_text(self.float(at)?), PropType::Float),
            OpCode::StringConst => Decoded::atom(quote(&self.cstr(at)?), PropType::String),
            OpCode::NameConst => Decoded::atom(format!("'{}'", self.name(at)?), PropType::Name),
            OpCode::ObjectConst => Decoded::atom(format!("class'{}'", self.name(at)?), PropType::object("Class")),
            OpCode::VectorConst => {
                let (x, y, z) = (self.float(at)?, self.float(at)?, self.float(at)?);
                let text = format!("vect({}, {}, {})", float_text(x), float_text(y), float_text(z));
                Decoded::atom(text, PropType::Vector)
            }
            OpCode::RotationConst => {
                let (p, y, r) = (self.int(at)?, self.int(at)?, self.int(at)?);
                Decoded::atom(format!("rot({p}, {y}, {r})"), PropType::Rotator)
            }
            OpCode::True => Decoded::atom("true", PropType::Bool),
            OpCode::False => Decoded::atom("false", PropType::Bool),
            OpCode::NoObject => Decoded::atom("none", PropType::Object(None)),
            other => return Err(DecompileError::Unexpected { op: other, at: start }),
        };
        Ok(match expected {
            Some(expected) => self.fit(decoded, expected),
            None => decoded,
        })
    }

    /// Resolve a zero-offset component read against the type it fed.
    pub(super) fn fit(&self, mut value: Decoded, wanted: &Property) -> Decoded {
        if let Some((name, ty)) = value.zero_component.take() {
            let whole = conversion_cost(wanted, &Property::value(value.ty.clone()), self.set);
            let part = conversion_cost(wanted, &Property::value(ty.clone()), self.set);
            if !whole.is_compatible() && part.is_compatible() {
                value.select(name, ty);
            }
        }
        value
    }

    /// Resolve a zero-offset component read against the conversion applied to it.
    fn fit_cast_source(&self, mut value: Decoded, cast: CastKind) -> Decoded {
        if let Some((name, ty)) = value.zero_component.clone()
            && !converts_from(cast, &value.ty)
            && converts_from(cast, &ty)
        {
            value.select(name, ty);
        }
        value
    }

    fn byte_const(&self, value: u8, expected: Option<&Property>, hint: Option<&str>) -> Decoded {
        let tag = |enum_name: &str| {
            self.set
                .find_enum(self.class, enum_name)
                .and_then(|def| def.tag_name(value).map(|tag| (def.name.clone(), tag.to_string())))
        };
        if expected.is_some_and(|e| e.ty == PropType::Byte) {
            return Decoded::atom(value.to_string(), PropType::Byte);
        }
        match hint.and_then(tag) {
            Some((enum_name, tag)) => Decoded::atom(tag, PropType::Enum(enum_name)),
            None => Decoded::atom(value.to_string(), PropType::Byte),
        }
    }

    /// A `Conversion` reached outside an operator: implicit when `expected`
    /// would have produced it, an explicit cast otherwise.
    fn conversion(&self, at: &mut usize, expected: Option<&Property>, hint: Option<&str>) -> Result<Decoded> {
        let cast = self.cast(at)?;
        let inner = self.expr(at, None, hint)?;
        let mut inner = self.fit_cast_source(inner, cast);
        if let Some(expected) = expected
            && self.is_implicit(expected, &inner, cast)
        {
            inner.ty = expected.ty.clone();
            inner.int_literal = None;
            return Ok(inner);
        }
        Ok(cast_text(cast, inner))
    }

    fn is_implicit(&self, expected: &Property, inner: &Decoded, cast: CastKind) -> bool {
        let narrowed = expected.ty == PropType::Byte
            && !expected.is_out()
            && inner.int_literal.is_some_and(|v| u8::try_from(v).is_ok());
        if narrowed {
            return false;
        }
        let cost = conversion_cost(expected, &Property::value(inner.ty.clone()), self.set);
        cost.is_compatible() && cost != ConversionCost::IDENTICAL && implicit_cast(&expected.ty, &inner.ty) == Some(cast)
    }

    // =========================================
    // Variables and selectors
    // =========================================

    /// A variable opcode whose offset operand is next; members resolve in `class`.
    fn variable(&self, op: OpCode, at: &mut usize, class: ClassId) -> Result<Decoded> {
        let start = *at - 1;
        let offset = self.word(at)?;
        let (prop, prefix) = match op {
            OpCode::LocalVariable => (self.set.symbols(self.class).frame_var_at(self.node, offset), ""),
            OpCode::InstanceVariable => (self.set.member_variable_at(class, Bin::Instance, offset), ""),
            OpCode::StaticVariable => (self.set.member_variable_at(class, Bin::Static, offset), ""),
            _ => (self.set.member_variable_at(class, Bin::Instance, offset), "Default."),
        };
        let prop = prop.ok_or(DecompileError::UnknownVariable { offset, at: start })?;

        let element = prop.ty.element_size().max(1);
        let delta = (offset - prop.offset) % element;
        let mut decoded = Decoded::atom(format!("{prefix}{}", prop.name), prop.ty.clone());
        let components = prop.ty.components();
        if delta > 0 {
            let (name, _, ty) = components
                .iter()
                .find(|(_, d, _)| *d == delta)
                .ok_or(DecompileError::UnknownVariable { offset, at: start })?;
            if prop.is_array() {
                decoded.pending = Some(*name);
                decoded.ty = ty.clone();
                decoded.enum_hint = None;
            } else {
                decoded.select(name, ty.clone());
            }
        } else if let Some((name, _, ty)) = components.first() {
            decoded.zero_component = Some((*name, ty.clone()));
        }
        Ok(decoded)
    }

    /// `ArrayElement u16 dim u16 size <array> <index>`; the opcode has been read.
    fn array_element(&self, at: &mut usize) -> Result<Decoded> {
        let _dim = self.word(at)?;
        let _size = self.word(at)?;
        let mut array = self.expr(at, None, None)?;
        let index = self.expr(at, Some(&Property::value(PropType::Int)), None)?;
        array.text = format!("{}[{}]", array.text, index.text);
        if let Some(name) = array.pending.take() {
            array.text.push('.');
            array.text.push_str(name);
        }
        Ok(array)
    }

    /// `Context <object> u16 skip <member>`; the opcode has been read.
    fn context(&self, at: &mut usize) -> Result<Decoded> {
        let start = *at - 1;
        let object = self.expr(at, None, None)?;
        let class = object
            .ty
            .class_name()
            .and_then(|c| self.set.find_class(c))
            .ok_or(DecompileError::Unexpected { op: OpCode::Context, at: start })?;
        let _skip = self.word(at)?;

        let member_at = *at;
        let op = self.op(at)?;
        let mut member = match op {
            op if op.is_call() => self.call(op, at, Some(class), None)?,
            OpCode::InstanceVariable | OpCode::StaticVariable => self.variable(op, at, class)?,
            other => return Err(DecompileError::Unexpected { op: other, at: member_at }),
        };
        let object = if object.form == Form::Atom { object.text } else { object.parenthesized() };
        member.text = format!("{object}.{}", member.text);
        Ok(member)
    }

    // =========================================
    // Calls and operators
    // =========================================

    /// A call opcode whose operands are next. `context` is the class of the
    /// object in `Obj.F(...)`.
    fn call(&self, op: OpCode, at: &mut usize, context: Option<ClassId>, hint: Option<&str>) -> Result<Decoded> {
        let start = *at - 1;
        let unresolved = |what: String| DecompileError::UnknownFunction { name: what, at: start };
        let scope = context.unwrap_or(self.class);

        let (target, prefix) = match op {
            OpCode::Native => {
                let index = self.word(at)?;
                let target = self
                    .set
                    .find_native(scope, index)
                    .ok_or_else(|| unresolved(format!("native {index}")))?;
                (target, String::new())
            }
            OpCode::FinalFunction => {
                let owner = self.name(at)?;
                let node = NodeIndex(self.word(at)?);
                let class = self.set.find_class(owner).ok_or_else(|| unresolved(owner.to_string()))?;
                let target = NodeRef::new(class, node);
                let prefix = if context.is_some() { String::new() } else { self.final_prefix(target) };
                (target, prefix)
            }
            OpCode::GlobalFunction => {
                let name = self.name(at)?;
                let target = self
                    .set
                    .find_class_function(self.class, name)
                    .ok_or_else(|| unresolved(name.to_string()))?;
                (target, "Global.".to_string())
            }
            _ => {
                let name = self.name(at)?;
                let target = match context {
                    Some(class) => self.set.find_class_function(class, name),
                    None => self.set.find_function(self.class, self.state, name),
                };
                (target.ok_or_else(|| unresolved(name.to_string()))?, String::new())
            }
        };

        let node = self.set.node(target).ok_or_else(|| unresolved(target.to_string()))?;
        if let Some(kind) = node.kind.operator_kind() {
            return self.operator_call(at, target, kind, hint);
        }

        let mut args: Vec<String> = Vec::new();
        for param in self.set.params(target) {
            if self.peek(*at)? == OpCode::Nothing {
                *at += 1;
                args.push(String::new());
                continue;
            }
            args.push(self.expr(at, Some(&param), None)?.text);
        }
        self.expect(at, OpCode::EndFunctionParms)?;
        while args.last().is_some_and(String::is_empty) {
            args.pop();
        }

        let ret = self.set.return_value(target).map(|p| p.ty).unwrap_or_default();
        Ok(Decoded::atom(format!("{prefix}{}({})", node.name, args.join(", ")), ret))
    }

    /// How a statically bound call to `target` was written.
    fn final_prefix(&self, target: NodeRef) -> String {
        let Some(node) = self.set.node(target) else {
            return String::new();
        };
        if node.is_final() && self.set.find_function(self.class, self.state, &node.name) == Some(target) {
            return String::new();
        }
        let parent = self.set.symbols(self.class).parent;
        if parent.and_then(|p| self.set.find_class_function(p, &node.name)) == Some(target) {
            return "Super.".to_string();
        }
        format!("Super({}).", self.set.class_name(target.class))
    }

    fn operator_call(&self, at: &mut usize, target: NodeRef, kind: OperatorKind, hint: Option<&str>) -> Result<Decoded> {
        let start = *at;
        let node = self
            .set
            .node(target)
            .ok_or_else(|| DecompileError::UnknownFunction { name: target.to_string(), at: start })?;
        let params = self.set.params(target);

        let mut operands: Vec<Operand> = Vec::with_capacity(params.len());
        let mut next_hint = hint.map(str::to_string);
        for param in &params {
            let operand = self.operand(at, param, next_hint.as_deref())?;
            next_hint = operand.value.enum_hint.clone();
            operands.push(operand);
        }
        self.expect(at, OpCode::EndFunctionParms)?;

        let types: Vec<Property> = operands.iter().map(|o| Property::value(o.value.ty.clone())).collect();
        let refs: Vec<&Property> = types.iter().collect();
        let implicit = self.resolves_to(&node.name, kind, &refs, target);
        let operands: Vec<Decoded> = operands
            .into_iter()
            .map(|o| if implicit { o.value } else { o.explicit() })
            .collect();

        let ret = self.set.return_value(target).map(|p| p.ty).unwrap_or_default();
        let name = node.name.as_str();
        let (text, form) = match (kind, operands.as_slice()) {
            (OperatorKind::Binary, [left, right]) => {
                let precedence = node.kind.precedence().unwrap_or(0);
                let left = match left.form {
                    Form::Binary(p) if p > precedence => left.parenthesized(),
                    _ => left.text.clone(),
                };
                let right = match right.form {
                    Form::Binary(p) if p >= precedence => right.parenthesized(),
                    _ => right.text.clone(),
                };
                (format!("{left} {name} {right}"), Form::Binary(precedence))
            }
            (OperatorKind::Pre, [operand]) => {
                let needs_parens = matches!(operand.form, Form::Binary(_))
                    || operand.text.starts_with(|c: char| c.is_ascii_digit());
                let inner = if needs_parens { operand.parenthesized() } else { operand.text.clone() };
                (join_tokens(name, &inner), Form::Prefix)
            }
            (OperatorKind::Post, [operand]) => {
                let inner = match operand.form {
                    Form::Binary(_) | Form::Prefix => operand.parenthesized(),
                    _ => operand.text.clone(),
                };
                (join_tokens(&inner, name), Form::Postfix)
            }
            _ => {
                return Err(DecompileError::UnknownFunction {
                    name: format!("operator {name} with {} operand(s)", operands.len()),
                    at: start,
                });
            }
        };
        let mut decoded = Decoded::atom(text, ret);
        decoded.form = form;
        Ok(decoded)
    }

    /// One operand, splitting off a conversion the operator itself required.
    fn operand(&self, at: &mut usize, param: &Property, hint: Option<&str>) -> Result<Operand> {
        if self.peek(*at)? == OpCode::Conversion {
            let mut ahead = *at + 1;
            let cast = self.cast(&mut ahead)?;
            let inner = self.expr(&mut ahead, None, hint)?;
            let inner = self.fit_cast_source(inner, cast);
            if implicit_cast(&param.ty, &inner.ty) == Some(cast) {
                *at = ahead;
                return Ok(Operand { value: inner, cast: Some(cast) });
            }
        }
        let value = self.expr(at, None, hint)?;
        Ok(Operand {
            value: self.fit(value, param),
            cast: None,
        })
    }

    /// Whether overload resolution over `operands` picks `target` again.
    fn resolves_to(&self, name: &str, kind: OperatorKind, operands: &[&Property], target: NodeRef) -> bool {
        let scored: Vec<(NodeRef, ConversionCost)> = self
            .set
            .collect_operators(self.class, name, kind)
            .into_iter()
            .map(|c| (c, signature_cost(self.set, &self.set.params(c), operands)))
            .collect();
        let Some(best) = scored.iter().map(|&(_, cost)| cost).min() else {
            return false;
        };
        best.is_compatible()
            && scored.iter().filter(|&&(_, cost)| cost == best).count() == 1
            && scored.iter().any(|&(node, cost)| node == target && cost == best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_that_would_merge_get_a_space() {
        assert_eq!(join_tokens("-", "-5"), "- -5");
        assert_eq!(join_tokens("-", "A"), "-A");
        assert_eq!(join_tokens("not", "A"), "not A");
        assert_eq!(join_tokens("A", "++"), "A++");
    }

    #[test]
    fn strings_are_escaped() {
        assert_eq!(quote("say \"hi\"\n"), "\"say \\\"hi\\\"\\n\"");
        assert_eq!(quote("a\\b"), "\"a\\\\b\"");
    }

    #[test]
    fn floats_keep_a_fraction_or_exponent() {
        assert_eq!(float_text(1.0), "1.0");
        assert_eq!(float_text(-0.5), "-0.5");
        assert!(float_text(1e-8).contains('e'));
    }
}
