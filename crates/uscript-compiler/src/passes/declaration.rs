//! Pass 0: declarations.

use tracing::debug;
use uscript_core::{Bin, CompileError, EnumDef, NodeIndex, NodeRef, PropType, Property, PropertyFlags, Span};
use uscript_parser::Token;

use crate::compiler::{ClassCompiler, Result};
use crate::expr::MAX_PRECEDENCE;
use crate::scope::NestKind;
use crate::symbols::{ClassFlags, ClassTable, NodeFlags, NodeKind, OperatorKind, StackNode, same_signature};

/// Name given to the return-value slot of a callable's frame.
pub(crate) const RETURN_VALUE: &str = "ReturnValue";

/// Keywords that may start a callable declaration.
const CALLABLE_WORDS: &[&str] = &[
    "function",
    "event",
    "operator",
    "preoperator",
    "postoperator",
    "intrinsic",
    "final",
    "private",
    "static",
    "latent",
    "iterator",
    "simulated",
];

fn modifier_flag(word: &str) -> Option<NodeFlags> {
    let flag = match word {
        "final" => NodeFlags::FINAL,
        "private" => NodeFlags::PRIVATE,
        "static" => NodeFlags::STATIC,
        "latent" => NodeFlags::LATENT,
        "iterator" => NodeFlags::ITERATOR,
        "simulated" => NodeFlags::SIMULATED,
        _ => return None,
    };
    Some(flag)
}

fn starts_callable(token: &Token) -> bool {
    token
        .ident()
        .is_some_and(|w| CALLABLE_WORDS.iter().any(|k| k.eq_ignore_ascii_case(w)))
}

/// A parsed callable header, before it becomes a node.
struct Signature {
    name: String,
    kind: NodeKind,
    flags: NodeFlags,
    native_index: Option<u16>,
    params: Vec<Property>,
    ret: Option<PropType>,
    span: Span,
}

impl ClassCompiler<'_> {
    /// Read the whole class, declaring everything and skipping bodies.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub(crate) fn declare_class(&mut self) -> Result<()> {
        self.scopes.push(NestKind::Class, Some(NodeIndex::CLASS), Span::default())?;
        while self.match_symbol("#")? {
            self.declare_directive()?;
        }
        self.declare_header()?;

        loop {
            let before = self.lexer.position();
            let token = self.next_plain()?;
            let span = token.span;
            if token.is_eof() {
                break;
            }
            if token.is_symbol("#") {
                self.declare_directive()?;
                continue;
            }
            let Some(word) = token.ident().map(str::to_ascii_lowercase) else {
                return Err(CompileError::expected("declaration", token.to_string(), span));
            };
            match word.as_str() {
                "var" => self.declare_vars(Bin::Instance)?,
                "static" if self.match_keyword("var")? => self.declare_vars(Bin::Static)?,
                "enum" => self.declare_enum()?,
                "state" => self.declare_state(false)?,
                "auto" => {
                    self.expect_keyword("state")?;
                    self.declare_state(true)?;
                }
                _ if starts_callable(&token) => {
                    self.lexer.seek(before);
                    self.declare_callable(NodeIndex::CLASS)?;
                }
                _ => return Err(CompileError::expected("declaration", token.to_string(), span)),
            }
        }

        self.scopes.pop();
        debug!(
            class = %self.symbols.name,
            nodes = self.symbols.nodes.len(),
            properties = self.symbols.properties.len(),
            "declared class"
        );
        Ok(())
    }

    /// `#exec text` or `#decompile`; the `#` has been consumed.
    fn declare_directive(&mut self) -> Result<()> {
        let (word, span) = self.expect_ident()?;
        if word.eq_ignore_ascii_case("exec") {
            let text = self.lexer.rest_of_line().to_string();
            self.exec_commands.push((text, span));
        } else if word.eq_ignore_ascii_case("decompile") {
            self.symbols.flags |= ClassFlags::DECOMPILE;
        } else {
            return Err(CompileError::Directive {
                message: format!("unknown directive '#{word}'"),
                span,
            });
        }
        Ok(())
    }

    /// `class Name [expands Parent] {intrinsic|abstract};`
    fn declare_header(&mut self) -> Result<()> {
        self.expect_keyword("class")?;
        let (name, span) = self.expect_ident()?;
        if !name.eq_ignore_ascii_case(&self.symbols.name) {
            return Err(CompileError::semantic(
                format!("class '{name}' declared in the source of '{}'", self.symbols.name),
                span,
            ));
        }
        self.symbols.name = name;
        if let Some(class) = self.symbols.node_mut(NodeIndex::CLASS) {
            class.span = span;
        }

        if self.match_keyword("expands")? || self.match_keyword("extends")? {
            let (parent_name, parent_span) = self.expect_ident()?;
            let parent = self
                .find_class(&parent_name)
                .ok_or_else(|| CompileError::UnknownClass { name: parent_name.clone() })?;
            if parent == self.this || self.is_child_of(parent, self.this) {
                return Err(CompileError::semantic(
                    format!("'{}' cannot expand '{parent_name}': the chain would be circular", self.symbols.name),
                    parent_span,
                ));
            }
            let layout = self.symbols(parent);
            let (instance_size, static_size) = (layout.instance_size, layout.static_size);
            self.symbols.parent = Some(parent);
            self.symbols.instance_size = instance_size;
            self.symbols.static_size = static_size;
            self.note_dependency(parent);
        }

        loop {
            let token = self.next_plain()?;
            if token.is_symbol(";") {
                break;
            }
            if token.is_ident("intrinsic") {
                self.symbols.flags |= ClassFlags::INTRINSIC;
            } else if token.is_ident("abstract") {
                self.symbols.flags |= ClassFlags::ABSTRACT;
            } else {
                return Err(CompileError::expected("';'", token.to_string(), token.span));
            }
        }
        Ok(())
    }

    // =========================================
    // Variables and enums
    // =========================================

    /// `[static] var {const} Type A, B[N];`; the keywords have been consumed.
    fn declare_vars(&mut self, bin: Bin) -> Result<()> {
        let mut flags = PropertyFlags::empty();
        while self.match_keyword("const")? {
            flags |= PropertyFlags::CONST;
        }
        let (ty, _) = self.parse_type()?;
        loop {
            let (name, span) = self.expect_ident()?;
            let dim = self.parse_array_dim()?;
            let symbols = &self.symbols;
            let taken = symbols
                .instance_vars
                .iter()
                .chain(symbols.static_vars.iter())
                .any(|&p| symbols.prop(p).name.eq_ignore_ascii_case(&name));
            if taken {
                return Err(CompileError::Redefinition {
                    name,
                    message: "is already declared in this class".into(),
                    span,
                });
            }

            let mut prop = Property::new(name, ty.clone()).with_bin(bin).with_dim(dim).with_flags(flags);
            let size = match bin {
                Bin::Static => self.symbols.static_size,
                _ => self.symbols.instance_size,
            };
            prop.offset = size;
            let end = size
                .checked_add(prop.size())
                .ok_or_else(|| CompileError::semantic("class variables exceed the addressable size", span))?;
            let index = self.symbols.add_property(prop);
            if bin == Bin::Static {
                self.symbols.static_vars.push(index);
                self.symbols.static_size = end;
            } else {
                self.symbols.instance_vars.push(index);
                self.symbols.instance_size = end;
            }

            if !self.match_symbol(",")? {
                break;
            }
        }
        self.expect_symbol(";")?;
        Ok(())
    }

    /// `enum Name { A, B, ... };`
    fn declare_enum(&mut self) -> Result<()> {
        let (name, span) = self.expect_ident()?;
        if self.symbols.own_enum(&name).is_some() {
            return Err(CompileError::Redefinition {
                name,
                message: "is already declared in this class".into(),
                span,
            });
        }
        let mut def = EnumDef::new(name);
        self.expect_symbol("{")?;
        while !self.match_symbol("}")? {
            let (tag, tag_span) = self.expect_ident()?;
            if def.tag_value(&tag).is_some() {
                return Err(CompileError::Redefinition {
                    name: tag,
                    message: format!("is already a tag of '{}'", def.name),
                    span: tag_span,
                });
            }
            if def.tags.len() > u8::MAX as usize {
                return Err(CompileError::semantic(format!("enum '{}' has too many tags", def.name), tag_span));
            }
            def.tags.push(tag);
            if !self.match_symbol(",")? {
                self.expect_symbol("}")?;
                break;
            }
        }
        self.match_symbol(";")?;
        self.symbols.enums.push(def);
        Ok(())
    }

    // =========================================
    // States
    // =========================================

    /// `[auto] state Name { functions... code }`; the keywords have been consumed.
    fn declare_state(&mut self, auto: bool) -> Result<()> {
        let (name, span) = self.expect_ident()?;
        if self
            .symbols
            .child(NodeIndex::CLASS, &name, |n| n.kind == NodeKind::State)
            .is_some()
        {
            return Err(CompileError::Redefinition {
                name,
                message: "is already declared in this class".into(),
                span,
            });
        }

        let mut node = StackNode::new(name.clone(), NodeKind::State, span);
        if auto {
            let symbols = &self.symbols;
            if symbols.nodes.iter().any(|n| n.kind == NodeKind::State && n.flags.contains(NodeFlags::AUTO)) {
                return Err(CompileError::semantic("a class can have only one auto state", span));
            }
            node.flags |= NodeFlags::AUTO;
        }
        node.parent_item = self.symbols.parent.and_then(|p| self.find_state(p, &name));
        let index = self
            .symbols
            .add_node(node, NodeIndex::CLASS)
            .ok_or_else(|| CompileError::semantic("too many declarations in class", span))?;

        self.expect_symbol("{")?;
        self.scopes.push(NestKind::State, Some(index), span)?;
        loop {
            let before = self.lexer.position();
            let token = self.next_plain()?;
            if token.is_symbol("}") {
                break;
            }
            if token.is_eof() {
                return Err(CompileError::expected("'}'", "end of file", token.span));
            }
            self.lexer.seek(before);
            if starts_callable(&token) {
                self.declare_callable(index)?;
                continue;
            }
            if let Some(state) = self.symbols.node_mut(index) {
                state.body = Some(before);
            }
            self.skip_body()?;
            break;
        }
        self.scopes.pop();
        self.match_symbol(";")?;
        Ok(())
    }

    /// Skip tokens through the `}` matching an already consumed `{`.
    fn skip_body(&mut self) -> Result<()> {
        let mut depth = 1usize;
        while depth > 0 {
            let token = self.next_plain()?;
            if token.is_eof() {
                return Err(CompileError::expected("'}'", "end of file", token.span));
            }
            if token.is_symbol("{") {
                depth += 1;
            } else if token.is_symbol("}") {
                depth -= 1;
            }
        }
        Ok(())
    }

    // =========================================
    // Functions and operators
    // =========================================

    /// A function, event or operator declared under `outer`.
    fn declare_callable(&mut self, outer: NodeIndex) -> Result<()> {
        let sig = self.parse_signature()?;
        self.check_redeclaration(outer, &sig)?;
        let parent_item = self.check_override(outer, &sig)?;

        let mut node = StackNode::new(sig.name.clone(), sig.kind, sig.span);
        node.flags = sig.flags;
        node.native_index = sig.native_index;
        node.parent_item = parent_item;

        let mut frame_size: u16 = 0;
        let mut allocate = |prop: &mut Property| -> Result<()> {
            prop.offset = frame_size;
            frame_size = frame_size
                .checked_add(prop.size())
                .ok_or_else(|| CompileError::semantic("parameters exceed the frame size limit", sig.span))?;
            Ok(())
        };
        let mut params = sig.params;
        for param in &mut params {
            allocate(param)?;
        }
        let mut ret = sig.ret.map(|ty| {
            Property::new(RETURN_VALUE, ty)
                .with_bin(Bin::Frame)
                .with_flags(PropertyFlags::PARM | PropertyFlags::RETURN_PARM)
        });
        if let Some(ret) = &mut ret {
            allocate(ret)?;
        }
        node.params = params.into_iter().map(|p| self.symbols.add_property(p)).collect();
        node.return_prop = ret.map(|p| self.symbols.add_property(p));
        node.frame_size = frame_size;

        let index = self
            .symbols
            .add_node(node, outer)
            .ok_or_else(|| CompileError::semantic("too many declarations in class", sig.span))?;

        let token = self.next_plain()?;
        if token.is_symbol(";") {
            if !sig.flags.contains(NodeFlags::INTRINSIC) {
                return Err(CompileError::semantic(
                    format!("'{}' has no body and is not intrinsic", sig.name),
                    token.span,
                ));
            }
        } else if token.is_symbol("{") {
            if sig.flags.contains(NodeFlags::INTRINSIC) {
                return Err(CompileError::semantic(
                    format!("intrinsic '{}' cannot have a body", sig.name),
                    token.span,
                ));
            }
            if let Some(node) = self.symbols.node_mut(index) {
                node.body = Some(self.lexer.position());
            }
            self.skip_body()?;
        } else {
            return Err(CompileError::expected("'{' or ';'", token.to_string(), token.span));
        }
        Ok(())
    }

    /// Modifiers, kind keyword, return type, name and parameter list.
    fn parse_signature(&mut self) -> Result<Signature> {
        let mut flags = NodeFlags::empty();
        let mut native_index = None;
        let kind = loop {
            let token = self.next_plain()?;
            let Some(word) = token.ident().map(str::to_ascii_lowercase) else {
                return Err(CompileError::expected("declaration", token.to_string(), token.span));
            };
            match word.as_str() {
                "function" => break NodeKind::Function,
                "event" => {
                    flags |= NodeFlags::EVENT;
                    break NodeKind::Function;
                }
                "operator" => {
                    self.expect_symbol("(")?;
                    let (value, span) = self.expect_int("operator precedence")?;
                    let precedence = u8::try_from(value)
                        .ok()
                        .filter(|&p| p < MAX_PRECEDENCE)
                        .ok_or_else(|| CompileError::semantic(format!("invalid operator precedence {value}"), span))?;
                    self.expect_symbol(")")?;
                    break NodeKind::Operator { precedence };
                }
                "preoperator" => break NodeKind::PreOperator,
                "postoperator" => break NodeKind::PostOperator,
                "intrinsic" => {
                    flags |= NodeFlags::INTRINSIC;
                    if self.match_symbol("(")? {
                        let (value, span) = self.expect_int("native index")?;
                        let index = u16::try_from(value)
                            .map_err(|_| CompileError::semantic(format!("invalid native index {value}"), span))?;
                        native_index = Some(index);
                        self.expect_symbol(")")?;
                    }
                }
                other => match modifier_flag(other) {
                    Some(flag) => flags |= flag,
                    None => return Err(CompileError::expected("declaration", token.to_string(), token.span)),
                },
            }
        };

        let (ret, name, span) = if kind.is_operator() {
            let (ty, _) = self.parse_type()?;
            let token = self.next_plain()?;
            let name = token
                .operator_text()
                .map(str::to_string)
                .ok_or_else(|| CompileError::expected("operator", token.to_string(), token.span))?;
            (Some(ty), name, token.span)
        } else {
            let (first, first_span) = self.expect_ident()?;
            if self.peek_symbol("(")? {
                (None, first, first_span)
            } else {
                let ty = self.resolve_type(&first, first_span)?;
                let (name, span) = self.expect_ident()?;
                (Some(ty), name, span)
            }
        };

        let params = self.parse_params()?;
        let arity = match kind.operator_kind() {
            Some(OperatorKind::Binary) => Some(2),
            Some(OperatorKind::Pre | OperatorKind::Post) => Some(1),
            None => None,
        };
        if let Some(arity) = arity
            && params.len() != arity
        {
            return Err(CompileError::semantic(
                format!("operator '{name}' takes {arity} parameter(s), found {}", params.len()),
                span,
            ));
        }

        Ok(Signature {
            name,
            kind,
            flags,
            native_index,
            params,
            ret,
            span,
        })
    }

    /// `( {out|optional|coerce} Type Name[N], ... )`
    fn parse_params(&mut self) -> Result<Vec<Property>> {
        self.expect_symbol("(")?;
        let mut params: Vec<Property> = Vec::new();
        if self.match_symbol(")")? {
            return Ok(params);
        }
        loop {
            let mut flags = PropertyFlags::PARM;
            loop {
                if self.match_keyword("out")? {
                    flags |= PropertyFlags::OUT_PARM;
                } else if self.match_keyword("optional")? {
                    flags |= PropertyFlags::OPTIONAL_PARM;
                } else if self.match_keyword("coerce")? {
                    flags |= PropertyFlags::COERCE_PARM;
                } else if self.match_keyword("const")? {
                    flags |= PropertyFlags::CONST;
                } else {
                    break;
                }
            }
            let (ty, _) = self.parse_type()?;
            let (name, span) = self.expect_ident()?;
            let dim = self.parse_array_dim()?;
            if params.iter().any(|p| p.name.eq_ignore_ascii_case(&name)) {
                return Err(CompileError::Redefinition {
                    name,
                    message: "is already a parameter".into(),
                    span,
                });
            }
            params.push(Property::new(name, ty).with_bin(Bin::Frame).with_dim(dim).with_flags(flags));
            if !self.match_symbol(",")? {
                self.expect_symbol(")")?;
                break;
            }
        }
        Ok(params)
    }

    /// Same-scope duplicates and operator precedence agreement.
    fn check_redeclaration(&self, outer: NodeIndex, sig: &Signature) -> Result<()> {
        let duplicate = match sig.kind.operator_kind() {
            None => self
                .symbols
                .child(outer, &sig.name, |n| n.kind == NodeKind::Function)
                .is_some(),
            Some(op_kind) => self
                .symbols
                .node(outer)
                .map(|o| o.children.as_slice())
                .unwrap_or_default()
                .iter()
                .filter(|&&c| {
                    self.symbols
                        .node(c)
                        .is_some_and(|n| n.kind.operator_kind() == Some(op_kind) && n.is_named(&sig.name))
                })
                .any(|&c| same_signature(&self.symbols.param_props(c), &sig.params)),
        };
        if duplicate {
            return Err(CompileError::Redefinition {
                name: sig.name.clone(),
                message: "is already declared with this signature".into(),
                span: sig.span,
            });
        }

        if let Some(precedence) = sig.kind.precedence() {
            let visible = self.collect_operators(self.this, &sig.name, OperatorKind::Binary);
            if let Some(other) = visible
                .iter()
                .filter_map(|&r| self.node(r).and_then(|n| n.kind.precedence()))
                .find(|&p| p != precedence)
            {
                return Err(CompileError::semantic(
                    format!("operator '{}' was already declared with precedence {other}", sig.name),
                    sig.span,
                ));
            }
        }
        Ok(())
    }

    /// The declaration `sig` overrides, checked for compatibility.
    fn check_override(&self, outer: NodeIndex, sig: &Signature) -> Result<Option<NodeRef>> {
        if sig.kind != NodeKind::Function {
            return Ok(None);
        }
        let Some(base) = self.overridden(outer, &sig.name) else {
            return Ok(None);
        };
        let Some(base_node) = self.node(base) else {
            return Ok(None);
        };
        if base_node.flags.contains(NodeFlags::FINAL) {
            return Err(CompileError::Redefinition {
                name: sig.name.clone(),
                message: format!("overrides a final function of '{}'", self.class_name(base.class)),
                span: sig.span,
            });
        }
        let returns_match = match (self.return_value(base), &sig.ret) {
            (None, None) => true,
            (Some(a), Some(b)) => crate::conversion::same_type(&a.ty, b),
            _ => false,
        };
        if !returns_match || !same_signature(&self.params(base), &sig.params) {
            return Err(CompileError::Redefinition {
                name: sig.name.clone(),
                message: format!("does not match the declaration in '{}'", self.class_name(base.class)),
                span: sig.span,
            });
        }
        Ok(Some(base))
    }

    /// Function `name` that a declaration under `outer` would override.
    fn overridden(&self, outer: NodeIndex, name: &str) -> Option<NodeRef> {
        if outer == NodeIndex::CLASS {
            return self.symbols.parent.and_then(|p| self.find_class_function(p, name));
        }
        let in_parent_state = self
            .symbols
            .node(outer)
            .and_then(|state| state.parent_item)
            .and_then(|ps| self.find_function(ps.class, Some(ps.node), name))
            .filter(|&r| self.node(r).is_some_and(|n| n.outer != Some(NodeIndex::CLASS)));
        in_parent_state.or_else(|| self.find_class_function(self.this, name))
    }
}
