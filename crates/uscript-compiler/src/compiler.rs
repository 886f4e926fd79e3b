//! Per-class compilation state shared by both passes.
//!
//! A [`ClassCompiler`] owns the symbols and code of the class being
//! compiled (taken out of the unit set for the duration) and reads every
//! other class through a shared borrow of the set. Expression, statement
//! and declaration compilers are `impl` blocks on this type spread over the
//! `expr`, `stmt` and `passes` modules.

use rustc_hash::FxHashSet;
use uscript_core::{ClassId, CompileError, NodeIndex, PropType, Property, Span};
use uscript_parser::{Constant, Lexer, Token, TokenKind};

use crate::bytecode::{NamePool, OpCode};
use crate::config::CompilerConfig;
use crate::emit::{CodeBuffer, OffsetOverflow};
use crate::scope::ScopeStack;
use crate::symbols::{ClassSymbols, ClassTable, NodeKind};
use crate::unit_set::{ClassCode, CompilationUnitSet};

pub(crate) type Result<T> = std::result::Result<T, CompileError>;

/// What a compiler hands back to the unit set when it is done.
pub(crate) struct CompiledParts {
    pub symbols: ClassSymbols,
    pub code: ClassCode,
    pub dependencies: FxHashSet<ClassId>,
    pub exec_commands: Vec<(String, Span)>,
}

pub struct ClassCompiler<'a> {
    pub(crate) set: &'a CompilationUnitSet,
    pub(crate) config: &'a CompilerConfig,
    pub(crate) this: ClassId,
    pub(crate) symbols: ClassSymbols,
    pub(crate) code: CodeBuffer,
    pub(crate) names: NamePool,
    pub(crate) lexer: Lexer<'a>,
    pub(crate) scopes: ScopeStack,
    /// Other classes this one referenced.
    pub(crate) dependencies: FxHashSet<ClassId>,
    /// Set while compiling a `foreach` head; consumed by the first call.
    pub(crate) iterator_head: bool,
    /// `#exec` directive text in source order, forwarded by the unit set.
    pub(crate) exec_commands: Vec<(String, Span)>,
}

impl<'a> ClassCompiler<'a> {
    pub(crate) fn new(
        set: &'a CompilationUnitSet,
        this: ClassId,
        source: &'a str,
        symbols: ClassSymbols,
        code: ClassCode,
        config: &'a CompilerConfig,
    ) -> Self {
        Self {
            set,
            config,
            this,
            symbols,
            code: CodeBuffer::from_vec(code.bytes),
            names: code.names,
            lexer: Lexer::new(source),
            scopes: ScopeStack::new(config.max_nest_depth),
            dependencies: FxHashSet::default(),
            iterator_head: false,
            exec_commands: Vec::new(),
        }
    }

    pub(crate) fn finish(self) -> CompiledParts {
        CompiledParts {
            symbols: self.symbols,
            code: ClassCode {
                bytes: self.code.into_vec(),
                names: self.names,
            },
            dependencies: self.dependencies,
            exec_commands: self.exec_commands,
        }
    }

    // =========================================
    // Tokens
    // =========================================

    /// Next token with constants recognized.
    pub(crate) fn next(&mut self) -> Result<Token> {
        self.next_hinted(None)
    }

    /// Next token, reclassifying tags of the enum named `hint` as constants.
    pub(crate) fn next_hinted(&mut self, hint: Option<&str>) -> Result<Token> {
        let def = hint.and_then(|h| self.find_enum(self.this, h)).cloned();
        let token = self.lexer.next_token(def.as_ref(), true)?;
        self.resolve_builtin(token)
    }

    /// Next token with no constant recognition: operators, punctuation, names.
    pub(crate) fn next_plain(&mut self) -> Result<Token> {
        Ok(self.lexer.next_token(None, false)?)
    }

    /// `arraycount(Var)` and `sizeof(Var)` fold to integer constants.
    fn resolve_builtin(&mut self, token: Token) -> Result<Token> {
        let Some(word) = token.ident() else {
            return Ok(token);
        };
        let arraycount = word.eq_ignore_ascii_case("arraycount");
        if !arraycount && !word.eq_ignore_ascii_case("sizeof") {
            return Ok(token);
        }
        if !self.match_symbol("(")? {
            return Ok(token);
        }
        let (name, span) = self.expect_ident()?;
        let prop = self
            .find_variable(&name)
            .ok_or(CompileError::UnknownIdentifier { name, span })?;
        self.expect_symbol(")")?;
        let value = if arraycount { prop.array_dim } else { prop.size() };
        Ok(Token::new(TokenKind::Const(Constant::Int(value as i32)), token.span))
    }

    pub(crate) fn peek_symbol(&mut self, symbol: &str) -> Result<bool> {
        let token = self.next_plain()?;
        self.lexer.unget();
        Ok(token.is_symbol(symbol))
    }

    /// Consume `symbol` if it is next.
    pub(crate) fn match_symbol(&mut self, symbol: &str) -> Result<bool> {
        let token = self.next_plain()?;
        if token.is_symbol(symbol) {
            return Ok(true);
        }
        self.lexer.unget();
        Ok(false)
    }

    /// Consume keyword `word` if it is next.
    pub(crate) fn match_keyword(&mut self, word: &str) -> Result<bool> {
        let token = self.next_plain()?;
        if token.is_ident(word) {
            return Ok(true);
        }
        self.lexer.unget();
        Ok(false)
    }

    pub(crate) fn expect_symbol(&mut self, symbol: &str) -> Result<Span> {
        let token = self.next_plain()?;
        if token.is_symbol(symbol) {
            Ok(token.span)
        } else {
            Err(CompileError::expected(format!("'{symbol}'"), token.to_string(), token.span))
        }
    }

    pub(crate) fn expect_keyword(&mut self, word: &str) -> Result<Span> {
        let token = self.next_plain()?;
        if token.is_ident(word) {
            Ok(token.span)
        } else {
            Err(CompileError::expected(format!("'{word}'"), token.to_string(), token.span))
        }
    }

    pub(crate) fn expect_ident(&mut self) -> Result<(String, Span)> {
        let token = self.next_plain()?;
        match token.kind {
            TokenKind::Identifier(name) => Ok((name, token.span)),
            _ => Err(CompileError::expected("identifier", token.to_string(), token.span)),
        }
    }

    // =========================================
    // Emission helpers
    // =========================================

    pub(crate) fn intern(&mut self, name: &str, span: Span) -> Result<u16> {
        self.names
            .intern(name)
            .ok_or_else(|| CompileError::semantic("too many distinct names in class", span))
    }

    pub(crate) fn code_overflow(&self, span: Span) -> CompileError {
        CompileError::CodeOverflow {
            max: self.config.max_code_size,
            span,
        }
    }

    fn checked(&self, offset: std::result::Result<u16, OffsetOverflow>, span: Span) -> Result<u16> {
        offset
            .ok()
            .filter(|&rel| (rel as usize) <= self.config.max_code_size)
            .ok_or_else(|| self.code_overflow(span))
    }

    /// Current offset relative to the callable entry.
    pub(crate) fn here(&self, span: Span) -> Result<u16> {
        self.checked(self.code.here(), span)
    }

    /// Point the placeholder at `at` to the current offset.
    pub(crate) fn patch_here(&mut self, at: usize, span: Span) -> Result<()> {
        let here = self.here(span)?;
        self.code.patch_u16(at, here);
        Ok(())
    }

    /// Point the placeholder at `at` to absolute position `target`.
    pub(crate) fn patch_to(&mut self, at: usize, target: usize, span: Span) -> Result<()> {
        let rel = self.checked(self.code.relative(target), span)?;
        self.code.patch_u16(at, rel);
        Ok(())
    }

    /// Emit `op` with a placeholder target. Returns the placeholder position.
    pub(crate) fn emit_jump(&mut self, op: OpCode) -> usize {
        self.code.emit_op(op);
        self.code.placeholder()
    }

    /// Emit `op` targeting an already known offset.
    pub(crate) fn emit_jump_to(&mut self, op: OpCode, target: u16) {
        self.code.emit_op(op);
        self.code.emit_u16(target);
    }

    // =========================================
    // Resolution helpers
    // =========================================

    pub(crate) fn note_dependency(&mut self, class: ClassId) {
        if class != self.this {
            self.dependencies.insert(class);
        }
    }

    /// State whose code or function is being compiled, if any.
    pub(crate) fn current_state(&self) -> Option<NodeIndex> {
        let index = self.scopes.current_node()?;
        let node = self.symbols.node(index)?;
        if node.kind == NodeKind::State {
            return Some(index);
        }
        node.outer
            .filter(|&outer| self.symbols.node(outer).is_some_and(|n| n.kind == NodeKind::State))
    }

    /// Local, parameter or member variable visible here.
    pub(crate) fn find_variable(&self, name: &str) -> Option<Property> {
        if let Some(node) = self.scopes.current_node()
            && let Some(prop) = self.symbols.find_frame_var(node, name)
        {
            return Some(self.symbols.prop(prop).clone());
        }
        self.find_member_variable(self.this, name)
    }

    /// Resolve a type name: a keyword type, an enum, or a class.
    pub(crate) fn resolve_type(&mut self, word: &str, span: Span) -> Result<PropType> {
        if let Some(ty) = keyword_type(word) {
            return Ok(ty);
        }
        if let Some(def) = self.find_enum(self.this, word) {
            return Ok(PropType::Enum(def.name.clone()));
        }
        if let Some(class) = self.find_class(word) {
            self.note_dependency(class);
            return Ok(PropType::object(self.class_name(class)));
        }
        Err(CompileError::UnknownType {
            name: word.to_string(),
            span,
        })
    }

    pub(crate) fn parse_type(&mut self) -> Result<(PropType, Span)> {
        let (word, span) = self.expect_ident()?;
        Ok((self.resolve_type(&word, span)?, span))
    }

    /// Integer constant, e.g. an operator precedence or native index.
    pub(crate) fn expect_int(&mut self, what: &str) -> Result<(i32, Span)> {
        let token = self.next()?;
        match token.kind {
            TokenKind::Const(Constant::Int(n)) => Ok((n, token.span)),
            _ => Err(CompileError::expected(what, token.to_string(), token.span)),
        }
    }

    /// Optional `[N]` after a variable name; 1 when absent.
    pub(crate) fn parse_array_dim(&mut self) -> Result<u16> {
        if !self.match_symbol("[")? {
            return Ok(1);
        }
        let token = self.next()?;
        let dim = match token.kind {
            TokenKind::Const(Constant::Int(n)) => u16::try_from(n).ok().filter(|&n| n > 0),
            _ => None,
        }
        .ok_or_else(|| CompileError::expected("array dimension", token.to_string(), token.span))?;
        self.expect_symbol("]")?;
        Ok(dim)
    }
}

/// Built-in type keywords.
pub(crate) fn keyword_type(word: &str) -> Option<PropType> {
    let ty = match word.to_ascii_lowercase().as_str() {
        "byte" => PropType::Byte,
        "int" => PropType::Int,
        "bool" => PropType::Bool,
        "float" => PropType::Float,
        "name" => PropType::Name,
        "string" => PropType::String,
        "vector" => PropType::Vector,
        "rotator" => PropType::Rotator,
        "class" => PropType::object("Class"),
        _ => return None,
    };
    Some(ty)
}

impl ClassTable for ClassCompiler<'_> {
    fn symbols(&self, class: ClassId) -> &ClassSymbols {
        if class == self.this { &self.symbols } else { self.set.symbols(class) }
    }

    fn find_class(&self, name: &str) -> Option<ClassId> {
        self.set.find_class(name)
    }

    fn class_count(&self) -> usize {
        self.set.class_count()
    }
}
