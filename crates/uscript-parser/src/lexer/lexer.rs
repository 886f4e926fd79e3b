//! The [`Lexer`] turns source text into [`Token`]s on demand.
//!
//! Reads are driven by the compiler one at a time. Two parameters make
//! lexing context-sensitive:
//!
//! - `allow_constants`: whether a constant may start here. Only then does a
//!   leading `+`/`-` followed by a digit lex as a signed number, and only then
//!   are the built-in words (`true`, `none`, `vect(...)`, `class'X'`, ...)
//!   resolved to constants.
//! - `hint`: an enumeration the caller expects. A bare identifier matching one
//!   of its tags becomes a byte constant.
//!
//! Block comments nest. The most recent read can be pushed back once with
//! [`Lexer::unget`]; arbitrary rewinds go through [`Lexer::position`] and
//! [`Lexer::seek`].

use ordered_float::OrderedFloat;
use tracing::trace;
use uscript_core::{EnumDef, LexError, MAX_STRING_CONST, NAME_SIZE, Span};

use super::cursor::{Cursor, SourcePos, is_ident_continue, is_ident_start};
use super::token::{Constant, LONG_SYMBOLS, SHORT_SYMBOLS, Token, TokenKind};

type Result<T> = std::result::Result<T, LexError>;

/// Lexer over one class's source text.
pub struct Lexer<'src> {
    cursor: Cursor<'src>,
    /// Position before the most recent read.
    previous: Option<SourcePos>,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            cursor: Cursor::new(source),
            previous: None,
        }
    }

    /// Current position, suitable for [`seek`](Self::seek).
    #[inline]
    pub fn position(&self) -> SourcePos {
        self.cursor.position()
    }

    /// Rewind or advance to a saved position. Clears the unget slot.
    pub fn seek(&mut self, pos: SourcePos) {
        self.cursor.seek(pos);
        self.previous = None;
    }

    #[inline]
    pub fn line(&self) -> u32 {
        self.cursor.line()
    }

    /// Zero-length span at the current position.
    pub fn here(&self) -> Span {
        Span::point(self.cursor.line(), self.cursor.column())
    }

    /// Push the most recently read token back. Only one level is kept.
    pub fn unget(&mut self) {
        match self.previous.take() {
            Some(pos) => self.cursor.seek(pos),
            None => trace!("unget with no token to push back"),
        }
    }

    /// Consume the remainder of the current line, trimmed. Used for directives.
    pub fn rest_of_line(&mut self) -> &'src str {
        self.previous = None;
        self.cursor.eat_while(|c| c != '\n' && c != '\r').trim()
    }

    /// Read the next token.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn next_token(&mut self, hint: Option<&EnumDef>, allow_constants: bool) -> Result<Token> {
        let before = self.cursor.position();
        self.skip_trivia()?;
        let start = self.cursor.position();
        let token = self.scan_token(start, hint, allow_constants)?;
        self.previous = Some(before);
        Ok(token)
    }

    // =========================================
    // Trivia
    // =========================================

    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            self.cursor.skip_whitespace();
            if self.cursor.check_str("//") {
                self.cursor.eat_while(|c| c != '\n');
            } else if self.cursor.check_str("/*") {
                self.skip_block_comment()?;
            } else {
                return Ok(());
            }
        }
    }

    /// Skip a `/* ... */` comment, honouring nested comments.
    fn skip_block_comment(&mut self) -> Result<()> {
        let start = self.span_from(self.cursor.position());
        let mut depth = 0u32;
        loop {
            if self.cursor.check_str("/*") {
                self.cursor.advance();
                self.cursor.advance();
                depth += 1;
            } else if self.cursor.check_str("*/") {
                self.cursor.advance();
                self.cursor.advance();
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            } else if self.cursor.advance().is_none() {
                return Err(LexError::UnterminatedComment { span: start });
            }
        }
    }

    // =========================================
    // Dispatch
    // =========================================

    fn scan_token(
        &mut self,
        start: SourcePos,
        hint: Option<&EnumDef>,
        allow_constants: bool,
    ) -> Result<Token> {
        let Some(c) = self.cursor.peek() else {
            return Ok(Token::new(TokenKind::Eof, self.span_from(start)));
        };
        let next = self.cursor.peek_nth(1);
        let starts_number = |ch: Option<char>| ch.is_some_and(|d| d.is_ascii_digit());

        match c {
            '"' => self.scan_string(start),
            '\'' => self.scan_name(start),
            c if c.is_ascii_digit() => self.scan_number(start),
            '.' if starts_number(next) => self.scan_number(start),
            '+' | '-'
                if allow_constants
                    && (starts_number(next)
                        || (next == Some('.') && starts_number(self.cursor.peek_nth(2)))) =>
            {
                self.scan_number(start)
            }
            c if is_ident_start(c) => self.scan_identifier(start, hint, allow_constants),
            _ => self.scan_symbol(start),
        }
    }

    fn span_from(&self, start: SourcePos) -> Span {
        Span::new(start.line, start.column, self.cursor.offset() - start.offset)
    }

    fn constant(&self, value: Constant, start: SourcePos) -> Token {
        Token::new(TokenKind::Const(value), self.span_from(start))
    }

    // =========================================
    // Strings and names
    // =========================================

    fn scan_string(&mut self, start: SourcePos) -> Result<Token> {
        self.cursor.advance();
        let mut text = String::new();
        loop {
            match self.cursor.peek() {
                None | Some('\n') | Some('\r') => {
                    return Err(LexError::UnterminatedString {
                        span: self.span_from(start),
                    });
                }
                Some('"') => {
                    self.cursor.advance();
                    return Ok(self.constant(Constant::String(text), start));
                }
                Some('\\') => {
                    self.cursor.advance();
                    match self.cursor.advance() {
                        Some('n') => text.push('\n'),
                        Some('t') => text.push('\t'),
                        Some('\n') | None => {
                            return Err(LexError::UnterminatedString {
                                span: self.span_from(start),
                            });
                        }
                        Some(other) => text.push(other),
                    }
                }
                Some(ch) => {
                    self.cursor.advance();
                    text.push(ch);
                }
            }
            if text.chars().count() > MAX_STRING_CONST {
                return Err(LexError::StringTooLong {
                    max: MAX_STRING_CONST,
                    span: self.span_from(start),
                });
            }
        }
    }

    fn scan_name(&mut self, start: SourcePos) -> Result<Token> {
        let name = self.read_quoted_name(start)?;
        Ok(self.constant(Constant::Name(name), start))
    }

    /// Read `'text'` with the cursor on the opening quote.
    fn read_quoted_name(&mut self, start: SourcePos) -> Result<String> {
        self.cursor.advance();
        let text = self.cursor.eat_while(|c| c != '\'' && c != '\n' && c != '\r');
        if !self.cursor.eat('\'') {
            return Err(LexError::UnterminatedName {
                span: self.span_from(start),
            });
        }
        if text.len() >= NAME_SIZE {
            return Err(LexError::NameTooLong {
                max: NAME_SIZE - 1,
                span: self.span_from(start),
            });
        }
        Ok(text.to_string())
    }

    // =========================================
    // Numbers
    // =========================================

    fn scan_number(&mut self, start: SourcePos) -> Result<Token> {
        let value = self.read_number(start)?;
        Ok(self.constant(value, start))
    }

    /// Read an optionally signed decimal, hexadecimal, or floating-point number.
    fn read_number(&mut self, start: SourcePos) -> Result<Constant> {
        let begin = self.cursor.offset();
        let negative = self.cursor.eat('-');
        if !negative {
            self.cursor.eat('+');
        }

        if self.cursor.check_str("0x") || self.cursor.check_str("0X") {
            self.cursor.advance();
            self.cursor.advance();
            let digits = self.cursor.eat_while(|c| c.is_ascii_hexdigit());
            let value = u32::from_str_radix(digits, 16).map_err(|_| LexError::InvalidNumber {
                text: self.cursor.slice_from(begin).to_string(),
                span: self.span_from(start),
            })? as i32;
            return Ok(Constant::Int(if negative { value.wrapping_neg() } else { value }));
        }

        self.cursor.eat_while(|c| c.is_ascii_digit());
        let mut is_float = false;
        if self.cursor.peek() == Some('.') && self.cursor.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) {
            self.cursor.advance();
            self.cursor.eat_while(|c| c.is_ascii_digit());
            is_float = true;
        }
        if matches!(self.cursor.peek(), Some('e' | 'E')) {
            let exp_digit = match self.cursor.peek_nth(1) {
                Some('+' | '-') => self.cursor.peek_nth(2).is_some_and(|c| c.is_ascii_digit()),
                Some(c) => c.is_ascii_digit(),
                None => false,
            };
            if exp_digit {
                self.cursor.advance();
                if !self.cursor.eat('-') {
                    self.cursor.eat('+');
                }
                self.cursor.eat_while(|c| c.is_ascii_digit());
                is_float = true;
            }
        }

        let text = self.cursor.slice_from(begin);
        let invalid = || LexError::InvalidNumber {
            text: text.to_string(),
            span: self.span_from(start),
        };
        if is_float {
            let value: f32 = text.parse().map_err(|_| invalid())?;
            if !value.is_finite() {
                return Err(invalid());
            }
            Ok(Constant::Float(OrderedFloat(value)))
        } else {
            let value: i64 = text.parse().map_err(|_| invalid())?;
            let value = i32::try_from(value).map_err(|_| invalid())?;
            Ok(Constant::Int(value))
        }
    }

    // =========================================
    // Identifiers and built-in constants
    // =========================================

    fn scan_identifier(
        &mut self,
        start: SourcePos,
        hint: Option<&EnumDef>,
        allow_constants: bool,
    ) -> Result<Token> {
        let text = self.cursor.eat_while(is_ident_continue);
        if text.len() >= NAME_SIZE {
            return Err(LexError::IdentifierTooLong {
                max: NAME_SIZE - 1,
                span: self.span_from(start),
            });
        }

        if allow_constants {
            if let Some(def) = hint
                && let Some(value) = def.tag_value(text)
            {
                let value = Constant::Enum {
                    enum_name: def.name.clone(),
                    value,
                };
                return Ok(self.constant(value, start));
            }
            if let Some(value) = self.builtin_constant(text, start)? {
                return Ok(self.constant(value, start));
            }
        }

        Ok(Token::new(
            TokenKind::Identifier(text.to_string()),
            self.span_from(start),
        ))
    }

    /// Resolve the words that denote constants.
    fn builtin_constant(&mut self, word: &str, start: SourcePos) -> Result<Option<Constant>> {
        let value = match word.to_ascii_lowercase().as_str() {
            "true" => Constant::Bool(true),
            "false" => Constant::Bool(false),
            "none" => Constant::NoObject,
            "maxint" => Constant::Int(i32::MAX),
            "pi" => Constant::Float(OrderedFloat(std::f32::consts::PI)),
            "vect" if self.followed_by_paren() => {
                let [x, y, z] = self.read_triple(start, "vector")?;
                Constant::Vector([to_float(x), to_float(y), to_float(z)])
            }
            "rot" if self.followed_by_paren() => {
                let mut ints = [0i32; 3];
                for (slot, value) in ints.iter_mut().zip(self.read_triple(start, "rotator")?) {
                    *slot = match value {
                        Constant::Int(v) => v,
                        _ => {
                            return Err(LexError::MalformedConstant {
                                what: "rotator",
                                span: self.span_from(start),
                            });
                        }
                    };
                }
                Constant::Rotator(ints)
            }
            "class" if self.cursor.peek() == Some('\'') => {
                let name = self.read_quoted_name(start)?;
                if name.is_empty() || !name.chars().all(is_ident_continue) {
                    return Err(LexError::MalformedConstant {
                        what: "class",
                        span: self.span_from(start),
                    });
                }
                Constant::Class(name)
            }
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    /// Whether the next non-blank character is `(`, without consuming anything.
    fn followed_by_paren(&mut self) -> bool {
        let saved = self.cursor.position();
        self.cursor.skip_whitespace();
        let paren = self.cursor.peek() == Some('(');
        self.cursor.seek(saved);
        paren
    }

    /// Read `( n , n , n )` of signed numbers.
    fn read_triple(&mut self, start: SourcePos, what: &'static str) -> Result<[Constant; 3]> {
        let malformed = |lexer: &Self| LexError::MalformedConstant {
            what,
            span: lexer.span_from(start),
        };
        self.cursor.skip_whitespace();
        if !self.cursor.eat('(') {
            return Err(malformed(self));
        }
        let mut parts = Vec::with_capacity(3);
        for i in 0..3 {
            self.cursor.skip_whitespace();
            let numeric = self.cursor.check(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.'));
            if !numeric {
                return Err(malformed(self));
            }
            parts.push(self.read_number(start)?);
            self.cursor.skip_whitespace();
            let sep = if i == 2 { ')' } else { ',' };
            if !self.cursor.eat(sep) {
                return Err(malformed(self));
            }
        }
        parts.try_into().map_err(|_| malformed(self))
    }

    // =========================================
    // Symbols
    // =========================================

    fn scan_symbol(&mut self, start: SourcePos) -> Result<Token> {
        let symbol = LONG_SYMBOLS
            .iter()
            .chain(SHORT_SYMBOLS)
            .find(|s| self.cursor.check_str(s))
            .copied();
        match symbol {
            Some(s) => {
                for _ in 0..s.len() {
                    self.cursor.advance();
                }
                Ok(Token::new(TokenKind::Symbol(s), self.span_from(start)))
            }
            None => {
                let ch = self.cursor.peek().unwrap_or('\0');
                self.cursor.advance();
                Err(LexError::UnexpectedChar {
                    ch,
                    span: self.span_from(start),
                })
            }
        }
    }
}

fn to_float(value: Constant) -> OrderedFloat<f32> {
    match value {
        Constant::Float(f) => f,
        Constant::Int(i) => OrderedFloat(i as f32),
        _ => OrderedFloat(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_tokens(source: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(source);
        let mut out = Vec::new();
        loop {
            let tok = lexer.next_token(None, true).unwrap();
            if tok.is_eof() {
                return out;
            }
            out.push(tok.kind);
        }
    }

    #[test]
    fn identifiers_symbols_and_numbers() {
        let toks = all_tokens("Health += 10;");
        assert_eq!(
            toks,
            vec![
                TokenKind::Identifier("Health".into()),
                TokenKind::Symbol("+="),
                TokenKind::Const(Constant::Int(10)),
                TokenKind::Symbol(";"),
            ]
        );
    }

    #[test]
    fn signed_numbers_only_where_constants_allowed() {
        let mut lexer = Lexer::new("-5");
        let tok = lexer.next_token(None, false).unwrap();
        assert!(tok.is_symbol("-"));

        let mut lexer = Lexer::new("-5");
        let tok = lexer.next_token(None, true).unwrap();
        assert_eq!(tok.kind, TokenKind::Const(Constant::Int(-5)));
    }

    #[test]
    fn floats_and_hex() {
        let toks = all_tokens("1.5 0x1F 2e3 .25 1e-7");
        assert_eq!(toks[0], TokenKind::Const(Constant::Float(OrderedFloat(1.5))));
        assert_eq!(toks[1], TokenKind::Const(Constant::Int(31)));
        assert_eq!(toks[2], TokenKind::Const(Constant::Float(OrderedFloat(2000.0))));
        assert_eq!(toks[3], TokenKind::Const(Constant::Float(OrderedFloat(0.25))));
        assert_eq!(toks[4], TokenKind::Const(Constant::Float(OrderedFloat(1e-7))));
    }

    #[test]
    fn integer_overflow_is_an_error() {
        let mut lexer = Lexer::new("4294967296");
        assert!(matches!(
            lexer.next_token(None, true),
            Err(LexError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn nested_block_comments() {
        let toks = all_tokens("a /* outer /* inner */ still */ b // tail\n c");
        assert_eq!(toks.len(), 3);
    }

    #[test]
    fn unterminated_comment_reports_start() {
        let mut lexer = Lexer::new("x\n  /* open /* */");
        lexer.next_token(None, true).unwrap();
        let err = lexer.next_token(None, true).unwrap_err();
        assert_eq!(err, LexError::UnterminatedComment { span: Span::new(2, 3, 0) });
    }

    #[test]
    fn strings_names_and_escapes() {
        let toks = all_tokens(r#""say \"hi\"\n" 'Begin'"#);
        assert_eq!(toks[0], TokenKind::Const(Constant::String("say \"hi\"\n".into())));
        assert_eq!(toks[1], TokenKind::Const(Constant::Name("Begin".into())));
    }

    #[test]
    fn unterminated_string_at_end_of_line() {
        let mut lexer = Lexer::new("\"abc\nrest\"");
        assert!(matches!(
            lexer.next_token(None, true),
            Err(LexError::UnterminatedString { .. })
        ));
    }

    #[test]
    fn overlong_identifier() {
        let source = "a".repeat(NAME_SIZE);
        let mut lexer = Lexer::new(&source);
        assert!(matches!(
            lexer.next_token(None, true),
            Err(LexError::IdentifierTooLong { .. })
        ));
    }

    #[test]
    fn built_in_constants() {
        let toks = all_tokens("true None vect(1, -2.5, 3) rot(0,16384,-1) class'Pawn' MaxInt");
        assert_eq!(toks[0], TokenKind::Const(Constant::Bool(true)));
        assert_eq!(toks[1], TokenKind::Const(Constant::NoObject));
        assert_eq!(
            toks[2],
            TokenKind::Const(Constant::Vector([
                OrderedFloat(1.0),
                OrderedFloat(-2.5),
                OrderedFloat(3.0)
            ]))
        );
        assert_eq!(toks[3], TokenKind::Const(Constant::Rotator([0, 16384, -1])));
        assert_eq!(toks[4], TokenKind::Const(Constant::Class("Pawn".into())));
        assert_eq!(toks[5], TokenKind::Const(Constant::Int(i32::MAX)));
    }

    #[test]
    fn built_in_words_stay_identifiers_without_constants() {
        let mut lexer = Lexer::new("true");
        let tok = lexer.next_token(None, false).unwrap();
        assert!(tok.is_ident("true"));
    }

    #[test]
    fn enum_hint_reclassifies_tags() {
        let mut def = EnumDef::new("EPhysics");
        def.tags = vec!["PHYS_None".into(), "PHYS_Walking".into()];

        let mut lexer = Lexer::new("PHYS_Walking");
        let tok = lexer.next_token(Some(&def), true).unwrap();
        assert_eq!(
            tok.kind,
            TokenKind::Const(Constant::Enum {
                enum_name: "EPhysics".into(),
                value: 1
            })
        );

        let mut lexer = Lexer::new("PHYS_Walking");
        assert!(lexer.next_token(None, true).unwrap().is_ident("PHYS_Walking"));
    }

    #[test]
    fn unget_restores_one_token() {
        let mut lexer = Lexer::new("a b");
        lexer.next_token(None, true).unwrap();
        let b = lexer.next_token(None, true).unwrap();
        lexer.unget();
        assert_eq!(lexer.next_token(None, true).unwrap(), b);
    }

    #[test]
    fn seek_rewinds_to_saved_position() {
        let mut lexer = Lexer::new("first second third");
        lexer.next_token(None, true).unwrap();
        let mark = lexer.position();
        lexer.next_token(None, true).unwrap();
        lexer.next_token(None, true).unwrap();
        lexer.seek(mark);
        assert!(lexer.next_token(None, true).unwrap().is_ident("second"));
    }

    #[test]
    fn directive_line() {
        let mut lexer = Lexer::new("#exec obj load file=x.u\nclass");
        assert!(lexer.next_token(None, true).unwrap().is_symbol("#"));
        assert_eq!(lexer.rest_of_line(), "exec obj load file=x.u");
        assert!(lexer.next_token(None, true).unwrap().is_ident("class"));
    }

    #[test]
    fn unexpected_character() {
        let mut lexer = Lexer::new("`");
        assert!(matches!(
            lexer.next_token(None, true),
            Err(LexError::UnexpectedChar { ch: '`', .. })
        ));
    }
}
