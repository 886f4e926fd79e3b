//! Context-sensitive lexer for the UnrealScript-style class language.
//!
//! The compiler drives this crate token by token: there is no separate
//! parse tree. Each read states whether constants are acceptable at that
//! point (so `-5` lexes as a negative constant only where an operand may
//! start) and may pass an enumeration as a type hint so bare tags become
//! byte constants.
//!
//! ```
//! use uscript_parser::{Constant, Lexer, TokenKind};
//!
//! let mut lexer = Lexer::new("x = -5;");
//! assert!(lexer.next_token(None, true).unwrap().is_ident("x"));
//! assert!(lexer.next_token(None, false).unwrap().is_symbol("="));
//! let tok = lexer.next_token(None, true).unwrap();
//! assert_eq!(tok.kind, TokenKind::Const(Constant::Int(-5)));
//! ```

pub mod lexer;

pub use lexer::{Constant, Lexer, SourcePos, Token, TokenKind};
