//! Lexical analysis.

mod cursor;
#[allow(clippy::module_inception)]
mod lexer;
mod token;

pub use cursor::SourcePos;
pub use lexer::Lexer;
pub use token::{Constant, Token, TokenKind};
