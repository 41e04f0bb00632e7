//! MySQL DDL tokenizer and parser.

mod lexer;
mod parser;

pub use lexer::{tokenize, Lexer, Token, TokenKind, KEYWORDS};
pub use parser::{parse_sql, parse_tokens, Parser, SqlParseError};
