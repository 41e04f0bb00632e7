//! SQL lexer for tokenizing MySQL DDL scripts.

use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

/// Words the lexer classifies as keywords. Everything else is an identifier.
pub const KEYWORDS: &[&str] = &[
    "CREATE",
    "TABLE",
    "ALTER",
    "ADD",
    "CONSTRAINT",
    "FOREIGN",
    "KEY",
    "REFERENCES",
    "PRIMARY",
    "IF",
    "NOT",
    "EXISTS",
    "NULL",
    "DEFAULT",
    "AUTO_INCREMENT",
    "UNSIGNED",
    "ENGINE",
    "UNIQUE",
    "INDEX",
];

/// Token categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Keyword,
    Identifier,
    QuotedString,
    Number,
    LParen,
    RParen,
    Comma,
    Semicolon,
    Equals,
}

impl TokenKind {
    pub fn describe(self) -> &'static str {
        match self {
            Self::Keyword => "keyword",
            Self::Identifier => "identifier",
            Self::QuotedString => "quoted string",
            Self::Number => "number",
            Self::LParen => "'('",
            Self::RParen => "')'",
            Self::Comma => "','",
            Self::Semicolon => "';'",
            Self::Equals => "'='",
        }
    }

    /// Identifiers and quoted strings can both name a table or column.
    pub fn is_name(self) -> bool {
        matches!(self, Self::Identifier | Self::QuotedString)
    }
}

/// A classified lexical unit. `position` is the byte offset of the token start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub position: usize,
}

impl Token {
    pub fn new(kind: TokenKind, value: impl Into<String>, position: usize) -> Self {
        Self {
            kind,
            value: value.into(),
            position,
        }
    }

    pub fn is_keyword(&self, word: &str) -> bool {
        self.kind == TokenKind::Keyword && self.value == word
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Keyword | TokenKind::Identifier | TokenKind::Number => write!(
                f,
                "{} {} at offset {}",
                self.kind.describe(),
                self.value,
                self.position
            ),
            TokenKind::QuotedString => {
                write!(f, "quoted string {:?} at offset {}", self.value, self.position)
            }
            _ => write!(f, "{} at offset {}", self.kind.describe(), self.position),
        }
    }
}

/// SQL lexer.
pub struct Lexer<'a> {
    chars: Peekable<CharIndices<'a>>,
    current: Option<(usize, char)>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        let mut chars = input.char_indices().peekable();
        let current = chars.next();
        Self { chars, current }
    }

    fn advance(&mut self) {
        self.current = self.chars.next();
    }

    fn current_char(&self) -> Option<char> {
        self.current.map(|(_, c)| c)
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.current_char() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_word(&mut self) -> String {
        let mut word = String::new();
        while let Some(c) = self.current_char() {
            if c.is_alphanumeric() || c == '_' {
                word.push(c);
                self.advance();
            } else {
                break;
            }
        }
        word
    }

    /// Reads up to the matching quote. A backslash passes the next character
    /// through literally. An unterminated string runs to end of input.
    fn read_quoted(&mut self, quote: char) -> String {
        self.advance(); // skip opening quote
        let mut s = String::new();
        while let Some(c) = self.current_char() {
            if c == quote {
                self.advance(); // skip closing quote
                break;
            } else if c == '\\' {
                self.advance();
                if let Some(escaped) = self.current_char() {
                    s.push(escaped);
                    self.advance();
                }
            } else {
                s.push(c);
                self.advance();
            }
        }
        s
    }

    fn read_number(&mut self) -> String {
        let mut num = String::new();
        while let Some(c) = self.current_char() {
            if c.is_ascii_digit() || c == '.' {
                num.push(c);
                self.advance();
            } else {
                break;
            }
        }
        num
    }

    fn keyword_or_ident(word: &str, position: usize) -> Token {
        let upper = word.to_uppercase();
        let kind = if KEYWORDS.contains(&upper.as_str()) {
            TokenKind::Keyword
        } else {
            TokenKind::Identifier
        };
        Token::new(kind, upper, position)
    }

    /// Next token, or `None` at end of input.
    pub fn next_token(&mut self) -> Option<Token> {
        loop {
            self.skip_whitespace();

            let (pos, c) = self.current?;
            let punct = match c {
                '(' => Some(TokenKind::LParen),
                ')' => Some(TokenKind::RParen),
                ',' => Some(TokenKind::Comma),
                ';' => Some(TokenKind::Semicolon),
                '=' => Some(TokenKind::Equals),
                _ => None,
            };
            if let Some(kind) = punct {
                self.advance();
                return Some(Token::new(kind, c.to_string(), pos));
            }

            match c {
                '"' | '\'' | '`' => {
                    let s = self.read_quoted(c);
                    return Some(Token::new(TokenKind::QuotedString, s, pos));
                }
                c if c.is_alphabetic() || c == '_' => {
                    let word = self.read_word();
                    return Some(Self::keyword_or_ident(&word, pos));
                }
                c if c.is_ascii_digit() => {
                    let num = self.read_number();
                    return Some(Token::new(TokenKind::Number, num, pos));
                }
                _ => {
                    // Skip unknown characters
                    self.advance();
                }
            }
        }
    }

    /// Collect all tokens.
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token() {
            tokens.push(token);
        }
        tokens
    }
}

/// Tokenize a whole DDL script. Never fails: unrecognized characters are dropped.
pub fn tokenize(input: &str) -> Vec<Token> {
    Lexer::new(input).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(tokens: &[Token]) -> Vec<TokenKind> {
        tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_simple_create_table() {
        let tokens = tokenize("CREATE TABLE users (id INT);");

        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Keyword,
                TokenKind::Keyword,
                TokenKind::Identifier,
                TokenKind::LParen,
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::RParen,
                TokenKind::Semicolon,
            ]
        );
        assert_eq!(tokens[0].value, "CREATE");
        assert_eq!(tokens[2].value, "USERS");
        assert_eq!(tokens[2].position, 13);
        assert_eq!(tokens[4].value, "ID");
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        let tokens = tokenize("create Table if not exists");
        assert!(tokens.iter().all(|t| t.kind == TokenKind::Keyword));
        assert_eq!(tokens[1].value, "TABLE");
        assert_eq!(tokens[4].value, "EXISTS");
    }

    #[test]
    fn test_quote_styles_are_equivalent() {
        for sql in ["`User Table`", "'User Table'", "\"User Table\""] {
            let tokens = tokenize(sql);
            assert_eq!(tokens.len(), 1);
            assert_eq!(tokens[0].kind, TokenKind::QuotedString);
            assert_eq!(tokens[0].value, "User Table");
        }
    }

    #[test]
    fn test_escaped_quote() {
        let tokens = tokenize(r"'it\'s' `a\\b`");
        assert_eq!(tokens[0].value, "it's");
        assert_eq!(tokens[1].value, r"a\b");
    }

    #[test]
    fn test_quoted_keeps_case_and_keywords() {
        let tokens = tokenize("`Table` `key`");
        assert_eq!(tokens[0].kind, TokenKind::QuotedString);
        assert_eq!(tokens[0].value, "Table");
        assert_eq!(tokens[1].value, "key");
    }

    #[test]
    fn test_numbers_and_punctuation() {
        let tokens = tokenize("DECIMAL(10,2) = 1.5;");
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::Identifier,
                TokenKind::LParen,
                TokenKind::Number,
                TokenKind::Comma,
                TokenKind::Number,
                TokenKind::RParen,
                TokenKind::Equals,
                TokenKind::Number,
                TokenKind::Semicolon,
            ]
        );
        assert_eq!(tokens[7].value, "1.5");
    }

    #[test]
    fn test_unknown_characters_are_skipped() {
        let tokens = tokenize("a @ b # -c");
        let values: Vec<&str> = tokens.iter().map(|t| t.value.as_str()).collect();
        assert_eq!(values, vec!["A", "B", "C"]);
        assert_eq!(tokens[2].position, 9);
    }

    #[test]
    fn test_unterminated_string_runs_to_end() {
        let tokens = tokenize("'abc");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].value, "abc");
    }
}
