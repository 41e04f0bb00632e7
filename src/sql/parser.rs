//! Recursive-descent parser for CREATE TABLE and ALTER TABLE statements.

use std::collections::HashMap;

use super::lexer::{tokenize, Token, TokenKind};
use crate::ast::{ForeignKeyTarget, ParsedConstraint, ParsedField, ParsedTable};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SqlParseError {
    #[error("Expected {expected}, found {found}")]
    Expected { expected: String, found: Token },
    #[error("Unexpected end of input, expected {expected}")]
    UnexpectedEof { expected: String },
}

/// Parse a DDL script into table definitions, in declaration order.
pub fn parse_sql(input: &str) -> Result<Vec<ParsedTable>, SqlParseError> {
    parse_tokens(tokenize(input))
}

/// Parse an already tokenized script.
pub fn parse_tokens(tokens: Vec<Token>) -> Result<Vec<ParsedTable>, SqlParseError> {
    Parser::new(tokens).parse()
}

/// Parser state. Tables live in an append-only arena; `index` maps a table
/// name to its slot so ALTER TABLE can attach constraints after the fact.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    tables: Vec<ParsedTable>,
    index: HashMap<String, usize>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            tables: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current().is_some_and(|t| t.kind == kind)
    }

    fn check_keyword(&self, word: &str) -> bool {
        self.current().is_some_and(|t| t.is_keyword(word))
    }

    fn consume_matching(
        &mut self,
        matches: impl Fn(&Token) -> bool,
        expected: &str,
    ) -> Result<Token, SqlParseError> {
        match self.tokens.get(self.pos) {
            None => Err(SqlParseError::UnexpectedEof {
                expected: expected.to_string(),
            }),
            Some(tok) if matches(tok) => {
                let tok = tok.clone();
                self.pos += 1;
                Ok(tok)
            }
            Some(tok) => Err(SqlParseError::Expected {
                expected: expected.to_string(),
                found: tok.clone(),
            }),
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, SqlParseError> {
        self.consume_matching(|t| t.kind == kind, kind.describe())
    }

    fn expect_keyword(&mut self, word: &str) -> Result<(), SqlParseError> {
        self.consume_matching(|t| t.is_keyword(word), &format!("keyword {word}"))
            .map(|_| ())
    }

    fn expect_name(&mut self, what: &str) -> Result<String, SqlParseError> {
        self.consume_matching(|t| t.kind.is_name(), what)
            .map(|t| t.value)
    }

    fn optional_name(&mut self) -> Option<String> {
        match self.current() {
            Some(t) if t.kind.is_name() => {
                let name = t.value.clone();
                self.advance();
                Some(name)
            }
            _ => None,
        }
    }

    pub fn parse(mut self) -> Result<Vec<ParsedTable>, SqlParseError> {
        while let Some(tok) = self.current() {
            if tok.is_keyword("CREATE") {
                self.parse_create_table()?;
            } else if tok.is_keyword("ALTER") {
                self.parse_alter_table()?;
            } else {
                self.advance();
            }
        }
        Ok(self.tables)
    }

    fn register(&mut self, table: ParsedTable) {
        self.index.insert(table.name.clone(), self.tables.len());
        self.tables.push(table);
    }

    fn parse_create_table(&mut self) -> Result<(), SqlParseError> {
        self.expect_keyword("CREATE")?;
        self.expect_keyword("TABLE")?;

        if self.check_keyword("IF") {
            self.advance();
            self.expect_keyword("NOT")?;
            self.expect_keyword("EXISTS")?;
        }

        let name = self.expect_name("table name")?;
        self.expect(TokenKind::LParen)?;

        let mut table = ParsedTable::new(name);
        while !self.check(TokenKind::RParen) {
            self.parse_table_item(&mut table)?;

            if self.check(TokenKind::Comma) {
                self.advance();
            } else if !self.check(TokenKind::RParen) {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;

        // Table options (ENGINE=, DEFAULT CHARSET=, ...) are not modeled
        self.skip_statement();

        debug!(
            table = %table.name,
            fields = table.fields.len(),
            constraints = table.constraints.len(),
            "parsed CREATE TABLE"
        );
        self.register(table);
        Ok(())
    }

    fn parse_table_item(&mut self, table: &mut ParsedTable) -> Result<(), SqlParseError> {
        let keyword = match self.current() {
            Some(t) if t.kind == TokenKind::Keyword => Some(t.value.as_str()),
            _ => None,
        };

        match keyword {
            Some("PRIMARY") => {
                let pk = self.parse_primary_key()?;
                table.constraints.push(pk);
            }
            Some("KEY") | Some("INDEX") => {
                self.advance();
                let name = self.optional_name();
                let columns = self.parse_column_list()?;
                table.constraints.push(ParsedConstraint::Key { name, columns });
            }
            Some("UNIQUE") => {
                let unique = self.parse_unique(None)?;
                table.constraints.push(unique);
            }
            Some("CONSTRAINT") => {
                let constraint = self.parse_named_constraint(table)?;
                table.constraints.push(constraint);
            }
            Some("FOREIGN") => {
                let name = format!("{}_ibfk_{}", table.name, foreign_key_count(table) + 1);
                let fk = self.parse_foreign_key(name)?;
                table.constraints.push(fk);
            }
            _ => {
                let field = self.parse_field()?;
                table.fields.push(field);
            }
        }
        Ok(())
    }

    fn parse_primary_key(&mut self) -> Result<ParsedConstraint, SqlParseError> {
        self.expect_keyword("PRIMARY")?;
        self.expect_keyword("KEY")?;
        let columns = self.parse_column_list()?;
        Ok(ParsedConstraint::PrimaryKey { columns })
    }

    /// `UNIQUE [KEY|INDEX] [name] (cols)`. `fallback_name` comes from a
    /// preceding `CONSTRAINT name`.
    fn parse_unique(
        &mut self,
        fallback_name: Option<String>,
    ) -> Result<ParsedConstraint, SqlParseError> {
        self.expect_keyword("UNIQUE")?;
        if self.check_keyword("KEY") || self.check_keyword("INDEX") {
            self.advance();
        }
        let name = self.optional_name().or(fallback_name);
        let columns = self.parse_column_list()?;
        Ok(ParsedConstraint::Unique { name, columns })
    }

    /// `CONSTRAINT [name] PRIMARY KEY|UNIQUE|FOREIGN KEY ...` inside a table body.
    fn parse_named_constraint(
        &mut self,
        table: &ParsedTable,
    ) -> Result<ParsedConstraint, SqlParseError> {
        self.expect_keyword("CONSTRAINT")?;
        let name = self.optional_name();

        if self.check_keyword("PRIMARY") {
            self.parse_primary_key()
        } else if self.check_keyword("UNIQUE") {
            self.parse_unique(name)
        } else if self.check_keyword("FOREIGN") {
            let name = name.unwrap_or_else(|| {
                format!("{}_ibfk_{}", table.name, foreign_key_count(table) + 1)
            });
            self.parse_foreign_key(name)
        } else {
            let expected = "PRIMARY KEY, UNIQUE or FOREIGN KEY";
            match self.current() {
                Some(tok) => Err(SqlParseError::Expected {
                    expected: expected.to_string(),
                    found: tok.clone(),
                }),
                None => Err(SqlParseError::UnexpectedEof {
                    expected: expected.to_string(),
                }),
            }
        }
    }

    /// `FOREIGN KEY (cols) REFERENCES table (cols) [ON DELETE ...] [ON UPDATE ...]`
    fn parse_foreign_key(&mut self, name: String) -> Result<ParsedConstraint, SqlParseError> {
        self.expect_keyword("FOREIGN")?;
        self.expect_keyword("KEY")?;
        let columns = self.parse_column_list()?;
        self.expect_keyword("REFERENCES")?;
        let table = self.expect_name("referenced table name")?;
        let ref_columns = self.parse_column_list()?;
        self.skip_reference_actions();

        Ok(ParsedConstraint::ForeignKey {
            name,
            columns,
            references: ForeignKeyTarget {
                table,
                columns: ref_columns,
            },
        })
    }

    fn parse_field(&mut self) -> Result<ParsedField, SqlParseError> {
        let name = self.expect_name("column name")?;
        let mut typ = self
            .consume_matching(
                |t| {
                    matches!(
                        t.kind,
                        TokenKind::Identifier | TokenKind::Keyword | TokenKind::QuotedString
                    )
                },
                "column type",
            )?
            .value;

        if self.check(TokenKind::LParen) {
            self.advance();
            let mut args = Vec::new();
            loop {
                let arg = self.consume_matching(
                    |t| {
                        matches!(
                            t.kind,
                            TokenKind::Number | TokenKind::Identifier | TokenKind::QuotedString
                        )
                    },
                    "type size",
                )?;
                if arg.kind == TokenKind::QuotedString {
                    args.push(quote_type_argument(&arg.value));
                } else {
                    args.push(arg.value);
                }
                if self.check(TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
            self.expect(TokenKind::RParen)?;
            typ = format!("{}({})", typ, args.join(","));
        }

        let mut field = ParsedField::new(name, typ);

        loop {
            let current = self.current().map(|t| (t.kind, t.value.as_str()));
            match current {
                None | Some((TokenKind::Comma, _)) | Some((TokenKind::RParen, _)) => break,
                Some((TokenKind::LParen, _)) => self.skip_parenthesized(),
                Some((TokenKind::Keyword, "UNSIGNED")) => {
                    self.advance();
                    field.unsigned = true;
                }
                Some((TokenKind::Keyword, "AUTO_INCREMENT")) => {
                    self.advance();
                    field.auto_increment = true;
                }
                Some((TokenKind::Keyword, "NOT")) => {
                    self.advance();
                    self.expect_keyword("NULL")?;
                    field.nullable = false;
                }
                Some((TokenKind::Keyword, "NULL")) => {
                    self.advance();
                    field.nullable = true;
                }
                Some((TokenKind::Keyword, "DEFAULT")) => {
                    self.advance();
                    field.default = Some(self.parse_default_value()?);
                }
                // COMMENT '...', ON UPDATE ..., CHARACTER SET ... and the like
                Some(_) => self.advance(),
            }
        }

        Ok(field)
    }

    /// A quoted string, number or bare word is kept verbatim; `NULL` yields
    /// the literal string "NULL".
    fn parse_default_value(&mut self) -> Result<String, SqlParseError> {
        self.consume_matching(
            |t| {
                matches!(
                    t.kind,
                    TokenKind::QuotedString | TokenKind::Number | TokenKind::Identifier
                ) || t.is_keyword("NULL")
            },
            "default value",
        )
        .map(|t| t.value)
    }

    /// `( col [, col]* )`. Tokens that cannot name a column are dropped,
    /// including parenthesized prefix lengths such as `name(10)`.
    fn parse_column_list(&mut self) -> Result<Vec<String>, SqlParseError> {
        self.expect(TokenKind::LParen)?;
        let mut cols = Vec::new();

        loop {
            match self.current() {
                None => {
                    return Err(SqlParseError::UnexpectedEof {
                        expected: TokenKind::RParen.describe().to_string(),
                    });
                }
                Some(t) if t.kind == TokenKind::RParen => {
                    self.advance();
                    break;
                }
                Some(t) if t.kind == TokenKind::LParen => self.skip_parenthesized(),
                Some(t) if t.kind.is_name() => {
                    cols.push(t.value.clone());
                    self.advance();
                }
                Some(_) => self.advance(),
            }
        }

        Ok(cols)
    }

    /// ALTER TABLE t ADD CONSTRAINT name FOREIGN KEY (cols) REFERENCES r (cols)
    fn parse_alter_table(&mut self) -> Result<(), SqlParseError> {
        self.expect_keyword("ALTER")?;
        self.expect_keyword("TABLE")?;
        let table_name = self.expect_name("table name")?;
        self.expect_keyword("ADD")?;
        self.expect_keyword("CONSTRAINT")?;
        let name = self.expect_name("constraint name")?;
        let fk = self.parse_foreign_key(name)?;

        match self.index.get(&table_name) {
            Some(&slot) => self.tables[slot].constraints.push(fk),
            None => debug!(
                table = %table_name,
                constraint = fk.name().unwrap_or_default(),
                "dropping foreign key on undeclared table"
            ),
        }
        Ok(())
    }

    fn skip_reference_actions(&mut self) {
        while self
            .current()
            .is_some_and(|t| t.kind == TokenKind::Identifier && t.value == "ON")
        {
            self.advance(); // ON
            self.advance(); // DELETE | UPDATE
            let two_words = self.current().is_some_and(|t| {
                t.kind == TokenKind::Identifier && (t.value == "SET" || t.value == "NO")
            });
            self.advance();
            if two_words {
                self.advance();
            }
        }
    }

    fn skip_parenthesized(&mut self) {
        let mut depth = 0usize;
        while let Some(tok) = self.current() {
            match tok.kind {
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => depth = depth.saturating_sub(1),
                _ => {}
            }
            self.advance();
            if depth == 0 {
                break;
            }
        }
    }

    fn skip_statement(&mut self) {
        while let Some(tok) = self.current() {
            let done = tok.kind == TokenKind::Semicolon;
            self.advance();
            if done {
                break;
            }
        }
    }
}

/// Re-quote a string type argument so `ENUM('a b')` survives rendering.
fn quote_type_argument(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        if c == '\'' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('\'');
    quoted
}

fn foreign_key_count(table: &ParsedTable) -> usize {
    table
        .constraints
        .iter()
        .filter(|c| matches!(c, ParsedConstraint::ForeignKey { .. }))
        .count()
}
