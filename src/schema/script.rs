//! DDL script splitting.
//!
//! Scripts are tokenized with sqlparser in the resolved dialect so that
//! semicolons inside string literals, quoted identifiers and comments never
//! terminate a statement.

use crate::dialect::Dialect;
use crate::error::{DbError, DbResult};
use sqlparser::dialect::{
    Dialect as SqlDialect, GenericDialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect,
};
use sqlparser::tokenizer::{Token, Tokenizer, Whitespace};

/// Get the tokenizer dialect for the resolved SQL dialect.
fn tokenizer_dialect(dialect: Dialect) -> Box<dyn SqlDialect> {
    match dialect {
        Dialect::Postgres => Box::new(PostgreSqlDialect {}),
        Dialect::MySql | Dialect::MariaDb => Box::new(MySqlDialect {}),
        Dialect::Sqlite => Box::new(SQLiteDialect {}),
        Dialect::Db2 => Box::new(GenericDialect {}),
    }
}

/// Split a script into individual statements, in script order.
///
/// Chunks holding only whitespace or comments are dropped. Statement text is
/// rebuilt from the tokens, so the original quoting is kept.
pub fn split_statements(script: &str, dialect: Dialect) -> DbResult<Vec<String>> {
    let sql_dialect = tokenizer_dialect(dialect);
    let tokens = Tokenizer::new(sql_dialect.as_ref(), script)
        .with_unescape(false)
        .tokenize()
        .map_err(|e| {
            DbError::configuration(
                format!("Failed to tokenize DDL script: {}", e),
                "Check the script for unterminated strings or comments",
            )
        })?;

    let mut statements = Vec::new();
    let mut current: Vec<Token> = Vec::new();
    for token in tokens {
        if token == Token::SemiColon {
            push_statement(&mut statements, &current);
            current.clear();
        } else {
            current.push(token);
        }
    }
    push_statement(&mut statements, &current);
    Ok(statements)
}

fn push_statement(statements: &mut Vec<String>, tokens: &[Token]) {
    let has_content = tokens.iter().any(|t| !matches!(t, Token::Whitespace(_)));
    if !has_content {
        return;
    }

    // Leading comments belong to the script, not the statement
    let start = tokens
        .iter()
        .position(|t| !matches!(t, Token::Whitespace(_)))
        .unwrap_or(0);
    let text: String = tokens[start..]
        .iter()
        .map(|t| {
            if is_line_comment(t) {
                "\n".to_string()
            } else {
                t.to_string()
            }
        })
        .collect();
    let text = text.trim();
    if !text.is_empty() {
        statements.push(text.to_string());
    }
}

fn is_line_comment(token: &Token) -> bool {
    matches!(
        token,
        Token::Whitespace(Whitespace::SingleLineComment { .. })
    )
}
