//! Contract Tokenizer
//!
//! Produces located tokens for the contract grammar. The syntax uses two
//! non-ASCII operators: `𝝐` (U+1D750) for the empty effect/expression and
//! `·` (U+00B7) for sequencing.

use crate::{Error, Result};

/// Epsilon operator as written in contract sources
pub const EPSILON_CHAR: char = '\u{1D750}';

/// Sequencing operator as written in contract sources
pub const SEQ_CHAR: char = '\u{00B7}';

/// Token kinds of the contract grammar
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifier or keyword (`Post`, `Future`, `TRUE`, `consume` are
    /// recognized by the parser, not the lexer)
    Ident(String),
    /// Integer literal
    Num(i64),
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `,`
    Comma,
    /// `:`
    Colon,
    /// `=`
    Eq,
    /// `!`
    Bang,
    /// `_` (the any-event wildcard)
    Underscore,
    /// `\/`
    Union,
    /// `·`
    Seq,
    /// `^*`
    Star,
    /// `𝝐`
    Epsilon,
    /// End of input
    Eof,
}

impl TokenKind {
    /// Surface form used in error messages
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("'{}'", name),
            TokenKind::Num(n) => format!("'{}'", n),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::Comma => "','".to_string(),
            TokenKind::Colon => "':'".to_string(),
            TokenKind::Eq => "'='".to_string(),
            TokenKind::Bang => "'!'".to_string(),
            TokenKind::Underscore => "'_'".to_string(),
            TokenKind::Union => "'\\/'".to_string(),
            TokenKind::Seq => "'\u{00B7}'".to_string(),
            TokenKind::Star => "'^*'".to_string(),
            TokenKind::Epsilon => "'\u{1D750}'".to_string(),
            TokenKind::Eof => "end of input".to_string(),
        }
    }
}

/// A token with its source position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Token kind
    pub kind: TokenKind,
    /// 1-based source line
    pub line: usize,
    /// 1-based source column (in characters)
    pub column: usize,
}

/// Tokenize a contract block.
///
/// `start_line` positions errors relative to the enclosing file when the
/// block was extracted from a larger source.
pub fn tokenize(text: &str, start_line: usize) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    let mut line = start_line;
    let mut column = 1;

    while let Some(&c) = chars.peek() {
        let (tok_line, tok_column) = (line, column);
        match c {
            '\n' => {
                chars.next();
                line += 1;
                column = 1;
                continue;
            }
            c if c.is_whitespace() => {
                chars.next();
                column += 1;
                continue;
            }
            '(' | ')' | ',' | ':' | '=' | '!' => {
                chars.next();
                column += 1;
                let kind = match c {
                    '(' => TokenKind::LParen,
                    ')' => TokenKind::RParen,
                    ',' => TokenKind::Comma,
                    ':' => TokenKind::Colon,
                    '=' => TokenKind::Eq,
                    _ => TokenKind::Bang,
                };
                tokens.push(Token { kind, line: tok_line, column: tok_column });
            }
            SEQ_CHAR => {
                chars.next();
                column += 1;
                tokens.push(Token { kind: TokenKind::Seq, line: tok_line, column: tok_column });
            }
            EPSILON_CHAR => {
                chars.next();
                column += 1;
                tokens.push(Token { kind: TokenKind::Epsilon, line: tok_line, column: tok_column });
            }
            '\\' => {
                chars.next();
                column += 1;
                match chars.peek() {
                    Some('/') => {
                        chars.next();
                        column += 1;
                        tokens.push(Token {
                            kind: TokenKind::Union,
                            line: tok_line,
                            column: tok_column,
                        });
                    }
                    _ => {
                        return Err(located(tok_line, tok_column, "expected '/' after '\\'"));
                    }
                }
            }
            '^' => {
                chars.next();
                column += 1;
                match chars.peek() {
                    Some('*') => {
                        chars.next();
                        column += 1;
                        tokens.push(Token {
                            kind: TokenKind::Star,
                            line: tok_line,
                            column: tok_column,
                        });
                    }
                    _ => {
                        return Err(located(tok_line, tok_column, "expected '*' after '^'"));
                    }
                }
            }
            c if c.is_ascii_digit() => {
                let mut digits = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() {
                        digits.push(d);
                        chars.next();
                        column += 1;
                    } else {
                        break;
                    }
                }
                let value: i64 = digits
                    .parse()
                    .map_err(|_| located(tok_line, tok_column, "integer literal out of range"))?;
                tokens.push(Token {
                    kind: TokenKind::Num(value),
                    line: tok_line,
                    column: tok_column,
                });
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut name = String::new();
                while let Some(&a) = chars.peek() {
                    if a.is_ascii_alphanumeric() || a == '_' {
                        name.push(a);
                        chars.next();
                        column += 1;
                    } else {
                        break;
                    }
                }
                let kind = if name == "_" {
                    TokenKind::Underscore
                } else {
                    TokenKind::Ident(name)
                };
                tokens.push(Token { kind, line: tok_line, column: tok_column });
            }
            other => {
                return Err(located(
                    tok_line,
                    tok_column,
                    &format!("unexpected character '{}'", other),
                ));
            }
        }
    }

    tokens.push(Token { kind: TokenKind::Eof, line, column });
    Ok(tokens)
}

fn located(line: usize, column: usize, message: &str) -> Error {
    Error::Parse {
        line,
        column,
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        tokenize(text, 1)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_header_tokens() {
        assert_eq!(
            kinds("malloc(path):"),
            vec![
                TokenKind::Ident("malloc".to_string()),
                TokenKind::LParen,
                TokenKind::Ident("path".to_string()),
                TokenKind::RParen,
                TokenKind::Colon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_operator_tokens() {
        assert_eq!(
            kinds("\\/ ^* \u{00B7} \u{1D750} ! _"),
            vec![
                TokenKind::Union,
                TokenKind::Star,
                TokenKind::Seq,
                TokenKind::Epsilon,
                TokenKind::Bang,
                TokenKind::Underscore,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_guard_tokens() {
        assert_eq!(
            kinds("!(ret=0)"),
            vec![
                TokenKind::Bang,
                TokenKind::LParen,
                TokenKind::Ident("ret".to_string()),
                TokenKind::Eq,
                TokenKind::Num(0),
                TokenKind::RParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_underscore_prefix_is_identifier() {
        assert_eq!(
            kinds("_handler"),
            vec![TokenKind::Ident("_handler".to_string()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_positions_tracked_across_lines() {
        let tokens = tokenize("malloc():\n  Post", 1).unwrap();
        let post = tokens
            .iter()
            .find(|t| t.kind == TokenKind::Ident("Post".to_string()))
            .unwrap();
        assert_eq!(post.line, 2);
        assert_eq!(post.column, 3);
    }

    #[test]
    fn test_start_line_offset() {
        let tokens = tokenize("Post", 10).unwrap();
        assert_eq!(tokens[0].line, 10);
    }

    #[test]
    fn test_lone_backslash_rejected() {
        let err = tokenize("\\x", 1).unwrap_err();
        match err {
            Error::Parse { line, column, .. } => {
                assert_eq!(line, 1);
                assert_eq!(column, 1);
            }
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_caret_without_star_rejected() {
        assert!(tokenize("a^b", 1).is_err());
    }

    #[test]
    fn test_unexpected_character_rejected() {
        assert!(tokenize("malloc(path): #", 1).is_err());
    }
}
