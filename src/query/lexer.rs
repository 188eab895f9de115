//! Lexer for the Cypher-subset query language (§4.1).
//!
//! Grounded on the recursive, hand-rolled lexer/parser style used across
//! the corpus's own query-language implementations (e.g. the Cypher-like
//! grammars in `genezhang-clickgraph` and `Mootikins-crucible` under
//! `other_examples/`), adapted to this crate's token/error types.

use crate::error::QueryError;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Keywords
    Match,
    Where,
    Return,
    Order,
    By,
    Limit,
    And,
    Or,
    As,
    Distinct,
    Count,
    Contains,
    Starts,
    With,
    Not,
    Asc,
    Desc,

    // Symbols
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Star,
    Comma,
    Pipe,
    Colon,
    Dash,
    DotDot,
    Gte,
    Lte,
    RegexMatch, // =~
    Eq,
    Dot,
    // `<`/`>` serve double duty: a relationship-direction marker adjacent to
    // a `Dash`, or a greater/less-than `CompareOp` standalone. The lexer
    // always emits LAngle/RAngle; the parser disambiguates by context.
    LAngle,
    RAngle,

    Identifier(String),
    Integer(i64),
    Decimal(f64),
    StringLit(String),

    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: usize,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

fn keyword(word: &str) -> Option<TokenKind> {
    Some(match word.to_ascii_uppercase().as_str() {
        "MATCH" => TokenKind::Match,
        "WHERE" => TokenKind::Where,
        "RETURN" => TokenKind::Return,
        "ORDER" => TokenKind::Order,
        "BY" => TokenKind::By,
        "LIMIT" => TokenKind::Limit,
        "AND" => TokenKind::And,
        "OR" => TokenKind::Or,
        "AS" => TokenKind::As,
        "DISTINCT" => TokenKind::Distinct,
        "COUNT" => TokenKind::Count,
        "CONTAINS" => TokenKind::Contains,
        "STARTS" => TokenKind::Starts,
        "WITH" => TokenKind::With,
        "NOT" => TokenKind::Not,
        "ASC" => TokenKind::Asc,
        "DESC" => TokenKind::Desc,
        _ => return None,
    })
}

/// Tokenize `input`, skipping whitespace and `//`/`/* */` comments.
/// Fails with [`QueryError::Lex`] on an unterminated string or
/// unexpected character.
pub fn lex(input: &str) -> Result<Vec<Token>, QueryError> {
    let bytes = input.as_bytes();
    let mut pos = 0usize;
    let mut tokens = Vec::new();

    while pos < bytes.len() {
        let c = bytes[pos] as char;

        if c.is_whitespace() {
            pos += 1;
            continue;
        }

        // Line comment
        if c == '/' && bytes.get(pos + 1) == Some(&b'/') {
            while pos < bytes.len() && bytes[pos] != b'\n' {
                pos += 1;
            }
            continue;
        }

        // Block comment
        if c == '/' && bytes.get(pos + 1) == Some(&b'*') {
            pos += 2;
            loop {
                if pos + 1 >= bytes.len() {
                    return Err(QueryError::Lex {
                        pos,
                        message: "unterminated block comment".to_string(),
                    });
                }
                if bytes[pos] == b'*' && bytes[pos + 1] == b'/' {
                    pos += 2;
                    break;
                }
                pos += 1;
            }
            continue;
        }

        let start = pos;

        // Strings
        if c == '\'' || c == '"' {
            let quote = c;
            pos += 1;
            let mut s = String::new();
            loop {
                if pos >= bytes.len() {
                    return Err(QueryError::Lex {
                        pos: start,
                        message: "unterminated string literal".to_string(),
                    });
                }
                let ch = bytes[pos] as char;
                if ch == '\\' && pos + 1 < bytes.len() {
                    let next = bytes[pos + 1] as char;
                    let escaped = match next {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '\\' => '\\',
                        '\'' => '\'',
                        '"' => '"',
                        other => other,
                    };
                    s.push(escaped);
                    pos += 2;
                    continue;
                }
                if ch == quote {
                    pos += 1;
                    break;
                }
                s.push(ch);
                pos += 1;
            }
            tokens.push(Token {
                kind: TokenKind::StringLit(s),
                pos: start,
            });
            continue;
        }

        // Numbers — disambiguate ".." range from a fractional dot by lookahead.
        if c.is_ascii_digit() {
            let mut end = pos;
            while end < bytes.len() && (bytes[end] as char).is_ascii_digit() {
                end += 1;
            }
            let mut is_decimal = false;
            if end < bytes.len() && bytes[end] == b'.' && bytes.get(end + 1) != Some(&b'.') {
                is_decimal = true;
                end += 1;
                while end < bytes.len() && (bytes[end] as char).is_ascii_digit() {
                    end += 1;
                }
            }
            let text = &input[pos..end];
            if is_decimal {
                let value: f64 = text.parse().map_err(|_| QueryError::Lex {
                    pos: start,
                    message: format!("invalid decimal literal '{text}'"),
                })?;
                tokens.push(Token {
                    kind: TokenKind::Decimal(value),
                    pos: start,
                });
            } else {
                let value: i64 = text.parse().map_err(|_| QueryError::Lex {
                    pos: start,
                    message: format!("invalid integer literal '{text}'"),
                })?;
                tokens.push(Token {
                    kind: TokenKind::Integer(value),
                    pos: start,
                });
            }
            pos = end;
            continue;
        }

        // Identifiers / keywords
        if c.is_alphabetic() || c == '_' {
            let mut end = pos;
            while end < bytes.len() {
                let ch = bytes[end] as char;
                if ch.is_alphanumeric() || ch == '_' {
                    end += 1;
                } else {
                    break;
                }
            }
            let word = &input[pos..end];
            let kind = keyword(word).unwrap_or_else(|| TokenKind::Identifier(word.to_string()));
            tokens.push(Token { kind, pos: start });
            pos = end;
            continue;
        }

        // Two-character operators
        if c == '.' && bytes.get(pos + 1) == Some(&b'.') {
            tokens.push(Token {
                kind: TokenKind::DotDot,
                pos: start,
            });
            pos += 2;
            continue;
        }
        if c == '>' && bytes.get(pos + 1) == Some(&b'=') {
            tokens.push(Token {
                kind: TokenKind::Gte,
                pos: start,
            });
            pos += 2;
            continue;
        }
        if c == '<' && bytes.get(pos + 1) == Some(&b'=') {
            tokens.push(Token {
                kind: TokenKind::Lte,
                pos: start,
            });
            pos += 2;
            continue;
        }
        if c == '=' && bytes.get(pos + 1) == Some(&b'~') {
            tokens.push(Token {
                kind: TokenKind::RegexMatch,
                pos: start,
            });
            pos += 2;
            continue;
        }

        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '*' => TokenKind::Star,
            ',' => TokenKind::Comma,
            '|' => TokenKind::Pipe,
            ':' => TokenKind::Colon,
            '-' => TokenKind::Dash,
            '=' => TokenKind::Eq,
            '>' => TokenKind::RAngle,
            '<' => TokenKind::LAngle,
            '.' => TokenKind::Dot,
            other => {
                return Err(QueryError::Lex {
                    pos: start,
                    message: format!("unexpected character '{other}'"),
                })
            }
        };
        tokens.push(Token { kind, pos: start });
        pos += 1;
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        pos: bytes.len(),
    });
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        lex(input).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn keywords_are_case_insensitive() {
        assert_eq!(kinds("match"), vec![TokenKind::Match, TokenKind::Eof]);
        assert_eq!(kinds("MaTcH"), vec![TokenKind::Match, TokenKind::Eof]);
    }

    #[test]
    fn identifier_colliding_with_keyword_lexes_as_keyword() {
        // "and" collides with the AND keyword regardless of surrounding case.
        assert_eq!(kinds("AND"), vec![TokenKind::And, TokenKind::Eof]);
    }

    #[test]
    fn dotdot_never_mixes_with_fractional_number() {
        assert_eq!(
            kinds("*1..3"),
            vec![
                TokenKind::Star,
                TokenKind::Integer(1),
                TokenKind::DotDot,
                TokenKind::Integer(3),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn decimal_number_is_not_confused_with_range() {
        assert_eq!(
            kinds("0.85"),
            vec![TokenKind::Decimal(0.85), TokenKind::Eof]
        );
    }

    #[test]
    fn string_literals_support_both_quote_styles_and_escapes() {
        assert_eq!(
            kinds(r#"'it\'s' "a\"b""#),
            vec![
                TokenKind::StringLit("it's".to_string()),
                TokenKind::StringLit("a\"b".to_string()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn unterminated_string_is_a_lex_error() {
        let err = lex("'unterminated").unwrap_err();
        match err {
            QueryError::Lex { pos, .. } => assert_eq!(pos, 0),
            other => panic!("expected Lex error, got {other:?}"),
        }
    }

    #[test]
    fn unexpected_character_is_a_lex_error() {
        let err = lex("MATCH (a) ~ RETURN a").unwrap_err();
        assert!(matches!(err, QueryError::Lex { .. }));
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            kinds("MATCH // trailing comment\n(a)"),
            vec![
                TokenKind::Match,
                TokenKind::LParen,
                TokenKind::Identifier("a".to_string()),
                TokenKind::RParen,
                TokenKind::Eof
            ]
        );
        assert_eq!(
            kinds("MATCH /* block */ (a)"),
            vec![
                TokenKind::Match,
                TokenKind::LParen,
                TokenKind::Identifier("a".to_string()),
                TokenKind::RParen,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn full_pattern_tokenizes_with_operators() {
        let got = kinds("MATCH (a)-[:CALLS*1..2]->(b) WHERE a.name =~ 'x' RETURN a.name");
        assert!(got.contains(&TokenKind::RegexMatch));
        assert!(got.contains(&TokenKind::RAngle));
        assert!(got.contains(&TokenKind::Dash));
    }
}
