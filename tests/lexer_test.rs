//! Black-box lexer scenarios (§4.1).

use codegraph_engine::query::lexer::{lex, TokenKind};

fn kinds(input: &str) -> Vec<TokenKind> {
    lex(input).unwrap().into_iter().map(|t| t.kind).collect()
}

#[test]
fn keywords_are_case_insensitive() {
    assert_eq!(kinds("match"), kinds("MATCH"));
    assert!(matches!(kinds("match")[0], TokenKind::Match));
}

#[test]
fn pattern_punctuation_is_tokenized() {
    let tokens = kinds("(f:Function)-[:CALLS*1..3]->(g)");
    assert!(tokens.contains(&TokenKind::LParen));
    assert!(tokens.contains(&TokenKind::Colon));
    assert!(tokens.contains(&TokenKind::Star));
    assert!(tokens.contains(&TokenKind::DotDot));
    assert!(tokens.contains(&TokenKind::RAngle));
}

#[test]
fn string_and_numeric_literals_are_recognized() {
    let tokens = kinds(r#"WHERE f.name = "main" AND f.start_line > 10 AND f.score > 1.5"#);
    assert!(tokens.iter().any(|t| matches!(t, TokenKind::StringLit(s) if s == "main")));
    assert!(tokens.iter().any(|t| matches!(t, TokenKind::Integer(10))));
    assert!(tokens.iter().any(|t| matches!(t, TokenKind::Decimal(v) if (*v - 1.5).abs() < f64::EPSILON)));
}

#[test]
fn comments_are_skipped() {
    let tokens = kinds("MATCH (f) // a trailing comment\nRETURN f");
    assert!(matches!(tokens[0], TokenKind::Match));
    assert!(!tokens.iter().any(|t| matches!(t, TokenKind::Identifier(s) if s.contains("comment"))));
}

#[test]
fn unterminated_string_is_a_lex_error() {
    assert!(lex(r#"MATCH (f) WHERE f.name = "unterminated"#).is_err());
}

#[test]
fn every_token_stream_ends_with_eof() {
    let tokens = lex("MATCH (f) RETURN f").unwrap();
    assert!(matches!(tokens.last().unwrap().kind, TokenKind::Eof));
}
