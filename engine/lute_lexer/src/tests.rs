#![allow(clippy::unwrap_used)]

use super::*;
use pretty_assertions::assert_eq;

fn kinds(source: &str) -> Vec<TokenKind> {
    let mut lexer = Lexer::from_str(source);
    let mut out = Vec::new();
    loop {
        let token = lexer.next_token();
        let done = token.kind.ends_input();
        out.push(token.kind);
        if done {
            break;
        }
    }
    out
}

#[test]
fn scans_assignment_unit() {
    assert_eq!(
        kinds("x = 3;"),
        vec![
            TokenKind::Ident("x".into()),
            TokenKind::Assign,
            TokenKind::Int(3),
            TokenKind::Semicolon,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn scans_two_char_operators() {
    assert_eq!(
        kinds("== != <= >= && || < > ! ="),
        vec![
            TokenKind::EqEq,
            TokenKind::BangEq,
            TokenKind::LessEq,
            TokenKind::GreaterEq,
            TokenKind::AndAnd,
            TokenKind::OrOr,
            TokenKind::Less,
            TokenKind::Greater,
            TokenKind::Bang,
            TokenKind::Assign,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn scans_numbers() {
    assert_eq!(
        kinds("42 3.5 1e3 2e 7."),
        vec![
            TokenKind::Int(42),
            TokenKind::Real(3.5),
            TokenKind::Real(1000.0),
            TokenKind::Int(2),
            TokenKind::Ident("e".into()),
            TokenKind::Int(7),
            TokenKind::Dot,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn oversized_int_degrades_to_real() {
    let out = kinds("99999999999999999999");
    match out.first() {
        Some(TokenKind::Real(v)) => assert!(*v > 9.9e19),
        other => panic!("expected real, got {other:?}"),
    }
}

#[test]
fn scans_keywords_and_idents() {
    assert_eq!(
        kinds("for k in table1 func local internal"),
        vec![
            TokenKind::For,
            TokenKind::Ident("k".into()),
            TokenKind::In,
            TokenKind::Ident("table1".into()),
            TokenKind::Func,
            TokenKind::Local,
            TokenKind::Internal,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn scans_string_escapes() {
    assert_eq!(
        kinds(r#""a\tb\n\"q\"""#),
        vec![TokenKind::Str(b"a\tb\n\"q\"".to_vec()), TokenKind::Eof]
    );
}

#[test]
fn unterminated_string_is_a_distinct_error() {
    assert_eq!(
        kinds("x = \"oops"),
        vec![
            TokenKind::Ident("x".into()),
            TokenKind::Assign,
            TokenKind::UnterminatedString,
        ]
    );
}

#[test]
fn unexpected_byte_is_reported() {
    assert_eq!(kinds("@"), vec![TokenKind::Unexpected(b'@')]);
}

#[test]
fn comments_are_skipped_and_lines_counted() {
    let mut lexer = Lexer::from_str("a // one\n// two\nb");
    let a = lexer.next_token();
    assert_eq!(a.kind, TokenKind::Ident("a".into()));
    assert_eq!(a.line, 1);
    let b = lexer.next_token();
    assert_eq!(b.kind, TokenKind::Ident("b".into()));
    assert_eq!(b.line, 3);
}

#[test]
fn single_slash_is_division_not_a_comment() {
    assert_eq!(
        kinds("a / b // rest\nc"),
        vec![
            TokenKind::Ident("a".into()),
            TokenKind::Slash,
            TokenKind::Ident("b".into()),
            TokenKind::Ident("c".into()),
            TokenKind::Eof,
        ]
    );
}

#[test]
fn line_numbers_track_newlines() {
    let mut lexer = Lexer::from_str("x\n\ny = \"a\nb\"\nz");
    assert_eq!(lexer.next_token().line, 1);
    assert_eq!(lexer.next_token().line, 3); // y
    assert_eq!(lexer.next_token().line, 3); // =
    assert_eq!(lexer.next_token().line, 3); // string with embedded newline
    assert_eq!(lexer.next_token().line, 5); // z
}

#[test]
fn reader_mode_matches_buffer_mode() {
    let source = "t = [a = 1; b = 2.5]; // trailing\nreturn t;";
    let from_buffer = kinds(source);
    let reader = Box::new(std::io::Cursor::new(source.as_bytes().to_vec()));
    let mut lexer = Lexer::from_reader(reader);
    let mut from_reader = Vec::new();
    loop {
        let token = lexer.next_token();
        let done = token.kind.ends_input();
        from_reader.push(token.kind);
        if done {
            break;
        }
    }
    assert_eq!(from_buffer, from_reader);
}
