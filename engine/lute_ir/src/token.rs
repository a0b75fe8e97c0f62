//! Lexical tokens.
//!
//! Tokens carry the line they started on so the parser can produce
//! position-annotated syntax errors without re-scanning the source.

use std::fmt;

/// One lexical token.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// 1-based source line the token started on.
    pub line: u32,
}

impl Token {
    /// Create a new token.
    #[inline]
    pub fn new(kind: TokenKind, line: u32) -> Self {
        Token { kind, line }
    }
}

/// Kind (and payload) of a lexical token.
///
/// String literals are byte strings; the engine performs no Unicode
/// interpretation on source text.
#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    // Literals and names
    Int(i64),
    Real(f64),
    Str(Vec<u8>),
    Ident(String),

    // Keywords
    If,
    Else,
    While,
    For,
    In,
    Break,
    Continue,
    Return,
    Func,
    Local,
    Internal,

    // Single-character operators and delimiters
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    Assign,
    Less,
    Greater,
    Dot,
    Comma,
    Semicolon,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,

    // Two-character operators
    EqEq,
    BangEq,
    LessEq,
    GreaterEq,
    AndAnd,
    OrOr,

    /// End of input.
    Eof,

    // Lexical errors. Historically these were folded into `Eof`, which made
    // an unterminated string indistinguishable from a clean end of input;
    // they are distinct kinds so the parser can report them precisely.
    /// A string literal with no closing quote before end of input.
    UnterminatedString,
    /// A byte that starts no token.
    Unexpected(u8),
}

impl TokenKind {
    /// Keyword lookup for a scanned identifier.
    pub fn keyword(ident: &str) -> Option<TokenKind> {
        Some(match ident {
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "for" => TokenKind::For,
            "in" => TokenKind::In,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "return" => TokenKind::Return,
            "func" => TokenKind::Func,
            "local" => TokenKind::Local,
            "internal" => TokenKind::Internal,
            _ => return None,
        })
    }

    /// Returns `true` for `Eof` and for the lexical-error kinds, all of
    /// which terminate the current unit.
    pub fn ends_input(&self) -> bool {
        matches!(
            self,
            TokenKind::Eof | TokenKind::UnterminatedString | TokenKind::Unexpected(_)
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Int(v) => write!(f, "{v}"),
            TokenKind::Real(v) => write!(f, "{v}"),
            TokenKind::Str(_) => write!(f, "string literal"),
            TokenKind::Ident(name) => write!(f, "`{name}`"),
            TokenKind::If => write!(f, "`if`"),
            TokenKind::Else => write!(f, "`else`"),
            TokenKind::While => write!(f, "`while`"),
            TokenKind::For => write!(f, "`for`"),
            TokenKind::In => write!(f, "`in`"),
            TokenKind::Break => write!(f, "`break`"),
            TokenKind::Continue => write!(f, "`continue`"),
            TokenKind::Return => write!(f, "`return`"),
            TokenKind::Func => write!(f, "`func`"),
            TokenKind::Local => write!(f, "`local`"),
            TokenKind::Internal => write!(f, "`internal`"),
            TokenKind::Plus => write!(f, "`+`"),
            TokenKind::Minus => write!(f, "`-`"),
            TokenKind::Star => write!(f, "`*`"),
            TokenKind::Slash => write!(f, "`/`"),
            TokenKind::Percent => write!(f, "`%`"),
            TokenKind::Bang => write!(f, "`!`"),
            TokenKind::Assign => write!(f, "`=`"),
            TokenKind::Less => write!(f, "`<`"),
            TokenKind::Greater => write!(f, "`>`"),
            TokenKind::Dot => write!(f, "`.`"),
            TokenKind::Comma => write!(f, "`,`"),
            TokenKind::Semicolon => write!(f, "`;`"),
            TokenKind::LParen => write!(f, "`(`"),
            TokenKind::RParen => write!(f, "`)`"),
            TokenKind::LBracket => write!(f, "`[`"),
            TokenKind::RBracket => write!(f, "`]`"),
            TokenKind::LBrace => write!(f, "`{{`"),
            TokenKind::RBrace => write!(f, "`}}`"),
            TokenKind::EqEq => write!(f, "`==`"),
            TokenKind::BangEq => write!(f, "`!=`"),
            TokenKind::LessEq => write!(f, "`<=`"),
            TokenKind::GreaterEq => write!(f, "`>=`"),
            TokenKind::AndAnd => write!(f, "`&&`"),
            TokenKind::OrOr => write!(f, "`||`"),
            TokenKind::Eof => write!(f, "end of input"),
            TokenKind::UnterminatedString => write!(f, "unterminated string literal"),
            TokenKind::Unexpected(b) => write!(f, "unexpected byte 0x{b:02X}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn keywords_resolve() {
        assert_eq!(TokenKind::keyword("while"), Some(TokenKind::While));
        assert_eq!(TokenKind::keyword("internal"), Some(TokenKind::Internal));
        assert_eq!(TokenKind::keyword("whilee"), None);
    }

    #[test]
    fn error_kinds_end_input() {
        assert!(TokenKind::Eof.ends_input());
        assert!(TokenKind::UnterminatedString.ends_input());
        assert!(TokenKind::Unexpected(0xFF).ends_input());
        assert!(!TokenKind::Semicolon.ends_input());
    }
}
