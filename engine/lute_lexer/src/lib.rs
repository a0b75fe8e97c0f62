//! Byte-level tokenizer for Lute source text.
//!
//! The lexer operates on raw bytes (no Unicode interpretation) and feeds
//! the parser one [`Token`] at a time. Two input modes sit behind one
//! type so the parser stays source-agnostic:
//!
//! - [`SourceInput::Buffer`]: an in-memory byte buffer, with
//!   `memchr`-accelerated comment skipping
//! - [`SourceInput::Reader`]: a streamed reader, scanned byte by byte
//!
//! A current-line counter is maintained for diagnostics.
//!
//! # Lexical errors
//!
//! An unterminated string literal or a byte that starts no token yields a
//! distinct error token ([`TokenKind::UnterminatedString`],
//! [`TokenKind::Unexpected`]) rather than being folded into `Eof`; the
//! parser turns these into position-annotated syntax errors.

mod source;

pub use source::SourceInput;

use lute_ir::{Token, TokenKind};

/// Streaming tokenizer with one byte of lookahead.
pub struct Lexer {
    input: SourceInput,
    /// Current byte, `None` at end of input.
    current: Option<u8>,
    /// 1-based line of the current byte.
    line: u32,
}

impl Lexer {
    /// Lex an in-memory source string.
    pub fn from_str(source: &str) -> Self {
        Lexer::from_bytes(source.as_bytes().to_vec())
    }

    /// Lex an in-memory byte buffer.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Lexer::new(SourceInput::buffer(bytes))
    }

    /// Lex a streamed reader (e.g. an open file or stdin).
    pub fn from_reader(reader: Box<dyn std::io::BufRead>) -> Self {
        Lexer::new(SourceInput::reader(reader))
    }

    fn new(mut input: SourceInput) -> Self {
        let current = input.read_byte();
        Lexer {
            input,
            current,
            line: 1,
        }
    }

    /// Line of the most recently produced token's first byte.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Advance one byte, tracking newlines.
    fn bump(&mut self) {
        if self.current == Some(b'\n') {
            self.line += 1;
        }
        self.current = self.input.read_byte();
    }

    /// Produce the next token, consuming leading whitespace and comments.
    pub fn next_token(&mut self) -> Token {
        loop {
            let current = self.current;
            match current {
                Some(b' ' | b'\t' | b'\r' | b'\n') => self.bump(),
                Some(b'/') if self.peek_is_slash() => {
                    // `//` comment to end of line. The newline itself is
                    // left for the whitespace arm so line counting stays
                    // in one place.
                    self.bump();
                    self.bump();
                    if !matches!(self.current, None | Some(b'\n')) {
                        self.input.skip_to_newline();
                        self.current = self.input.read_byte();
                    }
                }
                _ => break,
            }
        }

        let line = self.line;
        let kind = match self.current {
            None => TokenKind::Eof,
            Some(b) if b.is_ascii_digit() => self.scan_number(),
            Some(b) if b == b'_' || b.is_ascii_alphabetic() => self.scan_ident(),
            Some(b'"') => self.scan_string(),
            Some(b) => self.scan_operator(b),
        };
        Token::new(kind, line)
    }

    /// True when the byte after the current `/` is another `/`.
    fn peek_is_slash(&mut self) -> bool {
        self.input.peek_byte() == Some(b'/')
    }

    fn scan_number(&mut self) -> TokenKind {
        let mut text = Vec::new();
        let mut is_real = false;

        while let Some(b) = self.current {
            if b.is_ascii_digit() {
                text.push(b);
                self.bump();
            } else {
                break;
            }
        }
        if self.current == Some(b'.') && self.input.peek_byte().is_some_and(|b| b.is_ascii_digit())
        {
            is_real = true;
            text.push(b'.');
            self.bump();
            while let Some(b) = self.current {
                if b.is_ascii_digit() {
                    text.push(b);
                    self.bump();
                } else {
                    break;
                }
            }
        }
        if matches!(self.current, Some(b'e' | b'E')) {
            let exp_digit = |b: Option<u8>| b.is_some_and(|b| b.is_ascii_digit());
            let next = self.input.peek_byte();
            let signed = matches!(next, Some(b'+' | b'-'));
            // Only consume the exponent if digits actually follow; `2e` is
            // an int token followed by the identifier `e`.
            if exp_digit(next) || (signed && self.exp_digits_follow()) {
                is_real = true;
                text.push(b'e');
                self.bump();
                if matches!(self.current, Some(b'+' | b'-')) {
                    if let Some(sign) = self.current {
                        text.push(sign);
                    }
                    self.bump();
                }
                while let Some(b) = self.current {
                    if b.is_ascii_digit() {
                        text.push(b);
                        self.bump();
                    } else {
                        break;
                    }
                }
            }
        }

        // Source digits are ASCII by construction.
        let text = String::from_utf8_lossy(&text);
        if is_real {
            match text.parse::<f64>() {
                Ok(v) => TokenKind::Real(v),
                Err(_) => TokenKind::Real(f64::NAN),
            }
        } else {
            match text.parse::<i64>() {
                Ok(v) => TokenKind::Int(v),
                // Integer literal too large for i64: degrade to real, the
                // same promotion arithmetic overflow takes at runtime.
                Err(_) => match text.parse::<f64>() {
                    Ok(v) => TokenKind::Real(v),
                    Err(_) => TokenKind::Real(f64::NAN),
                },
            }
        }
    }

    /// Peek two bytes ahead for `e+1` / `e-1` style exponents.
    fn exp_digits_follow(&mut self) -> bool {
        self.input.peek2_byte().is_some_and(|b| b.is_ascii_digit())
    }

    fn scan_ident(&mut self) -> TokenKind {
        let mut name = String::new();
        while let Some(b) = self.current {
            if b == b'_' || b.is_ascii_alphanumeric() {
                name.push(b as char);
                self.bump();
            } else {
                break;
            }
        }
        TokenKind::keyword(&name).unwrap_or(TokenKind::Ident(name))
    }

    fn scan_string(&mut self) -> TokenKind {
        // Consume the opening quote.
        self.bump();
        let mut bytes = Vec::new();
        loop {
            match self.current {
                None => return TokenKind::UnterminatedString,
                Some(b'"') => {
                    self.bump();
                    return TokenKind::Str(bytes);
                }
                Some(b'\\') => {
                    self.bump();
                    match self.current {
                        Some(b'n') => bytes.push(b'\n'),
                        Some(b't') => bytes.push(b'\t'),
                        Some(b'\\') => bytes.push(b'\\'),
                        Some(b'"') => bytes.push(b'"'),
                        // Unknown escape: keep the byte as written.
                        Some(b) => bytes.push(b),
                        None => return TokenKind::UnterminatedString,
                    }
                    self.bump();
                }
                Some(b) => {
                    bytes.push(b);
                    self.bump();
                }
            }
        }
    }

    fn scan_operator(&mut self, first: u8) -> TokenKind {
        // Two-character operators need one byte of lookahead; everything
        // else resolves on the first byte.
        let two = |lexer: &mut Lexer, kind| {
            lexer.bump();
            lexer.bump();
            kind
        };
        match (first, self.input.peek_byte()) {
            (b'=', Some(b'=')) => two(self, TokenKind::EqEq),
            (b'!', Some(b'=')) => two(self, TokenKind::BangEq),
            (b'<', Some(b'=')) => two(self, TokenKind::LessEq),
            (b'>', Some(b'=')) => two(self, TokenKind::GreaterEq),
            (b'&', Some(b'&')) => two(self, TokenKind::AndAnd),
            (b'|', Some(b'|')) => two(self, TokenKind::OrOr),
            _ => {
                let kind = match first {
                    b'+' => TokenKind::Plus,
                    b'-' => TokenKind::Minus,
                    b'*' => TokenKind::Star,
                    b'/' => TokenKind::Slash,
                    b'%' => TokenKind::Percent,
                    b'!' => TokenKind::Bang,
                    b'=' => TokenKind::Assign,
                    b'<' => TokenKind::Less,
                    b'>' => TokenKind::Greater,
                    b'.' => TokenKind::Dot,
                    b',' => TokenKind::Comma,
                    b';' => TokenKind::Semicolon,
                    b'(' => TokenKind::LParen,
                    b')' => TokenKind::RParen,
                    b'[' => TokenKind::LBracket,
                    b']' => TokenKind::RBracket,
                    b'{' => TokenKind::LBrace,
                    b'}' => TokenKind::RBrace,
                    other => TokenKind::Unexpected(other),
                };
                self.bump();
                kind
            }
        }
    }
}

#[cfg(test)]
mod tests;
