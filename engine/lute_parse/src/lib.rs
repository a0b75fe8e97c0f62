//! Recursive-descent parser for Lute source text.
//!
//! [`Parser::parse_unit`] consumes one top-level statement and returns a
//! freshly compacted [`CodeBuffer`], or `None` at end of input. On a
//! syntax error only the current unit is abandoned: the transient arena
//! is reset to the unit's entry mark, tokens are skipped to a unit
//! boundary, and subsequent units parse normally.
//!
//! Local variables are resolved to small integer slots at parse time
//! within the innermost enclosing function scope; re-declaring a name in
//! the same scope is a parse error. Names that resolve to no slot
//! compile to global-by-name references.
//!
//! # Module Structure
//!
//! - `error`: [`ParseError`] and the native-signature table entry
//! - `stmt`: statement grammar
//! - `expr`: expression grammar (precedence climbing, postfix chains,
//!   table constructors, function literals)

mod error;
mod expr;
mod stmt;

pub use error::{NativeSig, ParseError};

use lute_ir::{CodeArena, CodeBuffer, Token, TokenKind};
use lute_lexer::Lexer;
use smallvec::SmallVec;
use tracing::trace;

/// Slots are stored in a `u8` function header.
const MAX_LOCALS: usize = u8::MAX as usize;

/// Per-function scope: declared locals, indexed by slot.
#[derive(Default)]
struct FuncScope {
    locals: SmallVec<[String; 8]>,
}

/// The parser. Owns the lexer, the transient bytecode arena, and the
/// lexical-scope stack; borrows the native-function signature table for
/// `internal` bindings.
pub struct Parser<'n> {
    lexer: Lexer,
    arena: CodeArena,
    token: Token,
    peeked: Option<Token>,
    natives: &'n [NativeSig],
    scopes: Vec<FuncScope>,
}

impl<'n> Parser<'n> {
    /// Parse from an in-memory source string.
    pub fn from_str(source: &str, natives: &'n [NativeSig]) -> Self {
        Parser::new(Lexer::from_str(source), natives)
    }

    /// Parse from a streamed reader.
    pub fn from_reader(reader: Box<dyn std::io::BufRead>, natives: &'n [NativeSig]) -> Self {
        Parser::new(Lexer::from_reader(reader), natives)
    }

    pub fn new(mut lexer: Lexer, natives: &'n [NativeSig]) -> Self {
        let token = lexer.next_token();
        Parser {
            lexer,
            arena: CodeArena::new(),
            token,
            peeked: None,
            natives,
            scopes: Vec::new(),
        }
    }

    /// Parse one top-level unit.
    ///
    /// Returns `Ok(None)` at a clean end of input.
    ///
    /// # Errors
    /// A syntax error abandons the current unit only; calling
    /// `parse_unit` again resumes at the next unit boundary.
    pub fn parse_unit(&mut self) -> Result<Option<CodeBuffer>, ParseError> {
        // Stray separators between units are not units.
        while self.token.kind == TokenKind::Semicolon {
            self.advance();
        }
        if self.token.kind == TokenKind::Eof {
            return Ok(None);
        }
        trace!(line = self.token.line, "parse unit");

        let mark = self.arena.mark();
        self.scopes.push(FuncScope::default());
        match self.parse_statement() {
            Ok(root) => {
                let slots = match self.scopes.pop() {
                    Some(scope) => scope.locals.len() as u16,
                    None => 0,
                };
                Ok(Some(self.arena.compact(mark, root, slots)))
            }
            Err(err) => {
                self.scopes.clear();
                self.arena.reset_to(mark);
                self.recover();
                Err(err)
            }
        }
    }

    /// Skip tokens to a plausible unit boundary: a `;` or `}` at nesting
    /// depth zero (consumed), or end of input.
    fn recover(&mut self) {
        let mut depth = 0i32;
        loop {
            match &self.token.kind {
                // Lexical error tokens have already consumed their
                // bytes; skipping them is safe.
                TokenKind::Eof => return,
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => depth += 1,
                TokenKind::RParen | TokenKind::RBracket => depth -= 1,
                TokenKind::RBrace => {
                    depth -= 1;
                    if depth <= 0 {
                        self.advance();
                        return;
                    }
                }
                TokenKind::Semicolon if depth <= 0 => {
                    self.advance();
                    return;
                }
                _ => {}
            }
            self.advance();
        }
    }

    // Token plumbing

    pub(crate) fn advance(&mut self) {
        self.token = match self.peeked.take() {
            Some(token) => token,
            None => self.lexer.next_token(),
        };
    }

    pub(crate) fn peek(&mut self) -> &TokenKind {
        if self.peeked.is_none() {
            self.peeked = Some(self.lexer.next_token());
        }
        match &self.peeked {
            Some(token) => &token.kind,
            // Just filled above.
            None => &TokenKind::Eof,
        }
    }

    /// Consume an exact token or fail.
    pub(crate) fn expect(&mut self, kind: &TokenKind) -> Result<(), ParseError> {
        if &self.token.kind == kind {
            self.advance();
            Ok(())
        } else {
            Err(self.err(format!("expected {kind}, found {}", self.token.kind)))
        }
    }

    pub(crate) fn err(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            line: self.token.line,
        }
    }

    // Scope handling

    pub(crate) fn push_scope(&mut self) {
        self.scopes.push(FuncScope::default());
    }

    pub(crate) fn pop_scope(&mut self) -> u8 {
        match self.scopes.pop() {
            Some(scope) => scope.locals.len() as u8,
            None => 0,
        }
    }

    /// Declare a local in the innermost function scope.
    pub(crate) fn declare_local(&mut self, name: &str) -> Result<u8, ParseError> {
        let dup = self
            .innermost()
            .locals
            .iter()
            .any(|existing| existing == name);
        if dup {
            return Err(self.err(format!("duplicate local `{name}` in the same scope")));
        }
        if self.innermost().locals.len() >= MAX_LOCALS {
            return Err(self.err("too many locals in one function"));
        }
        let scope = match self.scopes.last_mut() {
            Some(scope) => scope,
            None => unreachable!("statements always parse inside a scope"),
        };
        scope.locals.push(name.to_string());
        Ok((scope.locals.len() - 1) as u8)
    }

    /// Resolve a name against the innermost function scope only; outer
    /// functions' locals are not visible (they read as globals).
    pub(crate) fn resolve_local(&self, name: &str) -> Option<u8> {
        self.scopes
            .last()?
            .locals
            .iter()
            .position(|local| local == name)
            .map(|slot| slot as u8)
    }

    fn innermost(&self) -> &FuncScope {
        match self.scopes.last() {
            Some(scope) => scope,
            None => unreachable!("statements always parse inside a scope"),
        }
    }

    pub(crate) fn native_by_name(&self, name: &[u8]) -> Option<&NativeSig> {
        self.natives
            .iter()
            .find(|sig| sig.name.as_bytes() == name)
    }
}

#[cfg(test)]
mod tests;
