//! Expression grammar.
//!
//! Precedence climbing for boolean/relational/arithmetic operators,
//! unary `!`/`-`, postfix `.name` / `[expr]` / call chains, table
//! constructors, and function literals (with optional `internal`
//! native binding).

use lute_ir::{Node, NodeKind, NodeRef, Payload, TokenKind};

use crate::{ParseError, Parser};

/// Red zone and growth size for recursive-descent stack growth; sized
/// the same as the evaluator's.
const RED_ZONE: usize = 100 * 1024;
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Binary operator levels, loosest first.
const LEVELS: &[&[(TokenKind, NodeKind)]] = &[
    &[(TokenKind::OrOr, NodeKind::Or)],
    &[(TokenKind::AndAnd, NodeKind::And)],
    &[
        (TokenKind::EqEq, NodeKind::Eq),
        (TokenKind::BangEq, NodeKind::Ne),
    ],
    &[
        (TokenKind::Less, NodeKind::Lt),
        (TokenKind::LessEq, NodeKind::Le),
        (TokenKind::Greater, NodeKind::Gt),
        (TokenKind::GreaterEq, NodeKind::Ge),
    ],
    &[
        (TokenKind::Plus, NodeKind::Add),
        (TokenKind::Minus, NodeKind::Sub),
    ],
    &[
        (TokenKind::Star, NodeKind::Mul),
        (TokenKind::Slash, NodeKind::Div),
        (TokenKind::Percent, NodeKind::Mod),
    ],
];

impl Parser<'_> {
    pub(crate) fn parse_expr(&mut self) -> Result<NodeRef, ParseError> {
        // Deeply nested source would otherwise overflow the native
        // stack long before the arena minds.
        stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, || self.parse_binary(0))
    }

    fn parse_binary(&mut self, level: usize) -> Result<NodeRef, ParseError> {
        let Some(ops) = LEVELS.get(level) else {
            return self.parse_unary();
        };
        let mut left = self.parse_binary(level + 1)?;
        loop {
            let found = ops.iter().find(|(token, _)| *token == self.token.kind);
            let Some((_, kind)) = found else {
                return Ok(left);
            };
            let kind = *kind;
            self.advance();
            let right = self.parse_binary(level + 1)?;
            self.arena.set_next(left, right);
            left = self.arena.push(Node::new(kind, Payload::Child(left)));
        }
    }

    fn parse_unary(&mut self) -> Result<NodeRef, ParseError> {
        let kind = match self.token.kind {
            TokenKind::Bang => NodeKind::Not,
            TokenKind::Minus => NodeKind::Neg,
            _ => return self.parse_postfix(),
        };
        self.advance();
        let operand = self.parse_unary()?;
        Ok(self.arena.push(Node::new(kind, Payload::Child(operand))))
    }

    /// Postfix chains: `.name`, `[expr]`, and calls.
    fn parse_postfix(&mut self) -> Result<NodeRef, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.token.kind {
                TokenKind::Dot => {
                    self.advance();
                    let name = match std::mem::replace(&mut self.token.kind, TokenKind::Eof) {
                        TokenKind::Ident(name) => {
                            self.advance();
                            name
                        }
                        other => {
                            self.token.kind = other;
                            return Err(self.err("expected field name after `.`"));
                        }
                    };
                    let slice = self.arena.push_bytes(name.as_bytes());
                    let key = self
                        .arena
                        .push(Node::new(NodeKind::StrLit, Payload::Str(slice)));
                    self.arena.set_next(expr, key);
                    expr = self
                        .arena
                        .push(Node::new(NodeKind::Index, Payload::Child(expr)));
                }
                TokenKind::LBracket => {
                    self.advance();
                    let key = self.parse_expr()?;
                    self.expect(&TokenKind::RBracket)?;
                    self.arena.set_next(expr, key);
                    expr = self
                        .arena
                        .push(Node::new(NodeKind::Index, Payload::Child(expr)));
                }
                TokenKind::LParen => {
                    self.advance();
                    let mut prev = expr;
                    while self.token.kind != TokenKind::RParen {
                        let arg = self.parse_expr()?;
                        self.arena.set_next(prev, arg);
                        prev = arg;
                        if self.token.kind == TokenKind::Comma {
                            self.advance();
                        } else {
                            break;
                        }
                    }
                    self.expect(&TokenKind::RParen)?;
                    expr = self
                        .arena
                        .push(Node::new(NodeKind::Call, Payload::Child(expr)));
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_primary(&mut self) -> Result<NodeRef, ParseError> {
        match std::mem::replace(&mut self.token.kind, TokenKind::Eof) {
            TokenKind::Int(v) => {
                self.advance();
                Ok(self.arena.push(Node::new(NodeKind::IntLit, Payload::Int(v))))
            }
            TokenKind::Real(v) => {
                self.advance();
                Ok(self
                    .arena
                    .push(Node::new(NodeKind::RealLit, Payload::Real(v))))
            }
            TokenKind::Str(bytes) => {
                self.advance();
                let slice = self.arena.push_bytes(&bytes);
                Ok(self
                    .arena
                    .push(Node::new(NodeKind::StrLit, Payload::Str(slice))))
            }
            TokenKind::Ident(name) => {
                self.advance();
                Ok(self.variable_ref(&name))
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(&TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::LBracket => {
                self.advance();
                self.parse_table_cons()
            }
            TokenKind::Func => {
                self.advance();
                self.parse_func_literal()
            }
            other => {
                let message = format!("expected expression, found {other}");
                self.token.kind = other;
                Err(self.err(message))
            }
        }
    }

    /// Resolve a name to a local slot or a global-by-name reference.
    pub(crate) fn variable_ref(&mut self, name: &str) -> NodeRef {
        match self.resolve_local(name) {
            Some(slot) => self
                .arena
                .push(Node::new(NodeKind::Local, Payload::Int(i64::from(slot)))),
            None => {
                let slice = self.arena.push_bytes(name.as_bytes());
                self.arena
                    .push(Node::new(NodeKind::Global, Payload::Str(slice)))
            }
        }
    }

    /// `[]` or `[k = v; k2 = v2]` — keys are expressions evaluated at
    /// construction time.
    fn parse_table_cons(&mut self) -> Result<NodeRef, ParseError> {
        let mut first = NodeRef::NONE;
        let mut prev = NodeRef::NONE;
        while self.token.kind != TokenKind::RBracket {
            if self.token.kind.ends_input() {
                return Err(self.err("unterminated table constructor: expected `]`"));
            }
            let key = self.parse_expr()?;
            self.expect(&TokenKind::Assign)?;
            let value = self.parse_expr()?;
            self.arena.set_next(key, value);
            let entry = self
                .arena
                .push(Node::new(NodeKind::TableEntry, Payload::Child(key)));
            if prev.is_some() {
                self.arena.set_next(prev, entry);
            } else {
                first = entry;
            }
            prev = entry;
            if self.token.kind == TokenKind::Semicolon {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(&TokenKind::RBracket)?;
        Ok(self
            .arena
            .push(Node::new(NodeKind::TableCons, Payload::Child(first))))
    }

    /// `func (a, b) { body }` or `func (a, b) internal "name"`.
    fn parse_func_literal(&mut self) -> Result<NodeRef, ParseError> {
        self.expect(&TokenKind::LParen)?;
        self.push_scope();
        let result = self.parse_func_inner();
        // Scope is popped inside on success; make failure symmetric.
        if result.is_err() {
            self.pop_scope();
        }
        result
    }

    fn parse_func_inner(&mut self) -> Result<NodeRef, ParseError> {
        let mut params: u8 = 0;
        while self.token.kind != TokenKind::RParen {
            let name = match std::mem::replace(&mut self.token.kind, TokenKind::Eof) {
                TokenKind::Ident(name) => {
                    self.advance();
                    name
                }
                other => {
                    self.token.kind = other;
                    return Err(self.err("expected parameter name"));
                }
            };
            self.declare_local(&name)?;
            params += 1;
            if self.token.kind == TokenKind::Comma {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(&TokenKind::RParen)?;

        if self.token.kind == TokenKind::Internal {
            self.advance();
            let name = match std::mem::replace(&mut self.token.kind, TokenKind::Eof) {
                TokenKind::Str(bytes) => {
                    self.advance();
                    bytes
                }
                other => {
                    self.token.kind = other;
                    return Err(self.err("expected native name string after `internal`"));
                }
            };
            let Some(sig) = self.native_by_name(&name) else {
                let shown = String::from_utf8_lossy(&name).into_owned();
                return Err(self.err(format!("unknown internal function \"{shown}\"")));
            };
            let (id, min_args, max_args) = (sig.id, sig.min_args, sig.max_args);
            let body = self.arena.push(Node::new(
                NodeKind::NativeCall,
                Payload::Native {
                    id,
                    min_args,
                    max_args,
                },
            ));
            let slots = self.pop_scope();
            return Ok(self.arena.push(Node::new(
                NodeKind::Func,
                Payload::Func {
                    entry: body,
                    params,
                    slots,
                },
            )));
        }

        if self.token.kind != TokenKind::LBrace {
            return Err(self.err("expected `{` to open function body"));
        }
        let body = self.parse_statement()?;
        let slots = self.pop_scope();
        Ok(self.arena.push(Node::new(
            NodeKind::Func,
            Payload::Func {
                entry: body,
                params,
                slots,
            },
        )))
    }
}
