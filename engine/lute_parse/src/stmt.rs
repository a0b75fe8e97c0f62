//! Statement grammar.
//!
//! Statement forms: block, if/else, while, three-part for, for-in,
//! break, continue, return, local declaration, and expression/assignment
//! statements. Simple statements consume their trailing `;`.

use lute_ir::{Node, NodeKind, NodeRef, Payload, TokenKind};
use tracing::trace;

use crate::{ParseError, Parser};

impl Parser<'_> {
    pub(crate) fn parse_statement(&mut self) -> Result<NodeRef, ParseError> {
        trace!(line = self.token.line, token = %self.token.kind, "statement");
        match self.token.kind {
            TokenKind::LBrace => self.parse_block(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::Break => self.parse_loop_exit(NodeKind::Break),
            TokenKind::Continue => self.parse_loop_exit(NodeKind::Continue),
            TokenKind::Return => self.parse_return(),
            TokenKind::Local => self.parse_local(),
            _ => self.parse_expr_statement(true),
        }
    }

    fn parse_block(&mut self) -> Result<NodeRef, ParseError> {
        self.advance();
        let mut first = NodeRef::NONE;
        let mut prev = NodeRef::NONE;
        while self.token.kind != TokenKind::RBrace {
            if self.token.kind.ends_input() {
                return Err(self.err("unterminated block: expected `}`"));
            }
            let stmt = self.parse_statement()?;
            if prev.is_some() {
                self.arena.set_next(prev, stmt);
            } else {
                first = stmt;
            }
            prev = stmt;
        }
        self.advance();
        Ok(self.arena.push(Node::new(NodeKind::Block, Payload::Child(first))))
    }

    fn parse_if(&mut self) -> Result<NodeRef, ParseError> {
        self.advance();
        self.expect(&TokenKind::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(&TokenKind::RParen)?;
        let then_branch = self.parse_statement()?;
        self.arena.set_next(cond, then_branch);
        if self.token.kind == TokenKind::Else {
            self.advance();
            let else_branch = self.parse_statement()?;
            self.arena.set_next(then_branch, else_branch);
        }
        Ok(self.arena.push(Node::new(NodeKind::If, Payload::Child(cond))))
    }

    fn parse_while(&mut self) -> Result<NodeRef, ParseError> {
        self.advance();
        self.expect(&TokenKind::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(&TokenKind::RParen)?;
        let body = self.parse_statement()?;
        self.arena.set_next(cond, body);
        Ok(self
            .arena
            .push(Node::new(NodeKind::While, Payload::Child(cond))))
    }

    fn parse_for(&mut self) -> Result<NodeRef, ParseError> {
        self.advance();
        self.expect(&TokenKind::LParen)?;
        if matches!(self.token.kind, TokenKind::Ident(_)) && *self.peek() == TokenKind::In {
            return self.parse_for_in();
        }

        // Three-part form; empty parts get neutral substitutes.
        let init = if self.token.kind == TokenKind::Semicolon {
            self.advance();
            self.empty_statement()
        } else {
            self.parse_expr_statement(true)?
        };
        let cond = if self.token.kind == TokenKind::Semicolon {
            self.arena.push(Node::new(NodeKind::IntLit, Payload::Int(1)))
        } else {
            self.parse_expr()?
        };
        self.expect(&TokenKind::Semicolon)?;
        let step = if self.token.kind == TokenKind::RParen {
            self.empty_statement()
        } else {
            self.parse_expr_statement(false)?
        };
        self.expect(&TokenKind::RParen)?;
        let body = self.parse_statement()?;

        self.arena.set_next(init, cond);
        self.arena.set_next(cond, step);
        self.arena.set_next(step, body);
        Ok(self.arena.push(Node::new(NodeKind::For, Payload::Child(init))))
    }

    /// `for (k in t) body` — `k` is a plain variable reference.
    fn parse_for_in(&mut self) -> Result<NodeRef, ParseError> {
        let var = match std::mem::replace(&mut self.token.kind, TokenKind::Eof) {
            TokenKind::Ident(name) => {
                self.advance();
                self.variable_ref(&name)
            }
            _ => return Err(self.err("expected loop variable")),
        };
        self.expect(&TokenKind::In)?;
        let table = self.parse_expr()?;
        self.expect(&TokenKind::RParen)?;
        let body = self.parse_statement()?;
        self.arena.set_next(var, table);
        self.arena.set_next(table, body);
        Ok(self
            .arena
            .push(Node::new(NodeKind::ForIn, Payload::Child(var))))
    }

    fn parse_loop_exit(&mut self, kind: NodeKind) -> Result<NodeRef, ParseError> {
        self.advance();
        self.expect(&TokenKind::Semicolon)?;
        Ok(self.arena.push(Node::new(kind, Payload::None)))
    }

    fn parse_return(&mut self) -> Result<NodeRef, ParseError> {
        self.advance();
        if self.token.kind == TokenKind::Semicolon {
            self.advance();
            return Ok(self
                .arena
                .push(Node::new(NodeKind::Return, Payload::None)));
        }
        let value = self.parse_expr()?;
        self.expect(&TokenKind::Semicolon)?;
        Ok(self
            .arena
            .push(Node::new(NodeKind::Return, Payload::Child(value))))
    }

    /// `local name;` declares a slot; `local name = expr;` also assigns.
    fn parse_local(&mut self) -> Result<NodeRef, ParseError> {
        self.advance();
        let name = match std::mem::replace(&mut self.token.kind, TokenKind::Eof) {
            TokenKind::Ident(name) => {
                self.advance();
                name
            }
            other => {
                self.token.kind = other;
                return Err(self.err("expected name after `local`"));
            }
        };
        let slot = self.declare_local(&name)?;
        if self.token.kind == TokenKind::Assign {
            self.advance();
            let target = self
                .arena
                .push(Node::new(NodeKind::Local, Payload::Int(i64::from(slot))));
            let value = self.parse_expr()?;
            self.expect(&TokenKind::Semicolon)?;
            self.arena.set_next(target, value);
            let assign = self
                .arena
                .push(Node::new(NodeKind::Assign, Payload::Child(target)));
            return Ok(self
                .arena
                .push(Node::new(NodeKind::ExprStmt, Payload::Child(assign))));
        }
        self.expect(&TokenKind::Semicolon)?;
        // Slots start out null; a bare declaration has no runtime effect.
        Ok(self.empty_statement())
    }

    /// Expression or assignment statement.
    pub(crate) fn parse_expr_statement(
        &mut self,
        require_semi: bool,
    ) -> Result<NodeRef, ParseError> {
        let expr = self.parse_expr()?;
        let expr = if self.token.kind == TokenKind::Assign {
            let target_kind = self.arena.node(expr).kind;
            if !matches!(
                target_kind,
                NodeKind::Global | NodeKind::Local | NodeKind::Index
            ) {
                return Err(self.err("invalid assignment target"));
            }
            self.advance();
            let value = self.parse_expr()?;
            self.arena.set_next(expr, value);
            self.arena
                .push(Node::new(NodeKind::Assign, Payload::Child(expr)))
        } else {
            expr
        };
        if require_semi {
            self.expect(&TokenKind::Semicolon)?;
        }
        Ok(self
            .arena
            .push(Node::new(NodeKind::ExprStmt, Payload::Child(expr))))
    }

    /// A no-op statement (empty block).
    fn empty_statement(&mut self) -> NodeRef {
        self.arena
            .push(Node::new(NodeKind::Block, Payload::Child(NodeRef::NONE)))
    }
}
