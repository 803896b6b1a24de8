//! Recursive-descent parser.
//!
//! Precedence, loosest first: `or`, `and`, `not`, comparisons (not
//! chainable), `+ -`, `* / %`, unary minus.

use crate::ast::{BinaryOp, Expr, ExprKind, Program, Stmt, StmtKind, UnaryOp};
use crate::error::{Position, ScriptError};
use crate::lexer::{Keyword, Lexer, Token, TokenKind};

/// Deepest nesting accepted, for expressions and for blocks alike.
///
/// Parsing, evaluation and drop all recurse over the tree, and a stack
/// overflow aborts the process, so the limit is enforced up front.
pub const MAX_NESTING: usize = 100;

/// Lex and parse a whole program.
pub fn parse(source: &str) -> Result<Program, ScriptError> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser::new(tokens).program()
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

type PResult<T> = Result<T, ScriptError>;

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().is_none_or(|t| t.kind != TokenKind::Eof) {
            let end = tokens.last().map(|t| t.end).unwrap_or_default();
            tokens.push(Token {
                kind: TokenKind::Eof,
                start: end,
                end,
            });
        }
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    pub fn program(&mut self) -> PResult<Program> {
        let mut body = Vec::new();
        loop {
            self.skip_newlines();
            if self.at(&TokenKind::Eof) {
                return Ok(Program { body });
            }
            body.push(self.statement()?);
            self.end_of_statement()?;
        }
    }

    // ────────────────────────────────────────────────────────────
    // Statements
    // ────────────────────────────────────────────────────────────

    fn statement(&mut self) -> PResult<Stmt> {
        let start = self.current().start;
        let kind = match self.current().kind.clone() {
            TokenKind::Keyword(Keyword::Print) => {
                self.advance();
                let mut values = Vec::new();
                if !self.at_separator() {
                    values.push(self.expr()?);
                    while self.eat(&TokenKind::Comma) {
                        values.push(self.expr()?);
                    }
                }
                StmtKind::Print(values)
            }
            TokenKind::Keyword(Keyword::Write) => {
                self.advance();
                StmtKind::Write(self.expr()?)
            }
            TokenKind::Keyword(Keyword::Input) => {
                self.advance();
                let name = self.ident()?;
                let prompt = if self.at_separator() {
                    None
                } else {
                    Some(self.expr()?)
                };
                StmtKind::Input { name, prompt }
            }
            TokenKind::Keyword(Keyword::Let) => {
                self.advance();
                self.assignment()?
            }
            TokenKind::Ident(_) => self.assignment()?,
            TokenKind::Keyword(Keyword::If) => self.if_statement()?,
            TokenKind::Keyword(Keyword::While) => {
                self.advance();
                let cond = self.expr()?;
                self.expect_keyword(Keyword::Do)?;
                let body = self.block(&[Keyword::End])?;
                self.expect_keyword(Keyword::End)?;
                StmtKind::While { cond, body }
            }
            TokenKind::Keyword(Keyword::For) => self.for_statement()?,
            TokenKind::Keyword(kw) => {
                return Err(self.error_here(format!("Unexpected '{}'", kw.as_str())));
            }
            _ => return Err(self.error_here("Expected a statement")),
        };

        Ok(Stmt {
            kind,
            start,
            end: self.prev_end(),
        })
    }

    fn assignment(&mut self) -> PResult<StmtKind> {
        let name = self.ident()?;
        if !self.eat(&TokenKind::Assign) {
            return Err(self.error_here("Expected '='"));
        }
        let value = self.expr()?;
        Ok(StmtKind::Assign { name, value })
    }

    fn if_statement(&mut self) -> PResult<StmtKind> {
        self.advance();
        let cond = self.expr()?;
        self.expect_keyword(Keyword::Then)?;
        let then_block = self.block(&[Keyword::Else, Keyword::End])?;
        let else_block = if self.eat_keyword(Keyword::Else) {
            self.block(&[Keyword::End])?
        } else {
            Vec::new()
        };
        self.expect_keyword(Keyword::End)?;
        Ok(StmtKind::If {
            cond,
            then_block,
            else_block,
        })
    }

    fn for_statement(&mut self) -> PResult<StmtKind> {
        self.advance();
        let var = self.ident()?;
        if !self.eat(&TokenKind::Assign) {
            return Err(self.error_here("Expected '='"));
        }
        let from = self.expr()?;
        let descending = if self.eat_keyword(Keyword::To) {
            false
        } else if self.eat_keyword(Keyword::Downto) {
            true
        } else {
            return Err(self.error_here("Expected 'to' or 'downto'"));
        };
        let to = self.expr()?;
        self.expect_keyword(Keyword::Do)?;
        let body = self.block(&[Keyword::End])?;
        self.expect_keyword(Keyword::End)?;
        Ok(StmtKind::For {
            var,
            from,
            to,
            descending,
            body,
        })
    }

    /// Statements up to (not including) one of `terminators`.
    fn block(&mut self, terminators: &[Keyword]) -> PResult<Vec<Stmt>> {
        let mut body = Vec::new();
        loop {
            self.skip_newlines();
            match &self.current().kind {
                TokenKind::Keyword(kw) if terminators.contains(kw) => return Ok(body),
                TokenKind::Eof => return Err(self.error_here("Expected 'end'")),
                _ => {}
            }
            body.push(self.nested("Blocks", Self::statement)?);
            self.end_of_statement()?;
        }
    }

    fn end_of_statement(&mut self) -> PResult<()> {
        if self.eat(&TokenKind::Newline) || self.at_separator() {
            Ok(())
        } else {
            Err(self.error_here("Expected end of statement"))
        }
    }

    // ────────────────────────────────────────────────────────────
    // Expressions
    // ────────────────────────────────────────────────────────────

    pub fn expr(&mut self) -> PResult<Expr> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> PResult<Expr> {
        let mut lhs = self.and_expr()?;
        while self.eat_keyword(Keyword::Or) {
            let rhs = self.and_expr()?;
            lhs = binary(BinaryOp::Or, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> PResult<Expr> {
        let mut lhs = self.not_expr()?;
        while self.eat_keyword(Keyword::And) {
            let rhs = self.not_expr()?;
            lhs = binary(BinaryOp::And, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn not_expr(&mut self) -> PResult<Expr> {
        let start = self.current().start;
        if self.eat_keyword(Keyword::Not) {
            let operand = self.nested("Expression", Self::not_expr)?;
            return unary(UnaryOp::Not, operand, start);
        }
        self.comparison()
    }

    fn comparison(&mut self) -> PResult<Expr> {
        let lhs = self.arith()?;
        let op = match self.current().kind {
            TokenKind::Eq => BinaryOp::Eq,
            TokenKind::Ne => BinaryOp::Ne,
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::Le => BinaryOp::Le,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::Ge => BinaryOp::Ge,
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.arith()?;
        binary(op, lhs, rhs)
    }

    fn arith(&mut self) -> PResult<Expr> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.term()?;
            lhs = binary(op, lhs, rhs)?;
        }
    }

    fn term(&mut self) -> PResult<Expr> {
        let mut lhs = self.factor()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => return Ok(lhs),
            };
            self.advance();
            let rhs = self.factor()?;
            lhs = binary(op, lhs, rhs)?;
        }
    }

    fn factor(&mut self) -> PResult<Expr> {
        let start = self.current().start;
        if self.eat(&TokenKind::Minus) {
            let operand = self.nested("Expression", Self::factor)?;
            return unary(UnaryOp::Neg, operand, start);
        }
        if self.eat(&TokenKind::Plus) {
            return self.nested("Expression", Self::factor);
        }
        self.atom()
    }

    fn atom(&mut self) -> PResult<Expr> {
        let token = self.current().clone();
        let kind = match token.kind {
            TokenKind::Int(n) => ExprKind::Int(n),
            TokenKind::Float(n) => ExprKind::Float(n),
            TokenKind::Str(s) => ExprKind::Str(s),
            TokenKind::Ident(name) => ExprKind::Var(name),
            TokenKind::Keyword(Keyword::True) => ExprKind::Bool(true),
            TokenKind::Keyword(Keyword::False) => ExprKind::Bool(false),
            TokenKind::LParen => {
                self.advance();
                let mut inner = self.nested("Expression", Self::expr)?;
                if !self.eat(&TokenKind::RParen) {
                    return Err(self.error_here("Expected ')'"));
                }
                inner.start = token.start;
                inner.end = self.prev_end();
                return Ok(inner);
            }
            _ => {
                return Err(self.error_here(
                    "Expected a number, string, identifier, 'true', 'false', '-', 'not' or '('",
                ));
            }
        };
        self.advance();
        Ok(Expr {
            kind,
            start: token.start,
            end: token.end,
            height: 1,
        })
    }

    /// Run `parse` one level deeper, refusing past [`MAX_NESTING`].
    fn nested<T>(
        &mut self,
        what: &str,
        parse: impl FnOnce(&mut Self) -> PResult<T>,
    ) -> PResult<T> {
        if self.depth >= MAX_NESTING {
            return Err(self.error_here(format!("{what} nested too deeply")));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    // ────────────────────────────────────────────────────────────
    // Cursor helpers
    // ────────────────────────────────────────────────────────────

    fn current(&self) -> &Token {
        // Never empty: `new` guarantees a trailing Eof we never step past.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn prev_end(&self) -> Position {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|t| t.end)
            .unwrap_or_default()
    }

    fn advance(&mut self) {
        if !self.at(&TokenKind::Eof) {
            self.pos += 1;
        }
    }

    fn at(&self, kind: &TokenKind) -> bool {
        &self.current().kind == kind
    }

    fn at_separator(&self) -> bool {
        matches!(
            self.current().kind,
            TokenKind::Newline
                | TokenKind::Eof
                | TokenKind::Keyword(Keyword::Else)
                | TokenKind::Keyword(Keyword::End)
        )
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, kw: Keyword) -> bool {
        self.eat(&TokenKind::Keyword(kw))
    }

    fn expect_keyword(&mut self, kw: Keyword) -> PResult<()> {
        if self.eat_keyword(kw) {
            Ok(())
        } else {
            Err(self.error_here(format!("Expected '{}'", kw.as_str())))
        }
    }

    fn ident(&mut self) -> PResult<String> {
        match self.current().kind.clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.error_here("Expected identifier")),
        }
    }

    fn skip_newlines(&mut self) {
        while self.eat(&TokenKind::Newline) {}
    }

    fn error_here(&self, details: impl Into<String>) -> ScriptError {
        let token = self.current();
        ScriptError::syntax(details, token.start, token.end)
    }
}

// Left-associative chains build height without parser recursion, so the
// limit is checked again on every node.
fn checked_height(height: usize, start: Position, end: Position) -> PResult<usize> {
    if height > MAX_NESTING {
        Err(ScriptError::syntax("Expression nested too deeply", start, end))
    } else {
        Ok(height)
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> PResult<Expr> {
    let (start, end) = (lhs.start, rhs.end);
    let height = checked_height(lhs.height.max(rhs.height) + 1, start, end)?;
    Ok(Expr {
        kind: ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        start,
        end,
        height,
    })
}

fn unary(op: UnaryOp, operand: Expr, start: Position) -> PResult<Expr> {
    let end = operand.end;
    let height = checked_height(operand.height + 1, start, end)?;
    Ok(Expr {
        kind: ExprKind::Unary {
            op,
            operand: Box::new(operand),
        },
        start,
        end,
        height,
    })
}
