//! Parser for Wandelt.
//!
//! Statements are parsed by recursive descent, expressions by precedence
//! climbing. A malformed statement produces exactly one diagnostic and no
//! node; the parser then skips ahead to the next statement boundary and
//! keeps going so that later errors are still reported. Braced groups met
//! while skipping belong to the malformed statement and are skipped whole.

use crate::ast::{Ast, BinaryOp, IdentifierKind, NodeId, NodeKind, UnaryOp};
use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::lexer::{Token, TokenKind};

/// Output of a parse: the node arena, the top-level statements in source
/// order and every syntax error encountered.
#[derive(Debug)]
pub struct ParseResult {
    pub ast: Ast,
    pub statements: Vec<NodeId>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ParseResult {
    pub fn is_valid(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Parse a token stream produced by [`crate::lexer::lex`].
///
/// The stream is expected to end with an end-of-file token.
pub fn parse(tokens: &[Token]) -> ParseResult {
    let mut parser = Parser {
        tokens,
        position: 0,
        ast: Ast::new(),
        diagnostics: Vec::new(),
    };
    let statements = if tokens.is_empty() {
        Vec::new()
    } else {
        parser.program()
    };
    ParseResult {
        ast: parser.ast,
        statements,
        diagnostics: parser.diagnostics,
    }
}

/// Tokens that may begin a statement and are therefore safe places to
/// resume after an error.
const STATEMENT_START: &[TokenKind] = &[TokenKind::If, TokenKind::Return];

/// Inside a scope the closing brace is a resumption point as well.
const SCOPE_RESUME: &[TokenKind] = &[TokenKind::If, TokenKind::Return, TokenKind::RightBrace];

/// State of error recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Recovery {
    /// Discarding tokens until a resumption point.
    Scanning,
    /// Positioned on a resumption token.
    Resumed,
    /// Ran into the end of the input.
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Binary(BinaryOp),
    Power,
}

impl Operator {
    fn from_token(kind: TokenKind) -> Option<Operator> {
        let op = match kind {
            TokenKind::DoubleStar => return Some(Operator::Power),
            TokenKind::Plus => BinaryOp::Add,
            TokenKind::Minus => BinaryOp::Sub,
            TokenKind::Star => BinaryOp::Mul,
            TokenKind::Slash => BinaryOp::Div,
            TokenKind::Percent => BinaryOp::Rem,
            TokenKind::EqualEqual => BinaryOp::Equal,
            TokenKind::BangEqual => BinaryOp::NotEqual,
            TokenKind::Less => BinaryOp::Less,
            TokenKind::LessEqual => BinaryOp::LessEqual,
            TokenKind::Greater => BinaryOp::Greater,
            TokenKind::GreaterEqual => BinaryOp::GreaterEqual,
            _ => return None,
        };
        Some(Operator::Binary(op))
    }

    /// Higher binds tighter.
    fn precedence(self) -> u8 {
        match self {
            Operator::Power | Operator::Binary(BinaryOp::Rem) => 4,
            Operator::Binary(BinaryOp::Mul | BinaryOp::Div) => 3,
            Operator::Binary(BinaryOp::Add | BinaryOp::Sub) => 2,
            Operator::Binary(
                BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual,
            ) => 1,
            Operator::Binary(BinaryOp::Equal | BinaryOp::NotEqual) => 0,
        }
    }
}

fn can_start_expression(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Number
            | TokenKind::LeftParen
            | TokenKind::Minus
            | TokenKind::FunctionIdentifier
            | TokenKind::VariableIdentifier
    )
}

struct Parser<'t> {
    tokens: &'t [Token],
    position: usize,
    ast: Ast,
    diagnostics: Vec<Diagnostic>,
}

impl<'t> Parser<'t> {
    fn program(&mut self) -> Vec<NodeId> {
        let mut statements = Vec::new();
        while !self.at_end() {
            let start = self.position;
            match self.statement() {
                Some(statement) => statements.push(statement),
                None => {
                    self.ensure_progress(start, STATEMENT_START);
                    self.synchronize(STATEMENT_START);
                }
            }
        }
        statements
    }

    fn statement(&mut self) -> Option<NodeId> {
        match self.current().kind {
            TokenKind::If => self.if_statement(),
            TokenKind::Return => self.return_statement(),
            _ => self.expression_statement(),
        }
    }

    fn if_statement(&mut self) -> Option<NodeId> {
        let location = self.advance().location.clone();

        let condition = self.expression()?;
        let then_scope = self.scope()?;

        let else_scope = if self.check(TokenKind::Else) {
            self.advance();
            if self.check(TokenKind::If) {
                let chain_location = self.current().location.clone();
                let nested = self.if_statement()?;
                Some(self.ast.push(NodeKind::Scope(vec![nested]), chain_location))
            } else {
                Some(self.scope()?)
            }
        } else {
            None
        };

        Some(self.ast.push(
            NodeKind::IfStatement {
                condition,
                then_scope,
                else_scope,
            },
            location,
        ))
    }

    fn scope(&mut self) -> Option<NodeId> {
        if !self.check(TokenKind::LeftBrace) {
            return self.error_at_current(DiagnosticKind::MissingLeftBrace, "{");
        }
        let location = self.advance().location.clone();

        let mut statements = Vec::new();
        let mut failed = false;
        loop {
            match self.current().kind {
                TokenKind::RightBrace => {
                    self.advance();
                    break;
                }
                // An inner statement already reported this scope.
                TokenKind::EndOfFile if failed => return None,
                TokenKind::EndOfFile => {
                    return self.error_at_current(DiagnosticKind::MissingScopeClosing, "}");
                }
                TokenKind::Else => {
                    self.error_at_current(DiagnosticKind::MissingRightBrace, "}");
                    failed = true;
                    self.advance();
                    self.synchronize(SCOPE_RESUME);
                }
                _ => {
                    let start = self.position;
                    match self.statement() {
                        Some(statement) => statements.push(statement),
                        None => {
                            failed = true;
                            self.ensure_progress(start, SCOPE_RESUME);
                            self.synchronize(SCOPE_RESUME);
                        }
                    }
                }
            }
        }

        if failed {
            return None;
        }
        Some(self.ast.push(NodeKind::Scope(statements), location))
    }

    fn return_statement(&mut self) -> Option<NodeId> {
        let location = self.advance().location.clone();

        if self.check(TokenKind::Semicolon) {
            self.advance();
            return Some(self.ast.push(NodeKind::ReturnStatement(None), location));
        }

        let expression = self.expression()?;
        self.expect_semicolon()?;
        Some(
            self.ast
                .push(NodeKind::ReturnStatement(Some(expression)), location),
        )
    }

    fn expression_statement(&mut self) -> Option<NodeId> {
        if !can_start_expression(self.current().kind) {
            return self.error_at_current(DiagnosticKind::UnexpectedToken, "statement");
        }
        let expression = self.expression()?;
        self.expect_semicolon()?;
        Some(expression)
    }

    fn expect_semicolon(&mut self) -> Option<()> {
        if self.check(TokenKind::Semicolon) {
            self.advance();
            Some(())
        } else {
            self.error_at_current(DiagnosticKind::MissingSemicolon, ";");
            None
        }
    }

    fn expression(&mut self) -> Option<NodeId> {
        let lhs = self.prefix()?;
        self.expression_rhs(lhs, 0)
    }

    /// Fold operators of at least `min_precedence` onto `lhs`.
    fn expression_rhs(&mut self, mut lhs: NodeId, min_precedence: u8) -> Option<NodeId> {
        loop {
            let token = self.current();
            let Some(op) = Operator::from_token(token.kind) else {
                return Some(lhs);
            };
            let precedence = op.precedence();
            if precedence < min_precedence {
                return Some(lhs);
            }
            let location = token.location.clone();
            self.advance();

            let mut rhs = self.prefix()?;
            while let Some(next) = Operator::from_token(self.current().kind) {
                let next_precedence = next.precedence();
                if next_precedence > precedence {
                    rhs = self.expression_rhs(rhs, precedence + 1)?;
                } else if op == Operator::Power && next == Operator::Power {
                    rhs = self.power_chain(rhs)?;
                } else {
                    break;
                }
            }

            let kind = match op {
                Operator::Power => NodeKind::PowerExpression {
                    base: lhs,
                    exponent: rhs,
                },
                Operator::Binary(op) => NodeKind::BinaryExpression {
                    left: lhs,
                    right: rhs,
                    op,
                },
            };
            lhs = self.ast.push(kind, location);
        }
    }

    /// `base ** exponent`, where the exponent takes any further `**`.
    /// Nothing binds tighter than `**`, so the exponent is just a prefix
    /// expression or another chain.
    fn power_chain(&mut self, base: NodeId) -> Option<NodeId> {
        let location = self.advance().location.clone();
        let mut exponent = self.prefix()?;
        if self.check(TokenKind::DoubleStar) {
            exponent = self.power_chain(exponent)?;
        }
        Some(
            self.ast
                .push(NodeKind::PowerExpression { base, exponent }, location),
        )
    }

    fn prefix(&mut self) -> Option<NodeId> {
        if self.check(TokenKind::Minus) {
            let location = self.advance().location.clone();
            let operand = self.literal()?;
            return Some(self.ast.push(
                NodeKind::UnaryExpression {
                    operand,
                    op: UnaryOp::Negate,
                },
                location,
            ));
        }
        self.literal()
    }

    fn literal(&mut self) -> Option<NodeId> {
        let token = self.current();
        match token.kind {
            TokenKind::Number => {
                self.advance();
                let text = token.text();
                match text.parse::<i32>() {
                    Ok(value) => Some(
                        self.ast
                            .push(NodeKind::NumberLiteral(value), token.location.clone()),
                    ),
                    Err(_) => {
                        let diag =
                            Diagnostic::error(DiagnosticKind::NumberOutOfRange, token.location.clone())
                                .with_found(text);
                        self.diagnostics.push(diag);
                        None
                    }
                }
            }
            TokenKind::LeftParen => {
                self.advance();
                let inner = self.expression()?;
                if !self.check(TokenKind::RightParen) {
                    return self.error_at_current(DiagnosticKind::MissingRightParenthesis, ")");
                }
                self.advance();
                Some(
                    self.ast
                        .push(NodeKind::GroupingExpression(inner), token.location.clone()),
                )
            }
            TokenKind::VariableIdentifier => {
                self.advance();
                Some(self.ast.push(
                    NodeKind::Declaration {
                        identifier: token.text().to_string(),
                        kind: IdentifierKind::Variable,
                    },
                    token.location.clone(),
                ))
            }
            TokenKind::FunctionIdentifier => self.call(),
            _ => self.error_at_current(DiagnosticKind::MissingExpression, "expression"),
        }
    }

    /// `name '(' args ')'`. The callee is recorded as a declaration node.
    fn call(&mut self) -> Option<NodeId> {
        let callee = self.advance();
        if !self.check(TokenKind::LeftParen) {
            return self.error_at_current(DiagnosticKind::MissingLeftParenthesis, "(");
        }
        self.advance();

        let mut arguments = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                arguments.push(self.expression()?);
                if self.check(TokenKind::Comma) {
                    self.advance();
                    continue;
                }
                break;
            }
        }
        if !self.check(TokenKind::RightParen) {
            return self.error_at_current(DiagnosticKind::MissingRightParenthesis, ")");
        }
        self.advance();

        let declaration = self.ast.push(
            NodeKind::Declaration {
                identifier: callee.text().to_string(),
                kind: IdentifierKind::Function,
            },
            callee.location.clone(),
        );
        Some(self.ast.push(
            NodeKind::CallExpression {
                declaration,
                arguments,
            },
            callee.location.clone(),
        ))
    }

    /// Discard tokens until one of `resume_at` (or the end of input).
    ///
    /// Only tokens outside braces opened during the scan count. An unmatched
    /// `}` is discarded unless it is itself a resumption point.
    fn synchronize(&mut self, resume_at: &[TokenKind]) -> Recovery {
        let mut depth = 0usize;
        let mut state = Recovery::Scanning;
        while state == Recovery::Scanning {
            let kind = self.current().kind;
            state = if kind == TokenKind::EndOfFile {
                Recovery::Exhausted
            } else if depth == 0 && resume_at.contains(&kind) {
                Recovery::Resumed
            } else {
                match kind {
                    TokenKind::LeftBrace => depth += 1,
                    TokenKind::RightBrace => depth = depth.saturating_sub(1),
                    _ => {}
                }
                self.advance();
                Recovery::Scanning
            };
        }
        state
    }

    /// A statement that failed on a resumption token without consuming it
    /// would stall recovery on that token forever.
    fn ensure_progress(&mut self, start: usize, resume_at: &[TokenKind]) {
        if self.position == start && resume_at.contains(&self.current().kind) {
            self.advance();
        }
    }

    fn error_at_current(&mut self, kind: DiagnosticKind, expected: &str) -> Option<NodeId> {
        let token = self.current();
        let diag = Diagnostic::error(kind, token.location.clone())
            .with_expected(expected)
            .with_found(token.text());
        self.diagnostics.push(diag);
        None
    }

    fn current(&self) -> &'t Token {
        let index = self.position.min(self.tokens.len() - 1);
        &self.tokens[index]
    }

    fn advance(&mut self) -> &'t Token {
        let token = self.current();
        if token.kind != TokenKind::EndOfFile {
            self.position += 1;
        }
        token
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    fn at_end(&self) -> bool {
        self.check(TokenKind::EndOfFile)
    }
}
