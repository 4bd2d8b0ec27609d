pub mod ast;
pub mod parents;
pub mod template;

use crate::config::MatchMode;
use crate::error::{ErrorStack, VineError};
use crate::keywords::default_table;
use crate::parser::ast::{
    BinaryOp, Block, Case, CompareOp, ElseBranch, Expr, ExprKind, FunctionDecl, Ident, Lambda,
    Literal, MemberKey, NodeId, Program, Property, Run, Stmt, StmtKind, Switch, To, UseDecl,
    UseSpecifier,
};
use crate::parser::parents::ParentTable;
use crate::scanner::token::{Token, TokenType};
use crate::scanner::Scanner;
use crate::span::Span;
use std::collections::{HashMap, VecDeque};
use std::mem::discriminant;
use std::rc::Rc;

pub struct Parser {
    tokens: VecDeque<Token>,
    eof: Token,
    keywords: HashMap<String, TokenType>,
    match_mode: MatchMode,
    errors: ErrorStack,
    next_id: NodeId,
    last_span: Span,
}

// String(..) and Number(..) match regardless of payload
fn same_kind(a: &TokenType, b: &TokenType) -> bool {
    discriminant(a) == discriminant(b)
}

fn describe(token: &Token) -> String {
    match token.token_type {
        TokenType::Eof => "end of file".into(),
        TokenType::String(_) => format!("string {}", token.lexeme),
        _ => format!("'{}'", token.lexeme),
    }
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        let eof_span = tokens.last().map(|t| t.span).unwrap_or_default();
        Self {
            tokens: tokens.into(),
            eof: Token::new(TokenType::Eof, "", eof_span),
            keywords: default_table(),
            match_mode: MatchMode::Strict,
            errors: ErrorStack::new(),
            next_id: 0,
            last_span: Span::default(),
        }
    }

    /// Keyword table used when re-tokenizing `{{ }}` template segments.
    pub fn with_keywords(mut self, keywords: &HashMap<String, TokenType>) -> Self {
        self.keywords = keywords.clone();
        self
    }

    pub fn with_match_mode(mut self, match_mode: MatchMode) -> Self {
        self.match_mode = match_mode;
        self
    }

    /// Appends more tokens so a following `parse()` continues where the last one stopped.
    pub fn push_stack(&mut self, tokens: Vec<Token>) {
        if self
            .tokens
            .back()
            .is_some_and(|t| t.token_type == TokenType::Eof)
        {
            self.tokens.pop_back();
        }
        if let Some(last) = tokens.last() {
            self.eof.span = last.span;
        }
        self.tokens.extend(tokens);
    }

    pub fn parse(&mut self) -> Result<Program, VineError> {
        self.errors.clear();
        match self.program() {
            Ok(program) => Ok(program),
            Err(e) => Err(self.errors.surface(e)),
        }
    }

    /// Parses a single expression that must span all remaining tokens.
    pub fn parse_expression(&mut self) -> Result<Expr, VineError> {
        self.errors.clear();
        let result = self.expression().and_then(|expr| {
            self.consume(TokenType::Eof, "end of expression")?;
            Ok(expr)
        });
        result.map_err(|e| self.errors.surface(e))
    }

    pub(crate) fn next_id(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // utility methods
    fn front_raw(&self) -> &Token {
        self.tokens.front().unwrap_or(&self.eof)
    }

    fn at(&self, offset: usize) -> &Token {
        self.tokens
            .iter()
            .filter(|t| !t.is_trivia())
            .nth(offset)
            .unwrap_or(&self.eof)
    }

    fn peek(&self) -> &Token {
        self.at(0)
    }

    fn skip_trivia(&mut self) {
        while self.tokens.front().is_some_and(|t| t.is_trivia()) {
            self.tokens.pop_front();
        }
    }

    fn advance(&mut self) -> Token {
        self.skip_trivia();
        let token = match self.tokens.front() {
            Some(t) if t.token_type != TokenType::Eof => self.tokens.pop_front(),
            _ => None,
        }
        .unwrap_or_else(|| self.eof.clone());
        self.last_span = token.span;
        token
    }

    fn check(&self, token_type: &TokenType) -> bool {
        same_kind(&self.peek().token_type, token_type)
    }

    fn match_any(&mut self, types: &[TokenType]) -> Option<Token> {
        if types.iter().any(|t| self.check(t)) {
            Some(self.advance())
        } else {
            None
        }
    }

    fn fail(&mut self, message: impl Into<String>, span: Span) -> VineError {
        self.errors.push(VineError::syntax(message, span))
    }

    fn error_expected(&mut self, expected: &str) -> VineError {
        let current = self.peek().clone();
        self.fail(
            format!("Expected {}, got {}", expected, describe(&current)),
            current.span,
        )
    }

    fn consume(&mut self, token_type: TokenType, expected: &str) -> Result<Token, VineError> {
        match self.match_mode {
            MatchMode::Strict => {
                if self.check(&token_type) {
                    Ok(self.advance())
                } else {
                    Err(self.error_expected(expected))
                }
            }
            MatchMode::Scan { limit } => {
                let mut discarded = 0;
                loop {
                    if self.check(&token_type) {
                        return Ok(self.advance());
                    }
                    if self.check(&TokenType::Eof) || discarded >= limit {
                        return Err(self.error_expected(expected));
                    }
                    self.advance();
                    discarded += 1;
                }
            }
        }
    }

    fn identifier(&mut self, expected: &str) -> Result<Ident, VineError> {
        let token = self.consume(TokenType::Identifier, expected)?;
        Ok(Ident {
            name: token.lexeme,
            span: token.span,
        })
    }

    // property names after '.' and object keys may reuse keyword spellings
    fn property_name(&mut self) -> Result<Ident, VineError> {
        let token = self.peek();
        if token.token_type == TokenType::Identifier || token.token_type.is_keyword() {
            let token = self.advance();
            Ok(Ident {
                name: token.lexeme,
                span: token.span,
            })
        } else {
            Err(self.error_expected("property name"))
        }
    }

    fn can_start_expression(&self) -> bool {
        matches!(
            self.peek().token_type,
            TokenType::Number(_)
                | TokenType::String(_)
                | TokenType::Identifier
                | TokenType::True
                | TokenType::False
                | TokenType::Nil
                | TokenType::NaN
                | TokenType::LeftParen
                | TokenType::LeftBrace
                | TokenType::LeftBracket
                | TokenType::Minus
                | TokenType::Fn
                | TokenType::Run
                | TokenType::Wait
                | TokenType::Switch
        )
    }

    fn program(&mut self) -> Result<Program, VineError> {
        let id = self.next_id();
        let mut body = Vec::new();
        while self.front_raw().token_type != TokenType::Eof {
            body.push(self.statement()?);
        }
        let parents = ParentTable::build(id, &body);
        Ok(Program { id, body, parents })
    }

    fn stmt(&mut self, kind: StmtKind, span: Span) -> Stmt {
        Stmt {
            id: self.next_id(),
            kind,
            span,
        }
    }

    // Collects statements until one of `terminators` (or end of input) is next. Trivia are kept.
    fn block_until(&mut self, terminators: &[TokenType]) -> Result<Block, VineError> {
        let id = self.next_id();
        let span = self.last_span;
        let mut body = Vec::new();
        loop {
            let front = self.front_raw();
            if front.token_type == TokenType::Eof
                || (!front.is_trivia() && terminators.iter().any(|t| same_kind(t, &front.token_type)))
            {
                break;
            }
            body.push(self.statement()?);
        }
        Ok(Block { id, body, span })
    }

    fn block_to_end(&mut self, closing: &str) -> Result<Block, VineError> {
        let block = self.block_until(&[TokenType::End])?;
        self.consume(TokenType::End, closing)?;
        Ok(block)
    }

    fn statement(&mut self) -> Result<Stmt, VineError> {
        let front = self.front_raw();
        match front.token_type {
            TokenType::Comment => {
                let token = self.tokens.pop_front().unwrap_or_else(|| self.eof.clone());
                return Ok(self.stmt(StmtKind::Comment(token.lexeme), token.span));
            }
            TokenType::EmptyLine => {
                let span = front.span;
                self.tokens.pop_front();
                return Ok(self.stmt(StmtKind::EmptyLine, span));
            }
            _ => {}
        }

        let kind = self.peek().token_type.clone();
        match kind {
            TokenType::Use => self.use_decl(),
            TokenType::Expose => self.expose_stmt(),
            TokenType::Task => self.task_decl(),
            TokenType::Let | TokenType::Const => self.variable_decl(),
            TokenType::Fn if self.at(1).token_type == TokenType::Identifier => {
                let span = self.peek().span;
                let decl = self.fn_decl()?;
                Ok(self.stmt(StmtKind::Fn(decl), span))
            }
            TokenType::If => self.if_stmt(),
            TokenType::For => self.for_stmt(),
            TokenType::Return => self.return_stmt(),
            _ => self.expr_stmt(),
        }
    }

    fn use_decl(&mut self) -> Result<Stmt, VineError> {
        let span = self.advance().span; // consume use
        let source = match self.peek().token_type.clone() {
            TokenType::String(s) => {
                self.advance();
                s
            }
            _ => return Err(self.error_expected("module path string after 'use'")),
        };

        let namespace = if self.match_any(&[TokenType::As]).is_some() {
            Some(self.identifier("namespace name after 'as'")?)
        } else {
            None
        };

        let mut picks = Vec::new();
        if self.match_any(&[TokenType::Pick]).is_some() {
            self.consume(TokenType::LeftParen, "'(' after 'pick'")?;
            while !self.check(&TokenType::RightParen) {
                let name = self.identifier("name to pick")?;
                let alias = if self.match_any(&[TokenType::As]).is_some() {
                    Some(self.identifier("alias after 'as'")?)
                } else {
                    None
                };
                picks.push(UseSpecifier { name, alias });
                if self.match_any(&[TokenType::Comma]).is_none() {
                    break;
                }
            }
            self.consume(TokenType::RightParen, "')' to close pick list")?;
        }

        Ok(self.stmt(
            StmtKind::Use(UseDecl {
                source,
                namespace,
                picks,
            }),
            span,
        ))
    }

    fn expose_stmt(&mut self) -> Result<Stmt, VineError> {
        let span = self.advance().span; // consume expose
        let inner = self.statement()?;
        if inner.kind.declared_name().is_none() {
            return Err(self.fail(
                "'expose' must be followed by a let, const, fn or task declaration",
                inner.span,
            ));
        }
        Ok(self.stmt(StmtKind::Expose(Box::new(inner)), span))
    }

    fn task_decl(&mut self) -> Result<Stmt, VineError> {
        let span = self.advance().span; // consume task
        if !self.check(&TokenType::Fn) {
            return Err(self.error_expected("'fn' after 'task'"));
        }
        let decl = self.fn_decl()?;
        Ok(self.stmt(StmtKind::Task(decl), span))
    }

    fn variable_decl(&mut self) -> Result<Stmt, VineError> {
        let keyword = self.advance(); // consume let/const
        let is_const = keyword.token_type == TokenType::Const;
        let name = self.identifier("variable name")?;
        self.consume(TokenType::Assign, "'=' after variable name")?;
        let value = self.expression()?;
        Ok(self.stmt(
            StmtKind::Let {
                name,
                value,
                is_const,
            },
            keyword.span,
        ))
    }

    fn fn_decl(&mut self) -> Result<FunctionDecl, VineError> {
        self.advance(); // consume fn
        let name = self.identifier("function name")?;
        let params = self.params()?;
        self.consume(TokenType::Colon, "':' before function body")?;
        let body = Rc::new(self.block_to_end("'end' to close function")?);
        Ok(FunctionDecl { name, params, body })
    }

    // `(a, b)` or nothing at all when the block follows directly
    fn params(&mut self) -> Result<Vec<Ident>, VineError> {
        let mut params = Vec::new();
        if self.match_any(&[TokenType::LeftParen]).is_none() {
            return Ok(params);
        }
        while !self.check(&TokenType::RightParen) {
            params.push(self.identifier("parameter name")?);
            if self.match_any(&[TokenType::Comma]).is_none() {
                break;
            }
        }
        self.consume(TokenType::RightParen, "')' after parameters")?;
        Ok(params)
    }

    fn if_stmt(&mut self) -> Result<Stmt, VineError> {
        let span = self.advance().span; // consume if
        let condition = self.expression()?;
        self.consume(TokenType::Colon, "':' after if condition")?;
        let then_branch = self.block_until(&[TokenType::End, TokenType::Else])?;

        let else_branch = if self.match_any(&[TokenType::Else]).is_some() {
            if self.check(&TokenType::If) {
                // the nested if owns the closing 'end'
                Some(ElseBranch::If(Box::new(self.if_stmt()?)))
            } else {
                self.match_any(&[TokenType::Colon]);
                Some(ElseBranch::Block(self.block_to_end("'end' to close if")?))
            }
        } else {
            self.consume(TokenType::End, "'end' to close if")?;
            None
        };

        Ok(self.stmt(
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            },
            span,
        ))
    }

    fn for_stmt(&mut self) -> Result<Stmt, VineError> {
        let span = self.advance().span; // consume for
        let key = self.identifier("loop variable")?;
        let value = if self.match_any(&[TokenType::Comma]).is_some() {
            Some(self.identifier("second loop variable")?)
        } else {
            None
        };
        self.consume(TokenType::In, "'in' after loop variables")?;
        let iterable = self.expression()?;
        self.consume(TokenType::Colon, "':' before loop body")?;
        let body = self.block_to_end("'end' to close for")?;
        Ok(self.stmt(
            StmtKind::For {
                key,
                value,
                iterable,
                body,
            },
            span,
        ))
    }

    fn return_stmt(&mut self) -> Result<Stmt, VineError> {
        let span = self.advance().span; // consume return
        let value = if self.can_start_expression() {
            Some(self.expression()?)
        } else {
            None
        };
        Ok(self.stmt(StmtKind::Return(value), span))
    }

    fn expr_stmt(&mut self) -> Result<Stmt, VineError> {
        let span = self.peek().span;
        let expr = self.expression()?;
        Ok(self.stmt(StmtKind::Expression(expr), span))
    }

    fn expression(&mut self) -> Result<Expr, VineError> {
        self.ternary()
    }

    fn ternary(&mut self) -> Result<Expr, VineError> {
        let condition = self.comparison()?;
        if let Some(question) = self.match_any(&[TokenType::Question]) {
            let consequent = self.expression()?;
            self.consume(TokenType::Colon, "':' in ternary expression")?;
            let alternate = self.expression()?;
            return Ok(Expr {
                kind: ExprKind::Ternary {
                    condition: Box::new(condition),
                    consequent: Box::new(consequent),
                    alternate: Box::new(alternate),
                },
                span: question.span,
            });
        }
        Ok(condition)
    }

    // right-associative: a < b < c is a < (b < c)
    fn comparison(&mut self) -> Result<Expr, VineError> {
        let left = self.equality()?;
        let operator = match self.peek().token_type {
            TokenType::Less => CompareOp::Less,
            TokenType::LessEqual => CompareOp::LessEqual,
            TokenType::Greater => CompareOp::Greater,
            TokenType::GreaterEqual => CompareOp::GreaterEqual,
            _ => return Ok(left),
        };
        let span = self.advance().span;
        let right = self.comparison()?;
        Ok(Expr {
            kind: ExprKind::Compare {
                left: Box::new(left),
                operator,
                right: Box::new(right),
            },
            span,
        })
    }

    fn equality(&mut self) -> Result<Expr, VineError> {
        let left = self.additive()?;

        if let Some(op) = self.match_any(&[TokenType::Equal, TokenType::NotEqual]) {
            let right = self.equality()?;
            return Ok(Expr {
                kind: ExprKind::Equal {
                    left: Box::new(left),
                    negated: op.token_type == TokenType::NotEqual,
                    right: Box::new(right),
                },
                span: op.span,
            });
        }

        if self.check(&TokenType::Assign) {
            let span = self.advance().span;
            let value = self.expression()?;
            return match left.kind {
                ExprKind::Identifier(_) | ExprKind::Member { .. } => Ok(Expr {
                    kind: ExprKind::Assign {
                        target: Box::new(left),
                        value: Box::new(value),
                    },
                    span,
                }),
                _ => Err(self.fail("Invalid assignment target", span)),
            };
        }

        Ok(left)
    }

    // + - * / % share one level and associate to the right
    fn additive(&mut self) -> Result<Expr, VineError> {
        let left = self.range()?;
        let operator = match self.peek().token_type {
            TokenType::Plus => BinaryOp::Add,
            TokenType::Minus => BinaryOp::Sub,
            TokenType::Star => BinaryOp::Mul,
            TokenType::Slash => BinaryOp::Div,
            TokenType::Percent => BinaryOp::Rem,
            _ => return Ok(left),
        };
        let span = self.advance().span;
        let right = self.additive()?;
        Ok(Expr {
            kind: ExprKind::Binary {
                left: Box::new(left),
                operator,
                right: Box::new(right),
            },
            span,
        })
    }

    fn range(&mut self) -> Result<Expr, VineError> {
        let start = self.postfix()?;
        if let Some(dots) = self.match_any(&[TokenType::DotDot]) {
            let end = self.postfix()?;
            return Ok(Expr {
                kind: ExprKind::Range {
                    start: Box::new(start),
                    end: Box::new(end),
                },
                span: dots.span,
            });
        }
        Ok(start)
    }

    fn postfix(&mut self) -> Result<Expr, VineError> {
        let mut expr = self.primary()?;

        loop {
            if self.check(&TokenType::Dot) {
                let span = self.advance().span;
                let name = self.property_name()?;
                expr = Expr {
                    kind: ExprKind::Member {
                        object: Box::new(expr),
                        property: MemberKey::Named(name),
                    },
                    span,
                };
            } else if self.check(&TokenType::LeftBracket) {
                let span = self.advance().span;
                let key = self.expression()?;
                self.consume(TokenType::RightBracket, "']' after index")?;
                expr = Expr {
                    kind: ExprKind::Member {
                        object: Box::new(expr),
                        property: MemberKey::Computed(Box::new(key)),
                    },
                    span,
                };
            } else if self.check(&TokenType::LeftParen) {
                let span = self.advance().span;
                let arguments = self.arguments()?;
                expr = Expr {
                    kind: ExprKind::Call {
                        callee: Box::new(expr),
                        arguments,
                    },
                    span,
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    // opening '(' already consumed
    fn arguments(&mut self) -> Result<Vec<Expr>, VineError> {
        let mut arguments = Vec::new();
        while !self.check(&TokenType::RightParen) {
            arguments.push(self.expression()?);
            if self.match_any(&[TokenType::Comma]).is_none() {
                break;
            }
        }
        self.consume(TokenType::RightParen, "')' after arguments")?;
        Ok(arguments)
    }

    fn primary(&mut self) -> Result<Expr, VineError> {
        let token = self.peek().clone();
        let literal = |kind| {
            Ok(Expr {
                kind: ExprKind::Literal(kind),
                span: token.span,
            })
        };

        match &token.token_type {
            TokenType::Number(n) => {
                self.advance();
                literal(Literal::Num(*n))
            }
            TokenType::String(s) => {
                self.advance();
                if template::is_template(s) {
                    self.template(s, token.span)
                } else {
                    literal(Literal::Str(s.clone()))
                }
            }
            TokenType::True => {
                self.advance();
                literal(Literal::Bool(true))
            }
            TokenType::False => {
                self.advance();
                literal(Literal::Bool(false))
            }
            TokenType::Nil => {
                self.advance();
                literal(Literal::Nil)
            }
            TokenType::NaN => {
                self.advance();
                literal(Literal::NaN)
            }
            TokenType::Identifier => {
                self.advance();
                Ok(Expr {
                    kind: ExprKind::Identifier(token.lexeme),
                    span: token.span,
                })
            }
            TokenType::Minus => {
                self.advance();
                let operand = self.postfix()?;
                Ok(Expr {
                    kind: ExprKind::Negate(Box::new(operand)),
                    span: token.span,
                })
            }
            TokenType::LeftParen => {
                self.advance();
                let expr = self.expression()?;
                self.consume(TokenType::RightParen, "')' after expression")?;
                Ok(expr)
            }
            TokenType::LeftBrace => self.object_literal(),
            TokenType::LeftBracket => self.array_literal(),
            TokenType::Fn => self.lambda(),
            TokenType::Run => self.run_expr(),
            TokenType::Wait => self.wait_expr(),
            TokenType::Switch => self.switch_expr(),
            _ => Err(self.fail(format!("Unexpected token {}", describe(&token)), token.span)),
        }
    }

    fn object_literal(&mut self) -> Result<Expr, VineError> {
        let span = self.advance().span; // consume {
        let mut properties = Vec::new();

        while !self.check(&TokenType::RightBrace) {
            let (key, key_span, is_identifier) = match self.peek().token_type.clone() {
                TokenType::String(s) => {
                    let span = self.advance().span;
                    (s, span, false)
                }
                TokenType::Identifier => {
                    let ident = self.property_name()?;
                    (ident.name, ident.span, true)
                }
                _ => {
                    let ident = self.property_name()?;
                    (ident.name, ident.span, false)
                }
            };

            if self.match_any(&[TokenType::Colon]).is_some() {
                let value = self.expression()?;
                properties.push(Property {
                    key,
                    value,
                    shorthand: false,
                });
            } else if is_identifier {
                // {key}
                let value = Expr {
                    kind: ExprKind::Identifier(key.clone()),
                    span: key_span,
                };
                properties.push(Property {
                    key,
                    value,
                    shorthand: true,
                });
            } else {
                return Err(self.error_expected("':' after object key"));
            }

            if self.match_any(&[TokenType::Comma]).is_none() {
                break;
            }
        }

        self.consume(TokenType::RightBrace, "'}' to close object")?;
        Ok(Expr {
            kind: ExprKind::Object(properties),
            span,
        })
    }

    fn array_literal(&mut self) -> Result<Expr, VineError> {
        let span = self.advance().span; // consume [
        let mut elements = Vec::new();
        while !self.check(&TokenType::RightBracket) {
            elements.push(self.expression()?);
            if self.match_any(&[TokenType::Comma]).is_none() {
                break;
            }
        }
        self.consume(TokenType::RightBracket, "']' to close array")?;
        Ok(Expr {
            kind: ExprKind::Array(elements),
            span,
        })
    }

    fn lambda(&mut self) -> Result<Expr, VineError> {
        let span = self.advance().span; // consume fn
        let params = self.params()?;
        self.consume(TokenType::Colon, "':' before lambda body")?;
        let body = Rc::new(self.block_to_end("'end' to close lambda")?);
        Ok(Expr {
            kind: ExprKind::Lambda(Rc::new(Lambda { params, body })),
            span,
        })
    }

    fn run_expr(&mut self) -> Result<Expr, VineError> {
        let span = self.advance().span; // consume run
        let call = self.postfix()?;
        if !matches!(call.kind, ExprKind::Call { .. }) {
            return Err(self.fail("Expected a call after 'run'", call.span));
        }

        let mut continuations = Vec::new();
        if self.check(&TokenType::To) {
            while let Some(to) = self.match_any(&[TokenType::To]) {
                let params = self.params()?;
                self.consume(TokenType::Colon, "':' before 'to' body")?;
                let body = self.block_until(&[TokenType::To, TokenType::End])?;
                continuations.push(To {
                    params,
                    body,
                    span: to.span,
                });
            }
            self.consume(TokenType::End, "'end' to close run")?;
        }

        Ok(Expr {
            kind: ExprKind::Run(Rc::new(Run {
                call,
                continuations,
            })),
            span,
        })
    }

    fn wait_expr(&mut self) -> Result<Expr, VineError> {
        let span = self.advance().span; // consume wait
        let awaited = if self.check(&TokenType::Run) {
            self.run_expr()?
        } else {
            self.postfix()?
        };
        Ok(Expr {
            kind: ExprKind::Wait(Box::new(awaited)),
            span,
        })
    }

    fn switch_expr(&mut self) -> Result<Expr, VineError> {
        let span = self.advance().span; // consume switch
        let test = self.expression()?;
        self.consume(TokenType::Colon, "':' after switch subject")?;

        let mut cases = Vec::new();
        while !self.check(&TokenType::End) {
            cases.push(self.switch_case()?);
        }
        self.consume(TokenType::End, "'end' to close switch")?;

        Ok(Expr {
            kind: ExprKind::Switch(Box::new(Switch { test, cases })),
            span,
        })
    }

    fn switch_case(&mut self) -> Result<Case, VineError> {
        let token = self.advance();
        let test = match token.token_type {
            TokenType::Case => Some(self.expression()?),
            TokenType::Default => None,
            _ => {
                return Err(self.fail(
                    format!("Expected 'case' or 'default', got {}", describe(&token)),
                    token.span,
                ))
            }
        };
        self.consume(TokenType::Colon, "':' after case")?;
        let body = self.block_until(&[
            TokenType::Break,
            TokenType::Case,
            TokenType::Default,
            TokenType::End,
        ])?;

        // no fallthrough: every arm ends in break unless it already returned
        let ends_in_return = body
            .body
            .iter()
            .rev()
            .find(|s| !s.kind.is_trivia())
            .is_some_and(|s| matches!(s.kind, StmtKind::Return(_)));
        if ends_in_return {
            self.match_any(&[TokenType::Break]);
        } else {
            self.consume(TokenType::Break, "'break' at end of case")?;
        }

        Ok(Case {
            test,
            body,
            span: token.span,
        })
    }
}

/// Scans and parses `source` in one go. The first scan error wins over any parse error.
pub fn parse_source(
    source: &str,
    keywords: &HashMap<String, TokenType>,
    match_mode: MatchMode,
) -> Result<Program, VineError> {
    let scanned = Scanner::new(source, keywords).scan_tokens();
    if let Some(err) = scanned.errors.first() {
        return Err(VineError::syntax(err.message.clone(), err.span));
    }
    Parser::new(scanned.tokens)
        .with_keywords(keywords)
        .with_match_mode(match_mode)
        .parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchMode;
    use crate::error::ErrorCode;
    use crate::keywords::load_keywords;
    use crate::scanner::Scanner;

    fn tokens(source: &str) -> Vec<Token> {
        let keywords = load_keywords(None).unwrap();
        let result = Scanner::new(source, &keywords).scan_tokens();
        assert!(result.errors.is_empty(), "scan errors: {:?}", result.errors);
        result.tokens
    }

    fn parse(source: &str) -> Result<Program, VineError> {
        Parser::new(tokens(source)).parse()
    }

    fn first_expr(source: &str) -> Expr {
        let program = parse(source).unwrap();
        match program.body.into_iter().next().map(|s| s.kind) {
            Some(StmtKind::Expression(e)) => e,
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn arithmetic_is_right_associative() {
        match first_expr("10 - 2 - 3").kind {
            ExprKind::Binary {
                operator: BinaryOp::Sub,
                right,
                ..
            } => assert!(matches!(
                right.kind,
                ExprKind::Binary {
                    operator: BinaryOp::Sub,
                    ..
                }
            )),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn call_binds_tighter_than_plus() {
        match first_expr("1 + f(2)").kind {
            ExprKind::Binary { right, .. } => {
                assert!(matches!(right.kind, ExprKind::Call { .. }))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn double_dot_is_range() {
        assert!(matches!(first_expr("1..3").kind, ExprKind::Range { .. }));
    }

    #[test]
    fn assignment_needs_identifier_or_member() {
        assert!(parse("a.b = 1").is_ok());
        assert!(parse("a[0] = 1").is_ok());
        let err = parse("1 = 2").unwrap_err();
        assert_eq!(err.code, ErrorCode::Syntax);
        assert!(err.message.contains("Invalid assignment target"));
    }

    #[test]
    fn object_shorthand() {
        match first_expr("{a, b: 2}").kind {
            ExprKind::Object(props) => {
                assert_eq!(props.len(), 2);
                assert!(props[0].shorthand);
                assert_eq!(props[1].key, "b");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn switch_requires_break_unless_return() {
        assert!(parse("switch x: case 1: print(1) break end").is_ok());
        assert!(parse("fn f(x): switch x: case 1: return 1 default: return 2 end end").is_ok());
        let err = parse("switch x: case 1: print(1) case 2: print(2) break end").unwrap_err();
        assert!(err.message.contains("'break'"));
    }

    #[test]
    fn run_with_continuations() {
        match first_expr("run f(1) to (x): x to (y): y end").kind {
            ExprKind::Run(run) => assert_eq!(run.continuations.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn run_requires_call() {
        assert!(parse("run f").is_err());
    }

    #[test]
    fn else_if_chain_shares_end() {
        let program = parse("if a: 1 else if b: 2 else: 3 end").unwrap();
        match &program.body[0].kind {
            StmtKind::If {
                else_branch: Some(ElseBranch::If(inner)),
                ..
            } => assert!(matches!(
                inner.kind,
                StmtKind::If {
                    else_branch: Some(ElseBranch::Block(_)),
                    ..
                }
            )),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn expose_rejects_non_declarations() {
        assert!(parse("expose let a = 1").is_ok());
        assert!(parse("expose print(1)").is_err());
    }

    #[test]
    fn use_with_namespace_and_picks() {
        let program = parse(r#"use "./lib" as L pick (a, b as c)"#).unwrap();
        match &program.body[0].kind {
            StmtKind::Use(decl) => {
                assert_eq!(decl.source, "./lib");
                assert_eq!(decl.namespace.as_ref().map(|n| n.name.as_str()), Some("L"));
                assert_eq!(decl.picks.len(), 2);
                assert_eq!(
                    decl.picks[1].alias.as_ref().map(|a| a.name.as_str()),
                    Some("c")
                );
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn trivia_become_statements() {
        let program = parse("# hi\nlet a = 1\n\nlet b = 2").unwrap();
        let kinds: Vec<_> = program.body.iter().map(|s| s.kind.is_trivia()).collect();
        assert_eq!(kinds, vec![true, false, true, false]);
    }

    #[test]
    fn strict_match_rejects_stray_tokens() {
        assert!(parse("let a 5 = 1").is_err());
    }

    #[test]
    fn scan_match_discards_stray_tokens() {
        let program = Parser::new(tokens("let a 5 = 1"))
            .with_match_mode(MatchMode::Scan { limit: 10 })
            .parse();
        assert!(program.is_ok());
    }

    #[test]
    fn scan_match_respects_limit() {
        let err = Parser::new(tokens("let a 1 2 3 4 = 1"))
            .with_match_mode(MatchMode::Scan { limit: 2 })
            .parse()
            .unwrap_err();
        assert!(err.message.contains("Expected '='"));
    }

    #[test]
    fn push_stack_continues_parsing() {
        let mut parser = Parser::new(tokens("let a = 1"));
        assert_eq!(parser.parse().unwrap().body.len(), 1);
        parser.push_stack(tokens("let b = 2\nb"));
        assert_eq!(parser.parse().unwrap().body.len(), 2);
    }

    #[test]
    fn missing_end_reports_position() {
        let err = parse("fn f():\n  1\n").unwrap_err();
        assert!(err.message.contains("'end'"));
        assert!(err.span.is_some());
    }

    #[test]
    fn parent_table_tracks_nesting() {
        let program = parse("fn f():\n  let a = 1\nend\nlet b = 2").unwrap();
        let f = &program.body[0];
        let inner = match &f.kind {
            StmtKind::Fn(decl) => &decl.body.body[0],
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(program.parents.parent(f.id), Some(program.id));
        assert_eq!(program.parents.depth(f.id), 0);
        assert_eq!(program.parents.depth(inner.id), 1);
        let block = program.parents.enclosing_block(inner.id).unwrap();
        assert_eq!(block.parent, Some(program.id));
    }
}
