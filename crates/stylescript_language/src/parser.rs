//! Parser for the stylescript JavaScript subset.
//!
//! The parser converts a stream of tokens into an abstract syntax tree.
//! Expressions use precedence climbing; statements follow the usual
//! recursive-descent shape with automatic semicolon insertion driven by
//! [`Token::newline_before`].

use stylescript_foundation::{Error, ErrorContext, Result};

use crate::ast::{
    BinaryOp, DeclKind, Declarator, Expr, FunctionNode, LogicalOp, Program, Stmt, UnaryOp,
};
use crate::lexer::Lexer;
use crate::span::Span;
use crate::token::{Token, TokenKind};

/// Maximum nesting of statements and expressions.
pub const MAX_NESTING_DEPTH: usize = 200;

/// Binary operator classes produced by the precedence table.
#[derive(Clone, Copy)]
enum Infix {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

/// Parser for stylescript source code.
pub struct Parser<'src> {
    /// The lexer providing tokens.
    lexer: Lexer<'src>,
    /// Current token (lookahead).
    current: Token,
    /// Source text (for error messages).
    source: &'src str,
    /// Current nesting depth.
    depth: usize,
    /// Number of enclosing function bodies.
    function_depth: usize,
    /// Byte offset just past the most recently consumed token.
    previous_end: usize,
}

impl<'src> Parser<'src> {
    /// Creates a new parser for the given source.
    #[must_use]
    pub fn new(source: &'src str) -> Self {
        let mut lexer = Lexer::new(source);
        let mut current = lexer.next_token();
        while current.kind.is_trivia() {
            current = lexer.next_token();
        }
        Self {
            lexer,
            current,
            source,
            depth: 0,
            function_depth: 0,
            previous_end: 0,
        }
    }

    /// Parses the whole source as a program.
    ///
    /// # Errors
    /// Returns a syntax error if the source is not a valid program.
    pub fn parse_program(&mut self) -> Result<Program> {
        let mut body = Vec::new();
        while self.current.kind != TokenKind::Eof {
            body.push(self.parse_statement()?);
        }
        Ok(Program { body })
    }

    /// Parses the whole source as exactly one function expression.
    ///
    /// A trailing semicolon and surrounding parentheses are accepted.
    ///
    /// # Errors
    /// Returns a syntax error if the source is malformed or is anything
    /// other than a single function expression.
    pub fn parse_function_source(&mut self) -> Result<FunctionNode> {
        let start = self.current.span;
        if self.current.kind == TokenKind::Eof {
            return Err(self.error_at(start, "expected a function expression, found end of input"));
        }
        let expr = self.parse_expression()?;
        if self.current.kind == TokenKind::Semicolon {
            self.advance();
        }
        if self.current.kind != TokenKind::Eof {
            return Err(self.unexpected("end of input"));
        }
        match expr {
            Expr::Function(node) => Ok(*node),
            _ => Err(self.error_at(start, "expected a function expression")),
        }
    }

    // === Statements ===

    fn parse_statement(&mut self) -> Result<Stmt> {
        self.nested(Self::parse_statement_inner)
    }

    fn parse_statement_inner(&mut self) -> Result<Stmt> {
        let span = self.current.span;
        match self.current.kind {
            TokenKind::LBrace => {
                let body = self.parse_block()?;
                Ok(Stmt::Block(body, span))
            }
            TokenKind::Var | TokenKind::Let | TokenKind::Const => {
                let stmt = self.parse_var_declaration()?;
                self.consume_semicolon()?;
                Ok(stmt)
            }
            TokenKind::Function => {
                let node = self.parse_function(true)?;
                Ok(Stmt::Function(Box::new(node)))
            }
            TokenKind::Return => {
                if self.function_depth == 0 {
                    return Err(self.error("'return' outside of function"));
                }
                self.advance();
                let value = if self.at_statement_end() {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.consume_semicolon()?;
                Ok(Stmt::Return(value, span))
            }
            TokenKind::If => {
                self.advance();
                self.expect(&TokenKind::LParen)?;
                let test = self.parse_expression()?;
                self.expect(&TokenKind::RParen)?;
                let consequent = Box::new(self.parse_statement()?);
                let alternate = if self.current.kind == TokenKind::Else {
                    self.advance();
                    Some(Box::new(self.parse_statement()?))
                } else {
                    None
                };
                Ok(Stmt::If {
                    test,
                    consequent,
                    alternate,
                    span,
                })
            }
            TokenKind::While => {
                self.advance();
                self.expect(&TokenKind::LParen)?;
                let test = self.parse_expression()?;
                self.expect(&TokenKind::RParen)?;
                let body = Box::new(self.parse_statement()?);
                Ok(Stmt::While { test, body, span })
            }
            TokenKind::Do => {
                self.advance();
                let body = Box::new(self.parse_statement()?);
                self.expect(&TokenKind::While)?;
                self.expect(&TokenKind::LParen)?;
                let test = self.parse_expression()?;
                self.expect(&TokenKind::RParen)?;
                if self.current.kind == TokenKind::Semicolon {
                    self.advance();
                }
                Ok(Stmt::DoWhile { body, test, span })
            }
            TokenKind::For => self.parse_for(span),
            TokenKind::Break => {
                self.advance();
                self.consume_semicolon()?;
                Ok(Stmt::Break(span))
            }
            TokenKind::Continue => {
                self.advance();
                self.consume_semicolon()?;
                Ok(Stmt::Continue(span))
            }
            TokenKind::Throw => {
                self.advance();
                if self.current.newline_before {
                    return Err(self.error("illegal newline after 'throw'"));
                }
                let value = self.parse_expression()?;
                self.consume_semicolon()?;
                Ok(Stmt::Throw(value, span))
            }
            TokenKind::Semicolon => {
                self.advance();
                Ok(Stmt::Empty(span))
            }
            _ => {
                let expr = self.parse_expression()?;
                self.consume_semicolon()?;
                Ok(Stmt::Expr(expr, span))
            }
        }
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>> {
        self.expect(&TokenKind::LBrace)?;
        let mut body = Vec::new();
        while self.current.kind != TokenKind::RBrace {
            if self.current.kind == TokenKind::Eof {
                return Err(self.unexpected("'}'"));
            }
            body.push(self.parse_statement()?);
        }
        self.advance();
        Ok(body)
    }

    fn parse_var_declaration(&mut self) -> Result<Stmt> {
        let span = self.current.span;
        let kind = match self.current.kind {
            TokenKind::Let => DeclKind::Let,
            TokenKind::Const => DeclKind::Const,
            _ => DeclKind::Var,
        };
        self.advance();

        let mut decls = Vec::new();
        loop {
            let name_span = self.current.span;
            let name = self.expect_identifier()?;
            let init = if self.current.kind == TokenKind::Assign {
                self.advance();
                Some(self.parse_assignment()?)
            } else {
                None
            };
            if kind == DeclKind::Const && init.is_none() {
                return Err(self.error_at(name_span, "missing initializer in const declaration"));
            }
            decls.push(Declarator {
                name,
                init,
                span: name_span,
            });
            if self.current.kind != TokenKind::Comma {
                break;
            }
            self.advance();
        }
        Ok(Stmt::Var(kind, decls, span))
    }

    fn parse_for(&mut self, span: Span) -> Result<Stmt> {
        self.advance();
        self.expect(&TokenKind::LParen)?;

        let init = match self.current.kind {
            TokenKind::Semicolon => None,
            TokenKind::Var | TokenKind::Let | TokenKind::Const => {
                Some(Box::new(self.parse_var_declaration()?))
            }
            _ => {
                let init_span = self.current.span;
                let expr = self.parse_expression()?;
                Some(Box::new(Stmt::Expr(expr, init_span)))
            }
        };
        self.expect(&TokenKind::Semicolon)?;

        let test = if self.current.kind == TokenKind::Semicolon {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&TokenKind::Semicolon)?;

        let update = if self.current.kind == TokenKind::RParen {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(&TokenKind::RParen)?;

        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::For {
            init,
            test,
            update,
            body,
            span,
        })
    }

    /// Parses `function name?(params) { body }`.
    fn parse_function(&mut self, require_name: bool) -> Result<FunctionNode> {
        let start = self.current.span;
        self.expect(&TokenKind::Function)?;

        let name = if let TokenKind::Identifier(name) = &self.current.kind {
            let name = name.clone();
            self.advance();
            Some(name)
        } else {
            None
        };
        if require_name && name.is_none() {
            return Err(self.error("function statement requires a name"));
        }

        self.expect(&TokenKind::LParen)?;
        let mut params = Vec::new();
        while self.current.kind != TokenKind::RParen {
            let param_span = self.current.span;
            let param = self.expect_identifier()?;
            if params.contains(&param) {
                return Err(self.error_at(param_span, &format!("duplicate parameter '{param}'")));
            }
            params.push(param);
            if self.current.kind != TokenKind::Comma {
                break;
            }
            self.advance();
        }
        self.expect(&TokenKind::RParen)?;

        self.function_depth += 1;
        let body = self.parse_block();
        self.function_depth -= 1;
        let body = body?;

        Ok(FunctionNode {
            name,
            params,
            body,
            span: Span::new(start.start, self.previous_end, start.line, start.column),
        })
    }

    // === Expressions ===

    /// Parses a comma-separated expression sequence.
    fn parse_expression(&mut self) -> Result<Expr> {
        let span = self.current.span;
        let first = self.parse_assignment()?;
        if self.current.kind != TokenKind::Comma {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.current.kind == TokenKind::Comma {
            self.advance();
            items.push(self.parse_assignment()?);
        }
        Ok(Expr::Sequence(items, span))
    }

    fn parse_assignment(&mut self) -> Result<Expr> {
        self.nested(Self::parse_assignment_inner)
    }

    fn parse_assignment_inner(&mut self) -> Result<Expr> {
        let span = self.current.span;
        let target = self.parse_conditional()?;

        let op = match self.current.kind {
            TokenKind::Assign => None,
            TokenKind::PlusAssign => Some(BinaryOp::Add),
            TokenKind::MinusAssign => Some(BinaryOp::Sub),
            TokenKind::StarAssign => Some(BinaryOp::Mul),
            TokenKind::SlashAssign => Some(BinaryOp::Div),
            TokenKind::PercentAssign => Some(BinaryOp::Mod),
            _ => return Ok(target),
        };
        if !target.is_assignable() {
            return Err(self.error_at(target.span(), "invalid assignment target"));
        }
        self.advance();
        let value = self.parse_assignment()?;
        Ok(Expr::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
            span,
        })
    }

    fn parse_conditional(&mut self) -> Result<Expr> {
        let span = self.current.span;
        let test = self.parse_binary(0)?;
        if self.current.kind != TokenKind::Question {
            return Ok(test);
        }
        self.advance();
        let consequent = self.parse_assignment()?;
        self.expect(&TokenKind::Colon)?;
        let alternate = self.parse_assignment()?;
        Ok(Expr::Conditional(
            Box::new(test),
            Box::new(consequent),
            Box::new(alternate),
            span,
        ))
    }

    fn parse_binary(&mut self, min_precedence: u8) -> Result<Expr> {
        let span = self.current.span;
        let mut left = self.parse_unary()?;

        while let Some((precedence, infix)) = infix_operator(&self.current.kind) {
            if precedence <= min_precedence {
                break;
            }
            self.advance();
            let right = self.parse_binary(precedence)?;
            left = match infix {
                Infix::Binary(op) => Expr::Binary(op, Box::new(left), Box::new(right), span),
                Infix::Logical(op) => Expr::Logical(op, Box::new(left), Box::new(right), span),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        self.nested(Self::parse_unary_inner)
    }

    fn parse_unary_inner(&mut self) -> Result<Expr> {
        let span = self.current.span;
        let op = match self.current.kind {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Plus,
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Tilde => UnaryOp::BitNot,
            TokenKind::Typeof => UnaryOp::Typeof,
            TokenKind::Void => UnaryOp::Void,
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                let increment = self.current.kind == TokenKind::PlusPlus;
                self.advance();
                let target = self.parse_unary()?;
                if !target.is_assignable() {
                    return Err(self.error_at(target.span(), "invalid update target"));
                }
                return Ok(Expr::Update {
                    increment,
                    prefix: true,
                    target: Box::new(target),
                    span,
                });
            }
            _ => return self.parse_postfix(),
        };
        self.advance();
        let operand = self.parse_unary()?;
        Ok(Expr::Unary(op, Box::new(operand), span))
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let span = self.current.span;
        let expr = self.parse_call_member()?;
        let increment = match self.current.kind {
            TokenKind::PlusPlus if !self.current.newline_before => true,
            TokenKind::MinusMinus if !self.current.newline_before => false,
            _ => return Ok(expr),
        };
        if !expr.is_assignable() {
            return Err(self.error_at(expr.span(), "invalid update target"));
        }
        self.advance();
        Ok(Expr::Update {
            increment,
            prefix: false,
            target: Box::new(expr),
            span,
        })
    }

    fn parse_call_member(&mut self) -> Result<Expr> {
        let span = self.current.span;
        let mut expr = self.parse_primary()?;
        loop {
            match self.current.kind {
                TokenKind::Dot => {
                    self.advance();
                    let Some(name) = self.current.kind.identifier_name() else {
                        return Err(self.unexpected("property name"));
                    };
                    self.advance();
                    expr = Expr::Member(Box::new(expr), name, span);
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect(&TokenKind::RBracket)?;
                    expr = Expr::Index(Box::new(expr), Box::new(index), span);
                }
                TokenKind::LParen => {
                    self.advance();
                    let mut args = Vec::new();
                    while self.current.kind != TokenKind::RParen {
                        args.push(self.parse_assignment()?);
                        if self.current.kind != TokenKind::Comma {
                            break;
                        }
                        self.advance();
                    }
                    self.expect(&TokenKind::RParen)?;
                    if args.len() > usize::from(u8::MAX) {
                        return Err(self.error_at(span, "too many call arguments"));
                    }
                    expr = Expr::Call(Box::new(expr), args, span);
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let span = self.current.span;
        let expr = match &self.current.kind {
            TokenKind::Number(n) => Expr::Number(*n, span),
            TokenKind::String(s) => Expr::String(s.clone(), span),
            TokenKind::True => Expr::Bool(true, span),
            TokenKind::False => Expr::Bool(false, span),
            TokenKind::Null => Expr::Null(span),
            TokenKind::This => Expr::This(span),
            TokenKind::Identifier(name) => Expr::Ident(name.clone(), span),
            TokenKind::Function => {
                let node = self.parse_function(false)?;
                return Ok(Expr::Function(Box::new(node)));
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(&TokenKind::RParen)?;
                return Ok(inner);
            }
            TokenKind::LBracket => return self.parse_array_literal(),
            TokenKind::LBrace => return self.parse_object_literal(),
            TokenKind::Error(message) => return Err(self.error(message)),
            _ => return Err(self.unexpected("expression")),
        };
        self.advance();
        Ok(expr)
    }

    fn parse_array_literal(&mut self) -> Result<Expr> {
        let span = self.current.span;
        self.expect(&TokenKind::LBracket)?;
        let mut elements = Vec::new();
        while self.current.kind != TokenKind::RBracket {
            elements.push(self.parse_assignment()?);
            if self.current.kind != TokenKind::Comma {
                break;
            }
            self.advance();
        }
        self.expect(&TokenKind::RBracket)?;
        if elements.len() > usize::from(u16::MAX) {
            return Err(self.error_at(span, "array literal too large"));
        }
        Ok(Expr::Array(elements, span))
    }

    fn parse_object_literal(&mut self) -> Result<Expr> {
        let span = self.current.span;
        self.expect(&TokenKind::LBrace)?;
        let mut entries = Vec::new();
        while self.current.kind != TokenKind::RBrace {
            let key = match &self.current.kind {
                TokenKind::String(s) => s.clone(),
                TokenKind::Number(n) => crate::value::number_to_string(*n),
                kind => match kind.identifier_name() {
                    Some(name) => name,
                    None => return Err(self.unexpected("property name")),
                },
            };
            self.advance();
            self.expect(&TokenKind::Colon)?;
            let value = self.parse_assignment()?;
            entries.push((key, value));
            if self.current.kind != TokenKind::Comma {
                break;
            }
            self.advance();
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(Expr::Object(entries, span))
    }

    // === Helpers ===

    /// Runs `parse` one nesting level deeper, failing past the depth limit.
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    /// True if a `return` argument cannot start here.
    fn at_statement_end(&self) -> bool {
        matches!(
            self.current.kind,
            TokenKind::Semicolon | TokenKind::RBrace | TokenKind::Eof
        ) || self.current.newline_before
    }

    /// Consumes a `;`, or accepts an inserted one before `}`, end of input
    /// or a line break.
    fn consume_semicolon(&mut self) -> Result<()> {
        match self.current.kind {
            TokenKind::Semicolon => {
                self.advance();
                Ok(())
            }
            TokenKind::RBrace | TokenKind::Eof => Ok(()),
            _ if self.current.newline_before => Ok(()),
            _ => Err(self.unexpected("';'")),
        }
    }

    /// Advances to the next non-comment token.
    fn advance(&mut self) {
        self.previous_end = self.current.span.end;
        self.current = self.lexer.next_token();
        while self.current.kind.is_trivia() {
            self.current = self.lexer.next_token();
        }
    }

    /// Expects the current token to be of a specific kind, then advances.
    fn expect(&mut self, expected: &TokenKind) -> Result<()> {
        if std::mem::discriminant(&self.current.kind) == std::mem::discriminant(expected) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(&expected.describe()))
        }
    }

    fn expect_identifier(&mut self) -> Result<String> {
        if let TokenKind::Identifier(name) = &self.current.kind {
            let name = name.clone();
            self.advance();
            Ok(name)
        } else {
            Err(self.unexpected("identifier"))
        }
    }

    fn unexpected(&self, expected: &str) -> Error {
        if let TokenKind::Error(message) = &self.current.kind {
            return self.error(message);
        }
        self.error(&format!(
            "expected {expected}, found {}",
            self.current.kind.describe()
        ))
    }

    /// Creates a syntax error at the current position.
    fn error(&self, message: &str) -> Error {
        self.error_at(self.current.span, message)
    }

    /// Creates a syntax error at a specific span.
    fn error_at(&self, span: Span, message: &str) -> Error {
        Error::syntax(message, span.line, span.column).with_context(
            ErrorContext::new()
                .with_source(self.context_at(span))
                .with_position(span.line, span.column),
        )
    }

    /// Gets the source line containing a span.
    fn context_at(&self, span: Span) -> String {
        let start = span.start.min(self.source.len());
        let line_start = self.source[..start].rfind('\n').map_or(0, |i| i + 1);
        let line_end = self.source[start..]
            .find('\n')
            .map_or(self.source.len(), |i| start + i);
        self.source[line_start..line_end].to_string()
    }
}

/// Returns the binding power and operator for an infix token.
fn infix_operator(kind: &TokenKind) -> Option<(u8, Infix)> {
    use BinaryOp as B;
    let entry = match kind {
        TokenKind::PipePipe => (1, Infix::Logical(LogicalOp::Or)),
        TokenKind::AmpAmp => (2, Infix::Logical(LogicalOp::And)),
        TokenKind::Pipe => (3, Infix::Binary(B::BitOr)),
        TokenKind::Caret => (4, Infix::Binary(B::BitXor)),
        TokenKind::Amp => (5, Infix::Binary(B::BitAnd)),
        TokenKind::EqEq => (6, Infix::Binary(B::Eq)),
        TokenKind::BangEq => (6, Infix::Binary(B::Ne)),
        TokenKind::EqEqEq => (6, Infix::Binary(B::StrictEq)),
        TokenKind::BangEqEq => (6, Infix::Binary(B::StrictNe)),
        TokenKind::Lt => (7, Infix::Binary(B::Lt)),
        TokenKind::Le => (7, Infix::Binary(B::Le)),
        TokenKind::Gt => (7, Infix::Binary(B::Gt)),
        TokenKind::Ge => (7, Infix::Binary(B::Ge)),
        TokenKind::In => (7, Infix::Binary(B::In)),
        TokenKind::Shl => (8, Infix::Binary(B::Shl)),
        TokenKind::Shr => (8, Infix::Binary(B::Shr)),
        TokenKind::UShr => (8, Infix::Binary(B::UShr)),
        TokenKind::Plus => (9, Infix::Binary(B::Add)),
        TokenKind::Minus => (9, Infix::Binary(B::Sub)),
        TokenKind::Star => (10, Infix::Binary(B::Mul)),
        TokenKind::Slash => (10, Infix::Binary(B::Div)),
        TokenKind::Percent => (10, Infix::Binary(B::Mod)),
        _ => return None,
    };
    Some(entry)
}

/// Parses source code into a program.
///
/// # Errors
/// Returns an error if the source cannot be parsed.
pub fn parse_program(source: &str) -> Result<Program> {
    Parser::new(source).parse_program()
}

/// Parses source code that must consist of a single function expression.
///
/// # Errors
/// Returns an error if the source cannot be parsed or is not a function.
pub fn parse_function(source: &str) -> Result<FunctionNode> {
    Parser::new(source).parse_function_source()
}
