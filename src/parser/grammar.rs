use super::ast::{BinaryOp, Node, NodeKind, Program};
use crate::error::{Error, Result};
use crate::lexer::{Token, TokenKind};
use crate::location::Location;

/// Recursive-descent parser for Pigeon source
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    /// Creates a new parser over a scanned token stream (terminated by `Eof`)
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if !matches!(tokens.last(), Some(Token { kind: TokenKind::Eof, .. })) {
            let location = tokens
                .last()
                .map(|t| t.location.clone())
                .unwrap_or_else(Location::builtin);
            tokens.push(Token::new(TokenKind::Eof, String::new(), location));
        }
        Parser { tokens, current: 0 }
    }

    /// Parses the tokens into a compilation unit
    pub fn parse(&mut self) -> Result<Program> {
        let mut declarations = Vec::new();

        while !self.is_at_end() {
            declarations.push(self.parse_declaration()?);
        }

        Ok(Program { declarations })
    }

    /// Parses a single expression that must span the whole token stream
    pub fn parse_standalone_expression(&mut self) -> Result<Node> {
        let expression = self.parse_expression()?;
        if !self.is_at_end() {
            return Err(self.expected_error("end of expression"));
        }
        Ok(expression)
    }

    // =========================================================================
    // Declarations
    // =========================================================================

    fn parse_declaration(&mut self) -> Result<Node> {
        let start = self.peek().location.clone();

        let return_type = if self.check(&TokenKind::Void) {
            self.advance();
            None
        } else {
            Some(self.parse_type()?)
        };

        let name = self.expect_identifier("declaration name")?;

        if self.check(&TokenKind::LeftParen) {
            return self.parse_function(start, return_type, name);
        }

        let ty = match return_type {
            Some(ty) => ty,
            None => return Err(self.expected_error("`(` after void function name")),
        };

        self.consume(TokenKind::Assign, "`=`")?;
        let value = self.parse_expression()?;
        self.consume(TokenKind::Semicolon, "`;`")?;

        Ok(Node::new(
            start,
            NodeKind::VariableDeclaration {
                ty: Box::new(ty),
                name,
                value: Box::new(value),
            },
        ))
    }

    fn parse_function(
        &mut self,
        start: Location,
        return_type: Option<Node>,
        name: String,
    ) -> Result<Node> {
        self.consume(TokenKind::LeftParen, "`(`")?;

        let mut parameters = Vec::new();
        if !self.check(&TokenKind::RightParen) {
            loop {
                let location = self.peek().location.clone();
                let ty = self.parse_type()?;
                let parameter_name = self.expect_identifier("parameter name")?;
                parameters.push(Node::new(
                    location,
                    NodeKind::Parameter {
                        ty: Box::new(ty),
                        name: parameter_name,
                    },
                ));

                if !self.check(&TokenKind::Comma) {
                    break;
                }
                self.advance();
            }
        }
        self.consume(TokenKind::RightParen, "`)`")?;

        let body = self.parse_block_statements()?;

        Ok(Node::new(
            start,
            NodeKind::FunctionDeclaration {
                return_type: return_type.map(Box::new),
                name,
                parameters,
                body,
            },
        ))
    }

    fn parse_type(&mut self) -> Result<Node> {
        let location = self.peek().location.clone();
        let name = self.expect_identifier("type name")?;
        Ok(Node::identifier(location, name))
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn parse_block_statements(&mut self) -> Result<Vec<Node>> {
        self.consume(TokenKind::LeftBrace, "`{`")?;

        let mut statements = Vec::new();
        while !self.check(&TokenKind::RightBrace) {
            if self.is_at_end() {
                return Err(self.expected_error("`}`"));
            }
            statements.push(self.parse_statement()?);
        }
        self.consume(TokenKind::RightBrace, "`}`")?;

        Ok(statements)
    }

    fn parse_statement(&mut self) -> Result<Node> {
        let location = self.peek().location.clone();

        match self.peek().kind {
            TokenKind::LeftBrace => {
                let statements = self.parse_block_statements()?;
                Ok(Node::new(location, NodeKind::Block(statements)))
            }
            TokenKind::Return => {
                self.advance();
                let value = if self.check(&TokenKind::Semicolon) {
                    None
                } else {
                    Some(Box::new(self.parse_expression()?))
                };
                self.consume(TokenKind::Semicolon, "`;`")?;
                Ok(Node::new(location, NodeKind::Return(value)))
            }
            TokenKind::If => {
                self.advance();
                let condition = self.parse_condition()?;
                let then_branch = self.parse_statement()?;
                let else_branch = if self.check(&TokenKind::Else) {
                    self.advance();
                    Some(Box::new(self.parse_statement()?))
                } else {
                    None
                };
                Ok(Node::new(
                    location,
                    NodeKind::If {
                        condition: Box::new(condition),
                        then_branch: Box::new(then_branch),
                        else_branch,
                    },
                ))
            }
            TokenKind::While => {
                self.advance();
                let condition = self.parse_condition()?;
                let body = self.parse_statement()?;
                Ok(Node::new(
                    location,
                    NodeKind::While {
                        condition: Box::new(condition),
                        body: Box::new(body),
                    },
                ))
            }
            _ => {
                let expression = self.parse_expression()?;
                let statement = if self.check(&TokenKind::Assign) {
                    self.advance();
                    let value = self.parse_expression()?;
                    Node::new(
                        location,
                        NodeKind::Assignment {
                            target: Box::new(expression),
                            value: Box::new(value),
                        },
                    )
                } else {
                    expression
                };
                self.consume(TokenKind::Semicolon, "`;`")?;
                Ok(statement)
            }
        }
    }

    fn parse_condition(&mut self) -> Result<Node> {
        self.consume(TokenKind::LeftParen, "`(`")?;
        let condition = self.parse_expression()?;
        self.consume(TokenKind::RightParen, "`)`")?;
        Ok(condition)
    }

    // =========================================================================
    // Expressions (lowest to highest precedence)
    // =========================================================================

    fn parse_expression(&mut self) -> Result<Node> {
        let mut left = self.parse_additive()?;

        while let Some(op) = self.comparison_operator() {
            self.advance();
            let right = self.parse_additive()?;
            left = Node::binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Node> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Node::binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Node> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Node::binary(op, left, right);
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Node> {
        if self.check(&TokenKind::Minus) {
            let location = self.advance().location;
            let inner = self.parse_unary()?;
            return Ok(Node::negation(location, inner));
        }

        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Node> {
        let mut expression = self.parse_primary()?;

        loop {
            match self.peek().kind {
                TokenKind::Colon => {
                    self.advance();
                    let ty = self.parse_type()?;
                    expression = Node::new(
                        expression.location.clone(),
                        NodeKind::TypeCast {
                            value: Box::new(expression),
                            ty: Box::new(ty),
                        },
                    );
                }
                TokenKind::LeftParen => {
                    self.advance();
                    let arguments = self.parse_arguments()?;
                    expression = Node::new(
                        expression.location.clone(),
                        NodeKind::Call {
                            callee: Box::new(expression),
                            arguments,
                        },
                    );
                }
                _ => break,
            }
        }

        Ok(expression)
    }

    fn parse_arguments(&mut self) -> Result<Vec<Node>> {
        let mut arguments = Vec::new();

        if !self.check(&TokenKind::RightParen) {
            loop {
                arguments.push(self.parse_expression()?);
                if !self.check(&TokenKind::Comma) {
                    break;
                }
                self.advance();
            }
        }
        self.consume(TokenKind::RightParen, "`)`")?;

        Ok(arguments)
    }

    fn parse_primary(&mut self) -> Result<Node> {
        let token = self.peek().clone();

        match token.kind {
            TokenKind::Integer(value) => {
                self.advance();
                Ok(Node::integer(token.location, value))
            }
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(Node::identifier(token.location, name))
            }
            TokenKind::LeftParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.consume(TokenKind::RightParen, "`)`")?;
                Ok(inner)
            }
            _ => Err(self.expected_error("expression")),
        }
    }

    fn comparison_operator(&self) -> Option<BinaryOp> {
        match self.peek().kind {
            TokenKind::Eq => Some(BinaryOp::Eq),
            TokenKind::NotEq => Some(BinaryOp::Ne),
            TokenKind::Lt => Some(BinaryOp::Lt),
            TokenKind::LtEq => Some(BinaryOp::Le),
            TokenKind::Gt => Some(BinaryOp::Gt),
            TokenKind::GtEq => Some(BinaryOp::Ge),
            _ => None,
        }
    }

    // =========================================================================
    // Token helpers
    // =========================================================================

    fn is_at_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !self.is_at_end() {
            self.current += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
    }

    fn consume(&mut self, kind: TokenKind, expected: &str) -> Result<Token> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            Err(self.expected_error(expected))
        }
    }

    fn expect_identifier(&mut self, expected: &str) -> Result<String> {
        match &self.peek().kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.expected_error(expected)),
        }
    }

    fn expected_error(&self, expected: &str) -> Error {
        let token = self.peek();
        Error::SyntaxError {
            location: token.location.clone(),
            message: format!("expected {}, found {}", expected, token.kind),
        }
    }
}
