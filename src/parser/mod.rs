//! Pigeon Parser Module
//!
//! Parses the token stream into an abstract syntax tree with standard
//! precedence climbing: comparisons < additive < multiplicative < unary minus
//! < postfix casts and calls.

mod ast;
mod grammar;

pub use ast::{BinaryOp, Node, NodeKind, Program};
pub use grammar::Parser;

use crate::error::Result;
use crate::lexer::Scanner;

/// Scans and parses a whole compilation unit
pub fn parse_program(file: &str, source: &str) -> Result<Program> {
    let tokens = Scanner::new(file, source).scan_tokens()?;
    Parser::new(tokens).parse()
}

/// Scans and parses a single expression
pub fn parse_expression(file: &str, source: &str) -> Result<Node> {
    let tokens = Scanner::new(file, source).scan_tokens()?;
    Parser::new(tokens).parse_standalone_expression()
}
