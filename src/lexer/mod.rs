//! Lexical analysis for Pigeon
//!
//! Converts source text into a flat stream of location-tagged tokens.

mod scanner;
mod token;

pub use scanner::Scanner;
pub use token::{Token, TokenKind};
