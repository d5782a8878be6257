//! Debug utilities for Pigeon compilation
//!
//! Tools for inspecting tokens, syntax trees and generated code.

use super::assembly::AsmLine;
use crate::error::{Error, Result};
use crate::lexer::Token;
use crate::location::Location;
use crate::parser::Program;

/// Renders a syntax tree as pretty JSON
pub fn dump_ast(program: &Program) -> Result<String> {
    serde_json::to_string_pretty(program).map_err(serialization_error)
}

/// Renders a token stream as pretty JSON
pub fn dump_tokens(tokens: &[Token]) -> Result<String> {
    serde_json::to_string_pretty(tokens).map_err(serialization_error)
}

/// Renders a function listing with instruction indices
///
/// ```text
///       _f:
/// 0000      push ebp
/// ```
pub fn dump_listing(lines: &[AsmLine]) -> String {
    let mut index = 0;
    let mut out = String::new();

    for line in lines {
        match line {
            AsmLine::Label(_) => out.push_str(&format!("    {}\n", line)),
            AsmLine::Instruction { .. } => {
                out.push_str(&format!("{:04}{}\n", index, line));
                index += 1;
            }
        }
    }

    out
}

fn serialization_error(error: serde_json::Error) -> Error {
    Error::internal(&Location::builtin(), format!("serialization failed: {}", error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Scanner;
    use crate::parser::parse_program;

    #[test]
    fn test_dump_ast() {
        let program = parse_program("test", "i32 x = 5;").unwrap();
        let json = dump_ast(&program).unwrap();
        assert!(json.contains("VariableDeclaration"));
        assert!(json.contains("\"x\""));

        let parsed: Program = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, program);
    }

    #[test]
    fn test_dump_tokens() {
        let tokens = Scanner::new("test", "x + 1").scan_tokens().unwrap();
        let json = dump_tokens(&tokens).unwrap();
        assert!(json.contains("Plus"));
        assert!(json.contains("\"line\": 1"));
    }

    #[test]
    fn test_dump_listing_numbers_instructions() {
        let lines = vec![
            AsmLine::Label("_f".to_string()),
            AsmLine::Instruction {
                opcode: "push".to_string(),
                operands: vec!["ebp".to_string()],
            },
            AsmLine::Instruction {
                opcode: "ret".to_string(),
                operands: vec![],
            },
        ];
        assert_eq!(
            dump_listing(&lines),
            "    _f:\n0000    push ebp\n0001    ret\n"
        );
    }
}
