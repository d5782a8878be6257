//! # Pigeon - a small typed language compiled to 32-bit FASM
//!
//! Pigeon is an ahead-of-time compiler for a statically typed imperative
//! language with fixed-width integers. It produces a flat assembler document
//! for a 32-bit machine, using only four general-purpose registers.
//!
//! ## Features
//!
//! - **Integer types** - `i8 i16 i32 u8 u16 u32` with checked implicit casts
//! - **Explicit casts** - `value : Type` truncates and wraps
//! - **Functions** - cdecl-style calls, return values in `eax`
//! - **Control flow** - `if`/`else`, `while`, early `return`
//! - **Constant folding** - additive chains are normalized before code generation
//! - **No spilling** - running out of registers is a compile error, never a silent spill
//!
//! ## Quick Start
//!
//! ```rust
//! use pigeon::{compile, CompileOptions};
//!
//! # fn main() -> pigeon::Result<()> {
//! let source = r#"
//!     i32 offset = 10;
//!
//!     i32 add(i32 a, i32 b) {
//!         return a + b;
//!     }
//!
//!     i32 main() {
//!         return add(input, offset);
//!     }
//! "#;
//!
//! let result = compile(source, CompileOptions::default())?;
//! assert!(result.assembly.contains("format PE console"));
//! assert!(result.function_listing("add").is_some());
//! # Ok(())
//! # }
//! ```
//!
//! ## Language
//!
//! ```text
//! u8 counter = 0;                  // globals need constant initializers
//!
//! void tick() {                    // `void` functions return nothing
//!     counter = counter + 1;
//! }
//!
//! i32 main() {
//!     while (counter < 10) tick();
//!     if (input > 100) return 1;
//!     return (input - 1):i32;     // explicit cast
//! }
//! ```
//!
//! The entry function is wrapped by a harness that reads one integer into
//! `input` with `scanf`, calls the entry function and prints its result.
//!
//! ## Error Handling
//!
//! Every failure is an [`Error`] carrying the source location:
//!
//! ```rust
//! use pigeon::{compile, CompileOptions, Error};
//!
//! let err = compile("u8 b = 300; i32 main() { return 0; }", CompileOptions::default())
//!     .unwrap_err();
//! assert!(matches!(err, Error::InvalidTypeCast { .. }));
//! assert!(err.to_string().contains("maximum value 255"));
//! ```

/// Version of the Pigeon compiler
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod compiler;
pub mod error;
pub mod lexer;
pub mod location;
pub mod parser;

// Re-export main types
pub use compiler::{CompileOptions, CompileResult, Compiler};
pub use error::{Error, ErrorSeverity, Result};
pub use lexer::{Scanner, Token, TokenKind};
pub use location::Location;
pub use parser::{BinaryOp, Node, NodeKind, Parser, Program};

/// Compiles `source` with a fresh [`Compiler`]
pub fn compile(source: &str, options: CompileOptions) -> Result<CompileResult> {
    Compiler::new(options).compile(source)
}
