//! # Assembly Emitter
//!
//! Collects instruction, label and data records and links them into a single
//! FASM document:
//!
//! ```text
//! ; header
//! section '.text'   functions in registration order, then the runtime harness
//! section '.data'   one line per global, then the harness format strings
//! section '.idata'  msvcrt imports used by the harness
//! ```
//!
//! Function bodies are emitted into a staging buffer first, because the
//! prologue depends on which registers the body ended up using.

use super::types::TypeInfo;
use serde::Serialize;
use std::fmt;
use std::fmt::Write as _;

/// Label of the scanf format string
const SCAN_FORMAT: &str = "scan_format";
/// Label of the printf format string
const PRINT_FORMAT: &str = "print_format";

/// One line of the code region
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AsmLine {
    /// `name:`
    Label(String),
    /// `opcode operand, operand`
    Instruction {
        /// Mnemonic
        opcode: String,
        /// Rendered operands
        operands: Vec<String>,
    },
}

impl AsmLine {
    /// Whether this line is an instruction with the given mnemonic
    pub fn is_opcode(&self, mnemonic: &str) -> bool {
        matches!(self, AsmLine::Instruction { opcode, .. } if opcode == mnemonic)
    }
}

impl fmt::Display for AsmLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AsmLine::Label(name) => write!(f, "{}:", name),
            AsmLine::Instruction { opcode, operands } if operands.is_empty() => {
                write!(f, "    {}", opcode)
            }
            AsmLine::Instruction { opcode, operands } => {
                write!(f, "    {} {}", opcode, operands.join(", "))
            }
        }
    }
}

/// One line of the data region: `symbol db|dw|dd value`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataDeclaration {
    /// Assembly symbol
    pub symbol: String,
    /// Declaration directive
    pub declaration: &'static str,
    /// Initial value as written
    pub value: String,
}

impl fmt::Display for DataDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.symbol, self.declaration, self.value)
    }
}

/// Entry wiring for the generated executable
#[derive(Debug, Clone)]
pub struct Harness {
    /// Symbol of the entry function
    pub entry_symbol: String,
    /// Return type of the entry function
    pub result_type: &'static TypeInfo,
    /// Symbol of the global the input integer is read into
    pub input_symbol: Option<String>,
}

/// Ordered sink of code and data records
#[derive(Debug, Default)]
pub struct AssemblyEmitter {
    code: Vec<AsmLine>,
    data: Vec<DataDeclaration>,
    staging: Vec<AsmLine>,
}

impl AssemblyEmitter {
    /// Creates an empty emitter
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an instruction to the staging buffer
    pub fn emit<S: Into<String>>(&mut self, opcode: &str, operands: impl IntoIterator<Item = S>) {
        self.staging.push(AsmLine::Instruction {
            opcode: opcode.to_string(),
            operands: operands.into_iter().map(Into::into).collect(),
        });
    }

    /// Appends a label to the staging buffer
    pub fn label(&mut self, name: impl Into<String>) {
        self.staging.push(AsmLine::Label(name.into()));
    }

    /// Drains the staging buffer
    pub fn take_staging(&mut self) -> Vec<AsmLine> {
        std::mem::take(&mut self.staging)
    }

    /// Appends finished lines to the code region
    pub fn append_code(&mut self, lines: impl IntoIterator<Item = AsmLine>) {
        self.code.extend(lines);
    }

    /// Declares a global in the data region
    pub fn declare(&mut self, symbol: impl Into<String>, declaration: &'static str, value: i64) {
        self.data.push(DataDeclaration {
            symbol: symbol.into(),
            declaration,
            value: value.to_string(),
        });
    }

    /// Code region emitted so far
    pub fn code(&self) -> &[AsmLine] {
        &self.code
    }

    /// Data region emitted so far
    pub fn data(&self) -> &[DataDeclaration] {
        &self.data
    }

    /// Renders the whole document
    pub fn link(&self, harness: Option<&Harness>) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "; Generated by pigeon {}", crate::VERSION);
        if harness.is_some() {
            let _ = writeln!(out, "format PE console");
            let _ = writeln!(out, "entry start");
            let _ = writeln!(out, "include 'win32a.inc'");
        }
        let _ = writeln!(out);

        let _ = writeln!(out, "section '.text' code readable executable");
        for line in &self.code {
            let _ = writeln!(out, "{}", line);
        }
        if let Some(harness) = harness {
            for line in harness_code(harness) {
                let _ = writeln!(out, "{}", line);
            }
        }
        let _ = writeln!(out);

        let _ = writeln!(out, "section '.data' data readable writeable");
        for declaration in &self.data {
            let _ = writeln!(out, "{}", declaration);
        }
        if harness.is_some() {
            let _ = writeln!(out, "{} db '%d', 0", SCAN_FORMAT);
            let _ = writeln!(out, "{} db '%d', 10, 0", PRINT_FORMAT);
            let _ = writeln!(out);
            let _ = writeln!(out, "section '.idata' import data readable");
            let _ = writeln!(out, "library msvcrt, 'msvcrt.dll'");
            let _ = writeln!(
                out,
                "import msvcrt, scanf, 'scanf', printf, 'printf', exit, 'exit'"
            );
        }

        out
    }
}

/// `start:` reads the input, calls the entry function and prints its result
fn harness_code(harness: &Harness) -> Vec<AsmLine> {
    let mut emitter = AssemblyEmitter::new();
    emitter.label("start");

    if let Some(input) = &harness.input_symbol {
        emitter.emit("push", [input.as_str()]);
        emitter.emit("push", [SCAN_FORMAT]);
        emitter.emit("call", ["[scanf]"]);
        emitter.emit("add", ["esp", "8"]);
    }

    emitter.emit("call", [harness.entry_symbol.as_str()]);

    let result = harness.result_type;
    if result.size < 4 {
        let extend = if result.signed { "movsx" } else { "movzx" };
        let narrow = if result.size == 1 { "al" } else { "ax" };
        emitter.emit(extend, ["eax", narrow]);
    }

    emitter.emit("push", ["eax"]);
    emitter.emit("push", [PRINT_FORMAT]);
    emitter.emit("call", ["[printf]"]);
    emitter.emit("add", ["esp", "8"]);
    emitter.emit("push", ["0"]);
    emitter.emit("call", ["[exit]"]);

    emitter.take_staging()
}
