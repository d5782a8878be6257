//! # Pigeon Compiler - typed imperative source to 32-bit FASM
//!
//! This module owns the symbol tables and drives code generation.
//!
//! ## Architecture
//!
//! ```text
//! Source → Tokens → AST → Registration → Optimize → Codegen → FASM text
//! ```
//!
//! Registration records every global and function up front, so declarations
//! may be referenced before they appear. Code generation then compiles each
//! function in declaration order through one [`CodegenContext`].
//!
//! ## Usage
//!
//! ```
//! use pigeon::compiler::{Compiler, CompileOptions};
//!
//! let source = "i32 main() { return input + 1; }";
//! let mut compiler = Compiler::new(CompileOptions::default());
//! let result = compiler.compile(source)?;
//! assert!(result.assembly.contains("call _main"));
//! # Ok::<(), pigeon::Error>(())
//! ```

pub mod assembly;
pub mod codegen;
pub mod debug;
pub mod optimizer;
pub mod registers;
pub mod types;
pub mod value;

pub use assembly::{AsmLine, AssemblyEmitter, DataDeclaration, Harness};
pub use codegen::CodegenContext;
pub use debug::{dump_ast, dump_listing, dump_tokens};
pub use optimizer::optimize;
pub use registers::{AllocationId, RegisterAllocator};
pub use types::{CastKind, FunctionType, Type, TypeInfo};
pub use value::{Address, Value};

use crate::error::{Error, Result};
use crate::lexer::Scanner;
use crate::location::Location;
use crate::parser::{Node, NodeKind, Parser, Program};
use std::collections::HashMap;
use std::rc::Rc;

/// Compilation options
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Source name used in every diagnostic location
    pub file_name: String,
    /// Function called by the runtime harness; `None` emits no harness
    pub entry_point: Option<String>,
    /// Reserved `i32` global the harness reads its input into
    pub input_variable: Option<String>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            file_name: "<source>".to_string(),
            entry_point: Some("main".to_string()),
            input_variable: Some("input".to_string()),
        }
    }
}

/// A registered global variable
#[derive(Debug, Clone)]
pub struct VariableInfo {
    /// Declaration site
    pub location: Location,
    /// Source name
    pub name: String,
    /// Assembly symbol
    pub symbol: String,
    /// Declared type
    pub ty: &'static TypeInfo,
    /// Initializer, as written
    pub initializer: Node,
    /// Initial value, range-checked against `ty`
    pub value: i64,
}

/// A function parameter
#[derive(Debug, Clone)]
pub struct ParameterInfo {
    /// Declaration site
    pub location: Location,
    /// Source name
    pub name: String,
    /// Declared type
    pub ty: &'static TypeInfo,
}

/// A registered function
#[derive(Debug, Clone)]
pub struct FunctionInfo {
    /// Declaration site
    pub location: Location,
    /// Source name
    pub name: String,
    /// Assembly symbol
    pub symbol: String,
    /// Return and parameter types
    pub signature: Rc<FunctionType>,
    /// Parameters in declaration order
    pub parameters: Vec<ParameterInfo>,
    /// Body statements
    pub body: Vec<Node>,
}

impl FunctionInfo {
    /// Declared return type, `None` for `void`
    pub fn return_type(&self) -> Option<&'static TypeInfo> {
        self.signature.return_type
    }
}

/// A name in the global namespace
#[derive(Debug, Clone, Copy)]
pub enum Declaration<'a> {
    /// Global variable
    Variable(&'a VariableInfo),
    /// Function
    Function(&'a FunctionInfo),
}

#[derive(Debug, Clone, Copy)]
enum DeclarationIndex {
    Variable(usize),
    Function(usize),
}

/// One compiled function
#[derive(Debug, Clone)]
pub struct CompiledFunction {
    /// Source name
    pub name: String,
    /// Assembly symbol
    pub symbol: String,
    /// Prologue, body and epilogue
    pub lines: Vec<AsmLine>,
}

/// Compilation result with metadata
#[derive(Debug, Clone)]
pub struct CompileResult {
    /// The complete FASM document
    pub assembly: String,
    /// Compiled functions in declaration order
    pub code: Vec<CompiledFunction>,
    /// Data region
    pub data: Vec<DataDeclaration>,
    /// Number of instructions across all functions (harness excluded)
    pub instruction_count: usize,
}

impl CompileResult {
    /// Lines of the function named `name`
    pub fn function_listing(&self, name: &str) -> Option<&[AsmLine]> {
        self.code
            .iter()
            .find(|function| function.name == name)
            .map(|function| function.lines.as_slice())
    }
}

/// Pigeon to FASM compiler
///
/// A compiler is single use: after an error its tables may be partially
/// populated, and it must be discarded.
pub struct Compiler {
    options: CompileOptions,
    variables: Vec<VariableInfo>,
    functions: Vec<FunctionInfo>,
    declarations: HashMap<String, DeclarationIndex>,
}

impl Compiler {
    /// Create a new compiler with options
    pub fn new(options: CompileOptions) -> Self {
        Self {
            options,
            variables: Vec::new(),
            functions: Vec::new(),
            declarations: HashMap::new(),
        }
    }

    /// Compile Pigeon source code to a FASM document
    pub fn compile(&mut self, source: &str) -> Result<CompileResult> {
        self.register_source(source)?;
        self.compile_all()
    }

    /// Parses `source` and registers its declarations
    pub fn register_source(&mut self, source: &str) -> Result<()> {
        let mut scanner = Scanner::new(self.options.file_name.as_str(), source);
        let tokens = scanner.scan_tokens()?;
        let program = Parser::new(tokens).parse()?;
        self.register_program(&program)
    }

    /// Registers every top-level declaration of `program`
    pub fn register_program(&mut self, program: &Program) -> Result<()> {
        if self.declarations.is_empty() {
            if let Some(input) = self.options.input_variable.clone() {
                let location = Location::builtin();
                let initializer = Node::integer(location.clone(), 0);
                self.add_variable(VariableInfo {
                    symbol: format!("_{}", input),
                    name: input,
                    location,
                    ty: &types::I32,
                    initializer,
                    value: 0,
                })?;
            }
        }

        for declaration in &program.declarations {
            self.register_declaration(declaration)?;
        }
        Ok(())
    }

    /// Registers one top-level declaration
    pub fn register_declaration(&mut self, node: &Node) -> Result<()> {
        match &node.kind {
            NodeKind::VariableDeclaration { ty, name, value } => {
                self.register_variable(node, ty, name, value)
            }
            NodeKind::FunctionDeclaration {
                return_type,
                name,
                parameters,
                body,
            } => self.register_function(node, return_type.as_deref(), name, parameters, body),
            _ => Err(Error::unexpected_node(&node.location, "a declaration")),
        }
    }

    fn register_variable(&mut self, node: &Node, ty: &Node, name: &str, value: &Node) -> Result<()> {
        let ty = resolve_type(ty)?;
        let initializer = optimizer::optimize(value);
        let value = constant_value(&initializer, &types::Type::from(ty))?;

        tracing::debug!("registered variable {}: {} = {}", name, ty, value);
        self.add_variable(VariableInfo {
            location: node.location.clone(),
            name: name.to_string(),
            symbol: format!("_{}", name),
            ty,
            initializer,
            value,
        })
    }

    fn register_function(
        &mut self,
        node: &Node,
        return_type: Option<&Node>,
        name: &str,
        parameters: &[Node],
        body: &[Node],
    ) -> Result<()> {
        let return_type = return_type.map(resolve_type).transpose()?;

        let mut infos: Vec<ParameterInfo> = Vec::with_capacity(parameters.len());
        for parameter in parameters {
            let (ty, parameter_name) = match &parameter.kind {
                NodeKind::Parameter { ty, name } => (resolve_type(ty)?, name),
                _ => return Err(Error::unexpected_node(&parameter.location, "a parameter")),
            };
            if let Some(previous) = infos.iter().find(|info| &info.name == parameter_name) {
                return Err(Error::IdentifierAlreadyDeclared {
                    location: parameter.location.clone(),
                    name: parameter_name.clone(),
                    previous: previous.location.clone(),
                });
            }
            infos.push(ParameterInfo {
                location: parameter.location.clone(),
                name: parameter_name.clone(),
                ty,
            });
        }

        let signature = Rc::new(FunctionType {
            return_type,
            parameters: infos.iter().map(|info| info.ty).collect(),
        });
        tracing::debug!("registered function {}: {}", name, signature);

        let index = self.functions.len();
        self.claim_name(name, &node.location, DeclarationIndex::Function(index))?;
        self.functions.push(FunctionInfo {
            location: node.location.clone(),
            name: name.to_string(),
            symbol: format!("_{}", name),
            signature,
            parameters: infos,
            body: body.to_vec(),
        });
        Ok(())
    }

    fn add_variable(&mut self, variable: VariableInfo) -> Result<()> {
        let index = self.variables.len();
        self.claim_name(&variable.name, &variable.location, DeclarationIndex::Variable(index))?;
        self.variables.push(variable);
        Ok(())
    }

    fn claim_name(&mut self, name: &str, location: &Location, index: DeclarationIndex) -> Result<()> {
        if let Some(previous) = self.declaration(name) {
            let previous = match previous {
                Declaration::Variable(variable) => variable.location.clone(),
                Declaration::Function(function) => function.location.clone(),
            };
            return Err(Error::IdentifierAlreadyDeclared {
                location: location.clone(),
                name: name.to_string(),
                previous,
            });
        }
        self.declarations.insert(name.to_string(), index);
        Ok(())
    }

    /// Looks up a global name
    pub fn declaration(&self, name: &str) -> Option<Declaration<'_>> {
        match self.declarations.get(name)? {
            DeclarationIndex::Variable(index) => self.variables.get(*index).map(Declaration::Variable),
            DeclarationIndex::Function(index) => self.functions.get(*index).map(Declaration::Function),
        }
    }

    /// Registered globals in declaration order
    pub fn variables(&self) -> &[VariableInfo] {
        &self.variables
    }

    /// Registered functions in declaration order
    pub fn functions(&self) -> &[FunctionInfo] {
        &self.functions
    }

    /// Generates code for every registered function and links the document
    pub fn compile_all(&self) -> Result<CompileResult> {
        let harness = self.harness()?;
        let mut context = CodegenContext::new(self);

        for variable in &self.variables {
            context
                .emitter()
                .declare(variable.symbol.as_str(), variable.ty.declaration, variable.value);
        }

        let mut code = Vec::with_capacity(self.functions.len());
        for function in &self.functions {
            let lines = context.compile_function(function)?;
            context.emitter().append_code(lines.iter().cloned());
            code.push(CompiledFunction {
                name: function.name.clone(),
                symbol: function.symbol.clone(),
                lines,
            });
        }

        let emitter = context.into_emitter();
        let instruction_count = emitter
            .code()
            .iter()
            .filter(|line| matches!(line, AsmLine::Instruction { .. }))
            .count();

        Ok(CompileResult {
            assembly: emitter.link(harness.as_ref()),
            code,
            data: emitter.data().to_vec(),
            instruction_count,
        })
    }

    /// Validates the entry point and describes the harness around it
    fn harness(&self) -> Result<Option<Harness>> {
        let entry = match &self.options.entry_point {
            Some(entry) => entry,
            None => return Ok(None),
        };

        let function = match self.declaration(entry) {
            Some(Declaration::Function(function)) => function,
            Some(Declaration::Variable(variable)) => {
                return Err(Error::NotCallable {
                    location: variable.location.clone(),
                    type_name: variable.ty.to_string(),
                })
            }
            None => {
                return Err(Error::UnknownIdentifier {
                    location: Location::builtin(),
                    name: entry.clone(),
                })
            }
        };

        if !function.parameters.is_empty() {
            return Err(Error::ArgumentCountMismatch {
                location: function.location.clone(),
                function_type: function.signature.to_string(),
                expected: 0,
                found: function.parameters.len(),
            });
        }
        let result_type = function.return_type().ok_or_else(|| Error::NoReturnValue {
            location: function.location.clone(),
            function_type: function.signature.to_string(),
        })?;

        let input_symbol = self
            .options
            .input_variable
            .as_ref()
            .and_then(|name| match self.declaration(name) {
                Some(Declaration::Variable(variable)) => Some(variable.symbol.clone()),
                _ => None,
            });

        Ok(Some(Harness {
            entry_symbol: function.symbol.clone(),
            result_type,
            input_symbol,
        }))
    }
}

/// Resolves a type position node
fn resolve_type(node: &Node) -> Result<&'static TypeInfo> {
    match &node.kind {
        NodeKind::Identifier(name) => types::resolve(name, &node.location),
        _ => Err(Error::unexpected_node(&node.location, "a type name")),
    }
}

/// Evaluates a global initializer: a literal, possibly under explicit casts
fn constant_value(node: &Node, ty: &Type) -> Result<i64> {
    let (value, from) = constant_literal(node)?;
    types::convert_literal(value, from.as_ref(), ty, CastKind::Implicit, &node.location)
}

fn constant_literal(node: &Node) -> Result<(i64, Option<Type>)> {
    match &node.kind {
        NodeKind::Integer(value) => Ok((*value, None)),
        NodeKind::TypeCast { value, ty } => {
            let (inner, from) = constant_literal(value)?;
            let to = Type::from(resolve_type(ty)?);
            let converted =
                types::convert_literal(inner, from.as_ref(), &to, CastKind::Explicit, &node.location)?;
            Ok((converted, Some(to)))
        }
        // Left behind by the optimizer when a typed literal is negated: `-1:i32`
        NodeKind::Negation(inner) => {
            let (value, ty) = constant_literal(inner)?;
            let negated = value.wrapping_neg();
            if let Some(ty) = &ty {
                types::require_signed(ty, &node.location)?;
                types::convert_literal(negated, None, ty, CastKind::Implicit, &node.location)?;
            }
            Ok((negated, ty))
        }
        _ => Err(Error::unexpected_node(&node.location, "a constant integer")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library() -> Compiler {
        Compiler::new(CompileOptions {
            entry_point: None,
            ..CompileOptions::default()
        })
    }

    #[test]
    fn test_input_variable_is_registered_first() {
        let mut compiler = Compiler::new(CompileOptions::default());
        compiler.register_source("i32 main() { return input; }").unwrap();
        assert_eq!(compiler.variables()[0].symbol, "_input");
        assert!(matches!(
            compiler.declaration("main"),
            Some(Declaration::Function(_))
        ));
    }

    #[test]
    fn test_redeclaration() {
        let mut compiler = library();
        let err = compiler
            .register_source("i32 x = 1;\nvoid x() {}")
            .unwrap_err();
        match err {
            Error::IdentifierAlreadyDeclared {
                name,
                location,
                previous,
            } => {
                assert_eq!(name, "x");
                assert_eq!(location.line, 2);
                assert_eq!(previous.line, 1);
            }
            other => panic!("expected redeclaration, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_parameter() {
        let mut compiler = library();
        assert!(matches!(
            compiler.register_source("void f(i32 a, u8 a) {}"),
            Err(Error::IdentifierAlreadyDeclared { .. })
        ));
    }

    #[test]
    fn test_constant_initializers() {
        let mut compiler = library();
        compiler
            .register_source("i8 a = -3 + 1; u8 b = 0x1FF:u8; u16 c = (2 * 3):u16; u8 d = (-1:i32):u8;")
            .unwrap();
        let values: Vec<i64> = compiler.variables().iter().map(|v| v.value).collect();
        assert_eq!(values, vec![0, -2, 255, 6, 255]);
    }

    #[test]
    fn test_non_constant_initializer() {
        let mut compiler = library();
        let err = compiler.register_source("i32 a = 1; i32 b = a;").unwrap_err();
        assert!(err.to_string().contains("a constant integer"), "{}", err);
    }

    #[test]
    fn test_entry_point_validation() {
        let mut compiler = Compiler::new(CompileOptions::default());
        assert!(matches!(
            compiler.compile("i32 f() { return 1; }"),
            Err(Error::UnknownIdentifier { .. })
        ));

        let mut compiler = Compiler::new(CompileOptions::default());
        assert!(matches!(
            compiler.compile("void main() {}"),
            Err(Error::NoReturnValue { .. })
        ));

        let mut compiler = Compiler::new(CompileOptions::default());
        assert!(matches!(
            compiler.compile("i32 main(i32 a) { return a; }"),
            Err(Error::ArgumentCountMismatch { .. })
        ));
    }

    #[test]
    fn test_file_name_in_locations() {
        let mut compiler = Compiler::new(CompileOptions {
            file_name: "prog.pg".to_string(),
            ..CompileOptions::default()
        });
        let err = compiler.compile("i32 main() { return y; }").unwrap_err();
        assert_eq!(err.location().file, "prog.pg");
    }

    #[test]
    fn test_instruction_count_excludes_labels() {
        let mut compiler = library();
        let result = compiler.compile("void f() {}").unwrap();
        // push ebp, mov ebp esp, leave, ret
        assert_eq!(result.instruction_count, 4);
        assert_eq!(result.data.len(), 1);
    }
}
