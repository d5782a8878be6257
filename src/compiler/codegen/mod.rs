//! # Code Generator
//!
//! Walks function bodies and emits FASM instructions through an
//! [`AssemblyEmitter`], holding intermediate results in a
//! [`RegisterAllocator`]. All mutable generation state lives in one
//! [`CodegenContext`] created per compilation.
//!
//! - `expr`: expression compilation into [`Value`]s
//! - `stmt`: statements, conditions and control flow
//! - `type_eval`: static expression types without emitting code

mod expr;
mod stmt;
mod type_eval;

use super::assembly::{AsmLine, AssemblyEmitter};
use super::registers::{register_name, RegisterAllocator, Relocation, RETURN_SLOT};
use super::types::{check_cast, convert_literal, CastKind, Type, TypeInfo, I32};
use super::value::{Address, Value};
use super::{Compiler, Declaration, FunctionInfo};
use crate::error::{Error, Result};
use crate::location::Location;
use crate::parser::{Node, NodeKind};

/// Label shared by every early `return` of a function
const END_LABEL: &str = ".end";

/// Function currently being compiled
struct FunctionFrame<'a> {
    function: &'a FunctionInfo,
    /// Set when an early return jumps to [`END_LABEL`]
    needs_end_label: bool,
}

/// Mutable state of one code generation run
pub struct CodegenContext<'a> {
    compiler: &'a Compiler,
    allocator: RegisterAllocator,
    emitter: AssemblyEmitter,
    frame: Option<FunctionFrame<'a>>,
    label_counter: usize,
}

impl<'a> CodegenContext<'a> {
    /// Creates a context resolving names through `compiler`'s symbol tables
    pub fn new(compiler: &'a Compiler) -> Self {
        Self {
            compiler,
            allocator: RegisterAllocator::new(),
            emitter: AssemblyEmitter::new(),
            frame: None,
            label_counter: 0,
        }
    }

    /// The emitter holding everything generated so far
    pub fn emitter(&mut self) -> &mut AssemblyEmitter {
        &mut self.emitter
    }

    /// Consumes the context, returning the emitter
    pub fn into_emitter(self) -> AssemblyEmitter {
        self.emitter
    }

    /// Compiles one function into its final lines (prologue, body, epilogue)
    pub fn compile_function(&mut self, function: &'a FunctionInfo) -> Result<Vec<AsmLine>> {
        tracing::debug!("compiling function {} ({})", function.name, function.signature);

        self.allocator.reset_used();
        self.frame = Some(FunctionFrame {
            function,
            needs_end_label: false,
        });

        let count = function.body.len();
        for (index, statement) in function.body.iter().enumerate() {
            self.compile_statement(statement, index + 1 == count)?;
        }

        if !self.allocator.all_free() {
            tracing::error!(
                "{} registers still allocated after compiling {}",
                self.allocator.live_count(),
                function.name
            );
            return Err(Error::internal(
                &function.location,
                format!(
                    "{} registers still allocated at the end of function {}",
                    self.allocator.live_count(),
                    function.name
                ),
            ));
        }

        let body = self.emitter.take_staging();
        let needs_end_label = self
            .frame
            .take()
            .map(|frame| frame.needs_end_label)
            .unwrap_or(false);

        let returns_value = function.return_type().is_some();
        let saved: Vec<usize> = self
            .allocator
            .used_slots()
            .into_iter()
            .filter(|&slot| !(returns_value && slot == RETURN_SLOT))
            .collect();

        self.emitter.label(function.symbol.as_str());
        self.emitter.emit("push", ["ebp"]);
        self.emitter.emit("mov", ["ebp", "esp"]);
        for &slot in &saved {
            self.emitter.emit("push", [register_name(slot, 4)]);
        }
        let mut lines = self.emitter.take_staging();
        lines.extend(body);

        if needs_end_label {
            self.emitter.label(END_LABEL);
        }
        for &slot in saved.iter().rev() {
            self.emitter.emit("pop", [register_name(slot, 4)]);
        }
        self.emitter.emit::<&str>("leave", []);
        self.emitter.emit::<&str>("ret", []);
        lines.extend(self.emitter.take_staging());

        tracing::debug!(
            "function {} compiled to {} lines, saving {} registers",
            function.name,
            lines.len(),
            saved.len()
        );
        Ok(lines)
    }

    // =========================================================================
    // Names and operands
    // =========================================================================

    /// Resolves an identifier: parameters first, then globals and functions
    fn lookup(&self, name: &str, location: &Location) -> Result<Value> {
        if let Some(frame) = &self.frame {
            let parameters = &frame.function.parameters;
            if let Some(index) = parameters.iter().position(|p| p.name == name) {
                return Ok(Value::Symbol {
                    ty: Type::from(parameters[index].ty),
                    address: Address::Frame(8 + 4 * index as i32),
                });
            }
        }

        match self.compiler.declaration(name) {
            Some(Declaration::Variable(variable)) => Ok(Value::Symbol {
                ty: Type::from(variable.ty),
                address: Address::Global(variable.symbol.clone()),
            }),
            Some(Declaration::Function(function)) => Ok(Value::Symbol {
                ty: Type::Function(function.signature.clone()),
                address: Address::Global(function.symbol.clone()),
            }),
            None => Err(Error::UnknownIdentifier {
                location: location.clone(),
                name: name.to_string(),
            }),
        }
    }

    /// Resolves a type position node
    fn resolve_type(&self, node: &Node) -> Result<&'static TypeInfo> {
        match &node.kind {
            NodeKind::Identifier(name) => super::types::resolve(name, &node.location),
            _ => Err(Error::unexpected_node(&node.location, "a type name")),
        }
    }

    /// Renders a value as an instruction operand
    fn operand(&self, value: &Value, location: &Location) -> Result<String> {
        match value {
            Value::Integer { value, .. } => Ok(value.to_string()),
            Value::Symbol { ty, address } if ty.function().is_some() => Ok(address.to_string()),
            Value::Symbol { ty, address } => Ok(format!("{} [{}]", ty.pointer(), address)),
            Value::Register { ty, id } => {
                let slot = self.allocator.slot_of(*id).ok_or_else(|| {
                    Error::internal(location, format!("use of freed register {:?}", id))
                })?;
                Ok(register_name(slot, ty.size()).to_string())
            }
        }
    }

    fn emit_relocation(&mut self, relocation: Option<Relocation>) {
        if let Some(relocation) = relocation {
            self.emitter.emit(
                "mov",
                [
                    register_name(relocation.to, 4),
                    register_name(relocation.from, 4),
                ],
            );
        }
    }

    /// Releases the register held by `value`, if any
    fn free(&mut self, value: &Value) {
        if let Some(id) = value.allocation() {
            self.allocator.free(id);
        }
    }

    fn next_label_id(&mut self) -> usize {
        self.label_counter += 1;
        self.label_counter
    }

    // =========================================================================
    // Moves and casts
    // =========================================================================

    /// Loads a non-register value into a freshly allocated register
    fn into_register(&mut self, value: Value, location: &Location) -> Result<Value> {
        if value.is_register() {
            return Ok(value);
        }

        let ty = value.ty().cloned().unwrap_or_else(|| Type::from(&I32));
        let id = self.allocator.allocate(location)?;
        let register = Value::Register { ty, id };

        let destination = self.operand(&register, location)?;
        let source = self.operand(&value, location)?;
        self.emitter.emit("mov", [destination, source]);
        Ok(register)
    }

    /// Converts `value` to `to`, emitting extension or truncation code as needed
    fn cast(&mut self, value: Value, to: &Type, kind: CastKind, location: &Location) -> Result<Value> {
        let from = match &value {
            Value::Integer { ty, value } => {
                let converted = convert_literal(*value, ty.as_ref(), to, kind, location)?;
                return Ok(Value::Integer {
                    ty: Some(to.clone()),
                    value: converted,
                });
            }
            Value::Symbol { ty, .. } | Value::Register { ty, .. } => ty.clone(),
        };

        check_cast(&from, to, kind, location)?;
        if &from == to {
            return Ok(value);
        }

        if to.size() > from.size() {
            let extend = if from.is_signed() { "movsx" } else { "movzx" };
            let widened = match &value {
                Value::Register { id, .. } => Value::Register {
                    ty: to.clone(),
                    id: *id,
                },
                _ => Value::Register {
                    ty: to.clone(),
                    id: self.allocator.allocate(location)?,
                },
            };
            let destination = self.operand(&widened, location)?;
            let source = self.operand(&value, location)?;
            self.emitter.emit(extend, [destination, source]);
            return Ok(widened);
        }

        // Explicit narrowing: the low bytes already hold the truncated value
        if value.is_register() && !to.is_signed() {
            if let Some(info) = to.primitive() {
                let register = self.operand(&value, location)?;
                self.emitter
                    .emit("and", [register, format!("0x{:X}", info.mask())]);
            }
        }
        Ok(value.retyped(to.clone()))
    }

    /// Moves `source` into `destination`, freeing the source
    fn emit_move(
        &mut self,
        destination: &Value,
        source: Value,
        kind: CastKind,
        location: &Location,
    ) -> Result<()> {
        let ty = destination
            .ty()
            .cloned()
            .ok_or_else(|| Error::internal(location, "move into an untyped value"))?;
        let source = self.cast(source, &ty, kind, location)?;

        if destination.same_location(&source) {
            return Ok(());
        }

        // No memory-to-memory form of mov
        let staged = matches!(destination, Value::Symbol { .. })
            && matches!(source, Value::Symbol { .. });
        let source = if staged {
            self.into_register(source, location)?
        } else {
            source
        };

        let target = self.operand(destination, location)?;
        let operand = self.operand(&source, location)?;
        self.emitter.emit("mov", [target, operand]);
        self.free(&source);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::types::{I8, U16, U8};
    use crate::compiler::CompileOptions;

    fn listing(context: &mut CodegenContext<'_>) -> Vec<String> {
        context
            .emitter
            .take_staging()
            .iter()
            .map(|line| line.to_string().trim().to_string())
            .collect()
    }

    fn global(name: &str, ty: &'static TypeInfo) -> Value {
        Value::Symbol {
            ty: Type::from(ty),
            address: Address::Global(name.to_string()),
        }
    }

    #[test]
    fn test_move_to_same_location_is_silent() {
        let compiler = Compiler::new(CompileOptions::default());
        let mut context = CodegenContext::new(&compiler);
        let x = global("_x", &I32);

        context
            .emit_move(&x, x.clone(), CastKind::Implicit, &Location::builtin())
            .unwrap();
        assert!(listing(&mut context).is_empty());
    }

    #[test]
    fn test_memory_to_memory_move_is_staged() {
        let compiler = Compiler::new(CompileOptions::default());
        let mut context = CodegenContext::new(&compiler);

        context
            .emit_move(
                &global("_a", &I32),
                global("_b", &I8),
                CastKind::Implicit,
                &Location::builtin(),
            )
            .unwrap();
        assert_eq!(
            listing(&mut context),
            vec!["movsx eax, byte [_b]", "mov dword [_a], eax"]
        );
        assert!(context.allocator.all_free());
    }

    #[test]
    fn test_widen_register_in_place() {
        let compiler = Compiler::new(CompileOptions::default());
        let mut context = CodegenContext::new(&compiler);
        let loc = Location::builtin();

        let narrow = context.into_register(global("_b", &U8), &loc).unwrap();
        let wide = context
            .cast(narrow.clone(), &Type::from(&U16), CastKind::Implicit, &loc)
            .unwrap();
        assert!(wide.same_location(&narrow));
        assert_eq!(
            listing(&mut context),
            vec!["mov al, byte [_b]", "movzx ax, al"]
        );
    }

    #[test]
    fn test_explicit_unsigned_narrowing_masks() {
        let compiler = Compiler::new(CompileOptions::default());
        let mut context = CodegenContext::new(&compiler);
        let loc = Location::builtin();

        let wide = context.into_register(global("_w", &U16), &loc).unwrap();
        let narrow = context
            .cast(wide, &Type::from(&U8), CastKind::Explicit, &loc)
            .unwrap();
        assert_eq!(narrow.ty(), Some(&Type::from(&U8)));
        assert_eq!(
            listing(&mut context),
            vec!["mov ax, word [_w]", "and ax, 0xFF"]
        );
    }

    #[test]
    fn test_symbol_narrowing_retypes() {
        let compiler = Compiler::new(CompileOptions::default());
        let mut context = CodegenContext::new(&compiler);

        let narrow = context
            .cast(
                global("_x", &I32),
                &Type::from(&I8),
                CastKind::Explicit,
                &Location::builtin(),
            )
            .unwrap();
        assert_eq!(narrow, global("_x", &I8));
        assert!(listing(&mut context).is_empty());
    }

    #[test]
    fn test_freed_register_operand_is_internal_error() {
        let compiler = Compiler::new(CompileOptions::default());
        let mut context = CodegenContext::new(&compiler);
        let loc = Location::builtin();

        let register = context.into_register(global("_x", &I32), &loc).unwrap();
        context.free(&register);
        assert!(matches!(
            context.operand(&register, &loc),
            Err(Error::InternalError { .. })
        ));
    }
}
