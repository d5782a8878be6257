use super::CodegenContext;
use crate::compiler::registers::{register_name, RETURN_SLOT};
use crate::compiler::types::{convert_literal, require_signed, CastKind, Type, I32};
use crate::compiler::value::Value;
use crate::error::{Error, Result};
use crate::location::Location;
use crate::parser::{BinaryOp, Node, NodeKind};
use std::rc::Rc;

impl<'a> CodegenContext<'a> {
    /// Compiles an expression into a value
    ///
    /// `target` is the type the surrounding context expects. It fixes the type of
    /// bare literals and of expressions whose own type is undetermined.
    pub(super) fn compile_value(&mut self, node: &Node, target: Option<&Type>) -> Result<Value> {
        match &node.kind {
            NodeKind::Identifier(name) => self.lookup(name, &node.location),

            NodeKind::Integer(value) => match target {
                Some(ty) => {
                    let value = convert_literal(*value, None, ty, CastKind::Implicit, &node.location)?;
                    Ok(Value::Integer {
                        ty: Some(ty.clone()),
                        value,
                    })
                }
                None => Ok(Value::Integer {
                    ty: None,
                    value: *value,
                }),
            },

            NodeKind::TypeCast { value, ty } => {
                let to = Type::from(self.resolve_type(ty)?);
                // Literals stay untyped so the explicit cast may wrap them
                let inner = match value.kind {
                    NodeKind::Integer(_) => self.compile_value(value, None)?,
                    _ => self.compile_value(value, Some(&to))?,
                };
                self.cast(inner, &to, CastKind::Explicit, &node.location)
            }

            NodeKind::Negation(inner) => self.compile_negation(node, inner, target),

            NodeKind::Call { callee, arguments } => self
                .compile_call(node, callee, arguments, true)?
                .ok_or_else(|| Error::internal(&node.location, "call produced no value")),

            NodeKind::Binary { op, left, right } if op.is_additive() => {
                self.compile_additive(node, *op, left, right, target)
            }

            NodeKind::Binary { op, .. } if op.is_multiplicative() => Err(Error::unexpected_node(
                &node.location,
                format!("an additive expression (`{}` must fold to a constant)", op),
            )),

            NodeKind::Binary { .. } => Err(Error::unexpected_node(
                &node.location,
                "a value expression (comparisons are only valid in conditions)",
            )),

            _ => Err(Error::unexpected_node(&node.location, "an expression")),
        }
    }

    /// Operand type of a binary expression
    pub(super) fn operand_type(&self, node: &Node, target: Option<&Type>) -> Result<Type> {
        Ok(self
            .evaluate_type(node)?
            .or_else(|| target.cloned())
            .unwrap_or_else(|| Type::from(&I32)))
    }

    fn compile_additive(
        &mut self,
        node: &Node,
        op: BinaryOp,
        left: &Node,
        right: &Node,
        target: Option<&Type>,
    ) -> Result<Value> {
        let ty = self.operand_type(node, target)?;
        let location = &node.location;

        let mut lhs = self.compile_value(left, Some(&ty))?;
        let mut rhs = self.compile_value(right, Some(&ty))?;

        if op == BinaryOp::Add && !lhs.is_register() && rhs.is_register() {
            std::mem::swap(&mut lhs, &mut rhs);
        }

        let lhs = self.cast(lhs, &ty, CastKind::Implicit, location)?;
        let rhs = self.cast(rhs, &ty, CastKind::Implicit, location)?;
        let lhs = self.into_register(lhs, location)?;

        let mnemonic = if op == BinaryOp::Add { "add" } else { "sub" };
        let destination = self.operand(&lhs, location)?;
        let source = self.operand(&rhs, location)?;
        self.emitter.emit(mnemonic, [destination, source]);
        self.free(&rhs);

        Ok(lhs)
    }

    fn compile_negation(&mut self, node: &Node, inner: &Node, target: Option<&Type>) -> Result<Value> {
        let value = self.compile_value(inner, target)?;

        match value {
            Value::Integer { ty, value } => {
                let negated = value.wrapping_neg();
                if let Some(ty) = &ty {
                    require_signed(ty, &node.location)?;
                    convert_literal(negated, None, ty, CastKind::Implicit, &node.location)?;
                }
                Ok(Value::Integer { ty, value: negated })
            }
            value => {
                if let Some(ty) = value.ty() {
                    require_signed(ty, &node.location)?;
                }
                let register = self.into_register(value, &node.location)?;
                let operand = self.operand(&register, &node.location)?;
                self.emitter.emit("neg", [operand]);
                Ok(register)
            }
        }
    }

    /// Compiles a call; the result is `Some` only when `require_value` is set
    ///
    /// Arguments are pushed right to left as dwords and popped by the caller.
    /// The return slot is reserved around every call to a value-returning
    /// function, since the callee does not preserve it.
    pub(super) fn compile_call(
        &mut self,
        node: &Node,
        callee: &Node,
        arguments: &[Node],
        require_value: bool,
    ) -> Result<Option<Value>> {
        let function = self.compile_value(callee, None)?;
        let signature = match function.ty() {
            Some(Type::Function(signature)) => Rc::clone(signature),
            other => {
                return Err(Error::NotCallable {
                    location: callee.location.clone(),
                    type_name: other.map_or_else(|| "integer".to_string(), |ty| ty.to_string()),
                })
            }
        };

        if arguments.len() != signature.parameters.len() {
            return Err(Error::ArgumentCountMismatch {
                location: node.location.clone(),
                function_type: signature.to_string(),
                expected: signature.parameters.len(),
                found: arguments.len(),
            });
        }
        if require_value && signature.return_type.is_none() {
            return Err(Error::NoReturnValue {
                location: node.location.clone(),
                function_type: signature.to_string(),
            });
        }

        for (argument, parameter) in arguments.iter().zip(&signature.parameters).rev() {
            let ty = Type::from(*parameter);
            let value = self.compile_value(argument, Some(&ty))?;
            let value = self.cast(value, &ty, CastKind::Implicit, &argument.location)?;
            self.push_argument(value, &argument.location)?;
        }

        let result = match signature.return_type {
            Some(return_type) => {
                let reservation = self.allocator.require(RETURN_SLOT, &node.location)?;
                self.emit_relocation(reservation.relocation);
                Some(Value::Register {
                    ty: Type::from(return_type),
                    id: reservation.id,
                })
            }
            None => None,
        };

        let target = self.operand(&function, &callee.location)?;
        self.emitter.emit("call", [target]);
        self.free(&function);
        if !arguments.is_empty() {
            self.emitter
                .emit("add", ["esp".to_string(), (4 * arguments.len()).to_string()]);
        }

        match result {
            Some(value) if require_value => Ok(Some(value)),
            Some(value) => {
                self.free(&value);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn push_argument(&mut self, value: Value, location: &Location) -> Result<()> {
        match &value {
            Value::Integer { value, .. } => {
                self.emitter.emit("push", [format!("dword {}", value)]);
            }
            Value::Symbol { ty, .. } if ty.size() == 4 => {
                let operand = self.operand(&value, location)?;
                self.emitter.emit("push", [operand]);
            }
            Value::Symbol { ty, .. } => {
                let extend = if ty.is_signed() { "movsx" } else { "movzx" };
                let id = self.allocator.allocate(location)?;
                let slot = self
                    .allocator
                    .slot_of(id)
                    .ok_or_else(|| Error::internal(location, "allocation without a register"))?;
                let source = self.operand(&value, location)?;
                self.emitter
                    .emit(extend, [register_name(slot, 4).to_string(), source]);
                self.emitter.emit("push", [register_name(slot, 4)]);
                self.allocator.free(id);
            }
            Value::Register { id, .. } => {
                let slot = self
                    .allocator
                    .slot_of(*id)
                    .ok_or_else(|| Error::internal(location, "use of freed register"))?;
                self.emitter.emit("push", [register_name(slot, 4)]);
                self.free(&value);
            }
        }
        Ok(())
    }
}
