use super::{CodegenContext, END_LABEL};
use crate::compiler::optimizer::optimize;
use crate::compiler::registers::RETURN_SLOT;
use crate::compiler::types::{CastKind, Type};
use crate::compiler::value::Value;
use crate::error::{Error, Result};
use crate::location::Location;
use crate::parser::{BinaryOp, Node, NodeKind};

/// Jump taken when `op` does NOT hold
fn inverted_jump(op: BinaryOp, signed: bool) -> Option<&'static str> {
    let mnemonic = match (op, signed) {
        (BinaryOp::Eq, _) => "jne",
        (BinaryOp::Ne, _) => "je",
        (BinaryOp::Lt, true) => "jge",
        (BinaryOp::Lt, false) => "jae",
        (BinaryOp::Le, true) => "jg",
        (BinaryOp::Le, false) => "ja",
        (BinaryOp::Gt, true) => "jle",
        (BinaryOp::Gt, false) => "jbe",
        (BinaryOp::Ge, true) => "jl",
        (BinaryOp::Ge, false) => "jb",
        _ => return None,
    };
    Some(mnemonic)
}

/// Evaluates a comparison between two literals
fn comparison_holds(op: BinaryOp, left: i64, right: i64) -> bool {
    match op {
        BinaryOp::Eq => left == right,
        BinaryOp::Ne => left != right,
        BinaryOp::Lt => left < right,
        BinaryOp::Le => left <= right,
        BinaryOp::Gt => left > right,
        BinaryOp::Ge => left >= right,
        _ => left != 0,
    }
}

impl<'a> CodegenContext<'a> {
    /// Compiles one statement into the staging buffer
    ///
    /// `is_last` marks the final top-level statement of the function body, where
    /// a `return` can fall through to the epilogue instead of jumping.
    pub(super) fn compile_statement(&mut self, statement: &Node, is_last: bool) -> Result<()> {
        match &statement.kind {
            NodeKind::Assignment { target, value } => self.compile_assignment(target, value),
            NodeKind::Return(value) => self.compile_return(statement, value.as_deref(), is_last),
            NodeKind::Block(statements) => {
                for statement in statements {
                    self.compile_statement(statement, false)?;
                }
                Ok(())
            }
            NodeKind::If {
                condition,
                then_branch,
                else_branch,
            } => self.compile_if(condition, then_branch, else_branch.as_deref()),
            NodeKind::While { condition, body } => self.compile_while(condition, body),
            NodeKind::Call { .. } => {
                let call = optimize(statement);
                if let NodeKind::Call { callee, arguments } = &call.kind {
                    self.compile_call(&call, callee, arguments, false)?;
                }
                Ok(())
            }
            NodeKind::VariableDeclaration { .. }
            | NodeKind::FunctionDeclaration { .. }
            | NodeKind::Parameter { .. } => {
                Err(Error::unexpected_node(&statement.location, "a statement"))
            }
            _ => {
                let expression = optimize(statement);
                let value = self.compile_value(&expression, None)?;
                self.free(&value);
                Ok(())
            }
        }
    }

    fn compile_assignment(&mut self, target: &Node, value: &Node) -> Result<()> {
        let destination = self.compile_value(target, None)?;
        if !destination.is_lvalue() {
            return Err(Error::NotLValue {
                location: target.location.clone(),
            });
        }
        let ty = destination
            .ty()
            .cloned()
            .ok_or_else(|| Error::internal(&target.location, "untyped assignment target"))?;

        let value = optimize(value);

        // `x = e:T` where T is x's type: convert once, explicitly
        let bypass = match &value.kind {
            NodeKind::TypeCast { value: inner, ty: cast } => {
                if Type::from(self.resolve_type(cast)?) == ty {
                    Some(inner.as_ref())
                } else {
                    None
                }
            }
            _ => None,
        };

        match bypass {
            Some(inner) => {
                let source = match inner.kind {
                    NodeKind::Integer(_) => self.compile_value(inner, None)?,
                    _ => self.compile_value(inner, Some(&ty))?,
                };
                self.emit_move(&destination, source, CastKind::Explicit, &value.location)?;
            }
            None => {
                let source = self.compile_value(&value, Some(&ty))?;
                self.emit_move(&destination, source, CastKind::Implicit, &value.location)?;
            }
        }

        self.free(&destination);
        Ok(())
    }

    fn compile_return(&mut self, statement: &Node, value: Option<&Node>, is_last: bool) -> Result<()> {
        let location = &statement.location;
        let expected = self
            .frame
            .as_ref()
            .ok_or_else(|| Error::internal(location, "return outside of a function"))?
            .function
            .return_type();

        match (value, expected) {
            (None, None) => {}
            (Some(_), None) => {
                return Err(Error::MismatchingReturn {
                    location: location.clone(),
                    expected: "no value".to_string(),
                })
            }
            (None, Some(ty)) => {
                return Err(Error::MismatchingReturn {
                    location: location.clone(),
                    expected: ty.name.to_string(),
                })
            }
            (Some(value), Some(return_type)) => {
                let ty = Type::from(return_type);
                let value = optimize(value);
                let result = self.compile_value(&value, Some(&ty))?;
                let result = self.cast(result, &ty, CastKind::Implicit, &value.location)?;
                self.move_to_return_slot(result, &ty, location)?;
            }
        }

        if !is_last {
            self.emitter.emit("jmp", [END_LABEL]);
            if let Some(frame) = self.frame.as_mut() {
                frame.needs_end_label = true;
            }
        }
        Ok(())
    }

    fn move_to_return_slot(&mut self, result: Value, ty: &Type, location: &Location) -> Result<()> {
        let in_place = result
            .allocation()
            .and_then(|id| self.allocator.slot_of(id))
            == Some(RETURN_SLOT);
        if in_place {
            self.free(&result);
            return Ok(());
        }

        let reservation = self.allocator.require(RETURN_SLOT, location)?;
        self.emit_relocation(reservation.relocation);
        let destination = Value::Register {
            ty: ty.clone(),
            id: reservation.id,
        };
        self.emit_move(&destination, result, CastKind::Implicit, location)?;
        self.free(&destination);
        Ok(())
    }

    fn compile_if(
        &mut self,
        condition: &Node,
        then_branch: &Node,
        else_branch: Option<&Node>,
    ) -> Result<()> {
        let id = self.next_label_id();
        let end_label = format!(".endif{}", id);

        match else_branch {
            Some(else_branch) => {
                let else_label = format!(".else{}", id);
                self.compile_condition(condition, &else_label)?;
                self.compile_statement(then_branch, false)?;
                self.emitter.emit("jmp", [end_label.as_str()]);
                self.emitter.label(else_label);
                self.compile_statement(else_branch, false)?;
            }
            None => {
                self.compile_condition(condition, &end_label)?;
                self.compile_statement(then_branch, false)?;
            }
        }

        self.emitter.label(end_label);
        Ok(())
    }

    fn compile_while(&mut self, condition: &Node, body: &Node) -> Result<()> {
        let id = self.next_label_id();
        let start_label = format!(".while{}", id);
        let end_label = format!(".endwhile{}", id);

        self.emitter.label(start_label.as_str());
        self.compile_condition(condition, &end_label)?;
        self.compile_statement(body, false)?;
        self.emitter.emit("jmp", [start_label.as_str()]);
        self.emitter.label(end_label);
        Ok(())
    }

    /// Emits a jump to `false_label` taken when `condition` does not hold
    fn compile_condition(&mut self, condition: &Node, false_label: &str) -> Result<()> {
        let condition = optimize(condition);

        if let NodeKind::Binary { op, left, right } = &condition.kind {
            if op.is_comparison() {
                return self.compile_comparison(&condition, *op, left, right, false_label);
            }
        }

        let location = &condition.location;
        match self.compile_value(&condition, None)? {
            Value::Integer { value, .. } => {
                if value == 0 {
                    self.emitter.emit("jmp", [false_label]);
                }
            }
            value => {
                if let Some(ty) = value.ty().filter(|ty| ty.function().is_some()) {
                    return Err(Error::invalid_cast(
                        location,
                        Some(ty.to_string()),
                        "integer",
                        "function values cannot be used as conditions",
                    ));
                }
                let operand = self.operand(&value, location)?;
                self.emitter.emit("cmp", [operand, "0".to_string()]);
                self.emitter.emit("je", [false_label]);
                self.free(&value);
            }
        }
        Ok(())
    }

    fn compile_comparison(
        &mut self,
        node: &Node,
        op: BinaryOp,
        left: &Node,
        right: &Node,
        false_label: &str,
    ) -> Result<()> {
        let location = &node.location;
        let ty = self.operand_type(node, None)?;

        let lhs = self.compile_value(left, Some(&ty))?;
        let rhs = self.compile_value(right, Some(&ty))?;
        let lhs = self.cast(lhs, &ty, CastKind::Implicit, location)?;
        let rhs = self.cast(rhs, &ty, CastKind::Implicit, location)?;

        // An immediate can only be the second operand of cmp
        let literal_first =
            matches!(lhs, Value::Integer { .. }) && !matches!(rhs, Value::Integer { .. });
        let (lhs, rhs, op) = if literal_first {
            (rhs, lhs, op.swapped())
        } else {
            (lhs, rhs, op)
        };

        if let (Value::Integer { value: a, .. }, Value::Integer { value: b, .. }) = (&lhs, &rhs) {
            if !comparison_holds(op, *a, *b) {
                self.emitter.emit("jmp", [false_label]);
            }
            return Ok(());
        }

        let memory_pair =
            matches!(lhs, Value::Symbol { .. }) && matches!(rhs, Value::Symbol { .. });
        let lhs = if memory_pair {
            self.into_register(lhs, location)?
        } else {
            lhs
        };

        let jump = inverted_jump(op, ty.is_signed())
            .ok_or_else(|| Error::unexpected_node(location, "a comparison"))?;
        let first = self.operand(&lhs, location)?;
        let second = self.operand(&rhs, location)?;
        self.emitter.emit("cmp", [first, second]);
        self.emitter.emit(jump, [false_label]);

        self.free(&lhs);
        self.free(&rhs);
        Ok(())
    }
}
