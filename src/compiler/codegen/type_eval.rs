use super::CodegenContext;
use crate::compiler::types::{require_signed, Type};
use crate::error::{Error, Result};
use crate::location::Location;
use crate::parser::{Node, NodeKind};

impl<'a> CodegenContext<'a> {
    /// Static type of an expression without emitting code
    ///
    /// Returns `None` for expressions made only of untyped literals.
    pub(super) fn evaluate_type(&self, node: &Node) -> Result<Option<Type>> {
        match &node.kind {
            NodeKind::Integer(_) => Ok(None),
            NodeKind::Identifier(name) => Ok(self.lookup(name, &node.location)?.ty().cloned()),
            NodeKind::TypeCast { ty, .. } => Ok(Some(Type::from(self.resolve_type(ty)?))),
            NodeKind::Negation(inner) => {
                let ty = self.evaluate_type(inner)?;
                if let Some(ty) = &ty {
                    require_signed(ty, &node.location)?;
                }
                Ok(ty)
            }
            NodeKind::Call { callee, .. } => match self.evaluate_type(callee)? {
                Some(Type::Function(signature)) => match signature.return_type {
                    Some(ty) => Ok(Some(Type::from(ty))),
                    None => Err(Error::NoReturnValue {
                        location: node.location.clone(),
                        function_type: signature.to_string(),
                    }),
                },
                other => Err(Error::NotCallable {
                    location: callee.location.clone(),
                    type_name: other.map_or_else(|| "integer".to_string(), |ty| ty.to_string()),
                }),
            },
            NodeKind::Binary { left, right, .. } => {
                let left_type = self.evaluate_type(left)?;
                let right_type = self.evaluate_type(right)?;
                unify(left_type, right_type, &node.location)
            }
            _ => Err(Error::unexpected_node(&node.location, "an expression")),
        }
    }
}

/// Common type of two binary operands: same signedness, wider width
fn unify(left: Option<Type>, right: Option<Type>, location: &Location) -> Result<Option<Type>> {
    let reject_function = |ty: &Type| -> Result<()> {
        if ty.function().is_some() {
            Err(Error::invalid_cast(
                location,
                Some(ty.to_string()),
                "integer",
                "function values cannot be used as operands",
            ))
        } else {
            Ok(())
        }
    };

    match (left, right) {
        (Some(left), Some(right)) => {
            reject_function(&left)?;
            reject_function(&right)?;
            if left.is_signed() != right.is_signed() {
                return Err(Error::invalid_cast(
                    location,
                    Some(right.to_string()),
                    left.to_string(),
                    "signedness change",
                ));
            }
            Ok(Some(if right.size() > left.size() { right } else { left }))
        }
        (Some(ty), None) | (None, Some(ty)) => {
            reject_function(&ty)?;
            Ok(Some(ty))
        }
        (None, None) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::types::{I16, I8, U8};
    use crate::compiler::{CompileOptions, Compiler};
    use crate::parser::parse_expression;

    fn compiler() -> Compiler {
        let mut compiler = Compiler::new(CompileOptions {
            entry_point: None,
            ..CompileOptions::default()
        });
        compiler
            .register_source("i8 a = 1; i16 b = 2; u8 c = 3; void v() {} u8 g() { return c; }")
            .unwrap();
        compiler
    }

    fn evaluate(compiler: &Compiler, source: &str) -> Result<Option<Type>> {
        let context = CodegenContext::new(compiler);
        context.evaluate_type(&parse_expression("test", source).unwrap())
    }

    #[test]
    fn test_literals_are_untyped() {
        let compiler = compiler();
        assert_eq!(evaluate(&compiler, "1 + 2").unwrap(), None);
        assert_eq!(evaluate(&compiler, "-(3)").unwrap(), None);
    }

    #[test]
    fn test_binary_takes_wider_type() {
        let compiler = compiler();
        assert_eq!(evaluate(&compiler, "a + b").unwrap(), Some(Type::from(&I16)));
        assert_eq!(evaluate(&compiler, "1 - a").unwrap(), Some(Type::from(&I8)));
        assert_eq!(evaluate(&compiler, "g() + 1").unwrap(), Some(Type::from(&U8)));
    }

    #[test]
    fn test_signedness_mismatch() {
        let compiler = compiler();
        assert!(matches!(
            evaluate(&compiler, "a + c"),
            Err(Error::InvalidTypeCast { .. })
        ));
    }

    #[test]
    fn test_unsigned_negation() {
        let compiler = compiler();
        assert!(matches!(
            evaluate(&compiler, "-c"),
            Err(Error::UnsignedType { .. })
        ));
    }

    #[test]
    fn test_calls() {
        let compiler = compiler();
        assert!(matches!(
            evaluate(&compiler, "v()"),
            Err(Error::NoReturnValue { .. })
        ));
        assert!(matches!(
            evaluate(&compiler, "a()"),
            Err(Error::NotCallable { .. })
        ));
        assert!(matches!(
            evaluate(&compiler, "g + 1"),
            Err(Error::InvalidTypeCast { .. })
        ));
        assert!(matches!(
            evaluate(&compiler, "missing"),
            Err(Error::UnknownIdentifier { .. })
        ));
    }
}
