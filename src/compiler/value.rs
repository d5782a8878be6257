//! Compile-time values: immediates, memory symbols and allocated registers

use super::registers::AllocationId;
use super::types::Type;
use std::fmt;

/// Memory address of a symbol
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    /// Global variable or function label
    Global(String),
    /// Offset from the frame pointer (parameters)
    Frame(i32),
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Global(symbol) => f.write_str(symbol),
            Address::Frame(offset) if *offset < 0 => write!(f, "ebp - {}", -offset),
            Address::Frame(offset) => write!(f, "ebp + {}", offset),
        }
    }
}

/// Result of compiling an expression
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Immediate; `ty` stays `None` until a context fixes it
    Integer {
        /// Fixed type, if any
        ty: Option<Type>,
        /// Literal value
        value: i64,
    },
    /// Named memory location
    Symbol {
        /// Type of the stored value
        ty: Type,
        /// Where it lives
        address: Address,
    },
    /// Value held in a register; the physical slot is resolved through the allocator
    Register {
        /// Type the register is viewed at
        ty: Type,
        /// Allocation handle
        id: AllocationId,
    },
}

impl Value {
    /// Static type, `None` for untyped literals
    pub fn ty(&self) -> Option<&Type> {
        match self {
            Value::Integer { ty, .. } => ty.as_ref(),
            Value::Symbol { ty, .. } | Value::Register { ty, .. } => Some(ty),
        }
    }

    /// Same location viewed at another type
    pub fn retyped(&self, ty: Type) -> Value {
        match self {
            Value::Integer { value, .. } => Value::Integer {
                ty: Some(ty),
                value: *value,
            },
            Value::Symbol { address, .. } => Value::Symbol {
                ty,
                address: address.clone(),
            },
            Value::Register { id, .. } => Value::Register { ty, id: *id },
        }
    }

    /// Whether the value denotes an assignable location
    pub fn is_lvalue(&self) -> bool {
        match self {
            Value::Integer { .. } => false,
            Value::Symbol { ty, .. } => ty.function().is_none(),
            Value::Register { .. } => true,
        }
    }

    /// Whether the value lives in a register
    pub fn is_register(&self) -> bool {
        matches!(self, Value::Register { .. })
    }

    /// Allocation handle of a register value
    pub fn allocation(&self) -> Option<AllocationId> {
        match self {
            Value::Register { id, .. } => Some(*id),
            _ => None,
        }
    }

    /// Whether both values denote the same storage, regardless of type
    pub fn same_location(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Symbol { address: a, .. }, Value::Symbol { address: b, .. }) => a == b,
            (Value::Register { id: a, .. }, Value::Register { id: b, .. }) => a == b,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::types::{FunctionType, I32, U8};
    use std::rc::Rc;

    #[test]
    fn test_address_display() {
        assert_eq!(Address::Global("_x".into()).to_string(), "_x");
        assert_eq!(Address::Frame(8).to_string(), "ebp + 8");
        assert_eq!(Address::Frame(-4).to_string(), "ebp - 4");
    }

    #[test]
    fn test_lvalues() {
        let variable = Value::Symbol {
            ty: Type::from(&I32),
            address: Address::Global("_x".into()),
        };
        let function = Value::Symbol {
            ty: Type::Function(Rc::new(FunctionType {
                return_type: None,
                parameters: vec![],
            })),
            address: Address::Global("_f".into()),
        };
        let literal = Value::Integer { ty: None, value: 3 };

        assert!(variable.is_lvalue());
        assert!(!function.is_lvalue());
        assert!(!literal.is_lvalue());
        assert!(literal.ty().is_none());
    }

    #[test]
    fn test_same_location_ignores_type() {
        let wide = Value::Register {
            ty: Type::from(&I32),
            id: AllocationId(3),
        };
        let narrow = wide.retyped(Type::from(&U8));
        assert!(wide.same_location(&narrow));
        assert!(!wide.same_location(&Value::Integer { ty: None, value: 0 }));
    }
}
