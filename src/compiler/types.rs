//! # Pigeon Type Registry
//!
//! The fixed catalog of primitive integer types plus the derived function type.
//! Primitive types are `static` values interned by name; every value in the
//! code generator refers to them by `&'static TypeInfo`, so two types are equal
//! exactly when they are the same catalog entry.
//!
//! ## Cast rules
//!
//! | Cast      | Signedness change | Narrowing      | Literal out of range |
//! |-----------|-------------------|----------------|----------------------|
//! | Implicit  | rejected          | rejected       | rejected             |
//! | Explicit  | rejected (literals exempt) | truncates | wraps             |

use crate::error::{Error, Result};
use crate::location::Location;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// A primitive integer type
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct TypeInfo {
    /// Width in bytes (1, 2 or 4)
    pub size: u32,
    /// Source-level name
    pub name: &'static str,
    /// Two's complement signed
    pub signed: bool,
    /// Data declaration directive for a global of this type
    pub declaration: &'static str,
    /// Size qualifier for memory operands
    pub pointer: &'static str,
}

/// 8-bit signed integer
pub static I8: TypeInfo = TypeInfo {
    size: 1,
    name: "i8",
    signed: true,
    declaration: "db",
    pointer: "byte",
};

/// 16-bit signed integer
pub static I16: TypeInfo = TypeInfo {
    size: 2,
    name: "i16",
    signed: true,
    declaration: "dw",
    pointer: "word",
};

/// 32-bit signed integer
pub static I32: TypeInfo = TypeInfo {
    size: 4,
    name: "i32",
    signed: true,
    declaration: "dd",
    pointer: "dword",
};

/// 8-bit unsigned integer
pub static U8: TypeInfo = TypeInfo {
    size: 1,
    name: "u8",
    signed: false,
    declaration: "db",
    pointer: "byte",
};

/// 16-bit unsigned integer
pub static U16: TypeInfo = TypeInfo {
    size: 2,
    name: "u16",
    signed: false,
    declaration: "dw",
    pointer: "word",
};

/// 32-bit unsigned integer
pub static U32: TypeInfo = TypeInfo {
    size: 4,
    name: "u32",
    signed: false,
    declaration: "dd",
    pointer: "dword",
};

lazy_static::lazy_static! {
    /// Primitive types indexed by source name
    static ref PRIMITIVES: HashMap<&'static str, &'static TypeInfo> = {
        let mut map = HashMap::new();
        for ty in [&I8, &I16, &I32, &U8, &U16, &U32] {
            map.insert(ty.name, ty);
        }
        map
    };
}

/// Looks up a primitive type by name
pub fn lookup(name: &str) -> Option<&'static TypeInfo> {
    PRIMITIVES.get(name).copied()
}

/// Resolves a type name, failing with `UnknownIdentifier`
pub fn resolve(name: &str, location: &Location) -> Result<&'static TypeInfo> {
    lookup(name).ok_or_else(|| Error::UnknownIdentifier {
        location: location.clone(),
        name: name.to_string(),
    })
}

/// All primitive types, narrowest first
pub fn primitives() -> [&'static TypeInfo; 6] {
    [&I8, &U8, &I16, &U16, &I32, &U32]
}

impl TypeInfo {
    /// All-ones bit mask of the type's width
    pub fn mask(&self) -> i64 {
        (1i64 << (self.size * 8)) - 1
    }

    /// Largest representable value
    pub fn max_value(&self) -> i64 {
        if self.signed {
            (1i64 << (self.size * 8 - 1)) - 1
        } else {
            self.mask()
        }
    }

    /// Smallest representable value
    pub fn min_value(&self) -> i64 {
        if self.signed {
            -self.max_value() - 1
        } else {
            0
        }
    }

    /// Whether `value` is representable without loss
    pub fn contains(&self, value: i64) -> bool {
        self.min_value() <= value && value <= self.max_value()
    }

    /// Wraps `value` into this type using two's complement rules
    pub fn truncate(&self, value: i64) -> i64 {
        let masked = value & self.mask();
        if self.signed && masked > self.max_value() {
            masked - (self.mask() + 1)
        } else {
            masked
        }
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Type of a function value: a code address with a signature
#[derive(Debug, PartialEq, Eq)]
pub struct FunctionType {
    /// Declared return type, `None` for `void`
    pub return_type: Option<&'static TypeInfo>,
    /// Parameter types in declaration order
    pub parameters: Vec<&'static TypeInfo>,
}

impl fmt::Display for FunctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn(")?;
        for (i, parameter) in self.parameters.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", parameter)?;
        }
        match self.return_type {
            Some(ty) => write!(f, ") -> {}", ty),
            None => write!(f, ")"),
        }
    }
}

/// Static type of a compile-time value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    /// Primitive integer
    Primitive(&'static TypeInfo),
    /// Function symbol
    Function(Rc<FunctionType>),
}

impl Type {
    /// Width in bytes; functions are 32-bit code addresses
    pub fn size(&self) -> u32 {
        match self {
            Type::Primitive(info) => info.size,
            Type::Function(_) => 4,
        }
    }

    /// Function types are always unsigned
    pub fn is_signed(&self) -> bool {
        match self {
            Type::Primitive(info) => info.signed,
            Type::Function(_) => false,
        }
    }

    /// Memory operand size qualifier
    pub fn pointer(&self) -> &'static str {
        match self {
            Type::Primitive(info) => info.pointer,
            Type::Function(_) => "dword",
        }
    }

    /// The primitive info, if this is not a function type
    pub fn primitive(&self) -> Option<&'static TypeInfo> {
        match self {
            Type::Primitive(info) => Some(info),
            Type::Function(_) => None,
        }
    }

    /// The signature, if this is a function type
    pub fn function(&self) -> Option<&FunctionType> {
        match self {
            Type::Primitive(_) => None,
            Type::Function(signature) => Some(signature),
        }
    }
}

impl From<&'static TypeInfo> for Type {
    fn from(info: &'static TypeInfo) -> Self {
        Type::Primitive(info)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Primitive(info) => write!(f, "{}", info),
            Type::Function(signature) => write!(f, "{}", signature),
        }
    }
}

/// Whether a conversion was written by the programmer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastKind {
    /// Assignment, argument passing, return, operand unification
    Implicit,
    /// `value : Type`
    Explicit,
}

/// Checks that a typed (non-literal) value may be converted from `from` to `to`
pub fn check_cast(from: &Type, to: &Type, kind: CastKind, location: &Location) -> Result<()> {
    if from == to {
        return Ok(());
    }

    let reject = |reason: &str| {
        Err(Error::invalid_cast(
            location,
            Some(from.to_string()),
            to.to_string(),
            reason,
        ))
    };

    if from.function().is_some() || to.function().is_some() {
        return reject("function values cannot be converted");
    }
    if from.is_signed() != to.is_signed() {
        return reject("signedness change");
    }
    if kind == CastKind::Implicit && to.size() < from.size() {
        return reject("possible value loss");
    }

    Ok(())
}

/// Converts an integer literal to `to`, returning the value it takes in that type
///
/// Explicit conversions wrap; implicit ones require the value to be in range and,
/// for literals that already carry a type, a legal implicit cast.
pub fn convert_literal(
    value: i64,
    from: Option<&Type>,
    to: &Type,
    kind: CastKind,
    location: &Location,
) -> Result<i64> {
    let target = match to {
        Type::Primitive(info) => *info,
        Type::Function(_) => {
            return Err(Error::invalid_cast(
                location,
                from.map(|ty| ty.to_string()),
                to.to_string(),
                "integers cannot become functions",
            ))
        }
    };

    if kind == CastKind::Explicit {
        return Ok(target.truncate(value));
    }

    if let Some(from) = from {
        check_cast(from, to, kind, location)?;
    }

    if value > target.max_value() {
        return Err(Error::invalid_cast(
            location,
            from.map(|ty| ty.to_string()),
            target.name,
            format!(
                "{} is greater than the maximum value {}",
                value,
                target.max_value()
            ),
        ));
    }
    if value < target.min_value() {
        return Err(Error::invalid_cast(
            location,
            from.map(|ty| ty.to_string()),
            target.name,
            format!(
                "{} is less than the minimum value {}",
                value,
                target.min_value()
            ),
        ));
    }

    Ok(value)
}

/// Fails with `UnsignedType` unless `ty` is signed
pub fn require_signed(ty: &Type, location: &Location) -> Result<()> {
    if ty.is_signed() {
        Ok(())
    } else {
        Err(Error::UnsignedType {
            location: location.clone(),
            type_name: ty.to_string(),
            reason: "negation requires a signed type".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> Location {
        Location::new("test", 1, 1)
    }

    #[test]
    fn test_ranges() {
        assert_eq!(I8.max_value(), 127);
        assert_eq!(I8.min_value(), -128);
        assert_eq!(U16.max_value(), 65535);
        assert_eq!(U32.max_value(), 4_294_967_295);
        assert_eq!(I32.min_value(), -2_147_483_648);
        assert_eq!(U8.mask(), 0xFF);
    }

    #[test]
    fn test_registry() {
        assert_eq!(lookup("u16"), Some(&U16));
        assert!(lookup("i64").is_none());
        assert!(matches!(
            resolve("bool", &loc()),
            Err(Error::UnknownIdentifier { .. })
        ));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(U8.truncate(0x1FF), 0xFF);
        assert_eq!(U8.truncate(-1), 255);
        assert_eq!(I8.truncate(200), -56);
        assert_eq!(I16.truncate(-1), -1);
    }

    #[test]
    fn test_implicit_widening_allowed() {
        assert!(check_cast(&Type::from(&I8), &Type::from(&I32), CastKind::Implicit, &loc()).is_ok());
        assert!(check_cast(&Type::from(&U8), &Type::from(&U16), CastKind::Implicit, &loc()).is_ok());
    }

    #[test]
    fn test_implicit_narrowing_rejected() {
        let err =
            check_cast(&Type::from(&I32), &Type::from(&I8), CastKind::Implicit, &loc()).unwrap_err();
        assert!(err.to_string().contains("possible value loss"));
        assert!(check_cast(&Type::from(&I32), &Type::from(&I8), CastKind::Explicit, &loc()).is_ok());
    }

    #[test]
    fn test_signedness_change_rejected_even_explicitly() {
        for kind in [CastKind::Implicit, CastKind::Explicit] {
            let err = check_cast(&Type::from(&U8), &Type::from(&I32), kind, &loc()).unwrap_err();
            assert!(err.to_string().contains("signedness change"));
        }
    }

    #[test]
    fn test_literal_range() {
        let u8_ty = Type::from(&U8);
        assert_eq!(convert_literal(255, None, &u8_ty, CastKind::Implicit, &loc()), Ok(255));

        let err = convert_literal(300, None, &u8_ty, CastKind::Implicit, &loc()).unwrap_err();
        assert!(err.to_string().contains("maximum value 255"));

        let err = convert_literal(-1, None, &u8_ty, CastKind::Implicit, &loc()).unwrap_err();
        assert!(err.to_string().contains("minimum value 0"));
    }

    #[test]
    fn test_explicit_literal_wraps() {
        assert_eq!(
            convert_literal(0x1FF, Some(&Type::from(&U32)), &Type::from(&U8), CastKind::Explicit, &loc()),
            Ok(0xFF)
        );
        assert_eq!(
            convert_literal(-1, Some(&Type::from(&I32)), &Type::from(&U8), CastKind::Explicit, &loc()),
            Ok(255)
        );
    }

    #[test]
    fn test_typed_literal_keeps_signedness_implicitly() {
        let err = convert_literal(1, Some(&Type::from(&U8)), &Type::from(&I32), CastKind::Implicit, &loc())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTypeCast { .. }));
    }

    #[test]
    fn test_function_type_name() {
        let signature = FunctionType {
            return_type: Some(&I32),
            parameters: vec![&U8, &I16],
        };
        assert_eq!(signature.to_string(), "fn(u8, i16) -> i32");
        let ty = Type::Function(Rc::new(signature));
        assert_eq!(ty.size(), 4);
        assert!(!ty.is_signed());
        assert!(check_cast(&ty, &Type::from(&U32), CastKind::Explicit, &loc()).is_err());
    }
}
